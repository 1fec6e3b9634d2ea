// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tool registration and discovery schemas.
//!
//! Tools are registered once at startup into a [`SchemaRegistry`], which is
//! then frozen behind an `Arc` and handed to the protocol handler. Input and
//! output schemas are generated from Rust types with `schemars` and compiled
//! into a `jsonschema` validator at registration time, never per call.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jsonschema::Validator;
use log::debug;
use schemars::JsonSchema;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Failure raised by a tool implementation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("{0}")]
    Execution(String),
    #[error("Tool call timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors raised while building the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Tool '{0}' is already registered")]
    DuplicateTool(String),
    #[error("Tool '{0}' not found")]
    ToolNotFound(String),
    #[error("Invalid schema for tool '{name}': {reason}")]
    InvalidSchema { name: String, reason: String },
}

/// The contract backend code implements to expose a tool.
///
/// `arguments` has already passed the tool's input schema when this runs.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: Value) -> Result<Value, ToolError>;
}

/// Adapts an async function over a typed input into a [`ToolHandler`].
pub struct FnTool<I, F> {
    func: F,
    _input: PhantomData<fn(I)>,
}

impl<I, F> FnTool<I, F> {
    pub fn new<Fut>(func: F) -> Self
    where
        F: Fn(I) -> Fut,
    {
        Self {
            func,
            _input: PhantomData,
        }
    }
}

#[async_trait]
impl<I, F, Fut, R> ToolHandler for FnTool<I, F>
where
    I: DeserializeOwned + Send + 'static,
    F: Fn(I) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, ToolError>> + Send,
    R: Serialize + Send,
{
    async fn call(&self, arguments: Value) -> Result<Value, ToolError> {
        let input: I = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        let output = (self.func)(input).await?;
        serde_json::to_value(output)
            .map_err(|e| ToolError::Execution(format!("Failed to serialize tool output: {}", e)))
    }
}

/// Input type for tools that take no arguments.
#[derive(Debug, Default, Clone, Deserialize, JsonSchema)]
pub struct NoArguments {}

/// Generates the externally visible JSON Schema for `T`.
///
/// The root `$schema` and the generated `title` are bookkeeping that MCP
/// clients do not need, so they are stripped.
pub fn schema_for_type<T: JsonSchema>() -> Value {
    let root = schemars::schema_for!(T);
    let mut value = serde_json::to_value(root).unwrap_or_else(|_| json!({ "type": "object" }));
    if let Value::Object(ref mut obj) = value {
        obj.remove("$schema");
        obj.remove("title");
    }
    value
}

/// A registered tool: descriptor, compiled validator and handler.
pub struct ToolDefinition {
    name: String,
    description: String,
    input_schema: Value,
    output_schema: Option<Value>,
    validator: Validator,
    timeout: Option<Duration>,
    handler: Arc<dyn ToolHandler>,
}

impl fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .field("output_schema", &self.output_schema)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ToolDefinition {
    /// Builds a definition whose input schema is derived from `I`.
    pub fn new<I: JsonSchema>(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: impl ToolHandler + 'static,
    ) -> Result<Self, RegistryError> {
        Self::from_schema(name, description, schema_for_type::<I>(), handler)
    }

    /// Builds a definition from a hand-written input schema.
    pub fn from_schema(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: impl ToolHandler + 'static,
    ) -> Result<Self, RegistryError> {
        let name = name.into();
        let validator = jsonschema::validator_for(&input_schema).map_err(|e| {
            RegistryError::InvalidSchema {
                name: name.clone(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self {
            name,
            description: description.into(),
            input_schema,
            output_schema: None,
            validator,
            timeout: None,
            handler: Arc::new(handler),
        })
    }

    /// Attaches an output schema derived from `O`.
    pub fn with_output<O: JsonSchema>(mut self) -> Self {
        self.output_schema = Some(schema_for_type::<O>());
        self
    }

    /// Overrides the server-wide call deadline for this tool.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn input_schema(&self) -> &Value {
        &self.input_schema
    }

    pub fn output_schema(&self) -> Option<&Value> {
        self.output_schema.as_ref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn handler(&self) -> Arc<dyn ToolHandler> {
        Arc::clone(&self.handler)
    }

    /// Checks `arguments` against the input schema.
    ///
    /// On failure returns a structured list of violations suitable for a
    /// JSON-RPC `error.data` member.
    pub fn validate(&self, arguments: &Value) -> Result<(), Value> {
        if self.validator.is_valid(arguments) {
            return Ok(());
        }

        let errors: Vec<Value> = self
            .validator
            .iter_errors(arguments)
            .map(|e| {
                json!({
                    "path": e.instance_path.to_string(),
                    "schemaPath": e.schema_path.to_string(),
                    "message": e.to_string(),
                })
            })
            .collect();

        Err(json!({ "tool": self.name, "errors": errors }))
    }

    /// The entry this tool contributes to a `tools/list` result.
    pub fn descriptor(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("name".into(), Value::String(self.name.clone()));
        obj.insert("description".into(), Value::String(self.description.clone()));
        obj.insert("inputSchema".into(), self.input_schema.clone());
        if let Some(ref output) = self.output_schema {
            obj.insert("outputSchema".into(), output.clone());
        }
        Value::Object(obj)
    }
}

/// Registry of tools, kept in registration order.
#[derive(Default)]
pub struct SchemaRegistry {
    tools: Vec<Arc<ToolDefinition>>,
    index: HashMap<String, usize>,
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.tools.iter().map(|t| t.name()))
            .finish()
    }
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: ToolDefinition) -> Result<(), RegistryError> {
        if self.index.contains_key(definition.name()) {
            return Err(RegistryError::DuplicateTool(definition.name().to_string()));
        }
        debug!("Registering tool '{}'", definition.name());
        self.index.insert(definition.name().to_string(), self.tools.len());
        self.tools.push(Arc::new(definition));
        Ok(())
    }

    /// Registers an async function whose input type provides the schema.
    pub fn register_fn<I, F, Fut, R>(
        &mut self,
        name: &str,
        description: &str,
        func: F,
    ) -> Result<(), RegistryError>
    where
        I: JsonSchema + DeserializeOwned + Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ToolError>> + Send + 'static,
        R: Serialize + Send + 'static,
    {
        self.register(ToolDefinition::new::<I>(name, description, FnTool::new(func))?)
    }

    pub fn list(&self) -> &[Arc<ToolDefinition>] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Result<Arc<ToolDefinition>, RegistryError> {
        self.index
            .get(name)
            .map(|&i| Arc::clone(&self.tools[i]))
            .ok_or_else(|| RegistryError::ToolNotFound(name.to_string()))
    }

    pub fn descriptors(&self) -> Vec<Value> {
        self.tools.iter().map(|t| t.descriptor()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
