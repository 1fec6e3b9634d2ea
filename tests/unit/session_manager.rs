// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;
    use mcp_bridge::session_manager::{SessionError, SessionEvent, SessionGuard, SessionManager};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_producers_keep_per_producer_order() {
        let manager = Arc::new(SessionManager::default());
        let session = manager.create_session();
        let id = session.id().to_string();

        let mut producers = Vec::new();
        for producer in 0..4 {
            let manager = Arc::clone(&manager);
            let id = id.clone();
            producers.push(tokio::spawn(async move {
                for seq in 0..50 {
                    manager.enqueue(&id, json!({"producer": producer, "seq": seq})).unwrap();
                }
            }));
        }
        for producer in producers {
            producer.await.unwrap();
        }

        let stream = manager.drain(&id).await.unwrap();
        let events: Vec<_> = stream.take(200).collect().await;
        let mut last_seen = [-1i64; 4];
        for event in events {
            let SessionEvent::Message(msg) = event else {
                panic!("unexpected keepalive while queue was full");
            };
            let producer = msg["producer"].as_u64().unwrap() as usize;
            let seq = msg["seq"].as_i64().unwrap();
            assert!(seq > last_seen[producer], "producer {} reordered", producer);
            last_seen[producer] = seq;
        }
        assert_eq!(last_seen, [49; 4]);
    }

    #[tokio::test]
    async fn test_sessions_do_not_share_queues() {
        let manager = SessionManager::default();
        let a = manager.create_session();
        let b = manager.create_session();
        manager.enqueue(a.id(), json!("for-a")).unwrap();
        manager.enqueue(b.id(), json!("for-b")).unwrap();

        let mut stream_a = Box::pin(manager.drain(a.id()).await.unwrap());
        let mut stream_b = Box::pin(manager.drain(b.id()).await.unwrap());
        assert_eq!(stream_a.next().await, Some(SessionEvent::Message(json!("for-a"))));
        assert_eq!(stream_b.next().await, Some(SessionEvent::Message(json!("for-b"))));
        assert_eq!(a.pending(), 0);
        assert_eq!(b.pending(), 0);
    }

    #[tokio::test]
    async fn test_keepalive_interleaves_with_messages() {
        let manager = Arc::new(SessionManager::new(Duration::from_millis(50), 0));
        let session = manager.create_session();
        let id = session.id().to_string();
        let mut stream = Box::pin(manager.drain(&id).await.unwrap());

        assert_eq!(stream.next().await, Some(SessionEvent::Keepalive));
        manager.enqueue(&id, json!({"late": true})).unwrap();
        assert_eq!(stream.next().await, Some(SessionEvent::Message(json!({"late": true}))));
    }

    #[tokio::test]
    async fn test_enqueue_after_guard_drop_fails_fast() {
        let manager = Arc::new(SessionManager::default());
        let id = manager.create_session().id().to_string();
        drop(SessionGuard::new(Arc::clone(&manager), id.clone()));

        let started = std::time::Instant::now();
        let err = manager.enqueue(&id, json!({})).unwrap_err();
        assert_eq!(err, SessionError::NotFound(id));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
