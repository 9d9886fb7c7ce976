//! Integration tests for the signalvoid HTTP server

#[cfg(feature = "server")]
mod server_tests {
    use chrono::Duration as ChronoDuration;
    use signalvoid::server::{run, ServerConfig};
    use signalvoid::store::{Heartbeat, HeartbeatStore, InMemoryStore, Scope, StoreError, TimeRange};
    use signalvoid::CellId;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;

    async fn start(store: Arc<dyn HeartbeatStore>) -> (SocketAddr, tokio::sync::oneshot::Sender<()>) {
        let config = ServerConfig::new(0, store);
        let (addr, shutdown_tx) = run(config).await.expect("Failed to start server");

        // Give server time to start
        tokio::time::sleep(Duration::from_millis(100)).await;
        (addr, shutdown_tx)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (addr, shutdown_tx) = start(Arc::new(InMemoryStore::new())).await;

        let client = reqwest::Client::new();
        let response = client
            .get(format!("http://{}/health", addr))
            .send()
            .await
            .expect("Failed to send request");

        assert!(response.status().is_success());

        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["status"], "ok");
        assert!(body["version"].as_str().is_some());

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_heartbeat_reuses_session() {
        let (addr, shutdown_tx) = start(Arc::new(InMemoryStore::new())).await;
        let client = reqwest::Client::new();

        let first: serde_json::Value = client
            .post(format!("http://{}/heartbeat", addr))
            .json(&serde_json::json!({ "lat": 12.34, "lng": 56.78 }))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");

        assert_eq!(first["cell_id"], "grid_123_567");
        assert_eq!(first["status"], "baseline");
        assert_eq!(first["confidence"], "low");
        assert_eq!(first["neighbors"].as_array().unwrap().len(), 4);
        let session_id = first["session_id"].as_str().unwrap().to_string();

        let mut last = serde_json::Value::Null;
        for _ in 0..3 {
            last = client
                .post(format!("http://{}/heartbeat", addr))
                .json(&serde_json::json!({
                    "lat": 12.39,
                    "lng": 56.71,
                    "session_id": session_id,
                }))
                .send()
                .await
                .expect("Failed to send request")
                .json()
                .await
                .expect("Failed to parse JSON");
        }

        assert_eq!(last["session_id"], session_id.as_str());
        assert_eq!(last["baseline_count"], 4);
        assert_eq!(last["status"], "normal");
        assert_eq!(last["confidence"], "medium");
        assert_eq!(
            last["explanation"],
            "Activity levels are consistent with recent patterns."
        );

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_heartbeat_rejects_bad_coordinates() {
        let (addr, shutdown_tx) = start(Arc::new(InMemoryStore::new())).await;

        let response = reqwest::Client::new()
            .post(format!("http://{}/heartbeat", addr))
            .json(&serde_json::json!({ "lat": 123.0, "lng": 0.0 }))
            .send()
            .await
            .expect("Failed to send request");

        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["code"], "INVALID_INPUT");

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_inspect_cell() {
        let store = Arc::new(InMemoryStore::new());
        let now = chrono::Utc::now();
        let cell = CellId::new(-5, 20);
        for minutes in [3, 4, 6] {
            store.insert_at(cell, now - ChronoDuration::minutes(minutes));
        }
        let (addr, shutdown_tx) = start(store).await;
        let client = reqwest::Client::new();

        let body: serde_json::Value = client
            .get(format!("http://{}/cells/grid_-5_20", addr))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(body["status"], "silent");
        assert_eq!(body["baseline_count"], 3);
        assert!(body.get("session_id").is_none());

        let response = client
            .get(format!("http://{}/cells/not-a-cell", addr))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["code"], "MALFORMED_CELL_ID");

        let response = client
            .get(format!("http://{}/cells/grid_{}_0", addr, i64::MAX))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_detect_silence() {
        let store = Arc::new(InMemoryStore::new());
        let now = chrono::Utc::now();
        store.insert_at(CellId::new(1, 1), now - ChronoDuration::minutes(1));
        store.insert_at(CellId::new(2, 2), now - ChronoDuration::minutes(20));
        let (addr, shutdown_tx) = start(store).await;

        let body: serde_json::Value = reqwest::Client::new()
            .get(format!("http://{}/detect-silence", addr))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");

        assert!(body["updated_at"].as_str().is_some());
        assert_eq!(body["grids"]["grid_1_1"]["status"], "normal");
        assert_eq!(body["grids"]["grid_2_2"]["status"], "silent");
        assert_eq!(body["grids"]["grid_2_2"]["recent_count"], 0);

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_classify_endpoint() {
        let (addr, shutdown_tx) = start(Arc::new(InMemoryStore::new())).await;
        let client = reqwest::Client::new();

        let body: serde_json::Value = client
            .post(format!("http://{}/classify", addr))
            .json(&serde_json::json!({
                "cell_id": "grid_1_1",
                "recent_count": 2,
                "baseline_count": 5,
            }))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(body["status"], "reduced");
        assert_eq!(body["confidence"], "high");

        let response = client
            .post(format!("http://{}/classify", addr))
            .json(&serde_json::json!({
                "cell_id": "grid_1_1",
                "recent_count": -1,
                "baseline_count": 5,
            }))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

        let _ = shutdown_tx.send(());
    }

    struct SlowStore;

    impl HeartbeatStore for SlowStore {
        fn append(&self, cell_id: CellId) -> Result<Heartbeat, StoreError> {
            Ok(Heartbeat {
                cell_id,
                timestamp: chrono::Utc::now(),
            })
        }

        fn query_range(
            &self,
            _scope: Scope,
            _range: TimeRange,
        ) -> Result<Vec<Heartbeat>, StoreError> {
            std::thread::sleep(Duration::from_millis(500));
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_store_timeout() {
        let mut config = ServerConfig::new(0, Arc::new(SlowStore));
        config.store_timeout = Duration::from_millis(50);
        let (addr, shutdown_tx) = run(config).await.expect("Failed to start server");
        tokio::time::sleep(Duration::from_millis(100)).await;

        let response = reqwest::Client::new()
            .get(format!("http://{}/detect-silence", addr))
            .send()
            .await
            .expect("Failed to send request");

        assert_eq!(response.status(), reqwest::StatusCode::GATEWAY_TIMEOUT);
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["code"], "STORE_TIMEOUT");

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_cors_headers() {
        let (addr, shutdown_tx) = start(Arc::new(InMemoryStore::new())).await;

        let response = reqwest::Client::new()
            .request(reqwest::Method::OPTIONS, format!("http://{}/heartbeat", addr))
            .header("Origin", "http://localhost")
            .header("Access-Control-Request-Method", "POST")
            .send()
            .await
            .expect("Failed to send request");

        assert!(
            response.status().is_success() || response.status() == reqwest::StatusCode::NO_CONTENT,
            "CORS preflight failed: {}",
            response.status()
        );

        let _ = shutdown_tx.send(());
    }
}
