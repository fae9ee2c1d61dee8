//! Integration tests for the telemetry server

#[cfg(feature = "server")]
mod server_tests {
    use chrono_tz::Tz;
    use futures::{SinkExt, StreamExt};
    use neurodrive::core::{
        Classifier, Model, ModelError, ModelInput, ReportGenerator, StreamPipeline,
        NOT_ENOUGH_DATA,
    };
    use neurodrive::server::{run, ServerConfig};
    use neurodrive::storage::{JsonlStore, MemoryStore, SampleStore, SharedStore};
    use serde_json::{json, Value};
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::oneshot;
    use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

    type Client = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

    struct AlwaysNormal;

    impl Model for AlwaysNormal {
        fn predict(&self, _input: &ModelInput) -> Result<Vec<f64>, ModelError> {
            Ok(vec![0.1, 0.8, 0.1])
        }
    }

    async fn start_server(config: ServerConfig) -> (SocketAddr, oneshot::Sender<()>) {
        start_server_with_store(config, Arc::new(MemoryStore::new())).await
    }

    async fn start_server_with_store(
        config: ServerConfig,
        store: SharedStore,
    ) -> (SocketAddr, oneshot::Sender<()>) {
        let pipeline = StreamPipeline::new(
            5,
            Classifier::new(Some(Arc::new(AlwaysNormal))),
            store.clone(),
        );
        let reports = ReportGenerator::new(store, Tz::UTC);

        let (addr, shutdown_tx) = run(config, pipeline, reports)
            .await
            .expect("Failed to start server");

        // Give server time to start
        tokio::time::sleep(Duration::from_millis(100)).await;
        (addr, shutdown_tx)
    }

    async fn connect(addr: SocketAddr) -> Client {
        let (mut client, _) = connect_async(format!("ws://{addr}/ws"))
            .await
            .expect("Failed to connect");
        let hello = next_event(&mut client).await;
        assert_eq!(hello["event"], "connection_status");
        assert_eq!(hello["data"]["status"], "connected");
        client
    }

    async fn send(client: &mut Client, event: &str, data: Value) {
        let frame = json!({ "event": event, "data": data }).to_string();
        client
            .send(Message::Text(frame))
            .await
            .expect("Failed to send frame");
    }

    async fn next_event(client: &mut Client) -> Value {
        loop {
            let message = tokio::time::timeout(Duration::from_secs(5), client.next())
                .await
                .expect("Timed out waiting for message")
                .expect("Stream closed")
                .expect("WebSocket error");
            if let Message::Text(text) = message {
                return serde_json::from_str(&text).expect("Invalid JSON frame");
            }
        }
    }

    fn sample(timestamp: i64) -> Value {
        json!({
            "Timestamp": timestamp,
            "AccX": 0.2, "AccY": 0.1, "AccZ": 9.8,
            "GyroX": 0.0, "GyroY": 0.01, "GyroZ": 0.1,
            "speed": 45.0
        })
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (addr, shutdown_tx) = start_server(ServerConfig::new("127.0.0.1", 0)).await;

        let response = reqwest::Client::new()
            .get(format!("http://{}/health", addr))
            .send()
            .await
            .expect("Failed to send request");

        assert!(response.status().is_success());

        let body: Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["status"], "ok");
        assert!(body["version"].as_str().is_some());

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_samples_produce_update_and_alert() {
        let (addr, shutdown_tx) = start_server(ServerConfig::new("127.0.0.1", 0)).await;
        let mut producer = connect(addr).await;
        let mut dashboard = connect(addr).await;

        let now = chrono::Utc::now().timestamp_millis();
        for i in 0..5 {
            send(&mut producer, "sensor_data", sample(now + i * 100)).await;
        }

        // Every client sees every update; the fifth sample fills the window.
        let mut last_update = Value::Null;
        for _ in 0..5 {
            let update = next_event(&mut dashboard).await;
            assert_eq!(update["event"], "update");
            let alert = next_event(&mut dashboard).await;
            assert_eq!(alert["event"], "risk_alert");
            assert_eq!(alert["data"]["risk_level"], update["data"]["risk_level"]);
            last_update = update;
        }
        assert_eq!(last_update["data"]["class"], 2);
        assert_eq!(last_update["data"]["risk_level"], "Normal");
        assert_eq!(last_update["data"]["sensor_data"]["AccZ"], 9.8);

        let first_on_producer = next_event(&mut producer).await;
        assert_eq!(first_on_producer["data"]["risk_level"], "Collecting Data");

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_malformed_sample_is_silently_dropped() {
        let (addr, shutdown_tx) = start_server(ServerConfig::new("127.0.0.1", 0)).await;
        let mut client = connect(addr).await;

        let mut bad = sample(1);
        bad.as_object_mut().unwrap().remove("AccY");
        send(&mut client, "sensor_data", bad).await;
        send(&mut client, "reset_session", Value::Null).await;

        // The reset ack is the first thing we hear back.
        let ack = next_event(&mut client).await;
        assert_eq!(ack["event"], "session_reset");
        assert_eq!(ack["data"]["status"], "success");
        assert!(chrono::DateTime::parse_from_rfc3339(
            ack["data"]["start_time"].as_str().unwrap()
        )
        .is_ok());

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_report_after_reset_has_not_enough_data() {
        let (addr, shutdown_tx) = start_server(ServerConfig::new("127.0.0.1", 0)).await;
        let mut client = connect(addr).await;

        send(&mut client, "reset_session", Value::Null).await;
        assert_eq!(next_event(&mut client).await["event"], "session_reset");

        send(
            &mut client,
            "generate_driving_report",
            json!({ "driver_name": "Sam" }),
        )
        .await;
        let report = next_event(&mut client).await;
        assert_eq!(report["event"], "driving_report");
        assert_eq!(report["data"]["report"], NOT_ENOUGH_DATA);

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_report_over_http() {
        let (addr, shutdown_tx) = start_server(ServerConfig::new("127.0.0.1", 0)).await;
        let http = reqwest::Client::new();

        let reset: Value = http
            .get(format!("http://{}/reset_session", addr))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(reset["status"], "success");
        let start = chrono::DateTime::parse_from_rfc3339(reset["start_time"].as_str().unwrap())
            .unwrap()
            .timestamp_millis();

        let mut client = connect(addr).await;
        for i in 1..=6 {
            send(&mut client, "sensor_data", sample(start + i * 1_000)).await;
        }
        // Drain the twelve broadcast messages so all samples are processed.
        for _ in 0..12 {
            next_event(&mut client).await;
        }

        let body: Value = http
            .post(format!("http://{}/report", addr))
            .json(&json!({ "driver_name": "Alex" }))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        let report = body["report"].as_str().unwrap();

        assert!(report.contains("Driver: Alex"));
        assert!(report.contains("Duration: 5.00 seconds"));
        assert!(report.contains("Average Speed: 45.00 km/h"));
        // First row carries no time; rows 2-4 are still filling the window.
        assert!(report.contains("Collecting Data: 3.00s (60.0%)"));
        assert!(report.contains("Normal: 2.00s (40.0%)"));
        assert!(report.contains("Safety Score: 100.0/100"));

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_file_backed_log_keeps_arrival_order() {
        let path = std::env::temp_dir()
            .join("neurodrive-server-test")
            .join(format!("log-{}.jsonl", uuid::Uuid::new_v4()));
        let store: SharedStore = Arc::new(JsonlStore::open(&path).unwrap());
        let (addr, shutdown_tx) =
            start_server_with_store(ServerConfig::new("127.0.0.1", 0), store.clone()).await;
        let mut client = connect(addr).await;

        let now = chrono::Utc::now().timestamp_millis();
        for i in 0..8 {
            send(&mut client, "sensor_data", sample(now + i * 100)).await;
        }

        let mut seen = Vec::new();
        for _ in 0..8 {
            let update = next_event(&mut client).await;
            assert_eq!(update["event"], "update");
            seen.push(update["data"]["timestamp"].as_i64().unwrap());
            assert_eq!(next_event(&mut client).await["event"], "risk_alert");
        }
        let expected: Vec<i64> = (0..8).map(|i| now + i * 100).collect();
        assert_eq!(seen, expected);

        let stored: Vec<i64> = store.since(now).unwrap().iter().map(|r| r.timestamp()).collect();
        assert_eq!(stored, expected);

        send(&mut client, "reset_session", Value::Null).await;
        assert_eq!(next_event(&mut client).await["event"], "session_reset");
        assert!(store.is_empty().unwrap());

        let _ = shutdown_tx.send(());
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_run_simulator_without_command() {
        let (addr, shutdown_tx) = start_server(ServerConfig::new("127.0.0.1", 0)).await;

        let body: Value = reqwest::Client::new()
            .get(format!("http://{}/run_simulator", addr))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");

        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "No simulator command configured");

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_cors_headers() {
        let (addr, shutdown_tx) = start_server(ServerConfig::new("127.0.0.1", 0)).await;

        let response = reqwest::Client::new()
            .request(reqwest::Method::OPTIONS, format!("http://{}/report", addr))
            .header("Origin", "http://localhost:3000")
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
