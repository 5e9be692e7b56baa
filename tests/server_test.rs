//! Integration tests for the challenge host HTTP server

#[cfg(feature = "server")]
mod server_tests {
    use smartcaptcha::challenge::ChallengeSettings;
    use smartcaptcha::server::{run, ServerConfig};
    use smartcaptcha::verifier::VerifierConfig;
    use std::net::SocketAddr;
    use std::time::Duration;

    async fn start_server() -> (SocketAddr, tokio::sync::oneshot::Sender<()>) {
        start_server_with(|config| config).await
    }

    async fn start_server_with(
        adjust: impl FnOnce(ServerConfig) -> ServerConfig,
    ) -> (SocketAddr, tokio::sync::oneshot::Sender<()>) {
        // Nothing listens on the discard port; no test here completes a drag.
        let verifier = VerifierConfig::new("http://127.0.0.1:9/verify", Duration::from_secs(1));
        let config = adjust(ServerConfig::new(0, verifier, ChallengeSettings::default()));

        let (addr, shutdown_tx) = run(config).await.expect("Failed to start server");

        // Give server time to start
        tokio::time::sleep(Duration::from_millis(100)).await;
        (addr, shutdown_tx)
    }

    async fn create_challenge(client: &reqwest::Client, addr: SocketAddr) -> serde_json::Value {
        let response = client
            .post(format!("http://{}/challenges", addr))
            .json(&serde_json::json!({
                "available_width_px": 400.0,
                "handle_width_px": 44.0,
                "now_ms": 0.0
            }))
            .send()
            .await
            .expect("Failed to send request");
        assert!(response.status().is_success());
        response.json().await.expect("Failed to parse JSON")
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (addr, shutdown_tx) = start_server().await;

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
    async fn test_create_challenge_lays_out_track() {
        let (addr, shutdown_tx) = start_server().await;
        let client = reqwest::Client::new();

        let created = create_challenge(&client, addr).await;
        assert!(created["id"].as_str().is_some());
        assert_eq!(created["geometry"]["min_x"], 0.0);
        assert!(created["geometry"]["max_x"].as_f64().unwrap() > 0.0);
        assert_eq!(created["interaction_delay_ms"], 0.0);

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_expired_challenges_free_capacity() {
        let (addr, shutdown_tx) = start_server_with(|config| {
            config.with_limits(2, Duration::from_millis(300))
        })
        .await;
        let client = reqwest::Client::new();
        let request = serde_json::json!({
            "available_width_px": 400.0,
            "handle_width_px": 44.0
        });

        create_challenge(&client, addr).await;
        create_challenge(&client, addr).await;

        let full = client
            .post(format!("http://{}/challenges", addr))
            .json(&request)
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(full.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
        let body: serde_json::Value = full.json().await.expect("Failed to parse JSON");
        assert_eq!(body["code"], "TOO_MANY_CHALLENGES");

        // Both idle challenges expire and are swept on the next create.
        tokio::time::sleep(Duration::from_millis(450)).await;
        let created = create_challenge(&client, addr).await;
        assert!(created["id"].as_str().is_some());

        let stats: serde_json::Value = client
            .get(format!("http://{}/stats", addr))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(stats["active_challenges"], 1);

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_short_drag_snaps_back() {
        let (addr, shutdown_tx) = start_server().await;
        let client = reqwest::Client::new();

        let created = create_challenge(&client, addr).await;
        let id = created["id"].as_str().unwrap();

        let response = client
            .post(format!("http://{}/challenges/{}/inputs", addr, id))
            .json(&serde_json::json!({
                "inputs": [
                    {"phase": "press", "x": 10.0, "y": 20.0, "at_ms": 100.0},
                    {"phase": "move", "x": 25.0, "y": 21.0, "at_ms": 140.0},
                    {"phase": "move", "x": 40.0, "y": 20.5, "at_ms": 190.0},
                    {"phase": "release", "x": 40.0, "y": 20.5, "at_ms": 230.0}
                ]
            }))
            .send()
            .await
            .expect("Failed to send request");

        assert!(response.status().is_success());
        let view: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(view["verdict"]["state"], "unresolved");
        assert_eq!(view["status"], "Try again.");
        assert_eq!(view["attempt"], 0);
        assert_eq!(view["frame"]["animated"], true);
        assert_eq!(view["frame"]["position_px"], 0.0);
        assert_eq!(view["notices"].as_array().unwrap().len(), 0);

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_reset_starts_new_attempt() {
        let (addr, shutdown_tx) = start_server().await;
        let client = reqwest::Client::new();

        let created = create_challenge(&client, addr).await;
        let id = created["id"].as_str().unwrap();

        let response = client
            .post(format!("http://{}/challenges/{}/reset", addr, id))
            .json(&serde_json::json!({"now_ms": 500.0}))
            .send()
            .await
            .expect("Failed to send request");

        assert!(response.status().is_success());
        let view: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(view["attempt"], 1);
        assert_eq!(view["verdict"]["state"], "unresolved");
        assert_eq!(view["status"], "");

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_unknown_challenge_is_not_found() {
        let (addr, shutdown_tx) = start_server().await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!(
                "http://{}/challenges/{}/inputs",
                addr,
                uuid::Uuid::new_v4()
            ))
            .json(&serde_json::json!({"inputs": []}))
            .send()
            .await
            .expect("Failed to send request");

        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["code"], "UNKNOWN_CHALLENGE");

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_feedback_validation() {
        let (addr, shutdown_tx) = start_server().await;
        let client = reqwest::Client::new();

        let accepted = client
            .post(format!("http://{}/feedback", addr))
            .json(&serde_json::json!({
                "email": "someone@example.com",
                "message": "The slider felt sticky on my tablet."
            }))
            .send()
            .await
            .expect("Failed to send request");
        assert!(accepted.status().is_success());

        let rejected = client
            .post(format!("http://{}/feedback", addr))
            .json(&serde_json::json!({"email": "not-an-email", "message": "hi"}))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(rejected.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: serde_json::Value = rejected.json().await.expect("Failed to parse JSON");
        assert_eq!(body["code"], "INVALID_FEEDBACK");

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_stats_count_inputs() {
        let (addr, shutdown_tx) = start_server().await;
        let client = reqwest::Client::new();

        let created = create_challenge(&client, addr).await;
        let id = created["id"].as_str().unwrap();
        client
            .post(format!("http://{}/challenges/{}/inputs", addr, id))
            .json(&serde_json::json!({
                "inputs": [
                    {"phase": "press", "x": 10.0, "y": 20.0, "at_ms": 100.0},
                    {"phase": "release", "x": 12.0, "y": 20.0, "at_ms": 150.0}
                ]
            }))
            .send()
            .await
            .expect("Failed to send request");

        let stats: serde_json::Value = client
            .get(format!("http://{}/stats", addr))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");

        assert_eq!(stats["active_challenges"], 1);
        assert_eq!(stats["inputs_received"], 2);
        assert_eq!(stats["attempts_completed"], 0);
        assert_eq!(stats["verification_requests"], 0);

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_cors_headers() {
        let (addr, shutdown_tx) = start_server().await;

        // Send OPTIONS request to check CORS
        let client = reqwest::Client::new();
        let response = client
            .request(
                reqwest::Method::OPTIONS,
                format!("http://{}/challenges", addr),
            )
            .header("Origin", "http://localhost")
            .header("Access-Control-Request-Method", "POST")
            .send()
            .await
            .expect("Failed to send request");

        // CORS preflight should succeed
        assert!(
            response.status().is_success() || response.status() == reqwest::StatusCode::NO_CONTENT,
            "CORS preflight failed: {}",
            response.status()
        );

        let _ = shutdown_tx.send(());
    }
}
