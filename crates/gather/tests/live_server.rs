//! Runs the collector on a real socket to check that ingest and health stay
//! responsive while a snapshot request is waiting on its window.

use gather::web::{router, AppState};
use gather::SessionCoordinator;
use std::sync::Arc;
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_millis(400);

async fn spawn_server() -> String {
    let coordinator = Arc::new(SessionCoordinator::new(WINDOW));
    let app = router(AppState::new(coordinator));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_endpoints_stay_responsive_during_window() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();

    let snapshot = {
        let client = client.clone();
        let base = base.clone();
        tokio::spawn(async move { client.get(format!("{}/", base)).send().await.unwrap() })
    };

    // Wait for the window to open
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        let ping = client.get(format!("{}/ping", base)).send().await.unwrap();
        if ping.status() == reqwest::StatusCode::NOT_IMPLEMENTED {
            break;
        }
        assert!(Instant::now() < deadline, "window never opened");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let started = Instant::now();
    let posted = client
        .post(format!("{}/collect", base))
        .query(&[("instrument", "cabin")])
        .body(r#"{"temp":21}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(posted.status(), reqwest::StatusCode::OK);

    let health: serde_json::Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "busy");
    assert!(started.elapsed() < WINDOW, "requests were blocked by the window");

    let response = snapshot.await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, serde_json::json!({"cabin": {"temp": 21}}));
}
