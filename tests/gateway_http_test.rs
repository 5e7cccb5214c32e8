use banter::config::{BanterConfig, PersonaSpec, RoomConfig};
use tokio::time::{Duration, sleep};

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .expect("bind ephemeral")
        .local_addr()
        .expect("local addr")
        .port()
}

fn loopback_config(port: u16) -> BanterConfig {
    let mut config = BanterConfig::default();
    config.gateway.bind = "127.0.0.1".to_string();
    config.gateway.port = port;
    config.memory.path = Some(
        std::env::temp_dir()
            .join(format!("banter-gateway-test-{port}"))
            .display()
            .to_string(),
    );
    config.rooms.push(RoomConfig {
        id: "lounge".into(),
        name: "The Lounge".into(),
        description: "test room".into(),
        members: vec!["nova".into()],
    });
    config.personas.push(PersonaSpec {
        id: Some("nova".into()),
        name: Some("Nova".into()),
        personality: Some("cheerful test persona".into()),
        fallback_lines: vec!["fallback line for tests".into()],
        ..Default::default()
    });
    config
}

async fn wait_for_health(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{port}/health");

    for _ in 0..80 {
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        sleep(Duration::from_millis(50)).await;
    }

    panic!("gateway did not become healthy at {url}");
}

#[tokio::test]
async fn run_rejects_non_loopback_without_token() {
    let mut config = loopback_config(free_port());
    config.gateway.bind = "0.0.0.0".to_string();

    let err = banter::gateway::run(config, None)
        .await
        .expect_err("non-loopback run without token must fail");
    assert!(err.to_string().contains("Auth token required"));
}

#[tokio::test]
async fn health_and_room_listing() {
    let port = free_port();
    let config = loopback_config(port);
    tokio::spawn(async move {
        let _ = banter::gateway::run(config, None).await;
    });
    wait_for_health(port).await;

    let rooms: serde_json::Value =
        reqwest::get(format!("http://127.0.0.1:{port}/api/rooms"))
            .await
            .expect("rooms response")
            .json()
            .await
            .expect("rooms json");
    assert_eq!(rooms[0]["id"], "lounge");
    assert_eq!(rooms[0]["members"][0], "nova");
}

#[tokio::test]
async fn token_guards_api_but_not_health() {
    let port = free_port();
    let config = loopback_config(port);
    tokio::spawn(async move {
        let _ = banter::gateway::run(config, Some("sekrit".into())).await;
    });
    wait_for_health(port).await;

    let client = reqwest::Client::new();
    let base = format!("http://127.0.0.1:{port}");

    let denied = client
        .get(format!("{base}/api/rooms"))
        .send()
        .await
        .expect("response");
    assert_eq!(denied.status(), reqwest::StatusCode::UNAUTHORIZED);

    let wrong = client
        .get(format!("{base}/api/rooms"))
        .bearer_auth("guess")
        .send()
        .await
        .expect("response");
    assert_eq!(wrong.status(), reqwest::StatusCode::UNAUTHORIZED);

    let allowed = client
        .get(format!("{base}/api/rooms"))
        .bearer_auth("sekrit")
        .send()
        .await
        .expect("response");
    assert_eq!(allowed.status(), reqwest::StatusCode::OK);
}

#[tokio::test]
async fn post_message_lands_in_history() {
    let port = free_port();
    let config = loopback_config(port);
    tokio::spawn(async move {
        let _ = banter::gateway::run(config, None).await;
    });
    wait_for_health(port).await;

    let client = reqwest::Client::new();
    let base = format!("http://127.0.0.1:{port}");

    let posted: serde_json::Value = client
        .post(format!("{base}/api/rooms/lounge/messages"))
        .json(&serde_json::json!({ "username": "alex", "content": "hello room" }))
        .send()
        .await
        .expect("post response")
        .json()
        .await
        .expect("post json");
    assert_eq!(posted["success"], true);
    let message_id = posted["message_id"].as_str().expect("message id");

    let messages: serde_json::Value = client
        .get(format!("{base}/api/rooms/lounge/messages"))
        .send()
        .await
        .expect("messages response")
        .json()
        .await
        .expect("messages json");
    let found = messages
        .as_array()
        .expect("array")
        .iter()
        .any(|m| m["id"] == message_id && m["author"] == "alex");
    assert!(found, "posted message appears in history");
}

#[tokio::test]
async fn post_message_validates_input() {
    let port = free_port();
    let config = loopback_config(port);
    tokio::spawn(async move {
        let _ = banter::gateway::run(config, None).await;
    });
    wait_for_health(port).await;

    let client = reqwest::Client::new();
    let base = format!("http://127.0.0.1:{port}");

    let empty = client
        .post(format!("{base}/api/rooms/lounge/messages"))
        .json(&serde_json::json!({ "username": "alex", "content": "  " }))
        .send()
        .await
        .expect("response");
    assert_eq!(empty.status(), reqwest::StatusCode::BAD_REQUEST);

    let missing_room = client
        .post(format!("{base}/api/rooms/nowhere/messages"))
        .json(&serde_json::json!({ "username": "alex", "content": "hi" }))
        .send()
        .await
        .expect("response");
    assert_eq!(missing_room.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn persona_lifecycle_over_http() {
    let port = free_port();
    let config = loopback_config(port);
    tokio::spawn(async move {
        let _ = banter::gateway::run(config, None).await;
    });
    wait_for_health(port).await;

    let client = reqwest::Client::new();
    let base = format!("http://127.0.0.1:{port}");

    // Missing required fields rejected.
    let bad = client
        .post(format!("{base}/api/personas"))
        .json(&serde_json::json!({ "room_id": "lounge", "name": "NoSoul" }))
        .send()
        .await
        .expect("response");
    assert_eq!(bad.status(), reqwest::StatusCode::BAD_REQUEST);

    // Create a persona; it announces itself in the room.
    let created = client
        .post(format!("{base}/api/personas"))
        .json(&serde_json::json!({
            "room_id": "lounge",
            "name": "Pixel",
            "personality": "playful artist",
        }))
        .send()
        .await
        .expect("response");
    assert_eq!(created.status(), reqwest::StatusCode::CREATED);
    let persona: serde_json::Value = created.json().await.expect("persona json");
    assert_eq!(persona["id"], "pixel");
    assert_eq!(persona["avatar"], "🤖");

    // Duplicates conflict.
    let duplicate = client
        .post(format!("{base}/api/personas"))
        .json(&serde_json::json!({
            "room_id": "lounge",
            "name": "Pixel",
            "personality": "playful artist",
        }))
        .send()
        .await
        .expect("response");
    assert_eq!(duplicate.status(), reqwest::StatusCode::CONFLICT);

    let personas: serde_json::Value = client
        .get(format!("{base}/api/rooms/lounge/personas"))
        .send()
        .await
        .expect("response")
        .json()
        .await
        .expect("personas json");
    assert_eq!(personas.as_array().expect("array").len(), 2);

    // Deleting removes the member; a second delete is a 404.
    let deleted = client
        .delete(format!("{base}/api/personas/lounge/pixel"))
        .send()
        .await
        .expect("response");
    assert_eq!(deleted.status(), reqwest::StatusCode::OK);

    let gone = client
        .delete(format!("{base}/api/personas/lounge/pixel"))
        .send()
        .await
        .expect("response");
    assert_eq!(gone.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn debug_stats_and_cache_clear() {
    let port = free_port();
    let config = loopback_config(port);
    tokio::spawn(async move {
        let _ = banter::gateway::run(config, None).await;
    });
    wait_for_health(port).await;

    let client = reqwest::Client::new();
    let base = format!("http://127.0.0.1:{port}");

    let stats: serde_json::Value = client
        .get(format!("{base}/api/debug/stats"))
        .send()
        .await
        .expect("response")
        .json()
        .await
        .expect("stats json");
    assert_eq!(stats["rooms"], 1);
    assert_eq!(stats["provider_available"], false);
    assert_eq!(stats["stats"]["total_requests"], 0);

    let agents: serde_json::Value = client
        .get(format!("{base}/api/debug/agents"))
        .send()
        .await
        .expect("response")
        .json()
        .await
        .expect("agents json");
    assert_eq!(agents[0]["room"], "lounge");
    assert_eq!(agents[0]["agents"][0]["id"], "nova");
    assert!(agents[0]["agents"][0]["last_response"].is_null());

    let cleared: serde_json::Value = client
        .post(format!("{base}/api/debug/clear-cache"))
        .send()
        .await
        .expect("response")
        .json()
        .await
        .expect("clear json");
    assert_eq!(cleared["success"], true);
}
