use axum::{
    Json, Router, middleware,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::auth;
use crate::cache::ResponseCache;
use crate::config::{BanterConfig, PersonaSpec};
use crate::delivery::DeliveryQueue;
use crate::memory::MemoryStore;
use crate::orchestrator::pipeline::ResponseResolver;
use crate::orchestrator::{Orchestrator, ThreadRandom};
use crate::persona::Persona;
use crate::provider::lane::ProviderLane;
use crate::room::RoomRegistry;
use crate::types::ChatMessage;

/// How often the gateway logs a stats snapshot.
const STATS_LOG_INTERVAL: Duration = Duration::from_secs(300);

pub struct AppState {
    pub token: Option<String>,
    pub rooms: Arc<RwLock<RoomRegistry>>,
    pub orchestrator: Arc<Orchestrator>,
    pub cache: Arc<ResponseCache>,
    pub memory: Arc<MemoryStore>,
    pub provider_available: bool,
    pub started: Instant,
}

pub async fn run(config: BanterConfig, token: Option<String>) -> anyhow::Result<()> {
    let is_loopback = config.gateway.bind == "127.0.0.1" || config.gateway.bind == "::1";

    if !is_loopback && token.is_none() {
        anyhow::bail!(
            "Auth token required when binding to non-loopback address. \
             Set --token or BANTER_TOKEN env var."
        );
    }

    let rooms = Arc::new(RwLock::new(RoomRegistry::from_config(&config)));
    {
        let rooms = rooms.read().await;
        info!(rooms = rooms.count(), "rooms configured");
    }

    let memory = Arc::new(MemoryStore::new(config.memory.resolved_path()));

    let cache = Arc::new(ResponseCache::with_ttl(Duration::from_secs(
        config.cache.ttl_secs,
    )));
    cache.spawn_sweeper(Duration::from_secs(config.cache.sweep_interval_secs));

    let provider = crate::provider::from_config(&config.provider)?;
    let provider_available = provider.is_available();
    if !provider_available {
        warn!(
            provider = %config.provider.kind,
            "no API key configured, agents will use fallback lines"
        );
    }
    let lane = ProviderLane::spawn(
        provider,
        Duration::from_millis(config.provider.min_request_interval_ms),
    );

    let delivery = DeliveryQueue::spawn(Arc::clone(&rooms));
    let resolver = ResponseResolver::new(lane, Arc::clone(&cache));
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&rooms),
        Arc::clone(&memory),
        resolver,
        delivery,
        Box::new(ThreadRandom),
    ));

    let addr = format!("{}:{}", config.gateway.bind, config.gateway.port);

    let state = Arc::new(AppState {
        token,
        rooms,
        orchestrator,
        cache,
        memory,
        provider_available,
        started: Instant::now(),
    });

    spawn_stats_logger(Arc::clone(&state));

    let api = Router::new()
        .route("/api/rooms", get(list_rooms))
        .route("/api/rooms/{room_id}/messages", get(room_messages))
        .route("/api/rooms/{room_id}/messages", post(post_message))
        .route("/api/rooms/{room_id}/personas", get(room_personas))
        .route("/api/rooms/{room_id}/agents", get(room_personas))
        .route("/api/personas", post(create_persona))
        .route("/api/personas/{room_id}/{persona_id}", delete(delete_persona))
        .route("/api/debug/stats", get(debug_stats))
        .route("/api/debug/agents", get(debug_agents))
        .route("/api/debug/clear-cache", post(clear_cache))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_token,
        ));

    let app = Router::new()
        .route("/health", get(health))
        .merge(api)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("banter gateway listening on {addr}");
    if is_loopback {
        info!("bound to loopback — local access only");
    } else {
        warn!("bound to {addr} — ensure auth token is set");
    }

    axum::serve(listener, app).await?;
    Ok(())
}

fn spawn_stats_logger(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(STATS_LOG_INTERVAL);
        ticker.tick().await; // first tick completes immediately
        loop {
            ticker.tick().await;
            let stats = state.orchestrator.resolver().stats();
            info!(
                requests = stats.total_requests,
                cache_hits = stats.cache_hits,
                errors = stats.errors,
                avg_ms = stats.average_response_time_ms as u64,
                hit_rate = stats.cache_hit_rate(),
                "gateway stats"
            );
        }
    });
}

async fn health() -> &'static str {
    "ok"
}

async fn list_rooms(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let rooms = state.rooms.read().await;
    Json(rooms.summaries())
}

async fn room_messages(
    Path(room_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ChatMessage>>, (StatusCode, Json<serde_json::Value>)> {
    let rooms = state.rooms.read().await;
    let room = rooms.get(&room_id).ok_or_else(|| unknown_room(&room_id))?;
    Ok(Json(room.page().to_vec()))
}

#[derive(Debug, Deserialize)]
struct PostMessageRequest {
    #[serde(default)]
    user_id: Option<String>,
    username: String,
    content: String,
}

/// Accept a human message: append it to history, then kick off an
/// orchestration pass in the background. The HTTP response returns as soon as
/// the message lands; agent responses arrive later via delivery.
async fn post_message(
    Path(room_id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<PostMessageRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    if request.username.trim().is_empty() || request.content.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "username and content are required" })),
        ));
    }

    let message = ChatMessage::human(&request.username, request.content.clone());
    let message_id = message.id.clone();

    {
        let mut rooms = state.rooms.write().await;
        let room = rooms
            .get_mut(&room_id)
            .ok_or_else(|| unknown_room(&room_id))?;
        room.append(message);
    }

    let orchestrator = Arc::clone(&state.orchestrator);
    let user_id = request.user_id.unwrap_or_else(|| request.username.clone());
    tokio::spawn(async move {
        orchestrator
            .handle_human_message(&room_id, &user_id, &request.username, &request.content)
            .await;
    });

    Ok(Json(serde_json::json!({
        "success": true,
        "message_id": message_id,
    })))
}

async fn room_personas(
    Path(room_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Persona>>, (StatusCode, Json<serde_json::Value>)> {
    let rooms = state.rooms.read().await;
    let room = rooms.get(&room_id).ok_or_else(|| unknown_room(&room_id))?;
    Ok(Json(room.personas().cloned().collect()))
}

#[derive(Debug, Deserialize)]
struct CreatePersonaRequest {
    room_id: String,
    #[serde(flatten)]
    spec: PersonaSpec,
}

/// Add a persona to a room at runtime. The new member announces itself with a
/// welcome message and participates in selection from the next human message.
async fn create_persona(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreatePersonaRequest>,
) -> Result<(StatusCode, Json<Persona>), (StatusCode, Json<serde_json::Value>)> {
    let persona = Persona::from_spec(request.spec).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
    })?;

    let mut rooms = state.rooms.write().await;
    let room = rooms
        .get_mut(&request.room_id)
        .ok_or_else(|| unknown_room(&request.room_id))?;

    if room.has_persona(&persona.id) {
        return Err((
            StatusCode::CONFLICT,
            Json(serde_json::json!({
                "error": format!("persona '{}' already in room", persona.id),
            })),
        ));
    }

    info!(room = %request.room_id, persona = %persona.id, "persona created");
    room.append(ChatMessage::agent(&persona.id, persona.welcome_line()));
    room.add_persona(persona.clone());

    Ok((StatusCode::CREATED, Json(persona)))
}

async fn delete_persona(
    Path((room_id, persona_id)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let removed = {
        let mut rooms = state.rooms.write().await;
        let room = rooms
            .get_mut(&room_id)
            .ok_or_else(|| unknown_room(&room_id))?;
        room.remove_persona(&persona_id)
    };

    match removed {
        Some(persona) => {
            // The persona's accumulated memory goes with it.
            state.memory.delete(&room_id, &persona.id);
            info!(room = %room_id, persona = %persona.id, "persona removed");
            Ok(Json(serde_json::json!({ "success": true })))
        }
        None => Err((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": format!("persona '{persona_id}' not in room '{room_id}'"),
            })),
        )),
    }
}

async fn debug_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.orchestrator.resolver().stats();
    let rooms = state.rooms.read().await;
    Json(serde_json::json!({
        "uptime_secs": state.started.elapsed().as_secs(),
        "rooms": rooms.count(),
        "provider_available": state.provider_available,
        "cache_entries": state.cache.len(),
        "cache_hit_rate": stats.cache_hit_rate(),
        "stats": stats,
    }))
}

/// Per-agent selection state across every room, for poking at why an agent
/// did or didn't respond.
async fn debug_agents(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let rooms = state.rooms.read().await;
    let listing: Vec<serde_json::Value> = rooms
        .summaries()
        .iter()
        .filter_map(|summary| rooms.get(&summary.id))
        .map(|room| {
            let agents: Vec<serde_json::Value> = room
                .personas()
                .map(|p| {
                    serde_json::json!({
                        "id": p.id,
                        "name": p.name,
                        "response_probability": p.behavior.response_probability,
                        "cooldown_ms": p.behavior.recent_response_cooldown_ms,
                        "last_response": room.last_response(&p.id),
                    })
                })
                .collect();
            serde_json::json!({ "room": room.id, "agents": agents })
        })
        .collect();
    Json(listing)
}

async fn clear_cache(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let entries = state.cache.len();
    state.cache.clear();
    info!(entries, "response cache cleared");
    Json(serde_json::json!({ "success": true, "cleared": entries }))
}

fn unknown_room(room_id: &str) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": format!("unknown room '{room_id}'") })),
    )
}
