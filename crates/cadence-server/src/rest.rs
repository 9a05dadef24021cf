use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderValue, Method, StatusCode},
    middleware,
    routing::{delete, get, patch, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use cadence_core::*;

use crate::auth::{auth_middleware_with_state, require_identity, AuthContext};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    create_router_with_cors(state, &[])
}

pub fn create_router_with_cors(state: Arc<AppState>, cors_allowed_origins: &[String]) -> Router {
    let router = Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/users", post(register_user))
        .route("/api/v1/habits", post(create_habit))
        .route("/api/v1/habits/latest", get(latest_habits))
        .route("/api/v1/habits/public", get(public_habits))
        .route("/api/v1/habits/mine", get(my_habits))
        .route("/api/v1/habits/:id", get(get_habit))
        .route("/api/v1/habits/:id", patch(update_habit))
        .route("/api/v1/habits/:id", delete(delete_habit))
        .route("/api/v1/habits/:id/complete", post(complete_habit))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware_with_state,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if cors_allowed_origins.is_empty() {
        router
    } else {
        router.layer(build_cors_layer(cors_allowed_origins))
    }
}

fn build_cors_layer(cors_allowed_origins: &[String]) -> CorsLayer {
    let mut parsed = Vec::new();
    for origin in cors_allowed_origins {
        match HeaderValue::from_str(origin) {
            Ok(value) => parsed.push(value),
            Err(err) => tracing::warn!("ignoring invalid CORS origin '{origin}': {err}"),
        }
    }

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
        .allow_origin(parsed)
}

// --- DTOs ---

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Deserialize)]
struct PublicQuery {
    search: Option<String>,
    /// Comma-separated category list.
    categories: Option<String>,
}

fn map_cadence_error(err: CadenceError) -> (StatusCode, String) {
    match err {
        CadenceError::HabitNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        CadenceError::Forbidden(_) => (StatusCode::FORBIDDEN, err.to_string()),
        CadenceError::InvalidCredential(_) => (StatusCode::UNAUTHORIZED, err.to_string()),
        CadenceError::InvalidInput(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        CadenceError::Conflict(_) => (StatusCode::CONFLICT, err.to_string()),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

// --- Handlers ---

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

async fn register_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterUser>,
) -> Result<(StatusCode, Json<RegistrationOutcome>), (StatusCode, String)> {
    let outcome = state
        .engine
        .register_user(req)
        .await
        .map_err(map_cadence_error)?;
    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome)))
}

async fn create_habit(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewHabit>,
) -> Result<(StatusCode, Json<HabitWithStreak>), (StatusCode, String)> {
    let caller = require_identity(&auth)?;
    let habit = state
        .engine
        .create_habit(caller, req)
        .await
        .map_err(map_cadence_error)?;
    Ok((StatusCode::CREATED, Json(habit)))
}

async fn latest_habits(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<HabitWithStreak>>, (StatusCode, String)> {
    let habits = state
        .engine
        .latest_habits()
        .await
        .map_err(map_cadence_error)?;
    Ok(Json(habits))
}

async fn public_habits(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PublicQuery>,
) -> Result<Json<Vec<HabitWithStreak>>, (StatusCode, String)> {
    let categories = query.categories.map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>()
    });
    let habits = state
        .engine
        .public_habits(query.search, categories)
        .await
        .map_err(map_cadence_error)?;
    Ok(Json(habits))
}

async fn my_habits(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<HabitWithStreak>>, (StatusCode, String)> {
    let caller = require_identity(&auth)?;
    let habits = state
        .engine
        .my_habits(caller)
        .await
        .map_err(map_cadence_error)?;
    Ok(Json(habits))
}

async fn get_habit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<HabitWithStreak>, (StatusCode, String)> {
    let habit = state.engine.get_habit(id).await.map_err(map_cadence_error)?;
    Ok(Json(habit))
}

async fn update_habit(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(patch): Json<HabitPatch>,
) -> Result<Json<HabitWithStreak>, (StatusCode, String)> {
    let caller = require_identity(&auth)?;
    let habit = state
        .engine
        .update_habit(caller, id, patch)
        .await
        .map_err(map_cadence_error)?;
    Ok(Json(habit))
}

async fn delete_habit(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    let caller = require_identity(&auth)?;
    state
        .engine
        .delete_habit(caller, id)
        .await
        .map_err(map_cadence_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn complete_habit(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CompletionOutcome>, (StatusCode, String)> {
    let caller = require_identity(&auth)?;
    let outcome = state
        .engine
        .complete_habit(caller, id)
        .await
        .map_err(map_cadence_error)?;
    Ok(Json(outcome))
}
