use crate::actions::{self, ActionRequest, ActionResponse, ActionSpec};
use crate::config::{AppConfig, DrawConfig, MapConfig, PopupConfig};
use crate::error::ActionError;
use crate::store::{DrawEvent, Session, SessionEvent};
use crate::types::{FlyTo, ViewState};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{info, warn};

/// One page session. Writers hold the lock exclusively, so draw events and
/// actions are applied one at a time in arrival order.
pub struct AppState {
    pub session: RwLock<Session>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            session: RwLock::new(Session::new(&config)),
            config,
        }
    }
}

#[derive(Serialize)]
struct ClientConfig<'a> {
    map: &'a MapConfig,
    draw: &'a DrawConfig,
    popup: &'a PopupConfig,
    background_color: String,
}

#[derive(Serialize)]
struct ViewResponse {
    view: ViewState,
    ready: bool,
    last_flight: Option<FlyTo>,
}

#[derive(Serialize)]
struct StateResponse {
    background_color: String,
    feature_count: usize,
}

#[derive(Serialize)]
struct DrawResponse {
    applied: usize,
    feature_count: usize,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct ListParams {
    all: bool,
}

pub enum ApiError {
    Action(ActionError),
    BadRequest(String),
}

impl From<ActionError> for ApiError {
    fn from(e: ActionError) -> Self {
        Self::Action(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Action(e) => {
                let status = match &e {
                    ActionError::UnknownAction(_) => StatusCode::NOT_FOUND,
                    ActionError::InvalidArguments { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                    ActionError::NotAvailable(_) => StatusCode::FORBIDDEN,
                };
                (status, e.to_string())
            }
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
        };
        warn!("Action rejected: {}", message);
        (
            status,
            Json(json!({
                "status": "error",
                "error": message,
            })),
        )
            .into_response()
    }
}

/// An empty body is a call with no arguments from the user. Anything else
/// must be a well-formed request.
fn parse_action_request(body: &[u8]) -> Result<ActionRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ActionRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("Invalid action request: {}", e)))
}

pub fn router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/api/config", get(config_handler))
        .route("/api/draw/create", post(draw_create_handler))
        .route("/api/draw/update", post(draw_update_handler))
        .route("/api/draw/delete", post(draw_delete_handler))
        .route("/api/features", get(features_handler))
        .route("/api/view", get(view_handler))
        .route("/api/map/ready", post(map_ready_handler))
        .route("/api/state", get(state_handler))
        .route("/api/actions", get(list_actions_handler))
        .route("/api/actions/:name", post(invoke_action_handler));

    if let Some(dir) = &state.config.server.static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(CorsLayer::permissive()).with_state(state)
}

pub async fn start_server(config: AppConfig) -> Result<()> {
    let port = config.server.port;
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let state = Arc::new(AppState::new(config));
    let app = router(state);

    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

async fn config_handler(State(state): State<Arc<AppState>>) -> Response {
    let background_color = state.session.read().await.background_color.clone();
    Json(ClientConfig {
        map: &state.config.map,
        draw: &state.config.draw,
        popup: &state.config.popup,
        background_color,
    })
    .into_response()
}

async fn apply_draw(state: &AppState, event: SessionEvent, applied: usize) -> Json<DrawResponse> {
    let mut session = state.session.write().await;
    session.apply(event);
    Json(DrawResponse {
        applied,
        feature_count: session.features.len(),
    })
}

async fn draw_create_handler(
    State(state): State<Arc<AppState>>,
    Json(event): Json<DrawEvent>,
) -> Json<DrawResponse> {
    let features = event.into_features();
    let applied = features.len();
    apply_draw(&state, SessionEvent::DrawCreate(features), applied).await
}

async fn draw_update_handler(
    State(state): State<Arc<AppState>>,
    Json(event): Json<DrawEvent>,
) -> Json<DrawResponse> {
    let features = event.into_features();
    let applied = features.len();
    apply_draw(&state, SessionEvent::DrawUpdate(features), applied).await
}

async fn draw_delete_handler(
    State(state): State<Arc<AppState>>,
    Json(event): Json<DrawEvent>,
) -> Json<DrawResponse> {
    let ids = event.into_ids();
    let applied = ids.len();
    apply_draw(&state, SessionEvent::DrawDelete(ids), applied).await
}

async fn features_handler(State(state): State<Arc<AppState>>) -> Json<geojson::FeatureCollection> {
    Json(state.session.read().await.features.to_feature_collection())
}

async fn view_handler(State(state): State<Arc<AppState>>) -> Json<ViewResponse> {
    let session = state.session.read().await;
    Json(ViewResponse {
        view: session.map.view_state(),
        ready: session.map.is_ready(),
        last_flight: session.map.last_flight(),
    })
}

async fn map_ready_handler(State(state): State<Arc<AppState>>) -> Json<ViewResponse> {
    let mut session = state.session.write().await;
    session.apply(SessionEvent::MapReady);
    Json(ViewResponse {
        view: session.map.view_state(),
        ready: session.map.is_ready(),
        last_flight: session.map.last_flight(),
    })
}

async fn state_handler(State(state): State<Arc<AppState>>) -> Json<StateResponse> {
    let session = state.session.read().await;
    Json(StateResponse {
        background_color: session.background_color.clone(),
        feature_count: session.features.len(),
    })
}

async fn list_actions_handler(Query(params): Query<ListParams>) -> Json<Vec<&'static ActionSpec>> {
    if params.all {
        Json(actions::ACTIONS.iter().collect())
    } else {
        Json(actions::user_facing().collect())
    }
}

async fn invoke_action_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<ActionResponse>, ApiError> {
    let request = parse_action_request(&body)?;
    let mut session = state.session.write().await;
    let response = actions::dispatch(&mut session, &name, &request)?;
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    fn app() -> Router {
        let mut config = AppConfig::default();
        config.server.static_dir = None;
        router(Arc::new(AppState::new(config)))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn square_feature(id: &str, west: f64) -> Value {
        json!({
            "type": "Feature",
            "id": id,
            "properties": {},
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[west, 0.0], [west + 1.0, 0.0], [west + 1.0, 1.0], [west, 1.0], [west, 0.0]]]
            }
        })
    }

    #[tokio::test]
    async fn draw_events_update_the_feature_store() {
        let app = app();

        let (status, body) = call(
            &app,
            "POST",
            "/api/draw/create",
            Some(json!({ "features": [square_feature("a", 0.0), square_feature("b", 5.0)] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["feature_count"], json!(2));

        call(
            &app,
            "POST",
            "/api/draw/update",
            Some(json!({ "features": [square_feature("a", 10.0)] })),
        )
        .await;
        let (_, body) = call(
            &app,
            "POST",
            "/api/draw/delete",
            Some(json!({ "features": [square_feature("b", 5.0), square_feature("missing", 0.0)] })),
        )
        .await;
        assert_eq!(body["feature_count"], json!(1));

        let (_, collection) = call(&app, "GET", "/api/features", None).await;
        let features = collection["features"].as_array().unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0]["id"], json!("a"));
        assert_eq!(features[0]["geometry"]["coordinates"][0][0], json!([10.0, 0.0]));
    }

    #[tokio::test]
    async fn validate_feature_sees_prior_draw_events() {
        let app = app();
        call(
            &app,
            "POST",
            "/api/draw/create",
            Some(json!({ "features": [square_feature("a", 0.0)] })),
        )
        .await;

        let (status, body) = call(&app, "POST", "/api/actions/validateFeature", None).await;
        assert_eq!(status, StatusCode::OK);
        let km2 = body["result"]["total_square_kilometers"].as_f64().unwrap();
        assert!(km2 > 12_380.0 && km2 < 12_400.0);
        assert!(body["rendered"].as_str().unwrap().starts_with("<p>"));
    }

    #[tokio::test]
    async fn fly_to_waits_for_map_ready() {
        let app = app();
        let args = json!({ "args": { "longitude": 13.4, "latitude": 52.5 } });

        call(&app, "POST", "/api/actions/flyToLocation", Some(args.clone())).await;
        let (_, view) = call(&app, "GET", "/api/view", None).await;
        assert_eq!(view["ready"], json!(false));
        assert_eq!(view["last_flight"], Value::Null);
        assert_eq!(view["view"]["latitude"], json!(37.7751));

        call(&app, "POST", "/api/map/ready", None).await;
        call(&app, "POST", "/api/actions/flyToLocation", Some(args)).await;
        let (_, view) = call(&app, "GET", "/api/view", None).await;
        assert_eq!(view["last_flight"]["duration_ms"], json!(2000));
        assert_eq!(view["view"]["latitude"], json!(52.5));
    }

    #[tokio::test]
    async fn action_listing_hides_disabled_actions() {
        let app = app();

        let (_, listed) = call(&app, "GET", "/api/actions", None).await;
        let names: Vec<&str> = listed
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["name"].as_str().unwrap())
            .collect();
        assert!(!names.contains(&"greet_user"));
        assert_eq!(listed[1]["parameters"][0]["type"], json!("number"));

        let (_, all) = call(&app, "GET", "/api/actions?all=true", None).await;
        assert_eq!(all.as_array().unwrap().len(), 4);
        assert_eq!(all[0]["available"], json!("disabled"));
    }

    #[tokio::test]
    async fn action_errors_map_to_status_codes() {
        let app = app();

        let (status, body) = call(&app, "POST", "/api/actions/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], json!("error"));

        let (status, _) = call(
            &app,
            "POST",
            "/api/actions/greet_user",
            Some(json!({ "args": { "name": "Ada" } })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = call(
            &app,
            "POST",
            "/api/actions/greet_user",
            Some(json!({ "args": { "name": "Ada" }, "invoker": "assistant", "status": "inProgress" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("inProgress"));

        let (status, _) = call(
            &app,
            "POST",
            "/api/actions/setBackgroundColor",
            Some(json!({ "args": {} })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    async fn call_raw(app: &Router, uri: &str, body: &'static str) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::from(body))
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn assistant_call_without_content_type_is_honoured() {
        let app = app();
        let (status, body) = call_raw(
            &app,
            "/api/actions/greet_user",
            r#"{ "args": { "name": "Ada" }, "invoker": "assistant" }"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["action"], json!("greet_user"));
    }

    #[tokio::test]
    async fn malformed_action_bodies_are_bad_requests() {
        let app = app();

        let (status, body) = call_raw(&app, "/api/actions/validateFeature", r#"{ "args": {"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], json!("error"));

        let (status, _) = call_raw(
            &app,
            "/api/actions/validateFeature",
            r#"{ "status": 42 }"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call_raw(
            &app,
            "/api/actions/greet_user",
            r#"{ "invoker": "root" }"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn empty_action_body_is_a_user_call_without_arguments() {
        let app = app();
        let (status, _) = call_raw(&app, "/api/actions/validateFeature", "").await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call_raw(&app, "/api/actions/greet_user", "  ").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn background_color_action_is_visible_in_state_and_config() {
        let app = app();
        let (_, state) = call(&app, "GET", "/api/state", None).await;
        assert_eq!(state["background_color"], json!("#ADD8E6"));

        call(
            &app,
            "POST",
            "/api/actions/setBackgroundColor",
            Some(json!({ "args": { "backgroundColor": "#98FB98" } })),
        )
        .await;

        let (_, config) = call(&app, "GET", "/api/config", None).await;
        assert_eq!(config["background_color"], json!("#98FB98"));
        assert_eq!(config["draw"]["controls"]["polygon"], json!(true));
        assert_eq!(config["map"]["access_token"], json!(""));
    }
}
