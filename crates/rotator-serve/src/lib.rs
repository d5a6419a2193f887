use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tower_http::cors::CorsLayer;

use rotator_core::probe::ProbeReport;
use rotator_core::schedule::Recurrence;
use rotator_core::{AvatarCandidate, RotatorError};
use rotator_session::{ApplyOutcome, DashboardView, LoopHandle, Slot};
use rotator_store::RotatorConfig;

const DASHBOARD_HTML: &str = include_str!("../assets/dashboard.html");
const MAX_UPCOMING: usize = 20;

// ── Config ──

pub struct ServeConfig {
    pub bind: String,
    pub port: u16,
    /// Where `POST /api/schedule` persists the new expression. `None`
    /// keeps schedule changes in memory only.
    pub config_path: Option<PathBuf>,
}

// ── App State ──

struct AppState {
    session: LoopHandle,
    config_path: Option<PathBuf>,
}

impl AppState {
    fn persist_schedule(&self, expr: &str) -> anyhow::Result<()> {
        let Some(path) = &self.config_path else {
            return Ok(());
        };
        let mut config = RotatorConfig::load(path)?;
        config.set("schedule", expr)?;
        config.save(path)?;
        tracing::info!(path = %path.display(), schedule = expr, "schedule saved");
        Ok(())
    }
}

// ── Error Handling ──

enum AppError {
    Rotator(RotatorError),
    BadRequest(String),
    Internal(anyhow::Error),
}

fn status_for(err: &RotatorError) -> StatusCode {
    match err {
        RotatorError::EmptyCatalog | RotatorError::NothingSelected => StatusCode::CONFLICT,
        RotatorError::UnknownAvatar(_) => StatusCode::NOT_FOUND,
        RotatorError::Auth(_) => StatusCode::UNAUTHORIZED,
        RotatorError::Fetch { .. } | RotatorError::Dispatch { .. } => StatusCode::BAD_GATEWAY,
        RotatorError::Schedule { .. } | RotatorError::Record(_) => StatusCode::BAD_REQUEST,
        RotatorError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            AppError::Rotator(err) => (status_for(&err), err.kind(), err.to_string()),
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, "bad_request", message),
            AppError::Internal(err) => {
                tracing::warn!("request failed: {err:#}");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal", err.to_string())
            }
        };
        let body = serde_json::json!({ "error": message, "kind": kind });
        (status, Json(body)).into_response()
    }
}

impl From<RotatorError> for AppError {
    fn from(err: RotatorError) -> Self {
        AppError::Rotator(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

// ── Entrypoint ──

pub async fn serve(session: LoopHandle, config: ServeConfig) -> anyhow::Result<()> {
    // Initial load, as a page open would do.
    session.refresh(Vec::new(), false).await?;

    let app = router(session, config.config_path);
    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    eprintln!("rotator dashboard listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the router (for testing without binding to a port).
pub fn router(session: LoopHandle, config_path: Option<PathBuf>) -> Router {
    let state = Arc::new(AppState {
        session,
        config_path,
    });
    Router::new()
        .route("/", get(index))
        .route("/api/health", get(health))
        .route("/api/dashboard", get(get_dashboard))
        .route("/api/refresh", post(post_refresh))
        .route("/api/select", post(post_select))
        .route("/api/select/random", post(post_select_random))
        .route("/api/clear", post(post_clear))
        .route("/api/apply", post(post_apply))
        .route("/api/probe", post(post_probe))
        .route("/api/adopt", post(post_adopt))
        .route("/api/schedule", post(post_schedule))
        .route("/api/schedule/next", get(get_schedule_next))
        .route("/api/notices/{id}/dismiss", post(post_dismiss))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Pages ──

async fn index() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

// ── Dashboard ──

async fn get_dashboard(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DashboardView>, AppError> {
    Ok(Json(state.session.snapshot().await?))
}

#[derive(Deserialize, Default)]
struct RefreshRequest {
    #[serde(default)]
    slots: Vec<Slot>,
    #[serde(default)]
    wait: bool,
}

/// Decode a JSON body regardless of its content type, so malformed input
/// gets the same `{error, kind}` shape as every other failure.
fn parse_body<T: DeserializeOwned>(body: &Bytes, what: &str) -> Result<T, AppError> {
    serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("invalid {what} request: {e}")))
}

/// Body is optional; an empty body refreshes everything without waiting.
async fn post_refresh(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<DashboardView>, AppError> {
    let req: RefreshRequest = if body.iter().all(u8::is_ascii_whitespace) {
        RefreshRequest::default()
    } else {
        parse_body(&body, "refresh")?
    };
    Ok(Json(state.session.refresh(req.slots, req.wait).await?))
}

// ── Selection ──

#[derive(Deserialize)]
struct SelectRequest {
    name: String,
}

#[derive(Serialize)]
struct SelectedResponse {
    selected: AvatarCandidate,
}

async fn post_select(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<SelectedResponse>, AppError> {
    let req: SelectRequest = parse_body(&body, "select")?;
    let selected = state.session.select(&req.name).await?;
    Ok(Json(SelectedResponse { selected }))
}

async fn post_select_random(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SelectedResponse>, AppError> {
    let selected = state.session.select_random().await?;
    Ok(Json(SelectedResponse { selected }))
}

async fn post_adopt(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SelectedResponse>, AppError> {
    let selected = state.session.adopt_record().await?;
    Ok(Json(SelectedResponse { selected }))
}

async fn post_clear(State(state): State<Arc<AppState>>) -> Result<Json<DashboardView>, AppError> {
    Ok(Json(state.session.clear().await?))
}

// ── Apply / Probe ──

async fn post_apply(State(state): State<Arc<AppState>>) -> Result<Json<ApplyOutcome>, AppError> {
    Ok(Json(state.session.apply().await?))
}

async fn post_probe(State(state): State<Arc<AppState>>) -> Result<Json<ProbeReport>, AppError> {
    Ok(Json(state.session.probe().await?))
}

// ── Schedule ──

#[derive(Deserialize)]
struct ScheduleRequest {
    expr: String,
}

#[derive(Serialize)]
struct ScheduleResponse {
    schedule: String,
    next: Option<String>,
}

/// Validates, saves to config, then updates the session, so a failed save
/// leaves the running schedule untouched.
async fn post_schedule(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ScheduleResponse>, AppError> {
    let req: ScheduleRequest = parse_body(&body, "schedule")?;
    let recurrence = Recurrence::parse(&req.expr)?;
    state.persist_schedule(&recurrence.to_string())?;
    let (schedule, next) = state.session.set_schedule(&req.expr).await?;
    Ok(Json(ScheduleResponse {
        schedule,
        next: next.map(rfc3339),
    }))
}

#[derive(Deserialize)]
struct NextParams {
    expr: Option<String>,
    count: Option<usize>,
}

#[derive(Serialize)]
struct NextResponse {
    schedule: String,
    upcoming: Vec<String>,
}

/// Preview occurrences without changing anything. Defaults to the
/// session's current schedule.
async fn get_schedule_next(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NextParams>,
) -> Result<Json<NextResponse>, AppError> {
    let expr = match params.expr.filter(|e| !e.trim().is_empty()) {
        Some(expr) => expr,
        None => state.session.snapshot().await?.schedule,
    };
    let recurrence = Recurrence::parse(&expr)?;
    let count = params.count.unwrap_or(5).clamp(1, MAX_UPCOMING);
    let upcoming = recurrence
        .upcoming(OffsetDateTime::now_utc(), count)
        .into_iter()
        .map(rfc3339)
        .collect();
    Ok(Json(NextResponse {
        schedule: recurrence.to_string(),
        upcoming,
    }))
}

// ── Notices ──

async fn post_dismiss(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let dismissed = state.session.dismiss(id).await?;
    Ok(Json(serde_json::json!({ "dismissed": dismissed })))
}

fn rfc3339(t: OffsetDateTime) -> String {
    t.format(&Rfc3339).unwrap_or_else(|_| t.to_string())
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use rotator_core::fixture::FixtureGateway;
    use rotator_core::{ApplyMode, FileEntry};
    use rotator_session::{EventLoop, Session, SessionSettings};
    use tower::ServiceExt;

    fn gateway() -> FixtureGateway {
        FixtureGateway::new().with_listing(
            "avatars",
            vec![
                FileEntry::file("a.png", "https://raw/a.png"),
                FileEntry::file("notes.md", "https://raw/notes.md"),
            ],
        )
    }

    async fn app_with(
        gw: FixtureGateway,
        mode: ApplyMode,
        config_path: Option<PathBuf>,
    ) -> Router {
        let mut settings = SessionSettings::new("octo", "profile");
        settings.apply_mode = mode;
        let handle = EventLoop::spawn(Session::new(settings), Arc::new(gw));
        handle.refresh(vec![Slot::Catalog], true).await.unwrap();
        router(handle, config_path)
    }

    async fn app() -> Router {
        app_with(gateway(), ApplyMode::Record, None).await
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn post_body(uri: &str, body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::from(body))
            .unwrap()
    }

    fn post_empty(uri: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let resp = app().await.oneshot(get_req("/api/health")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["ok"], true);
    }

    #[tokio::test]
    async fn index_serves_page() {
        let resp = app().await.oneshot(get_req("/")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        assert!(String::from_utf8_lossy(&bytes).contains("/api/dashboard"));
    }

    #[tokio::test]
    async fn dashboard_lists_catalog() {
        let resp = app().await.oneshot(get_req("/api/dashboard")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["repository"], "octo/profile");
        assert_eq!(json["gallery"]["count"], 1);
        assert_eq!(json["gallery"]["items"][0]["name"], "a.png");
        assert_eq!(json["selection"]["state"], "unselected");
        assert_eq!(json["status"]["health"], "unknown");
    }

    #[tokio::test]
    async fn select_and_apply_record() {
        let app = app().await;
        let resp = app
            .clone()
            .oneshot(post_json("/api/select", serde_json::json!({"name": "a.png"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["selected"]["name"], "a.png");

        let resp = app.oneshot(post_empty("/api/apply")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["outcome"], "instructions");
        assert_eq!(json["record"]["avatarName"], "a.png");
        assert_eq!(json["record"]["mode"], "manual_input");
        assert!(json["instructions"]["document"]
            .as_str()
            .unwrap()
            .contains("\"avatarName\": \"a.png\""));
    }

    #[tokio::test]
    async fn error_statuses_follow_kind() {
        let app = app().await;

        let resp = app.clone().oneshot(post_empty("/api/apply")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(resp).await["kind"], "nothing_selected");

        let resp = app
            .clone()
            .oneshot(post_json("/api/select", serde_json::json!({"name": "notes.md"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(resp).await["kind"], "unknown_avatar");

        let resp = app
            .oneshot(post_json("/api/schedule", serde_json::json!({"expr": "0 0 * *"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["kind"], "schedule_error");
    }

    #[tokio::test]
    async fn random_on_empty_catalog_conflicts() {
        let app = app_with(FixtureGateway::new(), ApplyMode::Record, None).await;
        let resp = app.oneshot(post_empty("/api/select/random")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(resp).await["kind"], "empty_catalog");
    }

    #[tokio::test]
    async fn rejected_dispatch_is_bad_gateway() {
        let gw = gateway().with_dispatch_status(500);
        let app = app_with(gw, ApplyMode::Dispatch, None).await;
        app.clone()
            .oneshot(post_empty("/api/select/random"))
            .await
            .unwrap();
        let resp = app.oneshot(post_empty("/api/apply")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(resp).await;
        assert_eq!(json["kind"], "dispatch_error");
        assert!(json["error"].as_str().unwrap().contains("HTTP 500"));
    }

    #[tokio::test]
    async fn schedule_is_persisted() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(".rotator").join("config.json");
        let app = app_with(gateway(), ApplyMode::Record, Some(path.clone())).await;

        let resp = app
            .clone()
            .oneshot(post_json("/api/schedule", serde_json::json!({"expr": "0 6 * * MON"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["schedule"], "0 6 * * MON");
        assert!(json["next"].as_str().is_some());
        assert_eq!(RotatorConfig::load(&path).unwrap().schedule, "0 6 * * MON");

        let resp = app
            .oneshot(get_req("/api/schedule/next?count=3"))
            .await
            .unwrap();
        let json = body_json(resp).await;
        assert_eq!(json["schedule"], "0 6 * * MON");
        assert_eq!(json["upcoming"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn refresh_accepts_empty_and_json_bodies() {
        let app = app().await;
        let resp = app.clone().oneshot(post_empty("/api/refresh")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app
            .oneshot(post_json(
                "/api/refresh",
                serde_json::json!({"slots": ["catalog"], "wait": true}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["gallery"]["count"], 1);
    }

    #[tokio::test]
    async fn malformed_bodies_are_json_bad_requests() {
        let app = app().await;

        let resp = app
            .clone()
            .oneshot(post_json("/api/select", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp).await;
        assert_eq!(json["kind"], "bad_request");
        assert!(json["error"].as_str().unwrap().contains("name"));

        let resp = app
            .clone()
            .oneshot(post_json("/api/schedule", serde_json::json!({"cron": "x"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["kind"], "bad_request");

        let resp = app
            .clone()
            .oneshot(post_body("/api/select", "not json"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["kind"], "bad_request");
    }

    #[tokio::test]
    async fn body_without_content_type_is_accepted() {
        let app = app().await;
        let resp = app
            .oneshot(post_body("/api/select", r#"{"name":"a.png"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["selected"]["name"], "a.png");
    }

    #[tokio::test]
    async fn oversized_schedule_step_keeps_session_alive() {
        let app = app().await;
        let resp = app
            .clone()
            .oneshot(post_json(
                "/api/schedule",
                serde_json::json!({"expr": "1/4294967295 * * * *"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["kind"], "schedule_error");

        let resp = app.oneshot(get_req("/api/dashboard")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn failed_schedule_save_leaves_session_schedule() {
        let tmp = tempfile::tempdir().unwrap();
        // A directory where the config file should be makes load fail.
        let app = app_with(gateway(), ApplyMode::Record, Some(tmp.path().to_path_buf())).await;

        let resp = app
            .clone()
            .oneshot(post_json("/api/schedule", serde_json::json!({"expr": "0 6 * * *"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(resp).await["kind"], "internal");

        let json = body_json(app.oneshot(get_req("/api/dashboard")).await.unwrap()).await;
        assert_eq!(json["schedule"], "manual");
    }

    #[tokio::test]
    async fn dismiss_notice() {
        let app = app().await;
        app.clone().oneshot(post_empty("/api/apply")).await.unwrap();
        let json = body_json(app.clone().oneshot(get_req("/api/dashboard")).await.unwrap()).await;
        let id = json["notices"][0]["id"].as_u64().unwrap();

        let resp = app
            .oneshot(post_empty(&format!("/api/notices/{id}/dismiss")))
            .await
            .unwrap();
        assert_eq!(body_json(resp).await["dismissed"], true);
    }
}
