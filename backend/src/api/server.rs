//! HTTP Server for the sheetjson API.
//!
//! One shared [`Workspace`] backs every endpoint, so a single editor client
//! drives upload, sheet selection, mapping edits and export.
//!
//! # API Endpoints
//!
//! | Method | Path                          | Description                         |
//! |--------|-------------------------------|-------------------------------------|
//! | GET    | `/health`                     | Health check                        |
//! | GET    | `/api/workbook`               | Workspace status                    |
//! | POST   | `/api/workbook`               | Upload a workbook (multipart `file`)|
//! | POST   | `/api/workbook/select`        | Select sheet and header row         |
//! | DELETE | `/api/workbook`               | Clear the workspace                 |
//! | GET    | `/api/table`                  | Preview of the current table        |
//! | GET    | `/api/mapping`                | Active mapping                      |
//! | PUT    | `/api/mapping`                | Replace the mapping                 |
//! | POST   | `/api/mapping/fields`         | Add a blank rule                    |
//! | PATCH  | `/api/mapping/fields/{id}`    | Update a rule                       |
//! | DELETE | `/api/mapping/fields/{id}`    | Remove a rule                       |
//! | POST   | `/api/mapping/suggest`        | AI mapping suggestion               |
//! | GET    | `/api/convert`                | Converted documents                 |
//! | GET    | `/api/export`                 | Converted documents as a download   |
//! | GET    | `/api/templates`              | Stored mappings                     |
//! | POST   | `/api/templates`              | Save the current mapping            |
//! | POST   | `/api/templates/{id}/apply`   | Load a stored mapping               |
//! | DELETE | `/api/templates/{id}`         | Delete a stored mapping             |
//! | GET    | `/api/logs`                   | SSE stream for real-time logs       |

use axum::{
    extract::{Multipart, Path, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, patch, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, LOG_BROADCASTER};
use super::types::{
    error_response, ConvertResponse, SaveTemplateRequest, SelectRequest, SuggestRequest,
    SuggestResponse, TemplateSummary, WorkbookResponse,
};
use crate::ai::AiClient;
use crate::cache::MappingRegistry;
use crate::config::ServerConfig;
use crate::error::{RegistryError, ServerError, ServerResult, SessionError};
use crate::models::TablePreview;
use crate::session::{SelectOutcome, Workspace, WorkspaceStatus};
use crate::transform::export::{export_file_name_now, to_pretty_json, ExportSummary, JSON_MIME_TYPE};
use crate::transform::mapping::{MappingConfig, MappingRule, RuleUpdate};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub workspace: Arc<Workspace>,
    /// `None` when no API key is configured
    pub ai: Option<AiClient>,
    pub registry: Arc<Mutex<MappingRegistry>>,
}

impl AppState {
    pub fn new(ai: Option<AiClient>, registry: MappingRegistry) -> Self {
        Self {
            workspace: Arc::new(Workspace::new()),
            ai,
            registry: Arc::new(Mutex::new(registry)),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::Session(e) => match e {
                SessionError::NoWorkbook => StatusCode::CONFLICT,
                SessionError::UnknownSheet(_) | SessionError::UnknownRule(_) => StatusCode::NOT_FOUND,
                SessionError::Workbook(_) => StatusCode::UNPROCESSABLE_ENTITY,
                SessionError::Ai(_) => StatusCode::BAD_GATEWAY,
                SessionError::TaskFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServerError::Ai(_) => StatusCode::BAD_GATEWAY,
            ServerError::Registry(RegistryError::NotFound(_)) => StatusCode::NOT_FOUND,
            ServerError::Registry(RegistryError::InvalidTemplate(_)) => StatusCode::BAD_REQUEST,
            ServerError::Registry(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = self.to_string();
        if status.is_server_error() {
            log_error(&message);
        }
        (status, Json(error_response(&message))).into_response()
    }
}

/// Build the router with CORS
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route(
            "/api/workbook",
            get(workbook_status).post(upload_workbook).delete(clear_workbook),
        )
        .route("/api/workbook/select", post(select_sheet))
        .route("/api/table", get(table_preview))
        .route("/api/mapping", get(get_mapping).put(put_mapping))
        .route("/api/mapping/fields", post(add_field))
        .route("/api/mapping/fields/{id}", patch(update_field).delete(remove_field))
        .route("/api/mapping/suggest", post(suggest_mapping))
        .route("/api/convert", get(convert))
        .route("/api/export", get(export))
        .route("/api/templates", get(list_templates).post(save_template))
        .route("/api/templates/{id}/apply", post(apply_template))
        .route("/api/templates/{id}", axum::routing::delete(delete_template))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(config: ServerConfig, ai: Option<AiClient>) -> Result<(), Box<dyn std::error::Error>> {
    let ai_enabled = ai.is_some();
    let state = AppState::new(ai, MappingRegistry::with_dir(&config.registry_dir));
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    println!("🚀 Sheetjson server running on http://localhost:{}", config.port);
    println!("   POST /api/workbook          - Upload workbook");
    println!("   POST /api/mapping/suggest   - AI mapping {}", if ai_enabled { "(enabled)" } else { "(disabled: no API key)" });
    println!("   GET  /api/export            - Download JSON");
    println!("   GET  /api/logs              - SSE log stream");
    println!("   Templates: {}", config.registry_dir.display());
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "sheetjson",
        "version": env!("CARGO_PKG_VERSION"),
        "aiEnabled": state.ai.is_some(),
    }))
}

/// SSE endpoint for real-time log streaming
///
/// Recent entries are replayed first.
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (recent, rx) = LOG_BROADCASTER.subscribe_with_history();
    let history = tokio_stream::iter(recent);
    let live = BroadcastStream::new(rx).filter_map(|result| result.ok());

    let stream = history.chain(live).filter_map(|entry| {
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok::<_, Infallible>(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

// =============================================================================
// Workbook
// =============================================================================

async fn workbook_response(workspace: &Workspace, outcome: SelectOutcome) -> ServerResult<WorkbookResponse> {
    Ok(WorkbookResponse {
        status: workspace.status().await,
        preview: workspace.preview().await?,
        committed: outcome == SelectOutcome::Committed,
    })
}

async fn workbook_status(State(state): State<AppState>) -> Json<WorkspaceStatus> {
    Json(state.workspace.status().await)
}

/// Upload endpoint: multipart field `file`
async fn upload_workbook(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ServerResult<Json<WorkbookResponse>> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() == Some("file") {
            let file_name = field
                .file_name()
                .map(str::to_string)
                .ok_or_else(|| ServerError::BadRequest("Uploaded file has no name".into()))?;
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
            upload = Some((file_name, bytes.to_vec()));
        }
    }

    let (file_name, bytes) = upload.ok_or_else(|| ServerError::BadRequest("No file provided".into()))?;
    log_info(format!("📄 Upload: {} ({} bytes)", file_name, bytes.len()));

    let outcome = state.workspace.load_bytes(bytes, &file_name).await?;
    Ok(Json(workbook_response(&state.workspace, outcome).await?))
}

async fn select_sheet(
    State(state): State<AppState>,
    Json(req): Json<SelectRequest>,
) -> ServerResult<Json<WorkbookResponse>> {
    let outcome = state.workspace.select(&req.sheet, req.header_row).await?;
    Ok(Json(workbook_response(&state.workspace, outcome).await?))
}

async fn clear_workbook(State(state): State<AppState>) -> StatusCode {
    state.workspace.clear().await;
    StatusCode::NO_CONTENT
}

async fn table_preview(State(state): State<AppState>) -> ServerResult<Json<TablePreview>> {
    Ok(Json(state.workspace.preview().await?))
}

// =============================================================================
// Mapping
// =============================================================================

async fn get_mapping(State(state): State<AppState>) -> Json<MappingConfig> {
    Json(state.workspace.rules().await)
}

/// Accepts `{"fields": [...]}` or a bare array
async fn put_mapping(State(state): State<AppState>, body: String) -> ServerResult<Json<MappingConfig>> {
    let mapping = MappingConfig::from_json(&body)
        .map_err(|e| ServerError::BadRequest(format!("Invalid mapping: {}", e)))?;
    state.workspace.set_rules(mapping).await;
    Ok(Json(state.workspace.rules().await))
}

async fn add_field(State(state): State<AppState>) -> (StatusCode, Json<MappingRule>) {
    (StatusCode::CREATED, Json(state.workspace.add_rule().await))
}

async fn update_field(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<RuleUpdate>,
) -> ServerResult<Json<MappingRule>> {
    Ok(Json(state.workspace.update_rule(&id, update).await?))
}

async fn remove_field(State(state): State<AppState>, Path(id): Path<String>) -> ServerResult<StatusCode> {
    state.workspace.remove_rule(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn suggest_mapping(
    State(state): State<AppState>,
    Json(req): Json<SuggestRequest>,
) -> ServerResult<Json<SuggestResponse>> {
    let client = state.ai.as_ref().ok_or_else(|| {
        ServerError::Unavailable("AI suggestions need ANTHROPIC_API_KEY".into())
    })?;

    let outcome = state.workspace.suggest(client, &req.instruction).await?;
    Ok(Json(SuggestResponse::new(outcome, state.workspace.rules().await)))
}

// =============================================================================
// Output
// =============================================================================

async fn converted(workspace: &Workspace) -> ServerResult<Vec<Value>> {
    if !workspace.has_workbook().await {
        return Err(SessionError::NoWorkbook.into());
    }
    Ok(workspace.convert().await)
}

async fn convert(State(state): State<AppState>) -> ServerResult<Json<ConvertResponse>> {
    let documents = converted(&state.workspace).await?;
    Ok(Json(ConvertResponse {
        count: documents.len(),
        documents,
        dangling_rule_ids: state.workspace.status().await.dangling_rule_ids,
    }))
}

/// Download endpoint: pretty JSON with a `converted_data_<millis>.json` name
async fn export(State(state): State<AppState>) -> ServerResult<impl IntoResponse> {
    let documents = converted(&state.workspace).await?;
    let body = to_pretty_json(&documents).map_err(|e| ServerError::Internal(e.to_string()))?;
    let summary = ExportSummary::new(&documents, export_file_name_now());
    log_info(format!("💾 Export {} ({} objects)", summary.file_name, summary.object_count));

    Ok((
        [
            (header::CONTENT_TYPE, JSON_MIME_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", summary.file_name),
            ),
        ],
        body,
    ))
}

// =============================================================================
// Templates
// =============================================================================

/// Stored mappings; compatible ones (with a score) first
async fn list_templates(State(state): State<AppState>) -> Json<Vec<TemplateSummary>> {
    let headers = state.workspace.table().await.headers.clone();
    let registry = state.registry.lock().await;

    let compatible = registry.find_compatible(&headers);
    let mut summaries: Vec<TemplateSummary> = compatible
        .iter()
        .map(|(stored, score)| TemplateSummary::new(stored, Some(*score)))
        .collect();
    summaries.extend(
        registry
            .list()
            .into_iter()
            .filter(|s| !compatible.iter().any(|(c, _)| c.id == s.id))
            .map(|s| TemplateSummary::new(s, None)),
    );

    Json(summaries)
}

async fn save_template(
    State(state): State<AppState>,
    Json(req): Json<SaveTemplateRequest>,
) -> ServerResult<(StatusCode, Json<Value>)> {
    let mapping = state.workspace.rules().await;
    let headers = state.workspace.table().await.headers.clone();
    let id = state.registry.lock().await.save(mapping, &req.name, headers)?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

async fn apply_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Json<MappingConfig>> {
    let mapping = {
        let mut registry = state.registry.lock().await;
        let mapping = registry.require(&id)?.mapping.clone();
        registry.mark_used(&id)?;
        mapping
    };
    state.workspace.set_rules(mapping).await;
    Ok(Json(state.workspace.rules().await))
}

async fn delete_template(State(state): State<AppState>, Path(id): Path<String>) -> ServerResult<StatusCode> {
    state.registry.lock().await.delete(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::read_workbook_bytes;
    use crate::transform::mapping::FieldType;

    async fn spawn(state: AppState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn state(dir: &std::path::Path) -> AppState {
        AppState::new(None, MappingRegistry::with_dir(dir))
    }

    #[test]
    fn test_error_status_codes() {
        let status = |e: ServerError| e.into_response().status();
        assert_eq!(status(SessionError::NoWorkbook.into()), StatusCode::CONFLICT);
        assert_eq!(status(SessionError::UnknownRule("x".into()).into()), StatusCode::NOT_FOUND);
        assert_eq!(
            status(SessionError::Workbook(crate::error::WorkbookError::EmptyFile).into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status(RegistryError::NotFound("t".into()).into()), StatusCode::NOT_FOUND);
        assert_eq!(status(ServerError::Unavailable("ai".into())), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_health_and_empty_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let base = spawn(state(dir.path())).await;
        let client = reqwest::Client::new();

        let health: Value = client.get(format!("{}/health", base)).send().await.unwrap().json().await.unwrap();
        assert_eq!(health["status"], "ok");
        assert_eq!(health["aiEnabled"], false);

        let table = client.get(format!("{}/api/table", base)).send().await.unwrap();
        assert_eq!(table.status(), reqwest::StatusCode::CONFLICT);

        let suggest = client
            .post(format!("{}/api/mapping/suggest", base))
            .json(&json!({ "instruction": "map" }))
            .send()
            .await
            .unwrap();
        assert_eq!(suggest.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_mapping_edit_and_export() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        let workbook = read_workbook_bytes(b"Name,Tags\nAnn,\"a, b\"\n", "people.csv").unwrap();
        state.workspace.load_workbook(workbook).await.unwrap();
        let base = spawn(state).await;
        let client = reqwest::Client::new();

        let mapping = MappingConfig::from_rules(vec![
            MappingRule::new("person.name", "Name", FieldType::String),
            MappingRule::new("tags", "Tags", FieldType::Array),
        ]);
        let put = client
            .put(format!("{}/api/mapping", base))
            .body(serde_json::to_string(&mapping.fields).unwrap())
            .send()
            .await
            .unwrap();
        assert!(put.status().is_success());

        let converted: Value = client.get(format!("{}/api/convert", base)).send().await.unwrap().json().await.unwrap();
        assert_eq!(converted["count"], 1);
        assert_eq!(converted["documents"][0], json!({ "person": { "name": "Ann" }, "tags": ["a", "b"] }));

        let export = client.get(format!("{}/api/export", base)).send().await.unwrap();
        assert_eq!(export.headers()[reqwest::header::CONTENT_TYPE], "application/json");
        let disposition = export.headers()[reqwest::header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
        assert!(disposition.starts_with("attachment; filename=\"converted_data_"));
        assert!(disposition.ends_with(".json\""));
        let body = export.text().await.unwrap();
        assert!(body.starts_with("[\n  {"));
    }

    #[tokio::test]
    async fn test_field_routes() {
        let dir = tempfile::tempdir().unwrap();
        let base = spawn(state(dir.path())).await;
        let client = reqwest::Client::new();

        let created: MappingRule = client
            .post(format!("{}/api/mapping/fields", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(!created.is_complete());

        let updated: MappingRule = client
            .patch(format!("{}/api/mapping/fields/{}", base, created.id))
            .json(&json!({ "targetKey": "qty", "sourceColumn": "Qty", "type": "Number" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(updated.field_type, FieldType::Number);
        assert!(updated.is_complete());

        let missing = client
            .delete(format!("{}/api/mapping/fields/unknown", base))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

        let removed = client
            .delete(format!("{}/api/mapping/fields/{}", base, created.id))
            .send()
            .await
            .unwrap();
        assert_eq!(removed.status(), reqwest::StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_template_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        let workbook = read_workbook_bytes(b"Sku,Qty\nA,1\n", "stock.csv").unwrap();
        state.workspace.load_workbook(workbook).await.unwrap();
        state
            .workspace
            .set_rules(MappingConfig::from_rules(vec![MappingRule::new("sku", "Sku", FieldType::String)]))
            .await;
        let workspace = Arc::clone(&state.workspace);
        let base = spawn(state).await;
        let client = reqwest::Client::new();

        let saved: Value = client
            .post(format!("{}/api/templates", base))
            .json(&json!({ "name": "Stock" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let id = saved["id"].as_str().unwrap().to_string();

        let list: Value = client.get(format!("{}/api/templates", base)).send().await.unwrap().json().await.unwrap();
        assert_eq!(list[0]["id"], id.as_str());
        assert_eq!(list[0]["compatibility"], 1.0);

        workspace.set_rules(MappingConfig::new()).await;
        let applied = client
            .post(format!("{}/api/templates/{}/apply", base, id))
            .send()
            .await
            .unwrap();
        assert!(applied.status().is_success());
        assert_eq!(workspace.rules().await.len(), 1);
    }
}
