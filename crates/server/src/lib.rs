use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use irke_town_engine::{screen_to_grid, ConnectError, PlacementError, ScreenPoint, Town, TownStore};
use irke_town_protocol::{
    Building, BuildingDraft, BuildingPatch, CellInfo, ConnectRequest, Connection, ErrorBody,
    GridConfig, MoveBuilding, RoutePreview, SaveRequest, SaveSummary, TownState, TownView,
};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{info, warn};


/// The live town plus the save slot it autosaves into.
#[derive(Debug, Default)]
pub struct Session {
    pub town: Town,
    pub save_id: Option<String>,
}

pub struct AppState {
    pub store: TownStore,
    session: Mutex<Session>,
}

impl AppState {
    pub fn new(store: TownStore, grid: GridConfig) -> Self {
        Self {
            store,
            session: Mutex::new(Session {
                town: Town::new(grid),
                save_id: None,
            }),
        }
    }

    /// Commands run to completion under this lock.
    pub fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn autosave(&self, session: &Session) {
        let town = &session.town;
        if let Err(e) = self
            .store
            .autosave(session.save_id.as_deref(), town.buildings(), town.connections())
        {
            warn!(error = %e, "autosave failed");
        }
    }
}

type Shared = State<Arc<AppState>>;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/town", get(town_view))
        .route("/api/grid/cell", get(cell_info))
        .route("/api/buildings", post(place_building))
        .route(
            "/api/buildings/{id}",
            axum::routing::patch(update_building).delete(remove_building),
        )
        .route("/api/buildings/{id}/move", post(move_building))
        .route("/api/buildings/{id}/rotate", post(rotate_building))
        .route("/api/buildings/{id}/connections", get(building_connections))
        .route("/api/connections", post(add_connection))
        .route(
            "/api/connections/{id}",
            axum::routing::delete(remove_connection),
        )
        .route("/api/route/preview", post(preview_route))
        .route("/api/saves", get(list_saves).post(save_town))
        .route(
            "/api/saves/{id}",
            get(load_town).put(update_town).delete(delete_town),
        )
        .with_state(Arc::new(state))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(middleware::from_fn(ip_allowlist))
        // Never `Access-Control-Allow-Origin: *`: any page in the browser could
        // then drive the editor.
        .layer(local_only_cors())
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Placement(PlacementError),
    Connect(ConnectError),
    Internal(anyhow::Error),
}

impl From<PlacementError> for ApiError {
    fn from(e: PlacementError) -> Self {
        Self::Placement(e)
    }
}

impl From<ConnectError> for ApiError {
    fn from(e: ConnectError) -> Self {
        Self::Connect(e)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self::Internal(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, msg) = match self {
            Self::NotFound(what) => (StatusCode::NOT_FOUND, "not_found", what),
            Self::Placement(e) => {
                let (status, code) = match e {
                    PlacementError::UnknownBuilding(_) => (StatusCode::NOT_FOUND, "not_found"),
                    PlacementError::Occupied(_) => (StatusCode::CONFLICT, "occupied"),
                    PlacementError::OutOfBounds { .. } => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "out_of_bounds")
                    }
                    PlacementError::InvalidSize { .. } => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "invalid_size")
                    }
                };
                (status, code, e.to_string())
            }
            Self::Connect(e) => {
                let (status, code) = match e {
                    ConnectError::UnknownBuilding(_) => (StatusCode::NOT_FOUND, "not_found"),
                    ConnectError::AlreadyConnected(..) => (StatusCode::CONFLICT, "already_connected"),
                    ConnectError::SameBuilding => (StatusCode::UNPROCESSABLE_ENTITY, "same_building"),
                    ConnectError::NoPort(_) => (StatusCode::UNPROCESSABLE_ENTITY, "no_port"),
                    ConnectError::NoRoute => (StatusCode::UNPROCESSABLE_ENTITY, "no_route"),
                };
                (status, code, e.to_string())
            }
            Self::Internal(e) => {
                warn!(error = %format!("{e:#}"), "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal", format!("{e:#}"))
            }
        };
        (status, Json(ErrorBody::new(code, msg))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

async fn health() -> &'static str {
    "ok"
}

async fn town_view(State(state): Shared) -> Json<TownView> {
    let session = state.session();
    let mut view = session.town.view();
    view.session_id = session.save_id.clone();
    Json(view)
}

#[derive(Debug, Deserialize)]
struct ScreenQuery {
    x: f64,
    y: f64,
}

async fn cell_info(State(state): Shared, Query(q): Query<ScreenQuery>) -> Json<CellInfo> {
    let session = state.session();
    let town = &session.town;
    let cell = screen_to_grid(town.config(), q.x, q.y);
    Json(CellInfo {
        cell,
        valid: irke_town_engine::is_valid_grid_position(town.config(), cell.x, cell.y),
        building_id: town.building_at(cell).map(|b| b.id.clone()),
        connection_id: town
            .connection_at(ScreenPoint::new(q.x, q.y))
            .map(|c| c.id.clone()),
    })
}

fn building_or_404(town: &Town, id: &str) -> ApiResult<Building> {
    town.building(id)
        .cloned()
        .ok_or_else(|| ApiError::NotFound(format!("building not found: {id}")))
}

async fn place_building(
    State(state): Shared,
    Json(draft): Json<BuildingDraft>,
) -> ApiResult<(StatusCode, Json<Building>)> {
    let mut session = state.session();
    let id = session.town.place_building(draft)?;
    state.autosave(&session);
    Ok((StatusCode::CREATED, Json(building_or_404(&session.town, &id)?)))
}

async fn update_building(
    State(state): Shared,
    Path(id): Path<String>,
    Json(patch): Json<BuildingPatch>,
) -> ApiResult<Json<Building>> {
    let mut session = state.session();
    building_or_404(&session.town, &id)?;
    if let Some(name) = patch.name {
        session.town.rename_building(&id, name);
    }
    if let Some(status) = patch.status {
        session.town.set_building_status(&id, status);
    }
    state.autosave(&session);
    Ok(Json(building_or_404(&session.town, &id)?))
}

async fn remove_building(State(state): Shared, Path(id): Path<String>) -> Json<serde_json::Value> {
    let mut session = state.session();
    let removed = session.town.remove_building(&id);
    if removed {
        state.autosave(&session);
    }
    Json(serde_json::json!({ "removed": removed }))
}

async fn move_building(
    State(state): Shared,
    Path(id): Path<String>,
    Json(to): Json<MoveBuilding>,
) -> ApiResult<Json<Building>> {
    let mut session = state.session();
    session.town.move_building(&id, to.grid_x, to.grid_y)?;
    state.autosave(&session);
    Ok(Json(building_or_404(&session.town, &id)?))
}

async fn rotate_building(State(state): Shared, Path(id): Path<String>) -> ApiResult<Json<Building>> {
    let mut session = state.session();
    session.town.rotate_building(&id)?;
    state.autosave(&session);
    Ok(Json(building_or_404(&session.town, &id)?))
}

async fn building_connections(
    State(state): Shared,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Connection>>> {
    let session = state.session();
    building_or_404(&session.town, &id)?;
    Ok(Json(
        session
            .town
            .connections_for_building(&id)
            .into_iter()
            .cloned()
            .collect(),
    ))
}

async fn add_connection(
    State(state): Shared,
    Json(req): Json<ConnectRequest>,
) -> ApiResult<(StatusCode, Json<Connection>)> {
    let mut session = state.session();
    let id = session
        .town
        .add_connection(&req.from_building_id, &req.to_building_id)?;
    state.autosave(&session);
    let conn = session
        .town
        .connection(&id)
        .cloned()
        .ok_or_else(|| ApiError::NotFound(format!("connection not found: {id}")))?;
    Ok((StatusCode::CREATED, Json(conn)))
}

async fn remove_connection(State(state): Shared, Path(id): Path<String>) -> Json<serde_json::Value> {
    let mut session = state.session();
    let removed = session.town.remove_connection(&id);
    if removed {
        state.autosave(&session);
    }
    Json(serde_json::json!({ "removed": removed }))
}

async fn preview_route(
    State(state): Shared,
    Json(req): Json<ConnectRequest>,
) -> ApiResult<Json<RoutePreview>> {
    let session = state.session();
    Ok(Json(
        session
            .town
            .preview_route(&req.from_building_id, &req.to_building_id)?,
    ))
}

async fn list_saves(State(state): Shared) -> ApiResult<Json<Vec<SaveSummary>>> {
    Ok(Json(state.store.list_saves()?))
}

async fn save_town(
    State(state): Shared,
    Json(req): Json<SaveRequest>,
) -> ApiResult<(StatusCode, Json<SaveSummary>)> {
    let mut session = state.session();
    let id = state
        .store
        .save_town(&req.name, session.town.buildings(), session.town.connections())?;
    session.save_id = Some(id.clone());
    let saved = state
        .store
        .load_town(&id)?
        .ok_or_else(|| ApiError::NotFound(format!("save not found: {id}")))?;
    Ok((StatusCode::CREATED, Json(summary(&saved))))
}

/// Loads the save into the live town and makes it the autosave target.
async fn load_town(State(state): Shared, Path(id): Path<String>) -> ApiResult<Json<TownState>> {
    let saved = state
        .store
        .load_town(&id)?
        .ok_or_else(|| ApiError::NotFound(format!("save not found: {id}")))?;
    let mut session = state.session();
    session.town.load(saved.clone());
    session.save_id = Some(id);
    Ok(Json(saved))
}

async fn update_town(State(state): Shared, Path(id): Path<String>) -> ApiResult<Json<SaveSummary>> {
    let session = state.session();
    let updated = state
        .store
        .update_town(&id, session.town.buildings(), session.town.connections())?;
    if !updated {
        return Err(ApiError::NotFound(format!("save not found: {id}")));
    }
    let saved = state
        .store
        .load_town(&id)?
        .ok_or_else(|| ApiError::NotFound(format!("save not found: {id}")))?;
    Ok(Json(summary(&saved)))
}

async fn delete_town(State(state): Shared, Path(id): Path<String>) -> ApiResult<Json<serde_json::Value>> {
    let removed = state.store.delete_town(&id)?;
    let mut session = state.session();
    if session.save_id.as_deref() == Some(id.as_str()) {
        session.save_id = None;
    }
    Ok(Json(serde_json::json!({ "removed": removed })))
}

fn summary(state: &TownState) -> SaveSummary {
    SaveSummary {
        id: state.id.clone(),
        name: state.name.clone(),
        created_at: state.created_at,
        updated_at: state.updated_at,
    }
}

pub async fn serve(addr: SocketAddr, db_path: PathBuf, grid: GridConfig) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve_listener(listener, db_path, grid, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    })
    .await?;
    Ok(())
}

pub async fn serve_listener(
    listener: tokio::net::TcpListener,
    db_path: PathBuf,
    grid: GridConfig,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<SocketAddr> {
    let store = TownStore::new(db_path);
    // Fail fast if sqlite is unavailable.
    store.open()?;
    let app = build_router(AppState::new(store, grid));
    let addr = listener.local_addr()?;
    info!(%addr, width = grid.width, height = grid.height, "town server listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;
    Ok(addr)
}

async fn ip_allowlist(
    axum::extract::ConnectInfo(peer): axum::extract::ConnectInfo<SocketAddr>,
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Response {
    if is_allowed_peer_ip(peer.ip()) {
        return next.run(req).await;
    }
    (StatusCode::FORBIDDEN, "forbidden").into_response()
}

fn is_allowed_peer_ip(ip: IpAddr) -> bool {
    ip.is_loopback()
}

fn local_only_cors() -> CorsLayer {
    use axum::http::Method;

    CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE])
        .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _req| {
            is_allowed_local_origin(origin)
        }))
}

fn is_allowed_local_origin(origin: &HeaderValue) -> bool {
    let Ok(s) = origin.to_str() else {
        return false;
    };
    ["localhost", "127.0.0.1"]
        .into_iter()
        .any(|host| is_http_origin_for_host(s, host))
}

fn is_http_origin_for_host(origin: &str, host: &str) -> bool {
    ["http://", "https://"].into_iter().any(|scheme| {
        origin
            .strip_prefix(scheme)
            .and_then(|rest| rest.strip_prefix(host))
            .is_some_and(|after| after.is_empty() || after.starts_with(':'))
    })
}
