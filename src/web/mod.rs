// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Web UI for the gallery

mod templates;

use axum::{
    extract::{DefaultBodyLimit, Form, Multipart, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Router,
};
use minijinja::{context, Environment};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{MutexGuard, OnceCell};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::collection::{CollectionController, CollectionStatus};
use crate::config::{AppConfig, StoreConfig};
use crate::intake::UploadFile;
use crate::layout::{layout, GridLayout};
use crate::locator::LocatorRegistry;
use crate::store::remote::RemoteProbe;
use crate::store::{open_store, ContentStore};
use crate::unlock::{Session, TokenProbe, UnlockGate};
use crate::viewer::{FullscreenViewer, Presentation};
use crate::visual::VisualItem;
use crate::VisualError;

const SESSION_COOKIE: &str = "vs_session";

/// Shared application state
pub struct AppState {
    pub config: AppConfig,
    pub registry: LocatorRegistry,
    templates: Environment<'static>,
    sessions: Mutex<HashMap<Uuid, Arc<SessionSlot>>>,
    session_idle: Duration,
    /// Local and blob backends are opened once and shared by every session
    shared_store: Option<Arc<dyn ContentStore>>,
}

/// Everything one browser session owns
struct SessionSlot {
    gate: tokio::sync::Mutex<UnlockGate>,
    gallery: OnceCell<Arc<Gallery>>,
    last_seen: Mutex<Instant>,
}

impl SessionSlot {
    fn touch(&self) {
        *self.last_seen.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }
}

/// Gallery state created once the gate opens.
///
/// Mutating routes hold `controller` for the whole operation. Read routes
/// never wait on it: they render the last published `view` and report the
/// gallery as loading while the controller is held.
struct Gallery {
    controller: tokio::sync::Mutex<CollectionController>,
    view: Mutex<GalleryView>,
    viewer: Mutex<FullscreenViewer>,
}

#[derive(Clone)]
struct GalleryView {
    status: CollectionStatus,
    items: Vec<VisualItem>,
    error: Option<String>,
}

impl GalleryView {
    fn of(controller: &CollectionController) -> Self {
        Self {
            status: controller.status().clone(),
            items: controller.items().to_vec(),
            error: controller.last_error().map(String::from),
        }
    }
}

impl Gallery {
    fn new(controller: CollectionController) -> Self {
        Self {
            view: Mutex::new(GalleryView::of(&controller)),
            controller: tokio::sync::Mutex::new(controller),
            viewer: Mutex::new(FullscreenViewer::new()),
        }
    }

    /// Exclusive access for a mutating route; a held controller is `Busy`
    fn begin(&self) -> Result<MutexGuard<'_, CollectionController>, WebError> {
        self.controller
            .try_lock()
            .map_err(|_| WebError(VisualError::Busy))
    }

    fn busy(&self) -> bool {
        self.controller.try_lock().is_err()
    }

    fn publish(&self, controller: &CollectionController) {
        let view = GalleryView::of(controller);
        self.viewer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(&view.items);
        *self.view.lock().unwrap_or_else(PoisonError::into_inner) = view;
    }

    fn view(&self) -> GalleryView {
        self.view.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn presentation(&self, items: &[VisualItem]) -> Option<Presentation> {
        self.viewer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .presentation(items)
    }

    /// Load a collection that has never loaded or whose last operation was
    /// abandoned, unless someone else is working on it
    async fn load_if_idle(&self) {
        if let Ok(mut controller) = self.controller.try_lock() {
            if controller.status() == &CollectionStatus::Idle {
                let _ = controller.load().await;
                self.publish(&controller);
            }
        }
    }
}

impl AppState {
    pub fn new(config: AppConfig) -> crate::Result<Self> {
        let registry = LocatorRegistry::new();
        let shared_store = match &config.store {
            // Remote stores authenticate with the unlocking session's token
            StoreConfig::Remote(_) => None,
            other => Some(Arc::from(open_store(other, &Session::locked(), &registry)?)),
        };
        Ok(Self {
            session_idle: Duration::from_secs(config.web.session_idle_secs),
            config,
            registry,
            templates: templates::environment()?,
            sessions: Mutex::new(HashMap::new()),
            shared_store,
        })
    }

    /// Live session for the request's cookie, if any
    fn find_session(&self, headers: &HeaderMap) -> Option<(Uuid, Arc<SessionSlot>)> {
        let id = session_id_from(headers)?;
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = sessions.get(&id)?.clone();
        if slot.idle_for() > self.session_idle {
            sessions.remove(&id);
            info!("Session {} expired", id);
            return None;
        }
        slot.touch();
        Some((id, slot))
    }

    /// Start a session, dropping any that have gone idle
    fn create_session(&self) -> (Uuid, Arc<SessionSlot>) {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, slot| slot.idle_for() <= self.session_idle);
        if sessions.len() < before {
            info!("Expired {} idle sessions", before - sessions.len());
        }

        let id = Uuid::new_v4();
        let slot = Arc::new(SessionSlot {
            gate: tokio::sync::Mutex::new(UnlockGate::new(&self.config.gate)),
            gallery: OnceCell::new(),
            last_seen: Mutex::new(Instant::now()),
        });
        sessions.insert(id, slot.clone());
        debug!("New browser session {}", id);
        (id, slot)
    }

    fn end_session(&self, id: Uuid) {
        let removed = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        if removed.is_some() {
            info!("Session {} locked", id);
        }
    }

    fn gallery_store(&self, session: &Session) -> crate::Result<Box<dyn ContentStore>> {
        match &self.shared_store {
            Some(store) => Ok(Box::new(store.clone())),
            None => open_store(&self.config.store, session, &self.registry),
        }
    }

    fn token_probe(&self) -> Option<RemoteProbe> {
        match &self.config.store {
            StoreConfig::Remote(remote) => Some(RemoteProbe::new(remote)),
            _ => None,
        }
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<Html<String>, WebError> {
        let html = self.templates.get_template(name)?.render(ctx)?;
        Ok(Html(html))
    }

    #[cfg(test)]
    fn session_count(&self) -> usize {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Create the web application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.upload.max_bytes;
    Router::new()
        // Pages
        .route("/", get(index_page))
        .route("/unlock", post(unlock))
        .route("/lock", post(lock))
        // Collection
        .route("/upload", post(upload))
        .route("/visuals/delete", post(delete_visual))
        .route("/refresh", post(refresh))
        // Viewer
        .route("/viewer/toggle", post(toggle_viewer))
        .route("/viewer/close", post(close_viewer))
        // API endpoints
        .route("/api/visuals", get(api_visuals))
        .route("/blob/:token", get(blob))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// === Errors ===

/// Converts crate errors into HTTP responses
pub struct WebError(VisualError);

impl From<VisualError> for WebError {
    fn from(e: VisualError) -> Self {
        WebError(e)
    }
}

impl From<minijinja::Error> for WebError {
    fn from(e: minijinja::Error) -> Self {
        WebError(VisualError::Template(e))
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            VisualError::Auth(_) => StatusCode::UNAUTHORIZED,
            VisualError::NotFound(_) => StatusCode::NOT_FOUND,
            VisualError::Busy => StatusCode::CONFLICT,
            VisualError::Validation(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            VisualError::Resource(_) => StatusCode::BAD_REQUEST,
            VisualError::Store(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!("Request failed: {}", self.0);
        }
        (status, self.0.to_string()).into_response()
    }
}

fn locked() -> WebError {
    WebError(VisualError::Auth("Session is locked".to_string()))
}

// === Sessions ===

fn session_id_from(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value).ok())
}

/// Cookie without expiry: it ends with the browser session
fn with_session(id: Uuid, response: impl IntoResponse) -> Response {
    let cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Strict", SESSION_COOKIE, id);
    ([(header::SET_COOKIE, cookie)], response).into_response()
}

/// Unlocked gallery for the request's session
fn require_gallery(state: &AppState, headers: &HeaderMap) -> Result<(Uuid, Arc<Gallery>), WebError> {
    let (id, slot) = state.find_session(headers).ok_or_else(locked)?;
    let gallery = slot.gallery.get().cloned().ok_or_else(locked)?;
    Ok((id, gallery))
}

fn back_home(id: Uuid) -> Response {
    with_session(id, Redirect::to("/"))
}

// === Page Handlers ===

#[derive(Serialize)]
struct TileView {
    id: String,
    label: String,
    filename: String,
    href: String,
    is_pdf: bool,
}

async fn index_page(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, WebError> {
    let Some((id, slot)) = state.find_session(&headers) else {
        let page = state.render("lock.html", context! { error => None::<String> })?;
        return Ok(page.into_response());
    };

    let Some(gallery) = slot.gallery.get().cloned() else {
        let gate = slot.gate.lock().await;
        let page = state.render("lock.html", context! { error => gate.error_message() })?;
        return Ok(with_session(id, page));
    };

    gallery.load_if_idle().await;
    let view = gallery.view();
    let tiles: Vec<TileView> = view
        .items
        .iter()
        .map(|item| TileView {
            id: item.id.clone(),
            label: item.label.clone(),
            filename: item.filename.clone(),
            href: item.locator.href(),
            is_pdf: item.is_pdf(),
        })
        .collect();
    let grid = layout(view.items.len());

    let page = state.render(
        "gallery.html",
        context! {
            tiles => tiles,
            empty => view.items.is_empty(),
            loading => gallery.busy(),
            error => view.error,
            layout => grid,
            grid_class => grid.css_class(),
            viewer => gallery.presentation(&view.items),
        },
    )?;
    Ok(with_session(id, page))
}

#[derive(Deserialize)]
struct UnlockForm {
    secret: String,
}

async fn unlock(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<UnlockForm>,
) -> Result<Response, WebError> {
    let (id, slot) = match state.find_session(&headers) {
        Some(found) => found,
        None => state.create_session(),
    };
    let mut gate = slot.gate.lock().await;

    let probe = state.token_probe();
    gate.set_input(form.secret);
    if !gate.submit(probe.as_ref().map(|p| p as &dyn TokenProbe)).await {
        return Ok(back_home(id));
    }

    if slot.gallery.get().is_none() {
        let session = gate.session().clone();
        let store = state.gallery_store(&session)?;
        let mut controller = CollectionController::new(store, session, state.registry.clone());
        let _ = controller.load().await;
        let _ = slot.gallery.set(Arc::new(Gallery::new(controller)));
    }
    Ok(back_home(id))
}

async fn lock(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Some(id) = session_id_from(&headers) {
        state.end_session(id);
    }
    Redirect::to("/").into_response()
}

async fn upload(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response, WebError> {
    let (id, gallery) = require_gallery(&state, &headers)?;
    let mut controller = gallery.begin()?;

    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| VisualError::Resource(e.to_string()))?
    {
        let Some(filename) = field.file_name().map(String::from).filter(|n| !n.is_empty()) else {
            continue;
        };
        let mime = field.content_type().map(String::from);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| VisualError::Resource(format!("{}: {}", filename, e)))?;
        files.push(UploadFile::from_bytes(filename, mime, bytes.to_vec()));
    }

    let outcome = controller.upload(files).await;
    gallery.publish(&controller);
    debug!("Upload report: {:?}", outcome.as_ref().ok());
    outcome?;
    Ok(back_home(id))
}

#[derive(Deserialize)]
struct ItemForm {
    id: String,
}

async fn delete_visual(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<ItemForm>,
) -> Result<Response, WebError> {
    let (id, gallery) = require_gallery(&state, &headers)?;
    let mut controller = gallery.begin()?;
    // Failures are shown through the published error
    let _ = controller.remove(&form.id).await;
    gallery.publish(&controller);
    Ok(back_home(id))
}

async fn refresh(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, WebError> {
    let (id, gallery) = require_gallery(&state, &headers)?;
    let mut controller = gallery.begin()?;
    let _ = controller.load().await;
    gallery.publish(&controller);
    Ok(back_home(id))
}

async fn toggle_viewer(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<ItemForm>,
) -> Result<Response, WebError> {
    let (id, gallery) = require_gallery(&state, &headers)?;
    let view = gallery.view();
    let item = view
        .items
        .iter()
        .find(|item| item.id == form.id)
        .ok_or_else(|| VisualError::NotFound(form.id.clone()))?;
    gallery
        .viewer
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .toggle(item);
    Ok(back_home(id))
}

async fn close_viewer(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, WebError> {
    let (id, gallery) = require_gallery(&state, &headers)?;
    gallery
        .viewer
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .close();
    Ok(back_home(id))
}

// === API Handlers ===

#[derive(Serialize)]
struct Snapshot {
    status: CollectionStatus,
    loading: bool,
    error: Option<String>,
    layout: GridLayout,
    items: Vec<VisualItem>,
    selected: Option<Presentation>,
}

async fn api_visuals(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, WebError> {
    let (id, gallery) = require_gallery(&state, &headers)?;
    let view = gallery.view();
    let snapshot = Snapshot {
        loading: gallery.busy(),
        layout: layout(view.items.len()),
        selected: gallery.presentation(&view.items),
        status: view.status,
        error: view.error,
        items: view.items,
    };
    Ok(with_session(id, Json(snapshot)))
}

async fn blob(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(token): Path<String>,
) -> Result<Response, WebError> {
    require_gallery(&state, &headers)?;
    let blob = state
        .registry
        .resolve(&token)
        .ok_or_else(|| VisualError::NotFound(token.clone()))?;
    Ok((
        [(header::CONTENT_TYPE, blob.mime.clone())],
        blob.bytes.as_ref().clone(),
    )
        .into_response())
}

/// Start the web server with config
pub async fn start_server(config: AppConfig) -> crate::Result<()> {
    let addr = format!("{}:{}", config.web.host, config.web.port);
    let state = Arc::new(AppState::new(config)?);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Gallery available at http://{}", addr);

    let router = create_router(state);
    axum::serve(listener, router)
        .await
        .map_err(|e| crate::VisualError::Config(format!("Server error: {}", e)))?;

    Ok(())
}
