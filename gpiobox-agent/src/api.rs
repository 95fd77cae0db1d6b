//! HTTP control surface.
//!
//! | Route          | Effect                                         |
//! |----------------|------------------------------------------------|
//! | `GET /`        | render the page                                |
//! | `GET /on`      | output on, render the page                     |
//! | `GET /off`     | output off, render the page                    |
//! | `GET /reboot`  | JSON reply, then the process restarts          |
//! | `GET /ping`    | probe the coordinator host                     |
//! | anything else  | 404 echoing method, path and parameters        |

use std::path::Path;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{Html, IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use gpiobox_core::OutputState;

use crate::probe::Prober;
use crate::restart::RestartHandle;

/// Placeholder replaced by `ON` or `OFF`.
pub const STATE_PLACEHOLDER: &str = "{{STATE}}";

const BUILTIN_PAGE: &str = include_str!("../assets/index.html");

/// HTML page with a [`STATE_PLACEHOLDER`].
#[derive(Debug, Clone)]
pub struct PageTemplate {
    html: String,
}

impl Default for PageTemplate {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PageTemplate {
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }

    pub fn builtin() -> Self {
        Self::new(BUILTIN_PAGE)
    }

    /// Read the template from `path`, or use the built-in page when no
    /// path is configured or the file cannot be read.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::builtin();
        };
        match std::fs::read_to_string(path) {
            Ok(html) => {
                if !html.contains(STATE_PLACEHOLDER) {
                    warn!(path = %path.display(), "page template has no {STATE_PLACEHOLDER}");
                }
                Self::new(html)
            }
            Err(e) => {
                warn!(path = %path.display(), "cannot read page template: {e}; using built-in page");
                Self::builtin()
            }
        }
    }

    pub fn render(&self, state: &str) -> String {
        self.html.replace(STATE_PLACEHOLDER, state)
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct ApiState {
    output: OutputState,
    page: Arc<PageTemplate>,
    prober: Arc<dyn Prober>,
    probe_host: Arc<str>,
    restart: RestartHandle,
}

impl ApiState {
    pub fn new(
        output: OutputState,
        page: PageTemplate,
        prober: Arc<dyn Prober>,
        probe_host: impl Into<Arc<str>>,
        restart: RestartHandle,
    ) -> Self {
        Self {
            output,
            page: Arc::new(page),
            prober,
            probe_host: probe_host.into(),
            restart,
        }
    }

    fn render(&self) -> Html<String> {
        Html(self.page.render(self.output.label()))
    }
}

/// `{"state": bool, "message": "..."}`
#[derive(Debug, Serialize)]
pub struct Reply {
    pub state: bool,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct NotFoundReply {
    pub state: bool,
    pub message: &'static str,
    pub method: String,
    pub url: String,
    pub data: Map<String, Value>,
}

/// Every route answers GET only. Other methods on a known path get the
/// same JSON 404 as an unknown path.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(index).fallback(not_found))
        .route("/on", get(activate).fallback(not_found))
        .route("/off", get(deactivate).fallback(not_found))
        .route("/reboot", get(reboot).fallback(not_found))
        .route("/ping", get(ping).fallback(not_found))
        .fallback(not_found)
        .with_state(state)
}

async fn index(State(api): State<ApiState>) -> Html<String> {
    debug!("GET /");
    api.render()
}

async fn activate(State(api): State<ApiState>) -> Html<String> {
    api.output.set(true);
    info!("output switched ON over HTTP");
    api.render()
}

async fn deactivate(State(api): State<ApiState>) -> Html<String> {
    api.output.set(false);
    info!("output switched OFF over HTTP");
    api.render()
}

async fn reboot(State(api): State<ApiState>) -> Json<Reply> {
    warn!("reboot requested over HTTP");
    api.restart.request();
    Json(Reply {
        state: true,
        message: "Rebooted GPIO Box",
    })
}

async fn ping(State(api): State<ApiState>) -> Json<Reply> {
    let reachable = api.prober.probe(&api.probe_host).await;
    info!(host = %api.probe_host, reachable, "ping");
    Json(if reachable {
        Reply {
            state: true,
            message: "Pinged central server",
        }
    } else {
        Reply {
            state: false,
            message: "Could not ping central server",
        }
    })
}

async fn not_found(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let mut data = Map::new();
    if let Some(query) = uri.query() {
        collect_params(query.as_bytes(), &mut data);
    }
    if is_form(&headers) {
        collect_params(&body, &mut data);
    }
    debug!(%method, path = uri.path(), "no route");
    (
        StatusCode::NOT_FOUND,
        Json(NotFoundReply {
            state: false,
            message: "Path not found on server.",
            method: method.to_string(),
            url: uri.path().to_string(),
            data,
        }),
    )
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"))
}

// Later keys overwrite earlier ones, so body fields win over the query.
fn collect_params(raw: &[u8], into: &mut Map<String, Value>) {
    match serde_urlencoded::from_bytes::<Vec<(String, String)>>(raw) {
        Ok(pairs) => {
            for (key, value) in pairs {
                into.insert(key, Value::String(value));
            }
        }
        Err(e) => debug!("unparseable parameters: {e}"),
    }
}
