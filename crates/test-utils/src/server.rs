//! A localhost HTTP server for fixtures.
//!
//! Serves byte bodies and JSON documents by path, honours
//! `Range: bytes=start-[end]` unless disabled, and counts requests per path
//! so tests can assert how many fetches happened.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::Extension;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;

#[derive(Clone)]
struct Fixture {
    body: Vec<u8>,
    content_type: &'static str,
}

struct ServerState {
    fixtures: HashMap<String, Fixture>,
    range_support: bool,
    hits: Mutex<HashMap<String, usize>>,
}

/// Builder and handle for a running fixture server.
pub struct FixtureServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
}

/// Collects fixtures before the server starts.
#[derive(Default)]
pub struct FixtureServerBuilder {
    fixtures: HashMap<String, Fixture>,
    no_range: bool,
}

impl FixtureServerBuilder {
    /// Serve raw bytes at `path` (leading `/` included).
    pub fn file(mut self, path: &str, body: Vec<u8>) -> Self {
        self.fixtures.insert(
            path.to_string(),
            Fixture {
                body,
                content_type: "image/tiff",
            },
        );
        self
    }

    /// Serve a JSON document at `path`.
    pub fn json(mut self, path: &str, value: serde_json::Value) -> Self {
        self.fixtures.insert(
            path.to_string(),
            Fixture {
                body: value.to_string().into_bytes(),
                content_type: "application/json",
            },
        );
        self
    }

    /// Serve a raw text body at `path`, e.g. malformed JSON.
    pub fn text(mut self, path: &str, body: &str) -> Self {
        self.fixtures.insert(
            path.to_string(),
            Fixture {
                body: body.as_bytes().to_vec(),
                content_type: "text/plain",
            },
        );
        self
    }

    /// Ignore `Range` headers and always answer 200 with the full body.
    pub fn without_range_support(mut self) -> Self {
        self.no_range = true;
        self
    }

    /// Bind to an ephemeral localhost port and start serving.
    pub async fn start(self) -> FixtureServer {
        let state = Arc::new(ServerState {
            fixtures: self.fixtures,
            range_support: !self.no_range,
            hits: Mutex::new(HashMap::new()),
        });

        let app = Router::new()
            .fallback(serve_fixture)
            .layer(Extension(state.clone()));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fixture server");
        let addr = listener.local_addr().expect("fixture server addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        FixtureServer { addr, state }
    }
}

impl FixtureServer {
    pub fn builder() -> FixtureServerBuilder {
        FixtureServerBuilder::default()
    }

    /// Absolute URL for a path on this server.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Number of requests received for `path`.
    pub fn hits(&self, path: &str) -> usize {
        self.state
            .hits
            .lock()
            .map(|h| h.get(path).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

async fn serve_fixture(
    Extension(state): Extension<Arc<ServerState>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let path = uri.path().to_string();
    if let Ok(mut hits) = state.hits.lock() {
        *hits.entry(path.clone()).or_insert(0) += 1;
    }

    let Some(fixture) = state.fixtures.get(&path) else {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    };
    let total = fixture.body.len();

    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .filter(|_| state.range_support)
        .and_then(parse_range);

    match range {
        Some((start, _)) if start >= total => (
            StatusCode::RANGE_NOT_SATISFIABLE,
            [(header::CONTENT_RANGE, format!("bytes */{}", total))],
        )
            .into_response(),
        Some((start, end)) => {
            let end = end.map_or(total - 1, |e| e.min(total - 1));
            (
                StatusCode::PARTIAL_CONTENT,
                [
                    (header::CONTENT_TYPE, fixture.content_type.to_string()),
                    (
                        header::CONTENT_RANGE,
                        format!("bytes {}-{}/{}", start, end, total),
                    ),
                ],
                fixture.body[start..=end].to_vec(),
            )
                .into_response()
        }
        None => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, fixture.content_type.to_string())],
            fixture.body.clone(),
        )
            .into_response(),
    }
}

/// Parse `bytes=start-` or `bytes=start-end`.
fn parse_range(value: &str) -> Option<(usize, Option<usize>)> {
    let spec = value.strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    let start = start.trim().parse().ok()?;
    let end = match end.trim() {
        "" => None,
        e => Some(e.parse().ok()?),
    };
    Some((start, end))
}
