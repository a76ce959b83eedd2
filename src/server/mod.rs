//! Development server with live reload
//!
//! Provides a local development server with:
//! - Static file serving rooted at the test site
//! - A reload client injected into every HTML page
//! - WebSocket-based stylesheet injection and full reloads

mod reload;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower::ServiceExt;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{debug, error, info};

use crate::utils::clean_path;

pub use reload::{ReloadChannel, ReloadMessage};

/// WebSocket endpoint the injected client connects to
pub const RELOAD_ENDPOINT: &str = "/__reload";

/// Development server options
#[derive(Debug, Clone)]
pub struct DevServerOptions {
    pub host: String,
    pub port: u16,
    pub open: bool,
}

/// Shared server state
pub(crate) struct ServerState {
    /// Directory being served
    root: PathBuf,

    /// Reload broadcast channel
    reload: ReloadChannel,
}

/// Development server
pub struct DevServer {
    /// Directory to serve
    root: PathBuf,

    /// Server options
    options: DevServerOptions,

    /// Channel shared with the build steps
    reload: ReloadChannel,
}

/// A server accepting connections in the background
pub struct RunningServer {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

impl RunningServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop accepting connections and wait for open ones to finish
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(());
        self.task
            .await
            .context("dev server task panicked")?
            .context("dev server failed")
    }
}

impl DevServer {
    /// Create a new development server
    pub fn new(root: PathBuf, options: DevServerOptions, reload: ReloadChannel) -> Self {
        Self {
            root,
            options,
            reload,
        }
    }

    /// Router serving the site and the reload endpoint
    pub fn router(&self) -> Router {
        let state = Arc::new(ServerState {
            root: self.root.clone(),
            reload: self.reload.clone(),
        });

        Router::new()
            .route(RELOAD_ENDPOINT, get(reload::reload_websocket))
            .fallback(serve_path)
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Bind and start serving in the background
    pub async fn start(&self) -> Result<RunningServer> {
        let bind = format!("{}:{}", self.options.host, self.options.port);
        let listener = tokio::net::TcpListener::bind(&bind)
            .await
            .with_context(|| format!("failed to bind dev server to {bind}"))?;
        let addr = listener.local_addr()?;

        let app = self.router();
        let (shutdown, signal) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = signal.await;
                })
                .await
        });

        info!("Serving {} on http://{}", self.root.display(), addr);

        let server = RunningServer {
            addr,
            shutdown,
            task,
        };

        if self.options.open {
            if let Err(e) = webbrowser_open(&server.url()) {
                debug!("Failed to open browser: {}", e);
            }
        }

        Ok(server)
    }
}

/// Serve a file from the site root; HTML pages get the reload client
async fn serve_path(State(state): State<Arc<ServerState>>, request: Request) -> Response {
    let cleaned = clean_path(request.uri().path());
    let mut file_path = state.root.join(cleaned.trim_start_matches('/'));

    if file_path.is_dir() {
        file_path = file_path.join("index.html");
    }

    let is_html = matches!(
        file_path.extension().and_then(|e| e.to_str()),
        Some("html" | "htm")
    );

    if is_html && file_path.is_file() {
        return match tokio::fs::read_to_string(&file_path).await {
            Ok(content) => Html(inject_reload_client(&content)).into_response(),
            Err(e) => {
                error!("Failed to read {}: {}", file_path.display(), e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read file").into_response()
            }
        };
    }

    match ServeDir::new(&state.root).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

/// Inject the reload client script into HTML
pub fn inject_reload_client(html: &str) -> String {
    let script = format!(
        r#"
<script type="module">
// Live reload client
(function() {{
  const ws = new WebSocket(`ws://${{location.host}}{RELOAD_ENDPOINT}`);

  ws.onmessage = function(event) {{
    const message = JSON.parse(event.data);

    switch (message.type) {{
      case 'full-reload':
        console.log('[reload] Full reload:', message.reason);
        location.reload();
        break;

      case 'css-update':
        console.log('[reload] CSS update:', message.path);
        document.querySelectorAll('link[rel="stylesheet"]').forEach(link => {{
          const url = new URL(link.href);
          url.searchParams.set('t', Date.now());
          link.href = url.toString();
        }});
        break;

      case 'connected':
        console.log('[reload] Connected');
        break;
    }}
  }};

  ws.onclose = function() {{
    console.log('[reload] Disconnected, reloading when the server is back...');
    setTimeout(() => location.reload(), 1000);
  }};
}})();
</script>
"#
    );

    // Insert before </body> or at the end
    if let Some(pos) = html.rfind("</body>") {
        let mut result = html.to_string();
        result.insert_str(pos, &script);
        result
    } else {
        format!("{}{}", html, script)
    }
}

/// Open URL in the default browser
fn webbrowser_open(url: &str) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", url])
            .spawn()?;
    }

    Ok(())
}
