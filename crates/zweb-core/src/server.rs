//! Static file server for fetched sites

use crate::{scratch, Result, SyncError};
use axum::Router;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::info;

struct Running {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

/// Serves one directory over HTTP until stopped
pub struct SiteServer {
    dir: PathBuf,
    running: Option<Running>,
}

impl SiteServer {
    /// Create a stopped server for `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            running: None,
        }
    }

    /// Bind `addr` and start serving in the background
    ///
    /// Returns the bound address, which differs from `addr` when port 0 is
    /// requested.
    pub async fn start(&mut self, addr: SocketAddr) -> Result<SocketAddr> {
        if let Some(running) = &self.running {
            return Err(SyncError::ServerAlreadyRunning(running.addr));
        }

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| SyncError::Server(format!("cannot bind {}: {}", addr, e)))?;
        let bound = listener.local_addr()?;

        let app = Router::new()
            .fallback_service(ServeDir::new(&self.dir).append_index_html_on_directories(true))
            .layer(TraceLayer::new_for_http());

        let (shutdown, signal) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    // A dropped sender also stops the server.
                    let _ = signal.await;
                })
                .await
        });

        info!(addr = %bound, dir = %self.dir.display(), "Site server listening");

        self.running = Some(Running {
            addr: bound,
            shutdown,
            task,
        });
        Ok(bound)
    }

    /// Stop serving and wait for in-flight requests; no-op when stopped
    pub async fn stop(&mut self) -> Result<()> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };

        let _ = running.shutdown.send(());
        match running.task.await {
            Ok(Ok(())) => {
                info!(addr = %running.addr, "Site server stopped");
                Ok(())
            }
            Ok(Err(e)) => Err(SyncError::Server(e.to_string())),
            Err(e) => Err(SyncError::Server(e.to_string())),
        }
    }

    /// Address the server is bound to, if running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|running| running.addr)
    }

    /// The served directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// A fetched site materialized in its scratch directory
///
/// Returned by [`crate::SiteSync::fetch`]. Serving and cleanup are explicit;
/// dropping the handle stops a running server but leaves the files.
pub struct SiteHandle {
    name: String,
    files: usize,
    server: SiteServer,
}

impl SiteHandle {
    pub(crate) fn new(name: impl Into<String>, dir: PathBuf, files: usize) -> Self {
        Self {
            name: name.into(),
            files,
            server: SiteServer::new(dir),
        }
    }

    /// Site name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Scratch directory holding the site
    pub fn dir(&self) -> &Path {
        self.server.dir()
    }

    /// Number of files written
    pub fn files(&self) -> usize {
        self.files
    }

    /// Serve on `127.0.0.1:<port>`
    pub async fn start(&mut self, port: u16) -> Result<SocketAddr> {
        self.start_on(SocketAddr::from((Ipv4Addr::LOCALHOST, port))).await
    }

    /// Serve on an explicit address
    pub async fn start_on(&mut self, addr: SocketAddr) -> Result<SocketAddr> {
        self.server.start(addr).await
    }

    /// Stop serving
    pub async fn stop(&mut self) -> Result<()> {
        self.server.stop().await
    }

    /// URL of the running server
    pub fn url(&self) -> Option<String> {
        self.server
            .local_addr()
            .map(|addr| format!("http://{}", addr))
    }

    /// Empty the scratch directory again
    pub async fn cleanup(&self) -> Result<()> {
        scratch::clear(self.dir()).await
    }
}
