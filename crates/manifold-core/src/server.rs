//! # HTTP Server
//!
//! Hyper/Tokio transport in front of the application dispatcher.
//! Handles the socket, per-connection tasks and graceful shutdown; all
//! routing, middleware and handler logic lives in [`App`].

use crate::app::App;
use crate::error::{Error, Result};
use crate::request::Request;
use crate::response::Response;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::StatusCode;
use hyper_util::rt::TokioIo;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// HTTP server wrapping a fully built [`App`]
pub struct Server {
    app: App,
}

impl Server {
    /// Create a server over the given application
    #[must_use]
    pub fn new(app: App) -> Self {
        Self { app }
    }

    /// Bind, start lifecycle callbacks and serve until shutdown
    ///
    /// Marks the application built (closing route and middleware
    /// registration), runs valve app-start callbacks, schedules
    /// background tasks, then accepts connections until ctrl-c. Open
    /// connections are drained within the configured shutdown timeout
    /// and valve app-stop callbacks run last.
    ///
    /// # Errors
    ///
    /// [`Error::Bind`] when the address cannot be bound; valve app-start
    /// failures propagate before any connection is accepted.
    pub async fn serve(mut self) -> Result<()> {
        let addr = self.app.config().address;
        let max_body_size = self.app.config().max_body_size;
        let shutdown_timeout = self.app.config().shutdown_timeout;

        let socket = tokio::net::TcpSocket::new_v4()?;
        socket.set_reuseaddr(true)?;
        #[cfg(not(windows))]
        {
            socket.set_reuseport(true)?;
        }
        socket.bind(addr).map_err(|source| Error::Bind {
            address: addr.to_string(),
            source,
        })?;
        let listener = socket.listen(1024)?;

        let task_handles = self.app.start()?;
        let app = Arc::new(self.app);
        let active = Arc::new(AtomicUsize::new(0));

        info!(environment = %app.config().environment, "Server listening on http://{}", addr);

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    let (stream, remote_addr) = accept_result?;
                    let io = TokioIo::new(stream);

                    let app = app.clone();
                    let active = active.clone();

                    tokio::task::spawn(async move {
                        active.fetch_add(1, Ordering::Relaxed);

                        if let Err(err) = http1::Builder::new()
                            .serve_connection(io, service_fn(move |req| {
                                let app = app.clone();
                                async move {
                                    handle_request(req, &app, remote_addr, max_body_size).await
                                }
                            }))
                            .await
                        {
                            error!("Error serving connection: {:?}", err);
                        }
                        active.fetch_sub(1, Ordering::Relaxed);
                    });
                }
                () = shutdown_signal() => {
                    info!("Shutdown signal received, stopping server...");
                    break;
                }
            }
        }

        let drain = async {
            loop {
                if active.load(Ordering::Relaxed) == 0 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        let _ = tokio::time::timeout(shutdown_timeout, drain).await;

        for handle in task_handles {
            handle.abort();
        }
        app.stop();
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to install CTRL+C signal handler: {}", err);
    }
}

fn plain_status(status: StatusCode, body: &'static str) -> hyper::Response<Full<Bytes>> {
    hyper::Response::builder()
        .status(status)
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| hyper::Response::new(Full::new(Bytes::new())))
}

async fn handle_request(
    req: hyper::Request<hyper::body::Incoming>,
    app: &App,
    remote_addr: std::net::SocketAddr,
    max_body_size: usize,
) -> std::result::Result<hyper::Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let mut request = match Request::from_hyper_with_limit(req, max_body_size).await {
        Ok(r) => r,
        Err(Error::PayloadTooLarge { .. }) => {
            return Ok(plain_status(
                StatusCode::PAYLOAD_TOO_LARGE,
                "Payload Too Large",
            ));
        }
        Err(Error::MethodNotSupported { .. }) => {
            return Ok(plain_status(
                StatusCode::METHOD_NOT_ALLOWED,
                "Method Not Allowed",
            ));
        }
        Err(e) => {
            error!("Failed to parse request: {}", e);
            return Ok(plain_status(StatusCode::BAD_REQUEST, "Bad Request"));
        }
    };

    request.set_header("x-client-ip", &remote_addr.ip().to_string());
    let response: Response = app.dispatch(request).await;

    info!(
        "    {} - \"{} {}\" {}",
        remote_addr, method, path, response.status
    );
    Ok(response.into_hyper())
}
