//! The HTTP server: accept loop, body collection, CORS.

use std::net::SocketAddr;

use http_body_util::BodyExt;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::cors::CorsLayer;
use crate::router::{AppState, route};
use crate::{ApiError, BoxBody};

/// Configuration for the HTTP surface.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: SocketAddr,
    pub enable_cors: bool,
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8000".parse().expect("static address"),
            enable_cors: true,
            max_body_size: 1024 * 1024,
        }
    }
}

/// The queue API server.
pub struct QueueHttpServer {
    config: ServerConfig,
    state: AppState,
}

impl QueueHttpServer {
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Bind and serve until the task is dropped or aborted.
    pub async fn run(&self) -> std::io::Result<()> {
        let listener = TcpListener::bind(&self.config.bind_address).await?;
        info!("queue API listening on {}", self.config.bind_address);
        self.serve(listener).await
    }

    /// Serve connections from an existing listener (tests bind port 0).
    pub async fn serve(&self, listener: TcpListener) -> std::io::Result<()> {
        loop {
            let (stream, peer_addr) = listener.accept().await?;
            debug!(%peer_addr, "new connection");

            let state = self.state.clone();
            let config = self.config.clone();
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    handle_request(req, state.clone(), config.clone())
                });
                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    let message = err.to_string();
                    // Client disconnects mid-stream are routine, not errors.
                    if message.contains("connection closed") || message.contains("not connected") {
                        debug!("client disconnected: {message}");
                    } else {
                        error!("connection error: {message}");
                    }
                }
            });
        }
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    state: AppState,
    config: ServerConfig,
) -> Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let uri = req.uri().clone();
    debug!("handling {} {}", method, uri.path());

    let body = match req.into_body().collect().await {
        Ok(collected) => {
            let bytes = collected.to_bytes();
            if bytes.len() > config.max_body_size {
                let response = ApiError::bad_request("request body too large").into_response();
                return Ok(apply_cors(response, config.enable_cors));
            }
            bytes
        }
        Err(err) => {
            error!(%err, "failed to read request body");
            let response = ApiError::bad_request("unreadable request body").into_response();
            return Ok(apply_cors(response, config.enable_cors));
        }
    };

    let response = route(&state, &method, uri.path(), uri.query(), body).await;
    Ok(apply_cors(response, config.enable_cors))
}

fn apply_cors(mut response: Response<BoxBody>, enabled: bool) -> Response<BoxBody> {
    if enabled {
        CorsLayer::apply_cors_headers(response.headers_mut());
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address.port(), 8000);
        assert!(config.enable_cors);
        assert_eq!(config.max_body_size, 1024 * 1024);
    }
}
