//! Server startup and binding
//!
//! Provides functionality to start the Axum server with configurable host/port.

use std::sync::Arc;

use axum::Router;
use reqwest::Client;
use tape::FallbackChain;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::routes::{self, AppState};

/// Server instance that can be started
#[derive(Debug)]
pub struct Server {
    /// Server configuration
    config: Arc<ServerConfig>,
    /// The built router
    router: Router,
}

impl Server {
    /// Create a server with the standard provider chain.
    pub fn new(config: ServerConfig) -> Result<Self, reqwest::Error> {
        let mut client = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            client = client.timeout(timeout);
        }
        let chain = FallbackChain::standard(client.build()?, &config.credentials());
        Ok(Self::with_chain(config, chain))
    }

    /// Create a server around an existing provider chain.
    pub fn with_chain(config: ServerConfig, chain: FallbackChain) -> Self {
        let config = Arc::new(config);
        let router = routes::build_router(AppState::new(config.clone(), chain));

        Self { config, router }
    }

    /// Get the address string the server will bind to
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Run the server until ctrl-c.
    pub async fn run(self) -> Result<(), std::io::Error> {
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        self.run_with_listener(listener).await
    }

    /// Run the server with a specific listener
    ///
    /// This is useful for testing where you want to use a listener bound to port 0
    /// to get a random available port.
    pub async fn run_with_listener(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }

    /// Create a test server and return the bound address
    #[cfg(test)]
    pub(crate) async fn spawn_test_server(
        config: ServerConfig,
        chain: FallbackChain,
    ) -> (std::net::SocketAddr, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = Self::with_chain(config, chain);
        let handle = tokio::spawn(async move {
            server.run_with_listener(listener).await.ok();
        });

        (addr, handle)
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
