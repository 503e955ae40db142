//! Integration test harness for the pickup token service.
//!
//! [`TestServer`] serves the real router on an ephemeral port, backed by
//! in-memory collaborators that tests can seed and inspect directly.
//!
//! # Running Tests
//!
//! ```bash
//! # In-process server tests
//! cargo test -p pickup-integration-tests
//!
//! # Tests against a running server (PICKUP_BASE_URL)
//! cargo test -p pickup-integration-tests -- --ignored
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;

use pickup_server::config::ServerConfig;
use pickup_server::routes;
use pickup_server::services::memory::MemoryFixture;
use pickup_server::services::{Clock, MonotonicClock};
use pickup_server::state::AppState;

pub use pickup_server::services::memory::{CUSTOMER_CREDENTIAL, OWNER_CREDENTIAL};

/// Base URL of an externally started server.
#[must_use]
pub fn live_base_url() -> String {
    std::env::var("PICKUP_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// The router served on `127.0.0.1:<ephemeral>`. Stops when dropped.
pub struct TestServer {
    pub fixture: MemoryFixture,
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a server using the monotonic clock.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    pub async fn spawn() -> Self {
        Self::spawn_with_clock(Arc::new(MonotonicClock::new())).await
    }

    /// Start a server using `clock` for issuance timestamps.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    pub async fn spawn_with_clock(clock: Arc<dyn Clock>) -> Self {
        let fixture = MemoryFixture::new().await;
        let state = AppState::new(ServerConfig::for_local(), &fixture.collaborators(clock));
        let app = routes::router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Listener has no address");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Test server failed");
        });

        Self {
            fixture,
            addr,
            handle,
        }
    }

    /// Absolute URL for `path` on this server.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
