//! A throwaway HTTP backend for transport tests.

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// An axum router served on an ephemeral localhost port.
///
/// The server task is aborted when the value is dropped.
pub struct MockBackend {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl MockBackend {
    /// Serve `router` on `127.0.0.1:0`.
    pub async fn spawn(router: Router) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind mock backend");
        let addr = listener.local_addr().expect("mock backend has no address");

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                eprintln!("mock backend stopped: {}", e);
            }
        });

        Self { addr, handle }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL to hand to the client, e.g. `http://127.0.0.1:49152`.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
