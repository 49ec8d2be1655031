//! Ownership of the upstream HTTP connection.
//!
//! The connection is created lazily on first use, re-created once it is older
//! than its max age, and dropped when a request reports a transport failure.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::InvocationError;

/// Request timeout for one upstream call, including the full stream.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug)]
enum ConnectionState {
    Connected {
        client: reqwest::Client,
        established_at: Instant,
    },
    Disconnected,
}

impl ConnectionState {
    fn name(&self) -> &'static str {
        match self {
            ConnectionState::Connected { .. } => "connected",
            ConnectionState::Disconnected => "disconnected",
        }
    }
}

#[derive(Debug)]
pub struct ConnectionManager {
    state: Mutex<ConnectionState>,
    max_age: Duration,
}

impl ConnectionManager {
    pub fn new(max_age: Duration) -> Self {
        Self {
            state: Mutex::new(ConnectionState::Disconnected),
            max_age,
        }
    }

    /// `"connected"` or `"disconnected"`.
    pub async fn state(&self) -> &'static str {
        self.state.lock().await.name()
    }

    /// A live client, connecting first if there is none or it has gone stale.
    pub async fn client(&self) -> Result<reqwest::Client, InvocationError> {
        let mut state = self.state.lock().await;
        if let ConnectionState::Connected {
            client,
            established_at,
        } = &*state
        {
            if established_at.elapsed() < self.max_age {
                return Ok(client.clone());
            }
            debug!(age_secs = established_at.elapsed().as_secs(), "connection stale");
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| InvocationError::Connection(e.to_string()))?;
        *state = ConnectionState::Connected {
            client: client.clone(),
            established_at: Instant::now(),
        };
        info!("upstream connection established");
        Ok(client)
    }

    pub async fn mark_disconnected(&self, reason: &str) {
        let mut state = self.state.lock().await;
        if matches!(*state, ConnectionState::Connected { .. }) {
            warn!(reason, "upstream connection dropped");
        }
        *state = ConnectionState::Disconnected;
    }
}
