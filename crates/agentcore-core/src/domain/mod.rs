//! Domain model for AgentCore deployments.

pub mod error;
pub mod session;
pub mod status;
pub mod target;

pub use error::{DeployError, Result};
pub use session::{SessionId, SessionIdError, DEFAULT_SESSION_ID, MIN_SESSION_ID_LEN};
pub use status::{BuildStatus, RuntimeStatus};
pub use target::{DeploymentTarget, ExecutionIdentity, ImageReference, RuntimeInstance};
