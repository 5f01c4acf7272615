//! # heat_api
//!
//! Typed bindings for the two OpenStack services heatctl talks to.
//!
//! This crate owns the boundary with the outside world: Keystone token
//! exchange, the Heat orchestration endpoint, and the explicit mapping from
//! wire JSON to the typed records the rest of the workspace works with.
//!
//! # Features
//!
//! - **Session Provider**: Keystone v2.0 / v3 password authentication with
//!   service catalog lookup
//! - **Heat Client**: stack, resource and software-deployment calls over HTTP
//! - **Read Retries**: bounded exponential backoff for idempotent reads only
//! - **clouds.yaml**: credential profiles in the usual OpenStack locations
//! - **Mock Client**: scripted status transitions for tests without a cloud
//!
//! # Example
//!
//! ```rust,no_run
//! use heat_api::{Credentials, KeystoneSession, OrchestrationClient, SessionProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let credentials = Credentials::new(
//!         "admin",
//!         "secret",
//!         "demo",
//!         "http://127.0.0.1:35357/v2.0/",
//!     );
//!
//!     let client = KeystoneSession::new().authenticate(&credentials).await?;
//!
//!     for stack in client.list_stacks().await? {
//!         println!("{} {}", stack.name, stack.status);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod heat;
pub mod mock;
pub mod models;
pub mod retry;
pub mod session;
mod wire;

pub use client::OrchestrationClient;
pub use config::{clouds_search_paths, load_cloud, Credentials, EndpointInterface};
pub use error::{ApiError, ApiResult};
pub use heat::HeatClient;
pub use mock::{CapturedCall, MockFailure, MockOrchestration};
pub use models::{
    DeploymentDiagnostic, ResourceRecord, StackAction, StackCreate, StackRecord, StackState,
    StackStatus,
};
pub use retry::{RetryPolicy, RetryingClient};
pub use session::{KeystoneSession, SessionProvider};
