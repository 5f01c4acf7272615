//! # heat_stack
//!
//! Stack reconciliation and failure inspection for heatctl.
//!
//! This crate drives a named Heat stack to a desired lifecycle state and,
//! when things go wrong, walks the stack's resource tree to collect the
//! failed resources together with their software-deployment output.
//!
//! ## Features
//!
//! - Idempotent create/delete with polling until a terminal status
//! - Deadline-bounded, cancellable waiting between polls
//! - Template and environment loading with local file references
//! - Nested failure walk with a configurable failure-matching policy
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use heat_api::{Credentials, KeystoneSession, SessionProvider};
//! use heat_stack::{ReconcilerConfig, StackReconciler, StackRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let credentials = Credentials::new("admin", "secret", "demo", "http://keystone:5000/v3");
//!     let client = KeystoneSession::new().authenticate(&credentials).await?;
//!
//!     let reconciler = StackReconciler::new(Arc::new(client), ReconcilerConfig::default());
//!     let request = StackRequest::present("web", "templates/web.yaml").timeout_secs(600);
//!
//!     let outcome = reconciler.ensure(&request, &CancellationToken::new()).await?;
//!     println!("changed: {}", outcome.changed);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod inspector;
pub mod poll;
pub mod reconciler;
pub mod request;
pub mod template;

pub use config::{FailureMatch, ReconcilerConfig, DEFAULT_MAX_NESTED_DEPTH, DEFAULT_POLL_INTERVAL};
pub use error::{StackError, StackResult};
pub use inspector::{DebugReport, FailedResource, FailureInspector};
pub use poll::Poller;
pub use reconciler::{EnsureOutcome, StackReconciler};
pub use request::{DesiredState, StackRequest, DEFAULT_TIMEOUT};
pub use template::{TemplateLoader, TemplatePayload};
