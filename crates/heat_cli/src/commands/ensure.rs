//! Present / absent states - converge the stack.

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;

use heat_stack::{DesiredState, StackReconciler};

use super::Cli;
use crate::output::ResultRecord;

pub async fn execute(
    cli: &Cli,
    desired_state: DesiredState,
    cancel: &CancellationToken,
) -> Result<ResultRecord> {
    // Reject bad input before talking to Keystone.
    let request = cli.stack_request(desired_state)?;
    let client = cli.auth.connect().await?;

    let reconciler = StackReconciler::new(client, cli.reconciler_config());
    let outcome = reconciler.ensure(&request, cancel).await?;

    info!(
        "Stack {} is {} (changed: {})",
        request.name,
        desired_state.as_str(),
        outcome.changed
    );
    Ok(ResultRecord::from_outcome(desired_state.as_str(), outcome))
}
