//! Debug state - failed resources and their deployment output.

use anyhow::Result;
use tracing::warn;

use heat_stack::FailureInspector;

use super::Cli;
use crate::output::ResultRecord;

pub async fn execute(cli: &Cli) -> Result<ResultRecord> {
    let name = cli.stack_name()?;
    let client = cli.auth.connect().await?;
    let report = FailureInspector::new(client, cli.reconciler_config())
        .debug(name)
        .await?;

    if report.is_empty() {
        warn!("No failed resources found in stack {}", name);
    }
    Ok(ResultRecord::new("debug").with_report(report))
}
