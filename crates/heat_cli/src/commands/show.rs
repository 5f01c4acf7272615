//! Show state - one stack by name.

use anyhow::Result;

use heat_stack::StackReconciler;

use super::Cli;
use crate::output::ResultRecord;

pub async fn execute(cli: &Cli) -> Result<ResultRecord> {
    let name = cli.stack_name()?;
    let client = cli.auth.connect().await?;
    let stack = StackReconciler::new(client, cli.reconciler_config())
        .show(name)
        .await?;

    Ok(ResultRecord::new("show").with_stack(stack))
}
