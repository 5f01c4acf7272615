//! List state - stacks visible to the project.

use anyhow::Result;

use heat_stack::StackReconciler;

use super::Cli;
use crate::output::ResultRecord;

pub async fn execute(cli: &Cli) -> Result<ResultRecord> {
    let client = cli.auth.connect().await?;
    let stacks = StackReconciler::new(client, cli.reconciler_config())
        .list()
        .await?;

    Ok(ResultRecord::new("list").with_stack_list(stacks))
}
