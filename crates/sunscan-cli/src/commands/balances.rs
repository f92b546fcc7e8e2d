use std::sync::Arc;

use crate::cli::Cli;
use crate::error::CliError;

pub async fn run(cli: &Cli) -> Result<(), CliError> {
    let warehouse = Arc::new(super::open_warehouse(cli)?);
    let scanner = super::build_scanner(cli);

    tracing::info!(
        node_url = %cli.node_url,
        concurrency = cli.concurrency,
        "starting balance scan"
    );
    let report = scanner
        .scan_balances(warehouse.clone(), warehouse)
        .await?;

    super::render(&report, cli.pretty)
}
