use sunscan_warehouse::QueryGuardrails;

use crate::cli::{Cli, SqlArgs};
use crate::error::CliError;

pub fn run(cli: &Cli, args: &SqlArgs) -> Result<(), CliError> {
    let warehouse = super::open_warehouse(cli)?;

    let guardrails = QueryGuardrails {
        max_rows: args.max_rows,
        query_timeout_ms: args.query_timeout_ms,
    };
    let result = warehouse.execute_query(&args.query, guardrails, args.write)?;

    super::render(&result, cli.pretty)
}
