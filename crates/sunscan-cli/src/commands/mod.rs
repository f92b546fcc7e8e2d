mod balances;
mod metadata;
mod sql;

use std::sync::Arc;

use sunscan_core::{ReqwestHttpClient, RpcClient, Scanner};
use sunscan_warehouse::{Warehouse, WarehouseConfig};

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn run(cli: &Cli) -> Result<(), CliError> {
    match &cli.command {
        Command::Metadata => metadata::run(cli).await,
        Command::Balances => balances::run(cli).await,
        Command::Sql(args) => sql::run(cli, args),
    }
}

fn open_warehouse(cli: &Cli) -> Result<Warehouse, CliError> {
    let config = match &cli.db_path {
        Some(path) => WarehouseConfig::at(path),
        None => WarehouseConfig::default(),
    };
    Ok(Warehouse::open(config)?)
}

fn build_scanner(cli: &Cli) -> Scanner {
    let config = cli.scraper_config();
    let rpc = RpcClient::new(&config.node_url, Arc::new(ReqwestHttpClient::new()))
        .with_policy(config.retry);
    Scanner::new(rpc).with_concurrency(config.concurrency)
}

fn render<T: serde::Serialize>(value: &T, pretty: bool) -> Result<(), CliError> {
    let output = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{output}");
    Ok(())
}
