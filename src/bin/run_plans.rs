//! imdb-run-plans: run every SQL plan and write each result set to a text file.

use imdb_loader::cli::PlanCli;
use imdb_loader::db;
use imdb_loader::error::Result;
use imdb_loader::plans::run_plans;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // A missing .env is fine; PG* variables may come from the shell instead.
    dotenvy::dotenv().ok();
    let cli = PlanCli::parse_args();
    cli.log.init();

    if let Err(e) = run(cli).await {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run(cli: PlanCli) -> Result<()> {
    let config = cli.connection.connection_config(&cli.database)?;
    info!("Connecting to {}", config.display_string());
    let client = db::connect(&config).await?;

    let result = run_plans(client.as_ref(), &cli.options()).await;
    client.close().await?;
    result.map(|_| ())
}
