//! imdb-provision: create the IMDb database and bulk-load the TSV dumps.

use imdb_loader::cli::ProvisionCli;
use imdb_loader::decompress::run_decompression_script;
use imdb_loader::error::Result;
use imdb_loader::provision::{provision, DatabaseStatus};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // A missing .env is fine; PG* variables may come from the shell instead.
    dotenvy::dotenv().ok();
    let cli = ProvisionCli::parse_args();
    cli.log.init();

    if let Err(e) = run(cli).await {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run(cli: ProvisionCli) -> Result<()> {
    let admin_config = cli.connection.connection_config(&cli.admin_db)?;

    if let Some(script) = cli.script() {
        run_decompression_script(script).await;
    }

    let report = provision(&admin_config, &cli.options()).await?;

    if report.database == Some(DatabaseStatus::Created) {
        info!("Database '{}' was created by this run", cli.target_db);
    }
    report.log_summary();
    Ok(())
}
