mod cli;

use crate::cli::{LogFormatArg, CLI};
use clap::Parser;
use reserva_service::{ReservationService, Reserver};
use reserva_storage::MySqlStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::try_parse()?;
    init_tracing(config.log_format);

    info!(log_format = %config.log_format, "starting reservation cleanup");

    let store = MySqlStore::connect(&config.mysql_dsn).await?;
    if config.ensure_schema {
        store.ensure_schema().await?;
    }

    let removed = ReservationService::new(store).cleanup().await?;
    info!(removed, "reservation cleanup finished");

    Ok(())
}

fn init_tracing(format: LogFormatArg) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormatArg::Pretty => builder.init(),
        LogFormatArg::Json => builder.json().init(),
    }
}
