mod cli;

use std::sync::Arc;

use ad_consent::consent::{HostDevice, HttpTransport};
use ad_consent::{ConsentInformation, SqliteStore, config};
use clap::Parser;
use cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    // Open consent store
    let store_path = config::store_path()?;
    let store = SqliteStore::open(&store_path)?;

    let info = Arc::new(ConsentInformation::new(
        Arc::new(store),
        Arc::new(HttpTransport::new()?),
        Arc::new(HostDevice::detect()),
    ));
    for device in &cli.test_devices {
        info.add_test_device(device.clone());
    }
    info.set_debug_geography(cli.debug_geo.into());

    match cli.command {
        Command::Update { publisher_ids, url } => {
            cli::update::update(&info, &publisher_ids, url.as_deref()).await?
        }
        Command::Status { format } => cli::status::status(&info, &format)?,
        Command::SetStatus { status } => cli::status::set_status(&info, status.into())?,
        Command::Providers => cli::providers::list_providers(&info)?,
        Command::TagUnderAge { value } => cli::status::tag_under_age(&info, value)?,
        Command::Device => cli::device::device_info(&info)?,
        Command::Form {
            privacy_url,
            app_name,
            personalized,
            non_personalized,
            ad_free,
        } => {
            let args = cli::form::FormArgs {
                privacy_url,
                app_name,
                personalized,
                non_personalized,
                ad_free,
            };
            let info = Arc::clone(&info);
            tokio::task::spawn_blocking(move || cli::form::run_form(info, args)).await??;
        }
        Command::Reset => cli::status::reset(&info)?,
    }

    Ok(())
}
