use std::fs::File;
use std::sync::{Arc, Mutex};

use gradebook_core::{
    adapters::{config::app_config::AppConfig, sheets::spreadsheet_manager::SpreadsheetManager},
    application::{gradebook_service::GradebookService, resolver::resolve_spreadsheet},
    ports::spreadsheet_service::SpreadsheetService,
};
use tracing::{error, info, instrument, Level};
use tracing_subscriber::{
    filter::{LevelFilter, Targets},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    Layer, Registry,
};

mod cli_adapter;
mod menu;
mod prettyprint;

use cli_adapter::MenuLoop;
use prettyprint::PrettyFormatter;

#[tokio::main(flavor = "current_thread")]
#[instrument]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logging is not up yet, so configuration errors go straight to stderr.
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(report) => {
            eprintln!("{:?}", report);
            return Err(format!("configuration error: {}", report.current_context()).into());
        }
    };

    setup_tracing(&config)?;
    setup_panic_hook();

    info!("Starting gradebook CLI");

    let manager = SpreadsheetManager::authorize(&config.credentials_path)
        .await
        .map_err(|report| {
            error!("Authentication failed: {:?}", report);
            format!("authentication failed: {}", report.current_context())
        })?;
    let service: Arc<dyn SpreadsheetService> = Arc::new(manager);

    let spreadsheet = resolve_spreadsheet(
        service.as_ref(),
        &config.spreadsheet_name,
        config.share_to_email.as_deref(),
    )
    .await
    .map_err(|report| {
        error!("Could not resolve spreadsheet: {:?}", report);
        format!("{}", report.current_context())
    })?;

    let gradebook = GradebookService::new(service, spreadsheet);
    let stdin = std::io::stdin();
    let mut menu = MenuLoop::new(
        gradebook,
        config.total_classes,
        stdin.lock(),
        std::io::stdout(),
    );

    match menu.run().await {
        Ok(()) => {
            info!("Gradebook CLI finished");
            Ok(())
        }
        Err(report) => {
            error!("Menu loop failed: {:?}", report);
            Err(format!("{}", report.current_context()).into())
        }
    }
}

fn setup_tracing(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let level = config.log_level.parse::<Level>()?;

    let log_file_layer = tracing_subscriber::fmt::layer()
        .event_format(PrettyFormatter::new(false))
        .with_writer(Mutex::new(File::create(&config.log_file)?))
        .with_ansi(false)
        .with_filter(
            Targets::new()
                .with_target("gradebook", level)
                .with_target("gradebook_core", level),
        );

    let stderr_layer = tracing_subscriber::fmt::layer()
        .event_format(PrettyFormatter::new(true))
        .with_writer(std::io::stderr)
        .with_filter(LevelFilter::WARN);

    Registry::default()
        .with(log_file_layer)
        .with(stderr_layer)
        .try_init()?;

    Ok(())
}

fn setup_panic_hook() {
    tracing::trace!("Setting panic hook");
    std::panic::set_hook(Box::new(|info| {
        tracing::error!("panic: {info}");
    }));
}
