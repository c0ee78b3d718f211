use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use error_stack::ResultExt;
use sheets_relay::adapters::gmail::gmail_client::GmailMailer;
use sheets_relay::adapters::sheets::auth::GoogleCredentials;
use sheets_relay::adapters::sheets::http_client::http_client;
use sheets_relay::adapters::sheets::spreadsheet_manager::SpreadsheetManager;
use sheets_relay::application::notifier::FailureNotifier;
use sheets_relay::application::throttle::RequestThrottle;
use sheets_relay::application::workbook_service::WorkbookService;
use sheets_relay::cli::{self, CommandError};
use sheets_relay::config::{AppConfig, NotificationConfig};
use sheets_relay::prettyprint::prettyprint::PrettyFormatter;
use sheets_relay::{render_report, ExceptionChain};
use tracing::{error, info, instrument, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Registry};

#[tokio::main(flavor = "current_thread")]
#[instrument]
async fn main() -> ExitCode {
    if let Err(e) = setup_tracing() {
        eprintln!("Failed to set up logging: {e}");
        return ExitCode::FAILURE;
    }
    setup_panic_hook();

    let args: Vec<String> = env::args().collect();
    let command = match cli::parse_args(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };

    info!("Starting sheets-relay");

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(report) => {
            error!("Configuration failed: {:?}", report);
            return ExitCode::FAILURE;
        }
    };

    match run(command, &config).await {
        Ok(output) => {
            println!("{output}");
            info!("Execution completed successfully");
            ExitCode::SUCCESS
        }
        Err(report) => {
            error!("Execution failed: {:?}", report);
            if let Some(chain) = report.downcast_ref::<ExceptionChain>() {
                eprintln!("{}", render_report(chain));
                if let Some(notification) = &config.notification {
                    send_failure_report(&config, notification, chain).await;
                }
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(command: cli::Command, config: &AppConfig) -> error_stack::Result<String, CommandError> {
    let client = http_client().change_context(CommandError::Setup)?;
    let credentials = GoogleCredentials::connect(&config.google.auth, client.clone())
        .await
        .change_context(CommandError::Setup)?;

    let throttle = RequestThrottle::from_secs_f64(config.google.request_delay_secs)
        .change_context(CommandError::Setup)
        .attach_printable("google.request_delay_secs must be a finite, non-negative number")?;

    let manager = SpreadsheetManager::new(client, &credentials);
    let mut service = WorkbookService::new(manager, throttle);
    if let Some(library) = &config.google.data_library_id {
        service = service.with_data_library(library.clone());
    }

    cli::execute(command, &Arc::new(service), &config.exports).await
}

async fn send_failure_report(
    config: &AppConfig,
    notification: &NotificationConfig,
    chain: &ExceptionChain,
) {
    let client = match http_client() {
        Ok(client) => client,
        Err(e) => {
            warn!("Failure report not sent, no HTTP client: {e}");
            return;
        }
    };
    let credentials = match GoogleCredentials::connect(&config.google.auth, client).await {
        Ok(credentials) => credentials,
        Err(report) => {
            warn!("Failure report not sent, no credentials: {:?}", report);
            return;
        }
    };

    let mailer = GmailMailer::new(
        reqwest::Client::new(),
        credentials,
        config.google.gmail_user.clone(),
    );
    let notifier = FailureNotifier::new(mailer, &notification.from, &notification.to);

    match notifier.notify(chain, &notification.subject).await {
        Ok(message_id) => info!("Failure report sent as message {}", message_id),
        Err(report) => match report.downcast_ref::<ExceptionChain>() {
            Some(mail_chain) => error!(
                "Failure report could not be sent:\n{}",
                render_report(mail_chain)
            ),
            None => error!("Failure report could not be sent: {:?}", report),
        },
    }
}

fn setup_tracing() -> Result<(), Box<dyn std::error::Error>> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .event_format(PrettyFormatter::new(true))
        .with_writer(std::io::stderr);

    let log_file_layer = tracing_subscriber::fmt::layer()
        .event_format(PrettyFormatter::new(false))
        .with_writer(std::fs::File::create("sheets_relay.log")?)
        .with_ansi(false);

    Registry::default()
        .with(
            tracing_subscriber::filter::Targets::new()
                .with_target("sheets_relay", tracing::Level::TRACE),
        )
        .with(log_file_layer)
        .with(stderr_layer)
        .init();

    Ok(())
}

fn setup_panic_hook() {
    tracing::trace!("Setting panic hook");
    std::panic::set_hook(Box::new(|info| {
        tracing::error!("panic: {info}");
    }));
}
