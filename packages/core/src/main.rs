use std::process;
use std::sync::Arc;

use clap::Parser;
use dotenvy::dotenv;
use meal_resilience::capture::{GlobalFailureCapture, HostSignals};
use meal_resilience::cli::{Cli, Command};
use meal_resilience::config::{Config, DEFAULT_LOG_LEVEL};
use meal_resilience::error::CoreResult;
use meal_resilience::failure::AsRawFailure;
use meal_resilience::handler::{ErrorHandler, HandleOptions, HandlerSettings};
use meal_resilience::logging::init_logging;
use meal_resilience::notify::LogNotifier;
use meal_resilience::registry::DEFAULT_CAPACITY;
use meal_resilience::reporter::{ErrorReporter, ReportContext, WebhookSink};
use meal_resilience::retry::{retry_transient, RetryOptions};
use meal_resilience::storage::FileStore;

#[tokio::main]
async fn main() {
    dotenv().ok();
    let cli = Cli::parse();

    let config = Config::from_env().unwrap_or_else(|err| {
        init_logging(DEFAULT_LOG_LEVEL);
        tracing::error!("{}", err);
        process::exit(1);
    });
    init_logging(&config.log_level);

    match run(cli, config).await {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(err) => {
            tracing::error!("{}", err);
            process::exit(1);
        }
    }
}

/// Returns `Ok(false)` when the command ran but its target failed.
async fn run(cli: Cli, config: Config) -> CoreResult<bool> {
    let store = FileStore::open(&config.report_dir)?;
    let mut reporter = ErrorReporter::new(Arc::new(store));
    if let Some(url) = &config.webhook_url {
        tracing::info!("Forwarding error reports to {}", url);
        reporter = reporter.with_sink(Arc::new(WebhookSink::new(url.clone())));
    }
    let reporter = Arc::new(reporter);

    let handler = ErrorHandler::with_settings(
        Arc::new(LogNotifier),
        HandlerSettings {
            registry_capacity: DEFAULT_CAPACITY,
            notification_duration: config.notification_duration,
        },
    );
    let capture = GlobalFailureCapture::new(reporter.clone());
    handler.install_global_capture(&capture, &HostSignals::process());
    HostSignals::forward_panics();

    match cli.command {
        Command::Reports { limit } => {
            let reports = reporter.reports()?;
            let skip = limit.map_or(0, |limit| reports.len().saturating_sub(limit));
            for report in reports.iter().skip(skip) {
                println!("{}", serde_json::to_string(report)?);
            }
            Ok(true)
        }
        Command::ClearReports => {
            reporter.clear()?;
            tracing::info!("Cleared persisted error reports");
            Ok(true)
        }
        Command::Probe {
            url,
            max_retries,
            base_delay_ms,
        } => {
            let options = RetryOptions::default()
                .with_max_retries(max_retries.unwrap_or(config.max_retries))
                .with_base_delay(
                    base_delay_ms
                        .map(std::time::Duration::from_millis)
                        .unwrap_or(config.base_delay),
                )
                .with_retry_predicate(retry_transient)
                .with_handling(
                    HandleOptions::default()
                        .with_title("Probe failed")
                        .with_retryable(true),
                );

            reporter.set_location(url.clone());
            let http = reqwest::Client::new();
            let outcome = handler
                .execute_with_retry(
                    || {
                        let request = http.get(url.as_str());
                        async move { request.send().await?.error_for_status() }
                    },
                    options,
                )
                .await;

            match outcome {
                Ok(response) => {
                    println!("OK {} {}", response.status(), url);
                    Ok(true)
                }
                Err(err) => {
                    let error = handler
                        .recent_errors()
                        .pop()
                        .unwrap_or_else(|| handler.classify(Some(&err.as_raw_failure())));
                    reporter.report(&error, ReportContext::custom("probe"));
                    println!("{}", serde_json::to_string_pretty(&error)?);
                    Ok(false)
                }
            }
        }
    }
}
