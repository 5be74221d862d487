use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use case_export::config::ExportConfig;
use case_export::sink::S3ObjectStorage;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "case_export=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match ExportConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e.safe_message());
            return ExitCode::FAILURE;
        }
    };

    let storage = S3ObjectStorage::from_env(&config.aws_region);

    match case_export::run(config, &storage).await {
        Ok(summary) => {
            info!(
                "Exported {} cases to {}",
                summary.record_count, summary.destination
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e.safe_message());
            ExitCode::FAILURE
        }
    }
}
