use chrono::Utc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod github;
mod model;
mod report;
mod service;

use github::{FetchError, GithubClient};
use model::{Config, ConfigError};
use service::TriageService;

#[derive(Debug, thiserror::Error)]
enum TriageError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),
}

async fn run() -> Result<(), TriageError> {
    let config = Config::from_env()?;
    let host = GithubClient::new(config.github_token.clone());

    let service = TriageService::new(&host, &config);
    let outcome = service.run(Utc::now()).await?;
    let rendered = report::build_report(&outcome, &config);
    println!("{rendered}");

    if let Some(ledger) = &config.ledger {
        report::publish_to_ledger(&host, &config.star_owner, ledger, &rendered).await?;
        println!(
            "\nUpdated ledger issue: {}/{}#{}",
            config.star_owner, ledger.repo, ledger.issue
        );
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    // Load .env file if present (ignore if missing)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "Triage run failed");
        std::process::exit(1);
    }
}
