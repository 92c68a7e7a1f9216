use anyhow::{Context, Result};
use clap::Parser;

use digiventures_sdk::config::{CliArgs, Command, Config};
use digiventures_sdk::models::{LegajoCreateData, LegajoUpdateData, Strategy};
use digiventures_sdk::DigiSdk;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    dotenvy::dotenv().ok();

    let args = CliArgs::parse();

    // Initialize logging with the configured level
    let log_level = args.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_args(&args)?;
    tracing::debug!(config = ?config, "Configuration loaded");

    let sdk = DigiSdk::new(config)?;

    match args.command {
        Command::Token => {
            let token = sdk.auth_manager().get_token().await?;
            let expires_at = sdk.auth_manager().expires_at().await;
            let api_version = sdk.auth_manager().get_api_version().await;

            tracing::info!("✅ Authentication successful");
            print_json(&serde_json::json!({
                "token": format!("{}...", token.chars().take(20).collect::<String>()),
                "expiration": expires_at.map(|e| e.to_rfc3339()),
                "apiVersion": api_version,
            }))?;
        }

        Command::Get { id } => {
            let legajo = sdk.legajo().get(&id).await?;
            print_json(&legajo)?;
        }

        Command::Create { data, strategy } => {
            let data: LegajoCreateData =
                serde_json::from_str(&data).context("Invalid legajo JSON")?;
            let strategy = strategy
                .map(|s| s.parse::<Strategy>())
                .transpose()?;
            let legajo = sdk.legajo().create(&data, strategy).await?;
            print_json(&legajo)?;
        }

        Command::Update { id, data } => {
            let data: LegajoUpdateData =
                serde_json::from_str(&data).context("Invalid update JSON")?;
            let legajo = sdk.legajo().update(&id, &data).await?;
            print_json(&legajo)?;
        }

        Command::LinkRecover { id } => {
            let link = sdk.legajo().get_link_recover(id).await?;
            print_json(&link)?;
        }

        Command::LinkApplicant { id } => {
            let link = sdk.legajo().get_link_applicant(id).await?;
            print_json(&link)?;
        }

        Command::File { url, output } => {
            let file = sdk.get_file(&url).await?;
            match output {
                Some(path) => {
                    let bytes = file.decode()?;
                    tokio::fs::write(&path, &bytes)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    tracing::info!("✅ Wrote {} bytes to {}", bytes.len(), path.display());
                }
                None => println!("{}", file.file),
            }
        }
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
