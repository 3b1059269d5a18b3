use std::path::PathBuf;

use clap::Parser;
use gbc_deposit_scripts::scripts;
use gbc_deposit_scripts::tracing as tracing_config;
use gbc_deposit_scripts::utils::read_env;

// cargo run --bin submit -- --deposit-data ./deposit_data-1695902400.json --dry-run

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct SubmitArgs {
    #[clap(long)]
    deposit_data: PathBuf,
    #[clap(long, required = false, default_value = "false")]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_config::setup_logger(
        tracing_config::LoggingConfig::default()
            .with_thread_names(true)
            .use_format(read_env("LOG_FORMAT", tracing_config::LogFormat::Plain)),
    );

    let args = SubmitArgs::parse();
    tracing::debug!("Args: {:?}", args);

    let runtime =
        scripts::prelude::PipelineRuntime::init_from_env().expect("Failed to initialize pipeline runtime");

    let flags = scripts::submit::Flags {
        dry_run: args.dry_run,
    };

    let outcome = scripts::submit::run(&runtime, &args.deposit_data, &flags).await?;
    match outcome {
        scripts::submit::SubmitOutcome::Batched(tx_hash) => {
            tracing::info!("Batch deposit transaction sent: {}", hex::encode(tx_hash));
        }
        scripts::submit::SubmitOutcome::PerDeposit(results) => {
            for (index, result) in results.iter().enumerate() {
                match result {
                    Ok(tx_hash) => tracing::info!("Deposit {index} sent: {}", hex::encode(tx_hash)),
                    Err(error) => tracing::error!("Deposit {index} failed: {error}"),
                }
            }
        }
        scripts::submit::SubmitOutcome::DryRun => {
            tracing::info!("Dry run complete, no transactions sent");
        }
    }
    Ok(())
}
