use std::path::PathBuf;

use clap::Parser;
use gbc_deposit_scripts::scripts;
use gbc_deposit_scripts::tracing as tracing_config;
use gbc_deposit_scripts::utils::read_env;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct ClaimArgs {
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

    let args = ClaimArgs::parse();
    tracing::debug!("Args: {:?}", args);

    let runtime =
        scripts::prelude::PipelineRuntime::init_from_env().expect("Failed to initialize pipeline runtime");

    let flags = scripts::incentive::Flags {
        dry_run: args.dry_run,
    };

    match scripts::incentive::run(&runtime, &args.deposit_data, &flags).await? {
        scripts::incentive::ClaimOutcome::Submitted(tx_hash) => {
            tracing::info!("Claim transaction sent: {}", hex::encode(tx_hash));
        }
        scripts::incentive::ClaimOutcome::DryRun => {
            tracing::info!("Dry run complete, no transaction sent");
        }
    }
    Ok(())
}
