use std::process::ExitCode;
use switchboard_probe::{EXIT_CONFIGURATION, EXIT_FAILURE, ProbeConfig, init_logging, livekit, run_probe};

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let config = match ProbeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            return ExitCode::from(EXIT_CONFIGURATION);
        }
    };

    let output = match run_probe(&config.telephony, livekit).await {
        Ok(output) => output,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(e.exit_code());
        }
    };

    match serde_json::to_string_pretty(&output) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("failed to encode probe output: {e}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}
