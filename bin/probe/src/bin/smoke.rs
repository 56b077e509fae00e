use std::process::ExitCode;
use switchboard_probe::{
    EXIT_CONFIGURATION, EXIT_FAILURE, ProbeConfig, agent_invoker, init_logging, livekit,
    smoke_harness, telephony_bridge,
};

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

    let agent = agent_invoker(&config.agent).map_err(|e| e.to_string());
    let telephony = telephony_bridge(&config.telephony, livekit).map_err(|e| e.to_string());
    let report = smoke_harness(agent, telephony).run_all().await;

    println!("{}", report.render());
    if let Err(e) = report.write_json(&config.smoke_report_path).await {
        tracing::warn!(error = %e, "failed to write smoke report");
    } else {
        println!("Report written to {}", config.smoke_report_path);
    }

    if report.all_passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_FAILURE)
    }
}
