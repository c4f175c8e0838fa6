use anyhow::Result;
use clap::Parser;
use colored::*;
use std::time::Duration;

use testing_tools::health_client::HealthClient;
use testing_tools::output::{print_health, print_test_summary};
use testing_tools::scenarios;
use testing_tools::sse_client::Connection;

#[derive(Parser)]
#[command(name = "relay-test-client")]
#[command(about = "SSE Relay Integration Testing Tool")]
struct Cli {
    /// Base URL of the relay (e.g., http://localhost:8080)
    #[arg(long, default_value = "http://localhost:8080")]
    base_url: String,

    /// Test scenario to run
    #[arg(long, value_enum, default_value = "all")]
    scenario: ScenarioChoice,

    /// Number of events to wait for in the receive test
    #[arg(long, default_value_t = 3)]
    count: usize,

    /// Seconds to wait for each relayed event
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// The relay's keep-alive interval in seconds
    #[arg(long, default_value_t = 15)]
    keep_alive_secs: u64,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

#[derive(clap::ValueEnum, Clone)]
enum ScenarioChoice {
    /// Connect and check the relay counts the client
    ConnectionTest,
    /// Receive events from the upstream through the relay
    ReceiveEvents,
    /// Check two clients receive the same event
    FanOut,
    /// Disconnect one client and check the other keeps receiving
    ClientChurn,
    /// Wait for a keep-alive comment
    KeepAlive,
    /// Run all tests
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    }

    let timeout = Duration::from_secs(cli.timeout_secs);

    println!("{}", "=== SETUP PHASE ===".bright_white().bold());

    let health = HealthClient::new(reqwest::Client::new(), cli.base_url.clone());
    println!("{} Checking relay at {}...", "→".blue(), cli.base_url);
    print_health(&health.fetch().await?);

    println!("\n{} Establishing SSE connections...", "→".blue());
    let mut sse1 = Connection::establish(&cli.base_url, "Client 1".to_string()).await?;
    let mut sse2 = Connection::establish(&cli.base_url, "Client 2".to_string()).await?;
    println!("{} Client 1 SSE connection established", "✓".green());
    println!("{} Client 2 SSE connection established", "✓".green());

    // Let both streams reach the relay before asserting on its counters
    tokio::time::sleep(Duration::from_millis(500)).await;

    println!("\n{}", "=== TEST PHASE ===".bright_white().bold());

    let mut results = Vec::new();

    match cli.scenario {
        ScenarioChoice::ConnectionTest => {
            results.push(scenarios::test_connection(&health, &mut sse1).await?);
        }
        ScenarioChoice::ReceiveEvents => {
            results.push(
                scenarios::test_receive_events(&health, &mut sse1, cli.count, timeout).await?,
            );
        }
        ScenarioChoice::FanOut => {
            results.push(scenarios::test_fan_out(&mut sse1, &mut sse2, timeout).await?);
        }
        ScenarioChoice::ClientChurn => {
            results.push(scenarios::test_client_churn(&health, sse1, &mut sse2, timeout).await?);
        }
        ScenarioChoice::KeepAlive => {
            results.push(
                scenarios::test_keep_alive(&mut sse1, Duration::from_secs(cli.keep_alive_secs))
                    .await?,
            );
        }
        ScenarioChoice::All => {
            results.push(scenarios::test_connection(&health, &mut sse1).await?);
            results.push(
                scenarios::test_receive_events(&health, &mut sse1, cli.count, timeout).await?,
            );
            results.push(scenarios::test_fan_out(&mut sse1, &mut sse2, timeout).await?);
            results.push(
                scenarios::test_keep_alive(&mut sse2, Duration::from_secs(cli.keep_alive_secs))
                    .await?,
            );
            results.push(scenarios::test_client_churn(&health, sse1, &mut sse2, timeout).await?);
        }
    }

    // Print summary
    println!("\n{}", "=== RESULTS ===".bright_white().bold());
    print_test_summary(&results);

    let all_passed = results.iter().all(|r| r.passed);

    if all_passed {
        println!("\n{}", "All tests passed! ✓".bright_green().bold());
    } else {
        println!("\n{}", "Some tests failed! ✗".bright_red().bold());
    }

    std::process::exit(if all_passed { 0 } else { 1 });
}
