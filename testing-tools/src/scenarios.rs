use anyhow::Result;
use colored::*;
use std::time::{Duration, Instant};

use crate::health_client::HealthClient;
use crate::output::{print_event, print_health, TestResult};
use crate::sse_client::{Connection, Event};

pub async fn test_connection(health: &HealthClient, sse: &mut Connection) -> Result<TestResult> {
    let start = Instant::now();

    println!("\n{}", "=== TEST: Connection ===".bright_cyan().bold());

    println!("{} Checking relay health...", "→".blue());
    let status = health.fetch().await?;
    print_health(&status);

    if status.clients == 0 {
        println!("{} Relay reports no clients!", "✗".red());
        return Ok(TestResult::fail(
            "connection",
            format!("{} is connected but the relay counts 0 clients", sse.label),
            start.elapsed(),
        ));
    }
    if !status.upstream_connected {
        println!("{} Relay is not pursuing its upstream!", "✗".red());
        return Ok(TestResult::fail(
            "connection",
            "A client is subscribed but upstreamConnected is false".to_string(),
            start.elapsed(),
        ));
    }

    println!("{} Relay accepted the connection", "✓".green());
    Ok(TestResult::pass("connection", start.elapsed()))
}

pub async fn test_receive_events(
    health: &HealthClient,
    sse: &mut Connection,
    count: usize,
    timeout: Duration,
) -> Result<TestResult> {
    let start = Instant::now();

    println!("\n{}", "=== TEST: Receive Events ===".bright_cyan().bold());
    println!("{} Waiting for {} relayed events...", "→".blue(), count);

    let mut last_id = None;
    for received in 0..count {
        match sse.wait_for_event(timeout).await {
            Ok(event) => {
                print_event(&sse.label, &event);
                if let Some(id) = event.relayed.id.filter(|id| !id.is_empty()) {
                    last_id = Some(id);
                }
            }
            Err(e) => {
                println!("{} {}", "✗".red(), e);
                return Ok(TestResult::fail(
                    "receive_events",
                    format!("Received {received} of {count} events: {e}"),
                    start.elapsed(),
                ));
            }
        }
    }

    let status = health.fetch().await?;
    print_health(&status);
    if last_id.is_some() && status.last_event_id.is_none() {
        println!("{} Relay lost its cursor!", "✗".red());
        return Ok(TestResult::fail(
            "receive_events",
            format!("Events carried ids up to {last_id:?} but lastEventId is null"),
            start.elapsed(),
        ));
    }

    println!("{} Received {} events", "✓".green(), count);
    Ok(TestResult::pass("receive_events", start.elapsed()))
}

pub async fn test_fan_out(
    first: &mut Connection,
    second: &mut Connection,
    timeout: Duration,
) -> Result<TestResult> {
    let start = Instant::now();

    println!("\n{}", "=== TEST: Fan Out ===".bright_cyan().bold());
    println!(
        "{} Waiting for {} to receive an event...",
        "→".blue(),
        second.label
    );

    let expected = match second.wait_for_event(timeout).await {
        Ok(event) => event,
        Err(e) => {
            println!("{} {}", "✗".red(), e);
            return Ok(TestResult::fail("fan_out", e.to_string(), start.elapsed()));
        }
    };
    print_event(&second.label, &expected);

    println!(
        "{} Waiting for {} to receive the same event...",
        "→".blue(),
        first.label
    );
    match wait_for_matching(first, &expected, timeout).await {
        Ok(event) => {
            print_event(&first.label, &event);
            println!("{} Both clients received the event", "✓".green());
            Ok(TestResult::pass("fan_out", start.elapsed()))
        }
        Err(e) => {
            println!("{} {}", "✗".red(), e);
            Ok(TestResult::fail(
                "fan_out",
                format!("{} never saw {:?}: {e}", first.label, expected.relayed),
                start.elapsed(),
            ))
        }
    }
}

pub async fn test_client_churn(
    health: &HealthClient,
    leaving: Connection,
    staying: &mut Connection,
    timeout: Duration,
) -> Result<TestResult> {
    let start = Instant::now();

    println!("\n{}", "=== TEST: Client Churn ===".bright_cyan().bold());

    let before = health.fetch().await?;
    print_health(&before);

    println!("{} Disconnecting {}...", "→".blue(), leaving.label);
    leaving.close();

    let deadline = Instant::now() + timeout;
    loop {
        let status = health.fetch().await?;
        if status.clients < before.clients {
            print_health(&status);
            println!("{} Relay unregistered the client", "✓".green());
            break;
        }
        if Instant::now() >= deadline {
            println!("{} Client count never dropped!", "✗".red());
            return Ok(TestResult::fail(
                "client_churn",
                format!("Client count stayed at {}", status.clients),
                start.elapsed(),
            ));
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    println!(
        "{} Checking {} still receives events...",
        "→".blue(),
        staying.label
    );
    match staying.wait_for_event(timeout).await {
        Ok(event) => {
            print_event(&staying.label, &event);
            Ok(TestResult::pass("client_churn", start.elapsed()))
        }
        Err(e) => {
            println!("{} {}", "✗".red(), e);
            Ok(TestResult::fail(
                "client_churn",
                format!("Remaining client stopped receiving: {e}"),
                start.elapsed(),
            ))
        }
    }
}

pub async fn test_keep_alive(sse: &mut Connection, keep_alive: Duration) -> Result<TestResult> {
    let start = Instant::now();

    println!("\n{}", "=== TEST: Keep Alive ===".bright_cyan().bold());
    println!(
        "{} Waiting up to {:?} for a ping comment...",
        "→".blue(),
        keep_alive + Duration::from_secs(2)
    );

    let seen = sse.pings();
    let deadline = Instant::now() + keep_alive + Duration::from_secs(2);
    while Instant::now() < deadline {
        if sse.pings() > seen {
            println!("{} Ping received", "✓".green());
            return Ok(TestResult::pass("keep_alive", start.elapsed()));
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    println!("{} No ping received", "✗".red());
    Ok(TestResult::fail(
        "keep_alive",
        "No keep-alive comment arrived; a busy upstream delays pings".to_string(),
        start.elapsed(),
    ))
}

async fn wait_for_matching(
    sse: &mut Connection,
    expected: &Event,
    timeout: Duration,
) -> Result<Event> {
    let deadline = Instant::now() + timeout;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            anyhow::bail!("Timeout waiting for matching event");
        }

        let event = sse.wait_for_event(remaining).await?;
        if event.relayed == expected.relayed {
            return Ok(event);
        }
    }
}
