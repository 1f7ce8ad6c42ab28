//! Event stream command.

use clap::Args;
use console::style;
use openclaw_client::{ClientConfig, EventFrame, GatewayClient};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

/// Listen command arguments.
#[derive(Args)]
pub struct ListenArgs {
    /// Only print events with this name
    #[arg(short, long)]
    pub event: Option<String>,
}

fn format_event(frame: &EventFrame) -> String {
    let payload = frame
        .payload
        .as_ref()
        .map(|p| p.to_string())
        .unwrap_or_default();
    match frame.seq {
        Some(seq) => format!("[{}] {} {}", seq, frame.event, payload),
        None => format!("{} {}", frame.event, payload),
    }
}

/// Why listening ended.
#[derive(Debug, PartialEq, Eq)]
enum Stop {
    Interrupted,
    Disconnected,
}

/// Wait for `shutdown` to fire or for the connection to drop.
///
/// `shutdown` is polled across every iteration, so a signal arriving
/// between connection checks is not lost.
async fn wait_for_stop<F>(client: &GatewayClient, shutdown: F, check_every: Duration) -> Stop
where
    F: Future,
{
    tokio::pin!(shutdown);
    let mut check = tokio::time::interval_at(Instant::now() + check_every, check_every);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => return Stop::Interrupted,
            _ = check.tick() => {
                if !client.is_connected() {
                    return Stop::Disconnected;
                }
            }
        }
    }
}

/// Print events until Ctrl-C or until the gateway closes the connection.
pub async fn run(config: ClientConfig, args: &ListenArgs) -> anyhow::Result<()> {
    let client = GatewayClient::new(config);

    let filter = args.event.clone();
    client.add_event_listener(move |frame| {
        if filter.as_deref().map_or(true, |name| name == frame.event) {
            println!("{}", format_event(frame));
        }
    });

    let hello = client.connect().await?;
    eprintln!(
        "{} Listening on connection {} (Ctrl-C to stop)",
        style("*").green(),
        style(&hello.server.conn_id).bold()
    );

    match wait_for_stop(&client, tokio::signal::ctrl_c(), Duration::from_secs(1)).await {
        Stop::Interrupted => info!("Interrupted"),
        Stop::Disconnected => {
            eprintln!("{} Gateway closed the connection", style("!").yellow());
        }
    }

    client.disconnect();
    Ok(())
}
