//! Handshake inspection command.

use console::style;
use openclaw_client::{ClientConfig, ManagedClient};

/// Connect, print the handshake summary and disconnect.
pub async fn run(config: ClientConfig) -> anyhow::Result<()> {
    let manager = ManagedClient::new(config);

    manager
        .with_client(|client| async move {
            let Some(hello) = client.hello() else {
                anyhow::bail!("Connected without a handshake payload");
            };

            println!(
                "{} Connected to {}",
                style("✓").green(),
                style(&client.config().gateway_url).bold()
            );
            println!("  Protocol:      {}", hello.protocol);
            println!("  Server:        {}", hello.server.version);
            if let Some(host) = &hello.server.host {
                println!("  Host:          {}", host);
            }
            println!("  Connection id: {}", hello.server.conn_id);
            println!(
                "  Features:      {} methods, {} events",
                hello.features.methods.len(),
                hello.features.events.len()
            );
            println!(
                "  Tick interval: {}ms",
                style(hello.policy.tick_interval_ms).dim()
            );
            Ok(())
        })
        .await
}
