//! Generic method call command.

use anyhow::Context;
use clap::Args;
use openclaw_client::{ClientConfig, ManagedClient};
use serde_json::Value;

/// Call command arguments.
#[derive(Args)]
pub struct CallArgs {
    /// Method name (e.g. agents.list)
    pub method: String,

    /// Parameters as a JSON object
    #[arg(short, long)]
    pub params: Option<String>,
}

/// Parse `--params`, defaulting to an empty object.
pub fn parse_params(raw: Option<&str>) -> anyhow::Result<Value> {
    match raw {
        Some(raw) => serde_json::from_str(raw).context("--params is not valid JSON"),
        None => Ok(Value::Object(Default::default())),
    }
}

/// Call one method and print its payload.
pub async fn run(config: ClientConfig, args: &CallArgs) -> anyhow::Result<()> {
    let params = parse_params(args.params.as_deref())?;
    let manager = ManagedClient::new(config);

    let payload = manager
        .with_client(|client| async move {
            client
                .call(&args.method, params)
                .await
                .with_context(|| format!("{} failed", args.method))
        })
        .await?;

    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}
