use clap::Args;
use serde_json::Value;

use crate::app::{block_on, App, CliResult};

#[derive(Args)]
pub struct CallArgs {
    /// Backend operation name (e.g. "getPets")
    pub operation: String,
    /// JSON object sent as the operation payload
    #[arg(long, default_value = "{}")]
    pub payload: String,
}

pub fn run(args: CallArgs) -> CliResult {
    let payload: Value = serde_json::from_str(&args.payload)
        .map_err(|e| format!("--payload is not valid JSON: {e}"))?;
    let app = App::open()?;
    block_on(call(&app, &args.operation, payload))?
}

async fn call(app: &App, operation: &str, payload: Value) -> CliResult {
    app.resume().await?;
    let response = app.dispatcher.dispatch(operation, payload).await?;
    println!("{}", serde_json::to_string_pretty(&response.body)?);
    if !response.success {
        let reason = response
            .message
            .unwrap_or_else(|| format!("{operation} failed"));
        return Err(reason.into());
    }
    Ok(())
}
