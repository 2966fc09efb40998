//! Dispatch one write and report its outcome.

use scadalink_core::{ControlKind, TelemetryClient, WriteOutcome, WriteValue};

use crate::cli::{GlobalOpts, WriteArgs};
use crate::error::CliError;

use super::util;

/// Parse a switch position: on/off, true/false, 1/0.
fn parse_switch(text: &str) -> Result<bool, CliError> {
    match text.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        other => Err(CliError::Validation {
            field: "value".into(),
            reason: format!("expected on or off, got '{other}'"),
        }),
    }
}

pub async fn handle(
    client: &TelemetryClient,
    args: WriteArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let Some(kind) = client.classifier().writable_kind(&args.field) else {
        return Err(CliError::NotWritable { field: args.field });
    };
    let switch = match kind {
        ControlKind::Toggle => Some(parse_switch(&args.value)?),
        ControlKind::Setpoint => None,
    };

    client
        .refresh()
        .await
        .map_err(|e| util::session_error(client, e))?;
    let device = util::resolve_device(client, &args.device)?;

    let control = client.write_control(&device.url, &args.field)?;
    tracing::debug!(device = %device.url, field = %args.field, %kind, "dispatching write");

    let outcome = match switch {
        Some(on) => control.submit(WriteValue::Switch(on)).await,
        None => {
            control.set_input(args.value.as_str());
            control.submit_input().await
        }
    }
    .map_err(|e| util::session_error(client, e))?;

    match outcome {
        WriteOutcome::Success => {
            if !global.quiet {
                eprintln!("✓ {} = {} ({})", args.field, args.value, device.name);
            }
            Ok(())
        }
        _ => Err(CliError::WriteFailed {
            field: args.field,
            message: control
                .state()
                .last_error
                .unwrap_or_else(|| format!("write ended as {outcome}")),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_switch_accepts_common_spellings() {
        for on in ["on", "ON", "true", "1", " On "] {
            assert!(parse_switch(on).unwrap());
        }
        for off in ["off", "False", "0"] {
            assert!(!parse_switch(off).unwrap());
        }
        assert!(parse_switch("maybe").is_err());
    }
}
