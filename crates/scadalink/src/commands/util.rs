//! Shared helpers for command handlers.

use std::io::BufRead;
use std::sync::Arc;

use serde::Serialize;
use tabled::Tabled;

use scadalink_core::{
    CoreError, DeviceSnapshot, NodeCategory, NodeClassifier, StreamTransport, TelemetryClient,
    format_value,
};

use crate::error::CliError;
use crate::output;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
pub struct DeviceRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "URL")]
    url: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Points")]
    points: usize,
    #[tabled(rename = "Error")]
    error: String,
}

impl DeviceRow {
    pub fn new(d: &Arc<DeviceSnapshot>, color: bool) -> Self {
        Self {
            name: d.name.clone(),
            url: d.url.clone(),
            status: output::paint_status(d.status, color),
            points: d.nodes.len(),
            error: d.error.clone().unwrap_or_default(),
        }
    }
}

// ── Device detail ───────────────────────────────────────────────────

fn category_title(category: NodeCategory) -> &'static str {
    match category {
        NodeCategory::Measurement => "Measurements",
        NodeCategory::DigitalSignal => "Digital signals",
        NodeCategory::Command => "Commands",
        NodeCategory::UserCommand => "User commands",
    }
}

/// One device's header followed by its data points, grouped by category.
pub fn device_detail(d: &DeviceSnapshot, classifier: &NodeClassifier, color: bool) -> String {
    let mut lines = vec![
        format!("Name:   {}", d.name),
        format!("URL:    {}", d.url),
        format!("Status: {}", output::paint_status(d.status, color)),
    ];
    if let Some(ref err) = d.error {
        lines.push(format!("Error:  {err}"));
    }

    let groups = classifier.classify(d.nodes.keys().map(String::as_str));
    for category in [
        NodeCategory::Measurement,
        NodeCategory::DigitalSignal,
        NodeCategory::Command,
        NodeCategory::UserCommand,
    ] {
        let names = groups.category(category);
        if names.is_empty() {
            continue;
        }
        lines.push(String::new());
        lines.push(format!("{}:", category_title(category)));
        let width = names.iter().map(String::len).max().unwrap_or(0);
        for name in names {
            let Some(raw) = d.node(name) else { continue };
            let value = output::paint_value(&format_value(name, raw), color);
            lines.push(format!("  {name:<width$}  {value}"));
        }
    }
    lines.join("\n")
}

/// Serializable view of one device with formatted values, for JSON/YAML.
#[derive(Serialize)]
pub struct DeviceView<'a> {
    #[serde(flatten)]
    pub device: &'a DeviceSnapshot,
    pub groups: scadalink_core::Classification,
}

impl<'a> DeviceView<'a> {
    pub fn new(device: &'a DeviceSnapshot, classifier: &NodeClassifier) -> Self {
        Self {
            device,
            groups: classifier.classify(device.nodes.keys().map(String::as_str)),
        }
    }
}

// ── Lookups ─────────────────────────────────────────────────────────

/// Find a device in the current snapshot by URL, then by name.
pub fn resolve_device<T: StreamTransport>(
    client: &TelemetryClient<T>,
    identifier: &str,
) -> Result<Arc<DeviceSnapshot>, CliError> {
    client
        .store()
        .find_device(identifier)
        .ok_or_else(|| CliError::NotFound {
            resource_type: "Device".into(),
            identifier: identifier.into(),
            list_command: "snapshot".into(),
        })
}

/// Convert a core error, discarding the stored session when the server
/// no longer accepts its token.
pub fn session_error<T: StreamTransport>(client: &TelemetryClient<T>, err: CoreError) -> CliError {
    if matches!(err, CoreError::AuthenticationFailed { .. }) {
        tracing::info!("server rejected the session token, clearing it");
        client.logout();
        return CliError::SessionRejected;
    }
    err.into()
}

// ── Prompts ─────────────────────────────────────────────────────────

/// Read one line from stdin, without the trailing newline.
pub fn read_stdin_line() -> Result<String, CliError> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}

/// Prompt on stderr and read a line from stdin.
pub fn prompt_line(prompt: &str) -> Result<String, CliError> {
    eprint!("{prompt}");
    read_stdin_line()
}
