//! Live stream consumer: prints every snapshot and status change until
//! interrupted.

use chrono::Local;

use scadalink_core::{ChannelState, Snapshot, TelemetryClient};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::util::{self, DeviceRow, DeviceView};

fn render_snapshot(
    client: &TelemetryClient,
    snapshot: &Snapshot,
    args: &WatchArgs,
    global: &GlobalOpts,
    color: bool,
) -> Option<String> {
    let Some(ref id) = args.device else {
        return Some(output::render_list(
            &global.output,
            snapshot.as_slice(),
            |d| DeviceRow::new(d, color),
            |d| d.url.clone(),
        ));
    };
    let device = snapshot
        .iter()
        .find(|d| d.url == *id)
        .or_else(|| snapshot.iter().find(|d| d.name == *id))?;
    let view = DeviceView::new(device, client.classifier());
    Some(output::render_single(
        &global.output,
        &view,
        |v| util::device_detail(v.device, client.classifier(), color),
        |v| v.device.url.clone(),
    ))
}

pub async fn handle(
    client: &TelemetryClient,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if !client.session().is_authenticated() {
        return Err(CliError::NotLoggedIn);
    }
    let color = output::should_color(&global.color);

    let mut state_rx = client.subscribe_state();
    let mut devices = client.devices();
    client.start().await;

    let mut shown = 0usize;
    let result = loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => break Ok(()),
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let state = *state_rx.borrow_and_update();
                if !global.quiet {
                    eprintln!(
                        "── {} ── {}",
                        Local::now().format("%H:%M:%S"),
                        output::paint_channel(state, color)
                    );
                }
                if state == ChannelState::AuthRejected {
                    break Err(CliError::SessionRejected);
                }
            }
            snapshot = devices.changed() => {
                let Some(snapshot) = snapshot else {
                    break Ok(());
                };
                match render_snapshot(client, &snapshot, &args, global, color) {
                    Some(out) => output::print_output(&out, global.quiet),
                    None => {
                        if let Some(ref id) = args.device {
                            tracing::warn!(device = %id, "device not present in snapshot");
                        }
                    }
                }
                shown += 1;
                if args.count.is_some_and(|n| shown >= n) {
                    break Ok(());
                }
            }
        }
    };

    client.stop().await;
    result
}
