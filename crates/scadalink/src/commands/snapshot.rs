//! One-shot device list over REST.

use scadalink_core::TelemetryClient;

use crate::cli::{GlobalOpts, SnapshotArgs};
use crate::error::CliError;
use crate::output;

use super::util::{self, DeviceRow, DeviceView};

pub async fn handle(
    client: &TelemetryClient,
    args: SnapshotArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let devices = client
        .refresh()
        .await
        .map_err(|e| util::session_error(client, e))?;
    let color = output::should_color(&global.color);

    let out = match args.device {
        Some(ref id) => {
            let device = util::resolve_device(client, id)?;
            let view = DeviceView::new(&device, client.classifier());
            output::render_single(
                &global.output,
                &view,
                |v| util::device_detail(v.device, client.classifier(), color),
                |v| v.device.url.clone(),
            )
        }
        None => output::render_list(
            &global.output,
            devices.as_slice(),
            |d| DeviceRow::new(d, color),
            |d| d.url.clone(),
        ),
    };
    output::print_output(&out, global.quiet);
    Ok(())
}
