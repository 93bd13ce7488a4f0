//! Connect command implementation.

use std::time::Duration;

use devscan_core::connect::find_reachable;
use devscan_core::settings::DevscanSettings;
use tracing::debug;

use crate::cli::ConnectArgs;
use crate::device::Session;
use crate::error::CliError;
use crate::output::get_formatter;

/// Run the connect command
pub async fn run_connect(
    args: ConnectArgs,
    settings: DevscanSettings,
    json: bool,
) -> Result<(), CliError> {
    let formatter = get_formatter(json);
    let session = Session::start(&settings).await?;

    eprintln!("Waiting for {} to announce itself...", args.uuid);
    let devices = session
        .wait_for_device(&args.uuid, Duration::from_secs(args.duration))
        .await;

    let result = if devices.is_empty() {
        Err(CliError::DeviceNotFound(args.uuid.clone()))
    } else {
        // A device announcing on several interfaces is tried path by path
        devices
            .iter()
            .find_map(|device| {
                let reachable =
                    find_reachable(&device.announcement, session.interfaces(), args.prefer_ipv6);
                debug!(path = %device.path, ?reachable, "Reachability checked");
                reachable.map(|r| (device, r))
            })
            .map(|(device, reachable)| {
                println!("{}", formatter.format_reachable(device, &reachable));
            })
            .ok_or_else(|| CliError::Unreachable(args.uuid.clone()))
    };

    session.shutdown();
    result
}
