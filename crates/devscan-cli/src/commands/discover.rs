//! Discover command implementation.

use std::time::Duration;

use colored::*;
use devscan_core::discovery::{FamilyTypeFilter, FilterChain, UuidFilter};
use devscan_core::settings::DevscanSettings;

use crate::cli::DiscoverArgs;
use crate::device::Session;
use crate::error::CliError;
use crate::output::{get_formatter, OutputFormatter};

/// Run the discover command
pub async fn run_discover(
    args: DiscoverArgs,
    settings: DevscanSettings,
    json: bool,
) -> Result<(), CliError> {
    let formatter = get_formatter(json);
    let chain = build_filter_chain(&args);

    let session = Session::start(&settings).await?;

    let result = if args.watch {
        run_watch_mode(&session, chain, formatter.as_ref()).await
    } else {
        run_oneshot_mode(
            &session,
            chain,
            Duration::from_secs(args.duration),
            formatter.as_ref(),
        )
        .await
    };

    session.shutdown();
    result
}

fn build_filter_chain(args: &DiscoverArgs) -> FilterChain {
    let mut chain = FilterChain::new();
    if !args.families.is_empty() {
        chain.push(FamilyTypeFilter::new(args.families.iter().cloned()));
    }
    if !args.uuids.is_empty() {
        chain.push(UuidFilter::new(args.uuids.iter().cloned()));
    }
    chain
}

async fn run_oneshot_mode(
    session: &Session,
    chain: FilterChain,
    duration: Duration,
    formatter: &dyn OutputFormatter,
) -> Result<(), CliError> {
    eprintln!("Discovering devices for {} seconds...", duration.as_secs());

    tokio::time::sleep(duration).await;

    // Snapshot is already ordered by path
    let devices: Vec<_> = session
        .monitor()
        .devices()
        .into_iter()
        .filter(|device| chain.accepts(&device.announcement))
        .collect();

    println!("{}", formatter.format_devices(&devices));

    if devices.is_empty() {
        return Err(CliError::NoDevicesFound);
    }

    Ok(())
}

async fn run_watch_mode(
    session: &Session,
    chain: FilterChain,
    formatter: &dyn OutputFormatter,
) -> Result<(), CliError> {
    eprintln!("{}", "Watching for devices (press Ctrl+C to stop)...".dimmed());

    let mut events = session.monitor().subscribe_filtered(chain);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!();
                return Ok(());
            }
            event = events.recv() => match event {
                Some(event) => println!("{}", formatter.format_event(&event)),
                None => return Ok(()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(families: &[&str], uuids: &[&str]) -> DiscoverArgs {
        DiscoverArgs {
            watch: false,
            duration: 1,
            families: families.iter().map(|s| s.to_string()).collect(),
            uuids: uuids.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_filter_chain_from_args() {
        assert!(build_filter_chain(&args(&[], &[])).is_empty());
        assert_eq!(build_filter_chain(&args(&["QuantumX"], &[])).len(), 1);
        assert_eq!(build_filter_chain(&args(&["QuantumX"], &["abc"])).len(), 2);
    }
}
