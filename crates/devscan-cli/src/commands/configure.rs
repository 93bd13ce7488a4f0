//! Configure command implementation.

use std::time::Duration;

use devscan_core::configure::{ConfigurationOutcome, ConfigurationQuery, NetSettingsRequest};
use devscan_core::settings::DevscanSettings;
use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::ConfigureArgs;
use crate::device::Session;
use crate::error::CliError;
use crate::output::get_formatter;

/// Run the configure command
pub async fn run_configure(
    args: ConfigureArgs,
    settings: DevscanSettings,
    json: bool,
) -> Result<(), CliError> {
    let query = build_query(&args)?;
    query.validate()?;

    let formatter = get_formatter(json);
    let session = Session::start(&settings).await?;

    let spinner = (!json).then(|| {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message(format!("Configuring {}", args.uuid));
        pb
    });

    let outcome = session.correlator().configure(query).await;

    if let Some(pb) = &spinner {
        pb.finish_and_clear();
    }
    session.shutdown();

    let outcome = outcome?;
    println!("{}", formatter.format_outcome(&args.uuid, &outcome));

    match outcome {
        ConfigurationOutcome::Success(_) => Ok(()),
        ConfigurationOutcome::Error(response) => Err(CliError::DeviceRejected {
            uuid: args.uuid,
            message: response
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| "unknown error".to_string()),
        }),
        ConfigurationOutcome::Timeout { elapsed_millis } => Err(CliError::Timeout(format!(
            "no response from {} after {} ms",
            args.uuid, elapsed_millis
        ))),
    }
}

fn build_query(args: &ConfigureArgs) -> Result<ConfigurationQuery, CliError> {
    let mut net_settings = match (args.dhcp, args.address, args.netmask) {
        (true, _, _) => NetSettingsRequest::dhcp(&args.interface),
        (false, Some(address), Some(netmask)) => {
            NetSettingsRequest::manual(&args.interface, address, netmask)
        }
        _ => {
            return Err(CliError::InvalidArgument(
                "either --dhcp or --address with --netmask is required".to_string(),
            ))
        }
    };
    if let Some(gateway) = args.gateway {
        net_settings = net_settings.with_gateway(gateway);
    }

    Ok(ConfigurationQuery::new(&args.uuid, net_settings).with_ttl(args.ttl))
}

#[cfg(test)]
mod tests {
    use super::*;
    use devscan_core::configure::Ipv4Config;
    use std::net::Ipv4Addr;

    fn args() -> ConfigureArgs {
        ConfigureArgs {
            uuid: "0009E5001234".to_string(),
            interface: "eth0".to_string(),
            dhcp: false,
            address: None,
            netmask: None,
            gateway: None,
            ttl: 1,
        }
    }

    #[test]
    fn test_build_query_requires_method() {
        assert!(matches!(
            build_query(&args()),
            Err(CliError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_build_query_manual_with_gateway() {
        let mut args = args();
        args.address = Some(Ipv4Addr::new(10, 0, 0, 5));
        args.netmask = Some(Ipv4Addr::new(255, 255, 255, 0));
        args.gateway = Some(Ipv4Addr::new(10, 0, 0, 1));
        args.ttl = 4;

        let query = build_query(&args).unwrap();
        assert_eq!(query.target_device_uuid, "0009E5001234");
        assert_eq!(query.ttl, Some(4));
        assert_eq!(
            query.net_settings.ipv4,
            Ipv4Config::Manual {
                address: Ipv4Addr::new(10, 0, 0, 5),
                netmask: Ipv4Addr::new(255, 255, 255, 0),
            }
        );
        assert_eq!(query.net_settings.default_gateway, Some(Ipv4Addr::new(10, 0, 0, 1)));
        assert!(query.validate().is_ok());
    }

    #[test]
    fn test_build_query_dhcp() {
        let mut args = args();
        args.dhcp = true;
        let query = build_query(&args).unwrap();
        assert_eq!(query.net_settings.ipv4, Ipv4Config::Dhcp);
    }
}
