//! CLI argument definitions using clap.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// devscan - discover and configure measurement devices on the local network
#[derive(Parser, Debug)]
#[command(name = "devscan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Configure request timeout in milliseconds [default: 5000]
    #[arg(long, global = true, env = "DEVSCAN_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Verbose logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON settings file; command-line options take precedence
    #[arg(long, global = true, env = "DEVSCAN_SETTINGS")]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Discover devices on the network
    Discover(DiscoverArgs),

    /// Find an address of a device reachable from this host
    Connect(ConnectArgs),

    /// Change the network settings of a device
    Configure(ConfigureArgs),
}

// ==================== Discover ====================

#[derive(Args, Debug)]
pub struct DiscoverArgs {
    /// Watch mode - print discovery events as they happen
    #[arg(short, long)]
    pub watch: bool,

    /// Discovery duration in seconds (ignored in watch mode)
    #[arg(short, long, default_value = "5")]
    pub duration: u64,

    /// Only show devices of these family types
    #[arg(long = "family", value_name = "FAMILY")]
    pub families: Vec<String>,

    /// Only show devices with these uuids
    #[arg(long = "uuid", value_name = "UUID")]
    pub uuids: Vec<String>,
}

// ==================== Connect ====================

#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Device uuid
    pub uuid: String,

    /// Try IPv6 addresses before IPv4
    #[arg(long)]
    pub prefer_ipv6: bool,

    /// How long to wait for the device to announce itself (seconds)
    #[arg(short, long, default_value = "10")]
    pub duration: u64,
}

// ==================== Configure ====================

#[derive(Args, Debug)]
pub struct ConfigureArgs {
    /// Device uuid
    pub uuid: String,

    /// Device interface to configure
    #[arg(short, long, default_value = "eth0")]
    pub interface: String,

    /// Obtain the address via DHCP
    #[arg(long, conflicts_with_all = ["address", "netmask"])]
    pub dhcp: bool,

    /// Static IPv4 address
    #[arg(long, requires = "netmask")]
    pub address: Option<Ipv4Addr>,

    /// Static IPv4 netmask
    #[arg(long, requires = "address")]
    pub netmask: Option<Ipv4Addr>,

    /// Default gateway
    #[arg(long)]
    pub gateway: Option<Ipv4Addr>,

    /// Multicast hop limit for the request
    #[arg(long, default_value = "1")]
    pub ttl: u32,
}
