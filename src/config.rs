use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use derive_setters::Setters;

pub const DEFAULT_PORT: u16 = 61000;

#[derive(Parser, Debug)]
#[command(name = "bcmon")]
#[command(author = "Ryan Butler (Ragnt)")]
#[command(about = "Broadcom monitor mode capture server.", long_about = None)]
#[command(version)]
pub struct Arguments {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Capture frames and stream network updates to a single operator connection.
    Serve(ServeArgs),
    /// Rewrite a raw monitor tap capture (ethernet + PHY + 802.11) as an 802.11 pcap.
    Convert {
        /// Raw tap capture to read.
        input: PathBuf,
        /// 802.11 capture to write. Must not exist.
        output: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(short, long, required_unless_present = "replay")]
    /// Interface to capture on.
    pub interface: Option<String>,

    #[arg(long, conflicts_with = "interface")]
    /// Replay a pcap file instead of capturing live.
    pub replay: Option<PathBuf>,

    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    /// Operator port.
    pub port: u16,

    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    /// Operator listen address.
    pub bind: IpAddr,

    #[arg(long, default_value_t = 1000)]
    /// Capture read timeout in milliseconds.
    pub timeout_ms: u64,

    #[arg(short, long)]
    /// Optional - Record 802.11 frames to <OUTPUT>-<date>.pcap.
    pub output: Option<String>,

    #[arg(long)]
    /// Skip manufacturer lookups for network and station addresses.
    pub no_vendor: bool,
}

/// Where frames come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureConfig {
    Live { interface: String },
    Replay { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq, Setters)]
#[setters(prefix = "with_")]
pub struct ServerConfig {
    pub capture: CaptureConfig,
    pub listen: SocketAddr,
    pub read_timeout: Duration,
    pub record_prefix: Option<String>,
    pub vendor_lookup: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            capture: CaptureConfig::Live {
                interface: "wlan0".to_string(),
            },
            listen: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT),
            read_timeout: Duration::from_millis(1000),
            record_prefix: None,
            vendor_lookup: true,
        }
    }
}

impl From<&ServeArgs> for ServerConfig {
    fn from(args: &ServeArgs) -> Self {
        let capture = match (&args.replay, &args.interface) {
            (Some(path), _) => CaptureConfig::Replay { path: path.clone() },
            (None, Some(interface)) => CaptureConfig::Live {
                interface: interface.clone(),
            },
            (None, None) => ServerConfig::default().capture,
        };

        ServerConfig::default()
            .with_capture(capture)
            .with_listen(SocketAddr::new(args.bind, args.port))
            .with_read_timeout(Duration::from_millis(args.timeout_ms))
            .with_record_prefix(args.output.clone())
            .with_vendor_lookup(!args.no_vendor)
    }
}
