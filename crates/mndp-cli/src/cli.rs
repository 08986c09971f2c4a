//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use mndp_core::{Family, DISCOVERY_PORT};

/// mndp - passive MikroTik neighbor discovery
#[derive(Parser, Debug)]
#[command(name = "mndp")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Discover devices announcing themselves on the local segment
    Discover(DiscoverArgs),
}

#[derive(Args, Debug)]
pub struct DiscoverArgs {
    /// Watch mode - stream announcements until Ctrl+C
    #[arg(short, long)]
    pub watch: bool,

    /// Discovery duration in seconds (ignored in watch mode)
    #[arg(short, long, default_value = "10")]
    pub duration: u64,

    /// UDP port to listen on
    #[arg(short, long, default_value_t = DISCOVERY_PORT, env = "MNDP_PORT")]
    pub port: u16,

    /// Host IP to bind to (default: all interfaces)
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Address family
    #[arg(long, value_enum, default_value = "udp4")]
    pub family: FamilyArg,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum FamilyArg {
    Udp4,
    Udp6,
}

impl From<FamilyArg> for Family {
    fn from(arg: FamilyArg) -> Self {
        match arg {
            FamilyArg::Udp4 => Family::Udp4,
            FamilyArg::Udp6 => Family::Udp6,
        }
    }
}
