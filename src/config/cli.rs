use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "dcim")]
#[command(about = "Query and audit an OpenDCIM server")]
pub struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Do not reuse responses within this run
    #[arg(long, global = true)]
    pub no_cache: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the datacenter, cabinet and position of devices
    Locate {
        /// Device label; `node[01-40]` expands to a range
        device: String,

        /// Also list enclosing chassis
        #[arg(short, long)]
        parents: bool,
    },

    /// Show make, model and serial number of a device
    Model { device: String },

    /// Draw the elevation of a cabinet
    Showrack {
        /// Cabinet location, e.g. A01
        cabinet: String,

        #[arg(long, default_value_t = 40)]
        width: usize,
    },

    /// Normalize device labels
    Normalize {
        #[arg(required = true)]
        labels: Vec<String>,

        #[arg(long)]
        json: bool,
    },

    /// Parse an ISC DHCP config file and print its structure
    Dhcp {
        file: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// Audit the OpenDCIM database
    Audit {
        #[command(subcommand)]
        audit: AuditCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum AuditCommand {
    /// Check device labels against the label policy
    Labels {
        /// Rewrite invalid labels in OpenDCIM when possible
        #[arg(long)]
        repair: bool,

        #[arg(long)]
        json: bool,
    },

    /// Cross-check DHCP host declarations against devices
    Dhcp {
        file: PathBuf,

        #[arg(long)]
        json: bool,
    },
}

impl Validate for Cli {
    fn validate(&self) -> Result<()> {
        if let Command::Showrack { width, .. } = &self.command {
            validation::validate_range("--width", *width, 16, 400)?;
        }
        if let Command::Locate { device, .. } = &self.command {
            validation::validate_non_empty_string("DEVICE", device)?;
        }
        Ok(())
    }
}
