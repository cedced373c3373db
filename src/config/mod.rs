#[cfg(feature = "cli")]
pub mod cli;
pub mod dcim_config;

#[cfg(feature = "cli")]
pub use cli::{AuditCommand, Cli, Command};
pub use dcim_config::{resolve_config, DcimConfig};
