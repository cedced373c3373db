pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::Cli;

pub use crate::adapters::{cache::ResponseCache, http::DcimClient};
pub use crate::config::{resolve_config, DcimConfig};
pub use crate::core::dhcp::{DhcpConfig, ParseError};
pub use crate::core::label::{normalize, InvalidLabelError, NormalizedLabel};
pub use crate::utils::error::{DcimError, Result};
