pub mod audit;
pub mod dhcp;
pub mod label;
pub mod rack;

pub use crate::domain::model::{AuditReport, Device, Location, ModelInfo};
pub use crate::domain::ports::Inventory;
pub use crate::utils::error::Result;
