use crate::domain::model::Device;
use crate::utils::error::Result;
use async_trait::async_trait;

/// Source of inventory records used by the audits.
#[async_trait]
pub trait Inventory: Send + Sync {
    async fn all_devices(&self) -> Result<Vec<Device>>;
    async fn update_device(&self, id: u64, fields: serde_json::Value) -> Result<()>;
}
