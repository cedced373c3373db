// Adapters layer: concrete implementations for external systems (OpenDCIM http, response cache)

pub mod cache;
pub mod http;
