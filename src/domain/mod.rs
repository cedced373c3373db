// Domain layer: OpenDCIM records, audit reports and the inventory port.

pub mod model;
pub mod ports;
