// Domain layer: feature schema, records and ports (interfaces).

pub mod features;
pub mod model;
pub mod ports;
