pub mod bounds;
pub mod config;
pub mod constants;
pub mod events;
pub mod geo;
pub mod gesture;
pub mod transform;
pub mod viewport;
