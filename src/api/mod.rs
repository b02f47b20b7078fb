// =============================================================================
// API Module — HTTP surface over the analysis engine
// =============================================================================

pub mod rest;

pub use rest::router;
