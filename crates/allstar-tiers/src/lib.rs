// Library root: re-exports all modules so integration tests and the
// `allstar` binary can access the crate's public API.

pub mod config;
pub mod dataset;
pub mod metric;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod validation;
