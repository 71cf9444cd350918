//! SpreadBot Library
//!
//! Cross-venue spread detection between MEXC futures and the Jupiter price
//! oracle

pub mod alerts;
pub mod config;
pub mod error;
pub mod mexc;
pub mod oracle;
pub mod pipeline;
pub mod registry;
pub mod spread;
pub mod types;

pub use crate::config::AppConfig;
pub use crate::pipeline::{Pipeline, PipelineStats};
