pub mod affinity;
pub mod build;
pub mod config;
pub mod dataset;
pub mod error;
pub mod plot;
pub mod report;
pub mod statistics;
pub mod storage;
pub mod sweep;
pub mod trial;

pub use error::{Result, SweepError};
