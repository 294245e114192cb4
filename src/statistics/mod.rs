//! Reduction of repeated trial samples into a point estimate with an
//! uncertainty figure.
//!
//! Both graph types report the error column as an *absolute* figure in the
//! unit of the value, so the same `u 1:2:3 with errorbars` decoration is
//! correct for either plot. The relative error is kept alongside it.

use crate::error::{Result, SweepError};
use serde::{Deserialize, Serialize};

/// Lookups are reported in millions per second in throughput graphs.
pub const MILLION: f64 = 1e6;

/// What the y axis of a sweep measures.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GraphType {
    /// Number of threads x running time (graph type 1).
    RunningTime,
    /// Number of threads x throughput (graph type 2).
    Throughput,
}

impl GraphType {
    /// Maps the numeric CLI selector to a graph type.
    pub fn from_selector(selector: u32) -> Option<Self> {
        match selector {
            1 => Some(GraphType::RunningTime),
            2 => Some(GraphType::Throughput),
            _ => None,
        }
    }

    pub fn selector(self) -> u32 {
        match self {
            GraphType::RunningTime => 1,
            GraphType::Throughput => 2,
        }
    }
}

/// How raw samples turn into the plotted value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricMode {
    RunningTime,
    /// `(lookups_per_thread * threads / scale_factor) / mean`.
    Throughput {
        lookups_per_thread: u64,
        scale_factor: f64,
    },
}

impl MetricMode {
    pub fn for_graph(graph_type: GraphType, lookups_per_thread: u64) -> Self {
        match graph_type {
            GraphType::RunningTime => MetricMode::RunningTime,
            GraphType::Throughput => MetricMode::Throughput {
                lookups_per_thread,
                scale_factor: MILLION,
            },
        }
    }
}

/// Point estimate for one sweep point of one variant.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub value: f64,
    /// Absolute error, `relative_error * value`.
    pub error: f64,
    pub relative_error: f64,
}

pub fn mean(samples: &[f64]) -> f64 {
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Sample standard deviation with Bessel's correction. A single sample has
/// a deviation of zero.
pub fn corrected_stdev(samples: &[f64]) -> f64 {
    let size = samples.len();
    if size <= 1 {
        return 0.0;
    }

    let m = mean(samples);
    let sum_sq: f64 = samples.iter().map(|x| (x - m).powi(2)).sum();

    (sum_sq / (size - 1) as f64).sqrt()
}

/// Relative error of the mean, `stdev / mean`. Rejects empty sample sets
/// and a zero mean.
pub fn relative_error(samples: &[f64]) -> Result<f64> {
    if samples.is_empty() {
        return Err(SweepError::DegenerateSamples("no samples".to_string()));
    }
    let m = mean(samples);
    if m == 0.0 {
        return Err(SweepError::DegenerateSamples(
            "mean of samples is zero".to_string(),
        ));
    }
    Ok(corrected_stdev(samples) / m)
}

/// Reduces the trials of one sweep point into a measurement.
///
/// Throughput is a constant divided by the noisy mean, so to first order
/// its relative error equals that of the mean.
pub fn reduce(samples: &[f64], mode: MetricMode, threads: usize) -> Result<Measurement> {
    let relative_error = relative_error(samples)?;
    let run_time = mean(samples);

    let value = match mode {
        MetricMode::RunningTime => run_time,
        MetricMode::Throughput {
            lookups_per_thread,
            scale_factor,
        } => {
            let work_units = lookups_per_thread as f64 * threads as f64;
            (work_units / scale_factor) / run_time
        }
    };

    Ok(Measurement {
        value,
        error: relative_error * value,
        relative_error,
    })
}
