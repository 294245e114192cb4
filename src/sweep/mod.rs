//! Enumeration of the sweep space and the sequential driver running it.

use crate::affinity::AffinityResolver;
use crate::config::SweepConfig;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::statistics;
use crate::storage::Storage;
use crate::trial::TrialExecutor;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Thread counts double up to this value...
pub const DOUBLING_THRESHOLD: usize = 8;
/// ...and grow linearly by this step afterwards.
pub const LINEAR_STEP: usize = 8;

pub const MANIFEST_FILE: &str = "results.json";

/// Thread counts 1, 2, 4, 8, 16, 24, ... up to and including `max`.
#[derive(Debug, Clone)]
pub struct SweepPoints {
    next: Option<usize>,
    max: usize,
}

impl SweepPoints {
    pub fn new(max: usize) -> Self {
        Self { next: Some(1), max }
    }
}

impl Iterator for SweepPoints {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let current = self.next.filter(|&c| c <= self.max)?;
        self.next = if current < DOUBLING_THRESHOLD {
            current.checked_mul(2)
        } else {
            current.checked_add(LINEAR_STEP)
        };
        Some(current)
    }
}

/// Outcome of a complete sweep, in configured variant order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SweepReport {
    pub config: SweepConfig,
    pub datasets: Vec<Dataset>,
}

/// Runs every (variant, thread count, trial) of a configuration, one trial
/// at a time, and stores one dataset per variant.
///
/// The first failing trial aborts the whole sweep. A variant's dataset file
/// is only written once all of its sweep points succeeded, so files of
/// variants finished earlier stay untouched.
pub struct SweepDriver<E, R, S> {
    config: SweepConfig,
    executor: E,
    resolver: R,
    storage: S,
}

impl<E, R, S> SweepDriver<E, R, S>
where
    E: TrialExecutor,
    R: AffinityResolver,
    S: Storage,
{
    pub fn new(config: SweepConfig, executor: E, resolver: R, storage: S) -> Self {
        Self {
            config,
            executor,
            resolver,
            storage,
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    pub fn run(&mut self) -> Result<SweepReport> {
        let mut datasets = Vec::with_capacity(self.config.variants.len());

        for variant in self.config.variants.clone() {
            tracing::info!(variant = %variant, "testing");
            let dataset = self.run_variant(&variant)?;
            tracing::info!(variant = %variant, points = dataset.records().len(), "finished testing");
            datasets.push(dataset);
        }

        let report = SweepReport {
            config: self.config.clone(),
            datasets,
        };
        let json = serde_json::to_string_pretty(&report)?;
        self.storage.write(&PathBuf::from(MANIFEST_FILE), &json)?;

        Ok(report)
    }

    /// Sweeps one variant and writes its dataset file.
    pub fn run_variant(&mut self, variant: &str) -> Result<Dataset> {
        let path = Dataset::file_name(variant);
        self.storage.remove(&path)?;

        let params = self.config.binary_params();
        let mode = self.config.metric_mode();
        let mut dataset = Dataset::new(variant, self.config.with_error());

        for threads in SweepPoints::new(self.config.max_threads) {
            tracing::info!(variant = %variant, threads, "number of threads");

            let mut samples = Vec::with_capacity(self.config.repeats);
            for trial in 0..self.config.repeats {
                let affinity = self.resolver.resolve(threads)?;
                affinity.validate(threads)?;

                let sample = self.executor.run(variant, threads, &params, &affinity)?;
                tracing::debug!(variant = %variant, threads, trial, cores = %affinity, sample, "trial");
                samples.push(sample);
            }

            let measurement = statistics::reduce(&samples, mode, threads)?;
            dataset.append(threads, &measurement)?;
        }

        self.storage.write(&path, &dataset.finalize())?;
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progression_up_to_twenty() {
        assert_eq!(SweepPoints::new(20).collect::<Vec<_>>(), vec![1, 2, 4, 8, 16]);
    }

    #[test]
    fn progression_includes_exact_maximum() {
        assert_eq!(
            SweepPoints::new(32).collect::<Vec<_>>(),
            vec![1, 2, 4, 8, 16, 24, 32]
        );
        assert_eq!(SweepPoints::new(1).collect::<Vec<_>>(), vec![1]);
        assert_eq!(SweepPoints::new(7).collect::<Vec<_>>(), vec![1, 2, 4]);
    }

    #[test]
    fn empty_when_maximum_is_zero() {
        assert_eq!(SweepPoints::new(0).count(), 0);
    }

    #[test]
    fn terminates_near_usize_max() {
        let points = SweepPoints::new(usize::MAX);
        assert_eq!(points.skip(4).take(3).collect::<Vec<_>>(), vec![16, 24, 32]);
        let mut tail = SweepPoints {
            next: Some(usize::MAX - 3),
            max: usize::MAX,
        };
        assert_eq!(tail.next(), Some(usize::MAX - 3));
        assert_eq!(tail.next(), None);
    }
}
