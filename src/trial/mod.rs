//! Single invocations of the benchmark binary.

use crate::affinity::AffinityList;
use crate::error::{Result, SweepError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Ordered getopt style parameters, rendered as `-<flag><value>`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct BinaryParams {
    params: Vec<(char, String)>,
}

impl BinaryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `flag`, replacing an earlier value in place.
    pub fn with(mut self, flag: char, value: impl ToString) -> Self {
        let value = value.to_string();
        match self.params.iter_mut().find(|(f, _)| *f == flag) {
            Some(slot) => slot.1 = value,
            None => self.params.push((flag, value)),
        }
        self
    }

    pub fn to_args(&self) -> Vec<String> {
        self.params
            .iter()
            .map(|(flag, value)| format!("-{}{}", flag, value))
            .collect()
    }
}

/// Runs one trial and returns its raw sample. Whether the sample is a
/// time or a count is decided by the statistics layer.
pub trait TrialExecutor {
    fn run(
        &mut self,
        variant: &str,
        threads: usize,
        params: &BinaryParams,
        affinity: &AffinityList,
    ) -> Result<f64>;
}

/// Spawns the benchmark binary pinned to the trial's cores and parses the
/// single number it prints.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    binary: PathBuf,
}

impl ProcessExecutor {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Full argument vector for one trial: the shared parameters followed by
    /// the thread count and the variant selector.
    pub fn trial_args(variant: &str, threads: usize, params: &BinaryParams) -> Vec<String> {
        params
            .clone()
            .with('p', threads)
            .with('i', variant)
            .to_args()
    }
}

impl TrialExecutor for ProcessExecutor {
    fn run(
        &mut self,
        variant: &str,
        threads: usize,
        params: &BinaryParams,
        affinity: &AffinityList,
    ) -> Result<f64> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(Self::trial_args(variant, threads, params))
            .stdin(Stdio::null())
            .stderr(Stdio::inherit());
        affinity.bind_command(&mut cmd)?;

        let output = cmd.output().map_err(|e| SweepError::Execution {
            variant: variant.to_string(),
            threads,
            reason: format!("cannot run {}: {}", self.binary.display(), e),
        })?;

        if !output.status.success() {
            return Err(SweepError::Execution {
                variant: variant.to_string(),
                threads,
                reason: format!("exited with {}", output.status),
            });
        }

        parse_sample(variant, threads, &String::from_utf8_lossy(&output.stdout))
    }
}

/// A sample is one finite floating point number, surrounding whitespace
/// allowed.
pub fn parse_sample(variant: &str, threads: usize, stdout: &str) -> Result<f64> {
    let text = stdout.trim();
    match text.parse::<f64>() {
        Ok(sample) if sample.is_finite() => Ok(sample),
        _ => Err(SweepError::Parse {
            variant: variant.to_string(),
            threads,
            output: text.to_string(),
        }),
    }
}
