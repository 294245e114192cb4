//! Per-variant datasets and their tab separated file format.
//!
//! One line per sweep point, ascending by thread count, no header:
//! `threads<TAB>value<TAB>error`. The error column is only written when the
//! sweep ran more than one trial per point.

use crate::error::{Result, SweepError};
use crate::statistics::Measurement;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DATASET_EXTENSION: &str = "dat";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Record {
    pub threads: usize,
    pub value: f64,
    /// Absolute error; zero for single-trial sweeps.
    pub error: f64,
}

impl Record {
    pub fn relative_error(&self) -> f64 {
        if self.value == 0.0 {
            0.0
        } else {
            self.error / self.value
        }
    }
}

/// Ordered records of one variant. Records only ever get appended, with
/// strictly increasing thread counts.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Dataset {
    pub variant: String,
    pub with_error: bool,
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(variant: impl Into<String>, with_error: bool) -> Self {
        Self {
            variant: variant.into(),
            with_error,
            records: Vec::new(),
        }
    }

    /// File name the dataset of `variant` is stored under.
    pub fn file_name(variant: &str) -> PathBuf {
        PathBuf::from(format!("{}.{}", variant, DATASET_EXTENSION))
    }

    pub fn path(&self) -> PathBuf {
        Self::file_name(&self.variant)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn append(&mut self, threads: usize, measurement: &Measurement) -> Result<()> {
        if let Some(last) = self.records.last() {
            if threads <= last.threads {
                return Err(SweepError::OutOfOrder {
                    variant: self.variant.clone(),
                    threads,
                    last: last.threads,
                });
            }
        }

        self.records.push(Record {
            threads,
            value: measurement.value,
            error: if self.with_error { measurement.error } else { 0.0 },
        });
        Ok(())
    }

    /// Serialized file content. Floats use the shortest representation
    /// that parses back to the same value.
    pub fn finalize(&self) -> String {
        let mut out = String::new();
        for record in &self.records {
            if self.with_error {
                out.push_str(&format!("{}\t{}\t{}\n", record.threads, record.value, record.error));
            } else {
                out.push_str(&format!("{}\t{}\n", record.threads, record.value));
            }
        }
        out
    }

    /// Reads back what [`Dataset::finalize`] wrote. A missing error column
    /// reads as zero.
    pub fn parse(variant: impl Into<String>, content: &str) -> Result<Self> {
        let mut dataset = Dataset::new(variant, false);

        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let malformed = || SweepError::MalformedDataset {
                line: idx + 1,
                content: line.to_string(),
            };

            let fields: Vec<&str> = line.split('\t').collect();
            let (threads, value, error) = match fields.as_slice() {
                [t, v] => (*t, *v, None),
                [t, v, e] => (*t, *v, Some(*e)),
                _ => return Err(malformed()),
            };

            let threads = threads.trim().parse::<usize>().map_err(|_| malformed())?;
            let value = value.trim().parse::<f64>().map_err(|_| malformed())?;
            let error = match error {
                Some(e) => {
                    dataset.with_error = true;
                    e.trim().parse::<f64>().map_err(|_| malformed())?
                }
                None => 0.0,
            };

            if dataset.records.last().map_or(false, |r| threads <= r.threads) {
                return Err(malformed());
            }
            dataset.records.push(Record { threads, value, error });
        }

        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(value: f64, error: f64) -> Measurement {
        Measurement {
            value,
            error,
            relative_error: error / value,
        }
    }

    #[test]
    fn serializes_tab_separated_lines() {
        let mut ds = Dataset::new("lock_node", true);
        ds.append(1, &m(0.5, 0.01)).unwrap();
        ds.append(2, &m(0.25, 0.005)).unwrap();
        assert_eq!(ds.finalize(), "1\t0.5\t0.01\n2\t0.25\t0.005\n");
        assert_eq!(ds.path(), PathBuf::from("lock_node.dat"));
    }

    #[test]
    fn single_trial_sweeps_omit_error_column() {
        let mut ds = Dataset::new("sequential", false);
        ds.append(1, &m(3.0, 0.0)).unwrap();
        ds.append(16, &m(2.5, 0.0)).unwrap();
        assert_eq!(ds.finalize(), "1\t3\n16\t2.5\n");
    }

    #[test]
    fn rejects_out_of_order_points() {
        let mut ds = Dataset::new("lockless", true);
        ds.append(4, &m(1.0, 0.1)).unwrap();
        assert!(matches!(
            ds.append(4, &m(1.0, 0.1)),
            Err(SweepError::OutOfOrder { threads: 4, last: 4, .. })
        ));
        assert!(ds.append(2, &m(1.0, 0.1)).is_err());
        assert_eq!(ds.records().len(), 1);
    }

    #[test]
    fn parse_reproduces_records() {
        let mut ds = Dataset::new("lock_level", true);
        ds.append(1, &m(0.1 + 0.2, 1.0 / 3.0)).unwrap();
        ds.append(8, &m(1e-9, 7.25e-11)).unwrap();
        ds.append(24, &m(12345.678, 0.0)).unwrap();

        let parsed = Dataset::parse("lock_level", &ds.finalize()).unwrap();
        assert_eq!(parsed, ds);
        assert_eq!(parsed.finalize(), ds.finalize());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(
            Dataset::parse("x", "1\t2\n2\tabc\n"),
            Err(SweepError::MalformedDataset { line: 2, .. })
        ));
        assert!(Dataset::parse("x", "1\n").is_err());
        assert!(Dataset::parse("x", "2\t1\n1\t1\n").is_err());
    }

    #[test]
    fn relative_error_of_record() {
        let r = Record { threads: 2, value: 4.0, error: 1.0 };
        assert_eq!(r.relative_error(), 0.25);
        let zero = Record { threads: 2, value: 0.0, error: 0.0 };
        assert_eq!(zero.relative_error(), 0.0);
    }
}
