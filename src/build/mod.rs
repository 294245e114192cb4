//! Optional step producing the benchmark binaries before a sweep.

use crate::error::{Result, SweepError};
use std::process::Command;

/// A command line split on whitespace, run without a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStep {
    program: String,
    args: Vec<String>,
}

impl BuildStep {
    pub fn parse(command: &str) -> Result<Self> {
        let mut words = command.split_whitespace().map(str::to_string);
        let program = words
            .next()
            .ok_or_else(|| SweepError::Configuration("empty build command".to_string()))?;
        Ok(Self {
            program,
            args: words.collect(),
        })
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn run(&self) -> Result<()> {
        tracing::info!(command = %self.command_line(), "generating executable files");

        let status = Command::new(&self.program)
            .args(&self.args)
            .status()
            .map_err(|e| SweepError::Build {
                command: self.command_line(),
                reason: e.to_string(),
            })?;

        if !status.success() {
            return Err(SweepError::Build {
                command: self.command_line(),
                reason: format!("exited with {}", status),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_command() {
        let step = BuildStep::parse("  make all   clear ").unwrap();
        assert_eq!(step.command_line(), "make all clear");
        assert!(BuildStep::parse("   ").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn failing_build_is_reported() {
        assert!(BuildStep::parse("true").unwrap().run().is_ok());
        assert!(matches!(
            BuildStep::parse("false").unwrap().run(),
            Err(SweepError::Build { .. })
        ));
        assert!(matches!(
            BuildStep::parse("/nonexistent/make").unwrap().run(),
            Err(SweepError::Build { .. })
        ));
    }
}
