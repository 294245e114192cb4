//! Core affinity lists for trial processes.
//!
//! A resolver turns `(policy, threads)` into the list of CPU ids a trial may
//! run on. Binding itself happens in the child between fork and exec, see
//! [`AffinityList::bind_command`].

use crate::error::{Result, SweepError};
use std::path::PathBuf;
use std::process::Command;

/// Largest CPU id the kernel affinity mask can hold, plus one.
#[cfg(target_os = "linux")]
pub const MAX_CPUS: usize = libc::CPU_SETSIZE as usize;
#[cfg(not(target_os = "linux"))]
pub const MAX_CPUS: usize = 1024;

/// Ordered set of processor cores a single trial is restricted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffinityList {
    cores: Vec<usize>,
}

impl AffinityList {
    pub fn new(cores: Vec<usize>) -> Self {
        Self { cores }
    }

    pub fn cores(&self) -> &[usize] {
        &self.cores
    }

    /// Parses a taskset style CPU list such as `0,2,4-7`.
    pub fn parse(text: &str) -> std::result::Result<Self, String> {
        let mut cores = Vec::new();
        for part in text.trim().split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.split_once('-') {
                Some((lo, hi)) => {
                    let lo = parse_core(lo)?;
                    let hi = parse_core(hi)?;
                    if hi < lo {
                        return Err(format!("descending range '{}'", part));
                    }
                    cores.extend(lo..=hi);
                }
                None => cores.push(parse_core(part)?),
            }
        }
        Ok(Self { cores })
    }

    /// Checks that the list can host `threads` workers and fits in a
    /// kernel affinity mask.
    pub fn validate(&self, threads: usize) -> Result<()> {
        if self.cores.len() < threads {
            return Err(SweepError::Affinity {
                threads,
                reason: format!("only {} cores in {:?}", self.cores.len(), self.cores),
            });
        }
        if let Some(&cpu) = self.cores.iter().find(|&&cpu| cpu >= MAX_CPUS) {
            return Err(SweepError::Affinity {
                threads,
                reason: format!("core {} exceeds the affinity mask size {}", cpu, MAX_CPUS),
            });
        }
        Ok(())
    }

    /// Restricts the process spawned by `cmd` to exactly these cores.
    /// Ids outside the kernel affinity mask are rejected.
    #[cfg(target_os = "linux")]
    pub fn bind_command(&self, cmd: &mut Command) -> Result<()> {
        use std::os::unix::process::CommandExt;

        self.validate(0)?;

        // Built in the parent; the child only makes the syscall.
        let mut set: libc::cpu_set_t = unsafe { std::mem::zeroed() };
        for &cpu in &self.cores {
            unsafe { libc::CPU_SET(cpu, &mut set) };
        }

        unsafe {
            cmd.pre_exec(move || {
                if libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set) != 0 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    pub fn bind_command(&self, _cmd: &mut Command) -> Result<()> {
        self.validate(0)?;
        tracing::warn!(
            "CPU affinity not supported on this platform, running unpinned on {:?}",
            self.cores
        );
        Ok(())
    }
}

fn parse_core(text: &str) -> std::result::Result<usize, String> {
    text.trim()
        .parse::<usize>()
        .map_err(|_| format!("invalid core id '{}'", text.trim()))
}

impl std::fmt::Display for AffinityList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<String> = self.cores.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", ids.join(","))
    }
}

/// Maps a worker count to the cores its trial runs on.
pub trait AffinityResolver {
    fn resolve(&self, threads: usize) -> Result<AffinityList>;
}

impl<T: AffinityResolver + ?Sized> AffinityResolver for Box<T> {
    fn resolve(&self, threads: usize) -> Result<AffinityList> {
        (**self).resolve(threads)
    }
}

/// Cores the orchestrator itself is allowed to run on, in ascending order.
#[cfg(target_os = "linux")]
pub fn allowed_cores() -> Result<AffinityList> {
    let mut set: libc::cpu_set_t = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::sched_getaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &mut set) };
    if rc != 0 {
        return Err(SweepError::Io(std::io::Error::last_os_error()));
    }
    let cores = (0..MAX_CPUS)
        .filter(|&cpu| unsafe { libc::CPU_ISSET(cpu, &set) })
        .collect();
    Ok(AffinityList::new(cores))
}

#[cfg(not(target_os = "linux"))]
pub fn allowed_cores() -> Result<AffinityList> {
    let n = std::thread::available_parallelism()?.get();
    Ok(AffinityList::new((0..n).collect()))
}

/// Packs `n` threads onto the first `n` cores this process may use.
#[derive(Debug, Default, Clone)]
pub struct CompactResolver;

impl AffinityResolver for CompactResolver {
    fn resolve(&self, threads: usize) -> Result<AffinityList> {
        let mut allowed = allowed_cores()?;
        allowed.cores.truncate(threads);
        Ok(allowed)
    }
}

/// Asks an external policy script, invoked as
/// `<script> --policy=<policy> <threads>`, for the core list.
#[derive(Debug, Clone)]
pub struct ScriptResolver {
    script: PathBuf,
    policy: String,
}

impl ScriptResolver {
    pub fn new(script: impl Into<PathBuf>, policy: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            policy: policy.into(),
        }
    }
}

impl AffinityResolver for ScriptResolver {
    fn resolve(&self, threads: usize) -> Result<AffinityList> {
        let output = Command::new(&self.script)
            .arg(format!("--policy={}", self.policy))
            .arg(threads.to_string())
            .output()
            .map_err(|e| SweepError::Affinity {
                threads,
                reason: format!("cannot run {}: {}", self.script.display(), e),
            })?;

        if !output.status.success() {
            return Err(SweepError::Affinity {
                threads,
                reason: format!("{} exited with {}", self.script.display(), output.status),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        AffinityList::parse(&stdout).map_err(|reason| SweepError::Affinity { threads, reason })
    }
}
