//! Command line surface and the immutable sweep configuration built from it.

use crate::error::{Result, SweepError};
use crate::statistics::{GraphType, MetricMode};
use crate::trial::BinaryParams;
use clap::error::ErrorKind;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_POLICY: &str = "compact-smt";

pub const DEFAULT_VARIANTS: [&str; 5] = [
    "sequential",
    "lock_level",
    "lock_node",
    "lock_subtree",
    "lockless",
];

#[derive(Parser, Debug)]
#[command(name = "sweep", disable_help_subcommand = true)]
struct Cli {
    /// 1: threads x running time, 2: threads x throughput
    graph_type: u32,
    /// Number of key bits tracked by the tree (`-b`)
    tree_range: u32,
    /// Number of keys inserted before the lookups
    keys: u64,
    /// Number of lookups per thread
    lookups: u64,
    /// Trials per sweep point
    repeats: usize,
    /// Largest thread count of the sweep
    max_threads: usize,

    /// Radix of the tree nodes (`-r`); the binary's default when omitted
    #[arg(long)]
    radix: Option<u32>,

    /// Benchmark binary invoked once per trial
    #[arg(long, default_value = "./radix_test")]
    binary: PathBuf,

    /// Core placement policy passed to the policy script
    #[arg(long, default_value = DEFAULT_POLICY)]
    policy: String,

    /// Script printing the core list for a thread count; defaults to the
    /// first cores this process may use
    #[arg(long)]
    policy_script: Option<PathBuf>,

    /// Command building the benchmark binary, e.g. "make all"
    #[arg(long)]
    build: Option<String>,

    #[arg(long, default_value = "test_files")]
    output_dir: PathBuf,

    /// Where the rendered graph is moved to
    #[arg(long, default_value = "graph.png")]
    graph: PathBuf,

    #[arg(
        long,
        value_delimiter = ',',
        default_value = "sequential,lock_level,lock_node,lock_subtree,lockless"
    )]
    variants: Vec<String>,

    /// Test instances the binary runs internally per trial (`-t`); only
    /// passed when given, `radix_test` itself has no such option
    #[arg(long)]
    instances: Option<u32>,
}

/// Everything a sweep needs, fixed before the first trial runs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SweepConfig {
    pub graph_type: GraphType,
    pub tree_range: u32,
    pub radix: Option<u32>,
    pub keys: u64,
    pub lookups: u64,
    pub repeats: usize,
    pub max_threads: usize,
    pub variants: Vec<String>,
    pub binary: PathBuf,
    pub policy: String,
    pub policy_script: Option<PathBuf>,
    pub build: Option<String>,
    pub output_dir: PathBuf,
    pub graph: PathBuf,
    pub instances: Option<u32>,
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    Help,
    Run(SweepConfig),
}

impl SweepConfig {
    /// Defaults for everything but the positional parameters.
    pub fn new(
        graph_type: GraphType,
        tree_range: u32,
        keys: u64,
        lookups: u64,
        repeats: usize,
        max_threads: usize,
    ) -> Self {
        Self {
            graph_type,
            tree_range,
            radix: None,
            keys,
            lookups,
            repeats,
            max_threads,
            variants: DEFAULT_VARIANTS.iter().map(|v| v.to_string()).collect(),
            binary: PathBuf::from("./radix_test"),
            policy: DEFAULT_POLICY.to_string(),
            policy_script: None,
            build: None,
            output_dir: PathBuf::from("test_files"),
            graph: PathBuf::from("graph.png"),
            instances: None,
        }
    }

    /// Parses the process arguments, program name included.
    pub fn parse_args<I, T>(args: I) -> Result<Invocation>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        if args.get(1).map(String::as_str) == Some("help") {
            return Ok(Invocation::Help);
        }
        if args.len() < 2 {
            return Err(SweepError::Configuration(
                "please specify the type of graph to generate".to_string(),
            ));
        }

        let cli = match Cli::try_parse_from(&args) {
            Ok(cli) => cli,
            Err(e) if e.kind() == ErrorKind::DisplayHelp => return Ok(Invocation::Help),
            Err(e) => {
                let message = e.to_string();
                let first = message.lines().next().unwrap_or("invalid arguments");
                return Err(SweepError::Configuration(
                    first.trim_start_matches("error: ").to_string(),
                ));
            }
        };

        let graph_type = GraphType::from_selector(cli.graph_type).ok_or_else(|| {
            SweepError::Configuration(format!("invalid type of graph {}", cli.graph_type))
        })?;

        let config = SweepConfig {
            graph_type,
            tree_range: cli.tree_range,
            radix: cli.radix,
            keys: cli.keys,
            lookups: cli.lookups,
            repeats: cli.repeats,
            max_threads: cli.max_threads,
            variants: cli.variants,
            binary: cli.binary,
            policy: cli.policy,
            policy_script: cli.policy_script,
            build: cli.build,
            output_dir: cli.output_dir,
            graph: cli.graph,
            instances: cli.instances,
        };
        config.validate()?;
        Ok(Invocation::Run(config))
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(SweepError::Configuration(msg.to_string()));

        if self.repeats == 0 {
            return fail("repeats must be at least 1");
        }
        if self.max_threads == 0 {
            return fail("max threads must be at least 1");
        }
        if self.instances == Some(0) {
            return fail("instances must be at least 1");
        }
        if self.variants.is_empty() {
            return fail("no variants to test");
        }
        for (i, variant) in self.variants.iter().enumerate() {
            if variant.is_empty() || variant.contains(|c: char| matches!(c, '/' | '\\' | '\'' | '"')) {
                return Err(SweepError::Configuration(format!(
                    "invalid variant name '{}'",
                    variant
                )));
            }
            if self.variants[..i].contains(variant) {
                return Err(SweepError::Configuration(format!(
                    "variant '{}' listed twice",
                    variant
                )));
            }
        }
        Ok(())
    }

    /// Parameters shared by every trial of the sweep.
    pub fn binary_params(&self) -> BinaryParams {
        let mut params = BinaryParams::new().with('b', self.tree_range);
        if let Some(radix) = self.radix {
            params = params.with('r', radix);
        }
        params = params.with('k', self.keys).with('l', self.lookups);
        if let Some(instances) = self.instances {
            params = params.with('t', instances);
        }
        params
    }

    /// A policy other than the default that no script will ever see.
    pub fn ignored_policy(&self) -> Option<&str> {
        match self.policy_script {
            None if self.policy != DEFAULT_POLICY => Some(self.policy.as_str()),
            _ => None,
        }
    }

    pub fn metric_mode(&self) -> MetricMode {
        MetricMode::for_graph(self.graph_type, self.lookups)
    }

    /// Error columns and error bars only make sense with repeated trials.
    pub fn with_error(&self) -> bool {
        self.repeats > 1
    }
}

pub fn usage(program: &str) -> String {
    format!(
        "Test and plot harness for concurrent data structure benchmarks.\n\n\
         Graph Type 1:\tNumber of Threads x Running time.\n\
         \t{p} 1 <bits> <keys> <lookups> <repeats> <max_threads>\n\n\
         Graph Type 2:\tNumber of threads x Throughput\n\
         \t{p} 2 <bits> <keys> <lookups> <repeats> <max_threads>\n\n\
         Options:\n\
         \t--radix <n>             radix of the tree nodes\n\
         \t--binary <path>         benchmark binary (default ./radix_test)\n\
         \t--policy <name>         core placement policy (default compact-smt)\n\
         \t--policy-script <path>  core list helper, e.g. ./list.pl\n\
         \t--build <command>       build step run before the sweep\n\
         \t--output-dir <dir>      dataset directory (default test_files)\n\
         \t--graph <path>          rendered graph (default graph.png)\n\
         \t--variants <a,b,...>    implementations to test\n\
         \t--instances <n>         test instances per binary run (-t)\n",
        p = program
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(args: &[&str]) -> Result<Invocation> {
        SweepConfig::parse_args(std::iter::once("sweep").chain(args.iter().copied()))
    }

    #[test]
    fn parses_positional_arguments() {
        let Invocation::Run(config) = run(&["2", "16", "1000", "500", "3", "20"]).unwrap() else {
            panic!("expected a run");
        };
        assert_eq!(config.graph_type, GraphType::Throughput);
        assert_eq!(config.tree_range, 16);
        assert_eq!(config.keys, 1000);
        assert_eq!(config.lookups, 500);
        assert_eq!(config.repeats, 3);
        assert_eq!(config.max_threads, 20);
        assert_eq!(config.variants, DEFAULT_VARIANTS);
        assert_eq!(config, SweepConfig::new(GraphType::Throughput, 16, 1000, 500, 3, 20));
        assert!(config.with_error());
        assert_eq!(
            config.binary_params().to_args(),
            vec!["-b16", "-k1000", "-l500"]
        );
    }

    #[test]
    fn parses_options() {
        let Invocation::Run(config) = run(&[
            "1",
            "8",
            "10",
            "10",
            "1",
            "4",
            "--variants",
            "sequential,lockless",
            "--policy-script",
            "./list.pl",
            "--build",
            "make all",
        ])
        .unwrap() else {
            panic!("expected a run");
        };
        assert_eq!(config.variants, vec!["sequential", "lockless"]);
        assert_eq!(config.policy_script, Some(PathBuf::from("./list.pl")));
        assert_eq!(config.build.as_deref(), Some("make all"));
        assert!(!config.with_error());
        assert_eq!(config.metric_mode(), MetricMode::RunningTime);
    }

    #[test]
    fn help_pseudo_command() {
        assert_eq!(run(&["help"]).unwrap(), Invocation::Help);
        assert!(usage("sweep").contains("sweep 2 <bits>"));
    }

    #[test]
    fn bad_arguments_are_configuration_errors() {
        for args in [
            &[][..],
            &["3", "16", "1000", "500", "3", "20"][..],
            &["0", "16", "1000", "500", "3", "20"][..],
            &["1", "16", "1000", "500", "3"][..],
            &["1", "16", "x", "500", "3", "20"][..],
            &["1", "16", "1000", "500", "0", "20"][..],
            &["1", "16", "1000", "500", "3", "0"][..],
            &["1", "16", "1000", "500", "3", "20", "--variants", "a,a"][..],
            &["1", "16", "1000", "500", "3", "20", "--variants", "../a"][..],
            &["1", "16", "1000", "500", "3", "20", "--variants", "it's"][..],
            &["1", "16", "1000", "500", "3", "20", "--variants", "a\"b"][..],
            &["1", "16", "1000", "500", "3", "20", "--instances", "0"][..],
        ] {
            assert!(
                matches!(run(args), Err(SweepError::Configuration(_))),
                "{:?} should be rejected",
                args
            );
        }
    }

    #[test]
    fn default_arguments_only_use_known_binary_flags() {
        let config = SweepConfig::new(GraphType::RunningTime, 20, 1000, 1000, 3, 8);
        let args = config.binary_params().to_args();
        assert_eq!(args, vec!["-b20", "-k1000", "-l1000"]);

        for arg in crate::trial::ProcessExecutor::trial_args("lock_node", 1, &config.binary_params()) {
            let flag = arg.chars().nth(1).unwrap();
            assert!("brklpi".contains(flag), "{} is not understood by radix_test", arg);
        }
    }

    #[test]
    fn radix_and_instances_only_when_given() {
        let Invocation::Run(config) = run(&[
            "1", "20", "1000", "1000", "3", "8", "--radix", "4", "--instances", "2",
        ])
        .unwrap() else {
            panic!("expected a run");
        };
        assert_eq!(
            config.binary_params().to_args(),
            vec!["-b20", "-r4", "-k1000", "-l1000", "-t2"]
        );
    }

    #[test]
    fn policy_without_script_is_flagged() {
        let mut config = SweepConfig::new(GraphType::RunningTime, 16, 10, 10, 1, 4);
        assert_eq!(config.ignored_policy(), None);

        config.policy = "scatter".to_string();
        assert_eq!(config.ignored_policy(), Some("scatter"));

        config.policy_script = Some(PathBuf::from("./list.pl"));
        assert_eq!(config.ignored_policy(), None);
    }
}
