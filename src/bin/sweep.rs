use std::process::ExitCode;
use sweep_benchmark_rs::affinity::{AffinityResolver, CompactResolver, ScriptResolver};
use sweep_benchmark_rs::build::BuildStep;
use sweep_benchmark_rs::config::{usage, Invocation, SweepConfig};
use sweep_benchmark_rs::plot::{self, GnuplotRenderer, PlotSpec};
use sweep_benchmark_rs::report::print_sweep_report;
use sweep_benchmark_rs::storage::FsStorage;
use sweep_benchmark_rs::sweep::SweepDriver;
use sweep_benchmark_rs::trial::ProcessExecutor;
use sweep_benchmark_rs::{Result, SweepError};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().cloned().unwrap_or_else(|| "sweep".to_string());

    let config = match SweepConfig::parse_args(args) {
        Ok(Invocation::Help) => {
            println!("{}", usage(&program));
            return ExitCode::SUCCESS;
        }
        Ok(Invocation::Run(config)) => config,
        Err(e) => {
            println!("Error. {}", e);
            println!("\nFor help, use {} help", program);
            return ExitCode::FAILURE;
        }
    };

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(config: SweepConfig) -> Result<()> {
    tracing::info!("test and plot harness for concurrent data structure benchmarks");

    if let Some(command) = &config.build {
        BuildStep::parse(command)?.run()?;
    }

    let storage = FsStorage::new(&config.output_dir)?;
    let resolver: Box<dyn AffinityResolver> = match &config.policy_script {
        Some(script) => Box::new(ScriptResolver::new(script, config.policy.clone())),
        None => {
            if let Some(policy) = config.ignored_policy() {
                tracing::warn!(policy, "no --policy-script given, policy ignored");
            }
            Box::new(CompactResolver)
        }
    };
    let executor = ProcessExecutor::new(&config.binary);

    let mut driver = SweepDriver::new(config, executor, resolver, storage);
    let report = driver.run()?;
    print_sweep_report(&report);

    let spec = PlotSpec::new(&report.config, &report.datasets);
    let dir = report.config.output_dir.clone();
    match plot::emit(&spec, driver.storage_mut(), &dir, &mut GnuplotRenderer::new(), &report.config.graph) {
        Ok(_) => Ok(()),
        Err(e @ SweepError::Render { .. }) => {
            tracing::error!(datasets = %dir.display(), "graph not rendered, datasets kept");
            Err(e)
        }
        Err(e) => Err(e),
    }
}
