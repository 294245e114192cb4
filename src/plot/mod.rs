//! gnuplot script generation and rendering.

use crate::config::SweepConfig;
use crate::dataset::Dataset;
use crate::error::{Result, SweepError};
use crate::statistics::GraphType;
use crate::storage::Storage;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

pub const SCRIPT_FILE: &str = "plot_commands.gp";
pub const GRAPH_EXT: &str = "png";
pub const GRAPH_SIZE: &str = "1200,900";
pub const GRAPH_STYLE: &str = "lines";
pub const TIME_UNIT: &str = "s";
pub const ERROR_COLOR: &str = "#E69F00";

/// Colors for variants outside the fixed assignment, picked by position.
const FALLBACK_PALETTE: [&str; 6] = [
    "#000000", "#8C564B", "#17BECF", "#7F7F7F", "#9467BD", "#BCBD22",
];

/// Fixed color of a known variant, or a palette color for the variant at
/// `index` in the configured order.
pub fn variant_color(variant: &str, index: usize) -> &'static str {
    match variant {
        "sequential" => "#FF0000",
        "lock_level" => "#0011FF",
        "lock_node" => "#007517",
        "lock_subtree" => "#D9D500",
        "lockless" => "#FF00FF",
        _ => FALLBACK_PALETTE[index % FALLBACK_PALETTE.len()],
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub file: PathBuf,
    pub title: String,
    pub color: &'static str,
}

/// Declarative description of the final graph.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotSpec {
    pub title: String,
    pub subtitle: String,
    pub xlabel: String,
    pub ylabel: String,
    pub series: Vec<Series>,
    pub error_bars: bool,
    /// Artifact gnuplot writes, relative to the dataset directory.
    pub output: PathBuf,
}

impl PlotSpec {
    pub fn new(config: &SweepConfig, datasets: &[Dataset]) -> Self {
        let (title, ylabel) = match config.graph_type {
            GraphType::RunningTime => (
                "Number of Threads x Running Time",
                format!("Running Time ({})", TIME_UNIT),
            ),
            GraphType::Throughput => (
                "Number of Threads x Throughput",
                format!("Throughput (M lookups/{})", TIME_UNIT),
            ),
        };

        let series = datasets
            .iter()
            .enumerate()
            .map(|(i, ds)| Series {
                file: ds.path(),
                title: ds.variant.clone(),
                color: variant_color(&ds.variant, i),
            })
            .collect();

        PlotSpec {
            title: title.to_string(),
            subtitle: format!(
                "BITS: {} KEYS: {} LOOKUPS: {} TESTS: {}",
                config.tree_range, config.keys, config.lookups, config.repeats
            ),
            xlabel: "Number of Threads".to_string(),
            ylabel,
            series,
            error_bars: config.with_error(),
            output: PathBuf::from(format!("graph.{}", GRAPH_EXT)),
        }
    }

    /// The gnuplot script. Error bar series carry `notitle` so the legend
    /// only lists variants.
    pub fn to_script(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("set terminal {} size {}\n", GRAPH_EXT, GRAPH_SIZE));
        out.push_str(&format!("set output '{}'\n", self.output.display()));
        out.push_str(&format!("set title \"{}\\n{}\"\n", self.title, self.subtitle));
        out.push_str(&format!("set xlabel '{}'\n", self.xlabel));
        out.push_str(&format!("set ylabel '{}'\n", self.ylabel));
        out.push_str("set xrange [1:]\n");
        out.push_str("set yrange [0:]\n");

        let mut plots = Vec::new();
        for series in &self.series {
            let file = series.file.display();
            plots.push(format!(
                "'{}' u 1:2 t \"{}\" with {} lc rgb '{}'",
                file, series.title, GRAPH_STYLE, series.color
            ));
            if self.error_bars {
                plots.push(format!(
                    "'{}' u 1:2:3 with errorbars notitle lc rgb '{}'",
                    file, ERROR_COLOR
                ));
            }
        }
        out.push_str("plot ");
        out.push_str(&plots.join(", \\\n     "));
        out.push('\n');
        out
    }
}

/// Turns a stored plot script into an image.
pub trait Renderer {
    /// Renders `script` (inside `dir`) and returns the artifact's path.
    fn render(&mut self, dir: &Path, script: &Path, spec: &PlotSpec) -> Result<PathBuf>;
}

/// Runs `gnuplot <script>` inside the dataset directory.
#[derive(Debug, Clone)]
pub struct GnuplotRenderer {
    program: PathBuf,
}

impl GnuplotRenderer {
    pub fn new() -> Self {
        Self::with_program("gnuplot")
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for GnuplotRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for GnuplotRenderer {
    fn render(&mut self, dir: &Path, script: &Path, spec: &PlotSpec) -> Result<PathBuf> {
        let render_failure = |reason: String| SweepError::Render {
            script: dir.join(script),
            reason,
        };

        let status = Command::new(&self.program)
            .arg(script)
            .current_dir(dir)
            .status()
            .map_err(|e| render_failure(format!("cannot run {}: {}", self.program.display(), e)))?;

        if !status.success() {
            return Err(render_failure(format!("exited with {}", status)));
        }

        let artifact = dir.join(&spec.output);
        if !artifact.is_file() {
            return Err(render_failure(format!("{} was not produced", artifact.display())));
        }
        Ok(artifact)
    }
}

/// Writes the plot script next to the datasets, renders it and moves the
/// image to `destination`.
pub fn emit<S: Storage, R: Renderer>(
    spec: &PlotSpec,
    storage: &mut S,
    dir: &Path,
    renderer: &mut R,
    destination: &Path,
) -> Result<PathBuf> {
    let script = PathBuf::from(SCRIPT_FILE);
    storage.remove(&script)?;
    storage.write(&script, &spec.to_script())?;

    let artifact = renderer.render(dir, &script, spec)?;
    relocate(&artifact, destination)?;
    tracing::info!(graph = %destination.display(), "plotted graph");
    Ok(destination.to_path_buf())
}

/// Moves a file, falling back to copy and delete across filesystems.
fn relocate(from: &Path, to: &Path) -> Result<()> {
    if from == to {
        return Ok(());
    }
    if fs::rename(from, to).is_err() {
        fs::copy(from, to)?;
        fs::remove_file(from)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::Measurement;
    use crate::storage::MemoryStorage;

    fn datasets(variants: &[&str], with_error: bool) -> Vec<Dataset> {
        variants
            .iter()
            .map(|v| {
                let mut ds = Dataset::new(*v, with_error);
                ds.append(
                    1,
                    &Measurement {
                        value: 1.0,
                        error: 0.1,
                        relative_error: 0.1,
                    },
                )
                .unwrap();
                ds
            })
            .collect()
    }

    #[test]
    fn running_time_script() {
        let config = SweepConfig::new(GraphType::RunningTime, 16, 100, 10, 3, 4);
        let spec = PlotSpec::new(&config, &datasets(&["sequential", "lockless"], true));

        assert_eq!(
            spec.to_script(),
            "set terminal png size 1200,900\n\
             set output 'graph.png'\n\
             set title \"Number of Threads x Running Time\\nBITS: 16 KEYS: 100 LOOKUPS: 10 TESTS: 3\"\n\
             set xlabel 'Number of Threads'\n\
             set ylabel 'Running Time (s)'\n\
             set xrange [1:]\n\
             set yrange [0:]\n\
             plot 'sequential.dat' u 1:2 t \"sequential\" with lines lc rgb '#FF0000', \\\n     \
             'sequential.dat' u 1:2:3 with errorbars notitle lc rgb '#E69F00', \\\n     \
             'lockless.dat' u 1:2 t \"lockless\" with lines lc rgb '#FF00FF', \\\n     \
             'lockless.dat' u 1:2:3 with errorbars notitle lc rgb '#E69F00'\n"
        );
    }

    #[test]
    fn single_trial_throughput_has_no_error_bars() {
        let config = SweepConfig::new(GraphType::Throughput, 16, 100, 10, 1, 4);
        let spec = PlotSpec::new(&config, &datasets(&["lock_node", "custom"], false));
        let script = spec.to_script();

        assert!(script.contains("set ylabel 'Throughput (M lookups/s)'"));
        assert!(!script.contains("errorbars"));
        assert_eq!(spec.series[1].color, FALLBACK_PALETTE[1]);
        assert_eq!(spec.series[0].color, "#007517");
    }

    struct FailingRenderer;

    impl Renderer for FailingRenderer {
        fn render(&mut self, dir: &Path, script: &Path, _spec: &PlotSpec) -> Result<PathBuf> {
            Err(SweepError::Render {
                script: dir.join(script),
                reason: "no gnuplot".to_string(),
            })
        }
    }

    #[test]
    fn render_failure_keeps_the_script() {
        let config = SweepConfig::new(GraphType::RunningTime, 16, 100, 10, 3, 4);
        let spec = PlotSpec::new(&config, &datasets(&["sequential"], true));
        let mut storage = MemoryStorage::new();

        let err = emit(
            &spec,
            &mut storage,
            Path::new("test_files"),
            &mut FailingRenderer,
            Path::new("graph.png"),
        )
        .unwrap_err();

        assert!(matches!(err, SweepError::Render { .. }));
        assert_eq!(storage.get(SCRIPT_FILE), Some(spec.to_script().as_str()));
    }

    struct TouchRenderer;

    impl Renderer for TouchRenderer {
        fn render(&mut self, dir: &Path, _script: &Path, spec: &PlotSpec) -> Result<PathBuf> {
            let artifact = dir.join(&spec.output);
            fs::write(&artifact, b"png")?;
            Ok(artifact)
        }
    }

    #[test]
    fn artifact_is_moved_to_destination() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("test_files");
        let mut storage = crate::storage::FsStorage::new(&data_dir).unwrap();
        let config = SweepConfig::new(GraphType::RunningTime, 16, 100, 10, 3, 4);
        let spec = PlotSpec::new(&config, &datasets(&["sequential"], true));
        let destination = dir.path().join("graph.png");

        let out = emit(&spec, &mut storage, &data_dir, &mut TouchRenderer, &destination).unwrap();

        assert_eq!(out, destination);
        assert_eq!(fs::read(&destination).unwrap(), b"png");
        assert!(!data_dir.join("graph.png").exists());
        assert!(data_dir.join(SCRIPT_FILE).is_file());
    }
}
