use crate::dataset::Dataset;
use crate::statistics::GraphType;
use crate::sweep::SweepReport;
use prettytable::{row, Table};

fn value_header(graph_type: GraphType) -> &'static str {
    match graph_type {
        GraphType::RunningTime => "Running Time (s)",
        GraphType::Throughput => "Throughput (M lookups/s)",
    }
}

/// One table per variant: threads, value, absolute and relative error.
pub fn variant_table(dataset: &Dataset, graph_type: GraphType) -> Table {
    let mut table = Table::new();
    table.add_row(row!["Threads", value_header(graph_type), "Error", "Rel. Error (%)"]);

    for record in dataset.records() {
        table.add_row(row![
            record.threads,
            format!("{:.6}", record.value),
            format!("{:.6}", record.error),
            format!("{:.2}", record.relative_error() * 100.0),
        ]);
    }
    table
}

pub fn print_sweep_report(report: &SweepReport) {
    for dataset in &report.datasets {
        println!("\nResults for {}:", dataset.variant);
        variant_table(dataset, report.config.graph_type).printstd();
    }
}
