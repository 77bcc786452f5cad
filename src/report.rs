use std::time::Duration;

use comfy_table::{presets, Cell, CellAlignment, ContentArrangement, Table};

use crate::engine::EngineStatus;

/// Summary of one completed path step, handed to a [`PathReporter`].
#[derive(Debug, Clone)]
pub struct StepReport {
    pub step: usize,
    pub lambda: f64,
    pub status: EngineStatus,
    pub iterations: usize,
    pub objective: f64,
    /// `max_j |x_j - prev_j|`; absent on the first step.
    pub max_diff: Option<f64>,
    pub abs_sum: f64,
    pub nonzeros: usize,
}

pub(crate) fn emit_line(line: &str) {
    if log::log_enabled!(log::Level::Info) {
        log::info!("{line}");
    } else {
        println!("{line}");
    }
}

pub(crate) fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs >= 1.0 {
        format!("{:.3} s", secs)
    } else if secs >= 1e-3 {
        format!("{:.3} ms", secs * 1e3)
    } else if secs >= 1e-6 {
        format!("{:.3} us", secs * 1e6)
    } else {
        format!("{:.0} ns", secs * 1e9)
    }
}

pub trait PathReporter {
    fn on_step(&mut self, report: &StepReport);
    fn on_finish(&mut self) {}
}

/// Collects steps and prints them as one table when the path finishes.
pub struct TableReporter {
    rows: Vec<StepReport>,
}

impl TableReporter {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }
}

impl Default for TableReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl PathReporter for TableReporter {
    fn on_step(&mut self, report: &StepReport) {
        self.rows.push(report.clone());
    }

    fn on_finish(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        if !log::log_enabled!(log::Level::Info) {
            println!();
        }
        let mut table = Table::new();
        table.load_preset(presets::UTF8_FULL);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("step").set_alignment(CellAlignment::Right),
            Cell::new("lambda").set_alignment(CellAlignment::Right),
            Cell::new("iters").set_alignment(CellAlignment::Right),
            Cell::new("objective").set_alignment(CellAlignment::Right),
            Cell::new("max diff").set_alignment(CellAlignment::Right),
            Cell::new("|x|_1").set_alignment(CellAlignment::Right),
            Cell::new("nnz").set_alignment(CellAlignment::Right),
            Cell::new("status"),
        ]);
        for row in &self.rows {
            let max_diff = match row.max_diff {
                Some(diff) => format!("{diff:.2e}"),
                None => "-".to_string(),
            };
            table.add_row(vec![
                Cell::new(row.step).set_alignment(CellAlignment::Right),
                Cell::new(format!("{:.4e}", row.lambda)).set_alignment(CellAlignment::Right),
                Cell::new(row.iterations).set_alignment(CellAlignment::Right),
                Cell::new(format!("{:.6e}", row.objective)).set_alignment(CellAlignment::Right),
                Cell::new(max_diff).set_alignment(CellAlignment::Right),
                Cell::new(format!("{:.4e}", row.abs_sum)).set_alignment(CellAlignment::Right),
                Cell::new(row.nonzeros).set_alignment(CellAlignment::Right),
                Cell::new(row.status),
            ]);
        }

        for line in table.to_string().lines() {
            emit_line(line);
        }
        self.rows.clear();
    }
}
