//! Output formatting for the runner binary

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};

use anesteasy_e2e::runner::{StepOutcome, SuiteResult};
use anesteasy_e2e::Scenario;

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Print the outcome of a run
pub fn print_suite(suite: &SuiteResult, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            let mut table = new_table();
            table.set_header(vec!["Scenario", "Result", "Duration", "Tolerated waits", "Error"]);

            for result in &suite.results {
                let name = match &result.id {
                    Some(id) => format!("{} {}", id, result.name),
                    None => result.name.clone(),
                };
                let status = if result.success {
                    "PASS".green().to_string()
                } else {
                    "FAIL".red().to_string()
                };
                let tolerated = result
                    .steps
                    .iter()
                    .filter(|s| matches!(s.outcome, StepOutcome::Tolerated { .. }))
                    .count();

                table.add_row(vec![
                    name,
                    status,
                    format!("{:.1}s", result.duration_ms as f64 / 1000.0),
                    tolerated.to_string(),
                    result.error.clone().unwrap_or_default(),
                ]);
            }

            println!("{table}");

            let summary = format!(
                "{} passed, {} failed, {} total ({:.1}s)",
                suite.passed,
                suite.failed,
                suite.total,
                suite.duration_ms as f64 / 1000.0
            );
            if suite.success() {
                println!("{}", summary.green());
            } else {
                println!("{}", summary.red());
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(suite).unwrap_or_default());
        }
    }
}

/// Print the scenario catalogue
pub fn print_scenarios(scenarios: &[&Scenario]) {
    if scenarios.is_empty() {
        println!("No scenarios found.");
        return;
    }

    let mut table = new_table();
    table.set_header(vec!["Id", "Name", "Title", "Tags", "Steps", "Checks"]);
    for s in scenarios {
        table.add_row(vec![
            s.id.clone().unwrap_or_else(|| "-".to_string()),
            s.name.clone(),
            s.title.clone(),
            s.tags.join(", "),
            s.steps.len().to_string(),
            s.expect.visible.len().to_string(),
        ]);
    }
    println!("{table}");
}
