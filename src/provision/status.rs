use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL};
use serde::Serialize;

use super::{Provisioner, Step};
use crate::ui::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Done,
    Pending,
    AlwaysRuns,
}

impl StepState {
    fn label(self) -> &'static str {
        match self {
            StepState::Done => "done",
            StepState::Pending => "pending",
            StepState::AlwaysRuns => "always runs",
        }
    }

    fn color(self) -> Color {
        match self {
            StepState::Done => Color::Green,
            StepState::Pending => Color::Yellow,
            StepState::AlwaysRuns => Color::Blue,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepStatus {
    pub step: Step,
    pub description: &'static str,
    pub state: StepState,
}

/// Evaluate every predicate of the provisioner's phase without applying anything.
pub fn collect(p: &Provisioner) -> Vec<StepStatus> {
    p.phase
        .steps()
        .iter()
        .map(|&step| StepStatus {
            step,
            description: step.description(),
            state: if step.always_runs() {
                StepState::AlwaysRuns
            } else if p.is_satisfied(step) {
                StepState::Done
            } else {
                StepState::Pending
            },
        })
        .collect()
}

fn render_table(statuses: &[StepStatus]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Step", "Description", "State"]);
    for status in statuses {
        table.add_row(vec![
            Cell::new(status.step.id()),
            Cell::new(status.description),
            Cell::new(status.state.label()).fg(status.state.color()),
        ]);
    }
    table
}

pub fn print_status(p: &Provisioner) {
    let statuses = collect(p);
    let pending = statuses
        .iter()
        .filter(|s| s.state == StepState::Pending)
        .count();

    match get_output_format() {
        OutputFormat::Json => emit(
            Level::Info,
            "status.steps",
            &format!("{} {} phase: {} pending", char::from(NerdFont::Info), p.phase.name(), pending),
            Some(serde_json::json!({
                "phase": p.phase,
                "steps": statuses,
                "pending": pending,
            })),
        ),
        OutputFormat::Text => {
            println!("{}", render_table(&statuses));
            emit(
                Level::Info,
                "status.summary",
                &format!(
                    "{} {} phase for '{}': {} of {} steps pending",
                    char::from(NerdFont::Info),
                    p.phase.name(),
                    p.config.user.name,
                    pending,
                    statuses.len()
                ),
                None,
            );
        }
    }
}
