//! Shared output helpers.
//!
//! Assistant text streams to stdout as it arrives; tool activity is printed
//! on its own bracketed lines so it stays distinguishable from the answer.

use std::io::Write;

use anyhow::Result;
use sar_agent::{MapState, TurnEvent, TurnFinish, TurnOutcome};
use serde_json::Value;

pub fn print_json(value: &Value, pretty: bool) -> Result<()> {
    if pretty {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", serde_json::to_string(value)?);
    }
    Ok(())
}

pub fn describe_map(state: &MapState) -> String {
    let heatmap = state.heatmap_aspect.map_or("off", |aspect| aspect.as_str());
    format!(
        "center {:.4},{:.4} zoom {} | risk polygons {} | heatmap {}",
        state.center.lat,
        state.center.lng,
        state.zoom,
        if state.risk_layer_visible { "on" } else { "off" },
        heatmap,
    )
}

/// Observer for interactive turns. Tracks whether the cursor sits mid-line
/// so tool lines start on a fresh one.
#[derive(Default)]
pub struct TurnPrinter {
    mid_line: bool,
}

impl TurnPrinter {
    pub fn on_event(&mut self, event: TurnEvent) {
        let mut stdout = std::io::stdout().lock();
        match event {
            TurnEvent::TextDelta(delta) => {
                let _ = write!(stdout, "{delta}");
                let _ = stdout.flush();
                self.mid_line = !delta.ends_with('\n');
            }
            TurnEvent::ToolCall(call) => {
                self.break_line(&mut stdout);
                let _ = writeln!(stdout, "[tool] {} {}", call.name, call.args);
            }
            TurnEvent::ToolResult(result) => {
                let tag = if result.is_error { "error" } else { "result" };
                let _ = writeln!(stdout, "[{tag}] {}", result.output);
            }
            TurnEvent::StepFinished { .. } => {}
            TurnEvent::ToolCallsSuppressed { count } => {
                self.break_line(&mut stdout);
                let _ = writeln!(stdout, "[step limit] {count} tool call(s) not run");
            }
        }
    }

    pub fn finish(&mut self, outcome: &TurnOutcome) {
        let mut stdout = std::io::stdout().lock();
        self.break_line(&mut stdout);
        match outcome.finish {
            TurnFinish::Completed => {}
            TurnFinish::StepBoundReached => {
                let _ = writeln!(stdout, "[step limit reached after {} step(s)]", outcome.steps);
            }
            TurnFinish::Cancelled => {
                let _ = writeln!(stdout, "[cancelled]");
            }
        }
    }

    fn break_line(&mut self, stdout: &mut impl Write) {
        if self.mid_line {
            let _ = writeln!(stdout);
            self.mid_line = false;
        }
    }
}
