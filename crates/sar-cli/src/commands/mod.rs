//! CLI command handlers.

pub mod apply;
pub mod ask;
pub mod chat;
pub mod tools;

use anyhow::Result;
use sar_agent::{ChatSession, TurnError, TurnOutcome};
use sar_llm::AbortController;

use crate::output::TurnPrinter;

/// Run one turn, printing as it streams. Ctrl-C aborts the turn rather
/// than the process.
pub async fn run_turn(session: &mut ChatSession, prompt: &str) -> Result<TurnOutcome> {
    let controller = AbortController::new();
    let signal = controller.signal();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            controller.abort();
        }
    });

    let mut printer = TurnPrinter::default();
    let result = session
        .send(prompt, &signal, |event| printer.on_event(event))
        .await;
    watcher.abort();

    match result {
        Ok(outcome) => {
            printer.finish(&outcome);
            Ok(outcome)
        }
        Err(TurnError::Stream {
            source,
            partial_text,
            steps,
        }) => {
            if !partial_text.is_empty() {
                println!();
            }
            Err(anyhow::Error::new(source)
                .context(format!("answer stream failed after {steps} step(s)")))
        }
        Err(other) => Err(other.into()),
    }
}
