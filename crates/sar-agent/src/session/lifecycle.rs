use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Idle,
    Streaming,
    AwaitingToolResults,
    AwaitingFinal,
    Errored,
}

impl SessionStatus {
    /// States from which a new user turn may start.
    pub const fn accepts_input(self) -> bool {
        matches!(self, Self::Idle | Self::Errored)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid transition from {from:?} to {to:?}")]
pub struct LifecycleError {
    pub from: SessionStatus,
    pub to: SessionStatus,
}

pub fn transition_status(
    status: &mut SessionStatus,
    next: SessionStatus,
) -> Result<(), LifecycleError> {
    if *status == next {
        return Ok(());
    }

    let allowed = matches!(
        (*status, next),
        (SessionStatus::Idle, SessionStatus::Streaming)
            | (SessionStatus::Errored, SessionStatus::Streaming)
            | (SessionStatus::Streaming, SessionStatus::AwaitingToolResults)
            | (SessionStatus::AwaitingToolResults, SessionStatus::Streaming)
            | (SessionStatus::AwaitingToolResults, SessionStatus::AwaitingFinal)
            | (SessionStatus::Streaming, SessionStatus::Idle)
            | (SessionStatus::AwaitingToolResults, SessionStatus::Idle)
            | (SessionStatus::AwaitingFinal, SessionStatus::Idle)
            | (SessionStatus::Streaming, SessionStatus::Errored)
            | (SessionStatus::AwaitingToolResults, SessionStatus::Errored)
            | (SessionStatus::AwaitingFinal, SessionStatus::Errored)
    );

    if !allowed {
        return Err(LifecycleError {
            from: *status,
            to: next,
        });
    }

    *status = next;
    Ok(())
}
