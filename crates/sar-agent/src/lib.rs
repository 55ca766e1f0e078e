//! SAR assistant core: the map command registry and dispatcher, the event bus
//! that carries commands to the visualization, the visualization state
//! machine, and the conversation turn loop that ties them to the model.

pub mod bus;
pub mod config;
pub mod map;
pub mod session;
pub mod tools;

pub use bus::{EventBus, Subscription};
pub use config::{AssistantConfig, ConfigError, DEFAULT_MAX_STEPS, SYSTEM_PROMPT};
pub use map::*;
pub use session::{
    ChatSession, LifecycleError, SessionStatus, TurnError, TurnEvent, TurnFinish, TurnOutcome,
};
pub use tools::*;
