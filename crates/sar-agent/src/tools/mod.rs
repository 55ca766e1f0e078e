pub mod dispatch;
pub mod registry;
pub mod types;

pub use dispatch::{
    ACKNOWLEDGED_OUTPUT, DEFAULT_FOCUS_ZOOM, Dispatcher, ParsePolicyError, ToolInvocation,
    ToolResult, UnknownCommandPolicy,
};
pub use registry::{
    CommandRegistry, CommandSpec, FieldSpec, FieldType, OutputType, ValidationError, Violation,
    validate,
};
pub use types::{Aspect, Command, CommandKind, Layer, RecommendationCategory};
