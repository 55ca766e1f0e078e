use std::sync::Arc;

use sar_llm::ToolCall;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use super::registry::{CommandRegistry, validate};
use super::types::Command;
use crate::bus::EventBus;
use crate::map::{MAP_EVENT_CHANNEL, MapCommand};

/// Zoom used when the model focuses the map without one.
pub const DEFAULT_FOCUS_ZOOM: f64 = 14.0;

pub const ACKNOWLEDGED_OUTPUT: &str = "Tool call executed successfully.";

/// A tool call as requested by the model, consumed once by the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub args: Value,
}

impl ToolInvocation {
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
        }
    }
}

impl From<&ToolCall> for ToolInvocation {
    /// Raw argument strings that do not parse are passed through as a JSON
    /// string, which validation then rejects as not an object.
    fn from(call: &ToolCall) -> Self {
        let args = call.parsed_arguments().unwrap_or_else(|_| {
            Value::String(call.raw_arguments.clone().unwrap_or_default())
        });
        Self::new(call.id.clone(), call.name.clone(), args)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolResult {
    pub id: String,
    pub name: String,
    pub output: String,
    pub is_error: bool,
}

/// How to answer a tool name the registry does not know.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnknownCommandPolicy {
    /// Report the unknown name back to the model as an error.
    #[default]
    Reject,
    /// Pretend the call succeeded.
    Acknowledge,
}

impl UnknownCommandPolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reject => "reject",
            Self::Acknowledge => "acknowledge",
        }
    }
}

impl std::fmt::Display for UnknownCommandPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown command policy '{0}' (expected 'reject' or 'acknowledge')")]
pub struct ParsePolicyError(pub String);

impl std::str::FromStr for UnknownCommandPolicy {
    type Err = ParsePolicyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "acknowledge" | "ack" => Ok(Self::Acknowledge),
            _ => Err(ParsePolicyError(value.to_string())),
        }
    }
}

/// Validates tool invocations and turns them into bus publications.
///
/// `dispatch` is total: every invocation yields exactly one [`ToolResult`],
/// and failures are reported to the model as text instead of being raised.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<CommandRegistry>,
    bus: EventBus<MapCommand>,
    unknown_policy: UnknownCommandPolicy,
}

impl Dispatcher {
    pub fn new(registry: Arc<CommandRegistry>, bus: EventBus<MapCommand>) -> Self {
        Self {
            registry,
            bus,
            unknown_policy: UnknownCommandPolicy::default(),
        }
    }

    pub fn with_unknown_policy(mut self, policy: UnknownCommandPolicy) -> Self {
        self.unknown_policy = policy;
        self
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn bus(&self) -> &EventBus<MapCommand> {
        &self.bus
    }

    pub fn dispatch(&self, invocation: &ToolInvocation) -> ToolResult {
        let result = |output: String, is_error: bool| ToolResult {
            id: invocation.id.clone(),
            name: invocation.name.clone(),
            output,
            is_error,
        };

        let Some(spec) = self.registry.lookup(&invocation.name) else {
            warn!(
                command = %invocation.name,
                call_id = %invocation.id,
                policy = %self.unknown_policy,
                "unknown command"
            );
            return match self.unknown_policy {
                UnknownCommandPolicy::Reject => result(
                    format!(
                        "Unknown command '{}'. Available commands: {}",
                        invocation.name,
                        self.registry.names().join(", ")
                    ),
                    true,
                ),
                UnknownCommandPolicy::Acknowledge => result(ACKNOWLEDGED_OUTPUT.to_string(), false),
            };
        };

        match validate(spec, &invocation.args) {
            Ok(command) => {
                let output = self.execute(&command);
                info!(
                    command = %invocation.name,
                    call_id = %invocation.id,
                    "command dispatched"
                );
                result(output, false)
            }
            Err(error) => {
                warn!(
                    command = %invocation.name,
                    call_id = %invocation.id,
                    %error,
                    "command rejected"
                );
                result(error.to_string(), true)
            }
        }
    }

    /// Run the side effect of a validated command and describe it.
    pub fn execute(&self, command: &Command) -> String {
        match command {
            Command::ScrollToSection { section_id } => {
                self.publish(MapCommand::ScrollToSection {
                    section_id: section_id.clone(),
                });
                format!("Scrolled to section: {section_id}")
            }
            Command::FocusMapOn { lat, lng, zoom } => {
                let zoom = zoom.unwrap_or(DEFAULT_FOCUS_ZOOM);
                self.publish(MapCommand::FocusOn {
                    lat: *lat,
                    lng: *lng,
                    zoom: Some(zoom),
                });
                format!("Map focused on lat: {lat}, lng: {lng}, zoom: {zoom}")
            }
            Command::ToggleLayer { layer, visible } => {
                self.publish(MapCommand::ToggleLayer {
                    layer: *layer,
                    visible: *visible,
                });
                format!("Toggled map layer {layer} to visible: {visible}")
            }
            Command::SetHeatmap { aspect } => {
                self.publish(MapCommand::SetHeatmapAspect { aspect: *aspect });
                format!("Set map heatmap to: {aspect}")
            }
            Command::ProvideRecommendation { category, location } => match location {
                Some(location) => format!(
                    "Recommendation request categorized as: {} for {location}",
                    category.as_str()
                ),
                None => format!(
                    "Recommendation request categorized as: {}",
                    category.as_str()
                ),
            },
        }
    }

    fn publish(&self, command: MapCommand) {
        self.bus.publish(MAP_EVENT_CHANNEL, &command);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Subscription;
    use serde_json::json;
    use std::sync::Mutex;

    fn dispatcher_with_log() -> (
        Dispatcher,
        Arc<Mutex<Vec<MapCommand>>>,
        Subscription<MapCommand>,
    ) {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let subscription = bus.subscribe(MAP_EVENT_CHANNEL, move |command: &MapCommand| {
            sink.lock().unwrap().push(command.clone());
        });
        let dispatcher = Dispatcher::new(Arc::new(CommandRegistry::standard()), bus);
        (dispatcher, log, subscription)
    }

    #[test]
    fn focus_defaults_zoom_and_echoes_coordinates() {
        let (dispatcher, log, _guard) = dispatcher_with_log();
        let result = dispatcher.dispatch(&ToolInvocation::new(
            "call_1",
            "focusMapOn",
            json!({"lat": 29.23, "lng": 79.51}),
        ));
        assert!(!result.is_error);
        assert_eq!(result.id, "call_1");
        assert_eq!(result.output, "Map focused on lat: 29.23, lng: 79.51, zoom: 14");
        assert_eq!(
            *log.lock().unwrap(),
            vec![MapCommand::FocusOn {
                lat: 29.23,
                lng: 79.51,
                zoom: Some(14.0)
            }]
        );
    }

    #[test]
    fn result_texts_match_each_command() {
        let (dispatcher, log, _guard) = dispatcher_with_log();
        let cases = [
            ("scrollToSection", json!({"sectionId": "map"}), "Scrolled to section: map"),
            (
                "toggleLayer",
                json!({"layer": "rainfall", "visible": true}),
                "Toggled map layer rainfall to visible: true",
            ),
            ("setHeatmap", json!({"aspect": "slope"}), "Set map heatmap to: slope"),
            (
                "provideRecommendation",
                json!({"category": "evacuation", "location": "Ranibagh"}),
                "Recommendation request categorized as: evacuation for Ranibagh",
            ),
            (
                "provideRecommendation",
                json!({"category": "general"}),
                "Recommendation request categorized as: general",
            ),
        ];
        for (name, args, expected) in cases {
            let result = dispatcher.dispatch(&ToolInvocation::new("id", name, args));
            assert_eq!(result.output, expected);
            assert!(!result.is_error);
        }
        // Recommendations are pure.
        assert_eq!(log.lock().unwrap().len(), 3);
    }

    #[test]
    fn invalid_arguments_do_not_publish() {
        let (dispatcher, log, _guard) = dispatcher_with_log();
        let result = dispatcher.dispatch(&ToolInvocation::new(
            "call_2",
            "toggleLayer",
            json!({"layer": "risk", "visible": "yes"}),
        ));
        assert!(result.is_error);
        assert!(result.output.starts_with("Invalid arguments for toggleLayer"));
        assert!(result.output.contains("visible"));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn unknown_commands_follow_policy() {
        let (dispatcher, log, _guard) = dispatcher_with_log();
        let invocation = ToolInvocation::new("call_3", "launchRocket", json!({}));

        let rejected = dispatcher.dispatch(&invocation);
        assert!(rejected.is_error);
        assert!(rejected.output.starts_with("Unknown command 'launchRocket'"));
        assert!(rejected.output.contains("focusMapOn"));

        let acknowledged = dispatcher
            .clone()
            .with_unknown_policy(UnknownCommandPolicy::Acknowledge)
            .dispatch(&invocation);
        assert!(!acknowledged.is_error);
        assert_eq!(acknowledged.output, ACKNOWLEDGED_OUTPUT);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn unparseable_raw_arguments_become_not_an_object() {
        let call = ToolCall {
            id: "call_4".into(),
            name: "setHeatmap".into(),
            arguments: json!({}),
            raw_arguments: Some("{\"aspect\":".into()),
        };
        let invocation = ToolInvocation::from(&call);
        assert_eq!(invocation.args, json!("{\"aspect\":"));
        let (dispatcher, _log, _guard) = dispatcher_with_log();
        let result = dispatcher.dispatch(&invocation);
        assert!(result.is_error);
        assert!(result.output.contains("must be a JSON object"));
    }

    #[test]
    fn policy_parses_from_text() {
        assert_eq!(
            "Acknowledge".parse::<UnknownCommandPolicy>(),
            Ok(UnknownCommandPolicy::Acknowledge)
        );
        assert_eq!("reject".parse::<UnknownCommandPolicy>(), Ok(UnknownCommandPolicy::Reject));
        assert!("ignore".parse::<UnknownCommandPolicy>().is_err());
    }
}
