use std::collections::BTreeMap;

use sar_llm::ToolDefinition;
use serde_json::{Map, Value, json};
use thiserror::Error;

use super::types::{Aspect, Command, CommandKind, Layer, RecommendationCategory};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Enum(&'static [&'static str]),
}

impl FieldType {
    const fn json_type(self) -> &'static str {
        match self {
            Self::String | Self::Enum(_) => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub field_type: FieldType,
    pub required: bool,
    pub description: Option<&'static str>,
}

impl FieldSpec {
    const fn required(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            required: true,
            description: None,
        }
    }

    const fn optional(name: &'static str, field_type: FieldType) -> Self {
        Self {
            required: false,
            ..Self::required(name, field_type)
        }
    }

    const fn describe(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }
}

/// Every command answers the model with a plain text result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputType {
    Text,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    pub kind: CommandKind,
    pub name: &'static str,
    pub description: &'static str,
    pub fields: Vec<FieldSpec>,
    pub output: OutputType,
}

impl CommandSpec {
    fn new(kind: CommandKind, description: &'static str, fields: Vec<FieldSpec>) -> Self {
        Self {
            kind,
            name: kind.as_str(),
            description,
            fields,
            output: OutputType::Text,
        }
    }

    /// JSON schema of the arguments object. Unknown keys are tolerated, so
    /// `additionalProperties` is left unset.
    pub fn parameters_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            let mut property = json!({ "type": field.field_type.json_type() });
            if let FieldType::Enum(allowed) = field.field_type {
                property["enum"] = json!(allowed);
            }
            if let Some(description) = field.description {
                property["description"] = json!(description);
            }
            properties.insert(field.name.to_string(), property);
        }
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|field| field.required)
            .map(|field| field.name)
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    pub fn tool_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.to_string(),
            description: self.description.to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Immutable set of command specs, built once and shared.
#[derive(Debug, Clone)]
pub struct CommandRegistry {
    specs: BTreeMap<CommandKind, CommandSpec>,
}

impl CommandRegistry {
    pub fn standard() -> Self {
        let specs = CommandKind::ALL
            .into_iter()
            .map(|kind| (kind, standard_spec(kind)))
            .collect();
        Self { specs }
    }

    pub fn lookup(&self, name: &str) -> Option<&CommandSpec> {
        CommandKind::from_name(name).and_then(|kind| self.specs.get(&kind))
    }

    pub fn get(&self, kind: CommandKind) -> Option<&CommandSpec> {
        self.specs.get(&kind)
    }

    pub fn specs(&self) -> impl Iterator<Item = &CommandSpec> {
        self.specs.values()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.specs.values().map(|spec| spec.name).collect()
    }

    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.specs.values().map(CommandSpec::tool_definition).collect()
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

fn standard_spec(kind: CommandKind) -> CommandSpec {
    match kind {
        CommandKind::ScrollToSection => CommandSpec::new(
            kind,
            "Scroll to a section by its element id (e.g., 'map', 'numbers', 'hero', 'sar').",
            vec![FieldSpec::required("sectionId", FieldType::String)],
        ),
        CommandKind::FocusMapOn => CommandSpec::new(
            kind,
            "Focus the map on a lat/lng and optional zoom level.",
            vec![
                FieldSpec::required("lat", FieldType::Number),
                FieldSpec::required("lng", FieldType::Number),
                FieldSpec::optional("zoom", FieldType::Number),
            ],
        ),
        CommandKind::ToggleLayer => CommandSpec::new(
            kind,
            "Toggle a map layer on or off.",
            vec![
                FieldSpec::required("layer", FieldType::Enum(Layer::NAMES)),
                FieldSpec::required("visible", FieldType::Boolean),
            ],
        ),
        CommandKind::SetHeatmap => CommandSpec::new(
            kind,
            "Change active heatmap aspect.",
            vec![FieldSpec::required("aspect", FieldType::Enum(Aspect::NAMES))],
        ),
        CommandKind::ProvideRecommendation => CommandSpec::new(
            kind,
            "Provide safety recommendations and guidance for landslide risk mitigation. \
             Use this when users ask for advice, safety tips, evacuation guidance, or what \
             to do in specific risk scenarios.",
            vec![
                FieldSpec::required("category", FieldType::Enum(RecommendationCategory::NAMES))
                    .describe("Type of recommendation being provided"),
                FieldSpec::optional("location", FieldType::String)
                    .describe("Specific location if the recommendation is location-based"),
            ],
        ),
    }
}

/// One reason an argument object was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Violation {
    #[error("arguments must be a JSON object, found {found}")]
    NotAnObject { found: &'static str },
    #[error("{field}: required field is missing")]
    Missing { field: &'static str },
    #[error("{field}: expected {expected}, found {found}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },
    #[error("{field}: expected one of {}, found {found:?}", .allowed.join("|"))]
    NotInEnum {
        field: &'static str,
        allowed: &'static [&'static str],
        found: String,
    },
    #[error("{detail}")]
    Malformed { detail: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("Invalid arguments for {command}: {}", join_violations(.violations))]
pub struct ValidationError {
    pub command: &'static str,
    pub violations: Vec<Violation>,
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Check `args` against `spec` and build the typed command.
///
/// All violations are collected in field order. `null` counts as absent and
/// keys the spec does not declare are ignored.
pub fn validate(spec: &CommandSpec, args: &Value) -> Result<Command, ValidationError> {
    let reject = |violations| ValidationError {
        command: spec.name,
        violations,
    };

    let Value::Object(object) = args else {
        return Err(reject(vec![Violation::NotAnObject {
            found: json_type_name(args),
        }]));
    };

    let mut violations = Vec::new();
    let mut normalized = Map::new();
    for field in &spec.fields {
        let value = match object.get(field.name) {
            None | Some(Value::Null) => {
                if field.required {
                    violations.push(Violation::Missing { field: field.name });
                }
                continue;
            }
            Some(value) => value,
        };
        match check_field(field, value) {
            Ok(()) => {
                normalized.insert(field.name.to_string(), value.clone());
            }
            Err(violation) => violations.push(violation),
        }
    }

    if !violations.is_empty() {
        return Err(reject(violations));
    }

    serde_json::from_value(json!({ "name": spec.name, "args": normalized })).map_err(|error| {
        reject(vec![Violation::Malformed {
            detail: error.to_string(),
        }])
    })
}

fn check_field(field: &FieldSpec, value: &Value) -> Result<(), Violation> {
    let wrong_type = || Violation::WrongType {
        field: field.name,
        expected: field.field_type.json_type(),
        found: json_type_name(value),
    };
    match field.field_type {
        FieldType::String => {
            value.as_str().ok_or_else(wrong_type)?;
        }
        FieldType::Boolean => {
            value.as_bool().ok_or_else(wrong_type)?;
        }
        FieldType::Enum(allowed) => {
            let found = value.as_str().ok_or_else(wrong_type)?;
            if !allowed.contains(&found) {
                return Err(Violation::NotInEnum {
                    field: field.name,
                    allowed,
                    found: found.to_string(),
                });
            }
        }
        FieldType::Number => {
            value.as_f64().ok_or_else(wrong_type)?;
        }
    }
    Ok(())
}
