use serde::{Deserialize, Serialize};

/// Map layers the assistant can toggle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Risk,
    Population,
    Slope,
    Rainfall,
}

impl Layer {
    pub const NAMES: &'static [&'static str] = &["risk", "population", "slope", "rainfall"];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Risk => "risk",
            Self::Population => "population",
            Self::Slope => "slope",
            Self::Rainfall => "rainfall",
        }
    }

    /// Heatmap aspect rendered by this layer. The risk layer is drawn as
    /// polygons and has no aspect of its own.
    pub const fn heatmap_aspect(self) -> Option<Aspect> {
        match self {
            Self::Risk => None,
            Self::Population => Some(Aspect::Population),
            Self::Slope => Some(Aspect::Slope),
            Self::Rainfall => Some(Aspect::Rainfall),
        }
    }
}

/// Data dimension rendered as the single heatmap overlay.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Aspect {
    Population,
    Slope,
    Rainfall,
    Risk,
}

impl Aspect {
    pub const NAMES: &'static [&'static str] = &["population", "slope", "rainfall", "risk"];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Population => "population",
            Self::Slope => "slope",
            Self::Rainfall => "rainfall",
            Self::Risk => "risk",
        }
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for Aspect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationCategory {
    Evacuation,
    Preparation,
    Monitoring,
    Emergency,
    General,
}

impl RecommendationCategory {
    pub const NAMES: &'static [&'static str] = &[
        "evacuation",
        "preparation",
        "monitoring",
        "emergency",
        "general",
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Evacuation => "evacuation",
            Self::Preparation => "preparation",
            Self::Monitoring => "monitoring",
            Self::Emergency => "emergency",
            Self::General => "general",
        }
    }
}

/// The closed set of commands the assistant may invoke.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum CommandKind {
    ScrollToSection,
    FocusMapOn,
    ToggleLayer,
    SetHeatmap,
    ProvideRecommendation,
}

impl CommandKind {
    /// Registration order.
    pub const ALL: [CommandKind; 5] = [
        Self::ScrollToSection,
        Self::FocusMapOn,
        Self::ToggleLayer,
        Self::SetHeatmap,
        Self::ProvideRecommendation,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ScrollToSection => "scrollToSection",
            Self::FocusMapOn => "focusMapOn",
            Self::ToggleLayer => "toggleLayer",
            Self::SetHeatmap => "setHeatmap",
            Self::ProvideRecommendation => "provideRecommendation",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

/// A validated, typed command.
///
/// Serializes as `{"name": ..., "args": {...}}` with the same field names the
/// model uses in its tool calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "name",
    content = "args",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Command {
    ScrollToSection {
        section_id: String,
    },
    FocusMapOn {
        lat: f64,
        lng: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        zoom: Option<f64>,
    },
    ToggleLayer {
        layer: Layer,
        visible: bool,
    },
    SetHeatmap {
        aspect: Aspect,
    },
    ProvideRecommendation {
        category: RecommendationCategory,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<String>,
    },
}

impl Command {
    pub const fn kind(&self) -> CommandKind {
        match self {
            Self::ScrollToSection { .. } => CommandKind::ScrollToSection,
            Self::FocusMapOn { .. } => CommandKind::FocusMapOn,
            Self::ToggleLayer { .. } => CommandKind::ToggleLayer,
            Self::SetHeatmap { .. } => CommandKind::SetHeatmap,
            Self::ProvideRecommendation { .. } => CommandKind::ProvideRecommendation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn enum_names_match_serde_names() {
        for name in Layer::NAMES {
            let layer: Layer = serde_json::from_value(json!(name)).unwrap();
            assert_eq!(layer.as_str(), *name);
        }
        for name in Aspect::NAMES {
            let aspect: Aspect = serde_json::from_value(json!(name)).unwrap();
            assert_eq!(aspect.as_str(), *name);
        }
        for name in RecommendationCategory::NAMES {
            let category: RecommendationCategory = serde_json::from_value(json!(name)).unwrap();
            assert_eq!(category.as_str(), *name);
        }
        for kind in CommandKind::ALL {
            assert_eq!(serde_json::to_value(kind).unwrap(), json!(kind.as_str()));
            assert_eq!(CommandKind::from_name(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn command_uses_tool_call_field_names() {
        let command = Command::ScrollToSection {
            section_id: "map".into(),
        };
        assert_eq!(
            serde_json::to_value(&command).unwrap(),
            json!({"name": "scrollToSection", "args": {"sectionId": "map"}})
        );
        assert_eq!(command.kind(), CommandKind::ScrollToSection);
    }

    #[test]
    fn only_aspect_layers_map_to_heatmap() {
        assert_eq!(Layer::Risk.heatmap_aspect(), None);
        assert_eq!(Layer::Rainfall.heatmap_aspect(), Some(Aspect::Rainfall));
    }
}
