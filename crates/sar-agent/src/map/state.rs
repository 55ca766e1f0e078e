use serde::{Deserialize, Serialize};

use crate::tools::{Aspect, Layer};

/// Bus channel carrying [`MapCommand`] payloads.
pub const MAP_EVENT_CHANNEL: &str = "mapEvent";

/// Zoom used when a focus command arrives without one.
pub const FALLBACK_FOCUS_ZOOM: f64 = 12.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Haldwani, the default map center.
pub const DEFAULT_CENTER: LatLng = LatLng::new(29.3, 79.525);
pub const DEFAULT_ZOOM: f64 = 12.0;

/// Payload published on [`MAP_EVENT_CHANNEL`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum MapCommand {
    #[serde(rename = "focusMapOn")]
    FocusOn {
        lat: f64,
        lng: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        zoom: Option<f64>,
    },
    #[serde(rename = "toggleLayer")]
    ToggleLayer { layer: Layer, visible: bool },
    #[serde(rename = "setHeatmap")]
    SetHeatmapAspect { aspect: Aspect },
    #[serde(rename = "scrollTo")]
    ScrollToSection {
        #[serde(rename = "sectionId")]
        section_id: String,
    },
}

/// What a command changed. An all-false transition is a no-op.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapTransition {
    pub view: bool,
    pub risk_layer: bool,
    pub heatmap: bool,
}

impl MapTransition {
    pub fn is_noop(&self) -> bool {
        !(self.view || self.risk_layer || self.heatmap)
    }
}

/// Viewport, risk polygon visibility and the single heatmap aspect slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MapState {
    pub center: LatLng,
    pub zoom: f64,
    pub risk_layer_visible: bool,
    pub heatmap_aspect: Option<Aspect>,
}

impl Default for MapState {
    fn default() -> Self {
        Self {
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
            risk_layer_visible: true,
            heatmap_aspect: Some(Aspect::Risk),
        }
    }
}

impl MapState {
    pub fn apply(&mut self, command: &MapCommand) -> MapTransition {
        match command {
            MapCommand::FocusOn { lat, lng, zoom } => {
                self.set_view(LatLng::new(*lat, *lng), zoom.unwrap_or(FALLBACK_FOCUS_ZOOM))
            }
            MapCommand::ToggleLayer { layer, visible } => match layer.heatmap_aspect() {
                None => self.set_risk_layer(*visible),
                Some(aspect) if *visible => self.set_aspect(Some(aspect)),
                Some(aspect) if self.heatmap_aspect == Some(aspect) => self.set_aspect(None),
                // Hiding a layer that is not the active aspect leaves the slot alone.
                Some(_) => MapTransition::default(),
            },
            MapCommand::SetHeatmapAspect { aspect } => self.set_aspect(Some(*aspect)),
            MapCommand::ScrollToSection { .. } => MapTransition::default(),
        }
    }

    /// Flip the risk polygon overlay, as the toolbar's risk button does.
    pub fn toggle_risk_layer(&mut self) -> MapTransition {
        self.set_risk_layer(!self.risk_layer_visible)
    }

    /// Toolbar heatmap button: activate `aspect`, or clear it when it is
    /// already the active one.
    pub fn toggle_heatmap(&mut self, aspect: Aspect) -> MapTransition {
        if self.heatmap_aspect == Some(aspect) {
            self.set_aspect(None)
        } else {
            self.set_aspect(Some(aspect))
        }
    }

    fn set_view(&mut self, center: LatLng, zoom: f64) -> MapTransition {
        let changed = self.center != center || self.zoom != zoom;
        self.center = center;
        self.zoom = zoom;
        MapTransition {
            view: changed,
            ..MapTransition::default()
        }
    }

    fn set_risk_layer(&mut self, visible: bool) -> MapTransition {
        let changed = self.risk_layer_visible != visible;
        self.risk_layer_visible = visible;
        MapTransition {
            risk_layer: changed,
            ..MapTransition::default()
        }
    }

    fn set_aspect(&mut self, aspect: Option<Aspect>) -> MapTransition {
        let changed = self.heatmap_aspect != aspect;
        self.heatmap_aspect = aspect;
        MapTransition {
            heatmap: changed,
            ..MapTransition::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn toggle(layer: Layer, visible: bool) -> MapCommand {
        MapCommand::ToggleLayer { layer, visible }
    }

    #[test]
    fn defaults_show_risk_everywhere() {
        let state = MapState::default();
        assert_eq!(state.center, LatLng::new(29.3, 79.525));
        assert_eq!(state.zoom, 12.0);
        assert!(state.risk_layer_visible);
        assert_eq!(state.heatmap_aspect, Some(Aspect::Risk));
    }

    #[test]
    fn risk_toggle_tracks_last_value_and_ignores_aspect() {
        let mut state = MapState::default();
        for visible in [false, false, true, false] {
            state.apply(&toggle(Layer::Risk, visible));
            assert_eq!(state.risk_layer_visible, visible);
            assert_eq!(state.heatmap_aspect, Some(Aspect::Risk));
        }
    }

    #[test]
    fn aspect_slot_is_exclusive() {
        let mut state = MapState::default();
        state.apply(&MapCommand::SetHeatmapAspect {
            aspect: Aspect::Slope,
        });
        state.apply(&MapCommand::SetHeatmapAspect {
            aspect: Aspect::Rainfall,
        });
        assert_eq!(state.heatmap_aspect, Some(Aspect::Rainfall));

        state.apply(&toggle(Layer::Population, true));
        assert_eq!(state.heatmap_aspect, Some(Aspect::Population));
    }

    #[test]
    fn hiding_inactive_aspect_layer_keeps_current_aspect() {
        let mut state = MapState::default();
        state.apply(&toggle(Layer::Slope, true));
        let transition = state.apply(&toggle(Layer::Rainfall, false));
        assert!(transition.is_noop());
        assert_eq!(state.heatmap_aspect, Some(Aspect::Slope));

        state.apply(&toggle(Layer::Slope, false));
        assert_eq!(state.heatmap_aspect, None);
    }

    #[test]
    fn focus_sets_exact_viewport_and_defaults_zoom() {
        let mut state = MapState::default();
        let transition = state.apply(&MapCommand::FocusOn {
            lat: 29.23,
            lng: 79.51,
            zoom: Some(14.0),
        });
        assert!(transition.view);
        assert_eq!(state.center, LatLng::new(29.23, 79.51));
        assert_eq!(state.zoom, 14.0);

        state.apply(&MapCommand::FocusOn {
            lat: 29.28,
            lng: 79.55,
            zoom: None,
        });
        assert_eq!(state.zoom, FALLBACK_FOCUS_ZOOM);
        assert!(state.risk_layer_visible);
    }

    #[test]
    fn repeated_commands_are_idempotent() {
        let mut state = MapState::default();
        let command = MapCommand::SetHeatmapAspect {
            aspect: Aspect::Slope,
        };
        assert!(state.apply(&command).heatmap);
        let snapshot = state;
        assert!(state.apply(&command).is_noop());
        assert_eq!(state, snapshot);
    }

    #[test]
    fn toolbar_heatmap_button_toggles_active_aspect() {
        let mut state = MapState::default();
        state.toggle_heatmap(Aspect::Risk);
        assert_eq!(state.heatmap_aspect, None);
        state.toggle_heatmap(Aspect::Slope);
        assert_eq!(state.heatmap_aspect, Some(Aspect::Slope));
        state.toggle_risk_layer();
        assert!(!state.risk_layer_visible);
    }

    #[test]
    fn scroll_does_not_touch_map_state() {
        let mut state = MapState::default();
        let transition = state.apply(&MapCommand::ScrollToSection {
            section_id: "map".into(),
        });
        assert!(transition.is_noop());
        assert_eq!(state, MapState::default());
    }

    #[test]
    fn wire_format_uses_type_tag() {
        let value = serde_json::to_value(MapCommand::SetHeatmapAspect {
            aspect: Aspect::Rainfall,
        })
        .unwrap();
        assert_eq!(value, json!({"type": "setHeatmap", "aspect": "rainfall"}));

        let parsed: MapCommand =
            serde_json::from_value(json!({"type": "scrollTo", "sectionId": "numbers"})).unwrap();
        assert_eq!(
            parsed,
            MapCommand::ScrollToSection {
                section_id: "numbers".into()
            }
        );
    }
}
