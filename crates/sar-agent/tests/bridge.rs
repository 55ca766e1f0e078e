//! Tool calls flowing through the dispatcher and bus into a mounted map.

use std::sync::Arc;

use sar_agent::{
    Aspect, CommandRegistry, DEFAULT_CENTER, Dispatcher, EventBus, LatLng, MapCommand, MapState,
    NullSurface, PageHost, ToolInvocation, Visualization,
};
use serde_json::json;

fn call(name: &str, args: serde_json::Value) -> ToolInvocation {
    ToolInvocation::new(format!("call_{name}"), name, args)
}

fn wired() -> (Dispatcher, Visualization, EventBus<MapCommand>) {
    let bus = EventBus::new();
    let dispatcher = Dispatcher::new(Arc::new(CommandRegistry::standard()), bus.clone());
    (dispatcher, Visualization::new(bus.clone()), bus)
}

#[test]
fn focus_updates_the_mounted_view_exactly() {
    let (dispatcher, visualization, _bus) = wired();
    let map = visualization.mount(NullSurface);

    let result = dispatcher.dispatch(&call(
        "focusMapOn",
        json!({"lat": 29.28, "lng": 79.55, "zoom": 15}),
    ));
    assert!(!result.is_error);
    let state = map.state();
    assert_eq!(state.center, LatLng::new(29.28, 79.55));
    assert_eq!(state.zoom, 15.0);
}

#[test]
fn commands_before_mount_are_lost() {
    let (dispatcher, visualization, _bus) = wired();

    let result = dispatcher.dispatch(&call("setHeatmap", json!({"aspect": "slope"})));
    assert!(!result.is_error);

    let map = visualization.mount(NullSurface);
    assert_eq!(map.state(), MapState::default());
    assert_eq!(map.state().center, DEFAULT_CENTER);
}

#[test]
fn showing_then_hiding_a_heat_layer_clears_the_aspect() {
    let (dispatcher, visualization, _bus) = wired();
    let map = visualization.mount(NullSurface);

    dispatcher.dispatch(&call("toggleLayer", json!({"layer": "rainfall", "visible": true})));
    assert_eq!(map.state().heatmap_aspect, Some(Aspect::Rainfall));

    dispatcher.dispatch(&call("toggleLayer", json!({"layer": "slope", "visible": false})));
    assert_eq!(map.state().heatmap_aspect, Some(Aspect::Rainfall));

    dispatcher.dispatch(&call("toggleLayer", json!({"layer": "rainfall", "visible": false})));
    assert_eq!(map.state().heatmap_aspect, None);
}

#[test]
fn risk_layer_toggle_leaves_heatmap_alone() {
    let (dispatcher, visualization, _bus) = wired();
    let map = visualization.mount(NullSurface);

    dispatcher.dispatch(&call("toggleLayer", json!({"layer": "risk", "visible": false})));
    let state = map.state();
    assert!(!state.risk_layer_visible);
    assert_eq!(state.heatmap_aspect, Some(Aspect::Risk));
}

#[test]
fn invalid_arguments_leave_the_map_untouched() {
    let (dispatcher, visualization, _bus) = wired();
    let map = visualization.mount(NullSurface);

    let result = dispatcher.dispatch(&call("toggleLayer", json!({"layer": "risk", "visible": "yes"})));
    assert!(result.is_error);
    let result = dispatcher.dispatch(&call("focusMapOn", json!({"lat": "29.2N", "lng": 79.5})));
    assert!(result.is_error);
    assert!(result.output.contains("lat"));

    assert_eq!(map.state(), MapState::default());
}

#[test]
fn coordinates_are_forwarded_without_clamping() {
    let (dispatcher, visualization, _bus) = wired();
    let map = visualization.mount(NullSurface);

    let result = dispatcher.dispatch(&call("focusMapOn", json!({"lat": 120.0, "lng": 79.5})));
    assert!(!result.is_error);
    assert_eq!(map.state().center, LatLng::new(120.0, 79.5));
}

#[test]
fn scroll_reaches_the_page_but_not_the_map() {
    let (dispatcher, visualization, bus) = wired();
    let map = visualization.mount(NullSurface);
    let page = PageHost::standard(&bus);

    let result = dispatcher.dispatch(&call("scrollToSection", json!({"sectionId": "education"})));
    assert_eq!(result.output, "Scrolled to section: education");
    assert_eq!(page.current_section().as_deref(), Some("education"));
    assert_eq!(map.state(), MapState::default());
}

#[test]
fn unmounted_maps_stop_receiving_commands() {
    let (dispatcher, visualization, bus) = wired();
    let map = visualization.mount(NullSurface);
    dispatcher.dispatch(&call("setHeatmap", json!({"aspect": "population"})));
    let final_state = map.unmount();
    assert_eq!(final_state.heatmap_aspect, Some(Aspect::Population));

    // Nobody is listening now; the result text is still produced.
    let result = dispatcher.dispatch(&call("setHeatmap", json!({"aspect": "slope"})));
    assert_eq!(result.output, "Set map heatmap to: slope");
    assert_eq!(bus.subscriber_count(sar_agent::MAP_EVENT_CHANNEL), 0);
}
