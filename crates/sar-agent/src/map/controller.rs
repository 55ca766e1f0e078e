use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use super::state::{LatLng, MAP_EVENT_CHANNEL, MapCommand, MapState, MapTransition};
use crate::bus::{EventBus, Subscription};
use crate::tools::Aspect;

/// The rendering side of the map. Only receives the parts of the state that
/// changed.
pub trait MapSurface: Send {
    fn set_view(&mut self, center: LatLng, zoom: f64);

    fn set_risk_polygons_visible(&mut self, visible: bool);

    fn set_heat_layer(&mut self, aspect: Option<Aspect>);
}

/// Surface for headless use; state is still tracked by the controller.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSurface;

impl MapSurface for NullSurface {
    fn set_view(&mut self, _center: LatLng, _zoom: f64) {}

    fn set_risk_polygons_visible(&mut self, _visible: bool) {}

    fn set_heat_layer(&mut self, _aspect: Option<Aspect>) {}
}

struct Controller {
    state: MapState,
    surface: Box<dyn MapSurface>,
}

impl Controller {
    fn render(&mut self, transition: MapTransition) {
        if transition.view {
            self.surface.set_view(self.state.center, self.state.zoom);
        }
        if transition.risk_layer {
            self.surface
                .set_risk_polygons_visible(self.state.risk_layer_visible);
        }
        if transition.heatmap {
            self.surface.set_heat_layer(self.state.heatmap_aspect);
        }
    }

    fn apply(&mut self, command: &MapCommand) -> MapTransition {
        let transition = self.state.apply(command);
        if !transition.is_noop() {
            debug!(?command, ?transition, "map command applied");
        }
        self.render(transition);
        transition
    }
}

type SharedController = Arc<Mutex<Controller>>;

fn lock(controller: &SharedController) -> std::sync::MutexGuard<'_, Controller> {
    controller.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Factory for mounted maps bound to one bus.
#[derive(Debug, Clone)]
pub struct Visualization {
    bus: EventBus<MapCommand>,
}

impl Visualization {
    pub fn new(bus: EventBus<MapCommand>) -> Self {
        Self { bus }
    }

    /// Mount a fresh map: state starts from defaults every time, the surface
    /// receives the full initial state, and map commands are applied until
    /// the returned handle is unmounted or dropped.
    pub fn mount(&self, surface: impl MapSurface + 'static) -> MountedMap {
        let mut controller = Controller {
            state: MapState::default(),
            surface: Box::new(surface),
        };
        controller.render(MapTransition {
            view: true,
            risk_layer: true,
            heatmap: true,
        });
        let controller = Arc::new(Mutex::new(controller));

        let handler_controller = controller.clone();
        let subscription = self.bus.subscribe(MAP_EVENT_CHANNEL, move |command| {
            lock(&handler_controller).apply(command);
        });
        debug!("map mounted");

        MountedMap {
            controller,
            subscription,
        }
    }
}

/// A live map subscribed to the bus.
pub struct MountedMap {
    controller: SharedController,
    subscription: Subscription<MapCommand>,
}

impl std::fmt::Debug for MountedMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountedMap")
            .field("state", &self.state())
            .field("subscription", &self.subscription)
            .finish()
    }
}

impl MountedMap {
    pub fn state(&self) -> MapState {
        lock(&self.controller).state
    }

    /// Apply a command directly, bypassing the bus.
    pub fn apply(&self, command: &MapCommand) -> MapTransition {
        lock(&self.controller).apply(command)
    }

    pub fn toggle_risk_button(&self) -> MapTransition {
        let mut controller = lock(&self.controller);
        let transition = controller.state.toggle_risk_layer();
        controller.render(transition);
        transition
    }

    pub fn toggle_heatmap_button(&self, aspect: Aspect) -> MapTransition {
        let mut controller = lock(&self.controller);
        let transition = controller.state.toggle_heatmap(aspect);
        controller.render(transition);
        transition
    }

    /// Stop listening and return the final state.
    pub fn unmount(self) -> MapState {
        let state = self.state();
        self.subscription.unsubscribe();
        debug!("map unmounted");
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct RecordingSurface {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl MapSurface for RecordingSurface {
        fn set_view(&mut self, center: LatLng, zoom: f64) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("view {},{} z{}", center.lat, center.lng, zoom));
        }

        fn set_risk_polygons_visible(&mut self, visible: bool) {
            self.calls.lock().unwrap().push(format!("risk {visible}"));
        }

        fn set_heat_layer(&mut self, aspect: Option<Aspect>) {
            let name = aspect.map_or("none", Aspect::as_str);
            self.calls.lock().unwrap().push(format!("heat {name}"));
        }
    }

    #[test]
    fn mount_pushes_initial_state_to_surface() {
        let bus = EventBus::new();
        let surface = RecordingSurface::default();
        let _map = Visualization::new(bus).mount(surface.clone());
        assert_eq!(
            *surface.calls.lock().unwrap(),
            vec!["view 29.3,79.525 z12", "risk true", "heat risk"]
        );
    }

    #[test]
    fn surface_only_sees_changes() {
        let bus = EventBus::new();
        let surface = RecordingSurface::default();
        let map = Visualization::new(bus.clone()).mount(surface.clone());
        surface.calls.lock().unwrap().clear();

        bus.publish(
            MAP_EVENT_CHANNEL,
            &MapCommand::SetHeatmapAspect {
                aspect: Aspect::Risk,
            },
        );
        bus.publish(
            MAP_EVENT_CHANNEL,
            &MapCommand::SetHeatmapAspect {
                aspect: Aspect::Slope,
            },
        );
        map.toggle_risk_button();
        assert_eq!(*surface.calls.lock().unwrap(), vec!["heat slope", "risk false"]);
    }

    #[test]
    fn remount_starts_from_defaults() {
        let bus = EventBus::new();
        let visualization = Visualization::new(bus.clone());
        let map = visualization.mount(NullSurface);
        bus.publish(
            MAP_EVENT_CHANNEL,
            &MapCommand::SetHeatmapAspect {
                aspect: Aspect::Population,
            },
        );
        let last = map.unmount();
        assert_eq!(last.heatmap_aspect, Some(Aspect::Population));
        assert_eq!(bus.subscriber_count(MAP_EVENT_CHANNEL), 0);

        let map = visualization.mount(NullSurface);
        assert_eq!(map.state(), MapState::default());
    }

    #[test]
    fn heatmap_button_clears_active_aspect() {
        let map = Visualization::new(EventBus::new()).mount(NullSurface);
        map.toggle_heatmap_button(Aspect::Risk);
        assert_eq!(map.state().heatmap_aspect, None);
        map.toggle_heatmap_button(Aspect::Rainfall);
        assert_eq!(map.state().heatmap_aspect, Some(Aspect::Rainfall));
    }
}
