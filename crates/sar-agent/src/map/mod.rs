//! Map visualization: command payloads, the state machine, the mounted
//! controller that drives a [`MapSurface`], and the page scroll host.

mod controller;
mod page;
mod state;

pub use controller::{MapSurface, MountedMap, NullSurface, Visualization};
pub use page::{PAGE_SECTIONS, PageHost};
pub use state::{
    DEFAULT_CENTER, DEFAULT_ZOOM, FALLBACK_FOCUS_ZOOM, LatLng, MAP_EVENT_CHANNEL, MapCommand,
    MapState, MapTransition,
};
