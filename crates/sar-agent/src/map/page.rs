use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use super::state::{MAP_EVENT_CHANNEL, MapCommand};
use crate::bus::{EventBus, Subscription};

/// Section ids of the landing page, top to bottom.
pub const PAGE_SECTIONS: &[&str] = &["hero", "sar", "map", "numbers", "education", "action"];

#[derive(Debug, Default)]
struct PageState {
    current: Option<String>,
    visited: Vec<String>,
}

/// The hosting page. Listens on the map channel and reacts only to scroll
/// commands; unknown section ids are ignored.
pub struct PageHost {
    sections: Vec<String>,
    state: Arc<Mutex<PageState>>,
    _subscription: Subscription<MapCommand>,
}

impl std::fmt::Debug for PageHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageHost")
            .field("sections", &self.sections)
            .field("current", &self.current_section())
            .finish()
    }
}

impl PageHost {
    pub fn attach(bus: &EventBus<MapCommand>, sections: Vec<String>) -> Self {
        let state = Arc::new(Mutex::new(PageState::default()));
        let handler_state = state.clone();
        let known = sections.clone();
        let subscription = bus.subscribe(MAP_EVENT_CHANNEL, move |command| {
            let MapCommand::ScrollToSection { section_id } = command else {
                return;
            };
            if !known.iter().any(|section| section == section_id) {
                warn!(section_id = %section_id, "scroll target not found on page");
                return;
            }
            debug!(section_id = %section_id, "scrolled to section");
            let mut state = handler_state
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            state.current = Some(section_id.clone());
            state.visited.push(section_id.clone());
        });
        Self {
            sections,
            state,
            _subscription: subscription,
        }
    }

    /// Attach with the landing page's sections.
    pub fn standard(bus: &EventBus<MapCommand>) -> Self {
        Self::attach(
            bus,
            PAGE_SECTIONS.iter().map(ToString::to_string).collect(),
        )
    }

    pub fn sections(&self) -> &[String] {
        &self.sections
    }

    pub fn current_section(&self) -> Option<String> {
        self.lock().current.clone()
    }

    /// Every successful scroll, oldest first.
    pub fn scroll_history(&self) -> Vec<String> {
        self.lock().visited.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Aspect;

    #[test]
    fn scrolls_to_known_sections_only() {
        let bus = EventBus::new();
        let page = PageHost::standard(&bus);
        assert_eq!(page.current_section(), None);

        bus.publish(
            MAP_EVENT_CHANNEL,
            &MapCommand::ScrollToSection {
                section_id: "numbers".into(),
            },
        );
        bus.publish(
            MAP_EVENT_CHANNEL,
            &MapCommand::ScrollToSection {
                section_id: "footer".into(),
            },
        );
        bus.publish(
            MAP_EVENT_CHANNEL,
            &MapCommand::SetHeatmapAspect {
                aspect: Aspect::Slope,
            },
        );

        assert_eq!(page.current_section().as_deref(), Some("numbers"));
        assert_eq!(page.scroll_history(), vec!["numbers"]);
    }
}
