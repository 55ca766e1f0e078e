//! Process setup and the headless map rig shared by commands.

use std::sync::Arc;

use anyhow::{Context, Result};
use sar_agent::{
    CommandRegistry, Dispatcher, EventBus, MapCommand, MountedMap, NullSurface, PageHost,
    UnknownCommandPolicy, Visualization,
};
use tracing_subscriber::EnvFilter;

/// Load `.env` from the working directory without overriding existing
/// environment variables.
pub fn load_dotenv() -> Result<()> {
    let path = std::path::Path::new(".env");
    if !path.exists() {
        return Ok(());
    }
    for item in dotenvy::from_path_iter(path).context("load .env")? {
        let (key, val) = item.context("parse .env")?;
        if std::env::var_os(&key).is_none() {
            unsafe {
                std::env::set_var(&key, &val);
            }
        }
    }
    Ok(())
}

const DEFAULT_LOG_FILTER: &str = "sar=info,sar_agent=warn,sar_llm=warn";

/// Logs go to stderr; stdout carries answers and JSON.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// A bus with a mounted headless map and the page host listening on it.
pub struct Rig {
    pub dispatcher: Dispatcher,
    pub map: MountedMap,
    pub page: PageHost,
}

impl Rig {
    pub fn new(policy: UnknownCommandPolicy) -> Self {
        let bus: EventBus<MapCommand> = EventBus::new();
        let map = Visualization::new(bus.clone()).mount(NullSurface);
        let page = PageHost::standard(&bus);
        let dispatcher = Dispatcher::new(Arc::new(CommandRegistry::standard()), bus)
            .with_unknown_policy(policy);
        Self {
            dispatcher,
            map,
            page,
        }
    }
}
