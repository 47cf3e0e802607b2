use std::sync::Arc;

use calc_compute::Dispatcher;
use calc_core::Config;

/// Shared application state, handed to every handler behind an `Arc`.
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(Arc::new(Dispatcher::from_config(
            &config.dispatch,
            config.timings,
        )))
    }
}
