//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use herald_action::Dispatcher;

#[derive(Clone)]
pub struct ApiState {
    /// Routes requests to actions; also owns the registry and config.
    pub dispatcher: Arc<Dispatcher>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl ApiState {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            start_time: Instant::now(),
        }
    }
}
