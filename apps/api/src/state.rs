use std::sync::Arc;

use crate::config::Config;
use crate::pipeline::Pipeline;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Shared with blocking parse tasks, hence the `Arc`.
    pub pipeline: Arc<Pipeline>,
    pub config: Config,
}
