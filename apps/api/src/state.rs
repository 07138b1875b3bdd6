use std::sync::Arc;

use crate::letter::pipeline::DocumentPipeline;
use crate::usage::UsageLedger;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Generator client and compiler settings are baked in at startup.
    pub pipeline: Arc<DocumentPipeline>,
    /// Redis-backed when REDIS_URL is set, log-only otherwise.
    pub ledger: Arc<dyn UsageLedger>,
}
