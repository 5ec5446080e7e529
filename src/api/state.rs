use std::sync::Arc;

use crate::config::Config;
use crate::observability::Metrics;
use crate::queue::WorkQueue;
use crate::store::JobStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<JobStore>,
    pub queue: Arc<WorkQueue>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<JobStore>, queue: Arc<WorkQueue>) -> Self {
        Self {
            config: Arc::new(config),
            store,
            queue,
            metrics: Arc::new(Metrics::new()),
        }
    }
}
