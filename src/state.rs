use std::sync::Arc;

use crate::gateway::Gateway;
use crate::poller::JobPoller;
use crate::rate_limit::RateLimiter;

// app's shared state
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub poller: Arc<JobPoller>,
    pub rate_limiter: RateLimiter,
}
