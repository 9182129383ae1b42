use chrono::Duration;

use super::intake::IntakePolicy;
use crate::config::PublicationConfig;

pub const DEFAULT_GRACE_PERIOD_DAYS: i64 = 5;
pub const DEFAULT_MAX_PAGE_SIZE: usize = 100;

/// Scheduling and paging dials shared by the lifecycle and the query engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicationPolicy {
    /// Delay between the first approval or payment and the publication date.
    pub grace_period: Duration,
    pub max_page_size: usize,
    pub intake: IntakePolicy,
}

impl Default for PublicationPolicy {
    fn default() -> Self {
        Self {
            grace_period: Duration::days(DEFAULT_GRACE_PERIOD_DAYS),
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            intake: IntakePolicy::default(),
        }
    }
}

impl From<&PublicationConfig> for PublicationPolicy {
    fn from(config: &PublicationConfig) -> Self {
        Self {
            grace_period: Duration::days(i64::from(config.grace_period_days)),
            max_page_size: config.max_page_size,
            intake: IntakePolicy::default(),
        }
    }
}
