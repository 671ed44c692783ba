//! Services for cadence-api
//!
//! Collaborator seams (text generation, keyword metrics, page fetch) and the
//! flows built on them.

pub mod business_summary;
pub mod content_scheduler;
pub mod keyword_discovery;
pub mod keyword_metrics;
pub mod page_fetcher;
pub mod registration;
pub mod text_generator;

pub use business_summary::BusinessSummaryService;
pub use content_scheduler::{
    CalendarLocks, ContentScheduler, PendingTopUp, SchedulingPolicy, TopUpPlan,
};
pub use keyword_discovery::KeywordDiscovery;
pub use keyword_metrics::{DataForSeoClient, KeywordMetricsProvider, MetricsError};
pub use page_fetcher::{FetchError, HttpPageFetcher, PageFetcher};
pub use registration::{RegistrationRequest, RegistrationService};
pub use text_generator::{BusinessSummary, LlmError, OpenAiClient, TextGenerator};

use cadence_common::Error;

/// Client error that can tell a timeout apart from other failures
pub trait UpstreamError: std::error::Error {
    fn is_timeout(&self) -> bool;
}

/// Log a collaborator failure and reduce it to an opaque error naming only
/// the operation. Timeouts stay distinguishable so callers can retry.
pub(crate) fn upstream_failure(operation: &str, err: &dyn UpstreamError) -> Error {
    if err.is_timeout() {
        tracing::warn!(operation, error = %err, "Collaborator timed out");
        Error::Timeout(operation.to_string())
    } else {
        tracing::error!(operation, error = %err, "Collaborator failed");
        Error::Collaborator(operation.to_string())
    }
}
