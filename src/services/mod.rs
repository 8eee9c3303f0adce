//! Clients for the external microservices.
//!
//! Both services sit outside the backend's auth domain: calls carry no bearer
//! token and are bounded by a fixed client-side timeout that surfaces as
//! [`Error::Timeout`](crate::Error::Timeout), distinct from network errors.

#[cfg(feature = "recommend")]
mod recommend;
#[cfg(feature = "resume")]
mod resume;

#[cfg(feature = "recommend")]
pub use recommend::{Recommendation, RecommendationClient};
#[cfg(feature = "resume")]
pub use resume::{ParsedResume, ResumeParserClient, normalize_resume};

#[cfg(any(feature = "recommend", feature = "resume"))]
use std::time::Duration;

#[cfg(any(feature = "recommend", feature = "resume"))]
async fn with_timeout<T>(
    operation: &'static str,
    after: Duration,
    call: impl Future<Output = Result<T, crate::Error>>,
) -> Result<T, crate::Error> {
    tokio::time::timeout(after, call)
        .await
        .map_err(|_| crate::Error::Timeout { operation, after })?
}
