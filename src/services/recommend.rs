use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, instrument};
use url::Url;

use super::with_timeout;
use crate::client::ensure_success;
use crate::config::ClientConfig;
use crate::error::Error;
use crate::types::SeekerId;

/// A job suggested for a seeker.
///
/// Job fields are passed through untouched; only the score is interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(default, alias = "similarity")]
    pub score: Option<f64>,
    #[serde(flatten)]
    pub job: Map<String, JsonValue>,
}

#[derive(Serialize)]
struct RecommendRequest<'a> {
    seeker_id: &'a SeekerId,
    top_n: usize,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RecommendResponse {
    List(Vec<Recommendation>),
    Wrapped { recommendations: Vec<Recommendation> },
}

/// Client for the job recommendation service.
#[derive(Debug, Clone)]
pub struct RecommendationClient {
    http: reqwest::Client,
    url: Url,
    timeout: Duration,
}

impl RecommendationClient {
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
            timeout: Duration::from_secs(15),
        }
    }

    /// # Errors
    ///
    /// Returns [`Error::Config`] if no recommendation URL is configured.
    pub fn from_config(config: &ClientConfig) -> Result<Self, Error> {
        let url = config
            .recommend_url()
            .cloned()
            .ok_or_else(|| Error::Config("recommendation service URL is not set".into()))?;
        Ok(Self::new(url).with_timeout(config.recommend_timeout()))
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Fetch the `top_n` best matching jobs for `seeker`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if the service does not answer in time,
    /// [`Error::Api`] on a non-2xx status, [`Error::Http`] otherwise.
    #[instrument(skip(self), fields(seeker = %seeker))]
    pub async fn recommend(
        &self,
        seeker: &SeekerId,
        top_n: usize,
    ) -> Result<Vec<Recommendation>, Error> {
        let call = async {
            let response = self
                .http
                .post(self.url.clone())
                .json(&RecommendRequest {
                    seeker_id: seeker,
                    top_n,
                })
                .send()
                .await?;
            let response = ensure_success(response, "recommendation").await?;
            Ok::<_, Error>(response.json::<RecommendResponse>().await?)
        };

        let recommendations = match with_timeout("recommendation", self.timeout, call).await? {
            RecommendResponse::List(list) | RecommendResponse::Wrapped { recommendations: list } => {
                list
            }
        };
        debug!(count = recommendations.len(), "Recommendations received");
        Ok(recommendations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_bare_and_wrapped_lists() {
        let bare: RecommendResponse =
            serde_json::from_str(r#"[{"job_id": 7, "score": 0.9}]"#).unwrap();
        let wrapped: RecommendResponse = serde_json::from_str(
            r#"{"recommendations": [{"job_id": 7, "similarity": 0.9}]}"#,
        )
        .unwrap();

        for response in [bare, wrapped] {
            let list = match response {
                RecommendResponse::List(l) | RecommendResponse::Wrapped { recommendations: l } => l,
            };
            assert_eq!(list.len(), 1);
            assert_eq!(list[0].score, Some(0.9));
            assert_eq!(list[0].job["job_id"], 7);
        }
    }

    #[test]
    fn from_config_requires_url() {
        let config = ClientConfig::new("http://localhost".parse().unwrap());
        assert!(matches!(
            RecommendationClient::from_config(&config),
            Err(Error::Config(_))
        ));
    }
}
