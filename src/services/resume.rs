use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, instrument};
use url::Url;

use super::with_timeout;
use crate::client::ensure_success;
use crate::config::ClientConfig;
use crate::error::Error;

/// Fields that identify an unwrapped resume payload.
const RESUME_FIELDS: &[&str] = &[
    "name",
    "full_name",
    "email",
    "phone",
    "skills",
    "education",
    "experience",
];

/// Normalized resume returned by the parsing service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedResume {
    #[serde(default, alias = "full_name")]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "phone_number")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub skills: Vec<String>,
    #[serde(default)]
    pub education: Vec<JsonValue>,
    #[serde(default)]
    pub experience: Vec<JsonValue>,
    /// Anything else the parser reported.
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

/// Known response layouts, in the order they are tried.
#[derive(Debug, PartialEq)]
enum ResumeEnvelope {
    Data(JsonValue),
    Result(JsonValue),
    ParsedData(JsonValue),
    Direct(JsonValue),
}

impl ResumeEnvelope {
    fn classify(body: JsonValue) -> Result<Self, Error> {
        let JsonValue::Object(mut map) = body else {
            return Err(Error::UnrecognizedShape(
                "resume response is not a JSON object".into(),
            ));
        };

        for key in ["data", "result", "parsed_data"] {
            if map.get(key).is_some_and(JsonValue::is_object) {
                let inner = map.remove(key).unwrap_or_default();
                return Ok(match key {
                    "data" => Self::Data(inner),
                    "result" => Self::Result(inner),
                    _ => Self::ParsedData(inner),
                });
            }
        }

        if RESUME_FIELDS.iter().any(|field| map.contains_key(*field)) {
            return Ok(Self::Direct(JsonValue::Object(map)));
        }

        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        Err(Error::UnrecognizedShape(format!(
            "resume response has no known fields (keys: {})",
            keys.join(", ")
        )))
    }

    fn into_inner(self) -> JsonValue {
        match self {
            Self::Data(v) | Self::Result(v) | Self::ParsedData(v) | Self::Direct(v) => v,
        }
    }
}

/// Normalize a parser response into a [`ParsedResume`].
///
/// Wrapped payloads are looked up under `data`, `result` and `parsed_data`
/// in that order; otherwise the body itself must carry resume fields.
///
/// # Errors
///
/// Returns [`Error::UnrecognizedShape`] if no known layout matches, or
/// [`Error::Json`] if the payload fields have the wrong types.
pub fn normalize_resume(body: JsonValue) -> Result<ParsedResume, Error> {
    let envelope = ResumeEnvelope::classify(body)?;
    Ok(serde_json::from_value(envelope.into_inner())?)
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Skills {
        List(Vec<String>),
        Csv(String),
        Missing(()),
    }

    Ok(match Skills::deserialize(deserializer)? {
        Skills::List(list) => list,
        Skills::Csv(csv) => csv
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect(),
        Skills::Missing(()) => Vec::new(),
    })
}

/// Client for the resume parsing service.
#[derive(Debug, Clone)]
pub struct ResumeParserClient {
    http: reqwest::Client,
    url: Url,
    timeout: Duration,
}

impl ResumeParserClient {
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
            timeout: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.resume_parser_url().clone()).with_timeout(config.resume_timeout())
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

    /// Upload a resume file and return the normalized result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if parsing takes too long,
    /// [`Error::UnrecognizedShape`] if the response layout is unknown,
    /// [`Error::Api`] on a non-2xx status.
    #[instrument(skip(self, contents), fields(size = contents.len()))]
    pub async fn parse(
        &self,
        file_name: &str,
        mime: &str,
        contents: Vec<u8>,
    ) -> Result<ParsedResume, Error> {
        let part = Part::bytes(contents)
            .file_name(file_name.to_owned())
            .mime_str(mime)?;
        let form = Form::new().part("resume", part);

        let call = async {
            let response = self
                .http
                .post(self.url.clone())
                .multipart(form)
                .send()
                .await?;
            let response = ensure_success(response, "resume parsing").await?;
            Ok::<_, Error>(response.json::<JsonValue>().await?)
        };

        let body = with_timeout("resume parsing", self.timeout, call).await?;
        let resume = normalize_resume(body)?;
        debug!(skills = resume.skills.len(), "Resume parsed");
        Ok(resume)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn direct_fields() {
        let resume = normalize_resume(json!({
            "name": "Dana Lee",
            "email": "dana@example.com",
            "skills": ["Rust", "SQL"]
        }))
        .unwrap();
        assert_eq!(resume.name.as_deref(), Some("Dana Lee"));
        assert_eq!(resume.skills, vec!["Rust", "SQL"]);
    }

    #[test]
    fn wrappers_in_priority_order() {
        let body = json!({
            "parsed_data": {"name": "third"},
            "result": {"name": "second"},
            "data": {"name": "first"}
        });
        assert_eq!(
            ResumeEnvelope::classify(body).unwrap(),
            ResumeEnvelope::Data(json!({"name": "first"}))
        );

        let resume = normalize_resume(json!({
            "success": true,
            "result": {"full_name": "Sam", "skills": "Rust, Go ,  ,Python"}
        }))
        .unwrap();
        assert_eq!(resume.name.as_deref(), Some("Sam"));
        assert_eq!(resume.skills, vec!["Rust", "Go", "Python"]);

        let resume = normalize_resume(json!({"parsed_data": {"email": "x@y.z"}})).unwrap();
        assert_eq!(resume.email.as_deref(), Some("x@y.z"));
    }

    #[test]
    fn non_object_wrapper_is_skipped() {
        let resume = normalize_resume(json!({
            "data": "pending",
            "name": "Direct"
        }))
        .unwrap();
        assert_eq!(resume.name.as_deref(), Some("Direct"));
        assert_eq!(resume.extra["data"], "pending");
    }

    #[test]
    fn unknown_shapes_are_rejected() {
        assert!(matches!(
            normalize_resume(json!({"status": "ok"})),
            Err(Error::UnrecognizedShape(_))
        ));
        assert!(matches!(
            normalize_resume(json!(["Rust"])),
            Err(Error::UnrecognizedShape(_))
        ));
    }

    #[test]
    fn extra_fields_are_kept() {
        let resume = normalize_resume(json!({
            "data": {"name": "Dana", "linkedin": "in/dana", "skills": null}
        }))
        .unwrap();
        assert!(resume.skills.is_empty());
        assert_eq!(resume.extra["linkedin"], "in/dana");
    }
}
