use std::time::Duration;

use url::Url;

use crate::error::Error;
use crate::refresh::DEFAULT_REFRESH_TIMEOUT;

pub(crate) const LOGIN_PATH: &str = "/api/Accounts/Login";
pub(crate) const REGISTER_JOB_SEEKER_PATH: &str = "/api/Accounts/Register/JobSeeker";
pub(crate) const REGISTER_EMPLOYER_PATH: &str = "/api/Accounts/Register/Employer";
pub(crate) const REFRESH_PATH: &str = "/api/Accounts/RefreshToken";

/// Job board client configuration.
///
/// The backend URL is a constructor parameter; everything else has a default
/// and can be overridden by chaining.
///
/// ```rust,ignore
/// use jobboard_client::ClientConfig;
///
/// let config = ClientConfig::new("https://api.jobboard.example".parse()?)
///     .with_login_path("/signin")
///     .with_refresh_timeout(std::time::Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ClientConfig {
    pub(crate) base_url: Url,
    pub(crate) login_path: String,
    pub(crate) refresh_timeout: Duration,
    pub(crate) recommend_url: Option<Url>,
    pub(crate) recommend_timeout: Duration,
    pub(crate) resume_parser_url: Url,
    pub(crate) resume_timeout: Duration,
}

impl ClientConfig {
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            login_path: "/login".into(),
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            recommend_url: None,
            recommend_timeout: Duration::from_secs(15),
            resume_parser_url: "http://127.0.0.1:5000/parse_resume"
                .parse()
                .expect("valid default URL"),
            resume_timeout: Duration::from_secs(30),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `JOBBOARD_API_URL`: backend base URL, optionally with a path prefix
    ///
    /// # Optional env vars
    /// - `JOBBOARD_LOGIN_PATH`: where to send the user when the session ends
    /// - `JOBBOARD_REFRESH_TIMEOUT_SECS`: bound on the token refresh call
    /// - `JOBBOARD_RECOMMEND_URL`: recommendation service endpoint
    /// - `JOBBOARD_RESUME_PARSER_URL`: resume parsing service endpoint
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the required var is missing or a value is invalid.
    pub fn from_env() -> Result<Self, Error> {
        let base_url = std::env::var("JOBBOARD_API_URL")
            .map_err(|_| Error::Config("JOBBOARD_API_URL is required".into()))?;
        let mut config = Self::new(parse_url("JOBBOARD_API_URL", &base_url)?);

        if let Ok(path) = std::env::var("JOBBOARD_LOGIN_PATH") {
            config = config.with_login_path(path);
        }
        if let Ok(secs) = std::env::var("JOBBOARD_REFRESH_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|e| {
                Error::Config(format!("JOBBOARD_REFRESH_TIMEOUT_SECS: {e}"))
            })?;
            config = config.with_refresh_timeout(Duration::from_secs(secs));
        }
        if let Ok(url) = std::env::var("JOBBOARD_RECOMMEND_URL") {
            config = config.with_recommend_url(parse_url("JOBBOARD_RECOMMEND_URL", &url)?);
        }
        if let Ok(url) = std::env::var("JOBBOARD_RESUME_PARSER_URL") {
            config =
                config.with_resume_parser_url(parse_url("JOBBOARD_RESUME_PARSER_URL", &url)?);
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    #[must_use]
    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_recommend_url(mut self, url: Url) -> Self {
        self.recommend_url = Some(url);
        self
    }

    #[must_use]
    pub fn with_recommend_timeout(mut self, timeout: Duration) -> Self {
        self.recommend_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_resume_parser_url(mut self, url: Url) -> Self {
        self.resume_parser_url = url;
        self
    }

    #[must_use]
    pub fn with_resume_timeout(mut self, timeout: Duration) -> Self {
        self.resume_timeout = timeout;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    #[must_use]
    pub fn refresh_timeout(&self) -> Duration {
        self.refresh_timeout
    }

    #[must_use]
    pub fn recommend_url(&self) -> Option<&Url> {
        self.recommend_url.as_ref()
    }

    #[must_use]
    pub fn recommend_timeout(&self) -> Duration {
        self.recommend_timeout
    }

    #[must_use]
    pub fn resume_parser_url(&self) -> &Url {
        &self.resume_parser_url
    }

    #[must_use]
    pub fn resume_timeout(&self) -> Duration {
        self.resume_timeout
    }

    /// Resolve a backend path under the base URL.
    ///
    /// `path` is always appended to the base URL's own path, so a base of
    /// `https://host/backend` resolves `/api/Accounts/Login` to
    /// `https://host/backend/api/Accounts/Login`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if `path` cannot be joined.
    pub fn endpoint(&self, path: &str) -> Result<Url, Error> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let dir = format!("{}/", base.path());
            base.set_path(&dir);
        }
        base.join(path.trim_start_matches('/')).map_err(Into::into)
    }
}

fn parse_url(var: &str, value: &str) -> Result<Url, Error> {
    value
        .parse()
        .map_err(|e| Error::Config(format!("{var}: {e}")))
}
