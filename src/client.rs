use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::{debug, instrument};
use url::Url;

use crate::config::{ClientConfig, REFRESH_PATH};
use crate::error::Error;
use crate::navigator::{LogNavigator, Navigator};
use crate::refresh::RefreshCoordinator;
use crate::storage::Session;
use crate::types::{Credential, RefreshRequest, RefreshResponse};

/// Replayable description of a backend call.
///
/// Kept separate from `reqwest::Request` so the same call can be sent again
/// with a renewed bearer token after a `401`.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Option<JsonValue>,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if `body` cannot be serialized.
    pub fn with_json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, Error> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Authenticated client for the job board backend.
///
/// Every call carries the stored access token as a bearer credential. A `401`
/// triggers one token renewal through the shared [`RefreshCoordinator`]
/// followed by exactly one replay of the call; a second `401` is returned to
/// the caller.
#[derive(Debug, Clone)]
pub struct ApiClient {
    config: ClientConfig,
    http: reqwest::Client,
    session: Session,
    refresh: Arc<RefreshCoordinator>,
}

impl ApiClient {
    #[must_use]
    pub fn new(config: ClientConfig, session: Session) -> Self {
        let refresh = Self::coordinator(&config, session.clone(), Arc::new(LogNavigator));
        Self {
            config,
            http: reqwest::Client::new(),
            session,
            refresh,
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Route forced logouts through `navigator`.
    ///
    /// Replaces the refresh coordinator, so call this before cloning the client.
    #[must_use]
    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.refresh = Self::coordinator(&self.config, self.session.clone(), navigator);
        self
    }

    fn coordinator(
        config: &ClientConfig,
        session: Session,
        navigator: Arc<dyn Navigator>,
    ) -> Arc<RefreshCoordinator> {
        Arc::new(
            RefreshCoordinator::new(session, navigator)
                .with_login_path(config.login_path.clone())
                .with_timeout(config.refresh_timeout),
        )
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn refresh_coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.refresh
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Send `request`, renewing the access token once on `401`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] for any non-2xx response. When the token cannot
    /// be renewed the caller receives its original `401`; the session has been
    /// cleared by then.
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn send(&self, request: &ApiRequest) -> Result<reqwest::Response, Error> {
        let url = self.config.endpoint(&request.path)?;
        let generation = self.refresh.generation();
        let sent = self.session.access_token();

        let response = self.dispatch(&url, request, sent.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return ensure_success(response, "API request").await;
        }

        let unauthorized = api_error(response, "API request").await;

        let renewed = match self.session.access_token() {
            Some(current) if sent.as_deref() != Some(current.as_str()) => {
                debug!("Access token replaced while request was in flight");
                Ok(current)
            }
            _ => {
                debug!("Access token rejected, renewing");
                self.refresh
                    .renew_since(generation, |refresh_token| {
                        self.exchange_refresh_token(refresh_token)
                    })
                    .await
            }
        };
        let token = match renewed {
            Ok(token) => token,
            Err(e) => {
                debug!(error = %e, "Renewal failed, returning original error");
                return Err(unauthorized);
            }
        };

        // Replayed once; another 401 is final.
        let response = self.dispatch(&url, request, Some(&token)).await?;
        ensure_success(response, "API request").await
    }

    /// Send `request` and decode the JSON response.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send); also [`Error::Http`] if the body is not valid JSON for `T`.
    pub async fn send_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, Error> {
        let response = self.send(request).await?;
        response.json::<T>().await.map_err(Into::into)
    }

    /// # Errors
    ///
    /// See [`send_json`](Self::send_json).
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        self.send_json(&ApiRequest::get(path)).await
    }

    /// # Errors
    ///
    /// See [`send_json`](Self::send_json).
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(&ApiRequest::post(path).with_json(body)?).await
    }

    /// # Errors
    ///
    /// See [`send_json`](Self::send_json).
    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(&ApiRequest::put(path).with_json(body)?).await
    }

    /// Delete a resource, discarding the response body.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn delete(&self, path: &str) -> Result<(), Error> {
        self.send(&ApiRequest::delete(path)).await.map(drop)
    }

    async fn dispatch(
        &self,
        url: &Url,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> Result<reqwest::Response, Error> {
        let mut headers = request.headers.clone();
        if token.is_some() {
            headers.remove(AUTHORIZATION);
        }

        let mut builder = self
            .http
            .request(request.method.clone(), url.clone())
            .headers(headers);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        builder.send().await.map_err(Into::into)
    }

    /// Exchange a refresh token at `POST /api/Accounts/RefreshToken`.
    ///
    /// Sent without the bearer interceptor so a rejected refresh can never
    /// recurse into another renewal.
    async fn exchange_refresh_token(&self, refresh_token: String) -> Result<Credential, Error> {
        let url = self.config.endpoint(REFRESH_PATH)?;
        let response = self
            .http
            .post(url)
            .json(&RefreshRequest {
                refresh_token: &refresh_token,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::RefreshFailed(format!("status {status}: {body}")));
        }

        let body = response.bytes().await?;
        let parsed: RefreshResponse = serde_json::from_slice(&body)
            .map_err(|e| Error::RefreshFailed(format!("malformed response: {e}")))?;
        Ok(parsed.into())
    }
}

/// Checks HTTP response status; returns the response on success or an error with details.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
    operation: &'static str,
) -> Result<reqwest::Response, Error> {
    if response.status().is_success() {
        return Ok(response);
    }
    Err(api_error(response, operation).await)
}

async fn api_error(response: reqwest::Response, operation: &'static str) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Error::Api {
        operation,
        status,
        body,
    }
}
