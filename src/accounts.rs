//! Account lifecycle: login, registration, logout.
//!
//! These calls go out without a bearer token and without the renewal path;
//! a `401` from the login endpoint means bad credentials, not an expired
//! session.

use serde::Serialize;
use tracing::{info, instrument};

use crate::client::{ApiClient, ensure_success};
use crate::config::{LOGIN_PATH, REGISTER_EMPLOYER_PATH, REGISTER_JOB_SEEKER_PATH};
use crate::error::Error;
use crate::types::{AccountUser, EmployerRegistration, JobSeekerRegistration, LoginRequest};

impl ApiClient {
    /// Log in and persist the returned tokens and account record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] if the backend rejects the credentials,
    /// [`Error::Http`] on network failure.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn login(&self, request: &LoginRequest) -> Result<AccountUser, Error> {
        let user = self.account_call(LOGIN_PATH, request, "login").await?;
        info!(role = %user.role, "Logged in");
        Ok(user)
    }

    /// # Errors
    ///
    /// See [`login`](Self::login).
    #[instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register_job_seeker(
        &self,
        registration: &JobSeekerRegistration,
    ) -> Result<AccountUser, Error> {
        self.account_call(REGISTER_JOB_SEEKER_PATH, registration, "job seeker registration")
            .await
    }

    /// # Errors
    ///
    /// See [`login`](Self::login).
    #[instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register_employer(
        &self,
        registration: &EmployerRegistration,
    ) -> Result<AccountUser, Error> {
        self.account_call(REGISTER_EMPLOYER_PATH, registration, "employer registration")
            .await
    }

    /// Drop the local session and send the user to the login page.
    pub fn logout(&self) {
        info!("Logging out");
        self.refresh_coordinator().end_session();
    }

    /// Cached account record of the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the cached record is corrupt.
    pub fn current_user(&self) -> Result<Option<AccountUser>, Error> {
        self.session().user()
    }

    async fn account_call<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        operation: &'static str,
    ) -> Result<AccountUser, Error> {
        let url = self.config().endpoint(path)?;
        let response = self.http().post(url).json(body).send().await?;
        let response = ensure_success(response, operation).await?;
        let user: AccountUser = response.json().await?;
        self.session().save_login(&user)?;
        Ok(user)
    }
}
