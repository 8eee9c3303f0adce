use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Account role as reported by the backend on login.
///
/// The backend is not consistent about casing (`"JobSeeker"`, `"jobseeker"`),
/// so parsing is case-insensitive while serialization always uses the
/// canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    JobSeeker,
    Employer,
    Admin,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::JobSeeker => "JobSeeker",
            Self::Employer => "Employer",
            Self::Admin => "Admin",
        }
    }

    /// Landing page of this role's dashboard.
    #[must_use]
    pub fn home_path(self) -> &'static str {
        match self {
            Self::JobSeeker => "/jobseeker/dashboard",
            Self::Employer => "/employer/dashboard",
            Self::Admin => "/admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jobseeker" | "job_seeker" | "seeker" => Ok(Self::JobSeeker),
            "employer" => Ok(Self::Employer),
            "admin" => Ok(Self::Admin),
            _ => Err(Error::UnrecognizedShape(format!("unknown role '{s}'"))),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Role> for String {
    fn from(r: Role) -> Self {
        r.as_str().to_owned()
    }
}

/// Job seeker identifier used by the recommendation service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct SeekerId(pub String);

/// Access/refresh token pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
}

/// Account record returned by login and registration, cached under `user`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountUser {
    pub name: String,
    pub email: String,
    pub token: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSeekerRegistration {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployerRegistration {
    pub company_name: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshRequest<'a> {
    pub(crate) refresh_token: &'a str,
}

/// Body of `POST /api/Accounts/RefreshToken`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshResponse {
    pub(crate) user: RefreshedUser,
    pub(crate) refresh_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RefreshedUser {
    pub(crate) token: String,
}

impl From<RefreshResponse> for Credential {
    fn from(r: RefreshResponse) -> Self {
        Self {
            access_token: r.user.token,
            refresh_token: r.refresh_token,
        }
    }
}

/// UI color scheme preference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing_is_case_insensitive() {
        assert_eq!("JobSeeker".parse::<Role>().unwrap(), Role::JobSeeker);
        assert_eq!("jobseeker".parse::<Role>().unwrap(), Role::JobSeeker);
        assert_eq!("EMPLOYER".parse::<Role>().unwrap(), Role::Employer);
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("recruiter".parse::<Role>().is_err());
    }

    #[test]
    fn role_serializes_canonically() {
        let role: Role = serde_json::from_str("\"employer\"").unwrap();
        assert_eq!(serde_json::to_string(&role).unwrap(), "\"Employer\"");
    }

    #[test]
    fn account_user_uses_camel_case() {
        let json = r#"{
            "name": "Dana",
            "email": "dana@example.com",
            "token": "access-1",
            "role": "JobSeeker",
            "refreshToken": "refresh-1"
        }"#;
        let user: AccountUser = serde_json::from_str(json).unwrap();
        assert_eq!(user.role, Role::JobSeeker);
        assert_eq!(user.refresh_token.as_deref(), Some("refresh-1"));
    }

    #[test]
    fn account_user_refresh_token_is_optional() {
        let json = r#"{"name":"A","email":"a@b.c","token":"t","role":"Admin"}"#;
        let user: AccountUser = serde_json::from_str(json).unwrap();
        assert!(user.refresh_token.is_none());
        assert!(!serde_json::to_string(&user).unwrap().contains("refreshToken"));
    }

    #[test]
    fn refresh_response_ignores_extra_user_fields() {
        let json = r#"{
            "user": {"token": "new-access", "name": "Dana", "role": "JobSeeker"},
            "refreshToken": "new-refresh"
        }"#;
        let response: RefreshResponse = serde_json::from_str(json).unwrap();
        let credential = Credential::from(response);
        assert_eq!(credential.access_token, "new-access");
        assert_eq!(credential.refresh_token, "new-refresh");
    }

    #[test]
    fn refresh_response_without_token_is_rejected() {
        let json = r#"{"user": {"name": "Dana"}, "refreshToken": "r"}"#;
        assert!(serde_json::from_str::<RefreshResponse>(json).is_err());
    }

    #[test]
    fn seeker_id_from_string() {
        let id = SeekerId::from("seeker-42".to_string());
        assert_eq!(id.to_string(), "seeker-42");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"seeker-42\"");
    }
}
