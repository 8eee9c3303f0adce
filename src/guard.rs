//! Role-based route access.

use crate::storage::Session;
use crate::types::Role;

/// Outcome of a route access check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Allow,
    /// Nobody is signed in.
    Login(String),
    /// Signed in with a role the route does not admit; go to that role's dashboard.
    Home(String),
}

/// Route guard configured with the login entry point.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    login_path: String,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new("/login")
    }
}

impl RouteGuard {
    #[must_use]
    pub fn new(login_path: impl Into<String>) -> Self {
        Self {
            login_path: login_path.into(),
        }
    }

    /// Decide whether the current session may enter a route admitting `allowed`.
    ///
    /// An empty `allowed` list admits any signed-in user. A corrupt cached
    /// account record is treated as signed out.
    #[must_use]
    pub fn check(&self, session: &Session, allowed: &[Role]) -> Access {
        let user = match session.user() {
            Ok(Some(user)) if session.access_token().is_some() => user,
            Ok(_) => return Access::Login(self.login_path.clone()),
            Err(e) => {
                tracing::warn!(error = %e, "Cached user record unreadable");
                return Access::Login(self.login_path.clone());
            }
        };

        if allowed.is_empty() || allowed.contains(&user.role) {
            Access::Allow
        } else {
            tracing::debug!(role = %user.role, "Role not admitted on route");
            Access::Home(user.role.home_path().to_owned())
        }
    }
}
