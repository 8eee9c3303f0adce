#![doc = include_str!("../README.md")]

mod accounts;
pub mod client;
pub mod config;
pub mod error;
pub mod guard;
pub mod listing;
pub mod navigator;
pub mod refresh;
pub mod services;
pub mod storage;
pub mod types;

// Re-exports for convenient access
pub use client::{ApiClient, ApiRequest};
pub use config::ClientConfig;
pub use error::Error;
pub use guard::{Access, RouteGuard};
pub use listing::{ListQuery, Page, Searchable, SortDirection};
pub use navigator::{LogNavigator, Navigator, RecordingNavigator};
pub use refresh::RefreshCoordinator;
#[cfg(feature = "recommend")]
pub use services::{Recommendation, RecommendationClient};
#[cfg(feature = "resume")]
pub use services::{ParsedResume, ResumeParserClient, normalize_resume};
pub use storage::{FileStore, KeyValueStore, MemoryStore, Session};
pub use types::{
    AccountUser, Credential, EmployerRegistration, JobSeekerRegistration, LoginRequest, Role,
    SeekerId, Theme,
};
