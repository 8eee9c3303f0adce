//! Persisted client-side state.
//!
//! Credentials, the cached account record, the UI theme and per-form drafts
//! live in a durable key/value store. [`KeyValueStore`] is the seam: use
//! [`MemoryStore`] for tests and short-lived processes, [`FileStore`] to
//! survive restarts, or bring your own.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Error;
use crate::types::{AccountUser, Credential, Theme};

/// Storage keys shared with the web frontend.
pub mod keys {
    pub const TOKEN: &str = "token";
    pub const REFRESH_TOKEN: &str = "refreshToken";
    pub const USER: &str = "user";
    pub const THEME: &str = "theme";
    pub const DRAFT_PREFIX: &str = "draft:";
}

/// Consumer-provided durable key/value storage.
///
/// Calls are synchronous; implementations must not block for long since they
/// are invoked on every outgoing request.
pub trait KeyValueStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Result<Option<String>, Error>;

    fn set(&self, key: &str, value: &str) -> Result<(), Error>;

    fn remove(&self, key: &str) -> Result<(), Error>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        self.entries.lock().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Store backed by a single JSON object on disk.
///
/// Every mutation rewrites the file through a temporary sibling and a rename,
/// so a crash never leaves a half-written document behind.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the file exists but cannot be read, or
    /// [`Error::Json`] if it does not contain a JSON object of strings.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => HashMap::new(),
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(Error::Storage(format!("{}: {e}", path.display()))),
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &HashMap<String, String>) -> Result<(), Error> {
        let contents = serde_json::to_vec_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, contents)
            .and_then(|()| std::fs::rename(&tmp, &self.path))
            .map_err(|e| Error::Storage(format!("{}: {e}", self.path.display())))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        let mut entries = self.entries.lock();
        entries.insert(key.to_owned(), value.to_owned());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }
}

/// Typed view over the persisted session keys.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.access_token().is_some())
            .finish()
    }
}

impl Session {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Session over a fresh [`MemoryStore`].
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Current access token. Read failures are logged and treated as absent.
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.read(keys::TOKEN)
    }

    /// Current refresh token. Read failures are logged and treated as absent.
    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.read(keys::REFRESH_TOKEN)
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, key, "Session read failed");
                None
            }
        }
    }

    /// Cached account record, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the cached record is corrupt.
    pub fn user(&self) -> Result<Option<AccountUser>, Error> {
        self.load(keys::USER)
    }

    /// Persist the result of a login or registration.
    ///
    /// # Errors
    ///
    /// Propagates store write failures.
    pub fn save_login(&self, user: &AccountUser) -> Result<(), Error> {
        self.store.set(keys::TOKEN, &user.token)?;
        match &user.refresh_token {
            Some(refresh) => self.store.set(keys::REFRESH_TOKEN, refresh)?,
            None => self.store.remove(keys::REFRESH_TOKEN)?,
        }
        self.save(keys::USER, user)
    }

    /// Replace both tokens and patch the cached account record.
    ///
    /// # Errors
    ///
    /// Propagates store write failures.
    pub fn store_credential(&self, credential: &Credential) -> Result<(), Error> {
        self.store.set(keys::TOKEN, &credential.access_token)?;
        self.store.set(keys::REFRESH_TOKEN, &credential.refresh_token)?;

        match self.user() {
            Ok(Some(mut user)) => {
                user.token.clone_from(&credential.access_token);
                if user.refresh_token.is_some() {
                    user.refresh_token = Some(credential.refresh_token.clone());
                }
                self.save(keys::USER, &user)?;
            }
            Ok(None) => {}
            // A corrupt cached record must not block the new tokens.
            Err(e) => tracing::warn!(error = %e, "Cached user record unreadable, leaving it untouched"),
        }
        Ok(())
    }

    /// Remove tokens and the cached account record. Theme and drafts survive.
    ///
    /// # Errors
    ///
    /// Returns the first store failure after attempting every key.
    pub fn clear(&self) -> Result<(), Error> {
        let mut first_error = None;
        for key in [keys::TOKEN, keys::REFRESH_TOKEN, keys::USER] {
            if let Err(e) = self.store.remove(key) {
                tracing::error!(error = %e, key, "Failed to clear session key");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    #[must_use]
    pub fn theme(&self) -> Theme {
        match self.read(keys::THEME).as_deref() {
            Some("dark") => Theme::Dark,
            _ => Theme::Light,
        }
    }

    /// # Errors
    ///
    /// Propagates store write failures.
    pub fn set_theme(&self, theme: Theme) -> Result<(), Error> {
        self.store.set(keys::THEME, theme.as_str())
    }

    /// Save a form draft under `draft:<name>`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the draft cannot be serialized, or the store failure.
    pub fn save_draft<T: Serialize>(&self, name: &str, draft: &T) -> Result<(), Error> {
        self.save(&draft_key(name), draft)
    }

    /// # Errors
    ///
    /// Returns [`Error::Json`] if the stored draft no longer matches `T`.
    pub fn load_draft<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, Error> {
        self.load(&draft_key(name))
    }

    /// # Errors
    ///
    /// Propagates store failures.
    pub fn clear_draft(&self, name: &str) -> Result<(), Error> {
        self.store.remove(&draft_key(name))
    }

    fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), Error> {
        let json = serde_json::to_string(value)?;
        self.store.set(key, &json)
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, Error> {
        match self.store.get(key)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

fn draft_key(name: &str) -> String {
    format!("{}{name}", keys::DRAFT_PREFIX)
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;
    use crate::types::Role;

    fn user(refresh: Option<&str>) -> AccountUser {
        AccountUser {
            name: "Dana".into(),
            email: "dana@example.com".into(),
            token: "access-1".into(),
            role: Role::JobSeeker,
            refresh_token: refresh.map(Into::into),
        }
    }

    #[test]
    fn save_login_populates_all_keys() {
        let session = Session::in_memory();
        session.save_login(&user(Some("refresh-1"))).unwrap();

        assert_eq!(session.access_token().as_deref(), Some("access-1"));
        assert_eq!(session.refresh_token().as_deref(), Some("refresh-1"));
        assert_eq!(session.user().unwrap().unwrap().name, "Dana");
    }

    #[test]
    fn store_credential_patches_cached_user() {
        let session = Session::in_memory();
        session.save_login(&user(Some("refresh-1"))).unwrap();

        session
            .store_credential(&Credential {
                access_token: "access-2".into(),
                refresh_token: "refresh-2".into(),
            })
            .unwrap();

        let cached = session.user().unwrap().unwrap();
        assert_eq!(cached.token, "access-2");
        assert_eq!(cached.refresh_token.as_deref(), Some("refresh-2"));
        assert_eq!(session.refresh_token().as_deref(), Some("refresh-2"));
    }

    #[test]
    fn store_credential_survives_corrupt_user_record() {
        let store = Arc::new(MemoryStore::new());
        store.set(keys::USER, "{not json").unwrap();
        let session = Session::new(store);

        session
            .store_credential(&Credential {
                access_token: "a".into(),
                refresh_token: "r".into(),
            })
            .unwrap();
        assert_eq!(session.access_token().as_deref(), Some("a"));
    }

    #[test]
    fn clear_keeps_theme_and_drafts() {
        let session = Session::in_memory();
        session.save_login(&user(Some("refresh-1"))).unwrap();
        session.set_theme(Theme::Dark).unwrap();
        session.save_draft("employer-registration", &vec![1, 2, 3]).unwrap();

        session.clear().unwrap();

        assert!(session.access_token().is_none());
        assert!(session.refresh_token().is_none());
        assert!(session.user().unwrap().is_none());
        assert_eq!(session.theme(), Theme::Dark);
        assert_eq!(
            session.load_draft::<Vec<i32>>("employer-registration").unwrap(),
            Some(vec![1, 2, 3])
        );
    }

    #[test]
    fn empty_token_counts_as_absent() {
        let store = Arc::new(MemoryStore::new());
        store.set(keys::TOKEN, "").unwrap();
        assert!(Session::new(store).access_token().is_none());
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Draft {
        company: String,
        step: u8,
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        {
            let session = Session::new(Arc::new(FileStore::open(&path).unwrap()));
            session.save_login(&user(None)).unwrap();
            session
                .save_draft("wizard", &Draft { company: "Acme".into(), step: 2 })
                .unwrap();
        }

        let session = Session::new(Arc::new(FileStore::open(&path).unwrap()));
        assert_eq!(session.access_token().as_deref(), Some("access-1"));
        assert!(session.refresh_token().is_none());
        assert_eq!(
            session.load_draft::<Draft>("wizard").unwrap(),
            Some(Draft { company: "Acme".into(), step: 2 })
        );
    }

    #[test]
    fn file_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(FileStore::open(&path), Err(Error::Json(_))));
    }
}
