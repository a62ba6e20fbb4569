//! Application state for the journeycache CLI.
//!
//! Owns configuration, the persisted session and the API client, and builds
//! the per-session `JourneyCoordinator` backed by the user's cache directory.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use journeycache_core::auth::{CredentialStore, Session};
use journeycache_core::cache::{CacheStore, FileCacheStore, MemoryCacheStore};
use journeycache_core::{ApiClient, Config, JourneyCoordinator};

pub struct App {
    pub config: Config,
    pub session: Session,
    cache_root: PathBuf,
    api: ApiClient,
}

impl App {
    pub fn new() -> Result<Self> {
        let config = Config::load().context("Failed to load config")?;
        let cache_root = config.cache_root()?;
        Self::with_cache_root(config, cache_root)
    }

    fn with_cache_root(config: Config, cache_root: PathBuf) -> Result<Self> {
        debug!(?cache_root, api = config.api_base_url(), "Configuration loaded");

        let mut session = Session::new(cache_root.clone());
        if let Err(e) = session.load() {
            warn!(error = %e, "Ignoring unreadable session file");
        }

        let mut api = ApiClient::new(config.api_base_url())?;
        if let Some(token) = session.token() {
            api.set_token(token.to_string());
        }

        Ok(Self {
            config,
            session,
            cache_root,
            api,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_valid()
    }

    /// Log in again with keychain credentials when the saved session has expired.
    pub async fn restore_session(&mut self) -> Result<()> {
        if self.is_authenticated() {
            return Ok(());
        }
        let Some(username) = self.config.last_username.clone() else {
            return Ok(());
        };
        if !CredentialStore::has_credentials(&username) {
            return Ok(());
        }

        info!(username = %username, "Session expired, re-authenticating with stored credentials");
        let password = CredentialStore::get_password(&username)?;
        if let Err(e) = self.authenticate(&username, &password).await {
            warn!(error = %e, "Automatic re-authentication failed");
        }
        Ok(())
    }

    /// Interactive login
    pub async fn login(&mut self, username: Option<String>) -> Result<()> {
        let username = match username {
            Some(username) => username,
            None => Self::prompt_username(self.config.last_username.as_deref())?,
        };
        let password = rpassword::prompt_password("Password: ")?;

        println!("Authenticating...");
        self.authenticate(&username, &password).await?;

        if let Err(e) = CredentialStore::store(&username, &password) {
            warn!(error = %e, "Failed to store credentials");
        }
        println!("Login successful.");
        Ok(())
    }

    async fn authenticate(&mut self, username: &str, password: &str) -> Result<()> {
        let session_data = self.api.authenticate(username, password).await?;

        self.config.last_username = Some(username.to_string());
        self.config.last_user_id = Some(session_data.user_id.clone());
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        self.api.set_token(session_data.token.clone());
        self.session.update(session_data);
        if let Err(e) = self.session.save() {
            warn!(error = %e, "Failed to save session");
        }
        Ok(())
    }

    /// Clear the session, the stored password and the user's journey cache.
    ///
    /// An expired session is not loaded, so the cache owner falls back to the
    /// last user that logged in.
    pub fn logout(&mut self) -> Result<()> {
        let owner = self
            .session
            .user_id()
            .or(self.config.last_user_id.as_deref())
            .map(str::to_string);
        if let Some(user_id) = owner {
            let store = FileCacheStore::new(self.user_cache_dir(&user_id))?;
            self.coordinator_with(Arc::new(store)).logout();
        }
        if let Some(ref username) = self.config.last_username {
            if CredentialStore::has_credentials(username) {
                if let Err(e) = CredentialStore::delete(username) {
                    warn!(error = %e, "Failed to delete stored credentials");
                }
            }
        }
        self.session.clear()?;
        info!("Logged out");
        Ok(())
    }

    /// Coordinator for the current session. Without a session it runs against
    /// an in-memory store and only ever yields the "no journey" overview.
    pub fn coordinator(&self) -> Result<JourneyCoordinator> {
        let store: Arc<dyn CacheStore> = match self.session.user_id() {
            Some(user_id) => Arc::new(FileCacheStore::new(self.user_cache_dir(user_id))?),
            None => Arc::new(MemoryCacheStore::new()),
        };
        Ok(self.coordinator_with(store))
    }

    fn coordinator_with(&self, store: Arc<dyn CacheStore>) -> JourneyCoordinator {
        JourneyCoordinator::new(store, Arc::new(self.api.clone()), self.config.cache_ttl())
    }

    /// Per-user journey cache directory
    fn user_cache_dir(&self, user_id: &str) -> PathBuf {
        self.cache_root.join(user_id)
    }

    fn prompt_username(last: Option<&str>) -> Result<String> {
        match last {
            Some(last) => print!("Email [{}]: ", last),
            None => print!("Email: "),
        }
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim();

        match (input.is_empty(), last) {
            (true, Some(last)) => Ok(last.to_string()),
            (true, None) => Err(anyhow::anyhow!("Email required")),
            (false, _) => Ok(input.to_string()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
