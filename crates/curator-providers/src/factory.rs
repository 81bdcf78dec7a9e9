//! Provider construction.
//!
//! Handlers never hold provider clients directly; keys and hosts live in
//! the `app_settings` table and may change at runtime, so clients are built
//! per use through a factory. An absent key means the capability is simply
//! unavailable (`None`), which handlers report as a no-op or a per-item
//! failure, never as a crash.

use std::sync::Arc;

use async_trait::async_trait;

use curator_store::MediaLibrary;

use crate::error::ProviderError;
use crate::omdb::OmdbClient;
use crate::plex::PlexClient;
use crate::probe::FfprobeMediaProbe;
use crate::scanner::WalkdirScanner;
use crate::tautulli::TautulliClient;
use crate::tmdb::TmdbClient;
use crate::traits::{
    DirectoryScanner, HistoryProvider, MediaProbe, MediaServer, MetadataSource, RatingsSource,
};

pub const SETTING_TMDB_API_KEY: &str = "tmdb_api_key";
pub const SETTING_OMDB_API_KEY: &str = "omdb_api_key";
pub const SETTING_PLEX_HOST: &str = "plex_host";
pub const SETTING_PLEX_TOKEN: &str = "plex_token";
pub const SETTING_TAUTULLI_HOST: &str = "tautulli_host";
pub const SETTING_TAUTULLI_API_KEY: &str = "tautulli_api_key";

/// Builds provider ports on demand.
#[async_trait]
pub trait ProviderFactory: Send + Sync {
    /// TMDB, when an API key is configured.
    async fn metadata_source(&self) -> Result<Option<Arc<dyn MetadataSource>>, ProviderError>;
    /// OMDb, when an API key is configured.
    async fn ratings_source(&self) -> Result<Option<Arc<dyn RatingsSource>>, ProviderError>;
    /// Plex, when host and token are configured.
    async fn media_server(&self) -> Result<Option<Arc<dyn MediaServer>>, ProviderError>;
    /// Tautulli, when host and API key are configured.
    async fn history_provider(&self) -> Result<Option<Arc<dyn HistoryProvider>>, ProviderError>;

    fn media_probe(&self) -> Arc<dyn MediaProbe>;
    fn directory_scanner(&self) -> Arc<dyn DirectoryScanner>;
}

/// Process-level fallbacks used when a key is absent from settings.
#[derive(Debug, Clone, Default)]
pub struct ProviderFallbacks {
    pub tmdb_api_key: Option<String>,
    pub omdb_api_key: Option<String>,
    pub plex_host: Option<String>,
    pub plex_token: Option<String>,
    pub tautulli_host: Option<String>,
    pub tautulli_api_key: Option<String>,
}

/// Factory reading configuration from the settings table, with process
/// configuration as the fallback.
pub struct SettingsProviderFactory {
    library: Arc<dyn MediaLibrary>,
    fallbacks: ProviderFallbacks,
    probe: Arc<dyn MediaProbe>,
    scanner: Arc<dyn DirectoryScanner>,
}

impl SettingsProviderFactory {
    pub fn new(library: Arc<dyn MediaLibrary>, fallbacks: ProviderFallbacks) -> Self {
        Self {
            library,
            fallbacks,
            probe: Arc::new(FfprobeMediaProbe::new()),
            scanner: Arc::new(WalkdirScanner::new()),
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn MediaProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_scanner(mut self, scanner: Arc<dyn DirectoryScanner>) -> Self {
        self.scanner = scanner;
        self
    }

    async fn setting_or(
        &self,
        key: &str,
        fallback: &Option<String>,
    ) -> Result<Option<String>, ProviderError> {
        let stored = self.library.get_setting(key).await?;
        Ok(stored
            .filter(|s| !s.is_empty())
            .or_else(|| fallback.clone().filter(|s| !s.is_empty())))
    }
}

#[async_trait]
impl ProviderFactory for SettingsProviderFactory {
    async fn metadata_source(&self) -> Result<Option<Arc<dyn MetadataSource>>, ProviderError> {
        match self
            .setting_or(SETTING_TMDB_API_KEY, &self.fallbacks.tmdb_api_key)
            .await?
        {
            Some(key) => Ok(Some(Arc::new(TmdbClient::new(key)?))),
            None => Ok(None),
        }
    }

    async fn ratings_source(&self) -> Result<Option<Arc<dyn RatingsSource>>, ProviderError> {
        match self
            .setting_or(SETTING_OMDB_API_KEY, &self.fallbacks.omdb_api_key)
            .await?
        {
            Some(key) => Ok(Some(Arc::new(OmdbClient::new(key)?))),
            None => Ok(None),
        }
    }

    async fn media_server(&self) -> Result<Option<Arc<dyn MediaServer>>, ProviderError> {
        let host = self
            .setting_or(SETTING_PLEX_HOST, &self.fallbacks.plex_host)
            .await?;
        let token = self
            .setting_or(SETTING_PLEX_TOKEN, &self.fallbacks.plex_token)
            .await?;
        match (host, token) {
            (Some(host), Some(token)) => Ok(Some(Arc::new(PlexClient::new(host, token)?))),
            _ => Ok(None),
        }
    }

    async fn history_provider(&self) -> Result<Option<Arc<dyn HistoryProvider>>, ProviderError> {
        let host = self
            .setting_or(SETTING_TAUTULLI_HOST, &self.fallbacks.tautulli_host)
            .await?;
        let key = self
            .setting_or(SETTING_TAUTULLI_API_KEY, &self.fallbacks.tautulli_api_key)
            .await?;
        match (host, key) {
            (Some(host), Some(key)) => Ok(Some(Arc::new(TautulliClient::new(host, key)?))),
            _ => Ok(None),
        }
    }

    fn media_probe(&self) -> Arc<dyn MediaProbe> {
        Arc::clone(&self.probe)
    }

    fn directory_scanner(&self) -> Arc<dyn DirectoryScanner> {
        Arc::clone(&self.scanner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curator_store::SqliteStore;

    #[tokio::test]
    async fn unconfigured_providers_come_back_none() {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let factory = SettingsProviderFactory::new(store, ProviderFallbacks::default());
        assert!(factory.metadata_source().await.unwrap().is_none());
        assert!(factory.ratings_source().await.unwrap().is_none());
        assert!(factory.media_server().await.unwrap().is_none());
        assert!(factory.history_provider().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn settings_take_precedence_over_fallbacks() {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        store
            .set_setting(SETTING_TMDB_API_KEY, "from-settings")
            .await
            .unwrap();
        let factory = SettingsProviderFactory::new(
            Arc::clone(&store) as Arc<dyn MediaLibrary>,
            ProviderFallbacks {
                omdb_api_key: Some("from-env".to_string()),
                ..ProviderFallbacks::default()
            },
        );
        assert!(factory.metadata_source().await.unwrap().is_some());
        assert!(factory.ratings_source().await.unwrap().is_some());
        // Plex needs both host and token.
        store
            .set_setting(SETTING_PLEX_HOST, "http://plex.local:32400")
            .await
            .unwrap();
        assert!(factory.media_server().await.unwrap().is_none());
        store
            .set_setting(SETTING_PLEX_TOKEN, "token")
            .await
            .unwrap();
        assert!(factory.media_server().await.unwrap().is_some());
    }
}
