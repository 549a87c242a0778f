//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (filesystem, remote
//! store, media player) into the stream cache core. [`StreamCacheService`]
//! builds exactly one cache manager and hands it to one streaming proxy and
//! one playback orchestrator. Desktop apps typically enable the
//! `desktop-shims` feature, which adds [`bootstrap_desktop`] over
//! `bridge-desktop` and the Google Drive connector.

pub mod error;

pub use error::{CoreError, Result};

use std::net::SocketAddr;
use std::sync::Arc;

use bridge_traits::{
    database::{DatabaseAdapter, DatabaseConfig},
    playback::MediaPlayer,
    remote::RemoteStore,
    storage::FileSystemAccess,
};
use core_library::{SqliteAdapter, SqliteCacheStore};
use core_playback::{CacheConfig, CacheManager, PlaybackOrchestrator, StreamingProxy};
use core_runtime::events::{CoreEvent, EventBus};
use core_runtime::StreamCacheConfig;
use tracing::{info, instrument};

#[cfg(feature = "desktop-shims")]
use bridge_traits::remote::AccessTokenProvider;

/// Aggregated handle to all bridge dependencies the core requires.
#[derive(Clone)]
pub struct CoreDependencies {
    pub filesystem: Arc<dyn FileSystemAccess>,
    pub remote_store: Arc<dyn RemoteStore>,
    pub media_player: Arc<dyn MediaPlayer>,
    /// Overrides the SQLite database opened from the configured path.
    pub database: Option<Arc<dyn DatabaseAdapter>>,
}

impl CoreDependencies {
    /// Construct a dependency bundle from explicit bridge handles.
    pub fn new(
        filesystem: Arc<dyn FileSystemAccess>,
        remote_store: Arc<dyn RemoteStore>,
        media_player: Arc<dyn MediaPlayer>,
    ) -> Self {
        Self {
            filesystem,
            remote_store,
            media_player,
            database: None,
        }
    }

    pub fn builder() -> CoreDependenciesBuilder {
        CoreDependenciesBuilder::default()
    }

    /// Use an already-open database instead of opening one.
    pub fn with_database(mut self, database: Arc<dyn DatabaseAdapter>) -> Self {
        self.database = Some(database);
        self
    }
}

/// Collects bridge handles one at a time, reporting the first one missing.
#[derive(Default)]
pub struct CoreDependenciesBuilder {
    filesystem: Option<Arc<dyn FileSystemAccess>>,
    remote_store: Option<Arc<dyn RemoteStore>>,
    media_player: Option<Arc<dyn MediaPlayer>>,
    database: Option<Arc<dyn DatabaseAdapter>>,
}

impl CoreDependenciesBuilder {
    pub fn filesystem(mut self, filesystem: Arc<dyn FileSystemAccess>) -> Self {
        self.filesystem = Some(filesystem);
        self
    }

    pub fn remote_store(mut self, remote_store: Arc<dyn RemoteStore>) -> Self {
        self.remote_store = Some(remote_store);
        self
    }

    pub fn media_player(mut self, media_player: Arc<dyn MediaPlayer>) -> Self {
        self.media_player = Some(media_player);
        self
    }

    pub fn database(mut self, database: Arc<dyn DatabaseAdapter>) -> Self {
        self.database = Some(database);
        self
    }

    pub fn build(self) -> Result<CoreDependencies> {
        Ok(CoreDependencies {
            filesystem: self.filesystem.ok_or_else(|| CoreError::missing("filesystem"))?,
            remote_store: self
                .remote_store
                .ok_or_else(|| CoreError::missing("remote_store"))?,
            media_player: self
                .media_player
                .ok_or_else(|| CoreError::missing("media_player"))?,
            database: self.database,
        })
    }
}

/// Primary façade exposed to host applications.
///
/// Owns the single cache manager, proxy and orchestrator of a process. The
/// proxy is not listening until [`start`](Self::start) is called.
#[derive(Clone)]
pub struct StreamCacheService {
    config: Arc<StreamCacheConfig>,
    event_bus: Arc<EventBus>,
    cache: Arc<CacheManager>,
    proxy: Arc<StreamingProxy>,
    orchestrator: Arc<PlaybackOrchestrator>,
}

impl StreamCacheService {
    /// Build the service: open the cache index, prepare the cache directory
    /// and wire the proxy and orchestrator to the shared cache manager.
    #[instrument(skip(config, deps), fields(cache_directory = ?config.cache_directory))]
    pub async fn new(config: StreamCacheConfig, deps: CoreDependencies) -> Result<Self> {
        config.validate()?;

        let database = match deps.database {
            Some(database) => database,
            None => open_database(&config, deps.filesystem.as_ref()).await?,
        };
        let store = Arc::new(SqliteCacheStore::new(database));

        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));

        let cache = Arc::new(
            CacheManager::new(
                CacheConfig::from(&config),
                store,
                deps.filesystem,
                deps.remote_store,
            )
            .with_event_bus(event_bus.clone()),
        );
        cache.initialize().await?;

        let proxy = Arc::new(
            StreamingProxy::new(cache.clone()).with_relay_timeout(config.relay_timeout),
        );

        let orchestrator = Arc::new(
            PlaybackOrchestrator::new(cache.clone(), proxy.clone(), deps.media_player)
                .with_event_bus(event_bus.clone())
                .with_restart_threshold(config.restart_threshold),
        );

        info!("Stream cache service ready");
        Ok(Self {
            config: Arc::new(config),
            event_bus,
            cache,
            proxy,
            orchestrator,
        })
    }

    /// Start the loopback proxy. Calling it again returns the same address.
    pub async fn start(&self) -> Result<SocketAddr> {
        Ok(self.proxy.start().await?)
    }

    /// Stop the loopback proxy. Cached files and the index are kept.
    pub fn shutdown(&self) {
        self.proxy.stop();
        info!("Stream cache service stopped");
    }

    pub fn config(&self) -> &StreamCacheConfig {
        &self.config
    }

    pub fn cache(&self) -> Arc<CacheManager> {
        Arc::clone(&self.cache)
    }

    pub fn proxy(&self) -> Arc<StreamingProxy> {
        Arc::clone(&self.proxy)
    }

    pub fn orchestrator(&self) -> Arc<PlaybackOrchestrator> {
        Arc::clone(&self.orchestrator)
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    /// Subscribe to cache and playback events.
    pub fn subscribe_events(&self) -> core_runtime::events::Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }
}

async fn open_database(
    config: &StreamCacheConfig,
    filesystem: &dyn FileSystemAccess,
) -> Result<Arc<dyn DatabaseAdapter>> {
    // Relative paths live under the platform data directory.
    let path = filesystem
        .get_data_directory()
        .await?
        .join(&config.database_path);
    if let Some(parent) = path.parent() {
        filesystem.create_dir_all(parent).await?;
    }

    info!(path = ?path, "Opening cache index");
    let mut adapter = SqliteAdapter::new(DatabaseConfig::new(path)).await?;
    adapter.initialize().await.map_err(|e| {
        CoreError::InitializationFailed(format!("Failed to open cache index: {}", e))
    })?;
    Ok(Arc::new(adapter))
}

/// Convenience bootstrapper for desktop hosts.
///
/// Uses the tokio filesystem and a reqwest-backed Google Drive connector; the
/// host still supplies tokens and the player.
///
/// ```no_run
/// # #[cfg(feature = "desktop-shims")]
/// # async fn example(
/// #     tokens: std::sync::Arc<dyn bridge_traits::remote::AccessTokenProvider>,
/// #     player: std::sync::Arc<dyn bridge_traits::playback::MediaPlayer>,
/// # ) -> core_service::Result<()> {
/// use core_runtime::StreamCacheConfig;
/// use core_service::bootstrap_desktop;
///
/// let service = bootstrap_desktop(StreamCacheConfig::from_env()?, tokens, player).await?;
/// service.start().await?;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "desktop-shims")]
pub async fn bootstrap_desktop(
    config: StreamCacheConfig,
    token_provider: Arc<dyn AccessTokenProvider>,
    media_player: Arc<dyn MediaPlayer>,
) -> Result<StreamCacheService> {
    use bridge_desktop::{ReqwestHttpClient, TokioFileSystem};
    use provider_google_drive::GoogleDriveConnector;

    let http_client = ReqwestHttpClient::new()
        .map_err(|err| CoreError::InitializationFailed(err.to_string()))?;
    let remote = GoogleDriveConnector::new(Arc::new(http_client), token_provider);

    let deps = CoreDependencies::new(
        Arc::new(TokioFileSystem::new()),
        Arc::new(remote),
        media_player,
    );
    StreamCacheService::new(config, deps).await
}
