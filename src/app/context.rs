use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::api::{CachedApi, ContentApi, PostCache, WpClient};
use crate::app::error::{BroadsheetError, Result};
use crate::config::Config;
use crate::speech::{CommandSpeaker, Speaker};
use crate::store::sqlite::SqliteCache;
use crate::store::ResponseCache;

pub struct AppContext {
    pub config: Arc<Config>,
    pub api: Arc<dyn ContentApi>,
    pub posts: Arc<PostCache>,
    pub speaker: Arc<dyn Speaker>,
    pub cache: Option<Arc<SqliteCache>>,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let cache = if config.cache.enabled {
            let path = match &config.cache.path {
                Some(p) => p.clone(),
                None => Self::default_cache_path()?,
            };
            let cache = SqliteCache::new(&path)?;
            if config.cache.max_age_days > 0 {
                let cutoff = Utc::now() - chrono::Duration::days(i64::from(config.cache.max_age_days));
                let removed = cache.prune(cutoff)?;
                if removed > 0 {
                    info!("Pruned {} cached responses older than {} days", removed, config.cache.max_age_days);
                }
            }
            Some(Arc::new(cache))
        } else {
            None
        };
        Self::build(config, cache)
    }

    /// Same wiring with the offline cache held in memory.
    pub fn in_memory(config: Config) -> Result<Self> {
        let cache = if config.cache.enabled {
            Some(Arc::new(SqliteCache::in_memory()?))
        } else {
            None
        };
        Self::build(config, cache)
    }

    fn build(config: Config, cache: Option<Arc<SqliteCache>>) -> Result<Self> {
        let mut client = WpClient::new(&config.api)?;
        if let Some(cache) = &cache {
            client = client.with_cache(cache.clone() as Arc<dyn ResponseCache>);
        }

        let speaker: Arc<dyn Speaker> = Arc::new(CommandSpeaker::from_config(&config.speech));
        Ok(Self::with_parts(config, Arc::new(client), speaker, cache))
    }

    /// Assemble a context around an arbitrary API and speaker.
    pub fn with_parts(
        config: Config,
        api: Arc<dyn ContentApi>,
        speaker: Arc<dyn Speaker>,
        cache: Option<Arc<SqliteCache>>,
    ) -> Self {
        let posts = Arc::new(PostCache::new());
        let api: Arc<dyn ContentApi> = Arc::new(CachedApi::new(api, posts.clone()));

        Self {
            config: Arc::new(config),
            api,
            posts,
            speaker,
            cache,
        }
    }

    /// `<data_dir>/broadsheet`, created on demand.
    pub fn data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| BroadsheetError::Config("Could not find data directory".into()))?;
        let broadsheet_dir = data_dir.join("broadsheet");
        std::fs::create_dir_all(&broadsheet_dir)?;
        Ok(broadsheet_dir)
    }

    fn default_cache_path() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("cache.db"))
    }
}
