use crate::batch::BatchOrchestrator;
use crate::cache::{CacheBackend, CacheStore, FileBackend, MemoryBackend, SqliteBackend};
use crate::config::schema::{AppConfig, CacheBackendConfig, ItemsFile, OutputConfig};
use crate::error::{Error, Result};
use crate::extractor::HttpExtractor;
use crate::metrics::MetricsCollector;
use crate::queue::FetchQueue;
use crate::render::{console::ConsoleRenderer, csv::CsvRenderer, json::JsonRenderer, Renderer};
use serde::de::DeserializeOwned;
use serde_json::map::Entry;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use validator::Validate;

/// Environment overrides look like `PRICEFETCH__QUEUE__BASE_DELAY_MS=500`.
pub const ENV_PREFIX: &str = "PRICEFETCH";

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
        let path = path.as_ref();
        let mut visited = HashSet::new();
        let merged = Self::load_with_inheritance(path, &mut visited)?;
        let config = Self::apply_env(merged)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Same as [`ConfigLoader::load`] without environment overrides.
    pub fn load_file_only<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
        let mut visited = HashSet::new();
        let merged = Self::load_with_inheritance(path.as_ref(), &mut visited)?;
        let config: AppConfig = serde_json::from_value(merged)?;
        config.validate_all()?;
        Ok(config)
    }

    pub fn load_items<P: AsRef<Path>>(path: P) -> Result<ItemsFile> {
        let items: ItemsFile = Self::load_file(path.as_ref())?;
        items.validate()?;
        Ok(items)
    }

    fn load_with_inheritance(path: &Path, visited: &mut HashSet<PathBuf>) -> Result<Value> {
        let path = fs::canonicalize(path).map_err(|e| {
            Error::Config(format!("{}: {}", path.display(), e))
        })?;

        if visited.contains(&path) {
            return Err(Error::Config(format!(
                "Circular inheritance detected involving {}",
                path.display()
            )));
        }
        visited.insert(path.clone());

        let mut config: Value = Self::load_file(&path)?;

        let parent = config
            .get("extends")
            .and_then(Value::as_str)
            .map(str::to_string);

        if let Some(parent_path_str) = parent {
            let parent_path = path.parent()
                .ok_or_else(|| Error::Config(format!(
                    "Cannot determine parent directory for {}",
                    path.display()
                )))?
                .join(parent_path_str);

            let mut merged = Self::load_with_inheritance(&parent_path, visited)?;
            if let Value::Object(map) = &mut config {
                map.remove("extends");
            }
            merge_values(&mut merged, config);
            config = merged;
        }

        Ok(config)
    }

    fn load_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&content)?),
            Some("toml") => Ok(toml::from_str(&content)?),
            _ => Err(Error::Config(format!(
                "Unsupported file extension: {}",
                path.display()
            ))),
        }
    }

    fn apply_env(merged: Value) -> Result<AppConfig> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(
                &merged.to_string(),
                config::FileFormat::Json,
            ))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub async fn open_cache(config: &AppConfig) -> Result<CacheStore> {
        let backend: Arc<dyn CacheBackend> = match &config.cache.backend {
            CacheBackendConfig::Memory => Arc::new(MemoryBackend::new()),
            CacheBackendConfig::File { path } => Arc::new(FileBackend::open(path).await?),
            CacheBackendConfig::Sqlite { path } => Arc::new(SqliteBackend::open(path).await?),
        };
        Ok(CacheStore::new(backend, &config.cache))
    }

    pub async fn create_orchestrator(
        config: &AppConfig,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Result<BatchOrchestrator> {
        let cache = Arc::new(Self::open_cache(config).await?);
        let extractor = Arc::new(HttpExtractor::new(&config.http, config.extraction.clone())?);
        let queue = FetchQueue::new(config.queue.settings(), extractor, cache, metrics);
        Ok(BatchOrchestrator::new(queue))
    }

    pub fn create_renderer(
        config: &AppConfig,
        multi: Option<Arc<indicatif::MultiProgress>>,
    ) -> Result<Box<dyn Renderer>> {
        let renderer: Box<dyn Renderer> = match &config.output {
            Some(OutputConfig::Json { path }) => Box::new(JsonRenderer::new(PathBuf::from(path))?),
            Some(OutputConfig::Csv { path }) => Box::new(CsvRenderer::new(PathBuf::from(path))?),
            Some(OutputConfig::Console) | None => Box::new(ConsoleRenderer::new(multi)),
        };
        Ok(renderer)
    }
}

/// Child values win; nested objects are merged key by key.
fn merge_values(parent: &mut Value, child: Value) {
    match (parent, child) {
        (Value::Object(parent), Value::Object(child)) => {
            for (key, value) in child {
                match parent.entry(key) {
                    Entry::Occupied(mut existing) => merge_values(existing.get_mut(), value),
                    Entry::Vacant(slot) => {
                        slot.insert(value);
                    }
                }
            }
        }
        (parent, child) => *parent = child,
    }
}
