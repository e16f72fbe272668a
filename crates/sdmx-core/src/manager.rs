//! Driver registry resolving source names and URIs to connections.

use std::collections::HashMap;
use std::env;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tracing::{debug, warn};

use crate::cache::{Cache, TtlCache};
use crate::connection::{failsafe, Connection, FailsafeConnection};
use crate::domain::Languages;
use crate::driver::{Driver, DriverContext, SdmxSource};
use crate::http_client::HttpClient;
use crate::retry::RetryConfig;
use crate::xml::read_sources;
use crate::{SdmxError, ValidationError};

/// Entry point of the engine: registered drivers plus a name→source index.
///
/// Both collections sit behind locks so concurrent `get_connection` calls are
/// safe; drivers are consulted in registration order.
pub struct SdmxManager {
    drivers: RwLock<Vec<Arc<dyn Driver>>>,
    sources: RwLock<HashMap<String, SdmxSource>>,
    languages: Languages,
    context: DriverContext,
}

impl std::fmt::Debug for SdmxManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SdmxManager")
            .field("drivers", &self.driver_names())
            .field("languages", &self.languages)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl SdmxManager {
    pub fn builder() -> SdmxManagerBuilder {
        SdmxManagerBuilder::new()
    }

    /// Manager without drivers, using the default context.
    pub fn new() -> Self {
        Self {
            drivers: RwLock::new(Vec::new()),
            sources: RwLock::new(HashMap::new()),
            languages: Languages::any(),
            context: DriverContext::default(),
        }
    }

    pub fn languages(&self) -> &Languages {
        &self.languages
    }

    pub fn context(&self) -> &DriverContext {
        &self.context
    }

    /// Appends `driver` and indexes its default sources, replacing entries
    /// with the same name.
    pub fn register_driver(&self, driver: Arc<dyn Driver>) {
        let defaults = driver.default_sources();
        debug!(driver = driver.name(), sources = defaults.len(), "registering driver");
        {
            let mut sources = self.sources.write().unwrap_or_else(PoisonError::into_inner);
            for source in defaults {
                sources.insert(source.name().to_owned(), source);
            }
        }
        self.drivers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(driver);
    }

    /// Registered drivers, higher rank first, registration order otherwise.
    pub fn drivers(&self) -> Vec<Arc<dyn Driver>> {
        let mut drivers = self
            .drivers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        drivers.sort_by_key(|driver| std::cmp::Reverse(driver.rank()));
        drivers
    }

    pub fn driver_names(&self) -> Vec<String> {
        self.drivers()
            .iter()
            .map(|driver| driver.name().to_owned())
            .collect()
    }

    fn driver(&self, name: &str) -> Option<Arc<dyn Driver>> {
        self.drivers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|driver| driver.name() == name)
            .cloned()
    }

    /// Known sources sorted by name.
    pub fn sources(&self) -> Vec<SdmxSource> {
        let mut sources: Vec<SdmxSource> = self
            .sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        sources.sort_by(|left, right| left.name().cmp(right.name()));
        sources
    }

    pub fn source(&self, name: &str) -> Option<SdmxSource> {
        self.sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Rebuilds the index from the drivers' defaults overlaid with `custom`;
    /// within `custom` the last entry of a name wins.
    pub fn set_sources(&self, custom: Vec<SdmxSource>) {
        let defaults: Vec<SdmxSource> = self
            .drivers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .flat_map(|driver| driver.default_sources())
            .collect();

        let mut sources = self.sources.write().unwrap_or_else(PoisonError::into_inner);
        sources.clear();
        for source in defaults.into_iter().chain(custom) {
            sources.insert(source.name().to_owned(), source);
        }
    }

    /// Opens the source called `name` with the manager languages.
    pub fn get_connection(&self, name: &str) -> Result<Box<dyn Connection>, SdmxError> {
        self.get_connection_with(name, &self.languages)
    }

    /// Opens the source called `name` through the driver it declares.
    pub fn get_connection_with(
        &self,
        name: &str,
        languages: &Languages,
    ) -> Result<Box<dyn Connection>, SdmxError> {
        let source = self
            .source(name)
            .ok_or_else(|| SdmxError::not_found(format!("source '{name}'")))?;
        if source.driver().is_empty() {
            return Err(ValidationError::BlankDriver {
                name: source.name().to_owned(),
            }
            .into());
        }
        let driver = self.driver(source.driver()).ok_or_else(|| {
            SdmxError::not_found(format!(
                "driver '{}' declared by source '{}'",
                source.driver(),
                source.name()
            ))
        })?;

        let connection = failsafe("connect", || {
            driver.connect(&source, languages, &self.context)
        })?;
        Ok(Box::new(FailsafeConnection::new(connection)))
    }

    /// Opens `uri` with the first driver, in registration order, accepting it.
    ///
    /// A driver failing its acceptance check is skipped.
    pub fn get_connection_by_uri(&self, uri: &str) -> Result<Box<dyn Connection>, SdmxError> {
        let drivers = self
            .drivers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for driver in drivers {
            match failsafe("accepts_uri", || driver.accepts_uri(uri)) {
                Ok(true) => {
                    let connection = failsafe("connect_uri", || {
                        driver.connect_uri(uri, &self.languages, &self.context)
                    })?;
                    return Ok(Box::new(FailsafeConnection::new(connection)));
                }
                Ok(false) => {}
                Err(error) => {
                    warn!(driver = driver.name(), uri, error = %error, "driver skipped while probing uri");
                }
            }
        }

        Err(SdmxError::not_found(format!("driver accepting uri '{uri}'")))
    }
}

impl Default for SdmxManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`SdmxManager`].
///
/// # Example
///
/// ```rust,ignore
/// use sdmx_core::SdmxManager;
///
/// let manager = SdmxManager::builder()
///     .with_default_drivers()
///     .with_env()
///     .build()?;
/// let connection = manager.get_connection("ECB")?;
/// ```
#[derive(Default)]
pub struct SdmxManagerBuilder {
    drivers: Vec<Arc<dyn Driver>>,
    sources: Vec<SdmxSource>,
    sources_file: Option<PathBuf>,
    languages: Option<String>,
    cache: Option<Arc<dyn Cache>>,
    cache_ttl: Option<Duration>,
    http_client: Option<Arc<dyn HttpClient>>,
    retry: Option<RetryConfig>,
}

impl SdmxManagerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_driver(mut self, driver: Arc<dyn Driver>) -> Self {
        self.drivers.push(driver);
        self
    }

    /// Registers the built-in web and file drivers.
    pub fn with_default_drivers(mut self) -> Self {
        self.drivers.extend(crate::drivers::default_drivers());
        self
    }

    /// Overlays `source` on top of the drivers' defaults.
    pub fn with_source(mut self, source: SdmxSource) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_languages(mut self, languages: impl Into<String>) -> Self {
        self.languages = Some(languages.into());
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_cache_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = Some(cache_ttl);
        self
    }

    pub fn with_http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Extra source descriptor file read at build time.
    pub fn with_sources_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources_file = Some(path.into());
        self
    }

    /// Reads `SDMX_LANGUAGES`, `SDMX_CACHE_TTL_SECS` and `SDMX_SOURCES`.
    ///
    /// A cache TTL enables an in-memory cache unless one was set explicitly.
    pub fn with_env(mut self) -> Self {
        if let Ok(languages) = env::var("SDMX_LANGUAGES") {
            self.languages = Some(languages);
        }
        match env::var("SDMX_CACHE_TTL_SECS").map(|value| value.trim().parse::<u64>()) {
            Ok(Ok(seconds)) => {
                self.cache_ttl = Some(Duration::from_secs(seconds));
                if self.cache.is_none() {
                    self.cache = Some(Arc::new(TtlCache::new()));
                }
            }
            Ok(Err(error)) => warn!(error = %error, "ignoring invalid SDMX_CACHE_TTL_SECS"),
            Err(_) => {}
        }
        if let Ok(path) = env::var("SDMX_SOURCES") {
            self.sources_file = Some(PathBuf::from(path));
        }
        self
    }

    pub fn build(self) -> Result<SdmxManager, SdmxError> {
        let languages = match self.languages.as_deref() {
            Some(text) => Languages::parse(text)?,
            None => Languages::any(),
        };

        let mut context = DriverContext::default();
        if let Some(cache) = self.cache {
            context = context.with_cache(cache);
        }
        if let Some(cache_ttl) = self.cache_ttl {
            context = context.with_cache_ttl(cache_ttl);
        }
        if let Some(http_client) = self.http_client {
            context = context.with_http_client(http_client);
        }
        if let Some(retry) = self.retry {
            context = context.with_retry(retry);
        }

        let mut custom = self.sources;
        if let Some(path) = &self.sources_file {
            let file = File::open(path).map_err(|error| {
                SdmxError::io_caused_by(format!("cannot open sources '{}'", path.display()), error)
            })?;
            custom.extend(read_sources(BufReader::new(file))?);
        }

        let manager = SdmxManager {
            drivers: RwLock::new(Vec::new()),
            sources: RwLock::new(HashMap::new()),
            languages,
            context,
        };
        for driver in self.drivers {
            manager.register_driver(driver);
        }
        if !custom.is_empty() {
            manager.set_sources(custom);
        }
        Ok(manager)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Dataflow, FlowRef, StructureRef};
    use crate::repository::Repository;
    use crate::SdmxErrorKind;

    struct FixedDriver {
        name: &'static str,
        rank: i32,
    }

    impl Driver for FixedDriver {
        fn name(&self) -> &str {
            self.name
        }

        fn rank(&self) -> i32 {
            self.rank
        }

        fn connect(
            &self,
            source: &SdmxSource,
            _languages: &Languages,
            _context: &DriverContext,
        ) -> Result<Box<dyn Connection>, SdmxError> {
            let flow = FlowRef::parse("TEST,FLOW,1.0")?;
            let structure = StructureRef::parse("TEST,DSD,1.0")?;
            let repository = Repository::builder()
                .name(source.name())
                .flow(Dataflow::new(flow, structure, source.description()))
                .build()?;
            Ok(Box::new(repository.into_connection()))
        }

        fn default_sources(&self) -> Vec<SdmxSource> {
            SdmxSource::builder()
                .name(format!("{}-default", self.name))
                .driver(self.name)
                .build()
                .into_iter()
                .collect()
        }

        fn supported_properties(&self) -> Vec<&'static str> {
            Vec::new()
        }
    }

    fn manager() -> SdmxManager {
        SdmxManager::builder()
            .with_driver(Arc::new(FixedDriver { name: "low", rank: 0 }))
            .with_driver(Arc::new(FixedDriver { name: "high", rank: 10 }))
            .build()
            .expect("manager")
    }

    #[test]
    fn lists_drivers_by_rank_and_indexes_defaults() {
        let manager = manager();
        assert_eq!(manager.driver_names(), vec!["high", "low"]);
        let names: Vec<String> = manager
            .sources()
            .iter()
            .map(|source| source.name().to_owned())
            .collect();
        assert_eq!(names, vec!["high-default", "low-default"]);
    }

    #[test]
    fn set_sources_overlays_defaults_last_wins() {
        let manager = manager();
        let first = SdmxSource::builder()
            .name("custom")
            .driver("low")
            .description("first")
            .build()
            .expect("valid");
        let second = first.to_builder().description("second").build().expect("valid");
        manager.set_sources(vec![first, second]);

        assert_eq!(manager.sources().len(), 3);
        assert_eq!(
            manager.source("custom").map(|source| source.description().to_owned()),
            Some(String::from("second"))
        );
    }

    #[test]
    fn rejects_blank_and_unknown_drivers() {
        let manager = manager();
        manager.set_sources(vec![
            SdmxSource::builder().name("blank").build().expect("valid"),
            SdmxSource::builder().name("orphan").driver("gone").build().expect("valid"),
        ]);

        let blank = manager.get_connection("blank").err().expect("blank driver");
        assert_eq!(blank.kind(), SdmxErrorKind::InvalidArgument);
        let orphan = manager.get_connection("orphan").err().expect("unknown driver");
        assert!(orphan.is_not_found());
        let missing = manager.get_connection("nowhere").err().expect("unknown source");
        assert!(missing.is_not_found());
    }

    #[test]
    fn connects_through_the_declared_driver() {
        let manager = manager();
        let connection = manager.get_connection("low-default").expect("connection");
        let flows = connection.flows().expect("flows");
        assert_eq!(flows[0].label(), "low-default");
    }

    #[test]
    fn invalid_languages_fail_the_build() {
        let err = SdmxManager::builder().with_languages(";q=1").build().err();
        assert!(err.is_some());
    }
}
