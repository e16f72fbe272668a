use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{Cache, NoopCache};
use crate::connection::Connection;
use crate::domain::Languages;
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::retry::RetryConfig;
use crate::{SdmxError, ValidationError};

/// Named, addressable SDMX endpoint plus the driver able to open it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdmxSource {
    name: String,
    description: String,
    driver: String,
    endpoint: String,
    properties: BTreeMap<String, String>,
}

impl SdmxSource {
    pub fn builder() -> SdmxSourceBuilder {
        SdmxSourceBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn driver(&self) -> &str {
        &self.driver
    }

    /// URL, file path or driver specific URI.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Parses a property, falling back to `default` when it is absent.
    pub fn property_or<T: FromStr>(&self, key: &str, default: T) -> Result<T, ValidationError> {
        match self.property(key) {
            None => Ok(default),
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ValidationError::InvalidProperty {
                    key: key.to_owned(),
                    value: value.to_owned(),
                }),
        }
    }

    pub fn to_builder(&self) -> SdmxSourceBuilder {
        SdmxSourceBuilder {
            name: Some(self.name.clone()),
            description: Some(self.description.clone()),
            driver: Some(self.driver.clone()),
            endpoint: Some(self.endpoint.clone()),
            properties: self.properties.clone(),
        }
    }
}

/// Builder for [`SdmxSource`].
///
/// Only the name is mandatory here; a blank driver is reported when the
/// source is used, so that descriptors can be loaded and listed first.
#[derive(Debug, Clone, Default)]
pub struct SdmxSourceBuilder {
    name: Option<String>,
    description: Option<String>,
    driver: Option<String>,
    endpoint: Option<String>,
    properties: BTreeMap<String, String>,
}

impl SdmxSourceBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = Some(driver.into());
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Result<SdmxSource, ValidationError> {
        let name = self
            .name
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty())
            .ok_or(ValidationError::BlankSourceName)?;

        Ok(SdmxSource {
            description: self.description.unwrap_or_else(|| name.clone()),
            name,
            driver: self.driver.map(|driver| driver.trim().to_owned()).unwrap_or_default(),
            endpoint: self.endpoint.unwrap_or_default(),
            properties: self.properties,
        })
    }
}

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Shared services handed to drivers when connecting.
#[derive(Clone)]
pub struct DriverContext {
    pub cache: Arc<dyn Cache>,
    pub http_client: Arc<dyn HttpClient>,
    pub retry: RetryConfig,
    /// Lifetime of memoized flows, structures and repositories.
    pub cache_ttl: Duration,
}

impl Debug for DriverContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverContext")
            .field("retry", &self.retry)
            .field("cache_ttl", &self.cache_ttl)
            .finish_non_exhaustive()
    }
}

impl Default for DriverContext {
    fn default() -> Self {
        Self {
            cache: Arc::new(NoopCache),
            http_client: Arc::new(ReqwestHttpClient::new()),
            retry: RetryConfig::default(),
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

impl DriverContext {
    pub fn new(cache: Arc<dyn Cache>, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            cache,
            http_client,
            retry: RetryConfig::default(),
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = http_client;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cache_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }
}

/// Pluggable backend able to open connections to the sources it serves.
pub trait Driver: Send + Sync {
    /// Identifier referenced by [`SdmxSource::driver`].
    fn name(&self) -> &str;

    /// Higher ranks are listed first.
    fn rank(&self) -> i32 {
        0
    }

    fn connect(
        &self,
        source: &SdmxSource,
        languages: &Languages,
        context: &DriverContext,
    ) -> Result<Box<dyn Connection>, SdmxError>;

    fn default_sources(&self) -> Vec<SdmxSource>;

    fn supported_properties(&self) -> Vec<&'static str>;

    /// Whether this driver handles `uri`; errors are treated as a refusal by
    /// the manager.
    fn accepts_uri(&self, uri: &str) -> Result<bool, SdmxError> {
        let _ = uri;
        Ok(false)
    }

    fn connect_uri(
        &self,
        uri: &str,
        languages: &Languages,
        context: &DriverContext,
    ) -> Result<Box<dyn Connection>, SdmxError> {
        let _ = (languages, context);
        Err(SdmxError::not_found(format!(
            "uri '{uri}' for driver '{}'",
            self.name()
        )))
    }
}

/// Splits `scheme:rest?k=v&k=v` query parameters, percent-decoding values.
pub(crate) fn uri_params(query: &str) -> Result<BTreeMap<String, String>, ValidationError> {
    let mut params = BTreeMap::new();
    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let decode = |text: &str| {
            urlencoding::decode(text)
                .map(|decoded| decoded.into_owned())
                .map_err(|error| ValidationError::InvalidUri {
                    value: query.to_owned(),
                    reason: error.to_string(),
                })
        };
        params.insert(decode(key)?, decode(value)?);
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_requires_a_name() {
        let err = SdmxSource::builder().driver("web").build().expect_err("blank name");
        assert_eq!(err, ValidationError::BlankSourceName);

        let source = SdmxSource::builder()
            .name(" ECB ")
            .driver("web")
            .endpoint("https://data-api.ecb.europa.eu/service")
            .property("maxRetries", "2")
            .build()
            .expect("valid");
        assert_eq!(source.name(), "ECB");
        assert_eq!(source.description(), "ECB");
        assert_eq!(source.property_or("maxRetries", 3u32).expect("number"), 2);
        assert_eq!(source.property_or("timeout", 30_000u64).expect("default"), 30_000);
    }

    #[test]
    fn invalid_property_values_are_reported() {
        let source = SdmxSource::builder()
            .name("X")
            .property("maxRetries", "many")
            .build()
            .expect("valid");
        let err = source.property_or("maxRetries", 3u32).expect_err("not a number");
        assert!(matches!(err, ValidationError::InvalidProperty { .. }));
    }

    #[test]
    fn parses_uri_parameters() {
        let params = uri_params("data=%2Ftmp%2Fa.xml&structure=b.xml").expect("valid");
        assert_eq!(params.get("data").map(String::as_str), Some("/tmp/a.xml"));
        assert_eq!(params.get("structure").map(String::as_str), Some("b.xml"));
    }
}
