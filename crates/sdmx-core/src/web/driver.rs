use std::time::Duration;

use tracing::warn;

use crate::connection::Connection;
use crate::domain::Languages;
use crate::driver::{Driver, DriverContext, SdmxSource};
use crate::web::cached::CachedWebClient;
use crate::web::connection::WebConnection;
use crate::web::failsafe::FailsafeWebClient;
use crate::web::rest::{RestClient, RestDialect, DEFAULT_TIMEOUT_MS};
use crate::xml::read_sources;
use crate::SdmxError;

pub const WEB_DRIVER: &str = "web";

pub const DIALECT_PROPERTY: &str = "dialect";
pub const SERIES_KEYS_ONLY_PROPERTY: &str = "seriesKeysOnlySupported";
pub const CACHE_TTL_PROPERTY: &str = "cacheTtl";
pub const MAX_RETRIES_PROPERTY: &str = "maxRetries";
pub const TIMEOUT_PROPERTY: &str = "timeout";

const BUNDLED_SOURCES: &str = include_str!("../../resources/sources.xml");

/// Driver for SDMX RESTful web services.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebDriver;

impl WebDriver {
    pub fn new() -> Self {
        Self
    }
}

impl Driver for WebDriver {
    fn name(&self) -> &str {
        WEB_DRIVER
    }

    fn rank(&self) -> i32 {
        100
    }

    fn connect(
        &self,
        source: &SdmxSource,
        languages: &Languages,
        context: &DriverContext,
    ) -> Result<Box<dyn Connection>, SdmxError> {
        let dialect = source.property_or(DIALECT_PROPERTY, RestDialect::default())?;
        let series_keys_only = source.property_or(SERIES_KEYS_ONLY_PROPERTY, true)?;
        let cache_ttl = source.property_or(CACHE_TTL_PROPERTY, context.cache_ttl.as_secs())?;
        let max_retries = source.property_or(MAX_RETRIES_PROPERTY, context.retry.max_retries)?;
        let timeout_ms = source.property_or(TIMEOUT_PROPERTY, DEFAULT_TIMEOUT_MS)?;

        let mut retry = context.retry.clone();
        retry.max_retries = max_retries;

        let client = RestClient::new(
            source.endpoint(),
            dialect,
            languages.clone(),
            context.http_client.clone(),
        )?
        .with_retry(retry)
        .with_timeout_ms(timeout_ms)
        .with_series_keys_only_supported(series_keys_only);

        let client = CachedWebClient::new(
            client,
            context.cache.clone(),
            Duration::from_secs(cache_ttl),
        );
        Ok(Box::new(WebConnection::new(FailsafeWebClient::new(client))))
    }

    fn default_sources(&self) -> Vec<SdmxSource> {
        match read_sources(BUNDLED_SOURCES.as_bytes()) {
            Ok(sources) => sources
                .into_iter()
                .filter(|source| source.driver() == WEB_DRIVER)
                .collect(),
            Err(error) => {
                warn!(error = %error, "bundled web sources unreadable");
                Vec::new()
            }
        }
    }

    fn supported_properties(&self) -> Vec<&'static str> {
        vec![
            DIALECT_PROPERTY,
            SERIES_KEYS_ONLY_PROPERTY,
            CACHE_TTL_PROPERTY,
            MAX_RETRIES_PROPERTY,
            TIMEOUT_PROPERTY,
        ]
    }
}
