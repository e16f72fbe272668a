use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::{get_json, put_json, Cache};
use crate::cursor::DataCursor;
use crate::domain::{DataDetail, DataStructure, Dataflow, FlowRef, Key, Languages, StructureRef};
use crate::web::client::WebClient;
use crate::web::rest::RestDialect;
use crate::SdmxError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CacheKind {
    Flows,
    Flow,
    Structure,
    SeriesKeysOnly,
}

impl CacheKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Flows => "flows",
            Self::Flow => "flow",
            Self::Structure => "struct",
            Self::SeriesKeysOnly => "serieskeysonly",
        }
    }
}

/// Identity of a memoized answer.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CacheKey<'a> {
    kind: CacheKind,
    endpoint: &'a str,
    dialect: RestDialect,
    languages: &'a Languages,
    resource: Option<String>,
}

impl Display for CacheKey<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "sdmx:web:{}:{}:{}:{}",
            self.kind.as_str(),
            self.dialect,
            self.endpoint,
            self.languages
        )?;
        if let Some(resource) = &self.resource {
            write!(f, ":{resource}")?;
        }
        Ok(())
    }
}

/// Memoizes flows, structures and the series-keys-only probe of a client.
///
/// Data queries always reach the delegate.
pub struct CachedWebClient<C> {
    inner: C,
    cache: Arc<dyn Cache>,
    ttl: Duration,
}

impl<C: WebClient> CachedWebClient<C> {
    pub fn new(inner: C, cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self { inner, cache, ttl }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    fn key(&self, kind: CacheKind, resource: Option<String>) -> String {
        CacheKey {
            kind,
            endpoint: self.inner.endpoint(),
            dialect: self.inner.dialect(),
            languages: self.inner.languages(),
            resource,
        }
        .to_string()
    }

    fn load<T, F>(&self, key: String, fetch: F) -> Result<T, SdmxError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T, SdmxError>,
    {
        if let Some(value) = get_json(self.cache.as_ref(), &key) {
            return Ok(value);
        }
        let value = fetch()?;
        put_json(self.cache.as_ref(), &key, &value, self.ttl);
        Ok(value)
    }
}

impl<C: WebClient> WebClient for CachedWebClient<C> {
    fn endpoint(&self) -> &str {
        self.inner.endpoint()
    }

    fn dialect(&self) -> RestDialect {
        self.inner.dialect()
    }

    fn languages(&self) -> &Languages {
        self.inner.languages()
    }

    fn flows(&self) -> Result<Vec<Dataflow>, SdmxError> {
        self.load(self.key(CacheKind::Flows, None), || self.inner.flows())
    }

    fn flow(&self, flow: &FlowRef) -> Result<Dataflow, SdmxError> {
        self.load(self.key(CacheKind::Flow, Some(flow.to_string())), || {
            self.inner.flow(flow)
        })
    }

    fn structure(&self, structure: &StructureRef) -> Result<DataStructure, SdmxError> {
        self.load(
            self.key(CacheKind::Structure, Some(structure.to_string())),
            || self.inner.structure(structure),
        )
    }

    fn data(
        &self,
        flow: &FlowRef,
        key: &Key,
        detail: DataDetail,
        structure: &DataStructure,
    ) -> Result<Box<dyn DataCursor + Send>, SdmxError> {
        self.inner.data(flow, key, detail, structure)
    }

    fn is_series_keys_only_supported(&self) -> Result<bool, SdmxError> {
        self.load(self.key(CacheKind::SeriesKeysOnly, None), || {
            self.inner.is_series_keys_only_supported()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_cover_every_identity_component() {
        let languages = Languages::parse("en").expect("valid");
        let key = CacheKey {
            kind: CacheKind::Structure,
            endpoint: "https://sdmx.example.org/rest",
            dialect: RestDialect::Sdmx21Generic,
            languages: &languages,
            resource: Some(String::from("ECB,EXR,1.0")),
        };
        assert_eq!(
            key.to_string(),
            "sdmx:web:struct:SDMX21_GENERIC:https://sdmx.example.org/rest:en:ECB,EXR,1.0"
        );

        let flows = CacheKey {
            kind: CacheKind::Flows,
            resource: None,
            ..key
        };
        assert_eq!(flows.to_string(), "sdmx:web:flows:SDMX21_GENERIC:https://sdmx.example.org/rest:en");
    }
}
