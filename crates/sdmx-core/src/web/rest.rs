use std::fmt::{Display, Formatter};
use std::io::Cursor;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cursor::{DataCursor, SeriesCursor};
use crate::domain::{DataDetail, DataStructure, Dataflow, FlowRef, Key, Languages, StructureRef};
use crate::http_client::{HttpClient, HttpRequest};
use crate::retry::RetryConfig;
use crate::web::client::WebClient;
use crate::web::queries::{data_query, flow_query, flows_query, structure_query};
use crate::xml::{decode_structures, probe_data_type, StructureDocument, XmlDataCursor};
use crate::{SdmxError, ValidationError};

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Message flavour spoken by a REST endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RestDialect {
    /// Structure-specific (compact) data, 2.1 structures.
    #[default]
    #[serde(rename = "SDMX21")]
    Sdmx21,
    /// Generic data, 2.1 structures.
    #[serde(rename = "SDMX21_GENERIC")]
    Sdmx21Generic,
    /// Compact data, 2.0 structures.
    #[serde(rename = "SDMX20")]
    Sdmx20,
}

impl RestDialect {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sdmx21 => "SDMX21",
            Self::Sdmx21Generic => "SDMX21_GENERIC",
            Self::Sdmx20 => "SDMX20",
        }
    }

    const fn data_media_type(self) -> &'static str {
        match self {
            Self::Sdmx21 => "application/vnd.sdmx.structurespecificdata+xml;version=2.1",
            Self::Sdmx21Generic => "application/vnd.sdmx.genericdata+xml;version=2.1",
            Self::Sdmx20 => "application/vnd.sdmx.compactdata+xml;version=2.0",
        }
    }

    const fn structure_media_type(self) -> &'static str {
        match self {
            Self::Sdmx21 | Self::Sdmx21Generic => "application/vnd.sdmx.structure+xml;version=2.1",
            Self::Sdmx20 => "application/xml",
        }
    }
}

impl Display for RestDialect {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RestDialect {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "SDMX21" => Ok(Self::Sdmx21),
            "SDMX21_GENERIC" => Ok(Self::Sdmx21Generic),
            "SDMX20" => Ok(Self::Sdmx20),
            _ => Err(ValidationError::InvalidProperty {
                key: String::from("dialect"),
                value: value.to_owned(),
            }),
        }
    }
}

/// Web client issuing SDMX RESTful queries over an [`HttpClient`].
pub struct RestClient {
    endpoint: String,
    dialect: RestDialect,
    languages: Languages,
    http_client: Arc<dyn HttpClient>,
    retry: RetryConfig,
    timeout_ms: u64,
    series_keys_only_supported: bool,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("endpoint", &self.endpoint)
            .field("dialect", &self.dialect)
            .field("languages", &self.languages)
            .field("timeout_ms", &self.timeout_ms)
            .finish_non_exhaustive()
    }
}

impl RestClient {
    /// Validates `endpoint` and binds the client to it.
    pub fn new(
        endpoint: &str,
        dialect: RestDialect,
        languages: Languages,
        http_client: Arc<dyn HttpClient>,
    ) -> Result<Self, ValidationError> {
        flows_query(endpoint)?;
        Ok(Self {
            endpoint: endpoint.trim().trim_end_matches('/').to_owned(),
            dialect,
            languages,
            http_client,
            retry: RetryConfig::default(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            series_keys_only_supported: true,
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_series_keys_only_supported(mut self, supported: bool) -> Self {
        self.series_keys_only_supported = supported;
        self
    }

    /// Body of a successful GET; 404 is reported as not found.
    fn get(&self, url: &str, accept: &str) -> Result<String, SdmxError> {
        let request = HttpRequest::get(url)
            .with_header("accept", accept)
            .with_header("accept-language", self.languages.to_string())
            .with_timeout_ms(self.timeout_ms);

        let response = self
            .retry
            .execute(self.http_client.as_ref(), &request)
            .map_err(|error| SdmxError::io_caused_by(format!("GET {url} failed"), error))?;
        debug!(url, status = response.status, "sdmx response");

        match response.status {
            404 => Err(SdmxError::not_found(format!("resource at {url}"))),
            status if !(200..300).contains(&status) => {
                Err(SdmxError::io(format!("GET {url} returned status {status}")))
            }
            _ => Ok(response.body),
        }
    }

    fn structures(&self, url: &str) -> Result<StructureDocument, SdmxError> {
        let body = self.get(url, self.dialect.structure_media_type())?;
        decode_structures(body.as_bytes(), &self.languages)
    }
}

impl WebClient for RestClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn dialect(&self) -> RestDialect {
        self.dialect
    }

    fn languages(&self) -> &Languages {
        &self.languages
    }

    fn flows(&self) -> Result<Vec<Dataflow>, SdmxError> {
        Ok(self.structures(&flows_query(&self.endpoint)?)?.flows)
    }

    fn flow(&self, flow: &FlowRef) -> Result<Dataflow, SdmxError> {
        self.structures(&flow_query(&self.endpoint, flow)?)?
            .flows
            .into_iter()
            .find(|candidate| flow.contains(candidate.flow_ref()))
            .ok_or_else(|| SdmxError::not_found(format!("flow '{flow}'")))
    }

    fn structure(&self, structure: &StructureRef) -> Result<DataStructure, SdmxError> {
        self.structures(&structure_query(&self.endpoint, structure)?)?
            .structures
            .into_iter()
            .find(|candidate| structure.contains(candidate.structure_ref()))
            .ok_or_else(|| SdmxError::not_found(format!("structure '{structure}'")))
    }

    /// An empty result set (404) yields an empty cursor.
    fn data(
        &self,
        flow: &FlowRef,
        key: &Key,
        detail: DataDetail,
        structure: &DataStructure,
    ) -> Result<Box<dyn DataCursor + Send>, SdmxError> {
        let url = data_query(&self.endpoint, flow, key, detail)?;
        let body = match self.get(&url, self.dialect.data_media_type()) {
            Ok(body) => body,
            Err(error) if error.is_not_found() => {
                debug!(url, "no data for query");
                return Ok(Box::new(SeriesCursor::new(&[], key, detail)));
            }
            Err(error) => return Err(error),
        };

        let data_type = probe_data_type(body.as_bytes())?;
        Ok(Box::new(XmlDataCursor::new(
            Cursor::new(body),
            data_type,
            structure,
        )))
    }

    fn is_series_keys_only_supported(&self) -> Result<bool, SdmxError> {
        Ok(self.series_keys_only_supported)
    }
}
