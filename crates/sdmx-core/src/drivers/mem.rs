use std::sync::Arc;

use crate::connection::Connection;
use crate::domain::Languages;
use crate::driver::{Driver, DriverContext, SdmxSource};
use crate::repository::{Repository, RepositoryConnection};
use crate::SdmxError;

pub const MEM_DRIVER: &str = "mem";

const URI_PREFIX: &str = "sdmx:mem:";

/// Driver serving repositories fixed at construction time.
///
/// Every repository is published as a default source under its own name.
#[derive(Debug, Clone, Default)]
pub struct MemDriver {
    repositories: Vec<Arc<Repository>>,
}

impl MemDriver {
    pub fn new<I: IntoIterator<Item = Repository>>(repositories: I) -> Self {
        Self {
            repositories: repositories.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn with_repository(mut self, repository: Repository) -> Self {
        self.repositories.push(Arc::new(repository));
        self
    }

    fn find(&self, name: &str) -> Option<Arc<Repository>> {
        self.repositories
            .iter()
            .find(|repository| repository.name() == name)
            .cloned()
    }

    fn open(&self, name: &str) -> Result<Box<dyn Connection>, SdmxError> {
        let repository = self
            .find(name)
            .ok_or_else(|| SdmxError::not_found(format!("repository '{name}'")))?;
        Ok(Box::new(RepositoryConnection::new(repository)))
    }
}

impl Driver for MemDriver {
    fn name(&self) -> &str {
        MEM_DRIVER
    }

    fn connect(
        &self,
        source: &SdmxSource,
        _languages: &Languages,
        _context: &DriverContext,
    ) -> Result<Box<dyn Connection>, SdmxError> {
        let name = source
            .endpoint()
            .strip_prefix(URI_PREFIX)
            .unwrap_or(source.name());
        self.open(name)
    }

    fn default_sources(&self) -> Vec<SdmxSource> {
        self.repositories
            .iter()
            .filter_map(|repository| {
                SdmxSource::builder()
                    .name(repository.name())
                    .driver(MEM_DRIVER)
                    .endpoint(format!("{URI_PREFIX}{}", repository.name()))
                    .build()
                    .ok()
            })
            .collect()
    }

    fn supported_properties(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Accepts `sdmx:mem:<name>` for known repositories.
    fn accepts_uri(&self, uri: &str) -> Result<bool, SdmxError> {
        Ok(uri
            .strip_prefix(URI_PREFIX)
            .is_some_and(|name| self.find(name).is_some()))
    }

    fn connect_uri(
        &self,
        uri: &str,
        _languages: &Languages,
        _context: &DriverContext,
    ) -> Result<Box<dyn Connection>, SdmxError> {
        let name = uri
            .strip_prefix(URI_PREFIX)
            .ok_or_else(|| SdmxError::not_found(format!("repository for uri '{uri}'")))?;
        self.open(name)
    }
}
