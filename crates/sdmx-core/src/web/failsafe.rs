use crate::connection::failsafe;
use crate::cursor::DataCursor;
use crate::domain::{DataDetail, DataStructure, Dataflow, FlowRef, Key, Languages, StructureRef};
use crate::web::client::WebClient;
use crate::web::rest::RestDialect;
use crate::SdmxError;

/// Client wrapper normalizing panics and abnormal errors into I/O errors.
pub struct FailsafeWebClient<C> {
    inner: C,
}

impl<C: WebClient> FailsafeWebClient<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C: WebClient> WebClient for FailsafeWebClient<C> {
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
        failsafe("flows", || self.inner.flows())
    }

    fn flow(&self, flow: &FlowRef) -> Result<Dataflow, SdmxError> {
        failsafe("flow", || self.inner.flow(flow))
    }

    fn structure(&self, structure: &StructureRef) -> Result<DataStructure, SdmxError> {
        failsafe("structure", || self.inner.structure(structure))
    }

    fn data(
        &self,
        flow: &FlowRef,
        key: &Key,
        detail: DataDetail,
        structure: &DataStructure,
    ) -> Result<Box<dyn DataCursor + Send>, SdmxError> {
        failsafe("data", || self.inner.data(flow, key, detail, structure))
    }

    fn is_series_keys_only_supported(&self) -> Result<bool, SdmxError> {
        failsafe("is_series_keys_only_supported", || {
            self.inner.is_series_keys_only_supported()
        })
    }
}
