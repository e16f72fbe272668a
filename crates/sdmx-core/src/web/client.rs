use crate::cursor::DataCursor;
use crate::domain::{DataDetail, DataStructure, Dataflow, FlowRef, Key, Languages, StructureRef};
use crate::web::rest::RestDialect;
use crate::SdmxError;

/// Raw access to one web source in one dialect.
///
/// Implementations answer with resolved resources: `flow` and `structure`
/// return the first match of a possibly wildcarded reference.
pub trait WebClient: Send + Sync {
    fn endpoint(&self) -> &str;

    fn dialect(&self) -> RestDialect;

    fn languages(&self) -> &Languages;

    fn flows(&self) -> Result<Vec<Dataflow>, SdmxError>;

    fn flow(&self, flow: &FlowRef) -> Result<Dataflow, SdmxError>;

    fn structure(&self, structure: &StructureRef) -> Result<DataStructure, SdmxError>;

    /// Decodes the data of `flow` with `structure` as dimension layout.
    fn data(
        &self,
        flow: &FlowRef,
        key: &Key,
        detail: DataDetail,
        structure: &DataStructure,
    ) -> Result<Box<dyn DataCursor + Send>, SdmxError>;

    fn is_series_keys_only_supported(&self) -> Result<bool, SdmxError>;
}

impl<C: WebClient + ?Sized> WebClient for Box<C> {
    fn endpoint(&self) -> &str {
        (**self).endpoint()
    }

    fn dialect(&self) -> RestDialect {
        (**self).dialect()
    }

    fn languages(&self) -> &Languages {
        (**self).languages()
    }

    fn flows(&self) -> Result<Vec<Dataflow>, SdmxError> {
        (**self).flows()
    }

    fn flow(&self, flow: &FlowRef) -> Result<Dataflow, SdmxError> {
        (**self).flow(flow)
    }

    fn structure(&self, structure: &StructureRef) -> Result<DataStructure, SdmxError> {
        (**self).structure(structure)
    }

    fn data(
        &self,
        flow: &FlowRef,
        key: &Key,
        detail: DataDetail,
        structure: &DataStructure,
    ) -> Result<Box<dyn DataCursor + Send>, SdmxError> {
        (**self).data(flow, key, detail, structure)
    }

    fn is_series_keys_only_supported(&self) -> Result<bool, SdmxError> {
        (**self).is_series_keys_only_supported()
    }
}
