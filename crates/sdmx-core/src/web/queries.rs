//! SDMX 2.1 RESTful resource paths.

use crate::domain::{DataDetail, FlowRef, Key, StructureRef};
use crate::web::query::RestQueryBuilder;
use crate::ValidationError;

const ALL_PROVIDERS: &str = "all";

pub fn flows_query(endpoint: &str) -> Result<String, ValidationError> {
    Ok(RestQueryBuilder::of(endpoint)?
        .path("dataflow")
        .path("all")
        .path("all")
        .path("latest")
        .build())
}

pub fn flow_query(endpoint: &str, flow: &FlowRef) -> Result<String, ValidationError> {
    Ok(RestQueryBuilder::of(endpoint)?
        .path("dataflow")
        .path(flow.agency())
        .path(flow.id())
        .path(flow.version())
        .build())
}

/// Structure with its code lists and concepts.
pub fn structure_query(endpoint: &str, structure: &StructureRef) -> Result<String, ValidationError> {
    Ok(RestQueryBuilder::of(endpoint)?
        .path("datastructure")
        .path(structure.agency())
        .path(structure.id())
        .path(structure.version())
        .param("references", "children")
        .build())
}

pub fn data_query(
    endpoint: &str,
    flow: &FlowRef,
    key: &Key,
    detail: DataDetail,
) -> Result<String, ValidationError> {
    Ok(RestQueryBuilder::of(endpoint)?
        .path("data")
        .path(flow.to_string())
        .path(key.to_string())
        .path(ALL_PROVIDERS)
        .param("detail", detail.as_str())
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENDPOINT: &str = "https://sdmx.example.org/rest";

    #[test]
    fn builds_resource_paths() {
        assert_eq!(
            flows_query(ENDPOINT).expect("valid"),
            "https://sdmx.example.org/rest/dataflow/all/all/latest"
        );

        let structure = StructureRef::parse("ECB,ECB_EXR1,1.0").expect("valid");
        assert_eq!(
            structure_query(ENDPOINT, &structure).expect("valid"),
            "https://sdmx.example.org/rest/datastructure/ECB/ECB_EXR1/1.0?references=children"
        );
    }

    #[test]
    fn data_query_encodes_flow_and_key() {
        let flow = FlowRef::parse("ECB,EXR,1.0").expect("valid");
        let key = Key::parse("M.USD..SP00.A").expect("valid");
        assert_eq!(
            data_query(ENDPOINT, &flow, &key, DataDetail::SeriesKeysOnly).expect("valid"),
            "https://sdmx.example.org/rest/data/ECB%2CEXR%2C1.0/M.USD..SP00.A/all?detail=serieskeysonly"
        );
        assert_eq!(
            data_query(ENDPOINT, &flow, &Key::ALL, DataDetail::Full).expect("valid"),
            "https://sdmx.example.org/rest/data/ECB%2CEXR%2C1.0/all/all?detail=full"
        );
    }
}
