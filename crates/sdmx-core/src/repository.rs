//! In-memory repository serving the [`Connection`] contract.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::connection::Connection;
use crate::cursor::{DataCursor, SeriesCursor};
use crate::domain::{
    DataDetail, DataStructure, Dataflow, FlowRef, Key, Series, StructureRef,
};
use crate::{SdmxError, ValidationError};

/// Immutable set of structures, flows and series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    name: String,
    structures: Vec<DataStructure>,
    flows: Vec<Dataflow>,
    data_sets: BTreeMap<FlowRef, Vec<Series>>,
    series_keys_only_supported: bool,
}

impl Repository {
    pub fn builder() -> RepositoryBuilder {
        RepositoryBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn structures(&self) -> &[DataStructure] {
        &self.structures
    }

    pub fn flows(&self) -> &[Dataflow] {
        &self.flows
    }

    pub const fn is_series_keys_only_supported(&self) -> bool {
        self.series_keys_only_supported
    }

    /// First flow matched by `flow`; `all`/`latest` act as wildcards.
    pub fn flow(&self, flow: &FlowRef) -> Option<&Dataflow> {
        self.flows
            .iter()
            .find(|candidate| flow.contains(candidate.flow_ref()))
    }

    pub fn structure(&self, structure: &StructureRef) -> Option<&DataStructure> {
        self.structures
            .iter()
            .find(|candidate| structure.contains(candidate.structure_ref()))
    }

    /// Series of a flow in insertion order; empty when the flow has no data.
    pub fn series(&self, flow: &FlowRef) -> &[Series] {
        self.flow(flow)
            .and_then(|found| self.data_sets.get(found.flow_ref()))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Cursor over the series of `flow` contained in `key`.
    pub fn cursor(
        &self,
        flow: &FlowRef,
        key: &Key,
        detail: DataDetail,
    ) -> Result<SeriesCursor<'_>, SdmxError> {
        let found = self
            .flow(flow)
            .ok_or_else(|| SdmxError::not_found(format!("flow '{flow}'")))?;
        let series = self
            .data_sets
            .get(found.flow_ref())
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(SeriesCursor::new(series, key, detail))
    }

    pub fn into_connection(self) -> RepositoryConnection {
        RepositoryConnection::new(Arc::new(self))
    }
}

/// Accumulates repository content; later entries replace earlier ones with
/// the same reference.
#[derive(Debug, Clone, Default)]
pub struct RepositoryBuilder {
    name: Option<String>,
    structures: Vec<DataStructure>,
    flows: Vec<Dataflow>,
    data_sets: BTreeMap<FlowRef, Vec<Series>>,
    series_keys_only_supported: bool,
}

impl RepositoryBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn structure(mut self, structure: DataStructure) -> Self {
        self.structures
            .retain(|existing| existing.structure_ref() != structure.structure_ref());
        self.structures.push(structure);
        self
    }

    pub fn structures<I: IntoIterator<Item = DataStructure>>(self, structures: I) -> Self {
        structures
            .into_iter()
            .fold(self, |builder, structure| builder.structure(structure))
    }

    pub fn flow(mut self, flow: Dataflow) -> Self {
        self.flows
            .retain(|existing| existing.flow_ref() != flow.flow_ref());
        self.flows.push(flow);
        self
    }

    pub fn flows<I: IntoIterator<Item = Dataflow>>(self, flows: I) -> Self {
        flows.into_iter().fold(self, |builder, flow| builder.flow(flow))
    }

    /// Appends series to the data set of `flow`.
    pub fn data<I: IntoIterator<Item = Series>>(mut self, flow: FlowRef, series: I) -> Self {
        self.data_sets.entry(flow).or_default().extend(series);
        self
    }

    pub fn series_keys_only_supported(mut self, supported: bool) -> Self {
        self.series_keys_only_supported = supported;
        self
    }

    pub fn build(self) -> Result<Repository, ValidationError> {
        let name = self
            .name
            .filter(|name| !name.trim().is_empty())
            .ok_or(ValidationError::MissingField { field: "name" })?;

        Ok(Repository {
            name,
            structures: self.structures,
            flows: self.flows,
            data_sets: self.data_sets,
            series_keys_only_supported: self.series_keys_only_supported,
        })
    }
}

/// [`Connection`] over a shared [`Repository`].
#[derive(Debug, Clone)]
pub struct RepositoryConnection {
    repository: Arc<Repository>,
    closed: bool,
}

impl RepositoryConnection {
    pub fn new(repository: Arc<Repository>) -> Self {
        Self {
            repository,
            closed: false,
        }
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    fn check_open(&self) -> Result<&Repository, SdmxError> {
        if self.closed {
            return Err(SdmxError::illegal_state(format!(
                "connection to '{}' is closed",
                self.repository.name()
            )));
        }
        Ok(&self.repository)
    }
}

impl Connection for RepositoryConnection {
    fn flows(&self) -> Result<Vec<Dataflow>, SdmxError> {
        Ok(self.check_open()?.flows().to_vec())
    }

    fn flow(&self, flow: &FlowRef) -> Result<Dataflow, SdmxError> {
        self.check_open()?
            .flow(flow)
            .cloned()
            .ok_or_else(|| SdmxError::not_found(format!("flow '{flow}'")))
    }

    fn structure(&self, flow: &FlowRef) -> Result<DataStructure, SdmxError> {
        let repository = self.check_open()?;
        let found = self.flow(flow)?;
        repository
            .structure(found.structure_ref())
            .cloned()
            .ok_or_else(|| SdmxError::not_found(format!("structure '{}'", found.structure_ref())))
    }

    fn data(
        &self,
        flow: &FlowRef,
        key: &Key,
        detail: DataDetail,
    ) -> Result<Box<dyn DataCursor + '_>, SdmxError> {
        let cursor = self.check_open()?.cursor(flow, key, detail)?;
        Ok(Box::new(cursor))
    }

    fn is_series_keys_only_supported(&self) -> Result<bool, SdmxError> {
        Ok(self.check_open()?.is_series_keys_only_supported())
    }

    fn close(&mut self) -> Result<(), SdmxError> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Dimension, Frequency, Obs};

    fn repository() -> Repository {
        let structure_ref = StructureRef::parse("NBB,TEST_DSD,1.0").expect("valid");
        let flow_ref = FlowRef::parse("NBB,TEST_DATASET,1.0").expect("valid");
        Repository::builder()
            .name("test")
            .structure(
                DataStructure::builder()
                    .structure_ref(structure_ref.clone())
                    .dimension(Dimension::builder().id("REF_AREA").position(1).build().expect("dim"))
                    .build()
                    .expect("structure"),
            )
            .flow(Dataflow::new(flow_ref.clone(), structure_ref, "Test"))
            .data(
                flow_ref,
                [Series::builder()
                    .key(Key::parse("BE").expect("valid"))
                    .frequency(Frequency::Monthly)
                    .obs(Obs::new(None, Some(1.0)))
                    .build()],
            )
            .build()
            .expect("repository")
    }

    #[test]
    fn finds_flows_through_wildcards() {
        let repository = repository();
        assert!(repository.flow(&FlowRef::parse("TEST_DATASET").expect("valid")).is_some());
        assert!(repository.flow(&FlowRef::parse("ECB,TEST_DATASET").expect("valid")).is_none());
        assert_eq!(repository.series(&FlowRef::parse("NBB,TEST_DATASET").expect("valid")).len(), 1);
    }

    #[test]
    fn connection_resolves_structure_and_reports_missing_flows() {
        let connection = repository().into_connection();
        let structure = connection
            .structure(&FlowRef::parse("NBB,TEST_DATASET").expect("valid"))
            .expect("structure");
        assert_eq!(structure.dimension_ids(), vec!["REF_AREA"]);

        let err = connection
            .flow(&FlowRef::parse("UNKNOWN").expect("valid"))
            .expect_err("missing");
        assert!(err.is_not_found());
    }

    #[test]
    fn closed_connection_is_unusable() {
        let mut connection = repository().into_connection();
        connection.close().expect("close");
        assert!(connection.flows().is_err());
    }

    #[test]
    fn survives_json_round_trip() {
        let repository = repository();
        let json = serde_json::to_string(&repository).expect("serialize");
        let back: Repository = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, repository);
    }

    #[test]
    fn builder_requires_a_name() {
        assert!(Repository::builder().build().is_err());
    }
}
