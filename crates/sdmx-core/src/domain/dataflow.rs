use serde::{Deserialize, Serialize};

use crate::domain::{FlowRef, StructureRef};
use crate::ValidationError;

/// Named statistical data set and the structure describing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataflow {
    flow_ref: FlowRef,
    structure_ref: StructureRef,
    label: String,
}

impl Dataflow {
    pub fn new(flow_ref: FlowRef, structure_ref: StructureRef, label: impl Into<String>) -> Self {
        Self {
            flow_ref,
            structure_ref,
            label: label.into(),
        }
    }

    pub fn flow_ref(&self) -> &FlowRef {
        &self.flow_ref
    }

    pub fn structure_ref(&self) -> &StructureRef {
        &self.structure_ref
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Dataflow {
    pub fn builder() -> DataflowBuilder {
        DataflowBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DataflowBuilder {
    flow_ref: Option<FlowRef>,
    structure_ref: Option<StructureRef>,
    label: Option<String>,
}

impl DataflowBuilder {
    pub fn flow_ref(mut self, flow_ref: FlowRef) -> Self {
        self.flow_ref = Some(flow_ref);
        self
    }

    pub fn structure_ref(mut self, structure_ref: StructureRef) -> Self {
        self.structure_ref = Some(structure_ref);
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Label defaults to the flow id.
    pub fn build(self) -> Result<Dataflow, ValidationError> {
        let flow_ref = self
            .flow_ref
            .ok_or(ValidationError::MissingField { field: "flow_ref" })?;
        let structure_ref = self.structure_ref.ok_or(ValidationError::MissingField {
            field: "structure_ref",
        })?;
        let label = self.label.unwrap_or_else(|| flow_ref.id().to_owned());
        Ok(Dataflow::new(flow_ref, structure_ref, label))
    }
}
