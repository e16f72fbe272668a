use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::StructureRef;
use crate::ValidationError;

pub const DEFAULT_TIME_DIMENSION: &str = "TIME_PERIOD";
pub const DEFAULT_PRIMARY_MEASURE: &str = "OBS_VALUE";

/// Dimension ids recognized as carrying the series frequency.
const FREQUENCY_DIMENSIONS: [&str; 2] = ["FREQ", "FREQUENCY"];

/// One coordinate of a series key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    id: String,
    position: usize,
    label: String,
    /// Code to label pairs in codelist order.
    codes: Vec<(String, String)>,
}

impl Dimension {
    pub fn builder() -> DimensionBuilder {
        DimensionBuilder::default()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// 1-based slot in a flat key.
    pub const fn position(&self) -> usize {
        self.position
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Allowed codes with their labels, in publisher order.
    pub fn codes(&self) -> &[(String, String)] {
        &self.codes
    }

    pub fn code_label(&self, code: &str) -> Option<&str> {
        self.codes
            .iter()
            .find(|(id, _)| id == code)
            .map(|(_, label)| label.as_str())
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.code_label(code).is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DimensionBuilder {
    id: Option<String>,
    position: Option<usize>,
    label: Option<String>,
    codes: Vec<(String, String)>,
}

impl DimensionBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn position(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Appends a code; a repeated code keeps its first slot and takes the new label.
    pub fn code(mut self, code: impl Into<String>, label: impl Into<String>) -> Self {
        self.push_code(code.into(), label.into());
        self
    }

    pub fn codes<I, K, V>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (code, label) in codes {
            self.push_code(code.into(), label.into());
        }
        self
    }

    fn push_code(&mut self, code: String, label: String) {
        match self.codes.iter_mut().find(|(id, _)| *id == code) {
            Some(entry) => entry.1 = label,
            None => self.codes.push((code, label)),
        }
    }

    pub fn build(self) -> Result<Dimension, ValidationError> {
        let id = self
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or(ValidationError::MissingField { field: "id" })?;
        let position = self
            .position
            .filter(|position| *position > 0)
            .ok_or(ValidationError::MissingField { field: "position" })?;
        let label = self.label.unwrap_or_else(|| id.clone());

        Ok(Dimension {
            id,
            position,
            label,
            codes: self.codes,
        })
    }
}

/// Data structure definition: ordered dimensions plus time and measure ids.
///
/// Dimension positions always form the contiguous range `1..=N`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataStructure {
    structure_ref: StructureRef,
    label: String,
    dimensions: Vec<Dimension>,
    time_dimension_id: String,
    primary_measure_id: String,
}

impl DataStructure {
    pub fn builder() -> DataStructureBuilder {
        DataStructureBuilder::default()
    }

    pub fn structure_ref(&self) -> &StructureRef {
        &self.structure_ref
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Dimensions sorted by position.
    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn dimension(&self, id: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|dimension| dimension.id == id)
    }

    pub fn dimension_ids(&self) -> Vec<&str> {
        self.dimensions.iter().map(Dimension::id).collect()
    }

    pub fn time_dimension_id(&self) -> &str {
        &self.time_dimension_id
    }

    pub fn primary_measure_id(&self) -> &str {
        &self.primary_measure_id
    }

    /// 0-based key slot of the `FREQ`/`FREQUENCY` dimension.
    pub fn frequency_dimension_index(&self) -> Option<usize> {
        self.dimensions
            .iter()
            .position(|dimension| FREQUENCY_DIMENSIONS.contains(&dimension.id.as_str()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct DataStructureBuilder {
    structure_ref: Option<StructureRef>,
    label: Option<String>,
    dimensions: Vec<Dimension>,
    time_dimension_id: Option<String>,
    primary_measure_id: Option<String>,
}

impl DataStructureBuilder {
    pub fn structure_ref(mut self, structure_ref: StructureRef) -> Self {
        self.structure_ref = Some(structure_ref);
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn dimension(mut self, dimension: Dimension) -> Self {
        self.dimensions.push(dimension);
        self
    }

    pub fn dimensions<I>(mut self, dimensions: I) -> Self
    where
        I: IntoIterator<Item = Dimension>,
    {
        self.dimensions.extend(dimensions);
        self
    }

    pub fn time_dimension_id(mut self, id: impl Into<String>) -> Self {
        self.time_dimension_id = Some(id.into());
        self
    }

    pub fn primary_measure_id(mut self, id: impl Into<String>) -> Self {
        self.primary_measure_id = Some(id.into());
        self
    }

    pub fn build(mut self) -> Result<DataStructure, ValidationError> {
        let structure_ref = self
            .structure_ref
            .ok_or(ValidationError::MissingField {
                field: "structure_ref",
            })?;
        let invalid = |reason: String| ValidationError::InvalidStructure {
            structure: structure_ref.to_string(),
            reason,
        };

        self.dimensions.sort_by_key(Dimension::position);

        let mut ids = HashSet::with_capacity(self.dimensions.len());
        for (index, dimension) in self.dimensions.iter().enumerate() {
            if dimension.position != index + 1 {
                return Err(invalid(format!(
                    "dimension positions must be contiguous from 1, found {} at slot {}",
                    dimension.position,
                    index + 1
                )));
            }
            if !ids.insert(dimension.id.as_str()) {
                return Err(invalid(format!("duplicate dimension '{}'", dimension.id)));
            }
        }

        let label = self
            .label
            .unwrap_or_else(|| structure_ref.id().to_owned());

        Ok(DataStructure {
            structure_ref,
            label,
            dimensions: self.dimensions,
            time_dimension_id: self
                .time_dimension_id
                .unwrap_or_else(|| String::from(DEFAULT_TIME_DIMENSION)),
            primary_measure_id: self
                .primary_measure_id
                .unwrap_or_else(|| String::from(DEFAULT_PRIMARY_MEASURE)),
        })
    }
}
