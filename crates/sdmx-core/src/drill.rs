//! Conversion between tree navigation paths and series keys.
//!
//! A drill path lists dimension values level by level, in a caller chosen
//! dimension order. Its key has those values in their structure slots and
//! wildcards elsewhere.

use std::collections::HashSet;

use crate::domain::{DataStructure, Key};
use crate::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrillPath {
    /// Key slot of each drill level.
    slots: Vec<usize>,
    dimension_ids: Vec<String>,
}

impl DrillPath {
    /// `drill_order` names the first levels; dimensions it omits follow in
    /// structure order.
    pub fn new(structure: &DataStructure, drill_order: &[&str]) -> Result<Self, ValidationError> {
        let ids = structure.dimension_ids();
        let invalid = |reason: String| ValidationError::InvalidStructure {
            structure: structure.structure_ref().to_string(),
            reason,
        };

        let mut seen = HashSet::new();
        let mut slots = Vec::with_capacity(ids.len());
        for id in drill_order {
            let slot = ids
                .iter()
                .position(|candidate| candidate == id)
                .ok_or_else(|| invalid(format!("unknown drill dimension '{id}'")))?;
            if !seen.insert(slot) {
                return Err(invalid(format!("drill dimension '{id}' listed twice")));
            }
            slots.push(slot);
        }
        slots.extend((0..ids.len()).filter(|slot| !seen.contains(slot)));

        let dimension_ids = slots.iter().map(|slot| ids[*slot].to_owned()).collect();
        Ok(Self {
            slots,
            dimension_ids,
        })
    }

    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    /// Dimension ids in drill order.
    pub fn dimension_ids(&self) -> &[String] {
        &self.dimension_ids
    }

    /// `true` when `path` selects single series.
    pub fn is_leaf<S: AsRef<str>>(&self, path: &[S]) -> bool {
        path.len() == self.depth()
    }

    pub fn to_key<S: AsRef<str>>(&self, path: &[S]) -> Result<Key, ValidationError> {
        if path.len() > self.depth() {
            return Err(ValidationError::InvalidKey {
                value: join(path),
                reason: format!("path deeper than the {} drill levels", self.depth()),
            });
        }
        if path.is_empty() {
            return Ok(Key::ALL);
        }

        let mut items = vec![String::new(); self.depth()];
        for (level, value) in path.iter().enumerate() {
            let value = value.as_ref().trim();
            if value.is_empty() {
                return Err(ValidationError::InvalidKey {
                    value: join(path),
                    reason: format!("empty value at level {level}"),
                });
            }
            items[self.slots[level]] = value.to_owned();
        }
        Ok(Key::of(items))
    }

    /// Values of `key` in drill order, up to the first wildcard.
    pub fn to_path(&self, key: &Key) -> Result<Vec<String>, ValidationError> {
        if key.is_all() {
            return Ok(Vec::new());
        }
        if key.size() != self.depth() {
            return Err(ValidationError::InvalidKey {
                value: key.to_string(),
                reason: format!("expected {} dimensions, got {}", self.depth(), key.size()),
            });
        }

        let values: Vec<&str> = self
            .slots
            .iter()
            .map(|slot| key.get(*slot).unwrap_or_default())
            .collect();
        let prefix = values.iter().take_while(|value| !value.is_empty()).count();
        if values[prefix..].iter().any(|value| !value.is_empty()) {
            return Err(ValidationError::InvalidKey {
                value: key.to_string(),
                reason: String::from("wildcards do not form a drill suffix"),
            });
        }
        Ok(values[..prefix].iter().map(|value| (*value).to_owned()).collect())
    }
}

fn join<S: AsRef<str>>(path: &[S]) -> String {
    path.iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Dimension, StructureRef};

    fn structure() -> DataStructure {
        let dimension = |id: &str, position| {
            Dimension::builder()
                .id(id)
                .position(position)
                .build()
                .expect("valid dimension")
        };
        DataStructure::builder()
            .structure_ref(StructureRef::parse("TEST,DSD,1.0").expect("valid"))
            .dimension(dimension("FREQ", 1))
            .dimension(dimension("REF_AREA", 2))
            .dimension(dimension("SECTOR", 3))
            .build()
            .expect("valid structure")
    }

    #[test]
    fn maps_paths_to_keys_and_back() {
        let drill = DrillPath::new(&structure(), &["REF_AREA", "FREQ"]).expect("valid order");
        assert_eq!(drill.dimension_ids(), ["REF_AREA", "FREQ", "SECTOR"]);

        let key = drill.to_key(&["BE", "M"]).expect("valid path");
        assert_eq!(key.to_string(), "M.BE.");
        assert_eq!(drill.to_path(&key).expect("prefix"), vec!["BE", "M"]);

        assert_eq!(drill.to_key::<&str>(&[]).expect("root"), Key::ALL);
        assert!(drill.is_leaf(&["BE", "M", "S1"]));
    }

    #[test]
    fn rejects_non_prefix_keys_and_unknown_dimensions() {
        let drill = DrillPath::new(&structure(), &["REF_AREA"]).expect("valid order");
        let holed = Key::parse("M..S1").expect("valid key");
        assert!(drill.to_path(&holed).is_err());
        assert!(drill.to_key(&["BE", "M", "S1", "X"]).is_err());

        assert!(DrillPath::new(&structure(), &["UNKNOWN"]).is_err());
        assert!(DrillPath::new(&structure(), &["FREQ", "FREQ"]).is_err());
    }
}
