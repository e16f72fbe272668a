use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::DataStructure;
use crate::ValidationError;

const ALL_TEXT: &str = "all";
const WILDCARD: &str = "*";
const SEPARATOR: char = '.';

/// Series key aligned on the dimension positions of a structure.
///
/// Empty slots are wildcards; `*` is accepted on input and normalized to an
/// empty slot. [`Key::ALL`] has no slot at all and matches every series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Key(Vec<String>);

impl Key {
    pub const ALL: Self = Self(Vec::new());

    pub fn of<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            items
                .into_iter()
                .map(|item| normalize_item(item.as_ref()))
                .collect(),
        )
    }

    /// Parses a dot-separated key; `all` yields [`Key::ALL`].
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed == ALL_TEXT {
            return Ok(Self::ALL);
        }
        if let Some(index) = trimmed.find(char::is_whitespace) {
            return Err(ValidationError::InvalidKey {
                value: input.to_owned(),
                reason: format!("whitespace at index {index}"),
            });
        }
        Ok(Self::of(trimmed.split(SEPARATOR)))
    }

    pub fn is_all(&self) -> bool {
        self.0.is_empty()
    }

    pub fn size(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn items(&self) -> &[String] {
        &self.0
    }

    pub fn is_wildcard(&self, index: usize) -> bool {
        self.0.get(index).is_some_and(String::is_empty)
    }

    /// `true` when every slot holds a concrete code.
    pub fn is_series(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|item| !item.is_empty())
    }

    /// `true` when `other` is selected by this key.
    pub fn contains(&self, other: &Self) -> bool {
        if self.is_all() {
            return true;
        }
        if self.size() != other.size() {
            return false;
        }
        self.0
            .iter()
            .zip(&other.0)
            .all(|(mine, theirs)| mine.is_empty() || mine == theirs)
    }

    /// Checks slot count and, where a dimension enumerates codes, membership.
    pub fn validate_on(&self, structure: &DataStructure) -> Result<(), ValidationError> {
        if self.is_all() {
            return Ok(());
        }

        let dimensions = structure.dimensions();
        if self.size() != dimensions.len() {
            return Err(ValidationError::InvalidKey {
                value: self.to_string(),
                reason: format!(
                    "expected {} dimensions for '{}', got {}",
                    dimensions.len(),
                    structure.structure_ref(),
                    self.size()
                ),
            });
        }

        for (item, dimension) in self.0.iter().zip(dimensions) {
            if item.is_empty() || dimension.codes().is_empty() {
                continue;
            }
            if !dimension.has_code(item) {
                return Err(ValidationError::InvalidKey {
                    value: self.to_string(),
                    reason: format!("unknown code '{item}' for dimension '{}'", dimension.id()),
                });
            }
        }

        Ok(())
    }
}

fn normalize_item(item: &str) -> String {
    let item = item.trim();
    if item == WILDCARD {
        String::new()
    } else {
        item.to_owned()
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_all() {
            return f.write_str(ALL_TEXT);
        }
        let mut first = true;
        for item in &self.0 {
            if !first {
                write!(f, "{SEPARATOR}")?;
            }
            f.write_str(item)?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for Key {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for Key {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Key> for String {
    fn from(value: Key) -> Self {
        value.to_string()
    }
}

/// Accumulates dimension values received out of order into a [`Key`].
///
/// The id-to-slot index is computed once and shared between clones, so a
/// decoder can reuse one builder for every series of a stream.
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    index: Arc<HashMap<String, usize>>,
    values: Vec<String>,
}

impl KeyBuilder {
    /// Builder over dimension ids given in position order.
    pub fn new<I, S>(dimension_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let index = dimension_ids
            .into_iter()
            .enumerate()
            .map(|(slot, id)| (id.into(), slot))
            .collect::<HashMap<_, _>>();
        let values = vec![String::new(); index.len()];
        Self {
            index: Arc::new(index),
            values,
        }
    }

    pub fn from_structure(structure: &DataStructure) -> Self {
        Self::new(structure.dimension_ids())
    }

    pub fn index_of(&self, dimension_id: &str) -> Option<usize> {
        self.index.get(dimension_id).copied()
    }

    pub fn is_dimension(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Stores `value` when `id` is a dimension; returns whether it was.
    pub fn put(&mut self, id: &str, value: &str) -> bool {
        match self.index.get(id) {
            Some(&slot) => {
                self.values[slot] = normalize_item(value);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.values.iter_mut().for_each(String::clear);
    }

    pub fn build(&self) -> Key {
        Key(self.values.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_displays_keys() {
        let key = Key::parse("M.BE.*").expect("valid key");
        assert_eq!(key.size(), 3);
        assert!(key.is_wildcard(2));
        assert_eq!(key.to_string(), "M.BE.");
        assert_eq!(Key::parse("all").expect("all"), Key::ALL);
        assert_eq!(Key::ALL.to_string(), "all");
    }

    #[test]
    fn wildcard_contains_concrete_key() {
        let filter = Key::parse("M..").expect("valid");
        let series = Key::parse("M.BE.X").expect("valid");
        assert!(filter.contains(&series));
        assert!(!series.contains(&filter));
        assert!(Key::ALL.contains(&series));
        assert!(!Key::parse("A..").expect("valid").contains(&series));
        assert!(!Key::parse("M.").expect("valid").contains(&series));
    }

    #[test]
    fn builder_places_values_by_dimension_id() {
        let mut builder = KeyBuilder::new(["FREQ", "REF_AREA", "SECTOR"]);
        assert!(builder.put("SECTOR", "S1"));
        assert!(builder.put("FREQ", "M"));
        assert!(!builder.put("TITLE", "ignored"));
        assert_eq!(builder.build().to_string(), "M..S1");

        builder.clear();
        builder.put("REF_AREA", "BE");
        assert_eq!(builder.build().to_string(), ".BE.");
    }

    #[test]
    fn rejects_whitespace() {
        let err = Key::parse("M. BE").expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidKey { .. }));
    }
}
