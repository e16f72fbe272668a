use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

const ANY: &str = "*";

/// Language priority list used to pick localized labels.
///
/// Parsed from `Accept-Language` style text; quality weights are dropped and
/// the declared order is the priority order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Languages(Vec<String>);

impl Default for Languages {
    fn default() -> Self {
        Self::any()
    }
}

impl Languages {
    pub fn any() -> Self {
        Self(vec![String::from(ANY)])
    }

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let ranges = input
            .split(',')
            .map(|range| range.split(';').next().unwrap_or_default().trim())
            .filter(|range| !range.is_empty())
            .map(str::to_ascii_lowercase)
            .collect::<Vec<_>>();

        if ranges.is_empty() {
            return Err(ValidationError::InvalidProperty {
                key: String::from("languages"),
                value: input.to_owned(),
            });
        }

        for range in &ranges {
            let valid = range == ANY
                || range
                    .chars()
                    .all(|ch| ch.is_ascii_alphanumeric() || ch == '-');
            if !valid {
                return Err(ValidationError::InvalidProperty {
                    key: String::from("languages"),
                    value: input.to_owned(),
                });
            }
        }

        Ok(Self(ranges))
    }

    pub fn ranges(&self) -> &[String] {
        &self.0
    }

    /// Picks the best localized text out of `(lang, text)` pairs.
    ///
    /// Falls back to the first candidate when no range matches.
    pub fn select<'a>(&self, candidates: &'a [(String, String)]) -> Option<&'a str> {
        for range in &self.0 {
            if range == ANY {
                return candidates.first().map(|(_, text)| text.as_str());
            }
            let found = candidates.iter().find(|(lang, _)| {
                let lang = lang.to_ascii_lowercase();
                lang == *range || lang.split('-').next() == Some(range.as_str())
            });
            if let Some((_, text)) = found {
                return Some(text);
            }
        }
        candidates.first().map(|(_, text)| text.as_str())
    }
}

impl Display for Languages {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join(","))
    }
}

impl FromStr for Languages {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for Languages {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Languages> for String {
    fn from(value: Languages) -> Self {
        value.to_string()
    }
}
