use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;

use crate::domain::{Frequency, Key};

/// Single observation.
///
/// `None` marks a period or value that was missing or could not be parsed;
/// such observations are kept so callers can report them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obs {
    pub period: Option<PrimitiveDateTime>,
    pub value: Option<f64>,
}

impl Obs {
    pub const fn new(period: Option<PrimitiveDateTime>, value: Option<f64>) -> Self {
        Self { period, value }
    }

    pub const fn is_complete(&self) -> bool {
        self.period.is_some() && self.value.is_some()
    }
}

/// Immutable time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    key: Key,
    frequency: Frequency,
    attributes: BTreeMap<String, String>,
    obs: Vec<Obs>,
}

impl Series {
    pub fn builder() -> SeriesBuilder {
        SeriesBuilder::default()
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub const fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Observations in wire order.
    pub fn obs(&self) -> &[Obs] {
        &self.obs
    }
}

/// Accumulates the parts of a [`Series`]; missing key and frequency default
/// to [`Key::ALL`] and [`Frequency::Undefined`].
#[derive(Debug, Clone, Default)]
pub struct SeriesBuilder {
    key: Option<Key>,
    frequency: Frequency,
    attributes: BTreeMap<String, String>,
    obs: Vec<Obs>,
}

impl SeriesBuilder {
    pub fn key(mut self, key: Key) -> Self {
        self.key = Some(key);
        self
    }

    pub fn frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn attributes(mut self, attributes: BTreeMap<String, String>) -> Self {
        self.attributes.extend(attributes);
        self
    }

    pub fn obs(mut self, obs: Obs) -> Self {
        self.obs.push(obs);
        self
    }

    pub fn push_obs(&mut self, obs: Obs) {
        self.obs.push(obs);
    }

    pub fn build(self) -> Series {
        Series {
            key: self.key.unwrap_or(Key::ALL),
            frequency: self.frequency,
            attributes: self.attributes,
            obs: self.obs,
        }
    }
}

/// Amount of content requested by a data query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataDetail {
    /// Keys, attributes and observations.
    #[default]
    Full,
    /// Keys and attributes only.
    SeriesKeysOnly,
}

impl DataDetail {
    /// Value of the REST `detail` parameter.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::SeriesKeysOnly => "serieskeysonly",
        }
    }

    pub const fn is_data_needed(self) -> bool {
        matches!(self, Self::Full)
    }
}

impl Display for DataDetail {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn builder_defaults_to_undefined_frequency() {
        let series = Series::builder()
            .key(Key::parse("M.BE").expect("valid"))
            .attribute("TITLE", "Belgium")
            .obs(Obs::new(Some(datetime!(2010-01-01 0:00)), Some(1.5)))
            .obs(Obs::new(None, Some(2.0)))
            .build();

        assert_eq!(series.frequency(), Frequency::Undefined);
        assert_eq!(series.attribute("TITLE"), Some("Belgium"));
        assert_eq!(series.obs().len(), 2);
        assert!(series.obs()[0].is_complete());
        assert!(!series.obs()[1].is_complete());
    }

    #[test]
    fn series_survives_json_round_trip() {
        let series = Series::builder()
            .key(Key::parse("A.FR").expect("valid"))
            .frequency(Frequency::Annual)
            .obs(Obs::new(Some(datetime!(2001-01-01 0:00)), Some(3.25)))
            .build();

        let json = serde_json::to_string(&series).expect("serialize");
        let back: Series = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, series);
    }
}
