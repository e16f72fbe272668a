use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Agency placeholder matching any maintenance agency.
pub const ALL_AGENCIES: &str = "all";
/// Version placeholder matching the most recent version.
pub const LATEST_VERSION: &str = "latest";

const SEPARATOR: char = ',';

macro_rules! resource_ref {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name {
            agency: String,
            id: String,
            version: String,
        }

        impl $name {
            /// Builds a reference; blank agency and version fall back to their wildcards.
            pub fn of(agency: &str, id: &str, version: &str) -> Result<Self, ValidationError> {
                let (agency, id, version) = normalize(agency, id, version)?;
                Ok(Self { agency, id, version })
            }

            /// Reference to `id` under any agency, latest version.
            pub fn of_id(id: &str) -> Result<Self, ValidationError> {
                Self::of(ALL_AGENCIES, id, LATEST_VERSION)
            }

            /// Parses `id`, `agency,id` or `agency,id,version`.
            pub fn parse(input: &str) -> Result<Self, ValidationError> {
                let (agency, id, version) = split_components(input)?;
                Self::of(agency, id, version)
            }

            pub fn agency(&self) -> &str {
                &self.agency
            }

            pub fn id(&self) -> &str {
                &self.id
            }

            pub fn version(&self) -> &str {
                &self.version
            }

            /// `all` agency and `latest` version on `self` act as wildcards.
            pub fn contains(&self, other: &Self) -> bool {
                (self.agency == ALL_AGENCIES || self.agency == other.agency)
                    && self.id == other.id
                    && (self.version == LATEST_VERSION || self.version == other.version)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{},{},{}", self.agency, self.id, self.version)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Self::parse(value)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = ValidationError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::parse(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.to_string()
            }
        }
    };
}

resource_ref!(
    /// Reference to a dataflow: `agency,id,version`.
    FlowRef
);

resource_ref!(
    /// Reference to a data structure definition: `agency,id,version`.
    StructureRef
);

fn split_components(input: &str) -> Result<(&str, &str, &str), ValidationError> {
    let parts = input.split(SEPARATOR).collect::<Vec<_>>();
    match parts.as_slice() {
        [id] => Ok((ALL_AGENCIES, *id, LATEST_VERSION)),
        [agency, id] => Ok((*agency, *id, LATEST_VERSION)),
        [agency, id, version] => Ok((*agency, *id, *version)),
        _ => Err(ValidationError::InvalidRef {
            value: input.to_owned(),
        }),
    }
}

fn normalize(
    agency: &str,
    id: &str,
    version: &str,
) -> Result<(String, String, String), ValidationError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ValidationError::EmptyRefId {
            value: format!("{agency},{id},{version}"),
        });
    }
    if [agency, id, version].iter().any(|part| part.contains(SEPARATOR)) {
        return Err(ValidationError::InvalidRef {
            value: format!("{agency},{id},{version}"),
        });
    }

    let agency = match agency.trim() {
        "" => ALL_AGENCIES,
        other => other,
    };
    let version = match version.trim() {
        "" => LATEST_VERSION,
        other => other,
    };

    Ok((agency.to_owned(), id.to_owned(), version.to_owned()))
}
