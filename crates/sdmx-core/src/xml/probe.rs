use std::fmt::{Display, Formatter};
use std::io::BufRead;

use serde::{Deserialize, Serialize};

use crate::xml::stream::{Tok, XmlStream};
use crate::SdmxError;

pub const NS_V10_MESSAGE: &str = "http://www.SDMX.org/resources/SDMXML/schemas/v1_0/message";
pub const NS_V20_MESSAGE: &str = "http://www.SDMX.org/resources/SDMXML/schemas/v2_0/message";
pub const NS_V21_MESSAGE: &str = "http://www.sdmx.org/resources/sdmxml/schemas/v2_1/message";

/// SDMX-ML schema generation of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaVersion {
    V10,
    V20,
    V21,
}

impl SchemaVersion {
    /// Recognizes message namespaces, ignoring case.
    pub fn from_namespace(namespace: &str) -> Option<Self> {
        [
            (NS_V10_MESSAGE, Self::V10),
            (NS_V20_MESSAGE, Self::V20),
            (NS_V21_MESSAGE, Self::V21),
        ]
        .into_iter()
        .find(|(uri, _)| uri.eq_ignore_ascii_case(namespace))
        .map(|(_, version)| version)
    }
}

/// Wire layout of a data message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    GenericData20,
    GenericData21,
    CompactData20,
    CompactData21,
}

impl Display for DataType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::GenericData20 => "generic data 2.0",
            Self::GenericData21 => "generic data 2.1",
            Self::CompactData20 => "compact data 2.0",
            Self::CompactData21 => "compact data 2.1",
        };
        f.write_str(text)
    }
}

/// Root element of a message: local name plus schema version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Root {
    pub name: String,
    pub version: SchemaVersion,
}

/// Reads tokens up to the root element only.
pub fn probe_root<R: BufRead>(stream: &mut XmlStream<R>) -> Result<Root, SdmxError> {
    loop {
        match stream.next()? {
            Tok::Start {
                name, namespace, ..
            } => {
                let version = namespace
                    .as_deref()
                    .and_then(SchemaVersion::from_namespace)
                    .ok_or_else(|| {
                        SdmxError::io(format!(
                            "root element '{name}' is not in a known SDMX-ML message namespace"
                        ))
                    })?;
                return Ok(Root { name, version });
            }
            Tok::Eof => return Err(SdmxError::io("empty xml document")),
            Tok::End { .. } | Tok::Text(_) => {}
        }
    }
}

/// Detects the data dialect of a message without reading past its root.
pub fn probe_data_type<R: BufRead>(source: R) -> Result<DataType, SdmxError> {
    let mut stream = XmlStream::new(source);
    let root = probe_root(&mut stream)?;
    match (root.version, root.name.as_str()) {
        (SchemaVersion::V20, "GenericData") => Ok(DataType::GenericData20),
        (SchemaVersion::V20, "CompactData") => Ok(DataType::CompactData20),
        (SchemaVersion::V21, "GenericData" | "GenericTimeSeriesData") => {
            Ok(DataType::GenericData21)
        }
        (SchemaVersion::V21, "StructureSpecificData" | "StructureSpecificTimeSeriesData") => {
            Ok(DataType::CompactData21)
        }
        (SchemaVersion::V10, name) => Err(SdmxError::io(format!(
            "SDMX-ML 1.0 message '{name}' is not supported"
        ))),
        (_, name) => Err(SdmxError::io(format!(
            "unsupported data message root '{name}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(root: &str, namespace: &str) -> String {
        format!(r#"<?xml version="1.0"?><m:{root} xmlns:m="{namespace}"><m:Header/></m:{root}>"#)
    }

    #[test]
    fn detects_each_dialect() {
        let cases = [
            ("GenericData", NS_V20_MESSAGE, DataType::GenericData20),
            ("CompactData", NS_V20_MESSAGE, DataType::CompactData20),
            ("GenericData", NS_V21_MESSAGE, DataType::GenericData21),
            ("StructureSpecificData", NS_V21_MESSAGE, DataType::CompactData21),
        ];
        for (root, namespace, expected) in cases {
            let xml = message(root, namespace);
            assert_eq!(probe_data_type(xml.as_bytes()).expect("known"), expected);
        }
    }

    #[test]
    fn namespace_match_ignores_case() {
        let xml = message("GenericData", &NS_V21_MESSAGE.to_uppercase());
        assert_eq!(
            probe_data_type(xml.as_bytes()).expect("known"),
            DataType::GenericData21
        );
    }

    #[test]
    fn rejects_v10_and_unknown_roots() {
        let xml = message("CompactData", NS_V10_MESSAGE);
        let err = probe_data_type(xml.as_bytes()).expect_err("1.0");
        assert!(err.to_string().contains("1.0"));

        let xml = message("Structure", NS_V21_MESSAGE);
        assert!(probe_data_type(xml.as_bytes()).is_err());

        assert!(probe_data_type("<html/>".as_bytes()).is_err());
    }
}
