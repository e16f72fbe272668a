//! SDMX-ML decoding: token stream, dialect probe, data and structure
//! decoders, source descriptors.

pub mod data;
pub mod probe;
pub mod sources;
pub mod stream;
pub mod structure;

pub use data::{open_data_cursor, XmlDataCursor};
pub use probe::{probe_data_type, DataType, SchemaVersion};
pub use sources::read_sources;
pub use structure::{decode_structures, StructureDocument};
