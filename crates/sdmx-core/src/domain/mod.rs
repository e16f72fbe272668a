//! Immutable value types shared by decoders, connections and drivers.

mod dataflow;
mod frequency;
mod key;
mod languages;
mod refs;
mod series;
mod structure;

pub use dataflow::{Dataflow, DataflowBuilder};
pub use frequency::Frequency;
pub use key::{Key, KeyBuilder};
pub use languages::Languages;
pub use refs::{FlowRef, StructureRef, ALL_AGENCIES, LATEST_VERSION};
pub use series::{DataDetail, Obs, Series, SeriesBuilder};
pub use structure::{
    DataStructure, DataStructureBuilder, Dimension, DimensionBuilder, DEFAULT_PRIMARY_MEASURE,
    DEFAULT_TIME_DIMENSION,
};
