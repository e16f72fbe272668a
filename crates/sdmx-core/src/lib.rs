//! # SDMX Core
//!
//! Dialect-agnostic access engine for SDMX (Statistical Data and Metadata
//! eXchange) sources.
//!
//! ## Overview
//!
//! - **Canonical data model** for flows, structures, keys and series
//! - **Streaming decoders** for generic and compact data, SDMX-ML 2.0 and 2.1
//! - **Frequency/period codec** tolerant of the SDMX period notations
//! - **Driver registry** resolving source names and URIs to connections
//! - **Web, file and in-memory drivers** behind one `Connection` contract
//! - **Caches and failsafe wrappers** around remote calls
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | TTL, no-op, verbose and file caches |
//! | [`connection`] | Connection contract and failsafe wrapper |
//! | [`cursor`] | Series/observation cursor contract |
//! | [`domain`] | Refs, keys, structures, series |
//! | [`drill`] | Drill path to key conversion |
//! | [`driver`] | Driver SPI and source descriptors |
//! | [`drivers`] | File and in-memory drivers |
//! | [`error`] | Validation and engine errors |
//! | [`http_client`] | Blocking HTTP transport |
//! | [`manager`] | Driver and source registry |
//! | [`period`] | Frequency codes and period parsing |
//! | [`repository`] | In-memory repository |
//! | [`retry`] | Backoff and retry policy |
//! | [`web`] | REST queries and web clients |
//! | [`xml`] | SDMX-ML decoders |
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  SdmxManager    │  name / URI
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Driver          │────▶│ Cache            │
//! │ (web/file/mem)  │     │ (ttl/file/noop)  │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Connection      │────▶│ HTTP Client      │
//! │ (failsafe)      │     │ (reqwest/static) │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ DataCursor      │
//! │ (xml / memory)  │
//! └─────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sdmx_core::{Connection, DataDetail, FlowRef, Key, SdmxManager};
//!
//! let manager = SdmxManager::builder().with_default_drivers().with_env().build()?;
//! let connection = manager.get_connection("ECB")?;
//! let flow = FlowRef::parse("ECB,EXR,1.0")?;
//! for series in connection.series(&flow, &Key::parse("M.USD.EUR.SP00.A")?, DataDetail::Full)? {
//!     println!("{} has {} observations", series.key(), series.obs().len());
//! }
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use sdmx_core::{SdmxError, SdmxErrorKind};
//!
//! fn handle_error(error: SdmxError) {
//!     match error.kind() {
//!         SdmxErrorKind::NotFound => {
//!             // Try another source
//!         }
//!         SdmxErrorKind::InvalidArgument => {
//!             // Report to user
//!         }
//!         _ => {}
//!     }
//! }
//! ```

pub mod cache;
pub mod connection;
pub mod cursor;
pub mod domain;
pub mod drill;
pub mod driver;
pub mod drivers;
pub mod error;
pub mod http_client;
pub mod manager;
pub mod period;
pub mod repository;
pub mod retry;
pub mod web;
pub mod xml;

// Caching
pub use cache::{Cache, FileCache, NoopCache, TtlCache, VerboseCache};

// Connections and cursors
pub use connection::{failsafe, Connection, FailsafeConnection};
pub use cursor::{collect_series, with_cursor, DataCursor, KeysOnlyCursor, SeriesCursor};

// Domain models
pub use domain::{
    DataDetail, DataStructure, DataStructureBuilder, Dataflow, DataflowBuilder, Dimension,
    DimensionBuilder, FlowRef, Frequency, Key, KeyBuilder, Languages, Obs, Series, SeriesBuilder,
    StructureRef,
};

// Drivers
pub use drill::DrillPath;
pub use driver::{Driver, DriverContext, SdmxSource, SdmxSourceBuilder};
pub use drivers::{default_drivers, FileDriver, MemDriver};
pub use manager::{SdmxManager, SdmxManagerBuilder};
pub use repository::{Repository, RepositoryBuilder, RepositoryConnection};

// Errors
pub use error::{BoxError, SdmxError, SdmxErrorKind, ValidationError};

// Transport
pub use http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient, StaticHttpClient};
pub use retry::{Backoff, RetryConfig};

// Codecs
pub use period::{parse_frequency, parse_time_format, PeriodParser};
pub use web::{RestClient, RestDialect, RestQueryBuilder, WebClient, WebDriver};
pub use xml::{decode_structures, probe_data_type, read_sources, DataType};
