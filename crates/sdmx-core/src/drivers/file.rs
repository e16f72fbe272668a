use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use tracing::debug;

use crate::cache::{get_json, put_json};
use crate::connection::Connection;
use crate::cursor::{collect_series, with_cursor};
use crate::domain::{Dataflow, FlowRef, Languages};
use crate::driver::{uri_params, Driver, DriverContext, SdmxSource};
use crate::repository::Repository;
use crate::xml::{decode_structures, open_data_cursor, probe_data_type};
use crate::{SdmxError, ValidationError};

pub const FILE_DRIVER: &str = "file";
pub const STRUCTURE_PROPERTY: &str = "structure";

const URI_PREFIX: &str = "sdmx:file:";

/// Driver reading a data message plus its structure message from disk.
///
/// The decoded content becomes a one-flow [`Repository`], memoized in the
/// context cache until either file changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileDriver;

impl FileDriver {
    pub fn new() -> Self {
        Self
    }

    /// Decodes `data` with the structure found in `structure`.
    pub fn load(
        &self,
        data: &Path,
        structure: &Path,
        languages: &Languages,
        context: &DriverContext,
    ) -> Result<Repository, SdmxError> {
        let key = format!(
            "sdmx:{FILE_DRIVER}:{}:{}:{}:{}:{languages}",
            data.display(),
            structure.display(),
            fingerprint(data)?,
            fingerprint(structure)?
        );

        if let Some(repository) = get_json::<Repository>(context.cache.as_ref(), &key) {
            debug!(data = %data.display(), "repository served from cache");
            return Ok(repository);
        }

        let repository = decode_files(data, structure, languages)?;
        put_json(context.cache.as_ref(), &key, &repository, context.cache_ttl);
        Ok(repository)
    }
}

impl Driver for FileDriver {
    fn name(&self) -> &str {
        FILE_DRIVER
    }

    fn connect(
        &self,
        source: &SdmxSource,
        languages: &Languages,
        context: &DriverContext,
    ) -> Result<Box<dyn Connection>, SdmxError> {
        if source.endpoint().trim().is_empty() {
            return Err(ValidationError::MissingField { field: "endpoint" }.into());
        }
        let structure = source
            .property(STRUCTURE_PROPERTY)
            .ok_or(ValidationError::MissingField {
                field: STRUCTURE_PROPERTY,
            })?;

        let repository = self.load(
            Path::new(source.endpoint().trim()),
            Path::new(structure.trim()),
            languages,
            context,
        )?;
        Ok(Box::new(repository.into_connection()))
    }

    fn default_sources(&self) -> Vec<SdmxSource> {
        Vec::new()
    }

    fn supported_properties(&self) -> Vec<&'static str> {
        vec![STRUCTURE_PROPERTY]
    }

    /// Accepts `sdmx:file:?data=<path>&structure=<path>`.
    fn accepts_uri(&self, uri: &str) -> Result<bool, SdmxError> {
        let Some(rest) = uri.strip_prefix(URI_PREFIX) else {
            return Ok(false);
        };
        let params = uri_params(rest.trim_start_matches('?'))?;
        Ok(params.contains_key("data") && params.contains_key(STRUCTURE_PROPERTY))
    }

    fn connect_uri(
        &self,
        uri: &str,
        languages: &Languages,
        context: &DriverContext,
    ) -> Result<Box<dyn Connection>, SdmxError> {
        let rest = uri.strip_prefix(URI_PREFIX).ok_or_else(|| ValidationError::InvalidUri {
            value: uri.to_owned(),
            reason: format!("expected '{URI_PREFIX}' prefix"),
        })?;
        let params = uri_params(rest.trim_start_matches('?'))?;
        let missing = |name: &str| ValidationError::InvalidUri {
            value: uri.to_owned(),
            reason: format!("missing '{name}' parameter"),
        };
        let data = params.get("data").ok_or_else(|| missing("data"))?;
        let structure = params
            .get(STRUCTURE_PROPERTY)
            .ok_or_else(|| missing(STRUCTURE_PROPERTY))?;

        let source = SdmxSource::builder()
            .name(file_stem(Path::new(data)))
            .driver(FILE_DRIVER)
            .endpoint(data.clone())
            .property(STRUCTURE_PROPERTY, structure.clone())
            .build()?;
        self.connect(&source, languages, context)
    }
}

fn decode_files(data: &Path, structure: &Path, languages: &Languages) -> Result<Repository, SdmxError> {
    let document = decode_structures(open(structure)?, languages)?;
    let dsd = document.structures.into_iter().next().ok_or_else(|| {
        SdmxError::io(format!(
            "no data structure in '{}'",
            structure.display()
        ))
    })?;

    let data_type = probe_data_type(open(data)?)?;
    let series = with_cursor(open_data_cursor(open(data)?, data_type, &dsd), |cursor| {
        collect_series(cursor)
    })?;
    debug!(data = %data.display(), %data_type, series = series.len(), "data file decoded");

    let name = file_stem(data);
    let flow_ref = FlowRef::of(
        dsd.structure_ref().agency(),
        &name,
        dsd.structure_ref().version(),
    )?;
    let flow = Dataflow::new(flow_ref.clone(), dsd.structure_ref().clone(), name.clone());

    Ok(Repository::builder()
        .name(name)
        .structure(dsd)
        .flow(flow)
        .data(flow_ref, series)
        .series_keys_only_supported(true)
        .build()?)
}

fn open(path: &Path) -> Result<BufReader<File>, SdmxError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|error| SdmxError::io_caused_by(format!("cannot open '{}'", path.display()), error))
}

/// `len:mtime_ms` of a file, part of the cache identity.
fn fingerprint(path: &Path) -> Result<String, SdmxError> {
    let metadata = fs::metadata(path)
        .map_err(|error| SdmxError::io_caused_by(format!("cannot stat '{}'", path.display()), error))?;
    let modified = metadata
        .modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    Ok(format!("{}:{modified}", metadata.len()))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| PathBuf::from(path).display().to_string())
}
