//! Forward-only series/observation cursors.
//!
//! A cursor starts before the first series. `next_series` positions it on a
//! series, `next_obs` on an observation of that series. Series accessors are
//! valid on a series or one of its observations, observation accessors only
//! on an observation; anything else is an [`SdmxError::IllegalState`].

mod series;

use std::collections::BTreeMap;

use time::PrimitiveDateTime;
use tracing::warn;

use crate::domain::{Frequency, Key, Obs, Series};
use crate::SdmxError;

pub use series::SeriesCursor;

/// Uniform decoding contract shared by wire decoders and in-memory data.
pub trait DataCursor {
    /// Moves to the next series, skipping unread observations.
    fn next_series(&mut self) -> Result<bool, SdmxError>;

    /// Moves to the next observation of the current series.
    fn next_obs(&mut self) -> Result<bool, SdmxError>;

    fn series_key(&self) -> Result<&Key, SdmxError>;

    fn series_frequency(&self) -> Result<Frequency, SdmxError>;

    fn series_attributes(&self) -> Result<&BTreeMap<String, String>, SdmxError>;

    fn series_attribute(&self, name: &str) -> Result<Option<&str>, SdmxError> {
        Ok(self.series_attributes()?.get(name).map(String::as_str))
    }

    /// `None` when the period is missing or unparsable.
    fn obs_period(&self) -> Result<Option<PrimitiveDateTime>, SdmxError>;

    /// `None` when the value is missing or unparsable.
    fn obs_value(&self) -> Result<Option<f64>, SdmxError>;

    /// Releases the underlying resources. Closing twice is a no-op.
    fn close(&mut self) -> Result<(), SdmxError>;
}

impl<C: DataCursor + ?Sized> DataCursor for Box<C> {
    fn next_series(&mut self) -> Result<bool, SdmxError> {
        (**self).next_series()
    }

    fn next_obs(&mut self) -> Result<bool, SdmxError> {
        (**self).next_obs()
    }

    fn series_key(&self) -> Result<&Key, SdmxError> {
        (**self).series_key()
    }

    fn series_frequency(&self) -> Result<Frequency, SdmxError> {
        (**self).series_frequency()
    }

    fn series_attributes(&self) -> Result<&BTreeMap<String, String>, SdmxError> {
        (**self).series_attributes()
    }

    fn series_attribute(&self, name: &str) -> Result<Option<&str>, SdmxError> {
        (**self).series_attribute(name)
    }

    fn obs_period(&self) -> Result<Option<PrimitiveDateTime>, SdmxError> {
        (**self).obs_period()
    }

    fn obs_value(&self) -> Result<Option<f64>, SdmxError> {
        (**self).obs_value()
    }

    fn close(&mut self) -> Result<(), SdmxError> {
        (**self).close()
    }
}

/// Position of a cursor in its stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorState {
    #[default]
    Unstarted,
    OnSeries,
    OnObs,
    Exhausted,
    Closed,
}

impl CursorState {
    pub fn check_open(self) -> Result<(), SdmxError> {
        match self {
            Self::Closed => Err(SdmxError::illegal_state("cursor is closed")),
            _ => Ok(()),
        }
    }

    pub fn check_series(self) -> Result<(), SdmxError> {
        match self {
            Self::OnSeries | Self::OnObs => Ok(()),
            other => Err(SdmxError::illegal_state(format!(
                "series accessor called while {other:?}"
            ))),
        }
    }

    pub fn check_obs(self) -> Result<(), SdmxError> {
        match self {
            Self::OnObs => Ok(()),
            other => Err(SdmxError::illegal_state(format!(
                "observation accessor called while {other:?}"
            ))),
        }
    }
}

/// Hides observations of the wrapped cursor, for sources answering
/// series-keys-only requests with full data.
pub struct KeysOnlyCursor<C> {
    inner: C,
}

impl<C: DataCursor> KeysOnlyCursor<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

impl<C: DataCursor> DataCursor for KeysOnlyCursor<C> {
    fn next_series(&mut self) -> Result<bool, SdmxError> {
        self.inner.next_series()
    }

    fn next_obs(&mut self) -> Result<bool, SdmxError> {
        self.inner.series_key()?;
        Ok(false)
    }

    fn series_key(&self) -> Result<&Key, SdmxError> {
        self.inner.series_key()
    }

    fn series_frequency(&self) -> Result<Frequency, SdmxError> {
        self.inner.series_frequency()
    }

    fn series_attributes(&self) -> Result<&BTreeMap<String, String>, SdmxError> {
        self.inner.series_attributes()
    }

    fn obs_period(&self) -> Result<Option<PrimitiveDateTime>, SdmxError> {
        Err(SdmxError::illegal_state("observations are hidden"))
    }

    fn obs_value(&self) -> Result<Option<f64>, SdmxError> {
        Err(SdmxError::illegal_state("observations are hidden"))
    }

    fn close(&mut self) -> Result<(), SdmxError> {
        self.inner.close()
    }
}

/// Runs `f` on the cursor and closes it afterwards, whatever `f` returned.
///
/// A close failure is reported only when `f` succeeded; otherwise it is
/// logged and the error from `f` is returned.
pub fn with_cursor<C, T, F>(mut cursor: C, f: F) -> Result<T, SdmxError>
where
    C: DataCursor,
    F: FnOnce(&mut C) -> Result<T, SdmxError>,
{
    let result = f(&mut cursor);
    let closed = cursor.close();
    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close_error)) => Err(close_error),
        (Err(error), Err(close_error)) => {
            warn!(error = %close_error, "cursor close failed after an earlier error");
            Err(error)
        }
        (Err(error), Ok(())) => Err(error),
    }
}

/// Reads every remaining series, observations included.
pub fn collect_series<C>(cursor: &mut C) -> Result<Vec<Series>, SdmxError>
where
    C: DataCursor + ?Sized,
{
    let mut result = Vec::new();
    while cursor.next_series()? {
        let mut builder = Series::builder()
            .key(cursor.series_key()?.clone())
            .frequency(cursor.series_frequency()?)
            .attributes(cursor.series_attributes()?.clone());
        while cursor.next_obs()? {
            builder.push_obs(Obs::new(cursor.obs_period()?, cursor.obs_value()?));
        }
        result.push(builder.build());
    }
    Ok(result)
}
