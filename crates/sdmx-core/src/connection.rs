use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};

use time::PrimitiveDateTime;
use tracing::warn;

use crate::cursor::{collect_series, with_cursor, DataCursor};
use crate::domain::{DataDetail, DataStructure, Dataflow, FlowRef, Frequency, Key, Series};
use crate::SdmxError;

/// Uniform access to one SDMX source, whatever the driver behind it.
pub trait Connection: Send {
    fn flows(&self) -> Result<Vec<Dataflow>, SdmxError>;

    fn flow(&self, flow: &FlowRef) -> Result<Dataflow, SdmxError>;

    /// Data structure of `flow`.
    fn structure(&self, flow: &FlowRef) -> Result<DataStructure, SdmxError>;

    fn data(
        &self,
        flow: &FlowRef,
        key: &Key,
        detail: DataDetail,
    ) -> Result<Box<dyn DataCursor + '_>, SdmxError>;

    fn is_series_keys_only_supported(&self) -> Result<bool, SdmxError>;

    fn close(&mut self) -> Result<(), SdmxError>;

    /// Reads every matching series into memory and closes the cursor.
    fn series(&self, flow: &FlowRef, key: &Key, detail: DataDetail) -> Result<Vec<Series>, SdmxError> {
        with_cursor(self.data(flow, key, detail)?, |cursor| collect_series(cursor))
    }
}

impl std::fmt::Debug for dyn Connection + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

impl<C: Connection + ?Sized> Connection for Box<C> {
    fn flows(&self) -> Result<Vec<Dataflow>, SdmxError> {
        (**self).flows()
    }

    fn flow(&self, flow: &FlowRef) -> Result<Dataflow, SdmxError> {
        (**self).flow(flow)
    }

    fn structure(&self, flow: &FlowRef) -> Result<DataStructure, SdmxError> {
        (**self).structure(flow)
    }

    fn data(
        &self,
        flow: &FlowRef,
        key: &Key,
        detail: DataDetail,
    ) -> Result<Box<dyn DataCursor + '_>, SdmxError> {
        (**self).data(flow, key, detail)
    }

    fn is_series_keys_only_supported(&self) -> Result<bool, SdmxError> {
        (**self).is_series_keys_only_supported()
    }

    fn close(&mut self) -> Result<(), SdmxError> {
        (**self).close()
    }
}

/// Runs `operation`, turning panics and abnormal errors into [`SdmxError::Io`]
/// with the original fault as source.
///
/// Validation, not-found and I/O errors pass through unchanged.
pub fn failsafe<T, F>(operation: &str, f: F) -> Result<T, SdmxError>
where
    F: FnOnce() -> Result<T, SdmxError>,
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(SdmxError::unexpected(panic_message(payload.as_ref()))));

    outcome.map_err(|error| match error {
        SdmxError::IllegalState { .. } | SdmxError::Unexpected { .. } => {
            warn!(operation, error = %error, "unexpected failure normalized");
            SdmxError::io_caused_by(format!("{operation} failed unexpectedly"), error)
        }
        other => other,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| String::from("unknown panic"));
    format!("panic: {detail}")
}

/// Connection wrapper applying [`failsafe`] to every call.
pub struct FailsafeConnection<C> {
    inner: C,
}

impl<C: Connection> FailsafeConnection<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: Connection> Connection for FailsafeConnection<C> {
    fn flows(&self) -> Result<Vec<Dataflow>, SdmxError> {
        failsafe("flows", || self.inner.flows())
    }

    fn flow(&self, flow: &FlowRef) -> Result<Dataflow, SdmxError> {
        failsafe("flow", || self.inner.flow(flow))
    }

    fn structure(&self, flow: &FlowRef) -> Result<DataStructure, SdmxError> {
        failsafe("structure", || self.inner.structure(flow))
    }

    fn data(
        &self,
        flow: &FlowRef,
        key: &Key,
        detail: DataDetail,
    ) -> Result<Box<dyn DataCursor + '_>, SdmxError> {
        let cursor = failsafe("data", || self.inner.data(flow, key, detail))?;
        Ok(Box::new(FailsafeCursor { inner: cursor }))
    }

    fn is_series_keys_only_supported(&self) -> Result<bool, SdmxError> {
        failsafe("is_series_keys_only_supported", || {
            self.inner.is_series_keys_only_supported()
        })
    }

    fn close(&mut self) -> Result<(), SdmxError> {
        let inner = &mut self.inner;
        failsafe("close", || inner.close())
    }
}

/// Cursor wrapper turning decoder panics into I/O errors.
///
/// State violations stay [`SdmxError::IllegalState`] since they are caller
/// bugs, not backend faults.
struct FailsafeCursor<'a> {
    inner: Box<dyn DataCursor + 'a>,
}

fn guard<T>(operation: &str, f: impl FnOnce() -> Result<T, SdmxError>) -> Result<T, SdmxError> {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        let fault = SdmxError::unexpected(panic_message(payload.as_ref()));
        warn!(operation, error = %fault, "cursor panic normalized");
        Err(SdmxError::io_caused_by(
            format!("{operation} failed unexpectedly"),
            fault,
        ))
    })
}

impl DataCursor for FailsafeCursor<'_> {
    fn next_series(&mut self) -> Result<bool, SdmxError> {
        let inner = &mut self.inner;
        guard("next_series", || inner.next_series())
    }

    fn next_obs(&mut self) -> Result<bool, SdmxError> {
        let inner = &mut self.inner;
        guard("next_obs", || inner.next_obs())
    }

    fn series_key(&self) -> Result<&Key, SdmxError> {
        guard("series_key", || self.inner.series_key())
    }

    fn series_frequency(&self) -> Result<Frequency, SdmxError> {
        guard("series_frequency", || self.inner.series_frequency())
    }

    fn series_attributes(&self) -> Result<&BTreeMap<String, String>, SdmxError> {
        guard("series_attributes", || self.inner.series_attributes())
    }

    fn obs_period(&self) -> Result<Option<PrimitiveDateTime>, SdmxError> {
        guard("obs_period", || self.inner.obs_period())
    }

    fn obs_value(&self) -> Result<Option<f64>, SdmxError> {
        guard("obs_value", || self.inner.obs_value())
    }

    fn close(&mut self) -> Result<(), SdmxError> {
        let inner = &mut self.inner;
        guard("close", || inner.close())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SdmxErrorKind;

    #[test]
    fn failsafe_passes_expected_errors_through() {
        let err = failsafe::<(), _>("flows", || Err(SdmxError::not_found("flow 'X'")))
            .expect_err("must fail");
        assert!(err.is_not_found());
    }

    #[test]
    fn failsafe_wraps_abnormal_errors_with_cause() {
        let err = failsafe::<(), _>("structure", || Err(SdmxError::illegal_state("bad")))
            .expect_err("must fail");
        assert_eq!(err.kind(), SdmxErrorKind::Io);
        let source = std::error::Error::source(&err).expect("cause kept");
        assert!(source.to_string().contains("bad"));
    }

    #[test]
    fn failsafe_catches_panics() {
        let err = failsafe::<(), _>("data", || panic!("decoder bug")).expect_err("must fail");
        assert_eq!(err.kind(), SdmxErrorKind::Io);
        let source = std::error::Error::source(&err).expect("cause kept");
        assert!(source.to_string().contains("decoder bug"));
    }
}
