use std::collections::BTreeMap;

use time::PrimitiveDateTime;

use crate::cursor::{CursorState, DataCursor};
use crate::domain::{DataDetail, Frequency, Key, Series};
use crate::SdmxError;

/// Cursor over already decoded series, skipping those outside a key filter.
#[derive(Debug)]
pub struct SeriesCursor<'a> {
    remaining: std::slice::Iter<'a, Series>,
    filter: Key,
    detail: DataDetail,
    state: CursorState,
    current: Option<&'a Series>,
    obs_index: usize,
}

impl<'a> SeriesCursor<'a> {
    pub fn new(series: &'a [Series], filter: &Key, detail: DataDetail) -> Self {
        Self {
            remaining: series.iter(),
            filter: filter.clone(),
            detail,
            state: CursorState::Unstarted,
            current: None,
            obs_index: 0,
        }
    }

    fn current(&self) -> Result<&'a Series, SdmxError> {
        self.state.check_series()?;
        self.current
            .ok_or_else(|| SdmxError::illegal_state("no current series"))
    }
}

impl DataCursor for SeriesCursor<'_> {
    fn next_series(&mut self) -> Result<bool, SdmxError> {
        self.state.check_open()?;
        let filter = &self.filter;
        self.current = self
            .remaining
            .by_ref()
            .find(|series| filter.contains(series.key()));
        self.obs_index = 0;
        self.state = if self.current.is_some() {
            CursorState::OnSeries
        } else {
            CursorState::Exhausted
        };
        Ok(self.current.is_some())
    }

    fn next_obs(&mut self) -> Result<bool, SdmxError> {
        let series = self.current()?;
        if !self.detail.is_data_needed() {
            return Ok(false);
        }
        if self.state == CursorState::OnObs {
            self.obs_index += 1;
        }
        if self.obs_index < series.obs().len() {
            self.state = CursorState::OnObs;
            Ok(true)
        } else {
            self.obs_index = series.obs().len();
            self.state = CursorState::OnSeries;
            Ok(false)
        }
    }

    fn series_key(&self) -> Result<&Key, SdmxError> {
        Ok(self.current()?.key())
    }

    fn series_frequency(&self) -> Result<Frequency, SdmxError> {
        Ok(self.current()?.frequency())
    }

    fn series_attributes(&self) -> Result<&BTreeMap<String, String>, SdmxError> {
        Ok(self.current()?.attributes())
    }

    fn obs_period(&self) -> Result<Option<PrimitiveDateTime>, SdmxError> {
        self.state.check_obs()?;
        Ok(self.current()?.obs()[self.obs_index].period)
    }

    fn obs_value(&self) -> Result<Option<f64>, SdmxError> {
        self.state.check_obs()?;
        Ok(self.current()?.obs()[self.obs_index].value)
    }

    fn close(&mut self) -> Result<(), SdmxError> {
        self.state = CursorState::Closed;
        self.current = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Obs;

    fn series(key: &str, values: &[f64]) -> Series {
        values
            .iter()
            .fold(
                Series::builder().key(Key::parse(key).expect("valid")),
                |builder, value| builder.obs(Obs::new(None, Some(*value))),
            )
            .build()
    }

    #[test]
    fn filters_by_key_and_reads_observations() {
        let data = vec![series("M.BE", &[1.0, 2.0]), series("A.FR", &[3.0])];
        let mut cursor = SeriesCursor::new(&data, &Key::parse("M.").expect("valid"), DataDetail::Full);

        assert!(cursor.series_key().is_err());
        assert!(cursor.next_series().expect("first"));
        assert_eq!(cursor.series_key().expect("key").to_string(), "M.BE");
        assert!(cursor.obs_value().is_err());
        assert!(cursor.next_obs().expect("obs 1"));
        assert_eq!(cursor.obs_value().expect("value"), Some(1.0));
        assert!(cursor.next_obs().expect("obs 2"));
        assert_eq!(cursor.obs_value().expect("value"), Some(2.0));
        assert!(!cursor.next_obs().expect("end of obs"));
        assert!(!cursor.next_obs().expect("still at end"));
        assert!(!cursor.next_series().expect("filtered out"));
    }

    #[test]
    fn series_keys_only_skips_observations() {
        let data = vec![series("M.BE", &[1.0])];
        let mut cursor = SeriesCursor::new(&data, &Key::ALL, DataDetail::SeriesKeysOnly);
        assert!(cursor.next_series().expect("series"));
        assert!(!cursor.next_obs().expect("hidden"));
    }

    #[test]
    fn closed_cursor_rejects_use_and_closes_twice() {
        let data = vec![series("M.BE", &[1.0])];
        let mut cursor = SeriesCursor::new(&data, &Key::ALL, DataDetail::Full);
        cursor.close().expect("first close");
        cursor.close().expect("second close");
        assert!(cursor.next_series().is_err());
    }
}
