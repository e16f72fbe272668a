//! Streaming decoders for generic and compact data messages.
//!
//! All four dialects share one state machine; they only differ in where the
//! series key, the period and the value are read from.

use std::collections::BTreeMap;
use std::io::BufRead;

use time::PrimitiveDateTime;
use tracing::debug;

use crate::cursor::{CursorState, DataCursor};
use crate::domain::{DataStructure, Frequency, Key, KeyBuilder};
use crate::period::{parse_frequency, parse_time_format, PeriodParser};
use crate::xml::probe::DataType;
use crate::xml::stream::{attr, Tok, XmlStream};
use crate::SdmxError;

const TIME_FORMAT: &str = "TIME_FORMAT";

type CloseHook = Box<dyn FnOnce() -> Result<(), SdmxError> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Generic,
    Compact,
}

/// Forward-only cursor over a data message.
pub struct XmlDataCursor<R> {
    stream: Option<XmlStream<R>>,
    data_type: DataType,
    state: CursorState,
    keys: KeyBuilder,
    frequency_index: Option<usize>,
    time_dimension_id: String,
    primary_measure_id: String,
    key: Key,
    frequency: Frequency,
    attributes: BTreeMap<String, String>,
    parser: PeriodParser,
    in_series: bool,
    pending_obs: bool,
    period: Option<PrimitiveDateTime>,
    value: Option<f64>,
    on_close: Option<CloseHook>,
}

impl<R: BufRead> XmlDataCursor<R> {
    pub fn new(source: R, data_type: DataType, structure: &DataStructure) -> Self {
        Self {
            stream: Some(XmlStream::new(source)),
            data_type,
            state: CursorState::Unstarted,
            keys: KeyBuilder::from_structure(structure),
            frequency_index: structure.frequency_dimension_index(),
            time_dimension_id: structure.time_dimension_id().to_owned(),
            primary_measure_id: structure.primary_measure_id().to_owned(),
            key: Key::ALL,
            frequency: Frequency::Undefined,
            attributes: BTreeMap::new(),
            parser: PeriodParser::new(Frequency::Undefined),
            in_series: false,
            pending_obs: false,
            period: None,
            value: None,
            on_close: None,
        }
    }

    pub fn generic_data_20(source: R, structure: &DataStructure) -> Self {
        Self::new(source, DataType::GenericData20, structure)
    }

    pub fn generic_data_21(source: R, structure: &DataStructure) -> Self {
        Self::new(source, DataType::GenericData21, structure)
    }

    pub fn compact_data_20(source: R, structure: &DataStructure) -> Self {
        Self::new(source, DataType::CompactData20, structure)
    }

    pub fn compact_data_21(source: R, structure: &DataStructure) -> Self {
        Self::new(source, DataType::CompactData21, structure)
    }

    /// Registers a callback run once when the cursor is closed.
    pub fn on_close<F>(mut self, hook: F) -> Self
    where
        F: FnOnce() -> Result<(), SdmxError> + Send + 'static,
    {
        self.on_close = Some(Box::new(hook));
        self
    }

    pub const fn data_type(&self) -> DataType {
        self.data_type
    }

    const fn layout(&self) -> Layout {
        match self.data_type {
            DataType::GenericData20 | DataType::GenericData21 => Layout::Generic,
            DataType::CompactData20 | DataType::CompactData21 => Layout::Compact,
        }
    }

    const fn is_v20(&self) -> bool {
        matches!(
            self.data_type,
            DataType::GenericData20 | DataType::CompactData20
        )
    }

    fn stream(&mut self) -> Result<&mut XmlStream<R>, SdmxError> {
        self.stream
            .as_mut()
            .ok_or_else(|| SdmxError::illegal_state("cursor is closed"))
    }

    fn skip_rest_of_series(&mut self) -> Result<(), SdmxError> {
        if self.pending_obs {
            self.pending_obs = false;
            self.stream()?.skip_element()?;
        }
        let stream = self.stream()?;
        loop {
            match stream.next()? {
                Tok::Start { .. } => stream.skip_element()?,
                Tok::End { .. } => break,
                Tok::Text(_) => {}
                Tok::Eof => return Err(premature_eof()),
            }
        }
        self.in_series = false;
        Ok(())
    }

    fn read_series_header(&mut self, attrs: Vec<(String, String)>) -> Result<(), SdmxError> {
        self.keys.clear();
        self.attributes.clear();
        self.in_series = true;
        self.pending_obs = false;

        match self.layout() {
            Layout::Compact => {
                for (name, value) in attrs {
                    if !self.keys.put(&name, &value) {
                        self.attributes.insert(name, value);
                    }
                }
            }
            Layout::Generic => {
                let id_attr = if self.is_v20() { "concept" } else { "id" };
                let stream = self.stream()?;
                let mut key_values = Vec::new();
                let mut attribute_values = Vec::new();
                let mut series_ended = false;
                loop {
                    match stream.next()? {
                        Tok::Start { name, .. } if name == "SeriesKey" => {
                            key_values = read_values(stream, id_attr)?;
                        }
                        Tok::Start { name, .. } if name == "Attributes" => {
                            attribute_values = read_values(stream, id_attr)?;
                        }
                        Tok::Start { name, .. } if name == "Obs" => break,
                        Tok::Start { .. } => stream.skip_element()?,
                        Tok::End { .. } => {
                            series_ended = true;
                            break;
                        }
                        Tok::Text(_) => {}
                        Tok::Eof => return Err(premature_eof()),
                    }
                }
                for (id, value) in key_values {
                    self.keys.put(&id, &value);
                }
                self.attributes.extend(attribute_values);
                self.in_series = !series_ended;
                self.pending_obs = !series_ended;
            }
        }

        self.key = self.keys.build();
        self.frequency = self.resolve_frequency();
        self.parser = PeriodParser::new(self.frequency);
        Ok(())
    }

    fn resolve_frequency(&self) -> Frequency {
        if let Some(index) = self.frequency_index {
            return parse_frequency(self.key.get(index).unwrap_or_default());
        }
        if self.is_v20() {
            return self
                .attributes
                .get(TIME_FORMAT)
                .map(String::as_str)
                .map(parse_time_format)
                .unwrap_or_default();
        }
        Frequency::Undefined
    }

    /// Attributes of the next `Obs` start, `None` at the end of the series.
    fn seek_obs(&mut self) -> Result<Option<Vec<(String, String)>>, SdmxError> {
        if self.pending_obs {
            self.pending_obs = false;
            return Ok(Some(Vec::new()));
        }
        let stream = self.stream()?;
        loop {
            match stream.next()? {
                Tok::Start { name, attrs, .. } if name == "Obs" => return Ok(Some(attrs)),
                Tok::Start { .. } => stream.skip_element()?,
                Tok::End { .. } => {
                    self.in_series = false;
                    return Ok(None);
                }
                Tok::Text(_) => {}
                Tok::Eof => return Err(premature_eof()),
            }
        }
    }

    fn read_generic_obs(&mut self) -> Result<(Option<String>, Option<String>), SdmxError> {
        let stream = self.stream()?;
        let mut period = None;
        let mut value = None;
        loop {
            match stream.next()? {
                Tok::Start { name, attrs, .. } => match name.as_str() {
                    "Time" => period = Some(stream.read_text()?),
                    "ObsDimension" => {
                        period = attr(&attrs, "value").map(str::to_owned);
                        stream.skip_element()?;
                    }
                    "ObsValue" => {
                        value = attr(&attrs, "value").map(str::to_owned);
                        stream.skip_element()?;
                    }
                    _ => stream.skip_element()?,
                },
                Tok::End { .. } => return Ok((period, value)),
                Tok::Text(_) => {}
                Tok::Eof => return Err(premature_eof()),
            }
        }
    }

    fn read_compact_obs(
        &mut self,
        attrs: &[(String, String)],
    ) -> Result<(Option<String>, Option<String>), SdmxError> {
        let period = attr(attrs, &self.time_dimension_id).map(str::to_owned);
        let value = attr(attrs, &self.primary_measure_id).map(str::to_owned);
        self.stream()?.skip_element()?;
        Ok((period, value))
    }
}

fn read_values<R: BufRead>(
    stream: &mut XmlStream<R>,
    id_attr: &str,
) -> Result<Vec<(String, String)>, SdmxError> {
    let mut values = Vec::new();
    loop {
        match stream.next()? {
            Tok::Start { name, attrs, .. } => {
                if name == "Value" {
                    if let (Some(id), Some(value)) = (attr(&attrs, id_attr), attr(&attrs, "value")) {
                        values.push((id.to_owned(), value.to_owned()));
                    }
                }
                stream.skip_element()?;
            }
            Tok::End { .. } => return Ok(values),
            Tok::Text(_) => {}
            Tok::Eof => return Err(premature_eof()),
        }
    }
}

fn parse_value(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|value| !value.is_nan())
}

fn premature_eof() -> SdmxError {
    SdmxError::io("premature end of data message")
}

impl<R: BufRead> DataCursor for XmlDataCursor<R> {
    fn next_series(&mut self) -> Result<bool, SdmxError> {
        self.state.check_open()?;
        if self.state == CursorState::Exhausted {
            return Ok(false);
        }
        if self.in_series {
            self.skip_rest_of_series()?;
        }

        loop {
            let tok = self.stream()?.next()?;
            match tok {
                Tok::Start { name, attrs, .. } => match name.as_str() {
                    "Series" => {
                        self.read_series_header(attrs)?;
                        self.state = CursorState::OnSeries;
                        return Ok(true);
                    }
                    "Header" | "Group" => self.stream()?.skip_element()?,
                    _ => {}
                },
                Tok::Eof => {
                    self.state = CursorState::Exhausted;
                    return Ok(false);
                }
                Tok::End { .. } | Tok::Text(_) => {}
            }
        }
    }

    fn next_obs(&mut self) -> Result<bool, SdmxError> {
        self.state.check_series()?;
        if !self.in_series {
            self.state = CursorState::OnSeries;
            return Ok(false);
        }

        let Some(attrs) = self.seek_obs()? else {
            self.state = CursorState::OnSeries;
            return Ok(false);
        };
        let (period, value) = match self.layout() {
            Layout::Generic => self.read_generic_obs()?,
            Layout::Compact => self.read_compact_obs(&attrs)?,
        };
        self.period = period.and_then(|text| self.parser.parse(text.trim()));
        self.value = value.as_deref().and_then(parse_value);
        self.state = CursorState::OnObs;
        Ok(true)
    }

    fn series_key(&self) -> Result<&Key, SdmxError> {
        self.state.check_series()?;
        Ok(&self.key)
    }

    fn series_frequency(&self) -> Result<Frequency, SdmxError> {
        self.state.check_series()?;
        Ok(self.frequency)
    }

    fn series_attributes(&self) -> Result<&BTreeMap<String, String>, SdmxError> {
        self.state.check_series()?;
        Ok(&self.attributes)
    }

    fn obs_period(&self) -> Result<Option<PrimitiveDateTime>, SdmxError> {
        self.state.check_obs()?;
        Ok(self.period)
    }

    fn obs_value(&self) -> Result<Option<f64>, SdmxError> {
        self.state.check_obs()?;
        Ok(self.value)
    }

    fn close(&mut self) -> Result<(), SdmxError> {
        if self.state == CursorState::Closed {
            return Ok(());
        }
        self.state = CursorState::Closed;
        self.stream = None;
        match self.on_close.take() {
            Some(hook) => hook(),
            None => Ok(()),
        }
    }
}

impl<R> Drop for XmlDataCursor<R> {
    fn drop(&mut self) {
        if self.state == CursorState::Closed {
            return;
        }
        self.stream = None;
        if let Some(hook) = self.on_close.take() {
            if let Err(error) = hook() {
                debug!(error = %error, data_type = %self.data_type, "cursor close failed on drop");
            }
        }
    }
}

/// Opens the decoder matching `data_type`.
pub fn open_data_cursor<R: BufRead>(
    source: R,
    data_type: DataType,
    structure: &DataStructure,
) -> XmlDataCursor<R> {
    XmlDataCursor::new(source, data_type, structure)
}
