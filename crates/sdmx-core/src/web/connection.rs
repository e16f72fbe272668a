use crate::connection::Connection;
use crate::cursor::{DataCursor, KeysOnlyCursor};
use crate::domain::{DataDetail, DataStructure, Dataflow, FlowRef, Key};
use crate::web::client::WebClient;
use crate::SdmxError;

/// [`Connection`] backed by a [`WebClient`].
///
/// Keys are validated against the flow structure before any data request.
/// When the source cannot answer series-keys-only queries, a full query is
/// issued and observations are hidden.
pub struct WebConnection<C> {
    client: C,
    closed: bool,
}

impl<C: WebClient> WebConnection<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            closed: false,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn check_open(&self) -> Result<&C, SdmxError> {
        if self.closed {
            return Err(SdmxError::illegal_state(format!(
                "connection to '{}' is closed",
                self.client.endpoint()
            )));
        }
        Ok(&self.client)
    }
}

impl<C: WebClient> Connection for WebConnection<C> {
    fn flows(&self) -> Result<Vec<Dataflow>, SdmxError> {
        self.check_open()?.flows()
    }

    fn flow(&self, flow: &FlowRef) -> Result<Dataflow, SdmxError> {
        self.check_open()?.flow(flow)
    }

    fn structure(&self, flow: &FlowRef) -> Result<DataStructure, SdmxError> {
        let client = self.check_open()?;
        let found = client.flow(flow)?;
        client.structure(found.structure_ref())
    }

    fn data(
        &self,
        flow: &FlowRef,
        key: &Key,
        detail: DataDetail,
    ) -> Result<Box<dyn DataCursor + '_>, SdmxError> {
        let client = self.check_open()?;
        let found = client.flow(flow)?;
        let structure = client.structure(found.structure_ref())?;
        key.validate_on(&structure)?;

        if detail == DataDetail::SeriesKeysOnly && !client.is_series_keys_only_supported()? {
            let cursor = client.data(found.flow_ref(), key, DataDetail::Full, &structure)?;
            return Ok(Box::new(KeysOnlyCursor::new(cursor)));
        }
        Ok(client.data(found.flow_ref(), key, detail, &structure)?)
    }

    fn is_series_keys_only_supported(&self) -> Result<bool, SdmxError> {
        self.check_open()?.is_series_keys_only_supported()
    }

    fn close(&mut self) -> Result<(), SdmxError> {
        self.closed = true;
        Ok(())
    }
}
