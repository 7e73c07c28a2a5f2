use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::live::types::LiveMessage;
use crate::streaming::history::SharedHistory;
use crate::streaming::types::{ExternalSample, Reading, StatusLevel};

pub type ClientId = Uuid;

const WELCOME_MESSAGE: &str = "Connected to SOFC monitor live feed";

/// Live messages a client may fall behind by before it is dropped
pub const DEFAULT_CLIENT_BACKLOG: usize = 256;

/// A registered live client: its id and the ordered feed of messages for it
pub struct LiveClient {
    pub id: ClientId,
    pub receiver: mpsc::Receiver<LiveMessage>,
}

/// Fan-out of readings, samples and status events to every live client.
///
/// Storing a record and delivering it happen under the same lock that
/// registration takes its history snapshot under, so a client sees each
/// record exactly once: in its snapshot or in its live feed.
///
/// Each client feed is bounded. A client that falls more than `backlog`
/// messages behind is dropped; its feed ends once the queued messages drain.
#[derive(Clone)]
pub struct Broadcaster {
    clients: Arc<Mutex<HashMap<ClientId, mpsc::Sender<LiveMessage>>>>,
    readings: SharedHistory<Reading>,
    samples: SharedHistory<ExternalSample>,
    backlog: usize,
}

impl Broadcaster {
    pub fn new(readings: SharedHistory<Reading>, samples: SharedHistory<ExternalSample>) -> Self {
        Self {
            clients: Arc::new(Mutex::new(HashMap::new())),
            readings,
            samples,
            backlog: DEFAULT_CLIENT_BACKLOG,
        }
    }

    pub fn with_backlog(mut self, backlog: usize) -> Self {
        self.backlog = backlog.max(1);
        self
    }

    /// Register a client and seed its feed with the reading history, every
    /// retained external sample, and a welcome status, in that order.
    pub fn register(&self) -> LiveClient {
        let id = Uuid::new_v4();

        let mut clients = self.clients.lock();

        let history = self.readings.slice(None);
        let samples = self.samples.slice(None);
        // Room for the seed plus the live backlog, so seeding never fills up
        let (tx, rx) = mpsc::channel(samples.len() + 2 + self.backlog);

        let _ = tx.try_send(LiveMessage::History { payload: history });
        for sample in samples {
            let _ = tx.try_send(LiveMessage::SimulinkSample { payload: sample });
        }
        let _ = tx.try_send(LiveMessage::status(StatusLevel::Info, WELCOME_MESSAGE));

        clients.insert(id, tx);
        info!("Live client {} registered ({} connected)", id, clients.len());

        LiveClient { id, receiver: rx }
    }

    /// Remove a client. Unknown ids are ignored.
    pub fn deregister(&self, id: &ClientId) {
        let mut clients = self.clients.lock();
        if clients.remove(id).is_some() {
            info!("Live client {} deregistered ({} connected)", id, clients.len());
        }
    }

    /// Append a reading to the device history and deliver it
    pub fn publish_reading(&self, reading: Reading) {
        let mut clients = self.clients.lock();
        self.readings.write().push(reading.clone());
        fan_out(&mut clients, LiveMessage::Reading { payload: reading });
    }

    /// Append a sample to the external history and deliver it
    pub fn publish_sample(&self, sample: ExternalSample) {
        let mut clients = self.clients.lock();
        self.samples.write().push(sample.clone());
        fan_out(&mut clients, LiveMessage::SimulinkSample { payload: sample });
    }

    pub fn publish_status(&self, level: StatusLevel, message: impl Into<String>) {
        let mut clients = self.clients.lock();
        fan_out(&mut clients, LiveMessage::status(level, message));
    }

    /// Drop every client sender, ending each live feed
    pub fn disconnect_all(&self) {
        let mut clients = self.clients.lock();
        if !clients.is_empty() {
            info!("Closing {} live clients", clients.len());
            clients.clear();
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn readings(&self) -> &SharedHistory<Reading> {
        &self.readings
    }

    pub fn samples(&self) -> &SharedHistory<ExternalSample> {
        &self.samples
    }
}

/// Deliver to every client; a closed or lagging client is dropped without
/// affecting the rest
fn fan_out(clients: &mut HashMap<ClientId, mpsc::Sender<LiveMessage>>, message: LiveMessage) {
    clients.retain(|id, tx| match tx.try_send(message.clone()) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!("Live client {} is not keeping up, dropping it", id);
            false
        }
        Err(TrySendError::Closed(_)) => {
            debug!("Live client {} is gone, dropping it", id);
            false
        }
    });
}
