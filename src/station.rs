/// Station lifecycle and the station receiver.
///
/// Each station worker owns a control channel accepting `Send` (spawn
/// a sender worker for a new outstanding transmission) and `Deliver`
/// (log a payload routed here by the AP receiver). The station table
/// mapping name -> handle is a single mutex-protected map, mutated
/// only by the dispatcher and read by the AP receiver for delivery
/// lookups, mirroring the reference implementation's single
/// `station_table_lock` guarding the whole operation.
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::info;

use crate::contracts::{SendJob, StationName};
use crate::errors::SimError;
use crate::medium::Medium;
use crate::transmitter::run_send_job;

/// Messages accepted by a station worker's control channel.
pub enum StationMessage {
    /// Hand the station a new outstanding transmission.
    Send(SendJob),
    /// A DATA frame addressed to this station was validated by the AP.
    Deliver { payload: Vec<u8>, from: StationName },
}

/// A live station's handle, held in the station table.
pub struct StationHandle {
    control_tx: mpsc::Sender<StationMessage>,
    killed_tx: watch::Sender<bool>,
    pub ifs: Duration,
}

impl StationHandle {
    pub async fn send(&self, msg: StationMessage) {
        // A closed channel means the station was killed concurrently;
        // dropping the message here keeps a killed station from
        // emitting any further frames or deliveries.
        let _ = self.control_tx.send(msg).await;
    }
}

/// Name -> handle, guarded by one mutex for the whole of any CRUD
/// operation, rather than relying on a lock-free map that could let a
/// create and a kill race each other.
pub type StationTable = Arc<Mutex<HashMap<StationName, StationHandle>>>;

pub fn new_station_table() -> StationTable {
    Arc::new(Mutex::new(HashMap::new()))
}

/// Spawn a station worker and register it in `table`, unless a
/// station with this name already exists, in which case the creation
/// is a no-op and the existing station's IFS is left unchanged. A
/// second `node("A", ...)` for a station that's already up should
/// never reset an in-flight station's timing out from under it.
pub fn create_station(
    table: &StationTable,
    name: StationName,
    ifs: Duration,
    uplink: Arc<Medium>,
    downlink: Arc<Medium>,
    wait_time: Duration,
    time_slot: Duration,
) {
    let mut guard = table.lock().unwrap();
    if guard.contains_key(&name) {
        info!(station = %name, "{}", SimError::DuplicateStation(name));
        return;
    }

    let (control_tx, control_rx) = mpsc::channel(64);
    let (killed_tx, killed_rx) = watch::channel(false);

    tokio::spawn(run_station_worker(
        name,
        control_rx,
        uplink,
        downlink,
        ifs,
        wait_time,
        time_slot,
        killed_rx,
    ));

    guard.insert(name, StationHandle { control_tx, killed_tx, ifs });
}

/// Close the station's control channel and remove it from the table.
/// Outstanding sender workers observe the kill flag at their next
/// suspension point (an IFS wait, a backoff sleep, a medium read) and
/// terminate instead of running to completion.
pub fn kill_station(table: &StationTable, name: StationName) {
    let mut guard = table.lock().unwrap();
    if let Some(handle) = guard.remove(&name) {
        let _ = handle.killed_tx.send(true);
        // dropping `handle` here closes control_tx, which ends the
        // station worker's recv loop.
    } else {
        info!(station = %name, "{}", SimError::UnknownStation(name));
    }
}

/// Route a validated DATA payload to its destination station, or
/// report that the destination is unknown so the AP receiver can log
/// it and withhold the ACK.
pub async fn deliver(table: &StationTable, to: StationName, payload: Vec<u8>, from: StationName) -> bool {
    let tx = {
        let guard = table.lock().unwrap();
        guard.get(&to).map(|h| h.control_tx.clone())
    };
    match tx {
        Some(tx) => {
            let _ = tx.send(StationMessage::Deliver { payload, from }).await;
            true
        }
        None => false,
    }
}

/// Hand a send job to the named station, or log and drop if the
/// source station is unknown — a `send("A", ...)` for a station that
/// was never created, or that has since been killed.
pub async fn dispatch_send(table: &StationTable, job: SendJob) {
    let tx = {
        let guard = table.lock().unwrap();
        guard.get(&job.src).map(|h| h.control_tx.clone())
    };
    match tx {
        Some(tx) => {
            let _ = tx.send(StationMessage::Send(job)).await;
        }
        None => {
            info!(station = %job.src, "{}", SimError::UnknownStation(job.src));
        }
    }
}

async fn run_station_worker(
    name: StationName,
    mut control_rx: mpsc::Receiver<StationMessage>,
    uplink: Arc<Medium>,
    downlink: Arc<Medium>,
    ifs: Duration,
    wait_time: Duration,
    time_slot: Duration,
    killed_rx: watch::Receiver<bool>,
) {
    while let Some(msg) = control_rx.recv().await {
        match msg {
            StationMessage::Send(job) => {
                let uplink = uplink.clone();
                let downlink = downlink.clone();
                let killed_rx = killed_rx.clone();
                tokio::spawn(run_send_job(job, uplink, downlink, ifs, wait_time, time_slot, killed_rx));
            }
            StationMessage::Deliver { payload, from } => {
                info!(
                    station = %name,
                    "Received Message {} from {}",
                    String::from_utf8_lossy(&payload),
                    from
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media() -> (Arc<Medium>, Arc<Medium>) {
        (Arc::new(Medium::new(4096)), Arc::new(Medium::new(4096)))
    }

    #[tokio::test]
    async fn create_station_is_idempotent() {
        let table = new_station_table();
        let (up, down) = media();
        let name = StationName::new("A").unwrap();
        create_station(&table, name, Duration::from_millis(200), up.clone(), down.clone(), Duration::from_secs(1), Duration::from_micros(1));
        create_station(&table, name, Duration::from_millis(999), up, down, Duration::from_secs(1), Duration::from_micros(1));
        let guard = table.lock().unwrap();
        assert_eq!(guard.get(&name).unwrap().ifs, Duration::from_millis(200));
    }

    #[tokio::test]
    async fn deliver_to_unknown_station_reports_false() {
        let table = new_station_table();
        let delivered = deliver(&table, StationName::new("Z").unwrap(), b"x".to_vec(), StationName::new("A").unwrap()).await;
        assert!(!delivered);
    }

    #[tokio::test]
    async fn kill_unknown_station_is_a_harmless_no_op() {
        let table = new_station_table();
        kill_station(&table, StationName::new("Z").unwrap());
    }

    #[tokio::test]
    async fn deliver_reaches_an_existing_station() {
        let table = new_station_table();
        let (up, down) = media();
        let name = StationName::new("B").unwrap();
        create_station(&table, name, Duration::from_millis(200), up, down, Duration::from_secs(1), Duration::from_micros(1));
        let delivered = deliver(&table, name, b"hi".to_vec(), StationName::new("A").unwrap()).await;
        assert!(delivered);
    }
}
