/// Task dispatcher: translates the task stream produced by the
/// excluded parser into station-lifecycle and send-job operations.
/// Single producer (the parser), single consumer (this dispatcher);
/// tasks are processed strictly in arrival order, the same way the
/// reference implementation's single-threaded command loop applied
/// `node`/`send`/`kill` commands one at a time as they were read.
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::RuntimeConfig;
use crate::contracts::{SendJob, StationName};
use crate::medium::Medium;
use crate::receiver::run_ap_receiver;
use crate::station::{create_station, dispatch_send, kill_station, new_station_table, StationTable};

/// The task stream's tagged union: every operation the excluded
/// parser can ask this crate to perform.
pub enum Task {
    CreateStation { name: StationName, ifs: Option<Duration> },
    Send(SendJob),
    KillStation { name: StationName },
}

/// Owns the station table and the two shared media, and drives the AP
/// receiver loop alongside the task queue.
pub struct Dispatcher {
    table: StationTable,
    uplink: Arc<Medium>,
    downlink: Arc<Medium>,
    config: RuntimeConfig,
    ap_shutdown: watch::Sender<bool>,
    ap_handle: JoinHandle<()>,
}

impl Dispatcher {
    /// Allocate the media, start the AP receiver, and return a ready
    /// dispatcher plus handles to the shared infrastructure.
    pub fn new(config: RuntimeConfig) -> Self {
        let uplink = Arc::new(Medium::new(config.medium_capacity));
        let downlink = Arc::new(Medium::new(config.medium_capacity));
        let table = new_station_table();

        let (ap_shutdown, ap_shutdown_rx) = watch::channel(false);
        let ap_handle = tokio::spawn(run_ap_receiver(
            uplink.clone(),
            downlink.clone(),
            table.clone(),
            config.wait_time,
            ap_shutdown_rx,
        ));

        Self { table, uplink, downlink, config, ap_shutdown, ap_handle }
    }

    /// Consume tasks from `rx` until the channel closes, in arrival
    /// order.
    pub async fn run(&self, mut rx: mpsc::Receiver<Task>) {
        while let Some(task) = rx.recv().await {
            self.handle(task).await;
        }
    }

    async fn handle(&self, task: Task) {
        match task {
            Task::CreateStation { name, ifs } => {
                create_station(
                    &self.table,
                    name,
                    ifs.unwrap_or(self.config.default_ifs),
                    self.uplink.clone(),
                    self.downlink.clone(),
                    self.config.wait_time,
                    self.config.time_slot,
                );
            }
            Task::Send(job) => {
                dispatch_send(&self.table, job).await;
            }
            Task::KillStation { name } => {
                kill_station(&self.table, name);
            }
        }
    }

    /// Stop the AP receiver and wait for it to exit. Station workers
    /// are left running; callers that want a full teardown should
    /// `KillStation` each one first.
    pub async fn shutdown(self) {
        let _ = self.ap_shutdown.send(true);
        let _ = self.ap_handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dispatcher_processes_tasks_in_order() {
        let dispatcher = Dispatcher::new(RuntimeConfig::default());
        let (tx, rx) = mpsc::channel(16);

        tx.send(Task::CreateStation { name: StationName::new("A").unwrap(), ifs: None }).await.unwrap();
        tx.send(Task::CreateStation { name: StationName::new("B").unwrap(), ifs: None }).await.unwrap();
        tx.send(Task::Send(SendJob {
            src: StationName::new("A").unwrap(),
            dst: StationName::new("B").unwrap(),
            payload: b"hello".to_vec(),
            period: Duration::ZERO,
            repeat: false,
        }))
        .await
        .unwrap();
        drop(tx);

        tokio::time::timeout(Duration::from_secs(2), dispatcher.run(rx)).await.unwrap();
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn create_station_then_kill_then_recreate_ifs_is_fresh() {
        let dispatcher = Dispatcher::new(RuntimeConfig::default());
        let (tx, rx) = mpsc::channel(16);

        tx.send(Task::CreateStation { name: StationName::new("A").unwrap(), ifs: Some(Duration::from_millis(1)) })
            .await
            .unwrap();
        tx.send(Task::KillStation { name: StationName::new("A").unwrap() }).await.unwrap();
        tx.send(Task::CreateStation { name: StationName::new("A").unwrap(), ifs: Some(Duration::from_millis(900)) })
            .await
            .unwrap();
        drop(tx);

        tokio::time::timeout(Duration::from_secs(2), dispatcher.run(rx)).await.unwrap();
        dispatcher.shutdown().await;
    }
}
