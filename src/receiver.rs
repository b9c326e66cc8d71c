/// AP receiver: the single loop that demultiplexes uplink traffic,
/// validates it, responds with CTS/ACK, and delivers payloads to their
/// destination station.
///
/// Runs in its own task; it is the only worker that mutates
/// `uplink.busy`, since two concurrent writers flipping that flag
/// would race. Grounded on the reference implementation's
/// `process_request()` loop: CTS on a valid RTS, read DATA, ACK on
/// valid DATA, and `busy` cleared before the next outer iteration
/// regardless of which path was taken, so a dropped frame never
/// wedges the medium busy forever.
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::contracts::{CtsAckFrame, DataFrame, FrameSubtype, RtsFrame};
use crate::errors::SimError;
use crate::medium::Medium;
use crate::station::{deliver, StationTable};
use crate::timer::Timer;

/// Run the AP receiver loop until `shutdown` fires.
pub async fn run_ap_receiver(
    uplink: Arc<Medium>,
    downlink: Arc<Medium>,
    table: StationTable,
    wait_time: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut uplink_pos = uplink.cursor();

    loop {
        if *shutdown.borrow() {
            return;
        }

        // 1. Read until an RTS-sized block is available, or time out
        // and loop back around to check for shutdown.
        let rts_timer = Timer::start(wait_time);
        let rts_bytes = tokio::select! {
            res = uplink.read_exact(&mut uplink_pos, RtsFrame::WIRE_LEN, &rts_timer) => res,
            changed = shutdown.changed() => {
                if changed.is_ok() && *shutdown.borrow() {
                    return;
                }
                continue;
            }
        };

        let rts_bytes = match rts_bytes {
            Ok(bytes) => bytes,
            Err(_) => continue,
        };

        // 2. Validate the RTS and answer with CTS.
        let rts = match RtsFrame::decode(&rts_bytes) {
            Ok(rts) => rts,
            Err(_) => {
                warn!(station = "ap", "Checksum Validation Failed");
                uplink.set_busy(false);
                continue;
            }
        };

        uplink.set_busy(true);
        let cts = CtsAckFrame { subtype: FrameSubtype::Cts, addr1: rts.addr1 };
        downlink.write(&cts.encode()).await;

        // 3. Read the DATA block the RTS declared.
        let data_timer = Timer::start(wait_time);
        let data_len = rts.payload_len as usize + 4;
        let data_bytes = uplink.read_exact(&mut uplink_pos, data_len, &data_timer).await;

        let data_bytes = match data_bytes {
            Ok(bytes) => bytes,
            Err(_) => {
                warn!(station = "ap", sender = %rts.addr1, "Timeout waiting for DATA after CTS");
                uplink.set_busy(false);
                continue;
            }
        };

        let payload = match DataFrame::decode(&data_bytes, rts.payload_len as usize) {
            Ok(payload) => payload,
            Err(_) => {
                warn!(station = "ap", "Checksum Validation Failed");
                uplink.set_busy(false);
                continue;
            }
        };

        // 4. Deliver to addr2 and ACK, unless addr2 is unknown.
        let delivered = deliver(&table, rts.addr2, payload, rts.addr1).await;
        if delivered {
            let ack = CtsAckFrame { subtype: FrameSubtype::Ack, addr1: rts.addr1 };
            downlink.write(&ack.encode()).await;
            info!(station = "ap", sender = %rts.addr1, dest = %rts.addr2, "delivered payload, ACK sent");
        } else {
            warn!(station = "ap", "{}", SimError::UnknownStation(rts.addr2));
        }

        // 5. Always clear busy before the next outer iteration.
        uplink.set_busy(false);
    }
}
