/// Station sender: the CSMA/CA state machine that drives one station's
/// side of the RTS/CTS/DATA/ACK handshake.
///
/// States: `Idle -> WaitIFS -> SendRTS -> AwaitCTS -> WaitIFS2 ->
/// SendDATA -> AwaitACK -> Done`, plus the retry transition `Backoff`.
/// Written as an explicit loop over an enum rather than the reference
/// implementation's `goto`-based attempt loop.
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::ack_manager::{period_jitter, BackoffState};
use crate::contracts::{CtsAckFrame, DataFrame, FrameSubtype, RtsFrame, SendJob};
use crate::errors::SimError;
use crate::medium::Medium;
use crate::timer::Timer;

enum AttemptOutcome {
    Acked,
    Exhausted,
}

/// Outcome of one failed-attempt backoff step.
enum BackoffStep {
    /// Slept the chosen slot; the attempt loop should retry from step 1.
    Retry,
    /// K reached its bound; the exchange ends.
    Exhausted,
    /// `killed` fired mid-sleep; the exchange ends immediately.
    Killed,
}

/// Run one send job to completion: a single exchange when
/// `job.repeat` is false, or an indefinite series of periodic
/// exchanges until `killed` fires when `job.repeat` is true.
///
/// `killed` is watched at every suspension point so that killing the
/// owning station terminates this worker the next time it would
/// otherwise sleep or block on the medium, rather than leaving a
/// zombie retry loop running after the station is gone.
pub async fn run_send_job(
    job: SendJob,
    uplink: Arc<Medium>,
    downlink: Arc<Medium>,
    ifs: Duration,
    wait_time: Duration,
    time_slot: Duration,
    mut killed: watch::Receiver<bool>,
) {
    if job.repeat && job.period > Duration::ZERO {
        if interruptible_sleep(period_jitter(job.period), &mut killed).await {
            return;
        }
    }

    loop {
        if *killed.borrow() {
            return;
        }

        let outcome = run_one_exchange(&job, &uplink, &downlink, ifs, wait_time, time_slot, &mut killed).await;

        match outcome {
            None => return, // killed mid-exchange
            Some(AttemptOutcome::Acked) => {
                debug!(station = %job.src, dest = %job.dst, "send job exchange acknowledged");
            }
            Some(AttemptOutcome::Exhausted) => {
                warn!(station = %job.src, "{}", SimError::MaxRetriesExceeded);
            }
        }

        if !job.repeat {
            return;
        }
        if interruptible_sleep(period_jitter(job.period), &mut killed).await {
            return;
        }
    }
}

/// Run the CSMA/CA attempt loop for one exchange: repeatedly sense,
/// wait, send RTS/DATA and await CTS/ACK until either an ACK is
/// received or K is exhausted. Returns `None` if killed mid-flight.
async fn run_one_exchange(
    job: &SendJob,
    uplink: &Arc<Medium>,
    downlink: &Arc<Medium>,
    ifs: Duration,
    wait_time: Duration,
    time_slot: Duration,
    killed: &mut watch::Receiver<bool>,
) -> Option<AttemptOutcome> {
    let mut backoff = BackoffState::new();

    loop {
        if *killed.borrow() {
            return None;
        }

        // 1. Sense idle.
        while uplink.is_busy() {
            if *killed.borrow() {
                return None;
            }
            tokio::task::yield_now().await;
        }

        // 2. Wait IFS.
        if interruptible_sleep(ifs, killed).await {
            return None;
        }

        // 3. Re-check; restart at step 1 if the medium went busy meanwhile.
        if uplink.is_busy() {
            continue;
        }

        // 4. Choose this attempt's slot count, using the pre-failure K.
        let r = backoff.choose_slot();

        // 5. Send RTS and arm the CTS timer.
        let rts = RtsFrame {
            payload_len: job.payload.len() as u16,
            addr1: job.src,
            addr2: job.dst,
        };
        let mut downlink_pos = downlink.cursor();
        uplink.write(&rts.encode()).await;
        let cts_timer = Timer::start(wait_time);

        // 6. Await CTS.
        let cts_ok = match downlink.read_exact(&mut downlink_pos, CtsAckFrame::WIRE_LEN, &cts_timer).await {
            Ok(bytes) => match CtsAckFrame::decode(&bytes, FrameSubtype::Cts) {
                Ok(cts) => cts.addr1 == job.src,
                Err(_) => false,
            },
            Err(_) => false,
        };
        if !cts_ok {
            match apply_backoff_failure(&job.src, &mut backoff, r, time_slot, killed).await {
                BackoffStep::Retry => continue,
                BackoffStep::Exhausted => return Some(AttemptOutcome::Exhausted),
                BackoffStep::Killed => return None,
            }
        }

        // 7. Wait IFS again.
        if interruptible_sleep(ifs, killed).await {
            return None;
        }

        // 8. Send DATA and arm the ACK timer.
        let data = match DataFrame::encode(&job.payload) {
            Ok(bytes) => bytes,
            Err(SimError::PayloadTooLarge(_, _)) => {
                warn!(station = %job.src, "payload too large to transmit, abandoning send job");
                return Some(AttemptOutcome::Exhausted);
            }
            Err(_) => return Some(AttemptOutcome::Exhausted),
        };
        uplink.write(&data).await;
        let ack_timer = Timer::start(wait_time);

        // 9. Await ACK, same validation rules as step 6.
        let ack_ok = match downlink.read_exact(&mut downlink_pos, CtsAckFrame::WIRE_LEN, &ack_timer).await {
            Ok(bytes) => match CtsAckFrame::decode(&bytes, FrameSubtype::Ack) {
                Ok(ack) => ack.addr1 == job.src,
                Err(_) => false,
            },
            Err(_) => false,
        };
        if !ack_ok {
            match apply_backoff_failure(&job.src, &mut backoff, r, time_slot, killed).await {
                BackoffStep::Retry => continue,
                BackoffStep::Exhausted => return Some(AttemptOutcome::Exhausted),
                BackoffStep::Killed => return None,
            }
        }

        // 10. ACK received.
        info!(station = %job.src, dest = %job.dst, "RTS/CTS/DATA/ACK exchange completed");
        return Some(AttemptOutcome::Acked);
    }
}

/// Record a failed attempt and sleep the chosen backoff slot, or
/// report exhaustion if K has reached its bound.
async fn apply_backoff_failure(
    station: &crate::contracts::StationName,
    backoff: &mut BackoffState,
    r: u32,
    time_slot: Duration,
    killed: &mut watch::Receiver<bool>,
) -> BackoffStep {
    if backoff.record_failure().is_err() {
        return BackoffStep::Exhausted;
    }
    debug!(station = %station, k = backoff.k(), slot = r, "attempt failed, backing off");
    let slot = time_slot.saturating_mul(r);
    if interruptible_sleep(slot, killed).await {
        return BackoffStep::Killed;
    }
    BackoffStep::Retry
}

/// Sleep for `d`, or return early (with `true`) if `killed` fires
/// first.
async fn interruptible_sleep(d: Duration, killed: &mut watch::Receiver<bool>) -> bool {
    if *killed.borrow() {
        return true;
    }
    tokio::select! {
        _ = tokio::time::sleep(d) => false,
        changed = killed.changed() => changed.is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn successful_exchange_completes_without_retry() {
        let uplink = Arc::new(Medium::new(4096));
        let downlink = Arc::new(Medium::new(4096));
        let job = SendJob {
            src: crate::StationName::new("A").unwrap(),
            dst: crate::StationName::new("B").unwrap(),
            payload: b"hi".to_vec(),
            period: Duration::ZERO,
            repeat: false,
        };
        let (_tx, rx) = watch::channel(false);

        let downlink_responder = downlink.clone();
        let uplink_reader = uplink.clone();
        let responder = tokio::spawn(async move {
            // answer the RTS with a CTS, then the DATA with an ACK.
            let mut pos = 0u64;
            let timer = Timer::start(Duration::from_secs(1));
            let rts_bytes = uplink_reader.read_exact(&mut pos, RtsFrame::WIRE_LEN, &timer).await.unwrap();
            let rts = RtsFrame::decode(&rts_bytes).unwrap();
            let cts = CtsAckFrame { subtype: FrameSubtype::Cts, addr1: rts.addr1 };
            downlink_responder.write(&cts.encode()).await;
            let data_bytes = uplink_reader
                .read_exact(&mut pos, rts.payload_len as usize + 4, &timer)
                .await
                .unwrap();
            DataFrame::decode(&data_bytes, rts.payload_len as usize).unwrap();
            let ack = CtsAckFrame { subtype: FrameSubtype::Ack, addr1: rts.addr1 };
            downlink_responder.write(&ack.encode()).await;
        });

        run_send_job(
            job,
            uplink,
            downlink,
            Duration::from_millis(1),
            Duration::from_millis(200),
            Duration::from_micros(1),
            rx,
        )
        .await;

        responder.await.unwrap();
    }

    #[tokio::test]
    async fn exchange_with_no_responder_exhausts_and_returns() {
        let uplink = Arc::new(Medium::new(4096));
        let downlink = Arc::new(Medium::new(4096));
        let job = SendJob {
            src: crate::StationName::new("A").unwrap(),
            dst: crate::StationName::new("B").unwrap(),
            payload: b"hi".to_vec(),
            period: Duration::ZERO,
            repeat: false,
        };
        let (_tx, rx) = watch::channel(false);

        run_send_job(
            job,
            uplink,
            downlink,
            Duration::from_micros(1),
            Duration::from_millis(1),
            Duration::from_micros(1),
            rx,
        )
        .await;
        // completes (eventually exhausts K) rather than hanging forever.
    }

    #[tokio::test]
    async fn kill_signal_stops_a_repeating_job() {
        let uplink = Arc::new(Medium::new(4096));
        let downlink = Arc::new(Medium::new(4096));
        let job = SendJob {
            src: crate::StationName::new("A").unwrap(),
            dst: crate::StationName::new("B").unwrap(),
            payload: b"hi".to_vec(),
            period: Duration::from_millis(5),
            repeat: true,
        };
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run_send_job(
            job,
            uplink,
            downlink,
            Duration::from_micros(1),
            Duration::from_millis(1),
            Duration::from_micros(1),
            rx,
        ));
        tokio::time::sleep(Duration::from_millis(5)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }
}
