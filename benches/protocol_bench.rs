use criterion::{black_box, criterion_group, criterion_main, Criterion};
use wlan_csma_core::ack_manager::BackoffState;
use wlan_csma_core::contracts::{CtsAckFrame, DataFrame, FrameSubtype, RtsFrame};
use wlan_csma_core::StationName;

fn benchmark_rts_round_trip(c: &mut Criterion) {
    let rts = RtsFrame {
        payload_len: 64,
        addr1: StationName::new("A").unwrap(),
        addr2: StationName::new("B").unwrap(),
    };

    c.bench_function("rts_encode", |b| {
        b.iter(|| rts.encode());
    });

    let encoded = rts.encode();
    c.bench_function("rts_decode", |b| {
        b.iter(|| RtsFrame::decode(black_box(&encoded)));
    });
}

fn benchmark_cts_ack_round_trip(c: &mut Criterion) {
    let cts = CtsAckFrame { subtype: FrameSubtype::Cts, addr1: StationName::new("A").unwrap() };
    let encoded = cts.encode();

    c.bench_function("cts_ack_encode", |b| {
        b.iter(|| cts.encode());
    });
    c.bench_function("cts_ack_decode", |b| {
        b.iter(|| CtsAckFrame::decode(black_box(&encoded), FrameSubtype::Cts));
    });
}

fn benchmark_data_frame(c: &mut Criterion) {
    let payload = vec![0xAAu8; 256];

    c.bench_function("data_encode_256b", |b| {
        b.iter(|| DataFrame::encode(black_box(&payload)));
    });

    let encoded = DataFrame::encode(&payload).unwrap();
    c.bench_function("data_decode_256b", |b| {
        b.iter(|| DataFrame::decode(black_box(&encoded), payload.len()));
    });
}

fn benchmark_backoff_slot_selection(c: &mut Criterion) {
    c.bench_function("backoff_choose_slot_across_k", |b| {
        b.iter(|| {
            let mut state = BackoffState::new();
            for _ in 0..10 {
                black_box(state.choose_slot());
                let _ = state.record_failure();
            }
        });
    });
}

criterion_group!(
    benches,
    benchmark_rts_round_trip,
    benchmark_cts_ack_round_trip,
    benchmark_data_frame,
    benchmark_backoff_slot_selection
);
criterion_main!(benches);
