use criterion::{criterion_group, criterion_main, Criterion};
use qr2key::decode::FrameDecoder;
use qr2key::frame::{EngineConfig, FrameAssembler};
use std::hint::black_box;
use std::time::Instant;

pub fn bench_decode(c: &mut Criterion) {
    // "テスト" repeated, as a kanji-heavy QR payload would be
    let payload: Vec<u8> = [0x83, 0x65, 0x83, 0x58, 0x83, 0x67]
        .iter()
        .copied()
        .cycle()
        .take(600)
        .chain(*b"\r\n")
        .collect();
    let decoder = FrameDecoder::default();

    c.bench_function("decode_shift_jis_frame", |b| {
        b.iter(|| black_box(decoder.decode(black_box(&payload))))
    });
}

pub fn bench_assemble(c: &mut Criterion) {
    let chunks: [&[u8]; 4] = [b"https://exa", b"mple.com/item?", b"id=4901234567894", b"\n"];
    let mut assembler = FrameAssembler::new(&EngineConfig::default());

    c.bench_function("assemble_split_frame", |b| {
        b.iter(|| {
            let now = Instant::now();
            let mut frame = None;
            for chunk in &chunks {
                frame = assembler.push(black_box(chunk), now);
            }
            black_box(frame)
        })
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .warm_up_time(std::time::Duration::from_millis(300))
        .measurement_time(std::time::Duration::from_secs(2));
    targets = bench_decode, bench_assemble
}
criterion_main!(benches);
