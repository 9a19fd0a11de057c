//! Performance benchmarks for murmur-crypto.
//!
//! Run with: `cargo bench -p murmur-crypto`

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use murmur_crypto::aead::{AeadKey, Nonce};
use murmur_crypto::hash::hash;
use murmur_crypto::ratchet::ChainKey;
use murmur_crypto::stream::{SecretStream, StreamCipher, StreamKey, StreamTag};

// ============================================================================
// AEAD Benchmarks
// ============================================================================

fn bench_aead_encrypt(c: &mut Criterion) {
    let mut group = c.benchmark_group("aead_encrypt");

    for size in [64, 1024, 16384, 65536] {
        let key = AeadKey::new([0x42u8; 32]);
        let nonce = Nonce::from_counter(0, &[0u8; 16]);
        let plaintext = vec![0xAA; size];

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| key.encrypt(black_box(&nonce), black_box(&plaintext), black_box(b"")))
        });
    }

    group.finish();
}

// ============================================================================
// Secret Stream Benchmarks
// ============================================================================

fn bench_stream_push(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream_push");
    let key = StreamKey::new([0x24u8; 32]);

    for size in [4096, 65536] {
        let chunk = vec![0x55; size];

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            let (mut state, _) = SecretStream::init_push(&key).unwrap();
            b.iter(|| SecretStream::push(&mut state, black_box(&chunk), StreamTag::More))
        });
    }

    group.finish();
}

// ============================================================================
// Hash and Ratchet Benchmarks
// ============================================================================

fn bench_hash(c: &mut Criterion) {
    let data = vec![0x11; 4096];
    c.bench_function("blake3_4k", |b| b.iter(|| hash(black_box(&data))));
}

fn bench_ratchet(c: &mut Criterion) {
    let mut chain = ChainKey::from_bytes([0x33u8; 32]);
    c.bench_function("chain_ratchet", |b| b.iter(|| chain.ratchet()));
}

criterion_group!(
    benches,
    bench_aead_encrypt,
    bench_stream_push,
    bench_hash,
    bench_ratchet
);
criterion_main!(benches);
