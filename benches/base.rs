use criterion::{criterion_group, criterion_main, Criterion, SamplingMode, Throughput};
use kms_core::{Algorithm, CryptoConfig, KeyStoreManager, KmsConfig};
use std::hint::black_box;

fn manager() -> KeyStoreManager {
    let config = KmsConfig {
        crypto: CryptoConfig {
            rsa_key_bits: 2048,
            ..Default::default()
        },
        ..Default::default()
    };
    KeyStoreManager::new(config).unwrap()
}

fn bench_symmetric(c: &mut Criterion) {
    let manager = manager();
    let data = vec![0u8; 4096];
    let mut group = c.benchmark_group("Symmetric 4KB");
    group.throughput(Throughput::Bytes(data.len() as u64));

    for algorithm in [Algorithm::Aes256Gcm, Algorithm::ChaCha20Poly1305] {
        let key_id = manager.create_key(algorithm).unwrap();
        group.bench_function(format!("{algorithm} encrypt"), |b| {
            b.iter(|| manager.encrypt(&key_id, black_box(&data), None).unwrap());
        });
        let envelope = manager.encrypt(&key_id, &data, None).unwrap();
        group.bench_function(format!("{algorithm} decrypt"), |b| {
            b.iter(|| manager.decrypt(&key_id, black_box(&envelope), None, None).unwrap());
        });
    }
    group.finish();
}

fn bench_rsa(c: &mut Criterion) {
    let manager = manager();
    let key_id = manager.create_key(Algorithm::Rsa).unwrap();
    let message = b"ledger-entry-42";

    let mut group = c.benchmark_group("RSA 2048");
    group.sample_size(20).sampling_mode(SamplingMode::Flat);
    group.bench_function("sign", |b| {
        b.iter(|| manager.sign(&key_id, black_box(message)).unwrap());
    });
    let signature = manager.sign(&key_id, message).unwrap();
    group.bench_function("verify", |b| {
        b.iter(|| manager.verify(&key_id, black_box(message), &signature).unwrap());
    });
    let envelope = manager.encrypt(&key_id, &[0u8; 1024], None).unwrap();
    group.bench_function("decrypt 1KB", |b| {
        b.iter(|| manager.decrypt(&key_id, black_box(&envelope), None, None).unwrap());
    });
    group.finish();
}

fn bench_rotation(c: &mut Criterion) {
    let manager = manager();
    let key_id = manager.create_key(Algorithm::Aes256Gcm).unwrap();
    c.bench_function("AES-256-GCM rotate (memory store)", |b| {
        b.iter(|| manager.rotate_key(&key_id).unwrap());
    });
}

criterion_group!(benches, bench_symmetric, bench_rsa, bench_rotation);
criterion_main!(benches);
