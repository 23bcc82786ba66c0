use serde_json::json;
use sept_core::AppSnapshot;
use sept_crypto::{ExportPolicy, KdfParams, SecureDataManager};

const OTP: &str = "482913";

fn make_snapshot(todos: usize) -> AppSnapshot {
    AppSnapshot::with_todos(
        (0..todos)
            .map(|i| json!({"id": i, "text": format!("task number {i}"), "completed": i % 3 == 0}))
            .collect(),
    )
}

fn manager(iterations: u32) -> SecureDataManager {
    SecureDataManager::new(ExportPolicy {
        kdf: KdfParams { iterations },
        ..ExportPolicy::default()
    })
}

#[divan::bench(args = [10_000, 100_000], sample_count = 10)]
fn bench_export(bencher: divan::Bencher, iterations: u32) {
    let m = manager(iterations);
    let snapshot = make_snapshot(100);
    bencher.bench(|| m.export(divan::black_box(&snapshot), OTP).unwrap());
}

#[divan::bench(args = [10_000, 100_000], sample_count = 10)]
fn bench_import(bencher: divan::Bencher, iterations: u32) {
    let m = manager(iterations);
    let envelope = m.export(&make_snapshot(100), OTP).unwrap();
    bencher.bench(|| m.import(divan::black_box(&envelope), OTP).unwrap());
}

fn main() {
    divan::main();
}
