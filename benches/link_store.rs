//! LinkStore 性能基准测试（内存存储）

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::sync::Arc;
use tracing::Span;
use urlshrt::config::DeletionConfig;
use urlshrt::model::{LinkId, UserId};
use urlshrt::storage::{LinkStore, MemoryStore};

fn create_store(rt: &tokio::runtime::Runtime) -> Arc<MemoryStore> {
    // MemoryStore::open 会 spawn 删除 worker，需在 runtime 内执行
    let _guard = rt.enter();
    Arc::new(MemoryStore::open(None, DeletionConfig::default(), Span::none()).unwrap())
}

/// 单条写入吞吐量
fn bench_put(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = create_store(&rt);
    let user = UserId::new(0);
    let mut n = 0u64;

    c.bench_function("put/unique", |b| {
        b.to_async(&rt).iter(|| {
            n += 1;
            let store = Arc::clone(&store);
            let url = format!("https://example.com/{}", n);
            async move {
                let _ = store.put(user, &url).await;
            }
        });
    });
}

/// 读取已存在的链接
fn bench_get(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = create_store(&rt);
    let user = UserId::new(0);
    rt.block_on(async {
        for i in 0..10_000 {
            store.put(user, &format!("https://example.com/{}", i)).await.unwrap();
        }
    });
    let mut idx = 0u64;

    c.bench_function("get/hit", |b| {
        b.to_async(&rt).iter(|| {
            idx = (idx + 1) % 10_000;
            let store = Arc::clone(&store);
            async move {
                let _ = store.get(LinkId::new(idx)).await;
            }
        });
    });
}

/// 批量写入，不同批次大小
fn bench_batch_put(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = create_store(&rt);
    let user = UserId::new(0);
    let mut group = c.benchmark_group("batch_put");
    let mut round = 0u64;

    for size in [10usize, 100, 1000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("size", size), &size, |b, &size| {
            b.to_async(&rt).iter(|| {
                round += 1;
                let urls: Vec<String> = (0..size)
                    .map(|i| format!("https://batch.example.com/{}/{}", round, i))
                    .collect();
                let store = Arc::clone(&store);
                async move {
                    let _ = store.batch_put(user, &urls).await;
                }
            });
        });
    }
    group.finish();
}

/// 读写混合：每 10 次读取伴随 1 次写入
fn bench_mixed(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = create_store(&rt);
    let user = UserId::new(0);
    rt.block_on(async {
        for i in 0..1_000 {
            store.put(user, &format!("https://seed.example.com/{}", i)).await.unwrap();
        }
    });
    let mut n = 0u64;

    c.bench_function("mixed/read_heavy", |b| {
        b.to_async(&rt).iter(|| {
            n += 1;
            let store = Arc::clone(&store);
            let i = n;
            async move {
                if i % 11 == 0 {
                    let _ = store
                        .put(user, &format!("https://mixed.example.com/{}", i))
                        .await;
                } else {
                    let _ = store.get(LinkId::new(i % 1_000)).await;
                }
            }
        });
    });
}

criterion_group!(benches, bench_put, bench_get, bench_batch_put, bench_mixed);
criterion_main!(benches);
