//! Metadata cache benchmarks
//!
//! Run with: cargo bench -p crumble-core --bench metadata_cache

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use crumble_addons::MetaItem;
use crumble_core::cache::{catalog_key, CachedData, MetadataCache};
use std::time::Duration;

fn catalog(size: usize) -> Vec<MetaItem> {
    (0..size)
        .map(|i| MetaItem {
            id: format!("tt{i:07}"),
            name: format!("Title {i}"),
            ..Default::default()
        })
        .collect()
}

/// Benchmark: cache hit for catalogs of varying size
fn bench_cache_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("metadata_cache_hit");

    for size in [10usize, 100, 1000] {
        let cache = MetadataCache::new(Duration::from_secs(3600), 1024);
        let key = catalog_key("movie", "top", None);
        cache.insert(key.clone(), CachedData::Items(catalog(size)), "bench");

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let items = cache.get_items(black_box(&key)).expect("cached");
                black_box(items);
            })
        });
    }

    group.finish();
}

/// Benchmark: lookup of an absent key
fn bench_cache_miss(c: &mut Criterion) {
    let cache = MetadataCache::new(Duration::from_secs(3600), 1024);
    for i in 0..512 {
        cache.insert(
            catalog_key("movie", &format!("catalog{i}"), None),
            CachedData::Items(catalog(5)),
            "bench",
        );
    }

    c.bench_function("metadata_cache_miss", |b| {
        b.iter(|| black_box(cache.get(black_box("catalog:movie:absent"))))
    });
}

/// Benchmark: inserts into a full cache (each evicts the LRU entry)
fn bench_cache_insert_evict(c: &mut Criterion) {
    let cache = MetadataCache::new(Duration::from_secs(3600), 256);
    let items = catalog(20);
    let mut n = 0u64;

    c.bench_function("metadata_cache_insert_evict", |b| {
        b.iter(|| {
            n += 1;
            cache.insert(
                format!("catalog:movie:c{n}"),
                CachedData::Items(items.clone()),
                "bench",
            );
        })
    });
}

criterion_group!(
    benches,
    bench_cache_hit,
    bench_cache_miss,
    bench_cache_insert_evict
);
criterion_main!(benches);
