use banter::cache::ResponseCache;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

fn bench_cache_key(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_key");

    let short = "hey, what's up?";
    let long = "I've been thinking about this for a while and wanted to get \
                everyone's opinion on the best way to structure a weekend trip \
                with a large group of friends who all have different budgets";

    for (label, message) in [("short", short), ("long", long)] {
        group.bench_with_input(BenchmarkId::from_parameter(label), &message, |b, msg| {
            b.iter(|| {
                let key = ResponseCache::key(black_box("nova"), black_box(msg));
                black_box(key);
            });
        });
    }

    group.finish();
}

fn bench_cache_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_lookup");

    for size in [100usize, 1_000, 10_000] {
        let cache = ResponseCache::new();
        for i in 0..size {
            let key = ResponseCache::key("nova", &format!("message number {i}"));
            cache.put(&key, "a cached response of typical length for a chat room");
        }
        let hit_key = ResponseCache::key("nova", &format!("message number {}", size - 1));

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let hit = cache.get(black_box(&hit_key));
                black_box(hit);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_cache_key, bench_cache_lookup);
criterion_main!(benches);
