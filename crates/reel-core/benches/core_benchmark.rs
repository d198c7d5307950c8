//! Benchmark tests for reel-core operations
//!
//! Run with: cargo bench -p reel-core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;

use reel_core::cache::{CachedMedia, MediaCache};
use reel_core::config::{demo_stories, CacheConfig, StoriesConfig, StreamingConfig};
use reel_core::gesture::{GestureInterpreter, InputEvent};
use reel_core::profile::{DeviceProfile, DeviceSignals, MediaTier};
use reel_core::resolver::{warmup_urls, SourceResolver, StreamingSupport};
use reel_core::storage::MemoryStore;
use reel_core::types::MediaKind;
use reel_core::StoriesController;

// ============================================================================
// Helpers
// ============================================================================

fn media(i: usize) -> CachedMedia {
    CachedMedia {
        kind: MediaKind::Image,
        url: format!("https://cdn.example.com/img/{i}.jpg"),
        width: 1080,
        height: 1920,
    }
}

fn filled_cache(capacity: usize) -> MediaCache<CachedMedia> {
    let mut cache = MediaCache::new(&CacheConfig {
        capacity,
        ..Default::default()
    });
    for i in 0..capacity {
        cache.set(format!("k{i}"), media(i));
    }
    cache
}

// ============================================================================
// Cache Benchmarks
// ============================================================================

fn bench_cache_insert_with_eviction(c: &mut Criterion) {
    let mut group = c.benchmark_group("Cache Eviction");

    for &capacity in &[50, 200, 1000] {
        group.bench_with_input(
            BenchmarkId::new("set_over_capacity", capacity),
            &capacity,
            |b, &capacity| {
                b.iter_batched(
                    || filled_cache(capacity),
                    |mut cache| {
                        cache.set("overflow", media(usize::MAX));
                        black_box(cache.len())
                    },
                    criterion::BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

fn bench_cache_lookup(c: &mut Criterion) {
    let mut cache = filled_cache(50);
    c.bench_function("cache_get_hit", |b| b.iter(|| black_box(cache.get("k25").is_some())));
}

// ============================================================================
// Resolver Benchmarks
// ============================================================================

fn bench_resolution(c: &mut Criterion) {
    let stories = demo_stories();
    let mut group = c.benchmark_group("Source Resolution");

    for (name, support) in [
        ("native", StreamingSupport { native: true, library: false }),
        ("library", StreamingSupport { native: false, library: true }),
        ("progressive", StreamingSupport::default()),
    ] {
        let resolver = SourceResolver::new(support, &StreamingConfig::default());
        group.bench_function(BenchmarkId::new("streaming_plan", name), |b| {
            b.iter(|| {
                for story in stories.stories() {
                    for item in &story.items {
                        black_box(resolver.streaming_plan(item, MediaTier::Mobile));
                    }
                }
            })
        });
    }

    group.bench_function("warmup_urls", |b| {
        b.iter(|| black_box(warmup_urls("./videos/hls/mobile/1_master.m3u8")))
    });

    group.bench_function("classify_device", |b| {
        let profile = DeviceProfile::from_signals(DeviceSignals {
            viewport_width: Some(390),
            touch_capable: Some(true),
            user_agent: Some("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)".into()),
            effective_connection: Some("4g".into()),
        });
        b.iter(|| black_box(profile.preferred_tier()))
    });

    group.finish();
}

// ============================================================================
// Engine Benchmarks
// ============================================================================

fn bench_gestures(c: &mut Criterion) {
    let config = StoriesConfig::default();
    let opened = Some(Duration::ZERO);
    c.bench_function("tap_interpretation", |b| {
        let mut gestures = GestureInterpreter::new(&config.playback);
        b.iter(|| {
            gestures.interpret(InputEvent::PointerDown { x: 10.0, y: 10.0 }, Duration::from_secs(2), opened);
            black_box(gestures.interpret(
                InputEvent::PointerUp { x: 12.0, y: 10.0, width: 400.0 },
                Duration::from_millis(2050),
                opened,
            ))
        })
    });
}

fn bench_navigation(c: &mut Criterion) {
    c.bench_function("open_next_close", |b| {
        b.iter_batched(
            || {
                StoriesController::new(
                    StoriesConfig::default(),
                    DeviceProfile::mobile(),
                    StreamingSupport::default(),
                    MemoryStore::new(),
                    chrono::Utc::now(),
                )
                .unwrap()
            },
            |mut controller| {
                let mut now = Duration::ZERO;
                controller.open_story(1, 0, now).unwrap();
                for _ in 0..10 {
                    now += Duration::from_millis(100);
                    controller.next_item(now).unwrap();
                }
                controller.close(now).unwrap();
                black_box(controller.drain_effects().len())
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(cache_benches, bench_cache_insert_with_eviction, bench_cache_lookup);

criterion_group!(resolver_benches, bench_resolution);

criterion_group!(engine_benches, bench_gestures, bench_navigation);

criterion_main!(cache_benches, resolver_benches, engine_benches);
