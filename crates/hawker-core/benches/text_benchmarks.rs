//! Benchmark tests for text comparison throughput.
//!
//! `similarity_ratio` sits on the hot path of result deduplication: every
//! candidate is compared against every kept result, so a pool of k results
//! costs O(k^2) ratio calls per turn. These benchmarks track the per-call
//! cost on realistic Vietnamese product names.

use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};
use hawker_core::text::{format_vnd, normalize, similarity_ratio};

/// Realistic product-name pairs, from near-duplicates to unrelated models.
fn name_pairs() -> Vec<(String, String)> {
    vec![
        (
            "Samsung Galaxy S24 Ultra 12GB/256GB".to_string(),
            "Samsung Galaxy S24 Ultra (12GB, 256GB)".to_string(),
        ),
        (
            "iPhone 15 Pro Max 256GB Chính Hãng".to_string(),
            "Điện thoại iPhone 15 Pro Max 256GB".to_string(),
        ),
        (
            "Xiaomi Redmi Note 13 Pro 8GB/128GB".to_string(),
            "Oppo Reno 11 5G 8GB/256GB".to_string(),
        ),
        (
            "Realme C55 6GB/128GB".to_string(),
            "Realme C53 6GB/128GB".to_string(),
        ),
    ]
}

fn bench_similarity_ratio(c: &mut Criterion) {
    let pairs = name_pairs();

    let mut group = c.benchmark_group("text_similarity");
    group.sample_size(200);
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("ratio_single_pair", |b| {
        let mut idx = 0usize;
        b.iter(|| {
            let (a, x) = &pairs[idx % pairs.len()];
            let ratio = similarity_ratio(a, x);
            idx += 1;
            ratio
        });
    });

    // A full dedup pass over a pool of 10 candidates
    group.bench_function("ratio_pool_10x10", |b| {
        let pool: Vec<String> = (0..10)
            .map(|i| format!("Samsung Galaxy S2{} 8GB/128GB", i))
            .collect();
        b.iter(|| {
            let mut total = 0.0;
            for a in &pool {
                for x in &pool {
                    total += similarity_ratio(a, x);
                }
            }
            total
        });
    });

    group.finish();
}

fn bench_normalize_and_format(c: &mut Criterion) {
    let mut group = c.benchmark_group("text_misc");
    group.sample_size(200);
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("normalize_product_name", |b| {
        b.iter(|| normalize("  Điện Thoại iPhone 15  PRO MAX   256GB "));
    });

    group.bench_function("format_vnd", |b| {
        let mut amount = 24_990_000i64;
        b.iter(|| {
            let formatted = format_vnd(amount);
            amount += 1_000;
            formatted
        });
    });

    group.finish();
}

criterion_group!(benches, bench_similarity_ratio, bench_normalize_and_format);
criterion_main!(benches);
