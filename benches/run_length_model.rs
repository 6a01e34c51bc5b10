use acoustic_entropy::analysis::{run_count_distribution, RunCountAnalyzer, RunLengthModel};
use acoustic_entropy::capture::ExtractorConfig;
use acoustic_entropy::extraction::Extractor;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand_chacha::ChaCha8Rng;
use rand_core::{RngCore, SeedableRng};

fn bench_model(c: &mut Criterion) {
    let mut group = c.benchmark_group("run_length_model");
    group.sample_size(20);
    group.bench_function("closed_form_1000x100", |b| {
        b.iter(|| RunLengthModel::new(black_box(1000), black_box(100)));
    });
    group.bench_function("distribution_256_len_3", |b| {
        b.iter(|| run_count_distribution(black_box(3), black_box(256)));
    });
    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let samples: Vec<f32> = (0..22050)
        .map(|_| (rng.next_u32() as f32 / u32::MAX as f32) * 2.0 - 1.0)
        .collect();
    let bytes: Vec<u8> = (0..4096).map(|_| rng.next_u32() as u8).collect();

    let mut group = c.benchmark_group("pipeline");
    group.bench_function("extract_22050", |b| {
        let mut extractor =
            Extractor::with_rng(ExtractorConfig::new(22050, 0), ChaCha8Rng::seed_from_u64(3))
                .unwrap();
        b.iter(|| black_box(extractor.accumulate(&samples)));
    });
    group.bench_function("analyze_4k", |b| {
        let mut analyzer = RunCountAnalyzer::new(1000, 100);
        b.iter(|| black_box(analyzer.process_bytes(&bytes)));
    });
    group.finish();
}

criterion_group!(benches, bench_model, bench_pipeline);
criterion_main!(benches);
