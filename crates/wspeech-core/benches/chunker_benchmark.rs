use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use wspeech_core::tempo::{format_chain, tempo_stages};
use wspeech_core::Chunker;

fn bench_chunking(c: &mut Criterion) {
    let chunker = Chunker::default();
    let mut group = c.benchmark_group("chunking");

    // Test different text lengths
    let test_texts = vec![
        ("short", "Hello world.".to_string()),
        (
            "paragraph",
            "This is a medium length paragraph. It has a few sentences! Does it split well? \
             Each sentence is short enough to pack with its neighbours."
                .to_string(),
        ),
        (
            "article",
            "This is a much longer sentence that keeps going so that the chunker has to pack many \
             sentences together into chunks close to the limit. "
                .repeat(200),
        ),
        ("unpunctuated", "word ".repeat(5_000)),
    ];

    for (name, text) in &test_texts {
        group.bench_with_input(BenchmarkId::new("split", name), text, |b, text| {
            b.iter(|| black_box(chunker.split(black_box(text))));
        });
    }

    group.finish();
}

fn bench_first_chunk(c: &mut Criterion) {
    let chunker = Chunker::default();
    let text = "Sentences keep coming in this very long document. ".repeat(10_000);

    // Playback only needs the first chunk to start
    c.bench_function("first_chunk_of_long_text", |b| {
        b.iter(|| black_box(chunker.chunks(black_box(&text)).next()));
    });
}

fn bench_tempo_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("tempo_chain");

    for ratio in [0.2_f64, 0.8, 1.5, 6.0] {
        group.bench_with_input(BenchmarkId::from_parameter(ratio), &ratio, |b, &ratio| {
            b.iter(|| black_box(format_chain(&tempo_stages(black_box(ratio)))));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_chunking, bench_first_chunk, bench_tempo_chain);
criterion_main!(benches);
