use criterion::{black_box, criterion_group, criterion_main, Criterion};

use hookgen::generator::extract_json_value;
use hookgen::model::{canonical_topic, HookStyle};
use hookgen::{intent, templates};

fn template_benchmark(c: &mut Criterion) {
    c.bench_function("hook_template_all_styles", |b| {
        b.iter(|| {
            for style in [HookStyle::Meme, HookStyle::Analogy, HookStyle::Story] {
                let text = templates::hook_template(black_box("photosynthesis"), style);
                black_box(text.len());
            }
        });
    });
}

fn canonical_topic_benchmark(c: &mut Criterion) {
    let topic = "The QUICK brown-fox: jumps over 13 lazy dogs!?  ".repeat(8);

    c.bench_function("canonical_topic_long_input", |b| {
        b.iter(|| {
            let canonical = canonical_topic(black_box(topic.as_str()));
            black_box(canonical.len());
        });
    });
}

fn intent_benchmark(c: &mut Criterion) {
    let requests = [
        "make a funny meme about photosynthesis please",
        "story for gravity",
        "write an analogy comparing fractions to pizza slices",
        "quantum entanglement",
    ];

    c.bench_function("intent_parse_batch", |b| {
        b.iter(|| {
            for request in requests {
                let parsed = intent::parse(black_box(request));
                black_box(parsed.topic.len());
            }
        });
    });
}

fn json_extraction_benchmark(c: &mut Criterion) {
    let noisy = format!(
        "Sure, here you go:\n{}\nHope that helps!",
        serde_json::json!([
            {"question": "Q1?", "choices": ["a","b","c","d"], "answer": "a"},
            {"question": "Q2?", "choices": ["a","b","c","d"], "answer": "b"},
            {"question": "Q3?", "choices": ["a","b","c","d"], "answer": "c"}
        ])
    );

    c.bench_function("extract_json_from_noisy_output", |b| {
        b.iter(|| {
            let value = extract_json_value(black_box(noisy.as_str()));
            black_box(value.is_some());
        });
    });
}

criterion_group!(
    benches,
    template_benchmark,
    canonical_topic_benchmark,
    intent_benchmark,
    json_extraction_benchmark
);
criterion_main!(benches);
