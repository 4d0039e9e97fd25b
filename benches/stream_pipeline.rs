use criterion::{black_box, criterion_group, criterion_main, Criterion};

use mediassist::stream::{parse_delta, StreamPipeline};
use mediassist::transcript::Transcript;

fn build_body(events: usize) -> Vec<u8> {
    let mut body = String::new();
    for idx in 0..events {
        let payload = serde_json::json!({
            "id": "chatcmpl-bench",
            "object": "chat.completion.chunk",
            "choices": [{"index": 0, "delta": {"content": format!("token {idx} é ")}}]
        });
        body.push_str("data: ");
        body.push_str(&payload.to_string());
        body.push_str("\n\n");
        if idx % 16 == 0 {
            body.push_str(": keep-alive\n\n");
        }
    }
    body.push_str("data: [DONE]\n\n");
    body.into_bytes()
}

fn bench_pipeline(c: &mut Criterion) {
    let body = build_body(512);

    c.bench_function("pipeline_single_chunk_512_events", |b| {
        b.iter(|| {
            let mut pipeline = StreamPipeline::default();
            let mut count = 0_usize;
            let _ = pipeline.feed(black_box(&body), |token| count += token.len());
            black_box(count);
        });
    });

    c.bench_function("pipeline_network_sized_chunks_512_events", |b| {
        b.iter(|| {
            let mut pipeline = StreamPipeline::default();
            let mut count = 0_usize;
            for chunk in black_box(&body).chunks(1_397) {
                let _ = pipeline.feed(chunk, |token| count += token.len());
            }
            black_box(count);
        });
    });

    c.bench_function("pipeline_into_transcript_512_events", |b| {
        b.iter(|| {
            let mut pipeline = StreamPipeline::default();
            let mut transcript = Transcript::new();
            transcript.push_user("I have a headache");
            for chunk in black_box(&body).chunks(512) {
                let _ = pipeline.feed(chunk, |token| {
                    transcript.apply_token(token);
                });
            }
            transcript.commit();
            black_box(transcript.len());
        });
    });
}

fn bench_parse_delta(c: &mut Criterion) {
    let payload = r#"{"id":"chatcmpl-bench","object":"chat.completion.chunk","choices":[{"index":0,"delta":{"content":"Headaches can have many causes."},"finish_reason":null}]}"#;
    c.bench_function("parse_delta_content", |b| {
        b.iter(|| black_box(parse_delta(black_box(payload))));
    });

    let truncated = &payload[..payload.len() / 2];
    c.bench_function("parse_delta_incomplete", |b| {
        b.iter(|| black_box(parse_delta(black_box(truncated))));
    });
}

criterion_group!(benches, bench_pipeline, bench_parse_delta);
criterion_main!(benches);
