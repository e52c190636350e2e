use criterion::{black_box, criterion_group, criterion_main, Criterion};

use prism_crypto::{kind, EventTemplate, SigningKey, ZapRequest};
use prism_types::{MilliSats, Timestamp};

fn event_sign_bench(c: &mut Criterion) {
    let key = SigningKey::generate();

    c.bench_function("event_sign_metadata", |b| {
        b.iter(|| {
            EventTemplate::new(kind::METADATA, black_box("{\"name\":\"tips@example.com\"}"))
                .sign(&key, Timestamp::new(1_700_000_000))
        })
    });
}

fn event_verify_bench(c: &mut Criterion) {
    let key = SigningKey::generate();
    let event = EventTemplate::new(kind::METADATA, "{\"name\":\"tips@example.com\"}")
        .tag(["p", "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"])
        .sign(&key, Timestamp::new(1_700_000_000));

    c.bench_function("event_verify", |b| b.iter(|| black_box(&event).verify()));
}

fn zap_request_parse_bench(c: &mut Criterion) {
    let payer = SigningKey::generate();
    let recipient = SigningKey::generate().public_key();
    let relays = vec!["wss://relay.damus.io".to_string(), "wss://nos.lol".to_string()];
    let json = ZapRequest::build(
        &payer,
        &recipient,
        MilliSats::new(21_000),
        &relays,
        "zap",
        Timestamp::new(1_700_000_000),
    )
    .to_json();

    c.bench_function("zap_request_parse", |b| {
        b.iter(|| ZapRequest::parse(black_box(&json)))
    });
}

fn keypair_generation_bench(c: &mut Criterion) {
    c.bench_function("keypair_generate", |b| b.iter(SigningKey::generate));
}

criterion_group!(
    benches,
    event_sign_bench,
    event_verify_bench,
    zap_request_parse_bench,
    keypair_generation_bench,
);
criterion_main!(benches);
