use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use refcode::{CodeConfig, CodeGenerator};

fn bench_generate(c: &mut Criterion) {
    let config = CodeConfig::new().prefix("INV").separator("-").sequence_width(8);

    let mut stateful = CodeGenerator::new(config.clone()).unwrap();
    c.bench_function("generate", |b| b.iter(|| black_box(stateful.generate())));

    let stateless = CodeGenerator::new(config).unwrap();
    let code = stateless.generate_from_sequence(41, None).unwrap();
    c.bench_function("increment", |b| {
        b.iter(|| black_box(stateless.increment(black_box(&code)).unwrap()))
    });
    c.bench_function("validate", |b| b.iter(|| black_box(stateless.validate(black_box(&code)))));
}

criterion_group!(benches, bench_generate);
criterion_main!(benches);
