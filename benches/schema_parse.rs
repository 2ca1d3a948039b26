use bitspec::schema::Schema;
use criterion::{Criterion, criterion_group, criterion_main};

fn gen_schema(field_count: usize) -> Schema {
    let mut schema = Schema::start();
    for i in 0..field_count {
        schema = schema.uint16be(format!("f{i}"));
    }
    schema
}

fn gen_packet(field_count: usize) -> Vec<u8> {
    let total_bytes = field_count * 2;
    let mut data = Vec::with_capacity(total_bytes);

    // Deterministic but non-trivial pattern
    for i in 0..total_bytes {
        data.push((i * 31 % 256) as u8);
    }

    data
}

fn bench_schema_parse(c: &mut Criterion) {
    for &field_count in &[1usize, 10, 50, 100] {
        let schema = gen_schema(field_count);
        let packet = gen_packet(field_count);

        c.bench_function(&format!("parse_{field_count}_fields"), |b| {
            b.iter(|| {
                let _ = schema.parse(&packet).unwrap();
            })
        });
    }
}

fn bench_schema_encode(c: &mut Criterion) {
    for &field_count in &[1usize, 10, 50, 100] {
        let schema = gen_schema(field_count);
        let packet = gen_packet(field_count);
        let record = schema.parse(&packet).unwrap();

        c.bench_function(&format!("encode_{field_count}_fields"), |b| {
            b.iter(|| {
                let _ = schema.encode(&record).unwrap();
            })
        });
    }
}

criterion_group!(benches, bench_schema_parse, bench_schema_encode);
criterion_main!(benches);
