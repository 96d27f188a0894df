use criterion::{criterion_group, criterion_main, Criterion};
use jsonpack_core::{Schema, Value};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::hint::black_box;

#[derive(Serialize, Deserialize, Clone)]
struct Area {
    name: String,
    area: u32,
    population: u64,
    density: f64,
    tags: Vec<String>,
    center: Point,
}

#[derive(Serialize, Deserialize, Clone)]
struct Point {
    x: f32,
    y: f32,
}

fn area_schema() -> Schema {
    Schema::compile(
        "area",
        json!({
            "type": "object",
            "properties": {
                "name": "string",
                "area": "uint32le",
                "population": "uint64le",
                "density": "float64be",
                "tags": {"type": "array", "items": "string"},
                "center": {
                    "type": "object",
                    "properties": {"x": "float32le", "y": "float32le"},
                    "order": ["x", "y"]
                }
            },
            "order": ["name", "area", "population", "density", "tags", "center"]
        }),
    )
    .unwrap()
}

fn sample() -> Area {
    Area {
        name: "Sapporo".to_string(),
        area: 1121,
        population: 1_973_000,
        density: 1760.5,
        tags: vec!["hokkaido".to_string(), "snow".to_string()],
        center: Point { x: 43.06, y: 141.35 },
    }
}

fn bench_compile(c: &mut Criterion) {
    c.bench_function("schema_compile", |b| b.iter(area_schema));
}

fn bench_encode_struct(c: &mut Criterion) {
    let schema = area_schema();
    let area = sample();

    c.bench_function("encode_struct", |b| {
        b.iter(|| schema.encode(black_box(&area)))
    });
}

fn bench_encode_value(c: &mut Criterion) {
    let schema = area_schema();
    let value = Value::from(serde_json::to_value(sample()).unwrap());

    c.bench_function("encode_value", |b| {
        b.iter(|| schema.encode_value(black_box(&value)))
    });
}

fn bench_decode_struct(c: &mut Criterion) {
    let schema = area_schema();
    let encoded = schema.encode(&sample()).unwrap();

    c.bench_function("decode_struct", |b| {
        b.iter(|| schema.decode::<Area>(black_box(&encoded)))
    });
}

fn bench_decode_into(c: &mut Criterion) {
    let schema = area_schema();
    let encoded = schema.encode(&sample()).unwrap();
    let mut dest = Value::Null;

    c.bench_function("decode_into_reused", |b| {
        b.iter(|| schema.decode_into(black_box(&encoded), &mut dest))
    });
}

criterion_group!(
    benches,
    bench_compile,
    bench_encode_struct,
    bench_encode_value,
    bench_decode_struct,
    bench_decode_into,
);
criterion_main!(benches);
