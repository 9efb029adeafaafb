use std::io::{Cursor, Write};
use std::path::Path;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use csv2sql::convert::{ConvertOptions, convert_source};
use csv2sql::io_utils::{DelimitedSource, ReaderOptions};

fn generate_orders(rows: usize) -> Vec<u8> {
    let mut data = Vec::new();
    writeln!(data, "id|customer_id|ordered_at|amount|status|note").expect("header");
    for i in 0..rows {
        let status = match i % 3 {
            0 => "shipped",
            1 => "pending",
            _ => "processing",
        };
        let day = (i % 28) + 1;
        writeln!(
            data,
            "{i}|{}|2024-01-{day:02} 10:{:02}:00|{}.{:02}|{status}|order \"{i}\" note",
            i % 500,
            i % 60,
            i * 7,
            i % 100
        )
        .expect("row");
    }
    data
}

fn bench_convert(c: &mut Criterion) {
    let data = generate_orders(20_000);
    let options = ConvertOptions::default();
    let schema_only = ConvertOptions {
        schema_only: true,
        ..ConvertOptions::default()
    };

    let mut group = c.benchmark_group("convert_orders");
    group.bench_function("profile_only", |b| {
        b.iter_batched(
            || Cursor::new(data.clone()),
            |cursor| {
                let source = DelimitedSource::from_reader(cursor, &ReaderOptions::default())
                    .expect("open")
                    .expect("header");
                let mut sink = std::io::sink();
                convert_source(source, Path::new("orders.dat"), &schema_only, &mut sink)
                    .expect("profile")
            },
            BatchSize::LargeInput,
        )
    });
    group.bench_function("profile_and_insert", |b| {
        b.iter_batched(
            || Cursor::new(data.clone()),
            |cursor| {
                let source = DelimitedSource::from_reader(cursor, &ReaderOptions::default())
                    .expect("open")
                    .expect("header");
                let mut sink = std::io::sink();
                convert_source(source, Path::new("orders.dat"), &options, &mut sink)
                    .expect("convert")
            },
            BatchSize::LargeInput,
        )
    });
    group.finish();
}

criterion_group!(benches, bench_convert);
criterion_main!(benches);
