//! Benchmarks for the colormap pipeline.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use colormap::mapper::{Action, Mapper, Masker};
use colormap::parser::{parse, tokenize};
use colormap::space::{HsvBands, HSV};
use colormap::types::{Range, Raster};
use colormap::{compile_script, ColorSpaceRegistry};

const SCRIPT: &str = r#"
alpha allow;
$red_low = 3 / 180;
$red_high = 177 / 180;
$$tint = [1, 0.9, 0.8];

on hsv pixels having ($h in 0 .. $red_low) | ($h in $red_high .. 1) do
    $v *= 0.5;
    using rgb:
        $b = $b * $$tint[2];
end;

on lab pixels having $l > 80 do
    using hsv:
        $s = (| $s * 1.5 |);
end;

on pixels having $g in 0.5 +- 0.1 do
    $r = 0;
end;
"#;

/// A deterministic gradient covering a range of hues.
fn gradient(size: usize) -> Raster {
    let mut data = Vec::with_capacity(size * size * 4);
    for y in 0..size {
        for x in 0..size {
            let fx = x as f32 / size as f32;
            let fy = y as f32 / size as f32;
            data.extend_from_slice(&[fx, fy, 1.0 - fx, 1.0]);
        }
    }
    Raster::from_vec(size, size, 4, data).unwrap()
}

// -- Parsing benchmarks --

fn bench_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("parsing");

    group.bench_function("tokenize", |b| b.iter(|| tokenize(black_box(SCRIPT))));

    let tokens = tokenize(SCRIPT).tokens;
    group.bench_function("parse", |b| b.iter(|| parse(black_box(&tokens)).unwrap()));

    let registry = ColorSpaceRegistry::standard();
    group.bench_function("compile_script", |b| {
        b.iter(|| compile_script(black_box(SCRIPT), &registry).unwrap())
    });

    group.finish();
}

// -- Mapping benchmarks --

fn bench_mapping(c: &mut Criterion) {
    let mut group = c.benchmark_group("mapping");
    let script = compile_script(SCRIPT, &ColorSpaceRegistry::standard()).unwrap();

    for size in [16, 64, 256] {
        let image = gradient(size);

        group.bench_with_input(BenchmarkId::new("script_cached", size), &image, |b, image| {
            b.iter(|| script.run(black_box(image), true).unwrap())
        });

        group.bench_with_input(BenchmarkId::new("script_uncached", size), &image, |b, image| {
            b.iter(|| script.run(black_box(image), false).unwrap())
        });
    }

    let mut native = Mapper::default();
    native
        .on(Masker::native(HSV, |bands| {
            HsvBands::new(bands.raster()).h_is(Range::new(0.0, 3.0 / 180.0))
        }))
        .then(Action::scale(vec![1.0, 1.0, 0.5, 1.0]));

    let image = gradient(256);
    group.bench_function("native_256", |b| {
        b.iter(|| native.run(black_box(&image), true).unwrap())
    });

    group.finish();
}

// -- Colorspace benchmarks --

fn bench_colorspaces(c: &mut Criterion) {
    let mut group = c.benchmark_group("colorspaces");
    let image = gradient(128);
    let registry = ColorSpaceRegistry::standard();

    for name in registry.names() {
        let space = registry.resolve(name).unwrap();
        group.bench_function(BenchmarkId::new("round_trip", name), |b| {
            b.iter(|| space.decode(&space.encode(black_box(&image))))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parsing, bench_mapping, bench_colorspaces);
criterion_main!(benches);
