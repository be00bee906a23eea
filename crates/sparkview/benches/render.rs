//! Benchmarks for compiling and rendering views.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use sparkview::{Chunk, RenderContext, ViewCompiler, ViewData};

/// A list view over `n` items taken from view data.
fn list_view(n: usize) -> (Vec<Chunk>, RenderContext) {
    let chunks = vec![
        Chunk::view_data("Items", "list"),
        Chunk::literal("<ul>"),
        Chunk::for_each(
            "var item in Items",
            vec![
                Chunk::literal("<li>"),
                Chunk::expression("item"),
                Chunk::literal("</li>"),
            ],
        ),
        Chunk::literal("</ul>"),
    ];
    let items: Vec<String> = (0..n).map(|i| format!("Item {}", i)).collect();
    let context = RenderContext::new().with_view_data(ViewData::new().with("Items", items));
    (chunks, context)
}

/// Benchmark generation plus build
fn bench_compile(c: &mut Criterion) {
    let compiler = ViewCompiler::new();
    let (chunks, _) = list_view(0);

    c.bench_function("compile_list_view", |b| {
        b.iter(|| compiler.compile(&chunks).unwrap());
    });
}

/// Benchmark instance creation and render with varying item counts
fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_list");
    let compiler = ViewCompiler::new();

    for n in [10, 100, 1000] {
        let (chunks, context) = list_view(n);
        let view = compiler.compile(&chunks).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| view.render_once(&context).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compile, bench_render);
criterion_main!(benches);
