use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use xpath_functions::engine::decimal_format::DecimalFormatSymbols;
use xpath_functions::{
    DecimalPicture, DynamicContextBuilder, FunctionLibraryList, SimpleNode, StaticContext,
    XdmAtomicValue, XdmItem, compile_xpath, format_number,
};

fn sample_pictures() -> Vec<&'static str> {
    vec!["#,##0.00", "000,000,000.000", "#,##,##0.###", "###.###%", "0.00;(0.00)"]
}

fn sample_values() -> Vec<XdmAtomicValue> {
    vec![
        XdmAtomicValue::Integer(1_234_567),
        XdmAtomicValue::Double(-98_765.432_1),
        XdmAtomicValue::Double(0.000_42),
        XdmAtomicValue::Double(1.0e15),
    ]
}

fn benchmark_picture_compile(c: &mut Criterion) {
    let symbols = DecimalFormatSymbols::default();
    let pictures = sample_pictures();
    c.bench_function("format_number/compile_picture", |b| {
        b.iter(|| {
            for p in &pictures {
                let picture = DecimalPicture::compile(black_box(p), &symbols).expect("picture");
                black_box(picture);
            }
        })
    });
}

fn benchmark_render(c: &mut Criterion) {
    let symbols = DecimalFormatSymbols::default();
    let values = sample_values();
    let mut group = c.benchmark_group("format_number/render");
    for p in sample_pictures() {
        let picture = DecimalPicture::compile(p, &symbols).expect("picture");
        group.bench_with_input(BenchmarkId::from_parameter(p), &picture, |b, picture| {
            b.iter(|| {
                for v in &values {
                    let s = format_number(black_box(v), picture, &symbols).expect("format");
                    black_box(s);
                }
            })
        });
    }
    group.finish();
}

fn benchmark_compiled_call(c: &mut Criterion) {
    let s = xpath_functions::ExpandedName::new(None, "v");
    let mut sc = StaticContext::default();
    sc.in_scope_variables.insert(s.clone());
    let libs = FunctionLibraryList::<SimpleNode>::standard();
    let compiled = compile_xpath("format-number($v, '#,##0.00')", &sc, &libs).expect("compile");
    let ctx = DynamicContextBuilder::new()
        .with_variable(s, vec![XdmItem::Atomic(XdmAtomicValue::Double(1_234_567.891))])
        .build();
    c.bench_function("format_number/evaluate_prepared_picture", |b| {
        b.iter(|| {
            let out = compiled.evaluate(black_box(&ctx)).expect("evaluate");
            black_box(out);
        })
    });
}

criterion_group!(
    benches,
    benchmark_picture_compile,
    benchmark_render,
    benchmark_compiled_call
);
criterion_main!(benches);
