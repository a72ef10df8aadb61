use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use filter_dialects::lexer::Lexer;
use filter_dialects::parser::{parse_filter, Parser};
use filter_dialects::{
    DocumentFilterConverter, FilterConverter, GraphFilterConverter, LuceneFilterConverter, RangeFilterConverter,
    SqlCompilerConfig, SqlFilterCompiler,
};
use std::hint::black_box;

const TEST_CASES: [(&str, &str); 3] = [
    ("simple", "country == 'BG'"),
    ("medium", "country in ['BG', 'NL', 'US'] && year >= 2020 && isOpen == true"),
    (
        "complex",
        "(year >= 2020 OR country == 'BG') AND NOT city IN ['Sofia', 'Plovdiv'] \
         AND (temperature >= -15.6 AND temperature <= 20.13 OR owner is null)",
    ),
];

// 基准测试：词法分析性能
fn benchmark_lexer(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer_performance");

    for (name, filter) in TEST_CASES {
        group.bench_with_input(BenchmarkId::new("tokenize", name), &filter, |b, &filter| {
            b.iter(|| {
                let tokens: Vec<_> = Lexer::new(black_box(filter)).collect();
                black_box(tokens)
            })
        });
    }

    group.finish();
}

// 基准测试：语法分析性能（输入已预先词法分析）
fn benchmark_parser(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser_performance");

    for (name, filter) in TEST_CASES {
        let tokens: Vec<_> = Lexer::new(filter).collect();

        group.bench_with_input(BenchmarkId::new("parse", name), &tokens, |b, tokens| {
            b.iter(|| {
                let mut parser = Parser::new(black_box(tokens));
                match parser.parse() {
                    Ok(expression) => black_box(expression),
                    Err(err) => panic!("parse failed: {err}"),
                }
            })
        });
    }

    group.finish();
}

// 基准测试：各文本方言的转换性能
fn benchmark_converters(c: &mut Criterion) {
    let converters: Vec<(&str, Box<dyn FilterConverter>)> = vec![
        ("document", Box::new(DocumentFilterConverter)),
        ("graph", Box::new(GraphFilterConverter::new())),
        ("lucene", Box::new(LuceneFilterConverter::new())),
        ("range", Box::new(RangeFilterConverter)),
    ];
    let (_, complex) = TEST_CASES[2];
    // range 方言不支持空值检查
    let expression = parse_filter(&complex.replace(" OR owner is null", "")).unwrap();

    let mut group = c.benchmark_group("converter_performance");

    for (name, converter) in &converters {
        group.bench_with_input(BenchmarkId::new("convert", name), &expression, |b, expression| {
            b.iter(|| black_box(converter.convert(black_box(expression)).unwrap()))
        });
    }

    group.finish();
}

// 基准测试：SQL编译性能（含 OR → IN 优化）
fn benchmark_sql_compiler(c: &mut Criterion) {
    let cases = [
        ("simple", TEST_CASES[0].1),
        ("complex", TEST_CASES[2].1),
        (
            "or_optimization",
            "status == 'Open' || status == 'Pending' || status == 'Review' || status == 'Approved' || status == 'Testing'",
        ),
    ];
    let compiler = SqlFilterCompiler::with_config(SqlCompilerConfig::default());

    let mut group = c.benchmark_group("sql_compiler_performance");

    for (name, filter) in cases {
        let expression = parse_filter(filter).unwrap();
        group.bench_with_input(BenchmarkId::new("compile", name), &expression, |b, expression| {
            b.iter(|| black_box(compiler.compile(black_box(expression)).unwrap()))
        });
    }

    group.finish();
}

// 基准测试：完整的端到端处理
fn benchmark_end_to_end(c: &mut Criterion) {
    let converter = GraphFilterConverter::new();
    let mut group = c.benchmark_group("end_to_end_performance");

    for (name, filter) in TEST_CASES {
        group.bench_with_input(BenchmarkId::new("graph", name), &filter, |b, &filter| {
            b.iter(|| {
                let expression = parse_filter(black_box(filter)).unwrap();
                black_box(converter.convert(&expression).unwrap())
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_lexer,
    benchmark_parser,
    benchmark_converters,
    benchmark_sql_compiler,
    benchmark_end_to_end
);
criterion_main!(benches);
