//! Criterion benchmarks for the core indexing and search operations.
//!
//! Run with: `cargo bench`
//!
//! These benchmarks measure the core operations in isolation, using
//! synthetic source files to keep results reproducible across machines.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use astra::code_index::{BuildOptions, CodeIndex, ContextFile};
use astra::language::Language;
use astra::query_classifier::QueryClassifier;
use astra::search_pipeline::SearchPipeline;
use astra::tfidf::{tokenize, TfIdfVocab};
use astra::trigram_index::{SearchOptions, TrigramIndex};
use astra::vector_index::VectorIndex;

// ─── Synthetic corpus ──────────────────────────────────────────────────

const FUNCTION_TEMPLATE: &str = r#"
pub fn process_{n}(input: &str) -> Result<String, Error> {
    let client = HttpClient::new();
    let response = client.get(input)?;
    log::info!("processed request {n}");
    Ok(response.body().to_string())
}
"#;

fn synthetic_file(n: usize) -> String {
    let mut body = String::new();
    for i in 0..n {
        body.push_str(&FUNCTION_TEMPLATE.replace("{n}", &i.to_string()));
    }
    body
}

fn build_context_files(num_files: usize, funcs_per_file: usize) -> Vec<ContextFile> {
    (0..num_files)
        .map(|i| ContextFile { path: format!("src/file_{i}.rs"), content: synthetic_file(funcs_per_file), language: Language::Rust })
        .collect()
}

fn build_index(num_files: usize, funcs_per_file: usize) -> CodeIndex {
    let files = build_context_files(num_files, funcs_per_file);
    let mut index = CodeIndex::new();
    index.build_sync(&files, BuildOptions::default());
    index
}

// ─── Tokenizer benchmarks ───────────────────────────────────────────────

fn bench_tokenize(c: &mut Criterion) {
    let mut group = c.benchmark_group("tokenize");

    let short_line = "let client = HttpClient::new();";
    let long_line = "let result = service_provider.get_required::<QueryHandler>().execute(QueryRequest { user_id, query, max_results, include_metadata: true, timeout: Duration::from_secs(30) }).await?;";

    group.bench_function("short_line", |b| b.iter(|| tokenize(black_box(short_line))));
    group.bench_function("long_line", |b| b.iter(|| tokenize(black_box(long_line))));

    let code_block = synthetic_file(5);
    group.bench_function("code_block_5_functions", |b| {
        b.iter(|| {
            let mut tokens = Vec::new();
            for line in black_box(&code_block).lines() {
                tokens.extend(tokenize(line));
            }
            tokens
        })
    });

    group.finish();
}

// ─── CodeIndex build benchmarks ─────────────────────────────────────────

fn bench_code_index_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("code_index_build");
    group.sample_size(10);

    for &num_files in &[50, 200, 1_000] {
        let files = build_context_files(num_files, 20);
        group.bench_with_input(BenchmarkId::new("build_sync", num_files), &files, |b, files| {
            b.iter(|| {
                let mut index = CodeIndex::new();
                index.build_sync(black_box(files), BuildOptions::default());
                black_box(index);
            })
        });
    }

    group.finish();
}

// ─── Symbol lookup benchmarks ────────────────────────────────────────────

fn bench_symbol_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("symbol_lookup");

    for &num_files in &[50, 200, 1_000] {
        let index = build_index(num_files, 20);

        group.bench_with_input(BenchmarkId::new("by_name", num_files), &index, |b, index| {
            b.iter(|| black_box(index.symbols().get("process_5")));
        });

        group.bench_with_input(BenchmarkId::new("missing_symbol", num_files), &index, |b, index| {
            b.iter(|| black_box(index.symbols().get("not_a_real_symbol")));
        });
    }

    group.finish();
}

// ─── Trigram search benchmarks ───────────────────────────────────────────

fn bench_trigram_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("trigram_search");

    for &num_files in &[50, 200, 1_000] {
        let files = build_context_files(num_files, 20);
        let mut trigram = TrigramIndex::new();
        for file in &files {
            trigram.index_file(&file.path, &file.content);
        }
        let opts = SearchOptions::default();

        group.bench_with_input(BenchmarkId::new("common_substring", num_files), &trigram, |b, trigram| {
            b.iter(|| black_box(trigram.search("HttpClient", &opts)));
        });

        group.bench_with_input(BenchmarkId::new("missing_substring", num_files), &trigram, |b, trigram| {
            b.iter(|| black_box(trigram.search("nonexistent_substring_xyz", &opts)));
        });
    }

    group.finish();
}

// ─── TF-IDF vocabulary benchmarks ────────────────────────────────────────

fn bench_tfidf_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("tfidf_build");
    group.sample_size(10);

    for &num_files in &[50, 200, 1_000] {
        let files = build_context_files(num_files, 20);
        let docs: Vec<&str> = files.iter().map(|f| f.content.as_str()).collect();

        group.bench_with_input(BenchmarkId::new("build_vocab", num_files), &docs, |b, docs| {
            b.iter(|| {
                let mut vocab = TfIdfVocab::new();
                vocab.build(docs.iter().copied());
                black_box(vocab);
            })
        });
    }

    group.finish();
}

// ─── Vector (semantic) search benchmarks ─────────────────────────────────

fn bench_vector_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("vector_search");
    group.sample_size(10);

    for &num_files in &[50, 200] {
        let index = build_index(num_files, 20);
        let files = build_context_files(num_files, 20);

        let mut vocab = TfIdfVocab::new();
        let docs: Vec<&str> = files.iter().map(|f| f.content.as_str()).collect();
        vocab.build(docs.iter().copied());

        let mut vector = VectorIndex::new();
        for file in &files {
            if let Some(record) = index.files().get(&file.path) {
                let chunks = VectorIndex::chunk_file(record, &file.content);
                vector.add_chunks(chunks, Some(&vocab));
            }
        }

        group.bench_with_input(BenchmarkId::new("semantic_query", num_files), &vector, |b, vector| {
            b.iter(|| black_box(vector.search("process an http request and log it", 10, Some(&vocab))));
        });
    }

    group.finish();
}

// ─── Comprehensive search pipeline benchmarks ────────────────────────────

fn bench_comprehensive_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("comprehensive_search");
    group.sample_size(10);

    for &num_files in &[50, 200] {
        let index = build_index(num_files, 20);
        let files = build_context_files(num_files, 20);
        let mut trigram = TrigramIndex::new();
        for file in &files {
            trigram.index_file(&file.path, &file.content);
        }
        let classifier = QueryClassifier::learn(&index);
        let classification = classifier.classify("where is the http client used", false);
        let inverted = astra::inverted_summary::InvertedSummaryIndex::new();

        let pipeline = SearchPipeline { code_index: &index, trigram_index: Some(&trigram), vector_index: None, vocab: None, inverted_summary: &inverted };

        group.bench_with_input(BenchmarkId::new("query", num_files), &pipeline, |b, pipeline| {
            b.iter(|| black_box(pipeline.comprehensive_search("where is the http client used", &classification)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_tokenize,
    bench_code_index_build,
    bench_symbol_lookup,
    bench_trigram_search,
    bench_tfidf_build,
    bench_vector_search,
    bench_comprehensive_search,
);
criterion_main!(benches);
