use criterion::{black_box, criterion_group, criterion_main, Criterion};
use scholarfed::{merge, Author, Doi, ProviderTag, ScholarlyDocument};

fn sample(provider: ProviderTag, id: &str, title: &str, doi: &str) -> ScholarlyDocument {
    let mut doc = ScholarlyDocument::new(provider, id, title);
    doc.doi = Doi::parse(doi);
    doc.authors = vec![Author::new("Jane Doe"), Author::new("John Roe")];
    doc.citation_count = 42;
    doc
}

fn bench_merge(c: &mut Criterion) {
    let a = sample(ProviderTag::OpenAlex, "1", "A Study of Things", "10.1038/x");
    let b = sample(ProviderTag::Crossref, "2", "A Study of Things (Extended)", "10.1038/x");
    c.bench_function("merge_two_documents", |bencher| {
        bencher.iter(|| black_box(merge(black_box(&a), black_box(&b))));
    });
}

fn bench_title_jaccard(c: &mut Criterion) {
    let a = sample(ProviderTag::OpenAlex, "1", "Deep Learning for Genomic Sequence Analysis", "10.1038/x");
    let b = sample(ProviderTag::SemanticScholar, "2", "Deep Learning for Genomic Sequence Modeling", "10.1038/y");
    c.bench_function("title_jaccard", |bencher| {
        bencher.iter(|| black_box(a.title_jaccard(black_box(&b))));
    });
}

criterion_group!(benches, bench_merge, bench_title_jaccard);
criterion_main!(benches);
