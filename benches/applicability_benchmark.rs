use a11y_harness::wcag::{self, ContentCategory, Level, TestingScope};
use criterion::{Criterion, black_box, criterion_group, criterion_main};

fn benchmark_applicability(c: &mut Criterion) {
    let scope = TestingScope::new()
        .set(ContentCategory::Forms, true)
        .set(ContentCategory::Video, false)
        .set(ContentCategory::Audio, true)
        .set(ContentCategory::Timeouts, false);

    c.bench_function("applicability_resolve", |b| {
        b.iter(|| {
            let resolved = wcag::applicable_criteria(black_box(&scope), Level::AA);
            assert!(!resolved.is_empty());
        })
    });
}

criterion_group!(benches, benchmark_applicability);
criterion_main!(benches);
