use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ncd_editor::mutations::{add_class, set_style_property, set_text};
use ncd_editor::{inject, selector_for, IdGenerator};

fn page(sections: usize) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html>\n<body>\n<nav><ul class=\"nav-links\"><li><a href=\"index.html\">Home</a></li></ul></nav>\n",
    );
    for i in 0..sections {
        html.push_str(&format!(
            "<section class=\"block\">\n  <h2>Section {i}</h2>\n  <p>Body text for section {i} with <span>inline</span></p>\n  <button type=\"button\">Action {i}</button>\n</section>\n"
        ));
    }
    html.push_str("</body>\n</html>\n");
    html
}

fn bench_inject(c: &mut Criterion) {
    let html = page(50);
    c.bench_function("inject_50_sections", |b| {
        b.iter(|| {
            let mut generator = IdGenerator::new();
            inject(black_box(&html), "index.html", &mut generator)
        })
    });
}

fn bench_mutations(c: &mut Criterion) {
    let mut generator = IdGenerator::new();
    let injected = match inject(&page(50), "index.html", &mut generator) {
        Ok(doc) => doc,
        Err(e) => panic!("injection failed: {}", e),
    };
    let target = selector_for(&injected.records[injected.records.len() / 2].id);

    c.bench_function("set_text_mid_page", |b| {
        b.iter(|| set_text(black_box(&injected.content), &target, "Updated heading"))
    });

    c.bench_function("add_class_mid_page", |b| {
        b.iter(|| add_class(black_box(&injected.content), &target, "highlight"))
    });

    let css: String = injected
        .records
        .iter()
        .map(|r| format!("{} {{\n  color: black;\n}}\n", selector_for(&r.id)))
        .collect();
    c.bench_function("set_style_property_scoped", |b| {
        b.iter(|| set_style_property(black_box(&css), &target, "color", "tomato"))
    });
}

criterion_group!(benches, bench_inject, bench_mutations);
criterion_main!(benches);
