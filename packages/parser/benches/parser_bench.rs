use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ncd_parser::{parse_html, Selector, Stylesheet};

const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Landing</title>
    <link rel="stylesheet" href="styles/main.css">
</head>
<body>
    <header>
        <nav>
            <ul class="nav-links">
                <li><a href="index.html" class="nav-link">Home</a></li>
                <li><a href="about.html" class="nav-link">About</a></li>
            </ul>
        </nav>
    </header>
    <main>
        <section class="hero">
            <h1>Welcome</h1>
            <p>Fast pages, edited in place.</p>
            <a href="signup.html" class="btn btn-primary">Sign up</a>
            <img src="hero.png" alt="Hero">
        </section>
    </main>
    <script>if (a < b) { console.log("<p>"); }</script>
</body>
</html>
"#;

const STYLES: &str = r#"
body { margin: 0; font-family: sans-serif; }
.hero { padding: 4rem 2rem; background: url("hero-bg.png") no-repeat; }
.btn-primary { color: white; background: #3366ff; }
@media (max-width: 600px) {
    .hero { padding: 2rem 1rem; }
}
"#;

fn parse_page(c: &mut Criterion) {
    c.bench_function("parse_html_page", |b| b.iter(|| parse_html(black_box(PAGE))));
}

fn select_elements(c: &mut Criterion) {
    let doc = parse_html(PAGE);
    let selector = Selector::parse("ul.nav-links a[href]").unwrap();
    c.bench_function("select_nav_links", |b| {
        b.iter(|| doc.select(black_box(&selector)))
    });
}

fn parse_stylesheet(c: &mut Criterion) {
    c.bench_function("parse_stylesheet", |b| {
        b.iter(|| Stylesheet::parse(black_box(STYLES)))
    });
}

criterion_group!(benches, parse_page, select_elements, parse_stylesheet);
criterion_main!(benches);
