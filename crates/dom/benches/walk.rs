use criterion::{black_box, criterion_group, criterion_main, Criterion};
use markdom::{Dialect, Document};

fn synthetic_page(sections: usize, paragraphs: usize) -> String {
    let mut out = String::from("<html><body>");
    for s in 0..sections {
        out.push_str(&format!("<section id=\"s{}\" class=\"block wide\">", s));
        for p in 0..paragraphs {
            out.push_str(&format!("<p class=\"text c{}\">paragraph {} {}</p>", p % 4, s, p));
        }
        out.push_str("</section>");
    }
    out.push_str("</body></html>");
    out
}

fn bench_parse_and_query(c: &mut Criterion) {
    let markup = synthetic_page(50, 40);
    let doc = Document::parse_str(&markup, Dialect::Html).unwrap();
    let root = doc.root().unwrap();

    c.bench_function("parse_2k_nodes", |b| {
        b.iter(|| Document::parse_str(black_box(&markup), Dialect::Html).unwrap())
    });

    c.bench_function("elements_by_tag", |b| {
        b.iter(|| doc.elements_by_tag(black_box(root), "p").unwrap())
    });

    c.bench_function("elements_by_class", |b| {
        b.iter(|| doc.elements_by_class(black_box(root), "text c1").unwrap())
    });

    c.bench_function("element_by_id_deep", |b| {
        b.iter(|| doc.element_by_id(black_box(root), "s49").unwrap())
    });
}

criterion_group!(benches, bench_parse_and_query);
criterion_main!(benches);
