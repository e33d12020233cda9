use bodispatch::router::{RouteResolver, RouteTable};
use bodispatch::routes::{load_routes_from_str, DocFormat, HandlerId};
use criterion::{criterion_group, criterion_main, Criterion};
use http::Method;
use std::hint::black_box;

fn route_file() -> String {
    let mut doc = String::from("routes:\n");
    for i in 0..200 {
        doc.push_str(&format!(
            "  - {{ method: GET, path: /static/page-{i}, handler: {{ name: Page, action: show-{i} }} }}\n"
        ));
    }
    for i in 0..50 {
        doc.push_str(&format!(
            "  - {{ method: GET, path: /shop/category-{i}/item, parameters: [id], handler: {{ name: Item, path: /shop/, action: show }} }}\n"
        ));
        doc.push_str(&format!(
            "  - {{ method: GET, path: /shop/category-{i}/item, parameters: [id, variant], handler: {{ name: Item, path: /shop/, action: variant }} }}\n"
        ));
    }
    doc.push_str("  - { method: GET, path: /legacy, redirect: /static/page-7 }\n");
    doc
}

fn resolver() -> RouteResolver {
    let defs = load_routes_from_str(&route_file(), DocFormat::Yaml).unwrap();
    RouteResolver::new(RouteTable::from_defs(defs).unwrap())
        .with_default(HandlerId::default(), "index")
}

fn bench_resolve(c: &mut Criterion) {
    let r = resolver();
    let cases = [
        ("static", "/static/page-150"),
        ("redirect", "/legacy"),
        ("dynamic_1", "/shop/category-42/item/1234"),
        ("dynamic_2", "/shop/category-42/item/1234/red"),
        ("convention", "/account/user-profile/show-all,xml"),
    ];
    let mut group = c.benchmark_group("resolve");
    for (name, path) in cases {
        group.bench_function(name, |b| {
            b.iter(|| r.resolve(black_box(&Method::GET), black_box(path)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_resolve);
criterion_main!(benches);
