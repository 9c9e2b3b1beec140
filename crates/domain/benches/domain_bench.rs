use common::{Money, ProductId};
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use domain::{FolioGenerator, Product, SharedCart, pricing};

fn catalog(n: i64) -> Vec<Product> {
    (1..=n)
        .map(|id| {
            Product::new(
                ProductId::new(id),
                format!("Bench product {id}"),
                Money::from_cents(id * 137),
                "Bench",
                1_000,
            )
            .unwrap()
        })
        .collect()
}

fn bench_add_item(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let products = catalog(20);
    let cart = SharedCart::new();

    c.bench_function("cart/add_item", |b| {
        let mut i = 0;
        b.iter(|| {
            rt.block_on(cart.add_item(&products[i % products.len()]));
            i += 1;
        });
    });
}

fn bench_add_remove_cycle(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let products = catalog(10);

    c.bench_function("cart/add_remove_cycle", |b| {
        b.iter(|| {
            rt.block_on(async {
                let cart = SharedCart::new();
                for product in &products {
                    cart.add_item(product).await;
                }
                for product in &products {
                    cart.remove_item(product.id).await;
                }
                black_box(cart.snapshot().await)
            })
        });
    });
}

fn bench_snapshot(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let cart = SharedCart::new();
    rt.block_on(async {
        for product in &catalog(50) {
            cart.add_item(product).await;
        }
    });

    c.bench_function("cart/snapshot_50_lines", |b| {
        b.iter(|| black_box(rt.block_on(cart.snapshot())));
    });
}

fn bench_tier_discount(c: &mut Criterion) {
    let subtotals: Vec<Money> = (0..64).map(|i| Money::from_cents(i * 4_999)).collect();

    c.bench_function("pricing/tier_discount", |b| {
        b.iter(|| {
            for subtotal in &subtotals {
                black_box(pricing::tier_discount(*subtotal));
            }
        });
    });
}

fn bench_folio(c: &mut Criterion) {
    let generator = FolioGenerator::new();

    c.bench_function("order/next_folio", |b| {
        b.iter(|| black_box(generator.next()));
    });
}

criterion_group!(
    benches,
    bench_add_item,
    bench_add_remove_cycle,
    bench_snapshot,
    bench_tier_discount,
    bench_folio,
);
criterion_main!(benches);
