use catalog::{CatalogStore, InMemoryCatalogStore, NewComponent, NewProduct, Product};
use criterion::{Criterion, criterion_group, criterion_main};
use reconcile::{InMemoryAuditSink, RequirementCalculator, ScanItem, StockEngine};

/// Seeds `singles` base products plus one bundle over the first five.
fn seed(rt: &tokio::runtime::Runtime, singles: usize) -> (InMemoryCatalogStore, Vec<Product>, Product) {
    let store = InMemoryCatalogStore::new();
    rt.block_on(async {
        let mut products = Vec::with_capacity(singles);
        for i in 0..singles {
            let product = store
                .create_product(NewProduct::single(
                    format!("BENCH-{i}"),
                    format!("Bench Product {i}"),
                    1_000_000,
                ))
                .await
                .unwrap();
            products.push(product);
        }

        let kit = store
            .create_product(NewProduct::bundle("BENCH-KIT", "Bench Kit"))
            .await
            .unwrap();
        for (i, child) in products.iter().take(5).enumerate() {
            store
                .create_component(NewComponent::new(kit.id, child.id, i as u32 + 1))
                .await
                .unwrap();
        }
        (store, products, kit)
    })
}

fn bench_calculate_singles(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (store, products, _) = seed(&rt, 100);
    let calculator = RequirementCalculator::new(store);
    let items: Vec<ScanItem> = products
        .iter()
        .cycle()
        .take(500)
        .map(|p| ScanItem::by_id(p.id))
        .collect();

    c.bench_function("reconcile/calculate_500_singles", |b| {
        b.iter(|| {
            rt.block_on(async {
                calculator.calculate(&items).await.unwrap();
            });
        });
    });
}

fn bench_calculate_bundles(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (store, _, kit) = seed(&rt, 10);
    let calculator = RequirementCalculator::new(store);
    let items: Vec<ScanItem> = (0..200).map(|_| ScanItem::by_barcode(kit.barcode.clone())).collect();

    c.bench_function("reconcile/calculate_200_bundles", |b| {
        b.iter(|| {
            rt.block_on(async {
                calculator.calculate(&items).await.unwrap();
            });
        });
    });
}

fn bench_commit_deduction(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (store, products, _) = seed(&rt, 50);
    let engine = StockEngine::new(store, InMemoryAuditSink::new());
    let items: Vec<ScanItem> = products.iter().map(|p| ScanItem::by_id(p.id)).collect();

    c.bench_function("reconcile/commit_50_products", |b| {
        b.iter(|| {
            rt.block_on(async {
                engine.commit_deduction(&items, "bench").await;
            });
        });
    });
}

criterion_group!(
    benches,
    bench_calculate_singles,
    bench_calculate_bundles,
    bench_commit_deduction
);
criterion_main!(benches);
