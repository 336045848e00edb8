use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use larder_catalog::{ComponentRef, FinishedGood, FinishedGoodId, Ingredient, IngredientId, Material};
use larder_engine::{Engine, IngredientPurchase};
use larder_infra::EngineConfig;
use rust_decimal::Decimal;

fn engine() -> Engine {
    Engine::new(&EngineConfig::default()).unwrap()
}

/// One ingredient spread across `lots` purchases of 1 kg each.
fn setup_lots(lots: usize) -> (Engine, IngredientId) {
    let engine = engine();
    let flour = engine
        .catalog()
        .add_ingredient(None, Ingredient::new("flour", "Flour", "baking", "kg").unwrap())
        .unwrap();
    for i in 0..lots {
        let price = Decimal::from(2 + (i % 5) as i64);
        engine
            .ledger()
            .record_purchase(None, IngredientPurchase::new(flour, Decimal::ONE, "kg", price))
            .unwrap();
    }
    (engine, flour)
}

/// A chain of gift boxes, each containing the previous one plus packaging.
fn setup_nested_goods(depth: usize) -> (Engine, FinishedGoodId) {
    let engine = engine();
    let catalog = engine.catalog();
    let tissue = catalog
        .add_material(None, Material::new("tissue", "Tissue paper", "packaging", "sheet").unwrap())
        .unwrap();
    let product = catalog.add_material_product(None, tissue, "White tissue", None, None).unwrap();
    engine
        .materials()
        .record_purchase(None, product.id, 1, Decimal::from(5), Decimal::from(100), "sheet")
        .unwrap();

    let mut inner: Option<FinishedGoodId> = None;
    for level in 0..depth {
        let good = catalog
            .add_finished_good(None, FinishedGood::new(format!("box-{level}"), format!("Box {level}")).unwrap())
            .unwrap();
        catalog
            .add_composition(None, good, ComponentRef::Packaging(product.id), Decimal::from(2), false)
            .unwrap();
        if let Some(child) = inner {
            catalog
                .add_composition(None, good, ComponentRef::FinishedGood(child), Decimal::ONE, false)
                .unwrap();
        }
        inner = Some(good);
    }
    (engine, inner.unwrap())
}

fn bench_fifo_preview(c: &mut Criterion) {
    let mut group = c.benchmark_group("fifo_preview");

    for lots in [10usize, 100, 1_000].iter() {
        let (engine, flour) = setup_lots(*lots);
        let need = Decimal::from(*lots as i64) - Decimal::new(5, 1);
        group.throughput(Throughput::Elements(*lots as u64));
        group.bench_with_input(BenchmarkId::new("dry_run_across_lots", lots), lots, |b, _| {
            b.iter(|| {
                engine
                    .ledger()
                    .consume_fifo(None, flour, black_box(need), "kg", true)
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn bench_cost_rollup(c: &mut Criterion) {
    let mut group = c.benchmark_group("cost_rollup");

    for depth in [1usize, 4, 16].iter() {
        let (engine, outer) = setup_nested_goods(*depth);
        group.bench_with_input(BenchmarkId::new("nested_finished_goods", depth), depth, |b, _| {
            b.iter(|| engine.costs().calculate_current_cost(black_box(outer)).unwrap());
        });
    }

    group.finish();
}

fn bench_weighted_average_purchase(c: &mut Criterion) {
    let mut group = c.benchmark_group("weighted_average");
    group.sample_size(500);

    group.bench_function("record_purchase", |b| {
        let engine = engine();
        let bags = engine
            .catalog()
            .add_material(None, Material::new("bag", "Bag", "packaging", "each").unwrap())
            .unwrap();
        let product = engine.catalog().add_material_product(None, bags, "Kraft bag", None, None).unwrap();
        b.iter(|| {
            engine
                .materials()
                .record_purchase(None, product.id, 1, black_box(Decimal::from(12)), Decimal::from(100), "each")
                .unwrap()
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_fifo_preview,
    bench_cost_rollup,
    bench_weighted_average_purchase
);
criterion_main!(benches);
