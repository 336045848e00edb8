//! Exporting a populated catalog and importing it into a fresh engine.

use rust_decimal::Decimal;

use larder_catalog::{ComponentRef, FinishedGood, FinishedUnit, Ingredient, Material, MaterialUnit, Recipe, RecipeLine, Supplier};
use larder_engine::{Engine, IngredientPurchase, ProductionRequest};
use larder_infra::{CatalogDocument, EngineConfig, export_catalog, import_catalog};

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn engine() -> Engine {
    Engine::new(&EngineConfig::default()).unwrap()
}

/// A small shop with stock on hand and one gift box using every
/// composition kind except nested goods.
fn stocked_shop() -> Engine {
    let engine = engine();
    let catalog = engine.catalog();
    let mill = catalog.add_supplier(None, Supplier::new("Mill & Co", Some("Leeds".into())).unwrap()).unwrap();
    let flour = catalog
        .add_ingredient(None, Ingredient::new("flour", "Flour", "baking", "cup").unwrap().with_density(dec("0.53")).unwrap())
        .unwrap();
    let recipe = catalog
        .add_recipe(
            None,
            Recipe::new(
                "Shortbread",
                12,
                vec![RecipeLine { ingredient_id: flour, quantity: dec("3"), unit: "cup".into() }],
            )
            .unwrap(),
        )
        .unwrap();
    let biscuit = catalog
        .add_finished_unit(None, FinishedUnit::new("shortbread", "Shortbread finger", recipe).unwrap())
        .unwrap();
    let ribbon = catalog
        .add_material(None, Material::new("ribbon", "Ribbon", "trim", "inch").unwrap())
        .unwrap();
    let bow = catalog
        .add_material_unit(None, MaterialUnit::new("bow", "Ribbon bow", ribbon, dec("18")).unwrap())
        .unwrap();
    let tin = catalog
        .add_material(None, Material::new("tin", "Tin", "packaging", "each").unwrap())
        .unwrap();
    let red_tin = catalog
        .add_material_product(None, tin, "Red tin", Some("Tinworks".into()), Some(mill))
        .unwrap();
    catalog.add_material_product(None, ribbon, "Satin ribbon", None, None).unwrap();

    let gift = catalog
        .add_finished_good(None, FinishedGood::new("gift-tin", "Gift tin").unwrap())
        .unwrap();
    catalog.add_composition(None, gift, ComponentRef::FinishedUnit(biscuit), dec("6"), false).unwrap();
    catalog.add_composition(None, gift, ComponentRef::Packaging(red_tin.id), dec("1"), false).unwrap();
    catalog.add_composition(None, gift, ComponentRef::MaterialUnit(bow), dec("1"), false).unwrap();
    catalog.add_composition(None, gift, ComponentRef::Material(ribbon), dec("6"), true).unwrap();

    engine
        .ledger()
        .record_purchase(None, IngredientPurchase::new(flour, dec("9"), "cup", dec("2.70")).from_supplier(mill))
        .unwrap();
    engine.materials().record_purchase(None, red_tin.id, 4, dec("3.00"), dec("1"), "each").unwrap();
    engine
        .production()
        .record_production(None, ProductionRequest::new(recipe, biscuit, 1, 12))
        .unwrap();
    engine
}

#[test]
fn export_import_preserves_definitions_and_drops_stock() {
    let source = stocked_shop();
    let document = export_catalog(source.database()).unwrap();
    let json = document.to_json().unwrap();

    let target = engine();
    import_catalog(target.database(), CatalogDocument::from_json(&json).unwrap()).unwrap();
    let imported = export_catalog(target.database()).unwrap();

    assert_eq!(imported.suppliers, document.suppliers);
    assert_eq!(imported.ingredients, document.ingredients);
    assert_eq!(imported.recipes, document.recipes);
    assert_eq!(imported.materials, document.materials);
    assert_eq!(imported.material_units, document.material_units);
    assert_eq!(imported.compositions.len(), 4);
    assert_eq!(imported.material_products.len(), 2);

    let unit = &imported.finished_units[0];
    assert_eq!(unit.name, "Shortbread finger");
    assert_eq!(unit.inventory_count, 0);
    let tin = imported.material_products.iter().find(|p| p.name == "Red tin").unwrap();
    assert_eq!(tin.brand.as_deref(), Some("Tinworks"));
    assert_eq!(tin.supplier_id, Some(document.suppliers[0].id));
}

#[test]
fn imported_catalog_has_no_cost_history() {
    let source = stocked_shop();
    let document = export_catalog(source.database()).unwrap();
    let gift = document.finished_goods[0].id;
    assert!(source.costs().calculate_current_cost(gift).unwrap() > Decimal::ZERO);

    let target = engine();
    import_catalog(target.database(), document).unwrap();

    assert_eq!(target.costs().calculate_current_cost(gift).unwrap(), Decimal::ZERO);
    assert_eq!(target.ledger().valuation().unwrap().total_value, Decimal::ZERO);
    assert_eq!(target.recorder().journal_len().unwrap(), 0);
}
