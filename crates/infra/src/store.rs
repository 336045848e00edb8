//! In-memory tables and the transactional unit of work.
//!
//! A [`UnitOfWork`] works on a private copy of the committed [`Tables`]. Commit
//! swaps the copy in; dropping the unit of work without committing discards
//! every change. Lot selection, lot decrement and audit insertion therefore
//! land together or not at all.

use std::collections::BTreeMap;
use std::sync::RwLock;

use tracing::debug;

use larder_assembly::{AssemblyRun, AssemblyRunId};
use larder_catalog::{
    ComponentRef, Composition, CompositionId, CompositionRow, FinishedGood, FinishedGoodId,
    FinishedUnit, FinishedUnitId, Ingredient, IngredientId, Material, MaterialId,
    MaterialProductId, MaterialUnit, MaterialUnitId, Recipe, RecipeId, Supplier, SupplierId,
};
use larder_core::{DomainError, DomainResult, Entity};
use larder_inventory::{InventoryItem, InventoryItemId};
use larder_materials::MaterialProduct;
use larder_production::{ProductionRun, ProductionRunId};

use crate::audit::{AuditRecord, AuditTrail};

/// Every table the engine owns.
///
/// Catalog definitions and live stock are plain maps. Compositions are kept in
/// their five-column storage shape and validated on every write and read.
/// Audit history is reachable only through the insert-only [`AuditTrail`].
#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub suppliers: BTreeMap<SupplierId, Supplier>,
    pub ingredients: BTreeMap<IngredientId, Ingredient>,
    pub recipes: BTreeMap<RecipeId, Recipe>,
    pub finished_units: BTreeMap<FinishedUnitId, FinishedUnit>,
    pub finished_goods: BTreeMap<FinishedGoodId, FinishedGood>,
    pub materials: BTreeMap<MaterialId, Material>,
    pub material_units: BTreeMap<MaterialUnitId, MaterialUnit>,
    pub material_products: BTreeMap<MaterialProductId, MaterialProduct>,
    pub lots: BTreeMap<InventoryItemId, InventoryItem>,
    compositions: BTreeMap<CompositionId, CompositionRow>,
    production_runs: BTreeMap<ProductionRunId, ProductionRun>,
    assembly_runs: BTreeMap<AssemblyRunId, AssemblyRun>,
    audit: AuditTrail,
    sequence: u64,
    version: u64,
}

macro_rules! lookup {
    ($get:ident, $get_mut:ident, $field:ident, $id:ty, $ty:ty, $label:literal) => {
        pub fn $get(&self, id: $id) -> DomainResult<&$ty> {
            self.$field
                .get(&id)
                .ok_or_else(|| DomainError::not_found(format!("{} {}", $label, id)))
        }

        pub fn $get_mut(&mut self, id: $id) -> DomainResult<&mut $ty> {
            self.$field
                .get_mut(&id)
                .ok_or_else(|| DomainError::not_found(format!("{} {}", $label, id)))
        }
    };
}

impl Tables {
    lookup!(supplier, supplier_mut, suppliers, SupplierId, Supplier, "supplier");
    lookup!(ingredient, ingredient_mut, ingredients, IngredientId, Ingredient, "ingredient");
    lookup!(recipe, recipe_mut, recipes, RecipeId, Recipe, "recipe");
    lookup!(finished_unit, finished_unit_mut, finished_units, FinishedUnitId, FinishedUnit, "finished unit");
    lookup!(finished_good, finished_good_mut, finished_goods, FinishedGoodId, FinishedGood, "finished good");
    lookup!(material, material_mut, materials, MaterialId, Material, "material");
    lookup!(material_unit, material_unit_mut, material_units, MaterialUnitId, MaterialUnit, "material unit");
    lookup!(material_product, material_product_mut, material_products, MaterialProductId, MaterialProduct, "material product");
    lookup!(lot, lot_mut, lots, InventoryItemId, InventoryItem, "inventory item");

    /// Next value of the table-wide creation counter.
    pub fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    pub fn supplier_name(&self, id: Option<SupplierId>) -> Option<String> {
        id.and_then(|id| self.suppliers.get(&id)).map(|s| s.name.clone())
    }

    /// Does `component` resolve to a live definition?
    pub fn component_exists(&self, component: ComponentRef) -> bool {
        match component {
            ComponentRef::FinishedUnit(id) => self.finished_units.contains_key(&id),
            ComponentRef::FinishedGood(id) => self.finished_goods.contains_key(&id),
            ComponentRef::Packaging(id) => self.material_products.contains_key(&id),
            ComponentRef::MaterialUnit(id) => self.material_units.contains_key(&id),
            ComponentRef::Material(id) => self.materials.contains_key(&id),
        }
    }

    pub fn component_name(&self, component: ComponentRef) -> DomainResult<String> {
        Ok(match component {
            ComponentRef::FinishedUnit(id) => self.finished_unit(id)?.snapshot_name(),
            ComponentRef::FinishedGood(id) => self.finished_good(id)?.snapshot_name(),
            ComponentRef::Packaging(id) => self.material_product(id)?.snapshot_name(),
            ComponentRef::MaterialUnit(id) => self.material_unit(id)?.snapshot_name(),
            ComponentRef::Material(id) => self.material(id)?.snapshot_name(),
        })
    }

    /// Products backing `material`, in creation order.
    pub fn products_of(&self, material: MaterialId) -> Vec<&MaterialProduct> {
        let mut products: Vec<&MaterialProduct> = self
            .material_products
            .values()
            .filter(|p| p.material_id == material)
            .collect();
        products.sort_by_key(|p| p.sequence);
        products
    }

    pub fn lots_of(&self, ingredient: IngredientId) -> impl Iterator<Item = &InventoryItem> + '_ {
        self.lots.values().filter(move |l| l.ingredient_id() == ingredient)
    }

    // --- compositions (storage boundary) ---

    /// Validate and store a composition as a five-column row.
    pub fn insert_composition(&mut self, composition: &Composition) -> DomainResult<()> {
        let row = CompositionRow::from(composition);
        Composition::try_from(row.clone())?;
        self.compositions.insert(row.id, row);
        Ok(())
    }

    /// Store a row received from outside (import). Rejected unless it maps to
    /// exactly one component.
    pub fn insert_composition_row(&mut self, row: CompositionRow) -> DomainResult<Composition> {
        let composition = Composition::try_from(row.clone())?;
        self.compositions.insert(row.id, row);
        Ok(composition)
    }

    pub fn remove_composition(&mut self, id: CompositionId) -> DomainResult<Composition> {
        let row = self
            .compositions
            .remove(&id)
            .ok_or_else(|| DomainError::not_found(format!("composition {id}")))?;
        restore(row)
    }

    pub fn composition(&self, id: CompositionId) -> DomainResult<Composition> {
        let row = self
            .compositions
            .get(&id)
            .ok_or_else(|| DomainError::not_found(format!("composition {id}")))?;
        restore(row.clone())
    }

    pub fn compositions(&self) -> DomainResult<Vec<Composition>> {
        self.compositions.values().cloned().map(restore).collect()
    }

    pub fn compositions_of(&self, assembly: FinishedGoodId) -> DomainResult<Vec<Composition>> {
        self.compositions
            .values()
            .filter(|row| row.assembly_id == assembly)
            .cloned()
            .map(restore)
            .collect()
    }

    pub fn composition_rows(&self) -> impl Iterator<Item = &CompositionRow> + '_ {
        self.compositions.values()
    }

    /// Number of compositions pointing at `target`.
    pub fn references_to(&self, target: ComponentRef) -> DomainResult<usize> {
        let mut count = 0;
        for row in self.compositions.values() {
            if row.component()? == target {
                count += 1;
            }
        }
        Ok(count)
    }

    // --- production / assembly runs ---

    pub fn insert_production_run(&mut self, run: ProductionRun) {
        self.audit.append(AuditRecord::ProductionRecorded(run.clone()));
        self.production_runs.insert(run.id, run);
    }

    pub fn production_run(&self, id: ProductionRunId) -> DomainResult<&ProductionRun> {
        self.production_runs
            .get(&id)
            .ok_or_else(|| DomainError::not_found(format!("production run {id}")))
    }

    pub fn production_runs(&self) -> impl Iterator<Item = &ProductionRun> + '_ {
        self.production_runs.values()
    }

    /// Remove the run only; its audit children stay in the journal.
    pub fn delete_production_run(&mut self, id: ProductionRunId) -> DomainResult<ProductionRun> {
        self.production_runs
            .remove(&id)
            .ok_or_else(|| DomainError::not_found(format!("production run {id}")))
    }

    pub fn insert_assembly_run(&mut self, run: AssemblyRun) {
        self.audit.append(AuditRecord::AssemblyRecorded(run.clone()));
        self.assembly_runs.insert(run.id, run);
    }

    pub fn assembly_run(&self, id: AssemblyRunId) -> DomainResult<&AssemblyRun> {
        self.assembly_runs
            .get(&id)
            .ok_or_else(|| DomainError::not_found(format!("assembly run {id}")))
    }

    pub fn assembly_runs(&self) -> impl Iterator<Item = &AssemblyRun> + '_ {
        self.assembly_runs.values()
    }

    pub fn delete_assembly_run(&mut self, id: AssemblyRunId) -> DomainResult<AssemblyRun> {
        self.assembly_runs
            .remove(&id)
            .ok_or_else(|| DomainError::not_found(format!("assembly run {id}")))
    }

    // --- audit ---

    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    pub fn append_audit(&mut self, record: AuditRecord) -> u64 {
        self.audit.append(record)
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

fn restore(row: CompositionRow) -> DomainResult<Composition> {
    let id = row.id;
    Composition::try_from(row)
        .map_err(|e| DomainError::invariant(format!("stored composition {id} is invalid: {e}")))
}

/// Committed state plus the entry point for units of work.
#[derive(Debug, Default)]
pub struct Database {
    committed: RwLock<Tables>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> DomainResult<UnitOfWork<'_>> {
        self.begin_as("system")
    }

    /// Open a unit of work attributed to `actor` (recorded on audit entries).
    pub fn begin_as(&self, actor: impl Into<String>) -> DomainResult<UnitOfWork<'_>> {
        let working = self
            .committed
            .read()
            .map_err(|_| DomainError::invariant("database lock poisoned"))?
            .clone();
        Ok(UnitOfWork {
            db: self,
            base_version: working.version,
            working,
            actor: actor.into(),
        })
    }

    /// Read committed state.
    pub fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> DomainResult<T> {
        let tables = self
            .committed
            .read()
            .map_err(|_| DomainError::invariant("database lock poisoned"))?;
        Ok(f(&tables))
    }

    /// Run `f` inside the caller's unit of work, or inside a fresh one that is
    /// committed on success and discarded on error.
    pub fn run<T>(
        &self,
        uow: Option<&mut UnitOfWork<'_>>,
        f: impl FnOnce(&mut UnitOfWork<'_>) -> DomainResult<T>,
    ) -> DomainResult<T> {
        match uow {
            Some(uow) => f(uow),
            None => {
                let mut uow = self.begin()?;
                let out = f(&mut uow)?;
                uow.commit()?;
                Ok(out)
            }
        }
    }
}

/// A transactional scope over a private copy of the tables.
#[derive(Debug)]
pub struct UnitOfWork<'db> {
    db: &'db Database,
    working: Tables,
    base_version: u64,
    actor: String,
}

impl UnitOfWork<'_> {
    pub fn tables(&self) -> &Tables {
        &self.working
    }

    pub fn tables_mut(&mut self) -> &mut Tables {
        &mut self.working
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    /// Publish every change made in this scope.
    ///
    /// Fails if another unit of work committed after this one began; its
    /// changes would otherwise be silently overwritten.
    pub fn commit(mut self) -> DomainResult<()> {
        let mut committed = self
            .db
            .committed
            .write()
            .map_err(|_| DomainError::invariant("database lock poisoned"))?;
        if committed.version != self.base_version {
            return Err(DomainError::invariant(format!(
                "stale unit of work: began at version {}, database is at {}",
                self.base_version, committed.version
            )));
        }
        self.working.version = self.base_version + 1;
        debug!(version = self.working.version, actor = %self.actor, "unit of work committed");
        *committed = std::mem::take(&mut self.working);
        Ok(())
    }

    /// Discard every change made in this scope.
    pub fn rollback(self) {
        debug!(actor = %self.actor, "unit of work rolled back");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn supplier(name: &str) -> Supplier {
        Supplier::new(name, None).unwrap()
    }

    #[test]
    fn uncommitted_changes_are_invisible() {
        let db = Database::new();
        let mut uow = db.begin().unwrap();
        let s = supplier("Mill & Co");
        uow.tables_mut().suppliers.insert(s.id, s);
        uow.rollback();

        assert_eq!(db.read(|t| t.suppliers.len()).unwrap(), 0);
    }

    #[test]
    fn commit_publishes_changes() {
        let db = Database::new();
        let mut uow = db.begin().unwrap();
        let s = supplier("Mill & Co");
        let id = s.id;
        uow.tables_mut().suppliers.insert(id, s);
        uow.commit().unwrap();

        assert_eq!(db.read(|t| t.supplier(id).map(|s| s.name.clone())).unwrap().unwrap(), "Mill & Co");
        assert_eq!(db.read(|t| t.version()).unwrap(), 1);
    }

    #[test]
    fn run_rolls_back_on_error() {
        let db = Database::new();
        let result: DomainResult<()> = db.run(None, |uow| {
            let s = supplier("Mill & Co");
            uow.tables_mut().suppliers.insert(s.id, s);
            Err(DomainError::validation("boom"))
        });
        assert!(result.is_err());
        assert_eq!(db.read(|t| t.suppliers.len()).unwrap(), 0);
    }

    #[test]
    fn run_reuses_callers_scope_without_committing() {
        let db = Database::new();
        let mut outer = db.begin().unwrap();
        db.run(Some(&mut outer), |uow| {
            let s = supplier("Mill & Co");
            uow.tables_mut().suppliers.insert(s.id, s);
            Ok(())
        })
        .unwrap();

        assert_eq!(db.read(|t| t.suppliers.len()).unwrap(), 0);
        assert_eq!(outer.tables().suppliers.len(), 1);
        outer.commit().unwrap();
        assert_eq!(db.read(|t| t.suppliers.len()).unwrap(), 1);
    }

    #[test]
    fn stale_unit_of_work_cannot_commit() {
        let db = Database::new();
        let first = db.begin().unwrap();
        let second = db.begin().unwrap();
        first.commit().unwrap();
        let err = second.commit().unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn lookups_report_not_found() {
        let tables = Tables::default();
        let err = tables.ingredient(IngredientId::new()).unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn composition_rows_are_validated_on_write() {
        let mut tables = Tables::default();
        let fg = FinishedGoodId::new();
        let c = Composition::new(fg, ComponentRef::Material(MaterialId::new()), Decimal::ONE, true).unwrap();
        let mut row = CompositionRow::from(&c);
        row.finished_unit_id = Some(FinishedUnitId::new());

        assert!(tables.insert_composition_row(row).is_err());
        assert_eq!(tables.composition_rows().count(), 0);

        tables.insert_composition(&c).unwrap();
        assert_eq!(tables.compositions_of(fg).unwrap(), vec![c.clone()]);
        assert_eq!(tables.references_to(c.component()).unwrap(), 1);
    }

    #[test]
    fn deleting_a_run_keeps_its_journal_entry() {
        use chrono::Utc;
        use larder_production::YieldOutcome;

        let mut tables = Tables::default();
        let run = ProductionRun::new(
            RecipeId::new(),
            "Cookies",
            FinishedUnitId::new(),
            "Cookie",
            1,
            YieldOutcome::derive(12, 12).unwrap(),
            Decimal::from(6),
            Utc::now(),
            None,
        );
        let id = run.id;
        tables.insert_production_run(run);
        tables.delete_production_run(id).unwrap();

        assert!(tables.production_run(id).is_err());
        assert_eq!(tables.audit().production_records().count(), 1);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn only_committed_work_is_visible(outcomes in prop::collection::vec(any::<bool>(), 0..20)) {
                let db = Database::new();
                let mut committed = 0usize;
                for commit in outcomes {
                    let mut uow = db.begin().unwrap();
                    let s = supplier("Mill & Co");
                    uow.tables_mut().suppliers.insert(s.id, s);
                    if commit {
                        uow.commit().unwrap();
                        committed += 1;
                    }
                    prop_assert_eq!(db.read(|t| t.suppliers.len()).unwrap(), committed);
                    prop_assert_eq!(db.read(|t| t.version()).unwrap(), committed as u64);
                }
            }
        }
    }
}
