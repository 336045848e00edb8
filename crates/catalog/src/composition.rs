//! Polymorphic bill-of-materials.
//!
//! A [`Composition`] row says "one `assembly` contains `component_quantity` of
//! exactly one component". In memory the component is the [`ComponentRef`] sum
//! type; at the storage boundary it is five nullable columns
//! ([`CompositionRow`]), converted back with a validating `TryFrom`.

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use larder_core::{DomainError, DomainResult, define_id, ensure_positive};

use crate::definitions::{FinishedGoodId, FinishedUnitId, MaterialId, MaterialProductId, MaterialUnitId};

define_id!(CompositionId, "CompositionId");

/// Exactly one referenced component.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ComponentRef {
    FinishedUnit(FinishedUnitId),
    FinishedGood(FinishedGoodId),
    /// Packaging is a concrete material product consumed as-is.
    Packaging(MaterialProductId),
    MaterialUnit(MaterialUnitId),
    Material(MaterialId),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    FinishedUnit,
    FinishedGood,
    Packaging,
    MaterialUnit,
    Material,
}

impl ComponentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ComponentKind::FinishedUnit => "finished unit",
            ComponentKind::FinishedGood => "finished good",
            ComponentKind::Packaging => "packaging",
            ComponentKind::MaterialUnit => "material unit",
            ComponentKind::Material => "material",
        }
    }
}

impl core::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ComponentRef {
    pub fn kind(&self) -> ComponentKind {
        match self {
            ComponentRef::FinishedUnit(_) => ComponentKind::FinishedUnit,
            ComponentRef::FinishedGood(_) => ComponentKind::FinishedGood,
            ComponentRef::Packaging(_) => ComponentKind::Packaging,
            ComponentRef::MaterialUnit(_) => ComponentKind::MaterialUnit,
            ComponentRef::Material(_) => ComponentKind::Material,
        }
    }

    /// Only abstract material references may defer their product choice.
    pub fn supports_generic(&self) -> bool {
        matches!(self, ComponentRef::Material(_) | ComponentRef::MaterialUnit(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Composition {
    id: CompositionId,
    assembly_id: FinishedGoodId,
    component: ComponentRef,
    component_quantity: Decimal,
    is_generic: bool,
}

impl Composition {
    pub fn new(
        assembly_id: FinishedGoodId,
        component: ComponentRef,
        component_quantity: Decimal,
        is_generic: bool,
    ) -> DomainResult<Self> {
        Self::restore(CompositionId::new(), assembly_id, component, component_quantity, is_generic)
    }

    fn restore(
        id: CompositionId,
        assembly_id: FinishedGoodId,
        component: ComponentRef,
        component_quantity: Decimal,
        is_generic: bool,
    ) -> DomainResult<Self> {
        ensure_positive("component quantity", component_quantity)?;
        if is_generic && !component.supports_generic() {
            return Err(DomainError::validation(format!(
                "a {} component cannot be generic; only material and material unit components can",
                component.kind()
            )));
        }
        if component == ComponentRef::FinishedGood(assembly_id) {
            return Err(DomainError::validation("a finished good cannot contain itself"));
        }
        Ok(Self {
            id,
            assembly_id,
            component,
            component_quantity,
            is_generic,
        })
    }

    pub fn id(&self) -> CompositionId {
        self.id
    }

    pub fn assembly_id(&self) -> FinishedGoodId {
        self.assembly_id
    }

    pub fn component(&self) -> ComponentRef {
        self.component
    }

    pub fn component_quantity(&self) -> Decimal {
        self.component_quantity
    }

    pub fn is_generic(&self) -> bool {
        self.is_generic
    }

    pub fn references(&self, target: ComponentRef) -> bool {
        self.component == target
    }
}

/// Storage shape: one nullable column per component kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionRow {
    pub id: CompositionId,
    pub assembly_id: FinishedGoodId,
    pub finished_unit_id: Option<FinishedUnitId>,
    pub finished_good_id: Option<FinishedGoodId>,
    pub packaging_product_id: Option<MaterialProductId>,
    pub material_unit_id: Option<MaterialUnitId>,
    pub material_id: Option<MaterialId>,
    pub component_quantity: Decimal,
    #[serde(default)]
    pub is_generic: bool,
}

impl CompositionRow {
    /// Number of populated component columns; valid rows have exactly one.
    pub fn populated_columns(&self) -> usize {
        [
            self.finished_unit_id.is_some(),
            self.finished_good_id.is_some(),
            self.packaging_product_id.is_some(),
            self.material_unit_id.is_some(),
            self.material_id.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count()
    }

    pub fn component(&self) -> DomainResult<ComponentRef> {
        let populated = self.populated_columns();
        if populated != 1 {
            return Err(DomainError::validation(format!(
                "composition {} must reference exactly one component, found {populated}",
                self.id
            )));
        }
        let component = if let Some(id) = self.finished_unit_id {
            ComponentRef::FinishedUnit(id)
        } else if let Some(id) = self.finished_good_id {
            ComponentRef::FinishedGood(id)
        } else if let Some(id) = self.packaging_product_id {
            ComponentRef::Packaging(id)
        } else if let Some(id) = self.material_unit_id {
            ComponentRef::MaterialUnit(id)
        } else if let Some(id) = self.material_id {
            ComponentRef::Material(id)
        } else {
            return Err(DomainError::invariant("populated column count disagrees with columns"));
        };
        Ok(component)
    }
}

impl From<&Composition> for CompositionRow {
    fn from(c: &Composition) -> Self {
        let mut row = CompositionRow {
            id: c.id,
            assembly_id: c.assembly_id,
            finished_unit_id: None,
            finished_good_id: None,
            packaging_product_id: None,
            material_unit_id: None,
            material_id: None,
            component_quantity: c.component_quantity,
            is_generic: c.is_generic,
        };
        match c.component {
            ComponentRef::FinishedUnit(id) => row.finished_unit_id = Some(id),
            ComponentRef::FinishedGood(id) => row.finished_good_id = Some(id),
            ComponentRef::Packaging(id) => row.packaging_product_id = Some(id),
            ComponentRef::MaterialUnit(id) => row.material_unit_id = Some(id),
            ComponentRef::Material(id) => row.material_id = Some(id),
        }
        row
    }
}

impl TryFrom<CompositionRow> for Composition {
    type Error = DomainError;

    fn try_from(row: CompositionRow) -> Result<Self, Self::Error> {
        let component = row.component()?;
        Composition::restore(row.id, row.assembly_id, component, row.component_quantity, row.is_generic)
    }
}

/// Would adding `child` as a component of `parent` close a loop through
/// nested finished goods?
pub fn creates_cycle<'a>(
    compositions: impl IntoIterator<Item = &'a Composition>,
    parent: FinishedGoodId,
    child: FinishedGoodId,
) -> bool {
    if parent == child {
        return true;
    }
    let mut children: HashMap<FinishedGoodId, Vec<FinishedGoodId>> = HashMap::new();
    for c in compositions {
        if let ComponentRef::FinishedGood(nested) = c.component {
            children.entry(c.assembly_id).or_default().push(nested);
        }
    }

    // Does `parent` already appear below `child`?
    let mut stack = vec![child];
    let mut seen = HashSet::new();
    while let Some(current) = stack.pop() {
        if current == parent {
            return true;
        }
        if !seen.insert(current) {
            continue;
        }
        if let Some(next) = children.get(&current) {
            stack.extend(next.iter().copied());
        }
    }
    false
}
