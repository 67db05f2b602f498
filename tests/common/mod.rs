//! Concrete reflected types shared by the integration suites.

#![allow(dead_code)]

use std::any::Any;
use std::sync::Arc;

use tabula::{
    ExternalSlot, FactoryRegistry, Field, Reflected, Result, Scope, ScopeHandle, Signature,
    TypeRegistry, ValueKind, Vec4,
};

/// A reflected game object with one of each scalar field kind plus a
/// prescribed nested table.
pub struct Monster {
    pub name: Field<String>,
    pub steps: Field<i32>,
    pub speed: Field<f32>,
    pub heading: Field<Vec4>,
    attributes: ScopeHandle,
}

impl Monster {
    pub const TYPE_NAME: &'static str = "Monster";

    pub fn signatures() -> Vec<Signature> {
        vec![
            Signature::external("Name", ValueKind::String, 1),
            Signature::external("Steps", ValueKind::Integer, 1),
            Signature::external("Speed", ValueKind::Float, 1),
            Signature::external("Heading", ValueKind::Vector, 1),
            Signature::nested("Gear", 1),
        ]
    }

    pub fn new(types: &TypeRegistry) -> Result<Monster> {
        let monster = Monster {
            name: Field::new(String::from("Unnamed")),
            steps: Field::new(0),
            speed: Field::new(1.0),
            heading: Field::new([0.0, 0.0, 0.0, 1.0]),
            attributes: Scope::new_root(),
        };
        types.populate(&monster)?;
        Ok(monster)
    }

    pub fn create(types: &TypeRegistry) -> Result<Box<dyn Reflected>> {
        Ok(Box::new(Monster::new(types)?))
    }

    /// Deep copy: fields are copied into fresh backing stores and the
    /// attribute table is re-populated so its cells alias the copy's own
    /// fields rather than the source's.
    pub fn duplicate(&self, types: &TypeRegistry) -> Result<Monster> {
        let copy = Monster {
            name: self.name.clone(),
            steps: self.steps.clone(),
            speed: self.speed.clone(),
            heading: self.heading.clone(),
            attributes: Scope::deep_clone(&self.attributes),
        };
        types.populate(&copy)?;
        Ok(copy)
    }
}

impl Reflected for Monster {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn attributes(&self) -> &ScopeHandle {
        &self.attributes
    }

    fn field_slot(&self, name: &str) -> Option<ExternalSlot> {
        match name {
            "Name" => Some(self.name.external_slot()),
            "Steps" => Some(self.steps.external_slot()),
            "Speed" => Some(self.speed.external_slot()),
            "Heading" => Some(self.heading.external_slot()),
            _ => None,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Derived from `Monster` in the registry; answers for the inherited
/// attribute names as well as its own.
pub struct BossMonster {
    pub name: Field<String>,
    pub steps: Field<i32>,
    pub speed: Field<f32>,
    pub heading: Field<Vec4>,
    pub rage: Field<f32>,
    attributes: ScopeHandle,
}

impl BossMonster {
    pub const TYPE_NAME: &'static str = "BossMonster";

    pub fn signatures() -> Vec<Signature> {
        vec![Signature::external("Rage", ValueKind::Float, 1)]
    }

    pub fn new(types: &TypeRegistry) -> Result<BossMonster> {
        let boss = BossMonster {
            name: Field::new(String::from("Unnamed")),
            steps: Field::new(0),
            speed: Field::new(1.0),
            heading: Field::new([0.0, 0.0, 0.0, 1.0]),
            rage: Field::new(0.0),
            attributes: Scope::new_root(),
        };
        types.populate(&boss)?;
        Ok(boss)
    }

    pub fn create(types: &TypeRegistry) -> Result<Box<dyn Reflected>> {
        Ok(Box::new(BossMonster::new(types)?))
    }
}

impl Reflected for BossMonster {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn attributes(&self) -> &ScopeHandle {
        &self.attributes
    }

    fn field_slot(&self, name: &str) -> Option<ExternalSlot> {
        match name {
            "Name" => Some(self.name.external_slot()),
            "Steps" => Some(self.steps.external_slot()),
            "Speed" => Some(self.speed.external_slot()),
            "Heading" => Some(self.heading.external_slot()),
            "Rage" => Some(self.rage.external_slot()),
            _ => None,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A signature registry with both test types installed
pub fn test_types() -> TypeRegistry {
    let mut types = TypeRegistry::new();
    types
        .add_type(Monster::TYPE_NAME, Monster::signatures(), None)
        .unwrap();
    types
        .add_type(
            BossMonster::TYPE_NAME,
            BossMonster::signatures(),
            Some(Monster::TYPE_NAME),
        )
        .unwrap();
    types
}

/// A factory registry with both test types installed
pub fn test_factories() -> FactoryRegistry {
    let mut factories = FactoryRegistry::new();
    factories
        .register(Monster::TYPE_NAME, Monster::create)
        .unwrap();
    factories
        .register(BossMonster::TYPE_NAME, BossMonster::create)
        .unwrap();
    factories
}

/// Both registries, shared and ready for a coordinator
pub fn registries() -> (Arc<TypeRegistry>, Arc<FactoryRegistry>) {
    (Arc::new(test_types()), Arc::new(test_factories()))
}
