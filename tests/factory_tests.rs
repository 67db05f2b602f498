//! Name-keyed construction through the factory registry.

mod common;

use common::{BossMonster, Monster};
use tabula::{Error, FactoryRegistry};

#[test]
fn test_create_by_name() {
    let types = common::test_types();
    let factories = common::test_factories();

    let object = factories.create(Monster::TYPE_NAME, &types).unwrap();
    assert_eq!(object.type_name(), Monster::TYPE_NAME);

    let monster = object.as_any().downcast_ref::<Monster>().unwrap();
    assert_eq!(monster.name.value(), "Unnamed");
    assert!(object.attributes().borrow().find("Name").is_some());
}

#[test]
fn test_created_instances_are_distinct() {
    let types = common::test_types();
    let factories = common::test_factories();

    let a = factories.create(BossMonster::TYPE_NAME, &types).unwrap();
    let b = factories.create(BossMonster::TYPE_NAME, &types).unwrap();

    let boss_a = a.as_any().downcast_ref::<BossMonster>().unwrap();
    let boss_b = b.as_any().downcast_ref::<BossMonster>().unwrap();
    boss_a.rage.set_value(50.0);
    assert_eq!(boss_b.rage.value(), 0.0);
}

#[test]
fn test_unknown_name_fails() {
    let types = common::test_types();
    let factories = common::test_factories();
    assert!(matches!(
        factories.create("Dragon", &types),
        Err(Error::UnknownType { .. })
    ));
}

#[test]
fn test_duplicate_registration_rejected() {
    let mut factories = common::test_factories();
    assert!(matches!(
        factories.register(Monster::TYPE_NAME, Monster::create),
        Err(Error::DuplicateRegistration { .. })
    ));
}

#[test]
fn test_unregister() {
    let mut factories = common::test_factories();
    let types = common::test_types();

    assert!(factories.unregister(Monster::TYPE_NAME));
    assert!(!factories.unregister(Monster::TYPE_NAME));
    assert!(!factories.contains(Monster::TYPE_NAME));
    assert!(factories.create(Monster::TYPE_NAME, &types).is_err());
}

#[test]
fn test_empty_registry() {
    let registry = FactoryRegistry::new();
    assert!(registry.is_empty());
    assert_eq!(registry.len(), 0);
}
