//! Tests for modularizer-core: module names, name-list normalisation, instances, errors

use modularizer_core::*;
use std::rc::Rc;

// ===========================================================================
// ModuleName
// ===========================================================================

#[test]
fn module_name_new_and_display() {
    let name = ModuleName::new("lib.monkey").unwrap();
    assert_eq!(name.as_str(), "lib.monkey");
    assert_eq!(format!("{}", name), "lib.monkey");
}

#[test]
fn module_name_trims_whitespace() {
    let name = ModuleName::new("  router.items ").unwrap();
    assert_eq!(name.as_str(), "router.items");
}

#[test]
fn module_name_rejects_empty() {
    let err = ModuleName::new("").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    let err = ModuleName::new("   ").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn module_name_rejects_event_separator() {
    let err = ModuleName::new("my:module").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(err.to_string().contains("my:module"));
}

#[test]
fn module_name_borrows_as_str_for_lookups() {
    use std::collections::HashMap;
    let mut map = HashMap::new();
    map.insert(ModuleName::new("a").unwrap(), 1);
    assert_eq!(map.get("a"), Some(&1));
    assert_eq!(map.get("b"), None);
}

#[test]
fn module_name_serde() {
    let name = ModuleName::new("engine.mvc").unwrap();
    let json = serde_json::to_string(&name).unwrap();
    assert_eq!(json, r#""engine.mvc""#);
    let back: ModuleName = serde_json::from_str(&json).unwrap();
    assert_eq!(back, name);
    assert!(serde_json::from_str::<ModuleName>(r#""bad:name""#).is_err());
}

// ===========================================================================
// IntoModuleNames
// ===========================================================================

#[test]
fn single_name_normalises_to_list() {
    let names = "my.module".into_module_names().unwrap();
    assert_eq!(names.len(), 1);
    assert_eq!(names[0].as_str(), "my.module");
}

#[test]
fn list_preserves_order() {
    let names = ["c", "a", "b"].into_module_names().unwrap();
    let strs: Vec<&str> = names.iter().map(|n| n.as_str()).collect();
    assert_eq!(strs, vec!["c", "a", "b"]);
}

#[test]
fn empty_list_is_invalid_argument() {
    let err = Vec::<String>::new().into_module_names().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    let err = Vec::<ModuleName>::new().into_module_names().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn list_with_one_bad_name_is_invalid_argument() {
    let err = vec!["ok", ""].into_module_names().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

// ===========================================================================
// Instance
// ===========================================================================

#[test]
fn instance_downcast() {
    let inst = Instance::new(42u32);
    assert!(inst.is_resolved());
    assert_eq!(inst.downcast_ref::<u32>(), Some(&42));
    assert_eq!(inst.downcast_ref::<String>(), None);
    let rc: Rc<u32> = inst.downcast::<u32>().unwrap();
    assert_eq!(*rc, 42);
}

#[test]
fn instance_clones_share_identity() {
    let a = Instance::new(String::from("shared"));
    let b = a.clone();
    let c = Instance::new(String::from("shared"));
    assert!(Instance::ptr_eq(&a, &b));
    assert!(!Instance::ptr_eq(&a, &c));
}

#[test]
fn unresolved_sentinel() {
    let u = Instance::unresolved();
    assert!(!u.is_resolved());
    assert!(u.downcast_ref::<u32>().is_none());
    assert!(!Instance::ptr_eq(&u, &Instance::unresolved()));
    assert_eq!(format!("{:?}", u), "Instance(unresolved)");
}

// ===========================================================================
// Error
// ===========================================================================

#[test]
fn error_kinds() {
    assert_eq!(Error::invalid_argument("x").kind(), ErrorKind::InvalidArgument);
    assert_eq!(Error::invalid_definition("x").kind(), ErrorKind::InvalidDefinition);
    assert_eq!(Error::invalid_state("x").kind(), ErrorKind::InvalidState);
    assert_eq!(Error::circular(["a", "a"]).kind(), ErrorKind::CircularDependency);
    assert_eq!(Error::timeout("x").kind(), ErrorKind::Timeout);
    assert_eq!(Error::from(anyhow::anyhow!("boom")).kind(), ErrorKind::Factory);
}

#[test]
fn circular_message_lists_chain() {
    let err = Error::circular(["a", "b", "c", "a"]);
    assert_eq!(err.to_string(), "circular dependency: a -> b -> c -> a");
}

#[test]
fn factory_error_is_transparent() {
    let err = Error::from(anyhow::anyhow!("factory exploded"));
    assert_eq!(err.to_string(), "factory exploded");
}

#[test]
fn error_kind_display_and_serde() {
    assert_eq!(ErrorKind::Timeout.to_string(), "Timeout");
    assert_eq!(
        serde_json::to_string(&ErrorKind::CircularDependency).unwrap(),
        r#""circular_dependency""#
    );
}
