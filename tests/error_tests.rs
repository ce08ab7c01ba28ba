//! Integration tests for error handling.
//!
//! Tests that errors are properly returned for invalid operations and that
//! failed operations leave the store untouched.

mod common;

use common::TestEnv;
use ctree::{Config, DependencyMode, ElementKind, ElementUpdate, NewElement, Store, StoreError, ValidationError};
use tempfile::TempDir;

fn store_error(err: &eyre::Report) -> Option<&StoreError> {
    err.downcast_ref::<StoreError>()
}

// =============================================================================
// Element Not Found Tests
// =============================================================================

#[test]
fn test_get_nonexistent_element_returns_none() {
    let env = TestEnv::new();
    assert!(env.store.get("nonexistent").unwrap().is_none());
}

#[test]
fn test_edit_nonexistent_element_fails() {
    let mut env = TestEnv::new();

    let err = env
        .store
        .edit_dependencies("nonexistent", ["a"], DependencyMode::Replace)
        .unwrap_err();
    assert_eq!(
        store_error(&err),
        Some(&StoreError::ElementNotFound("nonexistent".to_string()))
    );
}

#[test]
fn test_update_nonexistent_element_fails() {
    let mut env = TestEnv::new();

    let err = env
        .store
        .update_element("nonexistent", ElementUpdate::new().description("x"))
        .unwrap_err();
    assert!(matches!(store_error(&err), Some(StoreError::ElementNotFound(_))));
}

#[test]
fn test_remove_nonexistent_element_fails() {
    let mut env = TestEnv::new();

    let err = env.store.remove_element("nonexistent").unwrap_err();
    assert!(matches!(store_error(&err), Some(StoreError::ElementNotFound(_))));
}

#[test]
fn test_find_missing_unknown_scope_fails() {
    let env = TestEnv::new();

    let err = env.store.find_missing(Some("nonexistent")).unwrap_err();
    assert!(matches!(store_error(&err), Some(StoreError::ElementNotFound(_))));
}

#[test]
fn test_tree_unknown_root_fails() {
    let env = TestEnv::new();
    assert!(env.store.render_tree(Some("nonexistent"), 3).is_err());
}

// =============================================================================
// Already Exists Tests
// =============================================================================

#[test]
fn test_add_duplicate_leaves_first_record_unmodified() {
    let mut env = TestEnv::new();
    env.add("dep", &[]);
    env.add("x", &["dep"]);
    let before = env.element("x");

    let err = env
        .store
        .add_element(
            NewElement::new("x", "module")
                .code("other")
                .description("replacement")
                .dependencies(["ghost"]),
        )
        .unwrap_err();

    assert_eq!(store_error(&err), Some(&StoreError::AlreadyExists("x".to_string())));
    assert_eq!(env.element("x"), before);
    assert_eq!(env.dependents("dep"), vec!["x"]);
    assert_eq!(env.store.find_missing(None).unwrap().total_missing, 0);
}

// =============================================================================
// Invalid Operation Tests
// =============================================================================

#[test]
fn test_unknown_edit_mode_is_invalid_operation() {
    let err = "merge".parse::<DependencyMode>().unwrap_err();
    assert_eq!(err, StoreError::InvalidOperation("merge".to_string()));
}

#[test]
fn test_edit_modes_parse_case_sensitively() {
    assert_eq!("replace".parse::<DependencyMode>().unwrap(), DependencyMode::Replace);
    assert_eq!("add".parse::<DependencyMode>().unwrap(), DependencyMode::Add);
    assert_eq!("remove".parse::<DependencyMode>().unwrap(), DependencyMode::Remove);
    assert!("REPLACE".parse::<DependencyMode>().is_err());
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_update_with_no_fields_fails_and_writes_nothing() {
    let mut env = TestEnv::new();
    env.add("a", &[]);
    let before = env.element("a");

    let err = env.store.update_element("a", ElementUpdate::new()).unwrap_err();

    assert_eq!(store_error(&err), Some(&StoreError::NoFieldsToUpdate));
    assert_eq!(env.element("a").updated_at, before.updated_at);
}

#[test]
fn test_add_empty_id_fails() {
    let mut env = TestEnv::new();

    let err = env
        .store
        .add_element(NewElement::new("", ElementKind::Function))
        .unwrap_err();
    assert_eq!(
        store_error(&err),
        Some(&StoreError::Validation(ValidationError::EmptyId))
    );
    assert_eq!(env.total_count(), 0);
}

#[test]
fn test_add_empty_kind_fails() {
    let mut env = TestEnv::new();

    let err = env.store.add_element(NewElement::new("a", "")).unwrap_err();
    assert!(matches!(store_error(&err), Some(StoreError::Validation(_))));
}

// =============================================================================
// Store Initialization Tests
// =============================================================================

#[test]
fn test_open_uninitialized_store_fails() {
    let temp_dir = TempDir::new().unwrap();

    let result = Store::open(&Config::new(temp_dir.path()));
    let err = result.err().unwrap();
    assert!(err.to_string().contains("ctree init"));
}

#[test]
fn test_init_twice_keeps_elements() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::new(temp_dir.path());

    let mut store = Store::init(&config).unwrap();
    store.add_element(NewElement::new("a", "function")).unwrap();
    let created_at = store.metadata().unwrap().created_at;

    let store = Store::init(&config).unwrap();
    assert!(store.get("a").unwrap().is_some());
    assert_eq!(store.metadata().unwrap().created_at, created_at);
}

#[test]
fn test_init_in_unwritable_location_fails() {
    let temp_dir = TempDir::new().unwrap();
    let blocker = temp_dir.path().join("file");
    std::fs::write(&blocker, "not a directory").unwrap();

    // knowledge-tree/ cannot be created under a regular file
    assert!(Store::init(&Config::new(&blocker)).is_err());
}
