//! Shared test infrastructure for ctree integration tests.
//!
//! Provides TestEnv helper for consistent test setup/teardown.

#![allow(dead_code)]

use ctree::{Config, DependencyMode, Element, NewElement, Store};
use tempfile::TempDir;

/// Test environment with automatic cleanup.
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub store: Store,
}

impl TestEnv {
    /// Create a new test environment with an initialized store.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = Store::init(&Config::new(temp_dir.path())).expect("Failed to init store");
        Self { temp_dir, store }
    }

    pub fn config(&self) -> Config {
        Config::new(self.temp_dir.path())
    }

    /// Add a function element with the given dependencies.
    pub fn add(&mut self, id: &str, deps: &[&str]) -> Element {
        self.add_kind(id, "function", deps)
    }

    /// Add an element of the given kind.
    pub fn add_kind(&mut self, id: &str, kind: &str, deps: &[&str]) -> Element {
        self.store
            .add_element(
                NewElement::new(id, kind)
                    .code(format!("function {}() {{}}", id))
                    .description(format!("{} element", id))
                    .dependencies(deps),
            )
            .expect("Failed to add element")
            .element
    }

    /// Apply a dependency edit.
    pub fn edit(&mut self, id: &str, deps: &[&str], mode: DependencyMode) -> Element {
        self.store
            .edit_dependencies(id, deps, mode)
            .expect("Failed to edit dependencies")
            .element
    }

    /// Fetch an element that must exist.
    pub fn element(&self, id: &str) -> Element {
        self.store
            .get(id)
            .expect("Failed to read element")
            .unwrap_or_else(|| panic!("Element {} not found", id))
    }

    pub fn dependencies(&self, id: &str) -> Vec<String> {
        self.element(id).dependencies
    }

    pub fn dependents(&self, id: &str) -> Vec<String> {
        self.element(id).dependents
    }

    /// Get all elements count.
    pub fn total_count(&self) -> usize {
        self.store.list().expect("Failed to list elements").len()
    }

    /// Assert `B ∈ A.dependencies ⇔ A ∈ B.dependents` for every pair of stored elements.
    pub fn assert_reciprocal(&self) {
        let elements = self.store.list().expect("Failed to list elements");
        let exists = |id: &str| elements.iter().any(|e| e.id == id);

        for a in &elements {
            for dep in a.dependencies.iter().filter(|d| exists(d)) {
                let b = elements.iter().find(|e| &e.id == dep).unwrap();
                assert!(
                    b.dependents.contains(&a.id),
                    "{} depends on {}, but {} does not list it as a dependent. Dependents: {:?}",
                    a.id,
                    b.id,
                    b.id,
                    b.dependents
                );
            }
            for dependent in &a.dependents {
                let b = elements
                    .iter()
                    .find(|e| &e.id == dependent)
                    .unwrap_or_else(|| panic!("{} lists missing dependent {}", a.id, dependent));
                assert!(
                    b.dependencies.contains(&a.id),
                    "{} lists {} as dependent, but {} does not depend on it",
                    a.id,
                    b.id,
                    b.id
                );
            }
        }
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
