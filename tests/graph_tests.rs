//! Integration tests for graph operations.
//!
//! Tests reciprocal edge maintenance, dependency edits, removal cleanup,
//! tree rendering and statistics.

mod common;

use common::TestEnv;
use ctree::{DependencyMode, ElementUpdate, NewElement};

// =============================================================================
// Reciprocity Tests
// =============================================================================

#[test]
fn test_add_links_dependents() {
    let mut env = TestEnv::new();
    env.add("b", &[]);
    env.add("c", &[]);
    env.add("a", &["b", "c"]);

    assert_eq!(env.dependents("b"), vec!["a"]);
    assert_eq!(env.dependents("c"), vec!["a"]);
    env.assert_reciprocal();
}

#[test]
fn test_multiple_dependents_keep_insertion_order() {
    let mut env = TestEnv::new();
    env.add("core", &[]);
    env.add("x", &["core"]);
    env.add("y", &["core"]);
    env.add("z", &["core"]);

    assert_eq!(env.dependents("core"), vec!["x", "y", "z"]);
    env.assert_reciprocal();
}

#[test]
fn test_reciprocity_through_mixed_operations() {
    let mut env = TestEnv::new();
    env.add("a", &[]);
    env.add("b", &["a"]);
    env.add("c", &["a", "b"]);
    env.add("d", &["c", "ghost"]);
    env.assert_reciprocal();

    env.edit("c", &["b"], DependencyMode::Remove);
    env.assert_reciprocal();

    env.edit("d", &["a", "b"], DependencyMode::Add);
    env.assert_reciprocal();

    env.store
        .update_element("b", ElementUpdate::new().dependencies(vec!["d"]))
        .unwrap();
    env.assert_reciprocal();

    env.store.remove_element("a").unwrap();
    env.assert_reciprocal();

    env.edit("d", &["b"], DependencyMode::Replace);
    env.assert_reciprocal();
    assert_eq!(env.dependents("b"), vec!["d"]);
}

#[test]
fn test_add_dependency_twice_does_not_duplicate_dependent() {
    let mut env = TestEnv::new();
    env.add("b", &[]);
    env.add("a", &["b"]);

    env.edit("a", &["b"], DependencyMode::Add);
    env.edit("a", &["b"], DependencyMode::Replace);

    assert_eq!(env.dependencies("a"), vec!["b"]);
    assert_eq!(env.dependents("b"), vec!["a"]);
}

#[test]
fn test_late_element_picks_up_earlier_dependents() {
    let mut env = TestEnv::new();
    env.add("b", &["late"]);
    env.add("a", &["late", "other"]);

    let late = env.add("late", &[]);

    assert_eq!(late.dependents, vec!["a", "b"]);
    env.assert_reciprocal();

    let stats = env.store.stats().unwrap();
    assert_eq!(stats.dependency_stats.elements_with_no_dependents, 2);
    assert_eq!(stats.health_metrics.orphaned_elements, 0);

    let view = env.store.render_tree(None, 3).unwrap();
    assert!(!view.tree.lines().any(|line| line.starts_with("late")));
}

// =============================================================================
// Dangling Dependency Tests
// =============================================================================

#[test]
fn test_dangling_dependency_survives() {
    let mut env = TestEnv::new();
    let outcome = env
        .store
        .add_element(NewElement::new("a", "function").dependencies(["ghost"]))
        .unwrap();

    assert_eq!(outcome.dependency_analysis.missing_dependencies, vec!["ghost"]);
    assert_eq!(env.dependencies("a"), vec!["ghost"]);

    let report = env.store.find_missing(Some("a")).unwrap();
    assert_eq!(report.total_missing, 1);
    assert_eq!(report.checked_elements, 1);
    let refs = &report.missing_dependencies["ghost"];
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].referencing_element, "a");
}

#[test]
fn test_find_missing_groups_referencers() {
    let mut env = TestEnv::new();
    env.add("a", &["ghost", "phantom"]);
    env.add("b", &["ghost"]);
    env.add("c", &["a"]);

    let report = env.store.find_missing(None).unwrap();

    assert_eq!(report.total_missing, 2);
    assert_eq!(report.checked_elements, 3);
    let referencers: Vec<_> = report.missing_dependencies["ghost"]
        .iter()
        .map(|r| r.referencing_element.as_str())
        .collect();
    assert_eq!(referencers.len(), 2);
    assert!(referencers.contains(&"a"));
    assert!(referencers.contains(&"b"));
    assert_eq!(report.missing_dependencies["phantom"].len(), 1);
}

#[test]
fn test_missing_resolves_when_element_added() {
    let mut env = TestEnv::new();
    env.add("a", &["ghost"]);
    assert_eq!(env.store.find_missing(None).unwrap().total_missing, 1);

    env.add("ghost", &[]);
    assert_eq!(env.store.find_missing(None).unwrap().total_missing, 0);
    assert_eq!(env.dependents("ghost"), vec!["a"]);
    env.assert_reciprocal();
}

// =============================================================================
// Removal Tests
// =============================================================================

#[test]
fn test_remove_scrubs_all_references() {
    let mut env = TestEnv::new();
    env.add("b", &[]);
    env.add("a", &["b"]);
    assert_eq!(env.dependents("b"), vec!["a"]);

    env.store.remove_element("b").unwrap();

    assert!(env.dependencies("a").is_empty());
    assert!(env.store.get("b").unwrap().is_none());
    env.assert_reciprocal();
}

#[test]
fn test_remove_middle_of_chain() {
    let mut env = TestEnv::new();
    env.add("leaf", &[]);
    env.add("mid", &["leaf"]);
    env.add("top", &["mid"]);

    let report = env.store.remove_element("mid").unwrap();

    assert_eq!(report.dependencies_removed, vec!["leaf"]);
    assert_eq!(report.dependents_updated, vec!["top"]);
    assert_eq!(report.cleaned_references.len(), 2);
    assert!(
        report
            .cleaned_references
            .contains(&"leaf (removed from dependents)".to_string())
    );
    assert!(
        report
            .cleaned_references
            .contains(&"top (removed from dependencies)".to_string())
    );
    assert!(env.dependents("leaf").is_empty());
    assert!(env.dependencies("top").is_empty());
    assert_eq!(env.total_count(), 2);
}

#[test]
fn test_remove_continues_past_failed_cleanup() {
    let mut env = TestEnv::new();
    env.add("b", &[]);
    env.add("stuck", &["b"]);
    env.add("fine", &["b"]);
    // A directory where the temp record goes makes every write of `stuck` fail
    std::fs::create_dir(env.config().elements_dir().join("stuck.json.tmp")).unwrap();

    let report = env.store.remove_element("b").unwrap();

    assert_eq!(report.failed_updates.len(), 1);
    assert_eq!(report.failed_updates[0].element_id, "stuck");
    assert!(!report.failed_updates[0].error.is_empty());
    assert_eq!(report.cleaned_references, vec!["fine (removed from dependencies)"]);
    assert!(env.dependencies("fine").is_empty());
    assert_eq!(env.dependencies("stuck"), vec!["b"]);
    assert!(env.store.get("b").unwrap().is_none());
}

#[test]
fn test_remove_updates_metadata_count() {
    let mut env = TestEnv::new();
    env.add("a", &[]);
    env.add("b", &[]);
    assert_eq!(env.store.metadata().unwrap().total_elements, 2);

    env.store.remove_element("a").unwrap();
    assert_eq!(env.store.metadata().unwrap().total_elements, 1);
}

// =============================================================================
// Edit Mode Tests
// =============================================================================

#[test]
fn test_edit_dependency_modes() {
    let mut env = TestEnv::new();
    env.add("id", &["x", "y"]);

    let element = env.edit("id", &["y", "z"], DependencyMode::Add);
    assert_eq!(element.dependencies, vec!["x", "y", "z"]);

    let element = env.edit("id", &["x"], DependencyMode::Remove);
    assert_eq!(element.dependencies, vec!["y", "z"]);

    let element = env.edit("id", &["q"], DependencyMode::Replace);
    assert_eq!(element.dependencies, vec!["q"]);
}

#[test]
fn test_edit_reports_before_and_after() {
    let mut env = TestEnv::new();
    env.add("x", &[]);
    env.add("a", &["x"]);

    let outcome = env
        .store
        .edit_dependencies("a", ["x", "ghost"], DependencyMode::Add)
        .unwrap();

    let changes = outcome.dependency_changes;
    assert_eq!(changes.operation, Some(DependencyMode::Add));
    assert_eq!(changes.original_dependencies, vec!["x"]);
    assert_eq!(changes.new_dependencies, vec!["x", "ghost"]);
    assert_eq!(changes.analysis.existing_dependencies, vec!["x"]);
    assert_eq!(changes.analysis.missing_dependencies, vec!["ghost"]);
}

#[test]
fn test_edit_remove_unlinks_dependents() {
    let mut env = TestEnv::new();
    env.add("x", &[]);
    env.add("y", &[]);
    env.add("a", &["x", "y"]);

    env.edit("a", &["x"], DependencyMode::Remove);

    assert!(env.dependents("x").is_empty());
    assert_eq!(env.dependents("y"), vec!["a"]);
}

// =============================================================================
// Tree Rendering Tests
// =============================================================================

#[test]
fn test_tree_terminates_on_cycle() {
    let mut env = TestEnv::new();
    env.add("a", &["b"]);
    env.add("b", &["a"]);

    let view = env.store.render_tree(Some("a"), 10).unwrap();
    let lines: Vec<&str> = view.tree.lines().collect();

    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("a [function]"));
    assert!(lines[1].contains("b [function]"));
}

#[test]
fn test_tree_renders_cycle_member_in_sibling_branch() {
    let mut env = TestEnv::new();
    env.add("a", &["b"]);
    env.add("b", &["a"]);
    env.add("side", &["a"]);
    env.add("root", &["a", "side"]);

    let view = env.store.render_tree(Some("root"), 10).unwrap();

    // Under root->a->b and again under root->side->a->b
    assert_eq!(view.tree.matches("a [function]").count(), 2);
    assert_eq!(view.tree.matches("b [function]").count(), 2);
}

#[test]
fn test_tree_marks_missing() {
    let mut env = TestEnv::new();
    env.add("a", &["ghost"]);

    let view = env.store.render_tree(Some("a"), 3).unwrap();
    assert!(view.tree.contains("ghost [MISSING]"));
}

#[test]
fn test_tree_without_root_uses_top_level_elements() {
    let mut env = TestEnv::new();
    env.add("leaf", &[]);
    env.add("app", &["leaf"]);

    let view = env.store.render_tree(None, 3).unwrap();

    assert!(view.tree.starts_with("app [function]"));
    assert_eq!(view.tree.matches("leaf [function]").count(), 1);
    assert_eq!(view.statistics.total_elements, 2);
}

// =============================================================================
// Statistics Tests
// =============================================================================

#[test]
fn test_stats_exact_values() {
    let mut env = TestEnv::new();
    // 4 elements, 3 dependency edges, 1 orphan, 1 missing
    env.add_kind("b", "module", &[]);
    env.add("a", &["b", "ghost"]);
    env.add("c", &["a"]);
    env.add_kind("lonely", "constant", &[]);

    let stats = env.store.stats().unwrap();

    assert_eq!(stats.total_elements, 4);
    assert_eq!(stats.element_types["function"], 2);
    assert_eq!(stats.element_types["module"], 1);
    assert_eq!(stats.element_types["constant"], 1);
    assert_eq!(stats.dependency_stats.total_dependencies, 3);
    assert_eq!(stats.dependency_stats.avg_dependencies_per_element, 0.75);
    assert_eq!(stats.dependency_stats.max_dependencies, 2);
    assert_eq!(stats.health_metrics.orphaned_elements, 1);
    assert_eq!(stats.health_metrics.missing_dependencies, 1);
    assert_eq!(stats.missing_dependency_list, vec!["ghost"]);
    // 100 - (1/4)*20 - (1/3)*30 = 85.0
    assert_eq!(stats.health_metrics.overall_health_score, 85.0);
}

#[test]
fn test_stats_average_rounds_to_two_decimals() {
    let mut env = TestEnv::new();
    env.add("a", &["x"]);
    env.add("b", &[]);
    env.add("c", &[]);

    let stats = env.store.stats().unwrap();
    assert_eq!(stats.dependency_stats.avg_dependencies_per_element, 0.33);
}

#[test]
fn test_stats_are_deterministic() {
    let mut env = TestEnv::new();
    env.add("a", &["b", "c"]);
    env.add("b", &["c"]);
    env.add("c", &[]);

    let first = env.store.stats().unwrap();
    let second = env.store.stats().unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_stats_count_cycles() {
    let mut env = TestEnv::new();
    env.add("a", &["b"]);
    env.add("b", &["a"]);
    env.add("self_ref", &["self_ref"]);
    env.add("c", &["a"]);

    let stats = env.store.stats().unwrap();

    assert_eq!(stats.health_metrics.circular_dependencies, 2);
    assert_eq!(stats.health_metrics.elements_in_cycles, 3);
    assert!(stats.dependency_cycles.contains(&vec!["a".to_string(), "b".to_string()]));
}

#[test]
fn test_stats_empty_store() {
    let env = TestEnv::new();
    let stats = env.store.stats().unwrap();

    assert_eq!(stats.total_elements, 0);
    assert_eq!(stats.health_metrics.overall_health_score, 100.0);
}
