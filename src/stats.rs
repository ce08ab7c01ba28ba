//! Graph-wide analyses: dangling dependencies, statistics, health score, cycles.

use crate::types::{Element, ElementKind};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// One element referencing a missing dependency.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MissingReference {
    pub referencing_element: String,
    pub element_type: ElementKind,
    pub description: String,
}

/// Dangling dependency IDs grouped with everything that references them.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct MissingReport {
    pub missing_dependencies: BTreeMap<String, Vec<MissingReference>>,
    pub total_missing: usize,
    pub checked_elements: usize,
}

/// Find dependencies of `checked` that name no element in `all`.
pub fn find_missing(all: &[Element], checked: &[Element]) -> MissingReport {
    let known: BTreeSet<&str> = all.iter().map(|e| e.id.as_str()).collect();
    let mut missing: BTreeMap<String, Vec<MissingReference>> = BTreeMap::new();

    for element in checked {
        for dep_id in element.dependencies.iter().filter(|d| !known.contains(d.as_str())) {
            missing.entry(dep_id.clone()).or_default().push(MissingReference {
                referencing_element: element.id.clone(),
                element_type: element.kind.clone(),
                description: element.description.clone(),
            });
        }
    }

    MissingReport {
        total_missing: missing.len(),
        checked_elements: checked.len(),
        missing_dependencies: missing,
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct DependencyStats {
    pub total_dependencies: usize,
    /// Rounded to 2 decimals
    pub avg_dependencies_per_element: f64,
    pub max_dependencies: usize,
    pub elements_with_no_dependencies: usize,
    pub elements_with_no_dependents: usize,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct HealthMetrics {
    /// No dependencies and no dependents
    pub orphaned_elements: usize,
    /// Distinct dangling dependency IDs
    pub missing_dependencies: usize,
    /// Dependency cycles among existing elements
    pub circular_dependencies: usize,
    pub elements_in_cycles: usize,
    /// 0-100, rounded to 1 decimal
    pub overall_health_score: f64,
}

/// Statistics for the whole knowledge tree.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Stats {
    pub total_elements: usize,
    pub element_types: BTreeMap<String, usize>,
    pub dependency_stats: DependencyStats,
    pub health_metrics: HealthMetrics,
    pub missing_dependency_list: Vec<String>,
    /// Members of each cycle, sorted
    pub dependency_cycles: Vec<Vec<String>>,
}

/// Compute statistics over a snapshot of every element.
pub fn compute(elements: &[Element]) -> Stats {
    let known: BTreeSet<&str> = elements.iter().map(|e| e.id.as_str()).collect();
    let mut deps = DependencyStats::default();
    let mut orphaned = 0;
    let mut missing: BTreeSet<String> = BTreeSet::new();

    for element in elements {
        let count = element.dependencies.len();
        deps.total_dependencies += count;
        deps.max_dependencies = deps.max_dependencies.max(count);

        if element.dependencies.is_empty() {
            deps.elements_with_no_dependencies += 1;
        }
        if element.dependents.is_empty() {
            deps.elements_with_no_dependents += 1;
        }
        if element.is_orphaned() {
            orphaned += 1;
        }

        missing.extend(
            element
                .dependencies
                .iter()
                .filter(|d| !known.contains(d.as_str()))
                .cloned(),
        );
    }

    deps.avg_dependencies_per_element = average(deps.total_dependencies, elements.len());

    let cycles = find_cycles(elements);
    let health_metrics = HealthMetrics {
        orphaned_elements: orphaned,
        missing_dependencies: missing.len(),
        circular_dependencies: cycles.len(),
        elements_in_cycles: cycles.iter().map(Vec::len).sum(),
        overall_health_score: health_score(elements.len(), orphaned, missing.len(), deps.total_dependencies),
    };

    Stats {
        total_elements: elements.len(),
        element_types: kind_histogram(elements),
        dependency_stats: deps,
        health_metrics,
        missing_dependency_list: missing.into_iter().collect(),
        dependency_cycles: cycles,
    }
}

/// Heuristic 0-100 score.
///
/// Starts at 100, subtracts `orphans / total * 20` and
/// `missing / max(total_dependencies, 1) * 30`, floors at 0, rounds to 1 decimal.
pub fn health_score(total: usize, orphaned: usize, missing: usize, total_dependencies: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    let orphan_penalty = orphaned as f64 / total as f64 * 20.0;
    let missing_penalty = missing as f64 / total_dependencies.max(1) as f64 * 30.0;
    round_to((100.0 - orphan_penalty - missing_penalty).max(0.0), 1)
}

/// Element count per kind.
pub(crate) fn kind_histogram(elements: &[Element]) -> BTreeMap<String, usize> {
    let mut types = BTreeMap::new();
    for element in elements {
        *types.entry(element.kind.to_string()).or_insert(0) += 1;
    }
    types
}

/// Mean rounded to 2 decimals, 0 for an empty set.
pub(crate) fn average(total: usize, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    round_to(total as f64 / count as f64, 2)
}

/// Round half to even at `places` decimals.
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round_ties_even() / factor
}

/// Dependency cycles among existing elements.
///
/// A cycle is a strongly connected component with more than one member, or a
/// single element that depends on itself. Dangling dependencies are ignored.
pub fn find_cycles(elements: &[Element]) -> Vec<Vec<String>> {
    let mut ids: Vec<&str> = elements.iter().map(|e| e.id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    let position: HashMap<&str, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); ids.len()];
    for element in elements {
        let from = position[element.id.as_str()];
        for dep in &element.dependencies {
            if let Some(&to) = position.get(dep.as_str())
                && !adj[from].contains(&to)
            {
                adj[from].push(to);
            }
        }
    }

    let mut cycles: Vec<Vec<String>> = strongly_connected(&adj)
        .into_iter()
        .filter(|component| component.len() > 1 || adj[component[0]].contains(&component[0]))
        .map(|component| {
            let mut members: Vec<String> = component.into_iter().map(|i| ids[i].to_string()).collect();
            members.sort();
            members
        })
        .collect();
    cycles.sort();
    cycles
}

/// Tarjan's algorithm with an explicit work stack.
fn strongly_connected(adj: &[Vec<usize>]) -> Vec<Vec<usize>> {
    const UNVISITED: usize = usize::MAX;

    let n = adj.len();
    let mut index = vec![UNVISITED; n];
    let mut lowlink = vec![0; n];
    let mut on_stack = vec![false; n];
    let mut stack = Vec::new();
    let mut next_index = 0;
    let mut components = Vec::new();

    for start in 0..n {
        if index[start] != UNVISITED {
            continue;
        }

        index[start] = next_index;
        lowlink[start] = next_index;
        next_index += 1;
        stack.push(start);
        on_stack[start] = true;
        let mut work = vec![(start, 0usize)];

        while let Some(&(node, edge)) = work.last() {
            if let Some(&next) = adj[node].get(edge) {
                if let Some(top) = work.last_mut() {
                    top.1 += 1;
                }
                if index[next] == UNVISITED {
                    index[next] = next_index;
                    lowlink[next] = next_index;
                    next_index += 1;
                    stack.push(next);
                    on_stack[next] = true;
                    work.push((next, 0));
                } else if on_stack[next] {
                    lowlink[node] = lowlink[node].min(index[next]);
                }
                continue;
            }

            work.pop();
            if let Some(&(parent, _)) = work.last() {
                lowlink[parent] = lowlink[parent].min(lowlink[node]);
            }
            if lowlink[node] == index[node] {
                let mut component = Vec::new();
                while let Some(member) = stack.pop() {
                    on_stack[member] = false;
                    component.push(member);
                    if member == node {
                        break;
                    }
                }
                components.push(component);
            }
        }
    }

    components
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(id: &str, kind: &str, deps: &[&str], dependents: &[&str]) -> Element {
        Element {
            id: id.to_string(),
            kind: ElementKind::from(kind),
            code: String::new(),
            description: format!("{} description", id),
            dependencies: deps.iter().map(|s| s.to_string()).collect(),
            dependents: dependents.iter().map(|s| s.to_string()).collect(),
            source_file: None,
            line_range: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_find_missing_groups_referencers() {
        let all = vec![
            element("a", "function", &["ghost", "b"], &[]),
            element("b", "module", &[], &["a"]),
            element("c", "constant", &["ghost", "phantom"], &[]),
        ];

        let report = find_missing(&all, &all);

        assert_eq!(report.total_missing, 2);
        assert_eq!(report.checked_elements, 3);
        let ghost = &report.missing_dependencies["ghost"];
        let referencers: Vec<_> = ghost.iter().map(|r| r.referencing_element.as_str()).collect();
        assert_eq!(referencers, vec!["a", "c"]);
        assert_eq!(ghost[1].element_type, ElementKind::Constant);
    }

    #[test]
    fn test_stats_exact_values() {
        // 4 elements, dependency counts 3, 1, 0, 0 -> 4 edges, avg 1.0
        // orphans: d -> penalty 1/4*20 = 5
        // missing: x, y -> penalty 2/4*30 = 15
        let elements = vec![
            element("a", "function", &["b", "x", "y"], &[]),
            element("b", "function", &["c"], &["a"]),
            element("c", "constant", &[], &["b"]),
            element("d", "variable", &[], &[]),
        ];

        let stats = compute(&elements);

        assert_eq!(stats.total_elements, 4);
        assert_eq!(stats.element_types["function"], 2);
        assert_eq!(stats.dependency_stats.total_dependencies, 4);
        assert_eq!(stats.dependency_stats.avg_dependencies_per_element, 1.0);
        assert_eq!(stats.dependency_stats.max_dependencies, 3);
        assert_eq!(stats.dependency_stats.elements_with_no_dependencies, 2);
        assert_eq!(stats.dependency_stats.elements_with_no_dependents, 2);
        assert_eq!(stats.health_metrics.orphaned_elements, 1);
        assert_eq!(stats.health_metrics.missing_dependencies, 2);
        assert_eq!(stats.health_metrics.overall_health_score, 80.0);
        assert_eq!(stats.missing_dependency_list, vec!["x", "y"]);
    }

    #[test]
    fn test_average_rounds_to_two_decimals() {
        assert_eq!(average(2, 3), 0.67);
        assert_eq!(average(1, 3), 0.33);
        assert_eq!(average(0, 0), 0.0);
    }

    #[test]
    fn test_health_score_rounds_to_one_decimal() {
        // 1/3*20 = 6.666.. -> 93.333.. -> 93.3
        assert_eq!(health_score(3, 1, 0, 5), 93.3);
        // no dependency edges: max(total, 1) guards the division
        assert_eq!(health_score(2, 2, 0, 0), 80.0);
    }

    #[test]
    fn test_health_score_floors_at_zero() {
        assert_eq!(health_score(1, 1, 10, 1), 0.0);
    }

    #[test]
    fn test_health_score_empty_graph() {
        assert_eq!(health_score(0, 0, 0, 0), 100.0);
    }

    #[test]
    fn test_find_cycles() {
        let elements = vec![
            element("a", "function", &["b"], &["b"]),
            element("b", "function", &["a"], &["a"]),
            element("self", "function", &["self"], &["self"]),
            element("c", "function", &["a", "ghost"], &[]),
        ];

        let cycles = find_cycles(&elements);
        assert_eq!(cycles, vec![vec!["a".to_string(), "b".to_string()], vec!["self".to_string()]]);

        let stats = compute(&elements);
        assert_eq!(stats.health_metrics.circular_dependencies, 2);
        assert_eq!(stats.health_metrics.elements_in_cycles, 3);
    }

    #[test]
    fn test_no_cycles_in_chain() {
        let elements = vec![
            element("a", "function", &["b"], &[]),
            element("b", "function", &["c"], &["a"]),
            element("c", "function", &[], &["b"]),
        ];
        assert!(find_cycles(&elements).is_empty());
    }

    #[test]
    fn test_long_cycle() {
        let elements = vec![
            element("a", "function", &["b"], &[]),
            element("b", "function", &["c"], &[]),
            element("c", "function", &["d"], &[]),
            element("d", "function", &["a"], &[]),
        ];
        assert_eq!(find_cycles(&elements), vec![vec!["a", "b", "c", "d"]]);
    }
}
