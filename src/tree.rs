//! Text rendering of the dependency tree.

use crate::stats::{average, kind_histogram};
use crate::types::Element;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Marker for a dependency that resolves to no element.
const MISSING_MARKER: &str = "[MISSING]";

/// Rendered tree plus the counters shown alongside it.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TreeView {
    pub tree: String,
    pub statistics: TreeStatistics,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct TreeStatistics {
    pub total_elements: usize,
    pub element_types: BTreeMap<String, usize>,
    pub avg_dependencies: f64,
    pub max_dependencies: usize,
    pub orphaned_elements: usize,
}

/// Render the tree following `dependencies` edges downward.
///
/// With `root`, a single pre-order traversal from it. Without, one traversal per
/// element that has no dependents (or per element, if none qualify), each
/// followed by a blank line. A node already on the current path is not
/// revisited, but the same node may appear under several branches.
pub fn render(elements: &[Element], root: Option<&str>, max_depth: usize) -> TreeView {
    let by_id: HashMap<&str, &Element> = elements.iter().map(|e| (e.id.as_str(), e)).collect();
    let renderer = Renderer { by_id: &by_id, max_depth };
    let mut lines = Vec::new();

    match root {
        Some(root) => renderer.walk(root, 0, &mut Vec::new(), &mut lines),
        None => {
            let mut roots: Vec<&Element> = elements.iter().filter(|e| e.dependents.is_empty()).collect();
            if roots.is_empty() {
                roots = elements.iter().collect();
            }
            roots.sort_by(|a, b| a.id.cmp(&b.id));

            for element in roots {
                renderer.walk(&element.id, 0, &mut Vec::new(), &mut lines);
                lines.push(String::new());
            }
        }
    }

    TreeView {
        tree: lines.join("\n"),
        statistics: statistics(elements),
    }
}

struct Renderer<'a> {
    by_id: &'a HashMap<&'a str, &'a Element>,
    max_depth: usize,
}

impl Renderer<'_> {
    /// `path` holds the IDs from the root down to the parent of `id`.
    fn walk(&self, id: &str, depth: usize, path: &mut Vec<String>, lines: &mut Vec<String>) {
        if depth > self.max_depth || path.iter().any(|p| p == id) {
            return;
        }

        let indent = "  ".repeat(depth);
        let Some(element) = self.by_id.get(id) else {
            lines.push(format!("{}├── {} {}", indent, id, MISSING_MARKER));
            return;
        };

        let prefix = if depth > 0 { "├── " } else { "" };
        lines.push(format!(
            "{}{}{} [{}] - {}",
            indent, prefix, element.id, element.kind, element.description
        ));

        path.push(id.to_string());
        for dep_id in &element.dependencies {
            self.walk(dep_id, depth + 1, path, lines);
        }
        path.pop();
    }
}

fn statistics(elements: &[Element]) -> TreeStatistics {
    let total_dependencies: usize = elements.iter().map(|e| e.dependencies.len()).sum();

    TreeStatistics {
        total_elements: elements.len(),
        element_types: kind_histogram(elements),
        avg_dependencies: average(total_dependencies, elements.len()),
        max_dependencies: elements.iter().map(|e| e.dependencies.len()).max().unwrap_or(0),
        orphaned_elements: elements.iter().filter(|e| e.is_orphaned()).count(),
    }
}
