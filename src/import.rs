//! Heuristic import of functions from analysis text files.
//!
//! This is a line scanner, not a parser: it recognises `function name(` openings
//! and collects lines until a closing `}` or a blank line.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// `r(1234)` module references in dependency comments.
static MODULE_REF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"r\((\d+)\)").expect("valid regex"));

/// `name()` call references in dependency comments.
static CALL_REF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\w+)\(\)").expect("valid regex"));

/// A function found by the scanner.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFunction {
    pub id: String,
    pub code: String,
    pub description: String,
}

/// Everything the scanner found in one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub functions: Vec<ExtractedFunction>,
    pub potential_dependencies: Vec<String>,
    pub modules_referenced: Vec<String>,
}

/// Outcome of importing a file.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ImportReport {
    pub imported_elements: Vec<String>,
    pub failed_imports: Vec<String>,
    pub functions_found: usize,
    pub potential_dependencies: Vec<String>,
    pub modules_referenced: Vec<String>,
}

impl ImportReport {
    pub fn new(extraction: &Extraction) -> Self {
        Self {
            functions_found: extraction.functions.len(),
            potential_dependencies: extraction.potential_dependencies.clone(),
            modules_referenced: extraction.modules_referenced.clone(),
            ..Default::default()
        }
    }
}

/// Scan `content` for functions and, with `auto_extract`, dependency hints.
pub fn extract(content: &str, source: &str, auto_extract: bool) -> Extraction {
    let mut extraction = Extraction::default();
    let mut current: Option<(String, Vec<String>)> = None;
    let description = format!("Function extracted from {}", source);

    let finish = |current: &mut Option<(String, Vec<String>)>, functions: &mut Vec<ExtractedFunction>| {
        if let Some((id, code)) = current.take()
            && !code.is_empty()
        {
            functions.push(ExtractedFunction {
                id,
                code: code.join("\n"),
                description: description.clone(),
            });
        }
    };

    for raw in content.lines() {
        let line = raw.trim();

        if let Some(name) = function_name(line) {
            finish(&mut current, &mut extraction.functions);
            if !name.is_empty() {
                current = Some((name.to_string(), vec![line.to_string()]));
            }
        } else if let Some((_, code)) = current.as_mut() {
            if line.starts_with('}') {
                code.push(line.to_string());
                finish(&mut current, &mut extraction.functions);
            } else if line.is_empty() {
                finish(&mut current, &mut extraction.functions);
            } else {
                code.push(line.to_string());
            }
        }

        if auto_extract {
            scan_dependency_hints(line, &mut extraction);
        }
    }

    finish(&mut current, &mut extraction.functions);
    extraction
}

/// Name from a `function name(...` line; empty for `function (`.
fn function_name(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("function ")?;
    let (name, _) = rest.split_once('(')?;
    Some(name.trim())
}

fn scan_dependency_hints(line: &str, extraction: &mut Extraction) {
    let upper = line.to_uppercase();
    if !upper.contains("DEPENDENCIES") && !upper.contains("CALLS:") {
        return;
    }

    for caps in MODULE_REF.captures_iter(line) {
        extraction.modules_referenced.push(format!("r{}", &caps[1]));
    }

    if line.contains("()") && !line.starts_with("//") {
        for caps in CALL_REF.captures_iter(line) {
            extraction.potential_dependencies.push(caps[1].to_string());
        }
    }
}
