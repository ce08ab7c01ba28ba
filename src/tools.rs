//! Tool surface: the externally invokable operations and their result envelopes.
//!
//! Every tool returns a JSON object with a `success` flag. Failures never
//! propagate; they become `{success: false, message, error_kind}`.

use crate::store::{Store, StoreError};
use crate::types::{DependencyList, DependencyMode, ElementUpdate, NewElement};
use eyre::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::Path;

/// Default depth for tree views.
pub const DEFAULT_MAX_DEPTH: usize = 3;

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_true() -> bool {
    true
}

fn default_operation() -> String {
    DependencyMode::Replace.as_str().to_string()
}

/// A single tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "tool", content = "arguments", rename_all = "snake_case")]
pub enum ToolCall {
    AddCodeElement {
        #[serde(alias = "id")]
        element_id: String,
        #[serde(alias = "kind", alias = "type")]
        element_type: String,
        code: String,
        description: String,
        #[serde(default)]
        dependencies: DependencyList,
        #[serde(default)]
        source_file: Option<String>,
        #[serde(default)]
        line_range: Option<String>,
    },

    EditDependencies {
        #[serde(alias = "id")]
        element_id: String,
        dependencies: DependencyList,
        #[serde(default = "default_operation")]
        operation: String,
    },

    GetElement {
        #[serde(alias = "id")]
        element_id: String,
    },

    UpdateCodeElement {
        #[serde(alias = "id")]
        element_id: String,
        #[serde(default)]
        code: Option<String>,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        dependencies: Option<DependencyList>,
        #[serde(default)]
        source_file: Option<String>,
        #[serde(default)]
        line_range: Option<String>,
    },

    RemoveElement {
        #[serde(alias = "id")]
        element_id: String,
    },

    FindMissingDependencies {
        #[serde(default, alias = "id")]
        element_id: Option<String>,
    },

    GetKnowledgeTreeView {
        #[serde(default, alias = "root_id")]
        root_element_id: Option<String>,
        #[serde(default = "default_max_depth")]
        max_depth: usize,
    },

    ListAllElements {},

    GetKnowledgeTreeStats {},

    GetWorkingDirectoryInfo {},

    ImportFromAnalysisFile {
        file_path: String,
        #[serde(default, alias = "id")]
        element_id: Option<String>,
        #[serde(default = "default_true")]
        auto_extract: bool,
    },
}

impl ToolCall {
    /// Build a call from a tool name and its JSON arguments.
    pub fn from_parts(name: &str, arguments: Value) -> Result<Self> {
        let arguments = match arguments {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        let call = serde_json::from_value(json!({ "tool": name, "arguments": arguments }))?;
        Ok(call)
    }

    /// The wire name of this tool.
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::AddCodeElement { .. } => "add_code_element",
            ToolCall::EditDependencies { .. } => "edit_dependencies",
            ToolCall::GetElement { .. } => "get_element",
            ToolCall::UpdateCodeElement { .. } => "update_code_element",
            ToolCall::RemoveElement { .. } => "remove_element",
            ToolCall::FindMissingDependencies { .. } => "find_missing_dependencies",
            ToolCall::GetKnowledgeTreeView { .. } => "get_knowledge_tree_view",
            ToolCall::ListAllElements {} => "list_all_elements",
            ToolCall::GetKnowledgeTreeStats {} => "get_knowledge_tree_stats",
            ToolCall::GetWorkingDirectoryInfo {} => "get_working_directory_info",
            ToolCall::ImportFromAnalysisFile { .. } => "import_from_analysis_file",
        }
    }

    /// Whether this tool writes to the store.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            ToolCall::AddCodeElement { .. }
                | ToolCall::EditDependencies { .. }
                | ToolCall::UpdateCodeElement { .. }
                | ToolCall::RemoveElement { .. }
                | ToolCall::ImportFromAnalysisFile { .. }
        )
    }
}

/// Failure classes reported in `error_kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    InvalidOperation,
    Validation,
    Io,
}

impl ErrorKind {
    /// Classify an error. Anything that is not a [`StoreError`] is a storage failure.
    pub fn of(err: &eyre::Report) -> Self {
        match err.downcast_ref::<StoreError>() {
            Some(StoreError::ElementNotFound(_)) => ErrorKind::NotFound,
            Some(StoreError::AlreadyExists(_)) | Some(StoreError::KeyConflict { .. }) => ErrorKind::AlreadyExists,
            Some(StoreError::InvalidOperation(_)) => ErrorKind::InvalidOperation,
            Some(StoreError::NoFieldsToUpdate) | Some(StoreError::Validation(_)) => ErrorKind::Validation,
            None => ErrorKind::Io,
        }
    }
}

/// Failure envelope.
pub fn failure(action: &str, err: &eyre::Report) -> Value {
    json!({
        "success": false,
        "message": format!("Error {}: {:#}", action, err),
        "error_kind": ErrorKind::of(err),
    })
}

/// Run a tool against the store. Never fails; errors become failure envelopes.
pub fn dispatch(store: &mut Store, call: ToolCall) -> Value {
    let name = call.name();
    if call.is_mutation() {
        log::info!("Tool call: {}", name);
    } else {
        log::debug!("Tool call: {}", name);
    }

    let (action, result) = match call {
        ToolCall::AddCodeElement {
            element_id,
            element_type,
            code,
            description,
            dependencies,
            source_file,
            line_range,
        } => {
            let mut new = NewElement::new(element_id, element_type)
                .code(code)
                .description(description)
                .dependencies(dependencies);
            new.source_file = source_file;
            new.line_range = line_range;
            ("adding element", add_code_element(store, new))
        }

        ToolCall::EditDependencies {
            element_id,
            dependencies,
            operation,
        } => (
            "editing dependencies",
            edit_dependencies(store, &element_id, dependencies, &operation),
        ),

        ToolCall::GetElement { element_id } => ("retrieving element", get_element(store, &element_id)),

        ToolCall::UpdateCodeElement {
            element_id,
            code,
            description,
            dependencies,
            source_file,
            line_range,
        } => {
            let update = ElementUpdate {
                code,
                description,
                dependencies,
                source_file,
                line_range,
            };
            ("updating element", update_code_element(store, &element_id, update))
        }

        ToolCall::RemoveElement { element_id } => ("removing element", remove_element(store, &element_id)),

        ToolCall::FindMissingDependencies { element_id } => (
            "finding missing dependencies",
            find_missing_dependencies(store, non_empty(element_id.as_deref())),
        ),

        ToolCall::GetKnowledgeTreeView {
            root_element_id,
            max_depth,
        } => (
            "generating tree view",
            tree_view(store, non_empty(root_element_id.as_deref()), max_depth),
        ),

        ToolCall::ListAllElements {} => ("listing elements", list_all_elements(store)),

        ToolCall::GetKnowledgeTreeStats {} => ("generating stats", tree_stats(store)),

        ToolCall::GetWorkingDirectoryInfo {} => (
            "getting working directory info",
            Ok(json!({ "success": true, "working_directory": store.config().describe() })),
        ),

        ToolCall::ImportFromAnalysisFile {
            file_path,
            element_id,
            auto_extract,
        } => (
            "importing from file",
            import_from_analysis_file(store, &file_path, non_empty(element_id.as_deref()), auto_extract),
        ),
    };

    result.unwrap_or_else(|err| {
        log::warn!("Tool {} failed: {:#}", name, err);
        failure(action, &err)
    })
}

/// Empty strings mean "not supplied" for scope arguments.
fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn add_code_element(store: &mut Store, new: NewElement) -> Result<Value> {
    let id = new.id.clone();
    match store.add_element(new) {
        Ok(outcome) => {
            let element = &outcome.element;
            Ok(json!({
                "success": true,
                "message": format!("Successfully added {} '{}'", element.kind, element.id),
                "element": {
                    "id": element.id,
                    "type": element.kind,
                    "description": element.description,
                    "dependencies": element.dependencies,
                    "created_at": element.created_at.map(|t| t.to_rfc3339()),
                },
                "dependency_analysis": outcome.dependency_analysis,
            }))
        }
        Err(err) if matches!(err.downcast_ref::<StoreError>(), Some(StoreError::AlreadyExists(_))) => {
            let mut envelope = failure("adding element", &err);
            envelope["message"] = json!(format!(
                "Element '{}' already exists. Use update_code_element to modify it.",
                id
            ));
            if let Some(existing) = store.get(&id)? {
                envelope["existing_element"] = json!({
                    "id": existing.id,
                    "type": existing.kind,
                    "description": existing.description,
                });
            }
            Ok(envelope)
        }
        Err(err) => Err(err),
    }
}

fn edit_dependencies(store: &mut Store, id: &str, dependencies: DependencyList, operation: &str) -> Result<Value> {
    let mode: DependencyMode = operation.parse()?;
    let outcome = store.edit_dependencies(id, dependencies, mode)?;
    let element = &outcome.element;

    Ok(json!({
        "success": true,
        "message": format!("Successfully {} dependencies for '{}'", mode.past_tense(), id),
        "element": {
            "id": element.id,
            "type": element.kind,
            "description": element.description,
        },
        "dependency_changes": outcome.dependency_changes,
    }))
}

fn get_element(store: &Store, id: &str) -> Result<Value> {
    match store.get(id)? {
        Some(element) => Ok(json!({ "success": true, "element": element })),
        None => Err(eyre::eyre!(StoreError::ElementNotFound(id.to_string()))),
    }
}

fn update_code_element(store: &mut Store, id: &str, update: ElementUpdate) -> Result<Value> {
    let outcome = store.update_element(id, update)?;
    let element = &outcome.element;

    let mut result = json!({
        "success": true,
        "message": format!("Successfully updated {} '{}'", element.kind, element.id),
        "updated_fields": outcome.updated_fields,
        "element": {
            "id": element.id,
            "type": element.kind,
            "description": element.description,
            "dependencies": element.dependencies,
            "updated_at": element.updated_at.map(|t| t.to_rfc3339()),
        },
    });
    if let Some(analysis) = outcome.dependency_analysis {
        result["dependency_analysis"] = serde_json::to_value(analysis)?;
    }
    Ok(result)
}

fn remove_element(store: &mut Store, id: &str) -> Result<Value> {
    let report = store.remove_element(id)?;
    let mut message = format!("Successfully removed {} '{}'", report.element.kind, id);
    if !report.failed_updates.is_empty() {
        message.push_str(&format!(
            "; {} referencing elements could not be updated",
            report.failed_updates.len()
        ));
    }

    Ok(json!({
        "success": true,
        "message": message,
        "cleaned_references": report.cleaned_references,
        "dependencies_removed": report.dependencies_removed,
        "dependents_updated": report.dependents_updated,
        "failed_updates": report.failed_updates,
    }))
}

fn find_missing_dependencies(store: &Store, scope: Option<&str>) -> Result<Value> {
    let report = store.find_missing(scope)?;
    Ok(json!({
        "success": true,
        "missing_dependencies": report.missing_dependencies,
        "total_missing": report.total_missing,
        "checked_elements": report.checked_elements,
    }))
}

fn tree_view(store: &Store, root: Option<&str>, max_depth: usize) -> Result<Value> {
    let view = store.render_tree(root, max_depth)?;
    let mut result = json!({
        "success": true,
        "tree": view.tree,
        "statistics": view.statistics,
    });
    if view.statistics.total_elements == 0 {
        result["message"] = json!("Knowledge tree is empty");
    }
    Ok(result)
}

fn list_all_elements(store: &Store) -> Result<Value> {
    let summaries: Vec<_> = store.list()?.iter().map(|e| e.summary()).collect();
    let mut result = json!({
        "success": true,
        "total": summaries.len(),
        "elements": summaries,
    });
    if summaries.is_empty() {
        result["message"] = json!("Knowledge tree is empty");
    }
    Ok(result)
}

fn tree_stats(store: &Store) -> Result<Value> {
    let stats = store.stats()?;
    let mut result = json!({ "success": true, "stats": stats });
    if stats.total_elements == 0 {
        result["message"] = json!("Knowledge tree is empty");
    }
    Ok(result)
}

fn import_from_analysis_file(
    store: &mut Store,
    file_path: &str,
    only_id: Option<&str>,
    auto_extract: bool,
) -> Result<Value> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(eyre::eyre!("File not found: {}", file_path));
    }

    let report = store.import_file(path, only_id, auto_extract)?;
    Ok(json!({
        "success": true,
        "message": format!("Import completed from {}", file_path),
        "imported_elements": report.imported_elements,
        "failed_imports": report.failed_imports,
        "extracted_info": {
            "functions_found": report.functions_found,
            "potential_dependencies": report.potential_dependencies,
            "modules_referenced": report.modules_referenced,
        },
    }))
}

/// JSON schemas for every tool, as advertised by `tools/list`.
pub fn tool_specs() -> Vec<Value> {
    let deps_schema = json!({
        "anyOf": [
            {"type": "string"},
            {"type": "array", "items": {"type": "string"}}
        ]
    });

    vec![
        json!({
            "name": "add_code_element",
            "description": "Add a new code element to the knowledge tree. Fails if the ID exists. Missing dependencies are recorded and reported.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "element_id": {"type": "string", "description": "Unique identifier, e.g. \"hr\" or \"r5634\""},
                    "element_type": {"type": "string", "description": "function, module, constant, or variable"},
                    "code": {"type": "string"},
                    "description": {"type": "string"},
                    "dependencies": deps_schema.clone(),
                    "source_file": {"type": "string"},
                    "line_range": {"type": "string", "description": "e.g. \"33490-33511\""}
                },
                "required": ["element_id", "element_type", "code", "description"]
            }
        }),
        json!({
            "name": "edit_dependencies",
            "description": "Replace, add to, or remove from an element's dependency list, keeping dependents in sync.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "element_id": {"type": "string"},
                    "dependencies": deps_schema.clone(),
                    "operation": {"type": "string", "enum": ["replace", "add", "remove"], "default": "replace"}
                },
                "required": ["element_id", "dependencies"]
            }
        }),
        json!({
            "name": "get_element",
            "description": "Retrieve a code element with its code, dependencies and dependents.",
            "inputSchema": {
                "type": "object",
                "properties": {"element_id": {"type": "string"}},
                "required": ["element_id"]
            }
        }),
        json!({
            "name": "update_code_element",
            "description": "Update supplied fields of an element. Blank text fields are left unchanged; a dependencies list (even empty) replaces the current one.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "element_id": {"type": "string"},
                    "code": {"type": "string"},
                    "description": {"type": "string"},
                    "dependencies": deps_schema,
                    "source_file": {"type": "string"},
                    "line_range": {"type": "string"}
                },
                "required": ["element_id"]
            }
        }),
        json!({
            "name": "remove_element",
            "description": "Remove an element and scrub its ID from every other element's dependencies and dependents.",
            "inputSchema": {
                "type": "object",
                "properties": {"element_id": {"type": "string"}},
                "required": ["element_id"]
            }
        }),
        json!({
            "name": "find_missing_dependencies",
            "description": "List dependency IDs that name no stored element, grouped with their referencing elements.",
            "inputSchema": {
                "type": "object",
                "properties": {"element_id": {"type": "string", "description": "Limit the check to one element"}}
            }
        }),
        json!({
            "name": "get_knowledge_tree_view",
            "description": "Render the dependency tree from a root, or from every element without dependents.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "root_element_id": {"type": "string"},
                    "max_depth": {"type": "integer", "minimum": 0, "default": DEFAULT_MAX_DEPTH}
                }
            }
        }),
        json!({
            "name": "list_all_elements",
            "description": "List every element with summary information, sorted by ID.",
            "inputSchema": {"type": "object", "properties": {}}
        }),
        json!({
            "name": "get_knowledge_tree_stats",
            "description": "Statistics and health metrics for the whole knowledge tree.",
            "inputSchema": {"type": "object", "properties": {}}
        }),
        json!({
            "name": "get_working_directory_info",
            "description": "Show where the knowledge tree is stored.",
            "inputSchema": {"type": "object", "properties": {}}
        }),
        json!({
            "name": "import_from_analysis_file",
            "description": "Heuristically extract `function name(` blocks from a text file and add them as function elements.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "file_path": {"type": "string"},
                    "element_id": {"type": "string", "description": "Only import the function with this name"},
                    "auto_extract": {"type": "boolean", "default": true}
                },
                "required": ["file_path"]
            }
        }),
    ]
}
