//! Dependency graph engine.
//!
//! Keeps `dependencies` and `dependents` reciprocal across every mutation:
//! for existing elements A and B, `B ∈ A.dependencies ⇔ A ∈ B.dependents`.
//! A dependency naming an element that does not exist is allowed and stays
//! recorded; it shows up in [`Store::find_missing`].
//!
//! Nothing is cached between calls. Each operation re-reads the records it
//! needs, so the files on disk are the only source of truth.

use crate::config::Config;
use crate::import::{self, ImportReport};
use crate::repository::Repository;
use crate::stats::{self, MissingReport, Stats};
use crate::tree::{self, TreeView};
use crate::types::{DependencyList, DependencyMode, Element, ElementUpdate, Metadata, NewElement, ValidationError};
use eyre::{Context, Result};
use serde::Serialize;
use std::path::Path;

/// Errors that can occur during store operations.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Element not found.
    ElementNotFound(String),
    /// An element with this ID already exists.
    AlreadyExists(String),
    /// Unknown dependency edit mode.
    InvalidOperation(String),
    /// An update supplied nothing to change.
    NoFieldsToUpdate,
    /// Validation error.
    Validation(ValidationError),
    /// The ID maps to a record file held by a different element.
    KeyConflict { id: String, holder: String },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::ElementNotFound(id) => write!(f, "element '{}' not found", id),
            StoreError::AlreadyExists(id) => write!(f, "element '{}' already exists", id),
            StoreError::InvalidOperation(op) => {
                write!(f, "invalid operation '{}': use 'replace', 'add', or 'remove'", op)
            }
            StoreError::NoFieldsToUpdate => {
                write!(f, "no fields provided for update; specify at least one field")
            }
            StoreError::Validation(e) => write!(f, "validation error: {}", e),
            StoreError::KeyConflict { id, holder } => {
                write!(f, "element '{}' shares a record file with existing element '{}'", id, holder)
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// Which of a dependency list's IDs resolve to stored elements.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct DependencyAnalysis {
    pub total_dependencies: usize,
    pub existing_dependencies: Vec<String>,
    pub missing_dependencies: Vec<String>,
    pub missing_count: usize,
}

/// Before/after view of a dependency list change.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DependencyChange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<DependencyMode>,
    pub original_dependencies: Vec<String>,
    pub new_dependencies: Vec<String>,
    #[serde(flatten)]
    pub analysis: DependencyAnalysis,
}

/// Result of adding an element.
#[derive(Debug, Clone, Serialize)]
pub struct AddOutcome {
    pub element: Element,
    pub dependency_analysis: DependencyAnalysis,
}

/// Result of editing an element's dependencies.
#[derive(Debug, Clone, Serialize)]
pub struct EditOutcome {
    pub element: Element,
    pub dependency_changes: DependencyChange,
}

/// Result of a partial update.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateOutcome {
    pub updated_fields: Vec<&'static str>,
    pub element: Element,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependency_analysis: Option<DependencyChange>,
}

/// A write that failed while cleaning up after a removal.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FailedUpdate {
    pub element_id: String,
    pub error: String,
}

/// Result of removing an element.
#[derive(Debug, Clone, Serialize)]
pub struct RemovalReport {
    pub element: Element,
    /// "<id> (removed from dependencies)" / "<id> (removed from dependents)"
    pub cleaned_references: Vec<String>,
    /// The removed element's own dependencies
    pub dependencies_removed: Vec<String>,
    /// The removed element's own dependents
    pub dependents_updated: Vec<String>,
    /// Elements whose cleanup could not be persisted
    pub failed_updates: Vec<FailedUpdate>,
}

/// The knowledge tree store.
pub struct Store {
    repo: Repository,
}

impl Store {
    /// Initialize a store under the configured working directory.
    pub fn init(config: &Config) -> Result<Self> {
        let repo = Repository::init(config)?;
        Ok(Self { repo })
    }

    /// Open an existing store.
    pub fn open(config: &Config) -> Result<Self> {
        let repo = Repository::open(config)?;
        Ok(Self { repo })
    }

    pub fn config(&self) -> &Config {
        self.repo.config()
    }

    /// Get an element by ID.
    pub fn get(&self, id: &str) -> Result<Option<Element>> {
        self.repo.get(id)
    }

    /// All elements sorted by ID.
    pub fn list(&self) -> Result<Vec<Element>> {
        let mut elements = self.repo.list_all()?;
        elements.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(elements)
    }

    pub fn metadata(&self) -> Result<Metadata> {
        self.repo.metadata()
    }

    fn require(&self, id: &str) -> Result<Element> {
        self.repo
            .get(id)?
            .ok_or_else(|| eyre::eyre!(StoreError::ElementNotFound(id.to_string())))
    }

    /// Add a new element. Fails if the ID is taken.
    ///
    /// Dependencies that exist get this element appended to their dependents;
    /// missing ones stay recorded and are reported. Elements that already
    /// listed this ID as a dependency become its dependents, sorted by ID.
    pub fn add_element(&mut self, new: NewElement) -> Result<AddOutcome> {
        let dependencies = new.dependencies.into_inner();

        let mut element = Element {
            id: new.id,
            kind: new.kind,
            code: new.code.trim().to_string(),
            description: new.description,
            dependencies: dependencies.clone(),
            dependents: vec![],
            source_file: new.source_file.filter(|s| !s.trim().is_empty()),
            line_range: new.line_range.filter(|s| !s.trim().is_empty()),
            created_at: None,
            updated_at: None,
        };

        element.validate().map_err(|e| eyre::eyre!(StoreError::Validation(e)))?;

        if self.repo.exists(&element.id)? {
            return Err(eyre::eyre!(StoreError::AlreadyExists(element.id)));
        }
        if let Some(holder) = self.repo.occupant(&element.id)? {
            return Err(eyre::eyre!(StoreError::KeyConflict {
                id: element.id,
                holder,
            }));
        }

        // Elements added earlier may already name this one
        element.dependents = self
            .list()?
            .into_iter()
            .filter(|other| other.dependencies.contains(&element.id))
            .map(|other| other.id)
            .collect();

        self.repo.put(&mut element).context("Failed to persist element")?;
        log::info!("Added {} '{}' with {} dependencies", element.kind, element.id, dependencies.len());

        let dependency_analysis = self.link(&element.id, &dependencies)?;
        let element = self.reload(element)?;

        Ok(AddOutcome {
            element,
            dependency_analysis,
        })
    }

    /// Replace, extend or shrink an element's dependency list.
    pub fn edit_dependencies(
        &mut self,
        id: &str,
        dependencies: impl Into<DependencyList>,
        mode: DependencyMode,
    ) -> Result<EditOutcome> {
        let mut element = self.require(id)?;
        let supplied = dependencies.into().into_inner();

        let original = element.dependencies.clone();
        element.dependencies = mode.apply(&original, &supplied);

        self.repo
            .put(&mut element)
            .context("Failed to persist dependency change")?;

        let new_dependencies = element.dependencies.clone();
        let analysis = self.relink(id, &original, &new_dependencies)?;
        log::info!("{} dependencies of '{}'", mode.past_tense(), id);

        Ok(EditOutcome {
            element: self.reload(element)?,
            dependency_changes: DependencyChange {
                operation: Some(mode),
                original_dependencies: original,
                new_dependencies,
                analysis,
            },
        })
    }

    /// Update the supplied fields of an element.
    pub fn update_element(&mut self, id: &str, update: ElementUpdate) -> Result<UpdateOutcome> {
        let mut element = self.require(id)?;
        let mut updated_fields = Vec::new();

        if let Some(code) = supplied(update.code) {
            element.code = code.trim().to_string();
            updated_fields.push("code");
        }
        if let Some(description) = supplied(update.description) {
            element.description = description;
            updated_fields.push("description");
        }
        if let Some(source_file) = supplied(update.source_file) {
            element.source_file = Some(source_file);
            updated_fields.push("source_file");
        }
        if let Some(line_range) = supplied(update.line_range) {
            element.line_range = Some(line_range);
            updated_fields.push("line_range");
        }

        let original = element.dependencies.clone();
        let new_dependencies = update.dependencies.map(DependencyList::into_inner);
        if let Some(deps) = &new_dependencies {
            element.dependencies = deps.clone();
            updated_fields.push("dependencies");
        }

        if updated_fields.is_empty() {
            return Err(eyre::eyre!(StoreError::NoFieldsToUpdate));
        }

        self.repo.put(&mut element).context("Failed to persist update")?;
        log::info!("Updated '{}': {}", id, updated_fields.join(", "));

        let dependency_analysis = match new_dependencies {
            Some(new_dependencies) => {
                let analysis = self.relink(id, &original, &new_dependencies)?;
                Some(DependencyChange {
                    operation: None,
                    original_dependencies: original,
                    new_dependencies,
                    analysis,
                })
            }
            None => None,
        };

        Ok(UpdateOutcome {
            updated_fields,
            element: self.reload(element)?,
            dependency_analysis,
        })
    }

    /// Remove an element and scrub its ID from every other element.
    ///
    /// Cleanup is best effort: an element whose write fails is reported in
    /// `failed_updates` and the scan continues.
    pub fn remove_element(&mut self, id: &str) -> Result<RemovalReport> {
        let element = self.require(id)?;

        let mut cleaned_references = Vec::new();
        let mut failed_updates = Vec::new();

        for mut other in self.repo.list_all()? {
            if other.id == id {
                continue;
            }

            let mut notes = Vec::new();
            if remove_all(&mut other.dependencies, id) {
                notes.push(format!("{} (removed from dependencies)", other.id));
            }
            if remove_all(&mut other.dependents, id) {
                notes.push(format!("{} (removed from dependents)", other.id));
            }
            if notes.is_empty() {
                continue;
            }

            match self.repo.put(&mut other) {
                Ok(()) => cleaned_references.extend(notes),
                Err(e) => {
                    log::warn!("Failed to clean '{}' while removing '{}': {:#}", other.id, id, e);
                    failed_updates.push(FailedUpdate {
                        element_id: other.id.clone(),
                        error: format!("{:#}", e),
                    });
                }
            }
        }

        self.repo.delete(id).context("Failed to delete element record")?;
        log::info!(
            "Removed {} '{}', cleaned {} references",
            element.kind,
            id,
            cleaned_references.len()
        );

        Ok(RemovalReport {
            dependencies_removed: element.dependencies.clone(),
            dependents_updated: element.dependents.clone(),
            element,
            cleaned_references,
            failed_updates,
        })
    }

    /// Dependencies that name no stored element.
    ///
    /// Scoped to one element's dependencies when `scope` is given.
    pub fn find_missing(&self, scope: Option<&str>) -> Result<MissingReport> {
        let all = self.repo.list_all()?;
        let checked = match scope {
            Some(id) => vec![self.require(id)?],
            None => all.clone(),
        };
        Ok(stats::find_missing(&all, &checked))
    }

    /// Graph-wide statistics and health score.
    pub fn stats(&self) -> Result<Stats> {
        Ok(stats::compute(&self.repo.list_all()?))
    }

    /// Render the dependency tree from `root`, or from every top-level element.
    pub fn render_tree(&self, root: Option<&str>, max_depth: usize) -> Result<TreeView> {
        let elements = self.repo.list_all()?;
        if let Some(root) = root
            && !elements.iter().any(|e| e.id == root)
        {
            return Err(eyre::eyre!(StoreError::ElementNotFound(root.to_string())));
        }
        Ok(tree::render(&elements, root, max_depth))
    }

    /// Import functions heuristically extracted from a text file.
    pub fn import_file(&mut self, path: &Path, only_id: Option<&str>, auto_extract: bool) -> Result<ImportReport> {
        let content = std::fs::read_to_string(path).wrap_err_with(|| format!("Failed to read {}", path.display()))?;
        let source = path.display().to_string();
        let extraction = import::extract(&content, &source, auto_extract);

        let mut report = ImportReport::new(&extraction);
        for function in extraction.functions {
            if only_id.is_some_and(|wanted| wanted != function.id) {
                continue;
            }

            let new = NewElement::new(function.id.clone(), "function")
                .code(function.code)
                .description(function.description)
                .source_file(source.clone());

            match self.add_element(new) {
                Ok(_) => report.imported_elements.push(function.id),
                Err(e) => match e.downcast_ref::<StoreError>() {
                    Some(StoreError::AlreadyExists(_)) => {
                        report
                            .failed_imports
                            .push(format!("Function '{}' already exists", function.id));
                    }
                    _ => report
                        .failed_imports
                        .push(format!("Failed to import '{}': {:#}", function.id, e)),
                },
            }
        }

        log::info!(
            "Imported {} of {} functions from {}",
            report.imported_elements.len(),
            report.functions_found,
            source
        );
        Ok(report)
    }

    /// Append `id` to the dependents of each existing dependency.
    fn link(&self, id: &str, dependencies: &[String]) -> Result<DependencyAnalysis> {
        let mut analysis = DependencyAnalysis {
            total_dependencies: dependencies.len(),
            ..Default::default()
        };

        for dep_id in dependencies {
            match self.repo.get(dep_id)? {
                Some(mut dep) => {
                    if !dep.dependents.iter().any(|d| d == id) {
                        dep.dependents.push(id.to_string());
                        self.repo
                            .put(&mut dep)
                            .wrap_err_with(|| format!("Failed to link '{}' as dependent of '{}'", id, dep_id))?;
                    }
                    analysis.existing_dependencies.push(dep_id.clone());
                }
                None => analysis.missing_dependencies.push(dep_id.clone()),
            }
        }

        analysis.missing_count = analysis.missing_dependencies.len();
        Ok(analysis)
    }

    /// Move reciprocal edges from `before` to `after`.
    fn relink(&self, id: &str, before: &[String], after: &[String]) -> Result<DependencyAnalysis> {
        for old_id in before.iter().filter(|d| !after.contains(d)) {
            if let Some(mut old) = self.repo.get(old_id)?
                && remove_all(&mut old.dependents, id)
            {
                self.repo
                    .put(&mut old)
                    .wrap_err_with(|| format!("Failed to unlink '{}' from '{}'", id, old_id))?;
            }
        }

        self.link(id, after)
    }

    /// Re-read an element after linking, which may have touched its own record
    /// when it depends on itself.
    fn reload(&self, element: Element) -> Result<Element> {
        Ok(self.repo.get(&element.id)?.unwrap_or(element))
    }
}

/// A supplied, non-blank text field.
fn supplied(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Remove every occurrence of `id`. Returns true if anything was removed.
fn remove_all(ids: &mut Vec<String>, id: &str) -> bool {
    let before = ids.len();
    ids.retain(|d| d != id);
    ids.len() != before
}
