//! Core data types for the code knowledge tree.

use crate::store::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A stored unit of code knowledge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Element {
    /// Primary key, immutable once created
    pub id: String,

    /// What kind of code element this is
    #[serde(rename = "type")]
    pub kind: ElementKind,

    /// Source snippet
    #[serde(default)]
    pub code: String,

    /// Human-readable explanation
    #[serde(default)]
    pub description: String,

    /// IDs this element depends on (may name elements that do not exist yet)
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// IDs of elements depending on this one. Written only by the store.
    #[serde(default)]
    pub dependents: Vec<String>,

    #[serde(default)]
    pub source_file: Option<String>,

    /// e.g. "33490-33511"
    #[serde(default)]
    pub line_range: Option<String>,

    /// Set on first save, never overwritten
    #[serde(default, with = "timestamp::optional")]
    pub created_at: Option<DateTime<Utc>>,

    /// Refreshed on every save
    #[serde(default, with = "timestamp::optional")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Element {
    /// No dependencies and no dependents.
    pub fn is_orphaned(&self) -> bool {
        self.dependencies.is_empty() && self.dependents.is_empty()
    }

    pub fn summary(&self) -> ElementSummary {
        ElementSummary {
            id: self.id.clone(),
            kind: self.kind.clone(),
            description: self.description.clone(),
            dependencies_count: self.dependencies.len(),
            dependents_count: self.dependents.len(),
            created_at: self.created_at,
        }
    }

    /// Validate the element's identity fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_id(&self.id)?;
        if self.kind.as_str().trim().is_empty() {
            return Err(ValidationError::EmptyKind);
        }
        Ok(())
    }
}

/// Check that an element ID can be used as a primary key.
pub fn validate_id(id: &str) -> Result<(), ValidationError> {
    if id.trim().is_empty() {
        return Err(ValidationError::EmptyId);
    }
    if id.len() > MAX_ID_LEN {
        return Err(ValidationError::IdTooLong);
    }
    if id.chars().any(|c| c.is_control()) {
        return Err(ValidationError::InvalidCharacters);
    }
    Ok(())
}

const MAX_ID_LEN: usize = 512;

/// Listing row for an element.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ElementSummary {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ElementKind,
    pub description: String,
    pub dependencies_count: usize,
    pub dependents_count: usize,
    #[serde(with = "timestamp::optional")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Element kinds. Unknown strings are preserved as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ElementKind {
    Function,
    Module,
    Constant,
    Variable,
    Other(String),
}

impl ElementKind {
    pub fn as_str(&self) -> &str {
        match self {
            ElementKind::Function => "function",
            ElementKind::Module => "module",
            ElementKind::Constant => "constant",
            ElementKind::Variable => "variable",
            ElementKind::Other(s) => s,
        }
    }
}

impl From<String> for ElementKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "function" => ElementKind::Function,
            "module" => ElementKind::Module,
            "constant" => ElementKind::Constant,
            "variable" => ElementKind::Variable,
            _ => ElementKind::Other(s),
        }
    }
}

impl From<&str> for ElementKind {
    fn from(s: &str) -> Self {
        ElementKind::from(s.to_string())
    }
}

impl From<ElementKind> for String {
    fn from(kind: ElementKind) -> Self {
        match kind {
            ElementKind::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dependency IDs as supplied by a caller.
///
/// Deserializes from either a bare string (one dependency) or a list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "OneOrMany")]
pub struct DependencyList(pub Vec<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl From<OneOrMany> for DependencyList {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::One(id) => DependencyList(vec![id]),
            OneOrMany::Many(ids) => DependencyList(ids),
        }
    }
}

impl DependencyList {
    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

impl From<Vec<String>> for DependencyList {
    fn from(ids: Vec<String>) -> Self {
        DependencyList(ids)
    }
}

impl From<Vec<&str>> for DependencyList {
    fn from(ids: Vec<&str>) -> Self {
        DependencyList(ids.into_iter().map(String::from).collect())
    }
}

impl From<&[&str]> for DependencyList {
    fn from(ids: &[&str]) -> Self {
        DependencyList(ids.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for DependencyList {
    fn from(ids: [&str; N]) -> Self {
        DependencyList(ids.iter().map(|s| s.to_string()).collect())
    }
}

impl From<&str> for DependencyList {
    fn from(id: &str) -> Self {
        DependencyList(vec![id.to_string()])
    }
}

impl From<String> for DependencyList {
    fn from(id: String) -> Self {
        DependencyList(vec![id])
    }
}

/// How `edit_dependencies` combines the supplied list with the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyMode {
    /// The list becomes exactly the supplied IDs
    #[default]
    Replace,
    /// Union, keeping current order and appending unseen IDs
    Add,
    /// Difference, keeping the order of survivors
    Remove,
}

impl DependencyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyMode::Replace => "replace",
            DependencyMode::Add => "add",
            DependencyMode::Remove => "remove",
        }
    }

    pub fn past_tense(&self) -> &'static str {
        match self {
            DependencyMode::Replace => "replaced",
            DependencyMode::Add => "added",
            DependencyMode::Remove => "removed",
        }
    }

    /// Apply this mode to `current`, returning the new dependency list.
    pub fn apply(&self, current: &[String], supplied: &[String]) -> Vec<String> {
        match self {
            DependencyMode::Replace => supplied.to_vec(),
            DependencyMode::Add => {
                let mut merged = current.to_vec();
                for dep in supplied {
                    if !merged.contains(dep) {
                        merged.push(dep.clone());
                    }
                }
                merged
            }
            DependencyMode::Remove => current.iter().filter(|d| !supplied.contains(d)).cloned().collect(),
        }
    }
}

impl FromStr for DependencyMode {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "replace" => Ok(DependencyMode::Replace),
            "add" => Ok(DependencyMode::Add),
            "remove" => Ok(DependencyMode::Remove),
            other => Err(StoreError::InvalidOperation(other.to_string())),
        }
    }
}

impl fmt::Display for DependencyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for creating an element.
#[derive(Debug, Clone, PartialEq)]
pub struct NewElement {
    pub id: String,
    pub kind: ElementKind,
    pub code: String,
    pub description: String,
    pub dependencies: DependencyList,
    pub source_file: Option<String>,
    pub line_range: Option<String>,
}

impl NewElement {
    pub fn new(id: impl Into<String>, kind: impl Into<ElementKind>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            code: String::new(),
            description: String::new(),
            dependencies: DependencyList::default(),
            source_file: None,
            line_range: None,
        }
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn dependencies(mut self, dependencies: impl Into<DependencyList>) -> Self {
        self.dependencies = dependencies.into();
        self
    }

    pub fn source_file(mut self, source_file: impl Into<String>) -> Self {
        self.source_file = Some(source_file.into());
        self
    }

    pub fn line_range(mut self, line_range: impl Into<String>) -> Self {
        self.line_range = Some(line_range.into());
        self
    }
}

/// Partial update of an element. `None` leaves a field untouched.
///
/// Supplied text that is empty or whitespace-only is also treated as "no change".
/// `dependencies: Some(empty)` is a real value and clears the list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementUpdate {
    pub code: Option<String>,
    pub description: Option<String>,
    pub dependencies: Option<DependencyList>,
    pub source_file: Option<String>,
    pub line_range: Option<String>,
}

impl ElementUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn dependencies(mut self, dependencies: impl Into<DependencyList>) -> Self {
        self.dependencies = Some(dependencies.into());
        self
    }

    pub fn source_file(mut self, source_file: impl Into<String>) -> Self {
        self.source_file = Some(source_file.into());
        self
    }

    pub fn line_range(mut self, line_range: impl Into<String>) -> Self {
        self.line_range = Some(line_range.into());
        self
    }
}

/// Singleton aggregate record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metadata {
    /// Set once at first initialization
    #[serde(with = "timestamp::required")]
    pub created_at: DateTime<Utc>,

    /// Always derived by counting stored records
    #[serde(default)]
    pub total_elements: usize,

    #[serde(with = "timestamp::required")]
    pub last_updated: DateTime<Utc>,
}

impl Metadata {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            total_elements: 0,
            last_updated: now,
        }
    }
}

/// Validation errors for elements.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyId,
    IdTooLong,
    InvalidCharacters,
    EmptyKind,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyId => write!(f, "element id cannot be empty"),
            ValidationError::IdTooLong => write!(f, "element id exceeds {} bytes", MAX_ID_LEN),
            ValidationError::InvalidCharacters => write!(f, "element id contains control characters"),
            ValidationError::EmptyKind => write!(f, "element type cannot be empty"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Timestamp (de)serialization.
///
/// Writes RFC 3339. Reads RFC 3339, naive ISO-8601 (taken as UTC), and treats
/// an empty string or null as absent.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            })
    }

    pub mod optional {
        use chrono::{DateTime, Utc};
        use serde::de::Error;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error> {
            match value {
                Some(dt) => serializer.serialize_str(&dt.to_rfc3339()),
                None => serializer.serialize_str(""),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error> {
            let raw: Option<String> = Option::deserialize(deserializer)?;
            match raw.as_deref().map(str::trim) {
                None | Some("") => Ok(None),
                Some(s) => super::parse(s)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {}", s))),
            }
        }
    }

    pub mod required {
        use chrono::{DateTime, Utc};
        use serde::de::Error;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(&value.to_rfc3339())
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
            let raw = String::deserialize(deserializer)?;
            super::parse(raw.trim()).ok_or_else(|| D::Error::custom(format!("invalid timestamp: {}", raw)))
        }
    }
}
