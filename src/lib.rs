//! ctree: a persistent dependency graph of code elements.
//!
//! Each element (function, module, constant, variable) is stored as one JSON
//! record under `<working-dir>/knowledge-tree/elements/`. The store keeps the
//! `dependencies` and `dependents` lists of every element reciprocal, tolerates
//! dependencies on elements that do not exist yet, and reports on them.
//!
//! # Example
//!
//! ```no_run
//! use ctree::{Config, DependencyMode, NewElement, Store};
//!
//! let config = Config::new(".");
//! let mut store = Store::init(&config).unwrap();
//!
//! // `hr` depends on `r5634`, which is not known yet
//! store
//!     .add_element(NewElement::new("hr", "function").description("Hash router").dependencies(["r5634"]))
//!     .unwrap();
//! assert_eq!(store.find_missing(None).unwrap().total_missing, 1);
//!
//! // Adding it later makes the edge reciprocal
//! store.add_element(NewElement::new("r5634", "module")).unwrap();
//! assert_eq!(store.get("r5634").unwrap().unwrap().dependents, vec!["hr"]);
//!
//! store.edit_dependencies("hr", ["r5634", "ge"], DependencyMode::Replace).unwrap();
//!
//! println!("{}", store.render_tree(Some("hr"), 3).unwrap().tree);
//! ```

mod id;
mod repository;
mod storage;
mod store;
mod types;

pub mod client;
pub mod config;
pub mod daemon;
pub mod import;
pub mod mcp;
pub mod protocol;
pub mod stats;
pub mod tools;
pub mod tree;

// Re-export public API
pub use client::Client;
pub use config::{Config, WorkingDirectoryInfo};
pub use daemon::{Daemon, is_daemon_running};
pub use protocol::{Request, Response};
pub use stats::{MissingReport, Stats};
pub use store::{
    AddOutcome, DependencyAnalysis, DependencyChange, EditOutcome, FailedUpdate, RemovalReport, Store, StoreError,
    UpdateOutcome,
};
pub use tools::{ErrorKind, ToolCall};
pub use tree::TreeView;
pub use types::{
    DependencyList, DependencyMode, Element, ElementKind, ElementSummary, ElementUpdate, Metadata, NewElement,
    ValidationError,
};
