//! Dynamic module discovery and loading
//!
//! This module handles:
//! - Scanning the module root for loadable units (`*.agent.json`)
//! - Content-digest change tracking (NEW/UNCHANGED/MODIFIED/REMOVED)
//! - Binding manifests to registered behavior classes
//! - Instantiating lifecycle engines from loaded modules

mod catalog;
mod module_loader;
mod scanner;

pub use catalog::{BehaviorCatalog, BehaviorFactory};
pub use module_loader::ModuleLoader;
pub use scanner::{ModuleFile, ModuleScanner, MODULE_SUFFIX};
