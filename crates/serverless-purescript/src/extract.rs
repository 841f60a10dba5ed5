//! Function extraction from the service's function table.
//!
//! Finds every function annotated with a qualified PureScript reference and
//! works out which modules the generated entrypoint has to import. Handler
//! rewrites are returned as a [`HandlerPatch`] rather than applied in place.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::service::{HANDLER_FIELD, PURESCRIPT_FIELD, Service};
use crate::templates::ADAPTER_MODULE;

/// A function whose handler is a compiled PureScript value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDescriptor {
    /// Function key in the service's function table
    pub name: String,
    /// Fully-qualified reference, e.g. `Handlers.Users.create`
    pub qualified_name: String,
    /// `qualified_name` without its last segment
    pub module: String,
}

impl FunctionDescriptor {
    pub fn new(name: impl Into<String>, qualified_name: impl Into<String>) -> Self {
        let qualified_name = qualified_name.into();
        let module = module_path(&qualified_name);
        Self {
            name: name.into(),
            qualified_name,
            module,
        }
    }

    /// Handler string that resolves to this function's wrapper in the adapter.
    pub fn adapter_handler(&self) -> String {
        format!("{}.{}", ADAPTER_MODULE, self.name)
    }
}

/// Drop the final segment of a dotted path.
///
/// A path with no dots yields an empty module.
pub fn module_path(qualified_name: &str) -> String {
    match qualified_name.rfind('.') {
        Some(idx) => qualified_name[..idx].to_string(),
        None => String::new(),
    }
}

/// Deduplicated module paths in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleSet {
    modules: Vec<String>,
}

impl ModuleSet {
    pub fn from_functions(functions: &[FunctionDescriptor]) -> Self {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut modules = Vec::new();
        for function in functions {
            if seen.insert(&function.module) {
                modules.push(function.module.clone());
            }
        }
        Self { modules }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// Handler rewrites for matched functions, in table order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerPatch {
    entries: Vec<(String, String)>,
}

impl HandlerPatch {
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Point each matched function's handler at the adapter.
    pub fn apply(&self, service: &mut Service) {
        for (name, handler) in &self.entries {
            if let Some(Value::Object(def)) = service.functions.get_mut(name) {
                def.insert(HANDLER_FIELD.to_string(), Value::String(handler.clone()));
            }
        }
    }

    /// `{ "<name>": "<handler>" }`, for hosts that apply the patch themselves.
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .entries
            .iter()
            .map(|(name, handler)| (name.clone(), Value::String(handler.clone())))
            .collect();
        Value::Object(map)
    }
}

/// Result of scanning a function table.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub functions: Vec<FunctionDescriptor>,
    pub patch: HandlerPatch,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn modules(&self) -> ModuleSet {
        ModuleSet::from_functions(&self.functions)
    }
}

/// Collect every function carrying a `purescript` reference.
///
/// Functions without one are skipped; they are handled by some other runtime.
pub fn extract_functions(functions: &Map<String, Value>) -> Extraction {
    let functions: Vec<FunctionDescriptor> = functions
        .iter()
        .filter_map(|(name, def)| {
            def.get(PURESCRIPT_FIELD)
                .and_then(Value::as_str)
                .filter(|qualified| !qualified.is_empty())
                .map(|qualified| FunctionDescriptor::new(name.as_str(), qualified))
        })
        .collect();

    let entries = functions
        .iter()
        .map(|f| (f.name.clone(), f.adapter_handler()))
        .collect();

    Extraction {
        functions,
        patch: HandlerPatch { entries },
    }
}
