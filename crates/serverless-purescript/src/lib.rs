//! Serverless PureScript build hooks
//!
//! Compiles PureScript Lambda handlers into a JavaScript entrypoint module
//! before Serverless packages a service, and removes it afterwards.

pub mod error;
pub mod extract;
pub mod orchestrator;
pub mod plugin;
pub mod service;
pub mod templates;
pub mod toolchain;

pub use error::{Error, Result};
pub use extract::{Extraction, FunctionDescriptor, HandlerPatch, ModuleSet, extract_functions};
pub use orchestrator::{BuildConfig, BuildPaths, Orchestrator};
pub use plugin::{HOOKS, HookAction, InterruptGuard, Plugin, hook_action};
pub use service::{Service, Settings};
pub use toolchain::CompilerCommand;
