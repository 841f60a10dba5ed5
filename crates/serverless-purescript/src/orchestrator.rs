/// Build orchestrator that generates, compiles and removes the entrypoints

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::extract::{FunctionDescriptor, ModuleSet};
use crate::templates::{self, ADAPTER_FILE, ENTRYPOINT_FILE};
use crate::toolchain::CompilerCommand;

/// Everything one compile needs. Built per invocation.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub modules: ModuleSet,
    pub functions: Vec<FunctionDescriptor>,
    pub debug_mode: bool,
}

impl BuildConfig {
    pub fn new(functions: Vec<FunctionDescriptor>) -> Self {
        Self {
            modules: ModuleSet::from_functions(&functions),
            functions,
            debug_mode: false,
        }
    }

    pub fn debug_mode(mut self, debug_mode: bool) -> Self {
        self.debug_mode = debug_mode;
        self
    }
}

/// Fixed locations under a service root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPaths {
    pub service_path: PathBuf,
}

impl BuildPaths {
    pub fn new(service_path: impl Into<PathBuf>) -> Self {
        Self {
            service_path: service_path.into(),
        }
    }

    /// `<service>/.serverless/purescript`
    pub fn work_dir(&self) -> PathBuf {
        self.service_path.join(".serverless").join("purescript")
    }

    /// `<workDir>/gen`
    pub fn gen_dir(&self) -> PathBuf {
        self.work_dir().join("gen")
    }

    /// `<workDir>/gen/handlers.purs`
    pub fn entrypoint_source(&self) -> PathBuf {
        self.gen_dir().join(ENTRYPOINT_FILE)
    }

    /// `<service>/purescript.js`
    pub fn adapter(&self) -> PathBuf {
        self.service_path.join(ADAPTER_FILE)
    }
}

/// Runs the generate/compile/write sequence and its cleanup.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    paths: BuildPaths,
    compiler: CompilerCommand,
}

impl Orchestrator {
    pub fn new(paths: BuildPaths) -> Self {
        Self {
            paths,
            compiler: CompilerCommand::default(),
        }
    }

    pub fn compiler(mut self, compiler: CompilerCommand) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn paths(&self) -> &BuildPaths {
        &self.paths
    }

    /// Generate entrypoints, compile them and write the adapter.
    pub async fn compile(&self, config: &BuildConfig) -> Result<()> {
        self.compile_with_cancel(config, &CancellationToken::new())
            .await
    }

    /// As [`compile`](Self::compile), stopping at the next step once `cancel`
    /// fires. A write already underway is not interrupted.
    pub async fn compile_with_cancel(
        &self,
        config: &BuildConfig,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if config.functions.is_empty() {
            debug!("No PureScript functions declared, skipping build");
            return Ok(());
        }

        let gen_dir = self.paths.gen_dir();
        checkpoint(cancel)?;
        tokio::fs::create_dir_all(&gen_dir)
            .await
            .map_err(|e| Error::filesystem(&gen_dir, e))?;

        info!("Building entrypoints.");
        let source = templates::render_entrypoints(&config.modules, &config.functions);
        checkpoint(cancel)?;
        write_file(&self.paths.entrypoint_source(), source).await?;

        info!("Compiling Purescript.");
        checkpoint(cancel)?;
        self.compiler
            .run(&gen_dir, &self.paths.service_path, cancel)
            .await?;

        info!("Writing purescript entrypoints file.");
        let adapter = templates::render_adapter(&config.functions, config.debug_mode);
        checkpoint(cancel)?;
        write_file(&self.paths.adapter(), adapter).await?;

        info!("PureScript built.");
        Ok(())
    }

    /// Remove the adapter. Succeeds if it is already gone.
    pub async fn cleanup(&self) -> Result<()> {
        info!("Cleaning up purescript.");
        let adapter = self.paths.adapter();
        match tokio::fs::remove_file(&adapter).await {
            Ok(()) => {
                debug!("Removed {}", adapter.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("{} already absent", adapter.display());
                Ok(())
            }
            Err(e) => {
                warn!("Failed to remove {}: {}", adapter.display(), e);
                Err(Error::filesystem(adapter, e))
            }
        }
    }
}

fn checkpoint(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    Ok(())
}

async fn write_file(path: &Path, contents: String) -> Result<()> {
    debug!("Writing {}", path.display());
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| Error::filesystem(path, e))
}
