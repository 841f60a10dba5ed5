//! Lifecycle hook bindings.
//!
//! The Serverless framework fires named hooks around packaging and around
//! `serverless offline`. [`Plugin`] maps each hook name to a compile or a
//! cleanup, and owns the handler patch applied to the service.

use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::extract::{HandlerPatch, extract_functions};
use crate::orchestrator::{BuildConfig, BuildPaths, Orchestrator};
use crate::service::Service;
use crate::toolchain::CompilerCommand;

/// What a lifecycle hook runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookAction {
    Compile,
    Cleanup,
    /// Compile, cleaning up on Ctrl+C since the packaging hooks never fire.
    OfflineCompile,
}

impl HookAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookAction::Compile => "compile",
            HookAction::Cleanup => "cleanup",
            HookAction::OfflineCompile => "offline-compile",
        }
    }
}

/// Hook names this plugin binds, in registration order.
pub const HOOKS: &[(&str, HookAction)] = &[
    // Full deploy
    ("before:deploy:createDeploymentArtifacts", HookAction::Compile),
    ("after:deploy:createDeploymentArtifacts", HookAction::Cleanup),
    // Single function deploy
    ("before:deploy:function:packageFunction", HookAction::Compile),
    ("after:deploy:function:packageFunction", HookAction::Cleanup),
    // serverless-offline
    ("before:offline:start", HookAction::OfflineCompile),
    ("before:offline:start:init", HookAction::OfflineCompile),
    ("before:offline:start:end", HookAction::Cleanup),
];

/// Look up the action bound to a hook name.
pub fn hook_action(name: &str) -> Option<HookAction> {
    HOOKS
        .iter()
        .find(|(hook, _)| *hook == name)
        .map(|(_, action)| *action)
}

/// Background task that cleans up when its signal fires.
///
/// Dropping the guard stops watching.
#[derive(Debug)]
pub struct InterruptGuard {
    handle: Option<JoinHandle<()>>,
}

impl InterruptGuard {
    /// Wait for the watcher to observe its signal and finish cleaning up.
    pub async fn finished(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// The plugin instance bound to one service.
pub struct Plugin {
    service: Service,
    orchestrator: Orchestrator,
    cancel: CancellationToken,
    interrupt: Option<InterruptGuard>,
}

impl Plugin {
    pub fn new(service: Service) -> Result<Self> {
        let settings = service.settings()?;
        let compiler = CompilerCommand::from_setting(settings.purescript_compiler.as_deref());
        let orchestrator =
            Orchestrator::new(BuildPaths::new(&service.service_path)).compiler(compiler);

        Ok(Self {
            service,
            orchestrator,
            cancel: CancellationToken::new(),
            interrupt: None,
        })
    }

    pub fn service(&self) -> &Service {
        &self.service
    }

    pub fn into_service(self) -> Service {
        self.service
    }

    pub fn paths(&self) -> &BuildPaths {
        self.orchestrator.paths()
    }

    /// Token cancelled once an interrupt has been observed.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run whatever `hook` is bound to.
    ///
    /// Returns the handler patch applied to the service (empty for cleanup).
    pub async fn run_hook(&mut self, hook: &str) -> Result<HandlerPatch> {
        let action = hook_action(hook).ok_or_else(|| Error::UnknownHook(hook.to_string()))?;
        debug!("Hook {} -> {}", hook, action.as_str());

        match action {
            HookAction::Compile => self.compile().await,
            HookAction::OfflineCompile => self.offline_compile().await,
            HookAction::Cleanup => {
                self.cleanup().await?;
                Ok(HandlerPatch::default())
            }
        }
    }

    /// Rewrite handlers for PureScript functions, then build them.
    ///
    /// Does nothing when no function declares a PureScript reference.
    pub async fn compile(&mut self) -> Result<HandlerPatch> {
        let settings = self.service.settings()?;
        let extraction = extract_functions(&self.service.functions);

        if extraction.is_empty() {
            debug!("No functions with a purescript reference");
            return Ok(HandlerPatch::default());
        }

        extraction.patch.apply(&mut self.service);

        let config = BuildConfig::new(extraction.functions).debug_mode(settings.purescript_debug);
        self.orchestrator
            .compile_with_cancel(&config, &self.cancel)
            .await?;

        Ok(extraction.patch)
    }

    /// Remove the generated adapter.
    pub async fn cleanup(&self) -> Result<()> {
        self.orchestrator.cleanup().await
    }

    /// Compile for `serverless offline`, cleaning up on Ctrl+C.
    ///
    /// The interrupt handler is registered before anything is written, and
    /// only once however many offline hooks fire. It lives as long as the
    /// plugin; see [`wait_for_interrupt`](Self::wait_for_interrupt).
    pub async fn offline_compile(&mut self) -> Result<HandlerPatch> {
        if self.interrupt.is_none() {
            let signal = interrupt_signal()?;
            return self.offline_compile_on(signal).await;
        }
        self.compile().await
    }

    /// As [`offline_compile`](Self::offline_compile), cleaning up when
    /// `signal` resolves. Ignored if a watcher is already installed.
    pub async fn offline_compile_on<F>(&mut self, signal: F) -> Result<HandlerPatch>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.interrupt.is_none() {
            self.interrupt = Some(self.watch_interrupt(signal));
        }
        self.compile().await
    }

    pub fn is_watching_interrupt(&self) -> bool {
        self.interrupt.is_some()
    }

    /// Block until the installed watcher has fired and cleaned up.
    ///
    /// Returns immediately when no offline compile ran.
    pub async fn wait_for_interrupt(&mut self) {
        if let Some(guard) = self.interrupt.take() {
            info!("Watching for Ctrl+C to remove generated entrypoints");
            guard.finished().await;
        }
    }

    /// Cancel any running build and clean up once `signal` resolves.
    pub fn watch_interrupt<F>(&self, signal: F) -> InterruptGuard
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let cancel = self.cancel.clone();
        let orchestrator = self.orchestrator.clone();

        let handle = tokio::spawn(async move {
            signal.await;
            info!("Interrupted, removing generated entrypoints");
            cancel.cancel();
            if let Err(e) = orchestrator.cleanup().await {
                warn!("Cleanup after interrupt failed: {}", e);
            }
        });

        InterruptGuard {
            handle: Some(handle),
        }
    }
}

/// SIGINT listener, registered with the OS before this returns.
#[cfg(unix)]
fn interrupt_signal() -> Result<impl Future<Output = ()> + Send + 'static> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt()).map_err(Error::Signal)?;
    Ok(async move {
        sigint.recv().await;
    })
}

#[cfg(not(unix))]
fn interrupt_signal() -> Result<impl Future<Output = ()> + Send + 'static> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    })
}
