//! External PureScript compiler invocation.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::{Error, Result};

/// Placeholder in an overridden command replaced by the generated source dir.
pub const GEN_DIR_PLACEHOLDER: &str = "{genDir}";

/// Command used to build the project plus the generated entrypoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for CompilerCommand {
    /// `pulp build -I {genDir}`
    fn default() -> Self {
        Self {
            program: "pulp".to_string(),
            args: vec![
                "build".to_string(),
                "-I".to_string(),
                GEN_DIR_PLACEHOLDER.to_string(),
            ],
        }
    }
}

impl CompilerCommand {
    /// Build from the `purescriptCompiler` setting, falling back to pulp.
    pub fn from_setting(setting: Option<&[String]>) -> Self {
        match setting {
            Some([program, args @ ..]) => Self {
                program: program.clone(),
                args: args.to_vec(),
            },
            _ => Self::default(),
        }
    }

    /// Arguments with the generated source directory substituted in.
    pub fn resolved_args(&self, gen_dir: &Path) -> Vec<String> {
        let gen_dir = gen_dir.display().to_string();
        self.args
            .iter()
            .map(|arg| arg.replace(GEN_DIR_PLACEHOLDER, &gen_dir))
            .collect()
    }

    /// Run the compiler in `cwd` and wait for it.
    ///
    /// A non-zero exit becomes [`Error::Compile`] carrying the captured stderr.
    /// If `cancel` fires first the child is killed and [`Error::Cancelled`]
    /// is returned.
    pub async fn run(&self, gen_dir: &Path, cwd: &Path, cancel: &CancellationToken) -> Result<()> {
        let args = self.resolved_args(gen_dir);
        debug!("Running {} {}", self.program, args.join(" "));

        let child = Command::new(&self.program)
            .args(&args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| Error::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let output = tokio::select! {
            output = child.wait_with_output() => output.map_err(|source| Error::Spawn {
                program: self.program.clone(),
                source,
            })?,
            _ = cancel.cancelled() => return Err(Error::Cancelled),
        };

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        error!("{}", stderr.trim_end());
        Err(Error::Compile {
            status: output.status.code(),
            stderr,
        })
    }
}
