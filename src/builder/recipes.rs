//! Built-in recipes.
//!
//! Every recipe that shells out goes through [`ProcessBuilder`], so the
//! build's timeout applies uniformly.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::builder::toolchain::{self, Language, Tool};
use crate::core::flags::classes;
use crate::core::recipe::{Recipe, RecipeContext, RecipeError};
use crate::core::target::TargetId;
use crate::util::fs::{ensure_parent, remove_any};
use crate::util::process::{ProcessBuilder, ProcessOutcome};

/// Path of the dependency listing a compile of `object` writes.
pub fn dependency_file(object: &Path) -> PathBuf {
    let mut path = object.as_os_str().to_owned();
    path.push(".d");
    PathBuf::from(path)
}

/// Run a process to completion, mapping failure and timeout.
fn run(cmd: ProcessBuilder, ctx: &RecipeContext<'_>) -> Result<std::process::Output, RecipeError> {
    let command = cmd.display_command();
    tracing::debug!("running `{}`", command);

    match cmd.exec_with_timeout(ctx.timeout)? {
        ProcessOutcome::TimedOut => Err(RecipeError::Timeout {
            command,
            after: ctx.timeout.unwrap_or_default(),
        }),
        ProcessOutcome::Exited(output) if output.status.success() => Ok(output),
        ProcessOutcome::Exited(output) => Err(RecipeError::Failed {
            command,
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }),
    }
}

/// Run a toolchain step, surfacing warnings it printed on success.
fn run_tool(cmd: ProcessBuilder, ctx: &RecipeContext<'_>) -> Result<(), RecipeError> {
    let output = run(cmd, ctx)?;
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim_end();
    if !stderr.is_empty() {
        tracing::warn!("{}:\n{}", ctx.target, stderr);
    }
    Ok(())
}

fn prepare_output<'a>(ctx: &RecipeContext<'a>) -> Result<&'a Path, RecipeError> {
    let output = ctx.output()?;
    ensure_parent(output)?;
    Ok(output)
}

/// Compile one source file into an object, writing a dependency listing.
#[derive(Debug, Default)]
pub struct CompileRecipe;

impl Recipe for CompileRecipe {
    fn name(&self) -> &str {
        "compile"
    }

    fn execute(&self, ctx: &RecipeContext<'_>) -> Result<(), RecipeError> {
        let (source, language) = ctx
            .inputs()
            .find_map(|p| Language::from_path(p).map(|lang| (p, lang)))
            .ok_or_else(|| {
                RecipeError::Other(anyhow::anyhow!(
                    "`{}` has no C or C++ source among its prerequisites",
                    ctx.target
                ))
            })?;
        let object = prepare_output(ctx)?;
        let compiler = toolchain::resolve(language.tool(), ctx.env)?;

        let cmd = ProcessBuilder::new(compiler)
            .args(ctx.flags.get(classes::CPPFLAGS))
            .args(ctx.flags.get(language.flag_class()))
            .arg("-MMD")
            .arg("-MF")
            .arg(dependency_file(object))
            .arg("-c")
            .arg(source)
            .arg("-o")
            .arg(object);
        run_tool(cmd, ctx)
    }

    fn dependency_listing(&self, target: &TargetId) -> Option<PathBuf> {
        target.path().map(dependency_file)
    }
}

/// What a link step produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Program,
    Shared,
}

/// Link objects into a program or shared library.
#[derive(Debug)]
pub struct LinkRecipe {
    kind: LinkKind,
    language: Language,
}

impl LinkRecipe {
    /// `language` picks the driver; C++ objects need the C++ driver.
    pub fn new(kind: LinkKind, language: Language) -> Self {
        LinkRecipe { kind, language }
    }
}

/// Objects and static archives among the declared prerequisites.
fn link_inputs<'a>(ctx: &RecipeContext<'a>) -> Vec<&'a Path> {
    ctx.inputs()
        .filter(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("o" | "obj" | "a" | "lib")
            )
        })
        .collect()
}

impl Recipe for LinkRecipe {
    fn name(&self) -> &str {
        "link"
    }

    fn execute(&self, ctx: &RecipeContext<'_>) -> Result<(), RecipeError> {
        let output = prepare_output(ctx)?;
        let driver = toolchain::resolve(self.language.tool(), ctx.env)?;

        let mut cmd = ProcessBuilder::new(driver);
        if self.kind == LinkKind::Shared {
            cmd = cmd.arg("-shared");
        }
        let cmd = cmd
            .args(link_inputs(ctx))
            .arg("-o")
            .arg(output)
            .args(ctx.flags.get(classes::LDFLAGS));
        run_tool(cmd, ctx)
    }
}

/// Bundle objects into a static archive.
#[derive(Debug, Default)]
pub struct ArchiveRecipe;

impl Recipe for ArchiveRecipe {
    fn name(&self) -> &str {
        "archive"
    }

    fn execute(&self, ctx: &RecipeContext<'_>) -> Result<(), RecipeError> {
        let output = prepare_output(ctx)?;
        let ar = toolchain::resolve(Tool::Ar, ctx.env)?;

        // `ar r` appends, so start from scratch.
        remove_any([output])?;
        let cmd = ProcessBuilder::new(ar)
            .arg("rcs")
            .arg(output)
            .args(link_inputs(ctx));
        run_tool(cmd, ctx)
    }
}

/// Copy the first declared prerequisite onto the target.
#[derive(Debug, Default)]
pub struct CopyRecipe;

impl Recipe for CopyRecipe {
    fn name(&self) -> &str {
        "copy"
    }

    fn execute(&self, ctx: &RecipeContext<'_>) -> Result<(), RecipeError> {
        let source = ctx.inputs().next().ok_or_else(|| {
            RecipeError::Other(anyhow::anyhow!("`{}` has nothing to copy from", ctx.target))
        })?;
        let output = prepare_output(ctx)?;
        std::fs::copy(source, output).map_err(|e| {
            RecipeError::io(
                format!("failed to copy {} to {}", source.display(), output.display()),
                e,
            )
        })?;
        Ok(())
    }
}

/// Remove files and directories, ignoring ones that are already gone.
#[derive(Debug, Clone)]
pub struct RemoveRecipe {
    paths: Vec<PathBuf>,
}

impl RemoveRecipe {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        RemoveRecipe { paths }
    }
}

impl Recipe for RemoveRecipe {
    fn name(&self) -> &str {
        "remove"
    }

    fn execute(&self, _ctx: &RecipeContext<'_>) -> Result<(), RecipeError> {
        remove_any(&self.paths)?;
        Ok(())
    }
}

/// Spawn a command and wait for it.
#[derive(Debug, Clone)]
pub struct CommandRecipe {
    argv: Vec<String>,
    cwd: Option<PathBuf>,
}

impl CommandRecipe {
    pub fn new(argv: Vec<String>, cwd: Option<PathBuf>) -> Self {
        CommandRecipe { argv, cwd }
    }
}

impl Recipe for CommandRecipe {
    fn name(&self) -> &str {
        "command"
    }

    fn execute(&self, ctx: &RecipeContext<'_>) -> Result<(), RecipeError> {
        let Some((program, args)) = self.argv.split_first() else {
            return Err(RecipeError::Other(anyhow::anyhow!(
                "`{}` has an empty command",
                ctx.target
            )));
        };

        let mut cmd = ProcessBuilder::new(program).args(args);
        for (key, value) in ctx.env.vars() {
            cmd = cmd.env(key, value);
        }
        if let Some(cwd) = &self.cwd {
            cmd = cmd.cwd(cwd);
        }

        let output = run(cmd, ctx)?;
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(&output.stdout);
        let _ = stderr.write_all(&output.stderr);
        Ok(())
    }
}
