use std::process::Stdio;
use std::time::Duration;

use super::{Error, Result, Transport, TransportKind, validate_reference};
use crate::metrics::RawStats;
use crate::model::{
    ComposeAction, ComposeProject, ContainerSnapshot, ImageSnapshot, LifecycleAction, PruneReport,
    RuntimeVersion,
};
use crate::normalize::cli as output;

pub const DEFAULT_CLI: &str = "docker";
pub const DEFAULT_COMPOSE_LEGACY_CLI: &str = "docker-compose";

/// Captured output of a successful command.
#[derive(Debug)]
struct Captured {
    stdout: String,
    stderr: String,
}

/// Runs the runtime's command line client.
///
/// Compose commands try the `compose` subcommand of the runtime CLI first and fall back to the
/// standalone legacy binary within the same call.
#[derive(Debug, Clone)]
pub struct CliTransport {
    program: String,
    compose_legacy: String,
    timeout: Duration,
}

impl CliTransport {
    pub fn new(
        program: impl Into<String>,
        compose_legacy: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            compose_legacy: compose_legacy.into(),
            timeout,
        }
    }

    /// Runs a command to completion. The child is killed when the timeout elapses.
    async fn exec(&self, program: &str, args: &[&str]) -> Result<Captured> {
        log::trace!("exec {program} {}", args.join(" "));
        let child = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();
        let out = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| Error::Timeout {
                operation: format!("`{program} {}`", args.join(" ")),
                after: self.timeout,
            })?
            .map_err(|source| Error::Spawn {
                program: program.to_owned(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&out.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&out.stderr).into_owned();
        if !out.status.success() {
            return Err(Error::Exit {
                program: program.to_owned(),
                code: out.status.code(),
                stderr: stderr.trim().to_owned(),
            });
        }
        Ok(Captured { stdout, stderr })
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        Ok(self.exec(&self.program, args).await?.stdout)
    }

    async fn compose(&self, args: &[&str]) -> Result<String> {
        let mut modern = Vec::with_capacity(args.len() + 1);
        modern.push("compose");
        modern.extend_from_slice(args);
        match self.exec(&self.program, &modern).await {
            Ok(out) => Ok(out.stdout),
            Err(err) if missing_compose(&err) => {
                log::debug!(
                    "`{} compose` unavailable, trying `{}`: {err}",
                    self.program,
                    self.compose_legacy
                );
                match self.exec(&self.compose_legacy, args).await {
                    Ok(out) => Ok(out.stdout),
                    Err(legacy) => Err(Error::ComposeFailed {
                        modern: Box::new(err),
                        legacy: Box::new(legacy),
                    }),
                }
            }
            Err(err) => Err(err),
        }
    }
}

/// Whether the runtime CLI lacks the `compose` subcommand, as opposed to compose itself failing.
fn missing_compose(err: &Error) -> bool {
    match err {
        Error::Spawn { .. } => true,
        Error::Exit { stderr, .. } => {
            let stderr = stderr.to_lowercase();
            stderr.contains("unknown command") || stderr.contains("not a docker command")
        }
        _ => false,
    }
}

impl Transport for CliTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Cli
    }

    async fn ping(&self) -> Result<()> {
        self.run(&["info", "--format", "{{.ServerVersion}}"]).await?;
        Ok(())
    }

    async fn version(&self) -> Result<RuntimeVersion> {
        let out = self
            .run(&["version", "--format", output::VERSION_FORMAT])
            .await?;
        Ok(output::version(&out)?)
    }

    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSnapshot>> {
        let mut args = vec!["ps"];
        if all {
            args.push("--all");
        }
        args.extend(["--format", output::CONTAINER_FORMAT]);
        let out = self.run(&args).await?;
        Ok(output::containers(&out)?)
    }

    async fn stats(&self, container: &str) -> Result<RawStats> {
        let container = validate_reference(container)?;
        let out = self
            .run(&[
                "stats",
                "--no-stream",
                "--format",
                output::STATS_FORMAT,
                container,
            ])
            .await?;
        Ok(RawStats::Precomputed(output::stats(&out)?))
    }

    async fn logs(&self, container: &str, tail: usize, timestamps: bool) -> Result<String> {
        let container = validate_reference(container)?;
        let tail = tail.to_string();
        let mut args = vec!["logs", "--tail", tail.as_str()];
        if timestamps {
            args.push("--timestamps");
        }
        args.push(container);
        let captured = self.exec(&self.program, &args).await?;
        Ok(captured.stdout + &captured.stderr)
    }

    async fn lifecycle(
        &self,
        container: &str,
        action: LifecycleAction,
        timeout: Option<u32>,
    ) -> Result<()> {
        let container = validate_reference(container)?;
        let timeout = timeout.map(|t| t.to_string());
        let mut args = vec![action.as_str()];
        if let (Some(t), LifecycleAction::Stop | LifecycleAction::Restart) = (&timeout, action) {
            args.extend(["--time", t.as_str()]);
        }
        args.push(container);
        self.run(&args).await?;
        Ok(())
    }

    async fn list_images(&self, all: bool) -> Result<Vec<ImageSnapshot>> {
        let mut args = vec!["images"];
        if all {
            args.push("--all");
        }
        args.extend(["--format", output::IMAGE_FORMAT]);
        let out = self.run(&args).await?;
        Ok(output::images(&out)?)
    }

    async fn remove_image(&self, image: &str, force: bool) -> Result<()> {
        let image = validate_reference(image)?;
        let mut args = vec!["rmi"];
        if force {
            args.push("--force");
        }
        args.push(image);
        self.run(&args).await?;
        Ok(())
    }

    async fn prune_images(&self) -> Result<PruneReport> {
        let out = self.run(&["image", "prune", "--force"]).await?;
        Ok(output::prune_report(&out)?)
    }

    async fn list_compose_projects(&self) -> Result<Vec<ComposeProject>> {
        let listing = output::compose_listing(
            &self.compose(&["ls", "--all", "--format", "json"]).await?,
        )?;

        let mut projects = Vec::with_capacity(listing.len());
        for entry in &listing {
            let services = match self
                .compose(&[
                    "-p",
                    entry.name.as_str(),
                    "ps",
                    "--all",
                    "--format",
                    output::COMPOSE_SERVICE_FORMAT,
                ])
                .await
                .and_then(|out| Ok(output::compose_services(&out)?))
            {
                Ok(services) => services,
                Err(err) => {
                    log::warn!(
                        "failed to list services of compose project `{}`: {err}",
                        entry.name
                    );
                    Vec::new()
                }
            };
            projects.push(output::compose_project(entry, services));
        }
        Ok(projects)
    }

    async fn compose_action(&self, project: &str, action: ComposeAction) -> Result<()> {
        let project = validate_reference(project)?;
        let listing = output::compose_listing(
            &self.compose(&["ls", "--all", "--format", "json"]).await?,
        )?;
        let config_file = listing
            .iter()
            .find(|entry| entry.name == project)
            .map(|entry| entry.config_file().to_owned())
            .unwrap_or_default();

        let mut args = vec!["-p", project];
        if !config_file.is_empty() {
            args.extend(["-f", config_file.as_str()]);
        }
        args.extend_from_slice(action.args());
        self.compose(&args).await?;
        Ok(())
    }
}
