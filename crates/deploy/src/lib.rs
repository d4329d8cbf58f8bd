//! Build and push the multi-arch transcoder image with `docker buildx`.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use clap::Parser;

/// Repository pushed to when no name is given.
pub const DEFAULT_REPOSITORY: &str = "registry.meisterlala.dev/transcoder";

/// Default of the older shell push script. Note `transcode`, not `transcoder`.
pub const BASH_DEFAULT_REPOSITORY: &str = "registry.meisterlala.dev/transcode";

/// Tag applied to every pushed image.
pub const TAG: &str = "latest";

/// Target platforms of the image manifest.
pub const PLATFORMS: [&str; 2] = ["linux/amd64", "linux/arm64"];

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("docker not found on PATH: {0}")]
    DockerNotFound(#[source] io::Error),

    #[error("failed to run docker: {0}")]
    Spawn(#[source] io::Error),
}

/// `<repository>:<tag>` push target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryTag(String);

impl RegistryTag {
    /// Tag `repository` with [`TAG`]. A missing or empty repository falls
    /// back to `default`.
    pub fn new(repository: Option<&str>, default: &str) -> Self {
        let repository = repository.filter(|r| !r.is_empty()).unwrap_or(default);
        Self(format!("{repository}:{TAG}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegistryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// [`PLATFORMS`] in the comma-separated form buildx expects.
pub fn platform_list() -> String {
    PLATFORMS.join(",")
}

#[derive(Parser, Debug)]
#[command(name = "transcoder-push")]
#[command(about = "Build and push the multi-arch transcoder image")]
pub struct PushArgs {
    /// Repository to push to (default: registry.meisterlala.dev/transcoder)
    pub repo_name: Option<String>,

    /// Fall back to the shell script's `transcode` repository instead
    #[arg(long)]
    pub bash_default: bool,

    /// Build context directory
    #[arg(long, default_value = ".")]
    pub context: PathBuf,

    /// Dockerfile to build (default: <context>/Dockerfile)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Build without pushing to the registry
    #[arg(long)]
    pub no_push: bool,
}

/// One `docker buildx build` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    pub tag: RegistryTag,
    pub context: PathBuf,
    pub dockerfile: Option<PathBuf>,
    pub push: bool,
}

impl From<&PushArgs> for BuildPlan {
    fn from(args: &PushArgs) -> Self {
        let default = if args.bash_default {
            BASH_DEFAULT_REPOSITORY
        } else {
            DEFAULT_REPOSITORY
        };
        Self {
            tag: RegistryTag::new(args.repo_name.as_deref(), default),
            context: args.context.clone(),
            dockerfile: args.file.clone(),
            push: !args.no_push,
        }
    }
}

impl BuildPlan {
    /// Arguments passed to `docker`.
    pub fn docker_args(&self) -> Vec<String> {
        let mut args = vec![
            "buildx".to_string(),
            "build".to_string(),
            "--platform".to_string(),
            platform_list(),
            "-t".to_string(),
            self.tag.to_string(),
        ];
        if let Some(file) = &self.dockerfile {
            args.push("-f".to_string());
            args.push(file.to_string_lossy().into_owned());
        }
        if self.push {
            args.push("--push".to_string());
        }
        args.push(self.context.to_string_lossy().into_owned());
        args
    }

    /// Run the build, inheriting stdio. Returns docker's exit code; a
    /// signal-terminated docker counts as 1.
    pub async fn execute(&self) -> Result<i32, DeployError> {
        self.execute_with("docker").await
    }

    /// [`BuildPlan::execute`] with a different docker binary.
    pub async fn execute_with(&self, program: &str) -> Result<i32, DeployError> {
        let args = self.docker_args();
        tracing::debug!(program, args = %args.join(" "), "Running buildx");

        let status = tokio::process::Command::new(program)
            .args(&args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => DeployError::DockerNotFound(e),
                _ => DeployError::Spawn(e),
            })?;

        Ok(status.code().unwrap_or(1))
    }
}
