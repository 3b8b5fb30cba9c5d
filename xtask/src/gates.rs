//! Quality gates: independent pass/fail checks run through cargo and git.

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use serde::Deserialize;
use thiserror::Error;

/// Minimum line coverage of the test suite, in percent.
pub const DEFAULT_MIN_COVERAGE: f64 = 88.0;

/// Files cargo generates when packaging, never version-controlled.
const GENERATED_PACKAGE_FILES: &[&str] = &["Cargo.toml.orig", ".cargo_vcs_info.json", "Cargo.lock"];

#[derive(Error, Debug)]
pub enum GateError {
    #[error("type check failed")]
    TypeCheck,
    #[error("tests failed")]
    TestFailure,
    #[error("line coverage {measured:.2}% is below the required {minimum:.2}%")]
    CoverageBelowThreshold { measured: f64, minimum: f64 },
    #[error("code is not formatted, run `cargo fmt --all`")]
    Formatting,
    #[error("lint violations")]
    Lint,
    #[error(
        "packaged files of {package} differ from version-controlled files \
         (missing: {missing:?}, unexpected: {unexpected:?})"
    )]
    ManifestMismatch {
        package: String,
        missing: Vec<String>,
        unexpected: Vec<String>,
    },
    #[error("{tool} failed: {stderr}")]
    Tool { tool: &'static str, stderr: String },
    #[error("invalid {tool} output: {message}")]
    InvalidOutput { tool: &'static str, message: String },
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gate {
    ManifestCheck,
    FmtCheck,
    Lint,
    TypeCheck,
    Test { min_coverage: f64 },
}

impl Gate {
    /// All gates, in pipeline order.
    pub fn pipeline(min_coverage: f64) -> [Gate; 5] {
        [
            Gate::ManifestCheck,
            Gate::FmtCheck,
            Gate::Lint,
            Gate::TypeCheck,
            Gate::Test { min_coverage },
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Gate::ManifestCheck => "manifest-check",
            Gate::FmtCheck => "fmt-check",
            Gate::Lint => "lint",
            Gate::TypeCheck => "type-check",
            Gate::Test { .. } => "test",
        }
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The workspace gates run against.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    cargo: OsString,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cargo: std::env::var_os("CARGO").unwrap_or_else(|| "cargo".into()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn run(&self, gate: Gate) -> Result<(), GateError> {
        tracing::info!(gate = %gate, "running gate");
        match gate {
            Gate::ManifestCheck => self.manifest_check(),
            Gate::FmtCheck => self
                .cargo_status(&["fmt", "--all", "--check"])?
                .then_some(())
                .ok_or(GateError::Formatting),
            Gate::Lint => self
                .cargo_status(&[
                    "clippy",
                    "--workspace",
                    "--all-targets",
                    "--",
                    "-D",
                    "warnings",
                ])?
                .then_some(())
                .ok_or(GateError::Lint),
            Gate::TypeCheck => self
                .cargo_status(&["check", "--workspace", "--all-targets"])?
                .then_some(())
                .ok_or(GateError::TypeCheck),
            Gate::Test { min_coverage } => self.test_with_coverage(min_coverage),
        }
    }

    fn cargo(&self) -> Command {
        let mut command = Command::new(&self.cargo);
        command.current_dir(&self.root);
        command
    }

    /// Run cargo with inherited output, returning whether it succeeded.
    fn cargo_status(&self, args: &[&str]) -> Result<bool, GateError> {
        tracing::debug!(args = ?args, "cargo");
        let status = self
            .cargo()
            .args(args)
            .status()
            .map_err(|source| GateError::Spawn {
                tool: "cargo",
                source,
            })?;
        Ok(status.success())
    }

    /// Run cargo capturing its output. With `show_progress` stderr still goes
    /// to the console.
    fn cargo_output(&self, args: &[&str], show_progress: bool) -> Result<Output, GateError> {
        tracing::debug!(args = ?args, "cargo");
        let mut command = self.cargo();
        command.args(args);
        if show_progress {
            command.stderr(Stdio::inherit());
        }
        command
            .output()
            .map_err(|source| GateError::Spawn {
                tool: "cargo",
                source,
            })
    }

    fn test_with_coverage(&self, min_coverage: f64) -> Result<(), GateError> {
        let output = self.cargo_output(
            &["llvm-cov", "--workspace", "--json", "--summary-only"],
            true,
        )?;
        if !output.status.success() {
            return Err(GateError::TestFailure);
        }
        let measured = coverage_percent(&String::from_utf8_lossy(&output.stdout))?;
        tracing::info!(coverage = measured, minimum = min_coverage, "line coverage");
        check_coverage(measured, min_coverage)
    }

    fn manifest_check(&self) -> Result<(), GateError> {
        let output = self.cargo_output(&["metadata", "--no-deps", "--format-version", "1"], false)?;
        if !output.status.success() {
            return Err(GateError::Tool {
                tool: "cargo metadata",
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let metadata: Metadata =
            serde_json::from_slice(&output.stdout).map_err(|e| GateError::InvalidOutput {
                tool: "cargo metadata",
                message: e.to_string(),
            })?;

        for package in metadata.packages.iter().filter(|p| p.is_published()) {
            let output = self.cargo_output(
                &["package", "--list", "--allow-dirty", "--package", &package.name],
                false,
            )?;
            if !output.status.success() {
                return Err(GateError::Tool {
                    tool: "cargo package",
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }
            let packaged = file_list(&String::from_utf8_lossy(&output.stdout));

            let package_dir = package.manifest_path.parent().unwrap_or(&self.root);
            let tracked = git_ls_files(package_dir)?;
            compare_manifest(&package.name, &packaged, &tracked)?;
            tracing::debug!(package = %package.name, files = packaged.len(), "manifest matches");
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct Metadata {
    packages: Vec<MetadataPackage>,
}

#[derive(Debug, Deserialize)]
struct MetadataPackage {
    name: String,
    manifest_path: PathBuf,
    /// `Some([])` for `publish = false`.
    publish: Option<Vec<String>>,
}

impl MetadataPackage {
    fn is_published(&self) -> bool {
        self.publish.as_ref().is_none_or(|registries| !registries.is_empty())
    }
}

fn git_ls_files(dir: &Path) -> Result<Vec<String>, GateError> {
    let output = Command::new("git")
        .args(["ls-files"])
        .current_dir(dir)
        .output()
        .map_err(|source| GateError::Spawn { tool: "git", source })?;
    if !output.status.success() {
        return Err(GateError::Tool {
            tool: "git ls-files",
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(file_list(&String::from_utf8_lossy(&output.stdout)))
}

/// One path per line, with forward slashes.
pub fn file_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.replace('\\', "/"))
        .collect()
}

/// Fail when the files cargo would package differ from the files under
/// version control, ignoring the files cargo generates.
pub fn compare_manifest(
    package: &str,
    packaged: &[String],
    tracked: &[String],
) -> Result<(), GateError> {
    let packaged: BTreeSet<&str> = packaged
        .iter()
        .map(String::as_str)
        .filter(|f| !GENERATED_PACKAGE_FILES.contains(f))
        .collect();
    let tracked: BTreeSet<&str> = tracked.iter().map(String::as_str).collect();

    let missing: Vec<String> = tracked.difference(&packaged).map(|f| f.to_string()).collect();
    let unexpected: Vec<String> = packaged.difference(&tracked).map(|f| f.to_string()).collect();
    if missing.is_empty() && unexpected.is_empty() {
        Ok(())
    } else {
        Err(GateError::ManifestMismatch {
            package: package.to_string(),
            missing,
            unexpected,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CoverageExport {
    data: Vec<CoverageData>,
}

#[derive(Debug, Deserialize)]
struct CoverageData {
    totals: CoverageTotals,
}

#[derive(Debug, Deserialize)]
struct CoverageTotals {
    lines: CoverageSummary,
}

#[derive(Debug, Deserialize)]
struct CoverageSummary {
    percent: f64,
}

/// Total line coverage from a `cargo llvm-cov --json --summary-only` export.
pub fn coverage_percent(json: &str) -> Result<f64, GateError> {
    let export: CoverageExport =
        serde_json::from_str(json).map_err(|e| GateError::InvalidOutput {
            tool: "cargo llvm-cov",
            message: e.to_string(),
        })?;
    export
        .data
        .first()
        .map(|data| data.totals.lines.percent)
        .ok_or_else(|| GateError::InvalidOutput {
            tool: "cargo llvm-cov",
            message: "no coverage data".to_string(),
        })
}

pub fn check_coverage(measured: f64, minimum: f64) -> Result<(), GateError> {
    if measured < minimum {
        Err(GateError::CoverageBelowThreshold { measured, minimum })
    } else {
        Ok(())
    }
}
