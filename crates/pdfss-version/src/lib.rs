//! Version of a build derived from the git history.
//!
//! Releases are `vMAJOR.MINOR.PATCH` tags. A commit `N` commits past the
//! latest release gets the next patch pre-release `MAJOR.MINOR.(PATCH+1)-dev.N`.
//! Uncommitted changes never show in the version.

use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

/// Tag pattern given to `git describe`.
pub const TAG_PATTERN: &str = "v[0-9]*";

/// Files below a `.git` directory whose changes can change the version:
/// HEAD moves on checkout, `refs` on commit and tag, `packed-refs` on gc.
const VERSION_INPUTS: [&str; 3] = ["HEAD", "refs", "packed-refs"];

/// Paths a build script should watch to keep a derived version current.
pub fn version_inputs(git_dir: &Path) -> Vec<PathBuf> {
    VERSION_INPUTS.iter().map(|name| git_dir.join(name)).collect()
}

#[derive(Error, Debug)]
pub enum VersionError {
    #[error("invalid release tag {0:?}, expected vMAJOR.MINOR.PATCH")]
    InvalidTag(String),
    #[error("unexpected git describe output {0:?}")]
    InvalidDescribe(String),
    #[error("git {command} failed: {stderr}")]
    Git { command: &'static str, stderr: String },
    #[error("failed to run git: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    /// Commits since the release, `None` for the release itself.
    pub dev: Option<u64>,
}

impl Version {
    /// Parse a release tag such as `v1.2.0`.
    pub fn from_tag(tag: &str) -> Result<Self, VersionError> {
        let invalid = || VersionError::InvalidTag(tag.to_string());
        let numbers = tag.strip_prefix('v').ok_or_else(invalid)?;

        let parts: Vec<&str> = numbers.split('.').collect();
        let [major, minor, patch] = parts.as_slice() else {
            return Err(invalid());
        };
        let number = |s: &str| -> Result<u64, VersionError> {
            if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            s.parse().map_err(|_| invalid())
        };
        Ok(Self {
            major: number(major)?,
            minor: number(minor)?,
            patch: number(patch)?,
            dev: None,
        })
    }

    /// Pre-release of the next patch, `distance` commits past `self`.
    pub fn next_dev(&self, distance: u64) -> Self {
        Self {
            major: self.major,
            minor: self.minor,
            patch: self.patch + 1,
            dev: Some(distance),
        }
    }

    /// Version of a history with no release tag at all.
    pub fn untagged(commit_count: u64) -> Self {
        Self {
            major: 0,
            minor: 1,
            patch: 0,
            dev: Some(commit_count),
        }
    }

    pub fn is_release(&self) -> bool {
        self.dev.is_none()
    }
}

/// Pre-releases sort before the release of the same `MAJOR.MINOR.PATCH`.
impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (self.dev, other.dev) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(&b),
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(dev) = self.dev {
            write!(f, "-dev.{dev}")?;
        }
        Ok(())
    }
}

/// Version from `git describe --tags --long --dirty` output, e.g.
/// `v1.2.0-3-gabc1234-dirty` gives `1.2.1-dev.3`.
pub fn from_describe(describe: &str) -> Result<Version, VersionError> {
    let describe = describe.trim();
    let clean = describe.strip_suffix("-dirty").unwrap_or(describe);

    // the tag itself may contain dashes, split from the right
    let mut parts = clean.rsplitn(3, '-');
    let (Some(hash), Some(distance), Some(tag)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(VersionError::InvalidDescribe(describe.to_string()));
    };
    if !hash.starts_with('g') {
        return Err(VersionError::InvalidDescribe(describe.to_string()));
    }
    let distance: u64 = distance
        .parse()
        .map_err(|_| VersionError::InvalidDescribe(describe.to_string()))?;

    let release = Version::from_tag(tag)?;
    Ok(if distance == 0 {
        release
    } else {
        release.next_dev(distance)
    })
}

/// Derive the version of the work tree at `repo_dir`.
pub fn describe_repo(repo_dir: &Path) -> Result<Version, VersionError> {
    let output = Command::new("git")
        .args(["describe", "--tags", "--long", "--dirty", "--match", TAG_PATTERN])
        .current_dir(repo_dir)
        .output()?;

    if output.status.success() {
        let describe = String::from_utf8_lossy(&output.stdout);
        tracing::debug!(describe = %describe.trim(), "git describe");
        return from_describe(&describe);
    }

    // no release tag reachable
    tracing::debug!(
        stderr = %String::from_utf8_lossy(&output.stderr).trim(),
        "git describe found no tag"
    );
    let output = Command::new("git")
        .args(["rev-list", "--count", "HEAD"])
        .current_dir(repo_dir)
        .output()?;
    if !output.status.success() {
        return Err(VersionError::Git {
            command: "rev-list",
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    let count = String::from_utf8_lossy(&output.stdout);
    let count: u64 = count
        .trim()
        .parse()
        .map_err(|_| VersionError::InvalidDescribe(count.trim().to_string()))?;
    Ok(Version::untagged(count))
}
