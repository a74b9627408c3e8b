//! Version ordering for update offers.
//!
//! Release tags in the wild are looser than semver: `v1.4`, `2`,
//! `1.02.0` and four-part `1.2.3.4` all show up. The first three numeric
//! components become a [`semver::Version`]; any further components are
//! compared numerically after the patch number.

use semver::{Prerelease, Version};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// A version string that cannot be ordered.
#[derive(Debug, Error)]
pub enum VersionError {
    /// Empty or non-numeric component.
    #[error("invalid version {0:?}")]
    Invalid(String),

    /// Malformed pre-release tag.
    #[error("invalid pre-release in {0:?}: {1}")]
    Prerelease(String, semver::Error),
}

/// Parsed release version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseVersion {
    core: Version,
    extra: Vec<u64>,
}

impl ReleaseVersion {
    /// `major.minor.patch` plus pre-release.
    pub fn core(&self) -> &Version {
        &self.core
    }

    /// Components past the patch number.
    pub fn extra(&self) -> &[u64] {
        &self.extra
    }
}

impl Ord for ReleaseVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = (self.core.major, self.core.minor, self.core.patch);
        let rhs = (other.core.major, other.core.minor, other.core.patch);
        lhs.cmp(&rhs)
            .then_with(|| cmp_extra(&self.extra, &other.extra))
            .then_with(|| self.core.pre.cmp(&other.core.pre))
    }
}

impl PartialOrd for ReleaseVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.core.major, self.core.minor, self.core.patch)?;
        for part in &self.extra {
            write!(f, ".{}", part)?;
        }
        if !self.core.pre.is_empty() {
            write!(f, "-{}", self.core.pre)?;
        }
        Ok(())
    }
}

/// Missing trailing components count as zero.
fn cmp_extra(lhs: &[u64], rhs: &[u64]) -> Ordering {
    (0..lhs.len().max(rhs.len()))
        .map(|i| {
            let a = lhs.get(i).copied().unwrap_or(0);
            let b = rhs.get(i).copied().unwrap_or(0);
            a.cmp(&b)
        })
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Parse a version the way release tags are usually written.
///
/// Accepts a leading `v`, missing minor/patch components (`"2"` is
/// `2.0.0`), leading zeros and more than three components. Build metadata
/// after `+` is ignored.
pub fn parse_version(raw: &str) -> Result<ReleaseVersion, VersionError> {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    let without_build = trimmed.split('+').next().unwrap_or_default();

    let (numbers, pre) = match without_build.split_once('-') {
        Some((numbers, pre)) => (numbers, pre),
        None => (without_build, ""),
    };

    let parts = numbers
        .split('.')
        .map(|part| {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            part.parse::<u64>().ok()
        })
        .collect::<Option<Vec<u64>>>()
        .ok_or_else(|| VersionError::Invalid(raw.to_string()))?;

    let component = |i: usize| parts.get(i).copied().unwrap_or(0);
    let mut core = Version::new(component(0), component(1), component(2));
    if !pre.is_empty() {
        core.pre = Prerelease::new(pre).map_err(|e| VersionError::Prerelease(raw.to_string(), e))?;
    }

    Ok(ReleaseVersion {
        core,
        extra: parts.iter().skip(3).copied().collect(),
    })
}

/// Whether `candidate` is strictly newer than `current`.
pub fn is_newer(candidate: &str, current: &str) -> Result<bool, VersionError> {
    Ok(parse_version(candidate)? > parse_version(current)?)
}
