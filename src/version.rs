//! Build names and version pointers
//!
//! A *specific build* is a directly fetchable identifier like `static-1.4`.
//! A *pointer* is a symbolic reference (`current`, `edge`, or a bare major
//! version number) that must be resolved over the network before it can be
//! compared with anything.

use std::cmp::Ordering;
use std::fmt;

/// Prefix that marks a fully resolved build name
pub const BUILD_PREFIX: &str = "static-";

/// Default pointer used when a project is missing from the dependency manifest
pub const DEFAULT_POINTER: &str = "current";

/// A parsed specific build name, totally ordered by `(major, minor)`.
///
/// Keeps the raw string around so URLs are built from exactly what the
/// caller or origin supplied.
#[derive(Debug, Clone, Eq)]
pub struct BuildName {
    raw: String,
    major: u32,
    minor: u32,
}

impl BuildName {
    /// Parse a build name like `static-1.4` (or a bare `1.4`).
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let digits = trimmed.strip_prefix(BUILD_PREFIX).unwrap_or(trimmed);
        let (major, minor) = digits.split_once('.')?;
        Some(Self {
            raw: trimmed.to_string(),
            major: major.parse().ok()?,
            minor: minor.parse().ok()?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }
}

impl PartialEq for BuildName {
    fn eq(&self, other: &Self) -> bool {
        (self.major, self.minor) == (other.major, other.minor)
    }
}

impl Ord for BuildName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
    }
}

impl PartialOrd for BuildName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for BuildName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Whether a version string is a specific build (as opposed to a pointer)
pub fn is_specific_build(value: &str) -> bool {
    value.starts_with(BUILD_PREFIX)
}

/// Map a pointer to the file name it lives under at the origin.
///
/// A bare integer pointer means "latest build of major version N" and lives
/// under `latest-version-N`; symbolic pointers (`current`, `edge`) are used
/// as-is.
pub fn pointer_file_name(pointer: &str) -> String {
    if !pointer.is_empty() && pointer.chars().all(|c| c.is_ascii_digit()) {
        format!("latest-version-{}", pointer)
    } else {
        pointer.to_string()
    }
}

/// Maximum of any number of optional build candidates, by `(major, minor)`.
///
/// Returns `None` when every candidate is absent.
pub fn max_build<I>(candidates: I) -> Option<BuildName>
where
    I: IntoIterator<Item = Option<BuildName>>,
{
    candidates.into_iter().flatten().max()
}
