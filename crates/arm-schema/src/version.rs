//! Versions and the constraint engine.
//!
//! Constraints are written by users in `arm.json` (`^1.2.0`, `~1.2.0`, `1`,
//! `1.2`, `1.2.3`, `latest`, a branch name, or a commit SHA) and matched
//! against the versions a registry adapter lists. Semver comparison ignores
//! a leading `v`; pre-release and build metadata are dropped, not compared.

use semver::Version as SemVer;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of the abbreviated commit hash used as a display version.
pub const SHORT_SHA_LEN: usize = 7;

/// What kind of reference a [`Version`] points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionKind {
    /// A tag or a published package version.
    Tag,
    /// The head of a branch.
    Branch,
    /// A specific commit.
    Commit,
}

/// A concrete version offered by a registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version {
    /// Identifier the adapter needs to fetch content (tag name, branch
    /// name, commit SHA, or registry version string).
    pub id: String,
    /// Reference kind.
    pub kind: VersionKind,
    /// Human-facing form, also used in lock keys and install paths.
    pub display: String,
}

impl Version {
    /// A tag. Plain semver tags display as `vX.Y.Z` regardless of how they
    /// were written; tags with a pre-release or build suffix keep their name
    /// so they never share an identity with the release.
    pub fn tag(name: impl Into<String>) -> Self {
        let id = name.into();
        let display = match parse_semver(&id) {
            Some(v) if !has_suffix(&id) => format!("v{v}"),
            _ => id.clone(),
        };
        Self {
            id,
            kind: VersionKind::Tag,
            display,
        }
    }

    /// The head of a branch, before it is resolved to a commit.
    pub fn branch(name: impl Into<String>) -> Self {
        let id = name.into();
        Self {
            display: id.clone(),
            id,
            kind: VersionKind::Branch,
        }
    }

    /// A commit; displays as the abbreviated hash.
    pub fn commit(sha: impl Into<String>) -> Self {
        let id = sha.into().to_lowercase();
        let display = id.chars().take(SHORT_SHA_LEN).collect();
        Self {
            id,
            kind: VersionKind::Commit,
            display,
        }
    }

    /// Whether this is a tag without a pre-release or build suffix.
    pub fn is_release(&self) -> bool {
        self.kind == VersionKind::Tag && !has_suffix(&self.id)
    }

    /// Semver value of a tag, if it parses as one.
    pub fn semver(&self) -> Option<SemVer> {
        match self.kind {
            VersionKind::Tag => parse_semver(&self.id),
            VersionKind::Branch | VersionKind::Commit => None,
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display)
    }
}

/// Errors raised while parsing or evaluating a constraint.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstraintError {
    /// The constraint string was empty.
    #[error("empty version constraint")]
    Empty,

    /// The string is neither semver-shaped nor a known reference.
    #[error("unrecognized version constraint '{0}'")]
    Unrecognized(String),

    /// A `^`/`~` prefix was followed by something that is not a version.
    #[error("invalid semver in constraint '{0}'")]
    InvalidSemver(String),

    /// No versions were offered at all.
    #[error("no versions available")]
    NoCandidates,

    /// Versions exist but none satisfies the constraint.
    #[error("no matching version for constraint {0}")]
    NoMatch(String),
}

/// A parsed version constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constraint {
    /// `M.m.p`: exactly this version.
    Exact(SemVer),
    /// `^M.m.p`, `M`, `M.m`: same major, at least this minor/patch.
    Major(SemVer),
    /// `~M.m.p`: same major and minor, at least this patch.
    Minor(SemVer),
    /// A branch (or non-semver tag) by name.
    BranchHead(String),
    /// A commit SHA or unambiguous prefix of one.
    Commit(String),
    /// Newest available version.
    Latest,
}

/// Parse `[v]M[.m[.p]][-pre][+build]` into its numeric components.
fn parse_components(s: &str) -> Option<(u64, Option<u64>, Option<u64>)> {
    let s = s.strip_prefix('v').unwrap_or(s);
    let core = s.split(['-', '+']).next()?;
    let mut parts = core.split('.');
    let num = |p: Option<&str>| -> Option<Option<u64>> {
        match p {
            None => Some(None),
            Some(p) if !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()) => {
                p.parse().ok().map(Some)
            }
            Some(_) => None,
        }
    };
    let major = num(parts.next())??;
    let minor = num(parts.next())?;
    let patch = num(parts.next())?;
    if parts.next().is_some() || (minor.is_none() && patch.is_some()) {
        return None;
    }
    Some((major, minor, patch))
}

/// Parse a full `[v]M.m.p` version, ignoring pre-release and build metadata.
pub fn parse_semver(s: &str) -> Option<SemVer> {
    match parse_components(s)? {
        (major, Some(minor), Some(patch)) => Some(SemVer::new(major, minor, patch)),
        _ => None,
    }
}

/// Whether a version string carries `-pre` or `+build` after its numbers.
fn has_suffix(s: &str) -> bool {
    s.strip_prefix('v').unwrap_or(s).contains(['-', '+'])
}

/// Whether `s` looks like a (possibly abbreviated) commit SHA.
pub fn is_commit_sha(s: &str) -> bool {
    (SHORT_SHA_LEN..=40).contains(&s.len()) && s.chars().all(|c| c.is_ascii_hexdigit())
}

fn floor(s: &str) -> Option<SemVer> {
    parse_components(s).map(|(m, mi, p)| SemVer::new(m, mi.unwrap_or(0), p.unwrap_or(0)))
}

impl Constraint {
    /// Parse the semver-shaped and `latest` forms.
    ///
    /// Shorthand `M` and `M.m` expand to caret (`^M.0.0`, `^M.m.0`), not to
    /// an exact match.
    ///
    /// # Errors
    ///
    /// [`ConstraintError::Unrecognized`] for anything that could only be a
    /// branch/tag/commit reference; use [`Constraint::parse_with_refs`] when
    /// the registry's references are known.
    pub fn parse(s: &str) -> Result<Self, ConstraintError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConstraintError::Empty);
        }
        if s.eq_ignore_ascii_case("latest") {
            return Ok(Self::Latest);
        }
        if let Some(rest) = s.strip_prefix('^') {
            return floor(rest)
                .map(Self::Major)
                .ok_or_else(|| ConstraintError::InvalidSemver(s.to_string()));
        }
        if let Some(rest) = s.strip_prefix('~') {
            return floor(rest)
                .map(Self::Minor)
                .ok_or_else(|| ConstraintError::InvalidSemver(s.to_string()));
        }
        match parse_components(s) {
            Some((m, Some(mi), Some(p))) => Ok(Self::Exact(SemVer::new(m, mi, p))),
            Some((m, mi, _)) => Ok(Self::Major(SemVer::new(m, mi.unwrap_or(0), 0))),
            None => Err(ConstraintError::Unrecognized(s.to_string())),
        }
    }

    /// Parse with knowledge of the registry's branch and tag names.
    ///
    /// Strings that are not semver-shaped become [`Constraint::BranchHead`]
    /// when they name a known reference, or [`Constraint::Commit`] when they
    /// look like a commit hash. A version with a pre-release or build suffix
    /// that names a known tag (with or without the `v`) selects that tag by
    /// name instead of its release numbers.
    ///
    /// # Errors
    ///
    /// Returns the error from [`Constraint::parse`] when neither applies.
    pub fn parse_with_refs<'a>(
        s: &str,
        refs: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, ConstraintError> {
        let trimmed = s.trim();
        if has_suffix(trimmed) && !trimmed.starts_with(['^', '~']) {
            let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);
            let mut refs = refs.into_iter();
            return match refs.find(|r| r.strip_prefix('v').unwrap_or(r) == bare) {
                Some(tag) => Ok(Self::BranchHead(tag.to_string())),
                None => Self::parse(trimmed),
            };
        }
        match Self::parse(s) {
            Err(ConstraintError::Unrecognized(raw)) => {
                if refs.into_iter().any(|r| r == raw) {
                    Ok(Self::BranchHead(raw))
                } else if is_commit_sha(&raw) {
                    Ok(Self::Commit(raw.to_lowercase()))
                } else {
                    Err(ConstraintError::Unrecognized(raw))
                }
            }
            other => other,
        }
    }

    /// Whether `v` satisfies the constraint.
    pub fn matches(&self, v: &Version) -> bool {
        match self {
            Self::Exact(c) => v.semver().is_some_and(|s| s == *c),
            Self::Major(c) => v
                .semver()
                .is_some_and(|s| s.major == c.major && (s.minor, s.patch) >= (c.minor, c.patch)),
            Self::Minor(c) => v.semver().is_some_and(|s| {
                s.major == c.major && s.minor == c.minor && s.patch >= c.patch
            }),
            Self::BranchHead(name) => {
                v.kind != VersionKind::Commit && (v.id == *name || v.display == *name)
            }
            Self::Commit(sha) => v.kind == VersionKind::Commit && v.id.starts_with(sha.as_str()),
            Self::Latest => true,
        }
    }

    /// Whether a version recorded in the lockfile (its display form) still
    /// satisfies this constraint, without consulting the registry.
    ///
    /// Branch constraints always accept: the lock pins the head they
    /// resolved to.
    pub fn accepts_locked(&self, locked: &str) -> bool {
        match self {
            Self::Exact(_) | Self::Major(_) | Self::Minor(_) => self.matches(&Version::tag(locked)),
            Self::Commit(sha) => locked.starts_with(sha.as_str()) || sha.starts_with(locked),
            Self::BranchHead(_) | Self::Latest => true,
        }
    }

    /// Pick the best candidate.
    ///
    /// Ranged constraints (`Major`, `Minor`, `Latest`) select the highest
    /// semver match. `Exact` selects among tags with the same numbers,
    /// preferring the release. `BranchHead` and `Commit` select the unique
    /// match. `Latest` over a set with no semver tags falls back to the
    /// first branch head.
    ///
    /// # Errors
    ///
    /// [`ConstraintError::NoCandidates`] on an empty set and
    /// [`ConstraintError::NoMatch`] when nothing satisfies the constraint.
    pub fn find_best_match<'a>(
        &self,
        candidates: &'a [Version],
    ) -> Result<&'a Version, ConstraintError> {
        if candidates.is_empty() {
            return Err(ConstraintError::NoCandidates);
        }

        // Equal numbers rank the release above suffixed tags, then by name,
        // so the pick does not depend on listing order.
        let ranked = || {
            candidates
                .iter()
                .filter(|v| self.matches(v))
                .filter_map(|v| v.semver().map(|s| (s, v)))
                .max_by(|a, b| {
                    a.0.cmp(&b.0)
                        .then(a.1.is_release().cmp(&b.1.is_release()))
                        .then(a.1.id.cmp(&b.1.id))
                })
                .map(|(_, v)| v)
        };

        let best = match self {
            Self::Exact(_) => ranked(),
            Self::Major(_) | Self::Minor(_) | Self::Latest => ranked()
                .or_else(|| {
                    if *self == Self::Latest {
                        candidates
                            .iter()
                            .find(|v| v.kind == VersionKind::Branch)
                            .or_else(|| candidates.first())
                    } else {
                        None
                    }
                }),
            Self::BranchHead(_) => candidates
                .iter()
                .find(|v| v.kind == VersionKind::Branch && self.matches(v))
                .or_else(|| candidates.iter().find(|v| self.matches(v))),
            Self::Commit(_) => candidates.iter().find(|v| self.matches(v)),
        };

        best.ok_or_else(|| ConstraintError::NoMatch(self.to_string()))
    }
}

impl std::fmt::Display for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact(v) => write!(f, "{v}"),
            Self::Major(v) => write!(f, "^{v}"),
            Self::Minor(v) => write!(f, "~{v}"),
            Self::BranchHead(name) => f.write_str(name),
            Self::Commit(sha) => f.write_str(sha),
            Self::Latest => f.write_str("latest"),
        }
    }
}
