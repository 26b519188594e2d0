use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

use plangate_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Version of the infrastructure tool binary, e.g. `1.6.2` or `1.7.0-beta1`.
///
/// Missing numeric segments compare as zero, so `0.12` equals `0.12.0`.
/// A pre-release sorts before the release it precedes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ToolVersion {
    segments: [u64; 3],
    pre_release: Option<String>,
    original: String,
}

impl ToolVersion {
    /// Parses a version string, accepting an optional leading `v`.
    pub fn parse(value: &str) -> AppResult<Self> {
        let trimmed = value.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "tool version must not be empty".to_owned(),
            ));
        }

        let (core, pre_release) = match trimmed.split_once('-') {
            Some((core, pre)) if !pre.is_empty() => (core, Some(pre.to_owned())),
            Some(_) => {
                return Err(AppError::Validation(format!(
                    "tool version '{value}' has an empty pre-release"
                )));
            }
            None => (trimmed, None),
        };

        let parts = core.split('.').collect::<Vec<_>>();
        if parts.len() > 3 {
            return Err(AppError::Validation(format!(
                "tool version '{value}' has more than three numeric segments"
            )));
        }

        let mut segments = [0_u64; 3];
        for (index, part) in parts.iter().enumerate() {
            segments[index] = part.parse::<u64>().map_err(|_| {
                AppError::Validation(format!(
                    "tool version '{value}' contains non-numeric segment '{part}'"
                ))
            })?;
        }

        Ok(Self {
            segments,
            pre_release,
            original: trimmed.to_owned(),
        })
    }

    /// Returns `major.minor.patch` segments.
    #[must_use]
    pub fn segments(&self) -> [u64; 3] {
        self.segments
    }

    /// Returns the pre-release label when present.
    #[must_use]
    pub fn pre_release(&self) -> Option<&str> {
        self.pre_release.as_deref()
    }
}

impl PartialEq for ToolVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ToolVersion {}

impl Hash for ToolVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.segments.hash(state);
        self.pre_release.hash(state);
    }
}

impl PartialOrd for ToolVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ToolVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.segments
            .cmp(&other.segments)
            .then_with(|| match (&self.pre_release, &other.pre_release) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(left), Some(right)) => left.cmp(right),
            })
    }
}

impl Display for ToolVersion {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.original.as_str())
    }
}

impl TryFrom<String> for ToolVersion {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ToolVersion> for String {
    fn from(value: ToolVersion) -> Self {
        value.original
    }
}
