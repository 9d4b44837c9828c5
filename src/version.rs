//! Schema versions and validity windows.
//!
//! The remote API versions its response shapes with a `schema` query
//! parameter whose values are UTC timestamps. Requests without that parameter
//! receive the "classic" shapes, which order before every dated version.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::VersionError;

/// A schema version of the remote API, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SchemaVersion {
    Classic,
    V2019_02_21,
    V2019_03_22,
    V2019_05_16,
    V2019_05_21,
    V2019_05_22,
    V2019_12_19,
    V2020_11_17,
    V2021_04_06,
    V2021_07_15,
    V2022_03_09,
    V2022_03_23,
}

impl SchemaVersion {
    /// Every schema version, oldest first.
    pub const ALL: &'static [SchemaVersion] = &[
        SchemaVersion::Classic,
        SchemaVersion::V2019_02_21,
        SchemaVersion::V2019_03_22,
        SchemaVersion::V2019_05_16,
        SchemaVersion::V2019_05_21,
        SchemaVersion::V2019_05_22,
        SchemaVersion::V2019_12_19,
        SchemaVersion::V2020_11_17,
        SchemaVersion::V2021_04_06,
        SchemaVersion::V2021_07_15,
        SchemaVersion::V2022_03_09,
        SchemaVersion::V2022_03_23,
    ];

    /// The wire identifier sent as the `schema` query parameter.
    ///
    /// Returns `None` for [`SchemaVersion::Classic`], which must be omitted
    /// from requests.
    pub fn identifier(self) -> Option<&'static str> {
        match self {
            SchemaVersion::Classic => None,
            SchemaVersion::V2019_02_21 => Some("2019-02-21T00:00:00Z"),
            SchemaVersion::V2019_03_22 => Some("2019-03-22T00:00:00Z"),
            SchemaVersion::V2019_05_16 => Some("2019-05-16T00:00:00Z"),
            SchemaVersion::V2019_05_21 => Some("2019-05-21T23:00:00.000Z"),
            SchemaVersion::V2019_05_22 => Some("2019-05-22T00:00:00.000Z"),
            SchemaVersion::V2019_12_19 => Some("2019-12-19T00:00:00.000Z"),
            SchemaVersion::V2020_11_17 => Some("2020-11-17T00:30:00.000Z"),
            SchemaVersion::V2021_04_06 => Some("2021-04-06T21:00:00.000Z"),
            SchemaVersion::V2021_07_15 => Some("2021-07-15T13:00:00.000Z"),
            SchemaVersion::V2022_03_09 => Some("2022-03-09T02:00:00.000Z"),
            SchemaVersion::V2022_03_23 => Some("2022-03-23T19:00:00.000Z"),
        }
    }

    /// The most recent schema version.
    pub fn latest() -> Self {
        SchemaVersion::V2022_03_23
    }

    /// The version following this one, if any.
    pub fn next(self) -> Option<Self> {
        let index = SchemaVersion::ALL.iter().position(|v| *v == self)?;
        SchemaVersion::ALL.get(index + 1).copied()
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier().unwrap_or("classic"))
    }
}

impl FromStr for SchemaVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("classic") {
            return Ok(SchemaVersion::Classic);
        }

        SchemaVersion::ALL
            .iter()
            .copied()
            .find(|v| v.identifier() == Some(s))
            .ok_or_else(|| VersionError::UnknownVersion {
                value: s.to_string(),
            })
    }
}

impl Serialize for SchemaVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SchemaVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A half-open validity window `[since, until)`.
///
/// `until == None` means the window is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct VersionConstraint {
    since: SchemaVersion,
    #[serde(skip_serializing_if = "Option::is_none")]
    until: Option<SchemaVersion>,
}

impl VersionConstraint {
    /// Create a window, rejecting `since >= until`.
    pub fn new(since: SchemaVersion, until: Option<SchemaVersion>) -> Result<Self, VersionError> {
        match until {
            Some(until) if since >= until => Err(VersionError::MalformedRange { since, until }),
            _ => Ok(Self { since, until }),
        }
    }

    /// A window from bounds already known to satisfy `since < until`.
    pub(crate) fn from_ordered(since: SchemaVersion, until: Option<SchemaVersion>) -> Self {
        debug_assert!(until.map_or(true, |until| since < until));
        Self { since, until }
    }

    /// The window covering every schema version.
    pub fn unbounded() -> Self {
        Self {
            since: SchemaVersion::Classic,
            until: None,
        }
    }

    pub fn since(&self) -> SchemaVersion {
        self.since
    }

    pub fn until(&self) -> Option<SchemaVersion> {
        self.until
    }

    pub fn is_unbounded(&self) -> bool {
        self.since == SchemaVersion::Classic && self.until.is_none()
    }

    pub fn contains(&self, version: SchemaVersion) -> bool {
        version >= self.since && self.until.map_or(true, |until| version < until)
    }

    pub fn overlaps(&self, other: &VersionConstraint) -> bool {
        let starts_before_other_ends = other.until.map_or(true, |until| self.since < until);
        let other_starts_before_end = self.until.map_or(true, |until| other.since < until);
        starts_before_other_ends && other_starts_before_end
    }

    /// The overlap of two windows, if they share any version.
    pub fn intersect(&self, other: &VersionConstraint) -> Option<VersionConstraint> {
        let since = self.since.max(other.since);
        let until = match (self.until, other.until) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        VersionConstraint::new(since, until).ok()
    }

    /// Every schema version inside the window, oldest first.
    pub fn versions(&self) -> impl Iterator<Item = SchemaVersion> + '_ {
        SchemaVersion::ALL
            .iter()
            .copied()
            .filter(move |v| self.contains(*v))
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.until {
            Some(until) => write!(f, "[{}, {})", self.since, until),
            None => write!(f, "[{}, ..)", self.since),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_are_ordered_chronologically() {
        for pair in SchemaVersion::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        assert_eq!(SchemaVersion::ALL.last().copied(), Some(SchemaVersion::latest()));
    }

    #[test]
    fn classic_has_no_identifier() {
        assert_eq!(SchemaVersion::Classic.identifier(), None);
        assert_eq!(SchemaVersion::Classic.to_string(), "classic");
        assert!(SchemaVersion::ALL[1..].iter().all(|v| v.identifier().is_some()));
    }

    #[test]
    fn parse_round_trips_identifiers() {
        for version in SchemaVersion::ALL {
            assert_eq!(version.to_string().parse::<SchemaVersion>(), Ok(*version));
        }
        assert_eq!("CLASSIC".parse::<SchemaVersion>(), Ok(SchemaVersion::Classic));
    }

    #[test]
    fn parse_unknown_version_errors() {
        assert_eq!(
            "2030-01-01T00:00:00Z".parse::<SchemaVersion>(),
            Err(VersionError::UnknownVersion {
                value: "2030-01-01T00:00:00Z".into()
            })
        );
    }

    #[test]
    fn next_walks_forward() {
        assert_eq!(SchemaVersion::Classic.next(), Some(SchemaVersion::V2019_02_21));
        assert_eq!(SchemaVersion::latest().next(), None);
    }

    #[test]
    fn constraint_rejects_inverted_range() {
        let err = VersionConstraint::new(SchemaVersion::V2019_05_16, Some(SchemaVersion::V2019_05_16));
        assert!(matches!(err, Err(VersionError::MalformedRange { .. })));
    }

    #[test]
    fn constraint_contains_is_half_open() {
        let window =
            VersionConstraint::new(SchemaVersion::V2019_02_21, Some(SchemaVersion::V2019_05_16))
                .unwrap();
        assert!(!window.contains(SchemaVersion::Classic));
        assert!(window.contains(SchemaVersion::V2019_02_21));
        assert!(window.contains(SchemaVersion::V2019_03_22));
        assert!(!window.contains(SchemaVersion::V2019_05_16));
    }

    #[test]
    fn constraint_overlap_and_intersection() {
        let a = VersionConstraint::new(SchemaVersion::Classic, Some(SchemaVersion::V2019_05_16))
            .unwrap();
        let b = VersionConstraint::new(SchemaVersion::V2019_05_16, None).unwrap();
        let c = VersionConstraint::new(SchemaVersion::V2019_03_22, None).unwrap();

        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert_eq!(a.intersect(&b), None);
        assert_eq!(
            a.intersect(&c),
            Some(
                VersionConstraint::new(SchemaVersion::V2019_03_22, Some(SchemaVersion::V2019_05_16))
                    .unwrap()
            )
        );
    }

    #[test]
    fn constraint_display() {
        let window = VersionConstraint::new(SchemaVersion::Classic, None).unwrap();
        assert_eq!(window.to_string(), "[classic, ..)");
    }
}
