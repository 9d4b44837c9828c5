//! Values paired with the schema versions they are valid for.
//!
//! A [`VersionConstrained`] holds one or more entries whose `[since, until)`
//! windows never overlap. At most one entry is open-ended. Entries are kept
//! ordered by `since`, which for non-overlapping windows is the same order as
//! `until ?? since`.

use std::collections::BTreeSet;

use crate::error::VersionError;
use crate::version::{SchemaVersion, VersionConstraint};

/// One value and the window it is valid for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionConstrainedEntry<T> {
    pub data: T,
    pub since: SchemaVersion,
    pub until: Option<SchemaVersion>,
}

impl<T> VersionConstrainedEntry<T> {
    pub fn constraint(&self) -> VersionConstraint {
        VersionConstraint::from_ordered(self.since, self.until)
    }

    pub fn contains(&self, version: SchemaVersion) -> bool {
        version >= self.since && self.until.map_or(true, |until| version < until)
    }
}

/// Accumulates entries for a [`VersionConstrained`].
#[derive(Debug, Clone)]
pub struct VersionConstrainedBuilder<T> {
    entries: Vec<VersionConstrainedEntry<T>>,
}

impl<T> Default for VersionConstrainedBuilder<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> VersionConstrainedBuilder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `data` for `[since, until)`.
    ///
    /// If the currently open entry started before `since`, it is closed at
    /// `since` and the new entry takes over from there.
    ///
    /// # Errors
    ///
    /// Returns `VersionError::MalformedRange` if `since >= until`, or
    /// `VersionError::Overlapping` if the window collides with an existing
    /// entry.
    pub fn add(
        &mut self,
        data: T,
        since: SchemaVersion,
        until: Option<SchemaVersion>,
    ) -> Result<&mut Self, VersionError> {
        let constraint = VersionConstraint::new(since, until)?;

        let open_tail = self
            .entries
            .iter()
            .position(|e| e.until.is_none())
            .filter(|&i| self.entries[i].since < since);

        for (i, entry) in self.entries.iter().enumerate() {
            let existing_until = if Some(i) == open_tail {
                Some(since)
            } else {
                entry.until
            };
            let existing = VersionConstraint::new(entry.since, existing_until)?;
            if existing.overlaps(&constraint) {
                return Err(VersionError::Overlapping {
                    constraint,
                    existing,
                });
            }
        }

        if let Some(i) = open_tail {
            self.entries[i].until = Some(since);
        }

        let position = self.entries.partition_point(|e| e.since < since);
        self.entries.insert(position, VersionConstrainedEntry { data, since, until });
        Ok(self)
    }

    /// Finish the container.
    ///
    /// # Errors
    ///
    /// Returns `VersionError::Empty` if no entry was added.
    pub fn build(self) -> Result<VersionConstrained<T>, VersionError> {
        if self.entries.is_empty() {
            return Err(VersionError::Empty);
        }
        Ok(VersionConstrained {
            entries: self.entries,
        })
    }
}

/// A non-empty, non-overlapping run of version-constrained values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionConstrained<T> {
    entries: Vec<VersionConstrainedEntry<T>>,
}

impl<T> VersionConstrained<T> {
    /// A container with a single value valid for every version.
    pub fn consistent(data: T) -> Self {
        Self::single(data, VersionConstraint::unbounded())
    }

    /// A container with a single value valid for `constraint`.
    pub fn single(data: T, constraint: VersionConstraint) -> Self {
        Self {
            entries: vec![VersionConstrainedEntry {
                data,
                since: constraint.since(),
                until: constraint.until(),
            }],
        }
    }

    /// The entry valid at `version`, if any.
    pub fn get(&self, version: SchemaVersion) -> Option<&VersionConstrainedEntry<T>> {
        self.entries.iter().find(|e| e.contains(version))
    }

    /// The value valid at `version`, if any.
    pub fn at(&self, version: SchemaVersion) -> Option<&T> {
        self.get(version).map(|e| &e.data)
    }

    pub fn entries(&self) -> &[VersionConstrainedEntry<T>] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &VersionConstrainedEntry<T>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn first(&self) -> &VersionConstrainedEntry<T> {
        &self.entries[0]
    }

    pub fn last(&self) -> &VersionConstrainedEntry<T> {
        &self.entries[self.entries.len() - 1]
    }

    /// True if one value spans every schema version.
    pub fn is_consistent(&self) -> bool {
        self.entries.len() == 1 && self.entries[0].constraint().is_unbounded()
    }

    /// The outer window from the first `since` to the last `until`.
    pub fn constraint(&self) -> VersionConstraint {
        VersionConstraint::from_ordered(self.first().since, self.last().until)
    }

    /// Supported versions at which some entry starts or ends.
    ///
    /// The end of a closed tail or the start of a gap is left out, since no
    /// entry is valid there.
    pub fn significant_versions(&self) -> BTreeSet<SchemaVersion> {
        self.entries
            .iter()
            .flat_map(|e| std::iter::once(e.since).chain(e.until))
            .filter(|v| self.get(*v).is_some())
            .collect()
    }

    /// Every version with a valid entry, oldest first.
    pub fn versions(&self) -> impl Iterator<Item = SchemaVersion> + '_ {
        SchemaVersion::ALL
            .iter()
            .copied()
            .filter(move |v| self.get(*v).is_some())
    }

    /// Move the outer bounds to `[since, until)`.
    ///
    /// Only the first entry's `since` and the last entry's `until` change.
    ///
    /// # Errors
    ///
    /// Returns `VersionError::MalformedRange` if the new bounds would invert
    /// the first or last entry.
    pub fn readjust_constraints(
        mut self,
        since: SchemaVersion,
        until: Option<SchemaVersion>,
    ) -> Result<Self, VersionError> {
        if self.first().since == since && self.last().until == until {
            return Ok(self);
        }

        let last = self.entries.len() - 1;
        let first_until = if last == 0 { until } else { self.entries[0].until };
        VersionConstraint::new(since, first_until)?;
        let last_since = if last == 0 { since } else { self.entries[last].since };
        VersionConstraint::new(last_since, until)?;

        self.entries[0].since = since;
        self.entries[last].until = until;
        Ok(self)
    }

    /// Keep the entries overlapping `window` and clamp the outer bounds to it.
    ///
    /// # Errors
    ///
    /// Returns `VersionError::Empty` if no entry overlaps the window.
    pub fn restrict(mut self, window: VersionConstraint) -> Result<Self, VersionError> {
        self.entries.retain(|e| e.constraint().overlaps(&window));
        if self.entries.is_empty() {
            return Err(VersionError::Empty);
        }
        self.readjust_constraints(window.since(), window.until())
    }

    /// Transform every value, keeping the windows unchanged.
    pub fn map_data<U>(&self, mut f: impl FnMut(&T) -> U) -> VersionConstrained<U> {
        self.map_versioned(|data, _| f(data))
    }

    /// Transform every value together with its window.
    pub fn map_versioned<U>(
        &self,
        mut f: impl FnMut(&T, VersionConstraint) -> U,
    ) -> VersionConstrained<U> {
        VersionConstrained {
            entries: self
                .entries
                .iter()
                .map(|e| VersionConstrainedEntry {
                    data: f(&e.data, e.constraint()),
                    since: e.since,
                    until: e.until,
                })
                .collect(),
        }
    }

    /// Fallible [`map_versioned`](Self::map_versioned).
    pub fn try_map_versioned<U, E>(
        &self,
        mut f: impl FnMut(&T, VersionConstraint) -> Result<U, E>,
    ) -> Result<VersionConstrained<U>, E> {
        let entries = self
            .entries
            .iter()
            .map(|e| {
                Ok(VersionConstrainedEntry {
                    data: f(&e.data, e.constraint())?,
                    since: e.since,
                    until: e.until,
                })
            })
            .collect::<Result<Vec<_>, E>>()?;
        Ok(VersionConstrained { entries })
    }

    /// The single value every entry maps to.
    ///
    /// # Errors
    ///
    /// Returns `VersionError::Inconsistent` if two entries map to different
    /// values.
    pub fn flatten<U: PartialEq>(&self, mut f: impl FnMut(&T) -> U) -> Result<U, VersionError> {
        let first = self.first();
        let value = f(&first.data);
        for entry in &self.entries[1..] {
            if f(&entry.data) != value {
                return Err(VersionError::Inconsistent {
                    first: first.constraint(),
                    second: entry.constraint(),
                });
            }
        }
        Ok(value)
    }

    pub fn into_entries(self) -> Vec<VersionConstrainedEntry<T>> {
        self.entries
    }

    /// The earliest entry, by value.
    pub fn into_first(mut self) -> VersionConstrainedEntry<T> {
        self.entries.swap_remove(0)
    }
}
