// ABOUTME: Ordered set of releases present on a host.
// ABOUTME: Derives current/previous releases and the retention window.

use super::ReleaseName;

/// Release names sorted oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseSet {
    names: Vec<ReleaseName>,
}

impl ReleaseSet {
    pub fn new(mut names: Vec<ReleaseName>) -> Self {
        names.sort();
        names.dedup();
        Self { names }
    }

    /// Build from a one-entry-per-line directory listing. Entries that are
    /// not valid release names are skipped.
    pub fn from_listing(listing: &str) -> Self {
        let names = listing
            .lines()
            .filter(|line| !line.is_empty())
            .filter_map(|entry| match ReleaseName::new(entry) {
                Ok(name) => Some(name),
                Err(e) => {
                    tracing::debug!("ignoring entry {:?} in releases: {}", entry, e);
                    None
                }
            })
            .collect();
        Self::new(names)
    }

    /// Newest release.
    pub fn current(&self) -> Option<&ReleaseName> {
        self.names.last()
    }

    /// Second newest release.
    pub fn previous(&self) -> Option<&ReleaseName> {
        self.names.len().checked_sub(2).map(|i| &self.names[i])
    }

    /// Newest release strictly older than `name`.
    pub fn preceding(&self, name: &ReleaseName) -> Option<&ReleaseName> {
        self.names.iter().rev().find(|n| *n < name)
    }

    pub fn contains(&self, name: &ReleaseName) -> bool {
        self.names.binary_search(name).is_ok()
    }

    /// Releases outside a window of the `keep` newest, never including
    /// `protect` (the release `current` points to).
    pub fn expired(&self, keep: usize, protect: Option<&ReleaseName>) -> Vec<ReleaseName> {
        let cutoff = self.names.len().saturating_sub(keep);
        self.names[..cutoff]
            .iter()
            .filter(|n| Some(*n) != protect)
            .cloned()
            .collect()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &ReleaseName> {
        self.names.iter()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
