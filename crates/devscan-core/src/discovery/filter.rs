//! Announcement filters.
//!
//! A filter chain is a straight pipeline of predicates. An event passes when
//! every predicate matches. Predicates that cannot evaluate (missing data)
//! count as "no match" and are logged, never propagated.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::warn;

use crate::error::FilterError;
use crate::types::Announcement;

/// Predicate over an announcement.
pub trait AnnouncementFilter: Send + Sync {
    /// Short name used in log output.
    fn name(&self) -> &str;

    fn matches(&self, announcement: &Announcement) -> Result<bool, FilterError>;
}

/// Matches devices whose family type is one of a set.
#[derive(Debug, Clone)]
pub struct FamilyTypeFilter {
    families: HashSet<String>,
}

impl FamilyTypeFilter {
    pub fn new<I, S>(families: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            families: families.into_iter().map(Into::into).collect(),
        }
    }
}

impl AnnouncementFilter for FamilyTypeFilter {
    fn name(&self) -> &str {
        "family-type"
    }

    fn matches(&self, announcement: &Announcement) -> Result<bool, FilterError> {
        let family = announcement
            .device
            .family_type
            .as_deref()
            .ok_or(FilterError::MissingData {
                field: "device family type",
            })?;
        Ok(self.families.contains(family))
    }
}

/// Matches devices whose uuid is one of a set.
#[derive(Debug, Clone)]
pub struct UuidFilter {
    uuids: HashSet<String>,
}

impl UuidFilter {
    pub fn new<I, S>(uuids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            uuids: uuids.into_iter().map(Into::into).collect(),
        }
    }
}

impl AnnouncementFilter for UuidFilter {
    fn name(&self) -> &str {
        "uuid"
    }

    fn matches(&self, announcement: &Announcement) -> Result<bool, FilterError> {
        if announcement.device.uuid.is_empty() {
            return Err(FilterError::MissingData {
                field: "device uuid",
            });
        }
        Ok(self.uuids.contains(&announcement.device.uuid))
    }
}

/// Ordered pipeline of filters. An empty chain accepts everything.
#[derive(Clone, Default)]
pub struct FilterChain {
    filters: Vec<Arc<dyn AnnouncementFilter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<F: AnnouncementFilter + 'static>(mut self, filter: F) -> Self {
        self.push(filter);
        self
    }

    pub fn push<F: AnnouncementFilter + 'static>(&mut self, filter: F) {
        self.filters.push(Arc::new(filter));
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn accepts(&self, announcement: &Announcement) -> bool {
        for filter in &self.filters {
            match filter.matches(announcement) {
                Ok(true) => continue,
                Ok(false) => return false,
                Err(e) => {
                    warn!(
                        filter = filter.name(),
                        device = %announcement.device.uuid,
                        error = %e,
                        "Filter could not evaluate announcement"
                    );
                    return false;
                }
            }
        }
        true
    }
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.filters.iter().map(|filter| filter.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures;

    #[test]
    fn test_family_filter() {
        let announcement = fixtures::announcement("a");
        assert!(FamilyTypeFilter::new(["QuantumX"])
            .matches(&announcement)
            .unwrap());
        assert!(!FamilyTypeFilter::new(["PMX"]).matches(&announcement).unwrap());
    }

    #[test]
    fn test_family_filter_missing_data() {
        let mut announcement = fixtures::announcement("a");
        announcement.device.family_type = None;

        let result = FamilyTypeFilter::new(["QuantumX"]).matches(&announcement);
        assert_eq!(
            result,
            Err(FilterError::MissingData {
                field: "device family type"
            })
        );

        let chain = FilterChain::new().with(FamilyTypeFilter::new(["QuantumX"]));
        assert!(!chain.accepts(&announcement));
    }

    #[test]
    fn test_chain_requires_all() {
        let announcement = fixtures::announcement("0009E5001234");

        let chain = FilterChain::new()
            .with(FamilyTypeFilter::new(["QuantumX"]))
            .with(UuidFilter::new(["0009E5001234"]));
        assert!(chain.accepts(&announcement));

        let reordered = FilterChain::new()
            .with(UuidFilter::new(["other"]))
            .with(FamilyTypeFilter::new(["QuantumX"]));
        assert!(!reordered.accepts(&announcement));
    }

    #[test]
    fn test_empty_chain_accepts() {
        assert!(FilterChain::new().accepts(&fixtures::announcement("a")));
    }
}
