//! Region catalog and registry
//!
//! Turns a region inclusion spec (a comma-separated list, or `all`) and an
//! exclusion spec into the set of region clients a dispatcher works with.

use super::RegionClient;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Token expanding to the whole region catalog
pub const ALL_REGIONS_TOKEN: &str = "all";

/// Regions known to exist when no catalog is configured
pub const DEFAULT_CATALOG: &[&str] = &[
    "ap-northeast-1",
    "ap-southeast-1",
    "ap-southeast-2",
    "cn-north-1",
    "eu-central-1",
    "eu-west-1",
    "sa-east-1",
    "us-east-1",
    "us-gov-west-1",
    "us-west-1",
    "us-west-2",
];

/// The default catalog as owned strings
pub fn default_catalog() -> Vec<String> {
    DEFAULT_CATALOG.iter().map(|r| r.to_string()).collect()
}

/// Split comma-separated entries, trimming whitespace and dropping empties
pub fn split_list<S: AsRef<str>>(entries: &[S]) -> Vec<String> {
    entries
        .iter()
        .flat_map(|entry| entry.as_ref().split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolve inclusion and exclusion specs into a deduplicated region list.
///
/// Any `all` entry expands to `catalog`. Exclusions are applied after the
/// expansion. Order follows first appearance. The result may be empty.
pub fn resolve_regions<S: AsRef<str>, E: AsRef<str>>(
    include: &[S],
    exclude: &[E],
    catalog: &[String],
) -> Vec<String> {
    let excluded = split_list(exclude);

    let mut regions: Vec<String> = Vec::new();
    for entry in split_list(include) {
        let expanded = if entry == ALL_REGIONS_TOKEN {
            catalog.to_vec()
        } else {
            vec![entry]
        };

        for region in expanded {
            if !excluded.contains(&region) && !regions.contains(&region) {
                regions.push(region);
            }
        }
    }

    regions
}

/// Region name to client map, fixed for the lifetime of a dispatcher
pub struct RegionRegistry<C> {
    regions: BTreeMap<String, Arc<C>>,
}

impl<C: RegionClient> RegionRegistry<C> {
    /// Build a registry by calling `factory` once per region.
    /// Construction failures are returned, never fatal.
    pub fn new<I, F>(regions: I, mut factory: F) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
        F: FnMut(&str) -> Result<C>,
    {
        let mut map = BTreeMap::new();
        for region in regions {
            if map.contains_key(&region) {
                continue;
            }
            let client = factory(&region)
                .with_context(|| format!("Failed to create client for region {}", region))?;
            map.insert(region, Arc::new(client));
        }

        tracing::debug!("Region registry: {:?}", map.keys().collect::<Vec<_>>());
        Ok(Self { regions: map })
    }

    /// Resolve specs with [`resolve_regions`] and build a registry from them
    pub fn from_spec<S, E, F>(include: &[S], exclude: &[E], catalog: &[String], factory: F) -> Result<Self>
    where
        S: AsRef<str>,
        E: AsRef<str>,
        F: FnMut(&str) -> Result<C>,
    {
        Self::new(resolve_regions(include, exclude, catalog), factory)
    }

    /// Build a registry from already constructed clients
    pub fn from_clients<I>(clients: I) -> Self
    where
        I: IntoIterator<Item = C>,
    {
        let regions = clients
            .into_iter()
            .map(|client| (client.region().to_string(), Arc::new(client)))
            .collect();
        Self { regions }
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn get(&self, region: &str) -> Option<Arc<C>> {
        self.regions.get(region).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.regions.keys().map(|s| s.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<C>)> {
        self.regions.iter().map(|(name, client)| (name.as_str(), client))
    }

    /// The only region, when exactly one is registered
    pub fn single(&self) -> Option<(&str, &Arc<C>)> {
        if self.regions.len() == 1 {
            self.iter().next()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<String> {
        default_catalog()
    }

    #[test]
    fn test_literal_list() {
        let regions = resolve_regions(&["us-east-1,eu-west-1"], &[""], &catalog());
        assert_eq!(regions, vec!["us-east-1", "eu-west-1"]);
    }

    #[test]
    fn test_all_expands_to_catalog() {
        let regions = resolve_regions(&["all"], &[] as &[&str], &catalog());
        assert_eq!(regions.len(), DEFAULT_CATALOG.len());
    }

    #[test]
    fn test_exclusion_applies_after_expansion() {
        let regions = resolve_regions(&["all"], &["cn-north-1,us-gov-west-1"], &catalog());
        assert_eq!(regions.len(), DEFAULT_CATALOG.len() - 2);
        assert!(!regions.contains(&"cn-north-1".to_string()));
        assert!(!regions.contains(&"us-gov-west-1".to_string()));
    }

    #[test]
    fn test_duplicates_and_empties_collapse() {
        let regions = resolve_regions(&["us-east-1,, us-east-1 ,eu-west-1,"], &[","], &catalog());
        assert_eq!(regions, vec!["us-east-1", "eu-west-1"]);
    }

    #[test]
    fn test_everything_excluded_is_empty() {
        let regions = resolve_regions(&["us-east-1"], &["us-east-1"], &catalog());
        assert!(regions.is_empty());
    }
}
