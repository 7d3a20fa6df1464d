//! ID-to-region resolution

use super::directory::ResourceDirectory;
use super::error::{AggregatedError, DispatchError};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Region name to the requested ids it owns
pub type RegionMatches = BTreeMap<String, Vec<String>>;

/// Map each requested id to its owning region.
///
/// Request order is kept within a region and repeated ids are collapsed.
/// Every id missing from all listings yields one resolution error; if any
/// id is missing nothing is returned, so no caller can act on a partial
/// match.
pub fn resolve(directory: &ResourceDirectory, ids: &[String]) -> Result<RegionMatches, AggregatedError> {
    let owners: HashMap<&str, &str> = directory
        .iter()
        .flat_map(|(region, images)| images.iter().map(move |image| (image.id.as_str(), region)))
        .collect();

    let mut seen = HashSet::new();
    let mut matches = RegionMatches::new();
    let mut missing = Vec::new();

    for id in ids {
        if !seen.insert(id.as_str()) {
            continue;
        }
        match owners.get(id.as_str()) {
            Some(region) => matches
                .entry(region.to_string())
                .or_default()
                .push(id.clone()),
            None => missing.push(DispatchError::Resolution { id: id.clone() }),
        }
    }

    match AggregatedError::from_errors(missing) {
        Some(errors) => Err(errors),
        None => Ok(matches),
    }
}
