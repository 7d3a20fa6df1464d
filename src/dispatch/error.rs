//! Dispatch error types

use std::fmt;
use thiserror::Error;

/// Failure of one unit of dispatch work
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Nothing to dispatch to, or an unusable request
    #[error("{0}")]
    Configuration(String),

    #[error("no region found for image id '{id}'")]
    Resolution { id: String },

    #[error("listing images in region {region} failed: {source:#}")]
    Listing {
        region: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("region {region}: {source:#}")]
    Operation {
        region: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("describing image {id} in region {region} failed: {source:#}")]
    Describe {
        id: String,
        region: String,
        #[source]
        source: anyhow::Error,
    },

    /// A concurrent unit panicked or was cancelled before reporting
    #[error("unit {unit} did not complete: {reason}")]
    Aborted { unit: String, reason: String },
}

impl DispatchError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn operation(region: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Operation {
            region: region.into(),
            source,
        }
    }

    pub fn listing(region: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Listing {
            region: region.into(),
            source,
        }
    }

    /// Region the failure is attributed to, if any
    pub fn region(&self) -> Option<&str> {
        match self {
            Self::Listing { region, .. }
            | Self::Operation { region, .. }
            | Self::Describe { region, .. } => Some(region),
            _ => None,
        }
    }

    /// Underlying backend error, if the failure came from a region client
    pub fn backend_error(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Listing { source, .. }
            | Self::Operation { source, .. }
            | Self::Describe { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::Resolution { .. })
    }
}

/// All failures observed during one dispatch.
///
/// Never empty: the only constructors either take one error or return
/// `None` for an empty list, so "no aggregate" is the sole success signal.
#[derive(Debug)]
pub struct AggregatedError {
    errors: Vec<DispatchError>,
}

/// Result of a dispatch: `Ok` only when every unit succeeded
pub type DispatchResult<T = ()> = Result<T, AggregatedError>;

impl AggregatedError {
    pub fn from_errors(errors: Vec<DispatchError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self { errors })
        }
    }

    pub fn single(error: DispatchError) -> Self {
        Self {
            errors: vec![error],
        }
    }

    /// Combine two optional aggregates, keeping the order of `first` then `second`
    pub fn merge(first: Option<Self>, second: Option<Self>) -> Option<Self> {
        match (first, second) {
            (Some(mut a), Some(b)) => {
                a.errors.extend(b.errors);
                Some(a)
            }
            (a, None) => a,
            (None, b) => b,
        }
    }

    /// Add the errors of `other`, if any, after the existing ones
    pub fn append(mut self, other: Option<Self>) -> Self {
        if let Some(other) = other {
            self.errors.extend(other.errors);
        }
        self
    }

    pub fn errors(&self) -> &[DispatchError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<DispatchError> {
        self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Always false; present for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DispatchError> {
        self.errors.iter()
    }

    /// Regions that contributed at least one failure
    pub fn failed_regions(&self) -> Vec<&str> {
        let mut regions: Vec<&str> = self.errors.iter().filter_map(|e| e.region()).collect();
        regions.sort_unstable();
        regions.dedup();
        regions
    }
}

impl fmt::Display for AggregatedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.len() == 1 {
            write!(f, "1 error occurred:")?;
        } else {
            write!(f, "{} errors occurred:", self.errors.len())?;
        }
        for error in &self.errors {
            write!(f, "\n\t* {}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregatedError {}

impl From<DispatchError> for AggregatedError {
    fn from(error: DispatchError) -> Self {
        Self::single(error)
    }
}

impl<'a> IntoIterator for &'a AggregatedError {
    type Item = &'a DispatchError;
    type IntoIter = std::slice::Iter<'a, DispatchError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_list_is_success() {
        assert!(AggregatedError::from_errors(Vec::new()).is_none());
    }

    #[test]
    fn test_display_enumerates_every_error() {
        let aggregate = AggregatedError::from_errors(vec![
            DispatchError::Resolution {
                id: "ami-3".to_string(),
            },
            DispatchError::operation("eu-west-1", anyhow::anyhow!("boom")),
        ])
        .unwrap();

        let text = aggregate.to_string();
        assert!(text.starts_with("2 errors occurred:"));
        assert!(text.contains("\t* no region found for image id 'ami-3'"));
        assert!(text.contains("\t* region eu-west-1: boom"));
    }

    #[test]
    fn test_display_has_no_trailing_newline() {
        let aggregate: AggregatedError = DispatchError::Resolution {
            id: "ami-3".to_string(),
        }
        .into();

        assert_eq!(
            aggregate.to_string(),
            "1 error occurred:\n\t* no region found for image id 'ami-3'"
        );
    }

    #[test]
    fn test_merge_keeps_order() {
        let a = AggregatedError::from_errors(vec![DispatchError::configuration("a")]);
        let b = AggregatedError::from_errors(vec![DispatchError::configuration("b")]);

        let merged = AggregatedError::merge(a, b).unwrap();
        let messages: Vec<String> = merged.iter().map(|e| e.to_string()).collect();
        assert_eq!(messages, vec!["a", "b"]);

        assert!(AggregatedError::merge(None, None).is_none());
    }

    #[test]
    fn test_failed_regions_are_deduplicated() {
        let aggregate = AggregatedError::from_errors(vec![
            DispatchError::operation("us-east-1", anyhow::anyhow!("x")),
            DispatchError::listing("us-east-1", anyhow::anyhow!("y")),
            DispatchError::operation("eu-west-1", anyhow::anyhow!("z")),
        ])
        .unwrap();

        assert_eq!(aggregate.failed_regions(), vec!["eu-west-1", "us-east-1"]);
    }

    #[test]
    fn test_backend_error_only_for_region_failures() {
        let op = DispatchError::operation("us-east-1", anyhow::anyhow!("API request failed: 403"));
        assert!(op.backend_error().unwrap().to_string().contains("403"));

        let resolution = DispatchError::Resolution {
            id: "ami-1".to_string(),
        };
        assert!(resolution.backend_error().is_none());
        assert!(resolution.region().is_none());
    }
}
