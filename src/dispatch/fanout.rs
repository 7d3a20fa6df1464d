//! Fan-out executor
//!
//! Spawns one task per unit of work, records every outcome under a single
//! mutex and joins all tasks before anything is read back. Every concurrent
//! step of the dispatcher (listing regions, per-region operations, copies)
//! goes through [`fan_out`].

use super::error::{AggregatedError, DispatchError};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Everything collected from one fan-out
#[derive(Debug)]
pub struct FanOutOutcome<T> {
    /// Successful unit results keyed by unit name
    pub results: BTreeMap<String, T>,
    /// `None` when every unit succeeded
    pub errors: Option<AggregatedError>,
}

impl<T> FanOutOutcome<T> {
    /// Drop the per-unit results, keeping only the error aggregate
    pub fn into_result(self) -> Result<(), AggregatedError> {
        match self.errors {
            Some(errors) => Err(errors),
            None => Ok(()),
        }
    }
}

/// State shared by the units of one fan-out
struct Collected<T> {
    results: BTreeMap<String, T>,
    errors: Vec<DispatchError>,
}

impl<T> Default for Collected<T> {
    fn default() -> Self {
        Self {
            results: BTreeMap::new(),
            errors: Vec::new(),
        }
    }
}

/// Lock shared state. A panicking unit never holds the lock while running
/// user code, so a poisoned mutex still contains consistent data.
fn lock<T>(shared: &Mutex<Collected<T>>) -> MutexGuard<'_, Collected<T>> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run every unit concurrently and collect results and errors.
///
/// Units are `(name, future)` pairs; names must be unique, a later unit with
/// the same name overwrites an earlier result. Error order follows
/// completion order and is not deterministic.
pub async fn fan_out<I, Fut, T>(units: I) -> FanOutOutcome<T>
where
    I: IntoIterator<Item = (String, Fut)>,
    Fut: Future<Output = Result<T, DispatchError>> + Send + 'static,
    T: Send + 'static,
{
    let shared = Arc::new(Mutex::new(Collected::<T>::default()));

    let handles: Vec<_> = units
        .into_iter()
        .map(|(name, unit)| {
            let shared = Arc::clone(&shared);
            let unit_name = name.clone();
            let handle = tokio::spawn(async move {
                let outcome = unit.await;
                let mut collected = lock(&shared);
                match outcome {
                    Ok(value) => {
                        collected.results.insert(unit_name, value);
                    }
                    Err(error) => {
                        tracing::warn!("{}: {}", unit_name, error);
                        collected.errors.push(error);
                    }
                }
            });
            (name, handle)
        })
        .collect();

    let spawned = handles.len();

    // Barrier: nothing below reads shared state before every unit is done
    let joined = join_all(
        handles
            .into_iter()
            .map(|(name, handle)| async move { (name, handle.await) }),
    )
    .await;

    let mut collected = std::mem::take(&mut *lock(&shared));

    for (name, result) in joined {
        if let Err(join_error) = result {
            tracing::error!("{}: unit aborted: {}", name, join_error);
            collected.errors.push(DispatchError::Aborted {
                unit: name,
                reason: join_error.to_string(),
            });
        }
    }

    tracing::debug!(
        "fan-out finished: {} units, {} ok, {} failed",
        spawned,
        collected.results.len(),
        collected.errors.len()
    );

    FanOutOutcome {
        results: collected.results,
        errors: AggregatedError::from_errors(collected.errors),
    }
}
