use tracing::warn;

use super::error::StoreResult;

/// Treats a failed hint lookup as "no hint".
///
/// ```no_run
/// use pattern_store::{Advisory, EngineQualityPolicy, PatternStore};
///
/// let store = PatternStore::open_in_memory(EngineQualityPolicy::default())?;
/// let hint = store.find_global_hint(&[0.5, 0.5], None, None, None).or_no_hint();
/// assert!(hint.is_none());
/// # Ok::<(), pattern_store::StoreError>(())
/// ```
pub trait Advisory<T> {
    fn or_no_hint(self) -> Option<T>;
}

impl<T> Advisory<T> for StoreResult<Option<T>> {
    fn or_no_hint(self) -> Option<T> {
        match self {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, recoverable = e.is_recoverable(), "hint lookup failed, continuing without hint");
                None
            }
        }
    }
}
