//! Process-level run ID plus fresh ULIDs for batch runs.
//!
//! Each process gets one ULID at startup; every batch run triggered by the
//! orchestrator gets its own. ULIDs sort lexicographically by creation time,
//! which keeps batch-run logs grep-able in order.

use once_cell::sync::Lazy;
use ulid::Ulid;

static RUN_ID: Lazy<String> = Lazy::new(|| Ulid::new().to_string());

/// Returns the process-level run ID (same value for the process lifetime).
#[inline]
pub fn get() -> &'static str {
    &RUN_ID
}

/// Generates a fresh ULID. Used for batch-run identifiers.
#[inline]
pub fn generate() -> String {
    Ulid::new().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_run_id_is_stable() {
        assert_eq!(get(), get());
        assert_eq!(get().len(), 26);
    }

    #[test]
    fn generate_returns_unique_ids() {
        assert_ne!(generate(), generate());
    }
}
