//! Concurrency and batch sizing.

/// Namespace count above which concurrency drops to the large-scan cap.
pub const LARGE_SCAN_THRESHOLD: usize = 50;

/// Smallest computed resource-type batch.
pub const MIN_BATCH_SIZE: usize = 5;

/// Largest computed resource-type batch.
pub const MAX_BATCH_SIZE: usize = 15;

/// Number of batches the type list is split into when no size is configured.
pub const TARGET_BATCH_COUNT: usize = 5;

/// Caps applied to namespace-level concurrency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcurrencyLimits {
    /// Namespace count above which `large_scan_cap` applies. Exclusive.
    pub large_scan_threshold: usize,
    /// Concurrency cap for large scans.
    pub large_scan_cap: usize,
    /// Concurrency cap for every scan.
    pub absolute_max: usize,
}

impl ConcurrencyLimits {
    /// Limits for single-cluster audits.
    pub const AUDIT: Self = Self {
        large_scan_threshold: LARGE_SCAN_THRESHOLD,
        large_scan_cap: 10,
        absolute_max: 15,
    };

    /// Limits for dual-cluster comparisons, where each namespace talks to
    /// two API servers.
    pub const DRIFT: Self = Self {
        large_scan_threshold: LARGE_SCAN_THRESHOLD,
        large_scan_cap: 5,
        absolute_max: 10,
    };
}

/// Compute namespace-level concurrency.
///
/// Starts from `min(requested, namespace_count)`, drops to the large-scan
/// cap above the threshold, then applies the absolute cap. Never below one.
#[must_use]
pub fn optimize_concurrency(
    namespace_count: usize,
    requested: usize,
    limits: &ConcurrencyLimits,
) -> usize {
    let mut concurrency = requested.min(namespace_count);
    if namespace_count > limits.large_scan_threshold {
        concurrency = concurrency.min(limits.large_scan_cap);
    }
    concurrency.min(limits.absolute_max).max(1)
}

/// Compute how many resource types go into one batch.
///
/// A non-zero `configured` size wins. Otherwise the type list is split into
/// about [`TARGET_BATCH_COUNT`] batches of between [`MIN_BATCH_SIZE`] and
/// [`MAX_BATCH_SIZE`] types.
#[must_use]
pub fn calculate_batch_size(resource_type_count: usize, configured: usize) -> usize {
    if configured > 0 {
        return configured;
    }
    (resource_type_count / TARGET_BATCH_COUNT).clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE)
}
