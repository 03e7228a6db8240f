// ============================================================================
// ERROR — typed failures for the core engines
// ============================================================================
//
// Only genuine caller-visible failures get a variant.  Lookups with stale or
// unknown ids are silent no-ops by contract, not errors.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FoldError {
    /// Closing or finishing a polygon with fewer than three vertices.
    #[error("a selection needs at least 3 points ({0} placed)")]
    InsufficientPoints(usize),

    /// Segmentation ran but no region met the background rule and size floor.
    #[error("no regions found with the current settings")]
    NoRegionsFound,
}
