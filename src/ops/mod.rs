//! Engine operations: sizing, scanning, planning, deduplication, transfer.

pub mod dedupe;
pub mod hash;
pub mod plan;
pub mod scan;
pub mod size;
pub mod space;
pub mod transfer;

pub use dedupe::{CollisionPolicy, GroupOutcome};
pub use plan::{BranchCandidate, Placement};
pub use scan::CollisionGroup;
