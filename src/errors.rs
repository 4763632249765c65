//! Typed error definitions for mergepool.
//! Provides a small set of well-known failure modes for better logs and tests.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Branch attribute unreadable for mountpoint {}: {source}", .mountpoint.display())]
    BranchAttr {
        mountpoint: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Path is not on a pooled mountpoint: {}", .0.display())]
    NotManaged(PathBuf),

    #[error("No branch satisfies the free-space floor for {}", .0.display())]
    NoFeasiblePlacement(PathBuf),

    #[error("{tool} exited with status {status} while processing {}", .path.display())]
    ExternalTool {
        tool: &'static str,
        status: i32,
        path: PathBuf,
    },
}

impl PoolError {
    /// Stable machine-readable code for structured log fields.
    pub fn code(&self) -> &'static str {
        match self {
            PoolError::BranchAttr { .. } => "branch_attr",
            PoolError::NotManaged(_) => "not_managed",
            PoolError::NoFeasiblePlacement(_) => "no_placement",
            PoolError::ExternalTool { .. } => "external_tool",
        }
    }
}
