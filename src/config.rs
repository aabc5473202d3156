//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Behavioral knobs for the tree engine.
///
/// Both settings cover edge cases the data model leaves open to
/// interpretation; the defaults match the documented contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// `GetChildren` with `depth = 1` traverses two edges from the anchor
    /// (direct children plus grandchildren). This is the contract's
    /// documented edge-count convention, on by default; turning it off makes
    /// `depth = 1` mean exactly one edge.
    pub depth_one_includes_grandchildren: bool,

    /// When deleting a subtree that contains the latest message, promote the
    /// deleted anchor's parent to latest instead of leaving the thread with
    /// no latest message. Off by default: the caller re-designates.
    pub promote_latest_on_delete: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            depth_one_includes_grandchildren: true,
            promote_latest_on_delete: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    /// (`ENGINE_DEPTH_ONE_GRANDCHILDREN`, `ENGINE_PROMOTE_LATEST_ON_DELETE`),
    /// falling back to the defaults.
    pub fn from_env() -> Self {
        let flag = |name: &str, default: bool| {
            std::env::var(name)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default)
        };
        Self {
            depth_one_includes_grandchildren: flag("ENGINE_DEPTH_ONE_GRANDCHILDREN", true),
            promote_latest_on_delete: flag("ENGINE_PROMOTE_LATEST_ON_DELETE", false),
        }
    }
}
