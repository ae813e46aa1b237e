//! Division handling: optionally break the edges out of spots that divide.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::graph::LineageGraph;
use crate::spot::SpotId;

/// What to do with spots that have two or more children.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitPolicy {
    /// Leave divisions as imported
    #[default]
    KeepIntact,

    /// Keep only the link to the nearest daughter
    UnlinkFarthestDaughters,

    /// Drop every link out of a dividing spot
    UnlinkAllSplits,
}

impl SplitPolicy {
    /// Returns a list of all policies.
    pub fn all() -> [SplitPolicy; 3] {
        [
            SplitPolicy::KeepIntact,
            SplitPolicy::UnlinkFarthestDaughters,
            SplitPolicy::UnlinkAllSplits,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            SplitPolicy::KeepIntact => "keep",
            SplitPolicy::UnlinkFarthestDaughters => "farthest",
            SplitPolicy::UnlinkAllSplits => "all",
        }
    }

    /// Rewrite the graph in place. Returns the number of removed edges.
    ///
    /// After either unlink policy every spot has out-degree ≤ 1.
    pub fn apply(&self, graph: &mut LineageGraph) -> usize {
        let sites = match self {
            SplitPolicy::KeepIntact => return 0,
            _ => graph.division_sites(),
        };

        let mut removed = 0;
        for site in sites {
            let children = graph.children_of(site).to_vec();
            let keep = match self {
                SplitPolicy::UnlinkFarthestDaughters => nearest_child(graph, site, &children),
                _ => None,
            };
            for child in children {
                if Some(child) != keep && graph.remove_edge(site, child) {
                    removed += 1;
                }
            }
        }

        debug!("Split policy '{}' removed {} edges", self.name(), removed);
        removed
    }
}

/// Nearest child in world space; ties go to the smallest id.
fn nearest_child(graph: &LineageGraph, parent: SpotId, children: &[SpotId]) -> Option<SpotId> {
    let parent = graph.spot(parent)?;
    children
        .iter()
        .filter_map(|&id| graph.spot(id).map(|s| (id, parent.distance_to(s))))
        .min_by(|(a_id, a_d), (b_id, b_d)| a_d.total_cmp(b_d).then(a_id.cmp(b_id)))
        .map(|(id, _)| id)
}

impl std::fmt::Display for SplitPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for SplitPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keep" | "keep_intact" | "intact" => Ok(SplitPolicy::KeepIntact),
            "farthest" | "unlink_farthest_daughters" => Ok(SplitPolicy::UnlinkFarthestDaughters),
            "all" | "unlink_all_splits" => Ok(SplitPolicy::UnlinkAllSplits),
            _ => Err(format!("Unknown split policy: {} (expected keep, farthest or all)", s)),
        }
    }
}
