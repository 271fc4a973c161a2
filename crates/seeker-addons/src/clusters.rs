//! Avatar clustering over fingerprinted results.
//!
//! Two results are connected when their avatar sha256 values are equal
//! or their dHashes sit within the configured Hamming distance. The
//! partition is the transitive closure of that edge predicate,
//! computed with a union-find. Cluster ids are deterministic: scanning
//! providers in ascending name order, each newly seen cluster root
//! takes the next integer id, so the lexicographically smallest
//! provider name in a cluster anchors it.

use crate::fingerprint::{hamming, parse_dhash_hex};
use crate::{Addon, AddonContext};
use async_trait::async_trait;
use seeker_core::ProviderResult;

/// Union-find with path compression.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, i: usize) -> usize {
        if self.parent[i] != i {
            let root = self.find(self.parent[i]);
            self.parent[i] = root;
        }
        self.parent[i]
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

struct Item {
    result_index: usize,
    provider: String,
    sha256: String,
    dhash: u64,
}

/// Group results whose avatar fingerprints match.
pub struct AvatarClustersAddon {
    dhash_max_distance: u32,
}

impl AvatarClustersAddon {
    /// Create the addon with a Hamming threshold.
    #[must_use]
    pub fn new(dhash_max_distance: u32) -> Self {
        Self { dhash_max_distance }
    }
}

#[async_trait]
impl Addon for AvatarClustersAddon {
    fn name(&self) -> &str {
        "avatar_clusters"
    }

    async fn run(&self, _ctx: &AddonContext, results: &mut Vec<ProviderResult>) {
        let mut items: Vec<Item> = Vec::new();
        for (i, result) in results.iter().enumerate() {
            let profile = &result.profile;
            if let (Some(sha), Some(dh)) = (&profile.avatar_sha256, &profile.avatar_dhash) {
                if let Some(bits) = parse_dhash_hex(dh) {
                    items.push(Item {
                        result_index: i,
                        provider: result.provider.clone(),
                        sha256: sha.clone(),
                        dhash: bits,
                    });
                }
            }
        }

        if items.is_empty() {
            return;
        }

        // Result sets are small; the quadratic edge scan is fine.
        let mut uf = UnionFind::new(items.len());
        for a in 0..items.len() {
            for b in (a + 1)..items.len() {
                let connected = items[a].sha256 == items[b].sha256
                    || hamming(items[a].dhash, items[b].dhash) <= self.dhash_max_distance;
                if connected {
                    uf.union(a, b);
                }
            }
        }

        // Deterministic id assignment: ascending provider name order.
        let mut order: Vec<usize> = (0..items.len()).collect();
        order.sort_by(|&a, &b| items[a].provider.cmp(&items[b].provider));

        let mut next_id: u32 = 1;
        let mut root_ids: Vec<Option<u32>> = vec![None; items.len()];
        for &i in &order {
            let root = uf.find(i);
            if root_ids[root].is_none() {
                root_ids[root] = Some(next_id);
                next_id += 1;
            }
        }

        for (i, item) in items.iter().enumerate() {
            let root = uf.find(i);
            results[item.result_index].profile.avatar_cluster_id = root_ids[root];
        }
    }
}
