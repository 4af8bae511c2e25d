//! Binary sum tree over particle property caches.
//!
//! Leaves hold the property vector of one particle slot, every inner node holds the
//! element-wise sum of its two children, so the root is the ensemble-wide sum of each
//! property. Updating one slot and selecting a slot with probability proportional to a
//! property are both O(log capacity). Sums are recomputed from children on every update,
//! so they never drift after many insertions and removals.
use crate::Particles::particle::{PROP_COUNT, PropId, PropertyCache};

#[derive(Debug, Clone)]
pub struct SumTree {
    leaves: usize,
    // 1-based heap layout: root at 1, children of i at 2i and 2i+1, leaf j at leaves + j
    nodes: Vec<PropertyCache>,
}

impl SumTree {
    /// `capacity` must be a power of two.
    pub fn new(capacity: usize) -> Self {
        let leaves = capacity.max(1).next_power_of_two();
        Self {
            leaves,
            nodes: vec![[0.0; PROP_COUNT]; 2 * leaves],
        }
    }

    pub fn capacity(&self) -> usize {
        self.leaves
    }

    /// Property sums over all slots.
    pub fn head(&self) -> &PropertyCache {
        &self.nodes[1]
    }

    pub fn leaf(&self, i: usize) -> &PropertyCache {
        &self.nodes[self.leaves + i]
    }

    pub fn set(&mut self, i: usize, cache: PropertyCache) {
        let mut node = self.leaves + i;
        self.nodes[node] = cache;
        while node > 1 {
            node /= 2;
            let (l, r) = (2 * node, 2 * node + 1);
            let mut sum = [0.0; PROP_COUNT];
            for (k, s) in sum.iter_mut().enumerate() {
                *s = self.nodes[l][k] + self.nodes[r][k];
            }
            self.nodes[node] = sum;
        }
    }

    pub fn clear_leaf(&mut self, i: usize) {
        self.set(i, [0.0; PROP_COUNT]);
    }

    pub fn clear(&mut self) {
        for node in self.nodes.iter_mut() {
            *node = [0.0; PROP_COUNT];
        }
    }

    /// Rebuilds all nodes from the given leaf caches in one bottom-up pass.
    pub fn rebuild<I: IntoIterator<Item = PropertyCache>>(&mut self, caches: I) {
        self.clear();
        for (i, cache) in caches.into_iter().take(self.leaves).enumerate() {
            self.nodes[self.leaves + i] = cache;
        }
        for node in (1..self.leaves).rev() {
            let (l, r) = (2 * node, 2 * node + 1);
            for k in 0..PROP_COUNT {
                self.nodes[node][k] = self.nodes[l][k] + self.nodes[r][k];
            }
        }
    }

    /// Slot whose cumulative `id`-sum interval contains `r`, with `0 <= r < head[id]`.
    /// Rounding can only push the walk to the right, so the result is clamped to the last
    /// occupied slot `count - 1`.
    pub fn select(&self, id: PropId, r: f64, count: usize) -> usize {
        let k = id.index();
        let mut r = r;
        let mut node = 1;
        while node < self.leaves {
            let left = 2 * node;
            if r < self.nodes[left][k] {
                node = left;
            } else {
                r -= self.nodes[left][k];
                node = left + 1;
            }
        }
        (node - self.leaves).min(count.saturating_sub(1))
    }
}
