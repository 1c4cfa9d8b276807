//! Order-statistics tree keyed by opaque keys, ordered by an external value.
//!
//! The tree never stores values. Every comparison goes through a [`KeyOrder`]
//! supplied by the caller, so a tree of point indices can be ordered by one
//! coordinate of a point array it does not own.
//!
//! # Layout
//! - Nodes live in an arena (`Vec<Node>`); id `0` is the sentinel [`BOTTOM`]
//!   whose links point back to itself, so traversal never branches on `Option`.
//! - Keys whose values compare equal share one node (a *tie list*). Only the
//!   first key of a node is ever compared.
//! - `first`/`last` cursors are cached and updated by every structural change.
//!
//! # Balancing
//! No rotations. When an insertion creates a node deeper than
//! `log2(node_count) * e`, the whole tree is relinked from its in-order node
//! sequence (median-of-range). Node ids survive, so the key map stays valid.
//!
//! # Failure semantics
//! Nothing here panics on absent keys: `remove` of an unknown key is a no-op
//! and `update` of an unknown key inserts it.

use ordered_float::OrderedFloat;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hash;

/// Arena index of a node.
pub type NodeId = usize;

/// Sentinel id standing in for "no node".
pub const BOTTOM: NodeId = 0;

const REBALANCE_FACTOR: f64 = std::f64::consts::E;

/// Ordering of keys by the values they stand for.
pub trait KeyOrder<K> {
    /// What value lookups are compared against.
    type Probe: ?Sized;

    /// Compare the values behind two keys.
    fn cmp_keys(&self, a: K, b: K) -> Ordering;

    /// Compare the value behind `key` with `probe`.
    fn cmp_probe(&self, key: K, probe: &Self::Probe) -> Ordering;
}

/// Orders `usize` keys by the matching entry of a float slice.
#[derive(Debug, Clone, Copy)]
pub struct SliceOrder<'a>(pub &'a [f64]);

impl KeyOrder<usize> for SliceOrder<'_> {
    type Probe = f64;

    #[inline]
    fn cmp_keys(&self, a: usize, b: usize) -> Ordering {
        OrderedFloat(self.0[a]).cmp(&OrderedFloat(self.0[b]))
    }

    #[inline]
    fn cmp_probe(&self, key: usize, probe: &f64) -> Ordering {
        OrderedFloat(self.0[key]).cmp(&OrderedFloat(*probe))
    }
}

#[derive(Debug, Clone)]
struct Node<K> {
    keys: Vec<K>,
    parent: NodeId,
    left: NodeId,
    right: NodeId,
}

impl<K> Node<K> {
    fn bottom() -> Self {
        Node {
            keys: Vec::new(),
            parent: BOTTOM,
            left: BOTTOM,
            right: BOTTOM,
        }
    }
}

/// Binary search tree over keys with tie lists and amortized rebuild balancing.
#[derive(Debug, Clone)]
pub struct SortTree<K> {
    nodes: Vec<Node<K>>,
    vacant: Vec<NodeId>,
    key_map: HashMap<K, NodeId>,
    root: NodeId,
    first: NodeId,
    last: NodeId,
    node_count: usize,
}

impl<K: Copy + Eq + Hash> Default for SortTree<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Copy + Eq + Hash> SortTree<K> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Pre-size the arena and key map for `n` keys.
    pub fn with_capacity(n: usize) -> Self {
        let mut nodes = Vec::with_capacity(n + 1);
        nodes.push(Node::bottom());
        SortTree {
            nodes,
            vacant: Vec::new(),
            key_map: HashMap::with_capacity(n),
            root: BOTTOM,
            first: BOTTOM,
            last: BOTTOM,
            node_count: 0,
        }
    }

    /// Number of keys.
    #[inline]
    pub fn len(&self) -> usize {
        self.key_map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.key_map.is_empty()
    }

    /// Number of distinct values (nodes).
    #[inline]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    #[inline]
    pub fn contains(&self, key: K) -> bool {
        self.key_map.contains_key(&key)
    }

    /// Drop every key.
    pub fn clear(&mut self) {
        self.nodes.truncate(1);
        self.vacant.clear();
        self.key_map.clear();
        self.root = BOTTOM;
        self.first = BOTTOM;
        self.last = BOTTOM;
        self.node_count = 0;
    }

    /* ===========================
     * Mutation
     * =========================== */

    /// Insert `key`, or re-seat it after its value changed.
    pub fn update<O: KeyOrder<K>>(&mut self, key: K, order: &O) {
        if let Some(&node) = self.key_map.get(&key) {
            self.detach(key, node);
        }
        self.insert_key(key, order);
    }

    /// Remove `key`. Returns whether it was present.
    pub fn remove(&mut self, key: K) -> bool {
        match self.key_map.get(&key).copied() {
            Some(node) => {
                self.detach(key, node);
                true
            }
            None => false,
        }
    }

    /// Re-seat every key from scratch, e.g. after many values changed at once.
    ///
    /// Keys with equal values keep their relative tie-list order.
    pub fn rebuild<O: KeyOrder<K>>(&mut self, order: &O) {
        let mut keys: Vec<K> = self.iter().collect();
        keys.sort_by(|a, b| order.cmp_keys(*a, *b));
        self.clear();

        let mut ids: Vec<NodeId> = Vec::with_capacity(keys.len());
        for key in keys {
            let tail = ids.last().copied();
            let id = match tail {
                Some(id) if order.cmp_keys(self.nodes[id].keys[0], key) == Ordering::Equal => {
                    self.nodes[id].keys.push(key);
                    id
                }
                _ => {
                    let id = self.alloc(key);
                    ids.push(id);
                    id
                }
            };
            self.key_map.insert(key, id);
        }
        self.node_count = ids.len();
        self.relink(&ids);
    }

    /// Relink every node into a balanced shape.
    pub fn rebalance(&mut self) {
        let ids = self.in_order_nodes();
        self.relink(&ids);
        tracing::trace!(nodes = ids.len(), "sort tree rebalanced");
    }

    fn insert_key<O: KeyOrder<K>>(&mut self, key: K, order: &O) {
        if self.root == BOTTOM {
            let id = self.alloc(key);
            self.root = id;
            self.first = id;
            self.last = id;
            self.node_count = 1;
            self.key_map.insert(key, id);
            return;
        }

        let mut parent = self.root;
        let mut depth = 1usize;
        let id = loop {
            let rep = self.nodes[parent].keys[0];
            match order.cmp_keys(key, rep) {
                Ordering::Equal => {
                    self.nodes[parent].keys.push(key);
                    self.key_map.insert(key, parent);
                    return;
                }
                Ordering::Less => {
                    let left = self.nodes[parent].left;
                    if left == BOTTOM {
                        let id = self.alloc(key);
                        self.link_left(parent, id);
                        break id;
                    }
                    parent = left;
                }
                Ordering::Greater => {
                    let right = self.nodes[parent].right;
                    if right == BOTTOM {
                        let id = self.alloc(key);
                        self.link_right(parent, id);
                        break id;
                    }
                    parent = right;
                }
            }
            depth += 1;
        };

        self.key_map.insert(key, id);
        self.node_count += 1;

        if depth as f64 > (self.node_count as f64).log2() * REBALANCE_FACTOR {
            self.rebalance();
        }
    }

    fn alloc(&mut self, key: K) -> NodeId {
        match self.vacant.pop() {
            Some(id) => {
                let node = &mut self.nodes[id];
                node.keys.clear();
                node.keys.push(key);
                node.parent = BOTTOM;
                node.left = BOTTOM;
                node.right = BOTTOM;
                id
            }
            None => {
                self.nodes.push(Node {
                    keys: vec![key],
                    parent: BOTTOM,
                    left: BOTTOM,
                    right: BOTTOM,
                });
                self.nodes.len() - 1
            }
        }
    }

    fn release(&mut self, id: NodeId) {
        let node = &mut self.nodes[id];
        node.keys.clear();
        node.parent = BOTTOM;
        node.left = BOTTOM;
        node.right = BOTTOM;
        self.vacant.push(id);
    }

    fn link_left(&mut self, parent: NodeId, id: NodeId) {
        self.nodes[parent].left = id;
        self.nodes[id].parent = parent;
        if parent == self.first {
            self.first = id;
        }
    }

    fn link_right(&mut self, parent: NodeId, id: NodeId) {
        self.nodes[parent].right = id;
        self.nodes[id].parent = parent;
        if parent == self.last {
            self.last = id;
        }
    }

    fn detach(&mut self, key: K, node: NodeId) {
        let keys = &mut self.nodes[node].keys;
        if let Some(pos) = keys.iter().position(|k| *k == key) {
            keys.remove(pos);
        }
        self.key_map.remove(&key);
        if self.nodes[node].keys.is_empty() {
            self.unlink(node);
        }
    }

    /// Unlink an emptied node. A node with two children takes over the keys of
    /// its in-order successor, which is unlinked instead.
    fn unlink(&mut self, node: NodeId) {
        let mut node = node;
        if self.nodes[node].left != BOTTOM && self.nodes[node].right != BOTTOM {
            let mut succ = self.nodes[node].right;
            while self.nodes[succ].left != BOTTOM {
                succ = self.nodes[succ].left;
            }
            let moved = std::mem::take(&mut self.nodes[succ].keys);
            for k in &moved {
                self.key_map.insert(*k, node);
            }
            self.nodes[node].keys = moved;
            node = succ;
        }

        if self.first == node {
            self.first = self.next_node(node);
        }
        if self.last == node {
            self.last = self.prev_node(node);
        }

        let child = if self.nodes[node].left != BOTTOM {
            self.nodes[node].left
        } else {
            self.nodes[node].right
        };
        self.replace_in_parent(node, child);
        self.release(node);
        self.node_count -= 1;
    }

    fn replace_in_parent(&mut self, node: NodeId, replace: NodeId) {
        let parent = self.nodes[node].parent;
        if parent != BOTTOM {
            if self.nodes[parent].left == node {
                self.nodes[parent].left = replace;
            } else {
                self.nodes[parent].right = replace;
            }
        } else {
            self.root = replace;
        }
        if replace != BOTTOM {
            self.nodes[replace].parent = parent;
        }
    }

    fn in_order_nodes(&self) -> Vec<NodeId> {
        let mut ids = Vec::with_capacity(self.node_count);
        let mut n = self.first;
        while n != BOTTOM {
            ids.push(n);
            n = self.next_node(n);
        }
        ids
    }

    fn relink(&mut self, ids: &[NodeId]) {
        self.root = self.link_balanced(ids, BOTTOM);
        self.first = ids.first().copied().unwrap_or(BOTTOM);
        self.last = ids.last().copied().unwrap_or(BOTTOM);
    }

    fn link_balanced(&mut self, ids: &[NodeId], parent: NodeId) -> NodeId {
        if ids.is_empty() {
            return BOTTOM;
        }
        let mid = ids.len() / 2;
        let id = ids[mid];
        self.nodes[id].parent = parent;
        let left = self.link_balanced(&ids[..mid], id);
        let right = self.link_balanced(&ids[mid + 1..], id);
        self.nodes[id].left = left;
        self.nodes[id].right = right;
        id
    }

    /* ===========================
     * Navigation
     * =========================== */

    fn next_node(&self, node: NodeId) -> NodeId {
        let right = self.nodes[node].right;
        if right != BOTTOM {
            let mut n = right;
            while self.nodes[n].left != BOTTOM {
                n = self.nodes[n].left;
            }
            return n;
        }
        let mut cur = node;
        let mut parent = self.nodes[cur].parent;
        while parent != BOTTOM && self.nodes[parent].right == cur {
            cur = parent;
            parent = self.nodes[cur].parent;
        }
        parent
    }

    fn prev_node(&self, node: NodeId) -> NodeId {
        let left = self.nodes[node].left;
        if left != BOTTOM {
            let mut n = left;
            while self.nodes[n].right != BOTTOM {
                n = self.nodes[n].right;
            }
            return n;
        }
        let mut cur = node;
        let mut parent = self.nodes[cur].parent;
        while parent != BOTTOM && self.nodes[parent].left == cur {
            cur = parent;
            parent = self.nodes[cur].parent;
        }
        parent
    }

    /// Greatest node with value `< probe` (`<=` when `inclusive`).
    fn node_below<O: KeyOrder<K>>(&self, probe: &O::Probe, inclusive: bool, order: &O) -> NodeId {
        let mut node = self.root;
        let mut best = BOTTOM;
        while node != BOTTOM {
            let below = match order.cmp_probe(self.nodes[node].keys[0], probe) {
                Ordering::Less => true,
                Ordering::Equal => inclusive,
                Ordering::Greater => false,
            };
            if below {
                best = node;
                node = self.nodes[node].right;
            } else {
                node = self.nodes[node].left;
            }
        }
        best
    }

    /// Smallest node with value `> probe` (`>=` when `inclusive`).
    fn node_above<O: KeyOrder<K>>(&self, probe: &O::Probe, inclusive: bool, order: &O) -> NodeId {
        let mut node = self.root;
        let mut best = BOTTOM;
        while node != BOTTOM {
            let above = match order.cmp_probe(self.nodes[node].keys[0], probe) {
                Ordering::Greater => true,
                Ordering::Equal => inclusive,
                Ordering::Less => false,
            };
            if above {
                best = node;
                node = self.nodes[node].left;
            } else {
                node = self.nodes[node].right;
            }
        }
        best
    }

    fn position(&self, key: K) -> Option<(NodeId, usize)> {
        let node = *self.key_map.get(&key)?;
        let pos = self.nodes[node].keys.iter().position(|k| *k == key)?;
        Some((node, pos))
    }

    /* ===========================
     * Key lookups
     * =========================== */

    /// Key with the smallest value (first of its tie list).
    #[inline]
    pub fn first_key(&self) -> Option<K> {
        self.nodes[self.first].keys.first().copied()
    }

    /// Key with the largest value (last of its tie list).
    #[inline]
    pub fn last_key(&self) -> Option<K> {
        self.nodes[self.last].keys.last().copied()
    }

    /// Predecessor of `key` in iteration order; ties count as neighbours.
    pub fn key_left_of_key(&self, key: K) -> Option<K> {
        let (node, pos) = self.position(key)?;
        if pos > 0 {
            return Some(self.nodes[node].keys[pos - 1]);
        }
        self.nodes[self.prev_node(node)].keys.last().copied()
    }

    /// Successor of `key` in iteration order; ties count as neighbours.
    pub fn key_right_of_key(&self, key: K) -> Option<K> {
        let (node, pos) = self.position(key)?;
        let keys = &self.nodes[node].keys;
        if pos + 1 < keys.len() {
            return Some(keys[pos + 1]);
        }
        self.nodes[self.next_node(node)].keys.first().copied()
    }

    /// Nearest key with a strictly smaller value (last of its tie list).
    pub fn key_with_previous_value(&self, key: K) -> Option<K> {
        let node = *self.key_map.get(&key)?;
        self.nodes[self.prev_node(node)].keys.last().copied()
    }

    /// Nearest key with a strictly larger value (first of its tie list).
    pub fn key_with_next_value(&self, key: K) -> Option<K> {
        let node = *self.key_map.get(&key)?;
        self.nodes[self.next_node(node)].keys.first().copied()
    }

    /// Every key tied with `key`, in tie-list order.
    pub fn tied_keys(&self, key: K) -> &[K] {
        match self.key_map.get(&key) {
            Some(&node) => &self.nodes[node].keys,
            None => &[],
        }
    }

    /// Outermost key of the greatest value `< probe` (`<=` when `inclusive`).
    pub fn far_key_left_of_value<O: KeyOrder<K>>(
        &self,
        probe: &O::Probe,
        inclusive: bool,
        order: &O,
    ) -> Option<K> {
        let node = self.node_below(probe, inclusive, order);
        self.nodes[node].keys.first().copied()
    }

    /// Innermost key of the greatest value `< probe` (`<=` when `inclusive`).
    pub fn near_key_left_of_value<O: KeyOrder<K>>(
        &self,
        probe: &O::Probe,
        inclusive: bool,
        order: &O,
    ) -> Option<K> {
        let node = self.node_below(probe, inclusive, order);
        self.nodes[node].keys.last().copied()
    }

    /// Outermost key of the smallest value `> probe` (`>=` when `inclusive`).
    pub fn far_key_right_of_value<O: KeyOrder<K>>(
        &self,
        probe: &O::Probe,
        inclusive: bool,
        order: &O,
    ) -> Option<K> {
        let node = self.node_above(probe, inclusive, order);
        self.nodes[node].keys.last().copied()
    }

    /// Innermost key of the smallest value `> probe` (`>=` when `inclusive`).
    pub fn near_key_right_of_value<O: KeyOrder<K>>(
        &self,
        probe: &O::Probe,
        inclusive: bool,
        order: &O,
    ) -> Option<K> {
        let node = self.node_above(probe, inclusive, order);
        self.nodes[node].keys.first().copied()
    }

    /// Every key whose value equals `probe`.
    pub fn keys_at<O: KeyOrder<K>>(&self, probe: &O::Probe, order: &O) -> &[K] {
        let mut node = self.root;
        while node != BOTTOM {
            match order.cmp_probe(self.nodes[node].keys[0], probe) {
                Ordering::Equal => return &self.nodes[node].keys,
                Ordering::Greater => node = self.nodes[node].left,
                Ordering::Less => node = self.nodes[node].right,
            }
        }
        &[]
    }

    /* ===========================
     * Iteration
     * =========================== */

    /// All keys in ascending value order.
    pub fn iter(&self) -> Keys<'_, K> {
        Keys::forward(self, self.first, 0)
    }

    /// All keys in descending value order.
    pub fn iter_rev(&self) -> Keys<'_, K> {
        Keys::backward(self, self.last, 0)
    }

    /// Ascending from `key` (inclusive). Empty when `key` is absent.
    pub fn keys_from_key(&self, key: K) -> Keys<'_, K> {
        match self.position(key) {
            Some((node, pos)) => Keys::forward(self, node, pos),
            None => Keys::forward(self, BOTTOM, 0),
        }
    }

    /// Descending from `key` (inclusive). Empty when `key` is absent.
    pub fn keys_before_key(&self, key: K) -> Keys<'_, K> {
        match self.position(key) {
            Some((node, pos)) => {
                let from_back = self.nodes[node].keys.len() - 1 - pos;
                Keys::backward(self, node, from_back)
            }
            None => Keys::backward(self, BOTTOM, 0),
        }
    }

    /// Ascending from the first value `> probe` (`>=` when `inclusive`).
    pub fn keys_from_value<O: KeyOrder<K>>(
        &self,
        probe: &O::Probe,
        inclusive: bool,
        order: &O,
    ) -> Keys<'_, K> {
        Keys::forward(self, self.node_above(probe, inclusive, order), 0)
    }

    /// Descending from the last value `< probe` (`<=` when `inclusive`).
    pub fn keys_before_value<O: KeyOrder<K>>(
        &self,
        probe: &O::Probe,
        inclusive: bool,
        order: &O,
    ) -> Keys<'_, K> {
        Keys::backward(self, self.node_below(probe, inclusive, order), 0)
    }

    /* ===========================
     * Diagnostics
     * =========================== */

    /// Longest root-to-leaf path, in edges. `0` for an empty or single-node tree.
    pub fn depth(&self) -> usize {
        if self.root == BOTTOM {
            return 0;
        }
        let mut max = 0;
        let mut stack = vec![(self.root, 0usize)];
        while let Some((node, d)) = stack.pop() {
            max = max.max(d);
            let n = &self.nodes[node];
            if n.left != BOTTOM {
                stack.push((n.left, d + 1));
            }
            if n.right != BOTTOM {
                stack.push((n.right, d + 1));
            }
        }
        max
    }

    /// Verify links, ordering, cursors and the key map.
    pub fn check_structure<O: KeyOrder<K>>(&self, order: &O) -> Result<(), &'static str> {
        if self.nodes[BOTTOM].left != BOTTOM
            || self.nodes[BOTTOM].right != BOTTOM
            || self.nodes[BOTTOM].parent != BOTTOM
            || !self.nodes[BOTTOM].keys.is_empty()
        {
            return Err("sentinel was written to");
        }
        if self.root != BOTTOM && self.nodes[self.root].parent != BOTTOM {
            return Err("root has a parent");
        }

        let ids = self.in_order_nodes();
        if ids.len() != self.node_count {
            return Err("node count out of sync");
        }
        if ids.first().copied().unwrap_or(BOTTOM) != self.first {
            return Err("first cursor is stale");
        }
        if self.last != BOTTOM && self.next_node(self.last) != BOTTOM {
            return Err("last cursor is stale");
        }

        let mut seen = 0usize;
        for (i, &id) in ids.iter().enumerate() {
            let node = &self.nodes[id];
            if node.keys.is_empty() {
                return Err("empty node left in tree");
            }
            for child in [node.left, node.right] {
                if child != BOTTOM && self.nodes[child].parent != id {
                    return Err("child does not point back to parent");
                }
            }
            let rep = node.keys[0];
            for &k in &node.keys {
                if order.cmp_keys(k, rep) != Ordering::Equal {
                    return Err("tie list holds unequal values");
                }
                if self.key_map.get(&k) != Some(&id) {
                    return Err("key map points at the wrong node");
                }
            }
            if i > 0 {
                let prev = self.nodes[ids[i - 1]].keys[0];
                if order.cmp_keys(prev, rep) != Ordering::Less {
                    return Err("nodes out of order");
                }
            }
            seen += node.keys.len();
        }
        if seen != self.key_map.len() {
            return Err("key map holds keys outside the tree");
        }
        Ok(())
    }
}

/// Key iterator walking tie lists and nodes in either direction.
#[derive(Debug, Clone)]
pub struct Keys<'t, K> {
    tree: &'t SortTree<K>,
    node: NodeId,
    /// Offset into the current tie list, counted from the walking end.
    pos: usize,
    reverse: bool,
}

impl<'t, K> Keys<'t, K> {
    fn forward(tree: &'t SortTree<K>, node: NodeId, pos: usize) -> Self {
        Keys {
            tree,
            node,
            pos,
            reverse: false,
        }
    }

    fn backward(tree: &'t SortTree<K>, node: NodeId, pos: usize) -> Self {
        Keys {
            tree,
            node,
            pos,
            reverse: true,
        }
    }
}

impl<K: Copy + Eq + Hash> Iterator for Keys<'_, K> {
    type Item = K;

    fn next(&mut self) -> Option<K> {
        if self.node == BOTTOM {
            return None;
        }
        let keys = &self.tree.nodes[self.node].keys;
        let idx = if self.reverse {
            keys.len() - 1 - self.pos
        } else {
            self.pos
        };
        let key = keys[idx];
        self.pos += 1;
        if self.pos >= keys.len() {
            self.pos = 0;
            self.node = if self.reverse {
                self.tree.prev_node(self.node)
            } else {
                self.tree.next_node(self.node)
            };
        }
        Some(key)
    }
}
