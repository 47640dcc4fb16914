use crate::error::{Error, Result};
use crate::types::BTreeKey;

/// A node of a B-Tree with minimum degree `t`.
///
/// Holds up to `2t-1` sorted keys and, when internal, exactly
/// `keys.len() + 1` owned children. Every non-root node keeps at least
/// `t-1` keys; the owning [`super::BTree`] is the only thing allowed to
/// let the root drop below that.
///
/// ```text
///                 [ 10 | 20 ]
///               /      |      \
///        [3 | 7]   [12 | 17]   [25 | 30]
/// ```
///
/// Children are owned outright (`Box`), there are no parent pointers.
/// Rebalancing works on a parent and two adjacent children at a time,
/// which `split_at_mut` hands out without any shared ownership.
#[derive(Debug, Clone)]
pub struct BTreeNode {
    keys: Vec<BTreeKey>,
    children: Vec<Box<BTreeNode>>,
    t: usize,
    leaf: bool,
}

impl BTreeNode {
    /// Create an empty node with room for `2t-1` keys.
    pub fn new(t: usize, leaf: bool) -> Self {
        BTreeNode {
            keys: Vec::with_capacity(2 * t - 1),
            children: if leaf { Vec::new() } else { Vec::with_capacity(2 * t) },
            t,
            leaf,
        }
    }

    /// Create a new internal root above a full old root and split it.
    pub(crate) fn grow_root(old_root: BTreeNode) -> Self {
        let mut root = BTreeNode::new(old_root.t, false);
        root.children.push(Box::new(old_root));
        root.split_child(0);
        root
    }

    /// Detach the sole child of an internal node emptied by a merge.
    pub(crate) fn take_only_child(&mut self) -> Option<Box<BTreeNode>> {
        debug_assert!(self.keys.is_empty() && self.children.len() <= 1);
        self.children.pop()
    }

    pub fn keys(&self) -> &[BTreeKey] {
        &self.keys
    }

    pub fn children(&self) -> &[Box<BTreeNode>] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.leaf
    }

    /// Number of keys, `n`.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.keys.len() == 2 * self.t - 1
    }

    /// Find the node hosting `key` in this subtree.
    pub fn search(&self, key: BTreeKey) -> Option<&BTreeNode> {
        let i = self.find_key(key);
        if i < self.keys.len() && self.keys[i] == key {
            return Some(self);
        }
        if self.leaf {
            return None;
        }
        self.children[i].search(key)
    }

    /// Append this subtree's keys to `out` in order.
    pub fn traverse(&self, out: &mut Vec<BTreeKey>) {
        for (i, &key) in self.keys.iter().enumerate() {
            if !self.leaf {
                self.children[i].traverse(out);
            }
            out.push(key);
        }
        if !self.leaf {
            self.children[self.keys.len()].traverse(out);
        }
    }

    /// Insert into a node that has spare capacity.
    ///
    /// Splits full children on the way down, so the recursion never lands
    /// on a full node. The key must not already be present.
    pub fn insert_non_full(&mut self, key: BTreeKey) {
        debug_assert!(!self.is_full());
        let mut i = self.find_key(key);

        if self.leaf {
            self.keys.insert(i, key);
            return;
        }

        if self.children[i].is_full() {
            self.split_child(i);
            // The promoted median now sits at keys[i].
            if self.keys[i] < key {
                i += 1;
            }
        }
        self.children[i].insert_non_full(key);
    }

    /// Split the full child at `i` into two nodes of `t-1` keys, moving its
    /// median up into this node at position `i`. The new right half
    /// becomes `children[i+1]`.
    pub fn split_child(&mut self, i: usize) {
        let t = self.t;
        let child = &mut self.children[i];
        debug_assert!(child.is_full());

        let mut right = BTreeNode::new(t, child.leaf);
        right.keys.extend(child.keys.drain(t..));
        if !child.leaf {
            right.children.extend(child.children.drain(t..));
        }
        let median = child.keys[t - 1];
        child.keys.truncate(t - 1);

        self.keys.insert(i, median);
        self.children.insert(i + 1, Box::new(right));
    }

    /// Remove `key` from this subtree. Returns `false` if it isn't there.
    ///
    /// Single pass, top-down: before descending into a child that holds
    /// only `t-1` keys, the child is topped up (borrow or merge), so the
    /// removal at the bottom never leaves a node underfull.
    pub fn delete(&mut self, key: BTreeKey) -> bool {
        let idx = self.find_key(key);

        if idx < self.keys.len() && self.keys[idx] == key {
            if self.leaf {
                self.keys.remove(idx);
            } else {
                self.remove_from_internal(idx);
            }
            return true;
        }

        if self.leaf {
            return false;
        }

        let was_last_child = idx == self.keys.len();
        if self.children[idx].len() < self.t {
            self.fill(idx);
        }

        // Filling the last child merges it into its left sibling.
        if was_last_child && idx > self.keys.len() {
            self.children[idx - 1].delete(key)
        } else {
            self.children[idx].delete(key)
        }
    }

    /// First index with `keys[idx] >= key`.
    fn find_key(&self, key: BTreeKey) -> usize {
        self.keys.partition_point(|&k| k < key)
    }

    fn remove_from_internal(&mut self, idx: usize) {
        let key = self.keys[idx];

        if self.children[idx].len() >= self.t {
            let pred = self.children[idx].max_key();
            self.keys[idx] = pred;
            self.children[idx].delete(pred);
        } else if self.children[idx + 1].len() >= self.t {
            let succ = self.children[idx + 1].min_key();
            self.keys[idx] = succ;
            self.children[idx + 1].delete(succ);
        } else {
            self.merge(idx);
            self.children[idx].delete(key);
        }
    }

    /// Rightmost key of this subtree.
    fn max_key(&self) -> BTreeKey {
        let mut node = self;
        while !node.leaf {
            node = &node.children[node.children.len() - 1];
        }
        node.keys[node.keys.len() - 1]
    }

    /// Leftmost key of this subtree.
    fn min_key(&self) -> BTreeKey {
        let mut node = self;
        while !node.leaf {
            node = &node.children[0];
        }
        node.keys[0]
    }

    /// Bring `children[idx]` up to at least `t` keys.
    fn fill(&mut self, idx: usize) {
        let n = self.keys.len();
        if idx != 0 && self.children[idx - 1].len() >= self.t {
            self.borrow_from_prev(idx);
        } else if idx != n && self.children[idx + 1].len() >= self.t {
            self.borrow_from_next(idx);
        } else if idx != n {
            self.merge(idx);
        } else {
            self.merge(idx - 1);
        }
    }

    /// Rotate right: the left sibling's last key goes up, the separator
    /// comes down as the child's first key, and the sibling's last child
    /// pointer moves across with it.
    fn borrow_from_prev(&mut self, idx: usize) {
        let (left, right) = self.children.split_at_mut(idx);
        let sibling = &mut left[idx - 1];
        let child = &mut right[0];

        let Some(sibling_key) = sibling.keys.pop() else {
            return;
        };
        let separator = std::mem::replace(&mut self.keys[idx - 1], sibling_key);
        child.keys.insert(0, separator);

        if let Some(moved) = sibling.children.pop() {
            child.children.insert(0, moved);
        }
    }

    /// Rotate left, mirror of `borrow_from_prev`.
    fn borrow_from_next(&mut self, idx: usize) {
        let (left, right) = self.children.split_at_mut(idx + 1);
        let child = &mut left[idx];
        let sibling = &mut right[0];

        let sibling_key = sibling.keys.remove(0);
        let separator = std::mem::replace(&mut self.keys[idx], sibling_key);
        child.keys.push(separator);

        if !sibling.leaf {
            child.children.push(sibling.children.remove(0));
        }
    }

    /// Fold `children[idx+1]` and the separator `keys[idx]` into
    /// `children[idx]`. Both children hold `t-1` keys, so the result is
    /// exactly full.
    fn merge(&mut self, idx: usize) {
        let sibling = *self.children.remove(idx + 1);
        let separator = self.keys.remove(idx);

        let child = &mut self.children[idx];
        child.keys.push(separator);
        child.keys.extend(sibling.keys);
        child.children.extend(sibling.children);
    }

    /// Check ordering, occupancy and shape of this subtree. Returns the
    /// height (leaves are 1).
    pub(crate) fn validate(
        &self,
        is_root: bool,
        lower: Option<BTreeKey>,
        upper: Option<BTreeKey>,
    ) -> Result<usize> {
        let n = self.keys.len();
        let min = if is_root { 1 } else { self.t - 1 };
        if n < min || n > 2 * self.t - 1 {
            return Err(Error::Corruption(format!(
                "node holds {n} keys, allowed {min}..={}",
                2 * self.t - 1
            )));
        }
        if self.keys.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::Corruption(format!("keys out of order: {:?}", self.keys)));
        }
        let first = self.keys[0];
        let last = self.keys[n - 1];
        if lower.is_some_and(|lo| first <= lo) || upper.is_some_and(|hi| last >= hi) {
            return Err(Error::Corruption(format!(
                "keys {:?} escape parent range ({lower:?}, {upper:?})",
                self.keys
            )));
        }

        if self.leaf {
            if !self.children.is_empty() {
                return Err(Error::Corruption("leaf node owns children".into()));
            }
            return Ok(1);
        }

        if self.children.len() != n + 1 {
            return Err(Error::Corruption(format!(
                "internal node with {n} keys has {} children",
                self.children.len()
            )));
        }

        let mut height = None;
        for (i, child) in self.children.iter().enumerate() {
            let lo = if i == 0 { lower } else { Some(self.keys[i - 1]) };
            let hi = if i == n { upper } else { Some(self.keys[i]) };
            let h = child.validate(false, lo, hi)?;
            if *height.get_or_insert(h) != h {
                return Err(Error::Corruption("leaves at different depths".into()));
            }
        }
        Ok(height.unwrap_or(0) + 1)
    }
}
