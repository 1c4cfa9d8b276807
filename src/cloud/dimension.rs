//! One axis of the cloud: a tree of live point indices ordered by one component.
//!
//! # Range weighting
//! A stored point stands for mass spread between its neighbouring values on
//! this axis, not for a Dirac spike. `range(lo, hi)` walks the points whose
//! spread can overlap `[lo, hi]` and gives each the fraction of its spread
//! that falls inside, per [`SpreadShape`].
//!
//! - **Window**: from the outermost key of the greatest value `< lo` (or the
//!   first key) to the outermost key of the smallest value `> hi` (or the last
//!   key). One extra value group on each side, so gaps and out-of-range
//!   queries still see the neighbours they interpolate from.
//! - **Steps**: keys with equal values form one step and share one weight.
//! - **Neighbours**: the previous/next distinct values in the tree. At the
//!   global min/max the missing neighbour is extrapolated `overhang` times the
//!   inner gap beyond the sample.
//! - **Single value**: when the axis holds one distinct value nothing can be
//!   interpolated; weights are 1 inside `[lo, hi]` and 0 outside.

use ordered_float::OrderedFloat;
use std::cmp::Ordering;

use crate::cloud::points::PointStore;
use crate::cloud::shape::SpreadShape;
use crate::cloud::sort_tree::{KeyOrder, SortTree};

/// Orders point indices by component `axis`.
#[derive(Debug, Clone, Copy)]
pub struct AxisOrder<'a> {
    points: &'a PointStore,
    axis: usize,
}

impl<'a> AxisOrder<'a> {
    pub fn new(points: &'a PointStore, axis: usize) -> Self {
        AxisOrder { points, axis }
    }
}

impl KeyOrder<usize> for AxisOrder<'_> {
    type Probe = f64;

    #[inline]
    fn cmp_keys(&self, a: usize, b: usize) -> Ordering {
        OrderedFloat(self.points.value(a, self.axis))
            .cmp(&OrderedFloat(self.points.value(b, self.axis)))
    }

    #[inline]
    fn cmp_probe(&self, key: usize, probe: &f64) -> Ordering {
        OrderedFloat(self.points.value(key, self.axis)).cmp(&OrderedFloat(*probe))
    }
}

/// Orders point indices by their coordinate tuple (components `1..`), lexicographically.
///
/// Probes are full points; their mass component is ignored.
#[derive(Debug, Clone, Copy)]
pub struct CoordinateOrder<'a> {
    points: &'a PointStore,
}

impl<'a> CoordinateOrder<'a> {
    pub fn new(points: &'a PointStore) -> Self {
        CoordinateOrder { points }
    }
}

#[inline]
fn cmp_coordinates(a: &[f64], b: &[f64]) -> Ordering {
    for (x, y) in a.iter().zip(b).skip(1) {
        match OrderedFloat(*x).cmp(&OrderedFloat(*y)) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

impl KeyOrder<usize> for CoordinateOrder<'_> {
    type Probe = [f64];

    #[inline]
    fn cmp_keys(&self, a: usize, b: usize) -> Ordering {
        cmp_coordinates(self.points.get(a), self.points.get(b))
    }

    #[inline]
    fn cmp_probe(&self, key: usize, probe: &[f64]) -> Ordering {
        cmp_coordinates(self.points.get(key), probe)
    }
}

/// A per-axis index over the shared point store.
#[derive(Debug, Clone)]
pub struct Dimension {
    axis: usize,
    tree: SortTree<usize>,
}

impl Dimension {
    pub fn new(axis: usize, capacity: usize) -> Self {
        Dimension {
            axis,
            tree: SortTree::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn axis(&self) -> usize {
        self.axis
    }

    #[inline]
    pub fn tree(&self) -> &SortTree<usize> {
        &self.tree
    }

    #[inline]
    pub fn order<'a>(&self, points: &'a PointStore) -> AxisOrder<'a> {
        AxisOrder::new(points, self.axis)
    }

    /// Insert `index`, or re-seat it after its component changed.
    #[inline]
    pub fn update(&mut self, index: usize, points: &PointStore) {
        let order = AxisOrder::new(points, self.axis);
        self.tree.update(index, &order);
    }

    #[inline]
    pub fn remove(&mut self, index: usize) {
        self.tree.remove(index);
    }

    /// Index every live point from scratch.
    pub fn rebuild(&mut self, points: &PointStore) {
        self.tree.clear();
        let order = AxisOrder::new(points, self.axis);
        for i in 0..points.len() {
            self.tree.update(i, &order);
        }
    }

    /// Whether `index` is this axis' first or last key.
    #[inline]
    pub fn is_bounds(&self, index: usize) -> bool {
        self.tree.first_key() == Some(index) || self.tree.last_key() == Some(index)
    }

    /// `(min, max)` of this axis over live points.
    pub fn extent(&self, points: &PointStore) -> Option<(f64, f64)> {
        let lo = self.tree.first_key()?;
        let hi = self.tree.last_key()?;
        Some((points.value(lo, self.axis), points.value(hi, self.axis)))
    }

    /// Fractional weights of the points whose spread overlaps `[lo, hi]`, in axis order.
    pub fn range(
        &self,
        lo: f64,
        hi: f64,
        points: &PointStore,
        shape: SpreadShape,
        overhang: f64,
    ) -> Vec<(usize, f64)> {
        let tree = &self.tree;
        let order = self.order(points);
        let (Some(first), Some(last)) = (tree.first_key(), tree.last_key()) else {
            return Vec::new();
        };

        if tree.node_count() == 1 {
            return tree
                .iter()
                .map(|k| {
                    let v = points.value(k, self.axis);
                    (k, if v < lo || v > hi { 0.0 } else { 1.0 })
                })
                .collect();
        }

        let start = tree
            .far_key_left_of_value(&lo, false, &order)
            .unwrap_or(first);
        let end = tree
            .far_key_right_of_value(&hi, false, &order)
            .unwrap_or(last);

        let mut weights = Vec::new();
        let mut step: Option<(f64, f64)> = None;
        for key in tree.keys_from_key(start) {
            let b = points.value(key, self.axis);
            let w = match step {
                Some((value, w)) if value == b => w,
                _ => {
                    let w = self.step_weight(key, b, lo, hi, points, shape, overhang);
                    step = Some((b, w));
                    w
                }
            };
            weights.push((key, w));
            if key == end {
                break;
            }
        }
        weights
    }

    #[allow(clippy::too_many_arguments)]
    fn step_weight(
        &self,
        key: usize,
        b: f64,
        lo: f64,
        hi: f64,
        points: &PointStore,
        shape: SpreadShape,
        overhang: f64,
    ) -> f64 {
        let prev = self
            .tree
            .key_with_previous_value(key)
            .map(|k| points.value(k, self.axis));
        let next = self
            .tree
            .key_with_next_value(key)
            .map(|k| points.value(k, self.axis));
        let (a, c) = match (prev, next) {
            (Some(a), Some(c)) => (a, c),
            (None, Some(c)) => (b - (c - b) * overhang, c),
            (Some(a), None) => (a, b + (b - a) * overhang),
            (None, None) => {
                return if b < lo || b > hi { 0.0 } else { 1.0 };
            }
        };
        shape.fraction(lo, hi, a, b, c)
    }
}
