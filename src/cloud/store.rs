// src/cloud/store.rs
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use rayon::prelude::*;
use tracing::trace;

use crate::cloud::dimension::{CoordinateOrder, Dimension};
use crate::cloud::points::PointStore;
use crate::cloud::precision::{round_point, round_to_precision};
use crate::cloud::selection::Selection;
use crate::cloud::settings::{CloudBuilder, CloudSettings};
use crate::cloud::sort_tree::SortTree;
use crate::{CloudError, CloudResult};

/// Crossover for evaluating sample batches with Rayon.
const PAR_MIN: usize = 1_024;

/// Bounded, weighted point cloud.
///
/// - Component 0 of every point is its mass, components `1..` its coordinates.
/// - One [`Dimension`] per component (the mass axis included) keeps live slots
///   ordered by that component; an extra tree orders them by coordinate tuple
///   so identical coordinates are found in `O(log n)`.
/// - At `max_points` a new observation first frees a slot by folding the
///   cheapest interior point into its neighbours (see `reduce`).
#[derive(Debug, Clone)]
pub struct Cloud {
    pub(super) points: PointStore,
    pub(super) dimensions: Vec<Dimension>,
    pub(super) exact: SortTree<usize>,
    pub(super) total_volume: f64,
    pub(super) displacement: f64,
    pub(super) settings: CloudSettings,
}

impl Cloud {
    /// Empty cloud with only the mass axis and default settings otherwise.
    pub fn new(max_points: usize) -> CloudResult<Self> {
        Self::with_settings(CloudSettings {
            max_points,
            ..CloudSettings::default()
        })
    }

    pub fn with_settings(settings: CloudSettings) -> CloudResult<Self> {
        settings.validate()?;
        let n = settings.max_points;
        Ok(Cloud {
            points: PointStore::new(n, 1),
            dimensions: vec![Dimension::new(0, n)],
            exact: SortTree::with_capacity(n),
            total_volume: 0.0,
            displacement: 0.0,
            settings,
        })
    }

    /// Entry point for fluent construction.
    #[inline]
    pub fn builder() -> CloudBuilder {
        CloudBuilder::new()
    }

    /* ===========================
     * Accessors
     * =========================== */

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn max_points(&self) -> usize {
        self.settings.max_points
    }

    /// Components per point, mass included.
    #[inline]
    pub fn dimension_count(&self) -> usize {
        self.dimensions.len()
    }

    #[inline]
    pub fn dimension(&self, n: usize) -> Option<&Dimension> {
        self.dimensions.get(n)
    }

    /// `(min, max)` of component `axis` over live points.
    pub fn extent(&self, axis: usize) -> Option<(f64, f64)> {
        self.dimensions.get(axis)?.extent(&self.points)
    }

    /// Sum of every mass ever inserted.
    #[inline]
    pub fn total_volume(&self) -> f64 {
        self.total_volume
    }

    /// Sum of every mass removed from its place by reduction.
    #[inline]
    pub fn displacement(&self) -> f64 {
        self.displacement
    }

    /// Sum of the masses currently stored.
    pub fn total_mass(&self) -> f64 {
        self.points.iter().map(|p| p[0]).sum()
    }

    #[inline]
    pub fn settings(&self) -> &CloudSettings {
        &self.settings
    }

    /// Live points in slot order. Slot order is not stable across inserts.
    pub fn points(&self) -> impl ExactSizeIterator<Item = &[f64]> + '_ {
        self.points.iter()
    }

    pub fn to_vec(&self) -> Vec<Vec<f64>> {
        self.points.to_vec()
    }

    /* ===========================
     * Mutation
     * =========================== */

    /// Append a coordinate axis and return its index.
    ///
    /// Stored points get a 0 in the new component.
    pub fn add_dimension(&mut self) -> CloudResult<usize> {
        let count = self.dimensions.len() + 1;
        if self.settings.max_points < count * 2 {
            return Err(CloudError::InsufficientCapacity {
                max_points: self.settings.max_points,
                dimensions: count,
            });
        }
        self.points.widen();
        let axis = self.dimensions.len();
        let mut dim = Dimension::new(axis, self.settings.max_points);
        dim.rebuild(&self.points);
        self.dimensions.push(dim);
        self.exact.rebuild(&CoordinateOrder::new(&self.points));
        trace!(axis, points = self.points.len(), "added dimension");
        Ok(axis)
    }

    /// Add one observation `[mass, coords...]`.
    ///
    /// Identical coordinates accumulate mass in place. A full cloud reduces
    /// first, so `len() <= max_points()` always holds.
    pub fn insert(&mut self, point: &[f64]) -> CloudResult<()> {
        self.check_vector(point, "observation")?;
        if point[0] < 0.0 {
            return Err(CloudError::NegativeMass { mass: point[0] });
        }
        let mut p = point.to_vec();
        round_point(&mut p);
        self.total_volume += p[0];

        if let Some(i) = self.find_exact(&p) {
            self.add_mass(i, p[0]);
            return Ok(());
        }
        if self.points.is_full() {
            self.reduce()?;
            // Reduction may have blended a point onto these coordinates.
            if let Some(i) = self.find_exact(&p) {
                self.add_mass(i, p[0]);
                return Ok(());
            }
        }
        let index = self.points.push(&p).ok_or(CloudError::Invariant {
            what: "no free slot after reduction",
        })?;
        self.index_point(index);
        Ok(())
    }

    /// Slot holding exactly the coordinates of `point` (mass ignored).
    pub(super) fn find_exact(&self, point: &[f64]) -> Option<usize> {
        let order = CoordinateOrder::new(&self.points);
        self.exact.keys_at(point, &order).first().copied()
    }

    pub(super) fn add_mass(&mut self, index: usize, mass: f64) {
        let m = round_to_precision(self.points.mass(index) + mass);
        self.points.get_mut(index)[0] = m;
        self.dimensions[0].update(index, &self.points);
    }

    /// (Re-)seat slot `index` in every tree.
    pub(super) fn index_point(&mut self, index: usize) {
        for dim in &mut self.dimensions {
            dim.update(index, &self.points);
        }
        self.exact
            .update(index, &CoordinateOrder::new(&self.points));
    }

    fn unindex_point(&mut self, index: usize) {
        for dim in &mut self.dimensions {
            dim.remove(index);
        }
        self.exact.remove(index);
    }

    /// Vacate `index`, moving the last point into it and re-keying every tree.
    ///
    /// Returns the slot the moved point came from, as [`PointStore::swap_remove`].
    pub(super) fn remove_slot(&mut self, index: usize) -> Option<usize> {
        self.unindex_point(index);
        let moved = self.points.swap_remove(index)?;
        self.unindex_point(moved);
        self.index_point(index);
        Some(moved)
    }

    /* ===========================
     * Queries
     * =========================== */

    /// Fraction of every point's mass inside a hyper-rectangle.
    ///
    /// `intervals[d]` lists `(lo, hi)` pairs on dimension `d` (0 = mass); a
    /// missing or empty list leaves `d` unconstrained. Weights of several
    /// pairs on one dimension add up; weights across dimensions multiply, and
    /// a point must be selected on every constrained dimension to be kept.
    /// With nothing constrained the selection is empty.
    pub fn range_query(&self, intervals: &[Vec<(f64, f64)>]) -> CloudResult<Selection> {
        if intervals.len() > self.dimensions.len() {
            return Err(CloudError::DimensionMismatch {
                context: "range query",
                expected: self.dimensions.len(),
                got: intervals.len(),
            });
        }
        for (dimension, ranges) in intervals.iter().enumerate() {
            for &(lo, hi) in ranges {
                if !lo.is_finite() || !hi.is_finite() || lo > hi {
                    return Err(CloudError::InvalidInterval { dimension, lo, hi });
                }
            }
        }

        let shape = self.settings.shape;
        let overhang = self.settings.overhang;
        let mut selected: Option<Vec<(usize, f64)>> = None;

        for (d, ranges) in intervals.iter().enumerate() {
            if ranges.is_empty() {
                continue;
            }
            let dim = &self.dimensions[d];
            let mut order = Vec::new();
            let mut weights: HashMap<usize, f64> = HashMap::new();
            for &(lo, hi) in ranges {
                for (k, w) in dim.range(lo, hi, &self.points, shape, overhang) {
                    match weights.entry(k) {
                        Entry::Occupied(mut e) => *e.get_mut() += w,
                        Entry::Vacant(e) => {
                            order.push(k);
                            e.insert(w);
                        }
                    }
                }
            }
            selected = Some(match selected {
                None => order
                    .into_iter()
                    .filter_map(|k| weights.get(&k).map(|&w| (k, w)))
                    .collect(),
                Some(prev) => prev
                    .into_iter()
                    .filter_map(|(k, w)| weights.get(&k).map(|&v| (k, w * v)))
                    .collect(),
            });
        }

        Ok(selected
            .unwrap_or_default()
            .into_iter()
            .map(|(k, w)| (self.points.get(k).to_vec(), w))
            .collect())
    }

    /// Inverse-square-distance interpolation of the full point vector at `query`.
    ///
    /// `query` has one component per dimension; component 0 is ignored.
    /// An empty cloud yields NaN in every component.
    pub fn sample(&self, query: &[f64]) -> CloudResult<Vec<f64>> {
        self.check_vector(query, "sample query")?;
        Ok(self.sample_unchecked(query))
    }

    /// The weights [`sample`](Self::sample) blends with, as a selection of every live point.
    pub fn sample_selection(&self, query: &[f64]) -> CloudResult<Selection> {
        self.check_vector(query, "sample query")?;
        let weights = self.sample_weights(query);
        Ok(self
            .points
            .iter()
            .zip(weights)
            .map(|(p, w)| (p.to_vec(), w))
            .collect())
    }

    /// [`sample`](Self::sample) over a batch; large batches run on the Rayon pool.
    pub fn sample_many(&self, queries: &[Vec<f64>]) -> CloudResult<Vec<Vec<f64>>> {
        for q in queries {
            self.check_vector(q, "sample query")?;
        }
        if queries.len() >= PAR_MIN {
            Ok(queries
                .par_iter()
                .with_min_len(64)
                .map(|q| self.sample_unchecked(q))
                .collect())
        } else {
            Ok(queries.iter().map(|q| self.sample_unchecked(q)).collect())
        }
    }

    fn sample_unchecked(&self, query: &[f64]) -> Vec<f64> {
        let width = self.points.width();
        if self.points.is_empty() {
            return vec![f64::NAN; width];
        }
        let weights = self.sample_weights(query);
        let mut out = vec![0.0; width];
        for (p, w) in self.points.iter().zip(&weights) {
            for (o, v) in out.iter_mut().zip(p) {
                *o += v * w;
            }
        }
        out
    }

    /// `1 / d²` per live point, normalised to sum to 1.
    ///
    /// Points at distance 0 split the whole weight evenly.
    fn sample_weights(&self, query: &[f64]) -> Vec<f64> {
        let spans = self.axis_spans();
        let mut weights: Vec<f64> = self
            .points
            .iter()
            .map(|p| 1.0 / distance2(p, query, &spans))
            .collect();

        let hits = weights.iter().filter(|w| !w.is_finite()).count();
        if hits > 0 {
            let share = 1.0 / hits as f64;
            for w in &mut weights {
                *w = if w.is_finite() { 0.0 } else { share };
            }
        } else {
            let sum: f64 = weights.iter().sum();
            for w in &mut weights {
                *w /= sum;
            }
        }
        weights
    }

    /// Current extent of every axis; index 0 (mass) is always 0.
    pub(super) fn axis_spans(&self) -> Vec<f64> {
        let mut spans = vec![0.0; self.dimensions.len()];
        for dim in self.dimensions.iter().skip(1) {
            if let Some((lo, hi)) = dim.extent(&self.points) {
                spans[dim.axis()] = hi - lo;
            }
        }
        spans
    }

    /// Whether `index` is the min or max of any coordinate axis.
    pub(super) fn is_boundary(&self, index: usize) -> bool {
        self.dimensions.iter().skip(1).any(|d| d.is_bounds(index))
    }

    fn check_vector(&self, v: &[f64], context: &'static str) -> CloudResult<()> {
        let width = self.points.width();
        if v.len() != width {
            return Err(CloudError::DimensionMismatch {
                context,
                expected: width,
                got: v.len(),
            });
        }
        if v.iter().any(|x| !x.is_finite()) {
            return Err(CloudError::NonFiniteInput { context });
        }
        Ok(())
    }

    /* ===========================
     * Diagnostics
     * =========================== */

    /// Verify every tree against the point store.
    ///
    /// Each tree must index exactly the live slots, in order, and no two live
    /// points may share coordinates.
    pub fn check_invariants(&self) -> CloudResult<()> {
        let n = self.points.len();
        if n > self.settings.max_points {
            return Err(CloudError::Invariant {
                what: "more points than max_points",
            });
        }
        for dim in &self.dimensions {
            let tree = dim.tree();
            tree.check_structure(&dim.order(&self.points))
                .map_err(|what| CloudError::Invariant { what })?;
            if tree.len() != n || (0..n).any(|i| !tree.contains(i)) {
                return Err(CloudError::Invariant {
                    what: "dimension tree does not index the live slots",
                });
            }
        }
        self.exact
            .check_structure(&CoordinateOrder::new(&self.points))
            .map_err(|what| CloudError::Invariant { what })?;
        if self.exact.len() != n || self.exact.node_count() != n {
            return Err(CloudError::Invariant {
                what: "duplicate coordinates or stale exact-match tree",
            });
        }
        Ok(())
    }
}

/// Squared distance over coordinate axes, each scaled by its span. Zero spans are skipped.
#[inline]
pub(super) fn distance2(a: &[f64], b: &[f64], spans: &[f64]) -> f64 {
    let mut d2 = 0.0;
    for i in 1..spans.len() {
        let span = spans[i];
        if span == 0.0 {
            continue;
        }
        let r = (a[i] - b[i]) / span;
        d2 += r * r;
    }
    d2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::test_helpers::{assert_close, assert_rel_close};

    fn cloud_1d(max_points: usize) -> Cloud {
        Cloud::builder()
            .max_points(max_points)
            .dimensions(1)
            .build()
            .expect("valid cloud")
    }

    #[test]
    fn new_cloud_has_only_the_mass_axis() {
        let cloud = Cloud::new(4).expect("valid");
        assert_eq!(cloud.dimension_count(), 1);
        assert!(cloud.is_empty());
        assert_eq!(cloud.total_volume(), 0.0);
        assert_eq!(cloud.displacement(), 0.0);
    }

    #[test]
    fn add_dimension_checks_capacity_after_growth() {
        let mut cloud = Cloud::new(4).expect("valid");
        assert_eq!(cloud.add_dimension(), Ok(1));
        assert_eq!(
            cloud.add_dimension(),
            Err(CloudError::InsufficientCapacity {
                max_points: 4,
                dimensions: 3
            })
        );
        assert_eq!(cloud.dimension_count(), 2);
    }

    #[test]
    fn add_dimension_zero_extends_points() {
        let mut cloud = Cloud::new(8).expect("valid");
        cloud.add_dimension().expect("fits");
        cloud.insert(&[1.0, 3.0]).expect("insert");
        cloud.insert(&[2.0, 5.0]).expect("insert");
        cloud.add_dimension().expect("fits");
        assert_eq!(cloud.to_vec(), vec![vec![1.0, 3.0, 0.0], vec![2.0, 5.0, 0.0]]);
        cloud.insert(&[1.0, 3.0, 0.0]).expect("insert");
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.to_vec()[0][0], 2.0);
        cloud.check_invariants().expect("consistent");
    }

    #[test]
    fn identical_coordinates_accumulate_mass() {
        let mut cloud = cloud_1d(4);
        cloud.insert(&[1.0, 2.0]).expect("insert");
        cloud.insert(&[2.5, 2.0]).expect("insert");
        assert_eq!(cloud.len(), 1);
        assert_eq!(cloud.to_vec(), vec![vec![3.5, 2.0]]);
        assert_eq!(cloud.total_volume(), 3.5);
        cloud.check_invariants().expect("consistent");
    }

    #[test]
    fn rejects_malformed_observations() {
        let mut cloud = cloud_1d(4);
        assert_eq!(
            cloud.insert(&[1.0]),
            Err(CloudError::DimensionMismatch {
                context: "observation",
                expected: 2,
                got: 1
            })
        );
        assert!(matches!(
            cloud.insert(&[1.0, f64::NAN]),
            Err(CloudError::NonFiniteInput { .. })
        ));
        assert_eq!(
            cloud.insert(&[-1.0, 0.0]),
            Err(CloudError::NegativeMass { mass: -1.0 })
        );
        assert!(cloud.is_empty());
        assert_eq!(cloud.total_volume(), 0.0);
    }

    #[test]
    fn inserts_are_rounded() {
        let mut cloud = cloud_1d(4);
        cloud.insert(&[1.0, 0.1 + 0.2]).expect("insert");
        cloud.insert(&[1.0, 0.3]).expect("insert");
        assert_eq!(cloud.len(), 1);
    }

    #[test]
    fn four_point_range_covers_everything() {
        let mut cloud = cloud_1d(10);
        for x in [0.0, 1.0, 2.0, 3.0] {
            cloud.insert(&[1.0, x]).expect("insert");
        }
        let sel = cloud
            .range_query(&[vec![], vec![(-10.0, 10.0)]])
            .expect("query");
        assert_eq!(sel.len(), 4);
        assert_close("mass", 4.0, sel.mass(), 1e-12);
    }

    #[test]
    fn unconstrained_query_is_empty() {
        let mut cloud = cloud_1d(10);
        cloud.insert(&[1.0, 0.0]).expect("insert");
        assert!(cloud.range_query(&[]).expect("query").is_empty());
        assert!(cloud
            .range_query(&[vec![], vec![]])
            .expect("query")
            .is_empty());
    }

    #[test]
    fn range_query_validates_intervals() {
        let cloud = cloud_1d(10);
        assert_eq!(
            cloud.range_query(&[vec![], vec![(2.0, 1.0)]]),
            Err(CloudError::InvalidInterval {
                dimension: 1,
                lo: 2.0,
                hi: 1.0
            })
        );
        assert!(cloud
            .range_query(&[vec![], vec![(0.0, f64::INFINITY)]])
            .is_err());
        assert!(matches!(
            cloud.range_query(&[vec![], vec![], vec![(0.0, 1.0)]]),
            Err(CloudError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn split_intervals_add_up_on_one_axis() {
        let mut cloud = cloud_1d(10);
        for x in [0.0, 1.0, 2.0, 3.0, 7.0] {
            cloud.insert(&[2.0, x]).expect("insert");
        }
        let whole = cloud
            .range_query(&[vec![], vec![(0.5, 4.0)]])
            .expect("query");
        let split = cloud
            .range_query(&[vec![], vec![(0.5, 2.2), (2.2, 4.0)]])
            .expect("query");
        assert_rel_close("mass", whole.mass(), split.mass(), 1e-12);
    }

    #[test]
    fn axes_multiply_and_intersect() {
        let mut cloud = Cloud::builder()
            .max_points(16)
            .dimensions(2)
            .build()
            .expect("valid");
        for x in 0..3 {
            for y in 0..3 {
                cloud
                    .insert(&[1.0, x as f64, y as f64])
                    .expect("insert");
            }
        }
        let everything = vec![(-10.0, 10.0)];
        let sel = cloud
            .range_query(&[vec![], everything.clone(), everything.clone()])
            .expect("query");
        assert_close("all", 9.0, sel.mass(), 1e-12);

        // x far left only: y selects everything, x selects nothing.
        let sel = cloud
            .range_query(&[vec![], vec![(-10.0, -9.0)], everything])
            .expect("query");
        assert_close("none", 0.0, sel.mass(), 1e-12);
    }

    #[test]
    fn sample_hits_and_interpolates() {
        let mut cloud = cloud_1d(10);
        cloud.insert(&[2.0, 0.0]).expect("insert");
        cloud.insert(&[4.0, 10.0]).expect("insert");

        assert_eq!(cloud.sample(&[0.0, 10.0]).expect("sample"), vec![4.0, 10.0]);

        let mid = cloud.sample(&[0.0, 5.0]).expect("sample");
        assert_close("mass", 3.0, mid[0], 1e-12);
        assert_close("x", 5.0, mid[1], 1e-12);

        let near = cloud.sample(&[0.0, 1.0]).expect("sample");
        assert!(near[0] < 2.1, "closer to the light point: {}", near[0]);

        let weights = cloud.sample_selection(&[0.0, 1.0]).expect("weights");
        let total: f64 = weights.iter().map(|(_, w)| w).sum();
        assert_close("weights", 1.0, total, 1e-12);
    }

    #[test]
    fn sample_of_empty_cloud_is_nan() {
        let cloud = cloud_1d(4);
        let s = cloud.sample(&[0.0, 1.0]).expect("sample");
        assert!(s.iter().all(|v| v.is_nan()));
        assert!(cloud.sample(&[0.0]).is_err());
    }

    #[test]
    fn sample_many_matches_sample() {
        let mut cloud = cloud_1d(16);
        for x in 0..10 {
            cloud.insert(&[1.0 + x as f64, x as f64]).expect("insert");
        }
        let queries: Vec<Vec<f64>> = (0..PAR_MIN + 3)
            .map(|i| vec![0.0, (i % 97) as f64 / 10.0])
            .collect();
        let batch = cloud.sample_many(&queries).expect("batch");
        assert_eq!(batch.len(), queries.len());
        for (q, got) in queries.iter().zip(&batch).step_by(101) {
            assert_eq!(&cloud.sample(q).expect("sample"), got);
        }
    }

    #[test]
    fn remove_slot_rekeys_the_moved_point() {
        let mut cloud = cloud_1d(10);
        for x in [5.0, 1.0, 9.0, 3.0] {
            cloud.insert(&[1.0, x]).expect("insert");
        }
        assert_eq!(cloud.remove_slot(0), Some(3));
        assert_eq!(cloud.to_vec(), vec![vec![1.0, 3.0], vec![1.0, 1.0], vec![1.0, 9.0]]);
        assert_eq!(cloud.find_exact(&[0.0, 3.0]), Some(0));
        assert_eq!(cloud.find_exact(&[0.0, 5.0]), None);
        assert_eq!(cloud.remove_slot(2), None);
        cloud.check_invariants().expect("consistent");
    }
}
