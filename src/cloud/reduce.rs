//! Capacity reduction.
//!
//! Frees one slot of a full cloud:
//! 1. **Victim**: the interior point (boundary on no coordinate axis) whose
//!    removal disturbs the per-axis cumulative mass curves least. Per axis the
//!    point's mass is split onto its neighbours so the first moment is kept,
//!    and the cost is the area between the curves before and after.
//! 2. **Removal**: the victim's slot is swap-removed.
//! 3. **Redistribution**: every remaining interior point receives a share of
//!    the victim's mass proportional to `mass / d²` and moves towards the
//!    victim by the mass-weighted blend. A blend landing on another point's
//!    coordinates merges the two and frees another slot.
//!
//! Boundary points never move, so every axis keeps its extent.

use tracing::{debug, warn};

use crate::cloud::dimension::CoordinateOrder;
use crate::cloud::precision::{round_point, round_to_precision};
use crate::cloud::store::{distance2, Cloud};
use crate::{CloudError, CloudResult};

/// Signed area of a closed polygon (shoelace formula).
#[inline]
fn signed_area(corners: &[(f64, f64)]) -> f64 {
    let n = corners.len();
    let mut twice = 0.0;
    for i in 0..n {
        let (x0, y0) = corners[i];
        let (x1, y1) = corners[(i + 1) % n];
        twice += x0 * y1 - x1 * y0;
    }
    twice / 2.0
}

/// Area between the cumulative mass curves on one axis when mass `m` at `b`
/// is moved onto its neighbours at `a` and `c`, keeping the first moment.
///
/// Zero when both neighbours share one value.
fn displacement_area(a: f64, b: f64, c: f64, m: f64) -> f64 {
    let span = c - a;
    if span <= 0.0 {
        return 0.0;
    }
    let wl = m * (c - b) / span;
    let wr = m * (b - a) / span;
    let left = signed_area(&[(a, 0.0), (a, wl), (b, wl), (b, 0.0)]);
    let right = signed_area(&[(b, 0.0), (b, -wr), (c, -wr), (c, 0.0)]);
    left.abs() + right.abs()
}

impl Cloud {
    /// Free at least one slot. The cloud must hold an interior point.
    pub(super) fn reduce(&mut self) -> CloudResult<()> {
        let (victim, cost) = self.cheapest_interior().ok_or(CloudError::Invariant {
            what: "full cloud without an interior point",
        })?;
        let removed = self.points.get(victim).to_vec();
        debug!(victim, cost, mass = removed[0], "reducing");

        self.remove_slot(victim);
        self.distribute(&removed)?;
        self.displacement += removed[0];
        Ok(())
    }

    /// Interior point with the smallest removal cost; lowest slot on ties.
    fn cheapest_interior(&self) -> Option<(usize, f64)> {
        let spans = self.axis_spans();
        let mut best: Option<(usize, f64)> = None;
        for i in 0..self.points.len() {
            if self.is_boundary(i) {
                continue;
            }
            let cost = self.removal_cost(i, &spans);
            if best.map_or(true, |(_, b)| cost < b) {
                best = Some((i, cost));
            }
        }
        best
    }

    /// Sum over coordinate axes of the normalised [`displacement_area`].
    fn removal_cost(&self, index: usize, spans: &[f64]) -> f64 {
        let m = if self.total_volume > 0.0 {
            self.points.mass(index) / self.total_volume
        } else {
            0.0
        };
        let mut cost = 0.0;
        for dim in self.dimensions.iter().skip(1) {
            let axis = dim.axis();
            let span = spans[axis];
            if span == 0.0 {
                continue;
            }
            let tree = dim.tree();
            let (Some(l), Some(r)) = (tree.key_left_of_key(index), tree.key_right_of_key(index))
            else {
                continue;
            };
            let a = self.points.value(l, axis) / span;
            let b = self.points.value(index, axis) / span;
            let c = self.points.value(r, axis) / span;
            cost += displacement_area(a, b, c, m);
        }
        if cost.is_finite() {
            cost
        } else {
            f64::INFINITY
        }
    }

    /// Shares of the victim's mass per live slot; boundary slots get none.
    fn redistribution_weights(&self, victim: &[f64]) -> CloudResult<Vec<f64>> {
        let n = self.points.len();
        let spans = self.axis_spans();
        let recipients: Vec<bool> = (0..n).map(|i| !self.is_boundary(i)).collect();
        let count = recipients.iter().filter(|&&r| r).count();
        if count == 0 {
            return Err(CloudError::Invariant {
                what: "no interior point to receive mass",
            });
        }

        let mut weights = vec![0.0; n];
        let mut hits = 0usize;
        for i in 0..n {
            if !recipients[i] {
                continue;
            }
            let d2 = distance2(self.points.get(i), victim, &spans);
            if d2 == 0.0 {
                hits += 1;
                weights[i] = f64::INFINITY;
            } else {
                weights[i] = self.points.mass(i) / d2;
            }
        }

        if hits > 0 {
            let share = 1.0 / hits as f64;
            for w in &mut weights {
                *w = if w.is_infinite() { share } else { 0.0 };
            }
            return Ok(weights);
        }

        let sum: f64 = weights.iter().sum();
        if sum > 0.0 && sum.is_finite() {
            for w in &mut weights {
                *w /= sum;
            }
        } else {
            warn!(sum, recipients = count, "degenerate redistribution weights; spreading evenly");
            let share = 1.0 / count as f64;
            for (w, &r) in weights.iter_mut().zip(&recipients) {
                *w = if r { share } else { 0.0 };
            }
        }
        Ok(weights)
    }

    /// Blend `victim`'s mass into the remaining interior points.
    fn distribute(&mut self, victim: &[f64]) -> CloudResult<()> {
        let victim_mass = victim[0];
        if victim_mass == 0.0 {
            return Ok(());
        }
        let mut weights = self.redistribution_weights(victim)?;

        let mut i = 0;
        while i < self.points.len() {
            let share = victim_mass * weights[i];
            if share <= 0.0 {
                i += 1;
                continue;
            }

            let p = self.points.get(i);
            let total = p[0] + share;
            // Each component stays between its two inputs.
            let t = share / total;
            let mut blended: Vec<f64> = p
                .iter()
                .zip(victim)
                .map(|(pv, vv)| pv + (vv - pv) * t)
                .collect();
            blended[0] = total;
            round_point(&mut blended);

            let order = CoordinateOrder::new(&self.points);
            let twin = self
                .exact
                .keys_at(blended.as_slice(), &order)
                .iter()
                .copied()
                .find(|&k| k != i);

            match twin {
                Some(t) => {
                    debug!(from = i, into = t, "blend collided; merging");
                    let merged = round_to_precision(self.points.mass(t) + blended[0]);
                    self.points.get_mut(t)[0] = merged;
                    self.dimensions[0].update(t, &self.points);
                    // Slot i now holds the former last point; visit it next.
                    if let Some(moved) = self.remove_slot(i) {
                        weights[i] = weights[moved];
                    }
                    weights.truncate(self.points.len());
                }
                None => {
                    self.points.get_mut(i).copy_from_slice(&blended);
                    self.index_point(i);
                    i += 1;
                }
            }
        }
        Ok(())
    }
}
