//! Weighted subsets of a cloud returned by range queries and sampling.

/// Points paired with the fraction of their mass a query selected.
///
/// Points are owned copies, so a selection outlives later inserts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Selection {
    entries: Vec<(Vec<f64>, f64)>,
}

impl Selection {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn from_entries(entries: Vec<(Vec<f64>, f64)>) -> Self {
        Selection { entries }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&[f64], f64)> + '_ {
        self.entries.iter().map(|(p, w)| (p.as_slice(), *w))
    }

    #[inline]
    pub fn entries(&self) -> &[(Vec<f64>, f64)] {
        &self.entries
    }

    #[inline]
    pub fn into_entries(self) -> Vec<(Vec<f64>, f64)> {
        self.entries
    }

    /// Weight of the entry whose point equals `point` exactly.
    pub fn weight_of(&self, point: &[f64]) -> Option<f64> {
        self.entries
            .iter()
            .find(|(p, _)| p.as_slice() == point)
            .map(|(_, w)| *w)
    }

    /// Selected mass: `Σ point[0] · weight`.
    pub fn mass(&self) -> f64 {
        self.entries.iter().map(|(p, w)| p[0] * w).sum()
    }

    /// Mass-weighted mean of components `1..dimensions`, given the selection's `mass`.
    ///
    /// Component 0 is left at 0, as is everything else when `mass` is 0.
    pub fn centroid(&self, mass: f64, dimensions: usize) -> Vec<f64> {
        let mut out = vec![0.0; dimensions];
        if mass == 0.0 {
            return out;
        }
        for (p, w) in &self.entries {
            for (i, slot) in out.iter_mut().enumerate().skip(1) {
                *slot += p[i] * p[0] * w / mass;
            }
        }
        out
    }

    /// Multiply every weight by `factor`.
    pub fn scale(&mut self, factor: f64) {
        for (_, w) in &mut self.entries {
            *w *= factor;
        }
    }

    /// Signed symmetric relative change of this selection against `expected`.
    ///
    /// Returns `[chg(mass), chg(centroid_1), ..., chg(centroid_{dimensions-1})]`.
    pub fn relative_change(&self, expected: &Selection, dimensions: usize) -> Vec<f64> {
        let got_mass = self.mass();
        let want_mass = expected.mass();
        let got = self.centroid(got_mass, dimensions);
        let want = expected.centroid(want_mass, dimensions);

        let mut out = Vec::with_capacity(dimensions);
        out.push(symmetric_change(got_mass, want_mass));
        for i in 1..dimensions {
            out.push(symmetric_change(got[i], want[i]));
        }
        out
    }

    /// [`relative_change`](Self::relative_change) without the sign.
    pub fn relative_error(&self, expected: &Selection, dimensions: usize) -> Vec<f64> {
        self.relative_change(expected, dimensions)
            .into_iter()
            .map(f64::abs)
            .collect()
    }
}

/// `2 (m - e) / (|m| + |e|)`, 0 when both are 0.
#[inline]
pub fn symmetric_change(measured: f64, expected: f64) -> f64 {
    let denom = measured.abs() + expected.abs();
    if denom == 0.0 {
        return 0.0;
    }
    2.0 * (measured - expected) / denom
}

/// `2 |m - e| / (|m| + |e|)`, 0 when both are 0.
#[inline]
pub fn symmetric_error(measured: f64, expected: f64) -> f64 {
    symmetric_change(measured, expected).abs()
}

impl FromIterator<(Vec<f64>, f64)> for Selection {
    fn from_iter<I: IntoIterator<Item = (Vec<f64>, f64)>>(iter: I) -> Self {
        Selection {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Selection {
    type Item = (Vec<f64>, f64);
    type IntoIter = std::vec::IntoIter<(Vec<f64>, f64)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::test_helpers::assert_close;

    fn sample() -> Selection {
        Selection::from_entries(vec![
            (vec![2.0, 1.0, 10.0], 1.0),
            (vec![4.0, 4.0, 20.0], 0.5),
        ])
    }

    #[test]
    fn mass_and_centroid() {
        let s = sample();
        assert_close("mass", 4.0, s.mass(), 1e-12);
        let c = s.centroid(s.mass(), 3);
        assert_eq!(c[0], 0.0);
        assert_close("x", 2.5, c[1], 1e-12);
        assert_close("y", 15.0, c[2], 1e-12);
    }

    #[test]
    fn scale_and_lookup() {
        let mut s = sample();
        s.scale(2.0);
        assert_eq!(s.weight_of(&[4.0, 4.0, 20.0]), Some(1.0));
        assert_eq!(s.weight_of(&[4.0, 4.0, 21.0]), None);
        assert_close("mass", 8.0, s.mass(), 1e-12);
    }

    #[test]
    fn relative_error_is_symmetric_and_zero_for_equal() {
        let a = sample();
        assert_eq!(a.relative_error(&a, 3), vec![0.0, 0.0, 0.0]);

        let mut b = sample();
        b.scale(0.5);
        let e = a.relative_error(&b, 3);
        // mass 4 vs 2
        assert_close("mass err", 2.0 / 3.0, e[0], 1e-12);
        // uniform scaling leaves the centroid alone
        assert_close("x err", 0.0, e[1], 1e-12);
        assert_eq!(b.relative_error(&a, 3)[0], e[0]);
        assert_close("mass chg", -2.0 / 3.0, b.relative_change(&a, 3)[0], 1e-12);
    }

    #[test]
    fn empty_selection() {
        let s = Selection::new();
        assert!(s.is_empty());
        assert_eq!(s.mass(), 0.0);
        assert_eq!(s.centroid(0.0, 2), vec![0.0, 0.0]);
        let zero = Selection::from_entries(vec![(vec![0.0, 5.0], 1.0), (vec![3.0, 1.0], 0.0)]);
        assert_eq!(zero.centroid(zero.mass(), 2), vec![0.0, 0.0]);
        assert_eq!(symmetric_error(0.0, 0.0), 0.0);
    }
}
