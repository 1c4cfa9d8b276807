use serde::{Deserialize, Serialize};

/// How the mass of one stored point is assumed to spread towards its neighbours.
///
/// A point at `b` with neighbour values `a < b < c` stands for a cluster whose
/// mass covers `[a, c]`. The shape is the cumulative fraction of that mass left
/// of `x`: 0 at `a`, 0.5 at `b`, 1 at `c`, monotone in between.
///
/// **Used by the range query** to turn value intervals into fractional weights.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")] // accept "sqrt","linear"
pub enum SpreadShape {
    /// Mass concentrated around the sample, thinning towards the neighbours (DEFAULT).
    #[default]
    Sqrt,
    /// Mass spread evenly on each side.
    Linear,
}

impl SpreadShape {
    /// Cumulative fraction of the mass left of `x` for a sample at `b` between `a` and `c`.
    ///
    /// A collapsed side (`a == b` or `b == c`) puts no mass on that side of `b`.
    #[inline]
    pub fn cdf(self, x: f64, a: f64, b: f64, c: f64) -> f64 {
        if x > b {
            let span = c - b;
            if span <= 0.0 {
                return 1.0;
            }
            let t = (x - b) / span;
            let f = match self {
                SpreadShape::Sqrt => (1.0 + t.sqrt()) / 2.0,
                SpreadShape::Linear => 0.5 + t / 2.0,
            };
            f.min(1.0)
        } else {
            let span = b - a;
            if span <= 0.0 {
                return 0.0;
            }
            let t = (b - x) / span;
            let f = match self {
                SpreadShape::Sqrt => (1.0 - t.sqrt()) / 2.0,
                SpreadShape::Linear => 0.5 - t / 2.0,
            };
            f.max(0.0)
        }
    }

    /// Fraction of the mass that falls inside `[lo, hi]`.
    #[inline]
    pub fn fraction(self, lo: f64, hi: f64, a: f64, b: f64, c: f64) -> f64 {
        self.cdf(hi, a, b, c) - self.cdf(lo, a, b, c)
    }
}
