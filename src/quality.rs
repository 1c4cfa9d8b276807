use cloud_testdata::{gen_boxes, gen_observations, DistKind};
use tracing::info;

use crate::cloud::Cloud;
use crate::CloudResult;

/// Coordinate axes of the harness observations.
const COORDS: usize = 2;
/// Edge of every query box.
const BOX_EDGE: f64 = 1.0;

/// Accuracy of a bounded cloud against one that keeps every observation.
#[derive(Debug, Clone)]
pub struct Quality {
    /// `max_points` of the cloud under test.
    pub kept: usize,
    /// Observations fed to both clouds.
    pub added: usize,
    /// Random unit boxes queried on both clouds.
    pub areas: usize,
    pub seed: u64,
}

/// Per component (`[mass, centroid_x, centroid_y]`) error statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityReport {
    /// Queries compared (boxes with zero reference mass are skipped).
    pub queries: usize,
    /// Mean signed relative change; shows bias.
    pub mean_change: Vec<f64>,
    /// Mean absolute relative error.
    pub mean_abs_error: Vec<f64>,
    pub min_abs_error: Vec<f64>,
    pub max_abs_error: Vec<f64>,
}

impl QualityReport {
    fn percent(v: &[f64]) -> String {
        v.iter()
            .map(|x| format!("{:.1}%", x * 100.0))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn to_line(&self) -> String {
        format!(
            "QualityReport(queries={}, change=[{}], mean=[{}], min=[{}], max=[{}])",
            self.queries,
            Self::percent(&self.mean_change),
            Self::percent(&self.mean_abs_error),
            Self::percent(&self.min_abs_error),
            Self::percent(&self.max_abs_error),
        )
    }

    pub fn log(&self) {
        info!("{}", self.to_line());
    }

    /// No component's mean error is worse than `other`'s.
    pub fn no_worse_than(&self, other: &QualityReport) -> bool {
        let eps = 1e-12;
        self.mean_abs_error
            .iter()
            .zip(&other.mean_abs_error)
            .all(|(a, b)| *a <= *b + eps)
    }
}

impl Quality {
    pub fn new(kept: usize, added: usize, areas: usize, seed: u64) -> Self {
        Self {
            kept,
            added,
            areas,
            seed,
        }
    }

    pub fn run(&self) -> CloudResult<QualityReport> {
        let width = COORDS + 1;
        let mut bounded = Cloud::builder()
            .max_points(self.kept)
            .dimensions(COORDS)
            .build()?;
        let mut reference = Cloud::builder()
            .max_points(self.added.max(2 * width))
            .dimensions(COORDS)
            .build()?;

        for p in gen_observations(DistKind::Uniform, self.added, COORDS, self.seed) {
            bounded.insert(&p)?;
            reference.insert(&p)?;
        }

        let mut queries = 0usize;
        let mut change = vec![0.0; width];
        let mut sum = vec![0.0; width];
        let mut min = vec![f64::INFINITY; width];
        let mut max = vec![0.0_f64; width];

        for area in gen_boxes(self.areas, COORDS, BOX_EDGE, self.seed.wrapping_add(1)) {
            let mut intervals = vec![Vec::new()];
            intervals.extend(area.into_iter().map(|b| vec![b]));

            let expected = reference.range_query(&intervals)?;
            if expected.mass() == 0.0 {
                continue;
            }
            let measured = bounded.range_query(&intervals)?;
            let chg = measured.relative_change(&expected, width);
            for (i, c) in chg.iter().enumerate() {
                let e = c.abs();
                change[i] += c;
                sum[i] += e;
                min[i] = min[i].min(e);
                max[i] = max[i].max(e);
            }
            queries += 1;
        }

        let n = queries.max(1) as f64;
        if queries == 0 {
            min.fill(f64::NAN);
            max.fill(f64::NAN);
        }
        Ok(QualityReport {
            queries,
            mean_change: change.iter().map(|c| c / n).collect(),
            mean_abs_error: sum.iter().map(|s| s / n).collect(),
            min_abs_error: min,
            max_abs_error: max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lossless_when_everything_fits() {
        let rep = Quality::new(200, 150, 1_000, 42).run().expect("run");
        rep.log();
        assert!(rep.queries > 0);
        for e in &rep.mean_abs_error {
            assert!(*e < 1e-9, "unbounded cloud must match itself: {}", rep.to_line());
        }
    }

    #[test]
    fn bounded_cloud_reports_finite_errors() {
        let rep = Quality::new(50, 500, 1_000, 7).run().expect("run");
        rep.log();
        assert!(rep.queries > 0);
        assert_eq!(rep.mean_abs_error.len(), 3);
        for i in 0..3 {
            assert!(rep.mean_abs_error[i].is_finite());
            assert!(rep.min_abs_error[i] <= rep.mean_abs_error[i] + 1e-12);
            assert!(rep.mean_abs_error[i] <= rep.max_abs_error[i] + 1e-12);
            // symmetric error is bounded by 2
            assert!(rep.max_abs_error[i] <= 2.0 + 1e-12);
        }
        let exact = Quality::new(600, 500, 1_000, 7).run().expect("run");
        assert!(exact.no_worse_than(&rep), "{} vs {}", exact.to_line(), rep.to_line());
    }

    #[test]
    fn too_small_to_hold_the_axes() {
        assert!(Quality::new(5, 10, 10, 1).run().is_err());
    }
}
