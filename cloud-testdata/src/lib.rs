//! cloud-testdata
//! Synthetic weighted observations shared by benches, tests and the quality harness.
//! Every observation is `[mass, x1, .., xN]`; coordinates live in \[-100, 100].

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp, Normal};

/// Lower edge of the coordinate domain.
pub const DOMAIN_MIN: f64 = -100.0;
/// Upper edge of the coordinate domain.
pub const DOMAIN_MAX: f64 = 100.0;

/// Available synthetic distributions.
#[derive(Clone, Copy, Debug)]
pub enum DistKind {
    /// Uniform coordinates, uniform mass in \[0,100)
    Uniform,
    /// Gaussian blob around the origin, exponential mass
    Normal { sigma: f64 },
    /// A few tight clumps plus a broad uniform background
    Clustered,
    /// Integer lattice coordinates (lots of exact ties), unit mass
    Lattice,
}

/// Generate `n` observations with `coords` coordinate axes.
pub fn gen_observations(kind: DistKind, n: usize, coords: usize, seed: u64) -> Vec<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = Vec::with_capacity(n);

    match kind {
        DistKind::Uniform => {
            for _ in 0..n {
                let mut p = Vec::with_capacity(coords + 1);
                p.push(rng.random_range(0.0..100.0));
                for _ in 0..coords {
                    p.push(rng.random_range(DOMAIN_MIN..DOMAIN_MAX));
                }
                out.push(p);
            }
        }
        DistKind::Normal { sigma } => {
            let normal = Normal::new(0.0, sigma).unwrap();
            let mass = Exp::new(0.1).unwrap();
            for _ in 0..n {
                let mut p = Vec::with_capacity(coords + 1);
                p.push(mass.sample(&mut rng));
                for _ in 0..coords {
                    let z: f64 = normal.sample(&mut rng);
                    p.push(z.clamp(DOMAIN_MIN, DOMAIN_MAX));
                }
                out.push(p);
            }
        }
        DistKind::Clustered => {
            let centers: Vec<Vec<f64>> = (0..3)
                .map(|_| {
                    (0..coords)
                        .map(|_| rng.random_range(-80.0..80.0))
                        .collect()
                })
                .collect();
            for _ in 0..n {
                let mut p = Vec::with_capacity(coords + 1);
                p.push(rng.random_range(1.0..10.0));
                let bucket: u32 = rng.random_range(0..100);
                if bucket < 60 {
                    let c = &centers[rng.random_range(0..centers.len())];
                    for &x in c {
                        p.push(x + rng.random_range(-1.0..1.0) * 2.0);
                    }
                } else {
                    for _ in 0..coords {
                        p.push(rng.random_range(DOMAIN_MIN..DOMAIN_MAX));
                    }
                }
                out.push(p);
            }
        }
        DistKind::Lattice => {
            for _ in 0..n {
                let mut p = Vec::with_capacity(coords + 1);
                p.push(1.0);
                for _ in 0..coords {
                    p.push(rng.random_range(-10..=10) as f64);
                }
                out.push(p);
            }
        }
    }
    out
}

/// Random axis-aligned boxes of edge `edge` inside the domain, one `(lo, hi)` per coordinate axis.
pub fn gen_boxes(n: usize, coords: usize, edge: f64, seed: u64) -> Vec<Vec<(f64, f64)>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            (0..coords)
                .map(|_| {
                    let lo = rng.random_range(DOMAIN_MIN - edge..DOMAIN_MAX);
                    (lo, lo + edge)
                })
                .collect()
        })
        .collect()
}
