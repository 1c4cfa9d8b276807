// src/cloud/settings.rs
use serde::{Deserialize, Serialize};

use crate::cloud::shape::SpreadShape;
use crate::cloud::store::Cloud;
use crate::{CloudError, CloudResult};

pub const DEFAULT_MAX_POINTS: usize = 100;
pub const DEFAULT_OVERHANG: f64 = 0.5;

/// Tunables of a [`Cloud`]. Missing fields deserialize to their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudSettings {
    /// Hard cap on stored points.
    pub max_points: usize,
    /// Spread assumed around each stored point by range queries.
    pub shape: SpreadShape,
    /// How far past the outermost sample of an axis its spread reaches,
    /// as a fraction of the gap to the inner neighbour.
    pub overhang: f64,
}

impl Default for CloudSettings {
    fn default() -> Self {
        Self {
            max_points: DEFAULT_MAX_POINTS,
            shape: SpreadShape::default(),
            overhang: DEFAULT_OVERHANG,
        }
    }
}

impl CloudSettings {
    /// Reject settings no cloud can run with.
    pub fn validate(&self) -> CloudResult<()> {
        // The mass axis alone needs room for its two boundary points.
        if self.max_points < 2 {
            return Err(CloudError::InsufficientCapacity {
                max_points: self.max_points,
                dimensions: 1,
            });
        }
        if !self.overhang.is_finite() || self.overhang < 0.0 {
            return Err(CloudError::InvalidSettings {
                what: "overhang must be finite and >= 0",
            });
        }
        Ok(())
    }
}

/// Builder for [`Cloud`].
///
/// ```
/// use gr_cloud::{Cloud, SpreadShape};
///
/// let cloud = Cloud::builder()
///     .max_points(64)
///     .dimensions(2)
///     .shape(SpreadShape::Linear)
///     .build()
///     .unwrap();
/// assert_eq!(cloud.dimension_count(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CloudBuilder {
    settings: CloudSettings,
    dimensions: usize,
}

impl CloudBuilder {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing settings (e.g. loaded from a config file).
    #[inline]
    pub fn settings(mut self, settings: CloudSettings) -> Self {
        self.settings = settings;
        self
    }

    #[inline]
    pub fn max_points(mut self, n: usize) -> Self {
        self.settings.max_points = n;
        self
    }

    /// Number of coordinate axes to add after the mass axis.
    #[inline]
    pub fn dimensions(mut self, n: usize) -> Self {
        self.dimensions = n;
        self
    }

    #[inline]
    pub fn shape(mut self, s: SpreadShape) -> Self {
        self.settings.shape = s;
        self
    }

    #[inline]
    pub fn overhang(mut self, f: f64) -> Self {
        self.settings.overhang = f;
        self
    }

    pub fn build(self) -> CloudResult<Cloud> {
        let needed = 2 * (self.dimensions + 1);
        if self.settings.max_points < needed {
            return Err(CloudError::InsufficientCapacity {
                max_points: self.settings.max_points,
                dimensions: self.dimensions + 1,
            });
        }
        let mut cloud = Cloud::with_settings(self.settings)?;
        for _ in 0..self.dimensions {
            cloud.add_dimension()?;
        }
        Ok(cloud)
    }
}
