//! Bounded-memory weighted point cloud.
//!
//! A [`Cloud`] approximates a stream of weighted observations
//! `[mass, x1, .., xN]` with at most `max_points` stored points. It answers
//! hyper-rectangle range queries with fractional weights and interpolates
//! full point vectors at arbitrary locations.
//!
//! ```
//! use gr_cloud::Cloud;
//!
//! let mut cloud = Cloud::builder().max_points(16).dimensions(1).build().unwrap();
//! for x in 0..40 {
//!     cloud.insert(&[1.0, x as f64]).unwrap();
//! }
//! assert!(cloud.len() <= 16);
//!
//! let left_half = cloud.range_query(&[vec![], vec![(-1.0, 19.5)]]).unwrap();
//! assert!(left_half.mass() > 10.0 && left_half.mass() < 30.0);
//! ```

pub mod cloud;
pub mod error;
pub mod quality;

pub use cloud::{Cloud, CloudBuilder, CloudSettings, Selection, SpreadShape};
pub use error::{CloudError, CloudResult};
pub use quality::{Quality, QualityReport};
