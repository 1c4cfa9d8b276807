pub mod dimension;
pub mod precision;
pub mod selection;
pub mod settings;
pub mod shape;
pub mod sort_tree;
pub mod test_helpers;

// Internal building blocks
mod points;
mod reduce;
mod store;

// Public surface
pub use dimension::Dimension;
pub use points::PointStore;
pub use selection::Selection;
pub use settings::{CloudBuilder, CloudSettings};
pub use shape::SpreadShape;
pub use sort_tree::{KeyOrder, SortTree};
pub use store::Cloud;
