//! Dashboard widgets for the TUI.

mod map;
mod points;
mod status;

pub use map::MapWidget;
pub use points::PointsWidget;
pub use status::StatusWidget;
