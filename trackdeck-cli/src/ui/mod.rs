//! Terminal UI for trackdeck.
//!
//! # Module Structure
//!
//! - `dashboard` - Map, point list and status panes plus key handling
//! - `widgets` - The individual panes

pub mod dashboard;
pub mod widgets;

pub use dashboard::{Dashboard, DashboardEvent, DashboardView};
