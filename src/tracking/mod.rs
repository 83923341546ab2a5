pub mod activity;
pub mod preroll;

pub use activity::ActivityTracker;
pub use preroll::PreRollBuffer;
