pub mod controller;
pub mod registry;
pub mod state;

pub use controller::Session;
pub use registry::{Registration, SessionRegistry};
pub use state::SessionState;
