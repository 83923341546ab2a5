pub mod handler;
pub mod listener;

pub use handler::handle_connection;
pub use listener::TrackerServer;
