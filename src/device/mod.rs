pub mod events;
pub mod manager;
pub mod models;
pub mod session;
pub mod transport;

pub use manager::DeviceManager;
