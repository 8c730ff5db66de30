pub mod acquisition;
pub mod context;
pub mod handlers;
pub mod request;
pub mod state;

pub use acquisition::AcquisitionEngine;
pub use request::AcquisitionRequest;
pub use state::AcquisitionState;
