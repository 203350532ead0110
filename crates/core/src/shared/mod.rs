pub mod cancel_token;
pub mod constants;
pub mod frame;
pub mod in_flight;
pub mod settings;
pub mod workflow_error;
