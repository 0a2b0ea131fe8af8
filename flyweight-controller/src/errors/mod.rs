mod controller;

pub use controller::ControllerError;
