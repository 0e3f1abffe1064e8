pub mod actions;
pub mod brightness;
pub mod controller;

pub use actions::{Action, dispatch};
pub use controller::Controller;
