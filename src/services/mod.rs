pub mod settings;
pub mod xrandr;
