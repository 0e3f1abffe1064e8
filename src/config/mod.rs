pub mod display;
pub mod model;
pub mod parser;

pub use model::*;
pub use parser::load_config;
