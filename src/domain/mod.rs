pub mod computation;
pub mod error;
pub mod matrix;
pub mod node;
pub mod root_network;
pub mod study;

pub use computation::*;
pub use error::*;
pub use matrix::*;
pub use node::*;
pub use root_network::*;
pub use study::*;
