pub mod matrix;
pub mod study;
pub mod tree;

pub use matrix::MatrixStore;
pub use study::StudyStore;
pub use tree::{TreeNodeView, TreeStore};
