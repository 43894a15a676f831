pub mod kleene;
pub mod node;

pub use kleene::Kleene;
pub use node::Node;
