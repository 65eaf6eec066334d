//! Miscellaneous common structs used throughout the library.

mod address;
mod closest_nodes;
mod id;
pub mod messages;
mod node;
mod record;
mod routing_table;

pub use address::*;
pub use closest_nodes::*;
pub use id::*;
pub use messages::*;
pub use node::*;
pub use record::*;
pub use routing_table::*;
