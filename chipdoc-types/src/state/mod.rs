pub mod path;
pub mod schema;
pub mod tree;
pub mod value;

pub use path::*;
pub use schema::*;
pub use tree::*;
pub use value::*;
