mod core;
mod list;
mod ops;
mod plan;
mod plugin;
mod resolve;
mod schema;
mod transform;

pub use crate::core::*;
pub use crate::list::*;
pub use crate::ops::*;
pub use crate::plan::*;
pub use crate::plugin::*;
pub use crate::resolve::*;
pub use crate::schema::*;
