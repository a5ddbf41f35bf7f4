pub mod build;
pub mod collect;
pub mod extract;
pub mod label;
pub mod project;
pub mod util;

pub use build::*;
pub use collect::*;
pub use extract::*;
pub use label::*;
pub use project::*;
pub use util::*;
