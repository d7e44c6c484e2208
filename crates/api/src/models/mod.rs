pub mod annotation;
pub mod language;
pub mod resource;
pub mod route;

pub use annotation::*;
pub use language::*;
pub use resource::*;
pub use route::*;
