pub mod record;
pub mod group;
pub mod ordered;
pub mod document;
pub mod config;

pub use record::*;
pub use group::*;
pub use ordered::*;
pub use document::*;
pub use config::*;
