pub mod bootstrap;
pub mod check;
pub mod deferred;
pub mod record_ops;
pub mod reindex;
pub mod reorder;
pub mod reparent;
