pub mod backend;
pub mod changes;
pub mod config_io;
pub mod flush;
pub mod lock;
pub mod migrate;
pub mod recovery;
pub mod store;
pub mod store_io;
pub mod watcher;
