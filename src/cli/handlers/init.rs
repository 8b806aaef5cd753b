use std::fs;
use std::path::Path;

use crate::cli::commands::InitArgs;
use crate::io::backend::Backend;
use crate::io::config_io::{self, CONFIG_TEMPLATE};
use crate::io::store_io::{FileBackend, STORE_DIR};

/// Create `.ordo/` under `root` with a default config and an empty store.
pub fn cmd_init(root: &Path, args: InitArgs) -> Result<(), Box<dyn std::error::Error>> {
    let store_dir = root.join(STORE_DIR);
    if store_dir.exists() && !args.force {
        return Err(format!(
            "{} already exists (use --force to reinitialize)",
            store_dir.display()
        )
        .into());
    }
    fs::create_dir_all(&store_dir)?;

    let config_path = config_io::config_path(&store_dir);
    if !config_path.exists() {
        fs::write(&config_path, CONFIG_TEMPLATE)?;
    }

    let mut backend = FileBackend::new(&store_dir);
    let existing = if args.force {
        // A corrupt document is logged to the recovery file by load()
        backend.load().ok().flatten()
    } else {
        None
    };
    let doc = existing.unwrap_or_default();
    backend.write(&doc)?;
    backend.sync()?;

    tracing::info!(path = %store_dir.display(), "initialized store");
    println!("Initialized {} in {}", STORE_DIR, root.display());
    Ok(())
}
