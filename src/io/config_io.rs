use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::io::store_io::StoreError;
use crate::model::config::{MAX_SPACING, StoreConfig};

/// Written by `ordo init`. Every value is the built-in default.
pub const CONFIG_TEMPLATE: &str = r##"# ordo store configuration

[ordering]
# Gap between consecutive order values after a reorder or repair.
spacing = 10
# Renumber the group a task leaves when it is moved to another group.
compact_on_reparent = false

[durability]
# fsync the store file after interactive commits.
fsync = true
# How long a command waits for another ordo process to release the store.
lock_timeout_ms = 5000

[completion]
# Seconds between completing a task and moving it to the logbook.
log_delay_secs = 2
"##;

/// Keys `ordo config` may set
pub const KNOWN_KEYS: &[&str] = &[
    "ordering.spacing",
    "ordering.compact_on_reparent",
    "durability.fsync",
    "durability.lock_timeout_ms",
    "completion.log_delay_secs",
];

pub fn config_path(store_dir: &Path) -> PathBuf {
    store_dir.join("config.toml")
}

/// Read the store config, returning both the parsed config and the raw
/// toml_edit Document for round-trip-safe editing. A missing file yields
/// the defaults and an empty document.
pub fn read_config(store_dir: &Path) -> Result<(StoreConfig, toml_edit::DocumentMut), StoreError> {
    let path = config_path(store_dir);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(StoreError::ReadError { path, source: e }),
    };
    let config: StoreConfig = toml::from_str(&text)?;
    let doc: toml_edit::DocumentMut = text.parse()?;
    Ok((config, doc))
}

/// Write the config document back to disk, preserving formatting.
pub fn write_config(store_dir: &Path, doc: &toml_edit::DocumentMut) -> Result<(), StoreError> {
    let path = config_path(store_dir);
    fs::write(&path, doc.to_string()).map_err(|e| StoreError::WriteError { path, source: e })
}

/// Set `section.key` (for example `ordering.spacing`) in the config
/// document. The raw value is read as a bool or integer when it looks like
/// one, otherwise as a string.
///
/// The edited document must still parse as a [`StoreConfig`]; returns the
/// resulting config.
pub fn set_value(
    doc: &mut toml_edit::DocumentMut,
    dotted_key: &str,
    raw: &str,
) -> Result<StoreConfig, String> {
    let (section, key) = dotted_key
        .split_once('.')
        .ok_or_else(|| format!("expected <section>.<key>, got \"{}\"", dotted_key))?;
    if !KNOWN_KEYS.contains(&dotted_key) {
        return Err(format!(
            "unknown config key \"{}\" (known: {})",
            dotted_key,
            KNOWN_KEYS.join(", ")
        ));
    }

    let value = if let Ok(b) = raw.parse::<bool>() {
        toml_edit::value(b)
    } else if let Ok(n) = raw.parse::<i64>() {
        toml_edit::value(n)
    } else {
        toml_edit::value(raw)
    };

    let mut edited = doc.clone();
    if !edited.contains_key(section) {
        edited[section] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    edited[section][key] = value;

    let config: StoreConfig = toml::from_str(&edited.to_string())
        .map_err(|e| format!("invalid value for {}: {}", dotted_key, e.message()))?;
    if dotted_key == "ordering.spacing"
        && !(1..=MAX_SPACING).contains(&config.ordering.spacing)
    {
        return Err(format!("ordering.spacing must be between 1 and {}", MAX_SPACING));
    }
    *doc = edited;
    Ok(config)
}

/// Look up `section.key` in the document, as written
pub fn get_value(doc: &toml_edit::DocumentMut, dotted_key: &str) -> Option<String> {
    let (section, key) = dotted_key.split_once('.')?;
    let item = doc.get(section)?.get(key)?;
    item.as_value().map(|v| v.to_string().trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_template_parses_to_defaults() {
        let config: StoreConfig = toml::from_str(CONFIG_TEMPLATE).unwrap();
        let defaults = StoreConfig::default();
        assert_eq!(config.ordering.spacing, defaults.ordering.spacing);
        assert_eq!(config.durability.fsync, defaults.durability.fsync);
        assert_eq!(
            config.completion.log_delay_secs,
            defaults.completion.log_delay_secs
        );
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let (config, doc) = read_config(tmp.path()).unwrap();
        assert_eq!(config.ordering.spacing(), 10);
        assert!(doc.is_empty());
    }

    #[test]
    fn test_round_trip_preserves_comments() {
        let tmp = TempDir::new().unwrap();
        fs::write(config_path(tmp.path()), CONFIG_TEMPLATE).unwrap();

        let (_config, mut doc) = read_config(tmp.path()).unwrap();
        let config = set_value(&mut doc, "ordering.spacing", "100").unwrap();
        assert_eq!(config.ordering.spacing, 100);
        write_config(tmp.path(), &doc).unwrap();

        let written = fs::read_to_string(config_path(tmp.path())).unwrap();
        assert!(written.contains("# Gap between consecutive order values"));
        assert!(written.contains("spacing = 100"));
        assert_eq!(get_value(&doc, "ordering.spacing").as_deref(), Some("100"));
    }

    #[test]
    fn test_set_creates_missing_section() {
        let mut doc = toml_edit::DocumentMut::new();
        let config = set_value(&mut doc, "durability.fsync", "false").unwrap();
        assert!(!config.durability.fsync);
        assert!(doc.to_string().contains("[durability]"));
    }

    #[test]
    fn test_invalid_values_leave_document_alone() {
        let mut doc: toml_edit::DocumentMut = CONFIG_TEMPLATE.parse().unwrap();
        assert!(set_value(&mut doc, "ordering.spacing", "wide").is_err());
        assert!(set_value(&mut doc, "ui.theme", "dark").is_err());
        assert!(set_value(&mut doc, "ordering.width", "5").is_err());
        assert!(set_value(&mut doc, "spacing", "5").is_err());
        assert_eq!(doc.to_string(), CONFIG_TEMPLATE);
    }

    #[test]
    fn test_spacing_out_of_bounds_is_rejected() {
        let mut doc: toml_edit::DocumentMut = CONFIG_TEMPLATE.parse().unwrap();
        let err = set_value(&mut doc, "ordering.spacing", "1000000000").unwrap_err();
        assert!(err.contains("between 1 and"));
        assert!(set_value(&mut doc, "ordering.spacing", "0").is_err());
        assert_eq!(doc.to_string(), CONFIG_TEMPLATE);

        let config = set_value(&mut doc, "ordering.spacing", "10000").unwrap();
        assert_eq!(config.ordering.spacing(), 10_000);
    }
}
