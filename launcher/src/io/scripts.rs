//! Script catalog and per-script configuration values.
//!
//! Each script is conventionally paired with a YAML config named
//! `<stem>_config.yml`. The values are read only as a descriptive payload
//! for the run history; no field semantics live here.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Configuration file name conventionally paired with a script.
pub fn config_filename_for(script: &Path) -> String {
    let stem = script
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{stem}_config.yml")
}

/// List runnable scripts (`*.py`) in `dir`, sorted by path.
pub fn list_scripts(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut scripts = Vec::new();
    let entries =
        fs::read_dir(dir).with_context(|| format!("read directory {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("read entry in {}", dir.display()))?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("py") {
            scripts.push(path);
        }
    }
    scripts.sort();
    Ok(scripts)
}

/// Read a script's YAML configuration into the key/value map recorded with
/// each run. Scalars are stringified; explicit nulls map to `None`.
pub fn read_config_values(path: &Path) -> Result<BTreeMap<String, Option<String>>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    if contents.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    let value: serde_yaml::Value =
        serde_yaml::from_str(&contents).with_context(|| format!("parse config {}", path.display()))?;

    let mut values = BTreeMap::new();
    if let serde_yaml::Value::Mapping(mapping) = value {
        for (key, val) in mapping {
            let Some(key) = scalar_to_string(&key) else {
                continue;
            };
            values.insert(key, scalar_to_string(&val));
        }
    }
    Ok(values)
}

fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::Null => None,
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::String(s) => Some(s.clone()),
        other => serde_yaml::to_string(other)
            .ok()
            .map(|s| s.trim_end().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_filename_follows_convention() {
        assert_eq!(
            config_filename_for(Path::new("/scripts/wait_script.py")),
            "wait_script_config.yml"
        );
    }

    #[test]
    fn reads_yaml_values_with_nulls_and_numbers() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("model_config.yml");
        fs::write(
            &path,
            "folder: /data/imagery\nmodel_path: null\ncountdown_seconds: 10\n",
        )
        .expect("write config");

        let values = read_config_values(&path).expect("read");
        assert_eq!(values.get("folder"), Some(&Some("/data/imagery".to_string())));
        assert_eq!(values.get("model_path"), Some(&None));
        assert_eq!(values.get("countdown_seconds"), Some(&Some("10".to_string())));
    }

    #[test]
    fn empty_config_yields_empty_values() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("empty_config.yml");
        fs::write(&path, "").expect("write config");

        assert!(read_config_values(&path).expect("read").is_empty());
    }

    #[test]
    fn lists_python_scripts_sorted() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("b_script.py"), "").expect("write");
        fs::write(temp.path().join("a_script.py"), "").expect("write");
        fs::write(temp.path().join("notes.txt"), "").expect("write");

        let scripts = list_scripts(temp.path()).expect("list");
        let names: Vec<String> = scripts
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        assert_eq!(names, vec!["a_script.py", "b_script.py"]);
    }
}
