//! YAML rule loader
//!
//! Load target definitions from files, directories, or strings.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use super::schema::TargetDef;
use crate::registry::FileTarget;
use crate::rule::RuleError;

/// Errors that can occur when loading YAML rules
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid rule: {0}")]
    Rule(#[from] RuleError),

    #[error("{}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: Box<LoadError>,
    },
}

/// Load targets from a string holding one target or a list of targets
pub fn load_targets_from_string(yaml: &str) -> Result<Vec<TargetDef>, LoadError> {
    let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
    let targets: Vec<TargetDef> = if value.is_sequence() {
        serde_yaml::from_value(value)?
    } else {
        vec![serde_yaml::from_value(value)?]
    };

    for target in &targets {
        FileTarget::compile(target)?;
    }

    Ok(targets)
}

/// Load targets from a file
pub fn load_targets_from_file(path: &Path) -> Result<Vec<TargetDef>, LoadError> {
    let load = || -> Result<Vec<TargetDef>, LoadError> {
        let content = fs::read_to_string(path)?;
        load_targets_from_string(&content)
    };

    load().map_err(|source| LoadError::File {
        path: path.to_path_buf(),
        source: Box::new(source),
    })
}

/// Load all `.yaml` / `.yml` files below a directory, in path order
pub fn load_targets_from_dir(dir: &Path) -> Result<Vec<TargetDef>, LoadError> {
    if !dir.is_dir() {
        return Err(LoadError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Directory not found: {}", dir.display()),
        )));
    }

    let mut files = Vec::new();
    walk_dir(dir, &mut files)?;
    files.sort();

    let mut targets = Vec::new();
    for file in files {
        let loaded = load_targets_from_file(&file)?;
        debug!(path = %file.display(), targets = loaded.len(), "loaded rule file");
        targets.extend(loaded);
    }

    Ok(targets)
}

/// Load a rule file or every rule file in a directory
pub fn load_targets_from_path(path: &Path) -> Result<Vec<TargetDef>, LoadError> {
    if path.is_dir() {
        load_targets_from_dir(path)
    } else {
        load_targets_from_file(path)
    }
}

fn walk_dir(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), LoadError> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();

        if path.is_dir() {
            walk_dir(&path, files)?;
        } else if path
            .extension()
            .is_some_and(|ext| ext == "yaml" || ext == "yml")
        {
            files.push(path);
        }
    }

    Ok(())
}
