//! Configuration file support for smalipatch
//!
//! Loads `.smalipatch.toml` from current directory or parent directories.
//! Relative paths in the file are resolved against the file's directory.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = ".smalipatch.toml";

/// Configuration file structure
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rules: RulesConfig,
    pub paths: PathsConfig,
    pub output: OutputConfig,
    pub batch: BatchConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Rule set to apply (framework, services, miui-services, auto)
    pub rule_set: Option<String>,
    /// If set, only these rules will run
    pub enabled: Option<Vec<String>>,
    /// Rules to exclude (applied after enabled)
    pub disabled: Vec<String>,
    /// Extra YAML rule files or directories
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Listing roots used when none are given on the command line
    pub roots: Vec<PathBuf>,
    /// Glob patterns to exclude from processing
    pub exclude: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output format: "text", "json" or "diff"
    pub format: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Worker threads; all cores when unset
    pub jobs: Option<usize>,
    pub fail_fast: bool,
    pub backup: bool,
    pub backup_dir: Option<PathBuf>,
}

impl Config {
    /// Load config from `.smalipatch.toml` searching from current directory upward
    pub fn load() -> Result<Option<(Config, PathBuf)>> {
        Self::load_from(std::env::current_dir()?)
    }

    /// Load config searching from the given directory upward
    pub fn load_from(start_dir: PathBuf) -> Result<Option<(Config, PathBuf)>> {
        let mut current = Some(start_dir.as_path());

        while let Some(dir) = current {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                let config = Self::load_path(&config_path)?;
                return Ok(Some((config, config_path)));
            }
            current = dir.parent();
        }

        Ok(None)
    }

    /// Load config from a specific path
    pub fn load_path(path: &Path) -> Result<Config> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(config.anchored_at(base))
    }

    fn anchored_at(mut self, base: &Path) -> Self {
        let anchor = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        self.rules.files.iter_mut().for_each(anchor);
        self.paths.roots.iter_mut().for_each(anchor);
        if let Some(dir) = self.batch.backup_dir.as_mut() {
            anchor(dir);
        }
        self
    }

    /// Compute the enabled and disabled rule ids
    ///
    /// Rules given on the command line replace the config lists entirely.
    pub fn rule_selection(&self, cli_rules: &[String]) -> (Option<HashSet<String>>, HashSet<String>) {
        if !cli_rules.is_empty() {
            return (Some(cli_rules.iter().cloned().collect()), HashSet::new());
        }

        let enabled = self
            .rules
            .enabled
            .as_ref()
            .map(|names| names.iter().cloned().collect());
        let disabled = self.rules.disabled.iter().cloned().collect();
        (enabled, disabled)
    }

    /// Check if a path should be excluded based on config patterns
    ///
    /// `relative` is the path below its listing root.
    pub fn should_exclude(&self, path: &Path, relative: &Path) -> bool {
        let path_str = path.to_string_lossy();
        let relative_str = relative.to_string_lossy();

        for pattern in &self.paths.exclude {
            if let Ok(glob_pattern) = glob::Pattern::new(pattern) {
                if glob_pattern.matches(&relative_str) || glob_pattern.matches(&path_str) {
                    return true;
                }
                if let Some(file_name) = path.file_name() {
                    if glob_pattern.matches(&file_name.to_string_lossy()) {
                        return true;
                    }
                }
            }

            // Directory patterns match any component run
            if pattern.ends_with('/') {
                let dir_pattern = pattern.trim_end_matches('/');
                if path_str.contains(&format!("/{}/", dir_pattern))
                    || relative_str.starts_with(&format!("{}/", dir_pattern))
                {
                    return true;
                }
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_config(dir: &Path, content: &str) {
        fs::write(dir.join(CONFIG_FILE_NAME), content).unwrap();
    }

    #[test]
    fn test_load_full_config() {
        let temp = TempDir::new().unwrap();
        create_config(
            temp.path(),
            r#"
[rules]
rule_set = "services"
enabled = ["pms_utils_check_downgrade", "keyset_should_check_upgrade"]
disabled = ["keyset_should_check_upgrade"]
files = ["rules/extra.yaml"]

[paths]
roots = ["services_classes", "/abs/services_classes2"]
exclude = ["**/R$*.smali"]

[output]
format = "json"

[batch]
jobs = 4
fail_fast = true
backup = true
"#,
        );

        let (config, path) = Config::load_from(temp.path().to_path_buf())
            .unwrap()
            .unwrap();

        assert_eq!(path, temp.path().join(CONFIG_FILE_NAME));
        assert_eq!(config.rules.rule_set.as_deref(), Some("services"));
        assert_eq!(config.rules.files, vec![temp.path().join("rules/extra.yaml")]);
        assert_eq!(
            config.paths.roots,
            vec![temp.path().join("services_classes"), PathBuf::from("/abs/services_classes2")]
        );
        assert_eq!(config.output.format, Some("json".to_string()));
        assert_eq!(config.batch.jobs, Some(4));
        assert!(config.batch.fail_fast);
        assert!(config.batch.backup);
        assert!(config.batch.backup_dir.is_none());
    }

    #[test]
    fn test_load_empty_config() {
        let temp = TempDir::new().unwrap();
        create_config(temp.path(), "");

        let (config, _) = Config::load_from(temp.path().to_path_buf())
            .unwrap()
            .unwrap();

        assert!(config.rules.rule_set.is_none());
        assert!(config.rules.enabled.is_none());
        assert!(config.paths.roots.is_empty());
        assert!(config.batch.jobs.is_none());
        assert!(!config.batch.backup);
    }

    #[test]
    fn test_config_found_in_parent() {
        let temp = TempDir::new().unwrap();
        create_config(temp.path(), "[batch]\njobs = 2\n");
        let nested = temp.path().join("out/classes");
        fs::create_dir_all(&nested).unwrap();

        let (config, path) = Config::load_from(nested).unwrap().unwrap();
        assert_eq!(path, temp.path().join(CONFIG_FILE_NAME));
        assert_eq!(config.batch.jobs, Some(2));
    }

    #[test]
    fn test_no_config_found() {
        let temp = TempDir::new().unwrap();
        let result = Config::load_from(temp.path().to_path_buf()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_invalid_config_is_error() {
        let temp = TempDir::new().unwrap();
        create_config(temp.path(), "[batch]\njobs = \"many\"\n");

        let err = Config::load_from(temp.path().to_path_buf()).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse"));
    }

    #[test]
    fn test_rule_selection_cli_override() {
        let config = Config {
            rules: RulesConfig {
                disabled: vec!["a".to_string()],
                ..Default::default()
            },
            ..Default::default()
        };

        let (enabled, disabled) = config.rule_selection(&["a".to_string()]);
        assert_eq!(enabled.unwrap().len(), 1);
        assert!(disabled.is_empty());
    }

    #[test]
    fn test_rule_selection_from_config() {
        let config = Config {
            rules: RulesConfig {
                enabled: Some(vec!["a".to_string(), "b".to_string()]),
                disabled: vec!["b".to_string()],
                ..Default::default()
            },
            ..Default::default()
        };

        let (enabled, disabled) = config.rule_selection(&[]);
        assert_eq!(enabled.unwrap().len(), 2);
        assert!(disabled.contains("b"));
    }

    #[test]
    fn test_should_exclude_glob() {
        let config = Config {
            paths: PathsConfig {
                exclude: vec!["**/R$*.smali".to_string()],
                ..Default::default()
            },
            ..Default::default()
        };

        assert!(config.should_exclude(
            Path::new("/out/classes/android/R$id.smali"),
            Path::new("android/R$id.smali")
        ));
        assert!(!config.should_exclude(
            Path::new("/out/classes/android/util/jar/StrictJarFile.smali"),
            Path::new("android/util/jar/StrictJarFile.smali")
        ));
    }

    #[test]
    fn test_should_exclude_directory() {
        let config = Config {
            paths: PathsConfig {
                exclude: vec!["androidx/".to_string()],
                ..Default::default()
            },
            ..Default::default()
        };

        assert!(config.should_exclude(
            Path::new("/out/classes/androidx/core/Foo.smali"),
            Path::new("androidx/core/Foo.smali")
        ));
        assert!(!config.should_exclude(
            Path::new("/out/classes/android/Foo.smali"),
            Path::new("android/Foo.smali")
        ));
    }
}
