//! Listing discovery
//!
//! Walks each root and pairs every file with the targets whose suffix its
//! path ends with.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use smalipatch_rules::{FileTarget, RuleSetId};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A listing file and the targets that apply to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedFile {
    pub root: PathBuf,
    pub path: PathBuf,
    /// Indices into the target table, in table order
    pub targets: Vec<usize>,
}

#[derive(Debug, Default)]
pub struct Discovery {
    pub files: Vec<MatchedFile>,
    pub missing_roots: Vec<PathBuf>,
}

/// Find every file under `roots` matching at least one target
///
/// Files are sorted by root then path. `exclude` receives the full path and
/// the path relative to its root.
pub fn discover(
    roots: &[PathBuf],
    targets: &[FileTarget],
    exclude: impl Fn(&Path, &Path) -> bool,
) -> Discovery {
    let mut discovery = Discovery::default();

    for root in roots {
        if !root.exists() {
            discovery.missing_roots.push(root.clone());
            continue;
        }

        let mut found = 0;
        for path in walk_files(root) {
            let relative = path.strip_prefix(root).unwrap_or(&path);
            if exclude(&path, relative) {
                debug!(path = %path.display(), "excluded");
                continue;
            }

            let matched: Vec<usize> = targets
                .iter()
                .enumerate()
                .filter(|(_, target)| target.matches_path(relative))
                .map(|(i, _)| i)
                .collect();
            if !matched.is_empty() {
                found += 1;
                discovery.files.push(MatchedFile {
                    root: root.clone(),
                    path,
                    targets: matched,
                });
            }
        }
        debug!(root = %root.display(), files = found, "scanned root");
    }

    discovery
}

/// Pick the rule set of a listing tree from its paths
///
/// Each path is taken relative to the parent of its root so the root's
/// own name (e.g. `miui_services_classes`) takes part.
pub fn detect_rule_set(roots: &[PathBuf]) -> RuleSetId {
    let mut relative_paths = Vec::new();
    for root in roots.iter().filter(|r| r.exists()) {
        let base = root.parent().unwrap_or(root);
        relative_paths.extend(
            walk_files(root).map(|path| path.strip_prefix(base).map(Path::to_path_buf).unwrap_or(path)),
        );
    }
    RuleSetId::detect(relative_paths.iter().map(PathBuf::as_path))
}

/// Pair every root with the rule set that patches it
///
/// An explicit set takes all roots. Otherwise each root is detected on its
/// own, so `classes/` and `services_classes/` side by side run against
/// their own tables. Groups come out in rule set order.
pub fn group_roots(roots: &[PathBuf], explicit: Option<RuleSetId>) -> Vec<(RuleSetId, Vec<PathBuf>)> {
    let mut groups: BTreeMap<RuleSetId, Vec<PathBuf>> = BTreeMap::new();
    for root in roots {
        let set = explicit.unwrap_or_else(|| detect_rule_set(std::slice::from_ref(root)));
        groups.entry(set).or_default().push(root.clone());
    }
    groups.into_iter().collect()
}

/// Default roots of `set` that exist below `base`
pub fn default_roots(set: RuleSetId, base: &Path) -> Vec<PathBuf> {
    set.default_roots()
        .iter()
        .map(|name| base.join(name))
        .filter(|root| root.is_dir())
        .collect()
}

fn walk_files(root: &Path) -> impl Iterator<Item = PathBuf> + '_ {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(root = %root.display(), error = %e, "skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use smalipatch_rules::{RuleDef, TargetDef};
    use std::fs;
    use tempfile::TempDir;

    fn target(suffix: &str) -> FileTarget {
        FileTarget::compile(&TargetDef::new(
            suffix,
            vec![RuleDef::insert_before("r", "", "x", "y")],
        ))
        .unwrap()
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, ".class public LFoo;\n").unwrap();
    }

    #[test]
    fn test_same_suffix_under_two_roots() {
        let temp = TempDir::new().unwrap();
        let roots = vec![temp.path().join("classes"), temp.path().join("classes2")];
        for root in &roots {
            touch(&root.join("android/util/jar/StrictJarFile.smali"));
            touch(&root.join("android/util/jar/Other.smali"));
        }

        let targets = [target("android/util/jar/StrictJarFile.smali")];
        let discovery = discover(&roots, &targets, |_, _| false);

        assert_eq!(discovery.files.len(), 2);
        assert_eq!(discovery.files[0].root, roots[0]);
        assert_eq!(discovery.files[1].root, roots[1]);
        assert!(discovery.files.iter().all(|f| f.targets == vec![0]));
    }

    #[test]
    fn test_file_matched_by_several_targets() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("classes");
        touch(&root.join("android/content/pm/SigningDetails.smali"));

        let targets = [
            target("android/content/pm/SigningDetails.smali"),
            target("android/util/jar/StrictJarFile.smali"),
            target("pm/SigningDetails.smali"),
        ];
        let discovery = discover(&[root], &targets, |_, _| false);

        assert_eq!(discovery.files.len(), 1);
        assert_eq!(discovery.files[0].targets, vec![0, 2]);
    }

    #[test]
    fn test_missing_root_reported() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("classes9");

        let discovery = discover(&[missing.clone()], &[target("a/B.smali")], |_, _| false);
        assert!(discovery.files.is_empty());
        assert_eq!(discovery.missing_roots, vec![missing]);
    }

    #[test]
    fn test_exclude_uses_relative_path() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("classes");
        touch(&root.join("android/util/jar/StrictJarFile.smali"));

        let targets = [target("android/util/jar/StrictJarFile.smali")];
        let discovery = discover(&[root], &targets, |_, relative| relative.starts_with("android/util"));
        assert!(discovery.files.is_empty());
    }

    #[test]
    fn test_detect_rule_set_from_root_name() {
        let temp = TempDir::new().unwrap();
        let miui = temp.path().join("miui_services_classes");
        touch(&miui.join("com/android/server/pm/PackageManagerServiceImpl.smali"));
        assert_eq!(detect_rule_set(&[miui]), RuleSetId::MiuiServices);

        let services = temp.path().join("services_classes");
        touch(&services.join("com/android/server/pm/KeySetManagerService.smali"));
        assert_eq!(detect_rule_set(&[services]), RuleSetId::Services);

        let framework = temp.path().join("classes");
        touch(&framework.join("android/util/jar/StrictJarFile.smali"));
        assert_eq!(detect_rule_set(&[framework]), RuleSetId::Framework);
    }

    #[test]
    fn test_mixed_layout_grouped_per_rule_set() {
        let temp = TempDir::new().unwrap();
        let classes = temp.path().join("classes");
        let services = temp.path().join("services_classes");
        touch(&classes.join("android/util/jar/StrictJarFile.smali"));
        touch(&services.join("com/android/server/pm/KeySetManagerService.smali"));

        let roots: Vec<_> = RuleSetId::ALL
            .into_iter()
            .flat_map(|set| default_roots(set, temp.path()))
            .collect();
        assert_eq!(
            group_roots(&roots, None),
            vec![
                (RuleSetId::Framework, vec![classes.clone()]),
                (RuleSetId::Services, vec![services.clone()]),
            ]
        );

        assert_eq!(
            group_roots(&roots, Some(RuleSetId::Services)),
            vec![(RuleSetId::Services, vec![classes, services])]
        );
    }

    #[test]
    fn test_default_roots_existing_only() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("classes")).unwrap();
        fs::create_dir(temp.path().join("classes3")).unwrap();

        let roots = default_roots(RuleSetId::Framework, temp.path());
        assert_eq!(roots, vec![temp.path().join("classes"), temp.path().join("classes3")]);
    }
}
