//! Rule sets and the registry mapping them to file targets

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::builtin;
use crate::rule::{PatchRule, RuleError};
use crate::yaml_rules::TargetDef;

/// Which jar's listings a run patches
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleSetId {
    Framework,
    Services,
    MiuiServices,
}

impl RuleSetId {
    pub const ALL: [RuleSetId; 3] = [RuleSetId::Framework, RuleSetId::Services, RuleSetId::MiuiServices];

    pub fn name(self) -> &'static str {
        match self {
            RuleSetId::Framework => "framework",
            RuleSetId::Services => "services",
            RuleSetId::MiuiServices => "miui-services",
        }
    }

    /// Listing directories a decompiled jar of this kind usually contains
    pub fn default_roots(self) -> &'static [&'static str] {
        match self {
            RuleSetId::Framework => &["classes", "classes2", "classes3", "classes4", "classes5"],
            RuleSetId::Services => &[
                "services_classes",
                "services_classes2",
                "services_classes3",
                "services_classes4",
                "services_classes5",
            ],
            RuleSetId::MiuiServices => &["miui_services_classes"],
        }
    }

    /// Guess the rule set from the paths of a listing tree
    ///
    /// MIUI paths win over plain services paths; anything else is framework.
    pub fn detect<'a>(paths: impl IntoIterator<Item = &'a Path>) -> RuleSetId {
        let mut detected = RuleSetId::Framework;
        for path in paths {
            let normalized = path.to_string_lossy().replace('\\', "/").to_lowercase();
            if normalized.contains("miui") || normalized.contains("xiaomi") {
                return RuleSetId::MiuiServices;
            }
            if normalized.contains("com/android/server/") {
                detected = RuleSetId::Services;
            }
        }
        detected
    }
}

impl fmt::Display for RuleSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RuleSetId {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RuleSetId::ALL
            .into_iter()
            .find(|set| set.name() == s)
            .ok_or_else(|| RuleError::UnknownRuleSet(s.to_string()))
    }
}

/// Compiled rules for every listing whose path ends with `suffix`
#[derive(Debug, Clone)]
pub struct FileTarget {
    pub suffix: PathBuf,
    pub rules: Vec<PatchRule>,
}

impl FileTarget {
    pub fn compile(def: &TargetDef) -> Result<Self, RuleError> {
        let suffix = def.suffix.trim().trim_start_matches('/');
        if suffix.is_empty() {
            return Err(RuleError::EmptySuffix);
        }
        let rules = def
            .rules
            .iter()
            .map(PatchRule::compile)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            suffix: PathBuf::from(suffix),
            rules,
        })
    }

    /// Whether `path` ends with this target's suffix, compared by component
    pub fn matches_path(&self, path: &Path) -> bool {
        path.ends_with(&self.suffix)
    }

    /// Copy of this target keeping only the rules `keep` accepts
    fn filtered(&self, keep: impl Fn(&PatchRule) -> bool) -> Option<FileTarget> {
        let rules: Vec<_> = self.rules.iter().filter(|&rule| keep(rule)).cloned().collect();
        (!rules.is_empty()).then(|| FileTarget {
            suffix: self.suffix.clone(),
            rules,
        })
    }
}

/// Rule listing entry (for --list-rules)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleInfo {
    pub rule_set: RuleSetId,
    pub id: String,
    pub description: String,
    pub kind: &'static str,
    pub suffix: String,
}

/// Registry of file targets per rule set
pub struct RuleRegistry {
    sets: BTreeMap<RuleSetId, Vec<FileTarget>>,
}

impl RuleRegistry {
    /// Create a registry with the built-in tables of every rule set
    pub fn new() -> Result<Self, RuleError> {
        let mut registry = Self::empty();
        for set in RuleSetId::ALL {
            let targets = builtin::targets(set)
                .iter()
                .map(FileTarget::compile)
                .collect::<Result<Vec<_>, _>>()?;
            registry.sets.insert(set, targets);
        }
        Ok(registry)
    }

    pub fn empty() -> Self {
        Self {
            sets: RuleSetId::ALL.into_iter().map(|set| (set, Vec::new())).collect(),
        }
    }

    /// Register extra targets, e.g. from YAML files
    ///
    /// A target without a rule set is added to every set.
    pub fn add_targets(&mut self, defs: &[TargetDef]) -> Result<usize, RuleError> {
        let mut added = 0;
        for def in defs {
            let target = FileTarget::compile(def)?;
            for set in RuleSetId::ALL {
                if def.rule_set.map_or(true, |only| only == set) {
                    self.sets.entry(set).or_default().push(target.clone());
                    added += 1;
                }
            }
        }
        Ok(added)
    }

    pub fn targets(&self, set: RuleSetId) -> &[FileTarget] {
        self.sets.get(&set).map(Vec::as_slice).unwrap_or_default()
    }

    /// Distinct rule ids across all sets, sorted
    pub fn all_names(&self) -> BTreeSet<&str> {
        self.sets
            .values()
            .flatten()
            .flat_map(|t| t.rules.iter().map(|r| r.id.as_str()))
            .collect()
    }

    /// Get all rules with their descriptions (for --list-rules)
    pub fn list_rules(&self) -> Vec<RuleInfo> {
        self.sets
            .iter()
            .flat_map(|(set, targets)| {
                targets.iter().flat_map(move |target| {
                    target.rules.iter().map(move |rule| RuleInfo {
                        rule_set: *set,
                        id: rule.id.clone(),
                        description: rule.description.clone(),
                        kind: rule.action.kind(),
                        suffix: target.suffix.display().to_string(),
                    })
                })
            })
            .collect()
    }

    /// Targets of `set` restricted to the enabled and not disabled rules
    ///
    /// `enabled` of `None` keeps every rule. Unknown ids in either list are
    /// rejected.
    pub fn select(
        &self,
        set: RuleSetId,
        enabled: Option<&HashSet<String>>,
        disabled: &HashSet<String>,
    ) -> Result<Vec<FileTarget>, RuleError> {
        let known = self.all_names();
        for name in enabled.into_iter().flatten().chain(disabled) {
            if !known.contains(name.as_str()) {
                return Err(RuleError::UnknownRule(name.clone()));
            }
        }

        Ok(self
            .targets(set)
            .iter()
            .filter_map(|target| {
                target.filtered(|rule| {
                    enabled.map_or(true, |names| names.contains(&rule.id)) && !disabled.contains(&rule.id)
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::yaml_rules::RuleDef;

    #[test]
    fn test_rule_set_from_str() {
        assert_eq!("framework".parse::<RuleSetId>().unwrap(), RuleSetId::Framework);
        assert_eq!("miui-services".parse::<RuleSetId>().unwrap(), RuleSetId::MiuiServices);
        assert!(matches!(
            "vendor".parse::<RuleSetId>(),
            Err(RuleError::UnknownRuleSet(ref s)) if s == "vendor"
        ));
    }

    #[test]
    fn test_detect_rule_set() {
        let framework = [Path::new("classes/android/util/jar/StrictJarFile.smali")];
        assert_eq!(RuleSetId::detect(framework), RuleSetId::Framework);

        let services = [
            Path::new("services_classes/android/os/Foo.smali"),
            Path::new("services_classes/com/android/server/pm/KeySetManagerService.smali"),
        ];
        assert_eq!(RuleSetId::detect(services), RuleSetId::Services);

        let miui = [
            Path::new("x/com/android/server/pm/Foo.smali"),
            Path::new("miui_services_classes/com/miui/server/Bar.smali"),
        ];
        assert_eq!(RuleSetId::detect(miui), RuleSetId::MiuiServices);
    }

    #[test]
    fn test_suffix_match_is_component_based() {
        let target = FileTarget::compile(&TargetDef::new(
            "android/content/pm/SigningDetails.smali",
            vec![RuleDef::insert_before("r", "", "x", "y")],
        ))
        .unwrap();

        assert!(target.matches_path(Path::new("/out/classes/android/content/pm/SigningDetails.smali")));
        assert!(!target.matches_path(Path::new(
            "/out/classes/android/content/pm/PackageParser$SigningDetails.smali"
        )));
        assert!(!target.matches_path(Path::new("/out/classes/xandroid/content/pm/SigningDetails.smali")));
    }

    #[test]
    fn test_empty_suffix_rejected() {
        let def = TargetDef::new("  ", vec![RuleDef::insert_before("r", "", "x", "y")]);
        assert!(matches!(FileTarget::compile(&def), Err(RuleError::EmptySuffix)));
    }

    #[test]
    fn test_builtin_registry() {
        let registry = RuleRegistry::new().unwrap();
        assert!(!registry.targets(RuleSetId::Framework).is_empty());
        assert!(!registry.targets(RuleSetId::Services).is_empty());
        assert!(!registry.targets(RuleSetId::MiuiServices).is_empty());

        let names = registry.all_names();
        assert!(names.contains("strict_jar_file_find_entry"));
        assert!(names.contains("pms_utils_check_downgrade"));
        assert!(names.contains("miui_pms_can_be_update"));
    }

    #[test]
    fn test_list_rules() {
        let registry = RuleRegistry::new().unwrap();
        let info = registry
            .list_rules()
            .into_iter()
            .find(|r| r.id == "strict_jar_verifier_message_digest")
            .unwrap();

        assert_eq!(info.rule_set, RuleSetId::Framework);
        assert_eq!(info.kind, "replace_method_body");
        assert_eq!(info.suffix, "android/util/jar/StrictJarVerifier.smali");
    }

    #[test]
    fn test_select_enabled_and_disabled() {
        let registry = RuleRegistry::new().unwrap();
        let enabled: HashSet<String> = ["signing_details_check_capability", "strict_jar_file_find_entry"]
            .into_iter()
            .map(String::from)
            .collect();
        let disabled: HashSet<String> = ["strict_jar_file_find_entry".to_string()].into();

        let targets = registry
            .select(RuleSetId::Framework, Some(&enabled), &disabled)
            .unwrap();

        // Both SigningDetails classes carry the enabled rule
        assert_eq!(targets.len(), 2);
        assert!(targets
            .iter()
            .all(|t| t.rules.len() == 1 && t.rules[0].id == "signing_details_check_capability"));
    }

    #[test]
    fn test_select_unknown_rule() {
        let registry = RuleRegistry::new().unwrap();
        let disabled: HashSet<String> = ["no_such_rule".to_string()].into();

        assert!(matches!(
            registry.select(RuleSetId::Framework, None, &disabled),
            Err(RuleError::UnknownRule(ref name)) if name == "no_such_rule"
        ));
    }

    #[test]
    fn test_add_targets_scoped_to_rule_set() {
        let mut registry = RuleRegistry::empty();
        let mut scoped = TargetDef::new("a/B.smali", vec![RuleDef::insert_before("scoped", "", "x", "y")]);
        scoped.rule_set = Some(RuleSetId::Services);
        let global = TargetDef::new("a/C.smali", vec![RuleDef::insert_before("global", "", "x", "y")]);

        assert_eq!(registry.add_targets(&[scoped, global]).unwrap(), 4);
        assert_eq!(registry.targets(RuleSetId::Services).len(), 2);
        assert_eq!(registry.targets(RuleSetId::Framework).len(), 1);
        assert_eq!(registry.targets(RuleSetId::MiuiServices).len(), 1);
    }
}
