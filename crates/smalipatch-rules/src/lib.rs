//! smalipatch-rules: Patch rules and their application
//!
//! Built-in rule sets:
//! - framework: signature verification bypasses for framework.jar
//! - services: downgrade and signature checks in services.jar
//! - miui-services: MIUI installer restrictions in miui-services.jar
//!
//! Extra targets can be declared in YAML, see [`yaml_rules`].

pub mod applier;
pub mod builtin;
pub mod registry;
pub mod rule;
pub mod yaml_rules;

pub use applier::{plan_rule, ApplyError, ApplyReport, RuleApplier, RuleOutcome};
pub use registry::{FileTarget, RuleInfo, RuleRegistry, RuleSetId};
pub use rule::{PatchAction, PatchRule, RuleError};
pub use yaml_rules::{ActionDef, LoadError, RuleDef, TargetDef, TestResult};
