//! YAML rule schema definitions
//!
//! Defines the structure of declarative patch targets using serde for
//! deserialization. The built-in rule tables are expressed with the same
//! types, so every rule goes through one validation path.

use serde::{Deserialize, Serialize};

use crate::registry::RuleSetId;

/// A listing file and the ordered rules applied to it
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TargetDef {
    /// Relative path the listing must end with
    /// (e.g., "android/util/jar/StrictJarFile.smali")
    pub suffix: String,

    /// Restrict this target to one rule set; all sets when absent
    #[serde(default)]
    pub rule_set: Option<RuleSetId>,

    /// Rules, applied in order
    pub rules: Vec<RuleDef>,

    /// Test cases run by `--verify-rules`
    #[serde(default)]
    pub tests: Vec<TestCase>,
}

impl TargetDef {
    pub fn new(suffix: impl Into<String>, rules: Vec<RuleDef>) -> Self {
        Self {
            suffix: suffix.into(),
            rule_set: None,
            rules,
            tests: Vec::new(),
        }
    }
}

/// A single patch rule
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RuleDef {
    /// Unique rule identifier (e.g., "strict_jar_file_find_entry")
    pub id: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Regular expression locating the anchor line.
    /// Not accepted by `replace_method_body`, which matches on its signature.
    #[serde(default)]
    pub target: Option<String>,

    /// Treat `target` as plain text instead of a regular expression
    #[serde(default)]
    pub literal: bool,

    /// Secondary pattern searched from each target match
    #[serde(default)]
    pub context: Option<String>,

    #[serde(default)]
    pub direction: DirectionDef,

    /// Maximum number of lines the context search inspects; unbounded when absent.
    /// Only valid together with a direction.
    #[serde(default)]
    pub window: Option<usize>,

    pub action: ActionDef,
}

/// Search direction for the context pattern
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DirectionDef {
    Forward,
    Backward,
    #[default]
    None,
}

/// What a rule does at its mutation point
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionDef {
    /// Insert a line before the mutation point
    InsertBefore { text: String },

    /// Insert a line after the mutation point
    InsertAfter { text: String },

    /// Replace the mutation point line
    ReplaceLine { text: String },

    /// Replace the body of every method whose header matches `signature`
    ReplaceMethodBody { signature: String, body: Vec<String> },

    /// Remove the run of lines after the target matching any stop condition
    DeleteRunAfter { stop_conditions: Vec<String> },
}

/// Test case embedded in a target definition
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TestCase {
    /// Listing text fed to the target's rules
    pub input: String,

    /// Expected listing; `None` means the rules must leave the input unchanged
    #[serde(default)]
    pub output: Option<String>,

    #[serde(default)]
    pub skip: bool,
}

impl RuleDef {
    fn base(id: &str, description: &str, action: ActionDef) -> Self {
        Self {
            id: id.to_string(),
            description: description.to_string(),
            target: None,
            literal: false,
            context: None,
            direction: DirectionDef::None,
            window: None,
            action,
        }
    }

    /// Insert `text` before every line matching `target`
    pub fn insert_before(id: &str, description: &str, target: &str, text: &str) -> Self {
        Self {
            target: Some(target.to_string()),
            ..Self::base(id, description, ActionDef::InsertBefore { text: text.to_string() })
        }
    }

    /// Replace the line found by the context search with `text`
    pub fn replace_line(id: &str, description: &str, target: &str, text: &str) -> Self {
        Self {
            target: Some(target.to_string()),
            ..Self::base(id, description, ActionDef::ReplaceLine { text: text.to_string() })
        }
    }

    /// Make every method matching `signature` return a fixed value
    pub fn forced_return(id: &str, description: &str, signature: &str, body: &[&str]) -> Self {
        Self::base(
            id,
            description,
            ActionDef::ReplaceMethodBody {
                signature: signature.to_string(),
                body: body.iter().map(|l| l.to_string()).collect(),
            },
        )
    }

    /// Delete the lines after `target` matching any of `stop_conditions`
    pub fn delete_run_after(id: &str, description: &str, target: &str, stop_conditions: &[&str]) -> Self {
        Self {
            target: Some(target.to_string()),
            ..Self::base(
                id,
                description,
                ActionDef::DeleteRunAfter {
                    stop_conditions: stop_conditions.iter().map(|s| s.to_string()).collect(),
                },
            )
        }
    }

    /// Match `target` as plain text
    pub fn literal(mut self) -> Self {
        self.literal = true;
        self
    }

    /// Resolve the mutation point by searching for `context` from each target match
    pub fn with_context(mut self, context: &str, direction: DirectionDef, window: Option<usize>) -> Self {
        self.context = Some(context.to_string());
        self.direction = direction;
        self.window = window;
        self
    }
}
