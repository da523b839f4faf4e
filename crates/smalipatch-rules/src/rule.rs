//! Compiled patch rules

use smalipatch_core::{Pattern, PatternError, SearchDirection, SearchWindow};
use thiserror::Error;

use crate::yaml_rules::{ActionDef, DirectionDef, RuleDef};

/// Rule configuration errors, fatal at startup
#[derive(Error, Debug)]
pub enum RuleError {
    #[error("Rule '{rule}': {source}")]
    Pattern {
        rule: String,
        #[source]
        source: PatternError,
    },

    #[error("Rule '{rule}': a search direction requires a context pattern")]
    MissingContext { rule: String },

    #[error("Rule '{rule}': context pattern given without a search direction")]
    MissingDirection { rule: String },

    #[error("Rule '{rule}': no target pattern")]
    MissingTarget { rule: String },

    #[error("Rule '{rule}': method body replacement does not take a context search")]
    ContextNotSupported { rule: String },

    #[error("Rule '{rule}': method body replacement matches on its signature, not on a target")]
    TargetNotSupported { rule: String },

    #[error("Rule '{rule}': a search window requires a search direction")]
    WindowWithoutDirection { rule: String },

    #[error("Rule '{rule}': delete_run_after needs at least one stop condition")]
    NoStopConditions { rule: String },

    #[error("Rule id is required")]
    EmptyId,

    #[error("Target suffix is required")]
    EmptySuffix,

    #[error("Unknown rule set '{0}'. Valid options: framework, services, miui-services")]
    UnknownRuleSet(String),

    #[error("Unknown rule '{0}'. Use --list-rules to see available rules")]
    UnknownRule(String),
}

/// What a rule does at each mutation point
#[derive(Debug, Clone)]
pub enum PatchAction {
    InsertConstantBefore(String),
    InsertConstantAfter(String),
    ReplaceLine(String),
    /// Forced-return patch: swap the body of each matching method
    ReplaceMethodBody { signature: Pattern, body: Vec<String> },
    /// Drop the run of lines after the target that match any stop condition
    DeleteRunAfter { stop_conditions: Vec<Pattern> },
}

impl PatchAction {
    pub fn kind(&self) -> &'static str {
        match self {
            PatchAction::InsertConstantBefore(_) => "insert_before",
            PatchAction::InsertConstantAfter(_) => "insert_after",
            PatchAction::ReplaceLine(_) => "replace_line",
            PatchAction::ReplaceMethodBody { .. } => "replace_method_body",
            PatchAction::DeleteRunAfter { .. } => "delete_run_after",
        }
    }
}

/// A validated transformation
///
/// When `direction` is not `None`, each target match is only a marker and
/// the action applies to the nearest line matching `context` in that
/// direction, within `window`.
#[derive(Debug, Clone)]
pub struct PatchRule {
    pub id: String,
    pub description: String,
    pub target: Pattern,
    pub context: Option<Pattern>,
    pub direction: SearchDirection,
    pub window: SearchWindow,
    pub action: PatchAction,
}

impl PatchRule {
    /// Compile and validate a rule definition
    pub fn compile(def: &RuleDef) -> Result<Self, RuleError> {
        if def.id.trim().is_empty() {
            return Err(RuleError::EmptyId);
        }
        let id = def.id.as_str();
        let rule = || id.to_string();
        let pattern = |name: &str, source: &str| {
            Pattern::new(format!("{}.{}", id, name), source).map_err(|source| RuleError::Pattern {
                rule: rule(),
                source,
            })
        };

        let direction = match def.direction {
            DirectionDef::Forward => SearchDirection::Forward,
            DirectionDef::Backward => SearchDirection::Backward,
            DirectionDef::None => SearchDirection::None,
        };

        let context = match (&def.context, direction) {
            (None, SearchDirection::None) => None,
            (None, _) => return Err(RuleError::MissingContext { rule: rule() }),
            (Some(_), SearchDirection::None) => return Err(RuleError::MissingDirection { rule: rule() }),
            (Some(source), _) => Some(pattern("context", source)?),
        };
        if def.window.is_some() && direction == SearchDirection::None {
            return Err(RuleError::WindowWithoutDirection { rule: rule() });
        }

        let action = match &def.action {
            ActionDef::InsertBefore { text } => PatchAction::InsertConstantBefore(text.clone()),
            ActionDef::InsertAfter { text } => PatchAction::InsertConstantAfter(text.clone()),
            ActionDef::ReplaceLine { text } => PatchAction::ReplaceLine(text.clone()),
            ActionDef::ReplaceMethodBody { signature, body } => {
                if context.is_some() {
                    return Err(RuleError::ContextNotSupported { rule: rule() });
                }
                if def.target.is_some() || def.literal {
                    return Err(RuleError::TargetNotSupported { rule: rule() });
                }
                PatchAction::ReplaceMethodBody {
                    signature: pattern("signature", signature)?,
                    body: body.clone(),
                }
            }
            ActionDef::DeleteRunAfter { stop_conditions } => {
                if stop_conditions.is_empty() {
                    return Err(RuleError::NoStopConditions { rule: rule() });
                }
                let stop_conditions = stop_conditions
                    .iter()
                    .enumerate()
                    .map(|(i, source)| pattern(&format!("stop{}", i), source))
                    .collect::<Result<Vec<_>, _>>()?;
                PatchAction::DeleteRunAfter { stop_conditions }
            }
        };

        let target_source = match (&def.target, &def.action) {
            (Some(target), _) => target.as_str(),
            (None, ActionDef::ReplaceMethodBody { signature, .. }) => signature.as_str(),
            (None, _) => return Err(RuleError::MissingTarget { rule: rule() }),
        };
        let target = if def.literal {
            Pattern::literal(format!("{}.target", id), target_source)
        } else {
            pattern("target", target_source)?
        };

        let window = match def.window {
            Some(lines) => SearchWindow::Lines(lines),
            None => SearchWindow::Unbounded,
        };

        Ok(Self {
            id: def.id.clone(),
            description: def.description.clone(),
            target,
            context,
            direction,
            window,
            action,
        })
    }
}
