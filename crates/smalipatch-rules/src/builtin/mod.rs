//! Built-in rule tables, one module per rule set

mod framework;
mod miui_services;
mod services;

use crate::registry::RuleSetId;
use crate::yaml_rules::TargetDef;

/// Target definitions shipped for `set`
pub fn targets(set: RuleSetId) -> Vec<TargetDef> {
    match set {
        RuleSetId::Framework => framework::targets(),
        RuleSetId::Services => services::targets(),
        RuleSetId::MiuiServices => miui_services::targets(),
    }
}
