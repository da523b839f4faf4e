//! miui-services.jar: MIUI installer restrictions

use crate::yaml_rules::{RuleDef, TargetDef};

pub fn targets() -> Vec<TargetDef> {
    vec![TargetDef::new(
        "com/android/server/pm/PackageManagerServiceImpl.smali",
        vec![
            RuleDef::forced_return(
                "miui_pms_can_be_update",
                "Drop the MIUI system app update restriction",
                r"\.method.*canBeUpdate\(.*\)V",
                &["    return-void"],
            ),
            RuleDef::forced_return(
                "miui_pms_verify_isolation_violation",
                "Drop the MIUI isolation violation check",
                r"\.method.*verifyIsolationViolation\(.*\)V",
                &["    return-void"],
            ),
        ],
    )]
}
