//! services.jar: package manager downgrade and signature checks

use crate::yaml_rules::{RuleDef, TargetDef};

const RETURN_VOID: &[&str] = &["    return-void"];
const RETURN_FALSE: &[&str] = &["    const/4 v0, 0x0", "    return v0"];
const RETURN_TRUE: &[&str] = &["    const/4 v0, 0x1", "    return v0"];

pub fn targets() -> Vec<TargetDef> {
    vec![
        TargetDef::new(
            "com/android/server/pm/PackageManagerServiceUtils.smali",
            vec![
                RuleDef::forced_return(
                    "pms_utils_check_downgrade",
                    "Allow installing older version codes",
                    r"\.method.*checkDowngrade\(.*\)V",
                    RETURN_VOID,
                ),
                RuleDef::forced_return(
                    "pms_utils_verify_signatures",
                    "Skip signature verification against the installed package",
                    r"\.method.*verifySignatures\(.*\)Z",
                    RETURN_FALSE,
                ),
                RuleDef::forced_return(
                    "pms_utils_compare_signatures",
                    "Report every signature comparison as a match",
                    r"\.method.*compareSignatures\(.*\)I",
                    RETURN_FALSE,
                ),
                RuleDef::forced_return(
                    "pms_utils_match_signatures_compat",
                    "Accept legacy signature matches",
                    r"\.method.*matchSignaturesCompat\(.*\)Z",
                    RETURN_TRUE,
                ),
            ],
        ),
        TargetDef::new(
            "com/android/server/pm/KeySetManagerService.smali",
            vec![RuleDef::forced_return(
                "keyset_should_check_upgrade",
                "Never enforce upgrade key sets",
                r"\.method.*shouldCheckUpgradeKeySetLocked\(.*\)Z",
                RETURN_FALSE,
            )],
        ),
    ]
}
