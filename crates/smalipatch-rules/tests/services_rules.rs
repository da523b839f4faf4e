//! Built-in services and miui-services rules against realistic listings

use std::path::Path;

use smalipatch_core::LineBuffer;
use smalipatch_rules::{ApplyReport, RuleApplier, RuleRegistry, RuleSetId};

fn patch(set: RuleSetId, path: &str, source: &str) -> (String, ApplyReport) {
    let registry = RuleRegistry::new().unwrap();
    let rules: Vec<_> = registry
        .targets(set)
        .iter()
        .filter(|t| t.matches_path(Path::new(path)))
        .flat_map(|t| t.rules.iter())
        .collect();
    assert!(!rules.is_empty(), "no {} target for {}", set, path);

    let mut buffer = LineBuffer::from_source(source);
    let report = RuleApplier::new(rules).apply(&mut buffer).unwrap();
    (buffer.to_source(), report)
}

const KEY_SET_MANAGER: &str = r#".class public Lcom/android/server/pm/KeySetManagerService;
.super Ljava/lang/Object;

.method public shouldCheckUpgradeKeySetLocked(Lcom/android/server/pm/pkg/PackageStateInternal;Lcom/android/server/pm/pkg/SharedUserApi;I)Z
    .registers 8

    const/4 v0, 0x0
    if-eqz p1, :cond_12
    invoke-interface {p1}, Lcom/android/server/pm/pkg/PackageStateInternal;->isSharedUser()Z
    move-result v1
    if-nez v1, :cond_12
    const/4 v0, 0x1
    :cond_12
    return v0
.end method

.method public isIdValidKeySetId(J)Z
    .registers 4
    const/4 v0, 0x1
    return v0
.end method
"#;

#[test]
fn test_key_set_upgrade_check_forced_false() {
    let path = "services_classes/com/android/server/pm/KeySetManagerService.smali";
    let (patched, report) = patch(RuleSetId::Services, path, KEY_SET_MANAGER);

    assert_eq!(report.sites_for("keyset_should_check_upgrade"), 1);
    assert!(patched.contains(
        "SharedUserApi;I)Z\n    .registers 8\n    const/4 v0, 0x0\n    return v0\n.end method\n"
    ));
    assert!(!patched.contains("isSharedUser"));
    // The neighbouring method keeps its body
    assert!(patched.contains("isIdValidKeySetId(J)Z\n    .registers 4\n    const/4 v0, 0x1\n"));

    let (again, report) = patch(RuleSetId::Services, path, &patched);
    assert!(!report.is_modified());
    assert_eq!(again, patched);
}

const PMS_UTILS: &str = r#".class public Lcom/android/server/pm/PackageManagerServiceUtils;
.super Ljava/lang/Object;

.method public static checkDowngrade(Lcom/android/server/pm/parsing/pkg/AndroidPackage;Landroid/content/pm/PackageInfoLite;)V
    .locals 4

    invoke-interface {p0}, Lcom/android/server/pm/parsing/pkg/AndroidPackage;->getLongVersionCode()J
    move-result-wide v0
    iget-wide v2, p1, Landroid/content/pm/PackageInfoLite;->versionCode:J
    cmp-long v0, v2, v0
    if-ltz v0, :cond_e
    return-void
    :cond_e
    new-instance v0, Lcom/android/server/pm/PackageManagerException;
    throw v0
.end method

.method public static compareSignatures([Landroid/content/pm/Signature;[Landroid/content/pm/Signature;)I
    .registers 6
    invoke-static {p0, p1}, Landroid/content/pm/SigningDetails;->signaturesMatchExactly([Landroid/content/pm/Signature;[Landroid/content/pm/Signature;)Z
    move-result v0
    return v0
.end method
"#;

#[test]
fn test_package_manager_utils_checks() {
    let path = "services_classes/com/android/server/pm/PackageManagerServiceUtils.smali";
    let (patched, report) = patch(RuleSetId::Services, path, PMS_UTILS);

    assert_eq!(report.sites_for("pms_utils_check_downgrade"), 1);
    assert_eq!(report.sites_for("pms_utils_compare_signatures"), 1);
    assert_eq!(report.sites_for("pms_utils_verify_signatures"), 0);
    assert!(patched.contains("PackageInfoLite;)V\n    .locals 4\n    return-void\n.end method\n"));
    assert!(patched.contains("Signature;)I\n    .registers 6\n    const/4 v0, 0x0\n    return v0\n.end method\n"));
    assert!(!patched.contains("PackageManagerException"));
}

const MIUI_PMS_IMPL: &str = r#".class public Lcom/android/server/pm/PackageManagerServiceImpl;
.super Lcom/android/server/pm/PackageManagerServiceStub;

.method public canBeUpdate(Ljava/lang/String;)V
    .registers 5

    iget-object v0, p0, Lcom/android/server/pm/PackageManagerServiceImpl;->mPms:Lcom/android/server/pm/PackageManagerService;
    invoke-static {p1}, Lcom/android/server/pm/PackageManagerServiceImpl;->isProtected(Ljava/lang/String;)Z
    move-result v1
    if-eqz v1, :cond_10
    new-instance v2, Lcom/android/server/pm/PackageManagerException;
    throw v2
    :cond_10
    return-void
.end method
"#;

#[test]
fn test_miui_update_restriction_removed() {
    let path = "miui_services_classes/com/android/server/pm/PackageManagerServiceImpl.smali";
    let (patched, report) = patch(RuleSetId::MiuiServices, path, MIUI_PMS_IMPL);

    assert_eq!(report.sites_for("miui_pms_can_be_update"), 1);
    assert_eq!(report.sites_for("miui_pms_verify_isolation_violation"), 0);
    assert!(patched.ends_with("canBeUpdate(Ljava/lang/String;)V\n    .registers 5\n    return-void\n.end method\n"));
}

#[test]
fn test_services_rules_absent_from_framework() {
    let registry = RuleRegistry::new().unwrap();
    let path = Path::new("com/android/server/pm/KeySetManagerService.smali");
    assert!(!registry
        .targets(RuleSetId::Framework)
        .iter()
        .any(|t| t.matches_path(path)));
}
