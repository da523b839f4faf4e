//! framework.jar: package signature verification

use crate::yaml_rules::{DirectionDef, RuleDef, TargetDef};

const RETURN_TRUE: &[&str] = &["    const/4 v0, 0x1", "    return v0"];
const RETURN_ZERO: &[&str] = &["    const/4 v0, 0x0", "    return v0"];

const SHARED_USER_ID_ERROR: &str = r#""<manifest> specifies bad sharedUserId name \"""#;

pub fn targets() -> Vec<TargetDef> {
    vec![
        TargetDef::new(
            "android/content/pm/PackageParser.smali",
            vec![
                RuleDef::insert_before(
                    "package_parser_unsafe_get_certs",
                    "Skip certificate collection for unverified packages",
                    r"invoke-static \{v2, v0, v1\}, Landroid/util/apk/ApkSignatureVerifier;->unsafeGetCertsWithoutVerification\(Landroid/content/pm/parsing/result/ParseInput;Ljava/lang/String;I\)Landroid/content/pm/parsing/result/ParseResult;",
                    "    const/4 v1, 0x1",
                ),
                RuleDef::insert_before(
                    "package_parser_shared_user_id",
                    "Accept malformed sharedUserId names",
                    SHARED_USER_ID_ERROR,
                    "    const/4 v5, 0x1",
                )
                .literal()
                .with_context(r"if-nez v5, :cond_\w+", DirectionDef::Backward, None),
            ],
        ),
        TargetDef::new(
            "android/content/pm/PackageParser$PackageParserException.smali",
            vec![RuleDef::insert_before(
                "package_parser_exception_error",
                "Clear the parser exception error code",
                r"iput p1, p0, Landroid/content/pm/PackageParser\$PackageParserException;->error:I",
                "    const/4 p1, 0x0",
            )],
        ),
        TargetDef::new("android/content/pm/SigningDetails.smali", signing_details_rules()),
        TargetDef::new(
            "android/content/pm/PackageParser$SigningDetails.smali",
            signing_details_rules(),
        ),
        TargetDef::new(
            "android/util/apk/ApkSignatureSchemeV2Verifier.smali",
            vec![digest_is_equal("apk_signature_scheme_v2_digest", "v0")],
        ),
        TargetDef::new(
            "android/util/apk/ApkSignatureSchemeV3Verifier.smali",
            vec![digest_is_equal("apk_signature_scheme_v3_digest", "v0")],
        ),
        TargetDef::new(
            "android/util/apk/ApkSignatureVerifier.smali",
            vec![
                RuleDef::forced_return(
                    "apk_signature_verifier_minimum_scheme",
                    "Require no minimum signature scheme for any target SDK",
                    r"\.method.*getMinimumSignatureSchemeVersionForTargetSdk\(I\)I",
                    RETURN_ZERO,
                ),
                RuleDef::insert_before(
                    "apk_signature_verifier_v1",
                    "Verify v1 signatures without full verification",
                    r"invoke-static \{p0, p1, p3\}, Landroid/util/apk/ApkSignatureVerifier;->verifyV1Signature\(Landroid/content/pm/parsing/result/ParseInput;Ljava/lang/String;Z\)Landroid/content/pm/parsing/result/ParseResult;",
                    "    const/4 p3, 0x0",
                ),
            ],
        ),
        TargetDef::new(
            "android/util/apk/ApkSigningBlockUtils.smali",
            vec![digest_is_equal("apk_signing_block_digest", "v7")],
        ),
        TargetDef::new(
            "android/util/jar/StrictJarVerifier.smali",
            vec![RuleDef::forced_return(
                "strict_jar_verifier_message_digest",
                "Treat every jar entry digest as matching",
                r"\.method.*verifyMessageDigest\(\[B\[B\)Z",
                RETURN_TRUE,
            )],
        ),
        TargetDef::new(
            "android/util/jar/StrictJarFile.smali",
            vec![RuleDef::delete_run_after(
                "strict_jar_file_find_entry",
                "Drop the missing-manifest-entry branch after findEntry",
                r"invoke-virtual \{p0, v5\}, Landroid/util/jar/StrictJarFile;->findEntry\(Ljava/lang/String;\)Ljava/util/zip/ZipEntry;",
                &[r"if-eqz v6, :cond_\w+", r":cond_\w+"],
            )],
        ),
        TargetDef::new(
            "com/android/internal/pm/pkg/parsing/ParsingPackageUtils.smali",
            vec![RuleDef::insert_before(
                "parsing_package_utils_shared_user_id",
                "Accept malformed sharedUserId names",
                SHARED_USER_ID_ERROR,
                "    const/4 v4, 0x0",
            )
            .literal()
            .with_context(r"if-eqz v4, :cond_\w+", DirectionDef::Backward, None)],
        ),
    ]
}

fn signing_details_rules() -> Vec<RuleDef> {
    vec![
        RuleDef::forced_return(
            "signing_details_check_capability",
            "Grant every signing capability",
            r"\.method.*checkCapability\(.*\)Z",
            RETURN_TRUE,
        ),
        RuleDef::forced_return(
            "signing_details_has_ancestor_or_self",
            "Accept any certificate lineage",
            r"\.method.*hasAncestorOrSelf\(.*\)Z",
            RETURN_TRUE,
        ),
    ]
}

/// Force the `MessageDigest.isEqual` result read into `register` to true
fn digest_is_equal(id: &str, register: &str) -> RuleDef {
    RuleDef::replace_line(
        id,
        "Treat computed digests as equal to the signed ones",
        r"Ljava/security/MessageDigest;->isEqual\(\[B\[B\)Z",
        &format!("    const/4 {}, 0x1", register),
    )
    .with_context(
        &format!(r"^\s*move-result\s+{}\b", register),
        DirectionDef::Forward,
        Some(1),
    )
}
