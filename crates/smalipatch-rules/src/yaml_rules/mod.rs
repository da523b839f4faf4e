//! Declarative patch targets in YAML
//!
//! Extra targets use the same schema as the built-in tables and are
//! validated with the same rule compiler, so a bad pattern in a rule file is
//! reported at startup.
//!
//! # Example
//!
//! ```yaml
//! suffix: android/util/jar/StrictJarVerifier.smali
//! rule_set: framework
//! rules:
//!   - id: verify_message_digest
//!     description: Treat every jar entry digest as matching
//!     action:
//!       kind: replace_method_body
//!       signature: '\.method.*verifyMessageDigest\(\[B\[B\)Z'
//!       body:
//!         - "    const/4 v0, 0x1"
//!         - "    return v0"
//! tests:
//!   - input: |
//!       .method static verifyMessageDigest([B[B)Z
//!           .registers 3
//!           invoke-static {p0, p1}, Ljava/security/MessageDigest;->isEqual([B[B)Z
//!           move-result v0
//!           return v0
//!       .end method
//!     output: |
//!       .method static verifyMessageDigest([B[B)Z
//!           .registers 3
//!           const/4 v0, 0x1
//!           return v0
//!       .end method
//! ```

pub mod loader;
pub mod schema;
pub mod verify;

pub use loader::{load_targets_from_dir, load_targets_from_file, load_targets_from_path, load_targets_from_string, LoadError};
pub use schema::{ActionDef, DirectionDef, RuleDef, TargetDef, TestCase};
pub use verify::{run_tests, TestResult};
