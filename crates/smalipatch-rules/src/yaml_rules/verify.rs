//! Runs the test cases embedded in target definitions

use smalipatch_core::LineBuffer;

use super::schema::{TargetDef, TestCase};
use crate::applier::RuleApplier;
use crate::registry::FileTarget;
use crate::rule::RuleError;

/// Result of running a test case
#[derive(Debug, Clone)]
pub struct TestResult {
    pub input: String,
    pub expected: String,
    pub actual: Option<String>,
    pub passed: bool,
    pub error: Option<String>,
}

/// Run every non-skipped test case of `def` against its rules
pub fn run_tests(def: &TargetDef) -> Result<Vec<TestResult>, RuleError> {
    let target = FileTarget::compile(def)?;
    Ok(def
        .tests
        .iter()
        .filter(|t| !t.skip)
        .map(|test| run_single_test(&target, test))
        .collect())
}

fn run_single_test(target: &FileTarget, test: &TestCase) -> TestResult {
    let expected = test.output.clone().unwrap_or_else(|| test.input.clone());
    let mut buffer = LineBuffer::from_source(&test.input);

    match RuleApplier::new(&target.rules).apply(&mut buffer) {
        Ok(_) => {
            let actual = buffer.to_source();
            TestResult {
                input: test.input.clone(),
                passed: actual == expected,
                expected,
                actual: Some(actual),
                error: None,
            }
        }
        Err(e) => TestResult {
            input: test.input.clone(),
            expected,
            actual: None,
            passed: false,
            error: Some(e.to_string()),
        },
    }
}
