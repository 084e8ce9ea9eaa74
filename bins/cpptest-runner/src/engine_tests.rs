/// End-to-end tests against a real C++ compiler
///
/// Run with: cargo test -p cpptest-runner -- --ignored
/// Requires `g++` on PATH (or CPPTEST_COMPILER pointing at another front end).

#[cfg(test)]
mod tests {
    use crate::engine::{CompilerCommand, ProcessToolchain};
    use crate::executor::{SourcePlacement, Stage, TestOrchestrator, Verdict};
    use cpptest_common::store::TestStore;
    use cpptest_common::types::{CaseMatching, TestRecord};
    use std::time::Duration;

    const SUM_SOURCE: &str = r#"
#include <iostream>

int main() {
    int a, b;
    std::cin >> a >> b;
    std::cout << a + b << std::endl;
    return 0;
}
"#;

    const WRONG_SUM_SOURCE: &str = r#"
#include <iostream>

int main() {
    int a, b;
    std::cin >> a >> b;
    std::cout << a + b + 1 << std::endl;
    return 0;
}
"#;

    const GOTO_SOURCE: &str = r#"
#include <iostream>

int main() {
    int a, b;
    std::cin >> a >> b;
    goto done;
done:
    std::cout << a + b << std::endl;
}
"#;

    const SYNTAX_ERROR_SOURCE: &str = r#"
#include <iostream>

int main() {
    std::cout << "missing semicolon" << std::endl
}
"#;

    fn orchestrator() -> TestOrchestrator<ProcessToolchain> {
        let compiler = std::env::var("CPPTEST_COMPILER").unwrap_or_else(|_| "g++".to_string());
        let toolchain = ProcessToolchain::new(
            CompilerCommand::new(compiler),
            Some(Duration::from_secs(60)),
            Some(Duration::from_secs(10)),
        );
        TestOrchestrator::new(
            toolchain,
            CaseMatching::Insensitive,
            std::env::consts::EXE_SUFFIX,
        )
    }

    fn sum_test() -> TestRecord {
        TestRecord::new("t1")
            .with_description("Read two integers and print their sum")
            .with_forbidden(["goto"])
            .with_input("3\n4\n")
            .with_expected("7")
    }

    /// Test: forbidden construct stops the run before compilation
    #[tokio::test]
    #[ignore] // Requires g++
    async fn test_forbidden_goto_never_compiles() {
        let report = orchestrator()
            .run_with_test(GOTO_SOURCE, &sum_test(), &SourcePlacement::Scratch)
            .await;

        assert_eq!(report.stage, Stage::ForbiddenCheck);
        assert!(report.verdict.message().contains("goto"));
    }

    /// Test: correct program passes
    #[tokio::test]
    #[ignore] // Requires g++
    async fn test_sum_program_passes() {
        let report = orchestrator()
            .run_with_test(SUM_SOURCE, &sum_test(), &SourcePlacement::Scratch)
            .await;

        assert_eq!(report.verdict, Verdict::Passed, "{}", report.verdict.message());
    }

    /// Test: compiler diagnostics surface verbatim
    #[tokio::test]
    #[ignore] // Requires g++
    async fn test_syntax_error_aborts_at_build() {
        let report = orchestrator()
            .run_with_test(SYNTAX_ERROR_SOURCE, &sum_test(), &SourcePlacement::Scratch)
            .await;

        match report.verdict {
            Verdict::Aborted { stage, reason } => {
                assert_eq!(stage, Stage::Building);
                assert!(reason.contains("error"), "diagnostics: {}", reason);
            }
            other => panic!("expected build abort, got {other:?}"),
        }
    }

    /// Test: wrong output fails with both sides in the report
    #[tokio::test]
    #[ignore] // Requires g++
    async fn test_wrong_output_fails() {
        let report = orchestrator()
            .run_with_test(WRONG_SUM_SOURCE, &sum_test(), &SourcePlacement::Scratch)
            .await;

        assert_eq!(
            report.verdict,
            Verdict::Failed {
                expected: "7".to_string(),
                actual: "8".to_string(),
                exit_code: Some(0),
            }
        );
    }

    /// Test: a record saved to disk drives a full run
    #[tokio::test]
    #[ignore] // Requires g++
    async fn test_stored_record_round_trip_run() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = TestStore::new(tmp.path().join("tests"));
        let path = store.save(&sum_test()).unwrap();
        let record = store.load(&store.resolve("t1")).unwrap();
        assert_eq!(store.resolve("t1"), path);

        let source_path = tmp.path().join("work").join("main.cpp");
        let report = orchestrator()
            .run_with_test(SUM_SOURCE, &record, &SourcePlacement::SaveAs(source_path.clone()))
            .await;

        assert!(report.verdict.is_passed(), "{}", report.verdict.message());
        assert!(source_path.exists(), "saved source must be kept");
    }

    /// Test: plain compile-and-run merges stderr into the output
    #[tokio::test]
    #[ignore] // Requires g++
    async fn test_compile_and_run_merges_stderr() {
        let source = r#"
#include <iostream>
int main() {
    std::cout << "to stdout" << std::endl;
    std::cerr << "to stderr" << std::endl;
}
"#;

        let output = orchestrator()
            .compile_and_run(source, "", &SourcePlacement::Scratch)
            .await
            .unwrap();

        assert!(output.output.contains("to stdout"));
        assert!(output.output.contains("to stderr"));
        assert_eq!(output.exit_code, Some(0));
    }
}
