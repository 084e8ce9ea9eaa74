// Presentation of run results to the user
use crate::engine::CapturedOutput;
use crate::executor::{RunFailure, RunReport};
use serde::Serialize;

/// The one place results leave the runner
pub trait OutputPresenter {
    fn present_output(&self, title: &str, output: &CapturedOutput);
    fn present_report(&self, report: &RunReport);
    fn present_failure(&self, failure: &RunFailure);
}

/// Prints to the terminal, as text or as JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsolePresenter {
    pub json: bool,
}

impl ConsolePresenter {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    fn print_json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to serialize result: {}", e),
        }
    }
}

impl OutputPresenter for ConsolePresenter {
    fn present_output(&self, title: &str, output: &CapturedOutput) {
        if self.json {
            self.print_json(output);
            return;
        }

        println!("{}:", title);
        print!("{}", output.output);
        if !output.output.is_empty() && !output.output.ends_with('\n') {
            println!();
        }
        if let Some(code) = output.exit_code.filter(|code| *code != 0) {
            println!("[Program exited with code {}]", code);
        }
    }

    fn present_report(&self, report: &RunReport) {
        if self.json {
            self.print_json(report);
            return;
        }

        println!("Test: {}", report.test);
        println!("{}", report.verdict.message());
    }

    fn present_failure(&self, failure: &RunFailure) {
        if self.json {
            self.print_json(&failure_json(failure));
            return;
        }

        eprintln!("Error ({}):", failure.stage);
        eprintln!("{}", failure.reason);
    }
}

fn failure_json(failure: &RunFailure) -> serde_json::Value {
    serde_json::json!({
        "stage": failure.stage,
        "error": failure.reason,
    })
}
