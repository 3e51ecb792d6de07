//! Console output formatter for run results

use colored::Colorize;
use fanout_application::RunnerStatus;
use fanout_domain::{AggregatedResult, IterationResult, PlanStatus, PlanSummary, Variation};
use serde::Serialize;

/// Everything printed after a run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub plan_id: String,
    pub task: String,
    pub status: PlanStatus,
    pub summary: PlanSummary,
    pub aggregated: AggregatedResult,
    pub variations: Vec<Variation>,
    pub results: Vec<IterationResult>,
}

impl RunReport {
    pub fn new(
        status: RunnerStatus,
        aggregated: AggregatedResult,
        results: Vec<IterationResult>,
    ) -> Self {
        Self {
            plan_id: status.plan.id,
            task: status.plan.task.description,
            status: status.plan.status,
            summary: status.summary,
            aggregated,
            variations: status.plan.variations,
            results,
        }
    }

    fn label_of<'a>(&'a self, variation_id: &'a str) -> &'a str {
        self.variations
            .iter()
            .find(|v| v.id == variation_id)
            .map_or(variation_id, |v| v.label.as_str())
    }
}

/// Formats run reports for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Format every variation's outcome, then the aggregated answer
    pub fn format(report: &RunReport) -> String {
        let mut output = String::new();

        output.push_str(&Self::header("fanout results"));
        output.push('\n');

        output.push_str(&format!("{} {}\n", "Task:".cyan().bold(), report.task));
        output.push_str(&format!(
            "{} {} ({})\n",
            "Plan:".cyan().bold(),
            report.plan_id,
            report.status
        ));
        output.push_str(&format!(
            "{} {}\n",
            "Variations:".cyan().bold(),
            Self::summary_line(&report.summary)
        ));

        output.push_str(&Self::section_header("Variations"));
        for result in &report.results {
            let label = report.label_of(&result.variation_id);
            if result.success {
                output.push_str(&format!(
                    "\n{}\n{}\n",
                    format!("── {} (score {:.2}, {} ms) ──", label, result.score(), result.duration_ms)
                        .yellow()
                        .bold(),
                    result.output.trim_end()
                ));
            } else {
                let kind = if result.timed_out { "Timeout" } else { "Error" };
                output.push_str(&format!(
                    "\n{}\n{}: {}\n",
                    format!("── {} ──", label).red().bold(),
                    kind,
                    result.error.as_deref().unwrap_or("Unknown")
                ));
            }
        }
        for variation in report
            .variations
            .iter()
            .filter(|v| !report.results.iter().any(|r| r.variation_id == v.id))
        {
            output.push_str(&format!(
                "\n{}\n",
                format!("── {} ({}) ──", variation.label, variation.status).dimmed()
            ));
        }

        output.push_str(&Self::section_header(&format!(
            "Answer ({})",
            report.aggregated.strategy
        )));
        output.push_str(&Self::answer_block(report));

        output.push_str(&Self::footer());
        output
    }

    /// Format only the aggregated answer
    pub fn format_answer(report: &RunReport) -> String {
        let mut output = String::new();
        output.push_str(&format!(
            "{} {}\n\n",
            "Variations:".dimmed(),
            Self::summary_line(&report.summary)
        ));
        output.push_str(&Self::answer_block(report));
        output
    }

    /// Format as JSON
    pub fn format_json(report: &RunReport) -> String {
        serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
    }

    fn answer_block(report: &RunReport) -> String {
        let aggregated = &report.aggregated;
        match aggregated.output() {
            Some(answer) => {
                let sources = aggregated
                    .selected_results
                    .iter()
                    .map(|r| report.label_of(&r.variation_id))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "{}\n\n{} {:.0}%  {} {}\n{}\n",
                    answer.trim_end(),
                    "Confidence:".bold(),
                    aggregated.confidence * 100.0,
                    "From:".bold(),
                    sources,
                    aggregated.reasoning.dimmed()
                )
            }
            None => format!("{}\n", aggregated.reasoning.red()),
        }
    }

    fn summary_line(summary: &PlanSummary) -> String {
        let mut parts = vec![format!("{} total", summary.total)];
        let counts = [
            (summary.completed, "completed"),
            (summary.failed, "failed"),
            (summary.timed_out, "timed out"),
            (summary.skipped, "skipped"),
            (summary.spawned, "still running"),
            (summary.pending, "pending"),
        ];
        for (count, name) in counts {
            if count > 0 {
                parts.push(format!("{} {}", count, name));
            }
        }
        parts.join(", ")
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanout_domain::{AggregationStrategy, Plan, TaskSpec, VariationStatus, aggregate};

    fn report() -> RunReport {
        let mut plan = Plan::new(
            TaskSpec::new("t", "Fix the bug"),
            vec![
                Variation::new("a", "model-a", 0),
                Variation::new("b", "model-b", 1),
                Variation::new("c", "model-c", 2),
            ],
        )
        .unwrap();
        plan.variation_mut("a").unwrap().status = VariationStatus::Completed;
        plan.variation_mut("b").unwrap().status = VariationStatus::Failed;
        plan.variation_mut("c").unwrap().status = VariationStatus::Skipped;

        let results = vec![
            IterationResult::success("a", "patched").with_overall_score(0.8),
            IterationResult::failure("b", "crashed"),
        ];
        let aggregated = aggregate(&results, AggregationStrategy::Best);
        let summary = PlanSummary {
            total: 3,
            completed: 1,
            failed: 1,
            skipped: 1,
            ..Default::default()
        };
        RunReport::new(RunnerStatus { plan, summary }, aggregated, results)
    }

    #[test]
    fn test_format_full() {
        colored::control::set_override(false);
        let output = ConsoleFormatter::format(&report());
        assert!(output.contains("Task: Fix the bug"));
        assert!(output.contains("── model-a (score 0.80"));
        assert!(output.contains("Error: crashed"));
        assert!(output.contains("── model-c (skipped) ──"));
        assert!(output.contains("Answer (best)"));
        assert!(output.contains("From: model-a"));
    }

    #[test]
    fn test_format_answer() {
        colored::control::set_override(false);
        let output = ConsoleFormatter::format_answer(&report());
        assert!(output.contains("3 total, 1 completed, 1 failed, 1 skipped"));
        assert!(output.contains("patched"));
        assert!(output.contains("Confidence: 80%"));
    }

    #[test]
    fn test_format_json() {
        let json: serde_json::Value =
            serde_json::from_str(&ConsoleFormatter::format_json(&report())).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["aggregated"]["strategy"], "best");
        assert_eq!(json["results"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_no_answer() {
        colored::control::set_override(false);
        let mut report = report();
        report.aggregated = aggregate(&[], AggregationStrategy::Voting);
        let output = ConsoleFormatter::format_answer(&report);
        assert!(output.contains("No successful results to aggregate"));
    }
}
