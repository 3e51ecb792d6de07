//! Reduce many successful iteration results to one answer.
//!
//! | Strategy | Selection | Confidence |
//! |----------|-----------|------------|
//! | `best` | highest overall score | that score |
//! | `voting` | largest group of identical outputs | group size / successes |
//! | `consensus` | largest group, highest-scored representative | group size / successes |
//! | `ensemble` | every success, concatenated | mean score |
//!
//! Ties always resolve to the earliest result in collection order.

use crate::iteration::collector::best_of;
use crate::iteration::result::IterationResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const ENSEMBLE_SEPARATOR: &str = "\n\n---\n\n";

/// Aggregation algorithm applied once a plan finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AggregationStrategy {
    #[default]
    Best,
    Voting,
    Consensus,
    Ensemble,
}

impl AggregationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationStrategy::Best => "best",
            AggregationStrategy::Voting => "voting",
            AggregationStrategy::Consensus => "consensus",
            AggregationStrategy::Ensemble => "ensemble",
        }
    }
}

impl std::fmt::Display for AggregationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AggregationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "best" => Ok(AggregationStrategy::Best),
            "voting" | "vote" => Ok(AggregationStrategy::Voting),
            "consensus" => Ok(AggregationStrategy::Consensus),
            "ensemble" => Ok(AggregationStrategy::Ensemble),
            _ => Err(format!(
                "Unknown aggregation strategy: {}. Valid: best, voting, consensus, ensemble",
                s
            )),
        }
    }
}

/// Final outcome of a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub strategy: AggregationStrategy,
    pub selected_results: Vec<IterationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged_output: Option<String>,
    /// 0.0 to 1.0
    pub confidence: f64,
    pub reasoning: String,
}

impl AggregatedResult {
    fn empty(strategy: AggregationStrategy) -> Self {
        Self {
            strategy,
            selected_results: Vec::new(),
            merged_output: None,
            confidence: 0.0,
            reasoning: "No successful results to aggregate".to_string(),
        }
    }

    /// The answer to present: the merged output, or the first selected
    /// result's output.
    pub fn output(&self) -> Option<&str> {
        self.merged_output
            .as_deref()
            .or_else(|| self.selected_results.first().map(|r| r.output.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.selected_results.is_empty()
    }
}

/// Aggregate `results` with `strategy`. Failed results are ignored.
///
/// # Example
///
/// ```
/// use fanout_domain::selection::aggregation::{AggregationStrategy, aggregate};
/// use fanout_domain::IterationResult;
///
/// let results = vec![
///     IterationResult::success("a", "42").with_overall_score(0.6),
///     IterationResult::success("b", "42").with_overall_score(0.7),
///     IterationResult::success("c", "41").with_overall_score(0.9),
/// ];
/// let voted = aggregate(&results, AggregationStrategy::Voting);
/// assert_eq!(voted.merged_output.as_deref(), Some("42"));
/// assert_eq!(voted.selected_results.len(), 2);
///
/// let best = aggregate(&results, AggregationStrategy::Best);
/// assert_eq!(best.selected_results[0].variation_id, "c");
/// ```
pub fn aggregate(results: &[IterationResult], strategy: AggregationStrategy) -> AggregatedResult {
    let successes: Vec<&IterationResult> = results.iter().filter(|r| r.success).collect();
    if successes.is_empty() {
        return AggregatedResult::empty(strategy);
    }

    match strategy {
        AggregationStrategy::Best => select_best(strategy, &successes, None),
        AggregationStrategy::Voting => vote(&successes),
        AggregationStrategy::Consensus => consensus(&successes),
        AggregationStrategy::Ensemble => ensemble(&successes),
    }
}

fn select_best(
    strategy: AggregationStrategy,
    successes: &[&IterationResult],
    prefix: Option<&str>,
) -> AggregatedResult {
    let Some(best) = best_of(successes.iter().copied()) else {
        return AggregatedResult::empty(strategy);
    };

    let mut reasoning = format!(
        "Selected {} with the highest score {:.2} among {} successful result(s)",
        best.variation_id,
        best.score(),
        successes.len()
    );
    if let Some(prefix) = prefix {
        reasoning = format!("{prefix}; {reasoning}");
    }

    AggregatedResult {
        strategy,
        selected_results: vec![best.clone()],
        merged_output: None,
        confidence: best.score(),
        reasoning,
    }
}

/// Groups of identical outputs, in order of first appearance
fn group_by_output<'a>(successes: &[&'a IterationResult]) -> Vec<Vec<&'a IterationResult>> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<Vec<&IterationResult>> = Vec::new();
    for &result in successes {
        match index.get(result.output.as_str()) {
            Some(&i) => groups[i].push(result),
            None => {
                index.insert(result.output.as_str(), groups.len());
                groups.push(vec![result]);
            }
        }
    }
    groups
}

fn no_majority(groups: &[Vec<&IterationResult>], total: usize) -> bool {
    total > 1 && groups.iter().all(|g| g.len() == 1)
}

fn vote(successes: &[&IterationResult]) -> AggregatedResult {
    let strategy = AggregationStrategy::Voting;
    let total = successes.len();
    let groups = group_by_output(successes);
    if no_majority(&groups, total) {
        return select_best(strategy, successes, Some("All outputs differ"));
    }

    // strict `>` keeps the earliest group on ties
    let mut winner = &groups[0];
    for group in &groups[1..] {
        if group.len() > winner.len() {
            winner = group;
        }
    }

    AggregatedResult {
        strategy,
        merged_output: Some(winner[0].output.clone()),
        confidence: winner.len() as f64 / total as f64,
        reasoning: format!(
            "{} of {} successful results agreed on the same output ({} distinct)",
            winner.len(),
            total,
            groups.len()
        ),
        selected_results: winner.iter().map(|r| (*r).clone()).collect(),
    }
}

fn consensus(successes: &[&IterationResult]) -> AggregatedResult {
    let strategy = AggregationStrategy::Consensus;
    let total = successes.len();
    let groups = group_by_output(successes);
    if no_majority(&groups, total) {
        return select_best(strategy, successes, Some("No agreement between outputs"));
    }

    let largest = groups.iter().map(Vec::len).max().unwrap_or(0);
    let contenders: Vec<&Vec<&IterationResult>> =
        groups.iter().filter(|g| g.len() == largest).collect();

    // Among equally large groups, prefer the one holding the single best result.
    let mut chosen: Option<(&Vec<&IterationResult>, &IterationResult)> = None;
    for group in contenders.iter().copied() {
        let Some(representative) = best_of(group.iter().copied()) else {
            continue;
        };
        match chosen {
            Some((_, current)) if representative.score() <= current.score() => {}
            _ => chosen = Some((group, representative)),
        }
    }
    let Some((group, representative)) = chosen else {
        return AggregatedResult::empty(strategy);
    };

    let mut selected_results = vec![representative.clone()];
    selected_results.extend(
        group
            .iter()
            .filter(|r| !std::ptr::eq(**r, representative))
            .map(|r| (*r).clone()),
    );

    let mut reasoning = format!(
        "{} of {} successful results agreed; representative {} scored {:.2}",
        group.len(),
        total,
        representative.variation_id,
        representative.score()
    );
    if contenders.len() > 1 {
        reasoning.push_str(&format!(
            " (broke a tie between {} groups of size {})",
            contenders.len(),
            largest
        ));
    }

    AggregatedResult {
        strategy,
        selected_results,
        merged_output: Some(representative.output.clone()),
        confidence: group.len() as f64 / total as f64,
        reasoning,
    }
}

fn ensemble(successes: &[&IterationResult]) -> AggregatedResult {
    let merged = successes
        .iter()
        .map(|r| format!("### {}\n{}", r.variation_id, r.output))
        .collect::<Vec<_>>()
        .join(ENSEMBLE_SEPARATOR);
    let mean = successes.iter().map(|r| r.score()).sum::<f64>() / successes.len() as f64;

    AggregatedResult {
        strategy: AggregationStrategy::Ensemble,
        selected_results: successes.iter().map(|r| (*r).clone()).collect(),
        merged_output: Some(merged),
        confidence: mean,
        reasoning: format!("Combined {} successful outputs", successes.len()),
    }
}
