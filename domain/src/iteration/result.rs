//! Iteration result value objects - the outcome of one finished variation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rough shape of a variation's output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    #[default]
    Text,
    Markdown,
    Code,
    Json,
}

impl OutputType {
    /// Best-effort classification of raw output text.
    pub fn detect(output: &str) -> Self {
        let trimmed = output.trim();
        if (trimmed.starts_with('{') || trimmed.starts_with('['))
            && serde_json::from_str::<serde_json::Value>(trimmed).is_ok()
        {
            return OutputType::Json;
        }
        if trimmed.starts_with("```") && trimmed.ends_with("```") {
            return OutputType::Code;
        }
        if trimmed.contains("```") || trimmed.lines().any(|l| l.starts_with('#')) {
            return OutputType::Markdown;
        }
        OutputType::Text
    }
}

/// Quality signals for one result, each in [0,1] when present
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultMetrics {
    pub confidence: Option<f64>,
    pub completeness: Option<f64>,
    pub code_quality: Option<f64>,
    pub responsiveness: Option<f64>,
    pub overall_score: f64,
}

/// Resource consumption reported by the execution service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageStats {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
    pub estimated_cost_usd: Option<f64>,
}

/// Outcome of one finished variation.
///
/// Built once when the variation reaches a terminal state and not modified
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationResult {
    pub variation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub output: String,
    pub output_type: OutputType,
    pub metrics: ResultMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageStats>,
    pub success: bool,
    /// Failed because a time limit was hit (local or reported by the service)
    #[serde(default)]
    pub timed_out: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IterationResult {
    fn base(variation_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            variation_id: variation_id.into(),
            run_id: None,
            started_at: now,
            ended_at: now,
            duration_ms: 0,
            output: String::new(),
            output_type: OutputType::Text,
            metrics: ResultMetrics::default(),
            usage: None,
            success: false,
            timed_out: false,
            error: None,
        }
    }

    /// A successful result carrying `output`.
    pub fn success(variation_id: impl Into<String>, output: impl Into<String>) -> Self {
        let output = output.into();
        Self {
            output_type: OutputType::detect(&output),
            output,
            success: true,
            ..Self::base(variation_id)
        }
    }

    /// A failed result with an error description.
    pub fn failure(variation_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::base(variation_id)
        }
    }

    /// A failed result caused by a time limit.
    pub fn timeout(variation_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            timed_out: true,
            ..Self::failure(variation_id, error)
        }
    }

    // ==================== Builder Methods ====================

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Set start and end times; duration is derived from them.
    pub fn with_timing(mut self, started_at: DateTime<Utc>, ended_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self.ended_at = ended_at;
        self.duration_ms = u64::try_from((ended_at - started_at).num_milliseconds()).unwrap_or(0);
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_usage(mut self, usage: UsageStats) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn with_metrics(mut self, metrics: ResultMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.metrics.confidence = Some(confidence.clamp(0.0, 1.0));
        self
    }

    pub fn with_overall_score(mut self, score: f64) -> Self {
        self.metrics.overall_score = score.clamp(0.0, 1.0);
        self
    }

    pub fn score(&self) -> f64 {
        self.metrics.overall_score
    }
}
