use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Lifecycle state reported by the review service. The set is closed:
/// any other value in the `status` field is a protocol violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Running,
    Completed,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
        }
    }
}

/// Finding severity, ordered ascending so `Critical` compares greatest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

/// Analysis tool that produced a finding. Unrecognized tools are kept
/// rather than rejected so new scanners don't break old clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingTool {
    Checkov,
    Policy,
    Cost,
    #[serde(other)]
    Other,
}

impl FindingTool {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingTool::Checkov => "checkov",
            FindingTool::Policy => "policy",
            FindingTool::Cost => "cost",
            FindingTool::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub tool: FindingTool,
    pub rule_id: String,
    pub severity: Severity,
    pub file: String,
    pub line: u32,
    pub message: String,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(default)]
    pub checkov_issues: u32,
    #[serde(default)]
    pub policy_fails: u32,
    #[serde(default)]
    pub cost_usd_month: f64,
    #[serde(default)]
    pub duration_ms: u64,
}

/// Before/after counts from the service's self-evaluation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfCheck {
    pub issues_before: u32,
    pub issues_after: u32,
    pub policy_before: u32,
    pub policy_after: u32,
}

/// Full status document for a single review run, as served by
/// `GET /status` and echoed back by `POST /run`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatus {
    pub run_id: String,
    #[serde(rename = "status")]
    pub state: RunState,
    #[serde(default)]
    pub summary: RunSummary,
    #[serde(default)]
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub llm_comment_markdown: Option<String>,
    #[serde(default)]
    pub safe_to_merge: Option<bool>,
    #[serde(default)]
    pub self_check: Option<SelfCheck>,
    #[serde(default, deserialize_with = "flexible_time::deserialize")]
    pub created_at: Option<DateTime<Utc>>,
}

impl RunStatus {
    /// Checks constraints the type system can't capture. Counts are
    /// unsigned by construction; cost must also be finite and non-negative.
    pub fn validate(&self) -> Result<()> {
        if self.run_id.is_empty() {
            return Err(AppError::Protocol("status document has empty run_id".to_string()));
        }
        let cost = self.summary.cost_usd_month;
        if !cost.is_finite() || cost < 0.0 {
            return Err(AppError::Protocol(format!(
                "status document has invalid cost_usd_month: {cost}"
            )));
        }
        Ok(())
    }
}

/// One row of `GET /history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub run_id: String,
    pub commit_sha: String,
    #[serde(default)]
    pub issues: u32,
    #[serde(default)]
    pub fails: u32,
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default, deserialize_with = "flexible_time::deserialize")]
    pub created_at: Option<DateTime<Utc>>,
}

impl HistoryEntry {
    pub fn validate(&self) -> Result<()> {
        if self.run_id.is_empty() {
            return Err(AppError::Protocol("history entry has empty run_id".to_string()));
        }
        if !self.cost.is_finite() || self.cost < 0.0 {
            return Err(AppError::Protocol(format!(
                "history entry {} has invalid cost: {}",
                self.run_id, self.cost
            )));
        }
        Ok(())
    }
}

/// Request body for `POST /run`. `tf_path` is defaulted server-side when
/// omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KickoffRequest {
    pub repo: String,
    pub pr_number: u64,
    pub commit_sha: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tf_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub ok: bool,
    #[serde(default)]
    pub env: Option<String>,
    #[serde(default)]
    pub sync: Option<bool>,
}

/// The service timestamps runs with naive UTC datetimes; peers behind a
/// proxy have been seen emitting RFC 3339 with an offset. Accept both.
mod flexible_time {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(d: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(d)?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        if let Ok(t) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(Some(t.with_timezone(&Utc)));
        }
        NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| Some(naive.and_utc()))
            .map_err(serde::de::Error::custom)
    }
}
