use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod engine;
pub mod rules;
pub mod scoring;
pub mod store;
pub mod timezone;

pub use engine::AssignmentEngine;

/// Minimum best-match similarity before the engine will auto-assign at all.
pub const SIMILARITY_THRESHOLD: f64 = 0.70;

/// A potential assignee with every scoring factor filled in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentCandidate {
    pub member_id: String,
    pub email: String,
    pub name: String,
    pub timezone: String,

    // Score components (0.0 - 1.0)
    pub similarity_score: f64,
    pub skill_match_score: f64,
    pub availability_score: f64,
    pub workload_score: f64,
    pub timezone_score: f64,

    // Final weighted score
    pub final_score: f64,

    // Supporting data
    pub solved_similar_count: usize,
    pub active_tickets_count: usize,
    pub recent_assignments_7d: u32,
    pub weighted_workload: f64,

    // Flags
    pub is_overloaded: bool,
    pub has_critical_skills: bool,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentType {
    Normal,
    Collaborative,
    HumanReview,
    Escalation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerSeverity {
    Critical,
    High,
    Medium,
    Low,
}

/// One human-in-the-loop escalation request attached to a decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewTrigger {
    pub reason: String,
    pub severity: TriggerSeverity,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    pub message: String,
    pub ticket_id: String,
    pub ticket_title: String,
}

impl ReviewTrigger {
    pub fn new(reason: &str, severity: TriggerSeverity, ticket_id: &str, ticket_title: &str) -> Self {
        let (action, timeout, message) = match severity {
            TriggerSeverity::Critical => (
                "immediate_manager_escalation",
                None,
                "Team at capacity or critical issue requires immediate attention",
            ),
            TriggerSeverity::High => (
                "team_consultation_email",
                Some("1 hour"),
                "No similar pattern found - team input needed",
            ),
            TriggerSeverity::Medium => (
                "team_lead_review",
                Some("15 minutes"),
                "Low confidence assignment - team lead review requested",
            ),
            TriggerSeverity::Low => ("assign_with_note", None, "Assigned with advisory note"),
        };

        Self {
            reason: reason.to_string(),
            severity,
            action: action.to_string(),
            timeout: timeout.map(str::to_string),
            message: message.to_string(),
            ticket_id: ticket_id.to_string(),
            ticket_title: ticket_title.to_string(),
        }
    }
}

/// Per-factor breakdown surfaced with each top candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub similarity: f64,
    pub skill: f64,
    pub availability: f64,
    pub workload: f64,
    pub timezone: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSummary {
    pub name: String,
    pub email: String,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

impl CandidateSummary {
    fn from_candidate(c: &AssignmentCandidate) -> Self {
        Self {
            name: c.name.clone(),
            email: c.email.clone(),
            score: round3(c.final_score),
            breakdown: ScoreBreakdown {
                similarity: round2(c.similarity_score),
                skill: round2(c.skill_match_score),
                availability: round2(c.availability_score),
                workload: round2(c.workload_score),
                timezone: round2(c.timezone_score),
            },
        }
    }
}

/// Final assignment decision with full reasoning, the only artifact that
/// outlives an `assign` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentDecision {
    pub assignment_type: AssignmentType,
    pub primary_assignee: Option<String>,
    pub secondary_assignee: Option<String>,
    pub confidence_score: f64,

    pub reasoning: Vec<String>,
    pub rules_applied: Vec<String>,
    pub human_review_triggers: Vec<ReviewTrigger>,

    /// First three entries of the ranked candidate list, pre-arbitration.
    pub top_candidates: Vec<CandidateSummary>,

    // Reserved extension points, never populated by the current rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicted_resolution_hours: Option<f64>,

    pub ticket_id: String,
    pub assigned_at: DateTime<Utc>,
}

impl AssignmentDecision {
    pub fn new(assignment_type: AssignmentType, ticket_id: &str, assigned_at: DateTime<Utc>) -> Self {
        Self {
            assignment_type,
            primary_assignee: None,
            secondary_assignee: None,
            confidence_score: 0.0,
            reasoning: Vec::new(),
            rules_applied: Vec::new(),
            human_review_triggers: Vec::new(),
            top_candidates: Vec::new(),
            predicted_resolution_hours: None,
            ticket_id: ticket_id.to_string(),
            assigned_at,
        }
    }

    /// A no-assignment decision that routes the ticket to a human.
    pub fn review(
        assignment_type: AssignmentType,
        reason: &str,
        severity: TriggerSeverity,
        ticket_id: &str,
        ticket_title: &str,
        assigned_at: DateTime<Utc>,
    ) -> Self {
        let mut decision = Self::new(assignment_type, ticket_id, assigned_at);
        decision
            .human_review_triggers
            .push(ReviewTrigger::new(reason, severity, ticket_id, ticket_title));
        decision.reasoning.push(format!(
            "Human review triggered: {} (severity: {})",
            reason,
            severity_label(severity)
        ));
        decision
    }

    /// Escalation emitted by the worker when the data layer is down.
    pub fn oracle_unavailable(ticket_id: &str, ticket_title: &str, assigned_at: DateTime<Utc>) -> Self {
        Self::review(
            AssignmentType::Escalation,
            "oracle_unavailable",
            TriggerSeverity::Critical,
            ticket_id,
            ticket_title,
            assigned_at,
        )
    }

    pub fn set_top_candidates(&mut self, ranked: &[AssignmentCandidate]) {
        self.top_candidates = ranked.iter().take(3).map(CandidateSummary::from_candidate).collect();
    }
}

fn severity_label(severity: TriggerSeverity) -> &'static str {
    match severity {
        TriggerSeverity::Critical => "critical",
        TriggerSeverity::High => "high",
        TriggerSeverity::Medium => "medium",
        TriggerSeverity::Low => "low",
    }
}

/// The engine either returns a decision or one of these, never both.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("assignment oracle unavailable: {0}")]
    OracleUnavailable(anyhow::Error),
}

pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub(crate) fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}
