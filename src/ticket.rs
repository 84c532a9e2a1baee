use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ticket priority, canonicalized from the ServiceNow wire format.
///
/// ServiceNow sends `"1 - Critical"` .. `"5 - Planning"`; Planning folds into
/// Low. Anything unrecognized downgrades to Medium instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn canonicalize(raw: &str) -> Self {
        let label = raw.trim();
        // Strip the numeric prefix from "1 - Critical" style values
        let label = match label.split_once(" - ") {
            Some((_, name)) => name,
            None => label,
        };

        match label.trim().to_lowercase().as_str() {
            "critical" | "1" => Priority::Critical,
            "high" | "2" => Priority::High,
            "medium" | "3" => Priority::Medium,
            "low" | "4" => Priority::Low,
            "planning" | "5" => Priority::Low,
            _ => Priority::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "Critical",
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        }
    }

    pub fn is_urgent(&self) -> bool {
        matches!(self, Priority::Critical | Priority::High)
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of an active ticket on somebody's plate.
///
/// Upstream systems spell these several ways ("OPEN", "In Progress",
/// "in_progress"); everything is folded into this vocabulary at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketStatus {
    Open,
    InProgress,
    Pending,
    Blocked,
    Waiting,
}

impl TicketStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        let folded: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();

        match folded.as_str() {
            "open" => Some(TicketStatus::Open),
            "inprogress" => Some(TicketStatus::InProgress),
            "pending" => Some(TicketStatus::Pending),
            "blocked" => Some(TicketStatus::Blocked),
            "waiting" => Some(TicketStatus::Waiting),
            _ => None,
        }
    }
}

/// The ticket under assignment, as seen by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub ticket_id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub priority: Priority,
}

impl Ticket {
    /// Text blob handed to embedding and skill extraction.
    pub fn search_text(&self) -> String {
        format!("Title: {}\n\nDescription: {}", self.title, self.description)
    }
}

/// A historically similar, already-resolved ticket.
///
/// `assignee_email` is carried on the record itself so departed team members
/// still resolve (they simply never match an active member).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarTicket {
    pub similarity_score: f64,
    pub assignee_email: String,
    pub priority: Priority,
    pub resolved_at: Option<DateTime<Utc>>,
}
