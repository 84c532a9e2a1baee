use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::ticket::{Priority, SimilarTicket, Ticket, TicketStatus};

/// An active team member as the engine sees them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub timezone: String,
    pub role: String,
    pub skills: Vec<String>,
}

/// One ticket currently on a member's plate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveTicket {
    pub priority: Priority,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
}

/// Per-assignment snapshot of a member's day: leave, holidays, load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemberRuntime {
    pub on_pto: bool,
    pub regional_holiday: bool,
    pub global_holiday: bool,
    pub active_tickets: Vec<ActiveTicket>,
    pub recent_assignments_7d: u32,
}

/// Skill sets a ticket asks for, by tier. Any tier may be empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillRequirements {
    pub critical: Vec<String>,
    pub important: Vec<String>,
    pub nice_to_have: Vec<String>,
}

impl SkillRequirements {
    pub fn new(critical: Vec<String>, important: Vec<String>, nice_to_have: Vec<String>) -> Self {
        Self {
            critical: normalize_skills(critical),
            important: normalize_skills(important),
            nice_to_have: normalize_skills(nice_to_have),
        }
    }
}

/// Lowercase, trim and dedupe a skill list, keeping first-seen order.
pub fn normalize_skills<I, S>(skills: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for skill in skills {
        let name = skill.as_ref().trim().to_lowercase();
        if !name.is_empty() && seen.insert(name.clone()) {
            out.push(name);
        }
    }
    out
}

/// Directory and workload oracle.
///
/// Implementations must batch: `load_runtime` covers every listed member in
/// a bounded number of round-trips, never one query per candidate. It takes
/// the member snapshot (not bare ids) so region-dependent lookups like
/// holidays need no second directory fetch.
#[async_trait]
pub trait TeamOracle: Send + Sync {
    async fn list_members(&self) -> anyhow::Result<Vec<TeamMember>>;

    async fn load_runtime(
        &self,
        members: &[TeamMember],
        today: NaiveDate,
    ) -> anyhow::Result<HashMap<Uuid, MemberRuntime>>;
}

/// Derives tiered skill requirements from ticket text and category.
#[async_trait]
pub trait SkillExtractor: Send + Sync {
    async fn extract(&self, ticket_text: &str, category: &str) -> anyhow::Result<SkillRequirements>;
}

/// Supplies historically similar resolved tickets for a new ticket.
#[async_trait]
pub trait SimilarTicketProvider: Send + Sync {
    async fn find_similar(&self, ticket: &Ticket) -> anyhow::Result<Vec<SimilarTicket>>;
}
