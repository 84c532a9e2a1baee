use chrono::{DateTime, Utc};

use super::timezone::{TimeWindow, TzRegion};
use crate::oracle::{ActiveTicket, SkillRequirements};
use crate::ticket::{Priority, SimilarTicket, TicketStatus};

/// Skills assumed for members with nothing declared in the directory.
pub const DEFAULT_MEMBER_SKILLS: [&str; 2] = ["troubleshooting", "documentation"];

/// Combined load at which a member is considered at capacity.
pub const TEAM_MAX_LOAD: f64 = 30.0;

/// Overload kicks in at 80% of capacity.
pub const OVERLOAD_THRESHOLD: f64 = TEAM_MAX_LOAD * 0.8;

/// Per-factor weights for one priority level. Each row sums to 1.0.
#[derive(Debug, Clone, Copy)]
pub struct ScoreWeights {
    pub similarity: f64,
    pub skill: f64,
    pub availability: f64,
    pub workload: f64,
    pub timezone: f64,
}

impl ScoreWeights {
    pub fn sum(&self) -> f64 {
        self.similarity + self.skill + self.availability + self.workload + self.timezone
    }
}

/// Priority-conditioned weight matrix.
///
/// Urgent tickets weigh timezone heaviest (strict follow-the-sun routing);
/// Low tickets weigh workload heaviest (use them to rebalance the team).
pub fn weights_for(priority: Priority) -> ScoreWeights {
    match priority {
        Priority::Critical => ScoreWeights {
            similarity: 0.25,
            skill: 0.15,
            availability: 0.15,
            workload: 0.10,
            timezone: 0.35,
        },
        Priority::High => ScoreWeights {
            similarity: 0.25,
            skill: 0.15,
            availability: 0.15,
            workload: 0.15,
            timezone: 0.30,
        },
        Priority::Medium => ScoreWeights {
            similarity: 0.20,
            skill: 0.25,
            availability: 0.20,
            workload: 0.20,
            timezone: 0.15,
        },
        Priority::Low => ScoreWeights {
            similarity: 0.15,
            skill: 0.15,
            availability: 0.15,
            workload: 0.40,
            timezone: 0.15,
        },
    }
}

/// Similarity score with logarithmic dampening so frequent past assignees
/// don't run away with every ticket. Returns the score and how many of the
/// similar tickets this member resolved.
pub fn similarity_score(member_email: &str, similar: &[SimilarTicket]) -> (f64, usize) {
    let member_similar: Vec<&SimilarTicket> = similar
        .iter()
        .filter(|t| t.assignee_email == member_email)
        .collect();

    if member_similar.is_empty() {
        return (0.0, 0);
    }

    let solved_count = member_similar.len();

    // log(n+1) / log(6): 1 ticket = 0.39, 3 = 0.77, 5 = 1.0
    let expertise = ((solved_count as f64) + 1.0).ln() / 6.0_f64.ln();
    let expertise = expertise.min(1.0);

    let avg_similarity: f64 =
        member_similar.iter().map(|t| t.similarity_score).sum::<f64>() / solved_count as f64;

    let score = (expertise * 0.3 + avg_similarity * 0.7).min(1.0);
    (score, solved_count)
}

#[derive(Debug, Clone, Copy)]
pub struct SkillMatch {
    pub score: f64,
    pub has_critical_skills: bool,
}

/// Three-tier skill match. A member missing half the critical skills is
/// floored at 0.2 regardless of the other tiers; empty important/nice tiers
/// contribute a neutral 0.5 prior rather than zero.
pub fn skill_match_score(member_skills: &[String], requirements: &SkillRequirements) -> SkillMatch {
    let default_skills: Vec<String> =
        DEFAULT_MEMBER_SKILLS.iter().map(|s| s.to_string()).collect();
    let skills: &[String] = if member_skills.is_empty() {
        &default_skills
    } else {
        member_skills
    };

    let tier_match = |tier: &[String]| -> f64 {
        let hits = tier.iter().filter(|s| skills.contains(*s)).count() as f64;
        hits / (tier.len().max(1) as f64)
    };

    let critical_match = tier_match(&requirements.critical);

    if critical_match < 0.5 && !requirements.critical.is_empty() {
        return SkillMatch {
            score: 0.2,
            has_critical_skills: false,
        };
    }

    let important_match = if requirements.important.is_empty() {
        0.5
    } else {
        tier_match(&requirements.important)
    };
    let nice_match = if requirements.nice_to_have.is_empty() {
        0.5
    } else {
        tier_match(&requirements.nice_to_have)
    };

    let score = (critical_match * 0.6 + important_match * 0.3 + nice_match * 0.1).min(1.0);
    SkillMatch {
        score,
        has_critical_skills: true,
    }
}

#[derive(Debug, Clone)]
pub struct Availability {
    pub score: f64,
    pub note: Option<String>,
}

/// Availability is binary with one soft exception: global holidays bend for
/// urgent tickets. PTO and regional holidays never do.
pub fn availability_score(
    on_pto: bool,
    regional_holiday: bool,
    global_holiday: bool,
    priority: Priority,
) -> Availability {
    if on_pto {
        return Availability {
            score: 0.0,
            note: Some("On PTO/TimeOff".to_string()),
        };
    }

    if regional_holiday {
        return Availability {
            score: 0.0,
            note: Some("Regional public holiday".to_string()),
        };
    }

    if global_holiday {
        let score = match priority {
            Priority::Critical => 0.5,
            Priority::High => 0.3,
            Priority::Medium | Priority::Low => 0.0,
        };
        let note = if score > 0.0 {
            format!("Global holiday (emergency override for {} priority)", priority)
        } else {
            format!("Global holiday ({} priority can wait)", priority)
        };
        return Availability {
            score,
            note: Some(note),
        };
    }

    Availability { score: 1.0, note: None }
}

#[derive(Debug, Clone, Copy)]
pub struct WorkloadSummary {
    pub score: f64,
    pub weighted_load: f64,
    pub is_overloaded: bool,
}

/// Weighted workload: Critical counts triple, stuck tickets count more,
/// blocked/waiting tickets count less.
pub fn workload_score(active_tickets: &[ActiveTicket], now: DateTime<Utc>) -> WorkloadSummary {
    if active_tickets.is_empty() {
        return WorkloadSummary {
            score: 1.0,
            weighted_load: 0.0,
            is_overloaded: false,
        };
    }

    let mut total_load = 0.0;
    for ticket in active_tickets {
        let priority_weight = match ticket.priority {
            Priority::Critical => 3.0,
            Priority::High => 2.0,
            Priority::Medium => 1.0,
            Priority::Low => 0.5,
        };

        let age_days = (now - ticket.created_at).num_days();
        let age_penalty = if age_days > 7 {
            1.5
        } else if age_days > 3 {
            1.2
        } else {
            1.0
        };

        let status_weight = match ticket.status {
            TicketStatus::Blocked | TicketStatus::Waiting => 0.3,
            TicketStatus::InProgress => 1.0,
            TicketStatus::Open | TicketStatus::Pending => 0.5,
        };

        // Reserved: story-point estimates would slot in here.
        let complexity_factor = 1.0;

        total_load += priority_weight * age_penalty * status_weight * complexity_factor;
    }

    WorkloadSummary {
        score: (1.0 - total_load / TEAM_MAX_LOAD).max(0.0).min(1.0),
        weighted_load: total_load,
        is_overloaded: total_load >= OVERLOAD_THRESHOLD,
    }
}

/// Follow-the-Sun timezone score over the dual-overlap window table, with
/// strict enforcement for urgent tickets and a bounded cross-timezone
/// allowance for members who have solved at least three similar tickets.
pub fn timezone_score(
    zone: TzRegion,
    hour_utc: f64,
    priority: Priority,
    solved_similar_count: usize,
) -> f64 {
    let window = TimeWindow::classify(hour_utc);

    let mut score = match (window, zone) {
        (TimeWindow::MorningOverlap, TzRegion::Ist) => 0.85,
        (TimeWindow::MorningOverlap, TzRegion::Us) => 1.0,
        (TimeWindow::MorningOverlap, TzRegion::Other) => 0.6,

        (TimeWindow::EveningOverlap, TzRegion::Ist) => 1.0,
        (TimeWindow::EveningOverlap, TzRegion::Us) => 0.85,
        (TimeWindow::EveningOverlap, TzRegion::Other) => 0.6,

        (TimeWindow::IstOnly, TzRegion::Ist) => 1.0,
        (TimeWindow::IstOnly, TzRegion::Us) => 0.5,
        (TimeWindow::IstOnly, TzRegion::Other) => 0.4,

        (TimeWindow::UsOnly, TzRegion::Us) => 1.0,
        (TimeWindow::UsOnly, TzRegion::Ist) => 0.5,
        (TimeWindow::UsOnly, TzRegion::Other) => 0.4,
    };

    // Strict enforcement for urgent tickets: off-shift candidates drop
    // further instead of hovering near the middle.
    if priority.is_urgent() {
        if score == 0.5 {
            score = 0.3;
        } else if score == 0.4 {
            score = 0.2;
        }
    }

    // Cross-timezone expertise, earned within this ticket's similar set.
    if solved_similar_count >= 3 {
        match priority {
            Priority::Medium | Priority::Low => {
                if window.is_overlap() {
                    if score < 0.85 {
                        score = 0.85;
                    }
                } else if score < 0.75 {
                    // Off-hours expert: leave them alone rather than boost.
                    score = 0.4;
                }
            }
            Priority::Critical | Priority::High => {
                if (0.3..0.6).contains(&score) {
                    score = 0.6;
                }
            }
        }
    }

    score
}
