use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::rules::apply_business_rules;
use super::scoring;
use super::timezone::{utc_hour, Clock, TzRegion};
use super::{
    AssignmentCandidate, AssignmentDecision, AssignmentType, EngineError, TriggerSeverity,
    SIMILARITY_THRESHOLD,
};
use crate::oracle::{MemberRuntime, SkillExtractor, SkillRequirements, TeamMember, TeamOracle};
use crate::ticket::{SimilarTicket, Ticket};

/// Multi-factor assignment engine.
///
/// Pure with respect to its inputs: the same ticket, similar-ticket list,
/// oracle snapshot and clock reading always produce the same decision.
pub struct AssignmentEngine {
    oracle: Arc<dyn TeamOracle>,
    skills: Arc<dyn SkillExtractor>,
    clock: Arc<dyn Clock>,
}

impl AssignmentEngine {
    pub fn new(oracle: Arc<dyn TeamOracle>, skills: Arc<dyn SkillExtractor>, clock: Arc<dyn Clock>) -> Self {
        Self { oracle, skills, clock }
    }

    /// Assign a ticket, or route it to a human when the engine should not.
    pub async fn assign(
        &self,
        ticket: &Ticket,
        similar_tickets: &[SimilarTicket],
    ) -> Result<AssignmentDecision, EngineError> {
        let now = self.clock.now_utc();

        // Step 1: similarity gate. Without a strong historical pattern the
        // team decides, not the engine.
        let max_similarity = similar_tickets
            .iter()
            .map(|t| t.similarity_score)
            .fold(0.0_f64, f64::max);

        if max_similarity < SIMILARITY_THRESHOLD {
            log::info!(
                "ticket {}: best similarity {:.2} below threshold, requesting review",
                ticket.ticket_id,
                max_similarity
            );
            return Ok(AssignmentDecision::review(
                AssignmentType::HumanReview,
                "no_similar_pattern",
                TriggerSeverity::High,
                &ticket.ticket_id,
                &ticket.title,
                now,
            ));
        }

        // Step 2: extract skills once for all candidates, then evaluate.
        let requirements = self
            .skills
            .extract(&ticket.search_text(), &ticket.category)
            .await
            .map_err(EngineError::OracleUnavailable)?;

        let members = self
            .oracle
            .list_members()
            .await
            .map_err(EngineError::OracleUnavailable)?;

        let runtimes = self
            .oracle
            .load_runtime(&members, now.date_naive())
            .await
            .map_err(EngineError::OracleUnavailable)?;

        let mut candidates: Vec<AssignmentCandidate> = members
            .iter()
            .map(|member| {
                let runtime = runtimes.get(&member.id).cloned().unwrap_or_default();
                evaluate_candidate(member, &runtime, ticket, similar_tickets, &requirements, now)
            })
            .collect();

        // A set where nobody can work today is an empty set.
        if candidates.is_empty() || candidates.iter().all(|c| c.availability_score <= 0.0) {
            return Ok(AssignmentDecision::review(
                AssignmentType::HumanReview,
                "no_available_members",
                TriggerSeverity::Critical,
                &ticket.ticket_id,
                &ticket.title,
                now,
            ));
        }

        // Step 3: rank, deterministically.
        rank_candidates(&mut candidates);

        // Step 4: business rules produce the final decision.
        let decision = apply_business_rules(ticket, &candidates, utc_hour(now), now);

        log::info!(
            "ticket {}: {:?} -> {:?} (confidence {:.2})",
            ticket.ticket_id,
            decision.assignment_type,
            decision.primary_assignee,
            decision.confidence_score
        );

        Ok(decision)
    }
}

/// Score one member against the ticket using their runtime snapshot.
fn evaluate_candidate(
    member: &TeamMember,
    runtime: &MemberRuntime,
    ticket: &Ticket,
    similar_tickets: &[SimilarTicket],
    requirements: &SkillRequirements,
    now: DateTime<Utc>,
) -> AssignmentCandidate {
    let weights = scoring::weights_for(ticket.priority);

    let (similarity, solved_count) = scoring::similarity_score(&member.email, similar_tickets);

    let member_skills = crate::oracle::normalize_skills(member.skills.iter());
    let skill_match = scoring::skill_match_score(&member_skills, requirements);

    let availability = scoring::availability_score(
        runtime.on_pto,
        runtime.regional_holiday,
        runtime.global_holiday,
        ticket.priority,
    );

    let workload = scoring::workload_score(&runtime.active_tickets, now);

    let zone = TzRegion::classify(&member.timezone);
    let tz_score = scoring::timezone_score(zone, utc_hour(now), ticket.priority, solved_count);

    let final_score = similarity * weights.similarity
        + skill_match.score * weights.skill
        + availability.score * weights.availability
        + workload.score * weights.workload
        + tz_score * weights.timezone;

    let mut notes = Vec::new();
    if let Some(note) = availability.note {
        notes.push(note);
    }

    AssignmentCandidate {
        member_id: member.id.to_string(),
        email: member.email.clone(),
        name: member.name.clone(),
        timezone: member.timezone.clone(),
        similarity_score: similarity,
        skill_match_score: skill_match.score,
        availability_score: availability.score,
        workload_score: workload.score,
        timezone_score: tz_score,
        final_score,
        solved_similar_count: solved_count,
        active_tickets_count: runtime.active_tickets.len(),
        recent_assignments_7d: runtime.recent_assignments_7d,
        weighted_workload: workload.weighted_load,
        is_overloaded: workload.is_overloaded,
        has_critical_skills: skill_match.has_critical_skills,
        notes,
    }
}

/// Best-first ordering: final score, then availability, then skill match,
/// then email for a stable deterministic tail.
fn rank_candidates(candidates: &mut [AssignmentCandidate]) {
    candidates.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                b.availability_score
                    .partial_cmp(&a.availability_score)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| {
                b.skill_match_score
                    .partial_cmp(&a.skill_match_score)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.email.cmp(&b.email))
    });
}
