use chrono::{DateTime, Utc};

use super::timezone::{preferred_region, TzRegion};
use super::{AssignmentCandidate, AssignmentDecision, AssignmentType, TriggerSeverity};
use crate::ticket::Ticket;

/// Recent-assignment count at which fair distribution starts overriding.
const FAIR_DISTRIBUTION_CAP: u32 = 5;

/// Score margin an out-of-zone expert must hold to keep the ticket.
const CROSS_TZ_EXPERT_MARGIN: f64 = 0.30;

/// Apply business rules R1-R5 to the ranked candidate list and produce the
/// final decision. `candidates` must already be sorted best-first.
pub fn apply_business_rules(
    ticket: &Ticket,
    candidates: &[AssignmentCandidate],
    hour_utc: f64,
    now: DateTime<Utc>,
) -> AssignmentDecision {
    let mut decision = AssignmentDecision::new(AssignmentType::Normal, &ticket.ticket_id, now);
    decision.set_top_candidates(candidates);

    let mut top = &candidates[0];

    // R1: overload prevention.
    if top.is_overloaded || top.workload_score < 0.3 {
        decision.rules_applied.push("overload_prevention".to_string());

        let replacement = candidates.iter().find(|c| {
            !c.is_overloaded && c.availability_score > 0.0 && c.workload_score >= 0.5
        });

        match replacement {
            Some(candidate) => {
                decision.reasoning.push(format!(
                    "Top choice ({}) is overloaded. Assigned to next available: {}",
                    top.name, candidate.name
                ));
                top = candidate;
            }
            None => {
                // Everyone is at capacity.
                let mut escalation = AssignmentDecision::review(
                    AssignmentType::Escalation,
                    "team_at_capacity",
                    TriggerSeverity::Critical,
                    &ticket.ticket_id,
                    &ticket.title,
                    now,
                );
                escalation.rules_applied.push("overload_prevention".to_string());
                escalation.set_top_candidates(candidates);
                return escalation;
            }
        }
    }

    // R2: timezone vs expertise.
    let preferred = preferred_region(hour_utc);
    if !zone_matches(top, preferred) && top.similarity_score > 0.7 {
        decision.rules_applied.push("timezone_vs_expertise".to_string());

        if let Some(best_in_tz) = candidates.iter().find(|c| zone_matches(c, preferred)) {
            if top.final_score - best_in_tz.final_score > CROSS_TZ_EXPERT_MARGIN {
                decision.reasoning.push(format!(
                    "Cross-timezone assignment: {} is expert (solved {} similar tickets)",
                    top.name, top.solved_similar_count
                ));
            } else {
                top = best_in_tz;
                decision
                    .reasoning
                    .push("Preferred in-timezone member with comparable skills".to_string());
            }
        }
    }

    // R3: fair distribution over the trailing 7 days.
    if top.recent_assignments_7d >= FAIR_DISTRIBUTION_CAP {
        decision.rules_applied.push("fair_distribution".to_string());

        let less_loaded = candidates.iter().skip(1).take(4).find(|c| {
            c.recent_assignments_7d < FAIR_DISTRIBUTION_CAP && c.availability_score > 0.0
        });

        if let Some(candidate) = less_loaded {
            decision.reasoning.push(format!(
                "{} has {} assignments in last 7 days. Fair distribution to {} ({} recent assignments)",
                top.name, top.recent_assignments_7d, candidate.name, candidate.recent_assignments_7d
            ));
            top = candidate;
        }
    }

    // R4: skills gap flag, advisory only.
    if top.skill_match_score < 0.25 {
        decision.rules_applied.push("skills_gap_detected".to_string());
        decision.reasoning.push(
            "Skills gap detected - no team member is strong match. \
             Consider external consultation or training."
                .to_string(),
        );
    }

    // R5: confidence gate.
    let confidence = calculate_confidence(top, candidates);
    decision.confidence_score = confidence;

    if confidence < 0.3 {
        let mut review = AssignmentDecision::review(
            AssignmentType::HumanReview,
            "low_confidence_assignment",
            TriggerSeverity::Medium,
            &ticket.ticket_id,
            &ticket.title,
            now,
        );
        review.confidence_score = confidence;
        review.set_top_candidates(candidates);
        return review;
    } else if confidence < 0.5 {
        decision.rules_applied.push("team_lead_notification".to_string());
        decision
            .reasoning
            .push("Medium confidence assignment - team lead notified".to_string());
    }

    decision.primary_assignee = Some(top.email.clone());
    decision.reasoning.push(format!(
        "Assigned to {}: Score={:.2} (Similarity={:.2}, Skills={:.2}, Availability={:.2})",
        top.name, top.final_score, top.similarity_score, top.skill_match_score, top.availability_score
    ));

    decision
}

fn zone_matches(candidate: &AssignmentCandidate, preferred: TzRegion) -> bool {
    TzRegion::classify(&candidate.timezone) == preferred
}

/// Confidence is the fraction of five sanity checks the selection passes.
/// The margin check compares against the overall second-ranked candidate.
pub fn calculate_confidence(selected: &AssignmentCandidate, ranked: &[AssignmentCandidate]) -> f64 {
    let factors = [
        selected.similarity_score > 0.70,
        selected.skill_match_score > 0.5,
        selected.availability_score > 0.7,
        ranked.len() > 1 && (selected.final_score - ranked[1].final_score) > 0.15,
        selected.timezone_score >= 1.0,
    ];

    factors.iter().filter(|&&f| f).count() as f64 / factors.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::Priority;

    fn candidate(name: &str, final_score: f64) -> AssignmentCandidate {
        AssignmentCandidate {
            member_id: name.to_string(),
            email: format!("{}@corp.test", name),
            name: name.to_string(),
            timezone: "Asia/Kolkata".to_string(),
            similarity_score: 0.8,
            skill_match_score: 0.8,
            availability_score: 1.0,
            workload_score: 0.9,
            timezone_score: 1.0,
            final_score,
            solved_similar_count: 2,
            active_tickets_count: 0,
            recent_assignments_7d: 0,
            weighted_workload: 0.0,
            is_overloaded: false,
            has_critical_skills: true,
            notes: Vec::new(),
        }
    }

    fn ticket() -> Ticket {
        Ticket {
            ticket_id: "INC0001".to_string(),
            title: "s3 bucket access denied".to_string(),
            description: "cross-account access failing".to_string(),
            category: "GCP".to_string(),
            priority: Priority::Medium,
        }
    }

    #[test]
    fn overloaded_top_is_skipped() {
        let mut c1 = candidate("carol", 0.9);
        c1.is_overloaded = true;
        c1.workload_score = 0.0;
        let c2 = candidate("dave", 0.62);

        let decision = apply_business_rules(&ticket(), &[c1, c2], 8.0, Utc::now());
        assert_eq!(decision.primary_assignee.as_deref(), Some("dave@corp.test"));
        assert!(decision.rules_applied.contains(&"overload_prevention".to_string()));
    }

    #[test]
    fn whole_team_at_capacity_escalates() {
        let mut c1 = candidate("carol", 0.9);
        c1.is_overloaded = true;
        let mut c2 = candidate("dave", 0.6);
        c2.workload_score = 0.2;

        let decision = apply_business_rules(&ticket(), &[c1, c2], 8.0, Utc::now());
        assert_eq!(decision.assignment_type, AssignmentType::Escalation);
        assert!(decision.primary_assignee.is_none());
        assert_eq!(decision.human_review_triggers[0].reason, "team_at_capacity");
        assert_eq!(decision.human_review_triggers[0].severity, TriggerSeverity::Critical);
    }

    #[test]
    fn out_of_zone_expert_loses_close_race_to_in_zone() {
        // 08:00 UTC: IST preferred. Top is a US expert, margin under 0.30.
        let mut us_expert = candidate("erin", 0.80);
        us_expert.timezone = "America/Chicago".to_string();
        us_expert.similarity_score = 0.85;
        let ist_local = candidate("farid", 0.65);

        let decision = apply_business_rules(&ticket(), &[us_expert, ist_local], 8.0, Utc::now());
        assert_eq!(decision.primary_assignee.as_deref(), Some("farid@corp.test"));
        assert!(decision.rules_applied.contains(&"timezone_vs_expertise".to_string()));
    }

    #[test]
    fn out_of_zone_expert_keeps_clear_lead() {
        let mut us_expert = candidate("erin", 0.99);
        us_expert.timezone = "America/Chicago".to_string();
        us_expert.similarity_score = 0.85;
        us_expert.solved_similar_count = 4;
        let ist_local = candidate("farid", 0.60);

        let decision = apply_business_rules(&ticket(), &[us_expert, ist_local], 8.0, Utc::now());
        assert_eq!(decision.primary_assignee.as_deref(), Some("erin@corp.test"));
        let joined = decision.reasoning.join(" ");
        assert!(joined.contains("Cross-timezone assignment"));
    }

    #[test]
    fn fair_distribution_swaps_to_rested_candidate() {
        let mut busy = candidate("eve", 0.9);
        busy.recent_assignments_7d = 7;
        let mut rested = candidate("frank", 0.7);
        rested.recent_assignments_7d = 1;

        let decision = apply_business_rules(&ticket(), &[busy, rested], 8.0, Utc::now());
        assert_eq!(decision.primary_assignee.as_deref(), Some("frank@corp.test"));
        assert!(decision.rules_applied.contains(&"fair_distribution".to_string()));
    }

    #[test]
    fn fair_distribution_only_scans_top_five() {
        let mut busy = candidate("eve", 0.9);
        busy.recent_assignments_7d = 7;
        let mut also_busy: Vec<AssignmentCandidate> = (0..4)
            .map(|i| {
                let mut c = candidate(&format!("busy{}", i), 0.8 - i as f64 * 0.01);
                c.recent_assignments_7d = 6;
                c
            })
            .collect();
        let mut rested = candidate("zoe", 0.5);
        rested.recent_assignments_7d = 0;

        let mut all = vec![busy];
        all.append(&mut also_busy);
        all.push(rested); // rank 6, outside the scan window

        let decision = apply_business_rules(&ticket(), &all, 8.0, Utc::now());
        // No eligible swap inside positions 2..5: eve keeps the ticket.
        assert_eq!(decision.primary_assignee.as_deref(), Some("eve@corp.test"));
    }

    #[test]
    fn skills_gap_flags_without_reassigning() {
        let mut weak = candidate("gina", 0.9);
        weak.skill_match_score = 0.2;
        let other = candidate("hal", 0.6);

        let decision = apply_business_rules(&ticket(), &[weak, other], 8.0, Utc::now());
        assert_eq!(decision.primary_assignee.as_deref(), Some("gina@corp.test"));
        assert!(decision.rules_applied.contains(&"skills_gap_detected".to_string()));
    }

    #[test]
    fn low_confidence_goes_to_human_review() {
        let mut shaky = candidate("ivan", 0.5);
        shaky.similarity_score = 0.1;
        shaky.skill_match_score = 0.3;
        shaky.availability_score = 0.5;
        shaky.timezone_score = 0.5;
        let mut close = candidate("judy", 0.49);
        close.similarity_score = 0.1;

        let decision = apply_business_rules(&ticket(), &[shaky, close], 8.0, Utc::now());
        assert_eq!(decision.assignment_type, AssignmentType::HumanReview);
        assert!(decision.primary_assignee.is_none());
        assert_eq!(
            decision.human_review_triggers[0].reason,
            "low_confidence_assignment"
        );
    }

    #[test]
    fn medium_confidence_tags_team_lead() {
        // Two factors true: skills and availability -> 0.4
        let mut middling = candidate("kim", 0.6);
        middling.similarity_score = 0.5;
        middling.timezone_score = 0.85;
        let close = candidate("lee", 0.55);

        let decision = apply_business_rules(&ticket(), &[middling, close], 8.0, Utc::now());
        assert_eq!(decision.assignment_type, AssignmentType::Normal);
        assert_eq!(decision.primary_assignee.as_deref(), Some("kim@corp.test"));
        assert!(decision.rules_applied.contains(&"team_lead_notification".to_string()));
    }

    #[test]
    fn confidence_counts_factors_in_fifths() {
        let strong = candidate("mia", 0.95);
        let weak = candidate("nat", 0.5);
        // All five factors true for mia.
        assert_eq!(calculate_confidence(&strong, &[strong.clone(), weak]), 1.0);

        let mut none = candidate("oli", 0.4);
        none.similarity_score = 0.0;
        none.skill_match_score = 0.0;
        none.availability_score = 0.0;
        none.timezone_score = 0.0;
        let peer = candidate("pam", 0.4);
        assert_eq!(calculate_confidence(&none, &[none.clone(), peer]), 0.0);
    }

    #[test]
    fn confidence_is_monotone_in_factors() {
        let mut c = candidate("quin", 0.9);
        c.similarity_score = 0.0;
        c.skill_match_score = 0.0;
        c.availability_score = 0.0;
        c.timezone_score = 0.0;
        let peer = candidate("ray", 0.5);
        let ranked = vec![c.clone(), peer];

        let base = calculate_confidence(&c, &ranked);
        let mut better = c.clone();
        better.similarity_score = 0.9;
        let improved = calculate_confidence(&better, &ranked);
        assert!(improved >= base);

        better.skill_match_score = 0.9;
        assert!(calculate_confidence(&better, &ranked) >= improved);
    }

    #[test]
    fn top_candidates_keep_ranked_order_after_swaps() {
        let mut busy = candidate("eve", 0.9);
        busy.recent_assignments_7d = 7;
        let mut rested = candidate("frank", 0.7);
        rested.recent_assignments_7d = 1;
        let third = candidate("gus", 0.6);

        let decision =
            apply_business_rules(&ticket(), &[busy, rested, third], 8.0, Utc::now());
        let emails: Vec<_> = decision.top_candidates.iter().map(|c| c.email.as_str()).collect();
        assert_eq!(emails, vec!["eve@corp.test", "frank@corp.test", "gus@corp.test"]);
    }
}
