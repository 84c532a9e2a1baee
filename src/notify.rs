use anyhow::{anyhow, Result};
use reqwest::Client;
use serde_json::json;

use crate::engine::{AssignmentDecision, AssignmentType};

/// Posts assignment outcomes and escalation triggers to the team's chat
/// webhook. With no webhook configured it degrades to log-only, which is
/// what development environments want.
pub struct NotificationService {
    client: Client,
    webhook_url: Option<String>,
}

impl NotificationService {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            webhook_url,
        }
    }

    /// Fan a decision out to the handoff/notification sink.
    pub async fn notify_decision(&self, decision: &AssignmentDecision) -> Result<()> {
        let text = render_decision(decision);

        let url = match &self.webhook_url {
            Some(url) => url,
            None => {
                log::debug!("notification webhook not configured: {}", text);
                return Ok(());
            }
        };

        let response = self
            .client
            .post(url)
            .json(&json!({
                "text": text,
                "ticket_id": decision.ticket_id,
                "assignment_type": decision.assignment_type,
                "triggers": decision.human_review_triggers,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("notification webhook failed ({}): {}", status, body));
        }

        Ok(())
    }
}

fn render_decision(decision: &AssignmentDecision) -> String {
    match decision.assignment_type {
        AssignmentType::Normal | AssignmentType::Collaborative => format!(
            "Ticket {} assigned to {} (confidence {:.2})",
            decision.ticket_id,
            decision.primary_assignee.as_deref().unwrap_or("<unset>"),
            decision.confidence_score
        ),
        AssignmentType::HumanReview | AssignmentType::Escalation => {
            let trigger = decision.human_review_triggers.first();
            format!(
                "Ticket {} needs a human: {} -> {}",
                decision.ticket_id,
                trigger.map(|t| t.reason.as_str()).unwrap_or("unknown"),
                trigger.map(|t| t.action.as_str()).unwrap_or("review"),
            )
        }
    }
}
