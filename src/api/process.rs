use actix_web::{web, HttpResponse, Result};
use chrono::Utc;
use std::sync::Arc;

use crate::api::webhook::ServiceNowPayload;
use crate::database::TicketRepository;
use crate::engine::store::DecisionStore;
use crate::engine::{AssignmentDecision, AssignmentEngine, AssignmentType, EngineError};
use crate::error::AppError;
use crate::notify::NotificationService;
use crate::oracle::SimilarTicketProvider;
use crate::pubsub::PubSubEnvelope;
use crate::ticket::{Priority, Ticket};

/// Consumes ticket events off the bus and runs them through the assignment
/// pipeline: persist, fetch similar history, decide, store, notify.
pub struct TicketProcessor {
    engine: Arc<AssignmentEngine>,
    similar: Arc<dyn SimilarTicketProvider>,
    decisions: Arc<dyn DecisionStore>,
    notifier: Arc<NotificationService>,
    tickets: Arc<dyn TicketRepository>,
}

impl TicketProcessor {
    pub fn new(
        engine: Arc<AssignmentEngine>,
        similar: Arc<dyn SimilarTicketProvider>,
        decisions: Arc<dyn DecisionStore>,
        notifier: Arc<NotificationService>,
        tickets: Arc<dyn TicketRepository>,
    ) -> Self {
        Self {
            engine,
            similar,
            decisions,
            notifier,
            tickets,
        }
    }

    pub async fn handle_event(&self, payload: ServiceNowPayload, webhook_id: &str) -> Result<(), AppError> {
        let ticket = Ticket {
            ticket_id: payload.ticket_id.clone(),
            title: payload.title.clone(),
            description: payload.description.clone(),
            category: payload.category.clone().unwrap_or_default(),
            priority: Priority::canonicalize(&payload.priority),
        };

        match payload.event_type.as_str() {
            "incident.created" | "task.created" => {
                self.assign_new_ticket(&ticket, &payload, webhook_id).await
            }
            "incident.closed" | "incident.resolved" | "task.closed" | "task.resolved" => {
                self.tickets
                    .mark_ticket_closed(&ticket.ticket_id, &payload.status)
                    .await?;
                log::info!("[{}] Ticket {} closed out", webhook_id, ticket.ticket_id);
                Ok(())
            }
            other => Err(AppError::BadRequest(format!(
                "Event type '{}' is not supported",
                other
            ))),
        }
    }

    async fn assign_new_ticket(
        &self,
        ticket: &Ticket,
        payload: &ServiceNowPayload,
        webhook_id: &str,
    ) -> Result<(), AppError> {
        self.tickets
            .upsert_ticket(ticket, &payload.status, &payload.caller_id)
            .await?;

        let similar = self
            .similar
            .find_similar(ticket)
            .await
            .map_err(|e| AppError::AssignmentError(format!("similar-ticket lookup failed: {}", e)))?;

        log::info!(
            "[{}] Ticket {}: {} similar tickets fetched",
            webhook_id,
            ticket.ticket_id,
            similar.len()
        );

        let decision = match self.engine.assign(ticket, &similar).await {
            Ok(decision) => decision,
            Err(EngineError::OracleUnavailable(e)) => {
                // No assignment, but still a decision: escalate and move on
                // rather than bouncing the message forever.
                log::error!("[{}] Oracle unavailable for {}: {}", webhook_id, ticket.ticket_id, e);
                AssignmentDecision::oracle_unavailable(&ticket.ticket_id, &ticket.title, Utc::now())
            }
        };

        self.decisions.save_decision(&decision).await?;

        if decision.assignment_type == AssignmentType::Normal {
            if let Some(assignee) = &decision.primary_assignee {
                self.tickets
                    .set_ticket_assignee(&ticket.ticket_id, assignee)
                    .await?;
            }
        }

        if let Err(e) = self.notifier.notify_decision(&decision).await {
            // Notification failures must not trigger redelivery; the
            // decision is already persisted.
            log::error!("[{}] Notification failed for {}: {}", webhook_id, ticket.ticket_id, e);
        }

        Ok(())
    }
}

/// Receive a push message from the Pub/Sub subscription.
///
/// 400 drops malformed messages for good; anything else that fails maps to
/// 5xx so Pub/Sub redelivers.
pub async fn process_ticket(
    envelope: web::Json<PubSubEnvelope>,
    processor: web::Data<Arc<TicketProcessor>>,
) -> Result<HttpResponse, AppError> {
    let envelope = envelope.into_inner();

    let webhook_id = envelope
        .message
        .attributes
        .get("webhook_id")
        .cloned()
        .unwrap_or_else(|| format!("message_{}", envelope.message.message_id));

    log::info!(
        "[{}] Received Pub/Sub message {} from {}",
        webhook_id,
        envelope.message.message_id,
        envelope.subscription
    );

    let data = envelope
        .message
        .decoded_data()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let payload: ServiceNowPayload = serde_json::from_slice(&data)
        .map_err(|e| AppError::BadRequest(format!("Invalid ticket data in message: {}", e)))?;

    processor.handle_event(payload, &webhook_id).await?;

    Ok(HttpResponse::NoContent().finish())
}

pub fn configure_process_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/process_ticket", web::post().to(process_ticket));
}
