use actix_web::{web, HttpRequest, HttpResponse, Result};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;

use crate::config::Settings;
use crate::error::AppError;
use crate::pubsub::TicketPublisher;

type HmacSha256 = Hmac<Sha256>;

/// Event types the gateway accepts; everything else is a 400.
const ALLOWED_EVENT_TYPES: [&str; 6] = [
    "incident.created",
    "incident.closed",
    "incident.resolved",
    "task.created",
    "task.closed",
    "task.resolved",
];

/// ServiceNow webhook payload. The gateway validates shape only; the worker
/// owns canonicalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceNowPayload {
    pub event_type: String,
    pub ticket_id: String,
    pub title: String,
    pub description: String,
    pub priority: String,
    pub status: String,
    pub caller_id: String,
    pub due_date: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

pub fn is_allowed_event(event_type: &str) -> bool {
    ALLOWED_EVENT_TYPES.contains(&event_type)
}

/// Validate the HMAC-SHA256 hex signature over the raw request body.
/// Comparison is constant-time via the mac itself.
pub fn verify_hmac_signature(
    secret: &str,
    body: &[u8],
    signature: Option<&str>,
) -> Result<(), AppError> {
    let signature = signature.ok_or_else(|| {
        log::warn!("Webhook request missing signature header");
        AppError::Forbidden("Missing X-ServiceNow-Signature header".to_string())
    })?;

    let signature_bytes = hex::decode(signature.trim())
        .map_err(|_| AppError::Forbidden("Invalid signature".to_string()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::InternalServerError("Webhook secret unusable".to_string()))?;
    mac.update(body);

    mac.verify_slice(&signature_bytes).map_err(|_| {
        log::warn!("Invalid HMAC signature for webhook request");
        AppError::Forbidden("Invalid signature".to_string())
    })
}

/// Webhook endpoint for ServiceNow events: validate, sign-check, enqueue,
/// and answer 202 before any heavy lifting happens.
pub async fn receive_webhook(
    req: HttpRequest,
    body: web::Bytes,
    settings: web::Data<Settings>,
    publisher: web::Data<Arc<TicketPublisher>>,
) -> Result<HttpResponse, AppError> {
    let payload: ServiceNowPayload = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid webhook payload: {}", e)))?;

    let webhook_id = format!(
        "webhook_{}_{}",
        Utc::now().format("%Y%m%d%H%M%S%f"),
        payload.ticket_id
    );

    log::info!(
        "[{}] Received webhook from ServiceNow - Event: {}, Ticket: {}",
        webhook_id,
        payload.event_type,
        payload.ticket_id
    );

    if !is_allowed_event(&payload.event_type) {
        log::warn!("[{}] Unsupported event type: {}", webhook_id, payload.event_type);
        return Err(AppError::BadRequest(format!(
            "Event type '{}' is not supported",
            payload.event_type
        )));
    }

    let signature = req
        .headers()
        .get("X-ServiceNow-Signature")
        .and_then(|v| v.to_str().ok());
    verify_hmac_signature(&settings.servicenow_webhook_secret, &body, signature)?;

    // Publish in the background; the caller only needs the receipt.
    let publisher = publisher.get_ref().clone();
    let raw_body = body.to_vec();
    let task_webhook_id = webhook_id.clone();
    actix_web::rt::spawn(async move {
        if let Err(e) = publisher.publish_ticket(&raw_body, &task_webhook_id).await {
            log::error!("[{}] Failed to publish ticket event: {}", task_webhook_id, e);
        }
    });

    Ok(HttpResponse::Accepted().json(serde_json::json!({
        "status": "accepted",
        "message": "Webhook received and queued for processing",
        "webhook_id": webhook_id,
        "ticket_number": payload.ticket_id
    })))
}

pub fn configure_webhook_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/webhook").route("/servicenow", web::post().to(receive_webhook)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    fn test_settings() -> Settings {
        Settings {
            environment: "development".to_string(),
            log_level: "INFO".to_string(),
            port: 8080,
            servicenow_webhook_secret: "0123456789abcdef0123".to_string(),
            gcp_project_id: "triagedesk-test".to_string(),
            pubsub_topic_id: "ticket-events".to_string(),
            max_retries: 0,
            publish_timeout_secs: 1.0,
            jwt_secret: "dev-only-jwt-secret".to_string(),
            embedding_service_url: None,
            skill_extractor_url: None,
            notify_webhook_url: None,
        }
    }

    fn event_body(event_type: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "event_type": event_type,
            "ticket_id": "INC0012345",
            "title": "S3 bucket access denied",
            "description": "Users cannot read from the archive bucket",
            "priority": "2 - High",
            "status": "open",
            "caller_id": "u123",
            "due_date": "2025-11-10T10:30:00Z",
            "category": "AWS"
        }))
        .unwrap()
    }

    #[actix_web::test]
    async fn signed_event_is_accepted_with_202() {
        let settings = test_settings();
        let body = event_body("incident.created");
        let signature = sign(&settings.servicenow_webhook_secret, &body);
        let publisher = Arc::new(TicketPublisher::new(&settings).unwrap());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(settings))
                .app_data(web::Data::new(publisher))
                .configure(configure_webhook_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/webhook/servicenow")
            .insert_header(("X-ServiceNow-Signature", signature))
            .insert_header(("Content-Type", "application/json"))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "accepted");
        assert_eq!(body["ticket_number"], "INC0012345");
        assert!(body["webhook_id"].as_str().unwrap().starts_with("webhook_"));
    }

    #[actix_web::test]
    async fn unsupported_event_type_is_400() {
        let settings = test_settings();
        let body = event_body("incident.reassigned");
        let publisher = Arc::new(TicketPublisher::new(&settings).unwrap());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(settings))
                .app_data(web::Data::new(publisher))
                .configure(configure_webhook_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/webhook/servicenow")
            .insert_header(("Content-Type", "application/json"))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn malformed_payload_is_400() {
        let settings = test_settings();
        let publisher = Arc::new(TicketPublisher::new(&settings).unwrap());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(settings))
                .app_data(web::Data::new(publisher))
                .configure(configure_webhook_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/webhook/servicenow")
            .insert_header(("Content-Type", "application/json"))
            .set_payload(r#"{"event_type": "incident.created"}"#)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn bad_signature_is_403() {
        let settings = test_settings();
        let body = event_body("incident.created");
        let signature = sign("another-secret-entirely", &body);
        let publisher = Arc::new(TicketPublisher::new(&settings).unwrap());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(settings))
                .app_data(web::Data::new(publisher))
                .configure(configure_webhook_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/webhook/servicenow")
            .insert_header(("X-ServiceNow-Signature", signature))
            .insert_header(("Content-Type", "application/json"))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn missing_signature_is_403() {
        let settings = test_settings();
        let body = event_body("incident.created");
        let publisher = Arc::new(TicketPublisher::new(&settings).unwrap());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(settings))
                .app_data(web::Data::new(publisher))
                .configure(configure_webhook_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/webhook/servicenow")
            .insert_header(("Content-Type", "application/json"))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[::std::prelude::v1::test]
    fn accepts_a_valid_signature() {
        let secret = "0123456789abcdef0123";
        let body = br#"{"event_type":"incident.created"}"#;
        let signature = sign(secret, body);
        assert!(verify_hmac_signature(secret, body, Some(&signature)).is_ok());
    }

    #[::std::prelude::v1::test]
    fn rejects_missing_and_tampered_signatures() {
        let secret = "0123456789abcdef0123";
        let body = br#"{"event_type":"incident.created"}"#;

        assert!(matches!(
            verify_hmac_signature(secret, body, None),
            Err(AppError::Forbidden(_))
        ));

        let mut signature = sign(secret, body);
        signature.replace_range(0..2, "00");
        let tampered = verify_hmac_signature(secret, b"different body", Some(&signature));
        assert!(matches!(tampered, Err(AppError::Forbidden(_))));
    }

    #[::std::prelude::v1::test]
    fn rejects_non_hex_signature() {
        let secret = "0123456789abcdef0123";
        assert!(matches!(
            verify_hmac_signature(secret, b"{}", Some("zzzz")),
            Err(AppError::Forbidden(_))
        ));
    }

    #[::std::prelude::v1::test]
    fn event_allowlist_covers_incidents_and_tasks() {
        assert!(is_allowed_event("incident.created"));
        assert!(is_allowed_event("task.resolved"));
        assert!(!is_allowed_event("incident.reassigned"));
        assert!(!is_allowed_event("change.created"));
    }

    #[::std::prelude::v1::test]
    fn payload_parses_with_optional_fields_missing() {
        let json = r#"{
            "event_type": "incident.created",
            "ticket_id": "INC0012345",
            "title": "S3 bucket access denied",
            "description": "Users cannot read from the archive bucket",
            "priority": "2 - High",
            "status": "open",
            "caller_id": "u123",
            "due_date": "2025-11-10T10:30:00Z"
        }"#;

        let payload: ServiceNowPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.event_type, "incident.created");
        assert!(payload.category.is_none());
        assert!(payload.metadata.is_none());
    }
}
