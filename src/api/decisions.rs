use actix_web::{web, HttpResponse, Result};
use actix_web_httpauth::middleware::HttpAuthentication;
use serde::Serialize;
use std::sync::Arc;

use crate::auth::{jwt_validator, Claims};
use crate::engine::store::DecisionStore;
use crate::engine::{AssignmentDecision, AssignmentType};
use crate::error::AppError;

#[derive(Serialize)]
pub struct DecisionResponse {
    pub ticket_id: String,
    pub assignment_type: AssignmentType,
    pub primary_assignee: Option<String>,
    pub confidence_score: f64,
    pub rules_applied: Vec<String>,
    pub reasoning: Vec<String>,
    pub decision: AssignmentDecision,
}

/// Fetch the stored assignment decision for a ticket.
pub async fn get_decision(
    store: web::Data<Arc<dyn DecisionStore>>,
    claims: Claims,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let ticket_id = path.into_inner();

    log::debug!("{} requested decision for {}", claims.email, ticket_id);

    let decision = store
        .get_decision(&ticket_id)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?
        .ok_or_else(|| AppError::NotFound(format!("No decision recorded for {}", ticket_id)))?;

    let response = DecisionResponse {
        ticket_id: decision.ticket_id.clone(),
        assignment_type: decision.assignment_type,
        primary_assignee: decision.primary_assignee.clone(),
        confidence_score: decision.confidence_score,
        rules_applied: decision.rules_applied.clone(),
        reasoning: decision.reasoning.clone(),
        decision,
    };

    Ok(HttpResponse::Ok().json(response))
}

pub fn configure_ops_routes(cfg: &mut web::ServiceConfig) {
    let auth = HttpAuthentication::bearer(jwt_validator);

    cfg.service(
        web::scope("/api/v1")
            .wrap(auth)
            .route("/decisions/{ticket_id}", web::get().to(get_decision)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::create_jwt;
    use crate::engine::store::MemoryDecisionStore;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use chrono::Utc;

    async fn store_with_decision() -> Arc<dyn DecisionStore> {
        let store = MemoryDecisionStore::new();
        let mut decision = AssignmentDecision::new(AssignmentType::Normal, "INC0010042", Utc::now());
        decision.primary_assignee = Some("asha@corp.test".to_string());
        decision.confidence_score = 0.8;
        store.save_decision(&decision).await.unwrap();
        Arc::new(store)
    }

    fn bearer(role: &str) -> String {
        let claims = Claims::new("m-1".to_string(), "lead@corp.test".to_string(), role.to_string());
        format!("Bearer {}", create_jwt(&claims).unwrap())
    }

    #[actix_web::test]
    async fn returns_stored_decision_for_ops_token() {
        let store = store_with_decision().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(store))
                .configure(configure_ops_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/v1/decisions/INC0010042")
            .insert_header(("Authorization", bearer("team_lead")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["ticket_id"], "INC0010042");
        assert_eq!(body["assignment_type"], "normal");
        assert_eq!(body["primary_assignee"], "asha@corp.test");
    }

    #[actix_web::test]
    async fn unknown_ticket_is_404() {
        let store: Arc<dyn DecisionStore> = Arc::new(MemoryDecisionStore::new());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(store))
                .configure(configure_ops_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/v1/decisions/INC0000000")
            .insert_header(("Authorization", bearer("ops")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn missing_bearer_is_401() {
        let store = store_with_decision().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(store))
                .configure(configure_ops_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/v1/decisions/INC0010042")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn non_ops_role_is_403() {
        let store = store_with_decision().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(store))
                .configure(configure_ops_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/v1/decisions/INC0010042")
            .insert_header(("Authorization", bearer("USER")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
