use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Result;
use std::sync::Arc;

mod api;
mod auth;
mod config;
mod database;
mod engine;
mod error;
mod notify;
mod oracle;
mod pubsub;
mod similar;
mod skills;
mod ticket;

use api::process::TicketProcessor;
use config::Settings;
use database::{PgTeamOracle, PgTicketRepository, TicketRepository};
use engine::store::{DecisionStore, RedisDecisionStore};
use engine::timezone::SystemClock;
use engine::AssignmentEngine;
use notify::NotificationService;
use oracle::{SimilarTicketProvider, SkillExtractor};
use pubsub::TicketPublisher;
use similar::{EmbeddingClient, PgSimilarTicketProvider};
use skills::{KeywordSkillExtractor, RemoteSkillExtractor};

#[actix_web::main]
async fn main() -> Result<()> {
    // Load environment before anything reads it
    dotenv::dotenv().ok();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("❌ Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&settings);

    // Data layers
    let pool = database::create_connection_pool().await?;
    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
    let decisions: Arc<dyn DecisionStore> = Arc::new(RedisDecisionStore::new(&redis_url)?);

    // Oracles feeding the engine
    let oracle = Arc::new(PgTeamOracle::new(pool.clone()));
    let skill_extractor: Arc<dyn SkillExtractor> = match &settings.skill_extractor_url {
        Some(url) => Arc::new(RemoteSkillExtractor::new(url)),
        None => Arc::new(KeywordSkillExtractor::new()),
    };

    let assignment_engine = Arc::new(AssignmentEngine::new(
        oracle,
        skill_extractor,
        Arc::new(SystemClock),
    ));

    let embedding_url = settings
        .embedding_service_url
        .clone()
        .unwrap_or_else(|| "http://localhost:8090".to_string());
    let similar_provider: Arc<dyn SimilarTicketProvider> = Arc::new(PgSimilarTicketProvider::new(
        pool.clone(),
        EmbeddingClient::new(&embedding_url),
    ));

    let notifier = Arc::new(NotificationService::new(settings.notify_webhook_url.clone()));
    let publisher = Arc::new(TicketPublisher::new(&settings)?);
    let ticket_repository: Arc<dyn TicketRepository> = Arc::new(PgTicketRepository::new(pool));

    let processor = Arc::new(TicketProcessor::new(
        assignment_engine,
        similar_provider,
        decisions.clone(),
        notifier,
        ticket_repository,
    ));

    let bind_port = settings.port;
    log::info!(
        "🚀 TriageDesk Assignment Engine starting on port {} ({})",
        bind_port,
        settings.environment
    );

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(settings.clone()))
            .app_data(web::Data::new(publisher.clone()))
            .app_data(web::Data::new(processor.clone()))
            .app_data(web::Data::new(decisions.clone()))
            .wrap(Logger::default())
            .configure(api::webhook::configure_webhook_routes)
            .configure(api::process::configure_process_routes)
            .configure(api::decisions::configure_ops_routes)
            .route("/health", web::get().to(health_check))
            .route("/", web::get().to(index))
    })
    .bind(format!("0.0.0.0:{}", bind_port))?
    .run()
    .await
    .map_err(|e| anyhow::anyhow!("Server error: {}", e))
}

fn init_logging(settings: &Settings) {
    let level = match settings.log_level.as_str() {
        "DEBUG" => log::LevelFilter::Debug,
        "WARNING" => log::LevelFilter::Warn,
        "ERROR" | "CRITICAL" => log::LevelFilter::Error,
        _ => log::LevelFilter::Info,
    };

    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

async fn health_check() -> actix_web::Result<actix_web::HttpResponse> {
    Ok(actix_web::HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "triagedesk-assignment-engine",
        "version": "1.0.0"
    })))
}

async fn index() -> actix_web::Result<actix_web::HttpResponse> {
    Ok(actix_web::HttpResponse::Ok().json(serde_json::json!({
        "message": "TriageDesk Assignment Engine API",
        "version": "1.0.0",
        "endpoints": {
            "webhook": "/webhook/servicenow",
            "process": "/process_ticket",
            "decisions": "/api/v1/decisions/{ticket_id}",
            "health": "/health"
        }
    })))
}
