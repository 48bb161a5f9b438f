//! Application Startup
//!
//! Application building, state wiring and server initialization. Services
//! are wired over the repository traits, so the same state assembly serves
//! production (PostgreSQL) and the integration suite (in-memory store).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use sqlx::PgPool;
use tokio::net::TcpListener;

use crate::application::events::EventPublisher;
use crate::application::services::{
    JwtVerifier, MessageService, PresenceTracker, RoomGuard, RoomService, TokenVerifier,
};
use crate::config::Settings;
use crate::domain::{MessageRepository, RoomRepository};
use crate::infrastructure::database;
use crate::infrastructure::repositories::{PgMessageRepository, PgRoomRepository};
use crate::presentation::http::handlers;
use crate::presentation::http::routes;
use crate::presentation::middleware::{create_cors_layer, create_trace_layer};
use crate::presentation::websocket::Gateway;
use crate::shared::snowflake::SnowflakeGenerator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Present when running against PostgreSQL; readiness probes use it
    pub db: Option<PgPool>,
    pub rooms: Arc<RoomService>,
    pub messages: Arc<MessageService>,
    pub presence: Arc<PresenceTracker>,
    pub guard: Arc<RoomGuard>,
    pub gateway: Arc<Gateway>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Wire services over repository implementations and a token verifier.
    pub fn assemble(
        room_repo: Arc<dyn RoomRepository>,
        message_repo: Arc<dyn MessageRepository>,
        verifier: Arc<dyn TokenVerifier>,
        db: Option<PgPool>,
        settings: Settings,
    ) -> Self {
        let settings = Arc::new(settings);
        let gateway = Arc::new(Gateway::new());
        let publisher: Arc<dyn EventPublisher> = gateway.clone();

        let guard = Arc::new(RoomGuard::new(room_repo.clone()));
        let presence = Arc::new(PresenceTracker::with_ttl(Duration::from_secs(
            settings.chat.typing_ttl_secs,
        )));
        let snowflake = Arc::new(SnowflakeGenerator::new(
            settings.snowflake.machine_id as u64,
            0u64, // Default node_id
        ));

        let rooms = Arc::new(RoomService::new(
            room_repo,
            guard.clone(),
            snowflake.clone(),
            publisher.clone(),
        ));
        let messages = Arc::new(MessageService::new(
            message_repo,
            guard.clone(),
            presence.clone(),
            snowflake,
            publisher,
            settings.chat.store_config(),
        ));

        Self {
            db,
            rooms,
            messages,
            presence,
            guard,
            gateway,
            verifier,
            settings,
        }
    }
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        // Create database pool and apply migrations
        let db = database::create_pool(&settings.database).await?;
        database::run_migrations(&db).await?;
        tracing::info!("Database connection pool created");

        let room_repo: Arc<dyn RoomRepository> = Arc::new(PgRoomRepository::new(db.clone()));
        let message_repo: Arc<dyn MessageRepository> =
            Arc::new(PgMessageRepository::new(db.clone()));
        let verifier: Arc<dyn TokenVerifier> =
            Arc::new(JwtVerifier::new(&settings.auth.jwt_secret));

        let state = AppState::assemble(
            room_repo,
            message_repo,
            verifier,
            Some(db),
            settings.clone(),
        );

        handlers::health::init_server_start();

        // Build router with middleware
        let router = routes::create_router(state)
            .layer(create_trace_layer())
            .layer(create_cors_layer(&settings.cors));

        // Bind to address
        let addr = SocketAddr::from(([0, 0, 0, 0], settings.server.port));
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Listening on {}", addr);

        Ok(Self { listener, router })
    }

    /// Run the server until stopped
    pub async fn run_until_stopped(self) -> Result<()> {
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}
