use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{Router, extract::State, routing::get};
use tower_http::cors::CorsLayer;
use tracing::info;

use super::api::{self, AppState, SharedState};
use super::store::{FactoryStore, StoreHandle};
use crate::config::AtelierConfig;
use crate::transport::{ChannelHub, ws};

/// Build the full application router: factory API plus the channel bridge.
pub fn build_router(state: SharedState) -> Router {
    let hub = state.hub.clone();

    api::api_router()
        .route(
            "/ws",
            get(
                move |ws_upgrade, query| {
                    ws::channel_ws_handler(ws_upgrade, query, State(hub))
                },
            ),
        )
        .with_state(state)
}

/// Start the factory server.
pub async fn start_server(config: AtelierConfig) -> Result<()> {
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let store =
        FactoryStore::open(&config.db_path).context("Failed to initialize factory database")?;
    let hub = Arc::new(ChannelHub::new(config.channel_capacity));

    let state = Arc::new(AppState {
        store: StoreHandle::new(store),
        hub,
    });

    let mut app = build_router(state);

    if config.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let host = if config.dev_mode { "0.0.0.0" } else { "127.0.0.1" };
    let addr = format!("{}:{}", host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "atelier factory server running");
    println!("Atelier running at http://{}", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    println!("Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    println!("\nShutting down...");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::models::Owner;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_router() -> Router {
        let store = FactoryStore::in_memory().unwrap();
        store
            .put_owner(&Owner {
                id: "u1".into(),
                name: "mina".into(),
            })
            .unwrap();
        let state = Arc::new(AppState {
            store: StoreHandle::new(store),
            hub: Arc::new(ChannelHub::new(16)),
        });
        build_router(state)
    }

    #[tokio::test]
    async fn test_health_via_full_router() {
        let app = test_router();
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_routes_mounted() {
        let app = test_router();
        let req = Request::builder()
            .uri("/api/factories")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ws_route_requires_upgrade() {
        let app = test_router();
        let req = Request::builder()
            .uri("/ws?channel=workspace:ws-1:events")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        // A plain GET without the upgrade handshake must be rejected.
        assert_ne!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_create_factory_via_full_router() {
        let app = test_router();
        let body = serde_json::json!({
            "id": "f1",
            "owner_id": "u1",
            "name": "starter",
            "config": {
                "workspace_name": "starter",
                "recipe": {"kind": "image", "content": "library/ubuntu:24.04"}
            }
        })
        .to_string();
        let req = Request::builder()
            .method("POST")
            .uri("/api/factories")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let factory: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(factory["name"], "starter");
    }
}
