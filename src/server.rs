use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use eyre::Result;
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::bot::{Dispatcher, InboundMessage};
use crate::twiml;

/// Form fields Twilio posts for an incoming message.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WebhookForm {
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "Body")]
    pub body: String,
    #[serde(rename = "NumMedia")]
    pub num_media: u32,
    #[serde(rename = "MediaUrl0")]
    pub media_url: String,
    #[serde(rename = "MediaContentType0")]
    pub media_content_type: String,
}

impl From<WebhookForm> for InboundMessage {
    fn from(form: WebhookForm) -> Self {
        Self {
            sender: form.from,
            body: form.body,
            num_media: form.num_media,
            media_url: form.media_url,
            media_content_type: form.media_content_type,
        }
    }
}

pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/webhook", post(webhook))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(dispatcher)
}

pub async fn serve(addr: SocketAddr, dispatcher: Arc<Dispatcher>) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Webhook server listening");
    axum::serve(listener, router(dispatcher)).await?;
    Ok(())
}

async fn webhook(
    State(dispatcher): State<Arc<Dispatcher>>,
    Form(form): Form<WebhookForm>,
) -> Response {
    let reply = dispatcher.handle(&form.into()).await;

    match twiml::message_response(&reply) {
        Ok(xml) => ([(header::CONTENT_TYPE, "application/xml")], xml).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render TwiML response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn health() -> &'static str {
    "ok"
}
