// Copyright (c) 2025 - Cowboy AI, LLC.

//! `bus://` scheme handlers
//!
//! A topic GET with the event-stream accept opens a subscription and frames
//! every message as a server-sent event; without it, the response describes
//! local membership. POST publishes the raw body. The subscription guard
//! releases the underlying subscription whatever way the stream ends.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use futures::stream::StreamExt;
use serde_json::json;
use tracing::{debug, warn};

use crate::client::{BusMessage, CanClient};
use crate::errors::{GatewayError, GatewayResult};
use crate::negotiate::wants_event_stream;
use crate::request::{Body, Request, Response};
use crate::router::Gateway;
use crate::sse::SseEvent;
use crate::url::CanUrl;

/// Payload encoding inside SSE frames, selected by `?format=`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PayloadEncoding {
    Base64,
    Utf8,
    Json,
}

impl PayloadEncoding {
    fn from_url(url: &CanUrl) -> GatewayResult<Self> {
        match url.query("format").filter(|v| !v.is_empty()) {
            None | Some("base64") => Ok(PayloadEncoding::Base64),
            Some("utf8") => Ok(PayloadEncoding::Utf8),
            Some("json") => Ok(PayloadEncoding::Json),
            Some(other) => Err(GatewayError::InvalidInput(format!(
                "unrecognized payload encoding: {other}"
            ))),
        }
    }
}

pub(crate) async fn get(gw: &Gateway, url: &CanUrl, req: Request) -> GatewayResult<Response> {
    let topic = url.host().to_string();
    let deadline = gw.short_deadline(&req.cancel);

    if !wants_event_stream(&req.headers) {
        let id = deadline.run("peer lookup", gw.client().peer_id()).await?;
        let topics = deadline
            .run("subscription listing", gw.client().subscriptions())
            .await?;
        let membership = json!({
            "id": id,
            "topic": topic,
            "subscribed": topics.contains(&topic),
        });
        return Ok(Response::ok(serde_json::to_string(&membership)?)
            .with_content_type("application/json"));
    }

    let encoding = PayloadEncoding::from_url(url)?;
    let subscription = deadline
        .run("topic subscribe", gw.client().subscribe(&topic))
        .await?;
    debug!(topic = %topic, "opened event stream");

    let guard = SubscriptionGuard {
        client: Arc::clone(gw.client()),
        topic,
    };
    let cancel = req.cancel.clone();
    let body = async_stream::stream! {
        let _guard = guard;
        let mut subscription = subscription;
        let mut sequence: u64 = 0;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                message = subscription.next() => match message {
                    None => break,
                    Some(Ok(message)) => {
                        let frame = match frame_message(&message, encoding, sequence) {
                            Ok(frame) => { sequence += 1; frame }
                            Err(err) => SseEvent::error(err.to_string()).encode(),
                        };
                        yield Ok(Bytes::from(frame));
                    }
                    Some(Err(err)) => {
                        yield Ok(Bytes::from(SseEvent::error(err.to_string()).encode()));
                    }
                }
            }
        }
    }
    .boxed();

    Ok(Response::ok(Body::Stream(body)).with_content_type("text/event-stream"))
}

/// POST `bus://<topic>/`: publish the request body
pub(crate) async fn post(gw: &Gateway, url: &CanUrl, req: Request) -> GatewayResult<Response> {
    let topic = url.host().to_string();
    let deadline = gw.short_deadline(&req.cancel);
    let body = req.body.into_bytes(&req.cancel).await?;
    deadline
        .run("topic publish", gw.client().publish(&topic, body))
        .await?;
    Ok(Response::ok(Body::Empty))
}

/// Frame one bus message as an SSE event
fn frame_message(
    message: &BusMessage,
    encoding: PayloadEncoding,
    sequence: u64,
) -> GatewayResult<String> {
    let data = match encoding {
        PayloadEncoding::Base64 => json!(BASE64.encode(&message.data)),
        PayloadEncoding::Utf8 => json!(std::str::from_utf8(&message.data)
            .map_err(|e| GatewayError::InvalidInput(format!("payload is not UTF-8: {e}")))?),
        PayloadEncoding::Json => serde_json::from_slice(&message.data)
            .map_err(|e| GatewayError::InvalidInput(format!("payload is not JSON: {e}")))?,
    };
    let event = json!({ "from": message.from, "data": data });
    Ok(SseEvent::message(sequence, serde_json::to_string(&event)?).encode())
}

/// Releases the subscription when the event stream ends, whether through
/// cancellation, upstream close, or the caller dropping the body
struct SubscriptionGuard {
    client: Arc<dyn CanClient>,
    topic: String,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        let client = Arc::clone(&self.client);
        let topic = std::mem::take(&mut self.topic);
        tokio::spawn(async move {
            if let Err(err) = client.unsubscribe(&topic).await {
                warn!(topic = %topic, error = %err, "unsubscribe failed");
            }
        });
    }
}
