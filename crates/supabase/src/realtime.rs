//! Supabase Realtime change feed (Phoenix channel protocol, vsn 1.0.0).
//!
//! One websocket carries one channel that declares `postgres_changes` for
//! the `campaigns` and `donations` tables. Every change frame is decoded
//! into a [`ChangeEvent`] and fanned out through a [`SubscriptionRegistry`],
//! so any number of consumers share the connection. The connection is
//! re-established after a fixed delay whenever it drops.

use std::sync::Mutex;
use std::time::Duration;

use futures::{Sink, SinkExt, StreamExt};
use hopefund_core::errors::{GatewayError, GatewayResult};
use hopefund_core::gateway::{
    ChangeCallback, ChangeEvent, ChangeEventType, ChangeFeedTrait, Subscription,
    SubscriptionRegistry, Table,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::client::SupabaseClient;

/// Phoenix heartbeat period.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);

/// Wait between reconnection attempts.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

const CHANNEL_TOPIC: &str = "realtime:hopefund";
const PHOENIX_TOPIC: &str = "phoenix";

/// Websocket endpoint for a project URL.
pub fn realtime_url(project_url: &str, anon_key: &str) -> GatewayResult<String> {
    let base = project_url.trim_end_matches('/');
    let socket_base = if let Some(host) = base.strip_prefix("https://") {
        format!("wss://{}", host)
    } else if let Some(host) = base.strip_prefix("http://") {
        format!("ws://{}", host)
    } else {
        return Err(GatewayError::Unavailable(format!(
            "Unsupported project URL '{}'",
            project_url
        )));
    };
    Ok(format!(
        "{}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
        socket_base,
        urlencoding::encode(anon_key)
    ))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct PhoenixMessage {
    topic: String,
    event: String,
    #[serde(default)]
    payload: Value,
    #[serde(rename = "ref", default)]
    reference: Option<String>,
}

#[derive(Debug, Default)]
struct RefCounter(u64);

impl RefCounter {
    fn next(&mut self) -> String {
        self.0 += 1;
        self.0.to_string()
    }
}

fn join_message(access_token: &str, reference: String) -> PhoenixMessage {
    let changes: Vec<Value> = [Table::Campaigns, Table::Donations]
        .iter()
        .map(|table| {
            json!({
                "event": ChangeEventType::All.as_str(),
                "schema": "public",
                "table": table.as_str(),
            })
        })
        .collect();
    PhoenixMessage {
        topic: CHANNEL_TOPIC.to_string(),
        event: "phx_join".to_string(),
        payload: json!({
            "config": {
                "broadcast": { "self": false },
                "presence": { "key": "" },
                "postgres_changes": changes,
            },
            "access_token": access_token,
        }),
        reference: Some(reference),
    }
}

fn heartbeat_message(reference: String) -> PhoenixMessage {
    PhoenixMessage {
        topic: PHOENIX_TOPIC.to_string(),
        event: "heartbeat".to_string(),
        payload: json!({}),
        reference: Some(reference),
    }
}

#[derive(Debug, Deserialize)]
struct ChangePayload {
    data: ChangeData,
}

#[derive(Debug, Deserialize)]
struct ChangeData {
    table: String,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    record: Option<Value>,
    #[serde(default)]
    old_record: Option<Value>,
}

/// Decodes the payload of a `postgres_changes` frame. Deletes carry only
/// the old row.
fn change_event_from(payload: &Value) -> GatewayResult<ChangeEvent> {
    let payload: ChangePayload = serde_json::from_value(payload.clone())
        .map_err(|e| GatewayError::Decode(format!("postgres_changes payload: {}", e)))?;
    let data = payload.data;
    let table: Table = data.table.parse()?;
    let event_type: ChangeEventType = data.event_type.parse()?;
    let record = data
        .record
        .filter(|r| !r.is_null())
        .or(data.old_record)
        .unwrap_or(Value::Null);
    Ok(ChangeEvent::new(table, event_type, record))
}

fn handle_frame(text: &str, registry: &SubscriptionRegistry) {
    let message: PhoenixMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("[Realtime] Ignoring unreadable frame: {}", e);
            return;
        }
    };

    match message.event.as_str() {
        "postgres_changes" => match change_event_from(&message.payload) {
            Ok(event) => {
                let delivered = registry.dispatch(&event);
                debug!(
                    "[Realtime] {} {} delivered to {} listener(s)",
                    event.table, event.event_type.as_str(), delivered
                );
            }
            Err(e) => warn!("[Realtime] Dropping change frame: {}", e),
        },
        "phx_reply" => {
            let status = message.payload.get("status").and_then(Value::as_str);
            if status == Some("error") {
                warn!(
                    "[Realtime] {} rejected: {}",
                    message.topic, message.payload["response"]
                );
            }
        }
        "phx_error" | "phx_close" => warn!("[Realtime] Channel {} closed by server", message.topic),
        _ => {}
    }
}

async fn send_frame<S>(sink: &mut S, message: &PhoenixMessage) -> GatewayResult<()>
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let text = serde_json::to_string(message)
        .map_err(|e| GatewayError::Decode(format!("encode {}: {}", message.event, e)))?;
    sink.send(Message::Text(text.into()))
        .await
        .map_err(|e| GatewayError::Unavailable(format!("Realtime send failed: {}", e)))
}

/// Runs one connection until the server closes it or it fails.
async fn run_session(
    url: &str,
    access_token: &str,
    registry: &SubscriptionRegistry,
) -> GatewayResult<()> {
    let (socket, _) = connect_async(url)
        .await
        .map_err(|e| GatewayError::Unavailable(format!("Realtime connect failed: {}", e)))?;
    let (mut sink, mut stream) = socket.split();
    let mut refs = RefCounter::default();

    send_frame(&mut sink, &join_message(access_token, refs.next())).await?;
    info!("[Realtime] Joined {}", CHANNEL_TOPIC);

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;
    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                send_frame(&mut sink, &heartbeat_message(refs.next())).await?;
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => handle_frame(text.as_str(), registry),
                Some(Ok(Message::Close(_))) | None => return Ok(()),
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    return Err(GatewayError::Unavailable(format!("Realtime read failed: {}", e)));
                }
            },
        }
    }
}

async fn run(url: String, access_token: String, registry: SubscriptionRegistry, delay: Duration) {
    loop {
        match run_session(&url, &access_token, &registry).await {
            Ok(()) => info!("[Realtime] Connection closed, reconnecting in {:?}", delay),
            Err(e) => warn!("[Realtime] {}, reconnecting in {:?}", e, delay),
        }
        tokio::time::sleep(delay).await;
    }
}

/// Change feed backed by a Realtime websocket.
///
/// Must be created inside a tokio runtime. Dropping the feed closes the
/// connection; outstanding [`Subscription`] handles simply stop receiving.
pub struct RealtimeFeed {
    registry: SubscriptionRegistry,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RealtimeFeed {
    /// Connects with the client's current bearer token.
    pub fn connect(client: &SupabaseClient) -> GatewayResult<Self> {
        let config = client.config();
        let url = realtime_url(&config.url, &config.anon_key)?;
        Ok(Self::connect_url(url, client.bearer_token(), RECONNECT_DELAY))
    }

    pub fn connect_url(url: String, access_token: String, reconnect_delay: Duration) -> Self {
        let registry = SubscriptionRegistry::new();
        let task = tokio::spawn(run(url, access_token, registry.clone(), reconnect_delay));
        Self {
            registry,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Stops the connection task. Safe to call more than once.
    pub fn close(&self) {
        let task = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(task) = task {
            task.abort();
            debug!("[Realtime] Feed closed");
        }
    }
}

impl Drop for RealtimeFeed {
    fn drop(&mut self) {
        self.close();
    }
}

impl ChangeFeedTrait for RealtimeFeed {
    fn subscribe(
        &self,
        table: Table,
        event_type: ChangeEventType,
        callback: ChangeCallback,
    ) -> Subscription {
        self.registry.subscribe(table, event_type, callback)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::net::TcpListener;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use super::*;

    #[test]
    fn test_realtime_url() {
        assert_eq!(
            realtime_url("https://abc.supabase.co/", "anon.key").unwrap(),
            "wss://abc.supabase.co/realtime/v1/websocket?apikey=anon.key&vsn=1.0.0"
        );
        assert_eq!(
            realtime_url("http://localhost:54321", "k").unwrap(),
            "ws://localhost:54321/realtime/v1/websocket?apikey=k&vsn=1.0.0"
        );
        assert!(realtime_url("abc.supabase.co", "k").is_err());
    }

    #[test]
    fn test_join_declares_both_tables() {
        let join = join_message("jwt", "1".to_string());
        assert_eq!(join.event, "phx_join");
        let tables: Vec<&str> = join.payload["config"]["postgres_changes"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["table"].as_str().unwrap())
            .collect();
        assert_eq!(tables, vec!["campaigns", "donations"]);
        assert_eq!(join.payload["access_token"], "jwt");

        let wire = serde_json::to_value(&join).unwrap();
        assert_eq!(wire["ref"], "1");
    }

    #[test]
    fn test_update_frame_decodes() {
        let payload = json!({
            "ids": [1],
            "data": {
                "schema": "public",
                "table": "campaigns",
                "type": "UPDATE",
                "commit_timestamp": "2026-03-10T12:00:00Z",
                "record": { "id": "c1", "current_amount": 250 },
                "old_record": { "id": "c1" }
            }
        });
        let event = change_event_from(&payload).unwrap();
        assert_eq!(event.table, Table::Campaigns);
        assert_eq!(event.event_type, ChangeEventType::Update);
        assert_eq!(event.new_record["current_amount"], 250);
    }

    #[test]
    fn test_delete_frame_uses_old_record() {
        let payload = json!({
            "data": {
                "table": "donations",
                "type": "DELETE",
                "record": null,
                "old_record": { "id": "d1" }
            }
        });
        let event = change_event_from(&payload).unwrap();
        assert_eq!(event.event_type, ChangeEventType::Delete);
        assert_eq!(event.new_record["id"], "d1");
    }

    #[test]
    fn test_unknown_table_is_rejected() {
        let payload = json!({ "data": { "table": "profiles", "type": "INSERT", "record": {} } });
        assert!(matches!(
            change_event_from(&payload),
            Err(GatewayError::Decode(_))
        ));
    }

    #[test]
    fn test_only_change_frames_reach_listeners() {
        let registry = SubscriptionRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = registry.subscribe(
            Table::Donations,
            ChangeEventType::Insert,
            Arc::new(move |event: ChangeEvent| {
                let _ = tx.send(event);
            }),
        );

        handle_frame(
            r#"{"topic":"phoenix","event":"phx_reply","payload":{"status":"ok"},"ref":"2"}"#,
            &registry,
        );
        handle_frame("not json", &registry);
        handle_frame(
            r#"{"topic":"realtime:hopefund","event":"postgres_changes","payload":{"data":{"table":"donations","type":"INSERT","record":{"id":"d9"}}},"ref":null}"#,
            &registry,
        );

        let event = rx.try_recv().unwrap();
        assert_eq!(event.new_record["id"], "d9");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_feed_joins_and_dispatches_pushed_changes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut socket = tokio_tungstenite::accept_async(tcp).await.unwrap();
            let join = loop {
                if let Message::Text(text) = socket.next().await.unwrap().unwrap() {
                    break text.as_str().to_string();
                }
            };
            let frame = json!({
                "topic": CHANNEL_TOPIC,
                "event": "postgres_changes",
                "payload": { "data": {
                    "table": "campaigns",
                    "type": "UPDATE",
                    "record": { "id": "c1", "current_amount": 250 }
                }},
                "ref": null
            });
            socket
                .send(Message::Text(frame.to_string().into()))
                .await
                .unwrap();
            while let Some(Ok(_)) = socket.next().await {}
            join
        });

        let url = realtime_url(&format!("http://{}", addr), "anon").unwrap();
        let feed =
            RealtimeFeed::connect_url(url, "user-jwt".to_string(), Duration::from_millis(50));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = feed.subscribe(
            Table::Campaigns,
            ChangeEventType::Update,
            Arc::new(move |event: ChangeEvent| {
                let _ = tx.send(event);
            }),
        );

        let event = timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.new_record["current_amount"], 250);

        feed.close();
        let join: PhoenixMessage =
            serde_json::from_str(&timeout(Duration::from_secs(5), server).await.unwrap().unwrap())
                .unwrap();
        assert_eq!(join.topic, CHANNEL_TOPIC);
        assert_eq!(join.event, "phx_join");
        assert_eq!(join.payload["access_token"], "user-jwt");
    }
}
