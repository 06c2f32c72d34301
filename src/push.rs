//! Server-initiated schedule change notifications over WebSocket.

use std::time::Duration;

use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Older backends announce changes under these message types.
const LEGACY_KINDS: &[&str] = &["agenda_box_actualizada", "actualizacion_estado_box"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleChanged {
    pub resource_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushEvent {
    /// The socket is (re)connected. Changes sent while it was down are lost,
    /// so consumers should recompute everything they show.
    Connected,
    Changed(ScheduleChanged),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNotification {
    Current {
        event: String,
        #[serde(rename = "resourceId")]
        resource_id: u32,
    },
    Legacy {
        #[serde(rename = "type")]
        kind: String,
        box_id: u32,
    },
}

/// Returns `None` for anything that is not a schedule change.
pub fn parse_notification(text: &str) -> Option<ScheduleChanged> {
    match serde_json::from_str::<RawNotification>(text).ok()? {
        RawNotification::Current { event, resource_id } if event == "scheduleChanged" => {
            Some(ScheduleChanged { resource_id })
        }
        RawNotification::Legacy { kind, box_id } if LEGACY_KINDS.contains(&kind.as_str()) => {
            Some(ScheduleChanged {
                resource_id: box_id,
            })
        }
        _ => None,
    }
}

/// Listen on `url` in a background task, reconnecting after `reconnect`
/// whenever the socket drops. Every successful connection is announced with
/// [`PushEvent::Connected`]. The task ends once the receiver is dropped.
pub fn subscribe(url: String, reconnect: Duration) -> mpsc::Receiver<PushEvent> {
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(listen(url, reconnect, tx));
    rx
}

async fn listen(url: String, reconnect: Duration, tx: mpsc::Sender<PushEvent>) {
    loop {
        match connect_async(url.as_str()).await {
            Ok((mut stream, _)) => {
                info!("Push channel connected to {}", url);
                if tx.send(PushEvent::Connected).await.is_err() {
                    return;
                }
                while let Some(frame) = stream.next().await {
                    match frame {
                        Ok(Message::Text(text)) => match parse_notification(&text) {
                            Some(change) => {
                                debug!("Schedule changed for box {}", change.resource_id);
                                if tx.send(PushEvent::Changed(change)).await.is_err() {
                                    return;
                                }
                            }
                            None => debug!("Ignoring push message: {}", text),
                        },
                        Ok(Message::Close(_)) => break,
                        Ok(_) => {}
                        Err(e) => {
                            warn!("Push channel error: {}", e);
                            break;
                        }
                    }
                }
                warn!(
                    "Push channel closed, reconnecting in {}s",
                    reconnect.as_secs()
                );
            }
            Err(e) => {
                warn!(
                    "Push channel connection to {} failed: {}; retrying in {}s",
                    url,
                    e,
                    reconnect.as_secs()
                );
            }
        }
        if tx.is_closed() {
            return;
        }
        tokio::time::sleep(reconnect).await;
    }
}
