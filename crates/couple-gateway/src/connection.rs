use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::task::spawn_blocking;
use tracing::{info, warn};
use uuid::Uuid;

use couple_db::Database;
use couple_types::events::{GatewayCommand, GatewayEvent};

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Handle a single WebSocket connection. The client's first frame must be
/// an Identify command carrying a valid JWT; the connection then follows
/// the user's conversation, delivering MessageCreate and PartnerJoined
/// events as they are broadcast.
pub async fn handle_connection(
    socket: WebSocket,
    dispatcher: Dispatcher,
    db: Arc<Database>,
    jwt_secret: String,
) {
    let (mut sender, mut receiver) = socket.split();

    // Step 1: Wait for Identify command with JWT
    let (user_id, display_name) = match wait_for_identify(&mut receiver, &jwt_secret).await {
        Some(identity) => identity,
        None => {
            warn!("WebSocket client failed to identify, closing");
            return;
        }
    };

    info!("{} ({}) connected to gateway", display_name, user_id);

    // Step 2: Send Ready event
    let ready = GatewayEvent::Ready {
        user_id,
        display_name: display_name.clone(),
    };
    if sender
        .send(Message::Text(serde_json::to_string(&ready).unwrap().into()))
        .await
        .is_err()
    {
        return;
    }

    // Step 3: Follow the user's conversation, if one exists yet. A later
    // Subscribe command re-points this after a create or join.
    let initial = lookup_conversation(&db, user_id).await;

    // The per-connection subscription, shared between send and recv tasks.
    // A connection follows at most one conversation.
    let subscription: Arc<std::sync::RwLock<Option<Uuid>>> =
        Arc::new(std::sync::RwLock::new(initial));
    let send_subscription = subscription.clone();

    // Shared flag for heartbeat
    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    let mut broadcast_rx = dispatcher.subscribe();

    // Forward broadcasts -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} events", n);
                            continue;
                        }
                        Err(_) => break,
                    };

                    if let Some(conversation_id) = event.conversation_id() {
                        let followed = *send_subscription.read()
                            .expect("subscription lock poisoned");
                        if followed != Some(conversation_id) {
                            continue;
                        }
                    }

                    let text = serde_json::to_string(&event).unwrap();
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client
    let display_name_recv = display_name.clone();
    let recv_subscription = subscription.clone();
    let recv_db = db.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    match serde_json::from_str::<GatewayCommand>(&text) {
                        Ok(cmd) => {
                            handle_command(
                                &recv_db,
                                user_id,
                                &display_name_recv,
                                cmd,
                                &recv_subscription,
                            )
                            .await;
                        }
                        Err(e) => {
                            warn!(
                                "{} ({}) bad command: {} -- raw: {}",
                                display_name_recv,
                                user_id,
                                e,
                                &text[..text.len().min(200)]
                            );
                        }
                    }
                }
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!("{} ({}) disconnected from gateway", display_name, user_id);
}

async fn wait_for_identify(
    receiver: &mut futures_util::stream::SplitStream<WebSocket>,
    jwt_secret: &str,
) -> Option<(Uuid, String)> {
    use couple_types::api::Claims;
    use jsonwebtoken::{DecodingKey, Validation, decode};

    let timeout = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(GatewayCommand::Identify { token }) =
                    serde_json::from_str::<GatewayCommand>(&text)
                {
                    let token_data = decode::<Claims>(
                        &token,
                        &DecodingKey::from_secret(jwt_secret.as_bytes()),
                        &Validation::default(),
                    )
                    .ok()?;

                    return Some((token_data.claims.sub, token_data.claims.name));
                }
            }
        }
        None
    });

    timeout.await.ok().flatten()
}

async fn handle_command(
    db: &Arc<Database>,
    user_id: Uuid,
    display_name: &str,
    cmd: GatewayCommand,
    subscription: &Arc<std::sync::RwLock<Option<Uuid>>>,
) {
    match cmd {
        GatewayCommand::Identify { .. } => {} // Already handled

        GatewayCommand::Subscribe { conversation_id } => {
            // Membership is verified before honoring the subscription, so a
            // client cannot follow a conversation it is not part of.
            if !is_participant(db, conversation_id, user_id).await {
                warn!(
                    "{} ({}) tried to subscribe to conversation {} they are not part of",
                    display_name, user_id, conversation_id
                );
                return;
            }

            info!(
                "{} ({}) now following conversation {}",
                display_name, user_id, conversation_id
            );
            let mut followed = subscription.write().expect("subscription lock poisoned");
            *followed = Some(conversation_id);
        }
    }
}

async fn lookup_conversation(db: &Arc<Database>, user_id: Uuid) -> Option<Uuid> {
    let db = db.clone();
    let uid = user_id.to_string();
    let row = spawn_blocking(move || db.get_conversation_for_user(&uid))
        .await
        .ok()?
        .ok()?;
    row.and_then(|c| c.id.parse().ok())
}

async fn is_participant(db: &Arc<Database>, conversation_id: Uuid, user_id: Uuid) -> bool {
    let db = db.clone();
    let cid = conversation_id.to_string();
    let row = match spawn_blocking(move || db.get_conversation_by_id(&cid)).await {
        Ok(Ok(row)) => row,
        _ => return false,
    };

    let uid = user_id.to_string();
    row.map(|c| c.partner1_id == uid || c.partner2_id.as_deref() == Some(uid.as_str()))
        .unwrap_or(false)
}
