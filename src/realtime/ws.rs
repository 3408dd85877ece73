use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{ws::Message, Query, State, WebSocketUpgrade},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::models::PsychiatristKey;

use super::Switchboard;

#[derive(Debug, Deserialize)]
pub(crate) struct ConnectQuery {
    pub(crate) psychiatrist: Option<PsychiatristKey>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn realtime_ws(
    Query(ConnectQuery { psychiatrist }): Query<ConnectQuery>,
    State(switchboard): State<Arc<Switchboard>>,

    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let psychiatrist = psychiatrist.filter(|key| !key.as_str().is_empty());

    ws.on_upgrade(async move |stream| {
        let (outbox, mut frames) = mpsc::unbounded_channel::<Arc<String>>();
        let (mut sender, mut receiver) = stream.split();

        let writer = tokio::spawn(async move {
            while let Some(frame) = frames.recv().await {
                if sender.send(Message::Text(frame.as_str().into())).await.is_err() {
                    break;
                }
            }
        });

        let connection = switchboard.connect(outbox, psychiatrist).await;
        info!(conn_id = %connection.id, label = %connection.label, "client connected");

        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => switchboard.handle_frame(&connection, text.as_str().as_bytes()).await,
                Message::Binary(bytes) => switchboard.handle_frame(&connection, &bytes).await,
                Message::Close(_) => break,
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }

        switchboard.disconnect(connection.id).await;
        writer.abort();
        debug!(conn_id = %connection.id, "client disconnected");
    })
}
