//! Per-connection session loop.

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures_util::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};

use crate::realtime::hub::RealtimeHub;
use crate::realtime::messages::ServerMessage;

type Sink = SplitSink<WebSocket, Message>;

/// Drive one upgraded connection until either side closes it.
pub(crate) async fn run(hub: RealtimeHub, socket: WebSocket) {
    let (id, mut outbound) = hub.register();
    let mut closing = hub.closing_signal();
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            () = closing.recv() => {
                let frame = CloseFrame {
                    code: close_code::AWAY,
                    reason: "server shutting down".into(),
                };
                let _ = sink.send(Message::Close(Some(frame))).await;
                break;
            }
            Some(message) = outbound.recv() => {
                if send(&mut sink, &message).await.is_err() {
                    break;
                }
            }
            incoming = stream.next() => {
                let reply = match incoming {
                    Some(Ok(Message::Text(text))) => hub.handle_client_text(id, text.as_str()),
                    Some(Ok(Message::Binary(_))) => {
                        ServerMessage::error("binary frames are not supported")
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::debug!(session = %id, error = %e, "Real-time socket error");
                        break;
                    }
                };
                if send(&mut sink, &reply).await.is_err() {
                    break;
                }
            }
        }
    }

    hub.unregister(id);
}

async fn send(sink: &mut Sink, message: &ServerMessage) -> Result<(), axum::Error> {
    let text = match message.to_text() {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode real-time message");
            return Ok(());
        }
    };
    sink.send(Message::Text(text.into())).await
}
