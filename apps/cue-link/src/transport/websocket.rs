use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use super::{Connection, Connector, Outbound, SocketEvent, TransportError};

/// Connects to the server's `/pipe` endpoint over a plain WebSocket.
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &url::Url) -> Result<Connection, TransportError> {
        let (ws_stream, _) = connect_async(url.as_str()).await.map_err(Box::new)?;

        let (tx_out, rx_out) = mpsc::unbounded_channel::<Outbound>();
        let (tx_events, rx_events) = mpsc::unbounded_channel::<SocketEvent>();

        tokio::spawn(handle_websocket(ws_stream, rx_out, tx_events));

        Ok(Connection {
            outbound: tx_out,
            events: rx_events,
        })
    }
}

/// Pumps frames between the socket and the session channels until either
/// side goes away. Always finishes by reporting `Closed`.
async fn handle_websocket(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut rx_out: mpsc::UnboundedReceiver<Outbound>,
    tx_events: mpsc::UnboundedSender<SocketEvent>,
) {
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx_out.recv().await {
            let result = match frame {
                Outbound::Text(text) => ws_sender.send(Message::text(text)).await,
                Outbound::Close => {
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                }
            };
            if let Err(err) = result {
                warn!(error = %err, "websocket send failed");
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    let mut code = None;
    let mut reason = String::new();

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if tx_events.send(SocketEvent::Message(text.to_string())).is_err() {
                    break;
                }
            }
            Ok(Message::Close(frame)) => {
                if let Some(frame) = frame {
                    code = Some(u16::from(frame.code));
                    reason = frame.reason.to_string();
                }
                break;
            }
            Ok(Message::Binary(data)) => {
                debug!(bytes = data.len(), "ignoring binary frame");
            }
            Ok(_) => {}
            Err(err) => {
                reason = err.to_string();
                break;
            }
        }
    }

    send_task.abort();
    let _ = send_task.await;
    let _ = tx_events.send(SocketEvent::Closed { code, reason });
}
