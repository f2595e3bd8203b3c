//! Transport adapter: OCPP-J framing over a WebSocket plus pending-call correlation
//! (spec §4.G). Grounded in the `CommandSender`/`PendingRequest` pattern, inverted
//! for the station-as-client direction and narrowed to one registry per station
//! (spec §5: "no cross-station sharing").

use std::time::Duration;

use dashmap::DashMap;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::support::errors::TransportError;
use crate::support::ocpp_frame::OcppFrame;

const CALL_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
pub type WsSource = futures_util::stream::SplitStream<WsStream>;

struct PendingCall {
    response_tx: oneshot::Sender<Result<Value, TransportError>>,
}

/// Connects to a CSMS at `url` (path convention `/<base>/<stationId>`, subprotocol
/// `ocpp1.6`), bounded by `CONNECT_TIMEOUT` so a dead CSMS cannot stall the fleet.
pub async fn connect(url: &str) -> Result<(StationTransport, WsSource), TransportError> {
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;

    let mut request = url
        .into_client_request()
        .map_err(|e| TransportError::MalformedFrame(e.to_string()))?;
    request
        .headers_mut()
        .insert("Sec-WebSocket-Protocol", "ocpp1.6".parse().unwrap());

    let connect_fut = tokio_tungstenite::connect_async(request);
    let (ws, _response) = tokio::time::timeout(CONNECT_TIMEOUT, connect_fut)
        .await
        .map_err(|_| TransportError::CallTimeout)?
        .map_err(|e| TransportError::MalformedFrame(e.to_string()))?;

    let (sink, source) = ws.split();
    Ok((StationTransport::new(sink), source))
}

/// Per-station outbound transport: call correlation plus raw send of
/// unsolicited results/errors. One in-flight call at a time in the reference
/// model — the session serializes outbound calls itself (spec §4.G).
pub struct StationTransport {
    sink: Mutex<WsSink>,
    pending: DashMap<String, PendingCall>,
}

impl StationTransport {
    fn new(sink: WsSink) -> Self {
        Self {
            sink: Mutex::new(sink),
            pending: DashMap::new(),
        }
    }

    fn next_unique_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Send a `[2, uniqueId, action, payload]` call and await its `[3,...]`/`[4,...]`.
    pub async fn call(&self, action: &str, payload: Value) -> Result<Value, TransportError> {
        let unique_id = self.next_unique_id();
        let frame = OcppFrame::Call {
            unique_id: unique_id.clone(),
            action: action.to_string(),
            payload,
        };

        let (tx, rx) = oneshot::channel();
        self.pending.insert(unique_id.clone(), PendingCall { response_tx: tx });

        if let Err(e) = self.send_raw(&frame).await {
            self.pending.remove(&unique_id);
            return Err(e);
        }

        match tokio::time::timeout(CALL_TIMEOUT, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                self.pending.remove(&unique_id);
                Err(TransportError::TransportClosed)
            }
            Err(_) => {
                self.pending.remove(&unique_id);
                warn!(action, unique_id, "call timed out");
                Err(TransportError::CallTimeout)
            }
        }
    }

    /// Send a `[3, uniqueId, payload]` response to an inbound call.
    pub async fn send_result(&self, unique_id: &str, payload: Value) -> Result<(), TransportError> {
        self.send_raw(&OcppFrame::CallResult {
            unique_id: unique_id.to_string(),
            payload,
        })
        .await
    }

    /// Send a `[4, uniqueId, errorCode, errorDescription, {}]` response.
    pub async fn send_error(
        &self,
        unique_id: &str,
        error_code: &str,
        error_description: &str,
    ) -> Result<(), TransportError> {
        self.send_raw(&OcppFrame::error_response(unique_id, error_code, error_description))
            .await
    }

    async fn send_raw(&self, frame: &OcppFrame) -> Result<(), TransportError> {
        let text = frame.serialize();
        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(text))
            .await
            .map_err(|e| TransportError::MalformedFrame(e.to_string()))
    }

    /// Resolve a pending call by unique id. Returns `false` if no such call is
    /// outstanding (an unexpected response for an unknown id is dropped — spec §4.G).
    pub fn resolve(&self, unique_id: &str, result: Result<Value, TransportError>) -> bool {
        if let Some((_, pending)) = self.pending.remove(unique_id) {
            let _ = pending.response_tx.send(result);
            true
        } else {
            debug!(unique_id, "response for unknown or already-resolved call");
            false
        }
    }

    pub async fn close(&self) {
        let _ = self.sink.lock().await.close().await;
    }
}

/// Read one OCPP frame off the source. Malformed frames are logged and dropped,
/// never propagated as a session-ending error (spec §7).
pub async fn recv_frame(source: &mut WsSource) -> Option<OcppFrame> {
    loop {
        let message = match source.next().await {
            Some(Ok(m)) => m,
            Some(Err(e)) => {
                warn!(error = %e, "transport read error");
                return None;
            }
            None => return None,
        };

        let text = match message {
            Message::Text(t) => t,
            Message::Close(_) => return None,
            _ => continue,
        };

        match OcppFrame::parse(&text) {
            Ok(frame) => return Some(frame),
            Err(e) => {
                warn!(error = %e, "malformed frame dropped");
                continue;
            }
        }
    }
}
