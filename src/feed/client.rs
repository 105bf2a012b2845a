//! WebSocket client for the acoustic feed
//!
//! One connection at a time, reconnecting after a fixed delay whenever the
//! socket closes or fails. The loop runs until its cancellation token fires.

use super::{ConnectionState, FeedError, codec};
use crate::buffer::FeedStores;
use async_tungstenite::WebSocketStream;
use async_tungstenite::tokio::{ConnectStream, connect_async};
use async_tungstenite::tungstenite::Message;
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Upper bound on the closing handshake when cancelled
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

pub struct FeedClient {
    url: String,
    reconnect_delay: Duration,
    stores: Arc<FeedStores>,
    state: watch::Sender<ConnectionState>,
}

/// How a connection ended
enum Ended {
    Cancelled,
    Disconnected,
}

impl FeedClient {
    pub fn new(url: impl Into<String>, reconnect_delay: Duration, stores: Arc<FeedStores>) -> Self {
        let (state, _rx) = watch::channel(ConnectionState::Closed);
        Self {
            url: url.into(),
            reconnect_delay,
            stores,
            state,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                debug!(from = current.as_str(), to = state.as_str(), "Feed state");
                *current = state;
                true
            }
        });
    }

    /// Connect, read, reconnect, until `cancel` fires.
    ///
    /// The state is always `Closed` when this returns.
    pub async fn run(&self, cancel: CancellationToken) {
        while !cancel.is_cancelled() {
            self.set_state(ConnectionState::Connecting);

            let connected = tokio::select! {
                _ = cancel.cancelled() => break,
                result = connect_async(self.url.as_str()) => result,
            };

            match connected {
                Ok((ws, _response)) => {
                    self.set_state(ConnectionState::Open);
                    info!(url = %self.url, "Feed connected");

                    if let Ended::Cancelled = self.read_frames(ws, &cancel).await {
                        break;
                    }
                }
                Err(source) => {
                    let err = FeedError::Connect {
                        url: self.url.clone(),
                        source,
                    };
                    warn!("{}", err);
                }
            }

            self.set_state(ConnectionState::Closed);
            debug!(delay_ms = self.reconnect_delay.as_millis() as u64, "Feed reconnect scheduled");

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }

        self.set_state(ConnectionState::Closed);
        info!(url = %self.url, "Feed stopped");
    }

    async fn read_frames(
        &self,
        mut ws: WebSocketStream<ConnectStream>,
        cancel: &CancellationToken,
    ) -> Ended {
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => {
                    // Observers see Closed before the handshake, which may stall
                    self.set_state(ConnectionState::Closed);
                    if tokio::time::timeout(CLOSE_TIMEOUT, ws.close(None)).await.is_err() {
                        debug!("Feed close handshake timed out");
                    }
                    return Ended::Cancelled;
                }
                next = ws.next() => next,
            };

            match next {
                Some(Ok(Message::Text(text))) => {
                    if let Err(e) = codec::apply_text(&text, &self.stores) {
                        warn!("Dropping feed message: {}", e);
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    info!(?frame, "Feed closed by server");
                    return Ended::Disconnected;
                }
                // Binary, ping and pong frames carry nothing for us
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("{}", FeedError::Transport(e));
                    return Ended::Disconnected;
                }
                None => {
                    info!("Feed stream ended");
                    return Ended::Disconnected;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FeedMessage;
    use futures_util::SinkExt;
    use tokio::net::TcpListener;

    async fn wait_for(rx: &mut watch::Receiver<ConnectionState>, state: ConnectionState) {
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == state))
            .await
            .expect("timed out waiting for state")
            .expect("state channel closed");
    }

    #[tokio::test]
    async fn test_receives_frames_and_closes_on_cancel() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = async_tungstenite::tokio::accept_async(stream).await.unwrap();
            let message = FeedMessage::new_waveform(vec![0.0, 1.0], vec![0.25, -0.75]);
            ws.send(Message::Text(serde_json::to_string(&message).unwrap()))
                .await
                .unwrap();
            // Drain until the client closes
            while let Some(Ok(_)) = ws.next().await {}
        });

        let stores = Arc::new(FeedStores::new());
        let mut waveform = stores.waveform.subscribe();
        let client = Arc::new(FeedClient::new(
            format!("ws://{}", addr),
            Duration::from_secs(30),
            Arc::clone(&stores),
        ));
        let mut state = client.subscribe_state();
        let cancel = CancellationToken::new();

        let task = tokio::spawn({
            let client = Arc::clone(&client);
            let cancel = cancel.clone();
            async move { client.run(cancel).await }
        });

        wait_for(&mut state, ConnectionState::Open).await;
        tokio::time::timeout(Duration::from_secs(5), waveform.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stores.waveform.latest().values, vec![0.25, -0.75]);

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(client.state(), ConnectionState::Closed);

        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancel_reports_closed_before_close_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Accepts, then never reads, so the closing handshake cannot finish
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let _ws = async_tungstenite::tokio::accept_async(stream).await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let client = Arc::new(FeedClient::new(
            format!("ws://{}", addr),
            Duration::from_secs(30),
            Arc::new(FeedStores::new()),
        ));
        let mut state = client.subscribe_state();
        let cancel = CancellationToken::new();

        let task = tokio::spawn({
            let client = Arc::clone(&client);
            let cancel = cancel.clone();
            async move { client.run(cancel).await }
        });

        wait_for(&mut state, ConnectionState::Open).await;
        cancel.cancel();

        // Well inside CLOSE_TIMEOUT
        tokio::time::timeout(
            Duration::from_millis(200),
            state.wait_for(|s| *s == ConnectionState::Closed),
        )
        .await
        .expect("Closed not published promptly")
        .unwrap();

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_malformed_frame_keeps_connection_open() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = async_tungstenite::tokio::accept_async(stream).await.unwrap();
            ws.send(Message::Text("{not json".to_string())).await.unwrap();
            let good = FeedMessage::new_spectrogram(vec![vec![10.0]], vec![], vec![]);
            ws.send(Message::Text(serde_json::to_string(&good).unwrap()))
                .await
                .unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let stores = Arc::new(FeedStores::new());
        let mut spectrogram = stores.spectrogram.subscribe();
        let client = FeedClient::new(
            format!("ws://{}", addr),
            Duration::from_secs(30),
            Arc::clone(&stores),
        );
        let cancel = CancellationToken::new();

        let run = client.run(cancel.clone());
        let check = async {
            tokio::time::timeout(Duration::from_secs(5), spectrogram.changed())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(stores.spectrogram.latest().matrix.value(0, 0), 10.0);
            assert_eq!(client.state(), ConnectionState::Open);
            cancel.cancel();
        };
        tokio::join!(run, check);

        assert_eq!(client.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_cancel_during_reconnect_delay() {
        // Bind then drop to get a port with nothing listening
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let client = Arc::new(FeedClient::new(
            format!("ws://{}", addr),
            Duration::from_secs(60),
            Arc::new(FeedStores::new()),
        ));
        let cancel = CancellationToken::new();

        let task = tokio::spawn({
            let client = Arc::clone(&client);
            let cancel = cancel.clone();
            async move { client.run(cancel).await }
        });

        // Connection refused, so by now the client sits in its long sleep
        tokio::time::sleep(Duration::from_millis(200)).await;

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(client.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_reconnects_after_server_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (accepted_tx, mut accepted_rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            // First connection is closed right away, the second stays up
            for n in 0..2 {
                let (stream, _) = listener.accept().await.unwrap();
                let mut ws = async_tungstenite::tokio::accept_async(stream).await.unwrap();
                accepted_tx.send(n).unwrap();
                if n == 0 {
                    ws.close(None).await.unwrap();
                    while let Some(Ok(_)) = ws.next().await {}
                } else {
                    while let Some(Ok(_)) = ws.next().await {}
                }
            }
        });

        let client = Arc::new(FeedClient::new(
            format!("ws://{}", addr),
            Duration::from_millis(50),
            Arc::new(FeedStores::new()),
        ));
        let cancel = CancellationToken::new();

        let task = tokio::spawn({
            let client = Arc::clone(&client);
            let cancel = cancel.clone();
            async move { client.run(cancel).await }
        });

        tokio::time::timeout(Duration::from_secs(5), async {
            assert_eq!(accepted_rx.recv().await, Some(0));
            assert_eq!(accepted_rx.recv().await, Some(1));
        })
        .await
        .unwrap();

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(client.state(), ConnectionState::Closed);
    }
}
