//! Live monitor: feed connection plus the frame loop
//!
//! `start` spawns two tasks sharing one cancellation token. The feed task
//! keeps the buffer stores current; the frame task repaints both views from
//! whatever snapshot is latest at each tick and hands the pixmaps to a
//! [`FrameSink`]. Frames are only painted while the feed is open.

use crate::buffer::FeedStores;
use crate::config::Settings;
use crate::feed::{ConnectionState, FeedClient};
use crate::render::{Canvas, RenderError, View, spectrogram, waveform};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod sink;

pub use sink::{CaptureSink, FrameSink, NullSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Running,
}

impl PlaybackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Running => "running",
        }
    }
}

/// Snapshot of what the dashboard's metric tiles show
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorStatus {
    pub playback: PlaybackState,
    pub connection: ConnectionState,
    pub samples: usize,
    pub frequency_bins: usize,
    pub last_update: Option<jiff::Timestamp>,
    /// Length of the analysed window (last time-axis entry), in seconds
    pub window_seconds: Option<f64>,
    pub frames_presented: u64,
}

struct Running {
    cancel: CancellationToken,
    feed: JoinHandle<()>,
    frames: JoinHandle<()>,
}

pub struct Monitor {
    settings: Settings,
    stores: Arc<FeedStores>,
    sink: Arc<dyn FrameSink>,
    client: Option<Arc<FeedClient>>,
    running: Option<Running>,
    frames_presented: Arc<AtomicU64>,
}

impl Monitor {
    pub fn new(settings: Settings, sink: Arc<dyn FrameSink>) -> Self {
        Self {
            settings,
            stores: Arc::new(FeedStores::new()),
            sink,
            client: None,
            running: None,
            frames_presented: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn playback(&self) -> PlaybackState {
        if self.running.is_some() {
            PlaybackState::Running
        } else {
            PlaybackState::Idle
        }
    }

    pub fn connection(&self) -> ConnectionState {
        self.client
            .as_ref()
            .map_or(ConnectionState::Closed, |client| client.state())
    }

    /// Idle -> Running. Opens a fresh connection; a no-op when already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) -> Result<(), RenderError> {
        if self.running.is_some() {
            debug!("Monitor already running");
            return Ok(());
        }

        let waveform_canvas = Canvas::new(
            self.settings.waveform_size.width,
            self.settings.waveform_size.height,
        )?;
        let spectrogram_canvas = Canvas::new(
            self.settings.spectrogram_size.width,
            self.settings.spectrogram_size.height,
        )?;

        let cancel = CancellationToken::new();
        let client = Arc::new(FeedClient::new(
            self.settings.feed_url.clone(),
            self.settings.reconnect_delay(),
            Arc::clone(&self.stores),
        ));

        let feed = tokio::spawn({
            let client = Arc::clone(&client);
            let cancel = cancel.clone();
            async move { client.run(cancel).await }
        });

        let frame_loop = FrameLoop {
            stores: Arc::clone(&self.stores),
            client: Arc::clone(&client),
            sink: Arc::clone(&self.sink),
            waveform: waveform_canvas,
            spectrogram: spectrogram_canvas,
            amplitude: self.settings.amplitude,
            presented: Arc::clone(&self.frames_presented),
        };
        let frames = tokio::spawn(frame_loop.run(self.settings.frame_interval(), cancel.clone()));

        info!(
            url = %self.settings.feed_url,
            frame_rate = self.settings.frame_rate,
            "Monitor started"
        );

        self.client = Some(client);
        self.running = Some(Running {
            cancel,
            feed,
            frames,
        });
        Ok(())
    }

    /// Running -> Idle. Returns once both tasks have finished, so no frame is
    /// presented afterwards and the connection reads `Closed`. The session's
    /// buffers are emptied.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        running.cancel.cancel();
        let (feed, frames) = futures::future::join(running.feed, running.frames).await;
        for (task, result) in [("feed", feed), ("frame", frames)] {
            if let Err(e) = result {
                warn!("Monitor {} task ended abnormally: {}", task, e);
            }
        }

        // Buffers live for one session
        self.stores.clear();

        info!(
            frames = self.frames_presented.load(Ordering::Relaxed),
            "Monitor stopped"
        );
    }

    pub fn status(&self) -> MonitorStatus {
        let waveform = self.stores.waveform.latest();
        let spectrogram = self.stores.spectrogram.latest();

        let last_update = match (waveform.received_at, spectrogram.received_at) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };

        MonitorStatus {
            playback: self.playback(),
            connection: self.connection(),
            samples: waveform.len(),
            frequency_bins: spectrogram.matrix.rows(),
            last_update,
            window_seconds: spectrogram.window_seconds(),
            frames_presented: self.frames_presented.load(Ordering::Relaxed),
        }
    }
}

/// State owned by the frame task
struct FrameLoop {
    stores: Arc<FeedStores>,
    client: Arc<FeedClient>,
    sink: Arc<dyn FrameSink>,
    waveform: Canvas,
    spectrogram: Canvas,
    amplitude: f32,
    presented: Arc<AtomicU64>,
}

impl FrameLoop {
    async fn run(mut self, period: Duration, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut frame_no = 0u64;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            if self.client.state() != ConnectionState::Open {
                continue;
            }

            self.paint();

            // Cancellation may have landed while painting
            if cancel.is_cancelled() {
                break;
            }

            for (view, canvas) in [
                (View::Waveform, &self.waveform),
                (View::Spectrogram, &self.spectrogram),
            ] {
                if let Err(e) = self.sink.present(view, frame_no, canvas.pixmap()) {
                    warn!("Failed to present {} frame {}: {}", view.as_str(), frame_no, e);
                }
            }

            frame_no += 1;
            self.presented.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn paint(&mut self) {
        let samples = self.stores.waveform.latest();
        waveform::draw(&mut self.waveform, &samples, self.amplitude);

        let frame = self.stores.spectrogram.latest();
        spectrogram::draw(&mut self.spectrogram, &frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CanvasSize;
    use crate::protocol::FeedMessage;
    use async_tungstenite::tungstenite::Message;
    use futures_util::{SinkExt, StreamExt};
    use std::sync::Mutex;
    use tiny_skia::Pixmap;
    use tokio::net::TcpListener;

    /// Records (view, frame number) for every presented frame
    #[derive(Default)]
    struct RecordingSink {
        frames: Mutex<Vec<(View, u64)>>,
    }

    impl RecordingSink {
        fn count(&self) -> usize {
            self.frames.lock().unwrap().len()
        }
    }

    impl FrameSink for RecordingSink {
        fn present(&self, view: View, frame_no: u64, _frame: &Pixmap) -> Result<(), RenderError> {
            self.frames.lock().unwrap().push((view, frame_no));
            Ok(())
        }
    }

    /// WebSocket server that sends one waveform and one spectrogram update to
    /// every client, then holds the connection open
    async fn feed_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut ws = async_tungstenite::tokio::accept_async(stream).await.unwrap();
                    for message in [
                        FeedMessage::new_waveform(vec![0.0, 1.0, 2.0], vec![0.0, 1.0, -1.0]),
                        FeedMessage::new_spectrogram(
                            vec![vec![0.0, 255.0], vec![128.0, 64.0]],
                            vec![0.0, 4000.0],
                            vec![0.1, 0.2],
                        ),
                    ] {
                        let text = serde_json::to_string(&message).unwrap();
                        if ws.send(Message::Text(text)).await.is_err() {
                            return;
                        }
                    }
                    while let Some(Ok(_)) = ws.next().await {}
                });
            }
        });

        format!("ws://{}", addr)
    }

    fn settings(feed_url: String) -> Settings {
        Settings {
            feed_url,
            frame_rate: 100,
            reconnect_delay_ms: 50,
            waveform_size: CanvasSize::new(80, 30),
            spectrogram_size: CanvasSize::new(80, 40),
            ..Settings::default()
        }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not met in time");
    }

    #[tokio::test]
    async fn test_idle_monitor() {
        let mut monitor = Monitor::new(Settings::default(), Arc::new(NullSink));
        let status = monitor.status();
        assert_eq!(status.playback, PlaybackState::Idle);
        assert_eq!(status.connection, ConnectionState::Closed);
        assert_eq!(status.samples, 0);
        assert_eq!(status.last_update, None);

        // Stopping an idle monitor is a no-op
        monitor.stop().await;
        assert_eq!(monitor.playback(), PlaybackState::Idle);
    }

    #[tokio::test]
    async fn test_frames_flow_then_stop_is_final() {
        let url = feed_server().await;
        let sink = Arc::new(RecordingSink::default());
        let mut monitor = Monitor::new(settings(url), sink.clone());

        monitor.start().unwrap();
        assert_eq!(monitor.playback(), PlaybackState::Running);

        wait_until(|| monitor.status().frequency_bins == 2 && sink.count() >= 6).await;

        let status = monitor.status();
        assert_eq!(status.connection, ConnectionState::Open);
        assert_eq!(status.samples, 3);
        assert_eq!(status.window_seconds, Some(0.2));
        assert!(status.last_update.is_some());

        monitor.stop().await;
        assert_eq!(monitor.playback(), PlaybackState::Idle);
        assert_eq!(monitor.connection(), ConnectionState::Closed);

        let after_stop = sink.count();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(sink.count(), after_stop);

        // Both views are presented for each frame number
        let frames = sink.frames.lock().unwrap();
        assert_eq!(frames.len() % 2, 0);
        assert_eq!(frames[0], (View::Waveform, 0));
        assert_eq!(frames[1], (View::Spectrogram, 0));
    }

    #[tokio::test]
    async fn test_stop_discards_session_buffers() {
        let url = feed_server().await;
        let mut monitor = Monitor::new(settings(url), Arc::new(NullSink));

        monitor.start().unwrap();
        wait_until(|| monitor.status().samples == 3 && monitor.status().frequency_bins == 2).await;

        monitor.stop().await;
        let status = monitor.status();
        assert_eq!(status.samples, 0);
        assert_eq!(status.frequency_bins, 0);
        assert_eq!(status.last_update, None);
        assert_eq!(status.window_seconds, None);
    }

    #[tokio::test]
    async fn test_restart_opens_a_fresh_connection() {
        let url = feed_server().await;
        let mut monitor = Monitor::new(settings(url), Arc::new(NullSink));

        monitor.start().unwrap();
        wait_until(|| monitor.connection() == ConnectionState::Open).await;
        let first = Arc::clone(monitor.client.as_ref().unwrap());

        // Second start while running changes nothing
        monitor.start().unwrap();
        assert!(Arc::ptr_eq(monitor.client.as_ref().unwrap(), &first));

        monitor.stop().await;
        assert_eq!(first.state(), ConnectionState::Closed);
        monitor.start().unwrap();
        assert!(!Arc::ptr_eq(monitor.client.as_ref().unwrap(), &first));
        wait_until(|| monitor.connection() == ConnectionState::Open).await;

        monitor.stop().await;
        assert_eq!(monitor.connection(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_no_frames_without_a_connection() {
        // Nothing listens here
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let sink = Arc::new(RecordingSink::default());
        let mut monitor = Monitor::new(settings(format!("ws://{}", addr)), sink.clone());

        monitor.start().unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        monitor.stop().await;

        assert_eq!(sink.count(), 0);
        assert_eq!(monitor.status().frames_presented, 0);
    }
}
