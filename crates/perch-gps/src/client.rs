//! Reconnecting WebSocket client for the GPS relay.
//!
//! Runs on its own thread with a current-thread tokio runtime so the
//! tracker loop stays synchronous. All shared state sits behind one
//! mutex; the fusion engine only ever sees consistent snapshots.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use perch_core::clock::{Clock, SystemClock};
use perch_core::geo::GeoPoint;

use crate::wire::{self, FixSource, Inbound};
use crate::GpsError;

/// Delay between reconnect attempts.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Fixes accepted so far, per source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixCounters {
    pub platform: u64,
    pub subject: u64,
}

/// Last-known relay state. `platform_updated`/`subject_updated` are
/// local receive times (engine clock domain), distinct from the fix
/// capture timestamps the engine uses for freshness.
#[derive(Debug, Clone, Default)]
pub struct GpsState {
    pub platform: Option<GeoPoint>,
    pub subject: Option<GeoPoint>,
    pub platform_updated: f64,
    pub subject_updated: f64,
    pub connected: bool,
    pub fixes: FixCounters,
}

type UpdateCallback = dyn Fn(&GpsState) + Send + Sync;

pub struct GpsClient {
    uri: String,
    state: Arc<Mutex<GpsState>>,
    running: Arc<AtomicBool>,
    on_update: Option<Arc<UpdateCallback>>,
    handle: Option<JoinHandle<()>>,
}

impl GpsClient {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            state: Arc::new(Mutex::new(GpsState::default())),
            running: Arc::new(AtomicBool::new(false)),
            on_update: None,
            handle: None,
        }
    }

    /// Register a callback invoked after every accepted fix. Set before
    /// [`start`](Self::start).
    pub fn on_update<F>(&mut self, callback: F)
    where
        F: Fn(&GpsState) + Send + Sync + 'static,
    {
        self.on_update = Some(Arc::new(callback));
    }

    /// Spawn the background connection thread.
    pub fn start(&mut self) -> Result<(), GpsError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(GpsError::AlreadyRunning);
        }

        let uri = self.uri.clone();
        let state = Arc::clone(&self.state);
        let running = Arc::clone(&self.running);
        let on_update = self.on_update.clone();

        let handle = std::thread::Builder::new()
            .name("perch-gps".into())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        warn!(error = %e, "failed to build GPS client runtime");
                        running.store(false, Ordering::SeqCst);
                        return;
                    }
                };
                runtime.block_on(connect_loop(uri, state, running, on_update));
            })?;

        self.handle = Some(handle);
        info!("GPS client started");
        Ok(())
    }

    /// Stop the background thread and wait for it to exit.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        info!("GPS client stopped");
    }

    /// Snapshot of the current relay state.
    pub fn state(&self) -> GpsState {
        self.state.lock().unwrap().clone()
    }

    pub fn is_platform_fresh(&self, max_age_s: f64) -> bool {
        let state = self.state.lock().unwrap();
        state.platform.is_some() && SystemClock.now() - state.platform_updated < max_age_s
    }

    pub fn is_subject_fresh(&self, max_age_s: f64) -> bool {
        let state = self.state.lock().unwrap();
        state.subject.is_some() && SystemClock.now() - state.subject_updated < max_age_s
    }
}

impl Drop for GpsClient {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Connection loop
// ---------------------------------------------------------------------------

async fn connect_loop(
    uri: String,
    state: Arc<Mutex<GpsState>>,
    running: Arc<AtomicBool>,
    on_update: Option<Arc<UpdateCallback>>,
) {
    while running.load(Ordering::SeqCst) {
        info!(uri = %uri, "connecting to GPS relay");
        match connect_async(uri.as_str()).await {
            Ok((ws, _)) => {
                state.lock().unwrap().connected = true;
                info!("connected to GPS relay");

                let (tx, rx) = ws.split();
                read_session(tx, rx, &state, &running, on_update.as_deref()).await;
            }
            Err(e) => warn!(error = %e, "connection failed"),
        }

        state.lock().unwrap().connected = false;

        if running.load(Ordering::SeqCst) {
            info!("reconnecting in {} s", RECONNECT_DELAY.as_secs());
            let mut waited = Duration::ZERO;
            while waited < RECONNECT_DELAY && running.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(250)).await;
                waited += Duration::from_millis(250);
            }
        }
    }
}

async fn read_session(
    mut tx: WsSink,
    mut rx: WsSource,
    state: &Arc<Mutex<GpsState>>,
    running: &AtomicBool,
    on_update: Option<&UpdateCallback>,
) {
    let mut shutdown_check = tokio::time::interval(Duration::from_millis(250));

    loop {
        tokio::select! {
            message = rx.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    handle_text(&text, &mut tx, state, on_update).await;
                }
                Some(Ok(Message::Ping(payload))) => {
                    let _ = tx.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("relay closed the connection");
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "socket error");
                    return;
                }
            },
            _ = shutdown_check.tick() => {
                if !running.load(Ordering::SeqCst) {
                    let _ = tx.send(Message::Close(None)).await;
                    return;
                }
            }
        }
    }
}

async fn handle_text(
    text: &str,
    tx: &mut WsSink,
    state: &Arc<Mutex<GpsState>>,
    on_update: Option<&UpdateCallback>,
) {
    match wire::parse_inbound(text) {
        Ok(Inbound::Fix(fix)) => {
            let source = fix.source;
            let point = GeoPoint::from(fix);
            let now = SystemClock.now();

            let snapshot = {
                let mut s = state.lock().unwrap();
                match source {
                    FixSource::Platform => {
                        s.platform = Some(point);
                        s.platform_updated = now;
                        s.fixes.platform += 1;
                    }
                    FixSource::Subject => {
                        s.subject = Some(point);
                        s.subject_updated = now;
                        s.fixes.subject += 1;
                    }
                }
                s.clone()
            };

            debug!(
                source = ?source,
                lat = point.lat,
                lon = point.lon,
                "fix accepted"
            );

            if let Some(callback) = on_update {
                callback(&snapshot);
            }
        }
        Ok(Inbound::Ping(id)) => {
            debug!("heartbeat ping, replying");
            let _ = tx.send(Message::Text(wire::pong(&id))).await;
        }
        Ok(Inbound::Pong(_)) => {}
        Err(e) => warn!(error = %e, "dropping malformed relay payload"),
    }
}
