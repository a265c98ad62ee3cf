use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::{WsCodec, WsRequest};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message, WebSocketStream};
use tracing::{debug, instrument, trace, warn};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Keepalive (ping / liveness) settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepaliveConfig {
    /// Interval between pings in milliseconds
    pub ping_interval_ms: u64,
    /// Maximum gap without inbound traffic before the session is torn down
    pub timeout_ms: u64,
}

impl KeepaliveConfig {
    pub fn new(ping_interval_ms: u64, timeout_ms: u64) -> Self {
        Self {
            ping_interval_ms: ping_interval_ms.max(1),
            timeout_ms,
        }
    }

    /// Ping twice per liveness window
    pub fn from_timeout_secs(timeout_secs: u64) -> Self {
        let timeout_ms = timeout_secs.saturating_mul(1_000);
        Self::new(timeout_ms / 2, timeout_ms)
    }
}

/// WebSocket session configuration
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Capacity of the inbound event queue
    pub message_buffer_size: usize,
    /// Capacity of the outbound request queue
    pub outbound_buffer_size: usize,
    /// Keepalive pings; `None` sends no pings at all
    pub keepalive: Option<KeepaliveConfig>,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 45_000,
            message_buffer_size: 1024,
            outbound_buffer_size: 64,
            keepalive: None,
        }
    }
}

impl WsConfig {
    pub fn with_connect_timeout_ms(mut self, connect_timeout_ms: u64) -> Self {
        self.connect_timeout_ms = connect_timeout_ms;
        self
    }

    pub fn with_message_buffer_size(mut self, size: usize) -> Self {
        self.message_buffer_size = size.max(1);
        self
    }

    pub fn with_keepalive(mut self, keepalive: Option<KeepaliveConfig>) -> Self {
        self.keepalive = keepalive;
        self
    }
}

/// Lifecycle of a session. The handshake happens inside
/// [`WsSession::connect`], so a session value starts out `Open`.
/// `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closing,
    Closed,
}

/// Cloneable handle that asks a session to stop
#[derive(Debug, Clone)]
pub struct StopHandle {
    notify: Arc<Notify>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.notify.notify_one();
    }
}

type EventItem<C> = Result<<C as WsCodec>::Message, ExchangeError>;

/// Liveness seen by the watchdog. Any inbound frame counts, and time spent
/// waiting on a full event queue does not count against the peer.
struct Liveness {
    started: Instant,
    last_inbound_ms: AtomicU64,
    delivering: AtomicBool,
}

impl Liveness {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            last_inbound_ms: AtomicU64::new(0),
            delivering: AtomicBool::new(false),
        }
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn touch(&self) {
        self.last_inbound_ms.store(self.now_ms(), Ordering::Relaxed);
    }

    fn set_delivering(&self, delivering: bool) {
        self.delivering.store(delivering, Ordering::Relaxed);
        if !delivering {
            self.touch();
        }
    }

    /// Milliseconds since the last inbound frame, `None` while the reader is
    /// held up by the caller.
    fn silence_ms(&self) -> Option<u64> {
        if self.delivering.load(Ordering::Relaxed) {
            return None;
        }
        Some(
            self.now_ms()
                .saturating_sub(self.last_inbound_ms.load(Ordering::Relaxed)),
        )
    }
}

/// One persistent socket with a writer task (sole owner of the sink), a
/// reader task, an optional keepalive watchdog and a shutdown coordinator.
///
/// Decoded events and per-frame errors are delivered in order through
/// [`WsSession::next_event`]. The cause of an unexpected shutdown is
/// delivered last; a caller-initiated stop produces no error item.
pub struct WsSession<C: WsCodec> {
    codec: Arc<C>,
    outbound: mpsc::Sender<Message>,
    events: mpsc::Receiver<EventItem<C>>,
    stop: Arc<Notify>,
    state: watch::Receiver<SessionState>,
    terminal: Arc<Mutex<Option<ExchangeError>>>,
}

impl<C: WsCodec> std::fmt::Debug for WsSession<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsSession")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<C: WsCodec> WsSession<C> {
    /// Perform the handshake and start the session tasks
    #[instrument(skip(codec, config), fields(connect_timeout_ms = config.connect_timeout_ms))]
    pub async fn connect(url: &str, codec: C, config: WsConfig) -> Result<Self, ExchangeError> {
        let connect_timeout = Duration::from_millis(config.connect_timeout_ms);
        let (stream, _) = tokio::time::timeout(connect_timeout, connect_async(url))
            .await
            .map_err(|_| {
                ExchangeError::StreamConnect(format!(
                    "Handshake timed out after {}ms",
                    config.connect_timeout_ms
                ))
            })?
            .map_err(|e| ExchangeError::StreamConnect(format!("WebSocket connection failed: {}", e)))?;

        debug!("WebSocket connected");
        Ok(Self::from_stream(stream, codec, config))
    }

    /// Start the session tasks over an established stream
    pub fn from_stream<S>(stream: WebSocketStream<S>, codec: C, config: WsConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let codec = Arc::new(codec);
        let (sink, source) = stream.split();
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_buffer_size.max(1));
        let (events_tx, events_rx) = mpsc::channel(config.message_buffer_size.max(1));
        let (failures_tx, failures_rx) = mpsc::channel(4);
        let (state_tx, state_rx) = watch::channel(SessionState::Open);
        let stop = Arc::new(Notify::new());
        let terminal = Arc::new(Mutex::new(None));
        let liveness = Arc::new(Liveness::new());

        let mut tasks = vec![
            tokio::spawn(run_writer(
                sink,
                outbound_rx,
                failures_tx.clone(),
                state_rx.clone(),
            )),
            tokio::spawn(run_reader(
                source,
                Arc::clone(&codec),
                events_tx,
                failures_tx.clone(),
                state_rx.clone(),
                Arc::clone(&liveness),
            )),
        ];
        if let Some(keepalive) = config.keepalive {
            tasks.push(tokio::spawn(run_watchdog(
                keepalive,
                outbound_tx.clone(),
                failures_tx,
                state_rx.clone(),
                liveness,
            )));
        }

        tokio::spawn(coordinate(
            Arc::clone(&stop),
            failures_rx,
            state_tx,
            Arc::clone(&terminal),
            tasks,
        ));

        Self {
            codec,
            outbound: outbound_tx,
            events: events_rx,
            stop,
            state: state_rx,
            terminal,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// Enqueue a request; requests reach the socket in submission order
    pub async fn send_request(&self, request: &WsRequest) -> Result<(), ExchangeError> {
        if !self.is_open() {
            return Err(ExchangeError::SessionClosed);
        }
        let message = self.codec.encode_request(request)?;
        trace!(destination = %request.destination, correlation_id = request.correlation_id, "Queueing request");
        self.outbound
            .send(message)
            .await
            .map_err(|_| ExchangeError::SessionClosed)
    }

    /// Next decoded event or error item; `None` once the session is closed
    /// and everything has been drained.
    pub async fn next_event(&mut self) -> Option<EventItem<C>> {
        if let Some(item) = self.events.recv().await {
            return Some(item);
        }
        self.done().await;
        self.terminal
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .map(Err)
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            notify: Arc::clone(&self.stop),
        }
    }

    /// Request a graceful stop and wait for the session to close
    pub async fn stop(&self) {
        self.stop.notify_one();
        self.done().await;
    }

    /// Resolves once the session reaches `Closed`
    pub async fn done(&self) {
        let mut state = self.state.clone();
        loop {
            if *state.borrow_and_update() == SessionState::Closed {
                return;
            }
            if state.changed().await.is_err() {
                return;
            }
        }
    }
}

impl<C: WsCodec> Drop for WsSession<C> {
    fn drop(&mut self) {
        self.stop.notify_one();
    }
}

async fn wait_closing(state: &mut watch::Receiver<SessionState>) {
    loop {
        if matches!(
            *state.borrow_and_update(),
            SessionState::Closing | SessionState::Closed
        ) {
            return;
        }
        if state.changed().await.is_err() {
            return;
        }
    }
}

fn report(failures: &mpsc::Sender<ExchangeError>, err: ExchangeError) {
    if failures.try_send(err).is_err() {
        trace!("Failure already reported");
    }
}

async fn coordinate(
    stop: Arc<Notify>,
    mut failures: mpsc::Receiver<ExchangeError>,
    state: watch::Sender<SessionState>,
    terminal: Arc<Mutex<Option<ExchangeError>>>,
    tasks: Vec<JoinHandle<()>>,
) {
    let cause = tokio::select! {
        _ = stop.notified() => None,
        Some(err) = failures.recv() => Some(err),
    };

    match cause {
        Some(err) => {
            warn!(error = %err, "Stream session shutting down");
            if let Ok(mut slot) = terminal.lock() {
                *slot = Some(err);
            }
        }
        None => debug!("Stream session stopped by caller"),
    }

    state.send_replace(SessionState::Closing);
    for task in tasks {
        if let Err(e) = task.await {
            warn!("Stream task ended abnormally: {}", e);
        }
    }
    state.send_replace(SessionState::Closed);
}

async fn run_writer<S>(
    mut sink: SplitSink<WebSocketStream<S>, Message>,
    mut outbound: mpsc::Receiver<Message>,
    failures: mpsc::Sender<ExchangeError>,
    mut state: watch::Receiver<SessionState>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    loop {
        tokio::select! {
            () = wait_closing(&mut state) => break,
            message = outbound.recv() => {
                let Some(message) = message else { break };
                // A stalled peer must not keep the session from closing
                let sent = tokio::select! {
                    () = wait_closing(&mut state) => break,
                    sent = sink.send(message) => sent,
                };
                if let Err(e) = sent {
                    report(&failures, ExchangeError::StreamIo(format!("Write failed: {}", e)));
                    break;
                }
            }
        }
    }

    match tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await {
        Ok(Ok(())) => trace!("Socket closed"),
        Ok(Err(e)) => debug!("Socket close failed: {}", e),
        Err(_) => debug!("Socket close timed out"),
    }
}

async fn run_reader<S, C>(
    mut source: SplitStream<WebSocketStream<S>>,
    codec: Arc<C>,
    events: mpsc::Sender<EventItem<C>>,
    failures: mpsc::Sender<ExchangeError>,
    mut state: watch::Receiver<SessionState>,
    liveness: Arc<Liveness>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    C: WsCodec,
{
    loop {
        let frame = tokio::select! {
            () = wait_closing(&mut state) => break,
            frame = source.next() => frame,
        };

        if matches!(frame, Some(Ok(_))) {
            liveness.touch();
        }

        let item = match frame {
            Some(Ok(message @ (Message::Text(_) | Message::Binary(_)))) => {
                match codec.decode_message(message) {
                    Ok(Some(event)) => Ok(event),
                    Ok(None) => continue,
                    Err(e) => {
                        warn!("Dropping frame: {}", e);
                        Err(e)
                    }
                }
            }
            // tungstenite queues the pong reply itself
            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
            Some(Ok(Message::Close(frame))) => {
                let reason = frame.map_or_else(
                    || "no close frame".to_string(),
                    |f| format!("{} {}", f.code, f.reason),
                );
                report(
                    &failures,
                    ExchangeError::StreamIo(format!("Remote closed the connection: {}", reason)),
                );
                break;
            }
            Some(Err(e)) => {
                report(&failures, ExchangeError::StreamIo(format!("Read failed: {}", e)));
                break;
            }
            None => {
                report(
                    &failures,
                    ExchangeError::StreamIo("Connection ended unexpectedly".to_string()),
                );
                break;
            }
        };

        let permit = match events.try_reserve() {
            Ok(permit) => permit,
            Err(mpsc::error::TrySendError::Closed(())) => break,
            Err(mpsc::error::TrySendError::Full(())) => {
                trace!("Event queue full, waiting for the caller");
                liveness.set_delivering(true);
                let reserved = tokio::select! {
                    () = wait_closing(&mut state) => None,
                    reserved = events.reserve() => reserved.ok(),
                };
                liveness.set_delivering(false);
                match reserved {
                    Some(permit) => permit,
                    None => break,
                }
            }
        };
        permit.send(item);
    }
}

async fn run_watchdog(
    keepalive: KeepaliveConfig,
    outbound: mpsc::Sender<Message>,
    failures: mpsc::Sender<ExchangeError>,
    mut state: watch::Receiver<SessionState>,
    liveness: Arc<Liveness>,
) {
    let interval = Duration::from_millis(keepalive.ping_interval_ms);
    loop {
        match outbound.try_send(Message::Ping(Vec::new())) {
            Ok(()) => trace!("Ping queued"),
            Err(mpsc::error::TrySendError::Full(_)) => debug!("Outbound queue full, skipping ping"),
            Err(mpsc::error::TrySendError::Closed(_)) => break,
        }

        tokio::select! {
            () = wait_closing(&mut state) => break,
            () = tokio::time::sleep(interval) => {}
        }

        if let Some(elapsed_ms) = liveness.silence_ms() {
            if elapsed_ms > keepalive.timeout_ms {
                report(&failures, ExchangeError::KeepaliveTimeout { elapsed_ms });
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::future::Future;
    use tokio::net::{TcpListener, TcpStream};

    struct TextCodec;

    impl WsCodec for TextCodec {
        type Message = String;

        fn decode_message(&self, message: Message) -> Result<Option<String>, ExchangeError> {
            match message {
                Message::Text(text) if text == "bad" => {
                    Err(ExchangeError::Decode("bad frame".to_string()))
                }
                Message::Text(text) if text == "skip" => Ok(None),
                Message::Text(text) => Ok(Some(text)),
                _ => Ok(None),
            }
        }
    }

    async fn serve_once<F, Fut>(handler: F) -> String
    where
        F: FnOnce(WebSocketStream<TcpStream>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            handler(ws).await;
        });
        format!("ws://{}", addr)
    }

    async fn drain(mut ws: WebSocketStream<TcpStream>) {
        while let Some(Ok(_)) = ws.next().await {}
    }

    async fn within<T>(fut: impl Future<Output = T>) -> T {
        tokio::time::timeout(Duration::from_secs(5), fut)
            .await
            .expect("timed out")
    }

    #[tokio::test]
    async fn test_requests_in_order_and_events_with_errors() {
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let url = serve_once(move |mut ws| async move {
            for _ in 0..2 {
                if let Some(Ok(Message::Text(text))) = ws.next().await {
                    seen_tx.send(text).unwrap();
                }
            }
            for frame in ["a", "skip", "bad", "b"] {
                ws.send(Message::Text(frame.to_string())).await.unwrap();
            }
            drain(ws).await;
        })
        .await;

        let mut session = WsSession::connect(&url, TextCodec, WsConfig::default())
            .await
            .unwrap();
        assert!(session.is_open());

        session
            .send_request(&WsRequest::new("first", 0, json!({})))
            .await
            .unwrap();
        session
            .send_request(&WsRequest::new("second", 1, json!({})))
            .await
            .unwrap();

        let first: serde_json::Value = serde_json::from_str(&seen_rx.recv().await.unwrap()).unwrap();
        let second: serde_json::Value = serde_json::from_str(&seen_rx.recv().await.unwrap()).unwrap();
        assert_eq!(first["destination"], "first");
        assert_eq!(second["correlationId"], 1);

        assert_eq!(within(session.next_event()).await.unwrap().unwrap(), "a");
        assert!(matches!(
            within(session.next_event()).await.unwrap(),
            Err(ExchangeError::Decode(_))
        ));
        assert_eq!(within(session.next_event()).await.unwrap().unwrap(), "b");

        within(session.stop()).await;
        assert_eq!(session.state(), SessionState::Closed);
        assert!(within(session.next_event()).await.is_none());
    }

    #[tokio::test]
    async fn test_stop_is_graceful_and_done_is_idempotent() {
        let url = serve_once(drain).await;
        let mut session = WsSession::connect(&url, TextCodec, WsConfig::default())
            .await
            .unwrap();

        session.stop_handle().stop();
        within(session.done()).await;
        within(session.done()).await;

        assert_eq!(session.state(), SessionState::Closed);
        assert!(within(session.next_event()).await.is_none());
        assert!(matches!(
            session.send_request(&WsRequest::new("late", 2, json!({}))).await,
            Err(ExchangeError::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn test_remote_close_is_reported() {
        let url = serve_once(|mut ws| async move {
            ws.close(None).await.unwrap();
            drain(ws).await;
        })
        .await;

        let mut session = WsSession::connect(&url, TextCodec, WsConfig::default())
            .await
            .unwrap();

        assert!(matches!(
            within(session.next_event()).await,
            Some(Err(ExchangeError::StreamIo(_)))
        ));
        assert!(within(session.next_event()).await.is_none());
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_keepalive_timeout_forces_close() {
        // The peer never reads, so pings go unanswered
        let url = serve_once(|ws| async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(ws);
        })
        .await;

        let config = WsConfig::default().with_keepalive(Some(KeepaliveConfig::new(20, 100)));
        let mut session = WsSession::connect(&url, TextCodec, config).await.unwrap();

        match within(session.next_event()).await {
            Some(Err(ExchangeError::KeepaliveTimeout { elapsed_ms })) => assert!(elapsed_ms > 100),
            other => panic!("unexpected item: {:?}", other),
        }
        within(session.done()).await;
        assert!(!session.is_open());
    }

    #[tokio::test]
    async fn test_keepalive_stays_open_while_pongs_arrive() {
        let url = serve_once(drain).await;

        let config = WsConfig::default().with_keepalive(Some(KeepaliveConfig::new(20, 200)));
        let session = WsSession::connect(&url, TextCodec, config).await.unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(session.is_open());
        within(session.stop()).await;
    }

    #[tokio::test]
    async fn test_slow_caller_does_not_trip_keepalive() {
        // Peer answers pings (tungstenite replies while reading) and floods frames
        let url = serve_once(|mut ws| async move {
            for i in 0..20 {
                ws.send(Message::Text(format!("frame-{}", i))).await.unwrap();
            }
            drain(ws).await;
        })
        .await;

        let config = WsConfig::default()
            .with_message_buffer_size(4)
            .with_keepalive(Some(KeepaliveConfig::new(50, 300)));
        let mut session = WsSession::connect(&url, TextCodec, config).await.unwrap();

        tokio::time::sleep(Duration::from_millis(800)).await;
        assert!(session.is_open());

        for i in 0..20 {
            let item = within(session.next_event()).await.unwrap();
            assert_eq!(item.unwrap(), format!("frame-{}", i));
        }
        assert!(session.is_open());
        within(session.stop()).await;
        assert!(within(session.next_event()).await.is_none());
    }

    #[tokio::test]
    async fn test_stop_completes_while_peer_stops_reading() {
        let url = serve_once(|ws| async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(ws);
        })
        .await;

        let session = WsSession::connect(&url, TextCodec, WsConfig::default())
            .await
            .unwrap();

        // Far more than the loopback socket buffers hold
        let blob = "x".repeat(1 << 20);
        for id in 0..32 {
            session
                .send_request(&WsRequest::new("bulk", id, json!({ "blob": blob })))
                .await
                .unwrap();
        }
        tokio::time::sleep(Duration::from_millis(200)).await;

        within(session.stop()).await;
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = WsSession::connect(&format!("ws://{}", addr), TextCodec, WsConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::StreamConnect(_)));
    }

    #[test]
    fn test_keepalive_from_timeout() {
        let keepalive = KeepaliveConfig::from_timeout_secs(60);
        assert_eq!(keepalive.timeout_ms, 60_000);
        assert_eq!(keepalive.ping_interval_ms, 30_000);
        assert_eq!(KeepaliveConfig::from_timeout_secs(0).ping_interval_ms, 1);
    }
}
