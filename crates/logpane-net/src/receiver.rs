use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use logpane_convert::{ConvertOptions, LogConverter, WireFormat, converter_for};
use logpane_types::{ArcRecord, Record};

use crate::ReceiverError;

/// Largest payload a single UDP datagram can carry
const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Receives converted records, one at a time
pub trait RecordSink: Send + Sync + 'static {
    fn accept(&self, record: ArcRecord);
}

impl<F> RecordSink for F
where
    F: Fn(ArcRecord) + Send + Sync + 'static,
{
    fn accept(&self, record: ArcRecord) {
        self(record)
    }
}

/// What to listen on and how to read it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceiverConfig {
    pub format: WireFormat,
    pub bind_address: IpAddr,
    pub port: u16,
    pub options: ConvertOptions,
    /// Log every payload at `trace`
    pub message_trace: bool,
}

impl ReceiverConfig {
    pub fn new(format: WireFormat, port: u16) -> Self {
        Self {
            format,
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port,
            options: ConvertOptions::default(),
            message_trace: false,
        }
    }
}

/// Listens for datagrams and pushes the records they carry to a sink
pub struct Receiver<S: RecordSink> {
    sink: Arc<S>,

    /// Cancellation token for stopping the socket task
    cancel: CancellationToken,

    task: Option<JoinHandle<()>>,

    local_addr: Option<SocketAddr>,
}

impl<S: RecordSink> Receiver<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink: Arc::new(sink),
            cancel: CancellationToken::new(),
            task: None,
            local_addr: None,
        }
    }

    /// Bind the socket and start receiving. Any previous socket is closed
    /// first, so a failed bind leaves the receiver stopped.
    pub async fn start(&mut self, config: ReceiverConfig) -> Result<SocketAddr, ReceiverError> {
        self.stop();

        let addr = SocketAddr::new(config.bind_address, config.port);
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| ReceiverError::Bind { addr, source })?;
        let local_addr = socket.local_addr().map_err(|source| ReceiverError::Bind { addr, source })?;

        info!(%local_addr, format = %config.format, "receiver listening");

        let converter = converter_for(config.format, config.options);
        self.task = Some(tokio::spawn(receive_loop(
            socket,
            converter,
            Arc::clone(&self.sink),
            self.cancel.clone(),
            config.message_trace,
        )));
        self.local_addr = Some(local_addr);
        Ok(local_addr)
    }

    /// Switch to another port or wire format. On failure nothing is
    /// listening any more.
    pub async fn reconfigure(&mut self, config: ReceiverConfig) -> Result<SocketAddr, ReceiverError> {
        debug!(port = config.port, format = %config.format, "reconfiguring receiver");
        self.start(config).await
    }

    pub fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.local_addr = None;
        // Create a fresh cancellation token for the next socket
        self.cancel = CancellationToken::new();
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl<S: RecordSink> Drop for Receiver<S> {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn receive_loop<S: RecordSink>(
    socket: UdpSocket,
    converter: Arc<dyn LogConverter>,
    sink: Arc<S>,
    cancel: CancellationToken,
    message_trace: bool,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            result = socket.recv_from(&mut buf) => {
                match result {
                    Ok((len, peer)) => {
                        let text = String::from_utf8_lossy(&buf[..len]);
                        if message_trace {
                            trace!(%peer, len, payload = %text, "datagram received");
                        }
                        for record in converter.convert(&text) {
                            if Record::is_sentinel(&record) {
                                continue;
                            }
                            sink.accept(record);
                        }
                    }
                    Err(e) => {
                        // ICMP errors surface here on some platforms; keep listening
                        warn!(error = %e, "receive failed");
                    }
                }
            }
        }
    }

    debug!(format = %converter.format(), "receiver stopped");
}
