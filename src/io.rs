//! Connection I/O engine.
//!
//! The state of a connection at any given time is one of:
//!
//! - `dxed`: disconnected, passive
//! - `rxng`: disconnected, pending reconnect
//! - `cxng`: connection in progress
//! - `cxed`: connected
//! - `ping`: connected, network state in question
//!
//! Each connection runs one worker thread that owns the socket and TLS
//! session and drives the state machine; the coordinator directs it
//! explicitly through [`Connection::cx`] and [`Connection::dx`] and is
//! informed of implicit transitions through [`IoCallbacks`]. All
//! callbacks are made under one shared mutex, so handlers execute
//! sequentially across connections.
//!
//! Blocking reads carry a timeout (the ping window), so a requested
//! state change is observed after at most one timeout window; closing
//! the socket out from under a blocked read cuts that short.
//!
//! Failed connection attempts enter a retry cycle with exponential
//! backoff: `t(n) = min(t(n-1) * factor, max)`, `t(0) = base`.

use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::time::{Duration, Instant};

use rustls::pki_types::ServerName;
use tracing::{debug, warn};

use crate::error::IoError;

/// RFC 2812, section 2.3: maximum formatted line length, less CRLF.
pub const IO_MESG_LEN: usize = 510;

const IO_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timing configuration, in seconds.
#[derive(Debug, Clone)]
pub struct IoConfig {
    /// Read silence before entering the ping phase.
    pub ping_min: u32,
    /// Read timeout between ping phase updates.
    pub ping_refresh: u32,
    /// Ping phase silence before the connection is cycled.
    pub ping_max: u32,
    /// Reconnect backoff base delay.
    pub backoff_base: u32,
    /// Reconnect backoff growth factor.
    pub backoff_factor: u32,
    /// Reconnect backoff maximum.
    pub backoff_max: u32,
}

impl Default for IoConfig {
    fn default() -> Self {
        IoConfig {
            ping_min: 150,
            ping_refresh: 5,
            ping_max: 300,
            backoff_base: 4,
            backoff_factor: 2,
            backoff_max: 86400,
        }
    }
}

/// Address family restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IpVersion {
    #[default]
    Unspec,
    V4,
    V6,
}

/// Certificate verification policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsVerify {
    Disabled,
    Optional,
    #[default]
    Required,
}

/// Per-connection socket options.
#[derive(Debug, Clone)]
pub struct IoFlags {
    pub ipv: IpVersion,
    pub tls: bool,
    pub verify: TlsVerify,
    /// Directory of PEM CA certificates.
    pub ca_cert_path: PathBuf,
}

impl Default for IoFlags {
    fn default() -> Self {
        IoFlags {
            ipv: IpVersion::Unspec,
            tls: true,
            verify: TlsVerify::Required,
            ca_cert_path: PathBuf::from("/etc/ssl/certs/"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IoState {
    Dxed,
    Rxng,
    Cxng,
    Cxed,
    Ping,
}

/// Coordinator-side callback interface.
///
/// Every callback is delivered under the shared callback mutex; no two
/// callbacks execute concurrently, across all connections.
pub trait IoCallbacks: Send {
    /// Connection established.
    fn cxed(&mut self, obj: usize);
    /// Connection torn down.
    fn dxed(&mut self, obj: usize);
    /// Ping phase updated to `n` seconds of silence; 0 clears.
    fn ping(&mut self, obj: usize, n: u32);
    /// Status text.
    fn info(&mut self, obj: usize, text: &str);
    /// Error text.
    fn error(&mut self, obj: usize, text: &str);
    /// Received bytes; not necessarily a complete line.
    fn read_soc(&mut self, obj: usize, bytes: &[u8]);
}

/// The shared callback target: one mutex serializing all worker
/// callbacks into the coordinator.
pub type SharedCallbacks = Arc<Mutex<dyn IoCallbacks>>;

enum Writer {
    Plain {
        sock: TcpStream,
    },
    Tls {
        sock: TcpStream,
        tls: Arc<Mutex<rustls::ClientConnection>>,
    },
}

impl Writer {
    fn write_line(&self, buf: &[u8]) -> std::io::Result<()> {
        match self {
            Writer::Plain { sock } => {
                let mut w: &TcpStream = sock;
                w.write_all(buf)
            }
            Writer::Tls { sock, tls } => {
                let mut w: &TcpStream = sock;
                let mut conn = tls.lock().unwrap();
                conn.writer().write_all(buf)?;
                while conn.wants_write() {
                    conn.write_tls(&mut w)?;
                }
                Ok(())
            }
        }
    }

    fn shutdown(&self) {
        let sock = match self {
            Writer::Plain { sock } => sock,
            Writer::Tls { sock, .. } => sock,
        };
        let _ = sock.shutdown(Shutdown::Both);
    }
}

struct Shared {
    st_cur: IoState,
    /// Transition requested by the coordinator, observed by the worker
    /// at its next state boundary.
    st_new: Option<IoState>,
    writer: Option<Arc<Writer>>,
    rx_sleep: u32,
    skip_sleep: bool,
}

/// A single server connection and its worker thread.
pub struct Connection {
    obj: usize,
    host: String,
    port: u16,
    flags: IoFlags,
    cfg: IoConfig,
    cb: Weak<Mutex<dyn IoCallbacks>>,
    shared: Mutex<Shared>,
    wake: Condvar,
}

impl Connection {
    pub fn new(
        obj: usize,
        host: &str,
        port: u16,
        flags: IoFlags,
        cfg: IoConfig,
        cb: &SharedCallbacks,
    ) -> Arc<Connection> {
        Arc::new(Connection {
            obj,
            host: host.to_string(),
            port,
            flags,
            cfg,
            cb: Arc::downgrade(cb),
            shared: Mutex::new(Shared {
                st_cur: IoState::Dxed,
                st_new: None,
                writer: None,
                rx_sleep: 0,
                skip_sleep: false,
            }),
            wake: Condvar::new(),
        })
    }

    /// Establish the network connection.
    pub fn cx(self: &Arc<Self>) -> Result<(), IoError> {
        let mut shared = self.shared.lock().unwrap();

        match shared.st_cur {
            IoState::Dxed => {
                shared.st_cur = IoState::Cxng;
                drop(shared);

                let conn = Arc::clone(self);
                let spawned = std::thread::Builder::new()
                    .name(format!("io-{}", self.host))
                    .spawn(move || Worker::new(conn).run());

                match spawned {
                    Ok(_) => Ok(()),
                    Err(_) => {
                        self.shared.lock().unwrap().st_cur = IoState::Dxed;
                        Err(IoError::Thread)
                    }
                }
            }
            IoState::Rxng => {
                shared.skip_sleep = true;
                self.wake.notify_all();
                Ok(())
            }
            IoState::Cxng => Err(IoError::Connecting),
            IoState::Cxed | IoState::Ping => Err(IoError::Connected),
        }
    }

    /// Close the network connection.
    pub fn dx(&self) -> Result<(), IoError> {
        let mut shared = self.shared.lock().unwrap();

        if shared.st_cur == IoState::Dxed {
            return Err(IoError::Disconnected);
        }

        shared.st_new = Some(IoState::Dxed);

        if let Some(writer) = &shared.writer {
            writer.shutdown();
        }

        self.wake.notify_all();

        Ok(())
    }

    /// Write a formatted line, appending CRLF.
    ///
    /// A hard write error cycles the connection back through `cxng`.
    pub fn sendf(&self, line: &str) -> Result<(), IoError> {
        let writer = {
            let shared = self.shared.lock().unwrap();

            if !matches!(shared.st_cur, IoState::Cxed | IoState::Ping) {
                return Err(IoError::Disconnected);
            }

            if line.len() > IO_MESG_LEN {
                return Err(IoError::Truncated);
            }

            shared.writer.as_ref().map(Arc::clone)
        };

        let Some(writer) = writer else {
            return Err(IoError::Disconnected);
        };

        debug!(obj = self.obj, "send: {}", line);

        let mut buf = Vec::with_capacity(line.len() + 2);
        buf.extend_from_slice(line.as_bytes());
        buf.extend_from_slice(b"\r\n");

        if writer.write_line(&buf).is_err() {
            self.cycle();
            return Err(IoError::Write);
        }

        Ok(())
    }

    /// dx + cx, as one requested transition back through `cxng`.
    fn cycle(&self) {
        let mut shared = self.shared.lock().unwrap();

        if matches!(shared.st_cur, IoState::Cxed | IoState::Ping) {
            shared.st_new = Some(IoState::Cxng);

            if let Some(writer) = &shared.writer {
                writer.shutdown();
            }
        }
    }

    fn cancelled(&self) -> bool {
        self.shared.lock().unwrap().st_new.is_some()
    }

    fn cb(&self, f: impl FnOnce(&mut dyn IoCallbacks)) {
        match self.cb.upgrade() {
            Some(cb) => f(&mut *cb.lock().unwrap()),
            None => {
                /* coordinator is gone; stop the worker */
                self.shared.lock().unwrap().st_new = Some(IoState::Dxed);
            }
        }
    }

    fn cb_info(&self, text: String) {
        self.cb(|cb| cb.info(self.obj, &text));
    }

    fn cb_err(&self, text: String) {
        self.cb(|cb| cb.error(self.obj, &text));
    }
}

pub(crate) fn next_backoff(cur: u32, cfg: &IoConfig) -> u32 {
    if cur == 0 {
        cfg.backoff_base
    } else {
        cur.saturating_mul(cfg.backoff_factor).min(cfg.backoff_max)
    }
}

enum Reader {
    Plain(TcpStream),
    Tls {
        sock: TcpStream,
        tls: Arc<Mutex<rustls::ClientConnection>>,
    },
}

impl Reader {
    fn sock(&self) -> &TcpStream {
        match self {
            Reader::Plain(sock) => sock,
            Reader::Tls { sock, .. } => sock,
        }
    }
}

enum ReadOutcome {
    Data,
    Timeout,
    Interrupted,
    Closed,
    Error(String),
}

struct Worker {
    conn: Arc<Connection>,
    reader: Option<Reader>,
    ping: u32,
}

impl Worker {
    fn new(conn: Arc<Connection>) -> Worker {
        Worker {
            conn,
            reader: None,
            ping: 0,
        }
    }

    fn run(mut self) {
        loop {
            let st_old = self.conn.shared.lock().unwrap().st_cur;

            if st_old == IoState::Dxed {
                break;
            }

            let st_ret = match st_old {
                IoState::Cxng => self.state_cxng(),
                IoState::Cxed => self.state_cxed(),
                IoState::Ping => self.state_ping(),
                IoState::Rxng => self.state_rxng(),
                IoState::Dxed => break,
            };

            let st_new = {
                let mut shared = self.conn.shared.lock().unwrap();
                let st = shared.st_new.take().unwrap_or(st_ret);
                shared.st_cur = st;
                st
            };

            self.transition(st_old, st_new);

            if st_new == IoState::Dxed {
                break;
            }
        }

        self.teardown();
    }

    fn teardown(&mut self) {
        self.reader = None;
        self.conn.shared.lock().unwrap().writer = None;
    }

    fn transition(&mut self, from: IoState, to: IoState) {
        use IoState::*;

        let conn = Arc::clone(&self.conn);

        match (from, to) {
            (Cxed, Cxng) | (Ping, Cxng) => conn.cb(|cb| cb.dxed(conn.obj)),
            (Dxed, Cxng) | (Rxng, Cxng) | (Cxng, Cxng) => (),
            (Rxng, Dxed) | (Cxng, Dxed) => conn.cb_info("Connection cancelled".to_string()),
            (Cxed, Dxed) | (Ping, Dxed) => {
                conn.cb_info("Connection closed".to_string());
                conn.cb(|cb| cb.dxed(conn.obj));
            }
            (Cxng, Cxed) => {
                conn.shared.lock().unwrap().rx_sleep = 0;
                conn.cb_info(" ... Connection successful".to_string());
                conn.cb(|cb| cb.cxed(conn.obj));
            }
            (Cxng, Rxng) => conn.cb_err(" ... Connection failed -- retrying".to_string()),
            (Cxed, Ping) => {
                self.ping = conn.cfg.ping_min;
                let ping = self.ping;
                conn.cb(|cb| cb.ping(conn.obj, ping));
            }
            (Ping, Ping) => {
                let ping = self.ping;
                conn.cb(|cb| cb.ping(conn.obj, ping));
            }
            (Ping, Cxed) => {
                self.ping = 0;
                conn.cb(|cb| cb.ping(conn.obj, 0));
            }
            (from, to) => warn!(?from, ?to, "unexpected connection state transition"),
        }
    }

    fn state_rxng(&mut self) -> IoState {
        let sleep = {
            let mut shared = self.conn.shared.lock().unwrap();
            shared.rx_sleep = next_backoff(shared.rx_sleep, &self.conn.cfg);
            shared.rx_sleep
        };

        self.conn.cb_info(format!(
            "Attempting reconnect in {:02}:{:02}",
            sleep / 60,
            sleep % 60
        ));

        let deadline = Instant::now() + Duration::from_secs(u64::from(sleep));
        let mut shared = self.conn.shared.lock().unwrap();

        while shared.st_new.is_none() && !shared.skip_sleep {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            shared = self
                .conn
                .wake
                .wait_timeout(shared, deadline - now)
                .unwrap()
                .0;
        }

        shared.skip_sleep = false;

        IoState::Cxng
    }

    fn state_cxng(&mut self) -> IoState {
        let conn = Arc::clone(&self.conn);

        conn.cb_info(format!("Connecting to {}:{}", conn.host, conn.port));

        let addrs: Vec<SocketAddr> = match (conn.host.as_str(), conn.port).to_socket_addrs() {
            Ok(addrs) => addrs
                .filter(|a| match conn.flags.ipv {
                    IpVersion::Unspec => true,
                    IpVersion::V4 => a.is_ipv4(),
                    IpVersion::V6 => a.is_ipv6(),
                })
                .collect(),
            Err(_) => {
                conn.cb_err(" ... Failed to resolve host".to_string());
                return IoState::Rxng;
            }
        };

        if addrs.is_empty() {
            conn.cb_err(" ... Failed to resolve host".to_string());
            return IoState::Rxng;
        }

        let mut sock = None;

        for addr in &addrs {
            if conn.cancelled() {
                return IoState::Dxed;
            }
            match TcpStream::connect_timeout(addr, IO_CONNECT_TIMEOUT) {
                Ok(s) => {
                    conn.cb_info(format!(" ... Connected to [{}]", addr.ip()));
                    sock = Some(s);
                    break;
                }
                Err(_) => continue,
            }
        }

        let Some(sock) = sock else {
            conn.cb_err(" ... Failed to connect to host".to_string());
            return IoState::Rxng;
        };

        if conn.cancelled() {
            return IoState::Dxed;
        }

        if !conn.flags.tls {
            let write_sock = match sock.try_clone() {
                Ok(s) => s,
                Err(_) => {
                    conn.cb_err(" ... Failed to obtain socket".to_string());
                    return IoState::Rxng;
                }
            };

            conn.shared.lock().unwrap().writer =
                Some(Arc::new(Writer::Plain { sock: write_sock }));
            self.reader = Some(Reader::Plain(sock));

            return IoState::Cxed;
        }

        conn.cb_info(" ... Establishing TLS".to_string());

        let tls = match self.tls_handshake(&sock) {
            Ok(tls) => tls,
            Err(e) => {
                conn.cb_err(format!(" ... TLS handshake failure: {}", e));
                return IoState::Rxng;
            }
        };

        {
            let session = tls.lock().unwrap();
            conn.cb_info(" ... TLS connection established".to_string());
            if let Some(version) = session.protocol_version() {
                conn.cb_info(format!(" ...   - version:     {:?}", version));
            }
            if let Some(suite) = session.negotiated_cipher_suite() {
                conn.cb_info(format!(" ...   - ciphersuite: {:?}", suite.suite()));
            }
        }

        let write_sock = match sock.try_clone() {
            Ok(s) => s,
            Err(_) => {
                conn.cb_err(" ... Failed to obtain socket".to_string());
                return IoState::Rxng;
            }
        };

        conn.shared.lock().unwrap().writer = Some(Arc::new(Writer::Tls {
            sock: write_sock,
            tls: Arc::clone(&tls),
        }));
        self.reader = Some(Reader::Tls { sock, tls });

        IoState::Cxed
    }

    fn tls_handshake(
        &self,
        sock: &TcpStream,
    ) -> Result<Arc<Mutex<rustls::ClientConnection>>, String> {
        let conn = &self.conn;

        let config = match conn.flags.verify {
            TlsVerify::Required => {
                let roots = load_ca_certs(&conn.flags.ca_cert_path)?;
                rustls::ClientConfig::builder()
                    .with_root_certificates(roots)
                    .with_no_client_auth()
            }
            TlsVerify::Optional | TlsVerify::Disabled => {
                if conn.flags.verify == TlsVerify::Optional {
                    conn.cb_info(" ... certificate verification skipped".to_string());
                }
                rustls::ClientConfig::builder()
                    .dangerous()
                    .with_custom_certificate_verifier(Arc::new(NoCertificateVerification::new()))
                    .with_no_client_auth()
            }
        };

        let name = ServerName::try_from(conn.host.clone())
            .map_err(|_| "invalid server name".to_string())?;

        let mut session = rustls::ClientConnection::new(Arc::new(config), name)
            .map_err(|e| e.to_string())?;

        sock.set_read_timeout(Some(IO_CONNECT_TIMEOUT))
            .map_err(|e| e.to_string())?;

        let mut stream = sock;

        while session.is_handshaking() {
            session.complete_io(&mut stream).map_err(|e| e.to_string())?;
        }

        Ok(Arc::new(Mutex::new(session)))
    }

    fn set_read_timeout(&self, secs: u32) {
        if let Some(reader) = &self.reader {
            let _ = reader
                .sock()
                .set_read_timeout(Some(Duration::from_secs(u64::from(secs.max(1)))));
        }
    }

    fn state_cxed(&mut self) -> IoState {
        self.set_read_timeout(self.conn.cfg.ping_min);

        loop {
            if self.conn.cancelled() {
                self.drop_link();
                return IoState::Cxng;
            }

            match self.read_once() {
                ReadOutcome::Data | ReadOutcome::Interrupted => continue,
                ReadOutcome::Timeout => return IoState::Ping,
                ReadOutcome::Closed => {
                    if !self.conn.cancelled() {
                        self.conn.cb_err("connection reset by peer".to_string());
                    }
                    self.drop_link();
                    return IoState::Cxng;
                }
                ReadOutcome::Error(e) => {
                    if !self.conn.cancelled() {
                        self.conn.cb_err(format!("connection error: {}", e));
                    }
                    self.drop_link();
                    return IoState::Cxng;
                }
            }
        }
    }

    fn state_ping(&mut self) -> IoState {
        self.set_read_timeout(self.conn.cfg.ping_refresh);

        loop {
            if self.conn.cancelled() {
                self.drop_link();
                return IoState::Cxng;
            }

            match self.read_once() {
                ReadOutcome::Data => return IoState::Cxed,
                ReadOutcome::Interrupted => continue,
                ReadOutcome::Timeout => {
                    self.ping += self.conn.cfg.ping_refresh;

                    if self.ping < self.conn.cfg.ping_max {
                        let ping = self.ping;
                        let conn = Arc::clone(&self.conn);
                        conn.cb(|cb| cb.ping(conn.obj, ping));
                    } else {
                        self.conn
                            .cb_err(format!("connection timeout ({})", self.ping));
                        self.drop_link();
                        return IoState::Cxng;
                    }
                }
                ReadOutcome::Closed => {
                    if !self.conn.cancelled() {
                        self.conn.cb_err("connection reset by peer".to_string());
                    }
                    self.drop_link();
                    return IoState::Cxng;
                }
                ReadOutcome::Error(e) => {
                    if !self.conn.cancelled() {
                        self.conn.cb_err(format!("connection error: {}", e));
                    }
                    self.drop_link();
                    return IoState::Cxng;
                }
            }
        }
    }

    fn drop_link(&mut self) {
        self.reader = None;
        self.conn.shared.lock().unwrap().writer = None;
    }

    fn deliver(&self, bytes: &[u8]) {
        let conn = Arc::clone(&self.conn);
        conn.cb(|cb| cb.read_soc(conn.obj, bytes));
    }

    fn read_once(&mut self) -> ReadOutcome {
        let mut raw = [0u8; 1024];

        let result = match &mut self.reader {
            None => Raw::Out(ReadOutcome::Error("no socket".to_string())),
            Some(Reader::Plain(sock)) => match sock.read(&mut raw) {
                Ok(0) => Raw::Out(ReadOutcome::Closed),
                Ok(n) => Raw::Plain(n),
                Err(e) => Raw::Out(read_error(e)),
            },
            Some(Reader::Tls { sock, tls }) => match sock.read(&mut raw) {
                Ok(0) => Raw::Out(ReadOutcome::Closed),
                Ok(n) => tls_feed(tls, &raw[..n]),
                Err(e) => Raw::Out(read_error(e)),
            },
        };

        match result {
            Raw::Plain(n) => {
                self.deliver(&raw[..n]);
                ReadOutcome::Data
            }
            Raw::Tls(plaintext, closed) => {
                if !plaintext.is_empty() {
                    self.deliver(&plaintext);
                }
                if closed {
                    ReadOutcome::Closed
                } else {
                    ReadOutcome::Data
                }
            }
            Raw::Out(outcome) => outcome,
        }
    }
}

enum Raw {
    Plain(usize),
    Tls(Vec<u8>, bool),
    Out(ReadOutcome),
}

/// Feed raw TLS bytes through the session, collecting decrypted
/// plaintext. The session lock is released before the bytes are
/// delivered to the coordinator.
fn tls_feed(tls: &Mutex<rustls::ClientConnection>, mut slice: &[u8]) -> Raw {
    let mut session = tls.lock().unwrap();
    let mut plaintext = Vec::new();
    let mut closed = false;

    while !slice.is_empty() {
        match session.read_tls(&mut slice) {
            Ok(0) => break,
            Ok(_) => (),
            Err(e) => return Raw::Out(ReadOutcome::Error(e.to_string())),
        }

        let state = match session.process_new_packets() {
            Ok(state) => state,
            Err(e) => return Raw::Out(ReadOutcome::Error(e.to_string())),
        };

        let avail = state.plaintext_bytes_to_read();
        if avail > 0 {
            let start = plaintext.len();
            plaintext.resize(start + avail, 0);
            if session.reader().read_exact(&mut plaintext[start..]).is_err() {
                return Raw::Out(ReadOutcome::Error("tls read failure".to_string()));
            }
        }

        if state.peer_has_closed() {
            closed = true;
            break;
        }
    }

    Raw::Tls(plaintext, closed)
}

fn read_error(e: std::io::Error) -> ReadOutcome {
    match e.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut => ReadOutcome::Timeout,
        ErrorKind::Interrupted => ReadOutcome::Interrupted,
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::NotConnected => {
            ReadOutcome::Closed
        }
        _ => ReadOutcome::Error(e.to_string()),
    }
}

fn load_ca_certs(path: &std::path::Path) -> Result<rustls::RootCertStore, String> {
    let mut roots = rustls::RootCertStore::empty();

    let entries = std::fs::read_dir(path)
        .map_err(|e| format!("failed to read CA path {}: {}", path.display(), e))?;

    for entry in entries.flatten() {
        let file = match std::fs::File::open(entry.path()) {
            Ok(f) => f,
            Err(_) => continue,
        };

        let mut rd = std::io::BufReader::new(file);

        for cert in rustls_pemfile::certs(&mut rd).flatten() {
            let _ = roots.add(cert);
        }
    }

    if roots.is_empty() {
        return Err(format!("no CA certificates under {}", path.display()));
    }

    Ok(roots)
}

/// Accept-all certificate verifier, for `--tls-verify disabled`.
#[derive(Debug)]
struct NoCertificateVerification(rustls::crypto::CryptoProvider);

impl NoCertificateVerification {
    fn new() -> Self {
        NoCertificateVerification(rustls::crypto::aws_lc_rs::default_provider())
    }
}

impl rustls::client::danger::ServerCertVerifier for NoCertificateVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullCallbacks;

    impl IoCallbacks for NullCallbacks {
        fn cxed(&mut self, _: usize) {}
        fn dxed(&mut self, _: usize) {}
        fn ping(&mut self, _: usize, _: u32) {}
        fn info(&mut self, _: usize, _: &str) {}
        fn error(&mut self, _: usize, _: &str) {}
        fn read_soc(&mut self, _: usize, _: &[u8]) {}
    }

    fn connection() -> Arc<Connection> {
        let cb: SharedCallbacks = Arc::new(Mutex::new(NullCallbacks));
        Connection::new(
            0,
            "irc.example.org",
            6697,
            IoFlags::default(),
            IoConfig::default(),
            &cb,
        )
    }

    #[test]
    fn test_backoff_progression() {
        let cfg = IoConfig {
            backoff_base: 4,
            backoff_factor: 2,
            backoff_max: 86400,
            ..IoConfig::default()
        };

        let mut delay = 0;
        let mut seen = Vec::new();

        for _ in 0..20 {
            delay = next_backoff(delay, &cfg);
            seen.push(delay);
        }

        assert_eq!(&seen[..5], &[4, 8, 16, 32, 64]);
        assert_eq!(*seen.last().unwrap(), 86400);

        /* first failure after a success starts over */
        assert_eq!(next_backoff(0, &cfg), 4);
    }

    #[test]
    fn test_dx_when_disconnected() {
        let conn = connection();
        assert_eq!(conn.dx(), Err(IoError::Disconnected));
    }

    #[test]
    fn test_sendf_when_disconnected() {
        let conn = connection();
        assert_eq!(conn.sendf("PING :x"), Err(IoError::Disconnected));
    }
}
