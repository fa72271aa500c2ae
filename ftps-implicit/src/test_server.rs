//! # Test server
//!
//! A minimal FTP server, speaking implicit FTPS or plain FTP, running in background threads.
//! Files are kept in memory.

use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use rustls::crypto::ring::default_provider;
use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::{
    ClientConfig, HandshakeKind, RootCertStore, ServerConfig, ServerConnection, StreamOwned,
};

use crate::ConnectionParams;

const IO_TIMEOUT: Duration = Duration::from_secs(10);

/// Server and client configurations trusting the same self signed certificate for `localhost`
pub fn tls_configs() -> (Arc<ServerConfig>, Arc<ClientConfig>) {
    let rcgen::CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));

    let mut server_config = ServerConfig::builder_with_provider(Arc::new(default_provider()))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert.der().clone()], key)
        .unwrap();
    // tickets are issued after every handshake, data channels included
    server_config.send_tls13_tickets = 2;

    let mut roots = RootCertStore::empty();
    roots.add(cert.der().clone()).unwrap();
    let client_config = ClientConfig::builder_with_provider(Arc::new(default_provider()))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_root_certificates(roots)
        .with_no_client_auth();

    (Arc::new(server_config), Arc::new(client_config))
}

/// What the server went through, as seen from its side
#[derive(Debug, Default)]
pub struct ServerState {
    pub files: HashMap<String, Vec<u8>>,
    /// Every command line received, in order
    pub commands: Vec<String>,
    pub control_connections: usize,
    pub data_connections: usize,
    pub tls_data_handshakes: usize,
    pub resumed_data_handshakes: usize,
    /// Data channels closed by the client with close_notify (or a plain EOF)
    pub clean_data_closes: usize,
    /// Replies sent (`reply <code>`) and data channels ended (`data closed`), in order.
    /// Tests may push client side events in between.
    pub events: Vec<String>,
}

pub struct TestServer {
    host: &'static str,
    port: u16,
    state: Arc<Mutex<ServerState>>,
}

impl TestServer {
    /// Plain FTP server
    pub fn plain() -> Self {
        Self::start("127.0.0.1", None)
    }

    /// Implicit FTPS server, reached as `localhost`
    pub fn implicit(config: Arc<ServerConfig>) -> Self {
        Self::start("localhost", Some(config))
    }

    fn start(host: &'static str, tls: Option<Arc<ServerConfig>>) -> Self {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(Mutex::new(ServerState::default()));
        let server_state = Arc::clone(&state);
        thread::spawn(move || {
            for socket in listener.incoming() {
                let Ok(socket) = socket else { break };
                server_state.lock().unwrap().control_connections += 1;
                let tls = tls.clone();
                let state = Arc::clone(&server_state);
                thread::spawn(move || {
                    let served = Session::new(socket, tls, state).and_then(|mut s| s.serve());
                    if let Err(err) = served {
                        debug!("test server session ended: {err}");
                    }
                });
            }
        });
        Self { host, port, state }
    }

    pub fn params(&self) -> ConnectionParams {
        ConnectionParams::new(self.host)
            .port(self.port)
            .timeout(IO_TIMEOUT)
    }

    pub fn state(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap()
    }

    /// Handle on the server state, for hooks running on the client side
    pub fn shared_state(&self) -> Arc<Mutex<ServerState>> {
        Arc::clone(&self.state)
    }

    pub fn put(&self, name: &str, content: &[u8]) {
        self.state().files.insert(name.to_string(), content.to_vec());
    }

    pub fn file(&self, name: &str) -> Option<Vec<u8>> {
        self.state().files.get(name).cloned()
    }

    pub fn commands(&self) -> Vec<String> {
        self.state().commands.clone()
    }
}

trait Io: Read + Write + Send {}

impl<T: Read + Write + Send> Io for T {}

enum Pending {
    Passive(TcpListener),
    Active(SocketAddr),
}

enum DataChannel {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ServerConnection, TcpStream>>),
}

impl DataChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Plain(stream) => stream.read(buf),
            Self::Tls(stream) => stream.read(buf),
        }
    }

    /// Read until the client closes the channel; tells whether it did so cleanly
    fn receive(&mut self) -> io::Result<(Vec<u8>, bool)> {
        let mut content = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            match self.read(&mut buf) {
                Ok(0) => return Ok((content, true)),
                Ok(read) => content.extend_from_slice(&buf[..read]),
                Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                    return Ok((content, false))
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Send `content`, signal the end of data and wait for the client to close the channel;
    /// tells whether the client did so cleanly
    fn send(&mut self, content: &[u8]) -> io::Result<bool> {
        match self {
            Self::Plain(stream) => {
                stream.write_all(content)?;
                stream.shutdown(std::net::Shutdown::Write)?;
            }
            Self::Tls(stream) => {
                stream.write_all(content)?;
                stream.flush()?;
                stream.conn.send_close_notify();
                while stream.conn.wants_write() {
                    stream.conn.write_tls(&mut stream.sock)?;
                }
            }
        }
        Ok(self.receive().map(|(_, clean)| clean).unwrap_or(false))
    }
}

struct Session {
    control: BufReader<Box<dyn Io>>,
    tls: Option<Arc<ServerConfig>>,
    state: Arc<Mutex<ServerState>>,
    protect: bool,
    rest: u64,
    pending: Option<Pending>,
}

impl Session {
    fn new(
        socket: TcpStream,
        tls: Option<Arc<ServerConfig>>,
        state: Arc<Mutex<ServerState>>,
    ) -> io::Result<Self> {
        socket.set_read_timeout(Some(IO_TIMEOUT))?;
        let control: Box<dyn Io> = match &tls {
            Some(config) => {
                let conn = ServerConnection::new(Arc::clone(config)).map_err(io::Error::other)?;
                Box::new(StreamOwned::new(conn, socket))
            }
            None => Box::new(socket),
        };
        Ok(Self {
            control: BufReader::new(control),
            protect: tls.is_some(),
            tls,
            state,
            rest: 0,
            pending: None,
        })
    }

    fn reply(&mut self, line: &str) -> io::Result<()> {
        self.event(format!("reply {}", &line[..3]));
        let stream = self.control.get_mut();
        stream.write_all(format!("{line}\r\n").as_bytes())?;
        stream.flush()
    }

    fn serve(&mut self) -> io::Result<()> {
        self.reply("220-Welcome to the fake implicit FTPS server")?;
        self.reply("220 Ready")?;
        loop {
            let mut line = String::new();
            if self.control.read_line(&mut line)? == 0 {
                return Ok(());
            }
            let line = line.trim_end().to_string();
            self.state.lock().unwrap().commands.push(line.clone());
            let (verb, arg) = match line.split_once(' ') {
                Some((verb, arg)) => (verb.to_ascii_uppercase(), arg.to_string()),
                None => (line.to_ascii_uppercase(), String::new()),
            };
            match verb.as_str() {
                "USER" => self.reply("331 Password required")?,
                "PASS" if arg == "test" => self.reply("230 Logged in")?,
                "PASS" => self.reply("530 Login incorrect")?,
                "PBSZ" => self.reply("200 PBSZ=0")?,
                "PROT" => {
                    self.protect = arg == "P";
                    self.reply("200 Protection level set")?
                }
                "TYPE" => self.reply("200 Type set")?,
                "NOOP" => self.reply("200 NOOP ok")?,
                "PASV" => {
                    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
                    let port = listener.local_addr()?.port();
                    self.pending = Some(Pending::Passive(listener));
                    self.reply(&format!(
                        "227 Entering Passive Mode (127,0,0,1,{},{})",
                        port >> 8,
                        port & 0xff
                    ))?
                }
                "EPSV" => {
                    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
                    let port = listener.local_addr()?.port();
                    self.pending = Some(Pending::Passive(listener));
                    self.reply(&format!("229 Entering Extended Passive Mode (|||{port}|)"))?
                }
                "PORT" => {
                    let numbers: Vec<u16> =
                        arg.split(',').filter_map(|n| n.trim().parse().ok()).collect();
                    if let &[a, b, c, d, msb, lsb] = numbers.as_slice() {
                        let ip = Ipv4Addr::new(a as u8, b as u8, c as u8, d as u8);
                        let addr = SocketAddr::new(ip.into(), msb * 256 + lsb);
                        self.pending = Some(Pending::Active(addr));
                        self.reply("200 PORT command successful")?
                    } else {
                        self.reply("501 Illegal PORT command")?
                    }
                }
                "EPRT" => {
                    let parts: Vec<&str> = arg.split('|').collect();
                    match (parts.get(2), parts.get(3)) {
                        (Some(ip), Some(port)) => match format!("{ip}:{port}").parse() {
                            Ok(addr) => {
                                self.pending = Some(Pending::Active(addr));
                                self.reply("200 EPRT command successful")?
                            }
                            Err(_) => self.reply("501 Illegal EPRT command")?,
                        },
                        _ => self.reply("501 Illegal EPRT command")?,
                    }
                }
                "REST" => {
                    self.rest = arg.parse().unwrap_or_default();
                    self.reply(&format!("350 Restarting at {}", self.rest))?
                }
                "STOR" => self.store(&arg, false)?,
                "APPE" => self.store(&arg, true)?,
                "RETR" => self.retrieve(&arg)?,
                "LIST" => self.list(true)?,
                "NLST" => self.list(false)?,
                // hang up without replying
                "DROP" => return Ok(()),
                "QUIT" => {
                    self.reply("221 Goodbye")?;
                    return Ok(());
                }
                _ => self.reply("502 Command not implemented")?,
            }
        }
    }

    /// Get the data connection negotiated with PASV/EPSV/PORT/EPRT, secured if needed
    fn open_data(&mut self) -> io::Result<DataChannel> {
        let socket = match self.pending.take() {
            Some(Pending::Passive(listener)) => listener.accept()?.0,
            Some(Pending::Active(addr)) => TcpStream::connect_timeout(&addr, IO_TIMEOUT)?,
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::NotConnected,
                    "no data connection negotiated",
                ))
            }
        };
        socket.set_read_timeout(Some(IO_TIMEOUT))?;
        self.state.lock().unwrap().data_connections += 1;
        let config = match &self.tls {
            Some(config) if self.protect => Arc::clone(config),
            _ => return Ok(DataChannel::Plain(socket)),
        };
        let mut socket = socket;
        let mut conn = ServerConnection::new(config).map_err(io::Error::other)?;
        while conn.is_handshaking() {
            conn.complete_io(&mut socket)?;
        }
        {
            let mut state = self.state.lock().unwrap();
            state.tls_data_handshakes += 1;
            if conn.handshake_kind() == Some(HandshakeKind::Resumed) {
                state.resumed_data_handshakes += 1;
            }
        }
        Ok(DataChannel::Tls(Box::new(StreamOwned::new(conn, socket))))
    }

    fn store(&mut self, name: &str, append: bool) -> io::Result<()> {
        let rest = std::mem::take(&mut self.rest) as usize;
        self.reply("150 Ok to send data")?;
        let (content, clean) = self.open_data()?.receive()?;
        self.data_closed(clean);
        {
            let mut state = self.state.lock().unwrap();
            let file = state.files.entry(name.to_string()).or_default();
            if !append {
                file.truncate(rest);
            }
            file.extend_from_slice(&content);
        }
        self.reply("226 Transfer complete")
    }

    fn retrieve(&mut self, name: &str) -> io::Result<()> {
        let rest = std::mem::take(&mut self.rest) as usize;
        let content = self.state.lock().unwrap().files.get(name).cloned();
        let Some(content) = content else {
            self.pending = None;
            return self.reply("550 No such file");
        };
        self.reply("150 Opening data connection")?;
        let mut data = self.open_data()?;
        match data.send(&content[rest.min(content.len())..]) {
            Ok(clean) => {
                self.data_closed(clean);
                self.reply("226 Transfer complete")
            }
            Err(err) => {
                debug!("test server: download interrupted: {err}");
                self.reply("426 Connection closed; transfer aborted")
            }
        }
    }

    fn list(&mut self, long: bool) -> io::Result<()> {
        let mut entries: Vec<(String, usize)> = self
            .state
            .lock()
            .unwrap()
            .files
            .iter()
            .map(|(name, content)| (name.clone(), content.len()))
            .collect();
        entries.sort();
        let listing: String = entries
            .into_iter()
            .map(|(name, size)| {
                if long {
                    format!("-rw-r--r-- 1 test test {size} Jan 01 00:00 {name}\r\n")
                } else {
                    format!("{name}\r\n")
                }
            })
            .collect();
        self.reply("150 Here comes the directory listing")?;
        let clean = self.open_data()?.send(listing.as_bytes())?;
        self.data_closed(clean);
        self.reply("226 Directory send OK")
    }

    fn data_closed(&self, clean: bool) {
        let mut state = self.state.lock().unwrap();
        if clean {
            state.clean_data_closes += 1;
        }
        state.events.push("data closed".to_string());
    }

    fn event(&self, event: String) {
        self.state.lock().unwrap().events.push(event);
    }
}
