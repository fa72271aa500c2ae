//! # Ftps
//!
//! The control session of an implicit FTPS connection

mod data_stream;
mod tls;
mod transfer;
mod transport;

use std::io::{self, BufReader, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

// export
pub use data_stream::DataStream;
pub use tls::{NoTlsStream, TlsConnector, TlsStream};
#[cfg(feature = "native-tls")]
pub use tls::{NativeTlsConnector, NativeTlsStream};
#[cfg(feature = "rustls")]
pub use tls::{RustlsConnector, RustlsStream};
pub use transport::{ImplicitTls, PlainTcp, Transport};

use crate::command::Command;
use crate::reader::read_response;
use crate::regex::{EPSV_PORT_RE, PASV_PORT_RE};
use crate::types::{
    ConnectionParams, FtpError, FtpResult, Mode, ProtectionLevel, Response, TransferType,
};
use crate::ReplyCode;

/// A function that creates a new stream for the data connection in passive mode.
///
/// It takes a [`SocketAddr`] and returns a [`TcpStream`].
pub type PassiveStreamBuilder = dyn Fn(SocketAddr) -> FtpResult<TcpStream> + Send + Sync;

/// Implicit FTPS session using rustls
#[cfg(feature = "rustls")]
pub type RustlsFtpsStream = ImplFtpsStream<ImplicitTls<RustlsConnector>>;
/// Implicit FTPS session using native-tls
#[cfg(feature = "native-tls")]
pub type NativeTlsFtpsStream = ImplFtpsStream<ImplicitTls<NativeTlsConnector>>;
/// Plain FTP session
pub type FtpStream = ImplFtpsStream<PlainTcp>;

type ControlChannel<T> = BufReader<DataStream<<T as Transport>::Stream>>;

/// Stream to interface with the FTP server. This interface is only for the command stream.
///
/// The session owns the control channel; data channels are opened per transfer and never
/// outlive it.
pub struct ImplFtpsStream<T>
where
    T: Transport,
{
    reader: ControlChannel<T>,
    transport: T,
    params: ConnectionParams,
    welcome: Response,
    mode: Mode,
    nat_workaround: bool,
    protection: ProtectionLevel,
    active_timeout: Duration,
    passive_stream_builder: Box<PassiveStreamBuilder>,
    usable: bool,
}

impl<C> ImplFtpsStream<ImplicitTls<C>>
where
    C: TlsConnector,
{
    /// Connect to an implicit FTPS server.
    ///
    /// The TLS handshake is completed before anything else is written to the socket.
    /// The connector is kept for the whole session: every data channel is secured with it,
    /// so that the TLS library can resume the control channel's session.
    ///
    /// ## Example
    ///
    /// ```rust,no_run
    /// use std::sync::Arc;
    ///
    /// use ftps_implicit::rustls::{ClientConfig, RootCertStore};
    /// use ftps_implicit::{ConnectionParams, RustlsConnector, RustlsFtpsStream};
    ///
    /// let root_store = RootCertStore::empty();
    /// let config = ClientConfig::builder()
    ///     .with_root_certificates(root_store)
    ///     .with_no_client_auth();
    /// let mut ftp_stream = RustlsFtpsStream::connect_secure_implicit(
    ///     &ConnectionParams::new("ftp.example.com"),
    ///     RustlsConnector::from(Arc::new(config)),
    /// )
    /// .unwrap();
    /// ```
    pub fn connect_secure_implicit(
        params: &ConnectionParams,
        tls_connector: C,
    ) -> FtpResult<Self> {
        debug!("Connecting to server (implicit TLS)");
        Self::connect(params, ImplicitTls::new(tls_connector))
    }
}

impl<T> ImplFtpsStream<T>
where
    T: Transport,
{
    /// Try to connect to the remote server through `transport` and read its welcome reply
    pub fn connect(params: &ConnectionParams, transport: T) -> FtpResult<Self> {
        let (reader, welcome) = Self::open_control_channel(params, &transport)?;
        Ok(Self {
            reader,
            protection: transport.default_protection(),
            transport,
            params: params.clone(),
            welcome,
            mode: Mode::Passive,
            nat_workaround: true,
            active_timeout: params.timeout,
            passive_stream_builder: Self::default_passive_stream_builder(params.timeout),
            usable: true,
        })
    }

    /// Drop the current control channel and connect again, with the same parameters.
    ///
    /// The session must be logged in again afterwards.
    pub fn reconnect(&mut self) -> FtpResult<()> {
        debug!("Reconnecting to {}:{}", self.params.host, self.params.port);
        let (reader, welcome) = Self::open_control_channel(&self.params, &self.transport)?;
        self.reader = reader;
        self.welcome = welcome;
        self.protection = self.transport.default_protection();
        self.usable = true;
        Ok(())
    }

    /// Enable active mode for data channel
    pub fn active_mode(mut self, accept_timeout: Duration) -> Self {
        self.mode = Mode::Active;
        self.active_timeout = accept_timeout;
        self
    }

    /// Set a custom [`PassiveStreamBuilder`] for passive mode.
    ///
    /// The stream builder is a function that takes a `SocketAddr` and returns a `TcpStream` and it's used
    /// to create the [`TcpStream`] for the data connection in passive mode.
    pub fn passive_stream_builder<F>(mut self, stream_builder: F) -> Self
    where
        F: Fn(SocketAddr) -> FtpResult<TcpStream> + Send + Sync + 'static,
    {
        self.passive_stream_builder = Box::new(stream_builder);
        self
    }

    /// Set the data channel transfer mode.
    ///
    /// With an IPv6 server, [`Mode::Passive`] is carried out with `EPSV` and [`Mode::Active`] with `EPRT`.
    pub fn set_mode(&mut self, mode: Mode) {
        debug!("Changed mode to {:?}", mode);
        self.mode = mode;
    }

    /// Set NAT workaround for passive mode.
    ///
    /// When enabled (default), the host announced by `PASV` is ignored and data channels
    /// connect to the address of the control channel's peer.
    pub fn set_passive_nat_workaround(&mut self, nat_workaround: bool) {
        self.nat_workaround = nat_workaround;
    }

    /// Returns the welcome reply sent by the server on connect
    pub fn welcome(&self) -> &Response {
        &self.welcome
    }

    /// Returns the welcome message retrieved from server
    pub fn get_welcome_msg(&self) -> String {
        self.welcome.text()
    }

    /// Returns a reference to the underlying [`TcpStream`] of the control channel.
    pub fn get_ref(&self) -> &TcpStream {
        self.reader.get_ref().get_ref()
    }

    /// Whether the control channel is still in sync with the server.
    ///
    /// Once it is not, every command fails with [`FtpError::SessionUnusable`] until [`Self::reconnect`].
    pub fn is_usable(&self) -> bool {
        self.usable
    }

    /// Protection level used for the next data channels
    pub fn protection(&self) -> ProtectionLevel {
        self.protection
    }

    /// Log in to the FTP server.
    ///
    /// Over implicit TLS, data channel protection is then negotiated with `PBSZ 0` and `PROT P`.
    pub fn login<S: AsRef<str>>(&mut self, user: S, password: S) -> FtpResult<()> {
        debug!("Signin in with user '{}'", user.as_ref());
        self.perform(Command::User(user.as_ref().to_string()))?;
        let response =
            self.read_response_in(&[ReplyCode::LOGGED_IN, ReplyCode::NEED_PASSWORD])?;
        if response.status == ReplyCode::NEED_PASSWORD {
            debug!("Password is required");
            self.perform(Command::Pass(password.as_ref().to_string()))?;
            self.read_response(ReplyCode::LOGGED_IN)?;
        }
        debug!("Login OK");
        match self.transport.default_protection() {
            ProtectionLevel::Private => self.set_protection(ProtectionLevel::Private),
            ProtectionLevel::Clear => Ok(()),
        }
    }

    /// Negotiate the protection level of data channels, with `PBSZ 0` and `PROT`
    pub fn set_protection(&mut self, level: ProtectionLevel) -> FtpResult<()> {
        debug!("Setting data channel protection to {:?}", level);
        self.perform(Command::Pbsz(0))?;
        self.read_response(ReplyCode::COMMAND_OK)?;
        self.perform(Command::Prot(level))?;
        self.read_response(ReplyCode::COMMAND_OK)?;
        self.protection = level;
        Ok(())
    }

    /// This does nothing. This is usually just used to keep the connection open.
    pub fn noop(&mut self) -> FtpResult<()> {
        debug!("Pinging server");
        self.perform(Command::Noop)?;
        self.read_response(ReplyCode::COMMAND_OK).map(|_| ())
    }

    /// Sets the type of file to be transferred. That is the implementation
    /// of `TYPE` command.
    pub fn transfer_type(&mut self, transfer_type: TransferType) -> FtpResult<()> {
        debug!("Setting transfer type {}", transfer_type);
        self.perform(Command::Type(transfer_type))?;
        self.read_response(ReplyCode::COMMAND_OK).map(|_| ())
    }

    /// Quits the current FTP session.
    pub fn quit(&mut self) -> FtpResult<()> {
        debug!("Quitting stream");
        self.perform(Command::Quit)?;
        self.read_response(ReplyCode::CLOSING).map(|_| ())
    }

    /// Send a command and return the server's reply, whatever its code
    pub fn send_command(&mut self, command: impl ToString) -> FtpResult<Response> {
        self.perform(Command::Custom(command.to_string()))?;
        self.read_reply()
    }

    /// Send a command which must be answered by a completion (2xx) reply
    pub fn send_void_command(&mut self, command: impl ToString) -> FtpResult<Response> {
        self.perform(Command::Custom(command.to_string()))?;
        self.read_completion()
    }

    /// Set the transfer type, open a data channel and send `command` on the control channel.
    ///
    /// When `rest` is set, `REST` is sent right before `command`.
    /// The returned stream must be handed back to [`Self::close_transfer`] once done.
    pub fn open_transfer(
        &mut self,
        command: impl ToString,
        transfer_type: TransferType,
        rest: Option<u64>,
    ) -> FtpResult<DataStream<T::Stream>> {
        let command = Command::Custom(command.to_string());
        command.ensure_single_line()?;
        self.transfer_type(transfer_type)?;
        self.data_command(command, rest)
    }

    // -- private

    /// Connect the socket, bootstrap the control channel and read the welcome reply
    fn open_control_channel(
        params: &ConnectionParams,
        transport: &T,
    ) -> FtpResult<(ControlChannel<T>, Response)> {
        let stream = Self::connect_tcp(params)?;
        stream.set_read_timeout(Some(params.timeout))?;
        stream.set_write_timeout(Some(params.timeout))?;
        debug!("Established connection with server");
        let mut reader = BufReader::new(transport.open_control(&params.host, stream)?);
        debug!("Reading server response...");
        let welcome = read_response(&mut reader)?;
        if !welcome.status.is_completion() {
            return Err(FtpError::UnexpectedResponse(welcome));
        }
        debug!("Server READY; response: {}", welcome);
        Ok((reader, welcome))
    }

    /// Connect to the first address `params.host` resolves to which accepts the connection
    fn connect_tcp(params: &ConnectionParams) -> FtpResult<TcpStream> {
        let mut last_err = None;
        for addr in (params.host.as_str(), params.port).to_socket_addrs()? {
            debug!("Connecting to server {addr}");
            match TcpStream::connect_timeout(&addr, params.timeout) {
                Ok(stream) => return Ok(stream),
                Err(err) => {
                    debug!("failed to connect to {addr}: {err}");
                    last_err = Some(err);
                }
            }
        }
        Err(match last_err {
            Some(err) => FtpError::from(err),
            None => FtpError::ConnectionError(io::Error::new(
                io::ErrorKind::NotFound,
                format!("could not resolve {}", params.host),
            )),
        })
    }

    fn ensure_usable(&self) -> FtpResult<()> {
        if self.usable {
            Ok(())
        } else {
            Err(FtpError::SessionUnusable)
        }
    }

    /// Mark the control channel as out of sync
    fn poison(&mut self, err: FtpError) -> FtpError {
        error!("control channel is no longer usable: {err}");
        self.usable = false;
        err
    }

    /// Write data to stream with command to perform
    fn perform(&mut self, command: Command) -> FtpResult<()> {
        self.ensure_usable()?;
        command.ensure_single_line()?;
        trace!("CC OUT: {}", command.redacted());
        let stream = self.reader.get_mut();
        let result = stream
            .write_all(command.to_string().as_bytes())
            .and_then(|()| stream.flush());
        result.map_err(|err| self.poison(err.into()))
    }

    /// Read the next reply, whatever its code
    fn read_reply(&mut self) -> FtpResult<Response> {
        self.ensure_usable()?;
        read_response(&mut self.reader).map_err(|err| self.poison(err))
    }

    /// Read response from stream
    fn read_response(&mut self, expected_code: ReplyCode) -> FtpResult<Response> {
        self.read_response_in(&[expected_code])
    }

    /// Read a reply which must have one of the expected codes
    fn read_response_in(&mut self, expected_code: &[ReplyCode]) -> FtpResult<Response> {
        let response = self.read_reply()?;
        if expected_code.contains(&response.status) {
            Ok(response)
        } else {
            Err(FtpError::UnexpectedResponse(response))
        }
    }

    /// Read a reply which must be a completion (2xx)
    fn read_completion(&mut self) -> FtpResult<Response> {
        let response = self.read_reply()?;
        if response.status.is_completion() {
            Ok(response)
        } else {
            Err(FtpError::UnexpectedResponse(response))
        }
    }

    /// Mode actually used for the next data channel
    fn data_mode(&self) -> FtpResult<Mode> {
        let ipv6 = self.get_ref().peer_addr()?.is_ipv6();
        Ok(match self.mode {
            Mode::Passive if ipv6 => Mode::ExtendedPassive,
            mode => mode,
        })
    }

    /// Open the data channel of a transfer and issue the command starting it
    fn data_command(
        &mut self,
        cmd: Command,
        rest: Option<u64>,
    ) -> FtpResult<DataStream<T::Stream>> {
        let stream = match self.data_mode()? {
            Mode::Active => {
                let listener = self.active()?;
                self.request_transfer(cmd, rest)?;
                self.accept(listener)
            }
            Mode::ExtendedPassive => {
                let addr = self.epsv()?;
                let stream = (self.passive_stream_builder)(addr)?;
                self.request_transfer(cmd, rest)?;
                Ok(stream)
            }
            Mode::Passive => {
                let addr = self.pasv()?;
                let stream = (self.passive_stream_builder)(addr)?;
                self.request_transfer(cmd, rest)?;
                Ok(stream)
            }
        };
        // the server has already answered with a preliminary reply: from now on a final reply is due
        let stream = stream.and_then(|stream| {
            stream.set_read_timeout(Some(self.params.timeout))?;
            stream.set_write_timeout(Some(self.params.timeout))?;
            self.transport
                .open_data(&self.params.host, stream, self.protection)
        });
        stream.map_err(|err| self.abandon_transfer(err))
    }

    /// Send `REST` if needed, then the transfer command; expects a preliminary reply
    fn request_transfer(&mut self, cmd: Command, rest: Option<u64>) -> FtpResult<()> {
        if let Some(offset) = rest {
            debug!("Restarting transfer at offset {offset}");
            self.perform(Command::Rest(offset))?;
            self.read_response(ReplyCode::REQUEST_FILE_PENDING)?;
        }
        self.perform(cmd)?;
        let response = self.read_reply()?;
        if response.status.is_preliminary() {
            debug!("Transfer started: {}", response);
            Ok(())
        } else {
            Err(FtpError::UnexpectedResponse(response))
        }
    }

    /// Consume the final reply of a transfer whose data channel could not be set up
    fn abandon_transfer(&mut self, err: FtpError) -> FtpError {
        error!("failed to set up data channel: {err}");
        match self.read_reply() {
            Ok(response) => debug!("Server closed the transfer: {}", response),
            Err(reply_err) => warn!("could not read the transfer reply: {reply_err}"),
        }
        err
    }

    /// Wait for the server to connect to the active mode listener
    fn accept(&self, listener: TcpListener) -> FtpResult<TcpStream> {
        let start = Instant::now();
        loop {
            match listener.accept() {
                Ok((stream, addr)) => {
                    debug!("Accepted data connection from {addr}");
                    stream.set_nonblocking(false)?;
                    break Ok(stream);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if start.elapsed() > self.active_timeout {
                        break Err(FtpError::Timeout);
                    }
                    std::thread::sleep(Duration::from_millis(50));
                }
                Err(e) => break Err(FtpError::ConnectionError(e)),
            }
        }
    }

    /// Create a new tcp listener and send a PORT (or EPRT) command for it
    fn active(&mut self) -> FtpResult<TcpListener> {
        debug!("Starting local tcp listener...");
        let ip = self.get_ref().local_addr()?.ip();
        let conn = TcpListener::bind(SocketAddr::new(ip, 0))?;
        conn.set_nonblocking(true)?;

        let addr = conn.local_addr()?;
        debug!("Active mode, listening on {}", addr);

        if addr.is_ipv4() {
            let msb = addr.port() / 256;
            let lsb = addr.port() % 256;
            let ip_port = format!("{},{},{}", ip.to_string().replace('.', ","), msb, lsb);
            debug!("Running PORT command");
            self.perform(Command::Port(ip_port))?;
        } else {
            debug!("Running EPRT command");
            self.perform(Command::Eprt(addr))?;
        }
        self.read_response(ReplyCode::COMMAND_OK)?;

        Ok(conn)
    }

    /// Runs the EPSV to enter Extended passive mode.
    fn epsv(&mut self) -> FtpResult<SocketAddr> {
        debug!("EPSV command");
        self.perform(Command::Epsv)?;
        // EPSV response format : 229 Entering Extended Passive Mode (|||PORT|)
        let response = self.read_response(ReplyCode::EXTENDED_PASSIVE_MODE)?;
        let new_port = EPSV_PORT_RE
            .captures(&response.text())
            .and_then(|caps| caps[1].parse::<u16>().ok())
            .ok_or_else(|| FtpError::UnexpectedResponse(response.clone()))?;
        trace!("Got port number from EPSV: {}", new_port);
        let mut remote = self.get_ref().peer_addr()?;
        remote.set_port(new_port);
        trace!("Remote address for extended passive mode is {}", remote);
        Ok(remote)
    }

    /// Runs the PASV command  to enter passive mode.
    fn pasv(&mut self) -> FtpResult<SocketAddr> {
        debug!("PASV command");
        self.perform(Command::Pasv)?;
        // PASV response format : 227 Entering Passive Mode (h1,h2,h3,h4,p1,p2).
        let response = self.read_response(ReplyCode::PASSIVE_MODE)?;
        let addr = Self::parse_passive_address_from_response(response)?;
        trace!("Passive address: {addr}");
        if self.nat_workaround {
            let mut remote = self.get_ref().peer_addr()?;
            remote.set_port(addr.port());
            trace!("Replacing site local address {} with {}", addr, remote);
            Ok(remote)
        } else {
            Ok(addr)
        }
    }

    /// Parse passive address from response
    pub(crate) fn parse_passive_address_from_response(
        response: Response,
    ) -> FtpResult<SocketAddr> {
        let text = response.text();
        trace!("PASV response: {text}");
        let caps = PASV_PORT_RE
            .captures(&text)
            .ok_or_else(|| FtpError::UnexpectedResponse(response.clone()))?;
        let mut numbers = [0u8; 6];
        for (number, capture) in numbers.iter_mut().zip(caps.iter().skip(1)) {
            *number = capture
                .and_then(|capture| capture.as_str().parse::<u8>().ok())
                .ok_or(FtpError::BadResponse)?;
        }
        let [oct1, oct2, oct3, oct4, msb, lsb] = numbers;
        let ip = Ipv4Addr::new(oct1, oct2, oct3, oct4);
        let port = (u16::from(msb) << 8) | u16::from(lsb);
        Ok(SocketAddr::new(ip.into(), port))
    }

    /// Default stream builder
    fn default_passive_stream_builder(timeout: Duration) -> Box<PassiveStreamBuilder> {
        Box::new(move |addr| Ok(TcpStream::connect_timeout(&addr, timeout)?))
    }
}

#[cfg(all(test, feature = "rustls"))]
mod test {

    use std::io::Read;
    use std::net::IpAddr;
    use std::sync::Arc;
    use std::thread;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::test_server::{tls_configs, TestServer};

    #[test]
    fn connect() {
        crate::log_init();
        with_test_ftps_stream(|_stream, _server| {});
    }

    #[test]
    fn should_send_client_hello_before_anything_else() {
        crate::log_init();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut header = [0u8; 3];
            socket.read_exact(&mut header).unwrap();
            header
        });
        let (_, client_config) = tls_configs();
        let params = ConnectionParams::new("localhost")
            .port(port)
            .timeout(Duration::from_secs(5));
        assert!(
            RustlsFtpsStream::connect_secure_implicit(&params, RustlsConnector::from(client_config))
                .is_err()
        );
        let header = server.join().unwrap();
        // handshake record, TLS major version 3
        assert_eq!(header[0], 0x16);
        assert_eq!(header[1], 0x03);
    }

    #[test]
    fn should_fail_handshake_with_plain_ftp_server() {
        crate::log_init();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            socket
                .set_read_timeout(Some(Duration::from_secs(5)))
                .unwrap();
            socket.write_all(b"220 plain FTP server ready\r\n").unwrap();
            let mut buf = Vec::new();
            let _ = socket.read_to_end(&mut buf);
        });
        let (_, client_config) = tls_configs();
        let params = ConnectionParams::new("localhost")
            .port(port)
            .timeout(Duration::from_secs(5));
        let err =
            RustlsFtpsStream::connect_secure_implicit(&params, RustlsConnector::from(client_config))
                .err()
                .unwrap();
        assert!(matches!(err, FtpError::SecureError(_)), "got {err:?}");
        server.join().unwrap();
    }

    #[test]
    fn should_time_out_when_server_is_silent() {
        crate::log_init();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (_socket, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_secs(2));
        });
        let (_, client_config) = tls_configs();
        let params = ConnectionParams::new("localhost")
            .port(port)
            .timeout(Duration::from_millis(300));
        let err =
            RustlsFtpsStream::connect_secure_implicit(&params, RustlsConnector::from(client_config))
                .err()
                .unwrap();
        assert!(matches!(err, FtpError::Timeout), "got {err:?}");
        server.join().unwrap();
    }

    #[test]
    fn should_fail_connecting_to_closed_port() {
        crate::log_init();
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let params = ConnectionParams::new("127.0.0.1")
            .port(port)
            .timeout(Duration::from_secs(5));
        let err = FtpStream::connect(&params, PlainTcp).err().unwrap();
        assert!(matches!(err, FtpError::ConnectionError(_)), "got {err:?}");
    }

    #[test]
    fn welcome_message() {
        crate::log_init();
        with_test_ftps_stream(|stream, _server| {
            assert_eq!(stream.welcome().status, ReplyCode::READY);
            assert_eq!(stream.welcome().lines.len(), 2);
            assert!(stream
                .get_welcome_msg()
                .contains("Welcome to the fake implicit FTPS server"));
        });
    }

    #[test]
    fn should_negotiate_data_protection_on_login() {
        crate::log_init();
        with_test_ftps_stream(|stream, server| {
            assert_eq!(stream.protection(), ProtectionLevel::Private);
            let commands = server.commands();
            assert_eq!(
                &commands[..4],
                &["USER test", "PASS test", "PBSZ 0", "PROT P"]
            );
        });
    }

    #[test]
    fn should_reject_wrong_password() {
        crate::log_init();
        let (server_config, client_config) = tls_configs();
        let server = TestServer::implicit(server_config);
        let mut stream = RustlsFtpsStream::connect_secure_implicit(
            &server.params(),
            RustlsConnector::from(client_config),
        )
        .unwrap();
        match stream.login("test", "wrong") {
            Err(FtpError::UnexpectedResponse(response)) => {
                assert_eq!(response.status, ReplyCode::NOT_LOGGED_IN)
            }
            other => panic!("expected a rejection, got {other:?}"),
        }
        // a rejection leaves the control channel in sync
        assert!(stream.is_usable());
        assert!(stream.login("test", "test").is_ok());
    }

    #[test]
    fn noop() {
        crate::log_init();
        with_test_ftps_stream(|stream, _server| {
            assert!(stream.noop().is_ok());
        });
    }

    #[test]
    fn should_send_custom_commands() {
        crate::log_init();
        with_test_ftps_stream(|stream, _server| {
            let response = stream.send_command("SITE HELP").unwrap();
            assert_eq!(response.status, ReplyCode(502));
            assert!(matches!(
                stream.send_void_command("SITE HELP"),
                Err(FtpError::UnexpectedResponse(_))
            ));
            assert_eq!(
                stream.send_void_command("NOOP").unwrap().status,
                ReplyCode::COMMAND_OK
            );
        });
    }

    #[test]
    fn should_reject_multiline_commands() {
        crate::log_init();
        with_test_ftps_stream(|stream, server| {
            assert!(matches!(
                stream.send_void_command("NOOP\r\nSITE HELP"),
                Err(FtpError::InvalidCommand(_))
            ));
            assert!(matches!(
                stream.send_command("SITE HELP\nNOOP"),
                Err(FtpError::InvalidCommand(_))
            ));
            assert!(stream.is_usable());
            // the next reply belongs to the next command
            assert_eq!(
                stream.send_void_command("NOOP").unwrap().status,
                ReplyCode::COMMAND_OK
            );
            let commands = server.commands();
            assert!(!commands.iter().any(|c| c.contains("SITE HELP")));
            assert_eq!(commands.last().map(String::as_str), Some("NOOP"));
        });
    }

    #[test]
    fn should_become_unusable_when_control_channel_breaks() {
        crate::log_init();
        let (server_config, client_config) = tls_configs();
        let server = TestServer::implicit(server_config);
        let mut stream = RustlsFtpsStream::connect_secure_implicit(
            &server.params(),
            RustlsConnector::from(client_config),
        )
        .unwrap();
        assert!(stream.login("test", "test").is_ok());
        // the fake server hangs up without replying
        assert!(matches!(
            stream.send_command("DROP"),
            Err(FtpError::ConnectionClosed)
        ));
        assert!(!stream.is_usable());
        assert!(matches!(stream.noop(), Err(FtpError::SessionUnusable)));
        assert!(stream.reconnect().is_ok());
        assert!(stream.is_usable());
        assert!(stream.login("test", "test").is_ok());
        assert!(stream.noop().is_ok());
        assert!(stream.quit().is_ok());
        assert_eq!(server.state().control_connections, 2);
    }

    #[test]
    fn test_should_parse_passive_address_from_response() {
        let response = Response::new(
            ReplyCode::PASSIVE_MODE,
            vec!["227 Entering Passive Mode (127,0,0,1,117,56)".to_string()],
        );
        let address = FtpStream::parse_passive_address_from_response(response)
            .expect("Failed to parse passive address");
        assert_eq!(
            address.ip(),
            IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            "IP address is not correct"
        );
        assert_eq!(address.port(), 30008, "Port is not correct");

        let response = Response::new(
            ReplyCode::PASSIVE_MODE,
            vec!["227 Entering Passive Mode (58,247,92,122,146,239).".to_string()],
        );
        let address = FtpStream::parse_passive_address_from_response(response)
            .expect("Failed to parse passive address");
        assert_eq!(
            address.ip(),
            IpAddr::V4(Ipv4Addr::new(58, 247, 92, 122)),
            "IP address is not correct"
        );
        assert_eq!(address.port(), 37615, "Port is not correct");
    }

    #[test]
    fn should_reject_malformed_passive_address() {
        let response = Response::new(
            ReplyCode::PASSIVE_MODE,
            vec!["227 Entering Passive Mode".to_string()],
        );
        assert!(matches!(
            FtpStream::parse_passive_address_from_response(response),
            Err(FtpError::UnexpectedResponse(_))
        ));
        let response = Response::new(
            ReplyCode::PASSIVE_MODE,
            vec!["227 Entering Passive Mode (300,0,0,1,4,1)".to_string()],
        );
        assert!(matches!(
            FtpStream::parse_passive_address_from_response(response),
            Err(FtpError::BadResponse)
        ));
    }

    #[test]
    fn should_change_mode() {
        crate::log_init();
        with_test_ftps_stream(|stream, _server| {
            assert_eq!(stream.mode, Mode::Passive);
            stream.set_mode(Mode::Active);
            assert_eq!(stream.mode, Mode::Active);
        })
    }

    #[test]
    fn should_set_passive_nat_workaround() {
        crate::log_init();
        with_test_ftps_stream(|stream, _server| {
            assert!(stream.nat_workaround);
            stream.set_passive_nat_workaround(false);
            assert!(!stream.nat_workaround);
        });
    }

    #[test]
    fn get_ref() {
        crate::log_init();
        with_test_ftps_stream(|stream, _server| {
            assert!(stream
                .get_ref()
                .set_read_timeout(Some(Duration::from_secs(10)))
                .is_ok());
        });
    }

    fn is_send<T: Send>() {}

    #[test]
    fn test_ftps_stream_should_be_send() {
        is_send::<RustlsFtpsStream>();
        is_send::<FtpStream>();
    }

    // -- test utils

    fn with_test_ftps_stream<F>(f: F)
    where
        F: FnOnce(&mut RustlsFtpsStream, &TestServer),
    {
        let (server_config, client_config) = tls_configs();
        let server = TestServer::implicit(server_config);
        let mut stream = RustlsFtpsStream::connect_secure_implicit(
            &server.params(),
            RustlsConnector::from(Arc::clone(&client_config)),
        )
        .unwrap();
        assert!(stream.login("test", "test").is_ok());
        f(&mut stream, &server);
        assert!(stream.quit().is_ok());
    }
}
