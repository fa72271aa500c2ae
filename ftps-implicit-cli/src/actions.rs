use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::ops::ControlFlow;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ftps_implicit::{
    ConnectionParams, LinePrinter, NoopObserver, RustlsConnector, DEFAULT_BLOCK_SIZE,
};

use super::args::Args;
use super::tls::client_config;
use super::FtpStream;

pub fn connect(args: &Args, host: &str) -> Option<FtpStream> {
    let config = match client_config(args.insecure) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to setup TLS: {}", err);
            return None;
        }
    };
    let params = ConnectionParams::new(host)
        .port(args.port)
        .timeout(Duration::from_secs(args.timeout));
    let stream =
        match FtpStream::connect_secure_implicit(&params, RustlsConnector::from(Arc::new(config)))
        {
            Ok(stream) => stream,
            Err(err) => {
                eprintln!("Failed to connect to remote: {}", err);
                return None;
            }
        };
    let stream = if args.active {
        stream.active_mode(Duration::from_secs(args.timeout))
    } else {
        stream
    };
    Some(stream)
}

pub fn login(ftp: &mut FtpStream, user: &str, password: Option<&str>) -> bool {
    let password = match password {
        Some(password) => password.to_string(),
        None if user == "anonymous" => String::from("anonymous@"),
        None => match rpassword::prompt_password("Password: ") {
            Ok(p) => p,
            Err(err) => {
                eprintln!("Could not read password: {}", err);
                return false;
            }
        },
    };
    match ftp.login(user, password.as_str()) {
        Ok(_) => true,
        Err(err) => {
            eprintln!("LOGIN error: {}", err);
            false
        }
    }
}

pub fn quit(mut ftp: FtpStream) {
    if let Err(err) = ftp.quit() {
        eprintln!("Failed to disconnect from remote: {}", err);
    }
}

pub fn get(ftp: &mut FtpStream, remote: &str, local: &Path, ascii: bool) -> bool {
    let file = match File::create(local) {
        Ok(f) => f,
        Err(err) => {
            eprintln!("Could not open local file: {}", err);
            return false;
        }
    };
    let mut writer = BufWriter::new(file);
    let mut failure = None;
    let command = format!("RETR {remote}");
    let result = if ascii {
        ftp.retrieve_lines(command, |line: &str| {
            match writer.write_all(line.as_bytes()).and_then(|()| writer.write_all(b"\n")) {
                Ok(()) => ControlFlow::Continue(()),
                Err(err) => {
                    failure = Some(err);
                    ControlFlow::Break(())
                }
            }
        })
    } else {
        ftp.retrieve_binary(
            command,
            |block: &[u8]| match writer.write_all(block) {
                Ok(()) => ControlFlow::Continue(()),
                Err(err) => {
                    failure = Some(err);
                    ControlFlow::Break(())
                }
            },
            DEFAULT_BLOCK_SIZE,
            None,
        )
    };
    if let Some(err) = failure {
        eprintln!("Could not write local file: {}", err);
        return false;
    }
    match result.map(|response| (response, writer.flush())) {
        Ok((_, Err(err))) => {
            eprintln!("Could not write local file: {}", err);
            false
        }
        Ok((response, Ok(()))) => {
            println!("OK: {}", response);
            true
        }
        Err(err) => {
            eprintln!("RETR error: {}", err);
            false
        }
    }
}

pub fn put(ftp: &mut FtpStream, local: &Path, remote: &str, ascii: bool) -> bool {
    let file = match File::open(local) {
        Ok(f) => f,
        Err(err) => {
            eprintln!("Could not open local file: {}", err);
            return false;
        }
    };
    let mut reader = BufReader::new(file);
    let command = format!("STOR {remote}");
    let result = if ascii {
        ftp.store_lines(command, &mut reader, NoopObserver)
    } else {
        ftp.store_binary(command, &mut reader, DEFAULT_BLOCK_SIZE, NoopObserver, None)
    };
    match result {
        Ok(response) => {
            println!("OK: {}", response);
            true
        }
        Err(err) => {
            eprintln!("STOR error: {}", err);
            false
        }
    }
}

pub fn ls(ftp: &mut FtpStream, path: Option<&str>) -> bool {
    let command = match path {
        Some(path) => format!("LIST {path}"),
        None => String::from("LIST"),
    };
    match ftp.retrieve_lines(command, LinePrinter) {
        Ok(_) => true,
        Err(err) => {
            eprintln!("LIST error: {}", err);
            false
        }
    }
}
