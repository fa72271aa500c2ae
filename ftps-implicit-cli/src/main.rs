//! # ftps-implicit
//!
//! One-shot command line client for implicit FTPS servers: connect, login, transfer, quit.
//!

// -- mods
mod actions;
mod args;
mod tls;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use args::{Args, Subcommand};
use env_logger::Builder as LogBuilder;
use ftps_implicit::RustlsFtpsStream as FtpStream;
use log::LevelFilter;

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
const APP_AUTHORS: &str = env!("CARGO_PKG_AUTHORS");

fn main() -> ExitCode {
    let args: Args = argh::from_env();
    // print version
    if args.version {
        println!("ftps-implicit {APP_VERSION} - developed by {APP_AUTHORS}");
        return ExitCode::SUCCESS;
    }
    // init logger
    LogBuilder::new()
        .filter_level(if args.debug {
            LevelFilter::Trace
        } else if args.verbose {
            LevelFilter::Info
        } else {
            LevelFilter::Off
        })
        .init();

    let (Some(host), Some(command)) = (args.host.as_deref(), args.command.as_ref()) else {
        eprintln!("Usage: ftps-implicit <host> <get|put|ls> [args...]; see --help");
        return ExitCode::FAILURE;
    };

    let Some(mut ftp) = actions::connect(&args, host) else {
        return ExitCode::FAILURE;
    };
    if !actions::login(&mut ftp, &args.user, args.password.as_deref()) {
        actions::quit(ftp);
        return ExitCode::FAILURE;
    }

    let ok = match command {
        Subcommand::Get(get) => {
            let local = get
                .local
                .clone()
                .unwrap_or_else(|| file_name(Path::new(&get.remote)));
            actions::get(&mut ftp, &get.remote, &local, args.ascii)
        }
        Subcommand::Put(put) => {
            let remote = put
                .remote
                .clone()
                .unwrap_or_else(|| file_name(&put.local).to_string_lossy().into_owned());
            actions::put(&mut ftp, &put.local, &remote, args.ascii)
        }
        Subcommand::Ls(ls) => actions::ls(&mut ftp, ls.path.as_deref()),
    };
    actions::quit(ftp);

    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Last component of `path`, or `path` itself
fn file_name(path: &Path) -> PathBuf {
    path.file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| path.to_path_buf())
}
