use std::path::PathBuf;

use argh::FromArgs;

#[derive(FromArgs)]
#[argh(description = "Transfer files with an implicit FTPS server.

Examples:
  ftps-implicit ftp.example.com -u john get report.pdf
  ftps-implicit ftp.example.com -u john --ascii put notes.txt
  ftps-implicit ftp.example.com -u john ls /pub")]
pub struct Args {
    #[argh(switch, short = 'D', description = "enable TRACE log level")]
    pub debug: bool,
    #[argh(switch, short = 'v', description = "verbose mode")]
    pub verbose: bool,
    #[argh(switch, short = 'V', description = "print version")]
    pub version: bool,
    #[argh(
        option,
        short = 'p',
        default = "ftps_implicit::DEFAULT_PORT",
        description = "server port (default: 990)"
    )]
    pub port: u16,
    #[argh(
        option,
        short = 'u',
        default = "String::from(\"anonymous\")",
        description = "user to login as (default: anonymous)"
    )]
    pub user: String,
    #[argh(
        option,
        description = "password; prompted for when omitted (except for anonymous)"
    )]
    pub password: Option<String>,
    #[argh(
        option,
        short = 't',
        default = "60",
        description = "connect and i/o timeout in seconds (default: 60)"
    )]
    pub timeout: u64,
    #[argh(switch, description = "transfer files in ASCII line mode")]
    pub ascii: bool,
    #[argh(switch, description = "let the server connect back for data connections")]
    pub active: bool,
    #[argh(
        switch,
        description = "don't verify the server certificate (self-signed servers)"
    )]
    pub insecure: bool,
    #[argh(positional, description = "host to connect to")]
    pub host: Option<String>,
    #[argh(subcommand)]
    pub command: Option<Subcommand>,
}

#[derive(FromArgs)]
#[argh(subcommand)]
pub enum Subcommand {
    Get(GetArgs),
    Put(PutArgs),
    Ls(LsArgs),
}

#[derive(FromArgs)]
#[argh(subcommand, name = "get", description = "download a file")]
pub struct GetArgs {
    #[argh(positional, description = "remote file")]
    pub remote: String,
    #[argh(
        positional,
        description = "local destination (default: the remote file name)"
    )]
    pub local: Option<PathBuf>,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "put", description = "upload a file")]
pub struct PutArgs {
    #[argh(positional, description = "local file")]
    pub local: PathBuf,
    #[argh(
        positional,
        description = "remote destination (default: the local file name)"
    )]
    pub remote: Option<String>,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "ls", description = "list a remote directory")]
pub struct LsArgs {
    #[argh(positional, description = "remote directory (default: working directory)")]
    pub path: Option<String>,
}
