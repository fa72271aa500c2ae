//! # Transfer
//!
//! Uploads and downloads over a data channel.
//!
//! Every transfer follows the same discipline: the data channel is shut down exactly once,
//! and the server's completion reply is read exactly once, whatever happened while moving
//! bytes. A failed transfer never leaves a reply pending on the control channel.

use std::io::{self, BufRead, BufReader, Cursor, Read, Write};
use std::ops::ControlFlow;

use super::{DataStream, ImplFtpsStream, Transport};
use crate::command::Command;
use crate::observer::{BlockObserver, LineObserver};
use crate::reader::read_line;
use crate::types::{
    FtpError, FtpResult, Response, TransferType, DEFAULT_BLOCK_SIZE, MAX_LINE_LENGTH,
};

impl<T> ImplFtpsStream<T>
where
    T: Transport,
{
    /// Upload the content of `source` in binary mode.
    ///
    /// `command` is the full command line starting the transfer, e.g. `STOR file.bin`.
    /// Blocks of at most `block_size` bytes are sent unchanged; `observer` sees each block after it has been written.
    /// When `rest` is set, `REST` is sent before `command`.
    ///
    /// Returns the server's completion reply.
    pub fn store_binary<R, O>(
        &mut self,
        command: impl ToString,
        source: &mut R,
        block_size: usize,
        mut observer: O,
        rest: Option<u64>,
    ) -> FtpResult<Response>
    where
        R: Read,
        O: BlockObserver,
    {
        let command = command.to_string();
        debug!("Binary upload: {}", command);
        let mut stream = self.open_transfer(command, TransferType::Binary, rest)?;
        let outcome = send_blocks(&mut stream, source, block_size, &mut observer);
        self.finalize_transfer(stream, outcome)
    }

    /// Upload the lines of `source` in ASCII mode.
    ///
    /// Each line is sent terminated by CRLF, whatever its terminator in the source; a last line
    /// without terminator gets one. A source line longer than [`MAX_LINE_LENGTH`] aborts the
    /// transfer with [`FtpError::LineTooLong`]. `observer` sees each encoded line.
    pub fn store_lines<R, O>(
        &mut self,
        command: impl ToString,
        source: &mut R,
        mut observer: O,
    ) -> FtpResult<Response>
    where
        R: BufRead,
        O: BlockObserver,
    {
        let command = command.to_string();
        debug!("Line mode upload: {}", command);
        let mut stream = self.open_transfer(command, TransferType::Ascii, None)?;
        let outcome = send_lines(&mut stream, source, &mut observer);
        self.finalize_transfer(stream, outcome)
    }

    /// Download in binary mode, handing every block read from the data channel to `observer`.
    ///
    /// Blocks are at most `block_size` bytes long. When `rest` is set, `REST` is sent before `command`.
    pub fn retrieve_binary<O>(
        &mut self,
        command: impl ToString,
        mut observer: O,
        block_size: usize,
        rest: Option<u64>,
    ) -> FtpResult<Response>
    where
        O: BlockObserver,
    {
        let command = command.to_string();
        debug!("Binary download: {}", command);
        let mut stream = self.open_transfer(command, TransferType::Binary, rest)?;
        let outcome = receive_blocks(&mut stream, block_size, &mut observer);
        self.finalize_transfer(stream, outcome)
    }

    /// Download in ASCII mode, handing every line to `observer` without its terminator.
    ///
    /// A line longer than [`MAX_LINE_LENGTH`] aborts the transfer with [`FtpError::LineTooLong`].
    pub fn retrieve_lines<O>(
        &mut self,
        command: impl ToString,
        mut observer: O,
    ) -> FtpResult<Response>
    where
        O: LineObserver,
    {
        let command = command.to_string();
        debug!("Line mode download: {}", command);
        let mut stream = self.open_transfer(command, TransferType::Ascii, None)?;
        let outcome = receive_lines(&mut BufReader::new(&mut stream), &mut observer);
        self.finalize_transfer(stream, outcome)
    }

    /// Shut down a data channel obtained with [`Self::open_transfer`] and read the completion reply
    pub fn close_transfer(&mut self, stream: DataStream<T::Stream>) -> FtpResult<Response> {
        self.finalize_transfer(stream, Ok(ControlFlow::Continue(())))
    }

    /// This stores a file on the server.
    ///
    /// Returns the number of bytes written
    pub fn put_file<S: AsRef<str>, R: Read>(&mut self, filename: S, r: &mut R) -> FtpResult<u64> {
        self.upload(Command::Store(filename.as_ref().to_string()), r)
    }

    /// Append data from reader to file at `filename`
    pub fn append_file<S: AsRef<str>, R: Read>(
        &mut self,
        filename: S,
        r: &mut R,
    ) -> FtpResult<u64> {
        self.upload(Command::Appe(filename.as_ref().to_string()), r)
    }

    /// Download `file_name` into `writer`.
    ///
    /// Returns the number of bytes written. An error writing to `writer` stops the transfer.
    pub fn retr_to_writer<W: Write>(&mut self, file_name: &str, writer: &mut W) -> FtpResult<u64> {
        let mut written = 0;
        let mut failure: Option<io::Error> = None;
        let result = self.retrieve_binary(
            Command::Retr(file_name.to_string()),
            |block: &[u8]| match writer.write_all(block) {
                Ok(()) => {
                    written += block.len() as u64;
                    ControlFlow::Continue(())
                }
                Err(err) => {
                    failure = Some(err);
                    ControlFlow::Break(())
                }
            },
            DEFAULT_BLOCK_SIZE,
            None,
        );
        if let Some(err) = failure {
            error!("failed to write downloaded data: {err}");
            return Err(FtpError::ConnectionError(err));
        }
        result.map(|_| written)
    }

    /// Simple way to retr a file from the server. This stores the file in a buffer in memory.
    pub fn retr_as_buffer(&mut self, file_name: &str) -> FtpResult<Cursor<Vec<u8>>> {
        let mut buffer = Vec::new();
        self.retr_to_writer(file_name, &mut buffer)?;
        Ok(Cursor::new(buffer))
    }

    /// Execute `LIST` command which returns the detailed file listing in human readable format.
    /// If `pathname` is omited then the list of files in the current directory will be
    /// returned otherwise it will the list of files on `pathname`.
    pub fn list(&mut self, pathname: Option<&str>) -> FtpResult<Vec<String>> {
        debug!("Reading {:?} directory content", pathname.unwrap_or("working"));
        self.collect_lines(Command::List(pathname.map(|x| x.to_string())))
    }

    /// Execute `NLST` command which returns the list of file names only.
    /// If `pathname` is omited then the list of files in the current directory will be
    /// returned otherwise it will the list of files on `pathname`.
    pub fn nlst(&mut self, pathname: Option<&str>) -> FtpResult<Vec<String>> {
        debug!("Getting file names for {:?} directory", pathname.unwrap_or("working"));
        self.collect_lines(Command::Nlst(pathname.map(|x| x.to_string())))
    }

    // -- private

    fn upload<R: Read>(&mut self, command: Command, r: &mut R) -> FtpResult<u64> {
        let mut sent = 0;
        self.store_binary(
            command,
            r,
            DEFAULT_BLOCK_SIZE,
            |block: &[u8]| {
                sent += block.len() as u64;
                ControlFlow::Continue(())
            },
            None,
        )?;
        Ok(sent)
    }

    fn collect_lines(&mut self, command: Command) -> FtpResult<Vec<String>> {
        let mut lines = Vec::new();
        self.retrieve_lines(command, |line: &str| {
            lines.push(line.to_string());
            ControlFlow::Continue(())
        })?;
        trace!("Lines from stream {:?}", lines);
        Ok(lines)
    }

    /// Shut down the data channel, then read the completion reply.
    ///
    /// The reply is read even when moving bytes failed; that failure is reported over the reply.
    fn finalize_transfer(
        &mut self,
        mut stream: DataStream<T::Stream>,
        outcome: FtpResult<ControlFlow<()>>,
    ) -> FtpResult<Response> {
        let shutdown = self.transport.shutdown(&mut stream);
        drop(stream);
        trace!("Data channel closed");
        let reply = self.read_reply();
        match outcome {
            Err(err) => {
                match reply {
                    Ok(response) => debug!("transfer failed ({err}); server replied {response}"),
                    Err(reply_err) => warn!("transfer failed ({err}); no reply ({reply_err})"),
                }
                Err(err)
            }
            Ok(ControlFlow::Break(())) => {
                let response = reply?;
                debug!("Transfer aborted by observer; server replied {}", response);
                Err(FtpError::TransferAborted(response))
            }
            Ok(ControlFlow::Continue(())) => {
                let response = reply?;
                shutdown?;
                if response.status.is_completion() {
                    debug!("Transfer completed: {}", response);
                    Ok(response)
                } else {
                    Err(FtpError::UnexpectedResponse(response))
                }
            }
        }
    }
}

/// Copy `source` to `stream`, block by block
fn send_blocks<W, R, O>(
    stream: &mut W,
    source: &mut R,
    block_size: usize,
    observer: &mut O,
) -> FtpResult<ControlFlow<()>>
where
    W: Write,
    R: Read,
    O: BlockObserver,
{
    let mut buffer = vec![0; block_size.max(1)];
    loop {
        let read = match source.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        stream.write_all(&buffer[..read])?;
        if observer.on_block(&buffer[..read]).is_break() {
            return Ok(ControlFlow::Break(()));
        }
    }
    stream.flush()?;
    Ok(ControlFlow::Continue(()))
}

/// Copy the lines of `source` to `stream`, CRLF terminated
fn send_lines<W, R, O>(
    stream: &mut W,
    source: &mut R,
    observer: &mut O,
) -> FtpResult<ControlFlow<()>>
where
    W: Write,
    R: BufRead,
    O: BlockObserver,
{
    while let Some(mut line) = read_line(source, MAX_LINE_LENGTH)? {
        if !line.ends_with(b"\r\n") {
            if matches!(line.last(), Some(b'\r' | b'\n')) {
                line.pop();
            }
            line.extend_from_slice(b"\r\n");
        }
        stream.write_all(&line)?;
        if observer.on_block(&line).is_break() {
            return Ok(ControlFlow::Break(()));
        }
    }
    stream.flush()?;
    Ok(ControlFlow::Continue(()))
}

/// Hand every block read from `stream` to `observer`, until end of stream
fn receive_blocks<R, O>(
    stream: &mut R,
    block_size: usize,
    observer: &mut O,
) -> FtpResult<ControlFlow<()>>
where
    R: Read,
    O: BlockObserver,
{
    let mut buffer = vec![0; block_size.max(1)];
    loop {
        match stream.read(&mut buffer) {
            Ok(0) => return Ok(ControlFlow::Continue(())),
            Ok(read) => {
                if observer.on_block(&buffer[..read]).is_break() {
                    return Ok(ControlFlow::Break(()));
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        }
    }
}

/// Hand every line read from `stream` to `observer`, terminator stripped
fn receive_lines<R, O>(stream: &mut R, observer: &mut O) -> FtpResult<ControlFlow<()>>
where
    R: BufRead,
    O: LineObserver,
{
    while let Some(mut line) = read_line(stream, MAX_LINE_LENGTH)? {
        if line.ends_with(b"\r\n") {
            line.truncate(line.len() - 2);
        } else if line.ends_with(b"\n") {
            line.pop();
        }
        let line = String::from_utf8_lossy(&line);
        trace!("DC IN: {:?}", line);
        if observer.on_line(&line).is_break() {
            return Ok(ControlFlow::Break(()));
        }
    }
    Ok(ControlFlow::Continue(()))
}
