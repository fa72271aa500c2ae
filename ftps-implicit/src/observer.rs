//! # Observer
//!
//! Sinks invoked synchronously for every unit moved by a transfer.
//!
//! Returning [`ControlFlow::Break`] stops the transfer; the data channel is still shut down
//! and the completion reply is still read, so the control channel stays usable.

use std::ops::ControlFlow;

/// Observes the blocks of a binary transfer, or the encoded lines of a line-mode upload
pub trait BlockObserver {
    fn on_block(&mut self, block: &[u8]) -> ControlFlow<()>;
}

/// Observes the lines of a line-mode download, terminator stripped
pub trait LineObserver {
    fn on_line(&mut self, line: &str) -> ControlFlow<()>;
}

impl<F> BlockObserver for F
where
    F: FnMut(&[u8]) -> ControlFlow<()>,
{
    fn on_block(&mut self, block: &[u8]) -> ControlFlow<()> {
        self(block)
    }
}

impl<F> LineObserver for F
where
    F: FnMut(&str) -> ControlFlow<()>,
{
    fn on_line(&mut self, line: &str) -> ControlFlow<()> {
        self(line)
    }
}

/// Observer which ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl BlockObserver for NoopObserver {
    fn on_block(&mut self, _block: &[u8]) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

impl LineObserver for NoopObserver {
    fn on_line(&mut self, _line: &str) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

/// Default line sink: prints every line to stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct LinePrinter;

impl LineObserver for LinePrinter {
    fn on_line(&mut self, line: &str) -> ControlFlow<()> {
        println!("{line}");
        ControlFlow::Continue(())
    }
}
