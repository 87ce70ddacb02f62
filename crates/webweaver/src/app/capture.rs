//! Console capture around a single sandbox run.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use crate::app::sandbox::{ConsoleChannel, ConsoleSink, Sandbox};
use crate::domain::errors::SandboxError;
use crate::domain::model::{CapturedLine, OutputLog};

/// Line reported when a successful run printed nothing.
pub const NO_OUTPUT_MESSAGE: &str = "Code executed without output.";

/// Sink that records every console call in emission order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    log: RefCell<OutputLog>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the recorded lines, leaving the sink empty.
    pub fn take(&self) -> OutputLog {
        self.log.take()
    }
}

impl ConsoleSink for RecordingSink {
    fn emit(&self, channel: ConsoleChannel, text: &str) {
        self.log.borrow_mut().push(CapturedLine {
            text: text.to_string(),
            is_error: channel.is_error(),
        });
    }
}

/// Run `javascript` in the loaded realm and return everything it printed.
///
/// The realm's sink is swapped for a recorder only while the script runs and is
/// restored on every exit path. A script that throws still yields a log: the
/// lines printed before the failure followed by the thrown message as an error
/// line. Only a missing realm is returned as an error.
pub fn capture_run(sandbox: &mut Sandbox, javascript: &str) -> Result<OutputLog, SandboxError> {
    let recorder = Rc::new(RecordingSink::new());
    let outcome = {
        let _guard = sandbox.install_sink(recorder.clone())?;
        sandbox.run(javascript)
    };

    let mut log = recorder.take();
    match outcome {
        Ok(()) if log.is_empty() => log.push(CapturedLine::log(NO_OUTPUT_MESSAGE)),
        Ok(()) => {}
        Err(SandboxError::Execution { message }) => log.push(CapturedLine::error(message)),
        Err(err @ SandboxError::Unavailable) => return Err(err),
    }

    debug!(lines = log.len(), errors = log.has_errors(), "captured run output");
    Ok(log)
}
