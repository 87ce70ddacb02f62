//! Console-style rendering of captured output.

use std::io::{self, Write};

use crate::domain::model::{CapturedLine, OutputLog};

pub fn format_line(line: &CapturedLine, show_channel: bool) -> String {
    match (show_channel, line.is_error) {
        (false, _) => line.text.clone(),
        (true, false) => format!("[log] {}", line.text),
        (true, true) => format!("[error] {}", line.text),
    }
}

/// Write every line in order, one per row.
pub fn write_log(log: &OutputLog, show_channel: bool, out: &mut impl Write) -> io::Result<()> {
    for line in log {
        writeln!(out, "{}", format_line(line, show_channel))?;
    }
    out.flush()
}
