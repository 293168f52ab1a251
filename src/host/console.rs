use std::io::{self, Write};

use crate::guest::Console;

/// Forwards guest output to the process stdout, one line per call.
#[derive(Debug, Default)]
pub struct StdoutConsole;

impl Console for StdoutConsole {
    fn log(&mut self, line: &str) {
        let mut stdout = io::stdout().lock();
        if let Err(err) = writeln!(stdout, "{line}").and_then(|()| stdout.flush()) {
            tracing::warn!("console write failed: {err}");
        }
    }
}
