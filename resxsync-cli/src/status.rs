//! Terminal output: the progress line and engine messages.

use std::io::Write;
use std::sync::{Arc, Mutex};

use resxsync::{Logger, StatusProgress};

const CLEAR_LINE: &str = "\r\x1b[2K";

#[derive(Default)]
struct LineState {
    status: String,
    percent: Option<i64>,
    visible: bool,
}

/// A single self-overwriting progress line on stderr, drawn only when stderr is a terminal.
pub struct ProgressLine {
    root: StatusProgress,
    state: Arc<Mutex<LineState>>,
}

impl ProgressLine {
    pub fn new(enabled: bool) -> Self {
        let state = Arc::new(Mutex::new(LineState::default()));
        let sink_state = state.clone();
        let root = StatusProgress::new(move |status, value| {
            if !enabled {
                return;
            }
            let Ok(mut line) = sink_state.lock() else {
                return;
            };
            let percent = value.round() as i64;
            if let Some(status) = status {
                line.status = status.to_string();
            } else if line.percent == Some(percent) {
                return;
            }
            line.percent = Some(percent);
            line.visible = true;
            let mut err = std::io::stderr().lock();
            let _ = write!(err, "{CLEAR_LINE}{} {:>3}%", line.status, percent.clamp(0, 100));
            let _ = err.flush();
        });
        ProgressLine { root, state }
    }

    /// Draws the line only when stderr is a terminal.
    pub fn for_terminal() -> Self {
        Self::new(atty::is(atty::Stream::Stderr))
    }

    pub fn root(&self) -> &StatusProgress {
        &self.root
    }

    /// Removes the line so regular output starts on a clean line.
    pub fn clear(&self) {
        clear_line(&self.state);
    }

    fn state(&self) -> Arc<Mutex<LineState>> {
        self.state.clone()
    }

    /// A logger printing engine messages above the progress line.
    pub fn logger(&self) -> ConsoleLogger {
        ConsoleLogger {
            line: self.state(),
        }
    }
}

fn clear_line(state: &Mutex<LineState>) {
    if let Ok(mut line) = state.lock() {
        if line.visible {
            let mut err = std::io::stderr().lock();
            let _ = write!(err, "{CLEAR_LINE}");
            let _ = err.flush();
            line.visible = false;
            line.percent = None;
        }
    }
}

/// Prints engine messages to stdout.
#[derive(Clone)]
pub struct ConsoleLogger {
    line: Arc<Mutex<LineState>>,
}

impl Logger for ConsoleLogger {
    fn log(&self, message: &str) {
        clear_line(&self.line);
        println!("{}", message);
    }
}
