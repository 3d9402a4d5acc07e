//! Console reporting.
//!
//! Recipe echo and failure notes funnel through one process-wide lock so
//! messages from parallel builds stay whole.

use std::sync::Mutex;

static CONSOLE: Mutex<()> = Mutex::new(());

/// Report an error from a context without access to the console handle,
/// such as a task thread.
pub fn error(msg: &str) {
    let _guard = CONSOLE.lock().unwrap();
    eprintln!("{}", msg);
}

pub struct ConsoleProgress {
    quiet: bool,
}

impl ConsoleProgress {
    pub fn new(quiet: bool) -> ConsoleProgress {
        ConsoleProgress { quiet }
    }

    /// Echo a recipe before it runs.
    pub fn recipe(&self, text: &str) {
        if self.quiet {
            return;
        }
        let _guard = CONSOLE.lock().unwrap();
        println!("{}", text.trim_end_matches('\n'));
    }

    pub fn note(&self, msg: &str) {
        let _guard = CONSOLE.lock().unwrap();
        eprintln!("{}", msg);
    }
}
