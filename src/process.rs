//! Subprocess execution.
//!
//! One entry point covers every caller: recipes, backtick substitution, and
//! pipe-includes all run a program with a payload piped to its stdin,
//! optionally capturing stdout.  The stdin writer runs on its own thread,
//! concurrently with the stdout reader, so a child producing lots of output
//! while we are still feeding it cannot deadlock either side.

use anyhow::{anyhow, Result};
use std::io::{Read, Write};
use std::process::{Command, Stdio};

pub struct Output {
    /// True iff the process exited with status zero.
    pub success: bool,
    /// Captured stdout; empty unless capture was requested.
    pub stdout: String,
}

/// Run `program` (resolved via PATH) with `args`, feeding `input` to its
/// stdin.  With `capture` set, stdout is collected and returned; otherwise
/// it passes through to the console.  Stderr always passes through.
pub fn run(program: &str, args: &[String], input: &str, capture: bool) -> Result<Output> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.stdin(Stdio::piped());
    if capture {
        cmd.stdout(Stdio::piped());
    }
    let mut child = cmd
        .spawn()
        .map_err(|err| anyhow!("exec {}: {}", program, err))?;

    let writer = child.stdin.take().map(|mut stdin| {
        let payload = input.to_string();
        std::thread::spawn(move || {
            // The child may exit without draining stdin; a broken pipe
            // here is not interesting.
            let _ = stdin.write_all(payload.as_bytes());
        })
    });

    let mut stdout = String::new();
    if let Some(mut out) = child.stdout.take() {
        let mut buf = Vec::new();
        out.read_to_end(&mut buf)?;
        stdout = String::from_utf8_lossy(&buf).into_owned();
    }

    let status = child.wait()?;
    if let Some(writer) = writer {
        let _ = writer.join();
    }

    Ok(Output {
        success: status.success(),
        stdout,
    })
}
