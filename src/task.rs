//! Runs recipes, potentially in parallel.
//! Unaware of the build graph; one task is one recipe invocation.

use crate::graph::NodeId;
use crate::process;
use crate::progress;
use std::sync::mpsc;

/// Everything needed to run one recipe: the interpreter argv and the
/// expanded recipe text fed to it on stdin.
pub struct Invocation {
    pub argv: Vec<String>,
    pub text: String,
}

pub struct FinishedTask {
    pub id: NodeId,
    pub success: bool,
}

/// Dispatches recipe subprocesses on worker threads, bounded by the
/// parallel cap.  An exclusive task claims every slot: it only starts once
/// nothing else runs, and nothing else starts until it finishes.
pub struct Runner {
    finished_send: mpsc::Sender<FinishedTask>,
    finished_recv: mpsc::Receiver<FinishedTask>,
    running: usize,
    exclusive: bool,
    parallelism: usize,
}

impl Runner {
    pub fn new(parallelism: usize) -> Runner {
        let (tx, rx) = mpsc::channel();
        Runner {
            finished_send: tx,
            finished_recv: rx,
            running: 0,
            exclusive: false,
            parallelism: parallelism.max(1),
        }
    }

    pub fn can_start_more(&self) -> bool {
        !self.exclusive && self.running < self.parallelism
    }

    pub fn can_start_exclusive(&self) -> bool {
        self.running == 0
    }

    pub fn is_running(&self) -> bool {
        self.running > 0
    }

    pub fn start(&mut self, id: NodeId, inv: Invocation, exclusive: bool) {
        if exclusive {
            self.exclusive = true;
        }
        let tx = self.finished_send.clone();
        std::thread::spawn(move || {
            let success = match process::run(&inv.argv[0], &inv.argv[1..], &inv.text, false) {
                Ok(out) => out.success,
                Err(err) => {
                    progress::error(&format!("mk: {}", err));
                    false
                }
            };
            // Send fails only if the receiver is gone, i.e. we are
            // shutting down.
            let _ = tx.send(FinishedTask { id, success });
        });
        self.running += 1;
    }

    /// Wait for some task to complete.  May block for a long time.
    pub fn wait(&mut self) -> FinishedTask {
        let task = self.finished_recv.recv().unwrap();
        self.running -= 1;
        if self.running == 0 {
            self.exclusive = false;
        }
        task
    }
}
