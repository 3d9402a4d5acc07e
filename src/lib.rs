mod densemap;
mod expand;
mod graph;
mod lex;
mod parse;
mod process;
mod progress;
mod rules;
pub mod run;
mod signal;
mod task;
mod work;

#[cfg(not(windows))]
use jemallocator::Jemalloc;

#[cfg(not(windows))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;
