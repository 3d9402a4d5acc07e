//! Command line entry point: parse flags, import the environment, read the
//! mkfile, and drive one build (or two, for the interactive prompt).

use crate::graph;
use crate::parse;
use crate::progress::ConsoleProgress;
use crate::rules::{Pattern, Rule, RuleSet};
use crate::signal;
use crate::work;
use anyhow::{bail, Result};
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

#[derive(argh::FromArgs)]
/// mk: maintain (parts of) related files from a description file
struct Opts {
    /// mkfile to read [default=mkfile]
    #[argh(option, short = 'f', default = "String::from(\"mkfile\")")]
    file: String,

    /// print recipes without executing them
    #[argh(switch, short = 'n')]
    dry_run: bool,

    /// rebuild everything regardless of timestamps
    #[argh(switch, short = 'a')]
    rebuild_all: bool,

    /// rebuild the named targets regardless of timestamps
    #[argh(switch, short = 'r')]
    rebuild: bool,

    /// parallel job cap [default=4]
    #[argh(option, short = 'p', default = "4")]
    parallelism: usize,

    /// dry run, then prompt before executing
    #[argh(switch, short = 'i')]
    interactive: bool,

    /// don't echo recipes
    #[argh(switch, short = 'q')]
    quiet: bool,

    /// targets to bring up to date
    #[argh(positional)]
    targets: Vec<String>,
}

pub fn run() -> Result<i32> {
    signal::install();
    let opts: Opts = argh::from_env();

    let mut rules = RuleSet::new();
    for (key, val) in std::env::vars() {
        rules.vars.insert(key, vec![val]);
    }
    parse::parse_file(Path::new(&opts.file), &mut rules)?;

    let targets = if opts.targets.is_empty() {
        vec![default_target(&rules)?]
    } else {
        opts.targets.clone()
    };

    // A synthetic root rule, named by the empty string, depends on every
    // requested target; the build then has a single entry point.
    let mut root = Rule::default();
    root.targets.push(Pattern::literal(""));
    root.prereqs = targets.clone();
    root.attribs.is_virtual = true;
    rules.add(root);

    let rebuild: HashSet<String> = if opts.rebuild {
        targets.into_iter().collect()
    } else {
        HashSet::new()
    };

    let progress = ConsoleProgress::new(opts.quiet);
    let mut options = work::Options {
        parallelism: opts.parallelism,
        rebuild_all: opts.rebuild_all,
        rebuild,
        dry_run: true,
    };

    if opts.dry_run || opts.interactive {
        if !build(&rules, &options, &progress)? {
            return Ok(1);
        }
        if opts.dry_run {
            return Ok(0);
        }
        if !proceed()? {
            return Ok(0);
        }
    }

    options.dry_run = false;
    Ok(if build(&rules, &options, &progress)? {
        0
    } else {
        1
    })
}

fn build(rules: &RuleSet, options: &work::Options, progress: &ConsoleProgress) -> Result<bool> {
    let mut graph = graph::build(rules, "")?;
    let mut work = work::Work::new(rules, &mut graph, options, progress);
    work.run()
}

/// With no targets named, build the first target of the first non-meta
/// rule.
fn default_target(rules: &RuleSet) -> Result<String> {
    for r in &rules.rules {
        if r.is_meta {
            continue;
        }
        if let Some(t) = r.targets.first() {
            return Ok(t.spat.clone());
        }
    }
    bail!("no targets to make");
}

fn proceed() -> Result<bool> {
    print!("Proceed? [y/N] ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    let answer = line.trim();
    Ok(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
}
