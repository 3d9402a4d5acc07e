//! Build scheduler: walks the graph bottom up, deciding what is out of
//! date and running recipes with bounded parallelism.
//!
//! Each node goes Ready -> Started -> one of {Done, Nop, Failed}.  A node
//! is picked up exactly once, and only after every prerequisite reached a
//! terminal state.  A failed prerequisite suppresses the dependent's recipe
//! but unrelated branches keep going.

use crate::densemap::DenseMap;
use crate::expand::{self, Vars};
use crate::graph::{self, Graph, NodeId};
use crate::progress::ConsoleProgress;
use crate::rules::{Rule, RuleSet};
use crate::signal;
use crate::task::{FinishedTask, Invocation, Runner};
use anyhow::{bail, Result};
use std::collections::{HashSet, VecDeque};

pub struct Options {
    pub parallelism: usize,
    /// -a: rebuild regardless of timestamps.
    pub rebuild_all: bool,
    /// -r: rebuild these targets regardless of timestamps.
    pub rebuild: HashSet<String>,
    /// -n: echo recipes, run nothing, report success.
    pub dry_run: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BuildState {
    Ready,
    Started,
    Done,
    Nop,
    Failed,
}

impl BuildState {
    fn terminal(self) -> bool {
        matches!(self, BuildState::Done | BuildState::Nop | BuildState::Failed)
    }
}

/// Tracks progress through the build.  A node in play is in exactly one
/// place: waiting on prerequisites (`want`), waiting for pickup (`ready`),
/// or finished (its state is terminal).
struct Plan {
    want: HashSet<NodeId>,
    ready: VecDeque<NodeId>,
    seen: HashSet<NodeId>,
}

impl Plan {
    fn new() -> Plan {
        Plan {
            want: HashSet::new(),
            ready: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    /// Seed the plan with a node and, recursively, its prerequisites.
    fn add(&mut self, graph: &Graph, id: NodeId) {
        if !self.seen.insert(id) {
            return;
        }
        let mut leaf = true;
        for e in &graph.nodes.get(id).prereqs {
            if let Some(v) = e.v {
                leaf = false;
                self.add(graph, v);
            }
        }
        if leaf {
            self.ready.push_back(id);
        } else {
            self.want.insert(id);
        }
    }

    fn done(&self) -> bool {
        self.want.is_empty() && self.ready.is_empty()
    }
}

pub struct Work<'a> {
    rules: &'a RuleSet,
    graph: &'a mut Graph,
    options: &'a Options,
    progress: &'a ConsoleProgress,
    states: DenseMap<NodeId, BuildState>,
    plan: Plan,
    runner: Runner,
    failures: usize,
}

impl<'a> Work<'a> {
    pub fn new(
        rules: &'a RuleSet,
        graph: &'a mut Graph,
        options: &'a Options,
        progress: &'a ConsoleProgress,
    ) -> Work<'a> {
        let states = DenseMap::new_sized(graph.nodes.len(), BuildState::Ready);
        Work {
            rules,
            graph,
            options,
            progress,
            states,
            plan: Plan::new(),
            runner: Runner::new(options.parallelism),
            failures: 0,
        }
    }

    /// Bring the graph's root up to date.  Ok(true) means every recipe that
    /// ran succeeded.
    pub fn run(&mut self) -> Result<bool> {
        let root = self.graph.root;
        self.plan.add(self.graph, root);

        loop {
            while self.runner.can_start_more() && !signal::interrupted() {
                let id = match self.plan.ready.pop_front() {
                    Some(id) => id,
                    None => break,
                };
                if !self.advance(id)? {
                    // An exclusive recipe wants the place to itself; retry
                    // once the runner drains.
                    self.plan.ready.push_front(id);
                    break;
                }
            }

            if self.runner.is_running() {
                let fin = self.runner.wait();
                self.finish_task(fin)?;
                continue;
            }

            if signal::interrupted() {
                bail!("interrupted");
            }
            if self.plan.done() {
                break;
            }
            if self.plan.ready.is_empty() {
                bail!("no runnable work but targets remain; this is a bug");
            }
        }

        Ok(self.failures == 0)
    }

    /// Decide what to do with a ready node: fail it along with its failed
    /// prerequisites, settle it as Nop, or start its recipe.  Returns false
    /// when an exclusive recipe must wait for the runner to drain.
    fn advance(&mut self, id: NodeId) -> Result<bool> {
        let rules = self.rules;
        let (name, children, rule_idx) = {
            let node = self.graph.nodes.get(id);
            (
                node.name.clone(),
                node.prereqs.iter().filter_map(|e| e.v).collect::<Vec<_>>(),
                node.rule,
            )
        };
        if children
            .iter()
            .any(|&v| *self.states.get(v) == BuildState::Failed)
        {
            self.finalize(id, BuildState::Failed);
            return Ok(true);
        }

        let k = match rule_idx {
            Some(k) => k,
            None => {
                // Nothing to apply: the target must already exist.
                if !self.graph.nodes.get(id).exists {
                    let cwd = std::env::current_dir()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default();
                    bail!("don't know how to make {} (in {})", name, cwd);
                }
                self.finalize(id, BuildState::Nop);
                return Ok(true);
            }
        };
        let rule = &rules.rules[k];

        if !rule.attribs.is_virtual {
            let (mtime, exists) = graph::stat(&name)?;
            let node = self.graph.nodes.get_mut(id);
            node.mtime = mtime;
            node.exists = exists;
        }

        if self.uptodate(id, rule) || rule.recipe.is_empty() {
            let state = if rule.attribs.update {
                BuildState::Done
            } else {
                BuildState::Nop
            };
            self.finalize(id, state);
            return Ok(true);
        }

        let exclusive = rule.attribs.exclusive;
        if exclusive && !self.runner.can_start_exclusive() {
            return Ok(false);
        }

        let inv = self.invocation(id, k);
        if !rule.attribs.quiet {
            self.progress.recipe(&inv.text);
        }
        if self.options.dry_run {
            self.finalize(id, BuildState::Done);
            return Ok(true);
        }
        *self.states.get_mut(id) = BuildState::Started;
        self.runner.start(id, inv, exclusive);
        Ok(true)
    }

    /// Out-of-date determination per rule and timestamps.  Nop
    /// prerequisites did not rebuild and so do not count against us.
    fn uptodate(&self, id: NodeId, rule: &Rule) -> bool {
        let node = self.graph.nodes.get(id);
        if self.options.rebuild_all || self.options.rebuild.contains(&node.name) {
            return false;
        }
        if rule.attribs.is_virtual {
            return false;
        }
        if !node.exists {
            return false;
        }
        for e in &node.prereqs {
            let v = match e.v {
                Some(v) => v,
                None => continue,
            };
            if *self.states.get(v) == BuildState::Done {
                return false;
            }
            let child = self.graph.nodes.get(v);
            match (child.mtime, node.mtime) {
                (Some(cm), Some(um)) => {
                    if cm > um {
                        return false;
                    }
                }
                (Some(_), None) => return false,
                _ => {}
            }
        }
        true
    }

    /// Build the recipe environment (target, prereq, stem or stem0..stemN)
    /// and expand the recipe against it.
    fn invocation(&self, id: NodeId, k: usize) -> Invocation {
        let rule = &self.rules.rules[k];
        let node = self.graph.nodes.get(id);

        let mut vars = Vars::new();
        vars.insert("target".to_string(), vec![node.name.clone()]);

        let mut prereqs = Vec::new();
        let mut stem = String::new();
        let mut matches: Vec<String> = Vec::new();
        for e in &node.prereqs {
            if e.rule != k {
                continue;
            }
            if stem.is_empty() {
                stem = e.stem.clone();
            }
            if matches.is_empty() {
                matches = e.matches.clone();
            }
            if let Some(v) = e.v {
                prereqs.push(self.graph.nodes.get(v).name.clone());
            }
        }
        vars.insert("prereq".to_string(), prereqs);

        if rule.attribs.regex {
            for (i, m) in matches.iter().enumerate() {
                vars.insert(format!("stem{}", i), vec![m.clone()]);
            }
        } else if rule.is_meta {
            vars.insert("stem".to_string(), vec![stem]);
        }

        let text = expand::expand_recipe(&rule.recipe, &vars);
        let argv = if rule.shell.is_empty() {
            vec!["sh".to_string()]
        } else {
            rule.shell.clone()
        };
        Invocation { argv, text }
    }

    /// Record a task's result: apply the E and D attributes, refresh the
    /// target's timestamp, and wake dependents.
    fn finish_task(&mut self, fin: FinishedTask) -> Result<()> {
        let rules = self.rules;
        let id = fin.id;
        let (name, rule_idx) = {
            let node = self.graph.nodes.get(id);
            (node.name.clone(), node.rule)
        };
        let rule = rule_idx.map(|k| &rules.rules[k]);

        let mut state = if fin.success {
            BuildState::Done
        } else {
            BuildState::Failed
        };
        if !fin.success {
            if let Some(rule) = rule {
                if rule.attribs.non_stop {
                    self.progress
                        .note(&format!("mk: recipe for {} failed (continuing)", name));
                    state = BuildState::Done;
                } else {
                    self.progress.note(&format!("mk: recipe for {} failed", name));
                    if rule.attribs.del_failed {
                        for t in &rule.targets {
                            if t.rpat.is_none() && std::fs::remove_file(&t.spat).is_ok() {
                                self.progress.note(&format!("mk: removed {}", t.spat));
                            }
                        }
                    }
                }
            }
        }
        if state == BuildState::Failed {
            self.failures += 1;
        }

        let virtual_target = rule.map_or(false, |r| r.attribs.is_virtual);
        if !virtual_target {
            let (mtime, exists) = graph::stat(&name)?;
            let node = self.graph.nodes.get_mut(id);
            node.mtime = mtime;
            node.exists = exists;
        }

        self.finalize(id, state);
        Ok(())
    }

    /// Settle a node's terminal state and move any dependent whose
    /// prerequisites are now all terminal onto the ready queue.
    fn finalize(&mut self, id: NodeId, state: BuildState) {
        *self.states.get_mut(id) = state;
        let deps: Vec<NodeId> = self.graph.nodes.get(id).dependents.clone();
        for d in deps {
            if !self.plan.want.contains(&d) {
                continue;
            }
            let all_terminal = self
                .graph
                .nodes
                .get(d)
                .prereqs
                .iter()
                .filter_map(|e| e.v)
                .all(|v| self.states.get(v).terminal());
            if all_terminal {
                self.plan.want.remove(&d);
                self.plan.ready.push_back(d);
            }
        }
    }
}
