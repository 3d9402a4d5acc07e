//! The dependency graph.
//!
//! Nodes are targets, held in an arena and addressed by `NodeId`; edges
//! point from a node to one prerequisite under one rule.  Building the
//! graph recursively matches targets against concrete rules, then against
//! meta-rules, instantiating prerequisites with the matched stem or capture
//! groups.  Three passes then prune it: cycles are fatal, vacuous meta
//! branches drop away, and ambiguous recipes either resolve in favor of a
//! concrete rule or are reported.

use crate::densemap::{DenseMap, Index};
use crate::expand::{self, Vars};
use crate::rules::RuleSet;
use anyhow::{bail, Result};
use std::collections::HashMap;
use std::time::SystemTime;

/// How many times one rule may be applied along a single recursion path.
const MAX_RULE_CNT: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl From<usize> for NodeId {
    fn from(u: usize) -> NodeId {
        NodeId(u as u32)
    }
}
impl Index for NodeId {
    fn index(&self) -> usize {
        self.0 as usize
    }
}

/// An edge towards one prerequisite (or none, for a rule with an empty
/// prereq list) under a given rule.
#[derive(Debug)]
pub struct Edge {
    pub v: Option<NodeId>,
    /// Index into the rule set.
    pub rule: usize,
    /// Stem matched by a suffix meta-rule.
    pub stem: String,
    /// Capture groups matched by a regex meta-rule, whole match first.
    pub matches: Vec<String>,
    /// Marked during pruning, then dropped.
    togo: bool,
}

#[derive(Default, Debug)]
struct NodeFlags {
    cycle: bool,
    ready: bool,
    probable: bool,
    vacuous: bool,
}

#[derive(Debug)]
pub struct Node {
    pub name: String,
    /// Custom out-of-date comparator argv from a P attribute.
    /// TODO: consult this instead of timestamps when deciding staleness.
    #[allow(dead_code)]
    pub prog: Vec<String>,
    pub mtime: Option<SystemTime>,
    pub exists: bool,
    pub prereqs: Vec<Edge>,
    /// The rule chosen to build this node, settled after pruning.
    pub rule: Option<usize>,
    /// Nodes with an edge towards this one.
    pub dependents: Vec<NodeId>,
    flags: NodeFlags,
}

#[derive(Debug)]
pub struct Graph {
    pub nodes: DenseMap<NodeId, Node>,
    by_name: HashMap<String, NodeId>,
    pub root: NodeId,
}

/// Stat a target name: (mtime, exists).  A missing file is not an error.
pub fn stat(name: &str) -> Result<(Option<SystemTime>, bool)> {
    match std::fs::metadata(name) {
        Ok(meta) => Ok((meta.modified().ok(), true)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok((None, false)),
        Err(err) => bail!("stat {}: {}", name, err),
    }
}

/// Build and prune the dependency graph rooted at `target`.
pub fn build(rules: &RuleSet, target: &str) -> Result<Graph> {
    let mut g = Graph {
        nodes: DenseMap::new(),
        by_name: HashMap::new(),
        root: NodeId::from(0),
    };
    let mut rulecnt = vec![0usize; rules.rules.len()];
    g.root = apply_rules(rules, &mut g, target, &mut rulecnt)?;
    g.nodes.get_mut(g.root).flags.probable = true;

    g.check_cycles(g.root)?;
    g.vacuous(rules, g.root);
    let mut visited = vec![false; g.nodes.len()];
    g.ambiguous(rules, g.root, &mut visited)?;
    g.select_rules(rules);
    g.link_dependents();
    Ok(g)
}

/// Recursively match a target against the rule set, creating its node and
/// the nodes of everything it depends on.
fn apply_rules(
    rules: &RuleSet,
    g: &mut Graph,
    target: &str,
    rulecnt: &mut Vec<usize>,
) -> Result<NodeId> {
    if let Some(&id) = g.by_name.get(target) {
        return Ok(id);
    }
    let id = g.new_node(target)?;

    // Concrete rules naming this target.
    if let Some(ks) = rules.target_rules.get(target) {
        for &k in ks {
            if rulecnt[k] > MAX_RULE_CNT {
                continue;
            }
            let r = &rules.rules[k];
            if r.is_meta {
                continue;
            }
            if r.recipe.is_empty() && r.prereqs.is_empty() {
                continue;
            }
            {
                let node = g.nodes.get_mut(id);
                node.flags.probable = true;
                if !r.command.is_empty() && node.prog.is_empty() {
                    node.prog = r.command.clone();
                }
            }
            rulecnt[k] += 1;
            if r.prereqs.is_empty() {
                g.nodes.get_mut(id).prereqs.push(Edge {
                    v: None,
                    rule: k,
                    stem: String::new(),
                    matches: Vec::new(),
                    togo: false,
                });
            } else {
                for p in &r.prereqs {
                    let v = apply_rules(rules, g, p, rulecnt)?;
                    g.nodes.get_mut(id).prereqs.push(Edge {
                        v: Some(v),
                        rule: k,
                        stem: String::new(),
                        matches: Vec::new(),
                        togo: false,
                    });
                }
            }
            rulecnt[k] -= 1;
        }
    }

    // Meta-rules, in source order.
    for k in 0..rules.rules.len() {
        if rulecnt[k] > MAX_RULE_CNT {
            continue;
        }
        let r = &rules.rules[k];
        if !r.is_meta {
            continue;
        }
        if r.recipe.is_empty() && r.prereqs.is_empty() {
            continue;
        }
        if r.attribs.non_virtual && !g.nodes.get(id).exists {
            continue;
        }
        for pat in &r.targets {
            let mat = match pat.matches(target) {
                Some(m) => m,
                None => continue,
            };
            let (stem, matches) = if r.attribs.regex {
                (String::new(), mat)
            } else if pat.is_suffix {
                (mat.get(1).cloned().unwrap_or_default(), Vec::new())
            } else {
                (String::new(), Vec::new())
            };

            rulecnt[k] += 1;
            if r.prereqs.is_empty() {
                g.nodes.get_mut(id).prereqs.push(Edge {
                    v: None,
                    rule: k,
                    stem,
                    matches,
                    togo: false,
                });
            } else {
                let mut prereq_names = Vec::new();
                if r.attribs.regex {
                    let mut stemvars = Vars::new();
                    for (i, m) in matches.iter().enumerate() {
                        stemvars.insert(format!("stem{}", i), vec![m.clone()]);
                    }
                    for p in &r.prereqs {
                        prereq_names.extend(expand::expand_sigils(p, &stemvars));
                    }
                } else {
                    for p in &r.prereqs {
                        prereq_names.push(expand::expand_suffixes(p, &stem));
                    }
                }
                for p in &prereq_names {
                    let v = apply_rules(rules, g, p, rulecnt)?;
                    g.nodes.get_mut(id).prereqs.push(Edge {
                        v: Some(v),
                        rule: k,
                        stem: stem.clone(),
                        matches: matches.clone(),
                        togo: false,
                    });
                }
            }
            rulecnt[k] -= 1;
        }
    }

    Ok(id)
}

impl Graph {
    fn new_node(&mut self, name: &str) -> Result<NodeId> {
        let (mtime, exists) = stat(name)?;
        let id = self.nodes.push(Node {
            name: name.to_string(),
            prog: Vec::new(),
            mtime,
            exists,
            prereqs: Vec::new(),
            rule: None,
            dependents: Vec::new(),
            flags: NodeFlags::default(),
        });
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// Depth-first walk with the cycle flag set on entry and cleared on
    /// exit; meeting it again on a node that still has prereqs is fatal.
    fn check_cycles(&mut self, id: NodeId) -> Result<()> {
        {
            let node = self.nodes.get(id);
            if node.flags.cycle && !node.prereqs.is_empty() {
                bail!("dependency cycle through {}", node.name);
            }
        }
        self.nodes.get_mut(id).flags.cycle = true;
        let n = self.nodes.get(id).prereqs.len();
        for i in 0..n {
            if let Some(v) = self.nodes.get(id).prereqs[i].v {
                self.check_cycles(v)?;
            }
        }
        self.nodes.get_mut(id).flags.cycle = false;
        Ok(())
    }

    /// A node is vacuous when nothing makes it plausible: no concrete rule
    /// matched it, no file backs it, and every meta edge leads nowhere.
    /// Vacuous meta edges are pruned, but a rule keeps either all of its
    /// edges or none of them.
    fn vacuous(&mut self, rules: &RuleSet, id: NodeId) -> bool {
        if self.nodes.get(id).flags.ready {
            return self.nodes.get(id).flags.vacuous;
        }
        self.nodes.get_mut(id).flags.ready = true;

        let mut vac = {
            let node = self.nodes.get(id);
            !node.flags.probable && !node.exists
        };
        let n = self.nodes.get(id).prereqs.len();
        for i in 0..n {
            let (v, rule) = {
                let e = &self.nodes.get(id).prereqs[i];
                (e.v, e.rule)
            };
            // Descend through every edge; only meta edges are prunable.
            let child_vacuous = match v {
                Some(v) => self.vacuous(rules, v),
                None => false,
            };
            if child_vacuous && rules.rules[rule].is_meta {
                self.nodes.get_mut(id).prereqs[i].togo = true;
            } else {
                vac = false;
            }
        }

        // Keep-or-kill per rule: if any edge of a rule survives, keep all
        // of that rule's edges.
        for i in 0..n {
            if !self.nodes.get(id).prereqs[i].togo {
                continue;
            }
            let rule = self.nodes.get(id).prereqs[i].rule;
            let any_kept = self
                .nodes
                .get(id)
                .prereqs
                .iter()
                .any(|e| e.rule == rule && !e.togo);
            if any_kept {
                for e in self.nodes.get_mut(id).prereqs.iter_mut() {
                    if e.rule == rule {
                        e.togo = false;
                    }
                }
            }
        }

        self.nodes.get_mut(id).prereqs.retain(|e| !e.togo);
        self.nodes.get_mut(id).flags.vacuous = vac;
        vac
    }

    /// Resolve competing recipes: concrete beats meta; equivalent recipes
    /// coexist; anything else is a fatal ambiguity.
    fn ambiguous(&mut self, rules: &RuleSet, id: NodeId, visited: &mut Vec<bool>) -> Result<()> {
        if visited[id.index()] {
            return Ok(());
        }
        visited[id.index()] = true;

        let n = self.nodes.get(id).prereqs.len();
        let mut le: Option<usize> = None;
        for i in 0..n {
            if let Some(v) = self.nodes.get(id).prereqs[i].v {
                self.ambiguous(rules, v, visited)?;
            }
            if self.nodes.get(id).prereqs[i].togo {
                continue;
            }
            let ri_idx = self.nodes.get(id).prereqs[i].rule;
            if rules.rules[ri_idx].recipe.is_empty() {
                continue;
            }
            let j = match le {
                None => {
                    le = Some(i);
                    continue;
                }
                Some(j) => j,
            };
            let rj_idx = self.nodes.get(id).prereqs[j].rule;
            if rj_idx == ri_idx {
                continue;
            }
            let rj = &rules.rules[rj_idx];
            let ri = &rules.rules[ri_idx];
            if rj.equiv_recipe(ri) {
                continue;
            }
            if rj.is_meta && !ri.is_meta {
                self.mark_rule_togo(id, rj_idx);
                le = Some(i);
            } else if !rj.is_meta && ri.is_meta {
                self.mark_rule_togo(id, ri_idx);
            } else {
                bail!(
                    "ambiguous recipes for {}: rule at {}:{} vs rule at {}:{}",
                    self.nodes.get(id).name,
                    rj.file,
                    rj.line,
                    ri.file,
                    ri.line
                );
            }
        }
        self.nodes.get_mut(id).prereqs.retain(|e| !e.togo);
        Ok(())
    }

    fn mark_rule_togo(&mut self, id: NodeId, rule: usize) {
        for e in self.nodes.get_mut(id).prereqs.iter_mut() {
            if e.rule == rule {
                e.togo = true;
            }
        }
    }

    /// Settle each node's rule: the first edge with a recipe wins, falling
    /// back to the first edge at all.
    fn select_rules(&mut self, rules: &RuleSet) {
        let ids: Vec<NodeId> = self.nodes.ids().collect();
        for id in ids {
            let choice = {
                let node = self.nodes.get(id);
                let mut choice = node.prereqs.first().map(|e| e.rule);
                for e in &node.prereqs {
                    if !rules.rules[e.rule].recipe.is_empty() {
                        choice = Some(e.rule);
                        break;
                    }
                }
                choice
            };
            self.nodes.get_mut(id).rule = choice;
        }
    }

    fn link_dependents(&mut self) {
        let ids: Vec<NodeId> = self.nodes.ids().collect();
        for u in ids {
            let children: Vec<NodeId> = self
                .nodes
                .get(u)
                .prereqs
                .iter()
                .filter_map(|e| e.v)
                .collect();
            for v in children {
                let deps = &mut self.nodes.get_mut(v).dependents;
                if !deps.contains(&u) {
                    deps.push(u);
                }
            }
        }
    }
}
