//! The rule model: target patterns, rule attributes, rules, and the rule
//! set a parsed mkfile produces.  Rule order is source order; it decides the
//! default target and breaks ties between ambiguous recipes.

use crate::expand::{self, Vars};
use crate::lex::{Token, TokenKind};
use anyhow::{bail, Result};
use regex::Regex;
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct Attribs {
    /// D: delete targets when the recipe fails.
    pub del_failed: bool,
    /// E: keep building when the recipe fails.
    pub non_stop: bool,
    /// N: treat the target as updated even if the recipe left its
    /// timestamp alone.
    pub forced_timestamp: bool,
    /// n: meta-rule that only matches names present on disk.
    pub non_virtual: bool,
    /// Q: don't echo the recipe.
    pub quiet: bool,
    /// R: targets are regular expressions.
    pub regex: bool,
    /// U: treat the targets as updated.
    pub update: bool,
    /// V: target is not backed by a file.
    pub is_virtual: bool,
    /// X: never run concurrently with any other recipe.
    pub exclusive: bool,
}

/// A target or prerequisite specifier.
#[derive(Debug, Clone)]
pub struct Pattern {
    /// Suffix (`%`) pattern, defining $stem on a match.
    pub is_suffix: bool,
    /// The pattern as written.
    pub spat: String,
    /// Compiled form for suffix and regex patterns.
    pub rpat: Option<Regex>,
}

/// The anchored regex a suffix pattern LEFT%RIGHT matches with, also used
/// for namelist substitution.
pub fn suffix_regex(left: &str, right: &str) -> Regex {
    let pat = format!("^{}(.*){}$", regex::escape(left), regex::escape(right));
    Regex::new(&pat).unwrap()
}

impl Pattern {
    pub fn literal(s: &str) -> Pattern {
        Pattern {
            is_suffix: false,
            spat: s.to_string(),
            rpat: None,
        }
    }

    pub fn suffix(s: &str, left: &str, right: &str) -> Pattern {
        Pattern {
            is_suffix: true,
            spat: s.to_string(),
            rpat: Some(suffix_regex(left, right)),
        }
    }

    pub fn regex(s: &str) -> Result<Pattern> {
        let rpat = match Regex::new(&format!("^{}$", s)) {
            Ok(re) => re,
            Err(err) => bail!("invalid regular expression {:?}: {}", s, err),
        };
        Ok(Pattern {
            is_suffix: false,
            spat: s.to_string(),
            rpat: Some(rpat),
        })
    }

    /// Match a target name.  Literal patterns yield an empty match list;
    /// compiled patterns yield the full ordered capture list, whole match
    /// first.
    pub fn matches(&self, target: &str) -> Option<Vec<String>> {
        match &self.rpat {
            Some(re) => re.captures(target).map(|caps| {
                caps.iter()
                    .map(|m| m.map_or(String::new(), |m| m.as_str().to_string()))
                    .collect()
            }),
            None => (target == self.spat).then(Vec::new),
        }
    }
}

/// A single rule.
#[derive(Debug, Clone, Default)]
pub struct Rule {
    pub targets: Vec<Pattern>,
    pub attribs: Attribs,
    /// Unexpanded prerequisite strings, instantiated per match for
    /// meta-rules.
    pub prereqs: Vec<String>,
    /// Alternate interpreter argv from the S attribute.
    pub shell: Vec<String>,
    /// Out-of-date comparator argv from the P attribute.
    pub command: Vec<String>,
    pub recipe: String,
    pub is_meta: bool,
    pub file: String,
    pub line: usize,
}

impl Rule {
    /// Recipes are equivalent when both the text and the interpreter agree.
    pub fn equiv_recipe(&self, other: &Rule) -> bool {
        self.recipe == other.recipe && self.shell == other.shell
    }

    /// Consume attribute words character by character.  P and S swallow the
    /// remainder of the attribute list as an argv.  Err carries the
    /// offending character.
    pub fn parse_attribs(&mut self, words: &[String]) -> Result<(), char> {
        for (i, word) in words.iter().enumerate() {
            for (pos, c) in word.char_indices() {
                match c {
                    'D' => self.attribs.del_failed = true,
                    'E' => self.attribs.non_stop = true,
                    'N' => self.attribs.forced_timestamp = true,
                    'n' => self.attribs.non_virtual = true,
                    'Q' => self.attribs.quiet = true,
                    'R' => self.attribs.regex = true,
                    'U' => self.attribs.update = true,
                    'V' => self.attribs.is_virtual = true,
                    'X' => self.attribs.exclusive = true,
                    'P' => {
                        let rest = &word[pos + c.len_utf8()..];
                        if !rest.is_empty() {
                            self.command.push(rest.to_string());
                        }
                        self.command.extend(words[i + 1..].iter().cloned());
                        return Ok(());
                    }
                    'S' => {
                        let rest = &word[pos + c.len_utf8()..];
                        if !rest.is_empty() {
                            self.shell.push(rest.to_string());
                        }
                        self.shell.extend(words[i + 1..].iter().cloned());
                        return Ok(());
                    }
                    _ => return Err(c),
                }
            }
        }
        Ok(())
    }
}

/// Rules and variables accumulated by parsing, plus an index from literal
/// target names to the rules that produce them.
#[derive(Default)]
pub struct RuleSet {
    pub vars: Vars,
    pub rules: Vec<Rule>,
    pub target_rules: HashMap<String, Vec<usize>>,
}

impl RuleSet {
    pub fn new() -> RuleSet {
        RuleSet::default()
    }

    pub fn add(&mut self, rule: Rule) {
        let k = self.rules.len();
        for t in &rule.targets {
            if t.rpat.is_none() {
                self.target_rules
                    .entry(t.spat.clone())
                    .or_default()
                    .push(k);
            }
        }
        self.rules.push(rule);
    }

    /// Perform an assignment statement: validate the name, coalesce value
    /// tokens (non-word tokens glue onto the preceding value), expand with
    /// backticks enabled, and store the flattened list.
    pub fn execute_assignment(&mut self, tokens: &[Token]) -> Result<()> {
        let assignee = tokens[0].text;
        if !is_valid_var_name(assignee) {
            bail!("{:?} is not a valid variable name", assignee);
        }

        let mut inputs: Vec<String> = Vec::new();
        let mut prev_word = true;
        for t in &tokens[1..] {
            let is_word = t.kind == TokenKind::Word;
            if is_word && prev_word {
                inputs.push(t.text.to_string());
            } else {
                match inputs.last_mut() {
                    Some(last) => last.push_str(t.text),
                    None => inputs.push(t.text.to_string()),
                }
            }
            prev_word = is_word;
        }

        let mut vals = Vec::new();
        for input in &inputs {
            vals.extend(expand::expand_words(input, &self.vars, true)?);
        }
        self.vars.insert(assignee.to_string(), vals);
        Ok(())
    }
}

pub fn is_valid_var_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}
