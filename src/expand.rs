//! Variable and quote expansion.
//!
//! Two entry points: `expand_words` turns one input string into a list of
//! shell-field-equivalent words (rule context), while `expand_recipe` yields
//! a single flat string (recipe context).  Word expansion understands
//! quoting, escapes, backticks and `$` sigils; recipe expansion only `$` and
//! backslash escapes.

use crate::process;
use crate::rules::suffix_regex;
use anyhow::Result;
use std::collections::HashMap;

/// Variable values are ordered lists of strings.
pub type Vars = HashMap<String, Vec<String>>;

/// Expand a word into a list of words, substituting variables and handling
/// quotes.  Backtick substitution runs a subprocess and is only enabled in
/// contexts that allow it.
pub fn expand_words(input: &str, vars: &Vars, backticks: bool) -> Result<Vec<String>> {
    let mut parts: Vec<String> = Vec::new();
    let mut word = String::new();
    let mut rest = input;

    while let Some(i) = rest.find(|c: char| matches!(c, '"' | '\'' | '`' | '$' | '\\')) {
        word.push_str(&rest[..i]);
        let c = rest.as_bytes()[i] as char;
        rest = &rest[i + 1..];
        match c {
            '\\' => match rest.chars().next() {
                // Escaped whitespace joins into the word; any other escape
                // is kept for the shell to interpret.
                Some(e @ (' ' | '\t' | '\n')) => {
                    word.push(e);
                    rest = &rest[e.len_utf8()..];
                }
                Some(e) => {
                    word.push('\\');
                    word.push(e);
                    rest = &rest[e.len_utf8()..];
                }
                None => word.push('\\'),
            },
            '\'' => match rest.find('\'') {
                Some(j) => {
                    word.push_str(&rest[..j]);
                    rest = &rest[j + 1..];
                }
                None => {
                    // Unterminated quote extends to end of input.
                    word.push_str(rest);
                    rest = "";
                }
            },
            '"' => {
                let (interior, after) = split_double_quoted(rest);
                let inner = expand_words(interior, vars, backticks)?;
                word.push_str(&inner.join(" "));
                rest = after;
            }
            '`' => {
                let (cmd, after) = match rest.find('`') {
                    Some(j) => (&rest[..j], &rest[j + 1..]),
                    None => (rest, ""),
                };
                if backticks {
                    let out = process::run("sh", &[], cmd, true)?;
                    let words = out.stdout.split_whitespace().map(str::to_string).collect();
                    splice(&mut parts, &mut word, words);
                } else {
                    word.push('`');
                    word.push_str(cmd);
                    if !after.is_empty() || rest.len() != cmd.len() {
                        word.push('`');
                    }
                }
                rest = after;
            }
            _ => {
                let (items, consumed) = expand_sigil(rest, vars);
                splice(&mut parts, &mut word, items);
                rest = &rest[consumed..];
            }
        }
    }

    word.push_str(rest);
    if !word.is_empty() {
        parts.push(word);
    }
    Ok(parts)
}

/// Expand only `$` sigils, composing lists into words.  Used when
/// instantiating regex meta-rule prerequisites against stem0..stemN.
pub fn expand_sigils(input: &str, vars: &Vars) -> Vec<String> {
    let mut parts = Vec::new();
    let mut word = String::new();
    let mut rest = input;
    while let Some(i) = rest.find('$') {
        word.push_str(&rest[..i]);
        rest = &rest[i + 1..];
        let (items, consumed) = expand_sigil(rest, vars);
        splice(&mut parts, &mut word, items);
        rest = &rest[consumed..];
    }
    word.push_str(rest);
    if !word.is_empty() {
        parts.push(word);
    }
    parts
}

/// Expand a recipe into a single string, preserving layout.  Quotes are left
/// for the shell; only `$` sigils and backslash escapes are interpreted, and
/// list values are joined with single spaces.
pub fn expand_recipe(input: &str, vars: &Vars) -> String {
    let mut out = String::new();
    let mut rest = input;
    while let Some(i) = rest.find(|c: char| c == '$' || c == '\\') {
        out.push_str(&rest[..i]);
        let c = rest.as_bytes()[i] as char;
        rest = &rest[i + 1..];
        if c == '\\' {
            match rest.chars().next() {
                Some('$') => {
                    out.push('$');
                    rest = &rest[1..];
                }
                Some(e) => {
                    out.push('\\');
                    out.push(e);
                    rest = &rest[e.len_utf8()..];
                }
                None => out.push('\\'),
            }
        } else {
            let (items, consumed) = expand_sigil(rest, vars);
            out.push_str(&items.join(" "));
            rest = &rest[consumed..];
        }
    }
    out.push_str(rest);
    out
}

/// Replace each unescaped `%` with the stem; `\%` yields a literal `%`.
pub fn expand_suffixes(input: &str, stem: &str) -> String {
    let mut out = String::new();
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '%' => out.push_str(stem),
            '\\' if chars.peek() == Some(&'%') => {
                chars.next();
                out.push('%');
            }
            _ => out.push(c),
        }
    }
    out
}

/// Expand the text following a `$`.  Returns the resulting word list and the
/// number of input bytes consumed.  Undefined variables are preserved as
/// written.
fn expand_sigil(input: &str, vars: &Vars) -> (Vec<String>, usize) {
    match input.chars().next() {
        Some('$') => (vec!["$".to_string()], 1),
        Some('{') => match input.find('}') {
            None => (vec![format!("${}", input)], input.len()),
            Some(j) => {
                let body = &input[1..j];
                let consumed = j + 1;
                if let Some((name, spec)) = body.split_once(':') {
                    if let Some(sub) = namelist(name, spec, vars) {
                        return (sub, consumed);
                    }
                }
                match vars.get(body) {
                    Some(vals) => (vals.clone(), consumed),
                    None => (vec![format!("${{{}}}", body)], consumed),
                }
            }
        },
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {
            let end = input
                .char_indices()
                .find(|&(_, c)| !(c == '_' || c.is_ascii_alphanumeric()))
                .map(|(i, _)| i)
                .unwrap_or(input.len());
            let name = &input[..end];
            match vars.get(name) {
                Some(vals) => (vals.clone(), end),
                None => (vec![format!("${}", name)], end),
            }
        }
        // A `$` followed by nothing variable-like stands for itself.
        _ => (vec!["$".to_string()], 0),
    }
}

/// `${NAME:A%B=C%D}`: rewrite each element of NAME matching A<stem>B as
/// C<stem>D; elements that do not match pass through.
fn namelist(name: &str, spec: &str, vars: &Vars) -> Option<Vec<String>> {
    let (pat, subst) = spec.split_once('=')?;
    let vals = vars.get(name)?;
    let (a, b) = pat.split_once('%').unwrap_or((pat, ""));
    let (c, d) = subst.split_once('%').unwrap_or((subst, ""));
    let re = suffix_regex(a, b);
    Some(
        vals.iter()
            .map(|v| match re.captures(v) {
                Some(m) => format!("{}{}{}", c, &m[1], d),
                None => v.clone(),
            })
            .collect(),
    )
}

/// Splice an expanded list into the word being built: the first element
/// continues the current word, the last becomes the new tail, and anything
/// between stands alone.
fn splice(parts: &mut Vec<String>, word: &mut String, mut items: Vec<String>) {
    if items.is_empty() {
        return;
    }
    items[0].insert_str(0, word);
    *word = match items.pop() {
        Some(last) => last,
        None => return,
    };
    parts.append(&mut items);
}

/// Find the unescaped closing quote, returning (interior, rest-after-quote).
fn split_double_quoted(s: &str) -> (&str, &str) {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += if i + 1 < bytes.len() { 2 } else { 1 },
            b'"' => return (&s[..i], &s[i + 1..]),
            _ => i += 1,
        }
    }
    (s, "")
}
