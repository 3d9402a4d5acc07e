//! Parser for mkfiles.
//!
//! A state machine over the token stream.  Statements take effect as soon
//! as they complete: assignments update the variable table, includes parse
//! recursively in place, rules land in the rule set.  The parser buffers
//! the tokens of one statement at a time.

use crate::expand;
use crate::lex::{Lexer, Token, TokenKind};
use crate::process;
use crate::rules::{Pattern, Rule, RuleSet};
use anyhow::{anyhow, bail, Result};
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    TopLevel,
    EqualsOrTarget,
    Assignment,
    Targets,
    AttrOrPrereq,
    Prereqs,
    Recipe,
    PipeInclude,
    RedirInclude,
}

struct Parser<'a, 'text> {
    rules: &'a mut RuleSet,
    file: &'a str,
    state: State,
    tokenbuf: Vec<Token<'text>>,
    recipe: Option<Token<'text>>,
    include_line: usize,
}

/// Parse a mkfile from disk into the given rule set.  `mkfiledir` names the
/// file's directory for the duration of the parse and is restored after.
pub fn parse_file(path: &Path, rules: &mut RuleSet) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| anyhow!("cannot open {}: {}", path.display(), err))?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.display().to_string(),
        _ => ".".to_string(),
    };
    let saved = rules.vars.insert("mkfiledir".to_string(), vec![dir]);

    let result = parse_into(&text, &path.display().to_string(), rules);

    match saved {
        Some(old) => {
            rules.vars.insert("mkfiledir".to_string(), old);
        }
        None => {
            rules.vars.remove("mkfiledir");
        }
    }
    result
}

/// Parse mkfile text into the given rule set.  `name` labels diagnostics.
pub fn parse_into(text: &str, name: &str, rules: &mut RuleSet) -> Result<()> {
    let mut lexer = Lexer::new(text);
    let mut parser = Parser {
        rules,
        file: name,
        state: State::TopLevel,
        tokenbuf: Vec::new(),
        recipe: None,
        include_line: 0,
    };
    loop {
        // Only in a rule line's tail does `;` begin an inline recipe.
        lexer.allow_inline_recipe(matches!(
            parser.state,
            State::AttrOrPrereq | State::Prereqs
        ));
        let tok = lexer
            .next_token()
            .map_err(|err| anyhow!("{}:{}: {}", name, err.line, err.msg))?;
        match tok {
            Some(tok) => parser.feed(tok)?,
            None => break,
        }
    }
    // A synthetic newline lets a trailing assignment or rule terminate.
    let newline = Token {
        kind: TokenKind::Newline,
        text: "\n",
        line: lexer.line(),
        col: 0,
    };
    parser.feed(newline.clone())?;
    if parser.state == State::Recipe {
        parser.feed(newline)?;
    }
    Ok(())
}

impl<'a, 'text> Parser<'a, 'text> {
    fn feed(&mut self, tok: Token<'text>) -> Result<()> {
        loop {
            match self.state {
                State::TopLevel => match tok.kind {
                    TokenKind::Newline => {}
                    TokenKind::Word => {
                        self.tokenbuf.push(tok);
                        self.state = State::EqualsOrTarget;
                    }
                    TokenKind::PipeInclude => {
                        self.include_line = tok.line;
                        self.state = State::PipeInclude;
                    }
                    TokenKind::RedirInclude => {
                        self.include_line = tok.line;
                        self.state = State::RedirInclude;
                    }
                    _ => return self.unexpected(&tok),
                },
                State::EqualsOrTarget => match tok.kind {
                    TokenKind::Word => {
                        self.tokenbuf.push(tok);
                        self.state = State::Targets;
                    }
                    TokenKind::Colon => {
                        self.tokenbuf.push(tok);
                        self.state = State::AttrOrPrereq;
                    }
                    TokenKind::Assign => self.state = State::Assignment,
                    _ => return self.unexpected(&tok),
                },
                State::Assignment => match tok.kind {
                    TokenKind::Newline => {
                        self.finish_assignment()?;
                        self.state = State::TopLevel;
                    }
                    TokenKind::Recipe => return self.unexpected(&tok),
                    _ => self.tokenbuf.push(tok),
                },
                State::Targets => match tok.kind {
                    TokenKind::Word => self.tokenbuf.push(tok),
                    TokenKind::Colon => {
                        self.tokenbuf.push(tok);
                        self.state = State::AttrOrPrereq;
                    }
                    _ => return self.unexpected(&tok),
                },
                State::AttrOrPrereq => match tok.kind {
                    TokenKind::Newline => self.state = State::Recipe,
                    TokenKind::Word => self.tokenbuf.push(tok),
                    TokenKind::Colon => {
                        self.tokenbuf.push(tok);
                        self.state = State::Prereqs;
                    }
                    TokenKind::Recipe => {
                        self.recipe = Some(tok);
                        self.state = State::Recipe;
                    }
                    _ => return self.unexpected(&tok),
                },
                State::Prereqs => match tok.kind {
                    TokenKind::Newline => self.state = State::Recipe,
                    TokenKind::Word => self.tokenbuf.push(tok),
                    TokenKind::Recipe => {
                        self.recipe = Some(tok);
                        self.state = State::Recipe;
                    }
                    _ => return self.unexpected(&tok),
                },
                State::Recipe => match tok.kind {
                    TokenKind::Newline => {
                        self.finish_rule()?;
                        self.state = State::TopLevel;
                    }
                    TokenKind::Recipe => self.recipe = Some(tok),
                    _ => {
                        // Some other statement begins; the rule is done.
                        self.finish_rule()?;
                        self.state = State::TopLevel;
                        continue;
                    }
                },
                State::PipeInclude => match tok.kind {
                    TokenKind::Newline => {
                        self.finish_pipe_include()?;
                        self.state = State::TopLevel;
                    }
                    _ => self.tokenbuf.push(tok),
                },
                State::RedirInclude => match tok.kind {
                    TokenKind::Newline => {
                        self.finish_redir_include()?;
                        self.state = State::TopLevel;
                    }
                    TokenKind::Word => self.tokenbuf.push(tok),
                    _ => return self.unexpected(&tok),
                },
            }
            return Ok(());
        }
    }

    fn unexpected(&self, tok: &Token) -> Result<()> {
        bail!(
            "{}:{}: unexpected {}",
            self.file,
            tok.line,
            token_desc(tok)
        );
    }

    fn finish_assignment(&mut self) -> Result<()> {
        let toks = std::mem::take(&mut self.tokenbuf);
        let line = toks[0].line;
        self.rules
            .execute_assignment(&toks)
            .map_err(|err| anyhow!("{}:{}: {}", self.file, line, err))
    }

    /// `<|cmd args…`: the first word of each expanded token becomes an argv
    /// element for sh, whose output is parsed in place.
    fn finish_pipe_include(&mut self) -> Result<()> {
        let toks = std::mem::take(&mut self.tokenbuf);
        let mut args = Vec::new();
        for t in &toks {
            let words = expand::expand_words(t.text, &self.rules.vars, false)?;
            if let Some(first) = words.into_iter().next() {
                args.push(first);
            }
        }
        let out = process::run("sh", &args, "", true)
            .map_err(|err| anyhow!("{}:{}: {}", self.file, self.include_line, err))?;
        if !out.success {
            bail!("{}:{}: include command failed", self.file, self.include_line);
        }
        parse_into(&out.stdout, self.file, self.rules)
    }

    /// `<path`: read the file and parse it in place.
    fn finish_redir_include(&mut self) -> Result<()> {
        let toks = std::mem::take(&mut self.tokenbuf);
        let mut text = String::new();
        for t in &toks {
            text.push_str(t.text);
        }
        let words = expand::expand_words(&text, &self.rules.vars, false)?;
        let path = match words.first() {
            Some(p) => p,
            None => bail!("{}:{}: missing include path", self.file, self.include_line),
        };
        parse_file(Path::new(path), self.rules)
            .map_err(|err| anyhow!("{}:{}: {}", self.file, self.include_line, err))
    }

    /// Assemble a rule from the buffered tokens: targets before the first
    /// colon, attributes between two colons when present, prereqs after the
    /// last.  Targets and prereqs expand with backticks enabled.
    fn finish_rule(&mut self) -> Result<()> {
        let toks = std::mem::take(&mut self.tokenbuf);
        let recipe_tok = self.recipe.take();
        if toks.is_empty() {
            return Ok(());
        }
        let line = toks[0].line;

        let colons: Vec<usize> = toks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.kind == TokenKind::Colon)
            .map(|(i, _)| i)
            .collect();
        let first_colon = match colons.first() {
            Some(&i) => i,
            None => bail!("{}:{}: rule is missing ':'", self.file, line),
        };

        let mut rule = Rule {
            file: self.file.to_string(),
            line,
            ..Rule::default()
        };

        if colons.len() >= 2 {
            let attr_words: Vec<String> = toks[first_colon + 1..colons[1]]
                .iter()
                .map(|t| t.text.to_string())
                .collect();
            if let Err(c) = rule.parse_attribs(&attr_words) {
                bail!("{}:{}: unrecognized attribute {:?}", self.file, line, c);
            }
        }

        let prereq_start = colons[colons.len() - 1] + 1;
        for t in &toks[prereq_start..] {
            rule.prereqs
                .extend(expand::expand_words(t.text, &self.rules.vars, true)?);
        }

        if let Some(rt) = recipe_tok {
            let stripped = strip_indentation(rt.text, rt.col);
            rule.recipe = expand::expand_recipe(&stripped, &self.rules.vars);
        }

        for t in &toks[..first_colon] {
            for target in expand::expand_words(t.text, &self.rules.vars, true)? {
                let pat = if rule.attribs.regex {
                    rule.is_meta = true;
                    Pattern::regex(&target)
                        .map_err(|err| anyhow!("{}:{}: {}", self.file, line, err))?
                } else if let Some(pos) = target.find('%') {
                    rule.is_meta = true;
                    Pattern::suffix(&target, &target[..pos], &target[pos + 1..])
                } else {
                    Pattern::literal(&target)
                };
                rule.targets.push(pat);
            }
        }

        if rule.targets.is_empty() {
            bail!("{}:{}: rule has no targets", self.file, line);
        }
        self.rules.add(rule);
        Ok(())
    }
}

fn token_desc(tok: &Token) -> String {
    match tok.kind {
        TokenKind::Newline => "newline".to_string(),
        TokenKind::Recipe => "recipe".to_string(),
        _ => format!("'{}'", tok.text),
    }
}

/// The first recipe line's column sets the floor; up to that many leading
/// blanks come off each subsequent line.
fn strip_indentation(text: &str, floor: usize) -> String {
    let mut out = String::new();
    for (i, line) in text.split_inclusive('\n').enumerate() {
        if i == 0 {
            out.push_str(line);
            continue;
        }
        let mut rest = line;
        let mut stripped = 0;
        while stripped < floor {
            match rest.chars().next() {
                Some(c @ (' ' | '\t')) => {
                    rest = &rest[c.len_utf8()..];
                    stripped += 1;
                }
                _ => break,
            }
        }
        out.push_str(rest);
    }
    out
}
