//! Lexer for mkfiles.
//!
//! Scans the input character by character, producing a stream of tokens on
//! demand.  Recipe recognition is context sensitive: a line that begins with
//! whitespace and has content past column zero is a recipe line, and the
//! lexer gathers the whole indented block (embedded blank lines included)
//! into a single token.  Words keep their quote delimiters and escapes
//! verbatim; interpreting them is the expander's job.

const EOF: char = '\0';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Newline,
    Word,
    PipeInclude,
    RedirInclude,
    Colon,
    Assign,
    Recipe,
}

#[derive(Debug, Clone)]
pub struct Token<'text> {
    pub kind: TokenKind,
    pub text: &'text str,
    pub line: usize,
    /// Column (in characters) at which the token starts, counted from zero.
    pub col: usize,
}

#[derive(Debug)]
pub struct LexError {
    pub msg: String,
    pub line: usize,
}

pub type LexResult<T> = Result<T, LexError>;

pub struct Lexer<'text> {
    input: &'text str,
    pos: usize,
    line: usize,
    col: usize,
    start: usize,
    start_line: usize,
    start_col: usize,
    /// True while only whitespace has been seen on the current line.
    indented: bool,
    /// True while lexing the tail of a rule line, where `;` starts an
    /// inline recipe.  Everywhere else `;` is ordinary word text.
    rule_tail: bool,
}

impl<'text> Lexer<'text> {
    pub fn new(input: &'text str) -> Lexer<'text> {
        Lexer {
            input,
            pos: 0,
            line: 1,
            col: 0,
            start: 0,
            start_line: 1,
            start_col: 0,
            indented: true,
            rule_tail: false,
        }
    }

    pub fn line(&self) -> usize {
        self.line
    }

    /// The parser flips this on after a rule's colon and off again at the
    /// end of the statement; the lexer cannot tell a rule tail apart from
    /// an assignment value on its own.
    pub fn allow_inline_recipe(&mut self, on: bool) {
        self.rule_tail = on;
    }

    fn peek(&self) -> char {
        self.input[self.pos..].chars().next().unwrap_or(EOF)
    }

    fn peek2(&self) -> char {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next().unwrap_or(EOF)
    }

    fn next(&mut self) {
        let c = self.peek();
        if c == EOF {
            return;
        }
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.col = 0;
            self.indented = true;
        } else {
            self.col += 1;
            if c != ' ' && c != '\t' {
                self.indented = false;
            }
        }
    }

    /// Mark the current position as the start of the next token.
    fn mark(&mut self) {
        self.start = self.pos;
        self.start_line = self.line;
        self.start_col = self.col;
    }

    fn emit(&mut self, kind: TokenKind) -> Token<'text> {
        let tok = Token {
            kind,
            text: &self.input[self.start..self.pos],
            line: self.start_line,
            col: self.start_col,
        };
        self.mark();
        tok
    }

    fn error<T>(&self, msg: impl Into<String>) -> LexResult<T> {
        Err(LexError {
            msg: msg.into(),
            line: self.line,
        })
    }

    /// Produce the next token, or None at end of input.
    pub fn next_token(&mut self) -> LexResult<Option<Token<'text>>> {
        loop {
            loop {
                while matches!(self.peek(), ' ' | '\t' | '\r') {
                    self.next();
                }
                let c = self.peek();
                if c == '\n' {
                    if !self.indented {
                        // End of a line that held content.
                        self.mark();
                        self.next();
                        return Ok(Some(self.emit(TokenKind::Newline)));
                    }
                    // Blank line; runs of them collapse.
                    self.next();
                } else if c == '\\' && self.peek2() == '\n' {
                    // Line continuation splices, preserving line state.
                    self.next();
                    self.next();
                    self.indented = false;
                } else {
                    break;
                }
            }

            if self.indented && self.col > 0 && self.peek() != EOF {
                return Ok(Some(self.lex_recipe()));
            }

            match self.peek() {
                EOF => return Ok(None),
                '#' => {
                    while !matches!(self.peek(), '\n' | EOF) {
                        self.next();
                    }
                    continue;
                }
                '<' => {
                    self.mark();
                    self.next();
                    if self.peek() == '|' {
                        self.next();
                        return Ok(Some(self.emit(TokenKind::PipeInclude)));
                    }
                    return Ok(Some(self.emit(TokenKind::RedirInclude)));
                }
                ':' => {
                    self.mark();
                    self.next();
                    return Ok(Some(self.emit(TokenKind::Colon)));
                }
                '=' => {
                    self.mark();
                    self.next();
                    return Ok(Some(self.emit(TokenKind::Assign)));
                }
                ';' if self.rule_tail => return Ok(Some(self.lex_inline_recipe())),
                _ => return Ok(Some(self.lex_word()?)),
            }
        }
    }

    /// Gather an indented recipe block, ending at a line that starts at
    /// column zero (or end of input).
    fn lex_recipe(&mut self) -> Token<'text> {
        self.mark();
        loop {
            while !matches!(self.peek(), '\n' | EOF) {
                self.next();
            }
            if self.peek() == EOF {
                break;
            }
            while matches!(self.peek(), ' ' | '\t' | '\n' | '\r') {
                self.next();
            }
            if self.peek() == EOF || self.col == 0 {
                break;
            }
        }
        self.emit(TokenKind::Recipe)
    }

    /// A recipe given on the rule line itself, after a `;`.
    fn lex_inline_recipe(&mut self) -> Token<'text> {
        self.next();
        while matches!(self.peek(), ' ' | '\t') {
            self.next();
        }
        self.mark();
        while !matches!(self.peek(), '\n' | EOF) {
            self.next();
        }
        self.emit(TokenKind::Recipe)
    }

    /// A word, possibly containing quoted stretches.  The delimiters stay in
    /// the token text, so foo"bar baz"qux lexes as one word.
    fn lex_word(&mut self) -> LexResult<Token<'text>> {
        self.mark();
        loop {
            match self.peek() {
                EOF | ' ' | '\t' | '\n' | '\r' | '=' | ':' | '#' => break,
                ';' if self.rule_tail => break,
                '\'' | '`' => {
                    let quote = self.peek();
                    self.next();
                    while self.peek() != quote {
                        if self.peek() == EOF {
                            return self.error("end of file inside quoted string");
                        }
                        self.next();
                    }
                    self.next();
                }
                '"' => {
                    self.next();
                    loop {
                        match self.peek() {
                            EOF => return self.error("end of file inside quoted string"),
                            '\\' => {
                                self.next();
                                if self.peek() != EOF {
                                    self.next();
                                }
                            }
                            '"' => {
                                self.next();
                                break;
                            }
                            _ => self.next(),
                        }
                    }
                }
                _ => self.next(),
            }
        }
        Ok(self.emit(TokenKind::Word))
    }
}
