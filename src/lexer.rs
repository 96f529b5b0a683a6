use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, trace};

use crate::error::{LexErrorKind, LexingError};
use crate::token::{Kind, Token};

static NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[+-]?[0-9]+(\.[0-9]+)?").expect("number pattern"));
static QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*'[^']*'").expect("quote pattern"));
static COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*,").expect("comma pattern"));

/// Byte length of the leading whitespace run.
fn leading_ws(input: &str) -> usize {
    input.len() - input.trim_start().len()
}

fn scan_regex<'s>(
    pattern: &Regex,
    input: &'s str,
    missing: LexErrorKind,
) -> Result<&'s str, LexingError> {
    pattern
        .find(input)
        .map(|m| m.as_str())
        .ok_or_else(|| LexingError::new(missing, leading_ws(input)))
}

/// Matches a number at the start of `input`, leading whitespace included.
pub fn scan_number(input: &str) -> Result<&str, LexingError> {
    scan_regex(&NUMBER, input, LexErrorKind::MissingNumber)
}

/// Matches a single-quoted string at the start of `input`.
pub fn scan_quoted(input: &str) -> Result<&str, LexingError> {
    scan_regex(&QUOTED, input, LexErrorKind::MissingQuote)
}

pub fn scan_comma(input: &str) -> Result<&str, LexingError> {
    scan_regex(&COMMA, input, LexErrorKind::MissingComma)
}

/// Matches a parenthesized group at the start of `input`, up to the close
/// parenthesis that balances the opening one. Anything after it, including
/// surplus close parentheses, is left alone. Quoted strings are skipped
/// while counting depth.
pub fn scan_group(input: &str) -> Result<&str, LexingError> {
    let start = leading_ws(input);
    let unbalanced = || LexingError::new(LexErrorKind::UnbalancedParens, start);

    if !input[start..].starts_with('(') {
        return Err(unbalanced());
    }

    let mut depth = 0usize;
    let mut in_quote = false;
    for (i, c) in input[start..].char_indices() {
        match c {
            '\'' => in_quote = !in_quote,
            _ if in_quote => {}
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&input[..start + i + 1]);
                }
            }
            _ => {}
        }
    }

    Err(unbalanced())
}

type Scanner = for<'s> fn(&'s str) -> Result<&'s str, LexingError>;

pub struct Lexer<'a> {
    source: &'a str,
    current: usize,
    base: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self::nested(input, 0)
    }

    /// A lexer over a slice that starts at byte `base` of the outer macro,
    /// so reported positions stay absolute.
    fn nested(input: &'a str, base: usize) -> Self {
        Self {
            source: input,
            current: 0,
            base,
        }
    }

    fn rest(&self) -> &'a str {
        &self.source[self.current..]
    }

    fn absolute(&self) -> usize {
        self.base + self.current
    }

    fn is_eof(&self) -> bool {
        self.rest().trim_start().is_empty()
    }

    /// Only close parentheses and whitespace remain.
    fn only_surplus_parens(&self) -> bool {
        self.rest().chars().all(|c| c == ')' || c.is_whitespace())
    }

    fn take(&mut self, kind: Kind, len: usize) -> Token {
        let text = &self.rest()[..len];
        let token = Token::new(kind, text, self.absolute() + leading_ws(text));
        self.current += len;
        token
    }

    fn scan_with(&mut self, kind: Kind, scanner: Scanner) -> Result<Token, LexingError> {
        let offset = self.absolute();
        let text = scanner(self.rest()).map_err(|e| e.offset(offset))?;
        Ok(self.take(kind, text.len()))
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexingError> {
        let mut tokens = Vec::new();

        while !self.is_eof() {
            if self.only_surplus_parens() {
                debug!(position = self.absolute(), "ignoring surplus close parentheses");
                break;
            }

            let lead = leading_ws(self.rest());
            let mut chars = self.rest()[lead..].chars();
            let Some(first) = chars.next() else { break };

            // `s` alone is sleep; `su`, `sd` and `ss` win when the next
            // character completes them.
            let width = match (first, chars.next()) {
                ('s', Some('u' | 'd' | 's')) => 2,
                ('c' | 'l' | 'm' | 'r' | 'g' | 'd' | 'w' | 's' | 'f', _) => 1,
                (c, _) => {
                    return Err(LexingError::new(
                        LexErrorKind::UnrecognizedOpcode(c),
                        self.absolute() + lead,
                    ))
                }
            };

            let token = self.take(Kind::Opcode, lead + width);
            let opcode = token.lexeme().to_string();
            trace!(opcode = %opcode, position = token.position, "opcode");
            tokens.push(token);

            self.scan_arguments(&opcode, &mut tokens)
                .map_err(|e| e.with_context(&opcode))?;
        }

        Ok(tokens)
    }

    fn scan_arguments(&mut self, opcode: &str, tokens: &mut Vec<Token>) -> Result<(), LexingError> {
        match opcode {
            "g" | "d" => {
                tokens.push(self.scan_with(Kind::Number, scan_number)?);
                tokens.push(self.scan_with(Kind::Comma, scan_comma)?);
                tokens.push(self.scan_with(Kind::Number, scan_number)?);
            }
            "w" => tokens.push(self.scan_with(Kind::QuotedString, scan_quoted)?),
            "s" => tokens.push(self.scan_with(Kind::Number, scan_number)?),
            "f" => {
                tokens.push(self.scan_with(Kind::Number, scan_number)?);
                tokens.push(self.scan_group_token()?);
            }
            _ => {}
        }
        Ok(())
    }

    fn scan_group_token(&mut self) -> Result<Token, LexingError> {
        let offset = self.absolute();
        let text = scan_group(self.rest()).map_err(|e| e.offset(offset))?;
        let lead = leading_ws(text);
        let interior = &text[lead + 1..text.len() - 1];

        let children = Lexer::nested(interior, offset + lead + 1).tokenize()?;

        let token = Token::group(text, offset + lead, children);
        self.current += text.len();
        Ok(token)
    }
}

/// Tokenizes a whole macro string. Fails on the first malformed token.
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexingError> {
    let tokens = Lexer::new(input).tokenize()?;
    debug!(count = tokens.len(), "tokenized macro");
    Ok(tokens)
}
