use tracing::debug;

use crate::command::{Command, Number, Opcode};
use crate::error::{SyntaxError, SyntaxErrorKind};
use crate::token::{Kind, Token};

/// Builds commands from a token sequence, consuming each opcode's fixed
/// arguments. A `Repeat` builds its group's children recursively.
pub struct Parser<'t> {
    tokens: &'t [Token],
    current: usize,
}

impl<'t> Parser<'t> {
    pub fn new(tokens: &'t [Token]) -> Self {
        Self { tokens, current: 0 }
    }

    fn at(&self) -> Option<&'t Token> {
        self.tokens.get(self.current)
    }

    fn next_token(&mut self) -> Option<&'t Token> {
        let token = self.at()?;
        self.current += 1;
        Some(token)
    }

    fn eat(&mut self, expecting: Kind, opcode: &Token) -> Result<&'t Token, SyntaxError> {
        match self.next_token() {
            None => Err(SyntaxError::new(
                SyntaxErrorKind::MissingArgument,
                opcode.lexeme(),
                opcode.position,
            )),
            Some(token) if token.kind != expecting => Err(SyntaxError::new(
                SyntaxErrorKind::WrongTokenKind {
                    expected: expecting,
                    found: token.kind,
                },
                opcode.lexeme(),
                token.position,
            )),
            Some(token) => Ok(token),
        }
    }

    pub fn parse(&mut self) -> Result<Vec<Command>, SyntaxError> {
        let mut commands = Vec::new();

        while let Some(token) = self.next_token() {
            let command = self.parse_command(token)?;
            debug!(command = %command, position = token.position, "built command");
            commands.push(command);
        }

        Ok(commands)
    }

    fn parse_command(&mut self, token: &'t Token) -> Result<Command, SyntaxError> {
        if token.kind != Kind::Opcode {
            return Err(SyntaxError::new(
                SyntaxErrorKind::WrongTokenKind {
                    expected: Kind::Opcode,
                    found: token.kind,
                },
                token.lexeme(),
                token.position,
            ));
        }

        let opcode = Opcode::from_code(token.lexeme()).ok_or_else(|| {
            SyntaxError::new(SyntaxErrorKind::UnknownOpcode, token.lexeme(), token.position)
        })?;

        let command = match opcode {
            Opcode::Goto | Opcode::Drag => {
                let x = self.parse_number(token)?;
                self.eat(Kind::Comma, token)?;
                let y = self.parse_number(token)?;
                Command {
                    numbers: vec![x, y],
                    ..Command::simple(opcode)
                }
            }
            Opcode::Write => {
                let quoted = self.eat(Kind::QuotedString, token)?;
                Command::write(quoted.literal())
            }
            Opcode::Sleep => Command::sleep(self.parse_number(token)?),
            Opcode::Repeat => {
                let count = self.parse_count(token)?;
                let group = self.eat(Kind::Group, token)?;
                let children = Parser::new(&group.children).parse()?;
                Command::repeat(count, children)
            }
            _ => Command::simple(opcode),
        };

        Ok(command)
    }

    fn parse_number(&mut self, opcode: &Token) -> Result<Number, SyntaxError> {
        let token = self.eat(Kind::Number, opcode)?;
        parse_number(token.lexeme()).ok_or_else(|| {
            SyntaxError::new(
                SyntaxErrorKind::InvalidNumber(token.lexeme().to_string()),
                opcode.lexeme(),
                token.position,
            )
        })
    }

    fn parse_count(&mut self, opcode: &Token) -> Result<u64, SyntaxError> {
        let token = self.eat(Kind::Number, opcode)?;
        match parse_number(token.lexeme()) {
            Some(Number::Int(n)) if n >= 0 => Ok(n as u64),
            _ => Err(SyntaxError::new(
                SyntaxErrorKind::InvalidCount(token.lexeme().to_string()),
                opcode.lexeme(),
                token.position,
            )),
        }
    }
}

/// Converts a number literal. A `.` makes it a float; the sign is kept.
pub fn parse_number(literal: &str) -> Option<Number> {
    if literal.contains('.') {
        literal.parse().ok().map(Number::Float)
    } else {
        literal.parse().ok().map(Number::Int)
    }
}

pub fn build(tokens: &[Token]) -> Result<Vec<Command>, SyntaxError> {
    Parser::new(tokens).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use pretty_assertions::assert_eq;

    fn parse(input: &str) -> Vec<Command> {
        build(&tokenize(input).unwrap()).unwrap()
    }

    fn syntax_err(input: &str) -> SyntaxErrorKind {
        build(&tokenize(input).unwrap()).unwrap_err().kind
    }

    fn click() -> Command {
        Command::simple(Opcode::Click)
    }

    #[test]
    fn zero_argument_opcodes() {
        assert_eq!(
            parse("clmr susdss"),
            vec![
                click(),
                Command::simple(Opcode::LeftClick),
                Command::simple(Opcode::MiddleClick),
                Command::simple(Opcode::RightClick),
                Command::simple(Opcode::ScrollStart),
                Command::simple(Opcode::ScrollDown),
                Command::simple(Opcode::ScrollStop),
            ]
        );
        assert!(parse("   ").is_empty());
    }

    #[test]
    fn separator_whitespace_does_not_change_structure() {
        let expected = vec![Command::goto(Number::Int(10), Number::Int(10))];
        assert_eq!(parse("g10,10"), expected);
        assert_eq!(parse("g 10 , 10"), expected);
        assert_eq!(parse("g10 ,10"), expected);
    }

    #[test]
    fn numbers_keep_sign_and_decimal() {
        assert_eq!(
            parse("g-5.5,+5 s0.25"),
            vec![
                Command::goto(Number::Float(-5.5), Number::Int(5)),
                Command::sleep(Number::Float(0.25)),
            ]
        );
        assert_eq!(parse_number("+5"), Some(Number::Int(5)));
        assert_eq!(parse_number("-5.5"), Some(Number::Float(-5.5)));
    }

    #[test]
    fn write_drops_quotes() {
        assert_eq!(parse("w'hello world'"), vec![Command::write("hello world")]);
        assert_eq!(parse("w''"), vec![Command::write("")]);
    }

    #[test]
    fn mixed_sequence() {
        assert_eq!(
            parse("d1,2w'hello'g3,4"),
            vec![
                Command::drag(Number::Int(1), Number::Int(2)),
                Command::write("hello"),
                Command::goto(Number::Int(3), Number::Int(4)),
            ]
        );
    }

    #[test]
    fn nested_repeats_stay_nested() {
        assert_eq!(
            parse("f10(f5(cc))"),
            vec![Command::repeat(
                10,
                vec![Command::repeat(5, vec![click(), click()])]
            )]
        );
        assert_eq!(parse("f0()"), vec![Command::repeat(0, vec![])]);
    }

    #[test]
    fn repeat_count_must_be_non_negative_integer() {
        assert_eq!(
            syntax_err("f-1(c)"),
            SyntaxErrorKind::InvalidCount("-1".to_string())
        );
        assert_eq!(
            syntax_err("f1.5(c)"),
            SyntaxErrorKind::InvalidCount("1.5".to_string())
        );
    }

    #[test]
    fn oversized_integer_is_invalid() {
        assert_eq!(
            syntax_err("g99999999999999999999,1"),
            SyntaxErrorKind::InvalidNumber("99999999999999999999".to_string())
        );
    }

    #[test]
    fn missing_argument_when_tokens_run_out() {
        let tokens = vec![
            Token::new(Kind::Opcode, "g", 0),
            Token::new(Kind::Number, "1", 1),
        ];
        let err = build(&tokens).unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::MissingArgument);
        assert_eq!(err.opcode, "g");
    }

    #[test]
    fn wrong_token_kind_is_reported_at_the_token() {
        let tokens = vec![
            Token::new(Kind::Opcode, " w", 1),
            Token::new(Kind::Number, "3", 2),
        ];
        let err = build(&tokens).unwrap_err();
        assert_eq!(
            err.kind,
            SyntaxErrorKind::WrongTokenKind {
                expected: Kind::QuotedString,
                found: Kind::Number
            }
        );
        assert_eq!(err.opcode, "w");
        assert_eq!(err.position, 2);
    }

    #[test]
    fn stray_argument_where_opcode_expected() {
        let tokens = vec![Token::new(Kind::Comma, ",", 0)];
        let err = build(&tokens).unwrap_err();
        assert_eq!(
            err.kind,
            SyntaxErrorKind::WrongTokenKind {
                expected: Kind::Opcode,
                found: Kind::Comma
            }
        );
    }

    #[test]
    fn unknown_opcode_text() {
        let tokens = vec![Token::new(Kind::Opcode, "zz", 0)];
        assert_eq!(build(&tokens).unwrap_err().kind, SyntaxErrorKind::UnknownOpcode);
    }

    #[test]
    fn nested_errors_abort_the_whole_build() {
        let tokens = vec![
            Token::new(Kind::Opcode, "f", 0),
            Token::new(Kind::Number, "2", 1),
            Token::group("(g)", 2, vec![Token::new(Kind::Opcode, "g", 3)]),
        ];
        let err = build(&tokens).unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::MissingArgument);
        assert_eq!(err.position, 3);
    }
}
