use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Opcode {
    Click,       // c
    LeftClick,   // l
    MiddleClick, // m
    RightClick,  // r
    ScrollStart, // su
    ScrollDown,  // sd
    ScrollStop,  // ss
    Goto,        // g x,y
    Drag,        // d dx,dy
    Write,       // w'text'
    Sleep,       // s seconds
    Repeat,      // f count(...)
}

impl Opcode {
    pub fn from_code(code: &str) -> Option<Self> {
        let opcode = match code {
            "c" => Opcode::Click,
            "l" => Opcode::LeftClick,
            "m" => Opcode::MiddleClick,
            "r" => Opcode::RightClick,
            "su" => Opcode::ScrollStart,
            "sd" => Opcode::ScrollDown,
            "ss" => Opcode::ScrollStop,
            "g" => Opcode::Goto,
            "d" => Opcode::Drag,
            "w" => Opcode::Write,
            "s" => Opcode::Sleep,
            "f" => Opcode::Repeat,
            _ => return None,
        };
        Some(opcode)
    }

    pub fn code(self) -> &'static str {
        match self {
            Opcode::Click => "c",
            Opcode::LeftClick => "l",
            Opcode::MiddleClick => "m",
            Opcode::RightClick => "r",
            Opcode::ScrollStart => "su",
            Opcode::ScrollDown => "sd",
            Opcode::ScrollStop => "ss",
            Opcode::Goto => "g",
            Opcode::Drag => "d",
            Opcode::Write => "w",
            Opcode::Sleep => "s",
            Opcode::Repeat => "f",
        }
    }
}

/// Numeric argument. Literals with a decimal point are floats.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(n) => n,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Number::Int(n) => write!(f, "{}", n),
            Number::Float(n) => {
                // `{}` never switches to exponent form, which the lexer cannot read.
                let text = n.to_string();
                if text.contains('.') {
                    f.write_str(&text)
                } else {
                    write!(f, "{}.0", text)
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Command {
    pub opcode: Opcode,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub numbers: Vec<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Command>,
}

impl Command {
    pub fn simple(opcode: Opcode) -> Self {
        Self {
            opcode,
            numbers: Vec::new(),
            text: None,
            children: Vec::new(),
        }
    }

    pub fn goto(x: Number, y: Number) -> Self {
        Self {
            numbers: vec![x, y],
            ..Self::simple(Opcode::Goto)
        }
    }

    pub fn drag(dx: Number, dy: Number) -> Self {
        Self {
            numbers: vec![dx, dy],
            ..Self::simple(Opcode::Drag)
        }
    }

    pub fn write(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::simple(Opcode::Write)
        }
    }

    pub fn sleep(seconds: Number) -> Self {
        Self {
            numbers: vec![seconds],
            ..Self::simple(Opcode::Sleep)
        }
    }

    pub fn repeat(count: u64, children: Vec<Command>) -> Self {
        Self {
            numbers: vec![Number::Int(count as i64)],
            children,
            ..Self::simple(Opcode::Repeat)
        }
    }

    /// Repetition count of a `Repeat`; zero for every other opcode.
    pub fn count(&self) -> u64 {
        match (self.opcode, self.numbers.first()) {
            (Opcode::Repeat, Some(Number::Int(n))) => u64::try_from(*n).unwrap_or(0),
            _ => 0,
        }
    }

    /// Number of executor calls a full run of this command issues.
    pub fn call_count(&self) -> u64 {
        match self.opcode {
            Opcode::Repeat => self
                .count()
                .saturating_mul(self.children.iter().map(Command::call_count).sum()),
            _ => 1,
        }
    }
}

/// Renders the command back to macro syntax.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.opcode.code())?;
        match self.opcode {
            Opcode::Goto | Opcode::Drag => {
                let mut numbers = self.numbers.iter();
                if let (Some(x), Some(y)) = (numbers.next(), numbers.next()) {
                    write!(f, "{},{}", x, y)?;
                }
            }
            Opcode::Sleep => {
                if let Some(seconds) = self.numbers.first() {
                    write!(f, "{}", seconds)?;
                }
            }
            Opcode::Write => write!(f, "'{}'", self.text.as_deref().unwrap_or_default())?,
            Opcode::Repeat => {
                write!(f, "{}(", self.count())?;
                for child in &self.children {
                    write!(f, "{}", child)?;
                }
                write!(f, ")")?;
            }
            _ => {}
        }
        Ok(())
    }
}

/// Renders a whole sequence back to a macro string.
pub fn render(commands: &[Command]) -> String {
    commands.iter().map(Command::to_string).collect()
}
