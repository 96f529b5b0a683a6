use serde::Serialize;

/// One lexical unit of a macro string.
///
/// `text` is the exact slice that was matched, including the run of
/// whitespace that preceded it. `children` is only populated for
/// [`Kind::Group`] and holds the tokens of the group's interior.
#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct Token {
    pub kind: Kind,
    pub text: String,
    pub position: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Token>,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
pub enum Kind {
    Opcode,        // c, l, m, r, su, sd, ss, g, d, w, s, f
    Number,        // [+-]digits[.digits]
    QuotedString,  // 'text'
    Comma,         // ,
    Group,         // ( tokens )
}

impl Token {
    pub(crate) fn new(kind: Kind, text: &str, position: usize) -> Self {
        Self {
            kind,
            text: text.to_string(),
            position,
            children: Vec::new(),
        }
    }

    pub(crate) fn group(text: &str, position: usize, children: Vec<Token>) -> Self {
        Self {
            kind: Kind::Group,
            text: text.to_string(),
            position,
            children,
        }
    }

    /// The token text without its leading whitespace.
    pub fn lexeme(&self) -> &str {
        self.text.trim_start()
    }

    /// Inner text of a quoted string, without the quotes. Other kinds
    /// return their lexeme.
    pub fn literal(&self) -> &str {
        let lexeme = self.lexeme();
        match self.kind {
            Kind::QuotedString => lexeme
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
                .unwrap_or(lexeme),
            _ => lexeme,
        }
    }

    /// Flattens the token tree into lexemes, dropping commas and expanding
    /// groups into nested lists.
    #[cfg(test)]
    pub(crate) fn outline(tokens: &[Token]) -> Vec<Outline> {
        tokens
            .iter()
            .filter(|t| t.kind != Kind::Comma)
            .map(|t| match t.kind {
                Kind::Group => Outline::Group(Self::outline(&t.children)),
                _ => Outline::Item(t.literal().to_string()),
            })
            .collect()
    }
}

#[cfg(test)]
#[derive(Debug, PartialEq, Clone)]
pub(crate) enum Outline {
    Item(String),
    Group(Vec<Outline>),
}

#[cfg(test)]
impl From<&str> for Outline {
    fn from(value: &str) -> Self {
        Outline::Item(value.to_string())
    }
}
