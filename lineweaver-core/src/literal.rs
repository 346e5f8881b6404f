//! # Literal Structure Parser
//!
//! Spectrum and initial-conditions files are plain-text literal structures:
//! nested mappings and sequences of numbers, strings and the null/boolean
//! constants. Files written by scripting tools use Python spelling
//! (`None`, `True`, `'quoted'`, tuples) while files written by this
//! application use JSON spelling (`null`, `true`). Both are accepted here.
//!
//! ## Grammar
//! - mappings `{k: v, ...}` keep their insertion order
//! - lists `[...]` and tuples `(...)` both become [`Literal::List`]
//! - `#` starts a comment that runs to the end of the line
//! - trailing commas are allowed everywhere

use thiserror::Error;

/// Deepest container nesting accepted before parsing stops with an error.
pub const MAX_DEPTH: usize = 256;

/// A parsed literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Literal>),
    /// Key/value pairs in file order.
    Dict(Vec<(Literal, Literal)>),
}

/// A parse failure with its 1-based position in the source text.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at line {line}, column {column}")]
pub struct LiteralError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl Literal {
    /// Short name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Literal::None => "null",
            Literal::Bool(_) => "boolean",
            Literal::Int(_) => "integer",
            Literal::Float(_) => "float",
            Literal::Str(_) => "string",
            Literal::List(_) => "sequence",
            Literal::Dict(_) => "mapping",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Literal::None)
    }

    /// Numeric view of ints and floats. Strings and booleans are not numbers here;
    /// see `params::coerce_float` for the lenient conversion.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Literal::Int(i) => Some(*i as f64),
            Literal::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Literal]> {
        match self {
            Literal::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&[(Literal, Literal)]> {
        match self {
            Literal::Dict(entries) => Some(entries),
            _ => None,
        }
    }

    /// Looks up a string key in a mapping. Returns `None` for non-mappings.
    pub fn get(&self, key: &str) -> Option<&Literal> {
        self.as_dict()?
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }
}

/// Parses a complete literal document.
pub fn parse(source: &str) -> Result<Literal, LiteralError> {
    let mut parser = Parser {
        src: source,
        pos: 0,
        depth: 0,
    };
    parser.skip_trivia();
    if parser.at_end() {
        return Err(parser.error("empty document"));
    }
    let value = parser.parse_value()?;
    parser.skip_trivia();
    if !parser.at_end() {
        return Err(parser.error("unexpected trailing content"));
    }
    Ok(value)
}

struct Parser<'a> {
    src: &'a str,
    /// Byte offset into `src`.
    pos: usize,
    /// Number of containers currently open.
    depth: usize,
}

impl<'a> Parser<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> LiteralError {
        let consumed = &self.src[..self.pos.min(self.src.len())];
        let line = consumed.matches('\n').count() + 1;
        let column = consumed
            .rsplit('\n')
            .next()
            .map_or(0, |tail| tail.chars().count())
            + 1;
        LiteralError {
            line,
            column,
            message: message.into(),
        }
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == '#' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn expect(&mut self, wanted: char) -> Result<(), LiteralError> {
        self.skip_trivia();
        match self.peek() {
            Some(c) if c == wanted => {
                self.bump();
                Ok(())
            }
            Some(c) => Err(self.error(format!("expected '{wanted}', found '{c}'"))),
            None => Err(self.error(format!("expected '{wanted}', found end of input"))),
        }
    }

    fn parse_value(&mut self) -> Result<Literal, LiteralError> {
        self.skip_trivia();
        match self.peek() {
            Some('{') => self.nested(Self::parse_dict),
            Some('[') => {
                self.bump();
                let (items, _) = self.nested(|p| p.parse_items(']'))?;
                Ok(Literal::List(items))
            }
            Some('(') => {
                self.bump();
                let (mut items, saw_comma) = self.nested(|p| p.parse_items(')'))?;
                // `(x)` is a parenthesised value, `(x,)` a one-element tuple
                if items.len() == 1 && !saw_comma {
                    Ok(items.remove(0))
                } else {
                    Ok(Literal::List(items))
                }
            }
            Some('\'') | Some('"') => self.parse_string().map(Literal::Str),
            Some(c) if c == '+' || c == '-' || c == '.' || c.is_ascii_digit() => {
                self.parse_number()
            }
            Some(c) if c.is_alphabetic() || c == '_' => self.parse_name(),
            Some(c) => Err(self.error(format!("unexpected character '{c}'"))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    /// Runs `inner` one container level deeper.
    fn nested<T>(&mut self, inner: impl FnOnce(&mut Self) -> Result<T, LiteralError>) -> Result<T, LiteralError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error(format!("nesting too deep (limit {MAX_DEPTH})")));
        }
        self.depth += 1;
        let result = inner(self);
        self.depth -= 1;
        result
    }

    /// Parses comma-separated values up to `close`. The opening bracket is
    /// already consumed. Also reports whether any comma was seen.
    fn parse_items(&mut self, close: char) -> Result<(Vec<Literal>, bool), LiteralError> {
        let mut items = Vec::new();
        let mut saw_comma = false;
        loop {
            self.skip_trivia();
            if self.peek() == Some(close) {
                self.bump();
                return Ok((items, saw_comma));
            }
            items.push(self.parse_value()?);
            self.skip_trivia();
            match self.peek() {
                Some(',') => {
                    self.bump();
                    saw_comma = true;
                }
                Some(c) if c == close => {
                    self.bump();
                    return Ok((items, saw_comma));
                }
                Some(c) => return Err(self.error(format!("expected ',' or '{close}', found '{c}'"))),
                None => return Err(self.error(format!("unclosed sequence, expected '{close}'"))),
            }
        }
    }

    fn parse_dict(&mut self) -> Result<Literal, LiteralError> {
        self.expect('{')?;
        let mut entries = Vec::new();
        loop {
            self.skip_trivia();
            if self.peek() == Some('}') {
                self.bump();
                return Ok(Literal::Dict(entries));
            }
            let key = self.parse_value()?;
            if matches!(key, Literal::List(_) | Literal::Dict(_)) {
                return Err(self.error(format!("unhashable mapping key of type {}", key.type_name())));
            }
            self.expect(':')?;
            let value = self.parse_value()?;
            entries.push((key, value));
            self.skip_trivia();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some('}') => {
                    self.bump();
                    return Ok(Literal::Dict(entries));
                }
                Some(c) => return Err(self.error(format!("expected ',' or '}}', found '{c}'"))),
                None => return Err(self.error("unclosed mapping, expected '}'")),
            }
        }
    }

    fn parse_string(&mut self) -> Result<String, LiteralError> {
        let quote = self.bump().ok_or_else(|| self.error("expected string"))?;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => {
                    let escaped = self.bump().ok_or_else(|| self.error("unterminated escape"))?;
                    match escaped {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        '0' => out.push('\0'),
                        '\\' | '\'' | '"' | '/' => out.push(escaped),
                        'u' => {
                            let start = self.pos;
                            for _ in 0..4 {
                                self.bump();
                            }
                            let hex = self.src.get(start..self.pos).unwrap_or_default();
                            let ch = u32::from_str_radix(hex, 16)
                                .ok()
                                .and_then(char::from_u32)
                                .ok_or_else(|| self.error(format!("invalid unicode escape '{hex}'")))?;
                            out.push(ch);
                        }
                        other => {
                            // Unknown escapes are kept verbatim, as Python does.
                            out.push('\\');
                            out.push(other);
                        }
                    }
                }
                Some(c) => out.push(c),
            }
        }
    }

    fn parse_number(&mut self) -> Result<Literal, LiteralError> {
        let start = self.pos;
        let mut negative = false;
        if let Some(sign @ ('+' | '-')) = self.peek() {
            negative = sign == '-';
            self.bump();
            self.skip_trivia();
            if self.peek().is_some_and(|c| c.is_alphabetic()) {
                return match self.parse_name()? {
                    Literal::Float(f) if negative => Ok(Literal::Float(-f)),
                    Literal::Float(f) => Ok(Literal::Float(f)),
                    other => Err(self.error(format!("cannot apply sign to {}", other.type_name()))),
                };
            }
        }
        let digits_start = self.pos;
        let mut is_float = false;
        let mut prev = '\0';
        while let Some(c) = self.peek() {
            let accept = match c {
                '0'..='9' | '_' => true,
                '.' => {
                    is_float = true;
                    true
                }
                'e' | 'E' => {
                    is_float = true;
                    true
                }
                '+' | '-' => prev == 'e' || prev == 'E',
                _ => false,
            };
            if !accept {
                break;
            }
            prev = c;
            self.bump();
        }
        let text: String = self.src[digits_start..self.pos]
            .chars()
            .filter(|&c| c != '_')
            .collect();
        if text.is_empty() {
            self.pos = start;
            return Err(self.error("expected a number"));
        }
        let signed = if negative { format!("-{text}") } else { text };
        if !is_float {
            if let Ok(i) = signed.parse::<i64>() {
                return Ok(Literal::Int(i));
            }
        }
        signed
            .parse::<f64>()
            .map(Literal::Float)
            .map_err(|_| self.error(format!("invalid number '{signed}'")))
    }

    fn parse_name(&mut self) -> Result<Literal, LiteralError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        match &self.src[start..self.pos] {
            "None" | "null" => Ok(Literal::None),
            "True" | "true" => Ok(Literal::Bool(true)),
            "False" | "false" => Ok(Literal::Bool(false)),
            "nan" | "NaN" => Ok(Literal::Float(f64::NAN)),
            "inf" | "Infinity" => Ok(Literal::Float(f64::INFINITY)),
            other => {
                let message = format!("unknown name '{other}'");
                self.pos = start;
                Err(self.error(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_nesting_is_an_error_not_an_abort() {
        let err = parse(&"[".repeat(200_000)).unwrap_err();
        assert!(err.message.contains("nesting too deep"));
        let err = parse(&"{'a': ".repeat(MAX_DEPTH + 1)).unwrap_err();
        assert!(err.message.contains("nesting too deep"));

        let ok = format!("{}1{}", "[".repeat(MAX_DEPTH), "]".repeat(MAX_DEPTH));
        assert!(parse(&ok).is_ok());
    }

    #[test]
    fn parses_python_spelling() {
        let value = parse("{'a': None, 'b': True, 'c': (1, 2.5,), \"d\": [-3, 1e-2]}").unwrap();
        assert_eq!(value.get("a"), Some(&Literal::None));
        assert_eq!(value.get("b"), Some(&Literal::Bool(true)));
        assert_eq!(
            value.get("c"),
            Some(&Literal::List(vec![Literal::Int(1), Literal::Float(2.5)]))
        );
        assert_eq!(
            value.get("d"),
            Some(&Literal::List(vec![Literal::Int(-3), Literal::Float(0.01)]))
        );
    }

    #[test]
    fn parses_json_spelling() {
        let value = parse(r#"[{"lp1_": {"center": {"value": null, "vary": false}}}]"#).unwrap();
        let first = &value.as_list().unwrap()[0];
        let center = first.get("lp1_").and_then(|g| g.get("center")).unwrap();
        assert!(center.get("value").unwrap().is_none());
        assert_eq!(center.get("vary"), Some(&Literal::Bool(false)));
    }

    #[test]
    fn keeps_mapping_order() {
        let value = parse("{'z': 1, 'a': 2, 'm': 3}").unwrap();
        let keys: Vec<_> = value
            .as_dict()
            .unwrap()
            .iter()
            .map(|(k, _)| k.as_str().unwrap())
            .collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    #[test]
    fn parenthesised_value_is_not_a_tuple() {
        assert_eq!(parse("(4)").unwrap(), Literal::Int(4));
        assert_eq!(parse("(4,)").unwrap(), Literal::List(vec![Literal::Int(4)]));
    }

    #[test]
    fn comments_and_special_floats() {
        let value = parse("# header\n[nan, -inf, 1_000]  # trailing\n").unwrap();
        let items = value.as_list().unwrap();
        assert!(items[0].as_f64().unwrap().is_nan());
        assert_eq!(items[1].as_f64(), Some(f64::NEG_INFINITY));
        assert_eq!(items[2], Literal::Int(1000));
    }

    #[test]
    fn reports_error_position() {
        let err = parse("{'xdata': [1, 2,\n  3 4]}").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 5);
        assert!(err.message.contains("expected ','"));
    }

    #[test]
    fn rejects_empty_and_trailing_input() {
        assert!(parse("   ").is_err());
        assert!(parse("[1] [2]").is_err());
        assert!(parse("{'a': unknown}").is_err());
        assert!(parse("'open").is_err());
    }
}
