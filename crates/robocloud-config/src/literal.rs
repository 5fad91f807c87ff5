//! Parser for the literal syntax used by config tree values.
//!
//! Values are stored as Python-style literals: `'quoted'` or `"quoted"`
//! strings, integers and floats, `True`/`False`/`None`, and `[...]`, `(...)`,
//! `{...}` containers. Anything outside that grammar (bare words, arithmetic,
//! trailing input) is rejected so the caller can fall back to the raw string.

use serde_json::{Map, Number, Value};

/// Maximum container nesting, matching serde_json's recursion limit.
const MAX_DEPTH: usize = 128;

/// Why a literal failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid literal at offset {offset}: {message}")]
pub struct LiteralError {
    /// Character offset into the input.
    pub offset: usize,
    /// What went wrong.
    pub message: String,
}

/// Parse a literal into a JSON value.
///
/// `None` becomes `null`, tuples and sets become arrays, and non-string dict
/// keys are rendered the way Python prints them (`1`, `2.5`, `True`).
pub fn parse_literal(input: &str) -> Result<Value, LiteralError> {
    let mut parser = Parser::new(input);
    parser.skip_ws();
    let value = parser.value()?;
    parser.skip_ws();
    if parser.pos < parser.chars.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(value)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            depth: 0,
        }
    }

    fn error(&self, message: &str) -> LiteralError {
        LiteralError {
            offset: self.pos,
            message: message.to_string(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), LiteralError> {
        self.skip_ws();
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", expected)))
        }
    }

    fn value(&mut self) -> Result<Value, LiteralError> {
        self.skip_ws();
        match self.peek() {
            Some('\'') | Some('"') => self.string().map(Value::String),
            Some('[') => self.nested(Self::list),
            Some('(') => self.nested(Self::tuple),
            Some('{') => self.nested(Self::dict),
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => self.number(),
            Some(c) if c.is_alphabetic() => self.name(),
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn nested(
        &mut self,
        parse: fn(&mut Self) -> Result<Value, LiteralError>,
    ) -> Result<Value, LiteralError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        self.depth += 1;
        let value = parse(self);
        self.depth -= 1;
        value
    }

    fn name(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        match word.as_str() {
            "True" => Ok(Value::Bool(true)),
            "False" => Ok(Value::Bool(false)),
            "None" => Ok(Value::Null),
            _ => {
                self.pos = start;
                Err(self.error("bare names are not literals"))
            }
        }
    }

    /// One or more adjacent quoted strings, concatenated.
    fn string(&mut self) -> Result<String, LiteralError> {
        let mut out = self.quoted()?;
        loop {
            let save = self.pos;
            self.skip_ws();
            if matches!(self.peek(), Some('\'') | Some('"')) {
                out.push_str(&self.quoted()?);
            } else {
                self.pos = save;
                return Ok(out);
            }
        }
    }

    fn quoted(&mut self) -> Result<String, LiteralError> {
        let quote = self.bump().ok_or_else(|| self.error("expected quote"))?;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some('\n') => return Err(self.error("newline in string")),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => self.escape(&mut out)?,
                Some(c) => out.push(c),
            }
        }
    }

    fn escape(&mut self, out: &mut String) -> Result<(), LiteralError> {
        let c = self.bump().ok_or_else(|| self.error("unterminated escape"))?;
        match c {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0c}'),
            'v' => out.push('\u{0b}'),
            '\\' | '\'' | '"' => out.push(c),
            '\n' => {}
            'x' => out.push(self.hex_escape(2)?),
            'u' => out.push(self.hex_escape(4)?),
            'U' => out.push(self.hex_escape(8)?),
            // Unknown escapes keep the backslash
            other => {
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    fn hex_escape(&mut self, digits: usize) -> Result<char, LiteralError> {
        let end = self.pos + digits;
        if end > self.chars.len() {
            return Err(self.error("truncated escape"));
        }
        let hex: String = self.chars[self.pos..end].iter().collect();
        let code = u32::from_str_radix(&hex, 16).map_err(|_| self.error("bad hex escape"))?;
        let c = char::from_u32(code).ok_or_else(|| self.error("escape is not a character"))?;
        self.pos = end;
        Ok(c)
    }

    fn number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        let mut text = String::new();

        if let Some(sign @ ('-' | '+')) = self.peek() {
            self.pos += 1;
            if sign == '-' {
                text.push('-');
            }
            self.skip_ws();
        }

        let int_digits = self.digits(&mut text);
        let mut is_float = false;

        if self.peek() == Some('.') {
            self.pos += 1;
            text.push('.');
            let frac_digits = self.digits(&mut text);
            if int_digits == 0 && frac_digits == 0 {
                self.pos = start;
                return Err(self.error("expected digits"));
            }
            is_float = true;
        } else if int_digits == 0 {
            self.pos = start;
            return Err(self.error("expected digits"));
        }

        if matches!(self.peek(), Some('e' | 'E')) {
            let save = self.pos;
            self.pos += 1;
            let mut exp = String::from("e");
            if let Some(sign @ ('-' | '+')) = self.peek() {
                self.pos += 1;
                exp.push(sign);
            }
            if self.digits(&mut exp) == 0 {
                self.pos = save;
                return Err(self.error("malformed exponent"));
            }
            text.push_str(&exp);
            is_float = true;
        }

        if matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            return Err(self.error("malformed number"));
        }

        if is_float {
            let f: f64 = text.parse().map_err(|_| self.error("malformed float"))?;
            return Number::from_f64(f)
                .map(Value::Number)
                .ok_or_else(|| self.error("float out of range"));
        }

        let unsigned = text.trim_start_matches('-');
        if unsigned.len() > 1 && unsigned.starts_with('0') && unsigned.chars().any(|c| c != '0') {
            return Err(self.error("leading zeros in integer"));
        }
        if let Ok(i) = text.parse::<i64>() {
            return Ok(Value::Number(i.into()));
        }
        if let Ok(u) = text.parse::<u64>() {
            return Ok(Value::Number(u.into()));
        }
        let f: f64 = text.parse().map_err(|_| self.error("malformed integer"))?;
        Number::from_f64(f)
            .map(Value::Number)
            .ok_or_else(|| self.error("integer out of range"))
    }

    /// Consume digits (with single underscores between them), returning how many.
    fn digits(&mut self, out: &mut String) -> usize {
        let mut count = 0;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                out.push(c);
                count += 1;
                self.pos += 1;
            } else if c == '_'
                && count > 0
                && matches!(self.chars.get(self.pos + 1), Some(n) if n.is_ascii_digit())
            {
                self.pos += 1;
            } else {
                break;
            }
        }
        count
    }

    /// Comma-separated values up to `close`, allowing a trailing comma.
    fn sequence(&mut self, close: char) -> Result<Vec<Value>, LiteralError> {
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok(items);
            }
            items.push(self.value()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(c) if c == close => {}
                _ => return Err(self.error(&format!("expected ',' or '{}'", close))),
            }
        }
    }

    fn list(&mut self) -> Result<Value, LiteralError> {
        self.expect('[')?;
        self.sequence(']').map(Value::Array)
    }

    fn tuple(&mut self) -> Result<Value, LiteralError> {
        self.expect('(')?;
        self.skip_ws();
        if self.peek() == Some(')') {
            self.pos += 1;
            return Ok(Value::Array(Vec::new()));
        }

        let first = self.value()?;
        self.skip_ws();
        match self.peek() {
            // Parenthesized expression, not a tuple
            Some(')') => {
                self.pos += 1;
                Ok(first)
            }
            Some(',') => {
                self.pos += 1;
                let mut items = vec![first];
                items.extend(self.sequence(')')?);
                Ok(Value::Array(items))
            }
            _ => Err(self.error("expected ',' or ')'")),
        }
    }

    fn dict(&mut self) -> Result<Value, LiteralError> {
        self.expect('{')?;
        self.skip_ws();
        if self.peek() == Some('}') {
            self.pos += 1;
            return Ok(Value::Object(Map::new()));
        }

        let first = self.value()?;
        self.skip_ws();
        if self.peek() != Some(':') {
            // A set literal
            let mut items = vec![first];
            match self.peek() {
                Some(',') => {
                    self.pos += 1;
                    items.extend(self.sequence('}')?);
                }
                Some('}') => self.pos += 1,
                _ => return Err(self.error("expected ':', ',' or '}'")),
            }
            return Ok(Value::Array(items));
        }

        let mut map = Map::new();
        let mut key = first;
        loop {
            self.expect(':')?;
            let value = self.value()?;
            let key_text = self.dict_key(key)?;
            map.insert(key_text, value);

            self.skip_ws();
            match self.peek() {
                Some('}') => {
                    self.pos += 1;
                    return Ok(Value::Object(map));
                }
                Some(',') => {
                    self.pos += 1;
                    self.skip_ws();
                    if self.peek() == Some('}') {
                        self.pos += 1;
                        return Ok(Value::Object(map));
                    }
                    key = self.value()?;
                }
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }

    fn dict_key(&self, key: Value) -> Result<String, LiteralError> {
        match key {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(true) => Ok("True".to_string()),
            Value::Bool(false) => Ok("False".to_string()),
            Value::Null => Ok("None".to_string()),
            _ => Err(self.error("unhashable dict key")),
        }
    }
}
