//! Confirmation condition expressions
//!
//! A small expression language evaluated against the acted-upon row:
//!
//! ```text
//! expr    := or
//! or      := and ("||" and)*
//! and     := cmp ("&&" cmp)*
//! cmp     := unary (("==" | "===" | "!=" | "!==" | "<" | "<=" | ">" | ">=") unary)?
//! unary   := "!" unary | primary
//! primary := number | string | true | false | null | undefined
//!          | "(" expr ")" | path
//! path    := ("row" | "columns") ("." ident | "[" expr "]")*
//! ```
//!
//! A leading `return` and trailing `;` are accepted. `&&` and `||` yield
//! one of their operands; the final result is taken for its truthiness.

use serde_json::Value;

use crate::error::ConditionError;
use crate::model::Row;
use crate::model::RowObject;
use crate::model::as_number;
use crate::model::is_truthy;
use crate::model::loose_eq;

/// What a condition can see.
pub struct ConditionScope<'a> {
    /// The row as stored in the table.
    pub row: &'a Row,
    /// The row in named-property form.
    pub object: &'a RowObject,
    pub column_count: usize,
}

/// Parses and evaluates `source`.
pub fn evaluate(source: &str, scope: &ConditionScope<'_>) -> Result<bool, ConditionError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        scope,
    };
    parser.skip_keyword("return");
    let value = parser.or()?;
    while parser.eat(&Token::Semicolon) {}
    match parser.peek() {
        None => Ok(is_truthy(&value)),
        Some((token, position)) => Err(ConditionError::UnexpectedToken {
            found: token.describe(),
            expected: "end of expression",
            position,
        }),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    Dot,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Not,
    And,
    Or,
    Eq,
    StrictEq,
    Ne,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
    Semicolon,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Self::Ident(name) => format!("'{}'", name),
            Self::Number(n) => n.to_string(),
            Self::Str(s) => format!("\"{}\"", s),
            other => format!("{:?}", other),
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<(Token, usize)>, ConditionError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c.is_ascii_digit() {
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let n = text
                .parse()
                .map_err(|_| ConditionError::UnexpectedChar { found: c, position: start })?;
            tokens.push((Token::Number(n), start));
            continue;
        }
        if c.is_alphabetic() || c == '_' || c == '$' {
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
                i += 1;
            }
            tokens.push((Token::Ident(chars[start..i].iter().collect()), start));
            continue;
        }
        if c == '"' || c == '\'' {
            i += 1;
            let mut text = String::new();
            loop {
                match chars.get(i) {
                    None => return Err(ConditionError::UnterminatedString(start)),
                    Some('\\') => {
                        if let Some(next) = chars.get(i + 1) {
                            text.push(*next);
                        }
                        i += 2;
                    }
                    Some(ch) if *ch == c => {
                        i += 1;
                        break;
                    }
                    Some(ch) => {
                        text.push(*ch);
                        i += 1;
                    }
                }
            }
            tokens.push((Token::Str(text), start));
            continue;
        }

        let next = chars.get(i + 1).copied();
        let next2 = chars.get(i + 2).copied();
        let (token, len) = match (c, next, next2) {
            ('=', Some('='), Some('=')) => (Token::StrictEq, 3),
            ('!', Some('='), Some('=')) => (Token::StrictNe, 3),
            ('=', Some('='), _) => (Token::Eq, 2),
            ('!', Some('='), _) => (Token::Ne, 2),
            ('<', Some('='), _) => (Token::Le, 2),
            ('>', Some('='), _) => (Token::Ge, 2),
            ('&', Some('&'), _) => (Token::And, 2),
            ('|', Some('|'), _) => (Token::Or, 2),
            ('!', _, _) => (Token::Not, 1),
            ('<', _, _) => (Token::Lt, 1),
            ('>', _, _) => (Token::Gt, 1),
            ('.', _, _) => (Token::Dot, 1),
            ('[', _, _) => (Token::LBracket, 1),
            (']', _, _) => (Token::RBracket, 1),
            ('(', _, _) => (Token::LParen, 1),
            (')', _, _) => (Token::RParen, 1),
            (';', _, _) => (Token::Semicolon, 1),
            _ => return Err(ConditionError::UnexpectedChar { found: c, position: start }),
        };
        tokens.push((token, start));
        i += len;
    }
    Ok(tokens)
}

/// A value reached while walking a path.
enum Target {
    Row,
    Columns,
    Value(Value),
}

struct Parser<'s, 'a> {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    scope: &'s ConditionScope<'a>,
}

impl Parser<'_, '_> {
    fn peek(&self) -> Option<(Token, usize)> {
        self.tokens.get(self.pos).cloned()
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.tokens.get(self.pos).map(|(t, _)| t) == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_keyword(&mut self, keyword: &str) {
        if matches!(self.tokens.get(self.pos), Some((Token::Ident(name), _)) if name == keyword) {
            self.pos += 1;
        }
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map(|(_, p)| *p).unwrap_or_else(|| {
            self.tokens.last().map(|(_, p)| p + 1).unwrap_or(0)
        })
    }

    fn expect(&mut self, token: Token, expected: &'static str) -> Result<(), ConditionError> {
        if self.eat(&token) {
            return Ok(());
        }
        Err(ConditionError::UnexpectedToken {
            found: self
                .peek()
                .map(|(t, _)| t.describe())
                .unwrap_or_else(|| "end of expression".to_string()),
            expected,
            position: self.position(),
        })
    }

    fn or(&mut self) -> Result<Value, ConditionError> {
        let mut left = self.and()?;
        while self.eat(&Token::Or) {
            let right = self.and()?;
            if !is_truthy(&left) {
                left = right;
            }
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Value, ConditionError> {
        let mut left = self.comparison()?;
        while self.eat(&Token::And) {
            let right = self.comparison()?;
            if is_truthy(&left) {
                left = right;
            }
        }
        Ok(left)
    }

    fn comparison(&mut self) -> Result<Value, ConditionError> {
        let left = self.unary()?;
        let Some((op, _)) = self.peek() else {
            return Ok(left);
        };
        let result = match op {
            Token::Eq | Token::StrictEq | Token::Ne | Token::StrictNe | Token::Lt | Token::Le | Token::Gt | Token::Ge => {
                self.pos += 1;
                let right = self.unary()?;
                compare(&op, &left, &right)
            }
            _ => return Ok(left),
        };
        Ok(Value::Bool(result))
    }

    fn unary(&mut self) -> Result<Value, ConditionError> {
        if self.eat(&Token::Not) {
            let value = self.unary()?;
            return Ok(Value::Bool(!is_truthy(&value)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Value, ConditionError> {
        let position = self.position();
        let Some((token, _)) = self.peek() else {
            return Err(ConditionError::UnexpectedToken {
                found: "end of expression".to_string(),
                expected: "a value",
                position,
            });
        };
        self.pos += 1;
        match token {
            Token::Number(n) => Ok(Value::from(n)),
            Token::Str(s) => Ok(Value::String(s)),
            Token::LParen => {
                let value = self.or()?;
                self.expect(Token::RParen, "')'")?;
                Ok(value)
            }
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                "null" | "undefined" => Ok(Value::Null),
                "row" => self.path(Target::Row),
                "columns" => self.path(Target::Columns),
                _ => Err(ConditionError::UnknownIdentifier(name)),
            },
            other => Err(ConditionError::UnexpectedToken {
                found: other.describe(),
                expected: "a value",
                position,
            }),
        }
    }

    fn path(&mut self, mut target: Target) -> Result<Value, ConditionError> {
        loop {
            if self.eat(&Token::Dot) {
                let position = self.position();
                let name = match self.peek() {
                    Some((Token::Ident(name), _)) => name,
                    other => {
                        return Err(ConditionError::UnexpectedToken {
                            found: other
                                .map(|(t, _)| t.describe())
                                .unwrap_or_else(|| "end of expression".to_string()),
                            expected: "a property name",
                            position,
                        });
                    }
                };
                self.pos += 1;
                target = self.member(target, &Value::String(name));
            } else if self.eat(&Token::LBracket) {
                let key = self.or()?;
                self.expect(Token::RBracket, "']'")?;
                target = self.member(target, &key);
            } else {
                break;
            }
        }
        Ok(match target {
            Target::Row => Value::Object(self.scope.object.clone()),
            Target::Columns => Value::from(self.scope.column_count),
            Target::Value(v) => v,
        })
    }

    fn member(&self, target: Target, key: &Value) -> Target {
        let value = match target {
            Target::Row => match key {
                Value::Number(_) => match (self.scope.row, array_index(key)) {
                    (Row::Compact(values), Some(i)) => values.get(i).cloned().unwrap_or(Value::Null),
                    _ => Value::Null,
                },
                Value::String(name) if name == "length" => match self.scope.row {
                    Row::Compact(values) => Value::from(values.len()),
                    Row::Plain(_) => Value::Null,
                },
                Value::String(name) => self
                    .scope
                    .object
                    .get(name)
                    .cloned()
                    .or_else(|| match self.scope.row {
                        Row::Plain(obj) => obj.get(name).cloned(),
                        Row::Compact(_) => None,
                    })
                    .unwrap_or(Value::Null),
                _ => Value::Null,
            },
            Target::Columns => match key {
                Value::String(name) if name == "length" => Value::from(self.scope.column_count),
                _ => Value::Null,
            },
            Target::Value(value) => match (&value, key) {
                (Value::Object(obj), Value::String(name)) => obj.get(name).cloned().unwrap_or(Value::Null),
                (Value::Array(items), Value::Number(_)) => array_index(key)
                    .and_then(|i| items.get(i).cloned())
                    .unwrap_or(Value::Null),
                (Value::Array(items), Value::String(name)) if name == "length" => Value::from(items.len()),
                (Value::String(s), Value::String(name)) if name == "length" => Value::from(s.chars().count()),
                _ => Value::Null,
            },
        };
        Target::Value(value)
    }
}

/// A non-negative integral number as an index.
fn array_index(key: &Value) -> Option<usize> {
    key.as_f64()
        .filter(|f| *f >= 0.0 && f.fract() == 0.0)
        .map(|f| f as usize)
}

fn compare(op: &Token, left: &Value, right: &Value) -> bool {
    match op {
        Token::Eq => loose_eq(left, right),
        Token::Ne => !loose_eq(left, right),
        Token::StrictEq => strict_eq(left, right),
        Token::StrictNe => !strict_eq(left, right),
        _ => {
            let ordering = match (left, right) {
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                _ => match (as_number(left), as_number(right)) {
                    (Some(a), Some(b)) => a.partial_cmp(&b),
                    _ => None,
                },
            };
            let Some(ordering) = ordering else {
                return false;
            };
            match op {
                Token::Lt => ordering.is_lt(),
                Token::Le => ordering.is_le(),
                Token::Gt => ordering.is_gt(),
                Token::Ge => ordering.is_ge(),
                _ => false,
            }
        }
    }
}

fn strict_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}
