// Copyright (c) 2025 - Cowboy AI, Inc.

//! Recursive-descent parser for the expression pipeline grammar
//!
//! ```text
//! predicate := pipeline ( ('==' | '!=') literal )?
//! pipeline  := path ( '|' stage )*
//! stage     := ident ( '(' args? ')' )?
//! args      := literal ( ',' literal )*
//! path      := segment ( '.' segment )*
//! literal   := 'str' | "str" | number | true | false
//! ```
//!
//! All structural validation happens here: unknown filter names, wrong
//! argument counts and unsupported tests are rejected at parse time so a
//! malformed rule fails the configuration load, never a per-host build.

use serde_json::Value;

use super::{Comparison, Expression, ExpressionError, Predicate, Stage};

pub(super) fn parse_expression(input: &str) -> Result<Expression, ExpressionError> {
    let mut parser = Parser::new(input);
    let expression = parser.pipeline()?;
    parser.skip_ws();
    if let Some(ch) = parser.peek() {
        return Err(ExpressionError::UnexpectedChar(ch, parser.pos));
    }
    Ok(expression)
}

pub(super) fn parse_predicate(input: &str) -> Result<Predicate, ExpressionError> {
    let mut parser = Parser::new(input);
    let expr = parser.pipeline()?;
    parser.skip_ws();

    let comparison = match (parser.peek(), parser.peek_at(1)) {
        (Some('='), Some('=')) => {
            parser.bump_n(2);
            Some((Comparison::Eq, parser.literal()?))
        }
        (Some('!'), Some('=')) => {
            parser.bump_n(2);
            Some((Comparison::Ne, parser.literal()?))
        }
        _ => None,
    };

    parser.skip_ws();
    if let Some(ch) = parser.peek() {
        return Err(ExpressionError::UnexpectedChar(ch, parser.pos));
    }
    Ok(Predicate { expr, comparison })
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    source: String,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            source: input.to_string(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        Some(ch)
    }

    fn bump_n(&mut self, n: usize) {
        self.pos += n;
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(ch) if ch.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), ExpressionError> {
        match self.peek() {
            Some(ch) if ch == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(ch) => Err(ExpressionError::UnexpectedChar(ch, self.pos)),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }

    fn pipeline(&mut self) -> Result<Expression, ExpressionError> {
        self.skip_ws();
        let path = self.path()?;
        let mut stages = Vec::new();

        loop {
            self.skip_ws();
            // '==' / '!=' belong to the enclosing predicate
            match (self.peek(), self.peek_at(1)) {
                (Some('|'), _) => {
                    self.bump();
                    stages.push(self.stage()?);
                }
                _ => break,
            }
        }

        Ok(Expression {
            source: self.source.clone(),
            path,
            stages,
        })
    }

    fn path(&mut self) -> Result<String, ExpressionError> {
        let mut path = self.segment()?;
        while self.peek() == Some('.') {
            self.bump();
            path.push('.');
            path.push_str(&self.segment()?);
        }
        Ok(path)
    }

    fn segment(&mut self) -> Result<String, ExpressionError> {
        let mut segment = String::new();
        while matches!(self.peek(), Some(ch) if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
        {
            segment.push(self.bump().unwrap());
        }
        if segment.is_empty() {
            match self.peek() {
                Some(ch) => Err(ExpressionError::UnexpectedChar(ch, self.pos)),
                None => Err(ExpressionError::UnexpectedEnd),
            }
        } else {
            Ok(segment)
        }
    }

    fn stage(&mut self) -> Result<Stage, ExpressionError> {
        self.skip_ws();
        let name = self.segment()?;
        self.skip_ws();

        let args = if self.peek() == Some('(') {
            self.bump();
            let args = self.arguments()?;
            self.expect(')')?;
            args
        } else {
            Vec::new()
        };

        match (name.as_str(), args.len()) {
            ("default", 1) => Ok(Stage::Default(args.into_iter().next().unwrap())),
            ("split", 1) => match &args[0] {
                Value::String(sep) if !sep.is_empty() => Ok(Stage::Split(sep.clone())),
                _ => Err(ExpressionError::InvalidArgument(
                    "split".to_string(),
                    "separator must be a non-empty string".to_string(),
                )),
            },
            ("reject", 2) => {
                let mut args = args.into_iter();
                let test = args.next().unwrap();
                match test {
                    Value::String(ref name) if name == "equalto" => {
                        Ok(Stage::RejectEqualTo(args.next().unwrap()))
                    }
                    other => Err(ExpressionError::UnknownTest(stringify_test(&other))),
                }
            }
            ("list", 0) => Ok(Stage::List),
            ("default", n) => Err(ExpressionError::WrongArity("default".to_string(), 1, n)),
            ("split", n) => Err(ExpressionError::WrongArity("split".to_string(), 1, n)),
            ("reject", n) => Err(ExpressionError::WrongArity("reject".to_string(), 2, n)),
            ("list", n) => Err(ExpressionError::WrongArity("list".to_string(), 0, n)),
            _ => Err(ExpressionError::UnknownFilter(name)),
        }
    }

    fn arguments(&mut self) -> Result<Vec<Value>, ExpressionError> {
        let mut args = Vec::new();
        self.skip_ws();
        if self.peek() == Some(')') {
            return Ok(args);
        }
        loop {
            args.push(self.literal()?);
            self.skip_ws();
            if self.peek() == Some(',') {
                self.bump();
            } else {
                return Ok(args);
            }
        }
    }

    fn literal(&mut self) -> Result<Value, ExpressionError> {
        self.skip_ws();
        match self.peek() {
            Some(quote @ ('\'' | '"')) => {
                let start = self.pos;
                self.bump();
                let mut text = String::new();
                loop {
                    match self.bump() {
                        Some(ch) if ch == quote => break,
                        Some(ch) => text.push(ch),
                        None => return Err(ExpressionError::UnterminatedString(start)),
                    }
                }
                Ok(Value::String(text))
            }
            Some(ch) if ch.is_ascii_digit() || ch == '-' => self.number(),
            Some(ch) if ch.is_ascii_alphabetic() => {
                let word = self.segment()?;
                match word.as_str() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    _ => Err(ExpressionError::InvalidLiteral(word)),
                }
            }
            Some(ch) => Err(ExpressionError::UnexpectedChar(ch, self.pos)),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }

    fn number(&mut self) -> Result<Value, ExpressionError> {
        let mut text = String::new();
        if self.peek() == Some('-') {
            text.push(self.bump().unwrap());
        }
        while matches!(self.peek(), Some(ch) if ch.is_ascii_digit() || ch == '.') {
            text.push(self.bump().unwrap());
        }
        serde_json::from_str::<Value>(&text)
            .ok()
            .filter(Value::is_number)
            .ok_or(ExpressionError::InvalidLiteral(text))
    }
}

fn stringify_test(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
