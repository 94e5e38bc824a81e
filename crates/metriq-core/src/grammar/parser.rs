//! Query text parser: recursive descent from text to a [`ParseNode`] tree.
//!
//! Grammar:
//! ```text
//! query       := graph_query | alert_query
//! graph_query := time_point ['to' time_point] expression
//! alert_query := expression trigger 'do' name
//! trigger     := comparator number (('and' | 'or') comparator number)* ['for' relative]
//! time_point  := relative | date time | time
//! expression  := additive additive* (connector additive)*
//! connector   := '|' | '>|' | '&'
//! additive    := multiplicative (('+' | '-') multiplicative)*
//! multiplicative := primary (('*' | '/') primary)*
//! primary     := '(' expression ')' | number | metric | function
//! metric      := 'm' '(' metric_arg (',' metric_arg)* ')'
//! function    := name ['(' [argument (',' argument)*] ')']
//! argument    := string | number | percent | boolean | relative
//! ```

use std::fmt;

use tracing::trace;

use super::ast::ParseNode;
use crate::error::{Error, Result};

const KEYWORDS: [&str; 5] = ["to", "for", "do", "and", "or"];

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Str(String),
    Number(String),
    /// Digits with a unit suffix, e.g. `30m`
    Duration(i64, String),
    Word(String),
    /// `am` / `pm` written straight after a number
    Meridiem(String),
    Symbol(&'static str),
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "\"{s}\""),
            Self::Number(n) => write!(f, "{n}"),
            Self::Duration(amount, unit) => write!(f, "{amount}{unit}"),
            Self::Word(w) | Self::Meridiem(w) => write!(f, "{w}"),
            Self::Symbol(s) => write!(f, "'{s}'"),
            Self::Eof => write!(f, "end of query"),
        }
    }
}

// Longest first so `>|` wins over `>`
const SYMBOLS: [&str; 20] = [
    ">|", ">=", "<=", "==", "(", ")", "[", "]", ",", "|", "&", "+", "-", "*", "/", "%", ":", ">", "<", "=",
];

/// Parse query text into a parse tree
pub fn parse(text: &str) -> Result<ParseNode> {
    let mut parser = Parser {
        tokens: tokenize(text)?,
        pos: 0,
    };

    let node = if parser.starts_time_point() {
        parser.graph_query()?
    } else {
        parser.alert_query()?
    };

    if *parser.peek() != Token::Eof {
        return Err(parser.unexpected("the end of the query"));
    }

    trace!(?node, "Parsed query");
    Ok(node)
}

// ── Tokenizer ──

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c == '"' || c == '\'' {
            let start = i;
            i += 1;
            while i < chars.len() && chars[i] != c {
                i += 1;
            }
            if i >= chars.len() {
                return Err(Error::parse(format!("Unterminated string at position {start}")));
            }
            tokens.push((Token::Str(chars[start + 1..i].iter().collect()), start));
            i += 1;
            continue;
        }

        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            let number: String = chars[start..i].iter().collect();

            let suffix_start = i;
            while i < chars.len() && chars[i].is_ascii_alphabetic() {
                i += 1;
            }
            let suffix: String = chars[suffix_start..i].iter().collect();

            if suffix.is_empty() {
                tokens.push((Token::Number(number), start));
            } else if suffix.eq_ignore_ascii_case("am") || suffix.eq_ignore_ascii_case("pm") {
                tokens.push((Token::Number(number), start));
                tokens.push((Token::Meridiem(suffix.to_ascii_lowercase()), suffix_start));
            } else {
                tokens.push((Token::Duration(integer(&number)?, suffix), start));
            }
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push((Token::Word(chars[start..i].iter().collect()), start));
            continue;
        }

        let rest: String = chars[i..chars.len().min(i + 2)].iter().collect();
        match SYMBOLS.iter().find(|s| rest.starts_with(**s)) {
            Some(symbol) => {
                tokens.push((Token::Symbol(*symbol), i));
                i += symbol.len();
            }
            None => return Err(Error::parse(format!("Unexpected character '{c}' at position {i}"))),
        }
    }

    tokens.push((Token::Eof, chars.len()));
    Ok(tokens)
}

fn integer(image: &str) -> Result<i64> {
    image
        .parse()
        .map_err(|_| Error::parse(format!("Invalid integer: {image}")))
}

// ── Parser ──

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens
            .get(self.pos + offset)
            .or_else(|| self.tokens.last())
            .map_or(&Token::Eof, |(token, _)| token)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn is_symbol(&self, symbol: &str) -> bool {
        matches!(self.peek(), Token::Symbol(s) if *s == symbol)
    }

    fn eat_symbol(&mut self, symbol: &str) -> bool {
        let found = self.is_symbol(symbol);
        if found {
            self.pos += 1;
        }
        found
    }

    fn expect_symbol(&mut self, symbol: &str) -> Result<()> {
        if self.eat_symbol(symbol) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{symbol}'")))
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Token::Word(w) if w == keyword)
    }

    fn unexpected(&self, expected: &str) -> Error {
        let position = self.tokens.get(self.pos).map_or(0, |(_, p)| *p);
        Error::parse(format!(
            "Unexpected {} at position {position}, expected {expected}",
            self.peek()
        ))
    }

    // `-30m`, `30m`, `2013-01-02 ...` or `6:30...`
    fn starts_time_point(&self) -> bool {
        match (self.peek(), self.peek_at(1)) {
            (Token::Symbol("-"), Token::Duration(..)) | (Token::Duration(..), _) => true,
            (Token::Number(_), Token::Symbol(":")) => true,
            (Token::Number(_), Token::Symbol("-")) => {
                matches!(
                    (self.peek_at(2), self.peek_at(3)),
                    (Token::Number(_), Token::Symbol("-"))
                )
            }
            _ => false,
        }
    }

    fn graph_query(&mut self) -> Result<ParseNode> {
        let start = self.time_point()?;
        let end = if self.is_keyword("to") {
            self.advance();
            Some(Box::new(self.time_point()?))
        } else {
            None
        };
        let expression = self.expression()?;

        Ok(ParseNode::GraphQuery {
            start: Box::new(start),
            end,
            expression: Box::new(expression),
        })
    }

    fn alert_query(&mut self) -> Result<ParseNode> {
        let expression = self.expression()?;
        let trigger = self.trigger()?;

        if !self.is_keyword("do") {
            return Err(self.unexpected("'do' and an action name"));
        }
        self.advance();
        let action = match self.advance() {
            Token::Word(name) | Token::Str(name) => name,
            _ => {
                self.pos -= 1;
                return Err(self.unexpected("an action name"));
            }
        };

        Ok(ParseNode::AlertQuery {
            expression: Box::new(expression),
            trigger: Box::new(trigger),
            action,
        })
    }

    fn trigger(&mut self) -> Result<ParseNode> {
        let mut conditions = Vec::new();
        loop {
            match self.peek() {
                Token::Symbol(s @ (">" | ">=" | "<" | "<=" | "==" | "=")) => {
                    conditions.push(ParseNode::Comparator((*s).to_string()));
                    self.advance();
                }
                _ => return Err(self.unexpected("a comparator")),
            }
            conditions.push(self.signed_number()?);

            match self.peek() {
                Token::Word(w) if w == "and" || w == "or" => {
                    conditions.push(ParseNode::Conjunction(w.clone()));
                    self.advance();
                }
                _ => break,
            }
        }

        let duration = if self.is_keyword("for") {
            self.advance();
            Some(Box::new(self.relative_time()?))
        } else {
            None
        };

        Ok(ParseNode::Trigger { conditions, duration })
    }

    fn time_point(&mut self) -> Result<ParseNode> {
        if matches!(self.peek(), Token::Symbol("-") | Token::Duration(..)) {
            return self.relative_time();
        }

        let first = self.number_image()?;
        if self.eat_symbol("-") {
            let month = integer(&self.number_image()?)?;
            self.expect_symbol("-")?;
            let day = integer(&self.number_image()?)?;
            let hour = self.number_image()?;
            let time = self.time_of_day(&hour)?;
            return Ok(ParseNode::AbsoluteDate {
                year: integer(&first)?,
                month,
                day,
                time: Box::new(time),
            });
        }
        self.time_of_day(&first)
    }

    // the hour has already been consumed
    fn time_of_day(&mut self, hour: &str) -> Result<ParseNode> {
        self.expect_symbol(":")?;
        let minute = integer(&self.number_image()?)?;
        let meridiem = match self.peek() {
            Token::Meridiem(m) => {
                let m = m.clone();
                self.advance();
                Some(m)
            }
            _ => None,
        };
        Ok(ParseNode::AbsoluteTime {
            hour: integer(hour)?,
            minute,
            meridiem,
        })
    }

    fn number_image(&mut self) -> Result<String> {
        match self.peek() {
            Token::Number(n) => {
                let n = n.clone();
                self.advance();
                Ok(n)
            }
            _ => Err(self.unexpected("a number")),
        }
    }

    fn signed_number(&mut self) -> Result<ParseNode> {
        let sign = if self.eat_symbol("-") { "-" } else { "" };
        let image = self.number_image()?;
        Ok(ParseNode::NumberLiteral(format!("{sign}{image}")))
    }

    fn relative_time(&mut self) -> Result<ParseNode> {
        let negative = self.eat_symbol("-");
        match self.advance() {
            Token::Duration(amount, unit) => Ok(ParseNode::RelativeTime { negative, amount, unit }),
            _ => {
                self.pos -= 1;
                Err(self.unexpected("a relative time such as -30m"))
            }
        }
    }

    fn connector(&mut self) -> Option<&'static str> {
        match self.peek() {
            Token::Symbol(s @ ("|" | ">|" | "&")) => {
                let s = *s;
                self.advance();
                Some(s)
            }
            _ => None,
        }
    }

    fn starts_operand(&self) -> bool {
        match self.peek() {
            Token::Symbol("(") | Token::Number(_) => true,
            Token::Word(w) => !KEYWORDS.contains(&w.as_str()),
            _ => false,
        }
    }

    fn expression(&mut self) -> Result<ParseNode> {
        let mut children = vec![self.additive()?];
        while self.starts_operand() {
            children.push(self.additive()?);
        }
        while let Some(connector) = self.connector() {
            children.push(ParseNode::Connector(connector.to_string()));
            children.push(self.additive()?);
        }
        Ok(ParseNode::Expression(children))
    }

    fn additive(&mut self) -> Result<ParseNode> {
        let mut left = self.multiplicative()?;
        while let Token::Symbol(op @ ("+" | "-")) = self.peek() {
            let op = (*op).to_string();
            self.advance();
            let right = self.multiplicative()?;
            left = ParseNode::Math {
                op,
                children: vec![left, right],
            };
        }
        Ok(left)
    }

    fn multiplicative(&mut self) -> Result<ParseNode> {
        let mut left = self.primary()?;
        while let Token::Symbol(op @ ("*" | "/")) = self.peek() {
            let op = (*op).to_string();
            self.advance();
            let right = self.primary()?;
            left = ParseNode::Math {
                op,
                children: vec![left, right],
            };
        }
        Ok(left)
    }

    fn primary(&mut self) -> Result<ParseNode> {
        match (self.peek().clone(), self.peek_at(1).clone()) {
            (Token::Symbol("("), _) => {
                self.advance();
                let inner = self.expression()?;
                self.expect_symbol(")")?;
                Ok(inner)
            }
            (Token::Symbol("-"), Token::Number(_)) | (Token::Number(_), _) => self.signed_number(),
            (Token::Word(w), Token::Symbol("(")) if w == "m" => self.metric(),
            (Token::Word(w), _) if !KEYWORDS.contains(&w.as_str()) => self.function(),
            _ => Err(self.unexpected("a metric, function or number")),
        }
    }

    fn metric(&mut self) -> Result<ParseNode> {
        self.advance();
        self.expect_symbol("(")?;

        let mut children = Vec::new();
        loop {
            children.push(self.metric_arg()?);
            if !self.eat_symbol(",") {
                break;
            }
        }
        self.expect_symbol(")")?;
        Ok(ParseNode::Metric(children))
    }

    fn metric_arg(&mut self) -> Result<ParseNode> {
        match self.peek().clone() {
            Token::Str(s) => {
                self.advance();
                Ok(ParseNode::StringLiteral(s))
            }
            Token::Symbol("*") => {
                self.advance();
                Ok(ParseNode::string("*"))
            }
            Token::Symbol("[") => {
                self.advance();
                let mut items = Vec::new();
                loop {
                    items.push(self.metric_arg()?);
                    if !self.eat_symbol(",") {
                        break;
                    }
                }
                self.expect_symbol("]")?;

                if items.iter().all(|item| matches!(item, ParseNode::RelativeTime { .. })) {
                    Ok(ParseNode::RelativeTimeArray(items))
                } else {
                    Ok(ParseNode::StringArray(items))
                }
            }
            Token::Symbol("-") | Token::Duration(..) => self.relative_time(),
            _ => Err(self.unexpected("a metric field or relative time")),
        }
    }

    fn function(&mut self) -> Result<ParseNode> {
        let name = match self.advance() {
            Token::Word(name) => name,
            _ => {
                self.pos -= 1;
                return Err(self.unexpected("a function name"));
            }
        };

        if !self.eat_symbol("(") {
            return Ok(ParseNode::Function { name, args: None });
        }

        let mut args = Vec::new();
        if !self.eat_symbol(")") {
            loop {
                args.push(self.argument()?);
                if !self.eat_symbol(",") {
                    break;
                }
            }
            self.expect_symbol(")")?;
        }

        Ok(ParseNode::Function {
            name,
            args: Some(Box::new(ParseNode::ArgumentList(args))),
        })
    }

    fn argument(&mut self) -> Result<ParseNode> {
        match (self.peek().clone(), self.peek_at(1).clone()) {
            (Token::Str(s), _) => {
                self.advance();
                Ok(ParseNode::StringLiteral(s))
            }
            (Token::Word(w), _) if w == "true" || w == "false" => {
                self.advance();
                Ok(ParseNode::BooleanLiteral(w == "true"))
            }
            (Token::Symbol("-"), Token::Duration(..)) | (Token::Duration(..), _) => self.relative_time(),
            (Token::Symbol("-"), Token::Number(_)) | (Token::Number(_), _) => {
                let ParseNode::NumberLiteral(image) = self.signed_number()? else {
                    return Err(self.unexpected("a number"));
                };
                if self.eat_symbol("%") {
                    Ok(ParseNode::PercentLiteral(integer(&image)?))
                } else {
                    Ok(ParseNode::NumberLiteral(image))
                }
            }
            _ => Err(self.unexpected("a function argument")),
        }
    }
}
