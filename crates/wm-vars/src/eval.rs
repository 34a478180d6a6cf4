//! Sandboxed expression evaluator
//!
//! Evaluates the inside of an `EVAL(..)` value: arithmetic, comparison
//! and string operations plus a fixed whitelist of helpers. This is a
//! closed interpreter over its own token set — there is no path from an
//! expression to host code, so the engine alone can never run arbitrary
//! code. Constructs outside the sandbox surface as `Unsupported`, which
//! the caller may route to the injected native-evaluation capability.

use thiserror::Error;
use wm_core::VariableValue;

/// Errors from the sandbox; both variants are candidates for the
/// native-evaluation fallback
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("expression syntax error: {0}")]
    Syntax(String),
    #[error("unsupported construct: {0}")]
    Unsupported(String),
}

/// A value inside the sandbox
#[derive(Debug, Clone, PartialEq)]
pub enum EvalValue {
    Num(f64),
    Str(String),
    Bool(bool),
}

impl EvalValue {
    /// Numeric coercion; strings parse, booleans become 0/1, anything
    /// else is NaN
    fn as_number(&self) -> f64 {
        match self {
            EvalValue::Num(n) => *n,
            EvalValue::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            EvalValue::Str(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
        }
    }

    fn truthy(&self) -> bool {
        match self {
            EvalValue::Bool(b) => *b,
            EvalValue::Num(n) => *n != 0.0 && !n.is_nan(),
            EvalValue::Str(s) => !s.is_empty(),
        }
    }

    fn as_text(&self) -> String {
        match self {
            EvalValue::Str(s) => s.clone(),
            EvalValue::Num(n) => VariableValue::Num(*n).to_string(),
            EvalValue::Bool(b) => b.to_string(),
        }
    }

    /// Convert into the macro value model
    pub fn into_variable_value(self) -> VariableValue {
        match self {
            EvalValue::Num(n) => VariableValue::Num(n),
            EvalValue::Str(s) => VariableValue::Str(s),
            EvalValue::Bool(b) => VariableValue::Str(b.to_string()),
        }
    }
}

/// Evaluate one expression inside the sandbox
pub fn evaluate(input: &str) -> Result<EvalValue, EvalError> {
    let tokens = lex(input)?;
    let mut parser = ExprParser {
        tokens,
        position: 0,
    };
    let expr = parser.parse_ternary()?;
    parser.expect_end()?;
    eval_expr(&expr)
}

// --- Lexer ---

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Str(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Bang,
    Question,
    Colon,
    LParen,
    RParen,
    Comma,
}

fn lex(input: &str) -> Result<Vec<Token>, EvalError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '0'..='9' | '.' => {
                let mut text = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        text.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let n = text
                    .parse()
                    .map_err(|_| EvalError::Syntax(format!("bad number: {text}")))?;
                tokens.push(Token::Num(n));
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut text = String::new();
                let mut closed = false;
                while let Some(d) = chars.next() {
                    if d == '\\' {
                        match chars.next() {
                            Some('n') => text.push('\n'),
                            Some('t') => text.push('\t'),
                            Some(other) => text.push(other),
                            None => break,
                        }
                    } else if d == quote {
                        closed = true;
                        break;
                    } else {
                        text.push(d);
                    }
                }
                if !closed {
                    return Err(EvalError::Syntax("unterminated string".to_string()));
                }
                tokens.push(Token::Str(text));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut text = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' || d == '.' || d == '$' {
                        text.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(text));
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '%' => {
                chars.next();
                tokens.push(Token::Percent);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '?' => {
                chars.next();
                tokens.push(Token::Question);
            }
            ':' => {
                chars.next();
                tokens.push(Token::Colon);
            }
            '=' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    // Tolerate the === spelling.
                    if chars.peek() == Some(&'=') {
                        chars.next();
                    }
                    tokens.push(Token::EqEq);
                } else {
                    return Err(EvalError::Unsupported("assignment".to_string()));
                }
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    if chars.peek() == Some(&'=') {
                        chars.next();
                    }
                    tokens.push(Token::NotEq);
                } else {
                    tokens.push(Token::Bang);
                }
            }
            '<' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Le);
                } else {
                    tokens.push(Token::Lt);
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Ge);
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '&' => {
                chars.next();
                if chars.peek() == Some(&'&') {
                    chars.next();
                    tokens.push(Token::AndAnd);
                } else {
                    return Err(EvalError::Unsupported("bitwise and".to_string()));
                }
            }
            '|' => {
                chars.next();
                if chars.peek() == Some(&'|') {
                    chars.next();
                    tokens.push(Token::OrOr);
                } else {
                    return Err(EvalError::Unsupported("bitwise or".to_string()));
                }
            }
            other => {
                return Err(EvalError::Unsupported(format!("character '{other}'")));
            }
        }
    }

    Ok(tokens)
}

// --- Parser ---

#[derive(Debug, Clone)]
enum Expr {
    Num(f64),
    Str(String),
    Bool(bool),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

struct ExprParser {
    tokens: Vec<Token>,
    position: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expect_end(&self) -> Result<(), EvalError> {
        if self.position == self.tokens.len() {
            Ok(())
        } else {
            Err(EvalError::Syntax("unexpected trailing tokens".to_string()))
        }
    }

    fn parse_ternary(&mut self) -> Result<Expr, EvalError> {
        let cond = self.parse_or()?;
        if self.eat(&Token::Question) {
            let then = self.parse_ternary()?;
            if !self.eat(&Token::Colon) {
                return Err(EvalError::Syntax("expected ':'".to_string()));
            }
            let otherwise = self.parse_ternary()?;
            return Ok(Expr::Ternary(
                Box::new(cond),
                Box::new(then),
                Box::new(otherwise),
            ));
        }
        Ok(cond)
    }

    fn parse_or(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::OrOr) {
            let right = self.parse_and()?;
            left = Expr::Binary(BinOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_equality()?;
        while self.eat(&Token::AndAnd) {
            let right = self.parse_equality()?;
            left = Expr::Binary(BinOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinOp::Eq,
                Some(Token::NotEq) => BinOp::Ne,
                _ => break,
            };
            self.position += 1;
            let right = self.parse_comparison()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinOp::Lt,
                Some(Token::Le) => BinOp::Le,
                Some(Token::Gt) => BinOp::Gt,
                Some(Token::Ge) => BinOp::Ge,
                _ => break,
            };
            self.position += 1;
            let right = self.parse_additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.position += 1;
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Rem,
                _ => break,
            };
            self.position += 1;
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, EvalError> {
        if self.eat(&Token::Minus) {
            return Ok(Expr::Neg(Box::new(self.parse_unary()?)));
        }
        if self.eat(&Token::Bang) {
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, EvalError> {
        match self.advance() {
            Some(Token::Num(n)) => Ok(Expr::Num(n)),
            Some(Token::Str(s)) => Ok(Expr::Str(s)),
            Some(Token::LParen) => {
                let inner = self.parse_ternary()?;
                if !self.eat(&Token::RParen) {
                    return Err(EvalError::Syntax("expected ')'".to_string()));
                }
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                match name.as_str() {
                    "true" => return Ok(Expr::Bool(true)),
                    "false" => return Ok(Expr::Bool(false)),
                    _ => {}
                }
                if self.eat(&Token::LParen) {
                    let mut args = Vec::new();
                    if !self.eat(&Token::RParen) {
                        loop {
                            args.push(self.parse_ternary()?);
                            if self.eat(&Token::RParen) {
                                break;
                            }
                            if !self.eat(&Token::Comma) {
                                return Err(EvalError::Syntax(
                                    "expected ',' or ')'".to_string(),
                                ));
                            }
                        }
                    }
                    Ok(Expr::Call(name, args))
                } else {
                    // No variable environment in the sandbox; macro
                    // references are expanded before evaluation.
                    Err(EvalError::Unsupported(format!("identifier '{name}'")))
                }
            }
            Some(other) => Err(EvalError::Syntax(format!("unexpected token {other:?}"))),
            None => Err(EvalError::Syntax("empty expression".to_string())),
        }
    }
}

// --- Evaluator ---

fn eval_expr(expr: &Expr) -> Result<EvalValue, EvalError> {
    match expr {
        Expr::Num(n) => Ok(EvalValue::Num(*n)),
        Expr::Str(s) => Ok(EvalValue::Str(s.clone())),
        Expr::Bool(b) => Ok(EvalValue::Bool(*b)),
        Expr::Neg(inner) => Ok(EvalValue::Num(-eval_expr(inner)?.as_number())),
        Expr::Not(inner) => Ok(EvalValue::Bool(!eval_expr(inner)?.truthy())),
        Expr::Ternary(cond, then, otherwise) => {
            if eval_expr(cond)?.truthy() {
                eval_expr(then)
            } else {
                eval_expr(otherwise)
            }
        }
        Expr::Binary(op, left, right) => eval_binary(*op, left, right),
        Expr::Call(name, args) => eval_call(name, args),
    }
}

fn eval_binary(op: BinOp, left: &Expr, right: &Expr) -> Result<EvalValue, EvalError> {
    // Short-circuit forms first.
    match op {
        BinOp::And => {
            let lhs = eval_expr(left)?;
            return if lhs.truthy() { eval_expr(right) } else { Ok(lhs) };
        }
        BinOp::Or => {
            let lhs = eval_expr(left)?;
            return if lhs.truthy() { Ok(lhs) } else { eval_expr(right) };
        }
        _ => {}
    }

    let lhs = eval_expr(left)?;
    let rhs = eval_expr(right)?;

    let value = match op {
        BinOp::Add => {
            if matches!(lhs, EvalValue::Str(_)) || matches!(rhs, EvalValue::Str(_)) {
                // String wins, as in the macro ADD rules.
                let ln = lhs.as_number();
                let rn = rhs.as_number();
                if !ln.is_nan() && !rn.is_nan() {
                    EvalValue::Num(ln + rn)
                } else {
                    EvalValue::Str(format!("{}{}", lhs.as_text(), rhs.as_text()))
                }
            } else {
                EvalValue::Num(lhs.as_number() + rhs.as_number())
            }
        }
        BinOp::Sub => EvalValue::Num(lhs.as_number() - rhs.as_number()),
        BinOp::Mul => EvalValue::Num(lhs.as_number() * rhs.as_number()),
        BinOp::Div => EvalValue::Num(lhs.as_number() / rhs.as_number()),
        BinOp::Rem => EvalValue::Num(lhs.as_number() % rhs.as_number()),
        BinOp::Eq => EvalValue::Bool(loose_eq(&lhs, &rhs)),
        BinOp::Ne => EvalValue::Bool(!loose_eq(&lhs, &rhs)),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ln = lhs.as_number();
            let rn = rhs.as_number();
            let result = if !ln.is_nan() && !rn.is_nan() {
                match op {
                    BinOp::Lt => ln < rn,
                    BinOp::Le => ln <= rn,
                    BinOp::Gt => ln > rn,
                    _ => ln >= rn,
                }
            } else {
                let ls = lhs.as_text();
                let rs = rhs.as_text();
                match op {
                    BinOp::Lt => ls < rs,
                    BinOp::Le => ls <= rs,
                    BinOp::Gt => ls > rs,
                    _ => ls >= rs,
                }
            };
            EvalValue::Bool(result)
        }
        BinOp::And | BinOp::Or => unreachable!("short-circuited above"),
    };

    Ok(value)
}

fn loose_eq(lhs: &EvalValue, rhs: &EvalValue) -> bool {
    let ln = lhs.as_number();
    let rn = rhs.as_number();
    if !ln.is_nan() && !rn.is_nan() {
        ln == rn
    } else {
        lhs.as_text() == rhs.as_text()
    }
}

fn eval_call(name: &str, args: &[Expr]) -> Result<EvalValue, EvalError> {
    let short = name
        .strip_prefix("Math.")
        .or_else(|| name.strip_prefix("math."))
        .unwrap_or(name);

    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(eval_expr(arg)?);
    }

    let arity = |n: usize| -> Result<(), EvalError> {
        if values.len() == n {
            Ok(())
        } else {
            Err(EvalError::Syntax(format!(
                "{short} expects {n} argument(s), got {}",
                values.len()
            )))
        }
    };

    let num = |i: usize| values[i].as_number();

    let value = match short {
        "abs" => {
            arity(1)?;
            EvalValue::Num(num(0).abs())
        }
        "ceil" => {
            arity(1)?;
            EvalValue::Num(num(0).ceil())
        }
        "floor" => {
            arity(1)?;
            EvalValue::Num(num(0).floor())
        }
        "round" => {
            arity(1)?;
            EvalValue::Num(num(0).round())
        }
        "sqrt" => {
            arity(1)?;
            EvalValue::Num(num(0).sqrt())
        }
        "pow" => {
            arity(2)?;
            EvalValue::Num(num(0).powf(num(1)))
        }
        "min" => {
            if values.is_empty() {
                return Err(EvalError::Syntax("min expects arguments".to_string()));
            }
            EvalValue::Num(
                (0..values.len())
                    .map(num)
                    .fold(f64::INFINITY, f64::min),
            )
        }
        "max" => {
            if values.is_empty() {
                return Err(EvalError::Syntax("max expects arguments".to_string()));
            }
            EvalValue::Num(
                (0..values.len())
                    .map(num)
                    .fold(f64::NEG_INFINITY, f64::max),
            )
        }
        "parseInt" => {
            arity(1)?;
            EvalValue::Num(parse_leading(&values[0].as_text(), false))
        }
        "parseFloat" => {
            arity(1)?;
            EvalValue::Num(parse_leading(&values[0].as_text(), true))
        }
        "now" => {
            arity(0)?;
            EvalValue::Num(chrono::Utc::now().timestamp_millis() as f64)
        }
        other => return Err(EvalError::Unsupported(format!("function '{other}'"))),
    };

    Ok(value)
}

/// Parse the leading numeric prefix of a string; NaN when there is none
fn parse_leading(text: &str, float: bool) -> f64 {
    let trimmed = text.trim_start();
    let mut end = 0;
    let bytes = trimmed.as_bytes();

    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if float && end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    if end == digits_start {
        return f64::NAN;
    }

    let parsed: f64 = trimmed[..end].parse().unwrap_or(f64::NAN);
    if float {
        parsed
    } else {
        parsed.trunc()
    }
}
