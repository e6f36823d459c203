//! Band-arithmetic expressions evaluated per pixel over named rasters.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! conditional := or ( "?" conditional ":" conditional )?
//! or          := and ( ("||" | "or") and )*
//! and         := compare ( ("&&" | "and") compare )*
//! compare     := additive ( ("<" | "<=" | ">" | ">=" | "==" | "!=") additive )*
//! additive    := term ( ("+" | "-") term )*
//! term        := unary ( ("*" | "/" | "%") unary )*
//! unary       := ("-" | "+" | "!" | "not") unary | power
//! power       := primary ( "^" unary )?
//! primary     := number | constant | name | function "(" args ")" | "(" conditional ")"
//! ```
//!
//! Boolean results are `1.0` / `0.0`; a value is true when it is non-zero and not NaN.
use std::fmt;

use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Func {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
    Sqrt,
    Exp,
    Log,
    Log10,
    Abs,
    Floor,
    Ceil,
    Round,
    Min,
    Max,
    Pow,
    Sign,
    IsNan,
}

impl Func {
    fn lookup(name: &str) -> Option<Func> {
        Some(match name {
            "sin" => Func::Sin,
            "cos" => Func::Cos,
            "tan" => Func::Tan,
            "asin" => Func::Asin,
            "acos" => Func::Acos,
            "atan" => Func::Atan,
            "atan2" => Func::Atan2,
            "sqrt" => Func::Sqrt,
            "exp" => Func::Exp,
            "log" => Func::Log,
            "log10" => Func::Log10,
            "abs" => Func::Abs,
            "floor" => Func::Floor,
            "ceil" => Func::Ceil,
            "round" => Func::Round,
            "min" => Func::Min,
            "max" => Func::Max,
            "pow" => Func::Pow,
            "sign" => Func::Sign,
            "nan" => Func::IsNan,
            _ => return None,
        })
    }

    fn arity(self) -> usize {
        match self {
            Func::Atan2 | Func::Min | Func::Max | Func::Pow => 2,
            _ => 1,
        }
    }

    fn apply(self, args: &[f64]) -> f64 {
        let a = args[0];
        match self {
            Func::Sin => a.sin(),
            Func::Cos => a.cos(),
            Func::Tan => a.tan(),
            Func::Asin => a.asin(),
            Func::Acos => a.acos(),
            Func::Atan => a.atan(),
            Func::Atan2 => a.atan2(args[1]),
            Func::Sqrt => a.sqrt(),
            Func::Exp => a.exp(),
            Func::Log => a.ln(),
            Func::Log10 => a.log10(),
            Func::Abs => a.abs(),
            Func::Floor => a.floor(),
            Func::Ceil => a.ceil(),
            Func::Round => a.round(),
            Func::Min => a.min(args[1]),
            Func::Max => a.max(args[1]),
            Func::Pow => a.powf(args[1]),
            Func::Sign => {
                if a == 0.0 || a.is_nan() {
                    a
                } else {
                    a.signum()
                }
            }
            Func::IsNan => bool_value(a.is_nan()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Expr {
    Const(f64),
    /// Index into [`Expression::references`].
    Var(usize),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Cond(Box<Expr>, Box<Expr>, Box<Expr>),
    Call(Func, Vec<Expr>),
}

#[inline]
fn bool_value(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

#[inline]
fn truthy(v: f64) -> bool {
    v != 0.0 && !v.is_nan()
}

impl Expr {
    fn eval(&self, vars: &[f64]) -> f64 {
        match self {
            Expr::Const(v) => *v,
            Expr::Var(i) => vars[*i],
            Expr::Neg(e) => -e.eval(vars),
            Expr::Not(e) => bool_value(!truthy(e.eval(vars))),
            Expr::Binary(op, a, b) => {
                let (a, b) = (a.eval(vars), b.eval(vars));
                match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    BinOp::Div => a / b,
                    BinOp::Rem => a % b,
                    BinOp::Pow => a.powf(b),
                    BinOp::Lt => bool_value(a < b),
                    BinOp::Le => bool_value(a <= b),
                    BinOp::Gt => bool_value(a > b),
                    BinOp::Ge => bool_value(a >= b),
                    BinOp::Eq => bool_value(a == b),
                    BinOp::Ne => bool_value(a != b),
                }
            }
            Expr::And(a, b) => bool_value(truthy(a.eval(vars)) && truthy(b.eval(vars))),
            Expr::Or(a, b) => bool_value(truthy(a.eval(vars)) || truthy(b.eval(vars))),
            Expr::Cond(c, a, b) => {
                if truthy(c.eval(vars)) {
                    a.eval(vars)
                } else {
                    b.eval(vars)
                }
            }
            Expr::Call(func, args) => match args.as_slice() {
                [a] => func.apply(&[a.eval(vars)]),
                [a, b] => func.apply(&[a.eval(vars), b.eval(vars)]),
                _ => f64::NAN,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
    Question,
    Colon,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(v) => write!(f, "{v}"),
            Token::Ident(s) => f.write_str(s),
            Token::Op(op) => f.write_str(op),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::Comma => f.write_str(","),
            Token::Question => f.write_str("?"),
            Token::Colon => f.write_str(":"),
        }
    }
}

const OPERATORS: [&str; 15] = [
    "<=", ">=", "==", "!=", "&&", "||", "<", ">", "+", "-", "*", "/", "%", "^", "!",
];

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let c = bytes[pos] as char;
        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }
        let start = pos;
        if c.is_ascii_digit() || (c == '.' && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit)) {
            while pos < bytes.len() && (bytes[pos].is_ascii_digit() || bytes[pos] == b'.') {
                pos += 1;
            }
            if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
                let mut exp = pos + 1;
                if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
                    exp += 1;
                }
                if exp < bytes.len() && bytes[exp].is_ascii_digit() {
                    pos = exp;
                    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                        pos += 1;
                    }
                }
            }
            let text = &source[start..pos];
            let value = text.parse::<f64>().map_err(|_| {
                Error::Expression(format!("invalid number '{text}' at {start}"))
            })?;
            tokens.push((start, Token::Number(value)));
            continue;
        }
        if c.is_ascii_alphabetic() || c == '_' {
            while pos < bytes.len()
                && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_' || bytes[pos] == b'.')
            {
                pos += 1;
            }
            tokens.push((start, Token::Ident(source[start..pos].to_owned())));
            continue;
        }
        let single = match c {
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            ',' => Some(Token::Comma),
            '?' => Some(Token::Question),
            ':' => Some(Token::Colon),
            _ => None,
        };
        if let Some(token) = single {
            tokens.push((start, token));
            pos += 1;
            continue;
        }
        match OPERATORS.iter().find(|op| source[pos..].starts_with(**op)) {
            Some(op) => {
                tokens.push((start, Token::Op(op)));
                pos += op.len();
            }
            None => {
                let ch = source[pos..].chars().next().unwrap_or('?');
                return Err(Error::Expression(format!(
                    "unexpected character '{ch}' at {start}"
                )));
            }
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [(usize, Token)],
    pos: usize,
    end: usize,
    references: Vec<String>,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(p, _)| *p)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        token
    }

    fn eat_op(&mut self, ops: &[&str]) -> Option<&'static str> {
        match self.peek() {
            Some(Token::Op(op)) if ops.contains(op) => {
                let op = *op;
                self.pos += 1;
                Some(op)
            }
            Some(Token::Ident(word)) if ops.contains(&word.as_str()) => {
                let op = ops.iter().copied().find(|o| *o == word)?;
                self.pos += 1;
                keyword_op(op)
            }
            _ => None,
        }
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        let offset = self.offset();
        match self.next() {
            Some(t) if t == expected => Ok(()),
            Some(t) => Err(Error::Expression(format!(
                "expected '{expected}' but found '{t}' at {offset}"
            ))),
            None => Err(Error::Expression(format!(
                "expected '{expected}' at end of expression"
            ))),
        }
    }

    fn conditional(&mut self) -> Result<Expr> {
        let cond = self.or()?;
        if self.peek() == Some(&Token::Question) {
            self.pos += 1;
            let a = self.conditional()?;
            self.expect(Token::Colon)?;
            let b = self.conditional()?;
            return Ok(Expr::Cond(Box::new(cond), Box::new(a), Box::new(b)));
        }
        Ok(cond)
    }

    fn or(&mut self) -> Result<Expr> {
        let mut lhs = self.and()?;
        while self.eat_op(&["||", "or"]).is_some() {
            let rhs = self.and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr> {
        let mut lhs = self.compare()?;
        while self.eat_op(&["&&", "and"]).is_some() {
            let rhs = self.compare()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn compare(&mut self) -> Result<Expr> {
        let mut lhs = self.additive()?;
        while let Some(op) = self.eat_op(&["<", "<=", ">", ">=", "==", "!="]) {
            let op = match op {
                "<" => BinOp::Lt,
                "<=" => BinOp::Le,
                ">" => BinOp::Gt,
                ">=" => BinOp::Ge,
                "==" => BinOp::Eq,
                _ => BinOp::Ne,
            };
            let rhs = self.additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn additive(&mut self) -> Result<Expr> {
        let mut lhs = self.term()?;
        while let Some(op) = self.eat_op(&["+", "-"]) {
            let op = if op == "+" { BinOp::Add } else { BinOp::Sub };
            let rhs = self.term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr> {
        let mut lhs = self.unary()?;
        while let Some(op) = self.eat_op(&["*", "/", "%"]) {
            let op = match op {
                "*" => BinOp::Mul,
                "/" => BinOp::Div,
                _ => BinOp::Rem,
            };
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr> {
        match self.eat_op(&["-", "+", "!", "not"]) {
            Some("-") => Ok(Expr::Neg(Box::new(self.unary()?))),
            Some("+") => self.unary(),
            Some(_) => Ok(Expr::Not(Box::new(self.unary()?))),
            None => self.power(),
        }
    }

    fn power(&mut self) -> Result<Expr> {
        let base = self.primary()?;
        if self.eat_op(&["^"]).is_some() {
            let exponent = self.unary()?;
            return Ok(Expr::Binary(BinOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr> {
        let offset = self.offset();
        match self.next() {
            Some(Token::Number(v)) => Ok(Expr::Const(v)),
            Some(Token::LParen) => {
                let inner = self.conditional()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    return self.call(&name, offset);
                }
                Ok(match name.as_str() {
                    "PI" => Expr::Const(std::f64::consts::PI),
                    "E" => Expr::Const(std::f64::consts::E),
                    "NaN" => Expr::Const(f64::NAN),
                    "true" => Expr::Const(1.0),
                    "false" => Expr::Const(0.0),
                    "and" | "or" | "not" => {
                        return Err(Error::Expression(format!(
                            "unexpected keyword '{name}' at {offset}"
                        )))
                    }
                    _ => Expr::Var(self.reference(name)),
                })
            }
            Some(t) => Err(Error::Expression(format!(
                "unexpected '{t}' at {offset}"
            ))),
            None => Err(Error::Expression("unexpected end of expression".into())),
        }
    }

    fn call(&mut self, name: &str, offset: usize) -> Result<Expr> {
        let func = Func::lookup(name)
            .ok_or_else(|| Error::Expression(format!("unknown function '{name}' at {offset}")))?;
        self.expect(Token::LParen)?;
        let mut args = Vec::new();
        if self.peek() != Some(&Token::RParen) {
            args.push(self.conditional()?);
            while self.peek() == Some(&Token::Comma) {
                self.pos += 1;
                args.push(self.conditional()?);
            }
        }
        self.expect(Token::RParen)?;
        if args.len() != func.arity() {
            return Err(Error::Expression(format!(
                "function '{name}' expects {} argument(s), got {}",
                func.arity(),
                args.len()
            )));
        }
        Ok(Expr::Call(func, args))
    }

    fn reference(&mut self, name: String) -> usize {
        match self.references.iter().position(|r| *r == name) {
            Some(i) => i,
            None => {
                self.references.push(name);
                self.references.len() - 1
            }
        }
    }
}

fn keyword_op(word: &str) -> Option<&'static str> {
    match word {
        "and" => Some("and"),
        "or" => Some("or"),
        "not" => Some("not"),
        _ => None,
    }
}

/// A parsed expression together with the raster names it references.
#[derive(Clone, Debug, PartialEq)]
pub struct Expression {
    source: String,
    ast: Expr,
    references: Vec<String>,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(Error::Expression("empty expression".into()));
        }
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            end: source.len(),
            references: Vec::new(),
        };
        let ast = parser.conditional()?;
        if let Some((offset, token)) = tokens.get(parser.pos) {
            return Err(Error::Expression(format!(
                "unexpected '{token}' at {offset}"
            )));
        }
        Ok(Self {
            source: source.to_owned(),
            ast,
            references: parser.references,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Distinct raster names in order of first appearance.
    pub fn references(&self) -> &[String] {
        &self.references
    }

    /// Evaluates with `values[i]` bound to `references()[i]`.
    pub fn eval(&self, values: &[f64]) -> f64 {
        debug_assert_eq!(values.len(), self.references.len());
        self.ast.eval(values)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn eval(source: &str, values: &[f64]) -> f64 {
        Expression::parse(source).unwrap().eval(values)
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(eval("1 + 2 * 3", &[]), 7.0);
        assert_eq!(eval("(1 + 2) * 3", &[]), 9.0);
        assert_eq!(eval("2 ^ 3 ^ 2", &[]), 512.0);
        assert_eq!(eval("-2 ^ 2", &[]), -4.0);
        assert_eq!(eval("7 % 4 - 10 / 4", &[]), 0.5);
        assert_eq!(eval("1.5e2 + .5", &[]), 150.5);
    }

    #[test]
    fn references_are_collected_once() {
        let expr = Expression::parse("(b8 - b4) / (b8 + b4)").unwrap();
        assert_eq!(expr.references(), &["b8".to_string(), "b4".to_string()]);
        assert_abs_diff_eq!(expr.eval(&[0.5, 0.1]), 0.4 / 0.6, epsilon = 1e-12);
    }

    #[test]
    fn logic_and_conditionals() {
        assert_eq!(eval("a > 1 && a < 3", &[2.0]), 1.0);
        assert_eq!(eval("a > 1 and not (a < 3)", &[2.0]), 0.0);
        assert_eq!(eval("a < 0 || a == 2", &[2.0]), 1.0);
        assert_eq!(eval("!a", &[0.0]), 1.0);
        assert_eq!(eval("a >= 0 ? sqrt(a) : -1", &[16.0]), 4.0);
        assert_eq!(eval("a >= 0 ? sqrt(a) : -1", &[-4.0]), -1.0);
        assert_eq!(eval("true ? false ? 1 : 2 : 3", &[]), 2.0);
    }

    #[test]
    fn functions_and_constants() {
        assert_abs_diff_eq!(eval("sin(PI / 2)", &[]), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(eval("log(E)", &[]), 1.0, epsilon = 1e-12);
        assert_eq!(eval("max(1, min(5, 3))", &[]), 3.0);
        assert_eq!(eval("sign(-3) + sign(0)", &[]), -1.0);
        assert_eq!(eval("nan(NaN)", &[]), 1.0);
        assert_eq!(eval("pow(2, 10)", &[]), 1024.0);
        assert!(eval("NaN + 1", &[]).is_nan());
    }

    #[test]
    fn names_may_contain_dots_and_underscores() {
        let expr = Expression::parse("radiance_1 * reflec.scale").unwrap();
        assert_eq!(expr.references().len(), 2);
        assert_eq!(expr.eval(&[2.0, 3.0]), 6.0);
    }

    #[test]
    fn parse_errors() {
        for bad in ["", "1 +", "(1", "foo(1)", "sqrt(1, 2)", "1 2", "a $ b", "? 1"] {
            assert!(
                matches!(Expression::parse(bad), Err(Error::Expression(_))),
                "{bad:?} should fail"
            );
        }
    }
}
