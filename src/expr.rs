//! Reference formula language.
//!
//! Arithmetic over numbers, double-quoted strings and path references:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/' | '%') unary)*
//! unary   := '-' unary | power
//! power   := primary ('^' unary)?
//! primary := number | string | path | function '(' expr (',' expr)* ')' | '(' expr ')'
//! ```
//!
//! Paths use the textual form of [`crate::paths::PathIdentifier`], e.g. `Box.Length`,
//! `<<My Box>>.Placement.Base.x` or `Doc#Box.Points[2]`.

use std::{
    collections::BTreeSet,
    fmt::{Display, Formatter},
    str::FromStr,
    sync::Arc,
};

use crate::{
    formula::{EvalContext, Formula, FormulaParser},
    model::HolderRef,
    paths::{escape, parse_path_prefix, unescape, PathIdentifier},
    value::Value,
    PathflowError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

impl BinaryOp {
    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Add | BinaryOp::Sub => 1,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 2,
            BinaryOp::Pow => 4,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Pow => "^",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Abs,
    Ceil,
    Floor,
    Max,
    Min,
    Round,
    Sqrt,
}

impl Function {
    fn from_name(name: &str) -> Option<Function> {
        Some(match name {
            "abs" => Function::Abs,
            "ceil" => Function::Ceil,
            "floor" => Function::Floor,
            "max" => Function::Max,
            "min" => Function::Min,
            "round" => Function::Round,
            "sqrt" => Function::Sqrt,
            _ => return None,
        })
    }

    fn name(self) -> &'static str {
        match self {
            Function::Abs => "abs",
            Function::Ceil => "ceil",
            Function::Floor => "floor",
            Function::Max => "max",
            Function::Min => "min",
            Function::Round => "round",
            Function::Sqrt => "sqrt",
        }
    }

    fn apply(self, args: &[f64]) -> Result<f64, PathflowError> {
        let unary = |f: fn(f64) -> f64| match args {
            [x] => Ok(f(*x)),
            _ => Err(PathflowError::Evaluation(format!(
                "{}() takes exactly one argument, got {}",
                self.name(),
                args.len()
            ))),
        };
        match self {
            Function::Abs => unary(f64::abs),
            Function::Ceil => unary(f64::ceil),
            Function::Floor => unary(f64::floor),
            Function::Round => unary(f64::round),
            Function::Sqrt => {
                let root = unary(f64::sqrt)?;
                if root.is_nan() {
                    return Err(PathflowError::Evaluation(
                        "sqrt() of a negative number".to_string(),
                    ));
                }
                Ok(root)
            }
            Function::Max | Function::Min => {
                let (first, rest) = args.split_first().ok_or_else(|| {
                    PathflowError::Evaluation(format!("{}() needs an argument", self.name()))
                })?;
                Ok(rest.iter().fold(*first, |acc, x| {
                    if self == Function::Max {
                        acc.max(*x)
                    } else {
                        acc.min(*x)
                    }
                }))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Path(PathIdentifier),
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        function: Function,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn eval(&self, ctx: &EvalContext<'_>) -> Result<Value, PathflowError> {
        match self {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Text(t) => Ok(Value::Text(t.clone())),
            Expr::Path(path) => ctx.read(path),
            Expr::Neg(inner) => Ok(Value::Number(-inner.eval(ctx)?.as_number()?)),
            Expr::Binary { op, lhs, rhs } => {
                let lhs = lhs.eval(ctx)?;
                let rhs = rhs.eval(ctx)?;
                if let (BinaryOp::Add, Value::Text(l), Value::Text(r)) = (op, &lhs, &rhs) {
                    return Ok(Value::Text(format!("{l}{r}")));
                }
                let (l, r) = (lhs.as_number()?, rhs.as_number()?);
                let result = match op {
                    BinaryOp::Add => l + r,
                    BinaryOp::Sub => l - r,
                    BinaryOp::Mul => l * r,
                    BinaryOp::Div | BinaryOp::Rem if r == 0.0 => {
                        return Err(PathflowError::Evaluation(format!(
                            "division by zero in '{self}'"
                        )))
                    }
                    BinaryOp::Div => l / r,
                    BinaryOp::Rem => l % r,
                    BinaryOp::Pow => l.powf(r),
                };
                Ok(Value::Number(result))
            }
            Expr::Call { function, args } => {
                let values = args
                    .iter()
                    .map(|arg| arg.eval(ctx).and_then(|v| v.as_number()))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Number(function.apply(&values)?))
            }
        }
    }

    fn collect_paths(&self, into: &mut BTreeSet<PathIdentifier>) {
        match self {
            Expr::Path(path) => {
                into.insert(path.clone());
            }
            Expr::Neg(inner) => inner.collect_paths(into),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_paths(into);
                rhs.collect_paths(into);
            }
            Expr::Call { args, .. } => args.iter().for_each(|a| a.collect_paths(into)),
            Expr::Number(_) | Expr::Text(_) => {}
        }
    }

    fn rewrite(
        &self,
        rewrite: &mut dyn FnMut(&PathIdentifier) -> Option<PathIdentifier>,
        changed: &mut bool,
    ) -> Expr {
        match self {
            Expr::Path(path) => match rewrite(path) {
                Some(renamed) => {
                    *changed = true;
                    Expr::Path(renamed)
                }
                None => self.clone(),
            },
            Expr::Neg(inner) => Expr::Neg(Box::new(inner.rewrite(rewrite, changed))),
            Expr::Binary { op, lhs, rhs } => Expr::Binary {
                op: *op,
                lhs: Box::new(lhs.rewrite(rewrite, changed)),
                rhs: Box::new(rhs.rewrite(rewrite, changed)),
            },
            Expr::Call { function, args } => Expr::Call {
                function: *function,
                args: args.iter().map(|a| a.rewrite(rewrite, changed)).collect(),
            },
            Expr::Number(_) | Expr::Text(_) => self.clone(),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Binary { op, .. } => op.precedence(),
            Expr::Neg(_) => 3,
            _ => 5,
        }
    }

    fn fmt_operand(&self, f: &mut Formatter<'_>, parens: bool) -> std::fmt::Result {
        if parens {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{n}"),
            Expr::Text(t) => write!(f, "\"{}\"", escape(t)),
            Expr::Path(path) => write!(f, "{path}"),
            Expr::Neg(inner) => {
                write!(f, "-")?;
                inner.fmt_operand(f, inner.precedence() < 3)
            }
            Expr::Binary { op, lhs, rhs } => {
                let prec = op.precedence();
                let (lhs_parens, rhs_parens) = if *op == BinaryOp::Pow {
                    (lhs.precedence() <= prec, rhs.precedence() < 3)
                } else {
                    (lhs.precedence() < prec, rhs.precedence() <= prec)
                };
                lhs.fmt_operand(f, lhs_parens)?;
                write!(f, " {} ", op.symbol())?;
                rhs.fmt_operand(f, rhs_parens)
            }
            Expr::Call { function, args } => {
                let args = args.iter().map(|a| a.to_string()).collect::<Vec<_>>();
                write!(f, "{}({})", function.name(), args.join(", "))
            }
        }
    }
}

impl Formula for Expr {
    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Value, PathflowError> {
        self.eval(ctx)
    }

    fn references(&self) -> BTreeSet<PathIdentifier> {
        let mut paths = BTreeSet::new();
        self.collect_paths(&mut paths);
        paths
    }

    fn rewrite_references(
        &self,
        rewrite: &mut dyn FnMut(&PathIdentifier) -> Option<PathIdentifier>,
    ) -> Option<Arc<dyn Formula>> {
        let mut changed = false;
        let renamed = self.rewrite(rewrite, &mut changed);
        if changed {
            Some(Arc::new(renamed))
        } else {
            None
        }
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.input.len() - trimmed.len();
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.rest().chars().next()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn error(&self, what: &str) -> PathflowError {
        PathflowError::Parse(format!(
            "{what} at offset {} in formula '{}'",
            self.pos, self.input
        ))
    }

    fn expr(&mut self) -> Result<Expr, PathflowError> {
        let mut lhs = self.term()?;
        loop {
            let op = if self.eat('+') {
                BinaryOp::Add
            } else if self.eat('-') {
                BinaryOp::Sub
            } else {
                return Ok(lhs);
            };
            let rhs = self.term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn term(&mut self) -> Result<Expr, PathflowError> {
        let mut lhs = self.unary()?;
        loop {
            let op = if self.eat('*') {
                BinaryOp::Mul
            } else if self.eat('/') {
                BinaryOp::Div
            } else if self.eat('%') {
                BinaryOp::Rem
            } else {
                return Ok(lhs);
            };
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn unary(&mut self) -> Result<Expr, PathflowError> {
        if self.eat('-') {
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr, PathflowError> {
        let base = self.primary()?;
        if self.eat('^') {
            let exponent = self.unary()?;
            return Ok(Expr::Binary {
                op: BinaryOp::Pow,
                lhs: Box::new(base),
                rhs: Box::new(exponent),
            });
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr, PathflowError> {
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                let inner = self.expr()?;
                if !self.eat(')') {
                    return Err(self.error("expected ')'"));
                }
                Ok(inner)
            }
            Some('"') => self.string(),
            Some(c) if c.is_ascii_digit() || c == '.' => self.number(),
            Some(_) => self.reference_or_call(),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn number(&mut self) -> Result<Expr, PathflowError> {
        let rest = self.rest();
        let bytes = rest.as_bytes();
        let mut end = 0;
        while end < bytes.len() && (bytes[end].is_ascii_digit() || bytes[end] == b'.') {
            end += 1;
        }
        if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
            let mut exp_end = end + 1;
            if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
                exp_end += 1;
            }
            let digits_start = exp_end;
            while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
                exp_end += 1;
            }
            if exp_end > digits_start {
                end = exp_end;
            }
        }
        let value = rest[..end]
            .parse::<f64>()
            .map_err(|e| self.error(&format!("invalid number '{}' ({e})", &rest[..end])))?;
        if !value.is_finite() {
            return Err(self.error(&format!("number '{}' is out of range", &rest[..end])));
        }
        self.pos += end;
        Ok(Expr::Number(value))
    }

    fn string(&mut self) -> Result<Expr, PathflowError> {
        let rest = self.rest();
        let bytes = rest.as_bytes();
        let mut idx = 1;
        while idx < bytes.len() {
            match bytes[idx] {
                b'\\' => idx += 2,
                b'"' => {
                    let text = unescape(&rest[1..idx])?;
                    self.pos += idx + 1;
                    return Ok(Expr::Text(text));
                }
                _ => idx += 1,
            }
        }
        Err(self.error("unterminated string literal"))
    }

    fn reference_or_call(&mut self) -> Result<Expr, PathflowError> {
        let rest = self.rest();
        let name_len = rest
            .char_indices()
            .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());
        if let Some(function) = Function::from_name(&rest[..name_len]) {
            if rest[name_len..].trim_start().starts_with('(') {
                self.pos += name_len;
                self.eat('(');
                let mut args = vec![self.expr()?];
                while self.eat(',') {
                    args.push(self.expr()?);
                }
                if !self.eat(')') {
                    return Err(self.error("expected ')' after arguments"));
                }
                return Ok(Expr::Call { function, args });
            }
        }
        let (path, used) = parse_path_prefix(rest).map_err(|e| match e {
            PathflowError::Parse(msg) => self.error(&msg),
            other => other,
        })?;
        self.pos += used;
        Ok(Expr::Path(path))
    }
}

impl FromStr for Expr {
    type Err = PathflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser { input: s, pos: 0 };
        let expr = parser.expr()?;
        if parser.peek().is_some() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(expr)
    }
}

/// [`FormulaParser`] for [`Expr`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ExprParser;

impl FormulaParser for ExprParser {
    fn parse(&self, text: &str, _context: &HolderRef) -> Result<Arc<dyn Formula>, PathflowError> {
        Ok(Arc::new(text.parse::<Expr>()?))
    }
}
