// ==========================================
// 管件安装估价系统 - 规则表达式求值
// ==========================================
// 职责: 解析并求值规则中的算术表达式
// 语法: 数字、标识符、+ - * / % ^、一元负号、括号、函数调用
// 红线: 未定义符号/函数是错误，不允许静默按 0 处理
// ==========================================

use crate::domain::attribute::AttributeName;
use crate::domain::item::Item;
use crate::domain::types::Column;
use std::collections::HashMap;
use thiserror::Error;

/// 表达式错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("语法错误 (位置 {position}): {message}")]
    Syntax { position: usize, message: String },

    #[error("未定义符号: {0}")]
    UndefinedSymbol(String),

    #[error("未定义函数: {0}")]
    UndefinedFunction(String),

    #[error("函数参数个数错误: {name} 需要 {expected}, 实际 {actual}")]
    Arity {
        name: String,
        expected: String,
        actual: usize,
    },

    #[error("除数为零")]
    DivisionByZero,

    #[error("结果不是有限数值")]
    NonFinite,
}

// ==========================================
// 词法分析
// ==========================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
    Comma,
}

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, ExpressionError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        if c.is_ascii_digit() || c == '.' {
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            // 科学计数法 1e3 / 1.5E-2
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                let mut j = i + 1;
                if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].is_ascii_digit() {
                    i = j;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let text: String = chars[start..i].iter().collect();
            let n = text.parse::<f64>().map_err(|_| ExpressionError::Syntax {
                position: start,
                message: format!("无效数字 '{}'", text),
            })?;
            tokens.push((start, Token::Number(n)));
            continue;
        }
        if c.is_alphabetic() || c == '_' {
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push((start, Token::Ident(chars[start..i].iter().collect())));
            continue;
        }
        let token = match c {
            '+' | '-' | '*' | '/' | '%' | '^' => Token::Op(c),
            '(' => Token::LParen,
            ')' => Token::RParen,
            ',' => Token::Comma,
            _ => {
                return Err(ExpressionError::Syntax {
                    position: start,
                    message: format!("非法字符 '{}'", c),
                })
            }
        };
        tokens.push((start, token));
        i += 1;
    }
    Ok(tokens)
}

// ==========================================
// 语法树
// ==========================================

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Symbol(String),
    Neg(Box<Expr>),
    Binary(char, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

/// 嵌套深度上限（括号/函数调用/一元运算）
const MAX_DEPTH: usize = 256;

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map(|(p, _)| *p).unwrap_or(self.end)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        t
    }

    fn error(&self, message: impl Into<String>) -> ExpressionError {
        ExpressionError::Syntax {
            position: self.position(),
            message: message.into(),
        }
    }

    fn descend(&mut self) -> Result<(), ExpressionError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error("嵌套过深"));
        }
        Ok(())
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    // term := unary (('*' | '/' | '%') unary)*
    fn term(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.unary()?;
        while let Some(Token::Op(op @ ('*' | '/' | '%'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    // unary := '-' unary | '+' unary | power
    fn unary(&mut self) -> Result<Expr, ExpressionError> {
        self.descend()?;
        let result = self.unary_inner();
        self.depth -= 1;
        result
    }

    fn unary_inner(&mut self) -> Result<Expr, ExpressionError> {
        match self.peek() {
            Some(Token::Op('-')) => {
                self.pos += 1;
                Ok(Expr::Neg(Box::new(self.unary()?)))
            }
            Some(Token::Op('+')) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    // power := primary ('^' unary)?   (右结合)
    fn power(&mut self) -> Result<Expr, ExpressionError> {
        let base = self.primary()?;
        if let Some(Token::Op('^')) = self.peek() {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(Expr::Binary('^', Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr, ExpressionError> {
        self.descend()?;
        let result = self.primary_inner();
        self.depth -= 1;
        result
    }

    fn primary_inner(&mut self) -> Result<Expr, ExpressionError> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Ident(name)) => {
                if let Some(Token::LParen) = self.peek() {
                    self.pos += 1;
                    let mut args = Vec::new();
                    if let Some(Token::RParen) = self.peek() {
                        self.pos += 1;
                        return Ok(Expr::Call(name, args));
                    }
                    loop {
                        args.push(self.expr()?);
                        match self.next() {
                            Some(Token::Comma) => continue,
                            Some(Token::RParen) => break,
                            _ => {
                                self.pos -= 1;
                                return Err(self.error("函数调用缺少 ')'"));
                            }
                        }
                    }
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Symbol(name))
                }
            }
            Some(Token::LParen) => {
                let inner = self.expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => {
                        self.pos -= 1;
                        Err(self.error("缺少 ')'"))
                    }
                }
            }
            Some(_) => {
                self.pos -= 1;
                Err(self.error("意外的符号"))
            }
            None => Err(self.error("表达式不完整")),
        }
    }
}

/// 解析表达式（用于编辑期语法校验）
pub fn parse(source: &str) -> Result<Expr, ExpressionError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(ExpressionError::Syntax {
            position: 0,
            message: "空表达式".to_string(),
        });
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: source.chars().count(),
        depth: 0,
    };
    let expr = parser.expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(parser.error("多余的符号"));
    }
    Ok(expr)
}

// ==========================================
// 符号表
// ==========================================

/// 表达式可用的符号（由条目派生的固定集合）
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    values: HashMap<String, f64>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// 从条目构造: 规格尺寸、数量、已计算的重量/工时/材料价
    ///
    /// 字段为空的符号不写入，引用时报未定义符号
    pub fn from_item(item: &Item) -> Self {
        let mut table = Self::new();
        for (name, column) in [
            ("dn1", Column::Dn1),
            ("s1", Column::S1),
            ("dn2", Column::Dn2),
            ("s2", Column::S2),
            ("dn", Column::Dn),
            ("quantity", Column::Quantity),
        ] {
            if let Some(v) = item.field(column).and_then(|v| v.as_number()) {
                table.insert(name, v);
            }
        }
        let attrs = item.attributes();
        for (name, attr) in [
            ("weight", AttributeName::Weight),
            ("effortHours", AttributeName::EffortHours),
            ("materialPrice", AttributeName::MaterialPrice),
        ] {
            if let Some(v) = attrs.number(attr) {
                table.insert(name, v);
            }
        }
        table
    }
}

// ==========================================
// 求值
// ==========================================

fn check_arity(name: &str, args: &[f64], min: usize, max: usize) -> Result<(), ExpressionError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else if max == usize::MAX {
            format!(">={}", min)
        } else {
            format!("{}..{}", min, max)
        };
        return Err(ExpressionError::Arity {
            name: name.to_string(),
            expected,
            actual: args.len(),
        });
    }
    Ok(())
}

fn call(name: &str, args: &[f64]) -> Result<f64, ExpressionError> {
    match name {
        "min" => {
            check_arity(name, args, 1, usize::MAX)?;
            Ok(args.iter().copied().fold(f64::INFINITY, f64::min))
        }
        "max" => {
            check_arity(name, args, 1, usize::MAX)?;
            Ok(args.iter().copied().fold(f64::NEG_INFINITY, f64::max))
        }
        "abs" => {
            check_arity(name, args, 1, 1)?;
            Ok(args[0].abs())
        }
        "round" => {
            check_arity(name, args, 1, 2)?;
            let digits = args.get(1).copied().unwrap_or(0.0).trunc() as i32;
            let factor = 10f64.powi(digits);
            Ok((args[0] * factor).round() / factor)
        }
        "ceil" => {
            check_arity(name, args, 1, 1)?;
            Ok(args[0].ceil())
        }
        "floor" => {
            check_arity(name, args, 1, 1)?;
            Ok(args[0].floor())
        }
        "sqrt" => {
            check_arity(name, args, 1, 1)?;
            Ok(args[0].sqrt())
        }
        "pow" => {
            check_arity(name, args, 2, 2)?;
            Ok(args[0].powf(args[1]))
        }
        _ => Err(ExpressionError::UndefinedFunction(name.to_string())),
    }
}

impl Expr {
    pub fn eval(&self, symbols: &SymbolTable) -> Result<f64, ExpressionError> {
        match self {
            Expr::Number(n) => Ok(*n),
            Expr::Symbol(name) => match name.as_str() {
                "pi" => Ok(std::f64::consts::PI),
                _ => symbols
                    .get(name)
                    .ok_or_else(|| ExpressionError::UndefinedSymbol(name.clone())),
            },
            Expr::Neg(inner) => Ok(-inner.eval(symbols)?),
            Expr::Binary(op, lhs, rhs) => {
                let a = lhs.eval(symbols)?;
                let b = rhs.eval(symbols)?;
                match op {
                    '+' => Ok(a + b),
                    '-' => Ok(a - b),
                    '*' => Ok(a * b),
                    '/' | '%' if b == 0.0 => Err(ExpressionError::DivisionByZero),
                    '/' => Ok(a / b),
                    '%' => Ok(a % b),
                    '^' => Ok(a.powf(b)),
                    _ => unreachable!("parser only emits known operators"),
                }
            }
            Expr::Call(name, args) => {
                let values = args
                    .iter()
                    .map(|a| a.eval(symbols))
                    .collect::<Result<Vec<_>, _>>()?;
                call(name, &values)
            }
        }
    }
}

/// 解析并求值，结果必须是有限数值
pub fn evaluate(source: &str, symbols: &SymbolTable) -> Result<f64, ExpressionError> {
    let value = parse(source)?.eval(symbols)?;
    if !value.is_finite() {
        return Err(ExpressionError::NonFinite);
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols() -> SymbolTable {
        let mut t = SymbolTable::new();
        t.insert("dn1", 100.0);
        t.insert("quantity", 4.0);
        t.insert("effortHours", 2.5);
        t
    }

    #[test]
    fn test_precedence_and_associativity() {
        let t = SymbolTable::new();
        assert_eq!(evaluate("1 + 2 * 3", &t).unwrap(), 7.0);
        assert_eq!(evaluate("(1 + 2) * 3", &t).unwrap(), 9.0);
        assert_eq!(evaluate("2 ^ 3 ^ 2", &t).unwrap(), 512.0);
        assert_eq!(evaluate("-2 ^ 2", &t).unwrap(), -4.0);
        assert_eq!(evaluate("10 - 4 - 3", &t).unwrap(), 3.0);
        assert_eq!(evaluate("7 % 4", &t).unwrap(), 3.0);
        assert_eq!(evaluate("1.5e2", &t).unwrap(), 150.0);
    }

    #[test]
    fn test_symbols_and_functions() {
        let t = symbols();
        assert_eq!(evaluate("dn1 / 10 * quantity", &t).unwrap(), 40.0);
        assert_eq!(evaluate("max(effortHours, 3) + min(1, 2, 0.5)", &t).unwrap(), 3.5);
        assert_eq!(evaluate("round(effortHours)", &t).unwrap(), 3.0);
        assert_eq!(evaluate("round(1.23456, 2)", &t).unwrap(), 1.23);
        assert_eq!(evaluate("pow(2, 10)", &t).unwrap(), 1024.0);
    }

    #[test]
    fn test_undefined_symbol_is_error() {
        let err = evaluate("dn2 * 2", &symbols()).unwrap_err();
        assert_eq!(err, ExpressionError::UndefinedSymbol("dn2".into()));
    }

    #[test]
    fn test_undefined_function_and_arity() {
        let t = symbols();
        assert_eq!(
            evaluate("foo(1)", &t).unwrap_err(),
            ExpressionError::UndefinedFunction("foo".into())
        );
        assert!(matches!(evaluate("abs(1, 2)", &t), Err(ExpressionError::Arity { .. })));
    }

    #[test]
    fn test_syntax_errors() {
        let t = symbols();
        assert!(matches!(evaluate("", &t), Err(ExpressionError::Syntax { .. })));
        assert!(matches!(evaluate("1 +", &t), Err(ExpressionError::Syntax { .. })));
        assert!(matches!(evaluate("(1 + 2", &t), Err(ExpressionError::Syntax { .. })));
        assert!(matches!(evaluate("1 2", &t), Err(ExpressionError::Syntax { .. })));
        assert!(matches!(evaluate("1 $ 2", &t), Err(ExpressionError::Syntax { .. })));
    }

    #[test]
    fn test_deep_nesting_is_syntax_error() {
        let t = SymbolTable::new();
        let parens = format!("{}1{}", "(".repeat(5_000), ")".repeat(5_000));
        assert!(matches!(evaluate(&parens, &t), Err(ExpressionError::Syntax { .. })));

        let negations = format!("{}1", "-".repeat(5_000));
        assert!(matches!(evaluate(&negations, &t), Err(ExpressionError::Syntax { .. })));

        let calls = format!("{}1{}", "abs(".repeat(5_000), ")".repeat(5_000));
        assert!(matches!(evaluate(&calls, &t), Err(ExpressionError::Syntax { .. })));

        // 正常嵌套不受影响
        let shallow = format!("{}1{}", "(".repeat(20), ")".repeat(20));
        assert_eq!(evaluate(&shallow, &t).unwrap(), 1.0);
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(
            evaluate("1 / (quantity - 4)", &symbols()).unwrap_err(),
            ExpressionError::DivisionByZero
        );
    }
}
