// Formula parser - converts formula bodies into AST
// Supports: numbers, cell refs (A1), unary +/-, basic math (+, -, *, /), parens
// The leading formula sign is stripped by the caller before parsing.

use serde::{Deserialize, Serialize};

use crate::position::{letters_to_col, Position};

/// Expression AST for a formula body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Number(f64),
    /// Cell reference. The position may lie outside the addressable area
    /// ("A0", "ZZZZZ1"); that is an evaluation-time #REF!, not a parse error.
    CellRef(Position),
    UnaryOp {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    BinaryOp {
        op: Op,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Plus,
    Minus,
}

/// Parse a formula body into an AST.
///
/// Errors are diagnostic strings; the `Formula` boundary wraps them into
/// `FormulaParseError`.
pub fn parse(body: &str) -> Result<Expr, String> {
    let tokens = tokenize(body)?;
    if tokens.is_empty() {
        return Err("empty formula".to_string());
    }
    let (expr, pos) = parse_add_sub(&tokens, 0)?;
    if pos != tokens.len() {
        return Err(format!("unexpected token at position {}", pos));
    }
    Ok(expr)
}

#[derive(Debug, Clone)]
enum Token {
    Number(f64),
    CellRef(Position),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => { chars.next(); }
            '+' => { tokens.push(Token::Plus); chars.next(); }
            '-' => { tokens.push(Token::Minus); chars.next(); }
            '*' => { tokens.push(Token::Star); chars.next(); }
            '/' => { tokens.push(Token::Slash); chars.next(); }
            '(' => { tokens.push(Token::LParen); chars.next(); }
            ')' => { tokens.push(Token::RParen); chars.next(); }
            'A'..='Z' | 'a'..='z' => {
                let mut ident = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_alphanumeric() {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match try_parse_cell_ref(&ident) {
                    Some(pos) => tokens.push(Token::CellRef(pos)),
                    None => return Err(format!("invalid cell reference: {}", ident)),
                }
            }
            '0'..='9' | '.' => {
                let mut num_str = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        num_str.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                // Optional exponent: e/E, optional sign, digits
                if matches!(chars.peek(), Some(&'e') | Some(&'E')) {
                    let mut lookahead = chars.clone();
                    lookahead.next(); // skip e/E
                    if matches!(lookahead.peek(), Some(&'+') | Some(&'-')) {
                        lookahead.next();
                    }
                    if matches!(lookahead.peek(), Some(d) if d.is_ascii_digit()) {
                        num_str.extend(chars.next());
                        if matches!(chars.peek(), Some(&'+') | Some(&'-')) {
                            num_str.extend(chars.next());
                        }
                        while let Some(&d) = chars.peek() {
                            if d.is_ascii_digit() {
                                num_str.push(d);
                                chars.next();
                            } else {
                                break;
                            }
                        }
                    }
                }
                let num: f64 = num_str.parse().map_err(|_| format!("invalid number: {}", num_str))?;
                tokens.push(Token::Number(num));
            }
            _ => return Err(format!("unexpected character: {}", c)),
        }
    }

    Ok(tokens)
}

/// Letters-then-digits is a cell reference; anything else is not a token we
/// know. Out-of-range spellings saturate into invalid positions.
fn try_parse_cell_ref(s: &str) -> Option<Position> {
    let letters_len = s.chars().take_while(|c| c.is_ascii_alphabetic()).count();
    let (letters, digits) = s.split_at(letters_len);
    if letters.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let col = letters_to_col(letters);
    let row = match digits.parse::<usize>() {
        Ok(n) if n >= 1 => n - 1,
        _ => usize::MAX, // "A0" or an overflowing row: never valid
    };
    Some(Position::new(row, col))
}

fn parse_add_sub(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_mul_div(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Plus => Op::Add,
            Token::Minus => Op::Sub,
            _ => break,
        };
        let (right, new_pos) = parse_mul_div(tokens, pos + 1)?;
        left = Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_mul_div(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_unary(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Star => Op::Mul,
            Token::Slash => Op::Div,
            _ => break,
        };
        let (right, new_pos) = parse_unary(tokens, pos + 1)?;
        left = Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        pos = new_pos;
    }

    Ok((left, pos))
}

// Unary +/- binds tighter than * and / ("-2*3" is "(-2)*3") and nests ("--2").
fn parse_unary(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let op = match tokens.get(pos) {
        Some(Token::Plus) => UnaryOp::Plus,
        Some(Token::Minus) => UnaryOp::Minus,
        _ => return parse_primary(tokens, pos),
    };
    let (operand, new_pos) = parse_unary(tokens, pos + 1)?;
    Ok((
        Expr::UnaryOp {
            op,
            operand: Box::new(operand),
        },
        new_pos,
    ))
}

fn parse_primary(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    match tokens.get(pos) {
        Some(Token::Number(n)) => Ok((Expr::Number(*n), pos + 1)),
        Some(Token::CellRef(p)) => Ok((Expr::CellRef(*p), pos + 1)),
        Some(Token::LParen) => {
            let (expr, pos) = parse_add_sub(tokens, pos + 1)?;
            match tokens.get(pos) {
                Some(Token::RParen) => Ok((expr, pos + 1)),
                _ => Err("missing closing parenthesis".to_string()),
            }
        }
        Some(_) => Err(format!("unexpected token at position {}", pos)),
        None => Err("unexpected end of expression".to_string()),
    }
}

// =============================================================================
// Canonical printing - minimal parentheses per precedence
// =============================================================================

impl Expr {
    /// Binding strength for printing: atoms > unary > mul/div > add/sub.
    fn precedence(&self) -> u8 {
        match self {
            Expr::Number(_) | Expr::CellRef(_) => 3,
            Expr::UnaryOp { .. } => 2,
            Expr::BinaryOp { op: Op::Mul | Op::Div, .. } => 1,
            Expr::BinaryOp { op: Op::Add | Op::Sub, .. } => 0,
        }
    }
}

impl std::fmt::Display for Expr {
    /// Canonical form: operand spellings normalized (uppercase references,
    /// `f64` display for numbers), parentheses only where re-parsing would
    /// otherwise change the tree. `+` and `*` print as associative; `-` and
    /// `/` parenthesize an equal-precedence right child ("1-(2-3)").
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn paren(f: &mut std::fmt::Formatter<'_>, e: &Expr) -> std::fmt::Result {
            write!(f, "({})", e)
        }

        match self {
            Expr::Number(n) => write!(f, "{}", n),
            Expr::CellRef(p) => write!(f, "{}", p),
            Expr::UnaryOp { op, operand } => {
                let sign = match op {
                    UnaryOp::Plus => '+',
                    UnaryOp::Minus => '-',
                };
                write!(f, "{}", sign)?;
                if operand.precedence() < 2 {
                    paren(f, operand)
                } else {
                    write!(f, "{}", operand)
                }
            }
            Expr::BinaryOp { op, left, right } => {
                let prec = self.precedence();
                if left.precedence() < prec {
                    paren(f, left)?;
                } else {
                    write!(f, "{}", left)?;
                }
                let sign = match op {
                    Op::Add => '+',
                    Op::Sub => '-',
                    Op::Mul => '*',
                    Op::Div => '/',
                };
                write!(f, "{}", sign)?;
                let right_needs_parens = right.precedence() < prec
                    || (right.precedence() == prec && matches!(op, Op::Sub | Op::Div));
                if right_needs_parens {
                    paren(f, right)
                } else {
                    write!(f, "{}", right)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(row: usize, col: usize) -> Expr {
        Expr::CellRef(Position::new(row, col))
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse("42").unwrap(), Expr::Number(42.0));
        assert_eq!(parse("3.5").unwrap(), Expr::Number(3.5));
        assert_eq!(parse("1e3").unwrap(), Expr::Number(1000.0));
        assert_eq!(parse("2.5E-1").unwrap(), Expr::Number(0.25));
    }

    #[test]
    fn test_parse_cell_ref() {
        // a1 normalizes to A1
        assert_eq!(parse("a1").unwrap(), cell(0, 0));
        assert_eq!(parse("AA10").unwrap(), cell(9, 26));
    }

    #[test]
    fn test_parse_out_of_range_ref_is_not_a_parse_error() {
        // "A0" has no valid position but the formula still parses
        let expr = parse("A0").unwrap();
        match expr {
            Expr::CellRef(p) => assert!(!p.is_valid()),
            other => panic!("expected cell ref, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence() {
        // 1+2*3 parses as 1+(2*3)
        let expr = parse("1+2*3").unwrap();
        assert_eq!(
            expr,
            Expr::BinaryOp {
                op: Op::Add,
                left: Box::new(Expr::Number(1.0)),
                right: Box::new(Expr::BinaryOp {
                    op: Op::Mul,
                    left: Box::new(Expr::Number(2.0)),
                    right: Box::new(Expr::Number(3.0)),
                }),
            }
        );
    }

    #[test]
    fn test_unary_binds_tighter_than_mul() {
        // -2*3 parses as (-2)*3
        let expr = parse("-2*3").unwrap();
        assert_eq!(
            expr,
            Expr::BinaryOp {
                op: Op::Mul,
                left: Box::new(Expr::UnaryOp {
                    op: UnaryOp::Minus,
                    operand: Box::new(Expr::Number(2.0)),
                }),
                right: Box::new(Expr::Number(3.0)),
            }
        );
    }

    #[test]
    fn test_nested_unary() {
        assert_eq!(parse("--2").unwrap().to_string(), "--2");
        assert_eq!(parse("+-+2").unwrap().to_string(), "+-+2");
    }

    #[test]
    fn test_parse_failures() {
        assert!(parse("").is_err());
        assert!(parse("   ").is_err());
        assert!(parse("1+").is_err());
        assert!(parse("(1+2").is_err());
        assert!(parse("1+2)").is_err());
        assert!(parse("1 2").is_err());
        assert!(parse("#REF!").is_err());
        assert!(parse("SUM(A1)").is_err());
        assert!(parse("1..2").is_err());
    }

    #[test]
    fn test_whitespace_is_ignored() {
        assert_eq!(parse(" 1 +\t2 ").unwrap().to_string(), "1+2");
    }

    #[test]
    fn test_canonical_print_minimal_parens() {
        // Redundant parens disappear...
        assert_eq!(parse("(1+2)").unwrap().to_string(), "1+2");
        assert_eq!(parse("((1))*((2))").unwrap().to_string(), "1*2");
        // ...required ones stay
        assert_eq!(parse("(1+2)*3").unwrap().to_string(), "(1+2)*3");
        assert_eq!(parse("1-(2+3)").unwrap().to_string(), "1-(2+3)");
        assert_eq!(parse("1-(2-3)").unwrap().to_string(), "1-(2-3)");
        assert_eq!(parse("1/(2*3)").unwrap().to_string(), "1/(2*3)");
        assert_eq!(parse("-(2*3)").unwrap().to_string(), "-(2*3)");
        // Associative ops need none on the right
        assert_eq!(parse("1+(2+3)").unwrap().to_string(), "1+2+3");
        assert_eq!(parse("1-2-3").unwrap().to_string(), "1-2-3");
    }

    #[test]
    fn test_canonical_print_normalizes_spellings() {
        assert_eq!(parse("a1+B2").unwrap().to_string(), "A1+B2");
        assert_eq!(parse("1.50+2.0e1").unwrap().to_string(), "1.5+20");
    }

    #[test]
    fn test_canonical_print_reparses_to_same_tree() {
        for src in ["1+2*3", "(1+2)/(3-4)", "-A1--B2", "A1*(B2+C3)*2"] {
            let expr = parse(src).unwrap();
            let reparsed = parse(&expr.to_string()).unwrap();
            assert_eq!(expr, reparsed, "round-trip of {:?}", src);
        }
    }
}
