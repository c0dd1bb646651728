use super::ast::{BinaryOp, CalcNode, ExprParseError, UnaryOp};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Text(String),
    LParen,
    RParen,
    Comma,
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
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    offset: usize,
}

fn tokenize(source: &str) -> Result<Vec<Spanned>, ExprParseError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut index = 0;
    while index < bytes.len() {
        let ch = bytes[index] as char;
        let start = index;
        if ch.is_ascii_whitespace() {
            index += 1;
            continue;
        }
        if ch.is_ascii_digit() || (ch == '.' && next_is_digit(bytes, index + 1)) {
            index += 1;
            while index < bytes.len() && (bytes[index].is_ascii_digit() || bytes[index] == b'.') {
                index += 1;
            }
            if index < bytes.len() && (bytes[index] == b'e' || bytes[index] == b'E') {
                let mut lookahead = index + 1;
                if lookahead < bytes.len() && (bytes[lookahead] == b'+' || bytes[lookahead] == b'-')
                {
                    lookahead += 1;
                }
                if next_is_digit(bytes, lookahead) {
                    index = lookahead;
                    while index < bytes.len() && bytes[index].is_ascii_digit() {
                        index += 1;
                    }
                }
            }
            let text = &source[start..index];
            let value = text.parse::<f64>().map_err(|_| {
                ExprParseError::new(source, start, format!("`{text}` is not a number"))
            })?;
            tokens.push(Spanned {
                token: Token::Number(value),
                offset: start,
            });
            continue;
        }
        if ch == '$' || ch.is_ascii_alphabetic() || ch == '_' {
            index += 1;
            if ch == '$'
                && !(index < bytes.len()
                    && (bytes[index].is_ascii_alphabetic() || bytes[index] == b'_'))
            {
                return Err(ExprParseError::new(
                    source,
                    start,
                    "`$` must be followed by a variable name",
                ));
            }
            while index < bytes.len() && (bytes[index].is_ascii_alphanumeric() || bytes[index] == b'_')
            {
                index += 1;
            }
            let name = source[start..index].trim_start_matches('$').to_string();
            tokens.push(Spanned {
                token: Token::Ident(name),
                offset: start,
            });
            continue;
        }
        if ch == '\'' || ch == '"' {
            let quote = bytes[index];
            index += 1;
            let body_start = index;
            while index < bytes.len() && bytes[index] != quote {
                index += 1;
            }
            if index >= bytes.len() {
                return Err(ExprParseError::new(source, start, "unterminated string literal"));
            }
            tokens.push(Spanned {
                token: Token::Text(source[body_start..index].to_string()),
                offset: start,
            });
            index += 1;
            continue;
        }

        let next = bytes.get(index + 1).copied().map(char::from);
        let (token, width) = match (ch, next) {
            ('=', Some('=')) => (Token::EqEq, 2),
            ('!', Some('=')) => (Token::NotEq, 2),
            ('<', Some('=')) => (Token::Le, 2),
            ('>', Some('=')) => (Token::Ge, 2),
            ('&', Some('&')) => (Token::AndAnd, 2),
            ('|', Some('|')) => (Token::OrOr, 2),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            ('!', _) => (Token::Bang, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            (',', _) => (Token::Comma, 1),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('%', _) => (Token::Percent, 1),
            ('=', _) => {
                return Err(ExprParseError::new(
                    source,
                    start,
                    "use `==` for comparison",
                ))
            }
            (other, _) => {
                return Err(ExprParseError::new(
                    source,
                    start,
                    format!("unexpected character `{other}`"),
                ))
            }
        };
        tokens.push(Spanned {
            token,
            offset: start,
        });
        index += width;
    }
    Ok(tokens)
}

fn next_is_digit(bytes: &[u8], index: usize) -> bool {
    bytes.get(index).map(u8::is_ascii_digit).unwrap_or(false)
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Spanned>,
    position: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Result<Self, ExprParseError> {
        Ok(Self {
            source,
            tokens: tokenize(source)?,
            position: 0,
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position).map(|spanned| &spanned.token)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.position)
            .map(|spanned| spanned.offset)
            .unwrap_or(self.source.len())
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).map(|spanned| spanned.token.clone());
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn error(&self, reason: impl Into<String>) -> ExprParseError {
        ExprParseError::new(self.source, self.offset(), reason)
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(name)) if name.eq_ignore_ascii_case(keyword))
    }

    fn expect(&mut self, expected: Token, label: &str) -> Result<(), ExprParseError> {
        if self.peek() == Some(&expected) {
            self.position += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected {label}")))
        }
    }

    fn finish(&self) -> Result<(), ExprParseError> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(self.error(format!("unexpected trailing token {token:?}"))),
        }
    }

    fn parse_or(&mut self) -> Result<CalcNode, ExprParseError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::OrOr) || self.at_keyword("or") {
            self.position += 1;
            let right = self.parse_and()?;
            left = CalcNode::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<CalcNode, ExprParseError> {
        let mut left = self.parse_not()?;
        while self.peek() == Some(&Token::AndAnd) || self.at_keyword("and") {
            self.position += 1;
            let right = self.parse_not()?;
            left = CalcNode::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<CalcNode, ExprParseError> {
        if self.peek() == Some(&Token::Bang) || self.at_keyword("not") {
            self.position += 1;
            let inner = self.parse_not()?;
            return Ok(CalcNode::Unary(UnaryOp::Not, Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<CalcNode, ExprParseError> {
        let left = self.parse_additive()?;
        let op = match self.peek() {
            Some(Token::EqEq) => BinaryOp::Eq,
            Some(Token::NotEq) => BinaryOp::Ne,
            Some(Token::Lt) => BinaryOp::Lt,
            Some(Token::Le) => BinaryOp::Le,
            Some(Token::Gt) => BinaryOp::Gt,
            Some(Token::Ge) => BinaryOp::Ge,
            _ => return Ok(left),
        };
        self.position += 1;
        let right = self.parse_additive()?;
        Ok(CalcNode::Binary(op, Box::new(left), Box::new(right)))
    }

    fn parse_additive(&mut self) -> Result<CalcNode, ExprParseError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.position += 1;
            let right = self.parse_term()?;
            left = CalcNode::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_term(&mut self) -> Result<CalcNode, ExprParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => return Ok(left),
            };
            self.position += 1;
            let right = self.parse_unary()?;
            left = CalcNode::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_unary(&mut self) -> Result<CalcNode, ExprParseError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.position += 1;
                let inner = self.parse_unary()?;
                Ok(match inner {
                    CalcNode::Number(value) => CalcNode::Number(-value),
                    other => CalcNode::Unary(UnaryOp::Neg, Box::new(other)),
                })
            }
            Some(Token::Plus) => {
                self.position += 1;
                self.parse_unary()
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<CalcNode, ExprParseError> {
        let offset = self.offset();
        match self.advance() {
            Some(Token::Number(value)) => Ok(CalcNode::Number(value)),
            Some(Token::Text(text)) => Ok(CalcNode::Text(text)),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen, "`)`")?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                if name.eq_ignore_ascii_case("true") {
                    return Ok(CalcNode::Bool(true));
                }
                if name.eq_ignore_ascii_case("false") {
                    return Ok(CalcNode::Bool(false));
                }
                if self.peek() == Some(&Token::LParen) {
                    self.position += 1;
                    let args = self.parse_arguments()?;
                    return Ok(CalcNode::Call(name.to_ascii_lowercase(), args));
                }
                Ok(CalcNode::Ident(name))
            }
            Some(token) => Err(ExprParseError::new(
                self.source,
                offset,
                format!("unexpected token {token:?}"),
            )),
            None => Err(ExprParseError::new(
                self.source,
                offset,
                "unexpected end of expression",
            )),
        }
    }

    /// Arguments after an opening `(`, consuming the closing `)`.
    fn parse_arguments(&mut self) -> Result<Vec<CalcNode>, ExprParseError> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.position += 1;
            return Ok(args);
        }
        loop {
            args.push(self.parse_or()?);
            match self.advance() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                _ => return Err(self.error("expected `,` or `)` in argument list")),
            }
        }
    }
}

pub fn parse_calc(source: &str) -> Result<CalcNode, ExprParseError> {
    let mut parser = Parser::new(source)?;
    if parser.peek().is_none() {
        return Err(parser.error("expression is empty"));
    }
    let node = parser.parse_or()?;
    parser.finish()?;
    Ok(node)
}

/// Comma-separated argument list without surrounding parentheses.
pub fn parse_calc_args(source: &str) -> Result<Vec<CalcNode>, ExprParseError> {
    let mut parser = Parser::new(source)?;
    let mut args = Vec::new();
    if parser.peek().is_none() {
        return Ok(args);
    }
    loop {
        args.push(parser.parse_or()?);
        match parser.peek() {
            Some(Token::Comma) => {
                parser.position += 1;
            }
            None => return Ok(args),
            Some(_) => return Err(parser.error("expected `,` between arguments")),
        }
    }
}
