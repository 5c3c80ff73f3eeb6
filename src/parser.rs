use crate::lexer::{Token, TokenKind};
use crate::types::{Binding, Body, Clause, Expr};
use thiserror::Error;

/// A grammar violation. Parsing stops at the first one.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("ParseError [line {line}, column {column}]: {message}", line = .token.line, column = .token.column)]
pub struct ParseError {
    pub token: Token, // Where the parser gave up
    pub message: String,
}

impl ParseError {
    fn new(token: &Token, message: impl Into<String>) -> Self {
        let message = match token.kind {
            // Lexical errors surface here, at the first place they are seen
            TokenKind::Unidentified => format!("Unidentified character '{}'", token.lexeme),
            _ => message.into(),
        };
        ParseError {
            token: token.clone(),
            message,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        "ParseError"
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

// Result type alias for convenience
pub type ParseResult<T> = Result<T, ParseError>;

// Builds a node from an operator and two operands while folding n-ary forms
type Combine = fn(Token, Expr, Expr) -> Expr;
// One grammar level, used as the operand parser of the level above it
type Level = fn(&mut Parser) -> ParseResult<Expr>;

fn binary(operator: Token, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        operator,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn logical(operator: Token, left: Expr, right: Expr) -> Expr {
    Expr::Logical {
        operator,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// Recursive-descent parser over a complete token sequence.
///
/// The sequence must end with exactly one `Eof` token, which `tokenize`
/// guarantees. Two tokens of lookahead are enough: every compound form opens
/// with `(` followed by a keyword or operator that names it.
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().is_none_or(|t| t.kind != TokenKind::Eof) {
            let end = tokens.last().map_or(0, |t| t.span.end);
            let (line, column) = tokens.last().map_or((1, 1), |t| (t.line, t.column + 1));
            tokens.push(Token {
                kind: TokenKind::Eof,
                lexeme: String::new(),
                literal: None,
                line,
                column,
                span: crate::Span::new(end, end),
            });
        }
        Parser {
            tokens,
            position: 0,
        }
    }

    /// Parses the whole program.
    ///
    /// program -> expression* EOF
    pub fn parse(mut self) -> ParseResult<Vec<Expr>> {
        let mut program = Vec::new();
        while !self.check(TokenKind::Eof) {
            program.push(self.expression()?);
        }
        Ok(program)
    }

    // expression -> let | print | if | cond | logical | equality
    fn expression(&mut self) -> ParseResult<Expr> {
        if !self.has_expression() {
            return Err(ParseError::new(self.peek(), "Expected an expression"));
        }
        if self.check(TokenKind::LParen) {
            match self.peek_next().kind {
                TokenKind::Let => return self.let_expr(),
                TokenKind::Print | TokenKind::Println => return self.print(),
                TokenKind::If => return self.if_expr(),
                TokenKind::Cond => return self.cond(),
                TokenKind::And | TokenKind::Or => return self.logical(),
                _ => {}
            }
        }
        self.equality()
    }

    // let -> "(" "let" "[" binding+ "]" expr+ ")"
    fn let_expr(&mut self) -> ParseResult<Expr> {
        self.advance(); // (
        self.advance(); // let
        self.consume(TokenKind::LBracket, "Expected '[' after 'let'")?;

        let mut bindings = Vec::new();
        while !self.check(TokenKind::RBracket) && !self.check(TokenKind::Eof) {
            bindings.push(self.binding()?);
        }
        if bindings.is_empty() {
            return Err(ParseError::new(
                self.peek(),
                "Expected at least one binding in 'let'",
            ));
        }
        self.consume(TokenKind::RBracket, "Expected ']' after let bindings")?;

        let body = self.body("let")?;
        self.consume(TokenKind::RParen, "Expected ')' after 'let' expression")?;
        Ok(Expr::Let { bindings, body })
    }

    // binding -> identifier equality
    fn binding(&mut self) -> ParseResult<Binding> {
        let name = self.consume(TokenKind::Identifier, "Expected an identifier in let binding")?;
        let value = self.equality()?;
        Ok(Binding { name, value })
    }

    // print -> "(" ("print" | "println") equality+ ")"
    fn print(&mut self) -> ParseResult<Expr> {
        self.advance(); // (
        let operator = self.advance();

        if !self.has_expression() {
            return Err(ParseError::new(
                self.peek(),
                format!("Expected at least one expression after '{}'", operator.lexeme),
            ));
        }
        let mut body = Vec::new();
        while self.has_expression() {
            body.push(self.equality()?);
        }

        self.consume(
            TokenKind::RParen,
            format!("Expected ')' after '{}' expression", operator.lexeme),
        )?;
        Ok(Expr::Print { operator, body })
    }

    // if -> "(" "if" equality "(" "then" expr+ ")" ("(" "else" expr+ ")")? ")"
    fn if_expr(&mut self) -> ParseResult<Expr> {
        self.advance(); // (
        self.advance(); // if
        let condition = self.equality()?;

        self.consume(TokenKind::LParen, "Expected '(then' after if condition")?;
        self.consume(TokenKind::Then, "Expected '(then' after if condition")?;
        let then_body = self.body("then")?;
        self.consume(TokenKind::RParen, "Expected ')' after 'then' body")?;

        let else_body = self.else_branch()?;
        self.consume(TokenKind::RParen, "Expected ')' after 'if' expression")?;
        Ok(Expr::If {
            condition: Box::new(condition),
            then_body,
            else_body,
        })
    }

    // cond -> "(" "cond" ("(" equality expr+ ")")+ ("(" "else" expr+ ")")? ")"
    fn cond(&mut self) -> ParseResult<Expr> {
        self.advance(); // (
        self.advance(); // cond

        let mut clauses = Vec::new();
        while self.check(TokenKind::LParen) && self.peek_next().kind != TokenKind::Else {
            self.advance(); // (
            let condition = self.equality()?;
            let body = self.body("cond clause")?;
            self.consume(TokenKind::RParen, "Expected ')' after cond clause")?;
            clauses.push(Clause { condition, body });
        }
        if clauses.is_empty() {
            return Err(ParseError::new(
                self.peek(),
                "Expected at least one clause in 'cond'",
            ));
        }

        let else_body = self.else_branch()?;
        self.consume(TokenKind::RParen, "Expected ')' after 'cond' expression")?;
        Ok(Expr::Cond { clauses, else_body })
    }

    // ("(" "else" expr+ ")")?
    fn else_branch(&mut self) -> ParseResult<Option<Body>> {
        if !(self.check(TokenKind::LParen) && self.peek_next().kind == TokenKind::Else) {
            return Ok(None);
        }
        self.advance(); // (
        self.advance(); // else
        let body = self.body("else")?;
        self.consume(TokenKind::RParen, "Expected ')' after 'else' body")?;
        Ok(Some(body))
    }

    // expr+
    fn body(&mut self, context: &str) -> ParseResult<Body> {
        if !self.has_expression() {
            return Err(ParseError::new(
                self.peek(),
                format!("Expected an expression in the body of '{}'", context),
            ));
        }
        let mut exprs = Vec::new();
        while self.has_expression() {
            exprs.push(self.expression()?);
        }
        Ok(Body(exprs))
    }

    // logical -> "(" ("and" | "or") equality equality+ ")"
    fn logical(&mut self) -> ParseResult<Expr> {
        self.fold_operands(Parser::equality, logical)
    }

    // equality -> "(" ("equal?" | "nequal?") comparison comparison+ ")" | comparison
    fn equality(&mut self) -> ParseResult<Expr> {
        if self.opens(&[TokenKind::EqualTo, TokenKind::NotEqualTo]) {
            return self.fold_operands(Parser::comparison, binary);
        }
        self.comparison()
    }

    // comparison -> "(" (">" | ">=" | "<" | "<=") binary binary+ ")" | binary
    fn comparison(&mut self) -> ParseResult<Expr> {
        if self.opens(&[
            TokenKind::Greater,
            TokenKind::GreaterEqual,
            TokenKind::Less,
            TokenKind::LessEqual,
        ]) {
            return self.fold_operands(Parser::binary, binary);
        }
        self.binary()
    }

    // binary -> "(" ("+" | "-" | "*" | "/" | "//" | "%") unary unary+ ")" | unary
    fn binary(&mut self) -> ParseResult<Expr> {
        if self.opens(&[
            TokenKind::Plus,
            TokenKind::Minus,
            TokenKind::Star,
            TokenKind::Slash,
            TokenKind::SlashSlash,
            TokenKind::Percent,
        ]) {
            return self.fold_operands(Parser::unary, binary);
        }
        self.unary()
    }

    // unary -> ("+" | "-" | "not" | "true?") expression | nested | group | literal
    fn unary(&mut self) -> ParseResult<Expr> {
        if matches!(
            self.peek().kind,
            TokenKind::Plus | TokenKind::Minus | TokenKind::Not | TokenKind::TrueQ
        ) {
            let operator = self.advance();
            let operand = self.expression()?;
            return Ok(Expr::Unary {
                operator,
                operand: Box::new(operand),
            });
        }
        if self.check(TokenKind::LParen) {
            // A nested compound form is parsed from the top of the grammar
            if self.peek_next().kind.opens_form() {
                return self.expression();
            }
            return self.group();
        }
        self.literal()
    }

    // group -> "(" expression+ ")"
    fn group(&mut self) -> ParseResult<Expr> {
        self.advance(); // (
        let mut items = vec![self.expression()?];
        while self.has_expression() {
            items.push(self.expression()?);
        }
        self.consume(TokenKind::RParen, "Expected ')' after grouped expressions")?;
        Ok(Expr::Group(items))
    }

    // literal -> NUMBER | identifier | "true" | "false" | "null"
    fn literal(&mut self) -> ParseResult<Expr> {
        match self.peek().kind {
            TokenKind::Identifier => Ok(Expr::Variable(self.advance())),
            TokenKind::Number | TokenKind::True | TokenKind::False | TokenKind::Null => {
                let token = self.advance();
                match token.literal {
                    Some(value) => Ok(Expr::Literal(value)),
                    None => Err(ParseError::new(&token, "Malformed literal")),
                }
            }
            _ => Err(ParseError::new(self.peek(), "Expected an expression")),
        }
    }

    /// Parses `"(" op operand operand+ ")"` and folds the operands to the left:
    /// `(op a b c)` becomes `op(op(a, b), c)`.
    fn fold_operands(&mut self, operand: Level, combine: Combine) -> ParseResult<Expr> {
        self.advance(); // (
        let operator = self.advance();

        let first = operand(self)?;
        if !self.has_expression() {
            return Err(ParseError::new(
                self.peek(),
                format!("Expected at least two operands for '{}'", operator.lexeme),
            ));
        }
        let second = operand(self)?;
        let mut expr = combine(operator.clone(), first, second);

        while self.has_expression() {
            let next = operand(self)?;
            expr = combine(operator.clone(), expr, next);
        }

        self.consume(
            TokenKind::RParen,
            format!("Expected ')' after operands of '{}'", operator.lexeme),
        )?;
        Ok(expr)
    }

    // --- Token helpers ---

    fn peek(&self) -> &Token {
        // Never past the Eof token, which is always last
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    fn peek_next(&self) -> &Token {
        &self.tokens[(self.position + 1).min(self.tokens.len() - 1)]
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    // True when the next two tokens are "(" and one of `operators`
    fn opens(&self, operators: &[TokenKind]) -> bool {
        self.check(TokenKind::LParen) && operators.contains(&self.peek_next().kind)
    }

    // Consumes the next token; at the end of input the Eof token is returned again.
    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.position += 1;
        }
        token
    }

    fn consume(&mut self, kind: TokenKind, message: impl Into<String>) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(ParseError::new(self.peek(), message))
        }
    }

    // Whether the next token can start an expression
    fn has_expression(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::LParen
                | TokenKind::Number
                | TokenKind::Identifier
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
                | TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Not
                | TokenKind::TrueQ
        )
    }
}

// Helper function to lex and parse a string directly (useful for tests and REPL)
pub fn parse_str(input: &str) -> ParseResult<Vec<Expr>> {
    let tokens = crate::lexer::tokenize(input);
    Parser::new(tokens).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Renders an expression in a compact prefix notation so tests can compare
    // tree shapes without spelling out every token.
    fn sexp(expr: &Expr) -> String {
        fn body(b: &Body) -> String {
            b.0.iter().map(sexp).collect::<Vec<_>>().join(" ")
        }
        match expr {
            Expr::Literal(v) => v.to_string(),
            Expr::Variable(t) => t.lexeme.clone(),
            Expr::Unary { operator, operand } => {
                format!("({} {})", operator.lexeme, sexp(operand))
            }
            Expr::Binary {
                operator,
                left,
                right,
            }
            | Expr::Logical {
                operator,
                left,
                right,
            } => format!("({} {} {})", operator.lexeme, sexp(left), sexp(right)),
            Expr::Group(items) => format!(
                "(group {})",
                items.iter().map(sexp).collect::<Vec<_>>().join(" ")
            ),
            Expr::Print { operator, body } => format!(
                "({} {})",
                operator.lexeme,
                body.iter().map(sexp).collect::<Vec<_>>().join(" ")
            ),
            Expr::Let { bindings, body: b } => format!(
                "(let [{}] {})",
                bindings
                    .iter()
                    .map(|bd| format!("{} {}", bd.name.lexeme, sexp(&bd.value)))
                    .collect::<Vec<_>>()
                    .join(" "),
                body(b)
            ),
            Expr::If {
                condition,
                then_body,
                else_body,
            } => match else_body {
                Some(e) => format!(
                    "(if {} (then {}) (else {}))",
                    sexp(condition),
                    body(then_body),
                    body(e)
                ),
                None => format!("(if {} (then {}))", sexp(condition), body(then_body)),
            },
            Expr::Cond { clauses, else_body } => {
                let mut out = String::from("(cond");
                for clause in clauses {
                    out.push_str(&format!(" ({} {})", sexp(&clause.condition), body(&clause.body)));
                }
                if let Some(e) = else_body {
                    out.push_str(&format!(" (else {})", body(e)));
                }
                out.push(')');
                out
            }
        }
    }

    // Helper for asserting successful parsing of a whole program
    fn assert_parse(input: &str, expected: &[&str]) {
        match parse_str(input) {
            Ok(program) => {
                let shapes: Vec<String> = program.iter().map(sexp).collect();
                assert_eq!(shapes, expected, "Input: '{}'", input);
            }
            Err(e) => panic!("Parsing failed for input '{}': {}", input, e),
        }
    }

    // Helper for asserting parse errors: message plus the offending token's position
    fn assert_parse_error(input: &str, message: &str, line: usize, column: usize) {
        match parse_str(input) {
            Ok(program) => panic!(
                "Expected parsing to fail for input '{}', but got: {:?}",
                input, program
            ),
            Err(e) => {
                assert_eq!(e.message, message, "Input: '{}'", input);
                assert_eq!(
                    (e.token.line, e.token.column),
                    (line, column),
                    "Input: '{}'",
                    input
                );
            }
        }
    }

    #[test]
    fn test_parse_empty_program() {
        assert_parse("", &[]);
        assert_parse("; nothing but a comment", &[]);
    }

    #[test]
    fn test_parse_literals() {
        assert_parse("123 4.5 true false null x", &["123", "4.5", "true", "false", "null", "x"]);
    }

    #[test]
    fn test_parse_binary_folds_left() {
        assert_parse("(+ 1 2)", &["(+ 1 2)"]);
        assert_parse("(+ 1 2 3 4)", &["(+ (+ (+ 1 2) 3) 4)"]);
        assert_parse("(// 22 8)", &["(// 22 8)"]);
        assert_parse("(equal? 2 2 2)", &["(equal? (equal? 2 2) 2)"]);
        assert_parse("(> 3 2 1)", &["(> (> 3 2) 1)"]);
        assert_parse("(or a b c)", &["(or (or a b) c)"]);
    }

    #[test]
    fn test_parse_nested_forms() {
        assert_parse("(+ 1 (* 2 3))", &["(+ 1 (* 2 3))"]);
        assert_parse("(equal? (+ 1 1) 2)", &["(equal? (+ 1 1) 2)"]);
        assert_parse("(+ (equal? 1 1) 2)", &["(+ (equal? 1 1) 2)"]);
        assert_parse("(+ 1 (let [x 2] x))", &["(+ 1 (let [x 2] x))"]);
    }

    #[test]
    fn test_parse_unary() {
        assert_parse("-5", &["(- 5)"]);
        assert_parse("+ x", &["(+ x)"]);
        assert_parse("not not x", &["(not (not x))"]);
        assert_parse("true? (equal? 1 2)", &["(true? (equal? 1 2))"]);
        assert_parse("(- -1 2)", &["(- (- 1) 2)"]);
    }

    #[test]
    fn test_parse_group() {
        assert_parse("(not x)", &["(group (not x))"]);
        assert_parse("((+ 1 2) 3)", &["(group (+ 1 2) 3)"]);
    }

    #[test]
    fn test_parse_print() {
        assert_parse("(print (+ 1 2 3))", &["(print (+ (+ 1 2) 3))"]);
        assert_parse("(println x y)", &["(println x y)"]);
    }

    #[test]
    fn test_parse_let() {
        assert_parse(
            "(let [x 1 y (+ 1 x)] (println x y))",
            &["(let [x 1 y (+ 1 x)] (println x y))"],
        );
        assert_parse(
            "(let [a -1] (println a) (let [a 999] a))",
            &["(let [a (- 1)] (println a) (let [a 999] a))"],
        );
    }

    #[test]
    fn test_parse_if() {
        assert_parse("(if x (then 1))", &["(if x (then 1))"]);
        assert_parse(
            "(if (> x 1) (then (print 1) 2) (else 3))",
            &["(if (> x 1) (then (print 1) 2) (else 3))"],
        );
    }

    #[test]
    fn test_parse_cond() {
        assert_parse(
            "(cond ((equal? x 1) 10) ((> x 1) 20 21) (else 30))",
            &["(cond ((equal? x 1) 10) ((> x 1) 20 21) (else 30))"],
        );
        assert_parse("(cond (true 1))", &["(cond (true 1))"]);
    }

    #[test]
    fn test_parse_multiple_top_level_expressions() {
        assert_parse("(print 1) (print 2) 3", &["(print 1)", "(print 2)", "3"]);
    }

    #[test]
    fn test_parse_errors_missing_delimiters() {
        assert_parse_error("(print 1", "Expected ')' after 'print' expression", 1, 9);
        assert_parse_error("(+ 1 2", "Expected ')' after operands of '+'", 1, 7);
        assert_parse_error("(let x 1] x)", "Expected '[' after 'let'", 1, 6);
        assert_parse_error("(let [x 1 x)", "Expected an expression", 1, 12);
        assert_parse_error("(let [x 1", "Expected ']' after let bindings", 1, 10);
    }

    #[test]
    fn test_parse_errors_malformed_forms() {
        assert_parse_error("(let [] 1)", "Expected at least one binding in 'let'", 1, 7);
        assert_parse_error("(let [x 1])", "Expected an expression in the body of 'let'", 1, 11);
        assert_parse_error("(let [1 2] x)", "Expected an identifier in let binding", 1, 7);
        assert_parse_error("(if x 1)", "Expected '(then' after if condition", 1, 7);
        assert_parse_error("(if x (then))", "Expected an expression in the body of 'then'", 1, 12);
        assert_parse_error("(cond (else 1))", "Expected at least one clause in 'cond'", 1, 7);
        assert_parse_error("(print)", "Expected at least one expression after 'print'", 1, 7);
        assert_parse_error("(+ 1)", "Expected at least two operands for '+'", 1, 5);
    }

    #[test]
    fn test_parse_errors_unexpected_tokens() {
        assert_parse_error(")", "Expected an expression", 1, 1);
        assert_parse_error("(then 1)", "Expected an expression", 1, 2);
        assert_parse_error("()", "Expected an expression", 1, 2);
        assert_parse_error("(", "Expected an expression", 1, 2);
    }

    #[test]
    fn test_parse_error_unidentified_token() {
        assert_parse_error("(print 1)\n(print @)", "Unidentified character '@'", 2, 8);
    }

    #[test]
    fn test_parse_is_fail_fast() {
        // The first error wins even when later input is also malformed
        assert_parse_error("(+ 1) (let)", "Expected at least two operands for '+'", 1, 5);
    }

    #[test]
    fn test_parser_supplies_missing_eof() {
        assert_eq!(Parser::new(Vec::new()).parse(), Ok(vec![]));

        let mut tokens = crate::lexer::tokenize("(+ 1 2");
        tokens.pop(); // Eof
        let err = Parser::new(tokens).parse().expect_err("unterminated form");
        assert_eq!(err.message(), "Expected ')' after operands of '+'");
        assert_eq!((err.token().line, err.token().column), (1, 7));
    }
}
