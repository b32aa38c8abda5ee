//! Recursive-descent parser for colormap scripts.
//!
//! Precedence, lowest first:
//!
//! | level          | operators                         | associativity |
//! |----------------|-----------------------------------|---------------|
//! | logical or     | `\|` `^`                          | left          |
//! | logical and    | `&`                               | left          |
//! | comparison     | `<` `<=` `>` `>=` `==` `!=` `in`  | none          |
//! | range          | `..` `+-`                         | none          |
//! | additive       | `+` `-`                           | left          |
//! | multiplicative | `*` `/` `%`                       | left          |
//! | unary          | `-` `~`                           | prefix        |
//! | postfix        | `[index]` `[start:stop:step]`     | left          |
//!
//! The parser tracks the length of every `$$vector` assigned so far so that
//! shape errors are reported while building the tree.

use crate::error::{MapError, Result};

use super::ast::{
    ActionBlock, AlphaPolicy, Assignment, BinaryOp, Expr, Primitive, Program, Rule, Shape,
    Statement, Target, UnaryOp, VectorLengths,
};
use super::diagnostic::{Diagnostic, Diagnostics};
use super::span::{Location, Span};
use super::token::{Keyword, Token, TokenKind};

/// Parse a whole script.
pub fn parse(tokens: &[Token]) -> Result<Program> {
    Parser::new(tokens).parse_program()
}

/// Parse a single expression, e.g. a standalone masking predicate.
pub fn parse_expression(tokens: &[Token]) -> Result<Expr> {
    let mut parser = Parser::new(tokens);
    let expr = parser.expression()?;
    if let Some(token) = parser.peek() {
        return Err(parser.unexpected(token, "end of expression"));
    }
    Ok(expr)
}

/// Parser state over a token slice.
pub struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    lengths: VectorLengths,
    diagnostics: Diagnostics,
    alpha_span: Option<Span>,
}

impl<'t> Parser<'t> {
    pub fn new(tokens: &'t [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            lengths: VectorLengths::new(),
            diagnostics: Diagnostics::new(),
            alpha_span: None,
        }
    }

    /// Seed the parser with vector lengths known from elsewhere.
    pub fn with_vector_lengths(mut self, lengths: VectorLengths) -> Self {
        self.lengths = lengths;
        self
    }

    /// Warnings produced while parsing.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Diagnostics {
        self.diagnostics
    }

    /// program := statement*
    pub fn parse_program(&mut self) -> Result<Program> {
        let mut program = Program::default();

        while let Some(token) = self.peek() {
            let statement = match &token.kind {
                TokenKind::ScalarVar(_) | TokenKind::VectorVar(_) => {
                    Statement::Assign(self.assignment(false)?)
                }
                TokenKind::Keyword(Keyword::Alpha) => Statement::Alpha(self.alpha_directive()?),
                TokenKind::Keyword(Keyword::On) => Statement::Rule(self.rule()?),
                _ => return Err(self.unexpected(token, "an assignment, 'alpha' or 'on'")),
            };
            program.statements.push(statement);
        }

        Ok(program)
    }

    // -- Statements --

    /// assignment := ($name | $$name) ('=' | '+=' | '-=' | '*=' | '/=') expr ';'
    fn assignment(&mut self, compound_allowed: bool) -> Result<Assignment> {
        let token = self.advance_or_eof("a variable")?;
        let (target, current) = match &token.kind {
            TokenKind::ScalarVar(name) => (Target::Scalar(name.clone()), Expr::scalar_var(name.clone())),
            TokenKind::VectorVar(name) => (Target::Vector(name.clone()), Expr::vector_var(name.clone())),
            _ => return Err(self.unexpected(token, "a variable")),
        };

        let op_token = self.advance_or_eof("'='")?;
        let compound = match op_token.kind {
            TokenKind::Assign => None,
            TokenKind::AddAssign => Some(BinaryOp::Add),
            TokenKind::SubAssign => Some(BinaryOp::Sub),
            TokenKind::MulAssign => Some(BinaryOp::Mul),
            TokenKind::DivAssign => Some(BinaryOp::Div),
            _ => return Err(self.unexpected(op_token, "'='")),
        };
        if compound.is_some() && !compound_allowed {
            return Err(MapError::Syntax {
                message: format!("Compound assignment '{}' outside of an action block", op_token.kind),
                location: op_token.span.start,
                help: Some("Use plain '=' for global variables".to_string()),
            });
        }

        let mut value = self.expression()?;
        if let Some(op) = compound {
            value = Expr::binary_with(op, current, value, &self.lengths)?;
        }
        self.expect(&TokenKind::Semicolon, "';'")?;

        match (&target, value.shape(&self.lengths)) {
            (Target::Scalar(name), Shape::Vector(_)) => {
                return Err(MapError::Type {
                    message: format!("Cannot assign a vector to scalar variable ${}", name),
                    help: Some(format!("Use $${} for vector variables", name)),
                });
            }
            (Target::Vector(name), Shape::Plain) => {
                return Err(MapError::Type {
                    message: format!("Cannot assign a non-vector value to $${}", name),
                    help: Some(format!("Use ${} for numeric variables", name)),
                });
            }
            (Target::Vector(name), Shape::Vector(Some(len))) => {
                self.lengths.insert(name.clone(), len);
            }
            (Target::Vector(name), Shape::Vector(None)) => {
                self.lengths.remove(name);
            }
            (Target::Scalar(_), Shape::Plain) => {}
        }

        Ok(Assignment { target, value })
    }

    /// alpha_directive := 'alpha' ('require' | 'allow' | 'forbid') ';'
    fn alpha_directive(&mut self) -> Result<AlphaPolicy> {
        let start = self.advance_or_eof("'alpha'")?.span;
        let token = self.advance_or_eof("'require', 'allow' or 'forbid'")?;
        let policy = match token.kind {
            TokenKind::Keyword(Keyword::Require) => AlphaPolicy::Require,
            TokenKind::Keyword(Keyword::Allow) => AlphaPolicy::Allow,
            TokenKind::Keyword(Keyword::Forbid) => AlphaPolicy::Forbid,
            _ => return Err(self.unexpected(token, "'require', 'allow' or 'forbid'")),
        };
        let end = self.expect(&TokenKind::Semicolon, "';'")?.span;

        let span = start.merge(end);
        if let Some(previous) = self.alpha_span.replace(span) {
            self.diagnostics.push(
                Diagnostic::warning(
                    "colormap::syntax::repeated-alpha",
                    "Alpha directive overrides an earlier one",
                    span,
                )
                .with_help(format!("The earlier directive is at {}", previous.start)),
            );
        }

        Ok(policy)
    }

    /// rule := 'on' [space] 'pixels' 'having' expr 'do' block* 'end' ';'
    ///
    /// Statements before the first `using` act in the rule's own space.
    fn rule(&mut self) -> Result<Rule> {
        self.expect_keyword(Keyword::On)?;
        let space = self.optional_space().unwrap_or_else(|| "rgb".to_string());
        self.expect_keyword(Keyword::Pixels)?;
        self.expect_keyword(Keyword::Having)?;
        let predicate = self.expression()?;
        self.expect_keyword(Keyword::Do)?;

        // Each action block binds into its own scope over the globals
        let outer = self.lengths.clone();
        let mut actions: Vec<ActionBlock> = Vec::new();
        loop {
            let token = self.peek_or_eof("'end'")?;
            match &token.kind {
                TokenKind::Keyword(Keyword::End) => {
                    self.check_block_not_empty(&actions, token)?;
                    self.pos += 1;
                    break;
                }
                TokenKind::Keyword(Keyword::Using) => {
                    self.check_block_not_empty(&actions, token)?;
                    self.pos += 1;
                    self.lengths.clone_from(&outer);
                    let space = self
                        .optional_space()
                        .ok_or_else(|| self.error_here("Expected a colorspace after 'using'"))?;
                    self.expect(&TokenKind::Colon, "':'")?;
                    actions.push(ActionBlock {
                        space,
                        statements: Vec::new(),
                    });
                }
                TokenKind::ScalarVar(_) | TokenKind::VectorVar(_) => {
                    let statement = self.assignment(true)?;
                    match actions.last_mut() {
                        Some(block) => block.statements.push(statement),
                        None => actions.push(ActionBlock {
                            space: space.clone(),
                            statements: vec![statement],
                        }),
                    }
                }
                _ => return Err(self.unexpected(token, "an assignment, 'using' or 'end'")),
            }
        }
        self.lengths = outer;
        self.expect(&TokenKind::Semicolon, "';'")?;

        Ok(Rule {
            space,
            predicate,
            actions,
        })
    }

    fn check_block_not_empty(&self, actions: &[ActionBlock], token: &Token) -> Result<()> {
        match actions.last() {
            Some(block) if block.statements.is_empty() => Err(MapError::Syntax {
                message: format!("'using {}:' block has no statements", block.space),
                location: token.span.start,
                help: None,
            }),
            _ => Ok(()),
        }
    }

    fn optional_space(&mut self) -> Option<String> {
        match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Space(name)) => {
                let name = name.clone();
                self.pos += 1;
                Some(name)
            }
            _ => None,
        }
    }

    // -- Expressions --

    pub fn expression(&mut self) -> Result<Expr> {
        self.or_expr()
    }

    /// or_expr := and_expr (('|' | '^') and_expr)*
    fn or_expr(&mut self) -> Result<Expr> {
        let mut left = self.and_expr()?;
        loop {
            let op = match self.peek_kind() {
                // `|)` closes a saturation
                Some(TokenKind::Or) if self.peek_kind_at(1) == Some(&TokenKind::RParen) => break,
                Some(TokenKind::Or) => BinaryOp::Or,
                Some(TokenKind::Xor) => BinaryOp::Xor,
                _ => break,
            };
            self.pos += 1;
            let right = self.and_expr()?;
            left = Expr::binary_with(op, left, right, &self.lengths)?;
        }
        Ok(left)
    }

    /// and_expr := comparison ('&' comparison)*
    fn and_expr(&mut self) -> Result<Expr> {
        let mut left = self.comparison()?;
        while self.peek_kind() == Some(&TokenKind::And) {
            self.pos += 1;
            let right = self.comparison()?;
            left = Expr::binary_with(BinaryOp::And, left, right, &self.lengths)?;
        }
        Ok(left)
    }

    /// comparison := range_expr [cmp_op range_expr]
    fn comparison(&mut self) -> Result<Expr> {
        let left = self.range_expr()?;
        let Some(op) = self.comparison_op() else {
            return Ok(left);
        };
        self.pos += 1;
        let right = self.range_expr()?;

        if self.comparison_op().is_some() {
            return Err(MapError::Syntax {
                message: "Comparisons cannot be chained".to_string(),
                location: self.location(),
                help: Some("Combine comparisons with '&', e.g. ($a < $b) & ($b < $c)".to_string()),
            });
        }

        Expr::binary_with(op, left, right, &self.lengths)
    }

    fn comparison_op(&self) -> Option<BinaryOp> {
        let op = match self.peek_kind()? {
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Le => BinaryOp::Le,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::Ge => BinaryOp::Ge,
            TokenKind::Eq => BinaryOp::Eq,
            TokenKind::Ne => BinaryOp::Ne,
            TokenKind::Keyword(Keyword::In) => BinaryOp::In,
            _ => return None,
        };
        Some(op)
    }

    /// range_expr := additive [('..' | '+-') additive]
    fn range_expr(&mut self) -> Result<Expr> {
        let left = self.additive()?;
        let tolerance = match self.peek_kind() {
            Some(TokenKind::DotDot) => false,
            Some(TokenKind::PlusMinus) => true,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.additive()?;

        if left.shape(&self.lengths).is_vector() || right.shape(&self.lengths).is_vector() {
            return Err(MapError::Type {
                message: "Range bounds must be numbers, not vectors".to_string(),
                help: None,
            });
        }

        if tolerance {
            Ok(Expr::tolerance(left, right))
        } else {
            Ok(Expr::range(left, right))
        }
    }

    /// additive := multiplicative (('+' | '-') multiplicative)*
    fn additive(&mut self) -> Result<Expr> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.multiplicative()?;
            left = Expr::binary_with(op, left, right, &self.lengths)?;
        }
        Ok(left)
    }

    /// multiplicative := unary (('*' | '/' | '%') unary)*
    fn multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Star) => BinaryOp::Mul,
                Some(TokenKind::Slash) => BinaryOp::Div,
                Some(TokenKind::Percent) => BinaryOp::Mod,
                _ => break,
            };
            self.pos += 1;
            let right = self.unary()?;
            left = Expr::binary_with(op, left, right, &self.lengths)?;
        }
        Ok(left)
    }

    /// unary := ('-' | '~') unary | postfix
    fn unary(&mut self) -> Result<Expr> {
        let op = match self.peek_kind() {
            Some(TokenKind::Minus) => UnaryOp::Negate,
            Some(TokenKind::Tilde) => UnaryOp::Invert,
            _ => return self.postfix(),
        };
        self.pos += 1;
        let operand = self.unary()?;
        Ok(Expr::unary(op, operand))
    }

    /// postfix := primary ('[' index ']')*
    fn postfix(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;
        while self.peek_kind() == Some(&TokenKind::LBracket) {
            self.pos += 1;
            let index = self.index()?;
            self.expect(&TokenKind::RBracket, "']'")?;
            expr = Expr::indexed(expr, index, &self.lengths)?;
        }
        Ok(expr)
    }

    /// index := expr | [expr] ':' [expr] [':' [expr]]
    fn index(&mut self) -> Result<Expr> {
        let start = match self.peek_kind() {
            Some(TokenKind::Colon) => None,
            _ => Some(self.expression()?),
        };
        if self.peek_kind() != Some(&TokenKind::Colon) {
            return start.ok_or_else(|| self.error_here("Expected an index"));
        }
        self.pos += 1;

        let stop = match self.peek_kind() {
            Some(TokenKind::Colon | TokenKind::RBracket) => None,
            _ => Some(Box::new(self.expression()?)),
        };
        let mut step = None;
        if self.peek_kind() == Some(&TokenKind::Colon) {
            self.pos += 1;
            if self.peek_kind() != Some(&TokenKind::RBracket) {
                step = Some(Box::new(self.expression()?));
            }
        }

        Ok(Expr::Slice {
            start: start.map(Box::new),
            stop,
            step,
        })
    }

    /// primary := NUMBER | BOOLEAN | NONE | $name | $$name
    ///          | '(' expr ')' | '(|' expr '|)' | '[' [expr (',' expr)*] ']'
    fn primary(&mut self) -> Result<Expr> {
        let token = self.advance_or_eof("an expression")?;
        let expr = match &token.kind {
            TokenKind::Number(n) => Expr::number(*n),
            TokenKind::Boolean(b) => Expr::Primitive(Primitive::Boolean(*b)),
            TokenKind::None => Expr::Primitive(Primitive::None),
            TokenKind::ScalarVar(name) => Expr::scalar_var(name.clone()),
            TokenKind::VectorVar(name) => Expr::vector_var(name.clone()),
            TokenKind::LParen if self.peek_kind() == Some(&TokenKind::Or) => {
                self.pos += 1;
                let inner = self.expression()?;
                self.expect(&TokenKind::Or, "'|)'")?;
                self.expect(&TokenKind::RParen, "')'")?;
                Expr::saturated(inner)
            }
            TokenKind::LParen => {
                let inner = self.expression()?;
                self.expect(&TokenKind::RParen, "')'")?;
                inner
            }
            TokenKind::LBracket => Expr::vector(self.vector_items()?),
            TokenKind::Str(_) => {
                return Err(MapError::Syntax {
                    message: "String literals cannot be used in expressions".to_string(),
                    location: token.span.start,
                    help: None,
                });
            }
            _ => return Err(self.unexpected(token, "an expression")),
        };
        Ok(expr)
    }

    /// Items of a literal vector, after the opening bracket.
    fn vector_items(&mut self) -> Result<Vec<Expr>> {
        let mut items = Vec::new();
        if self.peek_kind() == Some(&TokenKind::RBracket) {
            self.pos += 1;
            return Ok(items);
        }
        loop {
            let item = self.expression()?;
            if item.shape(&self.lengths).is_vector() {
                return Err(MapError::Type {
                    message: "Vector elements must be numbers".to_string(),
                    help: Some("Nested vectors are not supported".to_string()),
                });
            }
            items.push(item);

            let token = self.advance_or_eof("',' or ']'")?;
            match token.kind {
                TokenKind::Comma => continue,
                TokenKind::RBracket => break,
                _ => return Err(self.unexpected(token, "',' or ']'")),
            }
        }
        Ok(items)
    }

    // -- Token helpers --

    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&'t TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn peek_kind_at(&self, ahead: usize) -> Option<&'t TokenKind> {
        self.tokens.get(self.pos + ahead).map(|t| &t.kind)
    }

    fn peek_or_eof(&self, expected: &str) -> Result<&'t Token> {
        self.peek().ok_or_else(|| self.eof_error(expected))
    }

    fn advance_or_eof(&mut self, expected: &str) -> Result<&'t Token> {
        let token = self.peek_or_eof(expected)?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> Result<&'t Token> {
        let token = self.advance_or_eof(expected)?;
        if &token.kind != kind {
            return Err(self.unexpected(token, expected));
        }
        Ok(token)
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<&'t Token> {
        self.expect(&TokenKind::Keyword(keyword), &format!("'{}'", keyword.as_str()))
    }

    /// Location of the next token, or the end of the last one.
    fn location(&self) -> Location {
        match self.peek() {
            Some(token) => token.span.start,
            None => self.tokens.last().map(|t| t.span.end).unwrap_or_default(),
        }
    }

    fn unexpected(&self, token: &Token, expected: &str) -> MapError {
        MapError::Syntax {
            message: format!("Unexpected '{}', expected {}", token.kind, expected),
            location: token.span.start,
            help: None,
        }
    }

    fn eof_error(&self, expected: &str) -> MapError {
        MapError::Syntax {
            message: format!("Unexpected end of script, expected {}", expected),
            location: self.location(),
            help: None,
        }
    }

    fn error_here(&self, message: &str) -> MapError {
        MapError::Syntax {
            message: message.to_string(),
            location: self.location(),
            help: None,
        }
    }
}
