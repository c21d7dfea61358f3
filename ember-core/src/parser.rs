//! Backtracking recursive-descent parser.
//!
//! Alternatives are tried in a fixed priority order and the first one that
//! parses wins, even when a later one could consume more input. Each
//! attempt snapshots the cursor and restores it on a [`ParseFailure::Mismatch`];
//! a [`ParseFailure::Fatal`] is never caught and ends the parse.
//!
//! Binary operations are `term operator expression`, so operator chains
//! group to the right and there is no precedence.

use std::collections::HashMap;

use crate::ast::{FunctionDef, Node, NodeKind};
use crate::error::{CoreError, ParseError};
use crate::lexer::{Token, TokenKind};
use crate::span::Location;

/// Operators accepted between two operands.
pub const BINARY_OPERATORS: &[&str] = &["==", "!=", "<=", ">=", "<", ">", "+", "-", "*", "/"];

/// Default limit on nested expressions and blocks.
pub const DEFAULT_MAX_NESTING: usize = 256;

enum ParseFailure {
    /// Recoverable: the rule did not match here, try the next alternative.
    Mismatch(ParseError),
    /// Unrecoverable: propagates through every alternative.
    Fatal(CoreError),
}

impl From<CoreError> for ParseFailure {
    fn from(err: CoreError) -> Self {
        ParseFailure::Fatal(err)
    }
}

type PResult<T> = Result<T, ParseFailure>;

type Rule<'t> = fn(&mut Parser<'t>) -> PResult<Node>;

/// Parse a whole token stream (ending in `Eof`) as a statement list.
pub fn parse(tokens: &[Token]) -> Result<Node, CoreError> {
    parse_with_limit(tokens, DEFAULT_MAX_NESTING)
}

pub fn parse_with_limit(tokens: &[Token], max_nesting: usize) -> Result<Node, CoreError> {
    if !matches!(tokens.last(), Some(Token { kind: TokenKind::Eof, .. })) {
        return Err(CoreError::Internal {
            message: "token stream is not terminated by an end-of-input marker".to_string(),
            location: tokens.last().map(|t| t.location.clone()),
        });
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        max_nesting,
        terms: HashMap::new(),
        furthest: None,
    };
    let root = match parser.statement_list() {
        Ok(root) => root,
        Err(ParseFailure::Mismatch(err)) => return Err(err.into()),
        Err(ParseFailure::Fatal(err)) => return Err(err),
    };
    if parser.peek().kind != TokenKind::Eof {
        return Err(parser.trailing_error().into());
    }
    Ok(root)
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    depth: usize,
    max_nesting: usize,
    /// Term results by start position. Binary operations and bare terms
    /// both begin with a term at the same cursor.
    terms: HashMap<usize, Result<(Node, usize), ParseError>>,
    /// Mismatch that got furthest into the input, for error reporting.
    /// Later failures win ties since they come from the enclosing rule.
    furthest: Option<ParseError>,
}

impl<'t> Parser<'t> {
    // ------------------------------------------------------------------
    // Cursor
    // ------------------------------------------------------------------

    fn peek(&self) -> &'t Token {
        let tokens: &'t [Token] = self.tokens;
        &tokens[self.pos.min(tokens.len() - 1)]
    }

    fn advance(&mut self) -> &'t Token {
        let token = self.peek();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn mismatch(&self, expected: &str) -> ParseFailure {
        let token = self.peek();
        ParseFailure::Mismatch(ParseError::new(
            format!("expected {expected}, found {}", token.describe()),
            token.location.clone(),
        ))
    }

    fn expect(&mut self, op: &str) -> PResult<&'t Token> {
        if self.peek().is_operator(op) {
            Ok(self.advance())
        } else {
            Err(self.mismatch(&format!("`{op}`")))
        }
    }

    fn identifier(&mut self) -> PResult<(String, Location)> {
        match &self.peek().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                Ok((name, self.advance().location.clone()))
            }
            _ => Err(self.mismatch("an identifier")),
        }
    }

    /// Run `rule` speculatively. A mismatch restores the cursor and yields
    /// `None`; a fatal error is returned as is.
    fn attempt<T>(&mut self, rule: impl FnOnce(&mut Self) -> PResult<T>) -> Result<Option<T>, CoreError> {
        let snapshot = self.pos;
        match rule(self) {
            Ok(value) => Ok(Some(value)),
            Err(ParseFailure::Mismatch(err)) => {
                self.record(err);
                self.pos = snapshot;
                Ok(None)
            }
            Err(ParseFailure::Fatal(err)) => Err(err),
        }
    }

    fn first_of(&mut self, what: &str, alternatives: &[(&str, Rule<'t>)]) -> PResult<Node> {
        for (name, rule) in alternatives {
            if let Some(node) = self.attempt(*rule)? {
                return Ok(node);
            }
            log::trace!("{name} did not match at token {}", self.pos);
        }
        Err(self.mismatch(what))
    }

    fn record(&mut self, err: ParseError) {
        let further = self
            .furthest
            .as_ref()
            .is_none_or(|best| err.location.offset >= best.location.offset);
        if further {
            self.furthest = Some(err);
        }
    }

    /// Error for tokens left over after the top-level statement list. The
    /// furthest mismatch, when it lies past them, is appended as a hint.
    fn trailing_error(&mut self) -> ParseError {
        let token = self.peek();
        let mut message = format!("unexpected token {}", token.describe());
        if let Some(hint) = self
            .furthest
            .take()
            .filter(|err| err.location.offset > token.location.offset)
        {
            message.push_str(&format!(" ({} at {})", hint.message, hint.location));
        }
        ParseError::new(message, token.location.clone())
    }

    /// Guard rule nesting so deeply nested input fails cleanly instead of
    /// exhausting the native stack.
    fn nested<T>(&mut self, rule: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        if self.depth >= self.max_nesting {
            return Err(ParseFailure::Fatal(CoreError::Parse(ParseError::new(
                format!("input nests deeper than {} levels", self.max_nesting),
                self.peek().location.clone(),
            ))));
        }
        self.depth += 1;
        let result = rule(self);
        self.depth -= 1;
        result
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    /// `(expression ";")*`. Stops at the first statement that does not
    /// parse and leaves the remaining tokens for the caller.
    fn statement_list(&mut self) -> PResult<Node> {
        self.nested(|p| {
            let start = p.peek().location.clone();
            let mut statements = Vec::new();
            let mut location: Option<Location> = None;
            while let Some((node, covered)) = p.attempt(Self::statement)? {
                location = Some(match location {
                    Some(loc) => loc.merge(&covered),
                    None => covered,
                });
                statements.push(node);
            }
            let location = location.unwrap_or_else(|| {
                Location::point(start.source.clone(), start.offset, start.start)
            });
            Ok(Node::new(NodeKind::StatementList(statements), location))
        })
    }

    /// One statement and the span it covers including its `;`. Comments
    /// stand on their own without a separator.
    fn statement(&mut self) -> PResult<(Node, Location)> {
        let node = self.expression()?;
        if matches!(node.kind, NodeKind::Comment(_)) {
            let covered = node.location.clone();
            return Ok((node, covered));
        }
        let semi = self.expect(";")?;
        let covered = node.location.merge(&semi.location);
        Ok((node, covered))
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn expression(&mut self) -> PResult<Node> {
        let alternatives: [(&str, Rule<'t>); 5] = [
            ("comment", Self::comment),
            ("assignment", Self::assignment),
            ("function", Self::function),
            ("binary operation", Self::binary),
            ("term", Self::term),
        ];
        self.nested(|p| p.first_of("an expression", &alternatives))
    }

    fn comment(&mut self) -> PResult<Node> {
        match &self.peek().kind {
            TokenKind::Comment(text) => {
                let text = text.clone();
                let token = self.advance();
                Ok(Node::new(NodeKind::Comment(text), token.location.clone()))
            }
            _ => Err(self.mismatch("a comment")),
        }
    }

    /// `identifier "=" expression`
    fn assignment(&mut self) -> PResult<Node> {
        let (name, name_loc) = self.identifier()?;
        self.expect("=")?;
        let value = self.expression()?;
        let location = name_loc.merge(&value.location);
        Ok(Node::new(
            NodeKind::Assignment {
                name,
                value: Box::new(value),
            },
            location,
        ))
    }

    /// `"(" (identifier ",")* ")" "=>" expression`
    fn function(&mut self) -> PResult<Node> {
        let open = self.expect("(")?;
        let (params, _) = self.separated(")", |p| p.identifier().map(|(name, _)| name))?;
        self.expect("=>")?;
        let body = self.expression()?;
        let location = open.location.merge(&body.location);
        Ok(Node::new(
            NodeKind::Function(FunctionDef { params, body }.into()),
            location,
        ))
    }

    /// `term operator expression`, right-recursive.
    ///
    /// Chains are collected in a loop rather than by recursing into
    /// `expression`, so a long `a + b + c + ...` uses neither native stack
    /// nor nesting budget. The operand after each operator is tried in
    /// the same order `expression` would try it: a comment, assignment or
    /// function ends the chain, otherwise a term continues it. If nothing
    /// parses after an operator, the chain ends before that operator.
    fn binary(&mut self) -> PResult<Node> {
        let mut operands = vec![self.term()?];
        let mut operators = Vec::new();
        let tail_alternatives: [(&str, Rule<'t>); 3] = [
            ("comment", Self::comment),
            ("assignment", Self::assignment),
            ("function", Self::function),
        ];

        let tail = loop {
            let op = match self.peek().kind {
                TokenKind::Operator(op) if BINARY_OPERATORS.contains(&op) => op,
                _ if operators.is_empty() => return Err(self.mismatch("a binary operator")),
                _ => break None,
            };
            let before_op = self.pos;
            self.advance();

            let mut tail = None;
            for (_, rule) in &tail_alternatives {
                if let Some(node) = self.nested(|p| Ok(p.attempt(*rule)?))? {
                    tail = Some(node);
                    break;
                }
            }
            if let Some(node) = tail {
                operators.push(op);
                break Some(node);
            }

            match self.attempt(Self::term)? {
                Some(node) => {
                    operators.push(op);
                    operands.push(node);
                }
                None if operators.is_empty() => {
                    return Err(self.mismatch("an expression after the operator"));
                }
                None => {
                    self.pos = before_op;
                    break None;
                }
            }
        };

        let mut right = match tail {
            Some(node) => node,
            None => operands.pop().ok_or_else(|| self.mismatch("an operand"))?,
        };
        while let (Some(left), Some(op)) = (operands.pop(), operators.pop()) {
            let location = left.location.merge(&right.location);
            right = Node::new(
                NodeKind::Call {
                    callee: op.to_string(),
                    args: vec![left, right],
                },
                location,
            );
        }
        Ok(right)
    }

    fn term(&mut self) -> PResult<Node> {
        let start = self.pos;
        if let Some(cached) = self.terms.get(&start) {
            return match cached.clone() {
                Ok((node, end)) => {
                    self.pos = end;
                    Ok(node)
                }
                Err(err) => Err(ParseFailure::Mismatch(err)),
            };
        }

        let alternatives: [(&str, Rule<'t>); 5] = [
            ("call", Self::call),
            ("block", Self::block),
            ("list", Self::list),
            ("literal", Self::literal),
            ("identifier", Self::identifier_term),
        ];
        let result = self.first_of("a call, block, list, literal or identifier", &alternatives);
        match &result {
            Ok(node) => {
                self.terms.insert(start, Ok((node.clone(), self.pos)));
            }
            Err(ParseFailure::Mismatch(err)) => {
                self.terms.insert(start, Err(err.clone()));
            }
            Err(ParseFailure::Fatal(_)) => {}
        }
        result
    }

    /// `identifier "(" (expression ",")* ")"`
    fn call(&mut self) -> PResult<Node> {
        let (callee, callee_loc) = self.identifier()?;
        self.expect("(")?;
        let (args, close) = self.separated(")", Self::expression)?;
        Ok(Node::new(
            NodeKind::Call { callee, args },
            callee_loc.merge(&close.location),
        ))
    }

    /// `"{" statement-list "}"`
    fn block(&mut self) -> PResult<Node> {
        let open = self.expect("{")?;
        let body = self.statement_list()?;
        let close = self.expect("}")?;
        Ok(Node::new(
            NodeKind::Block(Box::new(body)),
            open.location.merge(&close.location),
        ))
    }

    /// `"[" (expression ",")* "]"`
    fn list(&mut self) -> PResult<Node> {
        let open = self.expect("[")?;
        let (items, close) = self.separated("]", Self::expression)?;
        Ok(Node::new(
            NodeKind::List(items),
            open.location.merge(&close.location),
        ))
    }

    fn literal(&mut self) -> PResult<Node> {
        match &self.peek().kind {
            TokenKind::Literal(value) => {
                let value = value.clone();
                let token = self.advance();
                Ok(Node::new(NodeKind::Literal(value), token.location.clone()))
            }
            _ => Err(self.mismatch("a literal")),
        }
    }

    fn identifier_term(&mut self) -> PResult<Node> {
        let (name, location) = self.identifier()?;
        Ok(Node::new(NodeKind::Identifier(name), location))
    }

    /// Comma-separated items up to `close`; a trailing comma is allowed.
    /// Returns the items and the closing token.
    fn separated<T>(
        &mut self,
        close: &str,
        mut item: impl FnMut(&mut Self) -> PResult<T>,
    ) -> PResult<(Vec<T>, &'t Token)> {
        let mut items = Vec::new();
        loop {
            if self.peek().is_operator(close) {
                return Ok((items, self.advance()));
            }
            items.push(item(self)?);
            if self.peek().is_operator(",") {
                self.advance();
                continue;
            }
            let close = self.expect(close)?;
            return Ok((items, close));
        }
    }
}
