use std::mem;

use tracing::{debug, trace};

use crate::{
    ast::{
        AstError, Attribute, Class, Expr, FieldDef, Import, Literal, MethodDef, Namespace, OperatorKind,
        Parameter, ParameterList, Privacy, Script, Statement, StatementList, TypeRef,
    },
    lexer::{tokenize, TokenizerError},
    token::{Token, TokenKind},
    token_stream::{TokenStream, UnexpectedTokenError},
    util::line_column,
};

type PResult<'src, T> = Result<T, ParseError<'src>>;

/// Binding power of the prefix operators (`-` and `!`).
const PREFIX_BP: u8 = 11;

/// How deeply expressions, blocks, `else if` chains and reference chains may
/// nest before parsing fails instead of exhausting the stack.
pub const MAX_NESTING_DEPTH: usize = 128;

/// Tokenizes and parses a whole script.
pub fn parse_script(src: &str) -> Result<Script<'_>, Error<'_>> {
    parse(src, |p| p.process_script())
}

/// Tokenizes and parses a single expression, which must span the whole input.
pub fn parse_expr(src: &str) -> Result<Expr<'_>, Error<'_>> {
    parse(src, |p| {
        let expr = p.process_expression()?;
        p.finish()?;
        Ok(expr)
    })
}

/// Tokenizes and parses a sequence of statements, not enclosed in braces.
pub fn parse_statements(src: &str) -> Result<StatementList<'_>, Error<'_>> {
    parse(src, |p| {
        let list = p.process_statements()?;
        p.finish()?;
        Ok(list)
    })
}

fn parse<'src, T>(
    src: &'src str,
    f: impl FnOnce(&mut Parser<'src, '_>) -> PResult<'src, T>,
) -> Result<T, Error<'src>> {
    let tokens = tokenize(src)?;
    let mut p = Parser::new(TokenStream::new(src, &tokens));
    Ok(f(&mut p)?)
}

/// The Moth parser. Builds the AST by recursive descent; binary expressions
/// are parsed by precedence climbing.
///
/// Parsing stops at the first error, there is no recovery.
pub struct Parser<'src, 'tok> {
    tokens: TokenStream<'src, 'tok>,
    depth: usize,
}

impl<'src, 'tok> Parser<'src, 'tok> {
    pub fn new(tokens: TokenStream<'src, 'tok>) -> Parser<'src, 'tok> {
        Parser { tokens, depth: 0 }
    }

    pub fn process_script(&mut self) -> PResult<'src, Script<'src>> {
        self.tokens.expect(TokenKind::Namespace)?;
        let namespace = self.parse_path()?;
        self.tokens.expect(TokenKind::Semicolon)?;

        let mut imports = Vec::new();
        let mut classes = Vec::new();
        let mut functions = Vec::new();
        loop {
            let attributes = self.parse_attributes()?;
            let Some(token) = self.tokens.current() else {
                if attributes.is_empty() {
                    break;
                }
                // Attributes must be followed by a definition.
                return Err(self.tokens.unexpected(None).into());
            };
            match token.kind {
                TokenKind::Import if attributes.is_empty() => {
                    self.tokens.advance();
                    let namespace = self.parse_path()?;
                    self.tokens.expect(TokenKind::Semicolon)?;
                    imports.push(Import { namespace });
                }
                TokenKind::Function => {
                    self.tokens.advance();
                    let name = self.tokens.expect(TokenKind::Name)?;
                    functions.push(self.parse_method(attributes, name, Privacy::Global, false)?);
                }
                TokenKind::Foreign => {
                    self.tokens.advance();
                    functions.push(self.parse_foreign(attributes)?);
                }
                TokenKind::Public | TokenKind::Private => {
                    classes.push(self.parse_class(attributes)?);
                }
                _ => return Err(self.tokens.unexpected(None).into()),
            }
        }

        debug!(
            namespace = ?namespace.segments,
            imports = imports.len(),
            classes = classes.len(),
            functions = functions.len(),
            "parsed script"
        );
        Ok(Script {
            namespace,
            imports,
            classes,
            functions,
        })
    }

    pub fn process_expression(&mut self) -> PResult<'src, Expr<'src>> {
        self.parse_expr_bp(0)
    }

    /// Parses a brace-delimited statement list.
    pub fn process_statement_list(&mut self) -> PResult<'src, StatementList<'src>> {
        self.nested(|p| {
            p.tokens.expect(TokenKind::OpeningCurlyBraces)?;
            let list = p.parse_statements_until(Some(TokenKind::ClosingCurlyBraces))?;
            p.tokens.expect(TokenKind::ClosingCurlyBraces)?;
            Ok(list)
        })
    }

    /// Parses statements until the end of the token stream.
    pub fn process_statements(&mut self) -> PResult<'src, StatementList<'src>> {
        self.parse_statements_until(None)
    }

    /// Fails unless every token has been consumed.
    pub fn finish(&self) -> PResult<'src, ()> {
        if self.tokens.is_at_end() {
            Ok(())
        } else {
            Err(self.tokens.unexpected(None).into())
        }
    }

    /// Runs `f` one nesting level deeper, failing once the limit is reached.
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> PResult<'src, T>,
    ) -> PResult<'src, T> {
        if self.depth >= MAX_NESTING_DEPTH {
            let offset = self
                .tokens
                .current()
                .map_or(self.tokens.src().len(), |token| token.begin());
            let at = line_column(self.tokens.src(), offset);
            return Err(ParseError::TooDeep {
                line: at.line,
                column: at.column,
            });
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Parses the `@name(args)` attributes preceding a definition.
    fn parse_attributes(&mut self) -> PResult<'src, Vec<Attribute<'src>>> {
        let mut attributes = Vec::new();
        while self.tokens.take(TokenKind::AttributeMarker) {
            let name = self.tokens.expect(TokenKind::Name)?.text;
            self.tokens.expect(TokenKind::OpeningParentheses)?;
            let args = self.parse_list(TokenKind::ClosingParentheses, TokenKind::Comma, |p| {
                p.process_expression()
            })?;
            self.tokens.expect(TokenKind::ClosingParentheses)?;
            attributes.push(Attribute { name, args });
        }
        Ok(attributes)
    }

    fn parse_class(&mut self, attributes: Vec<Attribute<'src>>) -> PResult<'src, Class<'src>> {
        let privacy = self.parse_privacy()?;
        self.tokens.expect(TokenKind::Class)?;
        let name = self.tokens.expect(TokenKind::Name)?.text;
        self.tokens.expect(TokenKind::OpeningCurlyBraces)?;

        let mut fields = Vec::new();
        let mut methods = Vec::new();
        while !self.tokens.is(TokenKind::ClosingCurlyBraces) {
            let attributes = self.parse_attributes()?;
            let privacy = self.parse_privacy()?;
            let is_static = self.tokens.take(TokenKind::Static);
            let name = self.tokens.expect(TokenKind::Name)?;
            if self.tokens.is(TokenKind::OpeningParentheses) {
                methods.push(self.parse_method(attributes, name, privacy, is_static)?);
            } else {
                let ty = self.parse_type_ref()?;
                self.tokens.expect(TokenKind::Semicolon)?;
                fields.push(FieldDef {
                    attributes,
                    name: name.text,
                    privacy,
                    is_static,
                    ty,
                });
            }
        }
        self.tokens.expect(TokenKind::ClosingCurlyBraces)?;

        trace!(name, fields = fields.len(), methods = methods.len(), "parsed class");
        Ok(Class {
            attributes,
            name,
            privacy,
            fields,
            methods,
        })
    }

    fn parse_privacy(&mut self) -> PResult<'src, Privacy> {
        if self.tokens.take(TokenKind::Public) {
            Ok(Privacy::Public)
        } else if self.tokens.take(TokenKind::Private) {
            Ok(Privacy::Private)
        } else {
            Err(self.tokens.unexpected(None).into())
        }
    }

    /// Parses the signature and body of a method whose name was already
    /// consumed.
    fn parse_method(
        &mut self,
        attributes: Vec<Attribute<'src>>,
        name: Token<'src>,
        privacy: Privacy,
        is_static: bool,
    ) -> PResult<'src, MethodDef<'src>> {
        let params = self.parse_params()?;
        let return_type = self.parse_type_ref()?;
        let body = self.process_statement_list()?;
        trace!(name = name.text, "parsed method");
        Ok(MethodDef {
            attributes,
            name: name.text,
            privacy,
            is_static,
            params,
            return_type,
            body: Some(body),
        })
    }

    fn parse_foreign(
        &mut self,
        attributes: Vec<Attribute<'src>>,
    ) -> PResult<'src, MethodDef<'src>> {
        let name = self.tokens.expect(TokenKind::Name)?.text;
        let params = self.parse_params()?;
        let return_type = self.parse_type_ref()?;
        self.tokens.expect(TokenKind::Semicolon)?;
        Ok(MethodDef {
            attributes,
            name,
            privacy: Privacy::Foreign,
            is_static: false,
            params,
            return_type,
            body: None,
        })
    }

    fn parse_params(&mut self) -> PResult<'src, ParameterList<'src>> {
        self.tokens.expect(TokenKind::OpeningParentheses)?;
        let params = self.parse_list(TokenKind::ClosingParentheses, TokenKind::Comma, |p| {
            p.parse_parameter()
        })?;
        self.tokens.expect(TokenKind::ClosingParentheses)?;
        Ok(ParameterList { params })
    }

    fn parse_parameter(&mut self) -> PResult<'src, Parameter<'src>> {
        let name = self.tokens.expect(TokenKind::Name)?;
        let ty = self.parse_type_ref()?;
        Parameter::new(name.text, ty).map_err(|source| self.construction_error(source, name))
    }

    fn parse_type_ref(&mut self) -> PResult<'src, TypeRef<'src>> {
        self.tokens.expect(TokenKind::TypeRef)?;
        let name = self.tokens.expect(TokenKind::Name)?.text;
        let mut pointer_depth = 0;
        while self.tokens.take(TokenKind::Asterisk) {
            pointer_depth += 1;
        }
        Ok(TypeRef {
            name,
            pointer_depth,
        })
    }

    fn parse_path(&mut self) -> PResult<'src, Namespace<'src>> {
        let mut segments = vec![self.tokens.expect(TokenKind::Name)?.text];
        while self.tokens.take(TokenKind::Period) {
            segments.push(self.tokens.expect(TokenKind::Name)?.text);
        }
        Ok(Namespace { segments })
    }

    /// Parses statements until `end` (which is not consumed) or, if `end` is
    /// `None`, until the token stream is exhausted.
    ///
    /// Everything up to the end of the list runs after either branch of an
    /// `if`, so it becomes the continuation of that `if`.
    fn parse_statements_until(
        &mut self,
        end: Option<TokenKind>,
    ) -> PResult<'src, StatementList<'src>> {
        // `runs[n]` holds the statements preceding `ifs[n]`.
        let mut runs = Vec::new();
        let mut ifs = Vec::new();
        let mut statements = Vec::new();
        while !self.tokens.is_at_end() && !end.is_some_and(|end| self.tokens.is(end)) {
            if self.tokens.is(TokenKind::If) {
                runs.push(mem::take(&mut statements));
                ifs.push(self.parse_if()?);
            } else {
                statements.push(self.parse_statement()?);
            }
        }

        let mut list = StatementList { statements };
        for ((condition, then, else_), mut statements) in ifs.into_iter().zip(runs).rev() {
            statements.push(Statement::If {
                condition,
                then,
                else_,
                continue_: list,
            });
            list = StatementList { statements };
        }
        Ok(list)
    }

    fn parse_if(&mut self) -> PResult<'src, IfBranches<'src>> {
        self.tokens.expect(TokenKind::If)?;
        let condition = self.process_expression()?;
        let then = self.process_statement_list()?;
        if !self.tokens.take(TokenKind::Else) {
            return Ok((condition, then, None));
        }
        let else_ = if self.tokens.is(TokenKind::If) {
            // `else if` nests another `if` in the else list. The nested one
            // has no continuation of its own.
            let (condition, then, else_) = self.nested(Self::parse_if)?;
            StatementList {
                statements: vec![Statement::If {
                    condition,
                    then,
                    else_,
                    continue_: StatementList::default(),
                }],
            }
        } else {
            self.process_statement_list()?
        };
        Ok((condition, then, Some(else_)))
    }

    fn parse_statement(&mut self) -> PResult<'src, Statement<'src>> {
        let Some(first) = self.tokens.current() else {
            return Err(self.tokens.unexpected(None).into());
        };
        let statement = match first.kind {
            TokenKind::While => {
                self.tokens.advance();
                let condition = self.process_expression()?;
                let body = self.process_statement_list()?;
                return Ok(Statement::While { condition, body });
            }
            TokenKind::OpeningCurlyBraces => {
                return Ok(Statement::Block(self.process_statement_list()?));
            }
            TokenKind::Return => {
                self.tokens.advance();
                let value = if self.tokens.is(TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.process_expression()?)
                };
                Statement::Return { value }
            }
            kind @ (TokenKind::Increment | TokenKind::Decrement) => {
                self.tokens.advance();
                let target = self.process_expression()?;
                self.ensure_assignable(&target, first)?;
                if kind == TokenKind::Increment {
                    Statement::IncrementVar { target }
                } else {
                    Statement::DecrementVar { target }
                }
            }
            _ => self.parse_expression_statement(first)?,
        };
        self.tokens.expect(TokenKind::Semicolon)?;
        Ok(statement)
    }

    /// Parses a statement which starts with an expression, deciding its kind
    /// by what follows the expression (`=`, `++` or `--`) or, failing that,
    /// by the shape of the expression itself.
    fn parse_expression_statement(&mut self, first: Token<'src>) -> PResult<'src, Statement<'src>> {
        let expr = self.process_expression()?;

        if self.tokens.take(TokenKind::Assign) {
            self.ensure_assignable(&expr, first)?;
            let value = self.process_expression()?;
            return Ok(Statement::Assignment {
                target: expr,
                value,
            });
        }
        if self.tokens.take(TokenKind::Increment) {
            self.ensure_assignable(&expr, first)?;
            return Ok(Statement::IncrementVar { target: expr });
        }
        if self.tokens.take(TokenKind::Decrement) {
            self.ensure_assignable(&expr, first)?;
            return Ok(Statement::DecrementVar { target: expr });
        }

        Ok(match expr {
            Expr::MethodCall {
                name,
                args,
                child: None,
            } => Statement::Call { name, args },
            expr if expr.ends_in_call() => Statement::StatementCall { reference: expr },
            expr => Statement::Expression(expr),
        })
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> PResult<'src, Expr<'src>> {
        self.nested(|p| p.parse_operands(min_bp))
    }

    fn parse_operands(&mut self, min_bp: u8) -> PResult<'src, Expr<'src>> {
        let mut lhs = self.parse_nud()?;

        while let Some(op_token) = self.tokens.current() {
            let Some((op, (lbp, rbp))) = Self::binary_operator(op_token.kind) else {
                // Not an infix operator
                break;
            };
            if lbp < min_bp {
                // Operator binds less tightly than the minimum required
                break;
            }
            self.tokens.advance();
            let rhs = self.parse_expr_bp(rbp)?;
            lhs = Expr::Binary {
                op,
                left: Box::new(lhs),
                right: Box::new(rhs),
            };
        }

        Ok(lhs)
    }

    /// nud: Parses tokens that start an expression
    /// (prefix operators, literals, grouping and references)
    fn parse_nud(&mut self) -> PResult<'src, Expr<'src>> {
        let token = self
            .tokens
            .advance()
            .ok_or_else(|| self.tokens.unexpected(None))?;

        let expr = match token.kind {
            TokenKind::LiteralInt => {
                let value = token.text.parse().map_err(|_| self.invalid_literal(token))?;
                Expr::Constant(Literal::Int(value))
            }
            TokenKind::LiteralFloat => {
                let value = token.text.parse().map_err(|_| self.invalid_literal(token))?;
                Expr::Constant(Literal::Float(value))
            }
            TokenKind::LiteralString => Expr::Constant(Literal::String(token.text)),
            TokenKind::True => Expr::Constant(Literal::Bool(true)),
            TokenKind::False => Expr::Constant(Literal::Bool(false)),
            TokenKind::Null => Expr::Constant(Literal::Null),

            // Grouping: ( expr )
            TokenKind::OpeningParentheses => {
                let expr = self.parse_expr_bp(0)?;
                self.tokens.expect(TokenKind::ClosingParentheses)?;
                expr
            }

            // Prefix operators: -, !
            TokenKind::Hyphen => Expr::Negate(Box::new(self.parse_expr_bp(PREFIX_BP)?)),
            TokenKind::Not => Expr::Inverse(Box::new(self.parse_expr_bp(PREFIX_BP)?)),

            // Declaration: local NAME #TYPE
            TokenKind::Local => {
                let name = self.tokens.expect(TokenKind::Name)?.text;
                let ty = self.parse_type_ref()?;
                Expr::Variable { name, ty }
            }

            TokenKind::This => Expr::This {
                child: self.parse_child()?,
            },
            TokenKind::TypeRef => {
                let name = self.tokens.expect(TokenKind::Name)?.text;
                Expr::ClassRef {
                    ty: TypeRef {
                        name,
                        pointer_depth: 0,
                    },
                    child: self.parse_child()?,
                }
            }
            TokenKind::Name => self.parse_link(token)?,

            _ => return Err(self.unexpected_at(token)),
        };

        Ok(expr)
    }

    /// Parses a reference link whose name was already consumed: a call (if
    /// followed by an argument list), an index access (if followed by `[`)
    /// or a variable reference.
    fn parse_link(&mut self, name: Token<'src>) -> PResult<'src, Expr<'src>> {
        if self.tokens.take(TokenKind::OpeningParentheses) {
            let args = self.parse_list(TokenKind::ClosingParentheses, TokenKind::Comma, |p| {
                p.process_expression()
            })?;
            self.tokens.expect(TokenKind::ClosingParentheses)?;
            Ok(Expr::MethodCall {
                name: name.text,
                args,
                child: self.parse_child()?,
            })
        } else if self.tokens.take(TokenKind::OpeningSquareBrackets) {
            let index = self.process_expression()?;
            self.tokens.expect(TokenKind::ClosingSquareBrackets)?;
            Ok(Expr::IndexAccess {
                name: name.text,
                index: Box::new(index),
                child: self.parse_child()?,
            })
        } else {
            Ok(Expr::VariableRef {
                name: name.text,
                child: self.parse_child()?,
            })
        }
    }

    fn parse_child(&mut self) -> PResult<'src, Option<Box<Expr<'src>>>> {
        if !self.tokens.take(TokenKind::Period) {
            return Ok(None);
        }
        let name = self.tokens.expect(TokenKind::Name)?;
        let link = self.nested(|p| p.parse_link(name))?;
        Ok(Some(Box::new(link)))
    }

    /// Parses `item (separator item)*` until `end_delim` is found. Does
    /// **NOT** consume the end delimiter.
    fn parse_list<T>(
        &mut self,
        end_delim: TokenKind,
        separator: TokenKind,
        parse_item: impl Fn(&mut Self) -> PResult<'src, T>,
    ) -> PResult<'src, Vec<T>> {
        debug_assert_ne!(end_delim, separator);

        let mut items = Vec::new();
        while !self.tokens.is(end_delim) {
            items.push(parse_item(self)?);
            if !self.tokens.take(separator) {
                break;
            }
        }
        Ok(items)
    }

    fn binary_operator(kind: TokenKind) -> Option<(OperatorKind, (u8, u8))> {
        let op = match kind {
            // Level 6: Disjunction (left-associative)
            TokenKind::LogicalOr => (OperatorKind::Or, (1, 2)),
            TokenKind::Xor => (OperatorKind::Xor, (1, 2)),

            // Level 5: Conjunction (left-associative)
            TokenKind::LogicalAnd => (OperatorKind::And, (3, 4)),
            TokenKind::Nand => (OperatorKind::Nand, (3, 4)),

            // Level 4: Comparisons (left-associative)
            TokenKind::Equal => (OperatorKind::Eq, (5, 6)),
            TokenKind::NotEqual => (OperatorKind::NotEq, (5, 6)),
            TokenKind::LessThan => (OperatorKind::Lt, (5, 6)),
            TokenKind::LessThanOrEqual => (OperatorKind::Le, (5, 6)),
            TokenKind::GreaterThan => (OperatorKind::Gt, (5, 6)),
            TokenKind::GreaterThanOrEqual => (OperatorKind::Ge, (5, 6)),

            // Level 3: Addition/Subtraction (left-associative)
            TokenKind::Plus => (OperatorKind::Add, (7, 8)),
            TokenKind::Hyphen => (OperatorKind::Sub, (7, 8)),

            // Level 2: Multiplication/Division (left-associative)
            TokenKind::Asterisk => (OperatorKind::Mul, (9, 10)),
            TokenKind::ForwardSlash => (OperatorKind::Div, (9, 10)),
            TokenKind::Modulo => (OperatorKind::Mod, (9, 10)),

            // Level 1: Exponential (right-associative, tighter than prefix)
            TokenKind::Exponential => (OperatorKind::Exp, (12, 11)),

            _ => return None,
        };
        Some(op)
    }

    fn ensure_assignable(&self, target: &Expr<'src>, first: Token<'src>) -> PResult<'src, ()> {
        if target.is_assignable() {
            return Ok(());
        }
        let at = line_column(self.tokens.src(), first.begin());
        Err(ParseError::InvalidAssignmentTarget {
            line: at.line,
            column: at.column,
        })
    }

    fn construction_error(&self, source: AstError, token: Token<'src>) -> ParseError<'src> {
        let at = line_column(self.tokens.src(), token.begin());
        ParseError::Construction {
            source,
            line: at.line,
            column: at.column,
        }
    }

    fn invalid_literal(&self, token: Token<'src>) -> ParseError<'src> {
        let at = line_column(self.tokens.src(), token.begin());
        ParseError::InvalidLiteral {
            text: token.text,
            line: at.line,
            column: at.column,
        }
    }

    /// Builds an error for a token which was already consumed.
    fn unexpected_at(&self, token: Token<'src>) -> ParseError<'src> {
        let at = line_column(self.tokens.src(), token.begin());
        ParseError::UnexpectedToken(UnexpectedTokenError {
            token: Some(token),
            expected: None,
            line: at.line,
            column: at.column,
        })
    }
}

type IfBranches<'src> = (
    Expr<'src>,
    StatementList<'src>,
    Option<StatementList<'src>>,
);

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ParseError<'src> {
    #[error("{0}")]
    UnexpectedToken(UnexpectedTokenError<'src>),
    /// A node rejected its children, such as a parameter of type void.
    #[error("{line}:{column}: {source}")]
    Construction {
        source: AstError,
        line: usize,
        column: usize,
    },
    #[error("{line}:{column}: invalid literal `{text}`")]
    InvalidLiteral {
        text: &'src str,
        line: usize,
        column: usize,
    },
    #[error("{line}:{column}: invalid assignment target")]
    InvalidAssignmentTarget { line: usize, column: usize },
    #[error("{line}:{column}: nesting is too deep")]
    TooDeep { line: usize, column: usize },
}

impl<'src> From<UnexpectedTokenError<'src>> for ParseError<'src> {
    fn from(error: UnexpectedTokenError<'src>) -> Self {
        ParseError::UnexpectedToken(error)
    }
}

/// Any error produced while turning source text into an AST.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Error<'src> {
    #[error("{0}")]
    Tokenizer(TokenizerError),
    #[error("{0}")]
    Parse(ParseError<'src>),
}

impl From<TokenizerError> for Error<'_> {
    fn from(error: TokenizerError) -> Self {
        Error::Tokenizer(error)
    }
}

impl<'src> From<ParseError<'src>> for Error<'src> {
    fn from(error: ParseError<'src>) -> Self {
        Error::Parse(error)
    }
}
