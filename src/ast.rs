// script ::= 'namespace' path ';' item*
// item ::= 'import' path ';'
//        | attribute* 'func' NAME params typeref block
//        | attribute* 'foreign' NAME params typeref ';'
//        | attribute* ('public' | 'private') 'class' NAME '{' member* '}'
// member ::= attribute* ('public' | 'private') ['static'] NAME params typeref block
//          | attribute* ('public' | 'private') ['static'] NAME typeref ';'
// attribute ::= '@' NAME '(' [expr (',' expr)*] ')'
// path ::= NAME ('.' NAME)*
// params ::= '(' [NAME typeref (',' NAME typeref)*] ')'
// typeref ::= '#' NAME '*'*
// block ::= '{' statement* '}'
// statement ::= 'if' expr block ['else' ('if' ... | block)]
//             | 'while' expr block
//             | block
//             | 'return' [expr] ';'
//             | ('++' | '--') expr ';'
//             | expr ['=' expr | '++' | '--'] ';'
// expr ::= expr binop expr
//        | ('-' | '!') expr
//        | '(' expr ')'
//        | 'local' NAME typeref
//        | ('self' | '#' NAME | link) ('.' link)*
//        | integer | float | string | true | false | null
// link ::= NAME ['(' [expr (',' expr)*] ')' | '[' expr ']']

// Precedence
//
// ^^ (right-associative)
// - ! (prefix)
// * / %
// + -
// == != < <= > >=
// && ~&
// || ^|

use std::fmt;

use crate::util::fmt::tree::{Field, TreeNode};

#[derive(Debug, PartialEq)]
pub struct Script<'src> {
    pub namespace: Namespace<'src>,
    pub imports: Vec<Import<'src>>,
    pub classes: Vec<Class<'src>>,
    /// Global and foreign functions.
    pub functions: Vec<MethodDef<'src>>,
}

#[derive(Debug, PartialEq)]
pub struct Namespace<'src> {
    pub segments: Vec<&'src str>,
}

#[derive(Debug, PartialEq)]
pub struct Import<'src> {
    pub namespace: Namespace<'src>,
}

#[derive(Debug, PartialEq)]
pub struct Class<'src> {
    pub attributes: Vec<Attribute<'src>>,
    pub name: &'src str,
    pub privacy: Privacy,
    pub fields: Vec<FieldDef<'src>>,
    pub methods: Vec<MethodDef<'src>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Privacy {
    Public,
    Private,
    /// Functions declared at the script level.
    Global,
    /// Functions implemented outside of Moth, which have no body.
    Foreign,
}

#[derive(Debug, PartialEq)]
pub struct MethodDef<'src> {
    pub attributes: Vec<Attribute<'src>>,
    pub name: &'src str,
    pub privacy: Privacy,
    pub is_static: bool,
    pub params: ParameterList<'src>,
    pub return_type: TypeRef<'src>,
    /// `None` for foreign functions.
    pub body: Option<StatementList<'src>>,
}

#[derive(Debug, PartialEq)]
pub struct FieldDef<'src> {
    pub attributes: Vec<Attribute<'src>>,
    pub name: &'src str,
    pub privacy: Privacy,
    pub is_static: bool,
    pub ty: TypeRef<'src>,
}

/// An annotation on a definition, such as `@inline()` or `@align(16)`.
#[derive(Debug, PartialEq)]
pub struct Attribute<'src> {
    pub name: &'src str,
    pub args: Vec<Expr<'src>>,
}

/// A type name, such as `#i32` or `#Node**`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TypeRef<'src> {
    pub name: &'src str,
    pub pointer_depth: u32,
}

impl TypeRef<'_> {
    pub const VOID_NAME: &'static str = "void";

    pub fn is_void(&self) -> bool {
        self.name == Self::VOID_NAME && self.pointer_depth == 0
    }
}

impl fmt::Display for TypeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.name)?;
        for _ in 0..self.pointer_depth {
            f.write_str("*")?;
        }
        Ok(())
    }
}

#[derive(Debug, PartialEq, Default)]
pub struct ParameterList<'src> {
    pub params: Vec<Parameter<'src>>,
}

/// A method parameter. Its type is never void.
#[derive(Debug, PartialEq)]
pub struct Parameter<'src> {
    name: &'src str,
    ty: TypeRef<'src>,
}

impl<'src> Parameter<'src> {
    pub fn new(name: &'src str, ty: TypeRef<'src>) -> Result<Parameter<'src>, AstError> {
        if ty.is_void() {
            return Err(AstError::VoidParameter {
                name: name.to_owned(),
            });
        }
        Ok(Parameter { name, ty })
    }

    pub fn name(&self) -> &'src str {
        self.name
    }

    pub fn ty(&self) -> TypeRef<'src> {
        self.ty
    }
}

#[derive(Debug, PartialEq, Default)]
pub struct StatementList<'src> {
    pub statements: Vec<Statement<'src>>,
}

#[derive(Debug, PartialEq)]
pub enum Statement<'src> {
    /// The target is either an assignable reference or a `local` declaration.
    Assignment {
        target: Expr<'src>,
        value: Expr<'src>,
    },
    /// A call to a function in scope, such as `f(x);`.
    Call {
        name: &'src str,
        args: Vec<Expr<'src>>,
    },
    /// A reference chain which ends in a call, such as `self.a.f(x);`.
    StatementCall {
        reference: Expr<'src>,
    },
    If {
        condition: Expr<'src>,
        then: StatementList<'src>,
        else_: Option<StatementList<'src>>,
        /// The statements following the `if` in the enclosing list, where the
        /// branches join.
        continue_: StatementList<'src>,
    },
    While {
        condition: Expr<'src>,
        body: StatementList<'src>,
    },
    Block(StatementList<'src>),
    Return {
        value: Option<Expr<'src>>,
    },
    IncrementVar {
        target: Expr<'src>,
    },
    DecrementVar {
        target: Expr<'src>,
    },
    Expression(Expr<'src>),
}

#[derive(Debug, PartialEq)]
pub enum Expr<'src> {
    Binary {
        op: OperatorKind,
        left: Box<Expr<'src>>,
        right: Box<Expr<'src>>,
    },
    Constant(Literal<'src>),
    /// A `local` variable declaration.
    Variable {
        name: &'src str,
        ty: TypeRef<'src>,
    },
    VariableRef {
        name: &'src str,
        child: Option<Box<Expr<'src>>>,
    },
    MethodCall {
        name: &'src str,
        args: Vec<Expr<'src>>,
        child: Option<Box<Expr<'src>>>,
    },
    /// `name[index]`
    IndexAccess {
        name: &'src str,
        index: Box<Expr<'src>>,
        child: Option<Box<Expr<'src>>>,
    },
    /// Static access through a type, as in `#Math.max(a, b)`.
    ClassRef {
        ty: TypeRef<'src>,
        child: Option<Box<Expr<'src>>>,
    },
    /// `self`
    This {
        child: Option<Box<Expr<'src>>>,
    },
    /// Unary `-`.
    Negate(Box<Expr<'src>>),
    /// Unary `!`.
    Inverse(Box<Expr<'src>>),
}

impl<'src> Expr<'src> {
    /// The next link of a reference chain, if any.
    pub fn child(&self) -> Option<&Expr<'src>> {
        match self {
            Expr::VariableRef { child, .. }
            | Expr::MethodCall { child, .. }
            | Expr::IndexAccess { child, .. }
            | Expr::ClassRef { child, .. }
            | Expr::This { child } => child.as_deref(),
            _ => None,
        }
    }

    /// Follows the reference chain to its last link.
    pub fn last_link(&self) -> &Expr<'src> {
        let mut link = self;
        while let Some(child) = link.child() {
            link = child;
        }
        link
    }

    /// Whether a value can be stored into this expression.
    pub fn is_assignable(&self) -> bool {
        matches!(self, Expr::Variable { .. })
            || matches!(
                self.last_link(),
                Expr::VariableRef { .. } | Expr::IndexAccess { .. }
            )
    }

    /// Whether this is a reference chain whose last link is a call.
    pub fn ends_in_call(&self) -> bool {
        matches!(self.last_link(), Expr::MethodCall { .. })
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Literal<'src> {
    Int(i64),
    Float(f64),
    Bool(bool),
    /// The raw text between the quotes, escapes included.
    String(&'src str),
    Null,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OperatorKind {
    Add,
    Sub,
    Mul,
    Div,
    Exp,
    Mod,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Xor,
    Nand,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AstError {
    #[error("parameter `{name}` can't be of type void")]
    VoidParameter { name: String },
}

fn privacy(privacy: Privacy) -> Field<'static> {
    Field::value(format_args!("{privacy:?}"))
}

impl TreeNode for Script<'_> {
    fn tag(&self) -> &'static str {
        "Script"
    }

    fn fields(&self) -> Vec<(&'static str, Field<'_>)> {
        vec![
            ("namespace", Field::node(&self.namespace)),
            ("imports", Field::nodes(&self.imports)),
            ("classes", Field::nodes(&self.classes)),
            ("functions", Field::nodes(&self.functions)),
        ]
    }
}

impl TreeNode for Namespace<'_> {
    fn tag(&self) -> &'static str {
        "Namespace"
    }

    fn fields(&self) -> Vec<(&'static str, Field<'_>)> {
        let segments = self.segments.iter().map(|s| Field::Str(s)).collect();
        vec![("segments", Field::List(segments))]
    }
}

impl TreeNode for Import<'_> {
    fn tag(&self) -> &'static str {
        "Import"
    }

    fn fields(&self) -> Vec<(&'static str, Field<'_>)> {
        vec![("namespace", Field::node(&self.namespace))]
    }
}

impl TreeNode for Class<'_> {
    fn tag(&self) -> &'static str {
        "Class"
    }

    fn fields(&self) -> Vec<(&'static str, Field<'_>)> {
        vec![
            ("attributes", Field::nodes(&self.attributes)),
            ("name", Field::Str(self.name)),
            ("privacy", privacy(self.privacy)),
            ("fields", Field::nodes(&self.fields)),
            ("methods", Field::nodes(&self.methods)),
        ]
    }
}

impl TreeNode for MethodDef<'_> {
    fn tag(&self) -> &'static str {
        "MethodDef"
    }

    fn fields(&self) -> Vec<(&'static str, Field<'_>)> {
        vec![
            ("attributes", Field::nodes(&self.attributes)),
            ("name", Field::Str(self.name)),
            ("privacy", privacy(self.privacy)),
            ("static", Field::value(self.is_static)),
            ("params", Field::node(&self.params)),
            ("return_type", Field::value(self.return_type)),
            ("body", Field::opt_node(self.body.as_ref())),
        ]
    }
}

impl TreeNode for FieldDef<'_> {
    fn tag(&self) -> &'static str {
        "FieldDef"
    }

    fn fields(&self) -> Vec<(&'static str, Field<'_>)> {
        vec![
            ("attributes", Field::nodes(&self.attributes)),
            ("name", Field::Str(self.name)),
            ("privacy", privacy(self.privacy)),
            ("static", Field::value(self.is_static)),
            ("type", Field::value(self.ty)),
        ]
    }
}

impl TreeNode for Attribute<'_> {
    fn tag(&self) -> &'static str {
        "Attribute"
    }

    fn fields(&self) -> Vec<(&'static str, Field<'_>)> {
        vec![("name", Field::Str(self.name)), ("args", Field::nodes(&self.args))]
    }
}

impl TreeNode for ParameterList<'_> {
    fn tag(&self) -> &'static str {
        "ParameterList"
    }

    fn fields(&self) -> Vec<(&'static str, Field<'_>)> {
        vec![("params", Field::nodes(&self.params))]
    }
}

impl TreeNode for Parameter<'_> {
    fn tag(&self) -> &'static str {
        "Parameter"
    }

    fn fields(&self) -> Vec<(&'static str, Field<'_>)> {
        vec![("name", Field::Str(self.name)), ("type", Field::value(self.ty))]
    }
}

impl TreeNode for StatementList<'_> {
    fn tag(&self) -> &'static str {
        "StatementList"
    }

    fn fields(&self) -> Vec<(&'static str, Field<'_>)> {
        vec![("statements", Field::nodes(&self.statements))]
    }
}

impl TreeNode for Statement<'_> {
    fn tag(&self) -> &'static str {
        match self {
            Statement::Assignment { .. } => "Assignment",
            Statement::Call { .. } => "Call",
            Statement::StatementCall { .. } => "StatementCall",
            Statement::If { .. } => "If",
            Statement::While { .. } => "While",
            Statement::Block(_) => "Block",
            Statement::Return { .. } => "Return",
            Statement::IncrementVar { .. } => "IncrementVar",
            Statement::DecrementVar { .. } => "DecrementVar",
            Statement::Expression(_) => "ExpressionStatement",
        }
    }

    fn fields(&self) -> Vec<(&'static str, Field<'_>)> {
        match self {
            Statement::Assignment { target, value } => {
                vec![("target", Field::node(target)), ("value", Field::node(value))]
            }
            Statement::Call { name, args } => {
                vec![("name", Field::Str(name)), ("args", Field::nodes(args))]
            }
            Statement::StatementCall { reference } => vec![("reference", Field::node(reference))],
            Statement::If {
                condition,
                then,
                else_,
                continue_,
            } => vec![
                ("condition", Field::node(condition)),
                ("then", Field::node(then)),
                ("else", Field::opt_node(else_.as_ref())),
                ("continue", Field::node(continue_)),
            ],
            Statement::While { condition, body } => vec![
                ("condition", Field::node(condition)),
                ("body", Field::node(body)),
            ],
            Statement::Block(body) => vec![("body", Field::node(body))],
            Statement::Return { value } => vec![("value", Field::opt_node(value.as_ref()))],
            Statement::IncrementVar { target } | Statement::DecrementVar { target } => {
                vec![("target", Field::node(target))]
            }
            Statement::Expression(expr) => vec![("expression", Field::node(expr))],
        }
    }
}

impl TreeNode for Expr<'_> {
    fn tag(&self) -> &'static str {
        match self {
            Expr::Binary { .. } => "BinaryOperation",
            Expr::Constant(_) => "Constant",
            Expr::Variable { .. } => "Variable",
            Expr::VariableRef { .. } => "VariableRef",
            Expr::MethodCall { .. } => "MethodCall",
            Expr::IndexAccess { .. } => "IndexAccess",
            Expr::ClassRef { .. } => "ClassRef",
            Expr::This { .. } => "This",
            Expr::Negate(_) => "Negate",
            Expr::Inverse(_) => "Inverse",
        }
    }

    fn fields(&self) -> Vec<(&'static str, Field<'_>)> {
        match self {
            Expr::Binary { op, left, right } => vec![
                ("op", Field::value(format_args!("{op:?}"))),
                ("left", Field::node(&**left)),
                ("right", Field::node(&**right)),
            ],
            Expr::Constant(literal) => vec![("value", literal_field(literal))],
            Expr::Variable { name, ty } => {
                vec![("name", Field::Str(name)), ("type", Field::value(ty))]
            }
            Expr::VariableRef { name, child } => vec![
                ("name", Field::Str(name)),
                ("child", Field::opt_node(child.as_deref())),
            ],
            Expr::MethodCall { name, args, child } => vec![
                ("name", Field::Str(name)),
                ("args", Field::nodes(args)),
                ("child", Field::opt_node(child.as_deref())),
            ],
            Expr::IndexAccess { name, index, child } => vec![
                ("name", Field::Str(name)),
                ("index", Field::node(&**index)),
                ("child", Field::opt_node(child.as_deref())),
            ],
            Expr::ClassRef { ty, child } => vec![
                ("type", Field::value(ty)),
                ("child", Field::opt_node(child.as_deref())),
            ],
            Expr::This { child } => vec![("child", Field::opt_node(child.as_deref()))],
            Expr::Negate(value) | Expr::Inverse(value) => {
                vec![("value", Field::node(&**value))]
            }
        }
    }
}

fn literal_field<'a>(literal: &Literal<'a>) -> Field<'a> {
    match *literal {
        Literal::Int(v) => Field::value(v),
        Literal::Float(v) => Field::value(format_args!("{v:?}")),
        Literal::Bool(v) => Field::value(v),
        Literal::String(s) => Field::Str(s),
        Literal::Null => Field::Null,
    }
}
