//! Statement AST node types

use super::*;

/// A JavaScript statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Statement {
    /// Block statement { ... }
    Block(BlockStatement),

    /// Empty statement ;
    Empty(Span),

    /// Expression statement
    Expression(ExpressionStatement),

    If(Box<IfStatement>),
    While(Box<WhileStatement>),
    DoWhile(Box<DoWhileStatement>),
    For(Box<ForStatement>),
    ForIn(Box<ForInStatement>),
    ForOf(Box<ForOfStatement>),
    Switch(Box<SwitchStatement>),
    Break(BreakStatement),
    Continue(ContinueStatement),
    Return(ReturnStatement),
    Throw(Box<ThrowStatement>),
    Try(Box<TryStatement>),
    Labeled(Box<LabeledStatement>),
    With(Box<WithStatement>),

    /// Debugger statement
    Debugger(Span),

    /// Variable declaration
    VariableDeclaration(VariableDeclaration),

    /// Function declaration
    FunctionDeclaration(Box<Function>),

    /// Class declaration
    ClassDeclaration(Box<Class>),

    /// Import declaration
    Import(Box<ImportDeclaration>),

    /// Export declaration
    Export(Box<ExportDeclaration>),
}

impl Statement {
    /// Get the span of this statement
    pub fn span(&self) -> Span {
        match self {
            Statement::Block(b) => b.span,
            Statement::Empty(span) | Statement::Debugger(span) => *span,
            Statement::Expression(e) => e.span,
            Statement::If(i) => i.span,
            Statement::While(w) => w.span,
            Statement::DoWhile(d) => d.span,
            Statement::For(f) => f.span,
            Statement::ForIn(f) => f.span,
            Statement::ForOf(f) => f.span,
            Statement::Switch(s) => s.span,
            Statement::Break(b) => b.span,
            Statement::Continue(c) => c.span,
            Statement::Return(r) => r.span,
            Statement::Throw(t) => t.span,
            Statement::Try(t) => t.span,
            Statement::Labeled(l) => l.span,
            Statement::With(w) => w.span,
            Statement::VariableDeclaration(v) => v.span,
            Statement::FunctionDeclaration(f) => f.span,
            Statement::ClassDeclaration(c) => c.span,
            Statement::Import(i) => i.span,
            Statement::Export(e) => e.span,
        }
    }

    /// Expression statement shorthand
    pub fn expr(expression: Expression) -> Self {
        let span = expression.span();
        Statement::Expression(ExpressionStatement { expression, span })
    }
}

/// Block statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockStatement {
    pub body: Vec<Statement>,
    #[serde(default)]
    pub span: Span,
}

/// Expression statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionStatement {
    pub expression: Expression,
    #[serde(default)]
    pub span: Span,
}

/// If statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfStatement {
    pub test: Expression,
    pub consequent: Statement,
    /// else branch
    #[serde(default)]
    pub alternate: Option<Statement>,
    #[serde(default)]
    pub span: Span,
}

/// While statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhileStatement {
    pub test: Expression,
    pub body: Statement,
    #[serde(default)]
    pub span: Span,
}

/// Do-while statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoWhileStatement {
    pub body: Statement,
    pub test: Expression,
    #[serde(default)]
    pub span: Span,
}

/// For loop init
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum ForInit {
    Declaration(VariableDeclaration),
    Expression(Expression),
}

/// For statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForStatement {
    #[serde(default)]
    pub init: Option<ForInit>,
    #[serde(default)]
    pub test: Option<Expression>,
    #[serde(default)]
    pub update: Option<Expression>,
    pub body: Statement,
    #[serde(default)]
    pub span: Span,
}

/// Left-hand side of for-in and for-of
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum ForInLeft {
    /// Declaration with a single declarator
    Declaration(VariableDeclaration),
    /// Assignment target
    Pattern(Pattern),
}

/// For-in statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForInStatement {
    pub left: ForInLeft,
    /// Object whose keys are enumerated
    pub right: Expression,
    pub body: Statement,
    #[serde(default)]
    pub span: Span,
}

/// For-of statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForOfStatement {
    pub left: ForInLeft,
    /// Iterable
    pub right: Expression,
    pub body: Statement,
    /// for await (... of ...)
    #[serde(default)]
    pub is_await: bool,
    #[serde(default)]
    pub span: Span,
}

/// Switch statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchStatement {
    pub discriminant: Expression,
    pub cases: Vec<SwitchCase>,
    #[serde(default)]
    pub span: Span,
}

/// Break statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakStatement {
    #[serde(default)]
    pub label: Option<Identifier>,
    #[serde(default)]
    pub span: Span,
}

/// Continue statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinueStatement {
    #[serde(default)]
    pub label: Option<Identifier>,
    #[serde(default)]
    pub span: Span,
}

/// Return statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnStatement {
    #[serde(default)]
    pub argument: Option<Expression>,
    #[serde(default)]
    pub span: Span,
}

/// Throw statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrowStatement {
    pub argument: Expression,
    #[serde(default)]
    pub span: Span,
}

/// Try statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TryStatement {
    pub block: BlockStatement,
    #[serde(default)]
    pub handler: Option<CatchClause>,
    #[serde(default)]
    pub finalizer: Option<BlockStatement>,
    #[serde(default)]
    pub span: Span,
}

/// Labeled statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledStatement {
    pub label: Identifier,
    pub body: Statement,
    #[serde(default)]
    pub span: Span,
}

/// With statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithStatement {
    pub object: Expression,
    pub body: Statement,
    #[serde(default)]
    pub span: Span,
}

/// Import declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportDeclaration {
    #[serde(default)]
    pub specifiers: Vec<ImportSpecifier>,
    /// Module specifier
    pub source: String,
    #[serde(default)]
    pub attributes: Vec<ImportAttribute>,
    #[serde(default)]
    pub span: Span,
}

/// Export declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDeclaration {
    pub kind: ExportKind,
    #[serde(default)]
    pub span: Span,
}

/// Kind of export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum ExportKind {
    /// export { foo, bar } [from 'mod']
    Named {
        specifiers: Vec<ExportSpecifier>,
        #[serde(default)]
        source: Option<String>,
    },
    /// export default expression
    Default(Expression),
    /// export default function/class
    DefaultDeclaration(Box<Statement>),
    /// export var/let/const/function/class
    Declaration(Box<Statement>),
    /// export * from 'mod'
    All { source: String },
    /// export * as foo from 'mod'
    AllAs { exported: String, source: String },
}
