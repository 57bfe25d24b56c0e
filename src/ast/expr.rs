//! Expression AST node types

use super::*;

/// A JavaScript expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Expression {
    /// Identifier reference
    Identifier(Identifier),

    /// Literal value
    Literal(Literal),

    /// Template literal `hello ${name}`
    TemplateLiteral(TemplateLiteral),

    /// Tagged template tag`hello`
    TaggedTemplate(Box<TaggedTemplateExpression>),

    /// Array literal [1, 2, 3]
    Array(ArrayExpression),

    /// Object literal {a: 1, b: 2}
    Object(ObjectExpression),

    /// Function expression
    Function(Box<Function>),

    /// Arrow function
    Arrow(Box<Function>),

    /// Class expression
    Class(Box<Class>),

    /// this
    This(Span),

    /// super, only valid as a callee or member object
    Super(Span),

    /// Member access, optionally `?.`
    Member(Box<MemberExpression>),

    /// Function call, optionally `?.()`
    Call(Box<CallExpression>),

    /// Boundary of an optional chain
    Chain(Box<ChainExpression>),

    /// new Foo()
    New(Box<NewExpression>),

    /// Unary operation
    Unary(Box<UnaryExpression>),

    /// Update expression ++x, x++, --x, x--
    Update(Box<UpdateExpression>),

    /// Binary operation
    Binary(Box<BinaryExpression>),

    /// Logical operation &&, ||, ??
    Logical(Box<LogicalExpression>),

    /// Assignment
    Assignment(Box<AssignmentExpression>),

    /// Conditional (ternary) a ? b : c
    Conditional(Box<ConditionalExpression>),

    /// Comma sequence a, b, c
    Sequence(SequenceExpression),

    /// Spread ...x in calls and array literals
    Spread(Box<SpreadElement>),

    /// yield / yield*
    Yield(Box<YieldExpression>),

    /// await
    Await(Box<AwaitExpression>),

    /// new.target or import.meta
    MetaProperty(MetaProperty),

    /// Dynamic import()
    Import(Box<ImportExpression>),

    /// `#field in obj`
    PrivateIn(Box<PrivateInExpression>),
}

impl Expression {
    /// Get the span of this expression
    pub fn span(&self) -> Span {
        match self {
            Expression::Identifier(id) => id.span,
            Expression::Literal(lit) => lit.span,
            Expression::TemplateLiteral(t) => t.span,
            Expression::TaggedTemplate(t) => t.span,
            Expression::Array(a) => a.span,
            Expression::Object(o) => o.span,
            Expression::Function(f) | Expression::Arrow(f) => f.span,
            Expression::Class(c) => c.span,
            Expression::This(span) | Expression::Super(span) => *span,
            Expression::Member(m) => m.span,
            Expression::Call(c) => c.span,
            Expression::Chain(c) => c.span,
            Expression::New(n) => n.span,
            Expression::Unary(u) => u.span,
            Expression::Update(u) => u.span,
            Expression::Binary(b) => b.span,
            Expression::Logical(l) => l.span,
            Expression::Assignment(a) => a.span,
            Expression::Conditional(c) => c.span,
            Expression::Sequence(s) => s.span,
            Expression::Spread(s) => s.span,
            Expression::Yield(y) => y.span,
            Expression::Await(a) => a.span,
            Expression::MetaProperty(m) => m.span,
            Expression::Import(i) => i.span,
            Expression::PrivateIn(p) => p.span,
        }
    }

    /// Identifier reference shorthand
    pub fn ident(name: &str) -> Self {
        Expression::Identifier(Identifier::new(name, Span::default()))
    }

    /// Numeric literal shorthand
    pub fn number(n: f64) -> Self {
        Expression::Literal(Literal::number(n))
    }

    /// Is this an anonymous function or class whose name comes from the
    /// binding it is assigned to?
    pub fn is_anonymous_function_definition(&self) -> bool {
        match self {
            Expression::Function(f) => f.id.is_none(),
            Expression::Arrow(_) => true,
            Expression::Class(c) => c.id.is_none(),
            _ => false,
        }
    }
}

/// Literal value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Literal {
    pub value: LiteralValue,
    #[serde(default)]
    pub span: Span,
}

impl Literal {
    pub fn number(n: f64) -> Self {
        Self {
            value: LiteralValue::Number(n),
            span: Span::default(),
        }
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self {
            value: LiteralValue::String(s.into()),
            span: Span::default(),
        }
    }
}

/// Literal value kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum LiteralValue {
    Null,
    Undefined,
    Boolean(bool),
    Number(f64),
    /// Digits of a bigint literal, decimal or with a 0x/0o/0b prefix
    BigInt(String),
    String(String),
    Regex { pattern: String, flags: String },
}

/// Template literal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateLiteral {
    /// String parts, one more than the expressions
    pub quasis: Vec<TemplateElement>,
    /// Embedded expressions
    #[serde(default)]
    pub expressions: Vec<Expression>,
    #[serde(default)]
    pub span: Span,
}

/// Tagged template expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedTemplateExpression {
    pub tag: Expression,
    pub quasi: TemplateLiteral,
    #[serde(default)]
    pub span: Span,
}

/// Array literal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayExpression {
    /// Elements; `None` is a hole, spreads appear as `Expression::Spread`
    pub elements: Vec<Option<Expression>>,
    #[serde(default)]
    pub span: Span,
}

/// Object literal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectExpression {
    pub properties: Vec<ObjectProperty>,
    #[serde(default)]
    pub span: Span,
}

/// Object literal member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ObjectProperty {
    Property(Property),
    Spread(SpreadElement),
}

/// `key: value`, shorthand, method or accessor in an object literal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub key: PropertyKey,
    pub value: Expression,
    #[serde(default = "PropertyKind::init")]
    pub kind: PropertyKind,
    #[serde(default)]
    pub method: bool,
    #[serde(default)]
    pub shorthand: bool,
    #[serde(default)]
    pub span: Span,
}

/// Kind of an object literal property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    Init,
    Get,
    Set,
}

impl PropertyKind {
    fn init() -> Self {
        PropertyKind::Init
    }
}

/// Property of a member access
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum MemberProperty {
    /// obj.name
    Identifier(String),
    /// obj[expr]
    Computed(Expression),
    /// obj.#name
    PrivateName(String),
}

/// Member expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberExpression {
    pub object: Expression,
    pub property: MemberProperty,
    /// `obj?.prop`
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub span: Span,
}

/// Call expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallExpression {
    pub callee: Expression,
    #[serde(default)]
    pub arguments: Vec<Expression>,
    /// `f?.()`
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub span: Span,
}

/// Extent of an optional chain: a null/undefined link short-circuits to
/// the end of this node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainExpression {
    pub expression: Expression,
    #[serde(default)]
    pub span: Span,
}

/// New expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExpression {
    pub callee: Expression,
    #[serde(default)]
    pub arguments: Vec<Expression>,
    #[serde(default)]
    pub span: Span,
}

/// Unary expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnaryExpression {
    pub operator: UnaryOperator,
    pub argument: Expression,
    #[serde(default)]
    pub span: Span,
}

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    /// -
    Minus,
    /// +
    Plus,
    /// !
    Not,
    /// ~
    BitwiseNot,
    Typeof,
    Void,
    Delete,
}

/// Update expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateExpression {
    pub operator: UpdateOperator,
    /// ++x rather than x++
    pub prefix: bool,
    pub argument: Expression,
    #[serde(default)]
    pub span: Span,
}

/// Update operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateOperator {
    Increment,
    Decrement,
}

/// Binary expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryExpression {
    pub operator: BinaryOperator,
    pub left: Expression,
    pub right: Expression,
    #[serde(default)]
    pub span: Span,
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
    Shl,
    Shr,
    UShr,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    In,
    Instanceof,
}

/// Logical expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalExpression {
    pub operator: LogicalOperator,
    pub left: Expression,
    pub right: Expression,
    #[serde(default)]
    pub span: Span,
}

/// Logical operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOperator {
    And,
    Or,
    NullishCoalescing,
}

/// Assignment expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentExpression {
    pub operator: AssignmentOperator,
    /// Identifier, member or destructuring target
    pub left: Pattern,
    pub right: Expression,
    #[serde(default)]
    pub span: Span,
}

/// Assignment operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentOperator {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    ExpAssign,
    ShlAssign,
    ShrAssign,
    UShrAssign,
    BitAndAssign,
    BitOrAssign,
    BitXorAssign,
    AndAssign,
    OrAssign,
    NullishAssign,
}

impl AssignmentOperator {
    /// Binary operator applied by a compound assignment
    pub fn binary(self) -> Option<BinaryOperator> {
        use AssignmentOperator::*;
        Some(match self {
            AddAssign => BinaryOperator::Add,
            SubAssign => BinaryOperator::Sub,
            MulAssign => BinaryOperator::Mul,
            DivAssign => BinaryOperator::Div,
            ModAssign => BinaryOperator::Mod,
            ExpAssign => BinaryOperator::Exp,
            ShlAssign => BinaryOperator::Shl,
            ShrAssign => BinaryOperator::Shr,
            UShrAssign => BinaryOperator::UShr,
            BitAndAssign => BinaryOperator::BitwiseAnd,
            BitOrAssign => BinaryOperator::BitwiseOr,
            BitXorAssign => BinaryOperator::BitwiseXor,
            Assign | AndAssign | OrAssign | NullishAssign => return None,
        })
    }

    /// Short-circuiting operator of `&&=`, `||=` and `??=`
    pub fn logical(self) -> Option<LogicalOperator> {
        match self {
            AssignmentOperator::AndAssign => Some(LogicalOperator::And),
            AssignmentOperator::OrAssign => Some(LogicalOperator::Or),
            AssignmentOperator::NullishAssign => Some(LogicalOperator::NullishCoalescing),
            _ => None,
        }
    }
}

/// Conditional expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalExpression {
    pub test: Expression,
    pub consequent: Expression,
    pub alternate: Expression,
    #[serde(default)]
    pub span: Span,
}

/// Sequence expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceExpression {
    pub expressions: Vec<Expression>,
    #[serde(default)]
    pub span: Span,
}

/// Spread element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadElement {
    pub argument: Expression,
    #[serde(default)]
    pub span: Span,
}

/// Yield expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldExpression {
    #[serde(default)]
    pub argument: Option<Expression>,
    /// yield*
    #[serde(default)]
    pub delegate: bool,
    #[serde(default)]
    pub span: Span,
}

/// Await expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwaitExpression {
    pub argument: Expression,
    #[serde(default)]
    pub span: Span,
}

/// Meta property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaProperty {
    /// `new` or `import`
    pub meta: String,
    /// `target` or `meta`
    pub property: String,
    #[serde(default)]
    pub span: Span,
}

/// Dynamic import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportExpression {
    pub source: Expression,
    #[serde(default)]
    pub options: Option<Expression>,
    #[serde(default)]
    pub span: Span,
}

/// Brand check `#name in obj`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivateInExpression {
    /// Private name without the leading `#`
    pub name: String,
    pub right: Expression,
    #[serde(default)]
    pub span: Span,
}
