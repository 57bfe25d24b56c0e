//! Pattern AST node types for bindings, destructuring and assignment targets

use super::*;

/// A binding or assignment target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Pattern {
    /// Simple identifier binding
    Identifier(Identifier),

    /// Array destructuring pattern [a, b, c]
    Array(ArrayPattern),

    /// Object destructuring pattern {a, b, c}
    Object(ObjectPattern),

    /// Pattern with a default value a = 1
    Assignment(Box<AssignmentPattern>),

    /// Rest element ...rest
    Rest(Box<RestElement>),

    /// Member expression (assignment targets only, not declarations)
    Member(Box<MemberExpression>),
}

impl Pattern {
    /// Get the span of this pattern
    pub fn span(&self) -> Span {
        match self {
            Pattern::Identifier(id) => id.span,
            Pattern::Array(a) => a.span,
            Pattern::Object(o) => o.span,
            Pattern::Assignment(a) => a.span,
            Pattern::Rest(r) => r.span,
            Pattern::Member(m) => m.span,
        }
    }

    /// Identifier pattern shorthand
    pub fn ident(name: &str) -> Self {
        Pattern::Identifier(Identifier::new(name, Span::default()))
    }

    /// Get all bound identifiers in this pattern
    pub fn bound_names(&self) -> Vec<&Identifier> {
        let mut names = Vec::new();
        self.collect_bound_names(&mut names);
        names
    }

    fn collect_bound_names<'a>(&'a self, names: &mut Vec<&'a Identifier>) {
        match self {
            Pattern::Identifier(id) => names.push(id),
            Pattern::Array(arr) => {
                for elem in arr.elements.iter().flatten() {
                    elem.collect_bound_names(names);
                }
            }
            Pattern::Object(obj) => {
                for prop in &obj.properties {
                    match prop {
                        ObjectPatternProperty::Property { value, .. } => {
                            value.collect_bound_names(names)
                        }
                        ObjectPatternProperty::Rest { argument, .. } => {
                            argument.collect_bound_names(names)
                        }
                    }
                }
            }
            Pattern::Assignment(a) => a.left.collect_bound_names(names),
            Pattern::Rest(r) => r.argument.collect_bound_names(names),
            Pattern::Member(_) => {}
        }
    }
}

/// Array destructuring pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayPattern {
    /// Elements; `None` for holes, a trailing `Pattern::Rest` for the rest
    pub elements: Vec<Option<Pattern>>,
    #[serde(default)]
    pub span: Span,
}

/// Object destructuring pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectPattern {
    pub properties: Vec<ObjectPatternProperty>,
    #[serde(default)]
    pub span: Span,
}

/// Object pattern member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ObjectPatternProperty {
    /// {key: value} or shorthand {key}
    Property {
        key: PropertyKey,
        value: Pattern,
        #[serde(default)]
        shorthand: bool,
        #[serde(default)]
        span: Span,
    },
    /// {...rest}
    Rest {
        argument: Pattern,
        #[serde(default)]
        span: Span,
    },
}

/// Pattern with a default value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentPattern {
    pub left: Pattern,
    pub right: Expression,
    #[serde(default)]
    pub span: Span,
}

/// Rest element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestElement {
    pub argument: Pattern,
    #[serde(default)]
    pub span: Span,
}
