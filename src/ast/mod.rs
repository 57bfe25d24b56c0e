//! Abstract Syntax Tree (AST) types for JavaScript
//!
//! The tree is produced by an external front end and handed to the
//! compiler, usually as JSON. Node enums are tagged with a `"type"` field
//! the way ESTree is; spans are optional in the JSON form.

mod expr;
mod pattern;
mod stmt;

pub use expr::*;
pub use pattern::*;
pub use stmt::*;

use crate::error::SourceLocation;
use serde::{Deserialize, Serialize};

/// A span in the source code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    /// Start location
    #[serde(default)]
    pub start: SourceLocation,
    /// End location
    #[serde(default)]
    pub end: SourceLocation,
}

impl Span {
    /// Create a new span
    pub fn new(start: SourceLocation, end: SourceLocation) -> Self {
        Self { start, end }
    }

    /// Span covering a single line, for hand-built trees
    pub fn line(line: u32) -> Self {
        let loc = SourceLocation::new(line, 1);
        Self { start: loc, end: loc }
    }

    /// Merge two spans into one covering both
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: if self.start.offset < other.start.offset {
                self.start
            } else {
                other.start
            },
            end: if self.end.offset > other.end.offset {
                self.end
            } else {
                other.end
            },
        }
    }
}

/// A complete JavaScript program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// The statements in the program
    pub body: Vec<Statement>,
    /// Source type (script or module)
    #[serde(default)]
    pub source_type: SourceType,
    /// Whether this program is in strict mode
    #[serde(default)]
    pub strict: bool,
    /// Full source text, kept in the debug block unless stripped
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub span: Span,
}

impl Program {
    /// Script with the given statements
    pub fn script(body: Vec<Statement>) -> Self {
        Self {
            body,
            source_type: SourceType::Script,
            strict: false,
            source: None,
            span: Span::default(),
        }
    }

    /// Module with the given statements; modules are always strict
    pub fn module(body: Vec<Statement>) -> Self {
        Self {
            body,
            source_type: SourceType::Module,
            strict: true,
            source: None,
            span: Span::default(),
        }
    }

    /// Does the body start with a `"use strict"` directive?
    pub fn has_use_strict(&self) -> bool {
        has_use_strict(&self.body)
    }
}

/// Source type of a program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SourceType {
    #[default]
    Script,
    Module,
}

/// Scan the directive prologue of a body for `"use strict"`
pub fn has_use_strict(body: &[Statement]) -> bool {
    for stmt in body {
        match stmt {
            Statement::Expression(ExpressionStatement {
                expression:
                    Expression::Literal(Literal {
                        value: LiteralValue::String(s),
                        ..
                    }),
                ..
            }) => {
                if s == "use strict" {
                    return true;
                }
            }
            _ => return false,
        }
    }
    false
}

/// An identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    /// The identifier name
    pub name: String,
    #[serde(default)]
    pub span: Span,
}

impl Identifier {
    /// Create a new identifier
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}

/// Variable declaration kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    Var,
    Let,
    Const,
}

impl VariableKind {
    pub fn is_lexical(self) -> bool {
        !matches!(self, VariableKind::Var)
    }
}

/// Variable declarator: `a = 1` in `let a = 1, b;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDeclarator {
    /// Binding pattern
    pub id: Pattern,
    /// Initializer
    #[serde(default)]
    pub init: Option<Expression>,
    #[serde(default)]
    pub span: Span,
}

/// Variable declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDeclaration {
    pub kind: VariableKind,
    pub declarations: Vec<VariableDeclarator>,
    #[serde(default)]
    pub span: Span,
}

/// Function, method, arrow function or accessor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    /// Function name, absent for anonymous functions
    #[serde(default)]
    pub id: Option<Identifier>,
    /// Parameters; a trailing `Pattern::Rest` is the rest parameter
    #[serde(default)]
    pub params: Vec<Pattern>,
    pub body: FunctionBody,
    #[serde(default)]
    pub is_async: bool,
    #[serde(default)]
    pub is_generator: bool,
    #[serde(default)]
    pub is_arrow: bool,
    /// Source text of the function, kept in the debug block
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub span: Span,
}

impl Function {
    /// Parameter list made only of plain identifiers
    pub fn has_simple_params(&self) -> bool {
        self.params.iter().all(|p| matches!(p, Pattern::Identifier(_)))
    }

    /// Number of parameters before the first default or rest
    pub fn defined_arg_count(&self) -> usize {
        self.params
            .iter()
            .take_while(|p| !matches!(p, Pattern::Assignment(_) | Pattern::Rest(_)))
            .count()
    }
}

/// Function body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum FunctionBody {
    /// Block body
    Block(Vec<Statement>),
    /// Expression body of an arrow function
    Expression(Box<Expression>),
}

/// Class declaration or expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Class {
    #[serde(default)]
    pub id: Option<Identifier>,
    /// Superclass expression
    #[serde(default)]
    pub super_class: Option<Box<Expression>>,
    pub body: Vec<ClassElement>,
    #[serde(default)]
    pub span: Span,
}

/// Class member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClassElement {
    Method(MethodDefinition),
    Property(PropertyDefinition),
    StaticBlock(StaticBlock),
}

/// Method definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDefinition {
    pub key: PropertyKey,
    pub value: Function,
    pub kind: MethodKind,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub span: Span,
}

/// Method kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodKind {
    Method,
    Get,
    Set,
    Constructor,
}

/// Class field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDefinition {
    pub key: PropertyKey,
    #[serde(default)]
    pub value: Option<Expression>,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub span: Span,
}

/// `static { ... }` block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticBlock {
    pub body: Vec<Statement>,
    #[serde(default)]
    pub span: Span,
}

/// Property key of an object literal member, class member or pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum PropertyKey {
    Identifier(String),
    String(String),
    Number(f64),
    Computed(Box<Expression>),
    PrivateName(String),
}

impl PropertyKey {
    /// Static name of the key, if it is not computed
    pub fn static_name(&self) -> Option<String> {
        match self {
            PropertyKey::Identifier(s) | PropertyKey::String(s) => Some(s.clone()),
            PropertyKey::Number(n) => Some(number_to_key(*n)),
            PropertyKey::Computed(_) | PropertyKey::PrivateName(_) => None,
        }
    }
}

/// Property-key spelling of a numeric literal
pub fn number_to_key(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Template literal element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateElement {
    /// Raw string
    pub raw: String,
    /// Cooked string, `None` for an invalid escape in a tagged template
    #[serde(default)]
    pub cooked: Option<String>,
    #[serde(default)]
    pub tail: bool,
    #[serde(default)]
    pub span: Span,
}

/// Import specifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ImportSpecifier {
    /// `import { imported as local }`
    Named { imported: String, local: Identifier },
    /// `import * as local`
    Namespace { local: Identifier },
    /// `import local`
    Default { local: Identifier },
}

impl ImportSpecifier {
    pub fn local(&self) -> &Identifier {
        match self {
            ImportSpecifier::Named { local, .. }
            | ImportSpecifier::Namespace { local }
            | ImportSpecifier::Default { local } => local,
        }
    }
}

/// `with { type: "json" }` attribute of an import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportAttribute {
    pub key: String,
    pub value: String,
}

/// Export specifier: `export { local as exported }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSpecifier {
    pub local: String,
    pub exported: String,
    #[serde(default)]
    pub span: Span,
}

/// Switch case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    /// `None` for `default:`
    #[serde(default)]
    pub test: Option<Expression>,
    pub consequent: Vec<Statement>,
    #[serde(default)]
    pub span: Span,
}

/// Catch clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchClause {
    #[serde(default)]
    pub param: Option<Pattern>,
    pub body: BlockStatement,
    #[serde(default)]
    pub span: Span,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_use_strict_prologue() {
        let directive = Statement::Expression(ExpressionStatement {
            expression: Expression::Literal(Literal::string("use strict")),
            span: Span::default(),
        });
        assert!(has_use_strict(&[directive.clone()]));
        let other = Statement::Empty(Span::default());
        assert!(!has_use_strict(&[other, directive]));
    }

    #[test]
    fn test_number_keys() {
        assert_eq!(number_to_key(1.0), "1");
        assert_eq!(number_to_key(1.5), "1.5");
        assert_eq!(PropertyKey::Number(10.0).static_name().as_deref(), Some("10"));
    }

    #[test]
    fn test_program_from_json() {
        let json = r#"{
            "body": [
                {"type": "Expression", "expression": {"type": "Identifier", "name": "a"}}
            ]
        }"#;
        let program: Program = serde_json::from_str(json).unwrap();
        assert_eq!(program.source_type, SourceType::Script);
        assert!(matches!(
            &program.body[0],
            Statement::Expression(ExpressionStatement { expression: Expression::Identifier(id), .. })
                if id.name == "a"
        ));
    }
}
