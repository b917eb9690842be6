//! The declaration-surface AST the binder consumes.
//!
//! Nodes are `Rc`-shared: program entities keep references to the
//! declarations they were created from, and the same node may be referenced
//! from several entities (a prototype and its queued import record, for
//! example). Function bodies are not represented; the binder only needs the
//! declaration surface.

use std::rc::Rc;

use bitflags::bitflags;

use crate::compiler::text::Range;

bitflags! {
    /// Declaration modifier keywords, as parsed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModifierFlags: u16 {
        const NONE = 0;
        const IMPORT = 1 << 0;
        const EXPORT = 1 << 1;
        const DECLARE = 1 << 2;
        const CONST = 1 << 3;
        const LET = 1 << 4;
        const VAR = 1 << 5;
        const STATIC = 1 << 6;
        const GET = 1 << 7;
        const SET = 1 << 8;
        const READONLY = 1 << 9;
        const PRIVATE = 1 << 10;
        const PROTECTED = 1 << 11;
        const PUBLIC = 1 << 12;
        const ABSTRACT = 1 << 13;
    }
}

impl Default for ModifierFlags {
    fn default() -> Self {
        Self::NONE
    }
}

/// An identifier with its source range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    pub text: String,
    pub range: Range,
}

/// A type expression: a name with optional type arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeNode {
    pub name: Identifier,
    pub type_arguments: Vec<TypeNode>,
    pub range: Range,
}

/// A declared type parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeParameterNode {
    pub name: Identifier,
    pub range: Range,
}

/// A function or method parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterNode {
    pub name: Identifier,
    pub type_node: Option<TypeNode>,
    pub initializer: Option<Expression>,
    pub range: Range,
}

/// A decorator applied to a declaration, e.g. `@global`.
#[derive(Debug, Clone, PartialEq)]
pub struct Decorator {
    pub name: Identifier,
    pub arguments: Vec<Expression>,
    pub range: Range,
}

/// The expression kinds the binder and resolver understand.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Identifier(Identifier),
    PropertyAccess(Rc<PropertyAccessExpression>),
    This(Range),
    New(Rc<NewExpression>),
    IntegerLiteral(i64, Range),
    FloatLiteral(f64, Range),
    StringLiteral(String, Range),
}

impl Expression {
    pub fn range(&self) -> &Range {
        match self {
            Expression::Identifier(id) => &id.range,
            Expression::PropertyAccess(pa) => &pa.range,
            Expression::This(range) => range,
            Expression::New(new) => &new.range,
            Expression::IntegerLiteral(_, range) => range,
            Expression::FloatLiteral(_, range) => range,
            Expression::StringLiteral(_, range) => range,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyAccessExpression {
    pub expression: Expression,
    pub property: Identifier,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewExpression {
    pub expression: Expression,
    pub type_arguments: Vec<TypeNode>,
    pub arguments: Vec<Expression>,
    pub range: Range,
}

/// A top-level (or namespace-level) statement.
#[derive(Debug, Clone)]
pub enum Statement {
    Class(Rc<ClassDeclaration>),
    Enum(Rc<EnumDeclaration>),
    Export(Rc<ExportStatement>),
    Function(Rc<FunctionDeclaration>),
    Import(Rc<ImportStatement>),
    Interface(Rc<ClassDeclaration>),
    Namespace(Rc<NamespaceDeclaration>),
    TypeAlias(Rc<TypeDeclaration>),
    Variable(Rc<VariableStatement>),
}

/// A class or interface declaration. Interfaces reuse the class shape; the
/// enclosing [`Statement`] distinguishes them.
#[derive(Debug, Clone)]
pub struct ClassDeclaration {
    pub name: Identifier,
    pub type_parameters: Vec<TypeParameterNode>,
    pub extends_type: Option<TypeNode>,
    pub members: Vec<ClassMember>,
    pub modifiers: ModifierFlags,
    pub decorators: Vec<Decorator>,
    pub range: Range,
}

#[derive(Debug, Clone)]
pub enum ClassMember {
    Field(Rc<FieldDeclaration>),
    Method(Rc<FunctionDeclaration>),
}

#[derive(Debug, Clone)]
pub struct FieldDeclaration {
    pub name: Identifier,
    pub type_node: Option<TypeNode>,
    pub initializer: Option<Expression>,
    pub modifiers: ModifierFlags,
    pub range: Range,
}

/// A function or method declaration. Methods carry their placement
/// modifiers (`static`, `get`, `set`, visibility).
#[derive(Debug, Clone)]
pub struct FunctionDeclaration {
    pub name: Identifier,
    pub type_parameters: Vec<TypeParameterNode>,
    pub parameters: Vec<ParameterNode>,
    pub return_type: Option<TypeNode>,
    pub modifiers: ModifierFlags,
    pub decorators: Vec<Decorator>,
    pub range: Range,
}

#[derive(Debug, Clone)]
pub struct EnumDeclaration {
    pub name: Identifier,
    pub values: Vec<Rc<EnumValueDeclaration>>,
    pub modifiers: ModifierFlags,
    pub decorators: Vec<Decorator>,
    pub range: Range,
}

#[derive(Debug, Clone)]
pub struct EnumValueDeclaration {
    pub name: Identifier,
    pub initializer: Option<Expression>,
    pub range: Range,
}

#[derive(Debug, Clone)]
pub struct NamespaceDeclaration {
    pub name: Identifier,
    pub members: Vec<Statement>,
    pub modifiers: ModifierFlags,
    pub decorators: Vec<Decorator>,
    pub range: Range,
}

/// A type alias declaration, `type Name = ...;`.
#[derive(Debug, Clone)]
pub struct TypeDeclaration {
    pub name: Identifier,
    pub type_node: Rc<TypeNode>,
    pub modifiers: ModifierFlags,
    pub range: Range,
}

/// A variable statement holding one or more declarations.
#[derive(Debug, Clone)]
pub struct VariableStatement {
    pub declarations: Vec<Rc<VariableDeclaration>>,
    pub modifiers: ModifierFlags,
    pub decorators: Vec<Decorator>,
    pub range: Range,
}

#[derive(Debug, Clone)]
pub struct VariableDeclaration {
    pub name: Identifier,
    pub type_node: Option<TypeNode>,
    pub initializer: Option<Expression>,
    pub range: Range,
}

/// An import statement. `declarations` is `None` for the namespace form
/// (`import * as ns from "..."`), which the binder rejects.
#[derive(Debug, Clone)]
pub struct ImportStatement {
    pub declarations: Option<Vec<Rc<ImportDeclaration>>>,
    pub namespace_name: Option<Identifier>,
    /// The module specifier as written.
    pub path: String,
    /// The specifier resolved against the importing file.
    pub internal_path: String,
    pub range: Range,
}

/// A single named import: `externalName` in the module, bound locally as
/// `name`.
#[derive(Debug, Clone)]
pub struct ImportDeclaration {
    pub external_name: Identifier,
    pub name: Identifier,
    pub range: Range,
}

/// An export list, optionally re-exporting from another module.
#[derive(Debug, Clone)]
pub struct ExportStatement {
    pub members: Vec<Rc<ExportMember>>,
    pub path: Option<String>,
    pub internal_path: Option<String>,
    pub range: Range,
}

/// A single export: local `name` exposed as `externalName`.
#[derive(Debug, Clone)]
pub struct ExportMember {
    pub name: Identifier,
    pub external_name: Identifier,
    pub range: Range,
}

/// A parsed source file.
#[derive(Debug, Clone)]
pub struct Source {
    /// Path-delimited identity of the file within the program, without
    /// extension.
    pub internal_path: Rc<str>,
    pub text: String,
    pub statements: Vec<Statement>,
}
