//! The program entity model: every named thing the binder tracks, stored in
//! a flat arena and addressed by integer handles.
//!
//! Entities form a cyclic graph (classes own member prototypes which point
//! back at their class; prototypes cache instances which point back at their
//! prototype), so ownership is flat: the arena owns everything for the
//! lifetime of the program and entities refer to each other by [`ElementId`].

use std::collections::HashMap;
use std::rc::Rc;

use bitflags::bitflags;

use crate::compiler::ast::{
    ClassDeclaration, EnumDeclaration, EnumValueDeclaration, Expression, FieldDeclaration,
    FunctionDeclaration, NamespaceDeclaration, VariableDeclaration,
};
use crate::compiler::types::Type;

/// Handle of an entity in the program's element arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u32);

bitflags! {
    /// Flags shared by all entity kinds.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ElementFlags: u32 {
        const NONE = 0;
        /// Code has been generated for this entity.
        const COMPILED = 1 << 0;
        /// Imported from another module.
        const IMPORTED = 1 << 1;
        /// Exported from its module.
        const EXPORTED = 1 << 2;
        /// Registered by the built-in initializer.
        const BUILTIN = 1 << 3;
        /// Declared ambient (`declare`).
        const DECLARED = 1 << 4;
        /// Carries type parameters.
        const GENERIC = 1 << 5;
        /// Not mutable.
        const CONSTANT = 1 << 6;
        /// Has a compile-time constant value.
        const CONSTANT_VALUE = 1 << 7;
        /// An instance member.
        const INSTANCE = 1 << 8;
        /// A getter.
        const GETTER = 1 << 9;
        /// A setter.
        const SETTER = 1 << 10;
        /// Additionally registered under its bare simple name.
        const GLOBAL = 1 << 11;
        const READONLY = 1 << 12;
        const PUBLIC = 1 << 13;
        const PROTECTED = 1 << 14;
        const PRIVATE = 1 << 15;
    }
}

impl Default for ElementFlags {
    fn default() -> Self {
        Self::NONE
    }
}

/// Fields common to every entity kind.
#[derive(Debug, Clone)]
pub struct ElementBase {
    /// The declared name.
    pub simple_name: String,
    /// The program-unique mangled name.
    pub internal_name: String,
    pub flags: ElementFlags,
    /// The enclosing namespace-like entity, if any.
    pub namespace: Option<ElementId>,
    /// Named members, allocated lazily on first insertion.
    pub members: Option<HashMap<String, ElementId>>,
}

impl ElementBase {
    pub fn new(simple_name: impl Into<String>, internal_name: impl Into<String>) -> Self {
        ElementBase {
            simple_name: simple_name.into(),
            internal_name: internal_name.into(),
            flags: ElementFlags::NONE,
            namespace: None,
            members: None,
        }
    }

    pub fn with_flags(mut self, flags: ElementFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn is_mutable(&self) -> bool {
        !self.flags.contains(ElementFlags::CONSTANT)
    }

    /// The member map, allocated on first use.
    pub fn members_mut(&mut self) -> &mut HashMap<String, ElementId> {
        self.members.get_or_insert_with(HashMap::new)
    }

    pub fn member(&self, name: &str) -> Option<ElementId> {
        self.members.as_ref().and_then(|m| m.get(name)).copied()
    }
}

/// A compile-time constant value attached to a global or field.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    Integer(i64),
    Float(f64),
}

/// The declaration behind a global: a variable declarator at module or
/// namespace level, or a static field.
#[derive(Debug, Clone)]
pub enum VariableLikeDeclaration {
    Variable(Rc<VariableDeclaration>),
    Field(Rc<FieldDeclaration>),
}

impl VariableLikeDeclaration {
    pub fn name(&self) -> &crate::compiler::ast::Identifier {
        match self {
            VariableLikeDeclaration::Variable(v) => &v.name,
            VariableLikeDeclaration::Field(f) => &f.name,
        }
    }

    pub fn type_node(&self) -> Option<&crate::compiler::ast::TypeNode> {
        match self {
            VariableLikeDeclaration::Variable(v) => v.type_node.as_ref(),
            VariableLikeDeclaration::Field(f) => f.type_node.as_ref(),
        }
    }

    pub fn initializer(&self) -> Option<&Expression> {
        match self {
            VariableLikeDeclaration::Variable(v) => v.initializer.as_ref(),
            VariableLikeDeclaration::Field(f) => f.initializer.as_ref(),
        }
    }
}

/// A semantic container for other declarations.
#[derive(Debug, Clone)]
pub struct Namespace {
    pub base: ElementBase,
    pub declaration: Rc<NamespaceDeclaration>,
}

#[derive(Debug, Clone)]
pub struct Enum {
    pub base: ElementBase,
    pub declaration: Rc<EnumDeclaration>,
}

#[derive(Debug, Clone)]
pub struct EnumValue {
    pub base: ElementBase,
    pub declaration: Rc<EnumValueDeclaration>,
    pub parent_enum: ElementId,
    pub constant_value: i32,
}

/// A module-level variable. Static class fields are also represented as
/// globals.
#[derive(Debug, Clone)]
pub struct Global {
    pub base: ElementBase,
    /// Absent on built-ins.
    pub declaration: Option<VariableLikeDeclaration>,
    /// Absent until resolved.
    pub typ: Option<Type>,
    pub constant_value: Option<ConstantValue>,
}

/// A function-local variable or parameter. Lives in a function's `locals`
/// map, never in the program's element directory.
#[derive(Debug, Clone)]
pub struct Local {
    pub base: ElementBase,
    /// Zero-based index within the function.
    pub index: usize,
    pub typ: Type,
}

/// The declaration of a (possibly generic) function, before type arguments
/// are bound.
#[derive(Debug, Clone)]
pub struct FunctionPrototype {
    pub base: ElementBase,
    /// Absent on built-ins.
    pub declaration: Option<Rc<FunctionDeclaration>>,
    /// The owning class prototype of an instance method.
    pub class_prototype: Option<ElementId>,
    /// Concrete instances, keyed by canonical type-argument string.
    pub instances: HashMap<String, ElementId>,
}

/// A resolved function parameter.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub typ: Type,
    pub initializer: Option<Expression>,
}

/// A concrete function produced by resolving a prototype against type
/// arguments.
#[derive(Debug, Clone)]
pub struct Function {
    pub base: ElementBase,
    pub prototype: ElementId,
    pub type_arguments: Vec<Type>,
    pub parameters: Vec<Parameter>,
    pub return_type: Type,
    /// The class instance this function is a method of, if any. When set,
    /// `locals` contains `this` at index 0.
    pub instance_method_of: Option<ElementId>,
    /// Named locals: `this`, parameters, and named additional locals.
    pub locals: HashMap<String, ElementId>,
    /// Types of locals registered beyond the signature.
    pub additional_locals: Vec<Type>,
    /// Type-parameter bindings in effect inside this function.
    pub contextual_type_arguments: HashMap<String, Type>,
    /// The current break label, if inside a breakable scope.
    pub break_context: Option<String>,
    pub(crate) break_stack: Vec<u32>,
    pub(crate) next_break_id: u32,
    pub(crate) temp_i32s: Vec<ElementId>,
    pub(crate) temp_i64s: Vec<ElementId>,
    pub(crate) temp_f32s: Vec<ElementId>,
    pub(crate) temp_f64s: Vec<ElementId>,
}

impl Function {
    /// Enters a new breakable scope, making its label current.
    pub fn enter_break_context(&mut self) -> &str {
        let id = self.next_break_id;
        self.next_break_id += 1;
        self.break_stack.push(id);
        self.break_context = Some(id.to_string());
        self.break_context.as_deref().unwrap_or_default()
    }

    /// Leaves the current breakable scope, restoring the enclosing label.
    pub fn leave_break_context(&mut self) {
        assert!(
            !self.break_stack.is_empty(),
            "leave_break_context called without a matching enter"
        );
        self.break_stack.pop();
        self.break_context = self.break_stack.last().map(|id| id.to_string());
    }

    /// Releases per-compile transient state. The break stack must be
    /// balanced by the time a function is finalized.
    pub fn finalize(&mut self) {
        assert!(
            self.break_stack.is_empty(),
            "break contexts left unbalanced in '{}'",
            self.base.internal_name
        );
        self.break_context = None;
        self.temp_i32s.clear();
        self.temp_i64s.clear();
        self.temp_f32s.clear();
        self.temp_f64s.clear();
    }
}

/// The declaration of an instance field, before its class is resolved.
#[derive(Debug, Clone)]
pub struct FieldPrototype {
    pub base: ElementBase,
    pub declaration: Rc<FieldDeclaration>,
    pub class_prototype: ElementId,
}

/// A resolved instance field.
#[derive(Debug, Clone)]
pub struct Field {
    pub base: ElementBase,
    pub prototype: ElementId,
    pub typ: Type,
    pub constant_value: Option<ConstantValue>,
}

/// A property fusing a getter and/or setter accessor pair.
#[derive(Debug, Clone)]
pub struct Property {
    pub base: ElementBase,
    pub class_prototype: ElementId,
    pub getter_prototype: Option<ElementId>,
    pub setter_prototype: Option<ElementId>,
}

/// The declaration of a (possibly generic) class or interface, before type
/// arguments are bound. Static members live in `base.members`; instance
/// members in `instance_members`.
#[derive(Debug, Clone)]
pub struct ClassPrototype {
    pub base: ElementBase,
    pub declaration: Option<Rc<ClassDeclaration>>,
    /// Concrete instances, keyed by canonical type-argument string.
    pub instances: HashMap<String, ElementId>,
    pub instance_members: HashMap<String, ElementId>,
}

/// A concrete class produced by resolving a prototype against type
/// arguments.
#[derive(Debug, Clone)]
pub struct Class {
    pub base: ElementBase,
    pub prototype: ElementId,
    pub type_arguments: Vec<Type>,
    /// The pointer-width type representing instances of this class.
    pub typ: Type,
    pub base_class: Option<ElementId>,
    /// Type-parameter bindings inherited by member resolution.
    pub contextual_type_arguments: HashMap<String, Type>,
}

/// Entity kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Namespace,
    Enum,
    EnumValue,
    Global,
    Local,
    FunctionPrototype,
    Function,
    ClassPrototype,
    Class,
    InterfacePrototype,
    Interface,
    FieldPrototype,
    Field,
    Property,
}

impl ElementKind {
    pub const fn token(self) -> &'static str {
        match self {
            ElementKind::Namespace => "namespace",
            ElementKind::Enum => "enum",
            ElementKind::EnumValue => "enum value",
            ElementKind::Global => "global",
            ElementKind::Local => "local",
            ElementKind::FunctionPrototype => "function prototype",
            ElementKind::Function => "function",
            ElementKind::ClassPrototype => "class prototype",
            ElementKind::Class => "class",
            ElementKind::InterfacePrototype => "interface prototype",
            ElementKind::Interface => "interface",
            ElementKind::FieldPrototype => "field prototype",
            ElementKind::Field => "field",
            ElementKind::Property => "property",
        }
    }
}

/// A program entity. Interfaces specialize the class payloads: an
/// `InterfacePrototype` is a `ClassPrototype` whose instances are
/// `Interface`s.
#[derive(Debug, Clone)]
pub enum Element {
    Namespace(Namespace),
    Enum(Enum),
    EnumValue(EnumValue),
    Global(Global),
    Local(Local),
    FunctionPrototype(FunctionPrototype),
    Function(Function),
    ClassPrototype(ClassPrototype),
    Class(Class),
    InterfacePrototype(ClassPrototype),
    Interface(Class),
    FieldPrototype(FieldPrototype),
    Field(Field),
    Property(Property),
}

impl Element {
    pub fn kind(&self) -> ElementKind {
        match self {
            Element::Namespace(_) => ElementKind::Namespace,
            Element::Enum(_) => ElementKind::Enum,
            Element::EnumValue(_) => ElementKind::EnumValue,
            Element::Global(_) => ElementKind::Global,
            Element::Local(_) => ElementKind::Local,
            Element::FunctionPrototype(_) => ElementKind::FunctionPrototype,
            Element::Function(_) => ElementKind::Function,
            Element::ClassPrototype(_) => ElementKind::ClassPrototype,
            Element::Class(_) => ElementKind::Class,
            Element::InterfacePrototype(_) => ElementKind::InterfacePrototype,
            Element::Interface(_) => ElementKind::Interface,
            Element::FieldPrototype(_) => ElementKind::FieldPrototype,
            Element::Field(_) => ElementKind::Field,
            Element::Property(_) => ElementKind::Property,
        }
    }

    pub fn base(&self) -> &ElementBase {
        match self {
            Element::Namespace(e) => &e.base,
            Element::Enum(e) => &e.base,
            Element::EnumValue(e) => &e.base,
            Element::Global(e) => &e.base,
            Element::Local(e) => &e.base,
            Element::FunctionPrototype(e) => &e.base,
            Element::Function(e) => &e.base,
            Element::ClassPrototype(e) | Element::InterfacePrototype(e) => &e.base,
            Element::Class(e) | Element::Interface(e) => &e.base,
            Element::FieldPrototype(e) => &e.base,
            Element::Field(e) => &e.base,
            Element::Property(e) => &e.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut ElementBase {
        match self {
            Element::Namespace(e) => &mut e.base,
            Element::Enum(e) => &mut e.base,
            Element::EnumValue(e) => &mut e.base,
            Element::Global(e) => &mut e.base,
            Element::Local(e) => &mut e.base,
            Element::FunctionPrototype(e) => &mut e.base,
            Element::Function(e) => &mut e.base,
            Element::ClassPrototype(e) | Element::InterfacePrototype(e) => &mut e.base,
            Element::Class(e) | Element::Interface(e) => &mut e.base,
            Element::FieldPrototype(e) => &mut e.base,
            Element::Field(e) => &mut e.base,
            Element::Property(e) => &mut e.base,
        }
    }

    pub fn simple_name(&self) -> &str {
        &self.base().simple_name
    }

    pub fn internal_name(&self) -> &str {
        &self.base().internal_name
    }

    pub fn flags(&self) -> ElementFlags {
        self.base().flags
    }

    pub fn as_function_prototype(&self) -> Option<&FunctionPrototype> {
        match self {
            Element::FunctionPrototype(p) => Some(p),
            _ => None,
        }
    }

    /// The class-like payload of a class or interface prototype.
    pub fn as_class_prototype(&self) -> Option<&ClassPrototype> {
        match self {
            Element::ClassPrototype(p) | Element::InterfacePrototype(p) => Some(p),
            _ => None,
        }
    }

    /// The class-like payload of a class or interface instance.
    pub fn as_class(&self) -> Option<&Class> {
        match self {
            Element::Class(c) | Element::Interface(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Element::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_property(&self) -> Option<&Property> {
        match self {
            Element::Property(p) => Some(p),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_function() -> Function {
        Function {
            base: ElementBase::new("f", "test/f"),
            prototype: ElementId(0),
            type_arguments: Vec::new(),
            parameters: Vec::new(),
            return_type: Type::void(),
            instance_method_of: None,
            locals: HashMap::new(),
            additional_locals: Vec::new(),
            contextual_type_arguments: HashMap::new(),
            break_context: None,
            break_stack: Vec::new(),
            next_break_id: 0,
            temp_i32s: Vec::new(),
            temp_i64s: Vec::new(),
            temp_f32s: Vec::new(),
            temp_f64s: Vec::new(),
        }
    }

    #[test]
    fn test_break_contexts_nest() {
        let mut func = empty_function();
        assert_eq!(func.break_context, None);
        func.enter_break_context();
        assert_eq!(func.break_context.as_deref(), Some("0"));
        func.enter_break_context();
        assert_eq!(func.break_context.as_deref(), Some("1"));
        func.leave_break_context();
        assert_eq!(func.break_context.as_deref(), Some("0"));
        func.leave_break_context();
        assert_eq!(func.break_context, None);
        // ids keep increasing across re-entry
        func.enter_break_context();
        assert_eq!(func.break_context.as_deref(), Some("2"));
        func.leave_break_context();
        func.finalize();
    }

    #[test]
    #[should_panic(expected = "unbalanced")]
    fn test_finalize_asserts_balance() {
        let mut func = empty_function();
        func.enter_break_context();
        func.finalize();
    }

    #[test]
    fn test_mutability_is_constant_negation() {
        let mut base = ElementBase::new("x", "test/x");
        assert!(base.is_mutable());
        base.flags |= ElementFlags::CONSTANT;
        assert!(!base.is_mutable());
    }
}
