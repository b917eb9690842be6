//! The program model and the binder pass that populates it.
//!
//! `Program::initialize` registers primitive types and built-ins, then walks
//! every top-level statement of every source in order, materializing
//! entities into the element directory. Cross-module references that cannot
//! be satisfied yet are queued and resolved by two post-passes: imports
//! first, then exports.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use tracing::debug;

use crate::compiler::ast::{
    ClassDeclaration, ClassMember, Decorator, EnumDeclaration, ExportMember, ExportStatement,
    Expression, FieldDeclaration, FunctionDeclaration, ImportDeclaration, ImportStatement,
    ModifierFlags, NamespaceDeclaration, Source, Statement, TypeDeclaration, TypeNode,
    VariableStatement,
};
use crate::compiler::builtins;
use crate::compiler::diagnostics::{Diagnostic, DiagnosticCode};
use crate::compiler::elements::{
    ClassPrototype, ConstantValue, Element, ElementBase, ElementFlags, ElementId, Enum, EnumValue,
    Function, FunctionPrototype, FieldPrototype, Global, Local, Namespace, Property,
    VariableLikeDeclaration,
};
use crate::compiler::names;
use crate::compiler::text::Range;
use crate::compiler::types::{NativeType, Type};

/// The compilation target, deciding pointer width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Target {
    #[default]
    Wasm32,
    Wasm64,
}

impl Target {
    pub const fn pointer_size(self) -> u32 {
        match self {
            Target::Wasm32 => 32,
            Target::Wasm64 => 64,
        }
    }
}

/// An export whose referenced element was not bound when the export
/// statement was seen.
#[derive(Debug, Clone)]
pub struct QueuedExport {
    pub is_re_export: bool,
    /// The name the export refers to: an internal name for local exports,
    /// an external name for re-exports.
    pub referenced_name: String,
    pub member: Rc<ExportMember>,
    /// Internal path of the module a re-export references.
    pub module_path: Option<String>,
}

/// An import whose referenced export was not bound when the import
/// statement was seen.
#[derive(Debug, Clone)]
pub struct QueuedImport {
    pub internal_name: String,
    pub referenced_name: String,
    pub declaration: Rc<ImportDeclaration>,
    pub module_path: String,
}

/// The root of the program model.
pub struct Program {
    /// Parsed sources, in the order they were added.
    pub sources: Vec<Rc<Source>>,
    /// Qualified type name to concrete type.
    pub types: HashMap<String, Type>,
    /// Bare alias name to unresolved type expression.
    pub type_aliases: HashMap<String, Rc<TypeNode>>,
    /// Internal name to entity.
    pub elements: HashMap<String, ElementId>,
    /// External (file-scoped) name to entity.
    pub exports: HashMap<String, ElementId>,
    pub target: Target,
    pub diagnostics: Vec<Diagnostic>,
    /// Cursor for callers consuming diagnostics incrementally.
    pub diagnostics_offset: usize,
    arena: Vec<Element>,
    queued_exports: HashMap<String, QueuedExport>,
    queued_imports: Vec<QueuedImport>,
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Index<ElementId> for Program {
    type Output = Element;

    fn index(&self, id: ElementId) -> &Element {
        &self.arena[id.0 as usize]
    }
}

impl std::ops::IndexMut<ElementId> for Program {
    fn index_mut(&mut self, id: ElementId) -> &mut Element {
        &mut self.arena[id.0 as usize]
    }
}

impl Program {
    pub fn new() -> Self {
        Program {
            sources: Vec::new(),
            types: HashMap::new(),
            type_aliases: HashMap::new(),
            elements: HashMap::new(),
            exports: HashMap::new(),
            target: Target::default(),
            diagnostics: Vec::new(),
            diagnostics_offset: 0,
            arena: Vec::new(),
            queued_exports: HashMap::new(),
            queued_imports: Vec::new(),
        }
    }

    pub fn add_source(&mut self, source: Source) {
        self.sources.push(Rc::new(source));
    }

    /// Places an entity in the arena, returning its handle.
    pub fn alloc(&mut self, element: Element) -> ElementId {
        let id = ElementId(self.arena.len() as u32);
        self.arena.push(element);
        id
    }

    /// Looks up an entity by internal name.
    pub fn element_by_name(&self, internal_name: &str) -> Option<&Element> {
        self.elements.get(internal_name).map(|&id| &self[id])
    }

    /// Reports an error diagnostic.
    pub fn error(&mut self, code: DiagnosticCode, range: &Range, args: &[&str]) {
        self.diagnostics.push(Diagnostic::error(code, range, args));
    }

    /// Diagnostics reported since the last call, advancing the cursor.
    pub fn pending_diagnostics(&mut self) -> &[Diagnostic] {
        let start = self.diagnostics_offset;
        self.diagnostics_offset = self.diagnostics.len();
        &self.diagnostics[start..]
    }

    /// Number of error diagnostics reported so far.
    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    // ------------------------------------------------------------------
    // Initialization

    /// Populates the primitive type table, registers built-ins, binds every
    /// source, then resolves queued imports and queued exports.
    pub fn initialize(&mut self, target: Target) {
        self.target = target;
        self.register_primitive_types(target);
        builtins::register(self);
        let sources = self.sources.clone();
        for source in &sources {
            debug!(path = %source.internal_path, "binding source");
            for statement in &source.statements {
                self.init_statement(source, statement, None);
            }
        }
        self.resolve_queued_imports();
        self.resolve_queued_exports();
    }

    fn register_primitive_types(&mut self, target: Target) {
        let types = &mut self.types;
        types.insert("i8".to_string(), Type::i8());
        types.insert("i16".to_string(), Type::i16());
        types.insert("i32".to_string(), Type::i32());
        types.insert("i64".to_string(), Type::i64());
        types.insert("u8".to_string(), Type::u8());
        types.insert("u16".to_string(), Type::u16());
        types.insert("u32".to_string(), Type::u32());
        types.insert("u64".to_string(), Type::u64());
        types.insert("bool".to_string(), Type::bool());
        types.insert("f32".to_string(), Type::f32());
        types.insert("f64".to_string(), Type::f64());
        types.insert("void".to_string(), Type::void());
        types.insert("isize".to_string(), Type::isize_with(target.pointer_size()));
        types.insert("usize".to_string(), Type::usize_with(target.pointer_size()));
        types.insert("number".to_string(), Type::f64());
        types.insert("boolean".to_string(), Type::bool());
    }

    fn init_statement(&mut self, source: &Source, statement: &Statement, namespace: Option<ElementId>) {
        match statement {
            Statement::Class(decl) => self.init_class_like(source, decl.clone(), namespace, false),
            Statement::Interface(decl) => self.init_class_like(source, decl.clone(), namespace, true),
            Statement::Enum(decl) => self.init_enum(source, decl.clone(), namespace),
            Statement::Export(stmt) => self.init_export(source, stmt),
            Statement::Function(decl) => self.init_function(source, decl.clone(), namespace),
            Statement::Import(stmt) => self.init_import(source, stmt),
            Statement::Namespace(decl) => self.init_namespace(source, decl.clone(), namespace),
            Statement::TypeAlias(decl) => self.init_type_alias(decl),
            Statement::Variable(stmt) => self.init_variable(source, stmt, namespace),
        }
    }

    fn member_internal_name(&self, source: &Source, namespace: Option<ElementId>, name: &str) -> String {
        match namespace {
            Some(ns) => names::static_member(self[ns].internal_name(), name),
            None => names::program_level(&source.internal_path, name),
        }
    }

    /// Steps shared by every declaration handler once the entity exists:
    /// insert into `elements`, apply the `@global` bare-name alias, then
    /// place the entity in its namespace's members or the file's exports.
    fn register_element(
        &mut self,
        id: ElementId,
        namespace: Option<ElementId>,
        is_global: bool,
        name_range: &Range,
    ) {
        let (simple_name, internal_name, exported) = {
            let base = self[id].base();
            (
                base.simple_name.clone(),
                base.internal_name.clone(),
                base.flags.contains(ElementFlags::EXPORTED),
            )
        };
        self.elements.insert(internal_name.clone(), id);
        if is_global {
            // a bare-name collision is an error, but the qualified
            // registration above stands
            if self.elements.contains_key(&simple_name) {
                self.error(DiagnosticCode::DuplicateIdentifier, name_range, &[&simple_name]);
            } else {
                self.elements.insert(simple_name.clone(), id);
                self[id].base_mut().flags |= ElementFlags::GLOBAL;
            }
        }
        if let Some(ns) = namespace {
            self[id].base_mut().namespace = Some(ns);
            if self[ns].base().member(&simple_name).is_some() {
                self.error(DiagnosticCode::DuplicateIdentifier, name_range, &[&simple_name]);
            } else {
                self[ns].base_mut().members_mut().insert(simple_name, id);
            }
        } else if exported {
            if self.exports.contains_key(&internal_name) {
                self.error(
                    DiagnosticCode::ExportDeclarationConflicts,
                    name_range,
                    &[&simple_name],
                );
            } else {
                self.exports.insert(internal_name, id);
            }
        }
    }

    fn init_function(
        &mut self,
        source: &Source,
        declaration: Rc<FunctionDeclaration>,
        namespace: Option<ElementId>,
    ) {
        let name = declaration.name.text.clone();
        let internal_name = self.member_internal_name(source, namespace, &name);
        if self.elements.contains_key(&internal_name) {
            self.error(DiagnosticCode::DuplicateIdentifier, &declaration.name.range, &[&name]);
            return;
        }
        let mut flags = flags_from_modifiers(declaration.modifiers);
        if !declaration.type_parameters.is_empty() {
            flags |= ElementFlags::GENERIC;
        }
        let base = ElementBase::new(name, internal_name).with_flags(flags);
        let is_global = has_global_decorator(&declaration.decorators);
        let name_range = declaration.name.range.clone();
        let id = self.alloc(Element::FunctionPrototype(FunctionPrototype {
            base,
            declaration: Some(declaration),
            class_prototype: None,
            instances: HashMap::new(),
        }));
        self.register_element(id, namespace, is_global, &name_range);
    }

    fn init_variable(
        &mut self,
        source: &Source,
        statement: &Rc<VariableStatement>,
        namespace: Option<ElementId>,
    ) {
        let statement_flags = flags_from_modifiers(statement.modifiers);
        let is_global = has_global_decorator(&statement.decorators);
        for declaration in &statement.declarations {
            let name = declaration.name.text.clone();
            let internal_name = self.member_internal_name(source, namespace, &name);
            if self.elements.contains_key(&internal_name) {
                self.error(DiagnosticCode::DuplicateIdentifier, &declaration.name.range, &[&name]);
                continue;
            }
            let mut flags = statement_flags;
            let constant_value = if flags.contains(ElementFlags::CONSTANT) {
                constant_value_of(declaration.initializer.as_ref())
            } else {
                None
            };
            if constant_value.is_some() {
                flags |= ElementFlags::CONSTANT_VALUE;
            }
            let base = ElementBase::new(name, internal_name).with_flags(flags);
            let name_range = declaration.name.range.clone();
            let id = self.alloc(Element::Global(Global {
                base,
                declaration: Some(VariableLikeDeclaration::Variable(declaration.clone())),
                typ: None,
                constant_value,
            }));
            self.register_element(id, namespace, is_global, &name_range);
        }
    }

    fn init_enum(
        &mut self,
        source: &Source,
        declaration: Rc<EnumDeclaration>,
        namespace: Option<ElementId>,
    ) {
        let name = declaration.name.text.clone();
        let internal_name = self.member_internal_name(source, namespace, &name);
        if self.elements.contains_key(&internal_name) {
            self.error(DiagnosticCode::DuplicateIdentifier, &declaration.name.range, &[&name]);
            return;
        }
        let flags = flags_from_modifiers(declaration.modifiers);
        let base = ElementBase::new(name, internal_name.clone()).with_flags(flags);
        let is_global = has_global_decorator(&declaration.decorators);
        let name_range = declaration.name.range.clone();
        let values = declaration.values.clone();
        let id = self.alloc(Element::Enum(Enum { base, declaration }));
        self.register_element(id, namespace, is_global, &name_range);

        let mut previous: Option<i32> = None;
        for value in values {
            let value_name = value.name.text.clone();
            if self[id].base().member(&value_name).is_some() {
                self.error(DiagnosticCode::DuplicateIdentifier, &value.name.range, &[&value_name]);
                continue;
            }
            let (constant_value, is_constant) = match &value.initializer {
                Some(Expression::IntegerLiteral(v, _)) => (*v as i32, true),
                Some(_) => (previous.map_or(0, |p| p.wrapping_add(1)), false),
                None => (previous.map_or(0, |p| p.wrapping_add(1)), true),
            };
            previous = Some(constant_value);
            let mut base = ElementBase::new(
                value_name.clone(),
                names::static_member(&internal_name, &value_name),
            );
            if is_constant {
                base.flags |= ElementFlags::CONSTANT_VALUE;
            }
            base.namespace = Some(id);
            let value_id = self.alloc(Element::EnumValue(EnumValue {
                base,
                declaration: value.clone(),
                parent_enum: id,
                constant_value,
            }));
            self[id].base_mut().members_mut().insert(value_name, value_id);
        }
    }

    fn init_namespace(
        &mut self,
        source: &Source,
        declaration: Rc<NamespaceDeclaration>,
        namespace: Option<ElementId>,
    ) {
        let name = declaration.name.text.clone();
        let internal_name = self.member_internal_name(source, namespace, &name);
        if self.elements.contains_key(&internal_name) {
            self.error(DiagnosticCode::DuplicateIdentifier, &declaration.name.range, &[&name]);
            return;
        }
        let flags = flags_from_modifiers(declaration.modifiers);
        let base = ElementBase::new(name, internal_name).with_flags(flags);
        let is_global = has_global_decorator(&declaration.decorators);
        let name_range = declaration.name.range.clone();
        let members = declaration.members.clone();
        let id = self.alloc(Element::Namespace(Namespace { base, declaration }));
        self.register_element(id, namespace, is_global, &name_range);
        for statement in &members {
            self.init_statement(source, statement, Some(id));
        }
    }

    fn init_type_alias(&mut self, declaration: &Rc<TypeDeclaration>) {
        let name = &declaration.name.text;
        if self.types.contains_key(name) || self.type_aliases.contains_key(name) {
            self.error(DiagnosticCode::DuplicateIdentifier, &declaration.name.range, &[name]);
            return;
        }
        self.type_aliases.insert(name.clone(), declaration.type_node.clone());
    }

    // ------------------------------------------------------------------
    // Classes and interfaces

    fn init_class_like(
        &mut self,
        source: &Source,
        declaration: Rc<ClassDeclaration>,
        namespace: Option<ElementId>,
        is_interface: bool,
    ) {
        let name = declaration.name.text.clone();
        let internal_name = self.member_internal_name(source, namespace, &name);
        if self.elements.contains_key(&internal_name) {
            self.error(DiagnosticCode::DuplicateIdentifier, &declaration.name.range, &[&name]);
            return;
        }
        let mut flags = flags_from_modifiers(declaration.modifiers);
        if !declaration.type_parameters.is_empty() {
            flags |= ElementFlags::GENERIC;
        }
        let base = ElementBase::new(name, internal_name.clone()).with_flags(flags);
        let is_global = has_global_decorator(&declaration.decorators);
        let name_range = declaration.name.range.clone();
        let members = declaration.members.clone();
        let prototype = ClassPrototype {
            base,
            declaration: Some(declaration),
            instances: HashMap::new(),
            instance_members: HashMap::new(),
        };
        let id = self.alloc(if is_interface {
            Element::InterfacePrototype(prototype)
        } else {
            Element::ClassPrototype(prototype)
        });
        self.register_element(id, namespace, is_global, &name_range);

        for member in &members {
            match member {
                ClassMember::Field(field) => {
                    if field.modifiers.contains(ModifierFlags::STATIC) {
                        self.init_static_field(id, &internal_name, field.clone());
                    } else {
                        self.init_instance_field(id, &internal_name, field.clone());
                    }
                }
                ClassMember::Method(method) => {
                    if method.modifiers.intersects(ModifierFlags::GET | ModifierFlags::SET) {
                        self.init_accessor(id, &internal_name, method.clone());
                    } else {
                        self.init_method(id, &internal_name, method.clone());
                    }
                }
            }
        }
    }

    fn init_static_field(
        &mut self,
        class: ElementId,
        class_internal: &str,
        declaration: Rc<FieldDeclaration>,
    ) {
        let name = declaration.name.text.clone();
        let internal_name = names::static_member(class_internal, &name);
        if self.elements.contains_key(&internal_name) || self[class].base().member(&name).is_some() {
            self.error(DiagnosticCode::DuplicateIdentifier, &declaration.name.range, &[&name]);
            return;
        }
        let mut flags = flags_from_modifiers(declaration.modifiers);
        if flags.contains(ElementFlags::READONLY) {
            flags |= ElementFlags::CONSTANT;
        }
        let constant_value = if flags.contains(ElementFlags::CONSTANT) {
            constant_value_of(declaration.initializer.as_ref())
        } else {
            None
        };
        if constant_value.is_some() {
            flags |= ElementFlags::CONSTANT_VALUE;
        }
        let mut base = ElementBase::new(name.clone(), internal_name.clone()).with_flags(flags);
        base.namespace = Some(class);
        let id = self.alloc(Element::Global(Global {
            base,
            declaration: Some(VariableLikeDeclaration::Field(declaration)),
            typ: None,
            constant_value,
        }));
        self.elements.insert(internal_name, id);
        self[class].base_mut().members_mut().insert(name, id);
    }

    fn init_instance_field(
        &mut self,
        class: ElementId,
        class_internal: &str,
        declaration: Rc<FieldDeclaration>,
    ) {
        let name = declaration.name.text.clone();
        if self.class_prototype(class).instance_members.contains_key(&name) {
            self.error(DiagnosticCode::DuplicateIdentifier, &declaration.name.range, &[&name]);
            return;
        }
        let internal_name = names::instance_member(class_internal, &name);
        let flags = flags_from_modifiers(declaration.modifiers) | ElementFlags::INSTANCE;
        let mut base = ElementBase::new(name.clone(), internal_name).with_flags(flags);
        base.namespace = Some(class);
        let id = self.alloc(Element::FieldPrototype(FieldPrototype {
            base,
            declaration,
            class_prototype: class,
        }));
        self.class_prototype_mut(class).instance_members.insert(name, id);
    }

    fn init_method(
        &mut self,
        class: ElementId,
        class_internal: &str,
        declaration: Rc<FunctionDeclaration>,
    ) {
        let name = declaration.name.text.clone();
        let mut flags = flags_from_modifiers(declaration.modifiers);
        if !declaration.type_parameters.is_empty() {
            flags |= ElementFlags::GENERIC;
        }
        if declaration.modifiers.contains(ModifierFlags::STATIC) {
            let internal_name = names::static_member(class_internal, &name);
            if self.elements.contains_key(&internal_name)
                || self[class].base().member(&name).is_some()
            {
                self.error(DiagnosticCode::DuplicateIdentifier, &declaration.name.range, &[&name]);
                return;
            }
            let mut base = ElementBase::new(name.clone(), internal_name.clone()).with_flags(flags);
            base.namespace = Some(class);
            // static methods carry no class link
            let id = self.alloc(Element::FunctionPrototype(FunctionPrototype {
                base,
                declaration: Some(declaration),
                class_prototype: None,
                instances: HashMap::new(),
            }));
            self.elements.insert(internal_name, id);
            self[class].base_mut().members_mut().insert(name, id);
        } else {
            if self.class_prototype(class).instance_members.contains_key(&name) {
                self.error(DiagnosticCode::DuplicateIdentifier, &declaration.name.range, &[&name]);
                return;
            }
            let internal_name = names::instance_member(class_internal, &name);
            flags |= ElementFlags::INSTANCE;
            let mut base = ElementBase::new(name.clone(), internal_name).with_flags(flags);
            base.namespace = Some(class);
            let id = self.alloc(Element::FunctionPrototype(FunctionPrototype {
                base,
                declaration: Some(declaration),
                class_prototype: Some(class),
                instances: HashMap::new(),
            }));
            self.class_prototype_mut(class).instance_members.insert(name, id);
        }
    }

    /// Resolves a getter or setter to its shared property, creating the
    /// property on first sight.
    fn init_accessor(
        &mut self,
        class: ElementId,
        class_internal: &str,
        declaration: Rc<FunctionDeclaration>,
    ) {
        let is_getter = declaration.modifiers.contains(ModifierFlags::GET);
        let is_static = declaration.modifiers.contains(ModifierFlags::STATIC);
        let simple = declaration.name.text.clone();
        let prefixed = if is_getter {
            names::getter(&simple)
        } else {
            names::setter(&simple)
        };
        let (accessor_internal, property_internal) = if is_static {
            (
                names::static_member(class_internal, &prefixed),
                names::static_member(class_internal, &simple),
            )
        } else {
            (
                names::instance_member(class_internal, &prefixed),
                names::instance_member(class_internal, &simple),
            )
        };

        let existing = if is_static {
            self[class].base().member(&simple)
        } else {
            self.class_prototype(class).instance_members.get(&simple).copied()
        };
        let property_id = match existing {
            Some(id) => match &self[id] {
                Element::Property(property) => {
                    let taken = if is_getter {
                        property.getter_prototype.is_some()
                    } else {
                        property.setter_prototype.is_some()
                    };
                    if taken {
                        self.error(
                            DiagnosticCode::DuplicateIdentifier,
                            &declaration.name.range,
                            &[&simple],
                        );
                        return;
                    }
                    id
                }
                _ => {
                    // the name is taken by a non-accessor member
                    self.error(
                        DiagnosticCode::DuplicateIdentifier,
                        &declaration.name.range,
                        &[&simple],
                    );
                    return;
                }
            },
            None => {
                if is_static && self.elements.contains_key(&property_internal) {
                    self.error(
                        DiagnosticCode::DuplicateIdentifier,
                        &declaration.name.range,
                        &[&simple],
                    );
                    return;
                }
                let mut base = ElementBase::new(simple.clone(), property_internal.clone());
                base.namespace = Some(class);
                let id = self.alloc(Element::Property(Property {
                    base,
                    class_prototype: class,
                    getter_prototype: None,
                    setter_prototype: None,
                }));
                if is_static {
                    self[class].base_mut().members_mut().insert(simple.clone(), id);
                    self.elements.insert(property_internal, id);
                } else {
                    self.class_prototype_mut(class)
                        .instance_members
                        .insert(simple.clone(), id);
                }
                id
            }
        };

        let mut flags = flags_from_modifiers(declaration.modifiers);
        if !is_static {
            flags |= ElementFlags::INSTANCE;
        }
        let mut base = ElementBase::new(prefixed, accessor_internal).with_flags(flags);
        base.namespace = Some(class);
        let class_link = if is_static { None } else { Some(class) };
        let accessor_id = self.alloc(Element::FunctionPrototype(FunctionPrototype {
            base,
            declaration: Some(declaration),
            class_prototype: class_link,
            instances: HashMap::new(),
        }));
        match &mut self[property_id] {
            Element::Property(property) => {
                if is_getter {
                    property.getter_prototype = Some(accessor_id);
                } else {
                    property.setter_prototype = Some(accessor_id);
                }
            }
            _ => unreachable!("accessor resolved to a non-property element"),
        }
    }

    // ------------------------------------------------------------------
    // Imports and exports

    fn init_export(&mut self, source: &Source, statement: &Rc<ExportStatement>) {
        for member in &statement.members {
            let external_name = names::program_level(&source.internal_path, &member.external_name.text);
            match &statement.internal_path {
                None => {
                    let referenced_name =
                        names::program_level(&source.internal_path, &member.name.text);
                    if let Some(&element) = self.elements.get(&referenced_name) {
                        self.set_export(&external_name, element, member);
                    } else {
                        self.enqueue_export(
                            external_name,
                            QueuedExport {
                                is_re_export: false,
                                referenced_name,
                                member: member.clone(),
                                module_path: None,
                            },
                        );
                    }
                }
                Some(module_path) => {
                    let referenced_name = names::program_level(module_path, &member.name.text);
                    if let Some(&element) = self.exports.get(&referenced_name) {
                        self.set_export(&external_name, element, member);
                        continue;
                    }
                    if let Some(element) = self.chase_queued_exports(&referenced_name) {
                        self.set_export(&external_name, element, member);
                        continue;
                    }
                    self.enqueue_export(
                        external_name,
                        QueuedExport {
                            is_re_export: true,
                            referenced_name,
                            member: member.clone(),
                            module_path: Some(module_path.clone()),
                        },
                    );
                }
            }
        }
    }

    fn init_import(&mut self, source: &Source, statement: &Rc<ImportStatement>) {
        let Some(declarations) = &statement.declarations else {
            // `import * as ns` has no defined semantics yet
            self.error(DiagnosticCode::OperationNotSupported, &statement.range, &[]);
            return;
        };
        for declaration in declarations {
            let internal_name = names::program_level(&source.internal_path, &declaration.name.text);
            let referenced_name =
                names::program_level(&statement.internal_path, &declaration.external_name.text);
            if let Some(&element) = self.exports.get(&referenced_name) {
                self.bind_import(internal_name, element, declaration);
                continue;
            }
            if let Some(element) = self.chase_queued_exports(&referenced_name) {
                self.bind_import(internal_name, element, declaration);
                continue;
            }
            self.queued_imports.push(QueuedImport {
                internal_name,
                referenced_name,
                declaration: declaration.clone(),
                module_path: statement.internal_path.clone(),
            });
        }
    }

    /// Follows the queued-export chain from a referenced name, as far as the
    /// entries seen so far allow. Re-queries against the current name after
    /// each advance; cycle-guarded.
    fn chase_queued_exports(&self, referenced_name: &str) -> Option<ElementId> {
        let mut current = referenced_name.to_string();
        let mut seen: HashSet<String> = HashSet::new();
        while seen.insert(current.clone()) {
            let step = self
                .queued_exports
                .get(&current)
                .map(|q| (q.is_re_export, q.referenced_name.clone()));
            match step {
                Some((true, next)) => {
                    current = next;
                    if let Some(&element) = self.exports.get(&current) {
                        return Some(element);
                    }
                }
                Some((false, target)) => return self.elements.get(&target).copied(),
                None => return None,
            }
        }
        None
    }

    fn set_export(&mut self, external_name: &str, element: ElementId, member: &ExportMember) {
        if self.exports.contains_key(external_name) {
            self.error(
                DiagnosticCode::ExportDeclarationConflicts,
                &member.external_name.range,
                &[&member.external_name.text],
            );
            return;
        }
        self.exports.insert(external_name.to_string(), element);
    }

    fn enqueue_export(&mut self, external_name: String, queued: QueuedExport) {
        if self.exports.contains_key(&external_name)
            || self.queued_exports.contains_key(&external_name)
        {
            let member = queued.member;
            self.error(
                DiagnosticCode::ExportDeclarationConflicts,
                &member.external_name.range,
                &[&member.external_name.text],
            );
            return;
        }
        self.queued_exports.insert(external_name, queued);
    }

    fn bind_import(
        &mut self,
        internal_name: String,
        element: ElementId,
        declaration: &Rc<ImportDeclaration>,
    ) {
        if self.elements.contains_key(&internal_name) {
            self.error(
                DiagnosticCode::DuplicateIdentifier,
                &declaration.name.range,
                &[&declaration.name.text],
            );
            return;
        }
        self.elements.insert(internal_name, element);
    }

    /// Resolves the imports left queued after all sources were bound.
    fn resolve_queued_imports(&mut self) {
        let queued = std::mem::take(&mut self.queued_imports);
        debug!(count = queued.len(), "resolving queued imports");
        for import in queued {
            match self.try_resolve_import(&import.referenced_name) {
                Some(element) => {
                    self.bind_import(import.internal_name, element, &import.declaration);
                }
                None => {
                    let range = import.declaration.external_name.range.clone();
                    self.error(
                        DiagnosticCode::ModuleHasNoExportedMember,
                        &range,
                        &[&import.module_path, &import.declaration.external_name.text],
                    );
                }
            }
        }
    }

    /// Walks `exports` and queued re-exports until an element is found or
    /// the chain is exhausted.
    fn try_resolve_import(&self, referenced_name: &str) -> Option<ElementId> {
        let mut current = referenced_name.to_string();
        let mut seen: HashSet<String> = HashSet::new();
        loop {
            if let Some(&element) = self.exports.get(&current) {
                return Some(element);
            }
            if !seen.insert(current.clone()) {
                return None; // re-export cycle
            }
            match self.queued_exports.get(&current) {
                Some(queued) if queued.is_re_export => current = queued.referenced_name.clone(),
                Some(queued) => return self.elements.get(&queued.referenced_name).copied(),
                None => return None,
            }
        }
    }

    /// Resolves the exports left queued after all sources were bound. Runs
    /// after the import pass.
    fn resolve_queued_exports(&mut self) {
        let queued = std::mem::take(&mut self.queued_exports);
        debug!(count = queued.len(), "resolving queued exports");
        let mut external_names: Vec<&String> = queued.keys().collect();
        external_names.sort();
        // external names already reported through a failed chain walk
        let mut handled: HashSet<String> = HashSet::new();

        enum Outcome {
            Found(ElementId),
            MissingLocal(Rc<ExportMember>),
            Unsatisfied,
        }

        for external_name in external_names {
            if handled.contains(external_name.as_str()) {
                continue;
            }
            let entry = &queued[external_name];
            if !entry.is_re_export {
                match self.elements.get(&entry.referenced_name).copied() {
                    Some(element) => {
                        let member = entry.member.clone();
                        self.set_export(external_name, element, &member);
                    }
                    None => {
                        let member = entry.member.clone();
                        self.error(
                            DiagnosticCode::CannotFindName,
                            &member.name.range,
                            &[&member.name.text],
                        );
                    }
                }
                continue;
            }

            let mut current = entry.referenced_name.clone();
            let mut seen: HashSet<String> = HashSet::new();
            seen.insert(external_name.clone());
            let outcome = loop {
                if let Some(&element) = self.exports.get(&current) {
                    break Outcome::Found(element);
                }
                if !seen.insert(current.clone()) {
                    break Outcome::Unsatisfied; // cycle
                }
                match queued.get(&current) {
                    Some(next) if next.is_re_export => current = next.referenced_name.clone(),
                    Some(next) => match self.elements.get(&next.referenced_name).copied() {
                        Some(element) => break Outcome::Found(element),
                        None => break Outcome::MissingLocal(next.member.clone()),
                    },
                    None => break Outcome::Unsatisfied,
                }
            };
            match outcome {
                Outcome::Found(element) => {
                    let member = entry.member.clone();
                    self.set_export(external_name, element, &member);
                }
                Outcome::MissingLocal(member) => {
                    self.error(
                        DiagnosticCode::CannotFindName,
                        &member.name.range,
                        &[&member.name.text],
                    );
                    handled.extend(seen.into_iter().filter(|name| queued.contains_key(name)));
                }
                Outcome::Unsatisfied => {
                    let member = entry.member.clone();
                    let module = entry.module_path.clone().unwrap_or_default();
                    self.error(
                        DiagnosticCode::ModuleHasNoExportedMember,
                        &member.name.range,
                        &[&module, &member.name.text],
                    );
                    handled.extend(seen.into_iter().filter(|name| queued.contains_key(name)));
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Typed element accessors

    /// The function behind a handle. Panics when the handle is not a
    /// function; that is a compiler bug, not user error.
    pub fn function(&self, id: ElementId) -> &Function {
        match &self[id] {
            Element::Function(function) => function,
            other => panic!("expected a function, found {}", other.kind().token()),
        }
    }

    pub fn function_mut(&mut self, id: ElementId) -> &mut Function {
        match &mut self[id] {
            Element::Function(function) => function,
            other => panic!("expected a function, found {}", other.kind().token()),
        }
    }

    pub(crate) fn class_prototype(&self, id: ElementId) -> &ClassPrototype {
        match &self[id] {
            Element::ClassPrototype(prototype) | Element::InterfacePrototype(prototype) => prototype,
            other => panic!("expected a class prototype, found {}", other.kind().token()),
        }
    }

    pub(crate) fn class_prototype_mut(&mut self, id: ElementId) -> &mut ClassPrototype {
        match &mut self[id] {
            Element::ClassPrototype(prototype) | Element::InterfacePrototype(prototype) => prototype,
            other => panic!("expected a class prototype, found {}", other.kind().token()),
        }
    }

    // ------------------------------------------------------------------
    // Function machinery

    /// Registers an additional local in a function. Anonymous locals are
    /// named `anonymous$<index>`; registering a named local twice is a
    /// compiler bug.
    pub fn function_add_local(
        &mut self,
        function: ElementId,
        typ: Type,
        name: Option<&str>,
    ) -> ElementId {
        let index = {
            let func = self.function(function);
            usize::from(func.instance_method_of.is_some())
                + func.parameters.len()
                + func.additional_locals.len()
        };
        let local_name = match name {
            Some(name) => {
                assert!(
                    !self.function(function).locals.contains_key(name),
                    "duplicate local name '{name}'"
                );
                name.to_string()
            }
            None => format!("anonymous${index}"),
        };
        let base = ElementBase::new(local_name.clone(), local_name.clone());
        let local = self.alloc(Element::Local(Local { base, index, typ: typ.clone() }));
        let func = self.function_mut(function);
        func.additional_locals.push(typ);
        if name.is_some() {
            func.locals.insert(local_name, local);
        }
        local
    }

    /// Pops a free temporary local of the type's native kind, or allocates
    /// one.
    pub fn get_temp_local(&mut self, function: ElementId, typ: &Type) -> ElementId {
        let native = typ.native_type();
        let reused = {
            let func = self.function_mut(function);
            match native {
                NativeType::I32 => func.temp_i32s.pop(),
                NativeType::I64 => func.temp_i64s.pop(),
                NativeType::F32 => func.temp_f32s.pop(),
                NativeType::F64 => func.temp_f64s.pop(),
            }
        };
        match reused {
            Some(local) => local,
            None => self.function_add_local(function, typ.clone(), None),
        }
    }

    /// Returns a temporary local to its free list.
    pub fn free_temp_local(&mut self, function: ElementId, local: ElementId) {
        let native = match &self[local] {
            Element::Local(l) => l.typ.native_type(),
            other => panic!("expected a local, found {}", other.kind().token()),
        };
        let func = self.function_mut(function);
        match native {
            NativeType::I32 => func.temp_i32s.push(local),
            NativeType::I64 => func.temp_i64s.push(local),
            NativeType::F32 => func.temp_f32s.push(local),
            NativeType::F64 => func.temp_f64s.push(local),
        }
    }

    /// A temporary local whose value's lifetime ends immediately: peeks the
    /// free list, or allocates a local that is immediately free again.
    pub fn get_and_free_temp_local(&mut self, function: ElementId, typ: &Type) -> ElementId {
        let native = typ.native_type();
        let reused = {
            let func = self.function(function);
            match native {
                NativeType::I32 => func.temp_i32s.last().copied(),
                NativeType::I64 => func.temp_i64s.last().copied(),
                NativeType::F32 => func.temp_f32s.last().copied(),
                NativeType::F64 => func.temp_f64s.last().copied(),
            }
        };
        if let Some(local) = reused {
            return local;
        }
        let local = self.function_add_local(function, typ.clone(), None);
        let func = self.function_mut(function);
        match native {
            NativeType::I32 => func.temp_i32s.push(local),
            NativeType::I64 => func.temp_i64s.push(local),
            NativeType::F32 => func.temp_f32s.push(local),
            NativeType::F64 => func.temp_f64s.push(local),
        }
        local
    }
}

/// Maps declaration modifiers to the entity flags they imply.
fn flags_from_modifiers(modifiers: ModifierFlags) -> ElementFlags {
    let mut flags = ElementFlags::NONE;
    if modifiers.contains(ModifierFlags::IMPORT) {
        flags |= ElementFlags::IMPORTED;
    }
    if modifiers.contains(ModifierFlags::EXPORT) {
        flags |= ElementFlags::EXPORTED;
    }
    if modifiers.contains(ModifierFlags::DECLARE) {
        flags |= ElementFlags::DECLARED;
    }
    if modifiers.contains(ModifierFlags::CONST) {
        flags |= ElementFlags::CONSTANT;
    }
    if modifiers.contains(ModifierFlags::READONLY) {
        flags |= ElementFlags::READONLY;
    }
    if modifiers.contains(ModifierFlags::GET) {
        flags |= ElementFlags::GETTER;
    }
    if modifiers.contains(ModifierFlags::SET) {
        flags |= ElementFlags::SETTER;
    }
    if modifiers.contains(ModifierFlags::PUBLIC) {
        flags |= ElementFlags::PUBLIC;
    }
    if modifiers.contains(ModifierFlags::PROTECTED) {
        flags |= ElementFlags::PROTECTED;
    }
    if modifiers.contains(ModifierFlags::PRIVATE) {
        flags |= ElementFlags::PRIVATE;
    }
    flags
}

/// Recognizes the `@global` decorator: identifier-only, at most one
/// argument.
fn has_global_decorator(decorators: &[Decorator]) -> bool {
    decorators
        .iter()
        .any(|d| d.name.text == "global" && d.arguments.len() <= 1)
}

fn constant_value_of(initializer: Option<&Expression>) -> Option<ConstantValue> {
    match initializer {
        Some(Expression::IntegerLiteral(value, _)) => Some(ConstantValue::Integer(*value)),
        Some(Expression::FloatLiteral(value, _)) => Some(ConstantValue::Float(*value)),
        _ => None,
    }
}
