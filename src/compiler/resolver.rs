//! Type, identifier and property-access resolution, and on-demand
//! monomorphization of generic prototypes.
//!
//! Resolution failures are reported as diagnostics and propagated as `None`;
//! callers continue best-effort. A malformed input that the parser can never
//! produce (a literal as a property-access receiver, say) is a contract
//! violation and panics.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::compiler::ast::{Expression, Identifier, PropertyAccessExpression, TypeNode, TypeParameterNode};
use crate::compiler::diagnostics::DiagnosticCode;
use crate::compiler::elements::{
    Class, Element, ElementBase, ElementFlags, ElementId, Function, Local, Parameter,
};
use crate::compiler::names;
use crate::compiler::program::Program;
use crate::compiler::text::Range;
use crate::compiler::types::{types_to_string, Type};

impl Program {
    /// Resolves a type expression to a concrete type.
    ///
    /// Lookup order: the file-local qualified name, then the program-global
    /// name, then a declared type alias (resolved without contextual
    /// arguments). A bare name matching a contextual type parameter resolves
    /// to its bound type.
    pub fn resolve_type(
        &mut self,
        node: &TypeNode,
        contextual_type_arguments: Option<&HashMap<String, Type>>,
        report_not_found: bool,
    ) -> Option<Type> {
        let mut resolved_arguments = Vec::with_capacity(node.type_arguments.len());
        for argument in &node.type_arguments {
            resolved_arguments.push(self.resolve_type(
                argument,
                contextual_type_arguments,
                report_not_found,
            )?);
        }
        let global_name = if resolved_arguments.is_empty() {
            if let Some(contextual) = contextual_type_arguments {
                if let Some(bound) = contextual.get(&node.name.text) {
                    return Some(bound.clone());
                }
            }
            node.name.text.clone()
        } else {
            format!(
                "{}{}",
                node.name.text,
                types_to_string(&resolved_arguments, "<", ">")
            )
        };
        let file_local = names::program_level(&node.range.file, &global_name);
        if let Some(typ) = self.types.get(&file_local) {
            return Some(typ.clone());
        }
        if let Some(typ) = self.types.get(&global_name) {
            return Some(typ.clone());
        }
        if let Some(alias) = self.type_aliases.get(&global_name) {
            let alias = alias.clone();
            return self.resolve_type(&alias, None, report_not_found);
        }
        if report_not_found {
            self.error(
                DiagnosticCode::CannotFindName,
                &node.name.range,
                &[&node.name.text],
            );
        }
        None
    }

    /// Resolves a type-argument list against its declared parameters. An
    /// arity mismatch is reported at the joined range of the supplied
    /// arguments, or at the end of the alternative range when none were
    /// supplied.
    pub fn resolve_type_arguments(
        &mut self,
        type_parameters: &[TypeParameterNode],
        type_argument_nodes: &[TypeNode],
        contextual_type_arguments: Option<&HashMap<String, Type>>,
        alternative_report_range: Option<&Range>,
    ) -> Option<Vec<Type>> {
        let expected = type_parameters.len();
        let actual = type_argument_nodes.len();
        if expected != actual {
            let range = if actual > 0 {
                type_argument_nodes[0]
                    .range
                    .join(&type_argument_nodes[actual - 1].range)
            } else {
                alternative_report_range
                    .expect("a report range is required when no type arguments are supplied")
                    .at_end()
            };
            self.error(
                DiagnosticCode::ExpectedTypeArguments,
                &range,
                &[&expected.to_string(), &actual.to_string()],
            );
            return None;
        }
        let mut resolved = Vec::with_capacity(actual);
        for node in type_argument_nodes {
            resolved.push(self.resolve_type(node, contextual_type_arguments, true)?);
        }
        Some(resolved)
    }

    /// Resolves an identifier within a calling function's scope chain:
    /// function locals, then each enclosing namespace of the function's
    /// prototype, then the current file, then program-wide.
    pub fn resolve_identifier(
        &mut self,
        identifier: &Identifier,
        contextual_function: ElementId,
    ) -> Option<ElementId> {
        let name = identifier.text.as_str();
        let (local, prototype) = {
            let func = self.function(contextual_function);
            (func.locals.get(name).copied(), func.prototype)
        };
        if let Some(local) = local {
            return Some(local);
        }
        let mut namespace = self[prototype].base().namespace;
        while let Some(ns) = namespace {
            let qualified = names::static_member(self[ns].internal_name(), name);
            if let Some(&element) = self.elements.get(&qualified) {
                return Some(element);
            }
            namespace = self[ns].base().namespace;
        }
        let declaration = match &self[prototype] {
            Element::FunctionPrototype(p) => p.declaration.clone(),
            other => panic!("expected a function prototype, found {}", other.kind().token()),
        };
        if let Some(declaration) = declaration {
            let file_local = names::program_level(&declaration.range.file, name);
            if let Some(&element) = self.elements.get(&file_local) {
                return Some(element);
            }
        }
        if let Some(&element) = self.elements.get(name) {
            return Some(element);
        }
        self.error(DiagnosticCode::CannotFindName, &identifier.range, &[name]);
        None
    }

    /// Resolves a property access by resolving its receiver and looking the
    /// property up in the receiver's member map.
    pub fn resolve_property_access(
        &mut self,
        property_access: &PropertyAccessExpression,
        contextual_function: ElementId,
    ) -> Option<ElementId> {
        let target = match &property_access.expression {
            Expression::Identifier(identifier) => {
                self.resolve_identifier(identifier, contextual_function)?
            }
            Expression::PropertyAccess(inner) => {
                self.resolve_property_access(inner, contextual_function)?
            }
            other => panic!("unexpected receiver expression in property access: {other:?}"),
        };
        let property_name = property_access.property.text.as_str();
        match self[target].base().member(property_name) {
            Some(element) => Some(element),
            None => {
                let target_name = self[target].internal_name().to_string();
                self.error(
                    DiagnosticCode::PropertyDoesNotExistOnType,
                    &property_access.property.range,
                    &[property_name, &target_name],
                );
                None
            }
        }
    }

    /// Resolves an expression to the program entity it denotes.
    pub fn resolve_element(
        &mut self,
        expression: &Expression,
        contextual_function: ElementId,
    ) -> Option<ElementId> {
        match expression {
            Expression::This(range) => {
                match self.function(contextual_function).instance_method_of {
                    Some(class) => Some(class),
                    None => {
                        let range = range.clone();
                        self.error(DiagnosticCode::ThisCannotBeReferenced, &range, &[]);
                        None
                    }
                }
            }
            Expression::Identifier(identifier) => {
                self.resolve_identifier(identifier, contextual_function)
            }
            Expression::PropertyAccess(property_access) => {
                self.resolve_property_access(property_access, contextual_function)
            }
            Expression::New(new) => self.resolve_element(&new.expression, contextual_function),
            other => unimplemented!("element resolution for expression: {other:?}"),
        }
    }

    // ------------------------------------------------------------------
    // Monomorphization

    /// Resolves a function prototype against concrete type arguments,
    /// returning the cached instance when one exists.
    pub fn resolve_function_prototype(
        &mut self,
        prototype: ElementId,
        type_arguments: &[Type],
        contextual_type_arguments: Option<&HashMap<String, Type>>,
    ) -> Option<ElementId> {
        self.instantiate_function(prototype, type_arguments, contextual_type_arguments, None)
    }

    /// Builds (or returns the cached) concrete function for a prototype.
    ///
    /// `instance_method_of` is supplied when materializing a class method so
    /// the function receives a `this` local at index 0; plain prototype
    /// resolution passes `None`.
    pub fn instantiate_function(
        &mut self,
        prototype: ElementId,
        type_arguments: &[Type],
        contextual_type_arguments: Option<&HashMap<String, Type>>,
        instance_method_of: Option<ElementId>,
    ) -> Option<ElementId> {
        let instance_key = types_to_string(type_arguments, "", "");
        let (declaration, prototype_flags, prototype_internal, cached) = match &self[prototype] {
            Element::FunctionPrototype(p) => (
                p.declaration.clone(),
                p.base.flags,
                p.base.internal_name.clone(),
                p.instances.get(&instance_key).copied(),
            ),
            other => panic!("expected a function prototype, found {}", other.kind().token()),
        };
        if let Some(cached) = cached {
            return Some(cached);
        }
        let declaration =
            declaration.expect("built-in prototypes are materialized by the compiler");
        assert_eq!(
            declaration.type_parameters.len(),
            type_arguments.len(),
            "type-argument arity must be checked by the caller"
        );

        // copy the inherited bindings, then overwrite with our own
        let mut contextual = contextual_type_arguments.cloned().unwrap_or_default();
        for (parameter, argument) in declaration.type_parameters.iter().zip(type_arguments) {
            contextual.insert(parameter.name.text.clone(), argument.clone());
        }

        let mut parameters = Vec::with_capacity(declaration.parameters.len());
        for parameter in &declaration.parameters {
            // an unannotated parameter fails resolution
            let type_node = parameter.type_node.as_ref()?;
            let typ = self.resolve_type(type_node, Some(&contextual), true)?;
            parameters.push(Parameter {
                name: parameter.name.text.clone(),
                typ,
                initializer: parameter.initializer.clone(),
            });
        }
        let return_type = if prototype_flags.contains(ElementFlags::SETTER) {
            Type::void()
        } else {
            let node = declaration.return_type.as_ref()?;
            self.resolve_type(node, Some(&contextual), true)?
        };

        let internal_name = if instance_key.is_empty() {
            prototype_internal
        } else {
            format!("{prototype_internal}<{instance_key}>")
        };

        let mut locals = HashMap::new();
        let mut next_index = 0usize;
        if let Some(class) = instance_method_of {
            let class_type = self[class]
                .as_class()
                .expect("instance_method_of must be a class instance")
                .typ
                .clone();
            let this_local = self.alloc(Element::Local(Local {
                base: ElementBase::new("this", "this"),
                index: 0,
                typ: class_type,
            }));
            locals.insert("this".to_string(), this_local);
            next_index = 1;
        }
        for parameter in &parameters {
            let local = self.alloc(Element::Local(Local {
                base: ElementBase::new(parameter.name.clone(), parameter.name.clone()),
                index: next_index,
                typ: parameter.typ.clone(),
            }));
            locals.insert(parameter.name.clone(), local);
            next_index += 1;
        }

        let mut base = ElementBase::new(
            self[prototype].simple_name().to_string(),
            internal_name.clone(),
        )
        .with_flags(prototype_flags);
        base.namespace = self[prototype].base().namespace;
        let id = self.alloc(Element::Function(Function {
            base,
            prototype,
            type_arguments: type_arguments.to_vec(),
            parameters,
            return_type,
            instance_method_of,
            locals,
            additional_locals: Vec::new(),
            contextual_type_arguments: contextual,
            break_context: None,
            break_stack: Vec::new(),
            next_break_id: 0,
            temp_i32s: Vec::new(),
            temp_i64s: Vec::new(),
            temp_f32s: Vec::new(),
            temp_f64s: Vec::new(),
        }));
        match &mut self[prototype] {
            Element::FunctionPrototype(p) => {
                p.instances.insert(instance_key, id);
            }
            _ => unreachable!(),
        }
        // instances register back into the entity directory
        self.elements.entry(internal_name).or_insert(id);
        debug!(name = %self[id].internal_name(), "materialized function");
        Some(id)
    }

    /// Resolves a class or interface prototype against concrete type
    /// arguments. The instance carries the contextual bindings its members
    /// resolve against; per-member instances are materialized by the
    /// compilation pass.
    pub fn resolve_class_prototype(
        &mut self,
        prototype: ElementId,
        type_arguments: &[Type],
        contextual_type_arguments: Option<&HashMap<String, Type>>,
    ) -> Option<ElementId> {
        let instance_key = types_to_string(type_arguments, "", "");
        let is_interface = matches!(&self[prototype], Element::InterfacePrototype(_));
        let (declaration, prototype_flags, prototype_internal, cached, instance_member_ids) = {
            let p = self.class_prototype(prototype);
            (
                p.declaration.clone(),
                p.base.flags,
                p.base.internal_name.clone(),
                p.instances.get(&instance_key).copied(),
                p.instance_members.values().copied().collect::<Vec<_>>(),
            )
        };
        if let Some(cached) = cached {
            return Some(cached);
        }
        let declaration =
            declaration.expect("built-in prototypes are materialized by the compiler");
        assert_eq!(
            declaration.type_parameters.len(),
            type_arguments.len(),
            "type-argument arity must be checked by the caller"
        );

        let mut contextual = contextual_type_arguments.cloned().unwrap_or_default();
        for (parameter, argument) in declaration.type_parameters.iter().zip(type_arguments) {
            contextual.insert(parameter.name.text.clone(), argument.clone());
        }

        let internal_name = if instance_key.is_empty() {
            prototype_internal
        } else {
            format!("{prototype_internal}<{instance_key}>")
        };
        let pointer_size = self.target.pointer_size();
        let mut base = ElementBase::new(
            self[prototype].simple_name().to_string(),
            internal_name.clone(),
        )
        .with_flags(prototype_flags);
        base.namespace = self[prototype].base().namespace;
        let class = Class {
            base,
            prototype,
            type_arguments: type_arguments.to_vec(),
            // patched below once the handle exists
            typ: Type::usize_with(pointer_size),
            base_class: None,
            contextual_type_arguments: contextual,
        };
        let id = self.alloc(if is_interface {
            Element::Interface(class)
        } else {
            Element::Class(class)
        });
        let class_type = Type::class_type(pointer_size, id, Rc::from(internal_name.as_str()));
        match &mut self[id] {
            Element::Class(c) | Element::Interface(c) => c.typ = class_type,
            _ => unreachable!(),
        }
        match &mut self[prototype] {
            Element::ClassPrototype(p) | Element::InterfacePrototype(p) => {
                p.instances.insert(instance_key, id);
            }
            _ => unreachable!(),
        }
        self.elements.entry(internal_name).or_insert(id);
        for member in instance_member_ids {
            match &self[member] {
                Element::FieldPrototype(_) | Element::FunctionPrototype(_) | Element::Property(_) => {
                    // TODO: materialize per-member Field/Function instances once
                    // instance layout is defined by the compilation pass
                }
                other => panic!("unexpected instance member: {}", other.kind().token()),
            }
        }
        debug!(name = %self[id].internal_name(), "materialized class");
        Some(id)
    }

    /// Resolves a prototype given raw type-argument nodes, enforcing the
    /// generic/non-generic argument-count invariant.
    pub fn resolve_incl_type_arguments(
        &mut self,
        prototype: ElementId,
        type_argument_nodes: Option<&[TypeNode]>,
        contextual_type_arguments: Option<&HashMap<String, Type>>,
        alternative_report_range: Option<&Range>,
    ) -> Option<ElementId> {
        enum PrototypeKind {
            Function,
            ClassLike,
        }
        let (kind, is_generic, type_parameters) = match &self[prototype] {
            Element::FunctionPrototype(p) => (
                PrototypeKind::Function,
                p.base.flags.contains(ElementFlags::GENERIC),
                p.declaration
                    .as_ref()
                    .map(|d| d.type_parameters.clone())
                    .unwrap_or_default(),
            ),
            Element::ClassPrototype(p) | Element::InterfacePrototype(p) => (
                PrototypeKind::ClassLike,
                p.base.flags.contains(ElementFlags::GENERIC),
                p.declaration
                    .as_ref()
                    .map(|d| d.type_parameters.clone())
                    .unwrap_or_default(),
            ),
            other => panic!("expected a resolvable prototype, found {}", other.kind().token()),
        };
        let resolved = if is_generic {
            let nodes = type_argument_nodes.unwrap_or(&[]);
            self.resolve_type_arguments(
                &type_parameters,
                nodes,
                contextual_type_arguments,
                alternative_report_range,
            )?
        } else {
            if let Some(nodes) = type_argument_nodes {
                if !nodes.is_empty() {
                    let range = nodes[0].range.join(&nodes[nodes.len() - 1].range);
                    self.error(
                        DiagnosticCode::ExpectedTypeArguments,
                        &range,
                        &["0", &nodes.len().to_string()],
                    );
                    return None;
                }
            }
            Vec::new()
        };
        match kind {
            PrototypeKind::Function => {
                self.resolve_function_prototype(prototype, &resolved, contextual_type_arguments)
            }
            PrototypeKind::ClassLike => {
                self.resolve_class_prototype(prototype, &resolved, contextual_type_arguments)
            }
        }
    }
}
