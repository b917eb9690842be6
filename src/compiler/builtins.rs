//! Registration of compiler built-ins.
//!
//! Runs during `Program::initialize`, before any source is bound. Built-ins
//! live under their bare names in the element directory; the compilation
//! pass intercepts calls to them, so their prototypes carry no declaration.

use std::collections::HashMap;

use crate::compiler::elements::{
    ConstantValue, Element, ElementBase, ElementFlags, FunctionPrototype, Global,
};
use crate::compiler::program::Program;
use crate::compiler::types::Type;

pub fn register(program: &mut Program) {
    register_constant_global(program, "NaN", f64::NAN);
    register_constant_global(program, "Infinity", f64::INFINITY);
    register_builtin_function(program, "isNaN");
    register_builtin_function(program, "isFinite");
}

fn register_constant_global(program: &mut Program, name: &str, value: f64) {
    let base = ElementBase::new(name, name).with_flags(
        ElementFlags::BUILTIN
            | ElementFlags::GLOBAL
            | ElementFlags::CONSTANT
            | ElementFlags::CONSTANT_VALUE,
    );
    let id = program.alloc(Element::Global(Global {
        base,
        declaration: None,
        typ: Some(Type::f64()),
        constant_value: Some(ConstantValue::Float(value)),
    }));
    program.elements.insert(name.to_string(), id);
}

fn register_builtin_function(program: &mut Program, name: &str) {
    let base =
        ElementBase::new(name, name).with_flags(ElementFlags::BUILTIN | ElementFlags::GLOBAL);
    let id = program.alloc(Element::FunctionPrototype(FunctionPrototype {
        base,
        declaration: None,
        class_prototype: None,
        instances: HashMap::new(),
    }));
    program.elements.insert(name.to_string(), id);
}
