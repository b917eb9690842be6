//! Resolver tests: scope ordering, type resolution, property access, `this`
//! handling, and the per-function local machinery.

use std::collections::HashMap;
use std::rc::Rc;

use tsw::compiler::ast::{
    Expression, Identifier, NewExpression, PropertyAccessExpression, TypeNode, TypeParameterNode,
};
use tsw::compiler::diagnostics::DiagnosticCode;
use tsw::compiler::elements::{Element, ElementId};
use tsw::compiler::program::{Program, Target};
use tsw::compiler::text::Range;
use tsw::compiler::types::{Type, TypeKind};
use tsw::parse::parse_source;

fn bind(files: &[(&str, &str)]) -> Program {
    let mut program = Program::new();
    for (path, text) in files {
        let source = parse_source(path, text).expect("source should parse");
        program.add_source(source);
    }
    program.initialize(Target::Wasm32);
    program
}

fn range() -> Range {
    Range::new(Rc::from("test"), 0, 0)
}

fn ident(text: &str) -> Identifier {
    Identifier {
        text: text.to_string(),
        range: range(),
    }
}

fn type_node(name: &str) -> TypeNode {
    TypeNode {
        name: ident(name),
        type_arguments: Vec::new(),
        range: range(),
    }
}

fn type_parameter(name: &str) -> TypeParameterNode {
    TypeParameterNode {
        name: ident(name),
        range: range(),
    }
}

/// Materializes the (non-generic) function prototype behind an internal name.
fn instance_of(program: &mut Program, internal_name: &str) -> ElementId {
    let prototype = program.elements[internal_name];
    program
        .resolve_function_prototype(prototype, &[], None)
        .expect("function should resolve")
}

#[test]
fn identifier_resolution_prefers_local_then_namespace_then_file_then_global() {
    let mut program = bind(&[
        ("lib", "@global\nconst v: f64 = 0.0;"),
        (
            "main",
            "const v: i32 = 1;\nnamespace N { const v: i32 = 2; function f(v: i32): void {} function g(): void {} }\nfunction h(): void {}",
        ),
        ("other", "function k(): void {}"),
    ]);
    assert_eq!(program.error_count(), 0, "{:?}", program.diagnostics);

    // local wins inside N.f
    let in_f = instance_of(&mut program, "main/N.f");
    let resolved = program.resolve_identifier(&ident("v"), in_f).unwrap();
    assert!(matches!(&program[resolved], Element::Local(local) if local.index == 0));

    // the namespace member wins inside N.g
    let in_g = instance_of(&mut program, "main/N.g");
    let resolved = program.resolve_identifier(&ident("v"), in_g).unwrap();
    assert_eq!(program[resolved].internal_name(), "main/N.v");

    // the file-scope entity wins inside h
    let in_h = instance_of(&mut program, "main/h");
    let resolved = program.resolve_identifier(&ident("v"), in_h).unwrap();
    assert_eq!(program[resolved].internal_name(), "main/v");

    // only the `@global` alias is visible from another file
    let in_k = instance_of(&mut program, "other/k");
    let resolved = program.resolve_identifier(&ident("v"), in_k).unwrap();
    assert_eq!(program[resolved].internal_name(), "lib/v");
}

#[test]
fn namespace_function_shadows_top_level_function() {
    let mut program = bind(&[(
        "main",
        "namespace N { function f(): void {} function g(): void {} }\nfunction f(): void {}\nfunction h(): void {}",
    )]);
    let in_ns = instance_of(&mut program, "main/N.g");
    let resolved = program.resolve_identifier(&ident("f"), in_ns).unwrap();
    assert_eq!(program[resolved].internal_name(), "main/N.f");

    let top_level = instance_of(&mut program, "main/h");
    let resolved = program.resolve_identifier(&ident("f"), top_level).unwrap();
    assert_eq!(program[resolved].internal_name(), "main/f");
}

#[test]
fn unresolved_identifier_reports_cannot_find_name() {
    let mut program = bind(&[("main", "function f(): void {}")]);
    let ctx = instance_of(&mut program, "main/f");
    assert_eq!(program.resolve_identifier(&ident("missing"), ctx), None);
    assert_eq!(
        program
            .diagnostics
            .iter()
            .filter(|d| d.code == DiagnosticCode::CannotFindName)
            .count(),
        1
    );
}

#[test]
fn type_resolution_covers_primitives_aliases_and_placeholders() {
    let mut program = bind(&[("main", "type Index = i32;")]);

    let resolved = program.resolve_type(&type_node("i32"), None, true).unwrap();
    assert_eq!(resolved.kind, TypeKind::I32);

    // `number` and `boolean` are pre-registered aliases in the type table
    assert_eq!(
        program.resolve_type(&type_node("number"), None, true).unwrap(),
        Type::f64()
    );
    assert_eq!(
        program.resolve_type(&type_node("boolean"), None, true).unwrap(),
        Type::bool()
    );

    // declared aliases chase to their target
    let resolved = program.resolve_type(&type_node("Index"), None, true).unwrap();
    assert_eq!(resolved.kind, TypeKind::I32);

    // contextual placeholders win over the registries
    let mut contextual = HashMap::new();
    contextual.insert("T".to_string(), Type::i64());
    let resolved = program
        .resolve_type(&type_node("T"), Some(&contextual), true)
        .unwrap();
    assert_eq!(resolved.kind, TypeKind::I64);

    assert_eq!(program.error_count(), 0, "{:?}", program.diagnostics);
}

#[test]
fn pointer_sized_types_follow_the_target() {
    let mut program32 = bind(&[]);
    let usize32 = program32.resolve_type(&type_node("usize"), None, true).unwrap();
    assert_eq!((usize32.kind, usize32.size), (TypeKind::Usize, 32));

    let mut program64 = Program::new();
    program64.initialize(Target::Wasm64);
    let usize64 = program64.resolve_type(&type_node("usize"), None, true).unwrap();
    assert_eq!((usize64.kind, usize64.size), (TypeKind::Usize, 64));
    let isize64 = program64.resolve_type(&type_node("isize"), None, true).unwrap();
    assert_eq!((isize64.kind, isize64.size), (TypeKind::Isize, 64));
}

#[test]
fn unknown_type_reports_only_when_asked() {
    let mut program = bind(&[]);
    assert_eq!(program.resolve_type(&type_node("Missing"), None, false), None);
    assert_eq!(program.error_count(), 0);
    assert_eq!(program.resolve_type(&type_node("Missing"), None, true), None);
    assert_eq!(
        program
            .diagnostics
            .iter()
            .filter(|d| d.code == DiagnosticCode::CannotFindName)
            .count(),
        1
    );
}

#[test]
fn type_argument_arity_mismatch_reports_expected_counts() {
    let mut program = bind(&[]);
    let parameters = [type_parameter("T")];

    let report_range = range();
    let resolved =
        program.resolve_type_arguments(&parameters, &[], None, Some(&report_range));
    assert_eq!(resolved, None);
    let diagnostic = program.diagnostics.last().unwrap();
    assert_eq!(diagnostic.code, DiagnosticCode::ExpectedTypeArguments);
    assert_eq!(diagnostic.message, "Expected 1 type arguments, but got 0.");

    // matching arity resolves each argument
    let resolved = program
        .resolve_type_arguments(&parameters, &[type_node("i32")], None, None)
        .unwrap();
    assert_eq!(resolved, vec![Type::i32()]);
}

#[test]
fn property_access_resolves_static_members_and_enum_values() {
    let mut program = bind(&[(
        "main",
        "class C { static create(): i32 { return 0; } }\nenum E { A }\nfunction f(): void {}",
    )]);
    let ctx = instance_of(&mut program, "main/f");

    let access = PropertyAccessExpression {
        expression: Expression::Identifier(ident("C")),
        property: ident("create"),
        range: range(),
    };
    let resolved = program.resolve_property_access(&access, ctx).unwrap();
    assert_eq!(program[resolved].internal_name(), "main/C.create");

    let access = PropertyAccessExpression {
        expression: Expression::Identifier(ident("E")),
        property: ident("A"),
        range: range(),
    };
    let resolved = program.resolve_property_access(&access, ctx).unwrap();
    assert!(matches!(
        &program[resolved],
        Element::EnumValue(value) if value.constant_value == 0
    ));
}

#[test]
fn missing_property_reports_on_the_receiver_type() {
    let mut program = bind(&[(
        "main",
        "class C { static create(): i32 { return 0; } }\nfunction f(): void {}",
    )]);
    let ctx = instance_of(&mut program, "main/f");
    let access = PropertyAccessExpression {
        expression: Expression::Identifier(ident("C")),
        property: ident("missing"),
        range: range(),
    };
    assert_eq!(program.resolve_property_access(&access, ctx), None);
    let diagnostic = program.diagnostics.last().unwrap();
    assert_eq!(diagnostic.code, DiagnosticCode::PropertyDoesNotExistOnType);
    assert_eq!(
        diagnostic.message,
        "Property 'missing' does not exist on type 'main/C'."
    );
}

#[test]
fn this_resolves_to_the_enclosing_class_instance() {
    let mut program = bind(&[("main", "class C { m(): void {} }\nfunction f(): void {}")]);
    let class_prototype = program.elements["main/C"];
    let class_instance = program
        .resolve_class_prototype(class_prototype, &[], None)
        .unwrap();
    let method_prototype = program
        .element_by_name("main/C")
        .unwrap()
        .as_class_prototype()
        .unwrap()
        .instance_members["m"];
    let method = program
        .instantiate_function(method_prototype, &[], None, Some(class_instance))
        .unwrap();

    // `locals["this"]` exists iff the function is an instance method
    let this_local = program.function(method).locals["this"];
    assert!(matches!(&program[this_local], Element::Local(local) if local.index == 0));

    let resolved = program.resolve_element(&Expression::This(range()), method);
    assert_eq!(resolved, Some(class_instance));

    // outside an instance method, `this` is illegal
    let free_function = instance_of(&mut program, "main/f");
    assert!(!program.function(free_function).locals.contains_key("this"));
    assert_eq!(program.resolve_element(&Expression::This(range()), free_function), None);
    assert_eq!(
        program.diagnostics.last().unwrap().code,
        DiagnosticCode::ThisCannotBeReferenced
    );
}

#[test]
fn new_expressions_resolve_their_constructed_class() {
    let mut program = bind(&[("main", "class C {}\nfunction f(): void {}")]);
    let ctx = instance_of(&mut program, "main/f");
    let new_expression = Expression::New(Rc::new(NewExpression {
        expression: Expression::Identifier(ident("C")),
        type_arguments: Vec::new(),
        arguments: Vec::new(),
        range: range(),
    }));
    let resolved = program.resolve_element(&new_expression, ctx).unwrap();
    assert_eq!(resolved, program.elements["main/C"]);
}

#[test]
fn parameters_become_indexed_locals() {
    let mut program = bind(&[("main", "function f(a: i32, b: f64): void {}")]);
    let func = instance_of(&mut program, "main/f");
    let function = program.function(func);
    assert_eq!(function.parameters.len(), 2);
    let a = function.locals["a"];
    let b = function.locals["b"];
    assert!(matches!(&program[a], Element::Local(local) if local.index == 0));
    assert!(matches!(&program[b], Element::Local(local) if local.index == 1));
}

#[test]
fn additional_locals_and_anonymous_names() {
    let mut program = bind(&[("main", "function f(a: i32): void {}")]);
    let func = instance_of(&mut program, "main/f");
    let named = program.function_add_local(func, Type::i64(), Some("scratch"));
    assert_eq!(program[named].simple_name(), "scratch");
    assert!(matches!(&program[named], Element::Local(local) if local.index == 1));
    let anonymous = program.function_add_local(func, Type::i32(), None);
    assert_eq!(program[anonymous].simple_name(), "anonymous$2");
    assert_eq!(program.function(func).additional_locals.len(), 2);
    // anonymous locals are not named lookups
    assert!(!program.function(func).locals.contains_key("anonymous$2"));
}

#[test]
fn temp_locals_are_pooled_per_native_type() {
    let mut program = bind(&[("main", "function f(): void {}")]);
    let func = instance_of(&mut program, "main/f");

    let first = program.get_temp_local(func, &Type::i32());
    program.free_temp_local(func, first);
    let second = program.get_temp_local(func, &Type::i32());
    assert_eq!(first, second, "freed temps are reused");

    // a different native type draws from a different pool
    let float = program.get_temp_local(func, &Type::f64());
    assert_ne!(second, float);

    // bool shares the i32 pool
    program.free_temp_local(func, second);
    let boolean = program.get_temp_local(func, &Type::bool());
    assert_eq!(second, boolean);
}

#[test]
fn get_and_free_keeps_the_local_available() {
    let mut program = bind(&[("main", "function f(): void {}")]);
    let func = instance_of(&mut program, "main/f");
    let first = program.get_and_free_temp_local(func, &Type::i64());
    let second = program.get_and_free_temp_local(func, &Type::i64());
    assert_eq!(first, second);
    // the local is still in the pool, so a plain get takes it
    let taken = program.get_temp_local(func, &Type::i64());
    assert_eq!(taken, first);
}

#[test]
fn finalize_clears_transient_state() {
    let mut program = bind(&[("main", "function f(): void {}")]);
    let func = instance_of(&mut program, "main/f");
    let temp = program.get_temp_local(func, &Type::i32());
    program.free_temp_local(func, temp);
    {
        let function = program.function_mut(func);
        function.enter_break_context();
        assert_eq!(function.break_context.as_deref(), Some("0"));
        function.leave_break_context();
        function.finalize();
        assert_eq!(function.break_context, None);
    }
    // pools were released; the next temp is a fresh local
    let fresh = program.get_temp_local(func, &Type::i32());
    assert_ne!(fresh, temp);
}
