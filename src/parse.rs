//! Declaration-surface parser for the TypeScript subset.
//!
//! Parses the declaration structure the binder consumes: imports, exports,
//! variables, functions, classes with fields/methods/accessors, interfaces,
//! enums, namespaces, type aliases, decorators and type expressions.
//! Function bodies are scanned as balanced-brace blobs and not represented.

use std::rc::Rc;

use chumsky::error::Rich;
use chumsky::prelude::*;

use crate::compiler::ast::{
    ClassDeclaration, ClassMember, Decorator, EnumDeclaration, EnumValueDeclaration,
    ExportMember, ExportStatement, Expression, FieldDeclaration, FunctionDeclaration, Identifier,
    ImportDeclaration, ImportStatement, ModifierFlags, NamespaceDeclaration, ParameterNode,
    Source, Statement, TypeDeclaration, TypeNode, TypeParameterNode, VariableDeclaration,
    VariableStatement,
};
use crate::compiler::names;
use crate::compiler::text::Range;

/// A declaration before its enclosing modifiers and decorators are attached.
enum Declaration {
    Class(ClassDeclaration),
    Enum(EnumDeclaration),
    Function(FunctionDeclaration),
    Interface(ClassDeclaration),
    Namespace(NamespaceDeclaration),
    TypeAlias(TypeDeclaration),
    Variable(VariableStatement),
}

fn attach(declaration: Declaration, modifiers: ModifierFlags, decorators: Vec<Decorator>) -> Statement {
    match declaration {
        Declaration::Class(mut decl) => {
            decl.modifiers |= modifiers;
            decl.decorators = decorators;
            Statement::Class(Rc::new(decl))
        }
        Declaration::Interface(mut decl) => {
            decl.modifiers |= modifiers;
            decl.decorators = decorators;
            Statement::Interface(Rc::new(decl))
        }
        Declaration::Enum(mut decl) => {
            decl.modifiers |= modifiers;
            decl.decorators = decorators;
            Statement::Enum(Rc::new(decl))
        }
        Declaration::Function(mut decl) => {
            decl.modifiers |= modifiers;
            decl.decorators = decorators;
            Statement::Function(Rc::new(decl))
        }
        Declaration::Namespace(mut decl) => {
            decl.modifiers |= modifiers;
            decl.decorators = decorators;
            Statement::Namespace(Rc::new(decl))
        }
        Declaration::TypeAlias(mut decl) => {
            decl.modifiers |= modifiers;
            Statement::TypeAlias(Rc::new(decl))
        }
        Declaration::Variable(mut decl) => {
            decl.modifiers |= modifiers;
            decl.decorators = decorators;
            Statement::Variable(Rc::new(decl))
        }
    }
}

fn range_at(file: &Rc<str>, span: SimpleSpan) -> Range {
    Range::new(file.clone(), span.start as u32, span.end as u32)
}

/// Parses a source file, given its internal (extension-free) path.
pub fn parse_source<'a>(
    internal_path: &str,
    text: &'a str,
) -> Result<Source, Vec<Rich<'a, char>>> {
    let file: Rc<str> = Rc::from(internal_path);
    let statements = source_parser(file.clone()).parse(text).into_result()?;
    Ok(Source {
        internal_path: file,
        text: text.to_string(),
        statements,
    })
}

fn source_parser<'a>(
    file: Rc<str>,
) -> impl Parser<'a, &'a str, Vec<Statement>, extra::Err<Rich<'a, char>>> {
    let identifier = {
        let file = file.clone();
        text::ident()
            .map_with(move |s: &str, e| Identifier {
                text: s.to_string(),
                range: range_at(&file, e.span()),
            })
            .padded()
            .boxed()
    };

    let string = none_of("\"")
        .repeated()
        .to_slice()
        .map(|s: &str| s.to_string())
        .delimited_by(just('"'), just('"'))
        .or(none_of("'")
            .repeated()
            .to_slice()
            .map(|s: &str| s.to_string())
            .delimited_by(just('\''), just('\'')))
        .padded()
        .boxed();

    let number = {
        let file = file.clone();
        just('-')
            .or_not()
            .then(text::int(10))
            .then(just('.').then(text::digits(10)).or_not())
            .to_slice()
            .map_with(move |s: &str, e| {
                if s.contains('.') {
                    Expression::FloatLiteral(s.parse().unwrap_or(0.0), range_at(&file, e.span()))
                } else {
                    Expression::IntegerLiteral(s.parse().unwrap_or(0), range_at(&file, e.span()))
                }
            })
            .padded()
            .boxed()
    };

    let expression = {
        let file_this = file.clone();
        let file_str = file.clone();
        choice((
            number.clone(),
            string
                .clone()
                .map_with(move |s, e| Expression::StringLiteral(s, range_at(&file_str, e.span())))
                .boxed(),
            text::keyword("this")
                .map_with(move |_, e| Expression::This(range_at(&file_this, e.span())))
                .padded()
                .boxed(),
            identifier.clone().map(Expression::Identifier).boxed(),
        ))
        .boxed()
    };

    let type_node = recursive(|type_node| {
        let file = file.clone();
        identifier
            .clone()
            .then(
                type_node
                    .separated_by(just(',').padded())
                    .at_least(1)
                    .collect::<Vec<_>>()
                    .delimited_by(just('<').padded(), just('>').padded())
                    .or_not(),
            )
            .map_with(move |(name, arguments), e| TypeNode {
                name,
                type_arguments: arguments.unwrap_or_default(),
                range: range_at(&file, e.span()),
            })
    })
    .boxed();

    let type_parameters = {
        let file = file.clone();
        identifier
            .clone()
            .map_with(move |name, e| TypeParameterNode {
                name,
                range: range_at(&file, e.span()),
            })
            .separated_by(just(',').padded())
            .at_least(1)
            .collect::<Vec<_>>()
            .delimited_by(just('<').padded(), just('>').padded())
            .or_not()
            .map(Option::unwrap_or_default)
            .boxed()
    };

    let parameter = {
        let file = file.clone();
        identifier
            .clone()
            .then(just(':').padded().ignore_then(type_node.clone()).or_not())
            .then(just('=').padded().ignore_then(expression.clone()).or_not())
            .map_with(move |((name, type_node), initializer), e| ParameterNode {
                name,
                type_node,
                initializer,
                range: range_at(&file, e.span()),
            })
    };
    let parameters = parameter
        .separated_by(just(',').padded())
        .allow_trailing()
        .collect::<Vec<_>>()
        .delimited_by(just('(').padded(), just(')').padded())
        .boxed();

    // function bodies are skipped as balanced-brace blobs
    let block = recursive(|block| {
        choice((none_of("{}").ignored(), block))
            .repeated()
            .delimited_by(just('{'), just('}'))
            .ignored()
    })
    .padded()
    .boxed();

    let decorator = {
        let file = file.clone();
        just('@')
            .padded()
            .ignore_then(identifier.clone())
            .then(
                expression
                    .clone()
                    .separated_by(just(',').padded())
                    .allow_trailing()
                    .collect::<Vec<_>>()
                    .delimited_by(just('(').padded(), just(')').padded())
                    .or_not(),
            )
            .map_with(move |(name, arguments), e| Decorator {
                name,
                arguments: arguments.unwrap_or_default(),
                range: range_at(&file, e.span()),
            })
    };
    let decorators = decorator.repeated().collect::<Vec<_>>().boxed();

    let semicolon = just(';').padded().or_not().ignored().boxed();

    let function_tail = {
        let file = file.clone();
        identifier
            .clone()
            .then(type_parameters.clone())
            .then(parameters.clone())
            .then(just(':').padded().ignore_then(type_node.clone()).or_not())
            .then(block.clone().or_not())
            .then_ignore(semicolon.clone())
            .map_with(
                move |((((name, type_parameters), parameters), return_type), _body), e| {
                    FunctionDeclaration {
                        name,
                        type_parameters,
                        parameters,
                        return_type,
                        modifiers: ModifierFlags::NONE,
                        decorators: Vec::new(),
                        range: range_at(&file, e.span()),
                    }
                },
            )
            .boxed()
    };

    let function_decl = text::keyword("function")
        .padded()
        .ignore_then(function_tail.clone())
        .map(Declaration::Function)
        .boxed();

    let variable_decl = {
        let file = file.clone();
        identifier
            .clone()
            .then(just(':').padded().ignore_then(type_node.clone()).or_not())
            .then(just('=').padded().ignore_then(expression.clone()).or_not())
            .map_with(move |((name, type_node), initializer), e| VariableDeclaration {
                name,
                type_node,
                initializer,
                range: range_at(&file, e.span()),
            })
    };
    let variable_stmt = {
        let file = file.clone();
        choice((
            text::keyword("const").to(ModifierFlags::CONST),
            text::keyword("let").to(ModifierFlags::LET),
            text::keyword("var").to(ModifierFlags::VAR),
        ))
        .padded()
        .then(
            variable_decl
                .separated_by(just(',').padded())
                .at_least(1)
                .collect::<Vec<_>>(),
        )
        .then_ignore(semicolon.clone())
        .map_with(move |(kind, declarations), e| {
            Declaration::Variable(VariableStatement {
                declarations: declarations.into_iter().map(Rc::new).collect(),
                modifiers: kind,
                decorators: Vec::new(),
                range: range_at(&file, e.span()),
            })
        })
        .boxed()
    };

    let enum_value = {
        let file = file.clone();
        identifier
            .clone()
            .then(just('=').padded().ignore_then(expression.clone()).or_not())
            .map_with(move |(name, initializer), e| EnumValueDeclaration {
                name,
                initializer,
                range: range_at(&file, e.span()),
            })
    };
    let enum_decl = {
        let file = file.clone();
        text::keyword("const")
            .padded()
            .to(ModifierFlags::CONST)
            .or_not()
            .then(text::keyword("enum").padded().ignore_then(identifier.clone()))
            .then(
                enum_value
                    .separated_by(just(',').padded())
                    .allow_trailing()
                    .collect::<Vec<_>>()
                    .delimited_by(just('{').padded(), just('}').padded()),
            )
            .then_ignore(semicolon.clone())
            .map_with(move |((const_modifier, name), values), e| {
                Declaration::Enum(EnumDeclaration {
                    name,
                    values: values.into_iter().map(Rc::new).collect(),
                    modifiers: const_modifier.unwrap_or(ModifierFlags::NONE),
                    decorators: Vec::new(),
                    range: range_at(&file, e.span()),
                })
            })
            .boxed()
    };

    let member_modifiers = choice((
        text::keyword("static").to(ModifierFlags::STATIC),
        text::keyword("readonly").to(ModifierFlags::READONLY),
        text::keyword("private").to(ModifierFlags::PRIVATE),
        text::keyword("protected").to(ModifierFlags::PROTECTED),
        text::keyword("public").to(ModifierFlags::PUBLIC),
        text::keyword("abstract").to(ModifierFlags::ABSTRACT),
        text::keyword("get").to(ModifierFlags::GET),
        text::keyword("set").to(ModifierFlags::SET),
    ))
    .padded()
    .repeated()
    .collect::<Vec<_>>()
    .map(|modifiers| {
        modifiers
            .into_iter()
            .fold(ModifierFlags::NONE, |acc, m| acc | m)
    })
    .boxed();

    let field_tail = {
        let file = file.clone();
        identifier
            .clone()
            .then(just(':').padded().ignore_then(type_node.clone()).or_not())
            .then(just('=').padded().ignore_then(expression.clone()).or_not())
            .then_ignore(semicolon.clone())
            .map_with(move |((name, type_node), initializer), e| FieldDeclaration {
                name,
                type_node,
                initializer,
                modifiers: ModifierFlags::NONE,
                range: range_at(&file, e.span()),
            })
            .boxed()
    };

    enum MemberTail {
        Method(FunctionDeclaration),
        Field(FieldDeclaration),
    }
    let class_member = member_modifiers
        .then(choice((
            function_tail.clone().map(MemberTail::Method).boxed(),
            field_tail.map(MemberTail::Field).boxed(),
        )))
        .map(|(modifiers, member)| match member {
            MemberTail::Method(mut method) => {
                method.modifiers |= modifiers;
                ClassMember::Method(Rc::new(method))
            }
            MemberTail::Field(mut field) => {
                field.modifiers |= modifiers;
                ClassMember::Field(Rc::new(field))
            }
        })
        .boxed();

    let class_body = class_member
        .repeated()
        .collect::<Vec<_>>()
        .delimited_by(just('{').padded(), just('}').padded())
        .boxed();

    let class_like = {
        let file = file.clone();
        identifier
            .clone()
            .then(type_parameters.clone())
            .then(
                text::keyword("extends")
                    .padded()
                    .ignore_then(type_node.clone())
                    .or_not(),
            )
            .then(class_body.clone())
            .map_with(
                move |(((name, type_parameters), extends_type), members), e| ClassDeclaration {
                    name,
                    type_parameters,
                    extends_type,
                    members,
                    modifiers: ModifierFlags::NONE,
                    decorators: Vec::new(),
                    range: range_at(&file, e.span()),
                },
            )
            .boxed()
    };

    let class_decl = text::keyword("class")
        .padded()
        .ignore_then(class_like.clone())
        .map(Declaration::Class)
        .boxed();
    let interface_decl = text::keyword("interface")
        .padded()
        .ignore_then(class_like)
        .map(Declaration::Interface)
        .boxed();

    let type_alias_decl = {
        let file = file.clone();
        text::keyword("type")
            .padded()
            .ignore_then(identifier.clone())
            .then_ignore(just('=').padded())
            .then(type_node.clone())
            .then_ignore(semicolon.clone())
            .map_with(move |(name, aliased), e| {
                Declaration::TypeAlias(TypeDeclaration {
                    name,
                    type_node: Rc::new(aliased),
                    modifiers: ModifierFlags::NONE,
                    range: range_at(&file, e.span()),
                })
            })
            .boxed()
    };

    let top_modifiers = choice((
        text::keyword("export").to(ModifierFlags::EXPORT),
        text::keyword("declare").to(ModifierFlags::DECLARE),
    ))
    .padded()
    .repeated()
    .collect::<Vec<_>>()
    .map(|modifiers| {
        modifiers
            .into_iter()
            .fold(ModifierFlags::NONE, |acc, m| acc | m)
    })
    .boxed();

    // declarations nest through namespaces
    let declaration_stmt = recursive(|declaration_stmt| {
        let namespace_decl = {
            let file = file.clone();
            text::keyword("namespace")
                .padded()
                .ignore_then(identifier.clone())
                .then(
                    declaration_stmt
                        .repeated()
                        .collect::<Vec<_>>()
                        .delimited_by(just('{').padded(), just('}').padded()),
                )
                .map_with(move |(name, members), e| {
                    Declaration::Namespace(NamespaceDeclaration {
                        name,
                        members,
                        modifiers: ModifierFlags::NONE,
                        decorators: Vec::new(),
                        range: range_at(&file, e.span()),
                    })
                })
                .boxed()
        };

        decorators
            .clone()
            .then(top_modifiers.clone())
            .then(choice((
                class_decl.clone(),
                interface_decl.clone(),
                enum_decl.clone(),
                namespace_decl,
                type_alias_decl.clone(),
                function_decl.clone(),
                variable_stmt.clone(),
            )))
            .map(|((decorators, modifiers), declaration)| {
                attach(declaration, modifiers, decorators)
            })
    })
    .boxed();

    let import_specifier = {
        let file = file.clone();
        identifier
            .clone()
            .then(
                text::keyword("as")
                    .padded()
                    .ignore_then(identifier.clone())
                    .or_not(),
            )
            .map_with(move |(external_name, alias), e| {
                let name = alias.unwrap_or_else(|| external_name.clone());
                ImportDeclaration {
                    external_name,
                    name,
                    range: range_at(&file, e.span()),
                }
            })
    };
    let named_imports = import_specifier
        .separated_by(just(',').padded())
        .allow_trailing()
        .collect::<Vec<_>>()
        .delimited_by(just('{').padded(), just('}').padded())
        .map(|declarations| {
            (
                Some(declarations.into_iter().map(Rc::new).collect::<Vec<_>>()),
                None,
            )
        })
        .boxed();
    let namespace_import = just('*')
        .padded()
        .ignore_then(text::keyword("as").padded())
        .ignore_then(identifier.clone())
        .map(|name| (None, Some(name)))
        .boxed();
    let import_stmt = {
        let file = file.clone();
        text::keyword("import")
            .padded()
            .ignore_then(choice((named_imports, namespace_import)))
            .then_ignore(text::keyword("from").padded())
            .then(string.clone())
            .then_ignore(semicolon.clone())
            .map_with(move |((declarations, namespace_name), path), e| {
                let internal_path = names::resolve_internal_path(&file, &path);
                Statement::Import(Rc::new(ImportStatement {
                    declarations,
                    namespace_name,
                    path,
                    internal_path,
                    range: range_at(&file, e.span()),
                }))
            })
            .boxed()
    };

    let export_member = {
        let file = file.clone();
        identifier
            .clone()
            .then(
                text::keyword("as")
                    .padded()
                    .ignore_then(identifier.clone())
                    .or_not(),
            )
            .map_with(move |(name, alias), e| ExportMember {
                external_name: alias.unwrap_or_else(|| name.clone()),
                name,
                range: range_at(&file, e.span()),
            })
    };
    let export_stmt = {
        let file = file.clone();
        text::keyword("export")
            .padded()
            .ignore_then(
                export_member
                    .separated_by(just(',').padded())
                    .allow_trailing()
                    .collect::<Vec<_>>()
                    .delimited_by(just('{').padded(), just('}').padded()),
            )
            .then(
                text::keyword("from")
                    .padded()
                    .ignore_then(string.clone())
                    .or_not(),
            )
            .then_ignore(semicolon.clone())
            .map_with(move |(members, path), e| {
                let internal_path = path
                    .as_ref()
                    .map(|p| names::resolve_internal_path(&file, p));
                Statement::Export(Rc::new(ExportStatement {
                    members: members.into_iter().map(Rc::new).collect(),
                    path,
                    internal_path,
                    range: range_at(&file, e.span()),
                }))
            })
            .boxed()
    };

    let statement = choice((import_stmt, export_stmt, declaration_stmt)).boxed();

    statement
        .padded()
        .repeated()
        .collect::<Vec<_>>()
        .then_ignore(end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ast::Statement;

    fn parse(text: &str) -> Source {
        match parse_source("main", text) {
            Ok(source) => source,
            Err(errors) => panic!("parse failed: {errors:?}"),
        }
    }

    #[test]
    fn test_function_declaration() {
        let source = parse("export function add(a: i32, b: i32): i32 { return a + b; }");
        assert_eq!(source.statements.len(), 1);
        let Statement::Function(func) = &source.statements[0] else {
            panic!("expected a function");
        };
        assert_eq!(func.name.text, "add");
        assert!(func.modifiers.contains(ModifierFlags::EXPORT));
        assert_eq!(func.parameters.len(), 2);
        assert_eq!(
            func.parameters[0].type_node.as_ref().unwrap().name.text,
            "i32"
        );
        assert_eq!(func.return_type.as_ref().unwrap().name.text, "i32");
    }

    #[test]
    fn test_generic_function() {
        let source = parse("function id<T>(x: T): T {}");
        let Statement::Function(func) = &source.statements[0] else {
            panic!("expected a function");
        };
        assert_eq!(func.type_parameters.len(), 1);
        assert_eq!(func.type_parameters[0].name.text, "T");
    }

    #[test]
    fn test_nested_bodies_are_skipped() {
        let source = parse("function f(): void { if (x) { while (y) { z(); } } }\nlet a: i32;");
        assert_eq!(source.statements.len(), 2);
    }

    #[test]
    fn test_class_with_members() {
        let source = parse(
            "class C<T> extends Base {\n  static count: i32 = 0;\n  value: T;\n  static create(): C { return new C(); }\n  get size(): i32 { return 1; }\n  set size(v: i32) {}\n}",
        );
        let Statement::Class(class) = &source.statements[0] else {
            panic!("expected a class");
        };
        assert_eq!(class.name.text, "C");
        assert_eq!(class.type_parameters.len(), 1);
        assert_eq!(class.extends_type.as_ref().unwrap().name.text, "Base");
        assert_eq!(class.members.len(), 5);
        let ClassMember::Field(count) = &class.members[0] else {
            panic!("expected a field");
        };
        assert!(count.modifiers.contains(ModifierFlags::STATIC));
        let ClassMember::Method(getter) = &class.members[3] else {
            panic!("expected a method");
        };
        assert!(getter.modifiers.contains(ModifierFlags::GET));
    }

    #[test]
    fn test_enum_declaration() {
        let source = parse("const enum Color { Red, Green = 10, Blue }");
        let Statement::Enum(e) = &source.statements[0] else {
            panic!("expected an enum");
        };
        assert!(e.modifiers.contains(ModifierFlags::CONST));
        assert_eq!(e.values.len(), 3);
        assert!(matches!(
            &e.values[1].initializer,
            Some(Expression::IntegerLiteral(10, _))
        ));
    }

    #[test]
    fn test_namespace_nesting() {
        let source = parse("namespace A { namespace B { function f(): void {} } let x: i32; }");
        let Statement::Namespace(a) = &source.statements[0] else {
            panic!("expected a namespace");
        };
        assert_eq!(a.members.len(), 2);
        let Statement::Namespace(b) = &a.members[0] else {
            panic!("expected a nested namespace");
        };
        assert_eq!(b.name.text, "B");
    }

    #[test]
    fn test_imports_and_exports() {
        let source = parse("import { f, g as h } from \"./other\";\nexport { h as g };");
        let Statement::Import(import) = &source.statements[0] else {
            panic!("expected an import");
        };
        assert_eq!(import.internal_path, "other");
        let declarations = import.declarations.as_ref().unwrap();
        assert_eq!(declarations[0].external_name.text, "f");
        assert_eq!(declarations[0].name.text, "f");
        assert_eq!(declarations[1].external_name.text, "g");
        assert_eq!(declarations[1].name.text, "h");
        let Statement::Export(export) = &source.statements[1] else {
            panic!("expected an export");
        };
        assert!(export.path.is_none());
        assert_eq!(export.members[0].name.text, "h");
        assert_eq!(export.members[0].external_name.text, "g");
    }

    #[test]
    fn test_namespace_import_form() {
        let source = parse("import * as env from \"env\";");
        let Statement::Import(import) = &source.statements[0] else {
            panic!("expected an import");
        };
        assert!(import.declarations.is_none());
        assert_eq!(import.namespace_name.as_ref().unwrap().text, "env");
    }

    #[test]
    fn test_re_export() {
        let source = parse("export { f } from \"./b\";");
        let Statement::Export(export) = &source.statements[0] else {
            panic!("expected an export");
        };
        assert_eq!(export.internal_path.as_deref(), Some("b"));
    }

    #[test]
    fn test_global_decorator() {
        let source = parse("@global\nconst NaN2: f64 = 0.0;");
        let Statement::Variable(var) = &source.statements[0] else {
            panic!("expected a variable");
        };
        assert_eq!(var.decorators.len(), 1);
        assert_eq!(var.decorators[0].name.text, "global");
    }

    #[test]
    fn test_type_alias() {
        let source = parse("type Index = i32;");
        let Statement::TypeAlias(alias) = &source.statements[0] else {
            panic!("expected a type alias");
        };
        assert_eq!(alias.name.text, "Index");
        assert_eq!(alias.type_node.name.text, "i32");
    }

    #[test]
    fn test_unterminated_class_fails() {
        assert!(parse_source("main", "class C {").is_err());
    }
}
