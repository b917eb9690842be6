//! Identifier conventions: the fixed delimiters and prefixes used to build
//! internal names, and the helpers that apply them.
//!
//! Downstream code depends on these strings bit-exactly; changing any of
//! them invalidates every internal name in a program.

/// Separates a source file's internal path from a simple name.
pub const PATH_DELIMITER: &str = "/";
/// Separates a class or namespace internal name from a static member name.
pub const STATIC_DELIMITER: &str = ".";
/// Separates a class internal name from an instance member name.
pub const INSTANCE_DELIMITER: &str = "#";
/// Prefix applied to the simple name of a getter.
pub const GETTER_PREFIX: &str = "get:";
/// Prefix applied to the simple name of a setter.
pub const SETTER_PREFIX: &str = "set:";

/// Internal name of a program-level declaration: `<path>/<name>`.
pub fn program_level(path: &str, name: &str) -> String {
    let mut s = String::with_capacity(path.len() + PATH_DELIMITER.len() + name.len());
    s.push_str(path);
    s.push_str(PATH_DELIMITER);
    s.push_str(name);
    s
}

/// Internal name of a static member (or namespace member): `<parent>.<name>`.
pub fn static_member(parent: &str, name: &str) -> String {
    let mut s = String::with_capacity(parent.len() + STATIC_DELIMITER.len() + name.len());
    s.push_str(parent);
    s.push_str(STATIC_DELIMITER);
    s.push_str(name);
    s
}

/// Internal name of an instance member: `<class>#<name>`.
pub fn instance_member(class: &str, name: &str) -> String {
    let mut s = String::with_capacity(class.len() + INSTANCE_DELIMITER.len() + name.len());
    s.push_str(class);
    s.push_str(INSTANCE_DELIMITER);
    s.push_str(name);
    s
}

/// Simple name of a getter: `get:<name>`.
pub fn getter(name: &str) -> String {
    format!("{GETTER_PREFIX}{name}")
}

/// Simple name of a setter: `set:<name>`.
pub fn setter(name: &str) -> String {
    format!("{SETTER_PREFIX}{name}")
}

/// Resolves an import specifier against the internal path of the importing
/// file, yielding the imported module's internal path.
///
/// Relative specifiers (`./`, `../`) resolve against the importer's
/// directory; anything else names a top-level module as written. A `.ts`
/// extension is stripped in either case.
pub fn resolve_internal_path(importer: &str, specifier: &str) -> String {
    let specifier = specifier.strip_suffix(".ts").unwrap_or(specifier);
    if !specifier.starts_with("./") && !specifier.starts_with("../") {
        return specifier.to_string();
    }
    let mut parts: Vec<&str> = importer.split('/').collect();
    parts.pop(); // the importer's own file name
    for segment in specifier.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_names() {
        assert_eq!(program_level("std/math", "PI"), "std/math/PI");
        assert_eq!(static_member("main/C", "create"), "main/C.create");
        assert_eq!(instance_member("main/C", "value"), "main/C#value");
        assert_eq!(getter("value"), "get:value");
        assert_eq!(setter("value"), "set:value");
        assert_eq!(
            static_member("main/C", &getter("value")),
            "main/C.get:value"
        );
    }

    #[test]
    fn test_resolve_internal_path() {
        assert_eq!(resolve_internal_path("main", "./other"), "other");
        assert_eq!(resolve_internal_path("main", "./other.ts"), "other");
        assert_eq!(resolve_internal_path("a/b/c", "./d"), "a/b/d");
        assert_eq!(resolve_internal_path("a/b/c", "../d"), "a/d");
        assert_eq!(resolve_internal_path("a/b/c", "../../d/e"), "d/e");
        assert_eq!(resolve_internal_path("a/b", "lib/util"), "lib/util");
    }
}
