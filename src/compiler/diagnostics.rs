//! Diagnostic codes, message templates and the diagnostic record emitted by
//! the binder and resolver.

use std::rc::Rc;

use crate::compiler::text::Range;

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticCategory {
    Error,
    Warning,
    Suggestion,
    Message,
}

/// The diagnostic codes the binder and resolver can emit. Numeric values are
/// TypeScript-compatible where a TypeScript equivalent exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum DiagnosticCode {
    OperationNotSupported = 100,
    DuplicateIdentifier = 2300,
    CannotFindName = 2304,
    ModuleHasNoExportedMember = 2305,
    ExportDeclarationConflicts = 2323,
    ThisCannotBeReferenced = 2332,
    PropertyDoesNotExistOnType = 2339,
    ExpectedTypeArguments = 2558,
}

impl DiagnosticCode {
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// The message template, with `{0}`/`{1}` substitution slots.
    pub const fn template(self) -> &'static str {
        match self {
            DiagnosticCode::OperationNotSupported => "Operation not supported.",
            DiagnosticCode::DuplicateIdentifier => "Duplicate identifier '{0}'.",
            DiagnosticCode::CannotFindName => "Cannot find name '{0}'.",
            DiagnosticCode::ModuleHasNoExportedMember => {
                "Module '{0}' has no exported member '{1}'."
            }
            DiagnosticCode::ExportDeclarationConflicts => {
                "Export declaration conflicts with exported declaration of '{0}'."
            }
            DiagnosticCode::ThisCannotBeReferenced => {
                "'this' cannot be referenced in current location."
            }
            DiagnosticCode::PropertyDoesNotExistOnType => {
                "Property '{0}' does not exist on type '{1}'."
            }
            DiagnosticCode::ExpectedTypeArguments => {
                "Expected {0} type arguments, but got {1}."
            }
        }
    }
}

/// Substitutes `{0}`, `{1}`, ... in a message template.
pub fn format_message(template: &str, args: &[&str]) -> String {
    let mut result = template.to_string();
    for (i, arg) in args.iter().enumerate() {
        result = result.replace(&format!("{{{i}}}"), arg);
    }
    result
}

/// A reported diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub category: DiagnosticCategory,
    pub code: DiagnosticCode,
    /// Internal path of the file the diagnostic points into.
    pub file: Rc<str>,
    pub start: u32,
    pub end: u32,
    pub message: String,
}

impl Diagnostic {
    pub fn error(code: DiagnosticCode, range: &Range, args: &[&str]) -> Self {
        Diagnostic {
            category: DiagnosticCategory::Error,
            code,
            file: range.file.clone(),
            start: range.start,
            end: range.end,
            message: format_message(code.template(), args),
        }
    }

    pub fn is_error(&self) -> bool {
        self.category == DiagnosticCategory::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_message() {
        assert_eq!(
            format_message(DiagnosticCode::ModuleHasNoExportedMember.template(), &["m", "g"]),
            "Module 'm' has no exported member 'g'."
        );
        assert_eq!(
            format_message(DiagnosticCode::DuplicateIdentifier.template(), &["f"]),
            "Duplicate identifier 'f'."
        );
    }
}
