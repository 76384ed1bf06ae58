// ABOUTME: Top-level compilation pipeline wiring scan -> parse -> decorate -> check

use crate::ast::{Ast, NodeId};
use crate::checker::{ArithmeticSemantics, DefaultArithmetic, SemanticChecker};
use crate::datum::SyntaxObject;
use crate::datum_parser::DatumParser;
use crate::decorator::Decorator;
use crate::diagnostics::DiagnosticSink;
use crate::form_parser::FormParser;
use crate::options::CompileOptions;
use crate::reader::SourceReader;
use crate::scanner::{Scanner, TokenStream};

/// The persistent storage a `TopLevel`/`StaticTopLevel` write ultimately
/// targets (spec §6). Out of scope here beyond the shape of the interface:
/// this core never executes anything, so the default implementation is an
/// in-memory stand-in a hosting runtime is expected to replace.
pub trait TopLevelEnvironment {
    fn declare(&mut self, name: &str);
    fn is_declared(&self, name: &str) -> bool;
}

#[derive(Debug, Default)]
pub struct InMemoryTopLevel {
    names: std::collections::HashSet<String>,
}

impl TopLevelEnvironment for InMemoryTopLevel {
    fn declare(&mut self, name: &str) {
        self.names.insert(name.to_string());
    }

    fn is_declared(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}

/// The code-generation collaborator named in spec §6. This crate never
/// lowers past the decorated/checked AST, so the trait exists only to mark
/// where a hosting backend plugs in.
pub trait CodegenBackend {
    fn lower(&mut self, ast: &Ast, program: &[NodeId]);
}

/// The full output of one compilation: the decorated/checked AST, the
/// ordered program (top-level node ids), the options in effect after any
/// `.options` forms ran, and the diagnostics collected across every phase.
pub struct CompilationResult {
    pub ast: Ast,
    pub program: Vec<NodeId>,
    pub options: CompileOptions,
    pub diagnostics: DiagnosticSink,
}

impl CompilationResult {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }
}

/// Drives one source unit through every phase in order (spec §4 overview):
/// scan, parse data, parse forms, decorate scope, check semantics.
pub struct Compilation {
    options: CompileOptions,
    arithmetic: Box<dyn ArithmeticSemantics>,
}

impl Compilation {
    pub fn new(options: CompileOptions) -> Self {
        Compilation { options, arithmetic: Box::new(DefaultArithmetic) }
    }

    pub fn with_arithmetic(options: CompileOptions, arithmetic: Box<dyn ArithmeticSemantics>) -> Self {
        Compilation { options, arithmetic }
    }

    pub fn compile_source(&self, source: &str, source_name: &str) -> CompilationResult {
        let mut diagnostics = DiagnosticSink::new();
        let reader = SourceReader::single(source_name, source);
        let scanner = Scanner::new(reader);
        let mut stream = TokenStream::new(scanner);

        let datum_parser = DatumParser::new(true);
        let mut data: Vec<SyntaxObject> = Vec::new();
        while let Some(syn) = datum_parser.parse_top_level(&mut stream, &mut diagnostics) {
            data.push(syn);
        }

        let mut ast = Ast::new();
        let mut options = self.options;
        let program = {
            let mut form_parser = FormParser::new(&mut ast);
            form_parser.parse_program(&data, &mut diagnostics, &mut options)
        };

        let mut decorator = Decorator::new(options);
        decorator.decorate(&mut ast, &program, &mut diagnostics);

        let checker = SemanticChecker::new(&options, self.arithmetic.as_ref());
        checker.check(&mut ast, &program, &mut diagnostics);

        CompilationResult { ast, program, options, diagnostics }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_trivial_top_level_define() {
        let compilation = Compilation::new(CompileOptions::default());
        let result = compilation.compile_source("(define-values (answer) 42)", "<test>");
        assert!(!result.has_errors());
        assert_eq!(result.program.len(), 1);
    }

    #[test]
    fn reports_unassigned_variable_use() {
        let compilation = Compilation::new(CompileOptions::default());
        let result = compilation.compile_source("(if unbound-var #t #f)", "<test>");
        assert!(result.diagnostics.iter().any(|d| d.code == crate::diagnostics::DiagnosticCode::UnassignedVariableUsed));
    }
}
