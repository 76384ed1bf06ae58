// ABOUTME: Semantic checker: tail-position marking and optimistic arithmetic inlining

use crate::ast::{Ast, NodeId, NodeKind};
use crate::diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink};
use crate::options::CompileOptions;
use crate::types::TypeDescriptor;

/// The inlined-arithmetic collaborator named in spec §6: checks a builtin
/// call's arity and reports the `ValueType` it produces. A full numeric
/// tower lives outside this core; this crate only needs the check shape to
/// decide whether a `Call` is eligible for optimistic inlining.
pub trait ArithmeticSemantics {
    fn check_call(&self, operator: &str, arity: usize) -> Option<TypeDescriptor>;
}

/// The five builtins the checker recognizes for optimistic inlining
/// (spec §4.H). `modulo` takes exactly two operands; the rest are variadic
/// over at least one.
pub struct DefaultArithmetic;

impl ArithmeticSemantics for DefaultArithmetic {
    fn check_call(&self, operator: &str, arity: usize) -> Option<TypeDescriptor> {
        match operator {
            "+" | "*" if arity >= 1 => Some(TypeDescriptor::Complex),
            "-" | "/" if arity >= 1 => Some(TypeDescriptor::Complex),
            "modulo" if arity == 2 => Some(TypeDescriptor::Integer),
            "+" | "-" | "*" | "/" | "modulo" => None,
            _ => None,
        }
    }
}

fn is_known_arithmetic_name(name: &str) -> bool {
    matches!(name, "+" | "-" | "*" | "/" | "modulo")
}

/// Walks a decorated `Ast` marking tail positions and, when optimistic
/// inlining is on, propagating arithmetic builtin types into `Call` nodes.
pub struct SemanticChecker<'a> {
    options: &'a CompileOptions,
    arithmetic: &'a dyn ArithmeticSemantics,
}

impl<'a> SemanticChecker<'a> {
    pub fn new(options: &'a CompileOptions, arithmetic: &'a dyn ArithmeticSemantics) -> Self {
        SemanticChecker { options, arithmetic }
    }

    pub fn check(&self, ast: &mut Ast, program: &[NodeId], diagnostics: &mut DiagnosticSink) {
        for &node in program {
            self.mark_tail(ast, node, true);
        }
        for &node in program {
            self.check_node(ast, node, diagnostics);
        }
    }

    /// `If`'s branches and a `Block`'s last child inherit tail position from
    /// their parent; every other child is non-tail (spec §4.H).
    fn mark_tail(&self, ast: &mut Ast, node_id: NodeId, is_tail: bool) {
        ast.get_mut(node_id).is_tail = is_tail;
        match &ast.get(node_id).kind {
            NodeKind::Literal(_) | NodeKind::Variable { .. } | NodeKind::Void => {}
            NodeKind::If { cond, then, els } => {
                let (cond, then, els) = (*cond, *then, *els);
                self.mark_tail(ast, cond, false);
                self.mark_tail(ast, then, is_tail);
                if let Some(e) = els {
                    self.mark_tail(ast, e, is_tail);
                }
            }
            NodeKind::Block(items) => {
                let items = items.clone();
                if let Some((last, rest)) = items.split_last() {
                    for &r in rest {
                        self.mark_tail(ast, r, false);
                    }
                    self.mark_tail(ast, *last, is_tail);
                }
            }
            NodeKind::Call { function, arguments } => {
                let (function, arguments) = (*function, arguments.clone());
                self.mark_tail(ast, function, false);
                for a in arguments {
                    self.mark_tail(ast, a, false);
                }
            }
            NodeKind::Assign { lhs, rhs } | NodeKind::Define { lhs, rhs } => {
                let (lhs, rhs) = (*lhs, *rhs);
                self.mark_tail(ast, lhs, false);
                self.mark_tail(ast, rhs, false);
            }
            NodeKind::DefineValues { variables, rhs } => {
                let (variables, rhs) = (variables.clone(), *rhs);
                for v in variables {
                    self.mark_tail(ast, v, false);
                }
                self.mark_tail(ast, rhs, false);
            }
            NodeKind::LetValues { bindings, body } | NodeKind::LetrecValues { bindings, body } => {
                let (bindings, body) = (bindings.clone(), *body);
                for b in &bindings {
                    for &v in &b.variables {
                        self.mark_tail(ast, v, false);
                    }
                    self.mark_tail(ast, b.rhs, false);
                }
                self.mark_tail(ast, body, is_tail);
            }
            NodeKind::Function(f) => {
                let defaults: Vec<NodeId> = f.parameters.iter().filter_map(|p| p.default).collect();
                let body = f.body;
                for d in defaults {
                    self.mark_tail(ast, d, false);
                }
                self.mark_tail(ast, body, true);
            }
            NodeKind::List { items, dot_item } => {
                let (items, dot_item) = (items.clone(), *dot_item);
                for i in items {
                    self.mark_tail(ast, i, false);
                }
                if let Some(d) = dot_item {
                    self.mark_tail(ast, d, false);
                }
            }
            NodeKind::Vector(items) => {
                let items = items.clone();
                for i in items {
                    self.mark_tail(ast, i, false);
                }
            }
        }
    }

    fn check_node(&self, ast: &mut Ast, node_id: NodeId, diagnostics: &mut DiagnosticSink) {
        for child in ast.children(node_id) {
            self.check_node(ast, child, diagnostics);
        }
        let call = match &ast.get(node_id).kind {
            NodeKind::Call { function, arguments } => Some((*function, arguments.len())),
            _ => None,
        };
        let Some((function, arity)) = call else {
            return;
        };
        if !self.options.optimistic_inlining {
            return;
        }
        let operator = match &ast.get(function).kind {
            NodeKind::Variable { name, .. } => name.name(),
            _ => return,
        };
        if !is_known_arithmetic_name(&operator) {
            return;
        }
        match self.arithmetic.check_call(&operator, arity) {
            Some(result_type) => {
                let node = ast.get_mut(node_id);
                node.value_type = Some(result_type);
            }
            None => {
                let span = ast.get(node_id).span.clone();
                diagnostics.push(Diagnostic::error(
                    DiagnosticCode::ExpectedSyntax,
                    format!("'{operator}' called with an invalid number of arguments ({arity})"),
                    span,
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Ast;
    use crate::datum::Datum;
    use crate::decorator::Decorator;
    use crate::diagnostics::DiagnosticSink;
    use crate::form_parser::FormParser;
    use crate::span::Span;

    fn span() -> Span {
        Span::synthetic("t")
    }

    #[test]
    fn if_branches_inherit_tail_but_condition_does_not() {
        let form = Datum::list(vec![Datum::symbol("if"), Datum::Bool(true), Datum::Bool(true), Datum::Bool(false)]);
        let (mut ast, program, _diagnostics) = build_simple(vec![form], CompileOptions::default());
        let checker = SemanticChecker::new(&CompileOptions::default(), &DefaultArithmetic);
        checker.check(&mut ast, &program, &mut DiagnosticSink::new());
        match &ast.get(program[0]).kind {
            NodeKind::If { cond, then, els } => {
                assert!(!ast.get(*cond).is_tail);
                assert!(ast.get(*then).is_tail);
                assert!(ast.get(els.unwrap()).is_tail);
            }
            other => panic!("expected If, got {other:?}"),
        }
    }

    #[test]
    fn block_only_marks_last_child_tail() {
        let form = Datum::list(vec![Datum::symbol("begin"), Datum::Bool(true), Datum::Bool(false), Datum::Bool(true)]);
        let (mut ast, program, _diagnostics) = build_simple(vec![form], CompileOptions::default());
        let checker = SemanticChecker::new(&CompileOptions::default(), &DefaultArithmetic);
        checker.check(&mut ast, &program, &mut DiagnosticSink::new());
        match &ast.get(program[0]).kind {
            NodeKind::Block(items) => {
                assert!(!ast.get(items[0]).is_tail);
                assert!(!ast.get(items[1]).is_tail);
                assert!(ast.get(items[2]).is_tail);
            }
            other => panic!("expected Block, got {other:?}"),
        }
    }

    #[test]
    fn arithmetic_call_gets_type_when_inlining_enabled() {
        let mut options = CompileOptions::default();
        options.optimistic_inlining = true;
        let form = Datum::list(vec![Datum::symbol("%apply"), Datum::symbol("+"), Datum::Bool(true), Datum::Bool(true)]);
        let (mut ast, program, _diagnostics) = build_simple(vec![form], options);
        let checker = SemanticChecker::new(&options, &DefaultArithmetic);
        let mut diagnostics = DiagnosticSink::new();
        checker.check(&mut ast, &program, &mut diagnostics);
        assert!(diagnostics.is_empty());
        assert_eq!(ast.get(program[0]).value_type, Some(TypeDescriptor::Complex));
    }

    #[test]
    fn modulo_with_wrong_arity_reports_diagnostic() {
        let mut options = CompileOptions::default();
        options.optimistic_inlining = true;
        let form = Datum::list(vec![Datum::symbol("%apply"), Datum::symbol("modulo"), Datum::Bool(true)]);
        let (mut ast, program, _diagnostics) = build_simple(vec![form], options);
        let checker = SemanticChecker::new(&options, &DefaultArithmetic);
        let mut diagnostics = DiagnosticSink::new();
        checker.check(&mut ast, &program, &mut diagnostics);
        assert!(!diagnostics.is_empty());
    }

    #[test]
    fn arithmetic_skipped_when_inlining_disabled() {
        let options = CompileOptions::default();
        let form = Datum::list(vec![Datum::symbol("%apply"), Datum::symbol("+"), Datum::Bool(true)]);
        let (mut ast, program, _diagnostics) = build_simple(vec![form], options);
        let checker = SemanticChecker::new(&options, &DefaultArithmetic);
        let mut diagnostics = DiagnosticSink::new();
        checker.check(&mut ast, &program, &mut diagnostics);
        assert!(diagnostics.is_empty());
        assert_eq!(ast.get(program[0]).value_type, None);
    }

    fn build_simple(data: Vec<Datum>, options: CompileOptions) -> (Ast, Vec<NodeId>, DiagnosticSink) {
        let mut ast = Ast::new();
        let mut diagnostics = DiagnosticSink::new();
        let mut opts = options;
        let program = {
            let mut parser = FormParser::new(&mut ast);
            data.into_iter().map(|d| parser.parse_expr(&d, &span(), &mut diagnostics, &mut opts)).collect::<Vec<_>>()
        };
        let mut decorator = Decorator::new(opts);
        decorator.decorate(&mut ast, &program, &mut diagnostics);
        (ast, program, diagnostics)
    }
}
