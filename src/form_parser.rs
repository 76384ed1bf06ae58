// ABOUTME: Datum tree -> AST; recognizes the special forms in the core syntax

use crate::ast::{Ast, FunctionData, NodeKind, NodeId, Parameter, ParameterKind, ValuesBinding};
use crate::datum::{Datum, Symbol, SyntaxObject};
use crate::diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink};
use crate::options::CompileOptions;
use crate::span::Span;
use crate::types::{self, TypeDescriptor};
use std::collections::HashSet;

fn symbol_name(datum: &Datum) -> Option<String> {
    match datum {
        Datum::Symbol(s) => Some(s.name()),
        _ => None,
    }
}

/// Recognizes a `(.type T)` tag: a two-element list headed by the `.type`
/// symbol. Used both as the optional return-type prefix in `#%lambda` and
/// inside a formal-id's optional type annotation.
fn as_type_tag(datum: &Datum) -> Option<&Datum> {
    if let Datum::Pair(..) = datum {
        let (items, tail) = datum.iter_list();
        if tail.is_null() && items.len() == 2 && symbol_name(items[0]).as_deref() == Some(".type") {
            return Some(items[1]);
        }
    }
    None
}

/// Builds an `Ast` out of a stream of top-level data. Unrecognized or
/// malformed forms degrade to a `Literal(Null)` placeholder plus a
/// diagnostic rather than aborting the whole parse (spec §7).
pub struct FormParser<'a> {
    ast: &'a mut Ast,
}

impl<'a> FormParser<'a> {
    pub fn new(ast: &'a mut Ast) -> Self {
        FormParser { ast }
    }

    pub fn parse_program(&mut self, data: &[SyntaxObject], diagnostics: &mut DiagnosticSink, options: &mut CompileOptions) -> Vec<NodeId> {
        data.iter().map(|syn| self.parse_expr(&syn.datum, &syn.span, diagnostics, options)).collect()
    }

    fn placeholder(&mut self, span: &Span) -> NodeId {
        self.ast.push(NodeKind::Literal(Datum::Null), span.clone())
    }

    fn expected(&mut self, message: &str, span: &Span, diagnostics: &mut DiagnosticSink) -> NodeId {
        diagnostics.push(Diagnostic::error(DiagnosticCode::ExpectedSyntax, message, span.clone()));
        self.placeholder(span)
    }

    pub fn parse_expr(&mut self, datum: &Datum, span: &Span, diagnostics: &mut DiagnosticSink, options: &mut CompileOptions) -> NodeId {
        match datum {
            Datum::Symbol(s) => self.ast.push(NodeKind::Variable { name: *s, slot: None, is_read_only: false }, span.clone()),
            Datum::Pair(..) => self.parse_pair_form(datum, span, diagnostics, options),
            other => self.ast.push(NodeKind::Literal(other.clone()), span.clone()),
        }
    }

    fn parse_pair_form(&mut self, datum: &Datum, span: &Span, diagnostics: &mut DiagnosticSink, options: &mut CompileOptions) -> NodeId {
        let (items, _tail) = datum.iter_list();
        if items.is_empty() {
            return self.expected("empty form has no head", span, diagnostics);
        }
        match symbol_name(items[0]).as_deref() {
            Some("quote") => self.parse_quote(&items, span, diagnostics),
            Some("if") => self.parse_if(&items, span, diagnostics, options),
            Some("begin") => self.parse_begin(&items, span, diagnostics, options),
            Some("set!") => self.parse_set(&items, span, diagnostics, options),
            Some("define-values") => self.parse_define_values(&items, span, diagnostics, options),
            Some("let-values") => self.parse_let_values(&items, span, diagnostics, options, false),
            Some("letrec-values") => self.parse_let_values(&items, span, diagnostics, options, true),
            Some("#%lambda") => self.parse_lambda(&items, span, diagnostics, options),
            Some("%apply") => self.parse_apply(&items, span, diagnostics, options),
            Some(".options") => self.parse_options_form(&items, span, diagnostics, options),
            _ => self.expected("unrecognized special form", span, diagnostics),
        }
    }

    fn parse_quote(&mut self, items: &[&Datum], span: &Span, diagnostics: &mut DiagnosticSink) -> NodeId {
        if items.len() != 2 {
            return self.expected("quote expects exactly one datum", span, diagnostics);
        }
        let quoted = items[1].clone();
        self.ast.push(NodeKind::Literal(quoted), span.clone())
    }

    fn parse_if(&mut self, items: &[&Datum], span: &Span, diagnostics: &mut DiagnosticSink, options: &mut CompileOptions) -> NodeId {
        if items.len() != 3 && items.len() != 4 {
            return self.expected("if expects (if cond then [else])", span, diagnostics);
        }
        let cond = self.parse_expr(items[1], span, diagnostics, options);
        let then = self.parse_expr(items[2], span, diagnostics, options);
        let els = if items.len() == 4 { Some(self.parse_expr(items[3], span, diagnostics, options)) } else { None };
        self.ast.push(NodeKind::If { cond, then, els }, span.clone())
    }

    fn parse_body(&mut self, body: &[&Datum], span: &Span, diagnostics: &mut DiagnosticSink, options: &mut CompileOptions) -> NodeId {
        if body.is_empty() {
            return self.ast.push(NodeKind::Void, span.clone());
        }
        if body.len() == 1 {
            return self.parse_expr(body[0], span, diagnostics, options);
        }
        let children: Vec<NodeId> = body.iter().map(|d| self.parse_expr(d, span, diagnostics, options)).collect();
        self.ast.push(NodeKind::Block(children), span.clone())
    }

    fn parse_begin(&mut self, items: &[&Datum], span: &Span, diagnostics: &mut DiagnosticSink, options: &mut CompileOptions) -> NodeId {
        self.parse_body(&items[1..], span, diagnostics, options)
    }

    fn parse_set(&mut self, items: &[&Datum], span: &Span, diagnostics: &mut DiagnosticSink, options: &mut CompileOptions) -> NodeId {
        if items.len() != 3 {
            return self.expected("set! expects (set! name expr)", span, diagnostics);
        }
        let name = match items[1] {
            Datum::Symbol(s) => *s,
            _ => {
                diagnostics.push(Diagnostic::error(DiagnosticCode::ExpectedSyntax, "set! target must be a symbol", span.clone()));
                Symbol::intern("?")
            }
        };
        let lhs = self.ast.push(NodeKind::Variable { name, slot: None, is_read_only: false }, span.clone());
        let rhs = self.parse_expr(items[2], span, diagnostics, options);
        self.ast.push(NodeKind::Assign { lhs, rhs }, span.clone())
    }

    fn parse_variable_list(&mut self, list: &Datum, span: &Span, diagnostics: &mut DiagnosticSink) -> Vec<NodeId> {
        let (names, tail) = list.iter_list();
        if !tail.is_null() {
            diagnostics.push(Diagnostic::error(DiagnosticCode::ExpectedSyntax, "variable list must be a proper list", span.clone()));
        }
        names
            .iter()
            .map(|d| match d {
                Datum::Symbol(s) => self.ast.push(NodeKind::Variable { name: *s, slot: None, is_read_only: false }, span.clone()),
                _ => {
                    diagnostics.push(Diagnostic::error(DiagnosticCode::ExpectedSyntax, "expected a variable name", span.clone()));
                    self.placeholder(span)
                }
            })
            .collect()
    }

    /// `(define-values (n...) expr)`. A single bound name collapses to the
    /// leaner `Define` node (spec §3's "specialization of Assign at the top
    /// level"); more than one name produces `DefineValues`.
    fn parse_define_values(&mut self, items: &[&Datum], span: &Span, diagnostics: &mut DiagnosticSink, options: &mut CompileOptions) -> NodeId {
        if items.len() != 3 {
            return self.expected("define-values expects (define-values (names...) expr)", span, diagnostics);
        }
        let variables = self.parse_variable_list(items[1], span, diagnostics);
        let rhs = self.parse_expr(items[2], span, diagnostics, options);
        if variables.len() == 1 {
            self.ast.push(NodeKind::Define { lhs: variables[0], rhs }, span.clone())
        } else {
            self.ast.push(NodeKind::DefineValues { variables, rhs }, span.clone())
        }
    }

    fn resolve_type_name(&mut self, datum: &Datum, span: &Span, diagnostics: &mut DiagnosticSink) -> Option<TypeDescriptor> {
        match symbol_name(datum) {
            Some(name) => match types::lookup(&name) {
                Some(t) => Some(t),
                None => {
                    diagnostics.push(Diagnostic::error(DiagnosticCode::UnknownTypeName, format!("unknown type name '{name}'"), span.clone()));
                    None
                }
            },
            None => {
                diagnostics.push(Diagnostic::error(DiagnosticCode::ExpectedSyntax, "expected a type name", span.clone()));
                None
            }
        }
    }

    /// An id in a `let-values`/`letrec-values` clause: a bare symbol, or the
    /// literal three-element form `(.type TYPE name)`.
    fn parse_values_id(&mut self, id: &Datum, span: &Span, diagnostics: &mut DiagnosticSink) -> NodeId {
        match id {
            Datum::Symbol(s) => self.ast.push(NodeKind::Variable { name: *s, slot: None, is_read_only: false }, span.clone()),
            Datum::Pair(..) => {
                let (items, tail) = id.iter_list();
                if tail.is_null() && items.len() == 3 && symbol_name(items[0]).as_deref() == Some(".type") {
                    let ty = self.resolve_type_name(items[1], span, diagnostics);
                    match items[2] {
                        Datum::Symbol(s) => {
                            let node = self.ast.push(NodeKind::Variable { name: *s, slot: None, is_read_only: false }, span.clone());
                            if let Some(t) = ty {
                                self.ast.get_mut(node).value_type = Some(t);
                            }
                            node
                        }
                        _ => self.expected("expected a variable name after the type", span, diagnostics),
                    }
                } else {
                    self.expected("expected a symbol or (.type TYPE name)", span, diagnostics)
                }
            }
            _ => self.expected("expected a symbol or (.type TYPE name)", span, diagnostics),
        }
    }

    /// `(kw ((ids init) ...) body...)`, shared by `let-values` and
    /// `letrec-values`. Each clause's `ids` is itself a list since one
    /// initializer may produce several values.
    fn parse_let_values(&mut self, items: &[&Datum], span: &Span, diagnostics: &mut DiagnosticSink, options: &mut CompileOptions, is_letrec: bool) -> NodeId {
        if items.len() < 2 {
            return self.expected("let-values expects (let-values (clauses...) body...)", span, diagnostics);
        }
        let (clause_data, _) = items[1].iter_list();
        let mut bindings = Vec::with_capacity(clause_data.len());
        for clause in clause_data {
            let (clause_items, tail) = clause.iter_list();
            if !tail.is_null() || clause_items.len() != 2 {
                diagnostics.push(Diagnostic::error(DiagnosticCode::ExpectedSyntax, "malformed let-values clause, expected (ids init)", span.clone()));
                continue;
            }
            let (id_data, id_tail) = clause_items[0].iter_list();
            if !id_tail.is_null() {
                diagnostics.push(Diagnostic::error(DiagnosticCode::ExpectedSyntax, "let-values ids must be a proper list", span.clone()));
            }
            let variables: Vec<NodeId> = id_data.iter().map(|d| self.parse_values_id(d, span, diagnostics)).collect();
            let rhs = self.parse_expr(clause_items[1], span, diagnostics, options);
            bindings.push(ValuesBinding { variables, rhs });
        }
        let body = self.parse_body(&items[2..], span, diagnostics, options);
        let kind = if is_letrec { NodeKind::LetrecValues { bindings, body } } else { NodeKind::LetValues { bindings, body } };
        self.ast.push(kind, span.clone())
    }

    /// A single formal: a bare symbol, `(name default?)`, or
    /// `((.type T) name default?)`.
    fn parse_formal_id(&mut self, datum: &Datum, index: u32, kind: ParameterKind, span: &Span, diagnostics: &mut DiagnosticSink, options: &mut CompileOptions) -> Parameter {
        match datum {
            Datum::Symbol(name) => Parameter { name: *name, type_annotation: None, kind, default: None, index },
            Datum::Pair(..) => {
                let (items, _) = datum.iter_list();
                if items.is_empty() {
                    diagnostics.push(Diagnostic::error(DiagnosticCode::ExpectedSyntax, "empty formal", span.clone()));
                    return Parameter { name: Symbol::intern("?"), type_annotation: None, kind, default: None, index };
                }
                let mut i = 0usize;
                let type_annotation = if let Some(t) = as_type_tag(items[0]) {
                    i = 1;
                    self.resolve_type_name(t, span, diagnostics)
                } else {
                    None
                };
                let name = match items.get(i) {
                    Some(Datum::Symbol(s)) => *s,
                    _ => {
                        diagnostics.push(Diagnostic::error(DiagnosticCode::ExpectedSyntax, "expected a parameter name", span.clone()));
                        Symbol::intern("?")
                    }
                };
                let default = items.get(i + 1).map(|d| self.parse_expr(d, span, diagnostics, options));
                Parameter { name, type_annotation, kind, default, index }
            }
            _ => {
                diagnostics.push(Diagnostic::error(DiagnosticCode::ExpectedSyntax, "malformed formal", span.clone()));
                Parameter { name: Symbol::intern("?"), type_annotation: None, kind, default: None, index }
            }
        }
    }

    /// Formals in one of three shapes: a bare rest symbol, a proper list, or
    /// a dotted list whose tail is the rest parameter.
    fn parse_formals(&mut self, formals: &Datum, span: &Span, diagnostics: &mut DiagnosticSink, options: &mut CompileOptions) -> Vec<Parameter> {
        let mut params = Vec::new();
        let mut seen = HashSet::new();
        let mut note_duplicate = |name: Symbol, diagnostics: &mut DiagnosticSink, seen: &mut HashSet<Symbol>, span: &Span| {
            if !seen.insert(name) {
                diagnostics.push(Diagnostic::error(DiagnosticCode::ParameterRedefined, format!("parameter '{name}' redefined"), span.clone()));
            }
        };
        match formals {
            Datum::Symbol(name) => {
                params.push(Parameter { name: *name, type_annotation: None, kind: ParameterKind::List, default: None, index: 0 });
            }
            Datum::Null => {}
            Datum::Pair(..) => {
                let (items, tail) = formals.iter_list();
                for (i, item) in items.iter().enumerate() {
                    let p = self.parse_formal_id(item, i as u32, ParameterKind::Normal, span, diagnostics, options);
                    note_duplicate(p.name, diagnostics, &mut seen, span);
                    params.push(p);
                }
                if !tail.is_null() {
                    let rest_index = params.len() as u32;
                    let p = self.parse_formal_id(tail, rest_index, ParameterKind::List, span, diagnostics, options);
                    note_duplicate(p.name, diagnostics, &mut seen, span);
                    params.push(p);
                }
            }
            _ => diagnostics.push(Diagnostic::error(DiagnosticCode::ExpectedSyntax, "malformed formals", span.clone())),
        }
        params
    }

    /// `(#%lambda (.type T)? formals body...)`.
    fn parse_lambda(&mut self, items: &[&Datum], span: &Span, diagnostics: &mut DiagnosticSink, options: &mut CompileOptions) -> NodeId {
        if items.len() < 3 {
            return self.expected("#%lambda expects (#%lambda formals body...)", span, diagnostics);
        }
        let mut idx = 1usize;
        let return_type = if let Some(t) = as_type_tag(items[idx]) {
            idx += 1;
            self.resolve_type_name(t, span, diagnostics)
        } else {
            None
        };
        if idx >= items.len() {
            return self.expected("#%lambda is missing its formals", span, diagnostics);
        }
        let parameters = self.parse_formals(items[idx], span, diagnostics, options);
        idx += 1;
        let body = self.parse_body(&items[idx..], span, diagnostics, options);
        self.ast.push(
            NodeKind::Function(FunctionData {
                return_type,
                parameters,
                body,
                closures: Vec::new(),
                max_closure_reference_depth: 0,
                creates_closure: false,
            }),
            span.clone(),
        )
    }

    /// `(%apply f arg...)` — this dialect's only call form.
    fn parse_apply(&mut self, items: &[&Datum], span: &Span, diagnostics: &mut DiagnosticSink, options: &mut CompileOptions) -> NodeId {
        if items.len() < 2 {
            return self.expected("%apply expects (%apply function args...)", span, diagnostics);
        }
        let function = self.parse_expr(items[1], span, diagnostics, options);
        let arguments: Vec<NodeId> = items[2..].iter().map(|d| self.parse_expr(d, span, diagnostics, options)).collect();
        self.ast.push(NodeKind::Call { function, arguments }, span.clone())
    }

    /// `(.options ((name value) ...) body...)`: a top-level pseudo-form that
    /// flips `CompileOptions` flags and otherwise behaves like `begin`.
    fn parse_options_form(&mut self, items: &[&Datum], span: &Span, diagnostics: &mut DiagnosticSink, options: &mut CompileOptions) -> NodeId {
        if items.len() < 2 {
            return self.expected(".options expects (.options ((name value)...) body...)", span, diagnostics);
        }
        let (entries, _) = items[1].iter_list();
        for entry in entries {
            let (pair, tail) = entry.iter_list();
            if !tail.is_null() || pair.len() != 2 {
                diagnostics.push(Diagnostic::error(DiagnosticCode::ExpectedSyntax, "malformed .options entry", span.clone()));
                continue;
            }
            let name = symbol_name(pair[0]);
            let value = match pair[1] {
                Datum::Bool(b) => Some(*b),
                _ => None,
            };
            match (name.as_deref(), value) {
                (Some("checked"), Some(v)) => options.checked = v,
                (Some("debug"), Some(v)) => options.debug = v,
                (Some("optimize"), Some(v)) => options.optimize = v,
                (Some("allowRedefinition"), Some(v)) => options.allow_redefinition = v,
                (Some("optimisticInlining"), Some(v)) => options.optimistic_inlining = v,
                (Some("promoteOnOverflow"), Some(v)) => options.promote_on_overflow = v,
                _ => diagnostics.push(Diagnostic::error(DiagnosticCode::ExpectedSyntax, "unrecognized .options entry", span.clone())),
            }
        }
        self.parse_body(&items[2..], span, diagnostics, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::number::Number;
    use crate::span::Span;

    fn span() -> Span {
        Span::synthetic("t")
    }

    fn parse_one(datum: Datum) -> (Ast, NodeId, DiagnosticSink, CompileOptions) {
        let mut ast = Ast::new();
        let mut sink = DiagnosticSink::new();
        let mut options = CompileOptions::default();
        let id = {
            let mut parser = FormParser::new(&mut ast);
            parser.parse_expr(&datum, &span(), &mut sink, &mut options)
        };
        (ast, id, sink, options)
    }

    #[test]
    fn quote_produces_literal() {
        let d = Datum::list(vec![Datum::symbol("quote"), Datum::symbol("x")]);
        let (ast, id, sink, _) = parse_one(d);
        assert!(sink.is_empty());
        assert!(matches!(ast.get(id).kind, NodeKind::Literal(Datum::Symbol(_))));
    }

    #[test]
    fn if_without_else_has_none() {
        let d = Datum::list(vec![Datum::symbol("if"), Datum::Bool(true), Datum::Number(Number::SmallInt(1))]);
        let (ast, id, sink, _) = parse_one(d);
        assert!(sink.is_empty());
        match &ast.get(id).kind {
            NodeKind::If { els, .. } => assert!(els.is_none()),
            other => panic!("expected If, got {other:?}"),
        }
    }

    #[test]
    fn begin_with_one_body_form_skips_block() {
        let d = Datum::list(vec![Datum::symbol("begin"), Datum::Number(Number::SmallInt(1))]);
        let (ast, id, sink, _) = parse_one(d);
        assert!(sink.is_empty());
        assert!(matches!(ast.get(id).kind, NodeKind::Literal(_)));
    }

    #[test]
    fn begin_with_several_forms_is_block() {
        let d = Datum::list(vec![Datum::symbol("begin"), Datum::Number(Number::SmallInt(1)), Datum::Number(Number::SmallInt(2))]);
        let (ast, id, sink, _) = parse_one(d);
        assert!(sink.is_empty());
        match &ast.get(id).kind {
            NodeKind::Block(items) => assert_eq!(items.len(), 2),
            other => panic!("expected Block, got {other:?}"),
        }
    }

    #[test]
    fn single_name_define_values_becomes_define() {
        let d = Datum::list(vec![
            Datum::symbol("define-values"),
            Datum::list(vec![Datum::symbol("x")]),
            Datum::Number(Number::SmallInt(5)),
        ]);
        let (ast, id, sink, _) = parse_one(d);
        assert!(sink.is_empty());
        assert!(matches!(ast.get(id).kind, NodeKind::Define { .. }));
    }

    #[test]
    fn multi_name_define_values_stays_define_values() {
        let d = Datum::list(vec![
            Datum::symbol("define-values"),
            Datum::list(vec![Datum::symbol("a"), Datum::symbol("b")]),
            Datum::symbol("rhs"),
        ]);
        let (ast, id, sink, _) = parse_one(d);
        assert!(sink.is_empty());
        match &ast.get(id).kind {
            NodeKind::DefineValues { variables, .. } => assert_eq!(variables.len(), 2),
            other => panic!("expected DefineValues, got {other:?}"),
        }
    }

    #[test]
    fn let_values_parses_multi_value_clause() {
        let d = Datum::list(vec![
            Datum::symbol("let-values"),
            Datum::list(vec![Datum::list(vec![
                Datum::list(vec![Datum::symbol("a"), Datum::symbol("b")]),
                Datum::symbol("init"),
            ])]),
            Datum::symbol("a"),
        ]);
        let (ast, id, sink, _) = parse_one(d);
        assert!(sink.is_empty());
        match &ast.get(id).kind {
            NodeKind::LetValues { bindings, .. } => assert_eq!(bindings[0].variables.len(), 2),
            other => panic!("expected LetValues, got {other:?}"),
        }
    }

    #[test]
    fn letrec_values_uses_letrec_node() {
        let d = Datum::list(vec![
            Datum::symbol("letrec-values"),
            Datum::list(vec![Datum::list(vec![Datum::list(vec![Datum::symbol("a")]), Datum::symbol("init")])]),
            Datum::symbol("a"),
        ]);
        let (ast, id, sink, _) = parse_one(d);
        assert!(sink.is_empty());
        assert!(matches!(ast.get(id).kind, NodeKind::LetrecValues { .. }));
    }

    #[test]
    fn lambda_with_rest_symbol_formals() {
        let d = Datum::list(vec![Datum::symbol("#%lambda"), Datum::symbol("args"), Datum::symbol("args")]);
        let (ast, id, sink, _) = parse_one(d);
        assert!(sink.is_empty());
        match &ast.get(id).kind {
            NodeKind::Function(f) => {
                assert_eq!(f.parameters.len(), 1);
                assert_eq!(f.parameters[0].kind, ParameterKind::List);
            }
            other => panic!("expected Function, got {other:?}"),
        }
    }

    #[test]
    fn lambda_formal_with_type_and_default() {
        let formal = Datum::list(vec![
            Datum::list(vec![Datum::symbol(".type"), Datum::symbol("int")]),
            Datum::symbol("x"),
            Datum::Number(Number::SmallInt(0)),
        ]);
        let d = Datum::list(vec![Datum::symbol("#%lambda"), Datum::list(vec![formal]), Datum::symbol("x")]);
        let (ast, id, sink, _) = parse_one(d);
        assert!(sink.is_empty());
        match &ast.get(id).kind {
            NodeKind::Function(f) => {
                assert_eq!(f.parameters[0].type_annotation, Some(TypeDescriptor::Int));
                assert!(f.parameters[0].default.is_some());
            }
            other => panic!("expected Function, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_formal_names_report_diagnostic() {
        let d = Datum::list(vec![Datum::symbol("#%lambda"), Datum::list(vec![Datum::symbol("x"), Datum::symbol("x")]), Datum::symbol("x")]);
        let (_, _, sink, _) = parse_one(d);
        assert_eq!(sink.iter().next().unwrap().code, DiagnosticCode::ParameterRedefined);
    }

    #[test]
    fn apply_builds_call_node() {
        let d = Datum::list(vec![Datum::symbol("%apply"), Datum::symbol("f"), Datum::Number(Number::SmallInt(1)), Datum::Number(Number::SmallInt(2))]);
        let (ast, id, sink, _) = parse_one(d);
        assert!(sink.is_empty());
        match &ast.get(id).kind {
            NodeKind::Call { arguments, .. } => assert_eq!(arguments.len(), 2),
            other => panic!("expected Call, got {other:?}"),
        }
    }

    #[test]
    fn options_form_sets_flags_and_parses_body() {
        let d = Datum::list(vec![
            Datum::symbol(".options"),
            Datum::list(vec![Datum::list(vec![Datum::symbol("allowRedefinition"), Datum::Bool(false)])]),
            Datum::Number(Number::SmallInt(1)),
        ]);
        let (ast, id, sink, options) = parse_one(d);
        assert!(sink.is_empty());
        assert!(!options.allow_redefinition);
        assert!(matches!(ast.get(id).kind, NodeKind::Literal(_)));
    }

    #[test]
    fn unrecognized_form_degrades_to_placeholder() {
        let d = Datum::list(vec![Datum::symbol("bogus-form"), Datum::symbol("x")]);
        let (ast, id, sink, _) = parse_one(d);
        assert_eq!(sink.iter().next().unwrap().code, DiagnosticCode::ExpectedSyntax);
        assert!(matches!(ast.get(id).kind, NodeKind::Literal(Datum::Null)));
    }
}
