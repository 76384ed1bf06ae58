// ABOUTME: Two-pass scope decorator: lexical resolution, closure promotion, depth computation

use crate::ast::{Ast, FunctionData, NodeId, NodeKind};
use crate::datum::Symbol;
use crate::diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink};
use crate::options::CompileOptions;
use crate::scope::{BindingId, FrameId, FunctionFrame, ScopeId, Slot};
use crate::types::TypeDescriptor;
use std::collections::HashSet;

fn type_annotation_of(slot: &Slot) -> Option<TypeDescriptor> {
    match slot {
        Slot::Parameter { type_annotation, .. } => *type_annotation,
        Slot::Local { type_annotation, .. } => *type_annotation,
        Slot::StaticTopLevel { type_annotation, .. } => *type_annotation,
        Slot::Closure { type_annotation, .. } => *type_annotation,
        Slot::TopLevel { .. } => None,
    }
}

/// Walks an already-built `Ast` (the output of the form parser) and fills in
/// every node's `scope`/`slot` fields, in two passes (spec §4.G).
pub struct Decorator {
    options: CompileOptions,
    frame_table: Vec<FunctionFrame>,
}

impl Decorator {
    pub fn new(options: CompileOptions) -> Self {
        Decorator { options, frame_table: Vec::new() }
    }

    pub fn decorate(&mut self, ast: &mut Ast, program: &[NodeId], diagnostics: &mut DiagnosticSink) {
        let root = ast.scopes.root();
        let mut top_scope = root;
        for &node in program {
            top_scope = self.collect_top_level(ast, node, top_scope, diagnostics);
        }
        let mut frames: Vec<FrameId> = Vec::new();
        for &node in program {
            self.resolve(ast, node, top_scope, &mut frames, diagnostics);
        }
    }

    // ---- Pass 1: top-level scope collection ----------------------------

    fn collect_top_level(&mut self, ast: &mut Ast, node_id: NodeId, scope: ScopeId, diagnostics: &mut DiagnosticSink) -> ScopeId {
        enum Shape {
            Define(NodeId),
            DefineValues(Vec<NodeId>),
            Block(Vec<NodeId>),
            Other,
        }
        let shape = match &ast.get(node_id).kind {
            NodeKind::Define { lhs, .. } => Shape::Define(*lhs),
            NodeKind::DefineValues { variables, .. } => Shape::DefineValues(variables.clone()),
            NodeKind::Block(items) => Shape::Block(items.clone()),
            _ => Shape::Other,
        };
        match shape {
            Shape::Define(lhs) => self.collect_define(ast, node_id, lhs, scope, diagnostics),
            Shape::DefineValues(vars) => {
                let mut s = scope;
                for lhs in vars {
                    s = self.collect_define(ast, node_id, lhs, s, diagnostics);
                }
                s
            }
            Shape::Block(items) => {
                let mut s = scope;
                for item in items {
                    s = self.collect_top_level(ast, item, s, diagnostics);
                }
                s
            }
            Shape::Other => scope,
        }
    }

    fn collect_define(&mut self, ast: &mut Ast, define_node: NodeId, lhs: NodeId, scope: ScopeId, diagnostics: &mut DiagnosticSink) -> ScopeId {
        let name = match ast.get(lhs).kind {
            NodeKind::Variable { name, .. } => name,
            _ => return scope,
        };
        if ast.scopes.lookup(scope, name).is_some() {
            if !self.options.allow_redefinition {
                let span = ast.get(define_node).span.clone();
                diagnostics.push(Diagnostic::error(DiagnosticCode::VariableRedefined, format!("variable '{name}' redefined"), span));
            }
            return scope;
        }
        let read_only = !self.options.allow_redefinition;
        let slot = Slot::TopLevel { name, read_only };
        let (new_scope, _binding_id) = ast.scopes.bind(scope, name, Some(define_node), slot, None);
        if let NodeKind::Variable { is_read_only, .. } = &mut ast.get_mut(lhs).kind {
            *is_read_only = read_only;
        }
        new_scope
    }

    // ---- Pass 2: lexical resolution, closure promotion, depth computation ----

    fn resolve(&mut self, ast: &mut Ast, node_id: NodeId, scope: ScopeId, frames: &mut Vec<FrameId>, diagnostics: &mut DiagnosticSink) {
        ast.get_mut(node_id).scope = Some(scope);
        match &ast.get(node_id).kind {
            NodeKind::Literal(_) | NodeKind::Void => {}
            NodeKind::Variable { .. } => self.resolve_variable_read(ast, node_id, scope, frames, diagnostics),
            NodeKind::Block(items) => {
                let items = items.clone();
                for item in items {
                    self.resolve(ast, item, scope, frames, diagnostics);
                }
            }
            NodeKind::If { cond, then, els } => {
                let (cond, then, els) = (*cond, *then, *els);
                self.resolve(ast, cond, scope, frames, diagnostics);
                self.resolve(ast, then, scope, frames, diagnostics);
                if let Some(e) = els {
                    self.resolve(ast, e, scope, frames, diagnostics);
                }
            }
            NodeKind::Call { function, arguments } => {
                let (function, arguments) = (*function, arguments.clone());
                self.resolve(ast, function, scope, frames, diagnostics);
                for a in arguments {
                    self.resolve(ast, a, scope, frames, diagnostics);
                }
            }
            NodeKind::Assign { lhs, rhs } => {
                let (lhs, rhs) = (*lhs, *rhs);
                self.resolve(ast, rhs, scope, frames, diagnostics);
                self.resolve_assign_target(ast, lhs, scope, frames, diagnostics);
            }
            NodeKind::Define { lhs, rhs } => {
                let (lhs, rhs) = (*lhs, *rhs);
                self.resolve(ast, rhs, scope, frames, diagnostics);
                self.resolve_define_target(ast, node_id, lhs, scope, frames, diagnostics);
            }
            NodeKind::DefineValues { variables, rhs } => {
                let (variables, rhs) = (variables.clone(), *rhs);
                self.resolve(ast, rhs, scope, frames, diagnostics);
                for lhs in variables {
                    self.resolve_define_target(ast, node_id, lhs, scope, frames, diagnostics);
                }
            }
            NodeKind::LetValues { .. } => self.resolve_let_values(ast, node_id, scope, frames, diagnostics, false),
            NodeKind::LetrecValues { .. } => self.resolve_let_values(ast, node_id, scope, frames, diagnostics, true),
            NodeKind::Function(_) => self.resolve_function(ast, node_id, scope, frames, diagnostics),
            NodeKind::List { items, dot_item } => {
                let (items, dot_item) = (items.clone(), *dot_item);
                for i in items {
                    self.resolve(ast, i, scope, frames, diagnostics);
                }
                if let Some(d) = dot_item {
                    self.resolve(ast, d, scope, frames, diagnostics);
                }
            }
            NodeKind::Vector(items) => {
                let items = items.clone();
                for i in items {
                    self.resolve(ast, i, scope, frames, diagnostics);
                }
            }
        }
    }

    fn lookup_or_global(ast: &mut Ast, scope: ScopeId, name: Symbol) -> BindingId {
        match ast.scopes.lookup(scope, name) {
            Some(id) => id,
            None => ast.scopes.register_global(name, Slot::TopLevel { name, read_only: false }),
        }
    }

    fn resolve_variable_read(&mut self, ast: &mut Ast, node_id: NodeId, scope: ScopeId, frames: &mut [FrameId], diagnostics: &mut DiagnosticSink) {
        let name = match ast.get(node_id).kind {
            NodeKind::Variable { name, .. } => name,
            _ => return,
        };
        let binding_id = Self::lookup_or_global(ast, scope, name);
        self.maybe_promote(ast, binding_id, frames);
        let slot = self.reference_slot(ast, binding_id, frames);
        let unassigned = {
            let binding = ast.scopes.binding_mut(binding_id);
            binding.references.push(node_id);
            binding.usage.read = true;
            binding.usage.is_unassigned()
        };
        if unassigned {
            let span = ast.get(node_id).span.clone();
            diagnostics.push(Diagnostic::error(DiagnosticCode::UnassignedVariableUsed, format!("variable '{name}' used before assignment"), span));
        }
        if let NodeKind::Variable { slot: slot_field, .. } = &mut ast.get_mut(node_id).kind {
            *slot_field = Some(slot);
        }
    }

    fn resolve_assign_target(&mut self, ast: &mut Ast, node_id: NodeId, scope: ScopeId, frames: &mut [FrameId], diagnostics: &mut DiagnosticSink) {
        let name = match ast.get(node_id).kind {
            NodeKind::Variable { name, .. } => name,
            _ => return,
        };
        let binding_id = Self::lookup_or_global(ast, scope, name);
        self.maybe_promote(ast, binding_id, frames);
        let slot = self.reference_slot(ast, binding_id, frames);
        let read_only = matches!(
            ast.scopes.binding(binding_id).slot,
            Slot::TopLevel { read_only: true, .. } | Slot::StaticTopLevel { .. }
        );
        if read_only {
            let span = ast.get(node_id).span.clone();
            diagnostics.push(Diagnostic::error(
                DiagnosticCode::VariableRedefined,
                format!("cannot assign to '{name}': top-level redefinition is disallowed"),
                span,
            ));
        }
        {
            let binding = ast.scopes.binding_mut(binding_id);
            binding.references.push(node_id);
            binding.usage.written = true;
        }
        if let NodeKind::Variable { slot: slot_field, .. } = &mut ast.get_mut(node_id).kind {
            *slot_field = Some(slot);
        }
    }

    fn resolve_define_target(&mut self, ast: &mut Ast, define_node: NodeId, lhs: NodeId, scope: ScopeId, frames: &[FrameId], diagnostics: &mut DiagnosticSink) {
        let name = match ast.get(lhs).kind {
            NodeKind::Variable { name, .. } => name,
            _ => return,
        };
        if !frames.is_empty() {
            let span = ast.get(define_node).span.clone();
            diagnostics.push(Diagnostic::error(DiagnosticCode::UnexpectedDefine, "define is not allowed inside a function body", span));
        }
        let binding_id = Self::lookup_or_global(ast, scope, name);
        if frames.is_empty() && !self.options.allow_redefinition {
            if let Slot::TopLevel { .. } = ast.scopes.binding(binding_id).slot {
                ast.scopes.binding_mut(binding_id).slot = Slot::StaticTopLevel { name, type_annotation: None };
            }
        }
        {
            let binding = ast.scopes.binding_mut(binding_id);
            binding.usage.written = true;
            binding.usage.initialized = true;
            binding.declaration = Some(define_node);
        }
        let final_slot = ast.scopes.binding(binding_id).slot.clone();
        ast.get_mut(lhs).scope = Some(scope);
        if let NodeKind::Variable { slot: slot_field, .. } = &mut ast.get_mut(lhs).kind {
            *slot_field = Some(final_slot);
        }
    }

    /// `let-values` resolves initializers against the outer scope (bindings
    /// not yet visible, as in `let`); `letrec-values` resolves them against
    /// the inner scope, after the bindings already exist (as in `letrec`).
    fn resolve_let_values(&mut self, ast: &mut Ast, node_id: NodeId, scope: ScopeId, frames: &mut Vec<FrameId>, diagnostics: &mut DiagnosticSink, is_letrec: bool) {
        let (bindings, body) = match &ast.get(node_id).kind {
            NodeKind::LetValues { bindings, body } | NodeKind::LetrecValues { bindings, body } => (bindings.clone(), *body),
            _ => return,
        };
        let current_frame = frames.last().copied();
        let mut entries = Vec::new();
        for b in &bindings {
            for &var in &b.variables {
                if let NodeKind::Variable { name, .. } = ast.get(var).kind {
                    let type_annotation = ast.get(var).value_type;
                    entries.push((name, Some(var), Slot::Local { name, type_annotation }, current_frame));
                }
            }
        }
        let (inner_scope, binding_ids) = ast.scopes.bind_many(scope, entries);

        let init_scope = if is_letrec { inner_scope } else { scope };
        for b in &bindings {
            self.resolve(ast, b.rhs, init_scope, frames, diagnostics);
        }

        let mut idx = 0;
        for b in &bindings {
            for &var in &b.variables {
                let binding_id = binding_ids[idx];
                idx += 1;
                {
                    let binding = ast.scopes.binding_mut(binding_id);
                    binding.usage.initialized = true;
                    binding.declaration = Some(var);
                }
                let slot = ast.scopes.binding(binding_id).slot.clone();
                ast.get_mut(var).scope = Some(inner_scope);
                if let NodeKind::Variable { slot: slot_field, .. } = &mut ast.get_mut(var).kind {
                    *slot_field = Some(slot);
                }
            }
        }

        self.resolve(ast, body, inner_scope, frames, diagnostics);
    }

    fn resolve_function(&mut self, ast: &mut Ast, node_id: NodeId, scope: ScopeId, frames: &mut Vec<FrameId>, diagnostics: &mut DiagnosticSink) {
        let (parameters, body) = match &ast.get(node_id).kind {
            NodeKind::Function(FunctionData { parameters, body, .. }) => (parameters.clone(), *body),
            _ => return,
        };

        for p in &parameters {
            if let Some(default) = p.default {
                self.resolve(ast, default, scope, frames, diagnostics);
            }
        }

        let frame_id = self.frame_table.len();
        self.frame_table.push(FunctionFrame::new(node_id));
        frames.push(frame_id);

        let entries = parameters
            .iter()
            .map(|p| (p.name, None, Slot::Parameter { index: p.index, type_annotation: p.type_annotation }, Some(frame_id)))
            .collect();
        let (inner_scope, binding_ids) = ast.scopes.bind_many(scope, entries);
        for binding_id in &binding_ids {
            ast.scopes.binding_mut(*binding_id).usage.initialized = true;
        }

        self.resolve(ast, body, inner_scope, frames, diagnostics);

        frames.pop();
        let closures = self.frame_table[frame_id].closures.clone();
        let max_depth = self.frame_table[frame_id].max_closure_reference_depth;
        let closure_slots: Vec<Slot> = closures.iter().map(|&bid| ast.scopes.binding(bid).slot.clone()).collect();
        if let NodeKind::Function(f) = &mut ast.get_mut(node_id).kind {
            f.max_closure_reference_depth = max_depth;
            f.creates_closure = !closure_slots.is_empty();
            f.closures = closure_slots;
        }
    }

    /// Promotes a local/parameter binding declared in a strictly-enclosing
    /// function frame into a `Closure` slot the first time it is referenced
    /// from a more deeply nested frame (spec §4.G "Closure promotion").
    fn maybe_promote(&mut self, ast: &mut Ast, binding_id: BindingId, frames: &[FrameId]) {
        let Some(&current_frame) = frames.last() else {
            return;
        };
        let binding = ast.scopes.binding(binding_id);
        if matches!(binding.slot, Slot::Closure { .. } | Slot::TopLevel { .. } | Slot::StaticTopLevel { .. }) {
            return;
        }
        match binding.declaring_frame {
            Some(declaring_frame) if declaring_frame != current_frame => {
                self.promote_to_closure(ast, binding_id, declaring_frame);
            }
            _ => {}
        }
    }

    fn promote_to_closure(&mut self, ast: &mut Ast, binding_id: BindingId, declaring_frame: FrameId) {
        let binding = ast.scopes.binding(binding_id);
        let base_slot = binding.slot.clone();
        let base_name = base_slot.name().unwrap_or_else(|| Symbol::intern("closure"));
        let initialize_from = if binding.usage.initialized { Some(Box::new(base_slot.clone())) } else { None };
        let name = self.uniquify_closure_name(ast, declaring_frame, base_name);
        let new_slot = Slot::Closure {
            name,
            type_annotation: type_annotation_of(&base_slot),
            declared_slot_id: binding_id,
            depth: 0,
            initialize_from,
        };
        ast.scopes.binding_mut(binding_id).slot = new_slot;
        ast.scopes.binding_mut(binding_id).in_closure = true;
        self.frame_table[declaring_frame].closures.push(binding_id);
    }

    /// Within a function's closure set, a colliding name is suffixed with
    /// the smallest integer >= 2 that disambiguates it.
    fn uniquify_closure_name(&self, ast: &Ast, frame_id: FrameId, base: Symbol) -> Symbol {
        let base_name = base.name();
        let existing: HashSet<String> = self.frame_table[frame_id]
            .closures
            .iter()
            .filter_map(|&bid| ast.scopes.binding(bid).slot.name())
            .map(|s| s.name())
            .collect();
        if !existing.contains(&base_name) {
            return base;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base_name}-{n}");
            if !existing.contains(&candidate) {
                return Symbol::intern(&candidate);
            }
            n += 1;
        }
    }

    /// The slot to stamp onto this particular reference: a depth-specialized
    /// clone for a closure-bound binding, or the binding's current slot
    /// unchanged otherwise. Also attributes the contributed depth to every
    /// intervening closure-creating function frame's
    /// `max_closure_reference_depth` (spec §4.G "Depth computation").
    fn reference_slot(&mut self, ast: &Ast, binding_id: BindingId, frames: &[FrameId]) -> Slot {
        let binding = ast.scopes.binding(binding_id);
        let slot = binding.slot.clone();
        let Slot::Closure { .. } = &slot else {
            return slot;
        };
        let Some(declaring_frame) = binding.declaring_frame else {
            return slot;
        };
        let Some(declared_pos) = frames.iter().position(|f| *f == declaring_frame) else {
            return slot;
        };
        let current_pos = frames.len() - 1;
        let depth = Self::depth_for(declared_pos, current_pos);
        for pos in (declared_pos + 1)..=current_pos {
            let frame_id = frames[pos];
            let contribution = Self::depth_for(declared_pos, pos);
            if self.frame_table[frame_id].max_closure_reference_depth < contribution {
                self.frame_table[frame_id].max_closure_reference_depth = contribution;
            }
        }
        slot.with_depth(depth)
    }

    /// Number of closure-creating function boundaries crossed from a
    /// reference's frame to its declaring frame: 0 within the declaring
    /// function's own body, 1 for an immediate child, and in general
    /// `pos - declared_pos`, which already equals `1 + intervening count`
    /// once that count is at least one.
    fn depth_for(declared_pos: usize, pos: usize) -> u32 {
        (pos - declared_pos) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ParameterKind;
    use crate::datum::Datum;
    use crate::form_parser::FormParser;
    use crate::span::Span;

    fn span() -> Span {
        Span::synthetic("t")
    }

    fn decorate_program(data: Vec<Datum>, options: CompileOptions) -> (Ast, Vec<NodeId>, DiagnosticSink) {
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

    #[test]
    fn top_level_define_resolves_later_reference() {
        let define = Datum::list(vec![Datum::symbol("define-values"), Datum::list(vec![Datum::symbol("x")]), Datum::Bool(true)]);
        let read = Datum::symbol("x");
        let (ast, program, diagnostics) = decorate_program(vec![define, read], CompileOptions::default());
        assert!(diagnostics.is_empty());
        match &ast.get(program[1]).kind {
            NodeKind::Variable { slot: Some(Slot::TopLevel { .. }), .. } => {}
            other => panic!("expected resolved top-level variable, got {other:?}"),
        }
    }

    #[test]
    fn redefinition_with_redefinition_disallowed_reports_diagnostic() {
        let mut options = CompileOptions::default();
        options.allow_redefinition = false;
        let d1 = Datum::list(vec![Datum::symbol("define-values"), Datum::list(vec![Datum::symbol("x")]), Datum::Bool(true)]);
        let d2 = Datum::list(vec![Datum::symbol("define-values"), Datum::list(vec![Datum::symbol("x")]), Datum::Bool(false)]);
        let (_, _, diagnostics) = decorate_program(vec![d1, d2], options);
        assert_eq!(diagnostics.iter().next().unwrap().code, DiagnosticCode::VariableRedefined);
    }

    #[test]
    fn static_top_level_slot_when_redefinition_disallowed() {
        let mut options = CompileOptions::default();
        options.allow_redefinition = false;
        let define = Datum::list(vec![Datum::symbol("define-values"), Datum::list(vec![Datum::symbol("x")]), Datum::Bool(true)]);
        let (ast, program, _diag) = decorate_program(vec![define], options);
        match &ast.get(program[0]).kind {
            NodeKind::Define { lhs, .. } => match &ast.get(*lhs).kind {
                NodeKind::Variable { slot: Some(Slot::StaticTopLevel { .. }), .. } => {}
                other => panic!("expected StaticTopLevel slot, got {other:?}"),
            },
            other => panic!("expected Define, got {other:?}"),
        }
    }

    #[test]
    fn unassigned_read_reports_diagnostic() {
        // `(if x x x)` where x is never defined before this read: the first
        // reference creates a fresh global binding with no prior write.
        let form = Datum::list(vec![Datum::symbol("if"), Datum::symbol("x"), Datum::symbol("x"), Datum::symbol("x")]);
        let (_, _, diagnostics) = decorate_program(vec![form], CompileOptions::default());
        assert_eq!(diagnostics.iter().next().unwrap().code, DiagnosticCode::UnassignedVariableUsed);
    }

    #[test]
    fn define_inside_function_body_reports_unexpected_define() {
        let lambda = Datum::list(vec![
            Datum::symbol("#%lambda"),
            Datum::Null,
            Datum::list(vec![Datum::symbol("define-values"), Datum::list(vec![Datum::symbol("y")]), Datum::Bool(true)]),
        ]);
        let (_, _, diagnostics) = decorate_program(vec![lambda], CompileOptions::default());
        assert!(diagnostics.iter().any(|d| d.code == DiagnosticCode::UnexpectedDefine));
    }

    #[test]
    fn nested_lambda_promotes_outer_parameter_to_closure() {
        // (#%lambda (x) (#%lambda () x))
        let inner = Datum::list(vec![Datum::symbol("#%lambda"), Datum::Null, Datum::symbol("x")]);
        let outer = Datum::list(vec![Datum::symbol("#%lambda"), Datum::list(vec![Datum::symbol("x")]), inner]);
        let (ast, program, diagnostics) = decorate_program(vec![outer], CompileOptions::default());
        assert!(diagnostics.is_empty());
        match &ast.get(program[0]).kind {
            NodeKind::Function(f) => {
                assert_eq!(f.parameters[0].kind, ParameterKind::Normal);
                match &ast.get(f.body).kind {
                    NodeKind::Function(inner_f) => {
                        assert!(inner_f.creates_closure);
                        assert_eq!(inner_f.closures.len(), 1);
                        match &ast.get(inner_f.body).kind {
                            NodeKind::Variable { slot: Some(Slot::Closure { depth, .. }), .. } => assert_eq!(*depth, 1),
                            other => panic!("expected Closure-slot variable, got {other:?}"),
                        }
                    }
                    other => panic!("expected inner Function, got {other:?}"),
                }
            }
            other => panic!("expected outer Function, got {other:?}"),
        }
    }

    #[test]
    fn let_values_binds_after_initializer_resolution() {
        // let-values: the initializer resolves against the outer scope, so a
        // reference to the same name inside it is still unbound there.
        let form = Datum::list(vec![
            Datum::symbol("let-values"),
            Datum::list(vec![Datum::list(vec![Datum::list(vec![Datum::symbol("a")]), Datum::Bool(true)])]),
            Datum::symbol("a"),
        ]);
        let (ast, program, diagnostics) = decorate_program(vec![form], CompileOptions::default());
        assert!(diagnostics.is_empty());
        match &ast.get(program[0]).kind {
            NodeKind::LetValues { body, .. } => match &ast.get(*body).kind {
                NodeKind::Variable { slot: Some(Slot::Local { .. }), .. } => {}
                other => panic!("expected resolved Local variable in body, got {other:?}"),
            },
            other => panic!("expected LetValues, got {other:?}"),
        }
    }
}
