// ABOUTME: Scope chain, Slot classification, and decorator-internal Binding/FunctionFrame state

use crate::ast::NodeId;
use crate::datum::Symbol;
use crate::types::TypeDescriptor;

pub type ScopeId = usize;
pub type BindingId = usize;
pub type FrameId = usize;

/// A variable's storage classification (spec §3). Two slots are "the same"
/// when class and identifying keys match; [`Slot::same_binding`]
/// implements that per-class comparison rather than relying on full
/// structural equality (a `Closure` slot's `depth` varies per reference
/// while still denoting the same declared binding).
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Parameter {
        index: u32,
        type_annotation: Option<TypeDescriptor>,
    },
    Local {
        name: Symbol,
        type_annotation: Option<TypeDescriptor>,
    },
    TopLevel {
        name: Symbol,
        read_only: bool,
    },
    StaticTopLevel {
        name: Symbol,
        type_annotation: Option<TypeDescriptor>,
    },
    Closure {
        name: Symbol,
        type_annotation: Option<TypeDescriptor>,
        declared_slot_id: BindingId,
        depth: u32,
        initialize_from: Option<Box<Slot>>,
    },
}

impl Slot {
    pub fn same_binding(&self, other: &Slot) -> bool {
        match (self, other) {
            (Slot::Parameter { index: a, .. }, Slot::Parameter { index: b, .. }) => a == b,
            (Slot::Local { name: a, .. }, Slot::Local { name: b, .. }) => a == b,
            (Slot::TopLevel { name: a, .. }, Slot::TopLevel { name: b, .. }) => a == b,
            (Slot::StaticTopLevel { name: a, .. }, Slot::StaticTopLevel { name: b, .. }) => a == b,
            (Slot::Closure { declared_slot_id: a, .. }, Slot::Closure { declared_slot_id: b, .. }) => a == b,
            _ => false,
        }
    }

    pub fn name(&self) -> Option<Symbol> {
        match self {
            Slot::Parameter { .. } => None,
            Slot::Local { name, .. } | Slot::TopLevel { name, .. } | Slot::StaticTopLevel { name, .. } | Slot::Closure { name, .. } => Some(*name),
        }
    }

    /// Clones this closure slot with a new depth, sharing the declared
    /// binding id (spec §9: "clone with new depth...shares the
    /// declared-slot-id").
    pub fn with_depth(&self, depth: u32) -> Slot {
        match self {
            Slot::Closure {
                name,
                type_annotation,
                declared_slot_id,
                initialize_from,
                ..
            } => Slot::Closure {
                name: *name,
                type_annotation: *type_annotation,
                declared_slot_id: *declared_slot_id,
                depth,
                initialize_from: initialize_from.clone(),
            },
            other => other.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageFlags {
    pub read: bool,
    pub written: bool,
    pub initialized: bool,
}

impl UsageFlags {
    pub fn is_unassigned(&self) -> bool {
        !self.initialized && !self.written
    }
}

/// Decorator-internal per-binding state (spec §3 "Binding record").
#[derive(Debug, Clone)]
pub struct Binding {
    pub declaration: Option<NodeId>,
    pub slot: Slot,
    pub references: Vec<NodeId>,
    pub usage: UsageFlags,
    pub in_closure: bool,
    pub declaring_frame: Option<FrameId>,
}

impl Binding {
    pub fn new(declaration: Option<NodeId>, slot: Slot, declaring_frame: Option<FrameId>) -> Self {
        Binding {
            declaration,
            slot,
            references: Vec::new(),
            usage: UsageFlags::default(),
            in_closure: false,
            declaring_frame,
        }
    }
}

/// Decorator-internal function-nesting state (spec §3 "Function frame").
#[derive(Debug, Clone)]
pub struct FunctionFrame {
    pub function_node: NodeId,
    pub closures: Vec<BindingId>,
    pub max_closure_reference_depth: u32,
}

impl FunctionFrame {
    pub fn new(function_node: NodeId) -> Self {
        FunctionFrame {
            function_node,
            closures: Vec::new(),
            max_closure_reference_depth: 0,
        }
    }
}

/// One link in the immutable parent-linked scope chain (spec §9: binding
/// insertion creates a new scope rather than mutating the current one, so
/// AST nodes that retain an earlier `ScopeId` keep seeing exactly what was
/// visible at that point). Lookup climbs from a scope through its parents,
/// innermost first, matching pass 2's "bindings... from top to bottom".
#[derive(Debug, Clone)]
struct ScopeNode {
    parent: Option<ScopeId>,
    entries: Vec<(Symbol, BindingId)>,
}

#[derive(Debug, Clone)]
pub struct ScopeArena {
    scopes: Vec<ScopeNode>,
    bindings: Vec<Binding>,
    root: ScopeId,
}

impl ScopeArena {
    pub fn new() -> Self {
        let mut arena = ScopeArena {
            scopes: Vec::new(),
            bindings: Vec::new(),
            root: 0,
        };
        arena.scopes.push(ScopeNode { parent: None, entries: Vec::new() });
        arena
    }

    pub fn root(&self) -> ScopeId {
        self.root
    }

    /// Pushes a brand-new, empty child scope under `parent`.
    pub fn child(&mut self, parent: ScopeId) -> ScopeId {
        self.scopes.push(ScopeNode { parent: Some(parent), entries: Vec::new() });
        self.scopes.len() - 1
    }

    /// Creates a binding and a new scope that extends `parent` with exactly
    /// that one entry, returning both ids.
    pub fn bind(&mut self, parent: ScopeId, name: Symbol, declaration: Option<NodeId>, slot: Slot, declaring_frame: Option<FrameId>) -> (ScopeId, BindingId) {
        let binding_id = self.bindings.len();
        self.bindings.push(Binding::new(declaration, slot, declaring_frame));
        self.scopes.push(ScopeNode {
            parent: Some(parent),
            entries: vec![(name, binding_id)],
        });
        (self.scopes.len() - 1, binding_id)
    }

    /// Extends `parent` with several simultaneous bindings (e.g. a
    /// function's parameter list, or one `let-values` clause's variables),
    /// all visible from the single returned scope.
    pub fn bind_many(&mut self, parent: ScopeId, entries: Vec<(Symbol, Option<NodeId>, Slot, Option<FrameId>)>) -> (ScopeId, Vec<BindingId>) {
        let mut ids = Vec::with_capacity(entries.len());
        let mut scope_entries = Vec::with_capacity(entries.len());
        for (name, declaration, slot, frame) in entries {
            let binding_id = self.bindings.len();
            self.bindings.push(Binding::new(declaration, slot, frame));
            ids.push(binding_id);
            scope_entries.push((name, binding_id));
        }
        self.scopes.push(ScopeNode { parent: Some(parent), entries: scope_entries });
        (self.scopes.len() - 1, ids)
    }

    /// Registers a binding with no scope visibility of its own (used for
    /// the synthesized global inserted on an unresolved reference; spec
    /// §4.G "insert a global binding at index 0").
    pub fn register_global(&mut self, name: Symbol, slot: Slot) -> BindingId {
        let binding_id = self.bindings.len();
        self.bindings.push(Binding::new(None, slot, None));
        let root = self.root;
        if let Some(root_scope) = self.scopes.get_mut(root) {
            root_scope.entries.insert(0, (name, binding_id));
        }
        binding_id
    }

    pub fn lookup(&self, scope: ScopeId, name: Symbol) -> Option<BindingId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let node = &self.scopes[id];
            if let Some(&(_, binding_id)) = node.entries.iter().rev().find(|(n, _)| *n == name) {
                return Some(binding_id);
            }
            current = node.parent;
        }
        None
    }

    pub fn binding(&self, id: BindingId) -> &Binding {
        &self.bindings[id]
    }

    pub fn binding_mut(&mut self, id: BindingId) -> &mut Binding {
        &mut self.bindings[id]
    }

    pub fn bindings_len(&self) -> usize {
        self.bindings.len()
    }
}

impl Default for ScopeArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::Symbol;

    #[test]
    fn lookup_climbs_parent_chain() {
        let mut arena = ScopeArena::new();
        let root = arena.root();
        let (s1, b1) = arena.bind(root, Symbol::intern("outer"), None, Slot::TopLevel { name: Symbol::intern("outer"), read_only: true }, None);
        let (s2, _b2) = arena.bind(s1, Symbol::intern("inner"), None, Slot::Local { name: Symbol::intern("inner"), type_annotation: None }, None);
        assert_eq!(arena.lookup(s2, Symbol::intern("outer")), Some(b1));
        assert_eq!(arena.lookup(s2, Symbol::intern("missing")), None);
    }

    #[test]
    fn earlier_scope_unaffected_by_later_bindings() {
        let mut arena = ScopeArena::new();
        let root = arena.root();
        let (s1, _) = arena.bind(root, Symbol::intern("a"), None, Slot::Local { name: Symbol::intern("a"), type_annotation: None }, None);
        let before = arena.lookup(s1, Symbol::intern("b"));
        let (_s2, _) = arena.bind(s1, Symbol::intern("b"), None, Slot::Local { name: Symbol::intern("b"), type_annotation: None }, None);
        // s1 itself must still not see "b": immutability of earlier scopes.
        assert_eq!(before, None);
        assert_eq!(arena.lookup(s1, Symbol::intern("b")), None);
    }

    #[test]
    fn closure_slot_same_binding_ignores_depth() {
        let a = Slot::Closure {
            name: Symbol::intern("x"),
            type_annotation: None,
            declared_slot_id: 3,
            depth: 1,
            initialize_from: None,
        };
        let b = a.with_depth(2);
        assert!(a.same_binding(&b));
        assert_ne!(format!("{a:?}"), format!("{b:?}"));
    }
}
