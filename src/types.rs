// ABOUTME: Type Registry: the closed set of built-in type-annotation names

use std::collections::HashMap;
use std::sync::OnceLock;

/// One of the built-in type names recognized in `(.type T)` annotations
/// (spec §4.D). The registry is a closed set at the core's boundary;
/// extension belongs to an out-of-scope hosting component (spec §4.F).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeDescriptor {
    Bool,
    Byte,
    SByte,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    Float,
    Double,
    Char,
    String,
    Integer,
    Complex,
    List,
    Function,
    Object,
}

impl TypeDescriptor {
    /// Value types are copied by value rather than by reference; only
    /// `Object` and its descendants (`String`, `List`, `Function`) are
    /// reference types in this type system.
    pub fn is_value_type(self) -> bool {
        !matches!(self, TypeDescriptor::Object | TypeDescriptor::String | TypeDescriptor::List | TypeDescriptor::Function)
    }

    pub fn name(self) -> &'static str {
        match self {
            TypeDescriptor::Bool => "bool",
            TypeDescriptor::Byte => "byte",
            TypeDescriptor::SByte => "sbyte",
            TypeDescriptor::Short => "short",
            TypeDescriptor::UShort => "ushort",
            TypeDescriptor::Int => "int",
            TypeDescriptor::UInt => "uint",
            TypeDescriptor::Long => "long",
            TypeDescriptor::ULong => "ulong",
            TypeDescriptor::Float => "float",
            TypeDescriptor::Double => "double",
            TypeDescriptor::Char => "char",
            TypeDescriptor::String => "string",
            TypeDescriptor::Integer => "integer",
            TypeDescriptor::Complex => "complex",
            TypeDescriptor::List => "list",
            TypeDescriptor::Function => "function",
            TypeDescriptor::Object => "object",
        }
    }

    /// The common ancestor type of a set of descriptors, used when the
    /// semantic checker needs to unify branch types (e.g. an `If`'s two
    /// arms). Falls back to `Object` whenever the set disagrees.
    pub fn common_base_type(descriptors: &[TypeDescriptor]) -> TypeDescriptor {
        match descriptors.split_first() {
            None => TypeDescriptor::Object,
            Some((first, rest)) => {
                if rest.iter().all(|d| d == first) {
                    *first
                } else {
                    TypeDescriptor::Object
                }
            }
        }
    }
}

fn registry() -> &'static HashMap<&'static str, TypeDescriptor> {
    static REGISTRY: OnceLock<HashMap<&'static str, TypeDescriptor>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        use TypeDescriptor::*;
        [Bool, Byte, SByte, Short, UShort, Int, UInt, Long, ULong, Float, Double, Char, String, Integer, Complex, List, Function, Object]
            .into_iter()
            .map(|t| (t.name(), t))
            .collect()
    })
}

pub fn lookup(name: &str) -> Option<TypeDescriptor> {
    registry().get(name).copied()
}
