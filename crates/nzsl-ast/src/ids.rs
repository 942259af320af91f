//! Stable indices into [`crate::context::TransformerContext`]'s symbol tables.
//!
//! Every cross-reference in the AST (a variable read, a function call target, a struct
//! type, ...) is one of these newtypes rather than a pointer. Indices are 64-bit per the
//! data model (§3.6): a module can be rewritten and have its indices survive across passes,
//! which a pointer-based back-reference could never guarantee once nodes are cloned.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! stable_index {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl $name {
            #[must_use]
            pub const fn new(index: u64) -> Self {
                Self(index)
            }

            #[must_use]
            pub const fn index(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

stable_index!(AliasId, "Index of an `alias` declaration in the context's alias table.");
stable_index!(ConstantId, "Index of a `const`/`option` declaration in the context's constant table.");
stable_index!(ExternalBlockId, "Index of an `external` block in the context's external-block table.");
stable_index!(FunctionId, "Index of a `fn` declaration in the context's function table.");
stable_index!(IntrinsicId, "Index of an intrinsic-function binding in the context's intrinsic table.");
stable_index!(ModuleId, "Index of an imported submodule in the context's module table.");
stable_index!(StructId, "Index of a `struct` declaration in the context's struct table.");
stable_index!(TypeId, "Index of a named, non-builtin type in the context's type table.");
stable_index!(VariableId, "Index of a variable (parameter, local, or struct-less global) in the context's variable table.");
