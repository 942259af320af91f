#![doc = include_str!("../../../README.md")]

pub mod alias_remover;
pub mod branch_splitter;
pub mod compound_assign;
pub mod constant_propagation;
pub mod import_resolver;
pub mod index_remapper;
mod intrinsics;
pub mod literal_typing;
pub mod loop_lowering;
pub mod loop_unroller;
pub mod matrix_lowering;
pub mod resolver;
pub mod std140_emulation;
pub mod struct_assignment;
pub mod swizzle_lowering;

pub use alias_remover::remove_aliases;
pub use branch_splitter::split_branches;
pub use compound_assign::lower_compound_assignments;
pub use constant_propagation::{propagate_constants, ConstantPropagationOptions};
pub use import_resolver::{resolve_imports, ImportResolverOptions, ModuleResolver, ModuleResolverError};
pub use index_remapper::remap_indices;
pub use literal_typing::{assign_literal_types, LiteralTypingOptions};
pub use loop_lowering::lower_loops;
pub use loop_unroller::unroll_loops;
pub use matrix_lowering::lower_matrices;
pub use resolver::{resolve, ResolverOptions};
pub use std140_emulation::emulate_std140;
pub use struct_assignment::split_struct_assignments;
pub use swizzle_lowering::lower_swizzles;
