//! The type system (§4.B).
//!
//! `Type` is a sum over every shape a value or declaration can have. Two types are equal iff
//! their tags and every carried attribute are equal; an `Alias` is never equal to its target
//! except through [`Type::resolve_alias`]'s explicit peeling.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    enums::{AccessPolicy, ImageDimension, ImageFormat, StructLayout},
    ids::{FunctionId, StructId, TypeId},
};

/// Primitive scalar types, including the two untyped literal types (§4.H).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum PrimitiveType {
    Bool,
    I32,
    U32,
    F32,
    F64,
    String,
    /// Untyped integer literal; collapses to `i32`/`u32`/`f32`/`f64` under context (§4.H).
    IntLiteral,
    /// Untyped floating-point literal; collapses to `f32`/`f64` under context (§4.H).
    FloatLiteral,
}

impl PrimitiveType {
    #[must_use]
    pub const fn is_literal(self) -> bool {
        matches!(self, Self::IntLiteral | Self::FloatLiteral)
    }

    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(self, Self::I32 | Self::U32 | Self::IntLiteral)
    }

    #[must_use]
    pub const fn is_floating(self) -> bool {
        matches!(self, Self::F32 | Self::F64 | Self::FloatLiteral)
    }

    #[must_use]
    pub const fn is_numeric(self) -> bool {
        self.is_integer() || self.is_floating()
    }

    /// The default concrete type an untyped literal collapses to when nothing else constrains
    /// it (§4.H: `IntLiteral -> i32`, `FloatLiteral -> f32`).
    #[must_use]
    pub const fn default_concrete(self) -> Self {
        match self {
            Self::IntLiteral => Self::I32,
            Self::FloatLiteral => Self::F32,
            other => other,
        }
    }

    /// Packed/std140/std430 base alignment and size in bytes, for scalar fields.
    #[must_use]
    pub const fn scalar_size(self) -> u32 {
        match self {
            Self::Bool | Self::I32 | Self::U32 | Self::F32 => 4,
            Self::F64 => 8,
            Self::String | Self::IntLiteral | Self::FloatLiteral => 0,
        }
    }
}

/// A resource wrapper's buffer contents: always a struct type.
///
/// `name` is the struct identifier as written in source; `struct_id` is [`StructRef::UNRESOLVED`]
/// until the resolver looks `name` up and narrows it to the struct's stable index (§4.F). Kept
/// this way, rather than dropping `name` once resolved, so diagnostics after resolution can still
/// report the struct by its source name without a second context lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructRef {
    pub name: String,
    pub struct_id: StructId,
}

impl StructRef {
    /// Sentinel `StructId` meaning "not yet resolved"; no real struct ever registers under it
    /// (`SymbolTable::register` allocates indices starting at 0 and counting up).
    pub const UNRESOLVED: StructId = StructId::new(u64::MAX);

    #[must_use]
    pub fn unresolved(name: impl Into<String>) -> Self {
        Self { name: name.into(), struct_id: Self::UNRESOLVED }
    }

    #[must_use]
    pub fn resolved(name: impl Into<String>, struct_id: StructId) -> Self {
        Self { name: name.into(), struct_id }
    }

    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        self.struct_id.index() != Self::UNRESOLVED.index()
    }
}

/// The type system's sum type (§4.B).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Type {
    NoType,
    Primitive(PrimitiveType),
    Vector {
        component_count: u32,
        component_type: PrimitiveType,
    },
    Matrix {
        columns: u32,
        rows: u32,
        component_type: PrimitiveType,
    },
    Array {
        inner: Box<Type>,
        length: u32,
    },
    DynArray {
        inner: Box<Type>,
    },
    /// `target` is the aliased type; `name` is kept for diagnostics and re-emission.
    Alias {
        name: String,
        target: Box<Type>,
    },
    Struct(StructRef),
    Uniform(StructRef),
    Storage {
        structure: StructRef,
        access: AccessPolicy,
    },
    PushConstant(StructRef),
    Sampler {
        dimension: ImageDimension,
        sampled_type: PrimitiveType,
        depth: bool,
    },
    Texture {
        dimension: ImageDimension,
        sampled_type: PrimitiveType,
        format: ImageFormat,
        access: AccessPolicy,
    },
    Function(FunctionId),
    Method {
        object_type: Box<Type>,
        method_name: String,
    },
    Intrinsic(crate::enums::IntrinsicKind),
    /// A bare identifier in type position, pre-resolution (`let x: MyAlias;`, an alias's own
    /// target before the resolver narrows it, a struct field typed by another `alias`). The
    /// resolver looks the name up and replaces this with the concrete type it denotes; a fully
    /// resolved module never retains a `Named` (§4.F, §9 "Named(TypeId)" carried a stable index
    /// in an earlier draft of this port, but a context index the out-of-scope parser cannot
    /// itself allocate is unusable as a placeholder — the name string is what the parser actually
    /// has in hand).
    Named(String),
}

impl Type {
    #[must_use]
    pub fn vec2(component_type: PrimitiveType) -> Self {
        Self::Vector { component_count: 2, component_type }
    }

    #[must_use]
    pub fn vec3(component_type: PrimitiveType) -> Self {
        Self::Vector { component_count: 3, component_type }
    }

    #[must_use]
    pub fn vec4(component_type: PrimitiveType) -> Self {
        Self::Vector { component_count: 4, component_type }
    }

    #[must_use]
    pub const fn is_no_type(&self) -> bool {
        matches!(self, Self::NoType)
    }

    #[must_use]
    pub const fn is_alias(&self) -> bool {
        matches!(self, Self::Alias { .. })
    }

    /// Peels away `Alias` wrappers (possibly more than one, though the resolver never nests
    /// them) down to the first non-alias type. `T` and `Alias(name, T)` are *not* equal under
    /// `PartialEq`; this is the only path that unifies them, matching §4.B.
    #[must_use]
    pub fn resolve_alias(&self) -> &Self {
        let mut current = self;
        while let Self::Alias { target, .. } = current {
            current = target;
        }
        current
    }

    #[must_use]
    pub fn is_primitive(&self, primitive: PrimitiveType) -> bool {
        matches!(self.resolve_alias(), Self::Primitive(p) if *p == primitive)
    }

    #[must_use]
    pub fn as_primitive(&self) -> Option<PrimitiveType> {
        match self.resolve_alias() {
            Self::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_vector(&self) -> Option<(u32, PrimitiveType)> {
        match self.resolve_alias() {
            Self::Vector { component_count, component_type } => Some((*component_count, *component_type)),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_matrix(&self) -> Option<(u32, u32, PrimitiveType)> {
        match self.resolve_alias() {
            Self::Matrix { columns, rows, component_type } => Some((*columns, *rows, *component_type)),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_square_matrix(columns: u32, rows: u32) -> bool {
        columns == rows
    }

    /// Whether every component of this type (scalar, vector, or matrix) is a numeric
    /// primitive; used by constant-propagation's dispatch and by swizzle lowering.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        match self.resolve_alias() {
            Self::Primitive(p) => p.is_numeric(),
            Self::Vector { component_type, .. } | Self::Matrix { component_type, .. } => component_type.is_numeric(),
            _ => false,
        }
    }

    /// The scalar component type underlying a primitive, vector, or matrix type.
    #[must_use]
    pub fn component_type(&self) -> Option<PrimitiveType> {
        match self.resolve_alias() {
            Self::Primitive(p) => Some(*p),
            Self::Vector { component_type, .. } | Self::Matrix { component_type, .. } => Some(*component_type),
            _ => None,
        }
    }
}

/// Centralizes std140/std430/packed offset arithmetic (§4.B).
///
/// std140 rules: a `vec3` aligns as if it were a `vec4` (16 bytes) for both size and alignment;
/// arrays and matrix columns round their stride up to a 16-byte multiple. std430 relaxes array
/// and matrix-column rounding to the element's own base alignment (no 16-byte floor). `Packed`
/// applies no rounding at all: every field sits immediately after the previous one.
#[derive(Debug, Clone, Copy)]
pub struct FieldOffsets {
    pub layout: StructLayout,
}

impl FieldOffsets {
    #[must_use]
    pub const fn new(layout: StructLayout) -> Self {
        Self { layout }
    }

    fn round_up(value: u32, alignment: u32) -> u32 {
        if alignment == 0 {
            return value;
        }
        value.div_ceil(alignment) * alignment
    }

    /// Base alignment, in bytes, of `ty` under this layout.
    #[must_use]
    pub fn alignment(&self, ty: &Type) -> u32 {
        match ty.resolve_alias() {
            Type::Primitive(p) => p.scalar_size(),
            Type::Vector { component_count, component_type } => {
                let scalar = component_type.scalar_size();
                let natural = match component_count {
                    2 => scalar * 2,
                    3 | 4 => scalar * 4,
                    _ => scalar,
                };
                match self.layout {
                    StructLayout::Packed => natural,
                    StructLayout::Std140 | StructLayout::Std430 => natural,
                }
            }
            Type::Matrix { rows, component_type, .. } => {
                self.alignment(&Type::Vector { component_count: *rows, component_type: *component_type })
            }
            Type::Array { inner, .. } | Type::DynArray { inner } => {
                let inner_align = self.alignment(inner);
                match self.layout {
                    StructLayout::Std140 => Self::round_up(inner_align, 16),
                    StructLayout::Std430 | StructLayout::Packed => inner_align,
                }
            }
            Type::Struct(_) | Type::Uniform(_) | Type::Storage { .. } | Type::PushConstant(_) => match self.layout {
                StructLayout::Std140 => 16,
                StructLayout::Std430 | StructLayout::Packed => 4,
            },
            _ => 0,
        }
    }

    /// Size in bytes occupied by one instance of `ty` (before any trailing padding to the next
    /// field's alignment is added by the caller).
    #[must_use]
    pub fn size(&self, ty: &Type) -> u32 {
        match ty.resolve_alias() {
            Type::Primitive(p) => p.scalar_size(),
            Type::Vector { component_count, component_type } => component_type.scalar_size() * component_count,
            Type::Matrix { columns, rows, component_type } => {
                let column_ty = Type::Vector { component_count: *rows, component_type: *component_type };
                let column_align = self.alignment(&column_ty);
                let column_stride = match self.layout {
                    StructLayout::Std140 => Self::round_up(column_align, 16),
                    StructLayout::Std430 | StructLayout::Packed => column_align,
                };
                column_stride * columns
            }
            Type::Array { inner, length } => self.array_stride(inner) * length,
            Type::DynArray { inner } => self.array_stride(inner),
            _ => 0,
        }
    }

    /// The stride between consecutive elements of an array of `inner`.
    #[must_use]
    pub fn array_stride(&self, inner: &Type) -> u32 {
        let size = self.size(inner);
        let align = self.alignment(inner);
        match self.layout {
            StructLayout::Std140 => Self::round_up(size.max(align), 16),
            StructLayout::Std430 | StructLayout::Packed => Self::round_up(size, align.max(1)),
        }
    }

    /// Computes each field's byte offset in declaration order, returning the offsets and the
    /// struct's total (unpadded-at-the-end) size.
    #[must_use]
    pub fn field_offsets(&self, fields: &[Type]) -> (Vec<u32>, u32) {
        let mut offsets = Vec::with_capacity(fields.len());
        let mut cursor = 0u32;
        for field in fields {
            let align = self.alignment(field).max(1);
            cursor = Self::round_up(cursor, align);
            offsets.push(cursor);
            cursor += self.size(field);
        }
        (offsets, cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_not_equal_to_target_but_resolves() {
        let target = Type::Primitive(PrimitiveType::F32);
        let alias = Type::Alias { name: "MyFloat".to_owned(), target: Box::new(target.clone()) };
        assert_ne!(alias, target);
        assert_eq!(alias.resolve_alias(), &target);
    }

    #[test]
    fn std140_vec3_aligns_as_vec4() {
        let offsets = FieldOffsets::new(StructLayout::Std140);
        let vec3 = Type::vec3(PrimitiveType::F32);
        assert_eq!(offsets.alignment(&vec3), 16);
    }

    #[test]
    fn std140_array_of_f32_strides_to_16() {
        let offsets = FieldOffsets::new(StructLayout::Std140);
        let f32_ty = Type::Primitive(PrimitiveType::F32);
        assert_eq!(offsets.array_stride(&f32_ty), 16);
    }

    #[test]
    fn std430_array_of_f32_strides_to_4() {
        let offsets = FieldOffsets::new(StructLayout::Std430);
        let f32_ty = Type::Primitive(PrimitiveType::F32);
        assert_eq!(offsets.array_stride(&f32_ty), 4);
    }

    #[test]
    fn std140_mat4_column_stride_is_16() {
        let offsets = FieldOffsets::new(StructLayout::Std140);
        let mat4 = Type::Matrix { columns: 4, rows: 4, component_type: PrimitiveType::F32 };
        assert_eq!(offsets.size(&mat4), 16 * 4);
    }

    #[test]
    fn struct_field_offsets_respect_alignment() {
        let offsets = FieldOffsets::new(StructLayout::Std140);
        let fields = vec![Type::Primitive(PrimitiveType::F32), Type::vec3(PrimitiveType::F32)];
        let (offs, total) = offsets.field_offsets(&fields);
        assert_eq!(offs[0], 0);
        assert_eq!(offs[1], 16);
        assert_eq!(total, 32);
    }
}
