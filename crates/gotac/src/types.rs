//! Type registry: predeclared basic types plus every composite type the
//! program mentions.
//!
//! Composite types are keyed by a canonical Go-syntax name (`[5]int`,
//! `[]string`, `func(int, ...string) (int, bool)`), so structurally identical
//! types always share one entry. Named types declared inside a block are keyed
//! `name@scope` so shadowing definitions in sibling blocks stay distinct.

use std::collections::HashMap;
use std::fmt;

use crate::error::SemanticError;
use crate::value::ConstValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicKind {
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uintptr,
    Float32,
    Float64,
    Complex64,
    Complex128,
    Bool,
    String,
}

impl BasicKind {
    pub const ALL: [BasicKind; 17] = [
        BasicKind::Int,
        BasicKind::Int8,
        BasicKind::Int16,
        BasicKind::Int32,
        BasicKind::Int64,
        BasicKind::Uint,
        BasicKind::Uint8,
        BasicKind::Uint16,
        BasicKind::Uint32,
        BasicKind::Uint64,
        BasicKind::Uintptr,
        BasicKind::Float32,
        BasicKind::Float64,
        BasicKind::Complex64,
        BasicKind::Complex128,
        BasicKind::Bool,
        BasicKind::String,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            BasicKind::Int => "int",
            BasicKind::Int8 => "int8",
            BasicKind::Int16 => "int16",
            BasicKind::Int32 => "int32",
            BasicKind::Int64 => "int64",
            BasicKind::Uint => "uint",
            BasicKind::Uint8 => "uint8",
            BasicKind::Uint16 => "uint16",
            BasicKind::Uint32 => "uint32",
            BasicKind::Uint64 => "uint64",
            BasicKind::Uintptr => "uintptr",
            BasicKind::Float32 => "float32",
            BasicKind::Float64 => "float64",
            BasicKind::Complex64 => "complex64",
            BasicKind::Complex128 => "complex128",
            BasicKind::Bool => "bool",
            BasicKind::String => "string",
        }
    }

    /// Size in bytes; strings have no fixed storage.
    pub const fn storage(self) -> Option<u64> {
        Some(match self {
            BasicKind::Int8 | BasicKind::Uint8 | BasicKind::Bool => 1,
            BasicKind::Int16 | BasicKind::Uint16 => 2,
            BasicKind::Int32 | BasicKind::Uint32 | BasicKind::Float32 => 4,
            BasicKind::Int
            | BasicKind::Int64
            | BasicKind::Uint
            | BasicKind::Uint64
            | BasicKind::Uintptr
            | BasicKind::Float64
            | BasicKind::Complex64 => 8,
            BasicKind::Complex128 => 16,
            BasicKind::String => return None,
        })
    }

    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            BasicKind::Int
                | BasicKind::Int8
                | BasicKind::Int16
                | BasicKind::Int32
                | BasicKind::Int64
                | BasicKind::Uint
                | BasicKind::Uint8
                | BasicKind::Uint16
                | BasicKind::Uint32
                | BasicKind::Uint64
                | BasicKind::Uintptr
        )
    }

    pub const fn is_unsigned(self) -> bool {
        matches!(
            self,
            BasicKind::Uint
                | BasicKind::Uint8
                | BasicKind::Uint16
                | BasicKind::Uint32
                | BasicKind::Uint64
                | BasicKind::Uintptr
        )
    }

    pub const fn is_float(self) -> bool {
        matches!(self, BasicKind::Float32 | BasicKind::Float64)
    }

    pub const fn is_complex(self) -> bool {
        matches!(self, BasicKind::Complex64 | BasicKind::Complex128)
    }

    pub const fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float() || self.is_complex()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: TypeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Signature {
    pub params: Vec<TypeId>,
    /// The last parameter is `...T`; its entry in `params` is the slice `[]T`.
    pub variadic: bool,
    pub results: Vec<TypeId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    Basic(BasicKind),
    Array { elem: TypeId, len: u64 },
    Slice { elem: TypeId },
    Struct { fields: Vec<Field> },
    Function(Signature),
    Named { underlying: TypeId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClass {
    Basic,
    Array,
    Slice,
    Struct,
    Function,
    Named,
}

impl TypeKind {
    pub const fn class(&self) -> TypeClass {
        match self {
            TypeKind::Basic(_) => TypeClass::Basic,
            TypeKind::Array { .. } => TypeClass::Array,
            TypeKind::Slice { .. } => TypeClass::Slice,
            TypeKind::Struct { .. } => TypeClass::Struct,
            TypeKind::Function(_) => TypeClass::Function,
            TypeKind::Named { .. } => TypeClass::Named,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Type {
    pub name: String,
    pub kind: TypeKind,
    pub storage: Option<u64>,
}

#[derive(Debug)]
pub struct TypeTable {
    types: Vec<Type>,
    by_key: HashMap<String, TypeId>,
    basics: [TypeId; 17],
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeTable {
    pub fn new() -> Self {
        let mut table = Self {
            types: Vec::with_capacity(64),
            by_key: HashMap::with_capacity(64),
            basics: [TypeId(0); 17],
        };
        for (i, kind) in BasicKind::ALL.into_iter().enumerate() {
            let id = table.push(
                kind.name().to_string(),
                Type {
                    name: kind.name().to_string(),
                    kind: TypeKind::Basic(kind),
                    storage: kind.storage(),
                },
            );
            table.basics[i] = id;
        }
        // Predeclared aliases.
        table.by_key.insert("byte".into(), table.basic(BasicKind::Uint8));
        table.by_key.insert("rune".into(), table.basic(BasicKind::Int32));
        table
    }

    fn push(&mut self, key: String, ty: Type) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty);
        self.by_key.insert(key, id);
        id
    }

    #[inline]
    pub fn basic(&self, kind: BasicKind) -> TypeId {
        let idx = BasicKind::ALL.iter().position(|&k| k == kind).unwrap_or(0);
        self.basics[idx]
    }

    #[inline]
    pub fn int(&self) -> TypeId {
        self.basic(BasicKind::Int)
    }

    #[inline]
    pub fn float64(&self) -> TypeId {
        self.basic(BasicKind::Float64)
    }

    #[inline]
    pub fn bool(&self) -> TypeId {
        self.basic(BasicKind::Bool)
    }

    #[inline]
    pub fn string(&self) -> TypeId {
        self.basic(BasicKind::String)
    }

    #[inline]
    pub fn rune(&self) -> TypeId {
        self.basic(BasicKind::Int32)
    }

    pub fn is_defined(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    pub fn lookup(&self, key: &str) -> Option<TypeId> {
        self.by_key.get(key).copied()
    }

    pub fn get_type(&self, key: &str) -> Option<&Type> {
        self.lookup(key).map(|id| &self.types[id.index()])
    }

    #[inline]
    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.index()]
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Registers `ty` under `key`.
    ///
    /// With `check` set an existing key is a redefinition error; without it
    /// the existing entry is returned, which is how synthesized composite
    /// types are re-derived.
    pub fn add_type(&mut self, key: &str, ty: Type, check: bool) -> Result<TypeId, SemanticError> {
        match self.by_key.get(key) {
            Some(_) if check => Err(SemanticError::TypeRedefined {
                name: ty.name.clone(),
            }),
            Some(&id) => Ok(id),
            None => Ok(self.push(key.to_string(), ty)),
        }
    }

    fn derived(&mut self, kind: TypeKind, storage: Option<u64>) -> TypeId {
        let name = self.render(&kind);
        if let Some(id) = self.lookup(&name) {
            return id;
        }
        let key = name.clone();
        self.push(key, Type {
            name,
            kind,
            storage,
        })
    }

    pub fn array_of(&mut self, elem: TypeId, len: u64) -> TypeId {
        let storage = self.storage(elem).and_then(|s| s.checked_mul(len));
        self.derived(TypeKind::Array { elem, len }, storage)
    }

    pub fn slice_of(&mut self, elem: TypeId) -> TypeId {
        self.derived(TypeKind::Slice { elem }, None)
    }

    pub fn function(&mut self, sig: Signature) -> TypeId {
        self.derived(TypeKind::Function(sig), Some(8))
    }

    pub fn struct_of(&mut self, fields: Vec<Field>) -> TypeId {
        let storage = fields
            .iter()
            .try_fold(0u64, |acc, f| acc.checked_add(self.storage(f.ty)?));
        self.derived(TypeKind::Struct { fields }, storage)
    }

    /// `type name underlying` declared in `scope`.
    pub fn define_named(
        &mut self,
        name: &str,
        scope: &str,
        underlying: TypeId,
    ) -> Result<TypeId, SemanticError> {
        let underlying = self.underlying(underlying);
        let storage = self.storage(underlying);
        self.add_type(
            &Self::scoped_key(name, scope),
            Type {
                name: name.to_string(),
                kind: TypeKind::Named { underlying },
                storage,
            },
            true,
        )
    }

    /// `type name = target` declared in `scope`.
    pub fn alias(&mut self, name: &str, scope: &str, target: TypeId) -> Result<TypeId, SemanticError> {
        let key = Self::scoped_key(name, scope);
        if self.by_key.contains_key(&key) {
            return Err(SemanticError::TypeRedefined {
                name: name.to_string(),
            });
        }
        self.by_key.insert(key, target);
        Ok(target)
    }

    pub fn scoped_key(name: &str, scope: &str) -> String {
        if scope == crate::symbols::ROOT_SCOPE {
            name.to_string()
        } else {
            format!("{name}@{scope}")
        }
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn underlying(&self, id: TypeId) -> TypeId {
        match self.get(id).kind {
            TypeKind::Named { underlying } => underlying,
            _ => id,
        }
    }

    fn basic_kind(&self, id: TypeId) -> Option<BasicKind> {
        match self.get(self.underlying(id)).kind {
            TypeKind::Basic(k) => Some(k),
            _ => None,
        }
    }

    pub fn is_integer(&self, id: TypeId) -> bool {
        self.basic_kind(id).is_some_and(BasicKind::is_integer)
    }

    pub fn is_float(&self, id: TypeId) -> bool {
        self.basic_kind(id).is_some_and(BasicKind::is_float)
    }

    pub fn is_numeric(&self, id: TypeId) -> bool {
        self.basic_kind(id).is_some_and(BasicKind::is_numeric)
    }

    pub fn is_bool(&self, id: TypeId) -> bool {
        self.basic_kind(id) == Some(BasicKind::Bool)
    }

    pub fn is_string(&self, id: TypeId) -> bool {
        self.basic_kind(id) == Some(BasicKind::String)
    }

    pub fn is_ordered(&self, id: TypeId) -> bool {
        self.basic_kind(id)
            .is_some_and(|k| k.is_integer() || k.is_float() || k == BasicKind::String)
    }

    /// Slices and functions only compare against `nil`, which is not modelled.
    pub fn is_comparable(&self, id: TypeId) -> bool {
        match &self.get(self.underlying(id)).kind {
            TypeKind::Basic(_) => true,
            TypeKind::Array { elem, .. } => self.is_comparable(*elem),
            TypeKind::Struct { fields } => fields.iter().all(|f| self.is_comparable(f.ty)),
            TypeKind::Slice { .. } | TypeKind::Function(_) | TypeKind::Named { .. } => false,
        }
    }

    /// Element type of arrays, slices and strings.
    pub fn elem(&self, id: TypeId) -> Option<TypeId> {
        match self.get(self.underlying(id)).kind {
            TypeKind::Array { elem, .. } | TypeKind::Slice { elem } => Some(elem),
            TypeKind::Basic(BasicKind::String) => Some(self.rune()),
            _ => None,
        }
    }

    pub fn array_len(&self, id: TypeId) -> Option<u64> {
        match self.get(self.underlying(id)).kind {
            TypeKind::Array { len, .. } => Some(len),
            _ => None,
        }
    }

    pub fn signature(&self, id: TypeId) -> Option<&Signature> {
        match &self.get(self.underlying(id)).kind {
            TypeKind::Function(sig) => Some(sig),
            _ => None,
        }
    }

    pub fn fields(&self, id: TypeId) -> Option<&[Field]> {
        match &self.get(self.underlying(id)).kind {
            TypeKind::Struct { fields } => Some(fields),
            _ => None,
        }
    }

    pub fn storage(&self, id: TypeId) -> Option<u64> {
        self.get(id).storage
    }

    /// Constant `value` represented in type `target`; `None` when a float
    /// does not fit an integer type.
    pub fn convert_const(&self, value: &ConstValue, target: TypeId) -> Option<ConstValue> {
        if self.is_float(target) {
            Some(value.to_float())
        } else if self.is_integer(target) {
            value.to_int()
        } else {
            Some(value.clone())
        }
    }

    /// `v` as stored in integer type `ty`: two's complement, wrapped to the
    /// type's width. `None` for non-integer types and for negative values of a
    /// 64-bit unsigned type, which have no `i64` representation.
    pub fn wrap_int(&self, v: i64, ty: TypeId) -> Option<i64> {
        let kind = self.basic_kind(ty).filter(|k| k.is_integer())?;
        let bits = kind.storage()? * 8;
        if bits >= 64 {
            return (!kind.is_unsigned() || v >= 0).then_some(v);
        }
        let modulus = 1i64 << bits;
        let v = v.rem_euclid(modulus);
        Some(if !kind.is_unsigned() && v >= modulus / 2 {
            v - modulus
        } else {
            v
        })
    }

    /// Byte offset of `field` inside struct type `id`.
    pub fn field_offset(&self, id: TypeId, field: &str) -> Option<(u64, TypeId)> {
        let mut offset = 0u64;
        for f in self.fields(id)? {
            if f.name == field {
                return Some((offset, f.ty));
            }
            offset += self.storage(f.ty).unwrap_or(8);
        }
        None
    }

    pub fn name(&self, id: TypeId) -> &str {
        &self.get(id).name
    }

    /// Display name with `unknown` for unresolved types.
    pub fn display(&self, id: Option<TypeId>) -> String {
        id.map_or_else(|| "unknown".to_string(), |id| self.name(id).to_string())
    }

    fn render(&self, kind: &TypeKind) -> String {
        match kind {
            TypeKind::Basic(k) => k.name().to_string(),
            TypeKind::Array { elem, len } => format!("[{len}]{}", self.name(*elem)),
            TypeKind::Slice { elem } => format!("[]{}", self.name(*elem)),
            TypeKind::Struct { fields } => {
                let body: Vec<String> = fields
                    .iter()
                    .map(|f| format!("{} {}", f.name, self.name(f.ty)))
                    .collect();
                format!("struct{{{}}}", body.join("; "))
            }
            TypeKind::Function(sig) => self.render_signature(sig),
            TypeKind::Named { underlying } => self.name(*underlying).to_string(),
        }
    }

    fn render_signature(&self, sig: &Signature) -> String {
        let last = sig.params.len().saturating_sub(1);
        let params: Vec<String> = sig
            .params
            .iter()
            .enumerate()
            .map(|(i, &p)| match (sig.variadic && i == last, self.elem(p)) {
                (true, Some(elem)) => format!("...{}", self.name(elem)),
                _ => self.name(p).to_string(),
            })
            .collect();
        let mut out = format!("func({})", params.join(", "));
        match sig.results.as_slice() {
            [] => {}
            [one] => {
                out.push(' ');
                out.push_str(self.name(*one));
            }
            many => {
                let rs: Vec<&str> = many.iter().map(|&r| self.name(r)).collect();
                out.push_str(&format!(" ({})", rs.join(", ")));
            }
        }
        out
    }
}

impl fmt::Display for TypeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<(&String, &TypeId)> = self.by_key.iter().collect();
        keys.sort_by_key(|(k, id)| (**id, k.as_str()));

        writeln!(f, "{:<32} {:<10} {:>8}", "TYPE", "CLASS", "STORAGE")?;
        for (key, &id) in keys {
            let ty = self.get(id);
            let storage = ty.storage.map_or_else(|| "-".to_string(), |s| s.to_string());
            writeln!(f, "{:<32} {:<10} {:>8}", key, format!("{:?}", ty.kind.class()), storage)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_share_entries() {
        let t = TypeTable::new();
        assert_eq!(t.lookup("byte"), Some(t.basic(BasicKind::Uint8)));
        assert_eq!(t.lookup("rune"), t.lookup("int32"));
    }

    #[test]
    fn array_storage_is_length_times_element() {
        let mut t = TypeTable::new();
        let a = t.array_of(t.int(), 5);
        assert_eq!(t.name(a), "[5]int");
        assert_eq!(t.storage(a), Some(40));
        assert_eq!(t.array_of(t.int(), 5), a);
    }

    #[test]
    fn signature_names_are_canonical() {
        let mut t = TypeTable::new();
        let strings = t.slice_of(t.string());
        let f = t.function(Signature {
            params: vec![t.int(), strings],
            variadic: true,
            results: vec![t.int(), t.bool()],
        });
        assert_eq!(t.name(f), "func(int, ...string) (int, bool)");
    }
}
