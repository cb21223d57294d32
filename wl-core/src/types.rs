//! Per-module type table.
//!
//! Every module owns one `TypeTable`; a `TypeId` is only meaningful
//! inside the table that produced it. Cross-module references are
//! expressed as `Type::Extern`, which names an import slot plus a
//! `TypeId` in the imported module's table.
//!
//! `Pointer`, `Function` and `Extern` are value types and interned,
//! so equal shapes share one id and type equality inside a module is
//! id equality. Structs are nominal: each `struct` definition gets
//! its own id regardless of field shape.

use std::collections::HashMap;

/// Index into a module's type table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl TypeId {
    /// Builtins occupy ids 0..5 in every module, so they can cross
    /// module boundaries without an `Extern` wrapper.
    pub fn is_builtin(self) -> bool {
        self.0 < 5
    }
}

/// Index into a module's import table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImportId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Unit,
    Int,
    Float,
    Char,
    Bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Builtin(Builtin),
    Pointer {
        to: TypeId,
    },
    /// Nominal; fields stay empty until the contents phase fills
    /// them in declaration order.
    Struct {
        name: String,
        fields: Vec<(String, TypeId)>,
    },
    Function {
        params: Vec<TypeId>,
        returns: TypeId,
    },
    /// A type defined in another module, reachable through `import`.
    Extern {
        import: ImportId,
        ty: TypeId,
    },
}

#[derive(Debug)]
pub struct TypeTable {
    types: Vec<Type>,
    interned: HashMap<Type, TypeId>,
}

impl TypeTable {
    pub const UNIT: TypeId = TypeId(0);
    pub const INT: TypeId = TypeId(1);
    pub const FLOAT: TypeId = TypeId(2);
    pub const CHAR: TypeId = TypeId(3);
    pub const BOOL: TypeId = TypeId(4);

    /// Builtins occupy the same fixed ids in every module's table.
    pub fn new() -> TypeTable {
        let mut table = TypeTable {
            types: Vec::new(),
            interned: HashMap::new(),
        };
        for builtin in [
            Builtin::Unit,
            Builtin::Int,
            Builtin::Float,
            Builtin::Char,
            Builtin::Bool,
        ] {
            let ty = Type::Builtin(builtin);
            let id = TypeId(table.types.len() as u32);
            table.types.push(ty.clone());
            table.interned.insert(ty, id);
        }
        table
    }

    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.0 as usize]
    }

    /// Intern a value type (builtin, pointer, function or extern).
    /// Equal shapes return the same id.
    pub fn intern(&mut self, ty: Type) -> TypeId {
        debug_assert!(
            !matches!(ty, Type::Struct { .. }),
            "structs are nominal; use declare_struct"
        );
        if let Some(&id) = self.interned.get(&ty) {
            return id;
        }
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty.clone());
        self.interned.insert(ty, id);
        id
    }

    /// Allocate a fresh struct type with no fields yet.
    pub fn declare_struct(&mut self, name: &str) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(Type::Struct {
            name: name.to_string(),
            fields: Vec::new(),
        });
        id
    }

    /// Fill in a struct declared earlier with `declare_struct`.
    pub fn set_struct_fields(&mut self, id: TypeId, fields: Vec<(String, TypeId)>) {
        match &mut self.types[id.0 as usize] {
            Type::Struct { fields: slot, .. } => *slot = fields,
            other => panic!("set_struct_fields on a non-struct type: {other:?}"),
        }
    }

    pub fn is_numeric(&self, id: TypeId) -> bool {
        id == Self::INT || id == Self::FLOAT
    }

    pub fn is_pointer(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Pointer { .. })
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for TypeTable {
    fn default() -> TypeTable {
        TypeTable::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_have_fixed_ids() {
        let table = TypeTable::new();
        assert_eq!(table.get(TypeTable::UNIT), &Type::Builtin(Builtin::Unit));
        assert_eq!(table.get(TypeTable::INT), &Type::Builtin(Builtin::Int));
        assert_eq!(table.get(TypeTable::FLOAT), &Type::Builtin(Builtin::Float));
        assert_eq!(table.get(TypeTable::CHAR), &Type::Builtin(Builtin::Char));
        assert_eq!(table.get(TypeTable::BOOL), &Type::Builtin(Builtin::Bool));
    }

    #[test]
    fn interning_deduplicates_value_types() {
        let mut table = TypeTable::new();
        let p1 = table.intern(Type::Pointer { to: TypeTable::CHAR });
        let p2 = table.intern(Type::Pointer { to: TypeTable::CHAR });
        assert_eq!(p1, p2);

        let f1 = table.intern(Type::Function {
            params: vec![p1],
            returns: TypeTable::INT,
        });
        let f2 = table.intern(Type::Function {
            params: vec![p2],
            returns: TypeTable::INT,
        });
        assert_eq!(f1, f2);

        let other = table.intern(Type::Pointer { to: TypeTable::INT });
        assert_ne!(p1, other);
    }

    #[test]
    fn structs_are_nominal() {
        let mut table = TypeTable::new();
        let a = table.declare_struct("A");
        let b = table.declare_struct("B");
        assert_ne!(a, b);

        table.set_struct_fields(a, vec![("x".to_string(), TypeTable::INT)]);
        table.set_struct_fields(b, vec![("x".to_string(), TypeTable::INT)]);
        // same shape, still different types
        assert_ne!(a, b);
    }
}
