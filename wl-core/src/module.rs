//! Modules and lexical scopes.
//!
//! A `Module` is the semantic counterpart of one parsed file: a type
//! table, an import table, and a tree of scopes rooted at the global
//! scope. Scopes live in an arena on the module and refer to each
//! other by `ScopeId`, parent edges for upward name lookup and child
//! edges for ownership.

use std::collections::HashMap;

use crate::source::FileId;
use crate::types::{ImportId, Type, TypeId, TypeTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeId(pub u32);

/// A value-namespace resolution: variables and functions share the
/// lookup path but mean different things to assignment and codegen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueDef {
    Variable(TypeId),
    Function(TypeId),
}

impl ValueDef {
    pub fn ty(self) -> TypeId {
        match self {
            ValueDef::Variable(ty) | ValueDef::Function(ty) => ty,
        }
    }
}

/// One node in the lexical name tree. Four namespaces: types,
/// functions, variables, imports.
#[derive(Debug, Default)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    pub types: HashMap<String, TypeId>,
    pub functions: HashMap<String, TypeId>,
    pub variables: HashMap<String, TypeId>,
    pub imports: HashMap<String, ImportId>,
}

#[derive(Debug)]
pub struct Module {
    pub file: FileId,
    pub types: TypeTable,
    imports: Vec<FileId>,
    scopes: Vec<Scope>,
}

impl Module {
    pub const GLOBAL: ScopeId = ScopeId(0);

    /// Create a module with its global scope populated with the
    /// nameable builtin types and the `inlineC` intrinsic (the
    /// target of extern lowering).
    pub fn new(file: FileId) -> Module {
        let mut module = Module {
            file,
            types: TypeTable::new(),
            imports: Vec::new(),
            scopes: vec![Scope::default()],
        };

        let global = &mut module.scopes[0];
        global.types.insert("int".to_string(), TypeTable::INT);
        global.types.insert("float".to_string(), TypeTable::FLOAT);
        global.types.insert("char".to_string(), TypeTable::CHAR);
        global.types.insert("bool".to_string(), TypeTable::BOOL);

        let string = module.types.intern(Type::Pointer { to: TypeTable::CHAR });
        let inline_c = module.types.intern(Type::Function {
            params: vec![string],
            returns: TypeTable::UNIT,
        });
        module.scopes[0]
            .functions
            .insert("inlineC".to_string(), inline_c);

        module
    }

    pub fn new_scope(&mut self, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            parent: Some(parent),
            ..Scope::default()
        });
        self.scopes[parent.0 as usize].children.push(id);
        id
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0 as usize]
    }

    pub fn add_import(&mut self, name: &str, target: FileId) -> ImportId {
        let id = ImportId(self.imports.len() as u32);
        self.imports.push(target);
        self.scopes[0].imports.insert(name.to_string(), id);
        id
    }

    pub fn import_target(&self, id: ImportId) -> FileId {
        self.imports[id.0 as usize]
    }

    pub fn lookup_type(&self, scope: ScopeId, name: &str) -> Option<TypeId> {
        self.walk(scope, |s| s.types.get(name).copied())
    }

    pub fn lookup_function(&self, scope: ScopeId, name: &str) -> Option<TypeId> {
        self.walk(scope, |s| s.functions.get(name).copied())
    }

    /// Value-namespace lookup: at each scope, variables shadow
    /// functions; then the parent is consulted.
    pub fn lookup_value(&self, scope: ScopeId, name: &str) -> Option<ValueDef> {
        self.walk(scope, |s| {
            s.variables
                .get(name)
                .copied()
                .map(ValueDef::Variable)
                .or_else(|| s.functions.get(name).copied().map(ValueDef::Function))
        })
    }

    pub fn lookup_import(&self, scope: ScopeId, name: &str) -> Option<ImportId> {
        self.walk(scope, |s| s.imports.get(name).copied())
    }

    fn walk<T>(&self, scope: ScopeId, f: impl Fn(&Scope) -> Option<T>) -> Option<T> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = self.scope(id);
            if let Some(found) = f(s) {
                return Some(found);
            }
            current = s.parent;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_type_names_resolve_in_the_global_scope() {
        let module = Module::new(FileId(0));
        assert_eq!(
            module.lookup_type(Module::GLOBAL, "int"),
            Some(TypeTable::INT)
        );
        assert_eq!(
            module.lookup_type(Module::GLOBAL, "bool"),
            Some(TypeTable::BOOL)
        );
        assert_eq!(module.lookup_type(Module::GLOBAL, "string"), None);
    }

    #[test]
    fn the_prelude_provides_inline_c() {
        let module = Module::new(FileId(0));
        let ty = module
            .lookup_function(Module::GLOBAL, "inlineC")
            .expect("inlineC must be preluded");
        let Type::Function { params, returns } = module.types.get(ty) else {
            panic!("inlineC must have a function type");
        };
        assert_eq!(params.len(), 1);
        assert_eq!(*returns, TypeTable::UNIT);
    }

    #[test]
    fn child_scopes_shadow_and_fall_back_to_parents() {
        let mut module = Module::new(FileId(0));
        let outer = module.new_scope(Module::GLOBAL);
        let inner = module.new_scope(outer);

        module
            .scope_mut(outer)
            .variables
            .insert("x".to_string(), TypeTable::INT);
        module
            .scope_mut(inner)
            .variables
            .insert("x".to_string(), TypeTable::FLOAT);

        assert_eq!(
            module.lookup_value(inner, "x"),
            Some(ValueDef::Variable(TypeTable::FLOAT))
        );
        assert_eq!(
            module.lookup_value(outer, "x"),
            Some(ValueDef::Variable(TypeTable::INT))
        );
        assert_eq!(module.lookup_value(inner, "y"), None);
    }

    #[test]
    fn variables_shadow_functions_in_the_same_scope() {
        let mut module = Module::new(FileId(0));
        let scope = module.new_scope(Module::GLOBAL);
        module
            .scope_mut(scope)
            .variables
            .insert("inlineC".to_string(), TypeTable::INT);
        assert_eq!(
            module.lookup_value(scope, "inlineC"),
            Some(ValueDef::Variable(TypeTable::INT))
        );
    }
}
