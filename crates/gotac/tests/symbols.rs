use gotac::error::Pos;
use gotac::symbols::{Declaration, SymbolKind, SymbolTable, BUILTINS, ROOT_SCOPE};
use gotac::types::TypeTable;
use gotac::value::ConstValue;
use proptest::prelude::*;

fn var(line: u32, types: &TypeTable) -> Declaration {
    Declaration::new(SymbolKind::Var, Pos::new(line, 1), Some(types.int()))
}

#[test]
fn builtins_are_predeclared_at_root() {
    let table = SymbolTable::new();
    assert_eq!(table.current_scope(), ROOT_SCOPE);
    assert_eq!(table.depth(), 1);
    for name in BUILTINS {
        let id = table.get_declared(name).expect(name);
        let sym = table.symbol(id);
        assert_eq!(sym.kind, SymbolKind::Builtin);
        assert_eq!(sym.scope_id, ROOT_SCOPE);
    }
}

#[test]
fn scope_paths_number_siblings_and_children() {
    let mut t = SymbolTable::new();
    assert_eq!(t.enter_scope(), "1.1");
    assert_eq!(t.enter_scope(), "1.1.1");
    t.leave_scope();
    assert_eq!(t.enter_scope(), "1.1.2");
    t.leave_scope();
    t.leave_scope();
    assert_eq!(t.enter_scope(), "1.2");
    // Children restart under a new parent.
    assert_eq!(t.enter_scope(), "1.2.1");
    t.leave_scope();
    t.leave_scope();
    assert_eq!(t.current_scope(), ROOT_SCOPE);
}

#[test]
fn root_scope_is_never_left() {
    let mut t = SymbolTable::new();
    t.leave_scope();
    t.leave_scope();
    assert_eq!(t.current_scope(), ROOT_SCOPE);
    assert_eq!(t.depth(), 1);
}

#[test]
fn redeclaration_in_same_scope_is_rejected() {
    let types = TypeTable::new();
    let mut t = SymbolTable::new();
    t.enter_scope();
    let first = t.declare_new_variable("x", var(3, &types)).unwrap();
    let err = t.declare_new_variable("x", var(4, &types)).unwrap_err();
    assert_eq!(err.existing, first);
    assert_eq!(err.previous, Some(Pos::new(3, 1)));
    assert_eq!(err.to_string(), "`x` redeclared in this block");
}

#[test]
fn shadowing_in_inner_scope() {
    let types = TypeTable::new();
    let mut t = SymbolTable::new();
    t.enter_scope();
    let outer = t.declare_new_variable("x", var(2, &types)).unwrap();
    t.enter_scope();
    let inner = t.declare_new_variable("x", var(3, &types)).unwrap();
    assert_ne!(outer, inner);
    assert_eq!(t.get_symbol("x"), Some(inner));
    assert_eq!(t.symbol(inner).scope_id, "1.1.1");
    t.leave_scope();
    assert_eq!(t.get_symbol("x"), Some(outer));
}

#[test]
fn blank_identifier_may_repeat() {
    let types = TypeTable::new();
    let mut t = SymbolTable::new();
    t.enter_scope();
    let a = t.declare_new_variable("_", var(1, &types)).unwrap();
    let b = t.declare_new_variable("_", var(2, &types)).unwrap();
    assert_ne!(a, b);
}

#[test]
fn forward_reference_resolves_to_later_declaration() {
    let types = TypeTable::new();
    let mut t = SymbolTable::new();
    let pending = t.add_global_if_not_exists("helper");
    assert!(!t.symbol(pending).is_declared());
    assert_eq!(t.get_declared("helper"), None);
    assert_eq!(t.get_symbol("helper"), Some(pending));

    let decl = Declaration::new(SymbolKind::Func, Pos::new(9, 6), Some(types.int()));
    let declared = t.declare_new_variable("helper", decl).unwrap();
    assert_eq!(declared, pending);
    assert!(t.is_declared("helper"));
}

#[test]
fn constants_carry_their_value() {
    let types = TypeTable::new();
    let mut t = SymbolTable::new();
    let decl = Declaration::new(SymbolKind::Const, Pos::new(1, 7), Some(types.int()))
        .with_value(Some(ConstValue::Int(3)));
    let id = t.declare_new_variable("size", decl).unwrap();
    let sym = t.symbol(id);
    assert!(sym.is_const);
    assert_eq!(sym.constant(), Some(&ConstValue::Int(3)));

    // Constants ignore the variable const flag.
    t.clear_const_flag(id);
    assert_eq!(t.symbol(id).constant(), Some(&ConstValue::Int(3)));
}

#[test]
fn const_flag_tracks_constant_stores() {
    let types = TypeTable::new();
    let mut t = SymbolTable::new();
    t.enter_scope();
    let id = t.declare_new_variable("x", var(2, &types)).unwrap();
    assert_eq!(t.symbol(id).constant(), None);

    t.set_const_flag(id, ConstValue::Int(5));
    assert!(t.symbol(id).const_flag);
    assert_eq!(t.symbol(id).constant(), Some(&ConstValue::Int(5)));

    t.clear_const_flag(id);
    assert!(!t.symbol(id).const_flag);
    assert_eq!(t.symbol(id).constant(), None);
}

#[test]
fn uses_are_recorded_and_retracted() {
    let types = TypeTable::new();
    let mut t = SymbolTable::new();
    t.enter_scope();
    let id = t.declare_new_variable("x", var(2, &types)).unwrap();
    t.record_use(id, 4);
    t.record_use(id, 7);
    t.retract_use(id, 4);
    assert_eq!(t.symbol(id).uses, vec![7]);
}

#[test]
fn unused_locals_only() {
    let types = TypeTable::new();
    let mut t = SymbolTable::new();
    t.declare_new_variable("global", var(1, &types)).unwrap();
    t.enter_scope();
    let p = Declaration::new(SymbolKind::Param, Pos::new(2, 8), Some(types.int()));
    t.declare_new_variable("arg", p).unwrap();
    let unused = t.declare_new_variable("unused", var(3, &types)).unwrap();
    let used = t.declare_new_variable("used", var(4, &types)).unwrap();
    t.declare_new_variable("_", var(5, &types)).unwrap();
    t.record_use(used, 6);

    assert_eq!(t.check_unused(), vec![unused]);
}

#[test]
fn display_lists_declared_symbols_without_builtins() {
    let types = TypeTable::new();
    let mut t = SymbolTable::new();
    let decl = Declaration::new(SymbolKind::Const, Pos::new(3, 7), Some(types.int()))
        .with_value(Some(ConstValue::Int(8)));
    t.declare_new_variable("size", decl).unwrap();
    t.enter_scope();
    let x = t.declare_new_variable("x", var(6, &types)).unwrap();
    t.record_use(x, 7);

    let dump = t.to_string();
    let lines: Vec<&str> = dump.lines().collect();
    assert_eq!(lines.len(), 3, "{dump}");
    assert!(lines[0].starts_with("NAME"));
    assert!(lines[1].starts_with("size"));
    assert!(lines[1].contains("3:7"));
    assert!(lines[1].contains("true"));
    assert!(lines[2].starts_with("x"));
    assert!(lines[2].contains("1.1"));
    assert!(lines[2].ends_with("[7]"));
    assert!(!dump.contains("println"));
}

proptest! {
    #[test]
    fn open_scopes_have_unique_paths(ops in proptest::collection::vec(any::<bool>(), 0..64)) {
        let mut t = SymbolTable::new();
        let mut seen = std::collections::HashSet::new();
        seen.insert(ROOT_SCOPE.to_string());
        for enter in ops {
            if enter {
                let path = t.enter_scope().to_string();
                prop_assert!(seen.insert(path.clone()), "scope {path} opened twice");
                prop_assert_eq!(path.split('.').count(), t.depth());
            } else {
                t.leave_scope();
            }
        }
    }
}
