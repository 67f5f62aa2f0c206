use gotac::error::SemanticError;
use gotac::symbols::ROOT_SCOPE;
use gotac::types::{BasicKind, Field, Signature, Type, TypeClass, TypeKind, TypeTable};
use gotac::value::ConstValue;

#[test]
fn predeclared_types() {
    let t = TypeTable::new();
    for kind in BasicKind::ALL {
        let id = t.lookup(kind.name()).expect(kind.name());
        assert_eq!(t.name(id), kind.name());
        assert_eq!(t.get(id).kind.class(), TypeClass::Basic);
    }
    assert_eq!(t.storage(t.int()), Some(8));
    assert_eq!(t.storage(t.bool()), Some(1));
    assert_eq!(t.storage(t.string()), None);
    assert_eq!(t.storage(t.basic(BasicKind::Complex128)), Some(16));
}

#[test]
fn byte_and_rune_are_aliases() {
    let t = TypeTable::new();
    assert_eq!(t.lookup("byte"), Some(t.basic(BasicKind::Uint8)));
    assert_eq!(t.rune(), t.basic(BasicKind::Int32));
    assert_eq!(t.storage(t.rune()), Some(4));
}

#[test]
fn predicates() {
    let t = TypeTable::new();
    assert!(t.is_integer(t.int()));
    assert!(!t.is_integer(t.float64()));
    assert!(t.is_float(t.float64()));
    assert!(t.is_numeric(t.basic(BasicKind::Complex64)));
    assert!(t.is_bool(t.bool()));
    assert!(t.is_string(t.string()));
    assert!(t.is_ordered(t.string()));
    assert!(!t.is_ordered(t.bool()));
    assert!(t.is_comparable(t.bool()));
}

#[test]
fn composite_types_are_interned() {
    let mut t = TypeTable::new();
    let a = t.array_of(t.int(), 3);
    assert_eq!(t.array_of(t.int(), 3), a);
    assert_eq!(t.name(a), "[3]int");
    assert_eq!(t.storage(a), Some(24));
    assert_eq!(t.array_len(a), Some(3));
    assert_eq!(t.elem(a), Some(t.int()));
    assert!(t.is_comparable(a));

    let s = t.slice_of(t.float64());
    assert_eq!(t.name(s), "[]float64");
    assert_eq!(t.storage(s), None);
    assert!(!t.is_comparable(s));
    assert_eq!(t.get(s).kind.class(), TypeClass::Slice);
}

#[test]
fn string_elements_are_runes() {
    let t = TypeTable::new();
    assert_eq!(t.elem(t.string()), Some(t.rune()));
}

#[test]
fn struct_layout() {
    let mut t = TypeTable::new();
    let fields = vec![
        Field { name: "a".into(), ty: t.int() },
        Field { name: "b".into(), ty: t.basic(BasicKind::Int32) },
        Field { name: "c".into(), ty: t.float64() },
    ];
    let st = t.struct_of(fields);
    assert_eq!(t.name(st), "struct{a int; b int32; c float64}");
    assert_eq!(t.storage(st), Some(20));
    assert_eq!(t.field_offset(st, "a"), Some((0, t.int())));
    assert_eq!(t.field_offset(st, "c"), Some((12, t.float64())));
    assert_eq!(t.field_offset(st, "missing"), None);
}

#[test]
fn named_types_resolve_to_underlying() {
    let mut t = TypeTable::new();
    let pair = {
        let fields = vec![
            Field { name: "x".into(), ty: t.int() },
            Field { name: "y".into(), ty: t.int() },
        ];
        t.struct_of(fields)
    };
    let named = t.define_named("Pair", ROOT_SCOPE, pair).unwrap();
    assert_eq!(t.name(named), "Pair");
    assert_eq!(t.underlying(named), pair);
    assert_eq!(t.storage(named), Some(16));
    assert_eq!(t.field_offset(named, "y"), Some((8, t.int())));
    assert_eq!(t.lookup("Pair"), Some(named));

    let celsius = t.define_named("Celsius", ROOT_SCOPE, t.float64()).unwrap();
    assert!(t.is_float(celsius));
    assert_ne!(celsius, t.float64());
}

#[test]
fn local_type_names_are_scoped() {
    let mut t = TypeTable::new();
    let local = t.define_named("T", "1.1", t.int()).unwrap();
    assert_eq!(t.lookup("T"), None);
    assert_eq!(t.lookup(&TypeTable::scoped_key("T", "1.1")), Some(local));
    // Same name in a sibling scope is a different type.
    assert!(t.define_named("T", "1.2", t.bool()).is_ok());
}

#[test]
fn redefinition_is_reported() {
    let mut t = TypeTable::new();
    t.define_named("Meters", ROOT_SCOPE, t.int()).unwrap();
    let err = t.define_named("Meters", ROOT_SCOPE, t.float64()).unwrap_err();
    assert_eq!(err, SemanticError::TypeRedefined { name: "Meters".into() });

    let again = t.alias("Meters", ROOT_SCOPE, t.int()).unwrap_err();
    assert!(matches!(again, SemanticError::TypeRedefined { .. }));
}

#[test]
fn add_type_without_check_returns_existing() {
    let mut t = TypeTable::new();
    let ty = Type {
        name: "int".into(),
        kind: TypeKind::Basic(BasicKind::Int),
        storage: Some(8),
    };
    assert_eq!(t.add_type("int", ty.clone(), false), Ok(t.int()));
    assert!(t.add_type("int", ty, true).is_err());
}

#[test]
fn alias_shares_the_target() {
    let mut t = TypeTable::new();
    let id = t.alias("Num", ROOT_SCOPE, t.int()).unwrap();
    assert_eq!(id, t.int());
    assert_eq!(t.lookup("Num"), Some(t.int()));
}

#[test]
fn function_signatures() {
    let mut t = TypeTable::new();
    let sig = Signature {
        params: vec![t.int(), t.int()],
        variadic: false,
        results: vec![t.bool()],
    };
    let f = t.function(sig.clone());
    assert_eq!(t.name(f), "func(int, int) bool");
    assert_eq!(t.signature(f), Some(&sig));
    assert_eq!(t.storage(f), Some(8));
    assert!(!t.is_comparable(f));

    let none = t.function(Signature::default());
    assert_eq!(t.name(none), "func()");
}

#[test]
fn constant_conversion() {
    let t = TypeTable::new();
    assert_eq!(
        t.convert_const(&ConstValue::Int(3), t.float64()),
        Some(ConstValue::Float(3.0))
    );
    assert_eq!(
        t.convert_const(&ConstValue::Float(2.9), t.int()),
        Some(ConstValue::Int(2))
    );
    assert_eq!(t.convert_const(&ConstValue::Float(1e300), t.int()), None);
    assert_eq!(
        t.convert_const(&ConstValue::Str("s".into()), t.string()),
        Some(ConstValue::Str("s".into()))
    );
}

#[test]
fn display_name_for_unknown() {
    let t = TypeTable::new();
    assert_eq!(t.display(None), "unknown");
    assert_eq!(t.display(Some(t.bool())), "bool");
}

#[test]
fn dump_has_one_row_per_key() {
    let mut t = TypeTable::new();
    t.array_of(t.int(), 2);
    let dump = t.to_string();
    let mut lines = dump.lines();
    let header = lines.next().unwrap();
    assert!(header.starts_with("TYPE"));
    assert!(header.contains("CLASS") && header.contains("STORAGE"));
    // 17 basics, two aliases and the array.
    assert_eq!(lines.clone().count(), 20);
    let row = lines.find(|l| l.starts_with("[2]int")).unwrap();
    assert!(row.contains("Array"));
    assert!(row.trim_end().ends_with("16"));
}

#[test]
fn defined_lookup_by_key() {
    let mut t = TypeTable::new();
    assert!(t.is_defined("float64"));
    assert!(!t.is_defined("[4]int"));
    t.array_of(t.int(), 4);
    assert!(t.is_defined("[4]int"));
    let ty = t.get_type("[4]int").unwrap();
    assert_eq!(ty.storage, Some(32));
    assert!(t.get_type("Missing").is_none());
}
