//! Printing and round-trip tests over complete modules.

use gpir::{
    print_function, print_module, parse_module, verify_module, BooleanOp, Builder, EnumCase,
    EnumDecl, IntrinsicRegistry, Literal, Module, Type, Use,
};

#[test]
fn test_struct_literal_printing() {
    let registry = IntrinsicRegistry::standard();
    let mut module = Module::new("test".into());
    let mut builder = Builder::new(&mut module, &registry);

    let struct_ty = builder.create_struct("TestStruct1", vec![("foo".into(), Type::Bool)]);
    let f = builder.create_function("initialize_struct1", vec![], Type::void());
    builder.literal(
        Literal::Struct(vec![
            ("foo".into(), Use::bool(true)),
            ("bar".into(), Use::bool(false)),
        ]),
        struct_ty,
    );
    builder.ret(None);

    let printed = print_function(&module, &module.functions[f]);
    let expected = "\
func @initialize_struct1: () -> () {
'entry():
    %0.0 = literal {#foo = true: bool, #bar = false: bool}: $TestStruct1
    return
}
";
    assert_eq!(printed, expected);
}

#[test]
fn test_enum_literal_printing() {
    let registry = IntrinsicRegistry::standard();
    let mut module = Module::new("test".into());
    let mut builder = Builder::new(&mut module, &registry);

    let enum_ty = builder.create_enum(EnumDecl {
        name: "TestEnum1".into(),
        cases: vec![
            EnumCase {
                name: "foo".into(),
                associated_types: vec![Type::Bool, Type::Bool],
            },
            EnumCase {
                name: "bar".into(),
                associated_types: vec![],
            },
            EnumCase {
                name: "baz".into(),
                associated_types: vec![],
            },
        ],
    });
    // `baz` recursively references its own enum.
    if let Type::Enum(id) = enum_ty {
        module.enums[id].cases[2].associated_types =
            vec![enum_ty.clone(), Type::Bool, enum_ty.clone()];
    }

    let mut builder = Builder::new(&mut module, &registry);
    let f = builder.create_function("initialize_enum1", vec![], Type::void());
    builder.literal(
        Literal::EnumCase("foo".into(), vec![Use::bool(true), Use::bool(false)]),
        enum_ty.clone(),
    );
    let bar = builder.literal(Literal::EnumCase("bar".into(), vec![]), enum_ty.clone());
    let baz = builder.literal(
        Literal::EnumCase(
            "baz".into(),
            vec![Use::inst(bar), Use::bool(true), Use::inst(bar)],
        ),
        enum_ty.clone(),
    );
    builder.literal(
        Literal::EnumCase(
            "baz".into(),
            vec![
                Use::Literal {
                    ty: enum_ty.clone(),
                    literal: Literal::EnumCase("bar".into(), vec![]),
                },
                Use::bool(false),
                Use::inst(baz),
            ],
        ),
        enum_ty.clone(),
    );
    builder.ret(None);

    assert!(verify_module(&module, &registry).is_ok());

    let printed = print_function(&module, &module.functions[f]);
    let expected = "\
func @initialize_enum1: () -> () {
'entry():
    %0.0 = literal ?foo(true: bool, false: bool): $TestEnum1
    %0.1 = literal ?bar(): $TestEnum1
    %0.2 = literal ?baz(%0.1: $TestEnum1, true: bool, %0.1: $TestEnum1): $TestEnum1
    %0.3 = literal ?baz(?bar(): $TestEnum1, false: bool, %0.2: $TestEnum1): $TestEnum1
    return
}
";
    assert_eq!(printed, expected);
}

/// Build a module touching every declaration form and most instruction
/// kinds, then check print -> parse -> print is a fixpoint.
fn rich_module(registry: &IntrinsicRegistry) -> Module {
    let mut module = Module::new("everything".into());
    let mut builder = Builder::new(&mut module, registry);

    let pair = builder.create_struct(
        "Pair",
        vec![("first".into(), Type::Bool), ("second".into(), Type::Bool)],
    );
    let option = builder.create_enum(EnumDecl {
        name: "Option".into(),
        cases: vec![
            EnumCase {
                name: "some".into(),
                associated_types: vec![Type::Bool],
            },
            EnumCase {
                name: "none".into(),
                associated_types: vec![],
            },
        ],
    });
    builder.create_alias("Flags", Some(Type::Tuple(vec![Type::Bool, Type::Bool])));
    builder.create_alias("Opaque", None);
    let global = builder.create_variable("cell", Type::Bool);
    let pair_cell = builder.create_variable("pair_cell", pair.clone());

    builder.declare_function("external_probe", vec![Type::Bool], Type::Bool);

    let f = builder.create_function(
        "exercise",
        vec![("x".into(), Type::Bool), ("opt".into(), option.clone())],
        Type::Bool,
    );
    let entry = builder.module().functions[f].entry_block().unwrap();
    let x = builder.arg_use(f, entry, 0);
    let opt = builder.arg_use(f, entry, 1);

    let some_bb = builder.append_block(f, "on_some", vec![("payload".into(), Type::Bool)]);
    let none_bb = builder.append_block(f, "on_none", vec![]);
    let done = builder.append_block(f, "done", vec![("result".into(), Type::Bool)]);

    builder.move_to_end(f, entry);
    let pair_lit = builder.build_named_inst(
        "pair",
        gpir::InstKind::Literal {
            literal: Literal::Struct(vec![
                ("first".into(), Use::bool(true)),
                ("second".into(), x.clone()),
            ]),
            ty: pair.clone(),
        },
    );
    let first = builder.extract(
        Use::inst(pair_lit),
        vec![gpir::ElementKey::Name("first".into())],
    );
    builder.insert(
        x.clone(),
        Use::inst(pair_lit),
        vec![gpir::ElementKey::Name("second".into())],
    );
    let loaded = builder.load(Use::Def(gpir::Definition::Var(global)));
    builder.store(Use::inst(loaded), Use::Def(gpir::Definition::Var(global)));
    builder.element_pointer(
        Use::Def(gpir::Definition::Var(pair_cell)),
        vec![gpir::ElementKey::Name("first".into())],
    );
    builder.builtin("assert", vec![Use::inst(first)]);
    builder.branch_enum(
        opt,
        vec![("some".into(), some_bb), ("none".into(), none_bb)],
    );

    builder.move_to_end(f, some_bb);
    let payload = builder.arg_use(f, some_bb, 0);
    let anded = builder.boolean(BooleanOp::And, payload, x.clone());
    builder.branch(done, vec![Use::inst(anded)]);

    builder.move_to_end(f, none_bb);
    let ext = builder.module().function_by_name("external_probe").unwrap();
    let called = builder.apply(Use::Def(gpir::Definition::Func(ext)), vec![x.clone()]);
    builder.branch(done, vec![Use::inst(called)]);

    builder.move_to_end(f, done);
    let result = builder.arg_use(f, done, 0);
    builder.ret(Some(result));

    module
}

#[test]
fn test_rich_module_verifies() {
    let registry = IntrinsicRegistry::standard();
    let module = rich_module(&registry);
    verify_module(&module, &registry).expect("rich module should verify");
}

#[test]
fn test_print_parse_roundtrip() {
    let registry = IntrinsicRegistry::standard();
    let module = rich_module(&registry);

    let printed = print_module(&module);
    let reparsed = parse_module(&printed, &registry).expect("printed module reparses");
    verify_module(&reparsed, &registry).expect("reparsed module verifies");
    assert_eq!(print_module(&reparsed), printed);
}

#[test]
fn test_roundtrip_preserves_header_and_decls() {
    let registry = IntrinsicRegistry::standard();
    let module = rich_module(&registry);
    let printed = print_module(&module);

    assert!(printed.starts_with("module \"everything\"\nstage raw\n"));
    assert!(printed.contains("enum $Option {"));
    assert!(printed.contains("struct $Pair {"));
    assert!(printed.contains("alias $Flags = (bool, bool)"));
    assert!(printed.contains("alias $Opaque = opaque"));
    assert!(printed.contains("var @cell: bool"));
    assert!(printed.contains("var @pair_cell: $Pair"));
    assert!(printed.contains("external func @external_probe: (bool) -> bool"));

    let reparsed = parse_module(&printed, &registry).unwrap();
    assert_eq!(reparsed.name, "everything");
    assert_eq!(reparsed.structs.len(), 1);
    assert_eq!(reparsed.enums.len(), 1);
    assert_eq!(reparsed.aliases.len(), 2);
    assert_eq!(reparsed.variables.len(), 2);
    assert_eq!(reparsed.functions.len(), 2);
}

#[test]
fn test_parse_error_reports_line() {
    let registry = IntrinsicRegistry::standard();
    let text = "module \"m\"\nstage raw\n\nfunc @f: () -> () {\n'entry():\n    bogus\n}\n";
    let error = parse_module(text, &registry).unwrap_err();
    assert!(error.line >= 4, "line {} too early", error.line);
}
