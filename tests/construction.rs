//! Building modules: types, literals, instructions and control blocks.
use proptest::prelude::*;
use strata::ir::{
    kind, BinaryOp, Builder, Context, Opcode, ScopeKind, StatementKind,
    TypeSketch, UnaryOp, SIZE_MAX,
};
use strata::Error;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

proptest! {
    #[test]
    fn bit_types_are_canonical(width in 1..=SIZE_MAX) {
        let ctx = Context::new();
        let a = ctx.bit(width).unwrap();
        let b = TypeSketch::bit(width).lock(&ctx).unwrap();
        prop_assert_eq!(&a, &b);
        prop_assert!(a.ptr_eq(&b));
        prop_assert_eq!(a.bit_width(), Some(width));
        prop_assert_eq!(a.label().to_string(), format!("b{width}"));
    }
}

#[test]
fn invalid_widths() {
    let ctx = Context::new();
    for width in [0, SIZE_MAX + 1] {
        assert_eq!(
            ctx.bit(width).unwrap_err(),
            Error::InvalidWidth {
                width,
                max: SIZE_MAX
            }
        );
    }
}

#[test]
fn sketches_lock_once() {
    init();
    let ctx = Context::new();
    let mut sketch = TypeSketch::callable();
    sketch
        .push_param(ctx.bit(8).unwrap())
        .unwrap()
        .push_subtype(ctx.bool())
        .unwrap();
    let hash = sketch.structural_hash();
    let ty = sketch.lock(&ctx).unwrap();
    assert!(sketch.is_locked());
    assert_eq!(ty.structural_hash(), hash);
    assert!(matches!(
        sketch.push_param(ctx.bool()),
        Err(Error::TypeLocked(_))
    ));
    assert_eq!(sketch.lock(&ctx).unwrap(), ty);
    assert_eq!(
        ctx.callable_type([ctx.bit(8).unwrap()], [ctx.bool()]).unwrap(),
        ty
    );
}

#[test]
fn literal_masking() {
    let ctx = Context::new();
    let mut m = ctx.module("m");
    let mut b = Builder::new(&mut m);
    let c200 = b.bit_constant(8, 200).unwrap();
    let c300 = b.bit_constant(8, 300).unwrap();
    assert_eq!(m.constant(c200).as_bits().unwrap().as_u64(), 200);
    assert_eq!(m.constant(c300).as_bits().unwrap().as_u64(), 44);
}

#[test]
fn identifiers_are_interned() {
    let ctx = Context::new();
    let a = ctx.identifier("x", "main", ctx.bit(8).unwrap());
    let b = ctx.identifier("x", "main", ctx.bit(8).unwrap());
    let c = ctx.identifier("x", "main", ctx.bit(16).unwrap());
    assert_eq!(a, b);
    assert_ne!(a, c);

    let mut m = ctx.module("m");
    let mut builder = Builder::new(&mut m);
    let v1 = builder.identifier("x", "main", ctx.bit(8).unwrap()).unwrap();
    let v2 = builder.identifier("x", "main", ctx.bit(8).unwrap()).unwrap();
    assert_eq!(v1, v2);
    assert_eq!(m.constant(v1).as_ident(), Some(&a));
}

#[test]
fn operand_arity() {
    let ctx = Context::new();
    let mut m = ctx.module("m");
    let mut b = Builder::new(&mut m);
    let x = b.add_variable("x", ctx.bit(8).unwrap()).unwrap().value();
    for op in [UnaryOp::Id, UnaryOp::Load] {
        assert!(matches!(
            b.instruction(Opcode::Unary(op), [x, x]),
            Err(Error::ArityViolation { found: 2, .. })
        ));
    }
    for op in [BinaryOp::AddUnsigned, BinaryOp::Eq, BinaryOp::Store] {
        assert!(matches!(
            b.instruction(Opcode::Binary(op), [x]),
            Err(Error::ArityViolation { found: 1, .. })
        ));
        assert!(matches!(
            b.instruction(Opcode::Binary(op), [x, x, x]),
            Err(Error::ArityViolation { found: 3, .. })
        ));
    }
}

#[test]
fn nested_scope_arity() {
    let ctx = Context::new();
    let mut m = ctx.module("m");
    let mut b = Builder::new(&mut m);
    let f = b.add_function("f").unwrap();
    let body = b.bind_context(f, ScopeKind::Sequential).unwrap();

    let branch = b.add_statement(body, "if", StatementKind::Branch).unwrap();
    b.add_arm(branch, ScopeKind::Sequential).unwrap();
    b.add_arm(branch, ScopeKind::Parallel).unwrap();
    assert!(matches!(
        b.add_arm(branch, ScopeKind::Sequential),
        Err(Error::ArityViolation { found: 3, .. })
    ));

    let lp = b.add_statement(body, "while", StatementKind::Loop).unwrap();
    b.add_arm(lp, ScopeKind::Sequential).unwrap();
    assert!(matches!(
        b.add_arm(lp, ScopeKind::Sequential),
        Err(Error::ArityViolation { found: 2, .. })
    ));

    let plain = b.add_statement(body, "s", StatementKind::Trivial).unwrap();
    assert!(b.add_arm(plain, ScopeKind::Sequential).is_err());
    assert_eq!(m.statement(branch).scopes().len(), 2);
}

#[test]
fn cross_statement_append() {
    let ctx = Context::new();
    let mut m = ctx.module("m");
    let mut b = Builder::new(&mut m);
    let x = b.add_variable("x", ctx.bit(8).unwrap()).unwrap();
    let f = b.add_function("f").unwrap();
    let body = b.bind_context(f, ScopeKind::Parallel).unwrap();
    let s1 = b.add_statement(body, "s1", StatementKind::Trivial).unwrap();
    let s2 = b.add_statement(body, "s2", StatementKind::Trivial).unwrap();
    let load = b.load(x).unwrap();
    b.append(s1, load).unwrap();

    let err = b.append(s2, load).unwrap_err();
    let Error::CrossStatementReference {
        instruction,
        owner,
        target,
    } = err
    else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(instruction, m[load].label());
    assert_eq!(owner, m[s1].label());
    assert_eq!(target, m[s2].label());
}

#[test]
fn downcasts_follow_taxonomy() {
    let ctx = Context::new();
    let mut m = ctx.module("m");
    let mut b = Builder::new(&mut m);
    let f = b.add_function("f").unwrap();
    let body = b.bind_context(f, ScopeKind::Sequential).unwrap();
    let stmt = b.add_statement(body, "s", StatementKind::Loop).unwrap();
    let c = b.bit_constant(4, 9).unwrap();
    let x = b.add_variable("x", ctx.bit(4).unwrap()).unwrap();
    let load = b.load(x).unwrap();
    let lt = b.binary(BinaryOp::LtUnsigned, load, c).unwrap();

    assert!(m.is::<kind::Callable, _>(f));
    assert!(!m.is::<kind::Intrinsic, _>(f));
    assert!(m.is::<kind::Block, _>(body));
    assert!(m.is::<kind::Block, _>(stmt));
    assert!(m.is::<kind::LoopStatement, _>(stmt));
    assert!(m.is::<kind::Constant, _>(c));
    assert!(m.is::<kind::BitConstant, _>(c));
    assert!(m.is::<kind::Storage, _>(x));
    assert!(m.is::<kind::Unary, _>(load));
    assert!(m.is::<kind::Logical, _>(lt));
    assert!(m.is::<kind::Binary, _>(lt));
    assert!(!m.is::<kind::Arithmetic, _>(lt));

    assert!(m.downcast::<kind::Scope, _>(stmt).is_none());
    assert_eq!(m.downcast::<kind::Statement, _>(stmt), Some(stmt));
    assert!(matches!(
        m.require::<kind::Function, _>(c),
        Err(Error::InvalidOperand(_))
    ));
    assert_eq!(m.find_function("f"), Some(f));
    assert_eq!(m.find_variable("x"), Some(x));
}

#[test]
#[should_panic(expected = "does not belong to module")]
fn handles_stay_in_their_module() {
    let (c1, c2) = (Context::new(), Context::new());
    let mut a = c1.module("a");
    let mut b = c2.module("b");
    let fa = Builder::new(&mut a).add_function("f").unwrap();
    let body_a = Builder::new(&mut a)
        .bind_context(fa, ScopeKind::Sequential)
        .unwrap();
    let fb = Builder::new(&mut b).add_function("f").unwrap();
    Builder::new(&mut b)
        .bind_context(fb, ScopeKind::Sequential)
        .unwrap();
    let _ = Builder::new(&mut b).add_statement(body_a, "leak", StatementKind::Trivial);
}
