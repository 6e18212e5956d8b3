//! Walking modules with visitors and callbacks.
use itertools::Itertools;
use std::cell::RefCell;
use strata::ir::traversal::{
    traverse, traverse_with, Action, Order, VisResult, Visitor,
};
use strata::ir::{
    kind, BinaryOp, Builder, CallableState, ConstantIdx, Context, FunctionIdx,
    InstructionIdx, Module, ModuleIdx, ReferenceIdx, ScopeIdx, ScopeKind,
    StatementIdx, StatementKind, StructureIdx,
};
use strata::{Error, StrataResult};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Records every stage it sees into a shared log.
struct Trace<'a> {
    log: &'a RefCell<Vec<String>>,
    skip_function: bool,
}

impl<'a> Trace<'a> {
    fn new(log: &'a RefCell<Vec<String>>) -> Self {
        Self {
            log,
            skip_function: false,
        }
    }

    fn push(&self, stage: &str, name: impl ToString) -> VisResult {
        self.log
            .borrow_mut()
            .push(format!("{stage} {}", name.to_string()));
        Ok(Action::Continue)
    }
}

impl Visitor for Trace<'_> {
    fn start_module(&mut self, m: ModuleIdx, module: &Module) -> VisResult {
        self.push("start", module[m].name())
    }
    fn finish_module(&mut self, m: ModuleIdx, module: &Module) -> VisResult {
        self.push("finish", module[m].name())
    }
    fn start_function(&mut self, f: FunctionIdx, module: &Module) -> VisResult {
        self.push("start", module[f].name())?;
        if self.skip_function {
            Ok(Action::SkipChildren)
        } else {
            Ok(Action::Continue)
        }
    }
    fn interlog_function(&mut self, f: FunctionIdx, module: &Module) -> VisResult {
        self.push("interlog", module[f].name())
    }
    fn finish_function(&mut self, f: FunctionIdx, module: &Module) -> VisResult {
        self.push("finish", module[f].name())
    }
    fn start_reference(&mut self, r: ReferenceIdx, module: &Module) -> VisResult {
        self.push("start", module[r].name())
    }
    fn finish_reference(&mut self, r: ReferenceIdx, module: &Module) -> VisResult {
        self.push("finish", module[r].name())
    }
    fn start_structure(&mut self, s: StructureIdx, module: &Module) -> VisResult {
        self.push("start", module[s].name())
    }
    fn start_structure_constant(&mut self, c: ConstantIdx, module: &Module) -> VisResult {
        self.push("start", module[c].name())
    }
    fn start_bit_constant(&mut self, c: ConstantIdx, module: &Module) -> VisResult {
        self.push("start", module[c].name())
    }
    fn start_sequential(&mut self, _: ScopeIdx, _: &Module) -> VisResult {
        self.push("start", "seq")
    }
    fn finish_sequential(&mut self, _: ScopeIdx, _: &Module) -> VisResult {
        self.push("finish", "seq")
    }
    fn start_parallel(&mut self, _: ScopeIdx, _: &Module) -> VisResult {
        self.push("start", "par")
    }
    fn start_trivial(&mut self, s: StatementIdx, module: &Module) -> VisResult {
        self.push("start", module[s].name())
    }
    fn finish_trivial(&mut self, s: StatementIdx, module: &Module) -> VisResult {
        self.push("finish", module[s].name())
    }
    fn start_branch(&mut self, s: StatementIdx, module: &Module) -> VisResult {
        self.push("start", module[s].name())
    }
    fn interlog_branch(&mut self, s: StatementIdx, module: &Module) -> VisResult {
        self.push("interlog", module[s].name())
    }
    fn finish_branch(&mut self, s: StatementIdx, module: &Module) -> VisResult {
        self.push("finish", module[s].name())
    }
    fn start_instruction(&mut self, i: InstructionIdx, module: &Module) -> VisResult {
        self.push("start", module[i].name())
    }
    fn finish_instruction(&mut self, i: InstructionIdx, module: &Module) -> VisResult {
        self.push("finish", module[i].name())
    }
}

/// `f(a)` with body `seq { A: nop; B: nop }`.
fn two_statements(ctx: &Context) -> Module<'_> {
    let mut m = ctx.module("m");
    let mut b = Builder::new(&mut m);
    let f = b.add_function("f").unwrap();
    b.add_input(f, "a", ctx.bit(8).unwrap()).unwrap();
    let body = b.bind_context(f, ScopeKind::Sequential).unwrap();
    for name in ["A", "B"] {
        let stmt = b.add_statement(body, name, StatementKind::Trivial).unwrap();
        let nop = b.nop().unwrap();
        b.append(stmt, nop).unwrap();
    }
    m
}

fn run(m: &Module, order: Order) -> Vec<String> {
    let log = RefCell::new(vec![]);
    let mut visitor = Trace::new(&log);
    traverse(m, m.root(), order, &mut visitor, |m, v| {
        log.borrow_mut().push(format!("act {}", m[v].name()));
        Ok(Action::Continue)
    })
    .unwrap();
    log.into_inner()
}

#[test]
fn preorder() {
    init();
    let ctx = Context::new();
    let m = two_statements(&ctx);
    let expected = [
        "act m", "start m", "act f", "start f", "act a", "start a",
        "finish a", "interlog f", "act seq", "start seq", "act A", "start A",
        "act nop", "start nop", "finish nop", "finish A", "act B", "start B",
        "act nop", "start nop", "finish nop", "finish B", "finish seq",
        "finish f", "finish m",
    ];
    assert_eq!(run(&m, Order::Pre), expected);
}

#[test]
fn postorder() {
    init();
    let ctx = Context::new();
    let m = two_statements(&ctx);
    let expected = [
        "start m", "start f", "start a", "finish a", "act a", "interlog f",
        "start seq", "start A", "start nop", "finish nop", "act nop",
        "finish A", "act A", "start B", "start nop", "finish nop", "act nop",
        "finish B", "act B", "finish seq", "act seq", "finish f", "act f",
        "finish m", "act m",
    ];
    assert_eq!(run(&m, Order::Post), expected);
}

#[test]
fn branch_interlog_after_condition() {
    init();
    let ctx = Context::new();
    let mut m = ctx.module("m");
    let mut b = Builder::new(&mut m);
    let x = b.add_variable("x", ctx.bit(8).unwrap()).unwrap();
    let f = b.add_function("f").unwrap();
    let body = b.bind_context(f, ScopeKind::Sequential).unwrap();
    let br = b.add_statement(body, "br", StatementKind::Branch).unwrap();
    let then = b.add_arm(br, ScopeKind::Parallel).unwrap();
    b.add_arm(br, ScopeKind::Sequential).unwrap();
    let load = b.load(x).unwrap();
    let zero = b.bit_constant(8, 0).unwrap();
    let cond = b.binary(BinaryOp::Ne, load, zero).unwrap();
    b.append(br, cond).unwrap();
    let inner = b.add_statement(then, "t", StatementKind::Trivial).unwrap();
    let nop = b.nop().unwrap();
    b.append(inner, nop).unwrap();

    let log = RefCell::new(vec![]);
    traverse(&m, br, Order::Pre, &mut Trace::new(&log), |_, _| {
        Ok(Action::Continue)
    })
    .unwrap();
    assert_eq!(
        log.into_inner().iter().join(", "),
        "start br, start ne, finish ne, interlog br, start par, start t, \
         start nop, finish nop, finish t, start seq, finish seq, finish br"
    );
}

#[test]
fn skip_children_still_finishes() {
    let ctx = Context::new();
    let m = two_statements(&ctx);
    let log = RefCell::new(vec![]);
    let mut visitor = Trace::new(&log);
    visitor.skip_function = true;
    visitor.do_traversal(&m).unwrap();
    assert_eq!(
        log.into_inner(),
        ["start m", "start f", "finish f", "finish m"]
    );
}

#[test]
fn empty_structures_are_skipped() {
    init();
    let ctx = Context::new();
    let mut m = ctx.module("m");
    let mut b = Builder::new(&mut m);
    b.add_structure("empty").unwrap();
    let outer = b.add_structure("outer").unwrap();
    b.add_field(outer, "a", Some(ctx.bit(8).unwrap())).unwrap();
    b.add_field(outer, "hole", None).unwrap();
    let pair = b.add_structure("pair").unwrap();
    b.add_field(pair, "lo", Some(ctx.bit(4).unwrap())).unwrap();
    b.structure_constant(pair, vec![]).unwrap();

    let log = RefCell::new(vec![]);
    let mut visited = vec![];
    traverse(&m, m.root(), Order::Pre, &mut Trace::new(&log), |m, v| {
        visited.push(m[v].name().to_string());
        Ok(Action::Continue)
    })
    .unwrap();
    assert!(!visited.iter().any(|n| n == "empty" || n == "hole"));
    assert_eq!(
        log.into_inner(),
        [
            "start m", "start outer", "start a", "start pair", "start lo",
            "start pair", "start 4'd0", "finish m"
        ]
    );
}

#[test]
fn finalize_then_mutate() {
    init();
    let ctx = Context::new();
    let mut m = two_statements(&ctx);
    let f = m.find_function("f").unwrap();
    assert_eq!(m.state(f), CallableState::Bound);
    traverse_with(&m, m.root(), Order::Pre, |_, _| Ok(Action::Continue))
        .unwrap();
    assert!(m.is_finalized());
    assert_eq!(m.state(f), CallableState::Finalized);

    let body = m.callable(f).context().unwrap();
    let stmt = m
        .scope(body)
        .children()
        .first()
        .and_then(|c| m.downcast::<kind::Statement, _>(*c))
        .unwrap();
    let nop = m.statement(stmt).instructions()[0];
    let mut b = Builder::new(&mut m);
    let invalid = |res: Result<(), Error>| {
        assert!(matches!(res, Err(Error::InvalidMutation(_))), "{res:?}")
    };
    invalid(b.add_statement(body, "C", StatementKind::Trivial).map(|_| ()));
    invalid(b.add_scope(body, ScopeKind::Parallel).map(|_| ()));
    invalid(b.add_function("g").map(|_| ()));
    invalid(b.bit_constant(8, 1).map(|_| ()));
    invalid(b.nop().map(|_| ()));
    invalid(b.append(stmt, nop));
}

#[test]
fn unbound_context() {
    let ctx = Context::new();
    let mut m = ctx.module("m");
    let mut b = Builder::new(&mut m);
    b.add_intrinsic("memcpy").unwrap();
    let err = traverse_with(&m, m.root(), Order::Pre, |_, _| {
        Ok(Action::Continue)
    })
    .unwrap_err();
    assert_eq!(err, Error::UnboundContext("memcpy".into()));
}

#[test]
fn concurrent_traversals() {
    init();
    let ctx = Context::new();
    let m = two_statements(&ctx);
    let count = |m: &Module| {
        let mut n = 0;
        traverse_with(m, m.root(), Order::Post, |_, _| {
            n += 1;
            Ok(Action::Continue)
        })
        .map(|_| n)
    };
    let expected = count(&m).unwrap();
    assert_eq!(expected, m.value_count());

    std::thread::scope(|s| {
        let handles = (0..4)
            .map(|_| {
                s.spawn(|| -> StrataResult<(usize, usize)> {
                    let log = RefCell::new(vec![]);
                    Trace::new(&log).do_traversal(&m)?;
                    Ok((count(&m)?, log.into_inner().len()))
                })
            })
            .collect_vec();
        for h in handles {
            let (n, stages) = h.join().unwrap().unwrap();
            assert_eq!(n, expected);
            assert_eq!(stages, 17);
        }
    });
}
