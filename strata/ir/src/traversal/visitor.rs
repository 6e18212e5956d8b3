//! Implements a visitor for modules.
//! Backends implement [Visitor] and are driven by
//! [traverse](super::traverse) through [dispatch].
use super::action::{Action, VisResult};
use super::engine::{traverse, Order};
use crate::{
    ConstantIdx, ConstantKind, FunctionIdx, Handle, InstructionIdx,
    IntrinsicIdx, Kind, MemoryIdx, Module, ModuleIdx, ReferenceIdx, ScopeIdx,
    ScopeKind, StatementIdx, StatementKind, StructureIdx, ValueIdx,
    VariableIdx, Variant,
};
use std::fmt;
use strata_utils::StrataResult;

/// Point of a node's visit at which a visitor is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Before the node's children.
    Prolog,
    /// Between the two halves of a node's children. Only callables (between
    /// parameters and body) and branch/loop statements (between the
    /// condition instructions and the nested scopes) have one.
    Interlog,
    /// After the node's children.
    Epilog,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Prolog => write!(f, "prolog"),
            Stage::Interlog => write!(f, "interlog"),
            Stage::Epilog => write!(f, "epilog"),
        }
    }
}

macro_rules! hooks {
    ($($(#[$doc:meta])* fn $name:ident($arg:ident: $ty:ty);)*) => {
        $(
            $(#[$doc])*
            fn $name(&mut self, $arg: $ty, _module: &Module) -> VisResult {
                log::trace!("{}: no handler for {:?}", stringify!($name), $arg);
                Ok(Action::Continue)
            }
        )*
    };
}

/// The visiting interface for a [Module].
/// Contains three kinds of functions:
/// 1. start_<node>: Called when visiting <node> top-down (prolog).
/// 2. interlog_<node>: Called at the structural midpoint of functions,
///    intrinsics, branches and loops.
/// 3. finish_<node>: Called when visiting <node> bottom-up (epilog).
///
/// A backend will usually override a handful of these and rely on the
/// defaults to keep walking the rest of the tree. Returning
/// [Action::SkipChildren] from a `start_*` skips the node's children; its
/// `finish_*` is still called.
pub trait Visitor {
    /// Define the order in which [Visitor::do_traversal] applies its
    /// callback. Visitor stages are unaffected.
    #[inline(always)]
    fn order() -> Order
    where
        Self: Sized,
    {
        Order::Pre
    }

    /// Walk the whole module with this visitor.
    fn do_traversal(&mut self, module: &Module) -> StrataResult<()>
    where
        Self: Sized,
    {
        traverse(module, module.root(), Self::order(), self, |_, _| {
            Ok(Action::Continue)
        })
    }

    hooks! {
        fn start_module(m: ModuleIdx);
        fn finish_module(m: ModuleIdx);

        /// Executed before the parameters of a function.
        fn start_function(f: FunctionIdx);
        /// Executed after the parameters and before the body.
        fn interlog_function(f: FunctionIdx);
        fn finish_function(f: FunctionIdx);
        fn start_intrinsic(i: IntrinsicIdx);
        fn interlog_intrinsic(i: IntrinsicIdx);
        fn finish_intrinsic(i: IntrinsicIdx);

        fn start_reference(r: ReferenceIdx);
        fn finish_reference(r: ReferenceIdx);
        fn start_variable(v: VariableIdx);
        fn finish_variable(v: VariableIdx);
        fn start_memory(m: MemoryIdx);
        fn finish_memory(m: MemoryIdx);

        /// Executed before the fields of a root structure or of a nested
        /// aggregate, and at every leaf field.
        fn start_structure(s: StructureIdx);
        fn finish_structure(s: StructureIdx);

        fn start_bit_constant(c: ConstantIdx);
        fn finish_bit_constant(c: ConstantIdx);
        fn start_structure_constant(c: ConstantIdx);
        fn finish_structure_constant(c: ConstantIdx);
        fn start_string_constant(c: ConstantIdx);
        fn finish_string_constant(c: ConstantIdx);
        fn start_identifier(c: ConstantIdx);
        fn finish_identifier(c: ConstantIdx);

        fn start_sequential(s: ScopeIdx);
        fn finish_sequential(s: ScopeIdx);
        fn start_parallel(s: ScopeIdx);
        fn finish_parallel(s: ScopeIdx);

        fn start_trivial(s: StatementIdx);
        fn finish_trivial(s: StatementIdx);
        /// Executed before the condition instructions of a branch.
        fn start_branch(s: StatementIdx);
        /// Executed after the condition and before the `then`/`else` scopes.
        fn interlog_branch(s: StatementIdx);
        fn finish_branch(s: StatementIdx);
        fn start_loop(s: StatementIdx);
        fn interlog_loop(s: StatementIdx);
        fn finish_loop(s: StatementIdx);

        /// Executed before the operands of an instruction are visited. Only
        /// instructions listed in a statement are visited; operands are not
        /// traversed.
        fn start_instruction(i: InstructionIdx);
        fn finish_instruction(i: InstructionIdx);
    }
}

/// Visitor that does nothing.
#[derive(Debug, Default)]
pub struct NoopVisitor;

impl Visitor for NoopVisitor {}

fn handle<K: Kind>(v: ValueIdx) -> Handle<K> {
    Handle::new_unchecked(v)
}

/// Route `stage` of value `v` to its handler on `visitor`.
///
/// A stage the value's kind does not have is logged and ignored.
pub fn dispatch(
    visitor: &mut dyn Visitor,
    module: &Module,
    v: ValueIdx,
    stage: Stage,
) -> VisResult {
    use Stage::*;
    let variant = module.variant(v);
    match (variant, stage) {
        (Variant::Module, Prolog) => visitor.start_module(handle(v), module),
        (Variant::Module, Epilog) => visitor.finish_module(handle(v), module),

        (Variant::Function, Prolog) => visitor.start_function(handle(v), module),
        (Variant::Function, Interlog) => visitor.interlog_function(handle(v), module),
        (Variant::Function, Epilog) => visitor.finish_function(handle(v), module),
        (Variant::Intrinsic, Prolog) => visitor.start_intrinsic(handle(v), module),
        (Variant::Intrinsic, Interlog) => {
            visitor.interlog_intrinsic(handle(v), module)
        }
        (Variant::Intrinsic, Epilog) => visitor.finish_intrinsic(handle(v), module),

        (Variant::Reference, Prolog) => visitor.start_reference(handle(v), module),
        (Variant::Reference, Epilog) => visitor.finish_reference(handle(v), module),
        (Variant::Variable, Prolog) => visitor.start_variable(handle(v), module),
        (Variant::Variable, Epilog) => visitor.finish_variable(handle(v), module),
        (Variant::Memory, Prolog) => visitor.start_memory(handle(v), module),
        (Variant::Memory, Epilog) => visitor.finish_memory(handle(v), module),
        (Variant::Structure, Prolog) => visitor.start_structure(handle(v), module),
        (Variant::Structure, Epilog) => visitor.finish_structure(handle(v), module),

        (Variant::Constant(kind), Prolog) => match kind {
            ConstantKind::Bit => visitor.start_bit_constant(handle(v), module),
            ConstantKind::Structure => {
                visitor.start_structure_constant(handle(v), module)
            }
            ConstantKind::String => visitor.start_string_constant(handle(v), module),
            ConstantKind::Identifier => visitor.start_identifier(handle(v), module),
        },
        (Variant::Constant(kind), Epilog) => match kind {
            ConstantKind::Bit => visitor.finish_bit_constant(handle(v), module),
            ConstantKind::Structure => {
                visitor.finish_structure_constant(handle(v), module)
            }
            ConstantKind::String => visitor.finish_string_constant(handle(v), module),
            ConstantKind::Identifier => visitor.finish_identifier(handle(v), module),
        },

        (Variant::Scope(ScopeKind::Sequential), Prolog) => {
            visitor.start_sequential(handle(v), module)
        }
        (Variant::Scope(ScopeKind::Sequential), Epilog) => {
            visitor.finish_sequential(handle(v), module)
        }
        (Variant::Scope(ScopeKind::Parallel), Prolog) => {
            visitor.start_parallel(handle(v), module)
        }
        (Variant::Scope(ScopeKind::Parallel), Epilog) => {
            visitor.finish_parallel(handle(v), module)
        }

        (Variant::Statement(StatementKind::Trivial), Prolog) => {
            visitor.start_trivial(handle(v), module)
        }
        (Variant::Statement(StatementKind::Trivial), Epilog) => {
            visitor.finish_trivial(handle(v), module)
        }
        (Variant::Statement(StatementKind::Branch), Prolog) => {
            visitor.start_branch(handle(v), module)
        }
        (Variant::Statement(StatementKind::Branch), Interlog) => {
            visitor.interlog_branch(handle(v), module)
        }
        (Variant::Statement(StatementKind::Branch), Epilog) => {
            visitor.finish_branch(handle(v), module)
        }
        (Variant::Statement(StatementKind::Loop), Prolog) => {
            visitor.start_loop(handle(v), module)
        }
        (Variant::Statement(StatementKind::Loop), Interlog) => {
            visitor.interlog_loop(handle(v), module)
        }
        (Variant::Statement(StatementKind::Loop), Epilog) => {
            visitor.finish_loop(handle(v), module)
        }

        (Variant::Instruction(_), Prolog) => {
            visitor.start_instruction(handle(v), module)
        }
        (Variant::Instruction(_), Epilog) => {
            visitor.finish_instruction(handle(v), module)
        }

        (variant, Interlog) => {
            log::warn!(
                "`{}' ({variant}) has no interlog stage",
                module[v].label()
            );
            Ok(Action::Continue)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Builder, Context, ScopeKind, StatementKind};

    #[derive(Default)]
    struct Stages(Vec<String>);

    impl Visitor for Stages {
        fn start_function(&mut self, f: FunctionIdx, m: &Module) -> VisResult {
            self.0.push(format!("start {}", m[f].name()));
            Ok(Action::Continue)
        }

        fn interlog_function(&mut self, f: FunctionIdx, m: &Module) -> VisResult {
            self.0.push(format!("interlog {}", m[f].name()));
            Ok(Action::Continue)
        }

        fn finish_loop(&mut self, s: StatementIdx, m: &Module) -> VisResult {
            self.0.push(format!("finish {}", m[s].name()));
            Ok(Action::Stop)
        }
    }

    #[test]
    fn routes_by_kind_and_stage() {
        let ctx = Context::new();
        let mut m = ctx.module("m");
        let mut b = Builder::new(&mut m);
        let f = b.add_function("f").unwrap();
        let body = b.bind_context(f, ScopeKind::Sequential).unwrap();
        let l = b.add_statement(body, "l", StatementKind::Loop).unwrap();

        let mut v = Stages::default();
        let res = dispatch(&mut v, &m, f.value(), Stage::Prolog).unwrap();
        assert_eq!(res, Action::Continue);
        dispatch(&mut v, &m, f.value(), Stage::Interlog).unwrap();
        let res = dispatch(&mut v, &m, l.value(), Stage::Epilog).unwrap();
        assert_eq!(res, Action::Stop);
        assert_eq!(v.0, ["start f", "interlog f", "finish l"]);
    }

    #[test]
    fn interlog_without_midpoint() {
        let ctx = Context::new();
        let m = ctx.module("m");
        let mut v = Stages::default();
        let res = dispatch(&mut v, &m, m.root().value(), Stage::Interlog);
        assert_eq!(res, Ok(Action::Continue));
        assert!(v.0.is_empty());
    }
}
