//! Depth-first walk over the value tree of a module.
use super::action::{Action, VisResult};
use super::visitor::{dispatch, NoopVisitor, Stage, Visitor};
use crate::{Literal, Module, StatementKind, ValueIdx, ValueKind};
use strata_utils::{Error, StrataResult};

/// Position of the traversal callback relative to a node's stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    /// Callback, prolog, children, epilog.
    #[default]
    Pre,
    /// Prolog, children, epilog, callback.
    Post,
}

/// Walk the tree below `root` in depth-first order.
///
/// At every node the visitor's prolog runs before the node's children and
/// its epilog after them; callables, branches and loops additionally get an
/// interlog between their two groups of children. `action` runs once per
/// node before its prolog ([Order::Pre]) or after its epilog
/// ([Order::Post]).
///
/// The descent of each kind is fixed:
/// * module: structures, constants, variables, memories, intrinsics,
///   functions
/// * structure and structure constant: fields
/// * callable: inputs, outputs, linkages, interlog, body
/// * statement: instructions, then for branches and loops the interlog and
///   the nested scopes
/// * scope: children
///
/// Structures and structure constants without fields are skipped entirely.
/// [Action::Stop] ends the walk early and successfully. The first traversal
/// finalizes the module.
pub fn traverse<'ctx, R, A>(
    module: &Module<'ctx>,
    root: R,
    order: Order,
    visitor: &mut dyn Visitor,
    action: A,
) -> StrataResult<()>
where
    R: Into<ValueIdx>,
    A: FnMut(&Module<'ctx>, ValueIdx) -> VisResult,
{
    module.finalize();
    let mut walk = Walk {
        module,
        order,
        visitor,
        action,
    };
    let root = root.into();
    if walk.visit(root)?.is_stop() {
        log::debug!("Traversal of `{}' stopped early", module[root].label());
    }
    Ok(())
}

/// Like [traverse] with a visitor that does nothing.
pub fn traverse_with<'ctx, R, A>(
    module: &Module<'ctx>,
    root: R,
    order: Order,
    action: A,
) -> StrataResult<()>
where
    R: Into<ValueIdx>,
    A: FnMut(&Module<'ctx>, ValueIdx) -> VisResult,
{
    traverse(module, root, order, &mut NoopVisitor, action)
}

struct Walk<'m, 'ctx, 'v, A> {
    module: &'m Module<'ctx>,
    order: Order,
    visitor: &'v mut dyn Visitor,
    action: A,
}

impl<'ctx, A> Walk<'_, 'ctx, '_, A>
where
    A: FnMut(&Module<'ctx>, ValueIdx) -> VisResult,
{
    fn stage(&mut self, v: ValueIdx, stage: Stage) -> VisResult {
        dispatch(&mut *self.visitor, self.module, v, stage)
    }

    fn visit(&mut self, v: ValueIdx) -> VisResult {
        if self.is_empty_aggregate(v) {
            let value = &self.module[v];
            log::warn!(
                "Skipping `{}' ({}): aggregate has no fields",
                value.name(),
                value.variant()
            );
            return Ok(Action::Continue);
        }

        let pre = match self.order {
            Order::Pre => (self.action)(self.module, v)?,
            Order::Post => Action::Continue,
        };
        if pre.is_stop() {
            return Ok(Action::Stop);
        }

        let res = self
            .stage(v, Stage::Prolog)?
            .and_then(|| {
                if pre == Action::SkipChildren {
                    Ok(Action::SkipChildren)
                } else {
                    self.children(v)
                }
            })?
            .pop()
            .and_then(|| self.stage(v, Stage::Epilog))?
            .pop();
        if res.is_stop() {
            return Ok(Action::Stop);
        }

        match self.order {
            Order::Pre => Ok(Action::Continue),
            Order::Post => Ok((self.action)(self.module, v)?.pop()),
        }
    }

    /// Visit `values` in order, stopping if one of them stops.
    fn all<I>(&mut self, values: I) -> VisResult
    where
        I: IntoIterator<Item = ValueIdx>,
    {
        for v in values {
            if self.visit(v)?.is_stop() {
                return Ok(Action::Stop);
            }
        }
        Ok(Action::Continue)
    }

    fn children(&mut self, v: ValueIdx) -> VisResult {
        let module = self.module;
        match &module[v].kind {
            ValueKind::Module => self
                .all(module.structures().map(Into::into))?
                .and_then(|| self.all(module.constants().map(Into::into)))?
                .and_then(|| self.all(module.variables().map(Into::into)))?
                .and_then(|| self.all(module.memories().map(Into::into)))?
                .and_then(|| self.all(module.intrinsics().map(Into::into)))?
                .and_then(|| self.all(module.functions().map(Into::into))),
            ValueKind::Structure(s) => {
                self.all(s.fields().iter().map(Into::into))
            }
            ValueKind::Constant(c) => match c.literal() {
                Literal::Structure(lit) => {
                    self.all(lit.fields().iter().map(Into::into))
                }
                _ => Ok(Action::Continue),
            },
            ValueKind::Function(c) | ValueKind::Intrinsic(c) => {
                let body = c
                    .context()
                    .ok_or_else(|| Error::UnboundContext(module[v].name()))?;
                self.all(c.references().map(Into::into))?
                    .and_then(|| self.stage(v, Stage::Interlog))?
                    .and_then(|| self.visit(body.value()))
            }
            ValueKind::Scope(s) => {
                self.all(s.children().iter().map(Into::into))
            }
            ValueKind::Statement(s) => {
                let res =
                    self.all(s.instructions().iter().map(Into::into))?;
                if s.kind() == StatementKind::Trivial {
                    return Ok(res);
                }
                res.and_then(|| {
                    self.check_condition(v)?;
                    self.stage(v, Stage::Interlog)
                })?
                .and_then(|| self.all(s.scopes().iter().map(Into::into)))
            }
            ValueKind::Reference(_)
            | ValueKind::Variable(_)
            | ValueKind::Memory(_)
            | ValueKind::Instruction(_) => Ok(Action::Continue),
        }
    }

    fn is_empty_aggregate(&self, v: ValueIdx) -> bool {
        match &self.module[v].kind {
            ValueKind::Structure(s) => s.is_empty() && self.module[v].ty().is_none(),
            ValueKind::Constant(c) => c
                .as_structure()
                .is_some_and(|lit| lit.fields().is_empty()),
            _ => false,
        }
    }

    /// The last instruction of a branch or loop must produce a 1-bit value.
    fn check_condition(&self, v: ValueIdx) -> StrataResult<()> {
        if !self.module.context().conf().check_conditions {
            return Ok(());
        }
        let stmt = self.module.require::<crate::kind::Statement, _>(v)?;
        let cond = self.module.statement(stmt).condition();
        match cond.and_then(|c| self.module.type_of(c)) {
            Some(ty) if ty.is_bool() => Ok(()),
            Some(ty) => Err(Error::malformed(format!(
                "condition of `{}' has type {ty}, expected b1",
                self.module[v].name()
            ))),
            None => Err(Error::malformed(format!(
                "`{}' has no condition",
                self.module[v].name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Builder, Context, ScopeKind};

    #[test]
    fn skip_children_from_callback() {
        let ctx = Context::new();
        let mut m = ctx.module("m");
        let mut b = Builder::new(&mut m);
        b.add_variable("x", ctx.bool()).unwrap();
        let f = b.add_function("f").unwrap();
        b.add_input(f, "a", ctx.bool()).unwrap();
        b.bind_context(f, ScopeKind::Sequential).unwrap();

        let mut seen = vec![];
        traverse_with(&m, m.root(), Order::Pre, |m, v| {
            seen.push(m[v].name().to_string());
            if m.variant(v) == crate::Variant::Function {
                Ok(Action::SkipChildren)
            } else {
                Ok(Action::Continue)
            }
        })
        .unwrap();
        assert_eq!(seen, ["m", "x", "f"]);
    }

    #[test]
    fn stop_ends_walk() {
        let ctx = Context::new();
        let mut m = ctx.module("m");
        let mut b = Builder::new(&mut m);
        b.add_variable("x", ctx.bool()).unwrap();
        b.add_variable("y", ctx.bool()).unwrap();
        b.add_variable("z", ctx.bool()).unwrap();

        let mut seen = vec![];
        traverse_with(&m, m.root(), Order::Post, |m, v| {
            seen.push(m[v].name().to_string());
            if m[v].name() == "y" {
                Ok(Action::Stop)
            } else {
                Ok(Action::Continue)
            }
        })
        .unwrap();
        assert_eq!(seen, ["x", "y"]);
    }

    #[test]
    fn condition_must_be_boolean() {
        let ctx = Context::new();
        let mut m = ctx.module("m");
        let mut b = Builder::new(&mut m);
        let x = b.add_variable("x", ctx.bit(8).unwrap()).unwrap();
        let f = b.add_function("f").unwrap();
        let body = b.bind_context(f, ScopeKind::Sequential).unwrap();
        let br = b.add_statement(body, "br", StatementKind::Branch).unwrap();
        let load = b.load(x).unwrap();
        b.append(br, load).unwrap();

        let err = traverse_with(&m, m.root(), Order::Pre, |_, _| {
            Ok(Action::Continue)
        })
        .unwrap_err();
        assert!(matches!(err, Error::Malformed(_)));

        let lenient = Context::with_conf(crate::IrConf {
            check_conditions: false,
            ..Default::default()
        });
        let mut m = lenient.module("m");
        let mut b = Builder::new(&mut m);
        let f = b.add_function("f").unwrap();
        let body = b.bind_context(f, ScopeKind::Sequential).unwrap();
        b.add_statement(body, "l", StatementKind::Loop).unwrap();
        traverse_with(&m, f, Order::Pre, |_, _| Ok(Action::Continue)).unwrap();
    }
}
