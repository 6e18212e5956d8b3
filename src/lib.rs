//! # Strata
//!
//! A structural intermediate representation for code generators that target
//! both software and hardware from the same program tree.
//!
//! This crate re-exports the Strata crates. Depend on [`strata_ir`] directly
//! if you do not need the utilities.
//!
//! ```
//! use strata::ir::{traversal, Builder, Context, ScopeKind, StatementKind};
//!
//! let ctx = Context::new();
//! let mut module = ctx.module("main");
//! let mut b = Builder::new(&mut module);
//! let f = b.add_function("f")?;
//! let body = b.bind_context(f, ScopeKind::Sequential)?;
//! let stmt = b.add_statement(body, "s", StatementKind::Trivial)?;
//! let nop = b.nop()?;
//! b.append(stmt, nop)?;
//!
//! let mut count = 0;
//! traversal::traverse_with(&module, module.root(), traversal::Order::Pre, |_, _| {
//!     count += 1;
//!     Ok(traversal::Action::Continue)
//! })?;
//! assert_eq!(count, 5);
//! # Ok::<(), strata::utils::Error>(())
//! ```
pub use strata_ir as ir;
pub use strata_utils as utils;

pub use strata_ir::{Builder, Context, IrConf, Module};
pub use strata_utils::{Error, StrataResult};
