//! Helpers for traversing modules.
//!
//! [traverse] walks the value tree below a root depth first. At every node
//! it runs the node's [Stage]s on a [Visitor] and, in [Order::Pre] or
//! [Order::Post] position, a plain callback.
mod action;
mod engine;
mod visitor;

pub use action::{Action, VisResult};
pub use engine::{traverse, traverse_with, Order};
pub use visitor::{dispatch, NoopVisitor, Stage, Visitor};
