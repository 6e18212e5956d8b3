//! Actions control the traversal of a module.
use strata_utils::StrataResult;

/// Result of performing a visit.
pub type VisResult = StrataResult<Action>;

/// Action returned by a visitor stage or a traversal callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Continue traversal of the module.
    Continue,
    /// Globally abort the traversal. The walk still reports success.
    Stop,
    /// Skips the traversal of this node's children but continues traversing
    /// the sibling nodes. The node's remaining stages still run.
    SkipChildren,
}

impl Action {
    /// Run the traversal specified by `next` if this traversal succeeds.
    /// If the result of this traversal is not `Action::Continue`, do not
    /// run `next()`.
    pub(super) fn and_then<F>(self, mut next: F) -> VisResult
    where
        F: FnMut() -> VisResult,
    {
        match self {
            Action::Continue => next(),
            Action::Stop | Action::SkipChildren => Ok(self),
        }
    }

    /// Changes a Action::SkipChildren to Action::Continue.
    /// Should be called to indicate the boundary of traversing the children
    /// of a node.
    pub(super) fn pop(self) -> Self {
        match self {
            Action::SkipChildren => Action::Continue,
            x => x,
        }
    }

    pub fn is_stop(&self) -> bool {
        matches!(self, Action::Stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_then_short_circuits() {
        let mut ran = 0;
        let res = Action::Continue
            .and_then(|| {
                ran += 1;
                Ok(Action::SkipChildren)
            })
            .unwrap();
        assert_eq!(res, Action::SkipChildren);
        let res = res
            .and_then(|| {
                ran += 1;
                Ok(Action::Continue)
            })
            .unwrap();
        assert_eq!(ran, 1);
        assert_eq!(res.pop(), Action::Continue);
        assert_eq!(Action::Stop.pop(), Action::Stop);
    }
}
