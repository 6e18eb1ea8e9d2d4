use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::model::HolderRef;

/// Notifications emitted by an [`crate::engine::ExpressionEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormulaEvent {
    /// The holder's formula set is about to be replaced or modified.
    AboutToChange(HolderRef),
    /// The holder's formula set was modified.
    Changed(HolderRef),
    /// An `execute` pass finished, with the number of formulas applied.
    Executed(HolderRef, usize),
    /// Stable name of a holder changed, from -> to.
    OwnerRenamed(HolderRef, HolderRef),
}

impl FormulaEvent {
    pub fn holder(&self) -> &HolderRef {
        match self {
            FormulaEvent::AboutToChange(holder)
            | FormulaEvent::Changed(holder)
            | FormulaEvent::Executed(holder, _) => holder,
            FormulaEvent::OwnerRenamed(_, to) => to,
        }
    }
}

impl Display for FormulaEvent {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            FormulaEvent::AboutToChange(h) => write!(f, "AboutToChange({h})"),
            FormulaEvent::Changed(h) => write!(f, "Changed({h})"),
            FormulaEvent::Executed(h, n) => write!(f, "Executed({h}, {n})"),
            FormulaEvent::OwnerRenamed(from, to) => write!(f, "OwnerRenamed({from} -> {to})"),
        }
    }
}
