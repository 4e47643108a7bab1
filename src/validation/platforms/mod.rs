//! Shipped platform specializations.

mod calliope;
mod ev3;
mod nxt;

pub use calliope::{Calliope, LEDS_ON};
pub use ev3::Ev3;
pub use nxt::Nxt;

use crate::ast::{NodeRef, Phrase};

/// The value of a number literal, if `node` is one.
pub(crate) fn literal_number(node: &NodeRef) -> Option<f64> {
    match node.phrase() {
        Phrase::NumConst(num) => num.as_f64(),
        _ => None,
    }
}
