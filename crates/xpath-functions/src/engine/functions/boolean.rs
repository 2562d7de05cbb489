use super::common::Invocation;
use crate::engine::runtime::Error;
use crate::model::XdmNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BooleanOp {
    True,
    False,
    Not,
    Boolean,
}

pub(crate) fn evaluate<N: XdmNode>(op: BooleanOp, inv: &Invocation<'_, N>) -> Result<bool, Error> {
    Ok(match op {
        BooleanOp::True => true,
        BooleanOp::False => false,
        BooleanOp::Not => !argument_ebv(inv)?,
        BooleanOp::Boolean => argument_ebv(inv)?,
    })
}

// nested calls get to short-circuit through their own boolean entry point
fn argument_ebv<N: XdmNode>(inv: &Invocation<'_, N>) -> Result<bool, Error> {
    match inv.arg(0) {
        Some(arg) => arg.effective_boolean_value(&inv.ctx),
        None => Ok(false),
    }
}
