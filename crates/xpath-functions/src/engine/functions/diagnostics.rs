use super::common::Invocation;
use crate::engine::runtime::{Error, ErrorCode};
use crate::model::XdmNode;
use crate::xdm::{ExpandedName, XdmAtomicValue, XdmSequenceStream};
use itertools::Itertools;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticOp {
    Error,
    Trace,
}

/// The error raised by `fn:error`.
pub(crate) fn error<N: XdmNode>(inv: &Invocation<'_, N>) -> Result<Error, Error> {
    let code = match inv.atomic(0)? {
        Some(XdmAtomicValue::QName { ns_uri, local, .. }) => ExpandedName::new(ns_uri, local),
        _ => ErrorCode::FOER0000.qname(),
    };
    let message = if inv.arity() > 1 {
        inv.string(1)?
    } else {
        "error signalled by fn:error()".to_string()
    };
    if inv.arity() > 2 {
        let value = inv.stream(2)?.materialize()?;
        debug!(code = %code, items = value.len(), "fn:error called with an error object");
    }
    Ok(Error::new_qname(code, message))
}

/// `fn:trace`: logs the value and returns it unchanged.
pub(crate) fn trace<N: XdmNode>(inv: &Invocation<'_, N>) -> Result<XdmSequenceStream<N>, Error> {
    let items = inv.stream(0)?.materialize()?;
    let label = inv.string(1)?;
    debug!(label = %label, value = %items.iter().join(", "), "fn:trace");
    Ok(XdmSequenceStream::from_vec(items))
}
