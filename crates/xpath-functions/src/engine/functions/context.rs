//! Functions that read the focus, the static context or the clock. None of
//! them fold.
use super::common::Invocation;
use crate::consts::FNS;
use crate::engine::library::FunctionLibraryList;
use crate::engine::runtime::{Error, ErrorCode, StaticContext};
use crate::model::XdmNode;
use crate::xdm::{ExpandedName, XdmAtomicValue, XdmItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextOp {
    Position,
    Last,
    Lang,
    FunctionAvailable,
    DefaultCollation,
    CurrentDateTime,
    CurrentDate,
}

pub(crate) fn evaluate<N: XdmNode>(
    op: ContextOp,
    inv: &Invocation<'_, N>,
) -> Result<XdmAtomicValue, Error> {
    let dyn_ctx = inv.ctx.dyn_ctx;
    Ok(match op {
        ContextOp::Position | ContextOp::Last => {
            let (position, size) = dyn_ctx.focus.ok_or_else(|| {
                Error::from_code(ErrorCode::XPDY0002, format!("focus is undefined in {}()", inv.name()))
            })?;
            let n = if op == ContextOp::Position { position } else { size };
            XdmAtomicValue::Integer(i64::try_from(n).unwrap_or(i64::MAX))
        }
        ContextOp::Lang => XdmAtomicValue::Boolean(lang(inv)?),
        ContextOp::FunctionAvailable => {
            let name = inv.string(0)?;
            let arity = if inv.arity() > 1 { Some(inv.integer(1)?) } else { None };
            let available = match &dyn_ctx.functions {
                Some(libs) => function_available(&name, arity, inv.ctx.static_ctx, libs)?,
                None => function_available(
                    &name,
                    arity,
                    inv.ctx.static_ctx,
                    &FunctionLibraryList::<N>::standard(),
                )?,
            };
            XdmAtomicValue::Boolean(available)
        }
        ContextOp::DefaultCollation => {
            XdmAtomicValue::String(inv.ctx.static_ctx.default_collation().uri().to_string())
        }
        ContextOp::CurrentDateTime => XdmAtomicValue::DateTime(now(inv)),
        ContextOp::CurrentDate => {
            let now = now(inv);
            XdmAtomicValue::Date {
                date: now.date_naive(),
                tz: Some(*now.offset()),
            }
        }
    })
}

/// The instant of the evaluation, in the implicit timezone.
fn now<N: XdmNode>(inv: &Invocation<'_, N>) -> chrono::DateTime<chrono::FixedOffset> {
    let dyn_ctx = inv.ctx.dyn_ctx;
    let now = dyn_ctx
        .now
        .unwrap_or_else(|| chrono::Local::now().fixed_offset());
    match dyn_ctx.timezone_override {
        Some(tz) => now.with_timezone(&tz),
        None => now,
    }
}

fn lang<N: XdmNode>(inv: &Invocation<'_, N>) -> Result<bool, Error> {
    let test = inv.string(0)?.to_lowercase();
    let item = if inv.arity() > 1 {
        inv.item(1)?
    } else {
        Some(inv.context_item()?)
    };
    let node = match item {
        Some(XdmItem::Node(n)) => n,
        _ => {
            return Err(Error::from_code(
                ErrorCode::XPTY0004,
                "lang() requires a node",
            ));
        }
    };
    Ok(node.xml_lang().is_some_and(|l| {
        let l = l.to_lowercase();
        l == test || l.strip_prefix(&test).is_some_and(|rest| rest.starts_with('-'))
    }))
}

/// Resolve a lexical function name (`local`, `prefix:local` or
/// `Q{uri}local`) and ask the library chain whether it is available.
/// A negative arity accepts any arity.
pub(crate) fn function_available<N: XdmNode>(
    name: &str,
    arity: Option<i64>,
    sc: &StaticContext,
    libs: &FunctionLibraryList<N>,
) -> Result<bool, Error> {
    let name = name.trim();
    let expanded = if let Some(rest) = name.strip_prefix("Q{") {
        let Some((uri, local)) = rest.split_once('}') else {
            return Err(invalid_name(name));
        };
        ExpandedName::new((!uri.is_empty()).then(|| uri.to_string()), local)
    } else if let Some((prefix, local)) = name.split_once(':') {
        let uri = sc.namespaces.resolve(prefix).ok_or_else(|| {
            Error::from_code(
                ErrorCode::XPST0081,
                format!("namespace prefix '{prefix}' is not declared"),
            )
        })?;
        ExpandedName::ns(uri, local)
    } else {
        let ns = sc.default_function_namespace.as_deref().unwrap_or(FNS);
        ExpandedName::ns(ns, name)
    };
    if expanded.local.is_empty() {
        return Err(invalid_name(name));
    }
    let arity = arity.and_then(|a| usize::try_from(a).ok());
    Ok(libs.is_available(&expanded, arity))
}

fn invalid_name(name: &str) -> Error {
    Error::from_code(
        ErrorCode::FORG0001,
        format!("'{name}' is not a valid function name"),
    )
}
