#![allow(dead_code)]

use xpath_functions::{
    DynamicContextBuilder, Error, ErrorCode, SimpleNode, XdmAtomicValue, XdmItem, XdmSequence,
    evaluate_expr,
};

pub fn ctx() -> xpath_functions::DynamicContext<SimpleNode> {
    DynamicContextBuilder::new().build()
}

pub fn eval(expr: &str) -> Result<XdmSequence<SimpleNode>, Error> {
    evaluate_expr::<SimpleNode>(expr, &ctx())
}

/// String values of an all-atomic result.
pub fn strings(expr: &str) -> Vec<String> {
    eval(expr)
        .unwrap_or_else(|e| panic!("{expr}: {e}"))
        .into_iter()
        .map(|i| match i {
            XdmItem::Atomic(a) => a.string_value(),
            XdmItem::Node(n) => panic!("{expr}: unexpected node {n:?}"),
        })
        .collect()
}

pub fn single(expr: &str) -> XdmAtomicValue {
    match eval(expr).unwrap_or_else(|e| panic!("{expr}: {e}")).as_slice() {
        [XdmItem::Atomic(a)] => a.clone(),
        other => panic!("{expr}: expected one atomic value, got {other:?}"),
    }
}

pub fn as_string(expr: &str) -> String {
    single(expr).string_value()
}

pub fn as_bool(expr: &str) -> bool {
    match single(expr) {
        XdmAtomicValue::Boolean(b) => b,
        other => panic!("{expr}: expected boolean, got {other:?}"),
    }
}

pub fn err_code(expr: &str) -> ErrorCode {
    match eval(expr) {
        Ok(v) => panic!("{expr}: expected an error, got {v:?}"),
        Err(e) => e.code_enum(),
    }
}
