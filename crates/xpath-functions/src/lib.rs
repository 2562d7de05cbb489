//! XPath 2.0 standard function library.
//!
//! Function calls are resolved at compile time through an ordered chain of
//! [`FunctionLibrary`](engine::library::FunctionLibrary) resolvers, statically
//! checked (argument coercion, empty-argument short-circuits, constant folding)
//! and evaluated through three entry points: single item, lazy sequence and
//! effective boolean value.
//!
//! ```
//! use xpath_functions::{evaluate_expr, DynamicContextBuilder, SimpleNode};
//! use xpath_functions::xdm::{XdmAtomicValue, XdmItem};
//!
//! let ctx = DynamicContextBuilder::<SimpleNode>::new().build();
//! let out = evaluate_expr::<SimpleNode>("format-number(1234567.5, '#,##0.00')", &ctx).unwrap();
//! assert_eq!(out, vec![XdmItem::Atomic(XdmAtomicValue::String("1,234,567.50".into()))]);
//! ```
pub mod compiler;
pub mod consts;
pub mod engine;
pub mod evaluator;
pub mod model;
pub mod parser;
pub mod xdm;

pub use compiler::{XPathExpression, compile_xpath};
pub use engine::format_number::{DecimalPicture, format_number};
pub use engine::library::{
    ConstructorFunctionLibrary, ExecutableFunctionLibrary, FunctionLibrary, FunctionLibraryList,
    SystemFunctionLibrary, UserFunction, VendorFunctionLibrary,
};
pub use engine::runtime::{
    DynamicContext, DynamicContextBuilder, Error, ErrorCode, StaticContext, StaticContextBuilder,
};
pub use evaluator::{evaluate_expr, evaluate_first_expr, evaluate_stream_expr};
pub use model::XdmNode;
pub use model::simple::SimpleNode;
pub use xdm::{ExpandedName, XdmAtomicValue, XdmItem, XdmSequence, XdmSequenceStream};
