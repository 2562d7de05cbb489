pub mod call;
pub mod cast;
pub mod collation;
pub mod compare;
pub mod decimal_format;
pub mod expr;
pub mod format_number;
pub mod functions;
pub mod library;
pub mod numeric;
pub mod regex;
pub mod runtime;
pub mod signatures;
