/// Standard function namespace (`fn:`).
pub const FNS: &str = "http://www.w3.org/2005/xpath-functions";
/// XML Schema namespace (`xs:`), owner of the constructor functions.
pub const XS: &str = "http://www.w3.org/2001/XMLSchema";
/// W3C error namespace (`err:`).
pub const ERR_NS: &str = "http://www.w3.org/2005/xqt-errors";
pub const XML_URI: &str = "http://www.w3.org/XML/1998/namespace";
/// Namespace of the extension functions shipped with this crate.
pub const EXT_NS: &str = "urn:xpath-functions:ext";

pub const CODEPOINT_URI: &str = "http://www.w3.org/2005/xpath-functions/collation/codepoint";
pub const SIMPLE_CASE_URI: &str = "urn:xpath-functions:collation:simple-case";
pub const SIMPLE_ACCENT_URI: &str = "urn:xpath-functions:collation:simple-accent";
pub const SIMPLE_CASE_ACCENT_URI: &str = "urn:xpath-functions:collation:simple-case-accent";
