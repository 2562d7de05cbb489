use crate::consts::{CODEPOINT_URI, ERR_NS, FNS, XML_URI, XS};
use crate::engine::collation::{Collation, CollationRegistry};
use crate::engine::decimal_format::DecimalFormatManager;
use crate::engine::library::FunctionLibraryList;
use crate::engine::regex::{FancyRegexProvider, RegexProvider};
use crate::xdm::{ExpandedName, XdmItem, XdmSequence};
use core::fmt;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// W3C error codes emitted by the function library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    FOAR0001, // division by zero
    FOAR0002, // numeric overflow
    FOCA0002, // invalid lexical value
    FOCH0001, // invalid codepoint
    FOCH0002, // unsupported collation
    FOCH0003, // unsupported normalization form
    FODF1280, // unknown decimal format
    FODF1310, // invalid picture string
    FOER0000, // fn:error default
    FORG0001, // invalid value for cast
    FORG0003, // zero-or-one violated
    FORG0004, // one-or-more violated
    FORG0005, // exactly-one violated
    FORG0006, // invalid argument type
    FORX0001, // invalid regex flags
    FORX0002, // invalid regex
    FORX0003, // regex matches zero-length string
    FORX0004, // invalid replacement string
    XPDY0002, // context item / focus undefined
    XPST0003, // syntax error
    XPST0008, // undeclared variable
    XPST0017, // unknown function or wrong arity
    XPST0081, // unbound namespace prefix
    XPTY0004, // type error
    XTSE1300, // conflicting decimal-format characters
    Unknown,
}

impl ErrorCode {
    pub fn local(&self) -> &'static str {
        match self {
            ErrorCode::FOAR0001 => "FOAR0001",
            ErrorCode::FOAR0002 => "FOAR0002",
            ErrorCode::FOCA0002 => "FOCA0002",
            ErrorCode::FOCH0001 => "FOCH0001",
            ErrorCode::FOCH0002 => "FOCH0002",
            ErrorCode::FOCH0003 => "FOCH0003",
            ErrorCode::FODF1280 => "FODF1280",
            ErrorCode::FODF1310 => "FODF1310",
            ErrorCode::FOER0000 => "FOER0000",
            ErrorCode::FORG0001 => "FORG0001",
            ErrorCode::FORG0003 => "FORG0003",
            ErrorCode::FORG0004 => "FORG0004",
            ErrorCode::FORG0005 => "FORG0005",
            ErrorCode::FORG0006 => "FORG0006",
            ErrorCode::FORX0001 => "FORX0001",
            ErrorCode::FORX0002 => "FORX0002",
            ErrorCode::FORX0003 => "FORX0003",
            ErrorCode::FORX0004 => "FORX0004",
            ErrorCode::XPDY0002 => "XPDY0002",
            ErrorCode::XPST0003 => "XPST0003",
            ErrorCode::XPST0008 => "XPST0008",
            ErrorCode::XPST0017 => "XPST0017",
            ErrorCode::XPST0081 => "XPST0081",
            ErrorCode::XPTY0004 => "XPTY0004",
            ErrorCode::XTSE1300 => "XTSE1300",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }

    /// The QName of this code in the `err:` namespace.
    pub fn qname(&self) -> ExpandedName {
        ExpandedName::ns(ERR_NS, self.local())
    }

    pub fn from_code(s: &str) -> Self {
        use ErrorCode::*;
        let local = s.strip_prefix("err:").unwrap_or(s);
        [
            FOAR0001, FOAR0002, FOCA0002, FOCH0001, FOCH0002, FOCH0003, FODF1280, FODF1310,
            FOER0000, FORG0001, FORG0003, FORG0004, FORG0005, FORG0006, FORX0001, FORX0002,
            FORX0003, FORX0004, XPDY0002, XPST0003, XPST0008, XPST0017, XPST0081, XPTY0004,
            XTSE1300,
        ]
        .into_iter()
        .find(|c| c.local() == local)
        .unwrap_or(Unknown)
    }
}

/// Whether an error was raised while compiling (binding, static checking)
/// or while evaluating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPhase {
    Static,
    Dynamic,
}

#[derive(Debug, Clone, thiserror::Error)]
pub struct Error {
    pub code: ExpandedName,
    pub message: String,
    pub phase: ErrorPhase,
    #[source]
    pub source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    pub fn new_qname(code: ExpandedName, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: msg.into(),
            phase: ErrorPhase::Dynamic,
            source: None,
        }
    }

    pub fn from_code(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self::new_qname(code.qname(), msg)
    }

    pub fn static_err(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self::from_code(code, msg).into_static()
    }

    /// Reclassify as a compile-time error.
    pub fn into_static(mut self) -> Self {
        self.phase = ErrorPhase::Static;
        self
    }

    pub fn is_static(&self) -> bool {
        self.phase == ErrorPhase::Static
    }

    pub fn code_enum(&self) -> ErrorCode {
        if self.code.is_in(ERR_NS) {
            ErrorCode::from_code(&self.code.local)
        } else {
            ErrorCode::Unknown
        }
    }

    /// `err:LOCAL` for W3C codes, `Q{ns}local` otherwise.
    pub fn format_code(&self) -> String {
        if self.code.is_in(ERR_NS) {
            format!("err:{}", self.code.local)
        } else if let Some(ns) = &self.code.ns_uri {
            format!("Q{{{}}}{}", ns, self.code.local)
        } else {
            self.code.local.clone()
        }
    }

    pub fn with_source(
        mut self,
        source: impl Into<Option<Arc<dyn std::error::Error + Send + Sync>>>,
    ) -> Self {
        self.source = source.into();
        self
    }
}

impl From<fancy_regex::Error> for Error {
    fn from(e: fancy_regex::Error) -> Self {
        Error::from_code(ErrorCode::FORX0002, "regex error")
            .with_source(Some(Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error: {} ({})", self.message, self.format_code())
    }
}

#[derive(Debug, Clone, Default)]
pub struct NamespaceBindings {
    pub by_prefix: HashMap<String, String>,
}

impl NamespaceBindings {
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        self.by_prefix.get(prefix).map(String::as_str)
    }
}

/// Compile-time environment. Captured by a compiled expression and consulted
/// again at run time for dynamically supplied collation, decimal-format and
/// QName arguments.
#[derive(Clone)]
pub struct StaticContext {
    pub default_function_namespace: Option<String>,
    pub default_collation: Option<String>,
    pub namespaces: NamespaceBindings,
    pub in_scope_variables: HashSet<ExpandedName>,
    pub collations: Arc<CollationRegistry>,
    pub decimal_formats: Arc<DecimalFormatManager>,
    pub regex: Arc<dyn RegexProvider>,
}

impl Default for StaticContext {
    fn default() -> Self {
        let mut ns = NamespaceBindings::default();
        for (prefix, uri) in [("xml", XML_URI), ("xs", XS), ("fn", FNS), ("err", ERR_NS)] {
            ns.by_prefix.insert(prefix.to_string(), uri.to_string());
        }
        Self {
            default_function_namespace: Some(FNS.to_string()),
            default_collation: Some(CODEPOINT_URI.to_string()),
            namespaces: ns,
            in_scope_variables: HashSet::new(),
            collations: Arc::new(CollationRegistry::default()),
            decimal_formats: Arc::new(DecimalFormatManager::default()),
            regex: Arc::new(FancyRegexProvider::default()),
        }
    }
}

impl fmt::Debug for StaticContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticContext")
            .field("default_function_namespace", &self.default_function_namespace)
            .field("default_collation", &self.default_collation)
            .field("namespaces", &self.namespaces)
            .field("in_scope_variables", &self.in_scope_variables)
            .field("decimal_formats", &self.decimal_formats)
            .finish_non_exhaustive()
    }
}

impl StaticContext {
    /// The default collation, falling back to codepoint when the configured
    /// URI is not registered.
    pub fn default_collation(&self) -> Arc<dyn Collation> {
        self.default_collation
            .as_deref()
            .and_then(|u| self.collations.get(u))
            .unwrap_or_else(|| self.collations.codepoint())
    }
}

/// Builder for `StaticContext`: explicit namespace registrations and default
/// settings while preserving the reserved `xml` binding.
pub struct StaticContextBuilder {
    ctx: StaticContext,
}

impl Default for StaticContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticContextBuilder {
    pub fn new() -> Self {
        Self {
            ctx: StaticContext::default(),
        }
    }

    pub fn with_default_function_namespace(mut self, uri: impl Into<String>) -> Self {
        self.ctx.default_function_namespace = Some(uri.into());
        self
    }

    pub fn with_default_collation(mut self, uri: impl Into<String>) -> Self {
        self.ctx.default_collation = Some(uri.into());
        self
    }

    /// Attempts to rebind the reserved `xml` prefix are ignored.
    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        let p = prefix.into();
        if p == "xml" {
            return self;
        }
        self.ctx.namespaces.by_prefix.insert(p, uri.into());
        self
    }

    pub fn with_variable(mut self, name: ExpandedName) -> Self {
        self.ctx.in_scope_variables.insert(name);
        self
    }

    pub fn with_collations(mut self, reg: Arc<CollationRegistry>) -> Self {
        self.ctx.collations = reg;
        self
    }

    pub fn with_decimal_formats(mut self, formats: Arc<DecimalFormatManager>) -> Self {
        self.ctx.decimal_formats = formats;
        self
    }

    pub fn with_regex(mut self, provider: Arc<dyn RegexProvider>) -> Self {
        self.ctx.regex = provider;
        self
    }

    pub fn build(self) -> StaticContext {
        self.ctx
    }
}

#[derive(Clone)]
pub struct DynamicContext<N> {
    pub context_item: Option<XdmItem<N>>,
    /// Context position and size; both present or both absent.
    pub focus: Option<(usize, usize)>,
    pub variables: HashMap<ExpandedName, XdmSequence<N>>,
    /// Libraries consulted by `function-available` when its arguments are
    /// only known at run time.
    pub functions: Option<Arc<FunctionLibraryList<N>>>,
    pub now: Option<chrono::DateTime<chrono::FixedOffset>>,
    pub timezone_override: Option<chrono::FixedOffset>,
}

impl<N> Default for DynamicContext<N> {
    fn default() -> Self {
        Self {
            context_item: None,
            focus: None,
            variables: HashMap::new(),
            functions: None,
            now: None,
            timezone_override: None,
        }
    }
}

pub struct DynamicContextBuilder<N> {
    ctx: DynamicContext<N>,
}

impl<N> Default for DynamicContextBuilder<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> DynamicContextBuilder<N> {
    pub fn new() -> Self {
        Self {
            ctx: DynamicContext::default(),
        }
    }

    /// Sets the context item with position and size 1.
    pub fn with_context_item(mut self, item: impl Into<XdmItem<N>>) -> Self {
        self.ctx.context_item = Some(item.into());
        self.ctx.focus = Some((1, 1));
        self
    }

    pub fn with_focus(mut self, position: usize, size: usize) -> Self {
        self.ctx.focus = Some((position, size));
        self
    }

    pub fn with_variable(mut self, name: ExpandedName, value: impl Into<XdmSequence<N>>) -> Self {
        self.ctx.variables.insert(name, value.into());
        self
    }

    pub fn with_functions(mut self, libs: Arc<FunctionLibraryList<N>>) -> Self {
        self.ctx.functions = Some(libs);
        self
    }

    // Fixed 'now' instant for deterministic date/time functions
    pub fn with_now(mut self, now: chrono::DateTime<chrono::FixedOffset>) -> Self {
        self.ctx.now = Some(now);
        self
    }

    pub fn with_timezone(mut self, offset_minutes: i32) -> Self {
        if let Some(tz) = chrono::FixedOffset::east_opt(offset_minutes * 60) {
            self.ctx.timezone_override = Some(tz);
        }
        self
    }

    pub fn build(self) -> DynamicContext<N> {
        self.ctx
    }
}

/// Evaluation environment handed to every function call.
pub struct CallCtx<'a, N> {
    pub dyn_ctx: &'a DynamicContext<N>,
    pub static_ctx: &'a StaticContext,
}

impl<N> Clone for CallCtx<'_, N> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<N> Copy for CallCtx<'_, N> {}

impl<'a, N> CallCtx<'a, N> {
    pub fn new(dyn_ctx: &'a DynamicContext<N>, static_ctx: &'a StaticContext) -> Self {
        Self { dyn_ctx, static_ctx }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_round_trips_through_qname() {
        let e = Error::static_err(ErrorCode::FODF1310, "bad picture");
        assert_eq!(e.code_enum(), ErrorCode::FODF1310);
        assert_eq!(e.format_code(), "err:FODF1310");
        assert!(e.is_static());
    }

    #[test]
    fn unlisted_codes_are_unknown() {
        assert_eq!(ErrorCode::from_code("err:FORG0006"), ErrorCode::FORG0006);
        assert_eq!(ErrorCode::from_code("XTSE1300"), ErrorCode::XTSE1300);
        assert_eq!(ErrorCode::from_code("err:ZZZZ0000"), ErrorCode::Unknown);
        let e = Error::from_code(ErrorCode::FOER0000, "raised");
        assert!(!e.is_static());
    }

    #[test]
    fn xml_prefix_cannot_be_rebound() {
        let sc = StaticContextBuilder::new()
            .with_namespace("xml", "urn:other")
            .with_namespace("p", "urn:p")
            .build();
        assert_eq!(sc.namespaces.resolve("xml"), Some(XML_URI));
        assert_eq!(sc.namespaces.resolve("p"), Some("urn:p"));
    }
}
