//! Simple in-memory tree implementing `XdmNode`, used in tests and by hosts
//! that only need to pass a few nodes into function calls.
//!
//! ```
//! use xpath_functions::model::simple::{attr, elem, text};
//! use xpath_functions::XdmNode;
//!
//! // <p xml:lang="en"><span>Hello</span></p>
//! let p = elem("p")
//!     .attr(attr("xml:lang", "en"))
//!     .child(elem("span").child(text("Hello")))
//!     .build();
//! let span = p.children()[0].clone();
//! assert_eq!(span.xml_lang().as_deref(), Some("en"));
//! assert_eq!(p.string_value(), "Hello");
//! ```
use crate::consts::XML_URI;
use crate::model::{NodeKind, QName, XdmNode};
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

struct Inner {
    kind: NodeKind,
    name: Option<QName>,
    value: Option<String>,
    parent: OnceLock<Weak<Inner>>,
    attributes: Vec<SimpleNode>,
    children: Vec<SimpleNode>,
}

/// Arc-backed node; equality is identity.
#[derive(Clone)]
pub struct SimpleNode(Arc<Inner>);

impl PartialEq for SimpleNode {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for SimpleNode {}

impl fmt::Debug for SimpleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleNode")
            .field("kind", &self.0.kind)
            .field("name", &self.0.name)
            .field("value", &self.0.value)
            .finish()
    }
}

fn qname(name: &str) -> QName {
    match name.split_once(':') {
        Some(("xml", local)) => QName {
            prefix: Some("xml".to_string()),
            local: local.to_string(),
            ns_uri: Some(XML_URI.to_string()),
        },
        _ => QName {
            prefix: None,
            local: name.to_string(),
            ns_uri: None,
        },
    }
}

impl SimpleNode {
    fn leaf(kind: NodeKind, name: Option<QName>, value: &str) -> Self {
        SimpleNode(Arc::new(Inner {
            kind,
            name,
            value: Some(value.to_string()),
            parent: OnceLock::new(),
            attributes: Vec::new(),
            children: Vec::new(),
        }))
    }
}

pub struct SimpleNodeBuilder {
    kind: NodeKind,
    name: Option<QName>,
    attributes: Vec<SimpleNode>,
    children: Vec<SimpleNode>,
}

impl SimpleNodeBuilder {
    pub fn attr(mut self, attr: SimpleNode) -> Self {
        debug_assert!(attr.kind() == NodeKind::Attribute);
        self.attributes.push(attr);
        self
    }

    pub fn child(mut self, child: impl Into<SimpleNodeOrBuilder>) -> Self {
        self.children.push(match child.into() {
            SimpleNodeOrBuilder::Built(n) => n,
            SimpleNodeOrBuilder::Builder(b) => b.build(),
        });
        self
    }

    /// A node keeps the first parent it is attached to.
    pub fn build(self) -> SimpleNode {
        let node = SimpleNode(Arc::new(Inner {
            kind: self.kind,
            name: self.name,
            value: None,
            parent: OnceLock::new(),
            attributes: self.attributes,
            children: self.children,
        }));
        let weak = Arc::downgrade(&node.0);
        for n in node.0.attributes.iter().chain(&node.0.children) {
            let _ = n.0.parent.set(weak.clone());
        }
        node
    }
}

pub enum SimpleNodeOrBuilder {
    Built(SimpleNode),
    Builder(SimpleNodeBuilder),
}

impl From<SimpleNode> for SimpleNodeOrBuilder {
    fn from(n: SimpleNode) -> Self {
        SimpleNodeOrBuilder::Built(n)
    }
}

impl From<SimpleNodeBuilder> for SimpleNodeOrBuilder {
    fn from(b: SimpleNodeBuilder) -> Self {
        SimpleNodeOrBuilder::Builder(b)
    }
}

pub fn doc() -> SimpleNodeBuilder {
    SimpleNodeBuilder {
        kind: NodeKind::Document,
        name: None,
        attributes: Vec::new(),
        children: Vec::new(),
    }
}

pub fn elem(name: &str) -> SimpleNodeBuilder {
    SimpleNodeBuilder {
        kind: NodeKind::Element,
        name: Some(qname(name)),
        attributes: Vec::new(),
        children: Vec::new(),
    }
}

/// Attribute node; the `xml:` prefix maps to the XML namespace.
pub fn attr(name: &str, value: &str) -> SimpleNode {
    SimpleNode::leaf(NodeKind::Attribute, Some(qname(name)), value)
}

pub fn text(value: &str) -> SimpleNode {
    SimpleNode::leaf(NodeKind::Text, None, value)
}

impl XdmNode for SimpleNode {
    fn kind(&self) -> NodeKind {
        self.0.kind
    }

    fn name(&self) -> Option<QName> {
        self.0.name.clone()
    }

    fn string_value(&self) -> String {
        fn collect(n: &SimpleNode, out: &mut String) {
            if n.0.kind == NodeKind::Text {
                out.push_str(n.0.value.as_deref().unwrap_or_default());
            }
            for c in &n.0.children {
                collect(c, out);
            }
        }
        match self.0.kind {
            NodeKind::Element | NodeKind::Document => {
                let mut out = String::new();
                collect(self, &mut out);
                out
            }
            _ => self.0.value.clone().unwrap_or_default(),
        }
    }

    fn parent(&self) -> Option<Self> {
        self.0.parent.get().and_then(Weak::upgrade).map(SimpleNode)
    }

    fn attributes(&self) -> Vec<Self> {
        self.0.attributes.clone()
    }

    fn children(&self) -> Vec<Self> {
        self.0.children.clone()
    }
}
