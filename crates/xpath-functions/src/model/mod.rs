//! The node contract the function library needs from a host tree.
use crate::consts::XML_URI;
use crate::xdm::XdmAtomicValue;

pub mod simple;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
    pub ns_uri: Option<String>,
}

pub trait XdmNode: Clone + Eq + core::fmt::Debug + Send + Sync + 'static {
    fn kind(&self) -> NodeKind;
    fn name(&self) -> Option<QName>;
    fn string_value(&self) -> String;
    fn parent(&self) -> Option<Self>;
    fn attributes(&self) -> Vec<Self>;
    fn children(&self) -> Vec<Self>;

    /// Atomized value. Untyped trees yield `xs:untypedAtomic`.
    fn typed_value(&self) -> Vec<XdmAtomicValue> {
        vec![XdmAtomicValue::UntypedAtomic(self.string_value())]
    }

    /// The `xml:lang` in scope for this node: the nearest value on the node
    /// itself or an ancestor.
    fn xml_lang(&self) -> Option<String> {
        let mut cur = Some(self.clone());
        while let Some(n) = cur {
            if n.kind() == NodeKind::Attribute {
                cur = n.parent();
                continue;
            }
            let lang = n.attributes().into_iter().find(|a| {
                a.name()
                    .is_some_and(|q| q.local == "lang" && q.ns_uri.as_deref() == Some(XML_URI))
            });
            if let Some(a) = lang {
                return Some(a.string_value());
            }
            cur = n.parent();
        }
        None
    }
}
