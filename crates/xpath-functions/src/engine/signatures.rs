//! The static signature table of the `fn:` namespace.
//!
//! Built once on first use and read-only afterwards. Each entry covers an
//! arity range; variadic functions (`concat`) repeat their last argument
//! type.
use crate::consts::FNS;
use crate::engine::functions::{Family, register_system_functions};
use crate::xdm::{ExpandedName, SequenceType, XdmAtomicValue};
use std::collections::HashMap;
use std::sync::OnceLock;
use string_cache::DefaultAtom;

/// Result of a call when the argument it is attached to is statically the
/// empty sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum IfEmpty {
    Value(XdmAtomicValue),
    EmptySequence,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArgSpec {
    pub required: SequenceType,
    pub if_empty: Option<IfEmpty>,
}

/// Whether a call may be pre-evaluated when all its arguments are literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Folding {
    Allowed,
    Never,
    /// Depends on the focus when called with exactly this many arguments.
    NeverAtArity(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    pub name: ExpandedName,
    pub min_arity: usize,
    pub max_arity: Option<usize>,
    pub family: Family,
    pub args: Vec<ArgSpec>,
    pub result: SequenceType,
    pub folding: Folding,
}

impl FunctionSignature {
    pub fn accepts(&self, arity: usize) -> bool {
        arity >= self.min_arity && self.max_arity.is_none_or(|m| arity <= m)
    }

    /// Specification of the `i`-th argument.
    pub fn arg(&self, i: usize) -> Option<&ArgSpec> {
        self.args.get(i).or(self.args.last())
    }

    pub fn can_fold(&self, arity: usize) -> bool {
        match self.folding {
            Folding::Allowed => true,
            Folding::Never => false,
            Folding::NeverAtArity(n) => n != arity,
        }
    }

    /// The arities this function can be called with, for diagnostics.
    pub fn arities(&self) -> Vec<usize> {
        match self.max_arity {
            Some(max) => (self.min_arity..=max).collect(),
            None => vec![self.min_arity],
        }
    }
}

/// Fluent construction of a signature inside the registration function.
pub(crate) struct SignatureBuilder<'t> {
    table: &'t mut SignatureTable,
    sig: FunctionSignature,
}

impl SignatureBuilder<'_> {
    pub(crate) fn arg(mut self, required: SequenceType) -> Self {
        self.sig.args.push(ArgSpec {
            required,
            if_empty: None,
        });
        self
    }

    pub(crate) fn arg_or(mut self, required: SequenceType, if_empty: impl Into<XdmAtomicValue>) -> Self {
        self.sig.args.push(ArgSpec {
            required,
            if_empty: Some(IfEmpty::Value(if_empty.into())),
        });
        self
    }

    pub(crate) fn arg_or_empty(mut self, required: SequenceType) -> Self {
        self.sig.args.push(ArgSpec {
            required,
            if_empty: Some(IfEmpty::EmptySequence),
        });
        self
    }

    pub(crate) fn folding(mut self, folding: Folding) -> Self {
        self.sig.folding = folding;
        self
    }

    pub(crate) fn returns(self, result: SequenceType) {
        let mut sig = self.sig;
        sig.result = result;
        self.table
            .entries
            .insert(DefaultAtom::from(sig.name.local.as_str()), sig);
    }
}

#[derive(Default)]
pub struct SignatureTable {
    entries: HashMap<DefaultAtom, FunctionSignature>,
}

impl SignatureTable {
    pub(crate) fn define(
        &mut self,
        local: &str,
        min_arity: usize,
        max_arity: Option<usize>,
        family: Family,
    ) -> SignatureBuilder<'_> {
        SignatureBuilder {
            table: self,
            sig: FunctionSignature {
                name: ExpandedName::ns(FNS, local),
                min_arity,
                max_arity,
                family,
                args: Vec::new(),
                result: SequenceType::ANY,
                folding: Folding::Allowed,
            },
        }
    }

    pub fn get(&self, local: &str) -> Option<&FunctionSignature> {
        self.entries.get(&DefaultAtom::from(local))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FunctionSignature> {
        self.entries.values()
    }
}

static SYSTEM_SIGNATURES: OnceLock<SignatureTable> = OnceLock::new();

pub fn system_signatures() -> &'static SignatureTable {
    SYSTEM_SIGNATURES.get_or_init(|| {
        let mut table = SignatureTable::default();
        register_system_functions(&mut table);
        table
    })
}

/// Signature of the `fn:` function with this local name.
pub fn lookup(local: &str) -> Option<&'static FunctionSignature> {
    system_signatures().get(local)
}
