//! Pull-based sequences.
//!
//! A [`SequenceCursor`] produces items on demand. Cursors may additionally
//! report their remaining length (`last_position`) or peek (`has_next`)
//! without consuming; consumers fall back to plain advancing when a cursor
//! does not offer the capability.
use super::{XdmItem, XdmSequence};
use crate::engine::runtime::Error;
use std::sync::Arc;

pub type XdmItemResult<N> = Result<XdmItem<N>, Error>;

pub trait SequenceCursor<N> {
    fn next_item(&mut self) -> Option<XdmItemResult<N>>;

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, None)
    }

    /// Number of items still to come, if known without advancing.
    fn last_position(&self) -> Option<usize> {
        None
    }

    /// Whether another item follows, if known without advancing.
    fn has_next(&self) -> Option<bool> {
        None
    }

    /// Independent copy positioned at the same point.
    fn boxed_clone(&self) -> Box<dyn SequenceCursor<N>>;
}

/// A restartable lazy sequence: every call to [`cursor`](Self::cursor)
/// starts a fresh traversal from the beginning.
pub struct XdmSequenceStream<N> {
    seed: Box<dyn SequenceCursor<N>>,
}

impl<N: 'static + Clone> XdmSequenceStream<N> {
    pub fn new(cursor: impl SequenceCursor<N> + 'static) -> Self {
        Self {
            seed: Box::new(cursor),
        }
    }

    pub fn from_boxed(seed: Box<dyn SequenceCursor<N>>) -> Self {
        Self { seed }
    }

    pub fn from_vec(items: XdmSequence<N>) -> Self {
        Self::new(VecCursor::new(items))
    }

    pub fn empty() -> Self {
        Self::new(EmptyCursor)
    }

    pub fn single(item: XdmItem<N>) -> Self {
        Self::from_vec(vec![item])
    }

    pub fn cursor(&self) -> Box<dyn SequenceCursor<N>> {
        self.seed.boxed_clone()
    }

    pub fn into_cursor(self) -> Box<dyn SequenceCursor<N>> {
        self.seed
    }

    pub fn materialize(&self) -> Result<XdmSequence<N>, Error> {
        let mut cursor = self.cursor();
        let (lower, _) = cursor.size_hint();
        let mut out = Vec::with_capacity(lower);
        while let Some(item) = cursor.next_item() {
            out.push(item?);
        }
        Ok(out)
    }
}

impl<N> Clone for XdmSequenceStream<N> {
    fn clone(&self) -> Self {
        Self {
            seed: self.seed.boxed_clone(),
        }
    }
}

pub struct EmptyCursor;

impl<N: 'static> SequenceCursor<N> for EmptyCursor {
    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(0))
    }

    fn last_position(&self) -> Option<usize> {
        Some(0)
    }

    fn has_next(&self) -> Option<bool> {
        Some(false)
    }

    fn boxed_clone(&self) -> Box<dyn SequenceCursor<N>> {
        Box::new(EmptyCursor)
    }
}

/// Cursor over a shared, already materialized sequence.
pub struct VecCursor<N> {
    items: Arc<[XdmItem<N>]>,
    pos: usize,
}

impl<N> VecCursor<N> {
    pub fn new(items: XdmSequence<N>) -> Self {
        Self {
            items: items.into(),
            pos: 0,
        }
    }

    fn remaining(&self) -> usize {
        self.items.len() - self.pos
    }
}

impl<N: Clone + 'static> SequenceCursor<N> for VecCursor<N> {
    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        let item = self.items.get(self.pos)?.clone();
        self.pos += 1;
        Some(Ok(item))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining(), Some(self.remaining()))
    }

    fn last_position(&self) -> Option<usize> {
        Some(self.remaining())
    }

    fn has_next(&self) -> Option<bool> {
        Some(self.remaining() > 0)
    }

    fn boxed_clone(&self) -> Box<dyn SequenceCursor<N>> {
        Box::new(Self {
            items: Arc::clone(&self.items),
            pos: self.pos,
        })
    }
}

/// Concatenation of several lazy sequences, in order.
pub struct ConcatCursor<N> {
    parts: Vec<XdmSequenceStream<N>>,
    index: usize,
    current: Option<Box<dyn SequenceCursor<N>>>,
}

impl<N: Clone + 'static> ConcatCursor<N> {
    pub fn new(parts: Vec<XdmSequenceStream<N>>) -> Self {
        Self {
            parts,
            index: 0,
            current: None,
        }
    }
}

impl<N: Clone + 'static> SequenceCursor<N> for ConcatCursor<N> {
    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        loop {
            if let Some(cur) = self.current.as_mut() {
                if let Some(item) = cur.next_item() {
                    return Some(item);
                }
                self.current = None;
            }
            let part = self.parts.get(self.index)?;
            self.current = Some(part.cursor());
            self.index += 1;
        }
    }

    fn last_position(&self) -> Option<usize> {
        let mut total = match &self.current {
            Some(cur) => cur.last_position()?,
            None => 0,
        };
        for part in &self.parts[self.index..] {
            total += part.cursor().last_position()?;
        }
        Some(total)
    }

    fn boxed_clone(&self) -> Box<dyn SequenceCursor<N>> {
        Box::new(Self {
            parts: self.parts.clone(),
            index: self.index,
            current: self.current.as_ref().map(|c| c.boxed_clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xdm::XdmAtomicValue;

    fn ints(v: &[i64]) -> XdmSequenceStream<()> {
        XdmSequenceStream::from_vec(
            v.iter()
                .map(|i| XdmItem::Atomic(XdmAtomicValue::Integer(*i)))
                .collect(),
        )
    }

    #[test]
    fn cursor_restarts_from_beginning() {
        let s = ints(&[1, 2, 3]);
        let mut c = s.cursor();
        assert!(c.next_item().is_some());
        assert_eq!(c.last_position(), Some(2));
        assert_eq!(s.materialize().unwrap().len(), 3);
    }

    #[test]
    fn boxed_clone_keeps_position() {
        let s = ints(&[1, 2, 3]);
        let mut c = s.cursor();
        c.next_item();
        let mut copy = c.boxed_clone();
        assert_eq!(
            copy.next_item().unwrap().unwrap(),
            XdmItem::Atomic(XdmAtomicValue::Integer(2))
        );
        assert_eq!(c.last_position(), Some(2));
    }

    #[test]
    fn concat_reports_total_length() {
        let c = ConcatCursor::new(vec![ints(&[1, 2]), ints(&[]), ints(&[3])]);
        assert_eq!(c.last_position(), Some(3));
        let all = XdmSequenceStream::new(c).materialize().unwrap();
        assert_eq!(all.len(), 3);
    }
}
