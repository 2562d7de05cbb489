//! Existence tests and sequence functions.
//!
//! `remove` and `subsequence` wrap their input in lazy cursors that keep the
//! input's remaining-length capability where they can.
use super::common::{AtomicIter, Invocation};
use crate::engine::compare::atomic_equal;
use crate::engine::numeric::round_half_to_even_f64;
use crate::engine::runtime::{Error, ErrorCode};
use crate::model::XdmNode;
use crate::xdm::{SequenceCursor, XdmAtomicValue, XdmItem, XdmItemResult, XdmSequenceStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExistenceOp {
    Exists,
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequenceOp {
    Remove,
    Subsequence,
    Reverse,
    InsertBefore,
    IndexOf,
    DistinctValues,
    ExactlyOne,
    OneOrMore,
    ZeroOrOne,
    Unordered,
}

/// `exists` / `empty`: looks at most one item ahead.
pub(crate) fn exists<N: XdmNode>(op: ExistenceOp, inv: &Invocation<'_, N>) -> Result<bool, Error> {
    let mut cursor = inv.cursor(0)?;
    let non_empty = match cursor.has_next() {
        Some(b) => b,
        None => cursor.next_item().transpose()?.is_some(),
    };
    Ok(match op {
        ExistenceOp::Exists => non_empty,
        ExistenceOp::Empty => !non_empty,
    })
}

pub(crate) fn iterate<N: XdmNode>(
    op: SequenceOp,
    inv: &Invocation<'_, N>,
) -> Result<XdmSequenceStream<N>, Error> {
    match op {
        SequenceOp::Remove => {
            let position = inv.integer(1)?;
            let input = inv.stream(0)?;
            Ok(match usize::try_from(position) {
                Ok(p) if p >= 1 => XdmSequenceStream::new(RemoveCursor::new(input.into_cursor(), p)),
                _ => input,
            })
        }
        SequenceOp::Subsequence => {
            let start = inv.double(1)?;
            let length = if inv.arity() > 2 { Some(inv.double(2)?) } else { None };
            let input = inv.stream(0)?;
            Ok(match window(start, length) {
                Some((skip, take)) => {
                    XdmSequenceStream::new(SubsequenceCursor::new(input.into_cursor(), skip, take))
                }
                None => XdmSequenceStream::empty(),
            })
        }
        SequenceOp::Reverse => {
            let mut items = inv.stream(0)?.materialize()?;
            items.reverse();
            Ok(XdmSequenceStream::from_vec(items))
        }
        SequenceOp::InsertBefore => {
            let target = inv.stream(0)?.materialize()?;
            let position = inv.integer(1)?;
            let inserts = inv.stream(2)?.materialize()?;
            let at = usize::try_from(position.max(1) - 1)
                .unwrap_or(0)
                .min(target.len());
            let mut out = Vec::with_capacity(target.len() + inserts.len());
            let mut target = target.into_iter();
            out.extend(target.by_ref().take(at));
            out.extend(inserts);
            out.extend(target);
            Ok(XdmSequenceStream::from_vec(out))
        }
        SequenceOp::IndexOf => {
            let collation = inv.collation(2)?;
            let Some(search) = inv.atomic(1)? else {
                return Err(Error::from_code(
                    ErrorCode::XPTY0004,
                    "index-of() requires a search value",
                ));
            };
            let mut out = Vec::new();
            for (i, v) in AtomicIter::new(inv.cursor(0)?).enumerate() {
                if atomic_equal(&v?, &search, collation.as_ref(), false) {
                    out.push(XdmItem::Atomic(XdmAtomicValue::Integer(
                        i64::try_from(i + 1).unwrap_or(i64::MAX),
                    )));
                }
            }
            Ok(XdmSequenceStream::from_vec(out))
        }
        SequenceOp::DistinctValues => {
            let collation = inv.collation(1)?;
            let mut seen: Vec<XdmAtomicValue> = Vec::new();
            for v in AtomicIter::new(inv.cursor(0)?) {
                let v = v?;
                if !seen
                    .iter()
                    .any(|s| atomic_equal(s, &v, collation.as_ref(), true))
                {
                    seen.push(v);
                }
            }
            Ok(XdmSequenceStream::from_vec(
                seen.into_iter().map(XdmItem::Atomic).collect(),
            ))
        }
        SequenceOp::ExactlyOne | SequenceOp::OneOrMore | SequenceOp::ZeroOrOne => {
            let input = inv.stream(0)?;
            check_cardinality(op, &input)?;
            Ok(input)
        }
        SequenceOp::Unordered => inv.stream(0),
    }
}

fn check_cardinality<N: XdmNode>(op: SequenceOp, input: &XdmSequenceStream<N>) -> Result<(), Error> {
    let mut probe = input.cursor();
    let mut n = 0usize;
    while n < 2 && probe.next_item().transpose()?.is_some() {
        n += 1;
    }
    let (ok, code, msg) = match op {
        SequenceOp::ExactlyOne => (
            n == 1,
            ErrorCode::FORG0005,
            "exactly-one() called with a sequence that does not contain exactly one item",
        ),
        SequenceOp::OneOrMore => (
            n >= 1,
            ErrorCode::FORG0004,
            "one-or-more() called with an empty sequence",
        ),
        _ => (
            n <= 1,
            ErrorCode::FORG0003,
            "zero-or-one() called with a sequence containing more than one item",
        ),
    };
    if ok { Ok(()) } else { Err(Error::from_code(code, msg)) }
}

/// Translate a numeric start position and optional length (as taken by
/// `subsequence` and `substring`) into a skip count and an optional take
/// count. `None` means the window is empty.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub(crate) fn window(start: f64, length: Option<f64>) -> Option<(usize, Option<usize>)> {
    let start = round_half_to_even_f64(start);
    if start.is_nan() || start == f64::INFINITY {
        return None;
    }
    let first = start.max(1.0);
    let take = match length {
        None => None,
        Some(len) => {
            let end = start + round_half_to_even_f64(len);
            // NaN compares false, so an undefined end selects nothing
            if !(end > first) {
                return None;
            }
            if end == f64::INFINITY {
                None
            } else {
                Some((end - first).min(usize::MAX as f64) as usize)
            }
        }
    };
    let skip = (first - 1.0).min(usize::MAX as f64) as usize;
    Some((skip, take))
}

/// All items of the input except the one at a 1-based position.
pub struct RemoveCursor<N> {
    inner: Box<dyn SequenceCursor<N>>,
    index: usize,
    /// Items consumed from `inner` so far.
    pos: usize,
}

impl<N> RemoveCursor<N> {
    pub fn new(inner: Box<dyn SequenceCursor<N>>, index: usize) -> Self {
        Self {
            inner,
            index,
            pos: 0,
        }
    }
}

impl<N: 'static> SequenceCursor<N> for RemoveCursor<N> {
    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        loop {
            let item = self.inner.next_item()?;
            self.pos += 1;
            if self.pos != self.index {
                return Some(item);
            }
            if item.is_err() {
                return Some(item);
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (lo, hi) = self.inner.size_hint();
        (lo.saturating_sub(1), hi)
    }

    fn last_position(&self) -> Option<usize> {
        let remaining = self.inner.last_position()?;
        let ahead = self.index > self.pos && self.index <= self.pos + remaining;
        Some(if ahead { remaining - 1 } else { remaining })
    }

    fn has_next(&self) -> Option<bool> {
        if self.pos + 1 == self.index {
            return self.last_position().map(|n| n > 0);
        }
        self.inner.has_next()
    }

    fn boxed_clone(&self) -> Box<dyn SequenceCursor<N>> {
        Box::new(Self {
            inner: self.inner.boxed_clone(),
            index: self.index,
            pos: self.pos,
        })
    }
}

/// Window of the input: skip `skip` items, then yield at most `take`
/// (unbounded when `None`).
pub struct SubsequenceCursor<N> {
    inner: Box<dyn SequenceCursor<N>>,
    skip: usize,
    take: Option<usize>,
}

impl<N> SubsequenceCursor<N> {
    pub fn new(inner: Box<dyn SequenceCursor<N>>, skip: usize, take: Option<usize>) -> Self {
        Self { inner, skip, take }
    }
}

impl<N: 'static> SequenceCursor<N> for SubsequenceCursor<N> {
    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        while self.skip > 0 {
            let item = self.inner.next_item()?;
            self.skip -= 1;
            if let Err(e) = item {
                return Some(Err(e));
            }
        }
        if let Some(take) = self.take.as_mut() {
            if *take == 0 {
                return None;
            }
            *take -= 1;
        }
        self.inner.next_item()
    }

    fn last_position(&self) -> Option<usize> {
        let available = self.inner.last_position()?.saturating_sub(self.skip);
        Some(self.take.map_or(available, |t| t.min(available)))
    }

    fn boxed_clone(&self) -> Box<dyn SequenceCursor<N>> {
        Box::new(Self {
            inner: self.inner.boxed_clone(),
            skip: self.skip,
            take: self.take,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::simple::SimpleNode;
    use rstest::rstest;

    fn ints(v: &[i64]) -> Box<dyn SequenceCursor<SimpleNode>> {
        XdmSequenceStream::from_vec(
            v.iter()
                .map(|i| XdmItem::Atomic(XdmAtomicValue::Integer(*i)))
                .collect(),
        )
        .into_cursor()
    }

    fn drain(mut c: Box<dyn SequenceCursor<SimpleNode>>) -> Vec<i64> {
        let mut out = Vec::new();
        while let Some(item) = c.next_item() {
            match item.unwrap() {
                XdmItem::Atomic(XdmAtomicValue::Integer(i)) => out.push(i),
                other => panic!("unexpected {other:?}"),
            }
        }
        out
    }

    #[rstest]
    #[case(1, 2, vec![2, 3])]
    #[case(2, 2, vec![1, 3])]
    #[case(3, 2, vec![1, 2])]
    #[case(4, 3, vec![1, 2, 3])]
    fn remove_reports_remaining_length(#[case] index: usize, #[case] len: usize, #[case] rest: Vec<i64>) {
        let c = RemoveCursor::new(ints(&[1, 2, 3]), index);
        assert_eq!(c.last_position(), Some(len));
        assert_eq!(drain(Box::new(c)), rest);
    }

    #[test]
    fn remove_length_after_passing_the_index() {
        let mut c = RemoveCursor::new(ints(&[1, 2, 3, 4]), 2);
        c.next_item();
        c.next_item();
        // the removed item was skipped on the way to the second result
        assert_eq!(c.last_position(), Some(1));
        let mut c = RemoveCursor::new(ints(&[1, 2, 3, 4]), 2);
        c.next_item();
        assert_eq!(c.last_position(), Some(2));
    }

    #[rstest]
    #[case(1.0, None, Some((0, None)))]
    #[case(-5.0, None, Some((0, None)))]
    #[case(2.5, Some(2.0), Some((1, Some(2))))]
    #[case(1.5, Some(1.5), Some((1, Some(2))))]
    #[case(0.0, Some(2.0), Some((0, Some(1))))]
    #[case(f64::NAN, None, None)]
    #[case(1.0, Some(f64::NAN), None)]
    #[case(3.0, Some(0.0), None)]
    #[case(f64::NEG_INFINITY, Some(f64::INFINITY), None)]
    #[case(1.0, Some(f64::INFINITY), Some((0, None)))]
    fn subsequence_window_bounds(
        #[case] start: f64,
        #[case] length: Option<f64>,
        #[case] expected: Option<(usize, Option<usize>)>,
    ) {
        assert_eq!(window(start, length), expected);
    }

    #[test]
    fn subsequence_window() {
        let (skip, take) = window(2.0, Some(2.0)).unwrap();
        let c = SubsequenceCursor::new(ints(&[1, 2, 3, 4]), skip, take);
        assert_eq!(c.last_position(), Some(2));
        assert_eq!(drain(Box::new(c)), vec![2, 3]);
    }
}
