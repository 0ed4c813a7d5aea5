use std::collections::BTreeMap;
use std::ops::Bound;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, trace};

use crate::ast::{self, Direction, Op, Range, Value};
use crate::semantics::LanguageSemantics;
use crate::ty::Type;

mod merge;

/// One input descriptor: which indexes of the span the mapped value
/// populates.
#[derive(Debug, Clone, Copy)]
pub enum IndexInfo<'a> {
    /// A single index.
    Expression(&'a Value),
    /// A contiguous run of indexes, every one holding the same value.
    Range(&'a Range),
    /// A contiguous run of indexes; each index takes the value at the
    /// matching offset of the mapped value.
    Slice(&'a Range),
}

/// The input assignments. Order carries no meaning; the analysis
/// establishes partition order itself. When two entries overlap, the later
/// one wins (unsupported input, accepted without guarantees).
pub type IndexMap<'a> = Vec<(IndexInfo<'a>, &'a Value)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum IndexKind {
    Expression,
    Range,
    Slice,
}

/// A normalized, zero-based interval key of the partition.
///
/// Bounds are rebased so that the span minimum is index 0. A degenerate
/// interval (`min == max`) is always of kind [`IndexKind::Expression`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValueIndex {
    kind: IndexKind,
    min: u64,
    max: u64,
}

impl ValueIndex {
    pub fn new(kind: IndexKind, min: u64, max: u64) -> Self {
        debug_assert!(min <= max);
        let kind = if min == max {
            IndexKind::Expression
        } else {
            kind
        };
        Self { kind, min, max }
    }

    pub fn expression(index: u64) -> Self {
        Self {
            kind: IndexKind::Expression,
            min: index,
            max: index,
        }
    }

    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    pub fn min(&self) -> u64 {
        self.min
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    pub fn size(&self) -> u64 {
        self.max - self.min + 1
    }
}

impl Ord for ValueIndex {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.min
            .cmp(&other.min)
            .then(self.max.cmp(&other.max))
            .then(self.kind.cmp(&other.kind))
    }
}

impl PartialOrd for ValueIndex {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// The partition: an ordered map from disjoint interval keys to owned
/// values. Inserting a key first evicts every entry it overlaps, so the
/// disjointness invariant holds by construction.
#[derive(Debug, Default)]
pub struct ValueMap {
    entries: BTreeMap<ValueIndex, Value>,
}

impl ValueMap {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ValueIndex, &Value)> {
        self.entries.iter()
    }

    pub fn get(&self, key: &ValueIndex) -> Option<&Value> {
        self.entries.get(key)
    }

    /// The entry whose interval contains `index`, if any.
    pub fn covering(&self, index: u64) -> Option<(&ValueIndex, &Value)> {
        let probe = ValueIndex {
            kind: IndexKind::Slice,
            min: index,
            max: u64::MAX,
        };
        self.entries
            .range(..=probe)
            .next_back()
            .filter(|(key, _)| key.max >= index)
    }

    pub(crate) fn insert(&mut self, key: ValueIndex, value: Value) {
        let stale: Vec<ValueIndex> = self
            .entries
            .keys()
            .skip_while(|k| k.max < key.min)
            .take_while(|k| k.min <= key.max)
            .copied()
            .collect();
        for old in stale {
            self.entries.remove(&old);
        }
        self.entries.insert(key, value);
    }

    pub(crate) fn remove(&mut self, key: &ValueIndex) -> Option<Value> {
        self.entries.remove(key)
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn first_key(&self) -> Option<ValueIndex> {
        self.entries.keys().next().copied()
    }

    pub(crate) fn next_key_after(&self, key: &ValueIndex) -> Option<ValueIndex> {
        self.entries
            .range((Bound::Excluded(*key), Bound::Unbounded))
            .next()
            .map(|(k, _)| *k)
    }
}

impl IntoIterator for ValueMap {
    type Item = (ValueIndex, Value);
    type IntoIter = std::collections::btree_map::IntoIter<ValueIndex, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Why a span analysis failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SpanError {
    #[error("type carries no span")]
    NoSpan,
    #[error("index expression does not simplify to an integer constant")]
    NotConstant,
    #[error("index {0} is outside the declared span")]
    OutOfRange(i64),
    #[error("uncovered indexes but no others value was provided")]
    MissingOthers,
    #[error("empty index map over a span of unknown width")]
    EmptyIndexMap,
}

/// The finalized partition of a span.
///
/// Move-only by design: the contained values are exclusively owned and are
/// released on drop; use [`AnalyzeSpansResult::into_map`] to take them.
#[derive(Debug, Default)]
pub struct AnalyzeSpansResult {
    map: ValueMap,
    max_bound: u64,
    all_specified: bool,
    all_others: bool,
}

impl AnalyzeSpansResult {
    pub fn map(&self) -> &ValueMap {
        &self.map
    }

    /// The greatest covered index, rebased to zero.
    pub fn max_bound(&self) -> u64 {
        self.max_bound
    }

    /// True when the partition statically covers the whole declared span.
    pub fn all_specified(&self) -> bool {
        self.all_specified
    }

    /// True when every partition slot equals the `others` default.
    pub fn all_others(&self) -> bool {
        self.all_others
    }

    pub fn into_map(self) -> ValueMap {
        self.map
    }
}

/// Classifies, bounds-normalizes, defragments and re-synthesizes a set of
/// partial index assignments into a minimal canonical partition of the
/// span of `span_type`.
///
/// Values retained in the result are clones; the inputs are only borrowed.
/// `others` is the default for indexes not present in `index_map`.
pub fn analyze_spans<S: LanguageSemantics>(
    span_type: &Type,
    index_map: &IndexMap<'_>,
    sem: &S,
    others: Option<&Value>,
) -> Result<AnalyzeSpansResult, SpanError> {
    let mut analyzer = SpanAnalyzer::new(sem);
    analyzer.run(span_type, index_map, others)?;
    Ok(analyzer.result)
}

pub(crate) struct SpanAnalyzer<'s, S: LanguageSemantics> {
    sem: &'s S,
    int_type: Type,
    ref_direction: Direction,
    result: AnalyzeSpansResult,
}

impl<'s, S: LanguageSemantics> SpanAnalyzer<'s, S> {
    fn new(sem: &'s S) -> Self {
        Self {
            sem,
            int_type: Type::int(),
            ref_direction: Direction::Downto,
            result: AnalyzeSpansResult::default(),
        }
    }

    fn run(
        &mut self,
        span_type: &Type,
        index_map: &IndexMap<'_>,
        others: Option<&Value>,
    ) -> Result<(), SpanError> {
        let span = self.sem.type_span(span_type).ok_or(SpanError::NoSpan)?;
        self.ref_direction = span.direction;
        debug!(
            entries = index_map.len(),
            direction = ?self.ref_direction,
            "analyzing span indexes"
        );

        self.categorize(span, index_map, others)?;
        self.fill_holes(others)?;
        self.merge_indexes();
        self.refine_prefixed_references();
        self.refine_all_others(others);

        trace!(
            entries = self.result.map.len(),
            max_bound = self.result.max_bound,
            all_specified = self.result.all_specified,
            all_others = self.result.all_others,
            "span partition finalized"
        );
        Ok(())
    }

    /// Converts every input entry into a zero-based partition key, then
    /// closes the partition against the statically known span width.
    fn categorize(
        &mut self,
        span: &Range,
        index_map: &IndexMap<'_>,
        others: Option<&Value>,
    ) -> Result<(), SpanError> {
        let min = span.min_bound();
        for (info, value) in index_map.iter() {
            match *info {
                IndexInfo::Expression(expr) => {
                    let index = self.index_const(expr, min)?;
                    self.result.max_bound = self.result.max_bound.max(index);
                    self.result
                        .map
                        .insert(ValueIndex::expression(index), (*value).clone());
                }
                IndexInfo::Range(range) => {
                    let key = self.range_key(IndexKind::Range, range, min)?;
                    self.result.max_bound = self.result.max_bound.max(ValueIndex::max(&key));
                    self.result.map.insert(key, (*value).clone());
                }
                IndexInfo::Slice(range) => {
                    let key = self.range_key(IndexKind::Slice, range, min)?;
                    self.result.max_bound = self.result.max_bound.max(ValueIndex::max(&key));
                    self.result.map.insert(key, (*value).clone());
                }
            }
        }

        match self.sem.span_bitwidth(span) {
            Some(width) => {
                if self.result.max_bound >= width {
                    return Err(SpanError::OutOfRange(self.result.max_bound as i64));
                }
                if self.result.max_bound + 1 < width {
                    let others = others.ok_or(SpanError::MissingOthers)?;
                    self.result.map.insert(
                        ValueIndex::new(IndexKind::Range, self.result.max_bound + 1, width - 1),
                        others.clone(),
                    );
                    self.result.max_bound = width - 1;
                }
                self.result.all_specified = true;
            }
            None => {
                if index_map.is_empty() {
                    return Err(SpanError::EmptyIndexMap);
                }
            }
        }
        Ok(())
    }

    /// Fills every uncovered index in `[0, max_bound]` with the `others`
    /// default, at single-index granularity; the merge pass coalesces the
    /// filler afterwards.
    fn fill_holes(&mut self, others: Option<&Value>) -> Result<(), SpanError> {
        for index in 0..=self.result.max_bound {
            if self.result.map.covering(index).is_some() {
                continue;
            }
            let others = others.ok_or(SpanError::MissingOthers)?;
            self.result
                .map
                .insert(ValueIndex::expression(index), others.clone());
        }
        Ok(())
    }

    /// Drops member and slice wrappers that cover their whole prefix: a
    /// `p[i]` whose prefix is one bit wide is just `p`, and a slice as wide
    /// as its prefix is the prefix.
    fn refine_prefixed_references(&mut self) {
        let keys: Vec<ValueIndex> = self.result.map.iter().map(|(k, _)| *k).collect();
        for key in keys {
            match key.kind() {
                IndexKind::Expression => {
                    let Some(Value::Member(member)) = self.result.map.get(&key) else {
                        continue;
                    };
                    let Some(prefix_ty) = self.sem.semantic_type(&member.prefix) else {
                        continue;
                    };
                    if self.sem.type_span_bitwidth(&prefix_ty) != Some(1) {
                        continue;
                    }
                    let Some(Value::Member(member)) = self.result.map.remove(&key) else {
                        continue;
                    };
                    self.result.map.insert(key, *member.prefix);
                }
                IndexKind::Slice => {
                    let Some(Value::Slice(slice)) = self.result.map.get(&key) else {
                        continue;
                    };
                    let Some(prefix_ty) = self.sem.semantic_type(&slice.prefix) else {
                        continue;
                    };
                    if self.sem.type_span_bitwidth(&prefix_ty) != Some(key.size()) {
                        continue;
                    }
                    let Some(Value::Slice(slice)) = self.result.map.remove(&key) else {
                        continue;
                    };
                    self.result.map.insert(key, *slice.prefix);
                }
                IndexKind::Range => {}
            }
        }
    }

    /// Detects a partition whose every slot equals the `others` default and
    /// collapses it to a single range entry.
    fn refine_all_others(&mut self, others: Option<&Value>) {
        let Some(others) = others else {
            return;
        };
        if self.result.map.is_empty() {
            return;
        }
        for (key, value) in self.result.map.iter() {
            if key.kind() == IndexKind::Slice {
                return;
            }
            if !ast::equals(others, value) {
                return;
            }
        }
        self.result.map.clear();
        self.result.map.insert(
            ValueIndex::new(IndexKind::Range, 0, self.result.max_bound),
            others.clone(),
        );
        self.result.all_others = true;
    }

    fn range_key(
        &self,
        kind: IndexKind,
        range: &Range,
        span_min: &Value,
    ) -> Result<ValueIndex, SpanError> {
        let a = self.index_const(range.min_bound(), span_min)?;
        let b = self.index_const(range.max_bound(), span_min)?;
        let (min, max) = if a <= b { (a, b) } else { (b, a) };
        Ok(ValueIndex::new(kind, min, max))
    }

    /// Reduces `expr - span_min` to a non-negative integer constant.
    fn index_const(&self, expr: &Value, span_min: &Value) -> Result<u64, SpanError> {
        let index = self.sem.assure_syntactic_type(expr.clone());
        let diff = Value::expr(index, Op::Minus, span_min.clone());
        let value = self
            .fold_to_int(diff)
            .ok_or(SpanError::NotConstant)?;
        if value < 0 {
            return Err(SpanError::OutOfRange(value));
        }
        Ok(value as u64)
    }

    /// The signed delta `b - a`, when both reduce to constants.
    pub(crate) fn compare_bounds(&self, a: &Value, b: &Value) -> Result<i64, SpanError> {
        let a = self.sem.assure_syntactic_type(a.clone());
        let b = self.sem.assure_syntactic_type(b.clone());
        let diff = Value::expr(b, Op::Minus, a);
        self.fold_to_int(diff).ok_or(SpanError::NotConstant)
    }

    fn fold_to_int(&self, value: Value) -> Option<i64> {
        let simplified = self.sem.simplify(value);
        if !simplified.is_const() {
            return None;
        }
        self.sem
            .transform_constant(&simplified, &self.int_type)?
            .as_int()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_intervals_normalize_to_expression() {
        let key = ValueIndex::new(IndexKind::Range, 3, 3);
        assert_eq!(key.kind(), IndexKind::Expression);
        assert_eq!(key.size(), 1);

        let key = ValueIndex::new(IndexKind::Slice, 2, 5);
        assert_eq!(key.kind(), IndexKind::Slice);
        assert_eq!(key.size(), 4);
    }

    #[test]
    fn keys_order_by_interval_start() {
        let mut keys = [
            ValueIndex::new(IndexKind::Range, 4, 6),
            ValueIndex::expression(0),
            ValueIndex::new(IndexKind::Slice, 1, 3),
        ];
        keys.sort();
        assert_eq!(ValueIndex::min(&keys[0]), 0);
        assert_eq!(ValueIndex::min(&keys[1]), 1);
        assert_eq!(ValueIndex::min(&keys[2]), 4);
    }

    #[test]
    fn insert_evicts_overlapping_entries() {
        let mut map = ValueMap::default();
        map.insert(ValueIndex::expression(1), Value::int(10));
        map.insert(ValueIndex::new(IndexKind::Range, 3, 5), Value::int(11));
        assert_eq!(map.len(), 2);

        // overlaps both existing entries
        map.insert(ValueIndex::new(IndexKind::Range, 0, 4), Value::int(12));
        assert_eq!(map.len(), 1);
        let (key, value) = map.iter().next().unwrap();
        assert_eq!((key.min(), key.max()), (0, 4));
        assert_eq!(value.as_int(), Some(12));
    }

    #[test]
    fn covering_finds_the_containing_interval() {
        let mut map = ValueMap::default();
        map.insert(ValueIndex::new(IndexKind::Range, 0, 1), Value::int(1));
        map.insert(ValueIndex::new(IndexKind::Range, 4, 6), Value::int(2));

        assert_eq!(map.covering(0).unwrap().0.max(), 1);
        assert_eq!(map.covering(1).unwrap().0.max(), 1);
        assert!(map.covering(2).is_none());
        assert!(map.covering(3).is_none());
        assert_eq!(map.covering(5).unwrap().1.as_int(), Some(2));
        assert!(map.covering(7).is_none());
    }

    #[test]
    fn cursor_walk_visits_keys_in_partition_order() {
        let mut map = ValueMap::default();
        map.insert(ValueIndex::expression(2), Value::int(1));
        map.insert(ValueIndex::new(IndexKind::Range, 0, 1), Value::int(2));
        map.insert(ValueIndex::new(IndexKind::Slice, 3, 5), Value::int(3));

        let mut cursor = map.first_key().unwrap();
        let mut mins = vec![ValueIndex::min(&cursor)];
        while let Some(next) = map.next_key_after(&cursor) {
            mins.push(ValueIndex::min(&next));
            cursor = next;
        }
        assert_eq!(mins, vec![0, 2, 3]);
    }
}
