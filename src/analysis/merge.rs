//! Defragmentation of the partition: fuses adjacent entries whose values
//! are either structurally equal or are contiguous member/slice accesses
//! on a common prefix.

use crate::analysis::{IndexKind, SpanAnalyzer, ValueIndex};
use crate::ast::{self, Range, Value};
use crate::semantics::LanguageSemantics;

impl<S: LanguageSemantics> SpanAnalyzer<'_, S> {
    /// Walks adjacent key pairs in partition order. A successful merge
    /// replaces both entries with one; the merged entry then becomes the
    /// previous side of the next comparison, so fusion cascades.
    pub(crate) fn merge_indexes(&mut self) {
        let Some(mut prev) = self.result.map.first_key() else {
            return;
        };
        while let Some(curr) = self.result.map.next_key_after(&prev) {
            prev = self.try_merge(prev, curr).unwrap_or(curr);
        }
    }

    fn try_merge(&mut self, prev: ValueIndex, curr: ValueIndex) -> Option<ValueIndex> {
        use IndexKind::*;
        match (prev.kind(), curr.kind()) {
            (Expression, Expression) => self
                .merge_equal_values(prev, curr)
                .or_else(|| self.merge_adjacent_members(prev, curr)),
            (Expression, Range) | (Range, Expression) | (Range, Range) => {
                self.merge_equal_values(prev, curr)
            }
            (Expression, Slice) => self.merge_member_into_slice(prev, curr),
            (Slice, Expression) => self.merge_slice_with_member(prev, curr),
            (Slice, Slice) => self.merge_adjacent_slices(prev, curr),
            // a slice carries positional sub-values, a repeated range does
            // not; the two can never fuse
            (Range, Slice) | (Slice, Range) => None,
        }
    }

    /// Equal values fuse into a single repeated range.
    fn merge_equal_values(&mut self, prev: ValueIndex, curr: ValueIndex) -> Option<ValueIndex> {
        let prev_val = self.result.map.get(&prev)?;
        let curr_val = self.result.map.get(&curr)?;
        if !ast::equals(prev_val, curr_val) {
            return None;
        }
        let merged = ValueIndex::new(IndexKind::Range, ValueIndex::min(&prev), ValueIndex::max(&curr));
        let value = self.result.map.remove(&curr)?;
        self.result.map.remove(&prev);
        self.result.map.insert(merged, value);
        Some(merged)
    }

    /// `p[i]` followed by `p[i+1]` becomes the slice `p[i .. i+1]`.
    fn merge_adjacent_members(&mut self, prev: ValueIndex, curr: ValueIndex) -> Option<ValueIndex> {
        let (Some(Value::Member(prev_mem)), Some(Value::Member(curr_mem))) =
            (self.result.map.get(&prev), self.result.map.get(&curr))
        else {
            return None;
        };
        if !ast::equals(&prev_mem.prefix, &curr_mem.prefix) {
            return None;
        }
        let delta = self.compare_bounds(&prev_mem.index, &curr_mem.index).ok()?;
        if delta != 1 {
            return None;
        }

        let merged = ValueIndex::new(IndexKind::Slice, ValueIndex::min(&prev), ValueIndex::max(&curr));
        let Some(Value::Member(prev_mem)) = self.result.map.remove(&prev) else {
            return None;
        };
        let Some(Value::Member(curr_mem)) = self.result.map.remove(&curr) else {
            return None;
        };
        let span = Range::with_bounds(self.ref_direction, *prev_mem.index, *curr_mem.index);
        self.result
            .map
            .insert(merged, Value::slice_of(*curr_mem.prefix, span));
        Some(merged)
    }

    /// `p[i]` followed by `p[i+1 .. j]` extends the slice down to `i`.
    fn merge_member_into_slice(&mut self, prev: ValueIndex, curr: ValueIndex) -> Option<ValueIndex> {
        let (Some(Value::Member(member)), Some(Value::Slice(slice))) =
            (self.result.map.get(&prev), self.result.map.get(&curr))
        else {
            return None;
        };
        if !ast::equals(&member.prefix, &slice.prefix) {
            return None;
        }
        let delta = self
            .compare_bounds(&member.index, slice.span.min_bound())
            .ok()?;
        if delta != 1 {
            return None;
        }

        let merged = ValueIndex::new(IndexKind::Slice, ValueIndex::min(&prev), ValueIndex::max(&curr));
        let Some(Value::Member(member)) = self.result.map.remove(&prev) else {
            return None;
        };
        let Some(Value::Slice(mut slice)) = self.result.map.remove(&curr) else {
            return None;
        };
        slice.span.set_min_bound(*member.index);
        self.result.map.insert(merged, Value::Slice(slice));
        Some(merged)
    }

    /// `p[i .. j]` followed by `p[j+1]` extends the slice up to `j+1`.
    fn merge_slice_with_member(&mut self, prev: ValueIndex, curr: ValueIndex) -> Option<ValueIndex> {
        let (Some(Value::Slice(slice)), Some(Value::Member(member))) =
            (self.result.map.get(&prev), self.result.map.get(&curr))
        else {
            return None;
        };
        if !ast::equals(&slice.prefix, &member.prefix) {
            return None;
        }
        let delta = self
            .compare_bounds(slice.span.max_bound(), &member.index)
            .ok()?;
        if delta != 1 {
            return None;
        }

        let merged = ValueIndex::new(IndexKind::Slice, ValueIndex::min(&prev), ValueIndex::max(&curr));
        let Some(Value::Slice(mut slice)) = self.result.map.remove(&prev) else {
            return None;
        };
        let Some(Value::Member(member)) = self.result.map.remove(&curr) else {
            return None;
        };
        slice.span.set_max_bound(*member.index);
        self.result.map.insert(merged, Value::Slice(slice));
        Some(merged)
    }

    /// Two contiguous slices of the same prefix stitch into one covering
    /// their union: the current slice keeps its maximum bound and takes
    /// over the previous slice's minimum bound.
    fn merge_adjacent_slices(&mut self, prev: ValueIndex, curr: ValueIndex) -> Option<ValueIndex> {
        let (Some(Value::Slice(prev_slice)), Some(Value::Slice(curr_slice))) =
            (self.result.map.get(&prev), self.result.map.get(&curr))
        else {
            return None;
        };
        if !ast::equals(&prev_slice.prefix, &curr_slice.prefix) {
            return None;
        }
        let delta = self
            .compare_bounds(prev_slice.span.max_bound(), curr_slice.span.min_bound())
            .ok()?;
        if delta != 1 {
            return None;
        }

        let merged = ValueIndex::new(IndexKind::Slice, ValueIndex::min(&prev), ValueIndex::max(&curr));
        let Some(Value::Slice(prev_slice)) = self.result.map.remove(&prev) else {
            return None;
        };
        let Some(Value::Slice(mut curr_slice)) = self.result.map.remove(&curr) else {
            return None;
        };
        let (prev_min, _) = prev_slice.span.into_min_max();
        curr_slice.span.set_min_bound(prev_min);
        self.result.map.insert(merged, Value::Slice(curr_slice));
        Some(merged)
    }
}
