use tracing::debug;

use crate::analysis::{analyze_spans, IndexKind, IndexMap, ValueIndex};
use crate::ast::{Aggregate, Direction, Op, Value};
use crate::semantics::LanguageSemantics;
use crate::ty::Type;

/// Re-synthesizes a set of partial index assignments as one concatenation
/// expression covering the span of `span_type`, in span direction.
///
/// Indexes not present in `index_map` take the `others` default. Returns
/// `None` when the analysis fails or when padding would be needed but no
/// `others` value is available.
pub fn create_concat_from_spans<S: LanguageSemantics>(
    span_type: &Type,
    index_map: &IndexMap<'_>,
    sem: &S,
    others: Option<&Value>,
) -> Option<Value> {
    let result = match analyze_spans(span_type, index_map, sem, others) {
        Ok(result) => result,
        Err(error) => {
            debug!(%error, "span analysis failed, no concat produced");
            return None;
        }
    };
    if !result.all_specified() && others.is_none() {
        return None;
    }

    let span = sem.type_span(span_type)?;
    let direction = span.direction;
    let span_min = span.min_bound().clone();
    let span_max = span.max_bound().clone();
    let all_specified = result.all_specified();
    let max_bound = result.max_bound();

    let mut acc: Option<Value> = None;
    for (key, value) in result.into_map() {
        match key.kind() {
            IndexKind::Expression | IndexKind::Slice => {
                acc = Some(concat_onto(acc, value, direction));
            }
            IndexKind::Range => {
                for _ in ValueIndex::min(&key)..=ValueIndex::max(&key) {
                    acc = Some(concat_onto(acc, value.clone(), direction));
                }
            }
        }
    }

    if all_specified {
        return acc;
    }

    // Pad the uncovered tail with an aggregate of the default, cast to the
    // span type narrowed to the remaining width (symbolic: the span may
    // have no static size here).
    let others = others?;
    let remaining = Value::expr(
        Value::expr(span_max, Op::Minus, span_min),
        Op::Minus,
        Value::int(max_bound as i64 + 1),
    );
    let pad_span = crate::ast::Range::with_bounds(direction, Value::int(0), remaining);
    let pad_type = span_type.with_span(pad_span);
    let pad = Value::cast(
        pad_type,
        Value::Aggregate(Aggregate {
            alternatives: Vec::new(),
            others: Some(Box::new(others.clone())),
        }),
    );
    Some(concat_onto(acc, pad, direction))
}

fn concat_onto(acc: Option<Value>, value: Value, direction: Direction) -> Value {
    match (acc, direction) {
        (None, _) => value,
        (Some(acc), Direction::Upto) => Value::expr(acc, Op::Concat, value),
        (Some(acc), Direction::Downto) => Value::expr(value, Op::Concat, acc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_direction_places_new_terms() {
        // upto keeps the accumulator on the left, downto on the right
        let up = concat_onto(Some(Value::int(0)), Value::int(1), Direction::Upto);
        let Value::Expression(e) = up else {
            panic!("expected an expression");
        };
        assert_eq!(e.left.as_int(), Some(0));
        assert_eq!(e.right.as_int(), Some(1));

        let down = concat_onto(Some(Value::int(0)), Value::int(1), Direction::Downto);
        let Value::Expression(e) = down else {
            panic!("expected an expression");
        };
        assert_eq!(e.left.as_int(), Some(1));
        assert_eq!(e.right.as_int(), Some(0));
    }
}
