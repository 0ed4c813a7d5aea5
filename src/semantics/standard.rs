use crate::ast::{IntValue, Op, Range, Value};
use crate::semantics::LanguageSemantics;
use crate::ty::Type;

/// Language-neutral reference semantics: integer constant folding, span
/// widths from constant bounds, shallow typing of declared objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardSemantics;

impl StandardSemantics {
    pub fn new() -> Self {
        Self
    }

    fn const_bound(&self, bound: &Value) -> Option<i64> {
        self.simplify(bound.clone()).as_int()
    }
}

impl LanguageSemantics for StandardSemantics {
    fn type_span<'a>(&self, ty: &'a Type) -> Option<&'a Range> {
        ty.span()
    }

    fn span_bitwidth(&self, span: &Range) -> Option<u64> {
        let min = self.const_bound(span.min_bound())?;
        let max = self.const_bound(span.max_bound())?;
        if max < min {
            // null range
            return None;
        }
        Some(max.abs_diff(min) + 1)
    }

    fn semantic_type(&self, value: &Value) -> Option<Type> {
        match value {
            Value::Int(v) => Some(v.ty.as_deref().cloned().unwrap_or_else(Type::int)),
            Value::Bool(v) => Some(v.ty.as_deref().cloned().unwrap_or(Type::Bool)),
            Value::Identifier(id) => Some(id.ty.clone()),
            Value::Member(m) => self.semantic_type(&m.prefix)?.element(),
            Value::Slice(s) => {
                let prefix_ty = self.semantic_type(&s.prefix)?;
                Some(prefix_ty.with_span(s.span.clone()))
            }
            Value::Cast(c) => Some(c.ty.clone()),
            _ => None,
        }
    }

    fn assure_syntactic_type(&self, value: Value) -> Value {
        match value {
            Value::Int(mut v) => {
                if v.ty.is_none() {
                    v.ty = Some(Box::new(Type::int()));
                }
                Value::Int(v)
            }
            Value::Bool(mut v) => {
                if v.ty.is_none() {
                    v.ty = Some(Box::new(Type::Bool));
                }
                Value::Bool(v)
            }
            other => other,
        }
    }

    fn simplify(&self, value: Value) -> Value {
        match value {
            Value::Expression(e) => {
                let left = self.simplify(*e.left);
                let right = self.simplify(*e.right);
                if let (Some(a), Some(b)) = (left.as_int(), right.as_int()) {
                    let folded = match e.op {
                        Op::Plus => a.checked_add(b),
                        Op::Minus => a.checked_sub(b),
                        Op::Times => a.checked_mul(b),
                        Op::Concat => None,
                    };
                    if let Some(v) = folded {
                        return Value::int(v);
                    }
                }
                Value::expr(left, e.op, right)
            }
            Value::Cast(c) => {
                let inner = self.simplify(*c.value);
                if inner.is_const() {
                    if let Some(folded) = self.transform_constant(&inner, &c.ty) {
                        return folded;
                    }
                }
                Value::cast(c.ty, inner)
            }
            other => other,
        }
    }

    fn transform_constant(&self, value: &Value, target: &Type) -> Option<Value> {
        match (value, target) {
            (Value::Int(v), Type::Int { .. }) => Some(Value::Int(IntValue {
                value: v.value,
                ty: Some(Box::new(target.clone())),
            })),
            (Value::Bool(v), Type::Int { .. }) => Some(Value::Int(IntValue {
                value: i64::from(v.value),
                ty: Some(Box::new(target.clone())),
            })),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Direction;

    #[test]
    fn folds_integer_arithmetic() {
        let sem = StandardSemantics::new();
        let e = Value::expr(
            Value::expr(Value::int(3), Op::Plus, Value::int(4)),
            Op::Times,
            Value::int(2),
        );
        assert_eq!(sem.simplify(e).as_int(), Some(14));
    }

    #[test]
    fn leaves_symbolic_expressions_alone() {
        let sem = StandardSemantics::new();
        let n = Value::identifier("n", Type::int());
        let e = Value::expr(n, Op::Minus, Value::int(1));
        assert!(sem.simplify(e).as_int().is_none());
    }

    #[test]
    fn span_widths_from_constant_bounds() {
        let sem = StandardSemantics::new();
        assert_eq!(sem.span_bitwidth(&Range::downto(3, 0)), Some(4));
        assert_eq!(sem.span_bitwidth(&Range::upto(0, 3)), Some(4));
        assert_eq!(sem.span_bitwidth(&Range::upto(2, 2)), Some(1));

        let symbolic = Range::new(
            Value::identifier("n", Type::int()),
            Value::int(0),
            Direction::Downto,
        );
        assert_eq!(sem.span_bitwidth(&symbolic), None);
    }

    #[test]
    fn types_members_and_slices_through_the_prefix() {
        let sem = StandardSemantics::new();
        let p = Value::identifier("p", Type::bitvector(Range::downto(7, 0)));

        let member = Value::member(p.clone(), Value::int(0));
        assert!(matches!(sem.semantic_type(&member), Some(Type::Bit)));

        let slice = Value::slice_of(p, Range::downto(3, 0));
        let sliced_ty = sem.semantic_type(&slice).unwrap();
        assert_eq!(sem.type_span_bitwidth(&sliced_ty), Some(4));
    }

    #[test]
    fn coerces_constants_to_integer() {
        let sem = StandardSemantics::new();
        let b = Value::boolean(true);
        let coerced = sem.transform_constant(&b, &Type::int()).unwrap();
        assert_eq!(coerced.as_int(), Some(1));
        assert!(sem.transform_constant(&b, &Type::Bit).is_none());
    }
}
