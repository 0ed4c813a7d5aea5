use serde::Serialize;

use crate::ty::Type;

/// Direction of a span: `Upto` counts indexes ascending, `Downto` descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Upto,
    Downto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Op {
    Plus,
    Minus,
    Times,
    Concat,
}

/// An owned HDL value expression.
///
/// Children are boxed and exclusively owned; cloning is always explicit.
/// Structural comparison goes through [`equals`], which by default ignores
/// the syntactic type annotation of constants.
#[derive(Debug, Clone, Serialize)]
pub enum Value {
    Int(IntValue),
    Bool(BoolValue),
    Identifier(Identifier),
    Member(Member),
    Slice(Slice),
    Expression(Expression),
    Cast(Cast),
    Aggregate(Aggregate),
}

impl Value {
    pub fn int(value: i64) -> Self {
        Value::Int(IntValue { value, ty: None })
    }

    pub fn boolean(value: bool) -> Self {
        Value::Bool(BoolValue { value, ty: None })
    }

    pub fn identifier(name: impl Into<String>, ty: Type) -> Self {
        Value::Identifier(Identifier {
            name: name.into(),
            ty,
        })
    }

    pub fn member(prefix: Value, index: Value) -> Self {
        Value::Member(Member {
            prefix: Box::new(prefix),
            index: Box::new(index),
        })
    }

    pub fn slice_of(prefix: Value, span: Range) -> Self {
        Value::Slice(Slice {
            prefix: Box::new(prefix),
            span,
        })
    }

    pub fn expr(left: Value, op: Op, right: Value) -> Self {
        Value::Expression(Expression {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn cast(ty: Type, value: Value) -> Self {
        Value::Cast(Cast {
            ty,
            value: Box::new(value),
        })
    }

    /// The integer payload, if this is an integer constant.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(v.value),
            _ => None,
        }
    }

    pub fn is_const(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Bool(_))
    }
}

/// An integer literal, optionally decorated with a syntactic type.
#[derive(Debug, Clone, Serialize)]
pub struct IntValue {
    pub value: i64,
    pub ty: Option<Box<Type>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoolValue {
    pub value: bool,
    pub ty: Option<Box<Type>>,
}

/// A reference to a declared object. The declared type is carried inline so
/// that semantic typing needs no symbol table.
#[derive(Debug, Clone, Serialize)]
pub struct Identifier {
    pub name: String,
    pub ty: Type,
}

/// A single-index access `prefix[index]`.
#[derive(Debug, Clone, Serialize)]
pub struct Member {
    pub prefix: Box<Value>,
    pub index: Box<Value>,
}

/// A contiguous sub-span access `prefix[span]`.
#[derive(Debug, Clone, Serialize)]
pub struct Slice {
    pub prefix: Box<Value>,
    pub span: Range,
}

/// A binary expression.
#[derive(Debug, Clone, Serialize)]
pub struct Expression {
    pub op: Op,
    pub left: Box<Value>,
    pub right: Box<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Cast {
    pub ty: Type,
    pub value: Box<Value>,
}

/// An aggregate literal: explicit index alternatives plus an optional
/// `others` default covering every index not named.
#[derive(Debug, Clone, Serialize)]
pub struct Aggregate {
    pub alternatives: Vec<AggregateAlt>,
    pub others: Option<Box<Value>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregateAlt {
    pub indexes: Vec<Value>,
    pub value: Value,
}

/// A symbolic interval with an explicit direction.
///
/// `left` and `right` are the bounds as written; the semantic minimum and
/// maximum depend on [`Direction`]: for `Upto` min is `left`, for `Downto`
/// min is `right`.
#[derive(Debug, Clone, Serialize)]
pub struct Range {
    pub left: Box<Value>,
    pub right: Box<Value>,
    pub direction: Direction,
}

impl Range {
    pub fn new(left: Value, right: Value, direction: Direction) -> Self {
        Self {
            left: Box::new(left),
            right: Box::new(right),
            direction,
        }
    }

    pub fn upto(left: i64, right: i64) -> Self {
        Self::new(Value::int(left), Value::int(right), Direction::Upto)
    }

    pub fn downto(left: i64, right: i64) -> Self {
        Self::new(Value::int(left), Value::int(right), Direction::Downto)
    }

    /// Builds a range placing `min` and `max` into the direction-correct
    /// bound slots.
    pub fn with_bounds(direction: Direction, min: Value, max: Value) -> Self {
        match direction {
            Direction::Upto => Self::new(min, max, direction),
            Direction::Downto => Self::new(max, min, direction),
        }
    }

    pub fn min_bound(&self) -> &Value {
        match self.direction {
            Direction::Upto => &self.left,
            Direction::Downto => &self.right,
        }
    }

    pub fn max_bound(&self) -> &Value {
        match self.direction {
            Direction::Upto => &self.right,
            Direction::Downto => &self.left,
        }
    }

    /// Replaces the semantic minimum bound, returning the previous one.
    pub fn set_min_bound(&mut self, value: Value) -> Value {
        let slot = match self.direction {
            Direction::Upto => &mut self.left,
            Direction::Downto => &mut self.right,
        };
        std::mem::replace(slot, value)
    }

    /// Replaces the semantic maximum bound, returning the previous one.
    pub fn set_max_bound(&mut self, value: Value) -> Value {
        let slot = match self.direction {
            Direction::Upto => &mut self.right,
            Direction::Downto => &mut self.left,
        };
        std::mem::replace(slot, value)
    }

    /// Consumes the range, yielding `(min, max)` in semantic order.
    pub fn into_min_max(self) -> (Value, Value) {
        match self.direction {
            Direction::Upto => (*self.left, *self.right),
            Direction::Downto => (*self.right, *self.left),
        }
    }
}

/// Options for structural equality.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct EqualsOptions {
    /// Also compare the syntactic type annotation of constants. Off by
    /// default: a bare `3` and a `3` decorated by type inference are the
    /// same literal.
    pub check_constant_type: bool,
}

/// Structural equality under the default policy.
pub fn equals(a: &Value, b: &Value) -> bool {
    equals_with(a, b, &EqualsOptions::default())
}

pub fn equals_with(a: &Value, b: &Value, opts: &EqualsOptions) -> bool {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => {
            x.value == y.value
                && (!opts.check_constant_type || opt_type_equals(x.ty.as_deref(), y.ty.as_deref(), opts))
        }
        (Value::Bool(x), Value::Bool(y)) => {
            x.value == y.value
                && (!opts.check_constant_type || opt_type_equals(x.ty.as_deref(), y.ty.as_deref(), opts))
        }
        (Value::Identifier(x), Value::Identifier(y)) => {
            x.name == y.name && type_equals(&x.ty, &y.ty, opts)
        }
        (Value::Member(x), Value::Member(y)) => {
            equals_with(&x.prefix, &y.prefix, opts) && equals_with(&x.index, &y.index, opts)
        }
        (Value::Slice(x), Value::Slice(y)) => {
            equals_with(&x.prefix, &y.prefix, opts) && range_equals(&x.span, &y.span, opts)
        }
        (Value::Expression(x), Value::Expression(y)) => {
            x.op == y.op
                && equals_with(&x.left, &y.left, opts)
                && equals_with(&x.right, &y.right, opts)
        }
        (Value::Cast(x), Value::Cast(y)) => {
            type_equals(&x.ty, &y.ty, opts) && equals_with(&x.value, &y.value, opts)
        }
        (Value::Aggregate(x), Value::Aggregate(y)) => {
            x.alternatives.len() == y.alternatives.len()
                && x.alternatives.iter().zip(&y.alternatives).all(|(xa, ya)| {
                    xa.indexes.len() == ya.indexes.len()
                        && xa.indexes.iter().zip(&ya.indexes).all(|(xi, yi)| equals_with(xi, yi, opts))
                        && equals_with(&xa.value, &ya.value, opts)
                })
                && match (&x.others, &y.others) {
                    (Some(xo), Some(yo)) => equals_with(xo, yo, opts),
                    (None, None) => true,
                    _ => false,
                }
        }
        _ => false,
    }
}

pub fn range_equals(a: &Range, b: &Range, opts: &EqualsOptions) -> bool {
    a.direction == b.direction
        && equals_with(&a.left, &b.left, opts)
        && equals_with(&a.right, &b.right, opts)
}

pub fn type_equals(a: &Type, b: &Type, opts: &EqualsOptions) -> bool {
    match (a, b) {
        (Type::Bit, Type::Bit) | (Type::Bool, Type::Bool) => true,
        (
            Type::Int {
                span: sa,
                signed: ga,
            },
            Type::Int {
                span: sb,
                signed: gb,
            },
        ) => ga == gb && opt_range_equals(sa.as_ref(), sb.as_ref(), opts),
        (Type::Bitvector { span: sa, logic: la }, Type::Bitvector { span: sb, logic: lb }) => {
            la == lb && range_equals(sa, sb, opts)
        }
        (
            Type::Array {
                span: sa,
                element: ea,
            },
            Type::Array {
                span: sb,
                element: eb,
            },
        ) => range_equals(sa, sb, opts) && type_equals(ea, eb, opts),
        _ => false,
    }
}

fn opt_type_equals(a: Option<&Type>, b: Option<&Type>, opts: &EqualsOptions) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => type_equals(a, b, opts),
        (None, None) => true,
        _ => false,
    }
}

fn opt_range_equals(a: Option<&Range>, b: Option<&Range>, opts: &EqualsOptions) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => range_equals(a, b, opts),
        (None, None) => true,
        _ => false,
    }
}
