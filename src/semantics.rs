mod standard;

pub use standard::StandardSemantics;

use crate::ast::{Range, Value};
use crate::ty::Type;

/// The read-only language-semantics capabilities consumed by the analysis
/// passes. Implementations are expected to be cheap to call and free of
/// interior mutability; language-specific semantics plug in here.
pub trait LanguageSemantics {
    /// The declared span of a typed object, if any.
    fn type_span<'a>(&self, ty: &'a Type) -> Option<&'a Range>;

    /// The bit width of a span when it is statically known.
    fn span_bitwidth(&self, span: &Range) -> Option<u64>;

    /// The bit width of a type's span when it is statically known.
    fn type_span_bitwidth(&self, ty: &Type) -> Option<u64> {
        self.type_span(ty).and_then(|span| self.span_bitwidth(span))
    }

    /// Types an expression, shallowly.
    fn semantic_type(&self, value: &Value) -> Option<Type>;

    /// Decorates a raw constant with a syntactic type so it can be safely
    /// composed into larger expressions. Non-constants pass through.
    fn assure_syntactic_type(&self, value: Value) -> Value;

    /// Symbolic simplification; may reduce the tree to a constant.
    fn simplify(&self, value: Value) -> Value;

    /// Coerces a constant to the target type, or `None` when the coercion
    /// is not defined.
    fn transform_constant(&self, value: &Value, target: &Type) -> Option<Value>;
}
