#![forbid(unsafe_code)]
pub mod analysis;
pub mod ast;
pub mod manipulation;
pub mod semantics;
pub mod ty;


pub use analysis::{
    analyze_spans, AnalyzeSpansResult, IndexInfo, IndexKind, IndexMap, SpanError, ValueIndex,
    ValueMap,
};
pub use manipulation::create_concat_from_spans;
