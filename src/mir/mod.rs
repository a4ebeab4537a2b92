//! The mid-level IR: modules of functions made of basic blocks, whose
//! operations produce typed values.
//!
//! MIR is built through a [`Builder`], which checks the termination and type
//! invariants of every operation it inserts.

mod builder;
mod module;
mod types;

pub use builder::{BlockPos, Builder};
pub use module::{BinaryOp, Block, BlockId, Constant, Function, FunctionId, Module, Op, Value};
pub use types::{FunctionType, StructType, Type};

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum MirError {
    #[error("block `{block}` in function `{function}` has already returned, cannot add more instructions")]
    BlockTerminated { function: String, block: String },
    #[error("block `{block}` in function `{function}` has returned, this cannot be undone")]
    CannotUnreturn { function: String, block: String },
    #[error("a terminator must be the last instruction of block `{block}` in function `{function}`")]
    TerminatorNotAtEnd { function: String, block: String },
    #[error("value {value} cannot be returned by function `{function}` as it is of type {found}, not {expected}")]
    ReturnTypeMismatch {
        function: String,
        value: String,
        expected: Type,
        found: Type,
    },
    #[error("cannot allocate storage for type void")]
    VoidAllocation,
    #[error("the builder isn't positioned at any block")]
    Unpositioned,
    #[error("block {0:?} doesn't belong to this module")]
    UnknownBlock(BlockId),
    #[error("function {0:?} doesn't belong to this module")]
    UnknownFunction(FunctionId),
    #[error("value {value} of type {ty} is not a pointer")]
    NotAPointer { value: String, ty: Type },
    #[error("mismatched operand types for `{op}`: {left} and {right}")]
    OperandMismatch {
        op: &'static str,
        left: Type,
        right: Type,
    },
    #[error("constant {value} can't have type {ty}")]
    ConstantMismatch { value: Constant, ty: Type },
    #[error("block `{block}` in function `{function}` is not terminated")]
    UnterminatedBlock { function: String, block: String },
}
