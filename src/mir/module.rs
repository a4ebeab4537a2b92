use std::fmt;

use tracing::debug;

use crate::mir::{
    types::{write_list, FunctionType},
    MirError, Type,
};

/// The root of the MIR. Owns every function, which own their blocks, which
/// own their operations.
#[derive(Debug)]
pub struct Module {
    name: String,
    functions: Vec<Function>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunctionId(usize);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlockId {
    pub function: FunctionId,
    index: usize,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Module {
        Module {
            name: name.into(),
            functions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declares a function. It remains a declaration until a block is added.
    pub fn add_function(
        &mut self,
        name: impl Into<String>,
        return_type: Type,
        params: Vec<Type>,
    ) -> FunctionId {
        let id = FunctionId(self.functions.len());
        self.functions.push(Function {
            name: name.into(),
            ty: FunctionType {
                return_type: Box::new(return_type),
                params,
            },
            blocks: Vec::new(),
            next_name: 0,
        });
        id
    }

    /// Appends an empty, open block to the given function.
    pub fn add_block(
        &mut self,
        function: FunctionId,
        name: impl Into<String>,
    ) -> Result<BlockId, MirError> {
        let f = self
            .functions
            .get_mut(function.0)
            .ok_or(MirError::UnknownFunction(function))?;
        let index = f.blocks.len();
        f.blocks.push(Block {
            name: name.into(),
            function,
            ops: Vec::new(),
            has_returned: false,
        });
        Ok(BlockId { function, index })
    }

    pub fn function(&self, id: FunctionId) -> Option<&Function> {
        self.functions.get(id.0)
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.function(id.function)?.blocks.get(id.index)
    }

    /// Inserts `op` at `pos` in the block. Fails if the block has already
    /// returned.
    ///
    /// # Panics
    ///
    /// Panics if `pos` is past the end of the block.
    pub fn insert(&mut self, id: BlockId, pos: usize, op: Op) -> Result<(), MirError> {
        let (function, block) = self.locate_mut(id)?;
        if block.has_returned {
            return Err(MirError::BlockTerminated {
                function: function.to_owned(),
                block: block.name.clone(),
            });
        }
        block.ops.insert(pos, op);
        Ok(())
    }

    /// Sets the termination flag of the block. Once set, it can't be cleared.
    pub fn set_returned(&mut self, id: BlockId, returned: bool) -> Result<(), MirError> {
        let (function, block) = self.locate_mut(id)?;
        if block.has_returned && !returned {
            return Err(MirError::CannotUnreturn {
                function: function.to_owned(),
                block: block.name.clone(),
            });
        }
        if returned && !block.has_returned {
            debug!(function, block = %block.name, "block terminated");
        }
        block.has_returned = returned;
        Ok(())
    }

    /// Generates a fresh value name, unique within the function.
    pub(super) fn gen_name(&mut self, function: FunctionId) -> Result<String, MirError> {
        let f = self
            .functions
            .get_mut(function.0)
            .ok_or(MirError::UnknownFunction(function))?;
        let name = f.next_name.to_string();
        f.next_name += 1;
        Ok(name)
    }

    /// Checks that every block of every function is terminated. Modules must
    /// pass this before reaching a backend.
    pub fn verify(&self) -> Result<(), MirError> {
        for function in &self.functions {
            if let Some(block) = function.blocks.iter().find(|b| !b.has_returned) {
                return Err(MirError::UnterminatedBlock {
                    function: function.name.clone(),
                    block: block.name.clone(),
                });
            }
        }
        Ok(())
    }

    fn locate_mut(&mut self, id: BlockId) -> Result<(&str, &mut Block), MirError> {
        let function = self
            .functions
            .get_mut(id.function.0)
            .ok_or(MirError::UnknownBlock(id))?;
        let block = function
            .blocks
            .get_mut(id.index)
            .ok_or(MirError::UnknownBlock(id))?;
        Ok((&function.name, block))
    }
}

#[derive(Debug)]
pub struct Function {
    name: String,
    ty: FunctionType,
    blocks: Vec<Block>,
    next_name: u32,
}

impl Function {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn return_type(&self) -> &Type {
        &self.ty.return_type
    }

    pub fn param_types(&self) -> &[Type] {
        &self.ty.params
    }

    pub fn ty(&self) -> Type {
        Type::Function(self.ty.clone())
    }

    /// The value bound to the parameter at `index`.
    pub fn param(&self, index: usize) -> Option<Value> {
        let ty = self.ty.params.get(index)?;
        Some(Value::new(format!("arg{index}"), ty.clone()))
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Functions without blocks are external declarations.
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[derive(Debug)]
pub struct Block {
    name: String,
    function: FunctionId,
    ops: Vec<Op>,
    has_returned: bool,
}

impl Block {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The function this block belongs to.
    pub fn function(&self) -> FunctionId {
        self.function
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn has_returned(&self) -> bool {
        self.has_returned
    }
}

/// A named, typed result of an operation (or a function parameter).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Value {
    pub name: String,
    pub ty: Type,
}

impl Value {
    pub fn new(name: impl Into<String>, ty: Type) -> Value {
        Value {
            name: name.into(),
            ty,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.name)
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Constant {
    Bool(bool),
    Int(i64),
    Float(f64),
    /// The null pointer.
    Null,
}

impl Constant {
    /// Whether a constant of this kind can have type `ty`.
    pub fn fits(self, ty: &Type) -> bool {
        match self {
            Constant::Bool(_) => matches!(ty, Type::Bool),
            Constant::Int(_) => ty.is_int(),
            Constant::Float(_) => ty.is_float(),
            Constant::Null => ty.pointee().is_some(),
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Bool(v) => write!(f, "{v}"),
            Constant::Int(v) => write!(f, "{v}"),
            Constant::Float(v) => write!(f, "{v:?}"),
            Constant::Null => f.write_str("null"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Xor,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        use BinaryOp::{Eq, Ge, Gt, Le, Lt, Ne};
        matches!(self, Eq | Ne | Lt | Le | Gt | Ge)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Rem => "rem",
            BinaryOp::Pow => "pow",
            BinaryOp::Eq => "eq",
            BinaryOp::Ne => "ne",
            BinaryOp::Lt => "lt",
            BinaryOp::Le => "le",
            BinaryOp::Gt => "gt",
            BinaryOp::Ge => "ge",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    RetVoid,
    Ret(Value),
    /// Allocates storage for `ty`; `result` is a pointer to it.
    Alloca {
        result: Value,
        ty: Type,
    },
    Const {
        result: Value,
        value: Constant,
    },
    Load {
        result: Value,
        ptr: Value,
    },
    Store {
        value: Value,
        ptr: Value,
    },
    Binary {
        result: Value,
        op: BinaryOp,
        left: Value,
        right: Value,
    },
}

impl Op {
    /// Whether this operation ends its block.
    pub fn is_terminator(&self) -> bool {
        matches!(self, Op::RetVoid | Op::Ret(_))
    }

    pub fn result(&self) -> Option<&Value> {
        match self {
            Op::Alloca { result, .. }
            | Op::Const { result, .. }
            | Op::Load { result, .. }
            | Op::Binary { result, .. } => Some(result),
            Op::RetVoid | Op::Ret(_) | Op::Store { .. } => None,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::RetVoid => f.write_str("ret void"),
            Op::Ret(value) => write!(f, "ret {} {value}", value.ty),
            Op::Alloca { result, ty } => write!(f, "{result} = alloca {ty}"),
            Op::Const { result, value } => write!(f, "{result} = const {} {value}", result.ty),
            Op::Load { result, ptr } => {
                write!(f, "{result} = load {}, {} {ptr}", result.ty, ptr.ty)
            }
            Op::Store { value, ptr } => {
                write!(f, "store {} {value}, {} {ptr}", value.ty, ptr.ty)
            }
            Op::Binary {
                result,
                op,
                left,
                right,
            } => write!(f, "{result} = {} {} {left}, {right}", op.as_str(), left.ty),
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module {}", self.name)?;
        for function in &self.functions {
            write!(f, "\n\n{function}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_declaration() {
            write!(f, "declare fn {}(", self.name)?;
            write_list(f, &self.ty.params)?;
            return write!(f, ") -> {}", self.ty.return_type);
        }

        write!(f, "fn {}(", self.name)?;
        let params: Vec<_> = (0..self.ty.params.len())
            .filter_map(|index| self.param(index))
            .map(|param| format!("{param}: {}", param.ty))
            .collect();
        write_list(f, &params)?;
        writeln!(f, ") -> {} {{", self.ty.return_type)?;
        for block in &self.blocks {
            writeln!(f, "{}:", block.name)?;
            for op in &block.ops {
                writeln!(f, "  {op}")?;
            }
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_insert_into_terminated_block_fails() {
        let mut module = Module::new("m");
        let main = module.add_function("main", Type::Void, vec![]);
        let entry = module.add_block(main, "entry").unwrap();

        module.insert(entry, 0, Op::RetVoid).unwrap();
        module.set_returned(entry, true).unwrap();
        // Terminating twice is harmless.
        module.set_returned(entry, true).unwrap();

        assert_eq!(
            module.insert(entry, 1, Op::RetVoid),
            Err(MirError::BlockTerminated {
                function: "main".to_owned(),
                block: "entry".to_owned(),
            })
        );
        assert_eq!(
            module.set_returned(entry, false),
            Err(MirError::CannotUnreturn {
                function: "main".to_owned(),
                block: "entry".to_owned(),
            })
        );
        assert!(module.block(entry).unwrap().has_returned());
        assert_eq!(module.block(entry).unwrap().len(), 1);
    }

    #[test]
    fn test_verify_rejects_open_blocks() {
        let mut module = Module::new("m");
        module.add_function("puts", Type::Int32, vec![Type::pointer(Type::Int8)]);
        let main = module.add_function("main", Type::Void, vec![]);
        let entry = module.add_block(main, "entry").unwrap();
        let exit = module.add_block(main, "exit").unwrap();

        module.set_returned(entry, true).unwrap();
        let error = module.verify().unwrap_err();
        assert_eq!(
            error.to_string(),
            "block `exit` in function `main` is not terminated"
        );

        module.set_returned(exit, true).unwrap();
        assert_eq!(module.verify(), Ok(()));
    }

    #[test]
    fn test_unknown_block() {
        let mut other = Module::new("other");
        let f = other.add_function("f", Type::Void, vec![]);
        let block = other.add_block(f, "entry").unwrap();

        let mut module = Module::new("m");
        assert_eq!(module.block(block).map(Block::name), None);
        assert_eq!(
            module.insert(block, 0, Op::RetVoid),
            Err(MirError::UnknownBlock(block))
        );
    }

    #[test]
    fn test_add_block_to_unknown_function() {
        let mut other = Module::new("other");
        other.add_function("f", Type::Void, vec![]);
        let g = other.add_function("g", Type::Void, vec![]);

        let mut module = Module::new("m");
        let f = module.add_function("f", Type::Void, vec![]);
        assert_eq!(
            module.add_block(g, "entry"),
            Err(MirError::UnknownFunction(g))
        );
        assert!(module.function(f).unwrap().blocks().is_empty());
        assert_eq!(module.functions().len(), 1);
    }

    #[test]
    fn test_function_params() {
        let mut module = Module::new("m");
        let id = module.add_function("f", Type::Bool, vec![Type::Int32, Type::Float64]);
        let f = module.function(id).unwrap();
        assert_eq!(f.param(1), Some(Value::new("arg1", Type::Float64)));
        assert_eq!(f.param(2), None);
        assert_eq!(f.ty(), Type::function(Type::Bool, vec![Type::Int32, Type::Float64]));
        assert!(f.is_declaration());
    }

    #[test]
    fn test_display() {
        let mut module = Module::new("demo");
        module.add_function("puts", Type::Int32, vec![Type::pointer(Type::Int8)]);
        let id = module.add_function("id", Type::Int32, vec![Type::Int32]);
        let entry = module.add_block(id, "entry").unwrap();
        let slot = Value::new("0", Type::pointer(Type::Int32));
        let arg = module.function(id).unwrap().param(0).unwrap();
        let loaded = Value::new("1", Type::Int32);
        let ops = [
            Op::Alloca {
                result: slot.clone(),
                ty: Type::Int32,
            },
            Op::Store {
                value: arg,
                ptr: slot.clone(),
            },
            Op::Load {
                result: loaded.clone(),
                ptr: slot,
            },
            Op::Ret(loaded),
        ];
        for (pos, op) in ops.into_iter().enumerate() {
            module.insert(entry, pos, op).unwrap();
        }

        let expected = indoc! {"
            module demo

            declare fn puts(i8*) -> i32

            fn id(%arg0: i32) -> i32 {
            entry:
              %0 = alloca i32
              store i32 %arg0, i32* %0
              %1 = load i32, i32* %0
              ret i32 %1
            }"};
        assert_eq!(module.to_string(), expected);
    }
}
