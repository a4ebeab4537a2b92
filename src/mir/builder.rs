use tracing::trace;

use crate::mir::{BinaryOp, BlockId, Constant, MirError, Module, Op, Type, Value};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BlockPos {
    Start,
    End,
}

/// Inserts operations into the blocks of a module.
///
/// The builder holds an insertion cursor: a block and an offset into its
/// operation list. Each inserted operation lands at the cursor, which then
/// moves past it.
pub struct Builder<'m> {
    module: &'m mut Module,
    cursor: Option<Cursor>,
}

#[derive(Copy, Clone, Debug)]
struct Cursor {
    block: BlockId,
    pos: usize,
}

impl<'m> Builder<'m> {
    /// Creates an unpositioned builder. Inserting before calling
    /// [`Builder::position_at`] fails.
    pub fn new(module: &'m mut Module) -> Builder<'m> {
        Builder {
            module,
            cursor: None,
        }
    }

    pub fn at(
        module: &'m mut Module,
        block: BlockId,
        pos: BlockPos,
    ) -> Result<Builder<'m>, MirError> {
        let mut builder = Builder::new(module);
        builder.position_at(block, pos)?;
        Ok(builder)
    }

    pub fn module(&self) -> &Module {
        self.module
    }

    /// The block the cursor is in.
    pub fn block(&self) -> Option<BlockId> {
        self.cursor.map(|c| c.block)
    }

    /// The offset of the cursor in its block.
    pub fn position(&self) -> Option<usize> {
        self.cursor.map(|c| c.pos)
    }

    pub fn position_at(&mut self, block: BlockId, pos: BlockPos) -> Result<(), MirError> {
        let len = self
            .module
            .block(block)
            .ok_or(MirError::UnknownBlock(block))?
            .len();
        let pos = match pos {
            BlockPos::Start => 0,
            BlockPos::End => len,
        };
        self.cursor = Some(Cursor { block, pos });
        Ok(())
    }

    /// Inserts `op` at the cursor and advances it. A terminator also marks the
    /// block as returned.
    ///
    /// Fails on a void `alloca`, on a `ret` whose value isn't of the
    /// function's return type, and on a terminator which wouldn't end the
    /// block.
    pub fn add_instruction(&mut self, op: Op) -> Result<(), MirError> {
        let Cursor { block, pos } = self.cursor.ok_or(MirError::Unpositioned)?;
        self.check(&op, block, pos)?;
        trace!(?block, pos, %op, "adding instruction");

        let terminates = op.is_terminator();
        self.module.insert(block, pos, op)?;
        self.cursor = Some(Cursor { block, pos: pos + 1 });
        if terminates {
            self.module.set_returned(block, true)?;
        }
        Ok(())
    }

    /// Generates a fresh name for a value of the current function.
    pub fn gen_name(&mut self) -> Result<String, MirError> {
        let cursor = self.cursor.ok_or(MirError::Unpositioned)?;
        self.module.gen_name(cursor.block.function)
    }

    /// Terminates the current block. A returned value must be of the
    /// function's return type.
    pub fn build_return(&mut self, value: Option<&Value>) -> Result<(), MirError> {
        match value {
            Some(value) => self.add_instruction(Op::Ret(value.clone())),
            None => self.add_instruction(Op::RetVoid),
        }
    }

    /// Allocates storage for a value of type `ty`, returning a pointer to it.
    pub fn build_alloca(&mut self, ty: Type) -> Result<Value, MirError> {
        if ty.is_void() {
            return Err(MirError::VoidAllocation);
        }
        let result = Value::new(self.gen_name()?, Type::pointer(ty.clone()));
        self.add_instruction(Op::Alloca {
            result: result.clone(),
            ty,
        })?;
        Ok(result)
    }

    pub fn build_const(&mut self, ty: Type, value: Constant) -> Result<Value, MirError> {
        if !value.fits(&ty) {
            return Err(MirError::ConstantMismatch { value, ty });
        }
        let result = Value::new(self.gen_name()?, ty);
        self.add_instruction(Op::Const {
            result: result.clone(),
            value,
        })?;
        Ok(result)
    }

    pub fn build_load(&mut self, ptr: &Value) -> Result<Value, MirError> {
        let ty = pointee(ptr)?.clone();
        let result = Value::new(self.gen_name()?, ty);
        self.add_instruction(Op::Load {
            result: result.clone(),
            ptr: ptr.clone(),
        })?;
        Ok(result)
    }

    /// Stores `value` at `ptr`, which must point to the value's type.
    pub fn build_store(&mut self, value: &Value, ptr: &Value) -> Result<(), MirError> {
        let target = pointee(ptr)?;
        if value.ty != *target {
            return Err(MirError::OperandMismatch {
                op: "store",
                left: value.ty.clone(),
                right: target.clone(),
            });
        }
        self.add_instruction(Op::Store {
            value: value.clone(),
            ptr: ptr.clone(),
        })
    }

    /// Both operands must be of the same type. Comparisons yield a `bool`,
    /// other operations a value of the operands' type.
    pub fn build_binary(
        &mut self,
        op: BinaryOp,
        left: &Value,
        right: &Value,
    ) -> Result<Value, MirError> {
        if left.ty != right.ty {
            return Err(MirError::OperandMismatch {
                op: op.as_str(),
                left: left.ty.clone(),
                right: right.ty.clone(),
            });
        }
        let ty = if op.is_comparison() {
            Type::Bool
        } else {
            left.ty.clone()
        };
        let result = Value::new(self.gen_name()?, ty);
        self.add_instruction(Op::Binary {
            result: result.clone(),
            op,
            left: left.clone(),
            right: right.clone(),
        })?;
        Ok(result)
    }

    fn check(&self, op: &Op, id: BlockId, pos: usize) -> Result<(), MirError> {
        let function = self
            .module
            .function(id.function)
            .ok_or(MirError::UnknownFunction(id.function))?;
        let block = self.module.block(id).ok_or(MirError::UnknownBlock(id))?;

        match op {
            Op::Alloca { ty, .. } if ty.is_void() => return Err(MirError::VoidAllocation),
            Op::Ret(value) if value.ty != *function.return_type() => {
                return Err(MirError::ReturnTypeMismatch {
                    function: function.name().to_owned(),
                    value: value.to_string(),
                    expected: function.return_type().clone(),
                    found: value.ty.clone(),
                });
            }
            _ => {}
        }
        // Returned blocks are rejected on insertion.
        if op.is_terminator() && !block.has_returned() && pos != block.len() {
            return Err(MirError::TerminatorNotAtEnd {
                function: function.name().to_owned(),
                block: block.name().to_owned(),
            });
        }
        Ok(())
    }
}

fn pointee(ptr: &Value) -> Result<&Type, MirError> {
    ptr.ty.pointee().ok_or_else(|| MirError::NotAPointer {
        value: ptr.to_string(),
        ty: ptr.ty.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mir::FunctionId;

    fn module_with(return_type: Type) -> (Module, FunctionId, BlockId) {
        let mut module = Module::new("test");
        let f = module.add_function("f", return_type, vec![Type::Int32]);
        let entry = module.add_block(f, "entry").unwrap();
        (module, f, entry)
    }

    #[test]
    fn test_return_terminates_block() {
        let (mut module, _, entry) = module_with(Type::Void);
        let mut b = Builder::at(&mut module, entry, BlockPos::End).unwrap();

        b.build_return(None).unwrap();
        assert_eq!(
            b.add_instruction(Op::RetVoid),
            Err(MirError::BlockTerminated {
                function: "f".to_owned(),
                block: "entry".to_owned(),
            })
        );
        assert!(matches!(
            b.build_alloca(Type::Int32),
            Err(MirError::BlockTerminated { .. })
        ));
        assert!(b.module().block(entry).unwrap().has_returned());
        assert_eq!(module.block(entry).unwrap().ops(), [Op::RetVoid]);

        assert_eq!(
            module.set_returned(entry, false),
            Err(MirError::CannotUnreturn {
                function: "f".to_owned(),
                block: "entry".to_owned(),
            })
        );
        assert_eq!(module.verify(), Ok(()));
    }

    #[test]
    fn test_return_type_must_match() {
        let point = Type::pointer(Type::named_struct("Point", vec![Type::Int32, Type::Int32]));
        let (mut module, _, entry) = module_with(point);
        let mut b = Builder::at(&mut module, entry, BlockPos::End).unwrap();

        let wrong = Value::new("x", Type::Int32);
        let error = b.build_return(Some(&wrong)).unwrap_err();
        assert_eq!(
            error.to_string(),
            "value %x cannot be returned by function `f` as it is of type i32, not %Point*"
        );
        assert!(!b.module().block(entry).unwrap().has_returned());

        // Named structs are equal by name, whatever their fields.
        let same = Value::new("p", Type::pointer(Type::named_struct("Point", vec![])));
        b.build_return(Some(&same)).unwrap();
        assert!(b.module().block(entry).unwrap().has_returned());
    }

    #[test]
    fn test_return_type_structural_equality() {
        let callback = Type::function(Type::Void, vec![Type::anonymous_struct(vec![Type::Int8])]);
        let (mut module, _, entry) = module_with(callback.clone());
        let mut b = Builder::at(&mut module, entry, BlockPos::End).unwrap();

        let named = Value::new(
            "g",
            Type::function(Type::Void, vec![Type::named_struct("S", vec![Type::Int8])]),
        );
        assert!(matches!(
            b.build_return(Some(&named)),
            Err(MirError::ReturnTypeMismatch { .. })
        ));
        b.build_return(Some(&Value::new("h", callback))).unwrap();
    }

    #[test]
    fn test_alloca() {
        let (mut module, _, entry) = module_with(Type::Void);
        let mut b = Builder::at(&mut module, entry, BlockPos::End).unwrap();

        assert_eq!(b.build_alloca(Type::Void), Err(MirError::VoidAllocation));
        let slot = b.build_alloca(Type::Int32).unwrap();
        assert_eq!(slot, Value::new("0", Type::pointer(Type::Int32)));
        // Pointers to void are fine.
        let raw = b.build_alloca(Type::pointer(Type::Void)).unwrap();
        assert_eq!(raw.ty.to_string(), "void**");
        assert_eq!(b.position(), Some(2));
    }

    #[test]
    fn test_add_instruction_checks_ops() {
        let (mut module, _, entry) = module_with(Type::Bool);
        let mut b = Builder::at(&mut module, entry, BlockPos::End).unwrap();

        let void_slot = Op::Alloca {
            result: Value::new("a", Type::pointer(Type::Void)),
            ty: Type::Void,
        };
        assert_eq!(b.add_instruction(void_slot), Err(MirError::VoidAllocation));
        assert_eq!(
            b.add_instruction(Op::Ret(Value::new("x", Type::Int32))),
            Err(MirError::ReturnTypeMismatch {
                function: "f".to_owned(),
                value: "%x".to_owned(),
                expected: Type::Bool,
                found: Type::Int32,
            })
        );
        assert_eq!(b.position(), Some(0));
        let block = b.module().block(entry).unwrap();
        assert!(block.is_empty());
        assert!(!block.has_returned());

        b.add_instruction(Op::Ret(Value::new("y", Type::Bool))).unwrap();
        assert_eq!(module.verify(), Ok(()));
    }

    #[test]
    fn test_terminator_must_end_block() {
        let (mut module, _, entry) = module_with(Type::Void);
        let mut b = Builder::at(&mut module, entry, BlockPos::End).unwrap();
        b.build_alloca(Type::Int32).unwrap();

        b.position_at(entry, BlockPos::Start).unwrap();
        assert_eq!(
            b.build_return(None),
            Err(MirError::TerminatorNotAtEnd {
                function: "f".to_owned(),
                block: "entry".to_owned(),
            })
        );
        assert!(!b.module().block(entry).unwrap().has_returned());

        // Other operations may still go before existing ones.
        b.build_alloca(Type::Int8).unwrap();
        b.position_at(entry, BlockPos::End).unwrap();
        b.build_return(None).unwrap();

        let ops: Vec<_> = module
            .block(entry)
            .unwrap()
            .ops()
            .iter()
            .map(Op::to_string)
            .collect();
        assert_eq!(ops, ["%1 = alloca i8", "%0 = alloca i32", "ret void"]);
    }

    #[test]
    fn test_position_at_start_inserts_before() {
        let (mut module, _, entry) = module_with(Type::Void);
        let mut b = Builder::at(&mut module, entry, BlockPos::End).unwrap();
        b.build_alloca(Type::Int64).unwrap();

        b.position_at(entry, BlockPos::Start).unwrap();
        b.build_alloca(Type::Bool).unwrap();
        b.build_alloca(Type::Int8).unwrap();
        assert_eq!(b.position(), Some(2));

        b.position_at(entry, BlockPos::End).unwrap();
        assert_eq!(b.position(), Some(3));
        b.build_return(None).unwrap();

        let ops: Vec<_> = module
            .block(entry)
            .unwrap()
            .ops()
            .iter()
            .map(Op::to_string)
            .collect();
        assert_eq!(
            ops,
            [
                "%1 = alloca bool",
                "%2 = alloca i8",
                "%0 = alloca i64",
                "ret void",
            ]
        );
    }

    #[test]
    fn test_names_are_scoped_to_functions() {
        let mut module = Module::new("test");
        let f = module.add_function("f", Type::Void, vec![]);
        let g = module.add_function("g", Type::Void, vec![]);
        let f_entry = module.add_block(f, "entry").unwrap();
        let g_entry = module.add_block(g, "entry").unwrap();
        let f_exit = module.add_block(f, "exit").unwrap();

        let mut b = Builder::at(&mut module, f_entry, BlockPos::End).unwrap();
        assert_eq!(b.gen_name().unwrap(), "0");
        assert_eq!(b.gen_name().unwrap(), "1");
        b.position_at(g_entry, BlockPos::End).unwrap();
        assert_eq!(b.gen_name().unwrap(), "0");
        b.position_at(f_exit, BlockPos::End).unwrap();
        assert_eq!(b.gen_name().unwrap(), "2");
    }

    #[test]
    fn test_unpositioned_builder() {
        let mut module = Module::new("test");
        let mut b = Builder::new(&mut module);
        assert_eq!(b.block(), None);
        assert_eq!(b.add_instruction(Op::RetVoid), Err(MirError::Unpositioned));
        assert_eq!(b.gen_name(), Err(MirError::Unpositioned));
        assert_eq!(
            b.build_return(Some(&Value::new("x", Type::Bool))),
            Err(MirError::Unpositioned)
        );
    }

    #[test]
    fn test_load_store_binary() {
        let (mut module, f, entry) = module_with(Type::Bool);
        let arg = module.function(f).unwrap().param(0).unwrap();
        let mut b = Builder::at(&mut module, entry, BlockPos::End).unwrap();

        let slot = b.build_alloca(Type::Int32).unwrap();
        b.build_store(&arg, &slot).unwrap();
        let loaded = b.build_load(&slot).unwrap();
        assert_eq!(loaded.ty, Type::Int32);

        let four = b.build_const(Type::Int32, Constant::Int(4)).unwrap();
        let sum = b.build_binary(BinaryOp::Add, &loaded, &four).unwrap();
        assert_eq!(sum.ty, Type::Int32);
        let less = b.build_binary(BinaryOp::Lt, &sum, &four).unwrap();
        assert_eq!(less.ty, Type::Bool);
        b.build_return(Some(&less)).unwrap();

        assert_eq!(
            module.function(f).unwrap().to_string(),
            "fn f(%arg0: i32) -> bool {\n\
             entry:\n  \
               %0 = alloca i32\n  \
               store i32 %arg0, i32* %0\n  \
               %1 = load i32, i32* %0\n  \
               %2 = const i32 4\n  \
               %3 = add i32 %1, %2\n  \
               %4 = lt i32 %3, %2\n  \
               ret bool %4\n\
             }"
        );
    }

    #[test]
    fn test_operand_checks() {
        let (mut module, _, entry) = module_with(Type::Void);
        let mut b = Builder::at(&mut module, entry, BlockPos::End).unwrap();

        let int = b.build_const(Type::Int64, Constant::Int(1)).unwrap();
        let float = b.build_const(Type::Float64, Constant::Float(1.5)).unwrap();
        assert_eq!(
            b.build_binary(BinaryOp::Mul, &int, &float),
            Err(MirError::OperandMismatch {
                op: "mul",
                left: Type::Int64,
                right: Type::Float64,
            })
        );
        assert_eq!(
            b.build_load(&int).unwrap_err().to_string(),
            "value %0 of type i64 is not a pointer"
        );

        let slot = b.build_alloca(Type::Float64).unwrap();
        assert!(matches!(
            b.build_store(&int, &slot),
            Err(MirError::OperandMismatch { op: "store", .. })
        ));
        assert_eq!(
            b.build_const(Type::Bool, Constant::Int(1)),
            Err(MirError::ConstantMismatch {
                value: Constant::Int(1),
                ty: Type::Bool,
            })
        );
        b.build_const(Type::pointer(Type::Int8), Constant::Null).unwrap();
    }
}
