//! Instruction selection for x86-64.
//!
//! Walks a function's basic blocks in declaration order and emits one
//! machine sequence per IR statement. Almost everything funnels into a
//! runtime helper call; the exceptions are the inline stores of constant
//! values, plain temp-to-temp copies, and the integer fast paths for
//! arithmetic and comparisons.
//!
//! Register assignments (ABI, shared with the runtime helpers):
//! - `r14` holds the current `Context*` for the whole function;
//! - `r15` caches `ctx.locals`;
//! - `rbp` is the frame pointer; spill temps live right below it, the
//!   outgoing call-argument area sits at `rsp`;
//! - helper arguments go in `rdi rsi rdx rcx r8 r9` (SysV), helper calls
//!   load the target address into `rax` and call through it;
//! - `rax` is the integer-op and boolean-result register, `rcx` the shift
//!   count, `rdx` a pointer scratch.
//!
//! Forward branches are emitted with placeholder displacements and
//! collected in per-target patch lists; after the last block everything is
//! resolved against the recorded block labels. A jump to the textually
//! next block is never emitted.

use super::CompileError;
use crate::context::offsets;
use crate::engine::ExecutionEngine;
use crate::ir::{self, AluOp, Builtin, Const, Expr, Stmt, UnOp};
use crate::object::RegExpFlags;
use crate::runtime as rt;
use crate::value::{tag, Value, PAYLOAD_OFFSET, TAG_OFFSET};
use krait_jit::x86_64::{Address, Assembler, Condition, Reg, Xmm};
use krait_jit::Jump;

const CONTEXT_REGISTER: Reg = Reg::R14;
const LOCALS_REGISTER: Reg = Reg::R15;
/// Accumulator of the integer fast path and of helper boolean returns.
const VALUE_REGISTER: Reg = Reg::Rax;
/// Address scratch; never live across a helper call.
const SCRATCH_REGISTER: Reg = Reg::Rdx;

const VALUE_SIZE: i32 = 8;

/// SysV integer argument registers, in order.
const ARG: [Reg; 6] = [Reg::Rdi, Reg::Rsi, Reg::Rdx, Reg::Rcx, Reg::R8, Reg::R9];

pub(crate) struct InstructionSelection<'a> {
    engine: &'a mut ExecutionEngine,
    module: &'a ir::Module,
    function: &'a ir::Function,
    asm: &'a mut Assembler,
    /// Forward branches waiting for their target block's label.
    patches: Vec<(ir::BlockId, Jump)>,
    /// Exception checks and returns that target the epilogue.
    epilogue_patches: Vec<Jump>,
    block_labels: Vec<Option<krait_jit::Label>>,
    current_block: usize,
    frame_size: i32,
}

impl<'a> InstructionSelection<'a> {
    pub(crate) fn new(
        engine: &'a mut ExecutionEngine,
        module: &'a ir::Module,
        function: &'a ir::Function,
        asm: &'a mut Assembler,
    ) -> Self {
        Self {
            engine,
            module,
            function,
            asm,
            patches: Vec::new(),
            epilogue_patches: Vec::new(),
            block_labels: vec![None; function.blocks.len()],
            current_block: 0,
            frame_size: 0,
        }
    }

    fn unsupported(&self, reason: impl Into<String>) -> CompileError {
        CompileError::UnsupportedIr {
            function: self.function.name.clone(),
            reason: reason.into(),
        }
    }

    /// Emit the whole function; returns its offset in the code buffer.
    pub(crate) fn run(mut self) -> Result<usize, CompileError> {
        self.asm.buffer_mut().align(16);
        let entry = self.asm.buffer().len();

        // Spill temps, two slots for materialized constant operands, and
        // the outgoing argument area.
        let slots = self.function.spill_count() + 2 + self.function.max_call_arguments;
        self.frame_size = ((slots as i32 * VALUE_SIZE) + 15) & !15;

        self.asm.push(Reg::Rbp);
        self.asm.push(CONTEXT_REGISTER);
        self.asm.push(LOCALS_REGISTER);
        self.asm.mov_rr(Reg::Rbp, Reg::Rsp);
        self.asm.mov_rr(CONTEXT_REGISTER, Reg::Rdi);
        self.asm.sub_ri(Reg::Rsp, self.frame_size);
        self.asm
            .load(LOCALS_REGISTER, Address::new(CONTEXT_REGISTER, offsets::LOCALS));

        let function = self.function;
        for (index, block) in function.blocks.iter().enumerate() {
            self.current_block = index;
            self.block_labels[index] = Some(self.asm.label());
            for stmt in &block.stmts {
                self.visit_stmt(stmt)?;
            }
        }

        let epilogue = self.asm.label();
        for jump in std::mem::take(&mut self.epilogue_patches) {
            self.asm.link(jump, epilogue)?;
        }
        self.asm.add_ri(Reg::Rsp, self.frame_size);
        self.asm.pop(LOCALS_REGISTER);
        self.asm.pop(CONTEXT_REGISTER);
        self.asm.pop(Reg::Rbp);
        self.asm.ret();

        for (target, jump) in std::mem::take(&mut self.patches) {
            let label = self.block_labels[target.0 as usize]
                .ok_or(CompileError::UnresolvedBlock(target))?;
            self.asm.link(jump, label)?;
        }

        Ok(entry)
    }

    // ---- addressing ----------------------------------------------------

    /// A memory operand for the value slot of a temp; may clobber
    /// `scratch` to reach argument slots.
    fn temp_address(&mut self, scratch: Reg, index: i32) -> Address {
        let local_count = self.function.locals.len() as i32;
        if index < 0 {
            let arg = -index - 1;
            self.asm
                .load(scratch, Address::new(CONTEXT_REGISTER, offsets::ARGUMENTS));
            Address::new(scratch, arg * VALUE_SIZE)
        } else if index < local_count {
            Address::new(LOCALS_REGISTER, index * VALUE_SIZE)
        } else {
            let spill = index - local_count;
            Address::new(Reg::Rbp, -VALUE_SIZE * (spill + 1))
        }
    }

    /// Compute the address of a temp's slot into `reg` (for helper
    /// arguments; helpers take `Value*`, never loose values).
    fn load_temp_address(&mut self, reg: Reg, index: i32) {
        let address = self.temp_address(reg, index);
        self.asm.lea(reg, address);
    }

    /// A frame slot for materializing a constant operand that a helper
    /// needs by pointer. Two are reserved; `which` selects one.
    fn const_slot_address(&self, which: u8) -> Address {
        let spill = self.function.spill_count() as i32;
        Address::new(Reg::Rbp, -VALUE_SIZE * (spill + 1 + i32::from(which)))
    }

    /// Put a pointer to the operand's value into `reg`. Temps resolve to
    /// their slot; constants are materialized into a reserved frame slot.
    fn operand_ptr(&mut self, reg: Reg, expr: &Expr, const_slot: u8) -> Result<(), CompileError> {
        if let Expr::Temp(index) = expr {
            self.load_temp_address(reg, *index);
            return Ok(());
        }
        let value = self
            .const_value(expr)
            .ok_or_else(|| self.unsupported("operand is neither a temp nor a constant"))?;
        let slot = self.const_slot_address(const_slot);
        self.asm.mov_ri64(VALUE_REGISTER, value.bits());
        self.asm.store(slot, VALUE_REGISTER);
        self.asm.lea(reg, slot);
        Ok(())
    }

    /// The compile-time value of a constant-like expression.
    fn const_value(&mut self, expr: &Expr) -> Option<Value> {
        match expr {
            Expr::Const(Const::Undefined) => Some(Value::undefined()),
            Expr::Const(Const::Null) => Some(Value::null()),
            Expr::Const(Const::Bool(b)) => Some(Value::from_boolean(*b)),
            Expr::Const(Const::Number(n)) => Some(Value::number(*n)),
            Expr::Str(text) => {
                let string = self.engine.new_string(text);
                Some(Value::from_string(string))
            }
            Expr::RegExp {
                pattern,
                global,
                ignore_case,
                multiline,
            } => {
                let mut flags = RegExpFlags::empty();
                flags.set(RegExpFlags::GLOBAL, *global);
                flags.set(RegExpFlags::IGNORE_CASE, *ignore_case);
                flags.set(RegExpFlags::MULTILINE, *multiline);
                let object = self.engine.new_regexp_object(pattern, flags);
                Some(Value::from_object(object))
            }
            _ => None,
        }
    }

    fn identifier_bits(&mut self, name: &str) -> u64 {
        self.engine.identifier(name).as_ptr() as u64
    }

    fn function_bits(&self, id: ir::FnId) -> u64 {
        let function: *const ir::Function = &*self.module.functions[id.0 as usize];
        function as u64
    }

    // ---- helper calls --------------------------------------------------

    fn call_helper(&mut self, helper: usize) {
        self.asm.call_absolute(VALUE_REGISTER, helper);
    }

    fn load_context_arg(&mut self) {
        self.asm.mov_rr(ARG[0], CONTEXT_REGISTER);
    }

    /// Result-pointer argument in `rsi`: a temp slot or null.
    fn load_result_arg(&mut self, result: Option<i32>) {
        match result {
            Some(index) => self.load_temp_address(ARG[1], index),
            None => self.asm.zero(ARG[1]),
        }
    }

    /// Flag check after a helper that can throw: branch to the handler
    /// block, or to the epilogue when the function has none.
    fn check_exceptions(&mut self) {
        self.asm.cmp32_mi(
            Address::new(CONTEXT_REGISTER, offsets::HAS_UNCAUGHT_EXCEPTION),
            1,
        );
        let jump = self.asm.jcc(Condition::Equal);
        match self.function.handler_block {
            Some(block) => self.patches.push((block, jump)),
            None => self.epilogue_patches.push(jump),
        }
    }

    // ---- statements ----------------------------------------------------

    fn visit_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::Exp(expr) => self.visit_exp(expr),
            Stmt::Move { target, source, op } => match op {
                None => self.visit_move(target, source),
                Some(op) => self.visit_compound(target, *op, source),
            },
            Stmt::Jump { target } => {
                self.jump_to_block(*target);
                Ok(())
            }
            Stmt::CJump {
                cond,
                iftrue,
                iffalse,
            } => self.visit_cjump(cond, *iftrue, *iffalse),
            Stmt::Ret { value } => self.visit_ret(value),
            Stmt::Enter | Stmt::Leave => {
                Err(self.unsupported("Enter/Leave scope markers are not lowerable"))
            }
        }
    }

    fn visit_exp(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match expr {
            Expr::Call { base, args } => self.lower_call(base, args, None),
            _ => Err(self.unsupported("expression statement is not a call")),
        }
    }

    fn jump_to_block(&mut self, target: ir::BlockId) {
        if self.current_block + 1 != target.0 as usize {
            let jump = self.asm.jmp();
            self.patches.push((target, jump));
        }
    }

    fn visit_ret(&mut self, value: &Expr) -> Result<(), CompileError> {
        let Expr::Temp(index) = value else {
            return Err(self.unsupported("return value is not a temp"));
        };
        self.asm
            .lea(ARG[0], Address::new(CONTEXT_REGISTER, offsets::RESULT));
        self.load_temp_address(ARG[1], *index);
        self.call_helper(rt::krait_rt_copy as usize);

        if self.current_block + 1 != self.function.blocks.len() {
            let jump = self.asm.jmp();
            self.epilogue_patches.push(jump);
        }
        Ok(())
    }

    // ---- moves ---------------------------------------------------------

    fn visit_move(&mut self, target: &Expr, source: &Expr) -> Result<(), CompileError> {
        match target {
            Expr::Name(name) => self.move_to_name(name, source),
            Expr::Temp(index) => self.move_to_temp(*index, source),
            Expr::Member { base, name } => self.move_to_member(base, name, source),
            Expr::Subscript { base, index } => self.move_to_subscript(base, index, source),
            _ => Err(self.unsupported("unassignable move target")),
        }
    }

    fn move_to_name(&mut self, name: &str, source: &Expr) -> Result<(), CompileError> {
        let name_bits = self.identifier_bits(name);
        match source {
            Expr::Const(Const::Bool(b)) => {
                self.load_context_arg();
                self.asm.mov_ri64(ARG[1], name_bits);
                self.asm.mov32_ri(ARG[2], u32::from(*b));
                self.call_helper(rt::krait_rt_set_activation_property_boolean as usize);
            }
            Expr::Const(Const::Number(n)) => {
                self.load_context_arg();
                self.asm.mov_ri64(ARG[1], name_bits);
                self.load_double(Xmm::Xmm0, *n);
                self.call_helper(rt::krait_rt_set_activation_property_number as usize);
            }
            Expr::Const(Const::Undefined | Const::Null) => {
                let value = self.const_value(source).expect("constant");
                self.load_context_arg();
                self.asm.mov_ri64(ARG[1], name_bits);
                self.asm.mov_ri64(ARG[2], value.bits());
                self.call_helper(rt::krait_rt_set_activation_property_value as usize);
            }
            Expr::Str(text) => {
                let string = self.engine.new_string(text);
                self.load_context_arg();
                self.asm.mov_ri64(ARG[1], name_bits);
                self.asm.mov_ri64(ARG[2], string.as_ptr() as u64);
                self.call_helper(rt::krait_rt_set_activation_property_string as usize);
            }
            Expr::Temp(index) => {
                self.load_context_arg();
                self.asm.mov_ri64(ARG[1], name_bits);
                self.load_temp_address(ARG[2], *index);
                self.call_helper(rt::krait_rt_set_activation_property as usize);
            }
            Expr::Name(other) => {
                let other_bits = self.identifier_bits(other);
                self.load_context_arg();
                self.asm.mov_ri64(ARG[1], name_bits);
                self.asm.mov_ri64(ARG[2], other_bits);
                self.call_helper(rt::krait_rt_copy_activation_property as usize);
            }
            Expr::Closure(id) => {
                let function_bits = self.function_bits(*id);
                self.load_context_arg();
                self.asm.mov_ri64(ARG[1], name_bits);
                self.asm.mov_ri64(ARG[2], function_bits);
                self.call_helper(rt::krait_rt_set_activation_property_closure as usize);
            }
            _ => return Err(self.unsupported("unsupported source for a name store")),
        }
        self.check_exceptions();
        Ok(())
    }

    fn move_to_temp(&mut self, target: i32, source: &Expr) -> Result<(), CompileError> {
        match source {
            Expr::Name(name) => {
                if name == "this" {
                    self.load_context_arg();
                    self.load_temp_address(ARG[1], target);
                    self.call_helper(rt::krait_rt_get_this_object as usize);
                } else {
                    let name_bits = self.identifier_bits(name);
                    self.load_context_arg();
                    self.load_temp_address(ARG[1], target);
                    self.asm.mov_ri64(ARG[2], name_bits);
                    self.call_helper(rt::krait_rt_get_activation_property as usize);
                    self.check_exceptions();
                }
                Ok(())
            }
            Expr::Const(_) | Expr::Str(_) | Expr::RegExp { .. } => {
                let value = self.const_value(source).expect("constant-like source");
                let address = self.temp_address(SCRATCH_REGISTER, target);
                self.asm.mov_ri64(VALUE_REGISTER, value.bits());
                self.asm.store(address, VALUE_REGISTER);
                Ok(())
            }
            Expr::Temp(index) => {
                let source_address = self.temp_address(SCRATCH_REGISTER, *index);
                self.asm.load(VALUE_REGISTER, source_address);
                let target_address = self.temp_address(Reg::Rcx, target);
                self.asm.store(target_address, VALUE_REGISTER);
                Ok(())
            }
            Expr::Closure(id) => {
                let function_bits = self.function_bits(*id);
                self.load_context_arg();
                self.load_temp_address(ARG[1], target);
                self.asm.mov_ri64(ARG[2], function_bits);
                self.call_helper(rt::krait_rt_init_closure as usize);
                Ok(())
            }
            Expr::Member { base, name } => {
                let Expr::Temp(base) = &**base else {
                    return Err(self.unsupported("member base is not a temp"));
                };
                let name_bits = self.identifier_bits(name);
                self.load_context_arg();
                self.load_temp_address(ARG[1], target);
                self.load_temp_address(ARG[2], *base);
                self.asm.mov_ri64(ARG[3], name_bits);
                self.call_helper(rt::krait_rt_get_property as usize);
                self.check_exceptions();
                Ok(())
            }
            Expr::Subscript { base, index } => {
                self.load_context_arg();
                self.load_temp_address(ARG[1], target);
                self.operand_ptr(ARG[2], base, 0)?;
                self.operand_ptr(ARG[3], index, 1)?;
                self.call_helper(rt::krait_rt_get_element as usize);
                self.check_exceptions();
                Ok(())
            }
            Expr::Unop { op, expr } => {
                self.load_context_arg();
                self.load_temp_address(ARG[1], target);
                self.operand_ptr(ARG[2], expr, 0)?;
                let helper = match op {
                    UnOp::Not => rt::krait_rt_not as usize,
                    UnOp::UMinus => rt::krait_rt_uminus as usize,
                    UnOp::UPlus => rt::krait_rt_uplus as usize,
                    UnOp::Compl => rt::krait_rt_compl as usize,
                };
                self.call_helper(helper);
                self.check_exceptions();
                Ok(())
            }
            Expr::Binop { op, left, right } => {
                self.lower_binop(*op, target, left, right)?;
                self.check_exceptions();
                Ok(())
            }
            Expr::Call { base, args } => self.lower_call(base, args, Some(target)),
            Expr::New { base, args } => self.lower_construct(base, args, Some(target)),
            Expr::Builtin(_) => Err(self.unsupported("builtin outside a call position")),
        }
    }

    fn move_to_member(
        &mut self,
        base: &Expr,
        name: &str,
        source: &Expr,
    ) -> Result<(), CompileError> {
        let Expr::Temp(base) = base else {
            return Err(self.unsupported("member base is not a temp"));
        };
        let name_bits = self.identifier_bits(name);
        self.load_context_arg();
        self.load_temp_address(ARG[1], *base);
        self.asm.mov_ri64(ARG[2], name_bits);
        match source {
            Expr::Const(Const::Bool(b)) => {
                self.asm.mov32_ri(ARG[3], u32::from(*b));
                self.call_helper(rt::krait_rt_set_property_boolean as usize);
            }
            Expr::Const(Const::Number(n)) => {
                self.load_double(Xmm::Xmm0, *n);
                self.call_helper(rt::krait_rt_set_property_number as usize);
            }
            Expr::Const(Const::Undefined | Const::Null) => {
                let value = self.const_value(source).expect("constant");
                self.asm.mov_ri64(ARG[3], value.bits());
                self.call_helper(rt::krait_rt_set_property_value as usize);
            }
            Expr::Str(text) => {
                let string = self.engine.new_string(text);
                self.asm.mov_ri64(ARG[3], string.as_ptr() as u64);
                self.call_helper(rt::krait_rt_set_property_string as usize);
            }
            Expr::Temp(index) => {
                self.load_temp_address(ARG[3], *index);
                self.call_helper(rt::krait_rt_set_property as usize);
            }
            Expr::Closure(id) => {
                let function_bits = self.function_bits(*id);
                self.asm.mov_ri64(ARG[3], function_bits);
                self.call_helper(rt::krait_rt_set_property_closure as usize);
            }
            _ => return Err(self.unsupported("unsupported source for a member store")),
        }
        self.check_exceptions();
        Ok(())
    }

    fn move_to_subscript(
        &mut self,
        base: &Expr,
        index: &Expr,
        source: &Expr,
    ) -> Result<(), CompileError> {
        self.load_context_arg();
        self.operand_ptr(ARG[1], base, 0)?;
        self.operand_ptr(ARG[2], index, 1)?;
        match source {
            Expr::Const(Const::Number(n)) => {
                self.load_double(Xmm::Xmm0, *n);
                self.call_helper(rt::krait_rt_set_element_number as usize);
            }
            Expr::Const(_) | Expr::Str(_) => {
                let value = self.const_value(source).expect("constant-like source");
                self.asm.mov_ri64(ARG[3], value.bits());
                self.call_helper(rt::krait_rt_set_element_value as usize);
            }
            Expr::Temp(value) => {
                self.load_temp_address(ARG[3], *value);
                self.call_helper(rt::krait_rt_set_element as usize);
            }
            _ => return Err(self.unsupported("unsupported source for an element store")),
        }
        self.check_exceptions();
        Ok(())
    }

    fn visit_compound(
        &mut self,
        target: &Expr,
        op: AluOp,
        source: &Expr,
    ) -> Result<(), CompileError> {
        if !is_arithmetic(op) {
            return Err(self.unsupported("compound assignment with a non-arithmetic operator"));
        }
        match target {
            Expr::Temp(index) => {
                let left = Expr::Temp(*index);
                self.lower_binop(op, *index, &left, source)?;
                self.check_exceptions();
                Ok(())
            }
            Expr::Name(name) => {
                let name_bits = self.identifier_bits(name);
                self.load_context_arg();
                self.asm.mov_ri64(ARG[1], name_bits);
                self.operand_ptr(ARG[2], source, 0)?;
                self.call_helper(inplace_name_helper(op));
                self.check_exceptions();
                Ok(())
            }
            Expr::Subscript { base, index } => {
                self.load_context_arg();
                self.operand_ptr(ARG[1], base, 0)?;
                self.operand_ptr(ARG[2], index, 1)?;
                let Expr::Temp(value) = source else {
                    return Err(self.unsupported("compound element source is not a temp"));
                };
                self.load_temp_address(ARG[3], *value);
                self.call_helper(inplace_element_helper(op));
                self.check_exceptions();
                Ok(())
            }
            Expr::Member { base, name } => {
                let Expr::Temp(base) = &**base else {
                    return Err(self.unsupported("member base is not a temp"));
                };
                let name_bits = self.identifier_bits(name);
                self.load_context_arg();
                self.load_temp_address(ARG[1], *base);
                self.asm.mov_ri64(ARG[2], name_bits);
                self.operand_ptr(ARG[3], source, 0)?;
                self.call_helper(inplace_member_helper(op));
                self.check_exceptions();
                Ok(())
            }
            _ => Err(self.unsupported("unassignable compound-move target")),
        }
    }

    // ---- binary operators ----------------------------------------------

    /// Lower `target = left op right`, with the inline integer fast path
    /// for the operators that have one.
    fn lower_binop(
        &mut self,
        op: AluOp,
        target: i32,
        left: &Expr,
        right: &Expr,
    ) -> Result<(), CompileError> {
        let inline = inline_alu(op);

        let left_int = integer_constant(left);
        let right_int = integer_constant(right);
        let can_inline = inline.is_some()
            && (matches!(left, Expr::Temp(_)) || left_int.is_some())
            && (matches!(right, Expr::Temp(_)) || right_int.is_some());

        let mut done: Option<Jump> = None;
        let mut slow: Vec<Jump> = Vec::new();

        if can_inline {
            let inline = inline.expect("checked above");
            if let Expr::Temp(index) = left {
                let address = self.temp_address(SCRATCH_REGISTER, *index);
                self.asm
                    .cmp32_mi(address.offset(TAG_OFFSET), tag::INTEGER as i32);
                slow.push(self.asm.jcc(Condition::NotEqual));
            }
            if let Expr::Temp(index) = right {
                let address = self.temp_address(SCRATCH_REGISTER, *index);
                self.asm
                    .cmp32_mi(address.offset(TAG_OFFSET), tag::INTEGER as i32);
                slow.push(self.asm.jcc(Condition::NotEqual));
            }

            // Left payload into the accumulator.
            match left {
                Expr::Temp(index) => {
                    let address = self.temp_address(SCRATCH_REGISTER, *index);
                    self.asm
                        .load32(VALUE_REGISTER, address.offset(PAYLOAD_OFFSET));
                }
                _ => self
                    .asm
                    .mov32_ri(VALUE_REGISTER, left_int.expect("checked above") as u32),
            }

            // Apply the operation; arithmetic variants bail out on overflow.
            match right {
                Expr::Temp(index) => {
                    let address = self.temp_address(SCRATCH_REGISTER, *index);
                    let payload = address.offset(PAYLOAD_OFFSET);
                    match inline {
                        InlineAlu::Add => {
                            self.asm.add32_rm(VALUE_REGISTER, payload);
                            slow.push(self.asm.jcc(Condition::Overflow));
                        }
                        InlineAlu::Sub => {
                            self.asm.sub32_rm(VALUE_REGISTER, payload);
                            slow.push(self.asm.jcc(Condition::Overflow));
                        }
                        InlineAlu::Mul => {
                            self.asm.imul32_rm(VALUE_REGISTER, payload);
                            slow.push(self.asm.jcc(Condition::Overflow));
                        }
                        InlineAlu::And => self.asm.and32_rm(VALUE_REGISTER, payload),
                        InlineAlu::Or => self.asm.or32_rm(VALUE_REGISTER, payload),
                        InlineAlu::Xor => self.asm.xor32_rm(VALUE_REGISTER, payload),
                        InlineAlu::Shl | InlineAlu::Sar => {
                            self.asm.load32(Reg::Rcx, payload);
                            self.asm.and32_ri(Reg::Rcx, 0x1f);
                            if inline == InlineAlu::Shl {
                                self.asm.shl32_cl(VALUE_REGISTER);
                            } else {
                                self.asm.sar32_cl(VALUE_REGISTER);
                            }
                        }
                    }
                }
                _ => {
                    let imm = right_int.expect("checked above");
                    match inline {
                        InlineAlu::Add => {
                            self.asm.add32_ri(VALUE_REGISTER, imm);
                            slow.push(self.asm.jcc(Condition::Overflow));
                        }
                        InlineAlu::Sub => {
                            self.asm.sub32_ri(VALUE_REGISTER, imm);
                            slow.push(self.asm.jcc(Condition::Overflow));
                        }
                        InlineAlu::Mul => {
                            self.asm.imul32_ri(VALUE_REGISTER, imm);
                            slow.push(self.asm.jcc(Condition::Overflow));
                        }
                        InlineAlu::And => self.asm.and32_ri(VALUE_REGISTER, imm),
                        InlineAlu::Or => self.asm.or32_ri(VALUE_REGISTER, imm),
                        InlineAlu::Xor => self.asm.xor32_ri(VALUE_REGISTER, imm),
                        InlineAlu::Shl => self.asm.shl32_ri(VALUE_REGISTER, (imm & 0x1f) as u8),
                        InlineAlu::Sar => self.asm.sar32_ri(VALUE_REGISTER, (imm & 0x1f) as u8),
                    }
                }
            }

            // Store payload and the Integer tag into the target.
            let address = self.temp_address(SCRATCH_REGISTER, target);
            self.asm
                .store32(address.offset(PAYLOAD_OFFSET), VALUE_REGISTER);
            self.asm.store32_imm(address.offset(TAG_OFFSET), tag::INTEGER);

            done = Some(self.asm.jmp());
            let fallback = self.asm.label();
            for jump in slow.drain(..) {
                self.asm.link(jump, fallback)?;
            }
        }

        // Fallback: the full-coercion helper.
        self.load_context_arg();
        self.load_temp_address(ARG[1], target);
        self.operand_ptr(ARG[2], left, 0)?;
        self.operand_ptr(ARG[3], right, 1)?;
        self.call_helper(binop_helper(op));

        if let Some(done) = done {
            let join = self.asm.label();
            self.asm.link(done, join)?;
        }
        Ok(())
    }

    // ---- conditional jumps ---------------------------------------------

    fn visit_cjump(
        &mut self,
        cond: &Expr,
        iftrue: ir::BlockId,
        iffalse: ir::BlockId,
    ) -> Result<(), CompileError> {
        match cond {
            Expr::Temp(index) => {
                // Boolean-tagged values branch without a helper call.
                let address = self.temp_address(SCRATCH_REGISTER, *index);
                self.asm
                    .cmp32_mi(address.offset(TAG_OFFSET), tag::BOOLEAN as i32);
                let convert = self.asm.jcc(Condition::NotEqual);
                let address = self.temp_address(SCRATCH_REGISTER, *index);
                self.asm
                    .load32(VALUE_REGISTER, address.offset(PAYLOAD_OFFSET));
                let test = self.asm.jmp();

                let convert_target = self.asm.label();
                self.asm.link(convert, convert_target)?;
                self.load_context_arg();
                self.load_temp_address(ARG[1], *index);
                self.call_helper(rt::krait_rt_to_boolean as usize);

                let test_target = self.asm.label();
                self.asm.link(test, test_target)?;
                self.branch_on_accumulator(iftrue, iffalse);
                Ok(())
            }
            Expr::Binop { op, left, right } => self.lower_compare(*op, left, right, iftrue, iffalse),
            _ => Err(self.unsupported("condition is neither a temp nor a comparison")),
        }
    }

    /// `cmp eax, 0; jne iftrue; [jmp iffalse]`.
    fn branch_on_accumulator(&mut self, iftrue: ir::BlockId, iffalse: ir::BlockId) {
        self.asm.cmp32_ri(VALUE_REGISTER, 0);
        let jump = self.asm.jcc(Condition::NotEqual);
        self.patches.push((iftrue, jump));
        self.jump_to_block(iffalse);
    }

    fn lower_compare(
        &mut self,
        op: AluOp,
        left: &Expr,
        right: &Expr,
        iftrue: ir::BlockId,
        iffalse: ir::BlockId,
    ) -> Result<(), CompileError> {
        let int_cond = integer_condition(op);
        let relational = matches!(op, AluOp::Gt | AluOp::Lt | AluOp::Ge | AluOp::Le);

        let left_int = integer_constant(left);
        let right_int = integer_constant(right);
        let can_int = int_cond.is_some()
            && (matches!(left, Expr::Temp(_)) || left_int.is_some())
            && (matches!(right, Expr::Temp(_)) || right_int.is_some());
        let can_double = relational
            && (matches!(left, Expr::Temp(_)) || number_constant(left).is_some())
            && (matches!(right, Expr::Temp(_)) || number_constant(right).is_some());

        let mut joins: Vec<Jump> = Vec::new();
        let mut next_path: Vec<Jump> = Vec::new();

        if can_int {
            if let Expr::Temp(index) = left {
                let address = self.temp_address(SCRATCH_REGISTER, *index);
                self.asm
                    .cmp32_mi(address.offset(TAG_OFFSET), tag::INTEGER as i32);
                next_path.push(self.asm.jcc(Condition::NotEqual));
            }
            if let Expr::Temp(index) = right {
                let address = self.temp_address(SCRATCH_REGISTER, *index);
                self.asm
                    .cmp32_mi(address.offset(TAG_OFFSET), tag::INTEGER as i32);
                next_path.push(self.asm.jcc(Condition::NotEqual));
            }
            match left {
                Expr::Temp(index) => {
                    let address = self.temp_address(SCRATCH_REGISTER, *index);
                    self.asm
                        .load32(VALUE_REGISTER, address.offset(PAYLOAD_OFFSET));
                }
                _ => self
                    .asm
                    .mov32_ri(VALUE_REGISTER, left_int.expect("checked above") as u32),
            }
            match right {
                Expr::Temp(index) => {
                    let address = self.temp_address(SCRATCH_REGISTER, *index);
                    self.asm
                        .cmp32_rm(VALUE_REGISTER, address.offset(PAYLOAD_OFFSET));
                }
                _ => self
                    .asm
                    .cmp32_ri(VALUE_REGISTER, right_int.expect("checked above")),
            }
            self.asm
                .set32(int_cond.expect("checked above"), VALUE_REGISTER);
            joins.push(self.asm.jmp());
        }

        if can_double {
            let entry = self.asm.label();
            for jump in next_path.drain(..) {
                self.asm.link(jump, entry)?;
            }
            let mut to_slow: Vec<Jump> = Vec::new();
            for operand in [left, right] {
                if let Expr::Temp(index) = operand {
                    self.emit_double_check(*index, &mut to_slow)?;
                }
            }
            self.load_double_operand(Xmm::Xmm0, left)?;
            self.load_double_operand(Xmm::Xmm1, right)?;
            // Unordered comparisons read false through Above/AboveOrEqual;
            // the lesser-than forms swap their operands to keep that.
            let condition = match op {
                AluOp::Gt => {
                    self.asm.ucomisd(Xmm::Xmm0, Xmm::Xmm1);
                    Condition::Above
                }
                AluOp::Ge => {
                    self.asm.ucomisd(Xmm::Xmm0, Xmm::Xmm1);
                    Condition::AboveOrEqual
                }
                AluOp::Lt => {
                    self.asm.ucomisd(Xmm::Xmm1, Xmm::Xmm0);
                    Condition::Above
                }
                AluOp::Le => {
                    self.asm.ucomisd(Xmm::Xmm1, Xmm::Xmm0);
                    Condition::AboveOrEqual
                }
                _ => unreachable!("relational checked above"),
            };
            self.asm.set32(condition, VALUE_REGISTER);
            joins.push(self.asm.jmp());
            next_path = to_slow;
        }

        let slow = self.asm.label();
        for jump in next_path {
            self.asm.link(jump, slow)?;
        }
        self.load_context_arg();
        self.operand_ptr(ARG[1], left, 0)?;
        self.operand_ptr(ARG[2], right, 1)?;
        self.call_helper(compare_helper(op));
        self.check_exceptions();

        let join = self.asm.label();
        for jump in joins {
            self.asm.link(jump, join)?;
        }
        self.branch_on_accumulator(iftrue, iffalse);
        Ok(())
    }

    /// Bail to the slow path unless the temp holds an unboxed double.
    fn emit_double_check(&mut self, index: i32, slow: &mut Vec<Jump>) -> Result<(), CompileError> {
        let address = self.temp_address(SCRATCH_REGISTER, index);
        self.asm.load32(VALUE_REGISTER, address.offset(TAG_OFFSET));
        self.asm.mov32_rr(Reg::Rcx, VALUE_REGISTER);
        self.asm.and32_ri(Reg::Rcx, tag::QNAN_MASK as i32);
        self.asm.cmp32_ri(Reg::Rcx, tag::QNAN_MASK as i32);
        let plain_double = self.asm.jcc(Condition::NotEqual);
        // Inside the NaN space only the canonical NaN (type nibble zero)
        // is a double.
        self.asm
            .and32_ri(VALUE_REGISTER, tag::TYPE_NIBBLE_MASK as i32);
        slow.push(self.asm.jcc(Condition::NotEqual));
        let resume = self.asm.label();
        self.asm.link(plain_double, resume)?;
        Ok(())
    }

    fn load_double_operand(&mut self, reg: Xmm, operand: &Expr) -> Result<(), CompileError> {
        match operand {
            Expr::Temp(index) => {
                let address = self.temp_address(SCRATCH_REGISTER, *index);
                self.asm.movsd_load(reg, address);
            }
            _ => {
                let number = number_constant(operand)
                    .ok_or_else(|| self.unsupported("double operand is not a number constant"))?;
                self.load_double(reg, number);
            }
        }
        Ok(())
    }

    fn load_double(&mut self, reg: Xmm, number: f64) {
        self.asm.mov_ri64(VALUE_REGISTER, number.to_bits());
        self.asm.movq_xmm(reg, VALUE_REGISTER);
    }

    // ---- calls ---------------------------------------------------------

    /// Copy evaluated arguments into the outgoing area at `rsp`.
    fn marshal_arguments(&mut self, args: &[Expr]) -> Result<u32, CompileError> {
        for (i, arg) in args.iter().enumerate() {
            match arg {
                Expr::Temp(index) => {
                    let address = self.temp_address(SCRATCH_REGISTER, *index);
                    self.asm.load(VALUE_REGISTER, address);
                }
                _ => {
                    let value = self
                        .const_value(arg)
                        .ok_or_else(|| self.unsupported("call argument is not a temp"))?;
                    self.asm.mov_ri64(VALUE_REGISTER, value.bits());
                }
            }
            self.asm
                .store(Address::new(Reg::Rsp, i as i32 * VALUE_SIZE), VALUE_REGISTER);
        }
        Ok(args.len() as u32)
    }

    fn lower_call(
        &mut self,
        base: &Expr,
        args: &[Expr],
        result: Option<i32>,
    ) -> Result<(), CompileError> {
        if let Expr::Builtin(builtin) = base {
            return self.lower_builtin(*builtin, args, result);
        }
        let argc = self.marshal_arguments(args)?;
        match base {
            Expr::Name(name) => {
                let name_bits = self.identifier_bits(name);
                self.load_context_arg();
                self.load_result_arg(result);
                self.asm.mov_ri64(ARG[2], name_bits);
                self.asm.lea(ARG[3], Address::new(Reg::Rsp, 0));
                self.asm.mov32_ri(ARG[4], argc);
                self.call_helper(rt::krait_rt_call_activation_property as usize);
            }
            Expr::Member { base, name } => {
                let Expr::Temp(base) = &**base else {
                    return Err(self.unsupported("method-call base is not a temp"));
                };
                let name_bits = self.identifier_bits(name);
                self.load_context_arg();
                self.load_result_arg(result);
                self.load_temp_address(ARG[2], *base);
                self.asm.mov_ri64(ARG[3], name_bits);
                self.asm.lea(ARG[4], Address::new(Reg::Rsp, 0));
                self.asm.mov32_ri(ARG[5], argc);
                self.call_helper(rt::krait_rt_call_property as usize);
            }
            Expr::Temp(index) => {
                self.load_context_arg();
                self.load_result_arg(result);
                self.load_temp_address(ARG[2], *index);
                self.asm.lea(ARG[3], Address::new(Reg::Rsp, 0));
                self.asm.mov32_ri(ARG[4], argc);
                self.call_helper(rt::krait_rt_call_value as usize);
            }
            _ => return Err(self.unsupported("uncallable base expression")),
        }
        self.check_exceptions();
        Ok(())
    }

    fn lower_construct(
        &mut self,
        base: &Expr,
        args: &[Expr],
        result: Option<i32>,
    ) -> Result<(), CompileError> {
        let argc = self.marshal_arguments(args)?;
        match base {
            Expr::Name(name) => {
                let name_bits = self.identifier_bits(name);
                self.load_context_arg();
                self.load_result_arg(result);
                self.asm.mov_ri64(ARG[2], name_bits);
                self.asm.lea(ARG[3], Address::new(Reg::Rsp, 0));
                self.asm.mov32_ri(ARG[4], argc);
                self.call_helper(rt::krait_rt_construct_activation_property as usize);
            }
            Expr::Member { base, name } => {
                let Expr::Temp(base) = &**base else {
                    return Err(self.unsupported("constructor base is not a temp"));
                };
                let name_bits = self.identifier_bits(name);
                self.load_context_arg();
                self.load_result_arg(result);
                self.load_temp_address(ARG[2], *base);
                self.asm.mov_ri64(ARG[3], name_bits);
                self.asm.lea(ARG[4], Address::new(Reg::Rsp, 0));
                self.asm.mov32_ri(ARG[5], argc);
                self.call_helper(rt::krait_rt_construct_property as usize);
            }
            Expr::Temp(index) => {
                self.load_context_arg();
                self.load_result_arg(result);
                self.load_temp_address(ARG[2], *index);
                self.asm.lea(ARG[3], Address::new(Reg::Rsp, 0));
                self.asm.mov32_ri(ARG[4], argc);
                self.call_helper(rt::krait_rt_construct_value as usize);
            }
            _ => return Err(self.unsupported("unconstructible base expression")),
        }
        self.check_exceptions();
        Ok(())
    }

    // ---- builtins ------------------------------------------------------

    fn lower_builtin(
        &mut self,
        builtin: Builtin,
        args: &[Expr],
        result: Option<i32>,
    ) -> Result<(), CompileError> {
        match builtin {
            Builtin::Typeof => {
                self.load_context_arg();
                self.load_result_arg(result);
                self.operand_ptr(ARG[2], self.single_arg(args)?, 0)?;
                self.call_helper(rt::krait_rt_builtin_typeof as usize);
            }
            Builtin::Delete => self.lower_delete(self.single_arg(args)?, result)?,
            Builtin::Throw => {
                self.load_context_arg();
                self.operand_ptr(ARG[1], self.single_arg(args)?, 0)?;
                self.call_helper(rt::krait_rt_builtin_throw as usize);
                self.check_exceptions();
            }
            Builtin::CreateExceptionHandler => {
                self.load_context_arg();
                self.load_result_arg(result);
                self.call_helper(rt::krait_rt_builtin_create_exception_handler as usize);
            }
            Builtin::DeleteExceptionHandler => {
                self.load_context_arg();
                self.call_helper(rt::krait_rt_builtin_delete_exception_handler as usize);
            }
            Builtin::GetException => {
                self.load_context_arg();
                self.load_result_arg(result);
                self.call_helper(rt::krait_rt_builtin_get_exception as usize);
            }
            Builtin::ForeachIteratorObject => {
                self.load_context_arg();
                self.load_result_arg(result);
                self.operand_ptr(ARG[2], self.single_arg(args)?, 0)?;
                self.call_helper(rt::krait_rt_builtin_foreach_iterator_object as usize);
            }
            Builtin::ForeachNextPropertyName => {
                self.load_context_arg();
                self.load_result_arg(result);
                self.operand_ptr(ARG[2], self.single_arg(args)?, 0)?;
                self.call_helper(rt::krait_rt_builtin_foreach_next_property_name as usize);
            }
            Builtin::PushWith => {
                self.load_context_arg();
                self.operand_ptr(ARG[1], self.single_arg(args)?, 0)?;
                self.call_helper(rt::krait_rt_builtin_push_with as usize);
                self.check_exceptions();
            }
            Builtin::PopWith => {
                self.load_context_arg();
                self.call_helper(rt::krait_rt_builtin_pop_with as usize);
            }
            Builtin::DeclareVars => {
                let Some((deletable, names)) = args.split_first() else {
                    return Ok(());
                };
                let Expr::Const(Const::Bool(deletable)) = deletable else {
                    return Err(self.unsupported("declare_vars deletable flag is not a bool"));
                };
                for name in names {
                    let Expr::Name(name) = name else {
                        return Err(self.unsupported("declare_vars operand is not a name"));
                    };
                    let name_bits = self.identifier_bits(name);
                    self.load_context_arg();
                    self.asm.mov32_ri(ARG[1], u32::from(*deletable));
                    self.asm.mov_ri64(ARG[2], name_bits);
                    self.call_helper(rt::krait_rt_builtin_declare_var as usize);
                }
            }
        }
        Ok(())
    }

    fn lower_delete(&mut self, target: &Expr, result: Option<i32>) -> Result<(), CompileError> {
        match target {
            Expr::Member { base, name } => {
                let Expr::Temp(base) = &**base else {
                    return Err(self.unsupported("delete base is not a temp"));
                };
                let name_bits = self.identifier_bits(name);
                self.load_context_arg();
                self.load_result_arg(result);
                self.load_temp_address(ARG[2], *base);
                self.asm.mov_ri64(ARG[3], name_bits);
                self.call_helper(rt::krait_rt_delete_member as usize);
                self.check_exceptions();
            }
            Expr::Subscript { base, index } => {
                self.load_context_arg();
                self.load_result_arg(result);
                self.operand_ptr(ARG[2], base, 0)?;
                self.operand_ptr(ARG[3], index, 1)?;
                self.call_helper(rt::krait_rt_delete_subscript as usize);
                self.check_exceptions();
            }
            Expr::Name(name) => {
                let name_bits = self.identifier_bits(name);
                self.load_context_arg();
                self.load_result_arg(result);
                self.asm.mov_ri64(ARG[2], name_bits);
                self.call_helper(rt::krait_rt_delete_name as usize);
                self.check_exceptions();
            }
            Expr::Temp(_) => {
                // Deleting a resolved local is a no-op that yields false.
                if let Some(result) = result {
                    let address = self.temp_address(SCRATCH_REGISTER, result);
                    self.asm
                        .mov_ri64(VALUE_REGISTER, Value::from_boolean(false).bits());
                    self.asm.store(address, VALUE_REGISTER);
                }
            }
            _ => return Err(self.unsupported("undeletable expression")),
        }
        Ok(())
    }

    fn single_arg<'e>(&self, args: &'e [Expr]) -> Result<&'e Expr, CompileError> {
        args.first()
            .ok_or_else(|| self.unsupported("builtin call is missing its argument"))
    }
}

// ---- operator tables ---------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InlineAlu {
    And,
    Or,
    Xor,
    Add,
    Sub,
    Mul,
    Shl,
    Sar,
}

/// The operators with an inline register variant.
fn inline_alu(op: AluOp) -> Option<InlineAlu> {
    match op {
        AluOp::BitAnd => Some(InlineAlu::And),
        AluOp::BitOr => Some(InlineAlu::Or),
        AluOp::BitXor => Some(InlineAlu::Xor),
        AluOp::Add => Some(InlineAlu::Add),
        AluOp::Sub => Some(InlineAlu::Sub),
        AluOp::Mul => Some(InlineAlu::Mul),
        AluOp::Shl => Some(InlineAlu::Shl),
        AluOp::Shr => Some(InlineAlu::Sar),
        _ => None,
    }
}

fn is_arithmetic(op: AluOp) -> bool {
    matches!(
        op,
        AluOp::BitAnd
            | AluOp::BitOr
            | AluOp::BitXor
            | AluOp::Add
            | AluOp::Sub
            | AluOp::Mul
            | AluOp::Div
            | AluOp::Mod
            | AluOp::Shl
            | AluOp::Shr
            | AluOp::UShr
    )
}

/// A constant operand, if it converts losslessly to an int32.
fn integer_constant(expr: &Expr) -> Option<i32> {
    let mut value = match expr.as_const()? {
        Const::Number(n) => Value::from_double(n),
        _ => return None,
    };
    if value.try_integer_conversion() {
        value.as_int32()
    } else {
        None
    }
}

fn number_constant(expr: &Expr) -> Option<f64> {
    match expr.as_const()? {
        Const::Number(n) => Some(n),
        _ => None,
    }
}

/// Signed condition for the integer comparison fast path.
fn integer_condition(op: AluOp) -> Option<Condition> {
    match op {
        AluOp::Gt => Some(Condition::Greater),
        AluOp::Lt => Some(Condition::Less),
        AluOp::Ge => Some(Condition::GreaterOrEqual),
        AluOp::Le => Some(Condition::LessOrEqual),
        AluOp::Eq | AluOp::StrictEq => Some(Condition::Equal),
        AluOp::Ne | AluOp::StrictNe => Some(Condition::NotEqual),
        _ => None,
    }
}

fn binop_helper(op: AluOp) -> usize {
    match op {
        AluOp::BitAnd => rt::krait_rt_bit_and as usize,
        AluOp::BitOr => rt::krait_rt_bit_or as usize,
        AluOp::BitXor => rt::krait_rt_bit_xor as usize,
        AluOp::Add => rt::krait_rt_add as usize,
        AluOp::Sub => rt::krait_rt_sub as usize,
        AluOp::Mul => rt::krait_rt_mul as usize,
        AluOp::Div => rt::krait_rt_div as usize,
        AluOp::Mod => rt::krait_rt_mod as usize,
        AluOp::Shl => rt::krait_rt_shl as usize,
        AluOp::Shr => rt::krait_rt_shr as usize,
        AluOp::UShr => rt::krait_rt_ushr as usize,
        AluOp::Gt => rt::krait_rt_gt as usize,
        AluOp::Lt => rt::krait_rt_lt as usize,
        AluOp::Ge => rt::krait_rt_ge as usize,
        AluOp::Le => rt::krait_rt_le as usize,
        AluOp::Eq => rt::krait_rt_eq as usize,
        AluOp::Ne => rt::krait_rt_ne as usize,
        AluOp::StrictEq => rt::krait_rt_se as usize,
        AluOp::StrictNe => rt::krait_rt_sne as usize,
        AluOp::InstanceOf => rt::krait_rt_instanceof as usize,
        AluOp::In => rt::krait_rt_in as usize,
    }
}

fn compare_helper(op: AluOp) -> usize {
    match op {
        AluOp::Gt => rt::krait_rt_cmp_gt as usize,
        AluOp::Lt => rt::krait_rt_cmp_lt as usize,
        AluOp::Ge => rt::krait_rt_cmp_ge as usize,
        AluOp::Le => rt::krait_rt_cmp_le as usize,
        AluOp::Eq => rt::krait_rt_cmp_eq as usize,
        AluOp::Ne => rt::krait_rt_cmp_ne as usize,
        AluOp::StrictEq => rt::krait_rt_cmp_se as usize,
        AluOp::StrictNe => rt::krait_rt_cmp_sne as usize,
        AluOp::InstanceOf => rt::krait_rt_cmp_instanceof as usize,
        AluOp::In => rt::krait_rt_cmp_in as usize,
        _ => binop_helper(op),
    }
}

fn inplace_name_helper(op: AluOp) -> usize {
    match op {
        AluOp::BitAnd => rt::krait_rt_inplace_bit_and_name as usize,
        AluOp::BitOr => rt::krait_rt_inplace_bit_or_name as usize,
        AluOp::BitXor => rt::krait_rt_inplace_bit_xor_name as usize,
        AluOp::Add => rt::krait_rt_inplace_add_name as usize,
        AluOp::Sub => rt::krait_rt_inplace_sub_name as usize,
        AluOp::Mul => rt::krait_rt_inplace_mul_name as usize,
        AluOp::Div => rt::krait_rt_inplace_div_name as usize,
        AluOp::Mod => rt::krait_rt_inplace_mod_name as usize,
        AluOp::Shl => rt::krait_rt_inplace_shl_name as usize,
        AluOp::Shr => rt::krait_rt_inplace_shr_name as usize,
        AluOp::UShr => rt::krait_rt_inplace_ushr_name as usize,
        _ => unreachable!("checked by is_arithmetic"),
    }
}

fn inplace_element_helper(op: AluOp) -> usize {
    match op {
        AluOp::BitAnd => rt::krait_rt_inplace_bit_and_element as usize,
        AluOp::BitOr => rt::krait_rt_inplace_bit_or_element as usize,
        AluOp::BitXor => rt::krait_rt_inplace_bit_xor_element as usize,
        AluOp::Add => rt::krait_rt_inplace_add_element as usize,
        AluOp::Sub => rt::krait_rt_inplace_sub_element as usize,
        AluOp::Mul => rt::krait_rt_inplace_mul_element as usize,
        AluOp::Div => rt::krait_rt_inplace_div_element as usize,
        AluOp::Mod => rt::krait_rt_inplace_mod_element as usize,
        AluOp::Shl => rt::krait_rt_inplace_shl_element as usize,
        AluOp::Shr => rt::krait_rt_inplace_shr_element as usize,
        AluOp::UShr => rt::krait_rt_inplace_ushr_element as usize,
        _ => unreachable!("checked by is_arithmetic"),
    }
}

fn inplace_member_helper(op: AluOp) -> usize {
    match op {
        AluOp::BitAnd => rt::krait_rt_inplace_bit_and_member as usize,
        AluOp::BitOr => rt::krait_rt_inplace_bit_or_member as usize,
        AluOp::BitXor => rt::krait_rt_inplace_bit_xor_member as usize,
        AluOp::Add => rt::krait_rt_inplace_add_member as usize,
        AluOp::Sub => rt::krait_rt_inplace_sub_member as usize,
        AluOp::Mul => rt::krait_rt_inplace_mul_member as usize,
        AluOp::Div => rt::krait_rt_inplace_div_member as usize,
        AluOp::Mod => rt::krait_rt_inplace_mod_member as usize,
        AluOp::Shl => rt::krait_rt_inplace_shl_member as usize,
        AluOp::Shr => rt::krait_rt_inplace_shr_member as usize,
        AluOp::UShr => rt::krait_rt_inplace_ushr_member as usize,
        _ => unreachable!("checked by is_arithmetic"),
    }
}
