//! Per-procedure emission state (§4.9.2/§4.9.3): the in-progress
//! `Function`, its `BlockNamer`, a per-procedure SSA id counter, the
//! scan pass's variable/array/label tables, and the stack-slot map
//! allocated for each.

use std::collections::BTreeMap;

use il_core::{BasicBlock, BlockParam, Function, Instr, Opcode, Param, Type, Value};
use il_support::SourceLoc;

use crate::ast::{BasicType, GotoTarget};
use crate::block_namer::BlockNamer;
use crate::scan::ScanInfo;

pub fn to_il_type(ty: BasicType) -> Type {
    match ty {
        BasicType::Int => Type::I64,
        BasicType::Float => Type::F64,
        BasicType::Str => Type::Str,
    }
}

/// Tracks which runtime externs lowering has required, across every
/// procedure in the module; `il_lower::lower_program` materializes one
/// `Extern` per name actually used (§4.9.2: "exactly the helpers used,
/// no more").
#[derive(Debug, Default)]
pub struct HelperUse {
    pub names: std::collections::BTreeSet<&'static str>,
}

pub struct LoweringContext<'a> {
    pub helpers: &'a mut HelperUse,
    /// Declared return type of every procedure in the program, by name;
    /// used to type a `Call` instruction's result without needing the
    /// callee's body (§4.9.4).
    pub declared_ret: &'a BTreeMap<String, Type>,
    pub scan: ScanInfo,
    pub function: Function,
    pub current: usize,
    next_id: u32,
    namer: BlockNamer,
    pub slots: BTreeMap<String, Value>,
    pub array_slots: BTreeMap<String, Value>,
    pub labels: BTreeMap<GotoTarget, usize>,
    pub cur_loc: SourceLoc,
}

impl<'a> LoweringContext<'a> {
    pub fn new(
        helpers: &'a mut HelperUse,
        declared_ret: &'a BTreeMap<String, Type>,
        scan: ScanInfo,
        name: impl Into<String>,
        ret_ty: Type,
        params: Vec<Param>,
    ) -> Self {
        let mut function = Function { name: name.into(), ret_ty, params, blocks: Vec::new() };
        function.blocks.push(BasicBlock::new("entry"));
        let mut ctx = Self {
            helpers,
            declared_ret,
            scan,
            function,
            current: 0,
            next_id: 0,
            namer: BlockNamer::new(),
            slots: BTreeMap::new(),
            array_slots: BTreeMap::new(),
            labels: BTreeMap::new(),
            cur_loc: SourceLoc::UNKNOWN,
        };
        // The entry block's own parameters carry the incoming argument
        // values as SSA ids; `Function.params` is just the declared
        // name/type signature and is never itself SSA-numbered.
        let param_types: Vec<Type> = ctx.function.params.iter().map(|p| p.ty).collect();
        for ty in param_types {
            ctx.add_block_param(0, ty);
        }
        ctx
    }

    pub fn fresh_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn new_block(&mut self, hint: &'static str) -> usize {
        let label = self.namer.name(hint);
        self.function.blocks.push(BasicBlock::new(label));
        self.function.blocks.len() - 1
    }

    pub fn block_label(&self, idx: usize) -> String {
        self.function.blocks[idx].label.clone()
    }

    /// Appends a fresh block parameter to `block` and returns its id, for
    /// joining short-circuit `AND`/`OR` branches (§4.9.4) and loop
    /// induction variables (§4.9.5).
    pub fn add_block_param(&mut self, block: usize, ty: Type) -> u32 {
        let id = self.fresh_id();
        self.function.blocks[block].params.push(BlockParam { id, ty });
        id
    }

    pub fn switch_to(&mut self, idx: usize) {
        self.current = idx;
    }

    pub fn is_terminated(&self) -> bool {
        self.function.blocks[self.current].is_terminated()
    }

    /// Opens a fresh block and switches to it if the current block has
    /// already been terminated (e.g. by a `GOTO` or `RETURN` with more
    /// statements of the source list still to lower); those statements
    /// become unreachable code, which `reachability_cleanup` (§4.8.6)
    /// later deletes.
    pub fn ensure_open(&mut self) {
        if self.is_terminated() {
            let idx = self.new_block("unreachable");
            self.switch_to(idx);
        }
    }

    pub fn push(&mut self, mut instr: Instr) {
        instr.loc = self.cur_loc;
        self.function.blocks[self.current].push(instr);
    }

    pub fn emit_helper(&mut self, name: &'static str) {
        self.helpers.names.insert(name);
    }

    pub fn call(&mut self, callee: &'static str, ret_ty: Type, args: Vec<Value>) -> Value {
        self.emit_helper(callee);
        let id = self.fresh_id();
        self.push(Instr::new(Opcode::Call).with_callee(callee).with_result(id, ret_ty).with_operands(args));
        Value::Temp(id, ret_ty)
    }

    pub fn call_void(&mut self, callee: &'static str, args: Vec<Value>) {
        self.emit_helper(callee);
        self.push(Instr::new(Opcode::Call).with_callee(callee).with_operands(args));
    }

    /// Allocates one stack slot in the entry block (§4.9.3). Must run
    /// before any statement is lowered.
    pub fn alloc_slot(&mut self) -> Value {
        let id = self.fresh_id();
        let entry_instr = Instr::new(Opcode::Alloca).with_result(id, Type::Ptr).with_operands(vec![Value::ConstInt(8, Type::I64)]);
        self.function.blocks[0].push(entry_instr);
        Value::Temp(id, Type::Ptr)
    }

    pub fn load(&mut self, slot: &Value, ty: Type) -> Value {
        let id = self.fresh_id();
        self.push(Instr::new(Opcode::Load).with_result(id, ty).with_operands(vec![slot.clone()]));
        Value::Temp(id, ty)
    }

    pub fn store(&mut self, slot: &Value, value: Value) {
        self.push(Instr::new(Opcode::Store).with_operands(vec![slot.clone(), value]));
    }

    pub fn br(&mut self, target: usize, args: Vec<Value>) {
        let label = self.block_label(target);
        self.push(Instr::new(Opcode::Br).with_successor(label, args));
    }

    pub fn cbr(&mut self, cond: Value, then_target: usize, then_args: Vec<Value>, else_target: usize, else_args: Vec<Value>) {
        let then_label = self.block_label(then_target);
        let else_label = self.block_label(else_target);
        self.push(Instr::new(Opcode::CBr).with_operands(vec![cond]).with_successor(then_label, then_args).with_successor(else_label, else_args));
    }
}
