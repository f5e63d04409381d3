//! AST -> x86-64 lowering: walks a parsed [`Program`] and emits a single
//! executable page holding every declared function plus the implicit
//! nullary top-level function, wired together with [`Assembler`]'s
//! relocation primitives.
//!
//! Two divergences worth calling out up front, recorded in `DESIGN.md`:
//!
//! - Binary and unary operators call the `vanarize-runtime` host helpers
//!   (`Runtime_Add`, `Runtime_Sub`, ...) instead of emitting raw `ADD`/`SUB`
//!   on the NaN-boxed bit pattern. Integer arithmetic on an IEEE-754 bit
//!   pattern does not compute the sum of the two doubles it represents, and
//!   this assembler has no floating-point instructions - so every operator
//!   that can touch a number must decode through `Value::as_f64`.
//! - Parameters are homed to negative, callee-frame stack slots in the
//!   prologue rather than read from positive `[RBP+16+...]` offsets: the
//!   System V AMD64 register-passing ABI has no caller-pushed stack
//!   arguments to address that way.

use std::collections::HashMap;

use vanarize_par::ast::{
    BinOp, Expr, ForStmt, FunctionDecl, IfStmt, Item, Literal, Program, Stmt, StructDecl, Type,
    UnOp, VarDecl,
};
use vanarize_runtime::{Value, VAL_FALSE, VAL_NIL};
use vanarize_util::Symbol;

use crate::asm::{Assembler, Cond, Reg};
use crate::error::{CodeGenError, Result};
use crate::exec::{ExecBuffer, JitConfig};

/// The four registers this assembler can address doubling as the argument
/// registers a call site fills, in System V order - `TooManyParameters`
/// exists precisely because there is no fifth entry here.
const ARG_REGS: [Reg; 4] = [Reg::Rdi, Reg::Rsi, Reg::Rdx, Reg::Rcx];

/// Scratch register reserved solely for stack-alignment padding. Never
/// carries a live value across a call, so clobbering it is always safe.
const PAD_REG: Reg = Reg::Rbx;

/// A compiled program: the executable page plus the offset its nullary
/// entry point starts at.
pub struct CompiledProgram {
    exec: ExecBuffer,
    entry_offset: usize,
}

impl CompiledProgram {
    /// Run the program to completion and return whatever its last `return`
    /// (or the implicit `return nil` at the end of the top level) left
    /// behind.
    ///
    /// # Safety boundary
    /// This calls directly into JIT'd machine code with no further
    /// validation - the only guarantee is that `compile` produced bytes for
    /// exactly the ABI this function assumes.
    pub fn call(&self) -> Value {
        let entry = unsafe { self.exec.entry_fn(self.entry_offset) };
        Value(entry())
    }
}

/// The synthetic name of the implicit top-level function. Not a string the
/// lexer can ever produce as an identifier, so it can never collide with a
/// user declaration.
fn top_level_name() -> Symbol {
    Symbol::intern("<top-level>")
}

/// Where a patched `CALL` target or data pointer resolves to once the final
/// executable page address is known.
enum PatchTarget {
    Function(Symbol),
    StringData(usize),
}

/// One function activation's stack frame: every local variable, parameter,
/// and compiler-introduced temporary gets a fixed, negative `RBP`-relative
/// slot, assigned once up front.
struct Frame {
    locals: HashMap<Symbol, i32>,
    types: HashMap<Symbol, Type>,
    next_index: i32,
    total_slots: i32,
    frame_size: i32,
}

impl Frame {
    fn empty() -> Self {
        Frame { locals: HashMap::new(), types: HashMap::new(), next_index: 0, total_slots: 0, frame_size: 0 }
    }

    /// Hand out the next unused slot. Every call site that can run is
    /// accounted for ahead of time by [`slots_needed`], so running out here
    /// means that count and this allocator have drifted apart.
    fn alloc_slot(&mut self) -> Result<i32> {
        if self.next_index >= self.total_slots {
            return Err(CodeGenError::Unsupported(
                "function body needs more stack slots than its frame reserved".into(),
            ));
        }
        let disp = -8 * (self.next_index + 1);
        self.next_index += 1;
        Ok(disp)
    }
}

fn round_up_16(n: i32) -> i32 {
    (n + 15) & !15
}

/// Count the stack slots a function body will need: one per parameter (the
/// caller adds those), one per `var` declaration, and one or more for each
/// expression that needs a temporary to survive a nested call (struct and
/// array literals, and the two mutating accessors). Computed once, before
/// any code is emitted, so the prologue's single `SUB RSP` can reserve the
/// whole frame up front.
fn slots_needed_block(block: &[Stmt]) -> i32 {
    block.iter().map(slots_needed_stmt).sum()
}

fn slots_needed_stmt(stmt: &Stmt) -> i32 {
    match stmt {
        Stmt::VarDecl(vd) => 1 + vd.init.as_ref().map_or(0, slots_needed_expr),
        Stmt::Expr(e) => slots_needed_expr(e),
        Stmt::Return(Some(e), _) => slots_needed_expr(e),
        Stmt::Return(None, _) => 0,
        Stmt::If(s) => {
            slots_needed_expr(&s.cond)
                + slots_needed_block(&s.then_branch)
                + s.else_branch.as_ref().map_or(0, |b| slots_needed_block(b))
        }
        Stmt::For(s) => {
            s.init.as_ref().map_or(0, |i| slots_needed_stmt(i))
                + s.cond.as_ref().map_or(0, slots_needed_expr)
                + s.incr.as_ref().map_or(0, slots_needed_expr)
                + slots_needed_block(&s.body)
        }
        Stmt::Block(b, _) => slots_needed_block(b),
    }
}

fn slots_needed_expr(expr: &Expr) -> i32 {
    match expr {
        Expr::Literal(..) | Expr::Identifier(..) => 0,
        Expr::ArrayLiteral(elems, _) => 1 + elems.iter().map(slots_needed_expr).sum::<i32>(),
        Expr::StructInit { fields, .. } => {
            1 + fields.iter().map(|(_, e)| slots_needed_expr(e)).sum::<i32>()
        }
        Expr::Unary { expr, .. } => slots_needed_expr(expr),
        Expr::Binary { lhs, rhs, .. } => slots_needed_expr(lhs) + slots_needed_expr(rhs),
        Expr::Call { callee, args, .. } => {
            slots_needed_expr(callee) + args.iter().map(slots_needed_expr).sum::<i32>()
        }
        Expr::Print { arg, .. } => slots_needed_expr(arg),
        Expr::Await { expr, .. } => slots_needed_expr(expr),
        Expr::PropertyGet { object, .. } => slots_needed_expr(object),
        Expr::PropertySet { object, value, .. } => 2 + slots_needed_expr(object) + slots_needed_expr(value),
        Expr::IndexGet { object, index, .. } => 1 + slots_needed_expr(object) + slots_needed_expr(index),
        Expr::IndexSet { object, index, value, .. } => {
            3 + slots_needed_expr(object) + slots_needed_expr(index) + slots_needed_expr(value)
        }
        Expr::Assign { value, .. } => slots_needed_expr(value),
    }
}

struct Codegen<'a> {
    asm: Assembler,
    functions: HashMap<Symbol, &'a FunctionDecl>,
    structs: HashMap<Symbol, &'a StructDecl>,
    function_offsets: HashMap<Symbol, usize>,
    pending: Vec<(usize, PatchTarget)>,
    strings: Vec<Vec<u8>>,
    /// Net 8-byte pushes outstanding since the current function's prologue
    /// finished `SUB RSP`, which leaves `RSP` 16-byte aligned at depth 0.
    sp_depth: i64,
    frame: Frame,
}

/// Lower a parsed program into an executable, callable entry point.
pub fn compile(program: &Program) -> Result<CompiledProgram> {
    let mut functions = HashMap::new();
    let mut structs = HashMap::new();
    let mut top_stmts = Vec::new();
    for item in program {
        match item {
            Item::Function(f) => {
                functions.insert(f.name, f);
            }
            Item::Struct(s) => {
                structs.insert(s.name, s);
            }
            Item::TopStmt(stmt) => top_stmts.push(stmt.clone()),
        }
    }

    let mut cg = Codegen {
        asm: Assembler::new(),
        functions,
        structs,
        function_offsets: HashMap::new(),
        pending: Vec::new(),
        strings: Vec::new(),
        sp_depth: 0,
        frame: Frame::empty(),
    };

    for item in program {
        if let Item::Function(f) = item {
            cg.lower_function(f)?;
        }
    }

    let top_level = FunctionDecl {
        name: top_level_name(),
        is_async: false,
        params: Vec::new(),
        ret_type: None,
        body: top_stmts,
        span: vanarize_util::Span::DUMMY,
    };
    cg.lower_function(&top_level)?;
    let entry_offset = cg.function_offsets[&top_level_name()];

    let mut string_offsets = Vec::with_capacity(cg.strings.len());
    for bytes in &cg.strings {
        string_offsets.push(cg.asm.emit_data(bytes));
    }

    let config = JitConfig::default();
    let mut exec = ExecBuffer::alloc(cg.asm.len(), &config)?;
    let base = exec.address_of(0);

    for (patch_offset, target) in &cg.pending {
        let resolved = match target {
            PatchTarget::Function(name) => *cg
                .function_offsets
                .get(name)
                .ok_or_else(|| CodeGenError::UndefinedFunction(name.as_str().to_string()))?,
            PatchTarget::StringData(idx) => string_offsets[*idx],
        };
        cg.asm.patch64(*patch_offset, base + resolved as u64)?;
    }

    exec.write(cg.asm.bytes());
    exec.protect_exec(&config)?;

    Ok(CompiledProgram { exec, entry_offset })
}

impl<'a> Codegen<'a> {
    fn lower_function(&mut self, f: &FunctionDecl) -> Result<()> {
        if f.is_async {
            return Err(CodeGenError::UnsupportedAsync);
        }
        if f.params.len() > ARG_REGS.len() {
            return Err(CodeGenError::TooManyParameters(f.name.as_str().to_string(), f.params.len()));
        }

        self.function_offsets.insert(f.name, self.asm.len());

        let mut locals = HashMap::new();
        let mut types = HashMap::new();
        for (i, p) in f.params.iter().enumerate() {
            let disp = -8 * (i as i32 + 1);
            locals.insert(p.name, disp);
            types.insert(p.name, p.ty.clone());
        }
        let param_slots = f.params.len() as i32;
        let total_slots = param_slots + slots_needed_block(&f.body);
        let frame_size = round_up_16(8 * total_slots);

        self.frame = Frame { locals, types, next_index: param_slots, total_slots, frame_size };
        self.sp_depth = 0;

        self.asm.push(Reg::Rbp)?;
        self.asm.mov_reg_reg(Reg::Rbp, Reg::Rsp)?;
        if frame_size > 0 {
            self.asm.add_reg_imm32(Reg::Rsp, -frame_size)?;
        }

        // Every reserved slot starts out a valid `Value` (nil) before any
        // root is registered against it, so a collection triggered before a
        // later-declared local's first assignment never traces garbage
        // stack bytes as a pointer.
        for i in 0..total_slots {
            let disp = -8 * (i + 1);
            self.asm.mov_reg_imm64(Reg::Rax, VAL_NIL.0)?;
            self.asm.mov_mem_reg(Reg::Rbp, disp, Reg::Rax)?;
        }
        for i in 0..total_slots {
            self.emit_register_root(-8 * (i + 1))?;
        }

        for (i, p) in f.params.iter().enumerate() {
            let disp = self.frame.locals[&p.name];
            self.asm.mov_mem_reg(Reg::Rbp, disp, ARG_REGS[i])?;
        }

        self.lower_block(&f.body)?;

        // Implicit `return nil` for a body that falls off its end - except
        // at the top level, where a trailing expression statement's value
        // (already sitting in RAX from `lower_block`) becomes the program's
        // result instead of being clobbered, matching
        // `examples/original_source/Source/Jit/CodeGen.c`'s top-level
        // function, which has no implicit nil at all.
        let top_level_falls_through_an_expr =
            f.name == top_level_name() && matches!(f.body.last(), Some(Stmt::Expr(_)));
        if !top_level_falls_through_an_expr {
            self.asm.mov_reg_imm64(Reg::Rax, VAL_NIL.0)?;
        }
        self.emit_function_exit()?;

        Ok(())
    }

    fn emit_function_exit(&mut self) -> Result<()> {
        self.asm.push(Reg::Rax)?;
        self.sp_depth += 1;
        for i in 0..self.frame.total_slots {
            self.emit_unregister_root(-8 * (i + 1))?;
        }
        self.asm.pop(Reg::Rax)?;
        self.sp_depth -= 1;

        self.asm.mov_reg_reg(Reg::Rsp, Reg::Rbp)?;
        self.asm.pop(Reg::Rbp)?;
        self.asm.ret();
        Ok(())
    }

    fn emit_register_root(&mut self, disp: i32) -> Result<()> {
        self.asm.mov_reg_reg(Reg::Rdi, Reg::Rbp)?;
        self.asm.add_reg_imm32(Reg::Rdi, disp)?;
        self.emit_call(vanarize_runtime::GC_RegisterRoot as usize as u64)
    }

    fn emit_unregister_root(&mut self, disp: i32) -> Result<()> {
        self.asm.mov_reg_reg(Reg::Rdi, Reg::Rbp)?;
        self.asm.add_reg_imm32(Reg::Rdi, disp)?;
        self.emit_call(vanarize_runtime::GC_UnregisterRoot as usize as u64)
    }

    /// Emit `MOV RAX, imm64(addr); CALL RAX`, padding the stack with one
    /// dummy push first if the call would otherwise land misaligned.
    fn emit_call(&mut self, addr: u64) -> Result<()> {
        let padded = self.sp_depth % 2 != 0;
        if padded {
            self.asm.push(PAD_REG)?;
            self.sp_depth += 1;
        }
        self.asm.mov_reg_imm64(Reg::Rax, addr)?;
        self.asm.call_reg(Reg::Rax)?;
        if padded {
            self.asm.pop(PAD_REG)?;
            self.sp_depth -= 1;
        }
        Ok(())
    }

    /// Same as [`Codegen::emit_call`], but the address isn't known yet - a
    /// forward reference to a user function or to embedded string data -
    /// so it's recorded for the relocation pass at the end of [`compile`].
    fn emit_call_pending(&mut self, target: PatchTarget) -> Result<()> {
        let padded = self.sp_depth % 2 != 0;
        if padded {
            self.asm.push(PAD_REG)?;
            self.sp_depth += 1;
        }
        let patch_offset = self.asm.mov_reg_imm64_patchable(Reg::Rax, 0)?;
        self.pending.push((patch_offset, target));
        self.asm.call_reg(Reg::Rax)?;
        if padded {
            self.asm.pop(PAD_REG)?;
            self.sp_depth -= 1;
        }
        Ok(())
    }

    fn lower_block(&mut self, block: &[Stmt]) -> Result<()> {
        for stmt in block {
            self.lower_stmt(stmt)?;
        }
        Ok(())
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::VarDecl(vd) => self.lower_var_decl(vd),
            Stmt::Expr(e) => self.lower_expr(e),
            Stmt::Return(expr, _) => {
                match expr {
                    Some(e) => self.lower_expr(e)?,
                    None => {
                        self.asm.mov_reg_imm64(Reg::Rax, VAL_NIL.0)?;
                    }
                }
                self.emit_function_exit()
            }
            Stmt::If(s) => self.lower_if(s),
            Stmt::For(s) => self.lower_for(s),
            Stmt::Block(b, _) => self.lower_block(b),
        }
    }

    fn lower_var_decl(&mut self, vd: &VarDecl) -> Result<()> {
        match &vd.init {
            Some(e) => self.lower_expr(e)?,
            None => {
                self.asm.mov_reg_imm64(Reg::Rax, VAL_NIL.0)?;
            }
        }
        let disp = self.frame.alloc_slot()?;
        self.frame.locals.insert(vd.name, disp);
        self.frame.types.insert(vd.name, vd.ty.clone());
        self.asm.mov_mem_reg(Reg::Rbp, disp, Reg::Rax)?;
        Ok(())
    }

    fn lower_if(&mut self, s: &IfStmt) -> Result<()> {
        self.lower_expr(&s.cond)?;
        self.asm.mov_reg_imm64(Reg::Rcx, VAL_FALSE.0)?;
        self.asm.cmp_reg_reg(Reg::Rax, Reg::Rcx)?;
        let je_patch = self.asm.jcc(Cond::Eq);

        self.lower_block(&s.then_branch)?;
        let jmp_patch = self.asm.jmp();

        let else_label = self.asm.len();
        self.asm.patch32(je_patch, else_label)?;
        if let Some(else_branch) = &s.else_branch {
            self.lower_block(else_branch)?;
        }

        let end_label = self.asm.len();
        self.asm.patch32(jmp_patch, end_label)?;
        Ok(())
    }

    fn lower_for(&mut self, s: &ForStmt) -> Result<()> {
        if let Some(init) = &s.init {
            self.lower_stmt(init)?;
        }

        let loop_top = self.asm.len();
        let exit_patch = match &s.cond {
            Some(cond) => {
                self.lower_expr(cond)?;
                self.asm.mov_reg_imm64(Reg::Rcx, VAL_FALSE.0)?;
                self.asm.cmp_reg_reg(Reg::Rax, Reg::Rcx)?;
                Some(self.asm.jcc(Cond::Eq))
            }
            None => None,
        };

        self.lower_block(&s.body)?;
        if let Some(incr) = &s.incr {
            self.lower_expr(incr)?;
        }

        let back_patch = self.asm.jmp();
        self.asm.patch32(back_patch, loop_top)?;

        if let Some(patch) = exit_patch {
            self.asm.patch32(patch, self.asm.len())?;
        }
        Ok(())
    }

    fn lower_expr(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Literal(lit, _) => self.lower_literal(lit),
            Expr::Identifier(name, _) => self.lower_identifier(*name),
            Expr::ArrayLiteral(elems, _) => self.lower_array_literal(elems),
            Expr::StructInit { name, fields, .. } => self.lower_struct_init(*name, fields),
            Expr::Unary { op, expr, .. } => self.lower_unary(*op, expr),
            Expr::Binary { op, lhs, rhs, .. } => self.lower_binary(*op, lhs, rhs),
            Expr::Call { callee, args, .. } => self.lower_call(callee, args),
            Expr::Print { arg, .. } => self.lower_print(arg),
            Expr::Await { .. } => Err(CodeGenError::UnsupportedAsync),
            Expr::PropertyGet { object, name, .. } => self.lower_property_get(object, *name),
            Expr::PropertySet { object, name, value, .. } => self.lower_property_set(object, *name, value),
            Expr::IndexGet { object, index, .. } => self.lower_index_get(object, index),
            Expr::IndexSet { object, index, value, .. } => self.lower_index_set(object, index, value),
            Expr::Assign { name, value, .. } => self.lower_assign(*name, value),
        }
    }

    fn lower_literal(&mut self, lit: &Literal) -> Result<()> {
        match lit {
            Literal::Number(n) => {
                self.asm.mov_reg_imm64(Reg::Rax, n.to_bits())?;
                Ok(())
            }
            Literal::Bool(b) => {
                self.asm.mov_reg_imm64(Reg::Rax, Value::from_bool(*b).0)?;
                Ok(())
            }
            Literal::Nil => {
                self.asm.mov_reg_imm64(Reg::Rax, VAL_NIL.0)?;
                Ok(())
            }
            Literal::Str(s) => self.lower_string_literal(s),
        }
    }

    /// String data is embedded as inert bytes at the very end of the
    /// buffer (see `compile`'s relocation pass) - every code path through
    /// this function ends in an explicit `RET`/jump, so execution never
    /// falls through into it regardless of where it lands.
    fn lower_string_literal(&mut self, s: &str) -> Result<()> {
        let idx = self.strings.len();
        let len = s.len() as u64;
        self.strings.push(s.as_bytes().to_vec());

        let padded = self.sp_depth % 2 != 0;
        if padded {
            self.asm.push(PAD_REG)?;
            self.sp_depth += 1;
        }
        let patch_offset = self.asm.mov_reg_imm64_patchable(Reg::Rdi, 0)?;
        self.pending.push((patch_offset, PatchTarget::StringData(idx)));
        self.asm.mov_reg_imm64(Reg::Rsi, len)?;
        self.asm.mov_reg_imm64(Reg::Rax, vanarize_runtime::Runtime_NewStringLiteral as usize as u64)?;
        self.asm.call_reg(Reg::Rax)?;
        if padded {
            self.asm.pop(PAD_REG)?;
            self.sp_depth -= 1;
        }
        Ok(())
    }

    fn lower_identifier(&mut self, name: Symbol) -> Result<()> {
        let disp = *self
            .frame
            .locals
            .get(&name)
            .ok_or_else(|| CodeGenError::UndefinedVariable(name.as_str().to_string()))?;
        self.asm.mov_reg_mem(Reg::Rax, Reg::Rbp, disp)?;
        Ok(())
    }

    fn lower_assign(&mut self, name: Symbol, value: &Expr) -> Result<()> {
        self.lower_expr(value)?;
        let disp = *self
            .frame
            .locals
            .get(&name)
            .ok_or_else(|| CodeGenError::UndefinedVariable(name.as_str().to_string()))?;
        self.asm.mov_mem_reg(Reg::Rbp, disp, Reg::Rax)?;
        Ok(())
    }

    fn lower_unary(&mut self, op: UnOp, expr: &Expr) -> Result<()> {
        self.lower_expr(expr)?;
        self.asm.mov_reg_reg(Reg::Rdi, Reg::Rax)?;
        let addr = match op {
            UnOp::Neg => vanarize_runtime::Runtime_Negate as usize as u64,
            UnOp::Not => vanarize_runtime::Runtime_Not as usize as u64,
        };
        self.emit_call(addr)
    }

    fn lower_binary(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr) -> Result<()> {
        self.lower_expr(lhs)?;
        self.asm.push(Reg::Rax)?;
        self.sp_depth += 1;
        self.lower_expr(rhs)?;
        self.asm.pop(Reg::Rcx)?;
        self.sp_depth -= 1;

        self.asm.mov_reg_reg(Reg::Rdi, Reg::Rcx)?;
        self.asm.mov_reg_reg(Reg::Rsi, Reg::Rax)?;
        let addr = match op {
            BinOp::Add => vanarize_runtime::Runtime_Add as usize as u64,
            BinOp::Sub => vanarize_runtime::Runtime_Sub as usize as u64,
            BinOp::Mul => vanarize_runtime::Runtime_Mul as usize as u64,
            BinOp::Div => vanarize_runtime::Runtime_Div as usize as u64,
            BinOp::Eq => vanarize_runtime::Runtime_Equal as usize as u64,
            BinOp::NotEq => vanarize_runtime::Runtime_NotEqual as usize as u64,
            BinOp::Lt => vanarize_runtime::Runtime_Less as usize as u64,
            BinOp::LtEq => vanarize_runtime::Runtime_LessEq as usize as u64,
            BinOp::Gt => vanarize_runtime::Runtime_Greater as usize as u64,
            BinOp::GtEq => vanarize_runtime::Runtime_GreaterEq as usize as u64,
        };
        self.emit_call(addr)
    }

    fn lower_print(&mut self, arg: &Expr) -> Result<()> {
        self.lower_expr(arg)?;
        self.asm.mov_reg_reg(Reg::Rdi, Reg::Rax)?;
        self.emit_call(vanarize_runtime::Native_Print as usize as u64)
    }

    fn lower_call(&mut self, callee: &Expr, args: &[Expr]) -> Result<()> {
        let name = match callee {
            Expr::Identifier(n, _) => *n,
            _ => return Err(CodeGenError::Unsupported("call target must be a plain function name".into())),
        };
        let decl = self
            .functions
            .get(&name)
            .copied()
            .ok_or_else(|| CodeGenError::UndefinedFunction(name.as_str().to_string()))?;
        if args.len() != decl.params.len() {
            return Err(CodeGenError::Unsupported(format!(
                "function '{}' called with {} argument(s), expected {}",
                name.as_str(),
                args.len(),
                decl.params.len()
            )));
        }

        for (i, arg) in args.iter().enumerate() {
            self.lower_expr(arg)?;
            self.asm.mov_reg_reg(ARG_REGS[i], Reg::Rax)?;
            self.asm.push(ARG_REGS[i])?;
            self.sp_depth += 1;
        }
        for i in (0..args.len()).rev() {
            self.asm.pop(ARG_REGS[i])?;
            self.sp_depth -= 1;
        }
        self.emit_call_pending(PatchTarget::Function(name))
    }

    /// Statically resolve an expression's declared [`Type`], following
    /// variable declarations, struct field declarations and function
    /// return types - this runtime has no type checker, but `.name` access
    /// still needs a compile-time field index, and the type annotations
    /// already in the AST are the only place to get one.
    fn infer_type(&self, expr: &Expr) -> Option<Type> {
        match expr {
            Expr::Identifier(name, _) => self.frame.types.get(name).cloned(),
            Expr::PropertyGet { object, name, .. } => {
                let Type::Named(struct_name) = self.infer_type(object)? else { return None };
                let decl = self.structs.get(&struct_name)?;
                decl.fields.iter().find(|f| f.name == *name).map(|f| f.ty.clone())
            }
            Expr::Call { callee, .. } => match &**callee {
                Expr::Identifier(name, _) => self.functions.get(name).and_then(|f| f.ret_type.clone()),
                _ => None,
            },
            Expr::StructInit { name, .. } => Some(Type::Named(*name)),
            _ => None,
        }
    }

    fn resolve_field(&self, object: &Expr, name: Symbol) -> Result<u64> {
        let ty = self.infer_type(object).ok_or_else(|| {
            CodeGenError::Unsupported(format!(
                "cannot resolve the static type of a property access to '{}'",
                name.as_str()
            ))
        })?;
        let Type::Named(struct_name) = ty else {
            return Err(CodeGenError::Unsupported("property access on a non-struct value".into()));
        };
        let decl = self
            .structs
            .get(&struct_name)
            .copied()
            .ok_or_else(|| CodeGenError::UnknownStruct(struct_name.as_str().to_string()))?;
        decl.fields
            .iter()
            .position(|f| f.name == name)
            .map(|i| i as u64)
            .ok_or_else(|| CodeGenError::UnknownField(struct_name.as_str().to_string(), name.as_str().to_string()))
    }

    fn lower_property_get(&mut self, object: &Expr, name: Symbol) -> Result<()> {
        let index = self.resolve_field(object, name)?;
        self.lower_expr(object)?;
        self.asm.mov_reg_reg(Reg::Rdi, Reg::Rax)?;
        self.asm.mov_reg_imm64(Reg::Rsi, index)?;
        self.emit_call(vanarize_runtime::Runtime_GetField as usize as u64)
    }

    fn lower_property_set(&mut self, object: &Expr, name: Symbol, value: &Expr) -> Result<()> {
        let index = self.resolve_field(object, name)?;
        let obj_slot = self.frame.alloc_slot()?;
        let val_slot = self.frame.alloc_slot()?;

        self.lower_expr(object)?;
        self.asm.mov_mem_reg(Reg::Rbp, obj_slot, Reg::Rax)?;
        self.lower_expr(value)?;
        self.asm.mov_mem_reg(Reg::Rbp, val_slot, Reg::Rax)?;

        self.asm.mov_reg_mem(Reg::Rdi, Reg::Rbp, obj_slot)?;
        self.asm.mov_reg_imm64(Reg::Rsi, index)?;
        self.asm.mov_reg_mem(Reg::Rdx, Reg::Rbp, val_slot)?;
        self.emit_call(vanarize_runtime::Runtime_SetField as usize as u64)?;

        self.asm.mov_reg_mem(Reg::Rax, Reg::Rbp, val_slot)?;
        Ok(())
    }

    fn lower_index_get(&mut self, object: &Expr, index: &Expr) -> Result<()> {
        let obj_slot = self.frame.alloc_slot()?;
        self.lower_expr(object)?;
        self.asm.mov_mem_reg(Reg::Rbp, obj_slot, Reg::Rax)?;
        self.lower_expr(index)?;
        self.asm.mov_reg_reg(Reg::Rsi, Reg::Rax)?;
        self.asm.mov_reg_mem(Reg::Rdi, Reg::Rbp, obj_slot)?;
        self.emit_call(vanarize_runtime::Runtime_IndexGet as usize as u64)
    }

    fn lower_index_set(&mut self, object: &Expr, index: &Expr, value: &Expr) -> Result<()> {
        let obj_slot = self.frame.alloc_slot()?;
        let idx_slot = self.frame.alloc_slot()?;
        let val_slot = self.frame.alloc_slot()?;

        self.lower_expr(object)?;
        self.asm.mov_mem_reg(Reg::Rbp, obj_slot, Reg::Rax)?;
        self.lower_expr(index)?;
        self.asm.mov_mem_reg(Reg::Rbp, idx_slot, Reg::Rax)?;
        self.lower_expr(value)?;
        self.asm.mov_mem_reg(Reg::Rbp, val_slot, Reg::Rax)?;

        self.asm.mov_reg_mem(Reg::Rdi, Reg::Rbp, obj_slot)?;
        self.asm.mov_reg_mem(Reg::Rsi, Reg::Rbp, idx_slot)?;
        self.asm.mov_reg_mem(Reg::Rdx, Reg::Rbp, val_slot)?;
        self.emit_call(vanarize_runtime::Runtime_IndexSet as usize as u64)?;

        self.asm.mov_reg_mem(Reg::Rax, Reg::Rbp, val_slot)?;
        Ok(())
    }

    fn lower_struct_init(&mut self, name: Symbol, fields: &[(Symbol, Expr)]) -> Result<()> {
        let decl = self
            .structs
            .get(&name)
            .copied()
            .ok_or_else(|| CodeGenError::UnknownStruct(name.as_str().to_string()))?;
        for (given_name, _) in fields {
            if !decl.fields.iter().any(|f| f.name == *given_name) {
                return Err(CodeGenError::UnknownField(name.as_str().to_string(), given_name.as_str().to_string()));
            }
        }

        let obj_slot = self.frame.alloc_slot()?;
        self.asm.mov_reg_imm64(Reg::Rdi, decl.fields.len() as u64)?;
        self.emit_call(vanarize_runtime::Runtime_NewStruct as usize as u64)?;
        self.asm.mov_mem_reg(Reg::Rbp, obj_slot, Reg::Rax)?;

        for (index, field) in decl.fields.iter().enumerate() {
            let Some((_, value_expr)) = fields.iter().find(|(n, _)| *n == field.name) else { continue };
            self.lower_expr(value_expr)?;
            self.asm.mov_reg_reg(Reg::Rdx, Reg::Rax)?;
            self.asm.mov_reg_mem(Reg::Rdi, Reg::Rbp, obj_slot)?;
            self.asm.mov_reg_imm64(Reg::Rsi, index as u64)?;
            self.emit_call(vanarize_runtime::Runtime_SetField as usize as u64)?;
        }

        self.asm.mov_reg_mem(Reg::Rax, Reg::Rbp, obj_slot)?;
        Ok(())
    }

    fn lower_array_literal(&mut self, elems: &[Expr]) -> Result<()> {
        let obj_slot = self.frame.alloc_slot()?;
        self.asm.mov_reg_imm64(Reg::Rdi, elems.len() as u64)?;
        self.emit_call(vanarize_runtime::Runtime_NewStruct as usize as u64)?;
        self.asm.mov_mem_reg(Reg::Rbp, obj_slot, Reg::Rax)?;

        for (index, elem) in elems.iter().enumerate() {
            self.lower_expr(elem)?;
            self.asm.mov_reg_reg(Reg::Rdx, Reg::Rax)?;
            self.asm.mov_reg_mem(Reg::Rdi, Reg::Rbp, obj_slot)?;
            self.asm.mov_reg_imm64(Reg::Rsi, index as u64)?;
            self.emit_call(vanarize_runtime::Runtime_SetField as usize as u64)?;
        }

        self.asm.mov_reg_mem(Reg::Rax, Reg::Rbp, obj_slot)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vanarize_par::ast::{Literal as Lit, Param};

    fn span() -> vanarize_util::Span {
        vanarize_util::Span::DUMMY
    }

    fn program_from(stmts: Vec<Stmt>) -> Program {
        stmts.into_iter().map(Item::TopStmt).collect()
    }

    #[test]
    fn arithmetic_expression_evaluates() {
        // print(10 + 20 * 2);
        let expr = Expr::Binary {
            op: BinOp::Add,
            lhs: Box::new(Expr::Literal(Lit::Number(10.0), span())),
            rhs: Box::new(Expr::Binary {
                op: BinOp::Mul,
                lhs: Box::new(Expr::Literal(Lit::Number(20.0), span())),
                rhs: Box::new(Expr::Literal(Lit::Number(2.0), span())),
                span: span(),
            }),
            span: span(),
        };
        let program = program_from(vec![Stmt::Return(Some(expr), span())]);
        let compiled = compile(&program).expect("compiles");
        assert_eq!(compiled.call().as_f64(), 50.0);
    }

    #[test]
    fn variable_declaration_and_use() {
        let program = program_from(vec![
            Stmt::VarDecl(VarDecl {
                ty: Type::Primitive(vanarize_par::ast::PrimitiveType::Int),
                name: Symbol::intern("x"),
                init: Some(Expr::Literal(Lit::Number(7.0), span())),
                span: span(),
            }),
            Stmt::Return(
                Some(Expr::Binary {
                    op: BinOp::Add,
                    lhs: Box::new(Expr::Identifier(Symbol::intern("x"), span())),
                    rhs: Box::new(Expr::Literal(Lit::Number(1.0), span())),
                    span: span(),
                }),
                span(),
            ),
        ]);
        let compiled = compile(&program).expect("compiles");
        assert_eq!(compiled.call().as_f64(), 8.0);
    }

    #[test]
    fn if_else_takes_the_true_branch() {
        let cond = Expr::Literal(Lit::Bool(true), span());
        let if_stmt = Stmt::If(IfStmt {
            cond,
            then_branch: vec![Stmt::Return(Some(Expr::Literal(Lit::Number(1.0), span())), span())],
            else_branch: Some(vec![Stmt::Return(Some(Expr::Literal(Lit::Number(2.0), span())), span())]),
            span: span(),
        });
        let program = program_from(vec![if_stmt]);
        let compiled = compile(&program).expect("compiles");
        assert_eq!(compiled.call().as_f64(), 1.0);
    }

    #[test]
    fn for_loop_accumulates() {
        // for (var i = 0; i < 5; i = i + 1) { sum = sum + i; }
        let sum = Symbol::intern("sum");
        let i = Symbol::intern("i");
        let program = program_from(vec![
            Stmt::VarDecl(VarDecl {
                ty: Type::Primitive(vanarize_par::ast::PrimitiveType::Int),
                name: sum,
                init: Some(Expr::Literal(Lit::Number(0.0), span())),
                span: span(),
            }),
            Stmt::For(ForStmt {
                init: Some(Box::new(Stmt::VarDecl(VarDecl {
                    ty: Type::Primitive(vanarize_par::ast::PrimitiveType::Int),
                    name: i,
                    init: Some(Expr::Literal(Lit::Number(0.0), span())),
                    span: span(),
                }))),
                cond: Some(Expr::Binary {
                    op: BinOp::Lt,
                    lhs: Box::new(Expr::Identifier(i, span())),
                    rhs: Box::new(Expr::Literal(Lit::Number(5.0), span())),
                    span: span(),
                }),
                incr: Some(Expr::Assign {
                    name: i,
                    value: Box::new(Expr::Binary {
                        op: BinOp::Add,
                        lhs: Box::new(Expr::Identifier(i, span())),
                        rhs: Box::new(Expr::Literal(Lit::Number(1.0), span())),
                        span: span(),
                    }),
                    span: span(),
                }),
                body: vec![Stmt::Expr(Expr::Assign {
                    name: sum,
                    value: Box::new(Expr::Binary {
                        op: BinOp::Add,
                        lhs: Box::new(Expr::Identifier(sum, span())),
                        rhs: Box::new(Expr::Identifier(i, span())),
                        span: span(),
                    }),
                    span: span(),
                })],
                span: span(),
            }),
            Stmt::Return(Some(Expr::Identifier(sum, span())), span()),
        ]);
        let compiled = compile(&program).expect("compiles");
        assert_eq!(compiled.call().as_f64(), 10.0);
    }

    #[test]
    fn function_call_with_arguments() {
        let add = FunctionDecl {
            name: Symbol::intern("add"),
            is_async: false,
            params: vec![
                Param { ty: Type::Primitive(vanarize_par::ast::PrimitiveType::Int), name: Symbol::intern("a"), span: span() },
                Param { ty: Type::Primitive(vanarize_par::ast::PrimitiveType::Int), name: Symbol::intern("b"), span: span() },
            ],
            ret_type: Some(Type::Primitive(vanarize_par::ast::PrimitiveType::Int)),
            body: vec![Stmt::Return(
                Some(Expr::Binary {
                    op: BinOp::Add,
                    lhs: Box::new(Expr::Identifier(Symbol::intern("a"), span())),
                    rhs: Box::new(Expr::Identifier(Symbol::intern("b"), span())),
                    span: span(),
                }),
                span(),
            )],
            span: span(),
        };
        let call = Expr::Call {
            callee: Box::new(Expr::Identifier(Symbol::intern("add"), span())),
            args: vec![Expr::Literal(Lit::Number(3.0), span()), Expr::Literal(Lit::Number(4.0), span())],
            span: span(),
        };
        let program = vec![Item::Function(add), Item::TopStmt(Stmt::Return(Some(call), span()))];
        let compiled = compile(&program).expect("compiles");
        assert_eq!(compiled.call().as_f64(), 7.0);
    }

    #[test]
    fn struct_field_access_round_trips() {
        let point = StructDecl {
            name: Symbol::intern("Point"),
            fields: vec![
                vanarize_par::ast::Field { ty: Type::Primitive(vanarize_par::ast::PrimitiveType::Int), name: Symbol::intern("x"), span: span() },
                vanarize_par::ast::Field { ty: Type::Primitive(vanarize_par::ast::PrimitiveType::Int), name: Symbol::intern("y"), span: span() },
            ],
            span: span(),
        };
        let init = Expr::StructInit {
            name: Symbol::intern("Point"),
            fields: vec![
                (Symbol::intern("x"), Expr::Literal(Lit::Number(3.0), span())),
                (Symbol::intern("y"), Expr::Literal(Lit::Number(4.0), span())),
            ],
            span: span(),
        };
        let program = vec![
            Item::Struct(point),
            Item::TopStmt(Stmt::VarDecl(VarDecl {
                ty: Type::Named(Symbol::intern("Point")),
                name: Symbol::intern("p"),
                init: Some(init),
                span: span(),
            })),
            Item::TopStmt(Stmt::Return(
                Some(Expr::PropertyGet { object: Box::new(Expr::Identifier(Symbol::intern("p"), span())), name: Symbol::intern("y"), span: span() }),
                span(),
            )),
        ];
        let compiled = compile(&program).expect("compiles");
        assert_eq!(compiled.call().as_f64(), 4.0);
    }

    #[test]
    fn string_literal_concatenation() {
        let expr = Expr::Binary {
            op: BinOp::Add,
            lhs: Box::new(Expr::Literal(Lit::Str("foo".into()), span())),
            rhs: Box::new(Expr::Literal(Lit::Str("bar".into()), span())),
            span: span(),
        };
        let program = program_from(vec![Stmt::Return(Some(expr), span())]);
        let compiled = compile(&program).expect("compiles");
        let result = compiled.call();
        assert!(result.is_string());
    }

    #[test]
    fn async_function_is_rejected() {
        let f = FunctionDecl {
            name: Symbol::intern("go"),
            is_async: true,
            params: vec![],
            ret_type: None,
            body: vec![],
            span: span(),
        };
        let program = vec![Item::Function(f)];
        assert!(matches!(compile(&program), Err(CodeGenError::UnsupportedAsync)));
    }

    #[test]
    fn await_expression_is_rejected() {
        let program = program_from(vec![Stmt::Expr(Expr::Await {
            expr: Box::new(Expr::Literal(Lit::Nil, span())),
            span: span(),
        })]);
        assert!(matches!(compile(&program), Err(CodeGenError::UnsupportedAsync)));
    }

    #[test]
    fn calling_an_undefined_function_is_an_error() {
        let call = Expr::Call { callee: Box::new(Expr::Identifier(Symbol::intern("missing"), span())), args: vec![], span: span() };
        let program = program_from(vec![Stmt::Expr(call)]);
        assert!(matches!(compile(&program), Err(CodeGenError::UndefinedFunction(_))));
    }

    #[test]
    fn too_many_parameters_is_rejected() {
        let params = (0..5)
            .map(|i| Param {
                ty: Type::Primitive(vanarize_par::ast::PrimitiveType::Int),
                name: Symbol::intern(&format!("p{i}")),
                span: span(),
            })
            .collect();
        let f = FunctionDecl { name: Symbol::intern("many"), is_async: false, params, ret_type: None, body: vec![], span: span() };
        let program = vec![Item::Function(f)];
        assert!(matches!(compile(&program), Err(CodeGenError::TooManyParameters(_, 5))));
    }
}
