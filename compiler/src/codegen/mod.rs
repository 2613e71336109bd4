//! Code generator: AST to bytecode, string table and label table.
//!
//! Single pass over the program. Jumps and calls go through named
//! labels that are back-patched once every address is known. Warnings
//! degrade (push 0 and keep going); only an undefined label at fixup
//! time is reported as an error, and even that leaves a zero operand
//! rather than aborting.

use crate::ast::*;
use byteorder::{LittleEndian, WriteBytesExt};
use std::collections::{HashMap, HashSet};
use std::fmt::Write as FmtWrite;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Bytecode operations. The byte values are the wire format and must
/// match the VM's table exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Push = 0x01,
    Pop = 0x02,
    Add = 0x03,
    Sub = 0x04,
    Mul = 0x05,
    Div = 0x06,
    Mod = 0x07,
    Dup = 0x08,
    Swap = 0x09,
    Print = 0x0A,
    PrintStr = 0x0B,
    InputStr = 0x0C,
    Input = 0x0D,
    Jmp = 0x10,
    Jz = 0x11,
    Jnz = 0x12,
    Jl = 0x13,
    Jg = 0x14,
    Jle = 0x15,
    Jge = 0x16,
    Cmp = 0x17,
    Call = 0x18,
    Ret = 0x19,
    Load = 0x20,
    Store = 0x21,
    LoadBp = 0x22,
    StoreBp = 0x23,
    PushBp = 0x24,
    PopBp = 0x25,
    PushStr = 0x26,
    LoadIndirect = 0x27,
    StoreIndirect = 0x28,
    Alloc = 0x29,
    Free = 0x2A,
    Fpush = 0x30,
    Fpop = 0x31,
    Fadd = 0x32,
    Fsub = 0x33,
    Fmul = 0x34,
    Fdiv = 0x35,
    Fload = 0x36,
    Fstore = 0x37,
    Fprint = 0x38,
    Fcmp = 0x39,
    Fneg = 0x3A,
    Fdup = 0x3B,
    IntToFp = 0x3C,
    FpToInt = 0x3D,
    Halt = 0xFF,
}

impl Opcode {
    fn has_operand(self) -> bool {
        matches!(
            self,
            Opcode::Push
                | Opcode::PushStr
                | Opcode::Jmp
                | Opcode::Jz
                | Opcode::Jnz
                | Opcode::Jl
                | Opcode::Jg
                | Opcode::Jle
                | Opcode::Jge
                | Opcode::Call
                | Opcode::Load
                | Opcode::LoadBp
                | Opcode::StoreBp
                | Opcode::Fload
                | Opcode::Fstore
                | Opcode::Fpush
        )
    }

    fn from_byte(byte: u8) -> Option<Self> {
        use Opcode::*;
        Some(match byte {
            0x01 => Push,
            0x02 => Pop,
            0x03 => Add,
            0x04 => Sub,
            0x05 => Mul,
            0x06 => Div,
            0x07 => Mod,
            0x08 => Dup,
            0x09 => Swap,
            0x0A => Print,
            0x0B => PrintStr,
            0x0C => InputStr,
            0x0D => Input,
            0x10 => Jmp,
            0x11 => Jz,
            0x12 => Jnz,
            0x13 => Jl,
            0x14 => Jg,
            0x15 => Jle,
            0x16 => Jge,
            0x17 => Cmp,
            0x18 => Call,
            0x19 => Ret,
            0x20 => Load,
            0x21 => Store,
            0x22 => LoadBp,
            0x23 => StoreBp,
            0x24 => PushBp,
            0x25 => PopBp,
            0x26 => PushStr,
            0x27 => LoadIndirect,
            0x28 => StoreIndirect,
            0x29 => Alloc,
            0x2A => Free,
            0x30 => Fpush,
            0x31 => Fpop,
            0x32 => Fadd,
            0x33 => Fsub,
            0x34 => Fmul,
            0x35 => Fdiv,
            0x36 => Fload,
            0x37 => Fstore,
            0x38 => Fprint,
            0x39 => Fcmp,
            0x3A => Fneg,
            0x3B => Fdup,
            0x3C => IntToFp,
            0x3D => FpToInt,
            0xFF => Halt,
            _ => return None,
        })
    }
}

/// A resolved name inside the generator.
#[derive(Debug, Clone, PartialEq)]
pub enum Symbol {
    Variable {
        address: i32,
        is_array: bool,
        is_heap: bool,
        is_float: bool,
    },
    Parameter {
        offset: i32,
        is_array: bool,
    },
    Function {
        address: i32,
        param_count: usize,
    },
}

#[derive(Debug, Default)]
struct Label {
    address: i32,
    defined: bool,
    fixups: Vec<usize>,
}

/// Output of the generator: the code segment plus the deduplicated
/// string table, ready to serialize in the bytecode file layout.
#[derive(Debug, Clone)]
pub struct CompiledProgram {
    pub code: Vec<u8>,
    pub strings: Vec<String>,
}

impl CompiledProgram {
    /// Serialize in the on-disk layout: `u32` string count, then each
    /// string as `u32` length + UTF-8 bytes, then `u32` code size and
    /// the code segment. Everything little-endian.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(self.strings.len() as u32)?;
        for s in &self.strings {
            writer.write_u32::<LittleEndian>(s.len() as u32)?;
            writer.write_all(s.as_bytes())?;
        }
        writer.write_u32::<LittleEndian>(self.code.len() as u32)?;
        writer.write_all(&self.code)?;
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)
    }
}

/// Arity-based mangling: parameterless functions keep their bare name,
/// everything else becomes `name_P<count>`.
pub fn mangle_function_name(name: &str, param_count: usize) -> String {
    if param_count == 0 {
        name.to_string()
    } else {
        format!("{}_P{}", name, param_count)
    }
}

/// Richer type-based mangling (`name_P<count>_<t>...`). Not used for
/// call resolution; kept for tooling that wants distinct signatures.
pub fn mangled_signature(name: &str, params: &[Param]) -> String {
    if params.is_empty() {
        return name.to_string();
    }
    let mut mangled = format!("{}_P{}", name, params.len());
    for param in params {
        if let Some(first) = param.type_tokens.first() {
            let mut ty = match first.as_str() {
                "int" => "i".to_string(),
                "float" => "f".to_string(),
                "double" => "d".to_string(),
                "char" => "c".to_string(),
                "bool" => "b".to_string(),
                "void" => "v".to_string(),
                "std" => "s".to_string(),
                other => other.to_string(),
            };
            if param.type_tokens.len() > 1 {
                match param.type_tokens.last().map(String::as_str) {
                    Some("*") => ty.push('p'),
                    Some("&") => ty.push('r'),
                    _ => {}
                }
            }
            mangled.push('_');
            mangled.push_str(&ty);
        }
    }
    mangled
}

pub struct CodeGenerator {
    code: Vec<u8>,
    strings: Vec<String>,
    labels: HashMap<String, Label>,
    scopes: Vec<HashMap<String, Symbol>>,
    class_names: HashSet<String>,
    next_addr: i32,
    label_counter: usize,
    had_errors: bool,
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeGenerator {
    pub fn new() -> Self {
        Self {
            code: Vec::new(),
            strings: Vec::new(),
            labels: HashMap::new(),
            scopes: vec![HashMap::new()],
            class_names: HashSet::new(),
            next_addr: 0,
            label_counter: 0,
            had_errors: false,
        }
    }

    /// True once any undefined label has been reported.
    pub fn had_errors(&self) -> bool {
        self.had_errors
    }

    pub fn generate(&mut self, program: &Program) -> CompiledProgram {
        self.code.clear();
        self.strings.clear();
        self.labels.clear();
        self.scopes = vec![HashMap::new()];
        self.class_names.clear();
        self.next_addr = 0;
        self.label_counter = 0;
        self.had_errors = false;

        self.gen_program(program);
        self.fixup_labels();

        CompiledProgram {
            code: self.code.clone(),
            strings: self.strings.clone(),
        }
    }

    fn gen_program(&mut self, program: &Program) {
        // Entry point: call main, halt when it returns.
        self.emit_jump(Opcode::Call, "main");
        self.emit(Opcode::Halt);

        // Class and struct names feed constructor-call detection.
        for item in &program.items {
            if let StmtKind::Decl(decl) = &item.node {
                match &decl.node {
                    DeclKind::Class { name, .. } | DeclKind::Struct { name, .. } => {
                        self.class_names.insert(name.clone());
                    }
                    _ => {}
                }
            }
        }

        for item in &program.items {
            if let StmtKind::Decl(Decl {
                node: DeclKind::Class { name, members, .. },
                ..
            }) = &item.node
            {
                // Member functions become free functions under a
                // qualified label; no `this` is threaded.
                for member in members {
                    if let StmtKind::Decl(Decl {
                        node: DeclKind::Function(func),
                        ..
                    }) = &member.node
                    {
                        let qualified = format!("{}::{}", name, func.name);
                        self.gen_function(func, &qualified);
                    }
                }
            } else {
                self.gen_statement(item);
            }
        }
    }

    fn gen_statement(&mut self, stmt: &Stmt) {
        match &stmt.node {
            StmtKind::VarDecl(decl) => self.gen_var_decl(decl),
            StmtKind::Block(stmts) => {
                self.enter_scope();
                for s in stmts {
                    self.gen_statement(s);
                }
                self.exit_scope();
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => self.gen_if(cond, then_branch, else_branch.as_deref()),
            StmtKind::While { cond, body } => self.gen_while(cond, body),
            StmtKind::For {
                init,
                cond,
                post,
                range,
                body,
            } => self.gen_for(init.as_deref(), cond.as_ref(), post.as_ref(), range.as_ref(), body),
            StmtKind::Return(expr) => self.gen_return(expr.as_ref()),
            StmtKind::Expr(Some(expr)) => {
                self.gen_expression(expr);
                // Discard the result from whichever stack holds it.
                if self.is_float_expr(expr) {
                    self.emit(Opcode::Fpop);
                } else {
                    self.emit(Opcode::Pop);
                }
            }
            StmtKind::Expr(None) => {}
            // No runtime code for any of these.
            StmtKind::AccessSpec(_) => {}
            StmtKind::Decl(decl) => match &decl.node {
                DeclKind::Function(func) => {
                    let label = mangle_function_name(&func.name, func.params.len());
                    self.gen_function(func, &label);
                }
                DeclKind::Class { .. }
                | DeclKind::Struct { .. }
                | DeclKind::Namespace { .. }
                | DeclKind::Template { .. }
                | DeclKind::Include { .. }
                | DeclKind::Using { .. } => {}
            },
        }
    }

    fn gen_var_decl(&mut self, decl: &VarDecl) {
        let is_pointer = decl.is_pointer || decl.type_tokens.iter().any(|t| t == "*");

        // A pointer initialized from `new ...` owns a heap array.
        let is_heap_array = is_pointer
            && matches!(
                decl.init.as_ref().map(|e| &e.node),
                Some(ExprKind::Unary { op, .. }) if op == "new"
            );

        let is_array = decl.is_array || is_heap_array;
        let is_float_var = !is_pointer && !is_array && is_float_type(&decl.type_tokens);

        let addr = self.next_addr;
        self.next_addr += 1;
        self.define_symbol(
            &decl.name,
            Symbol::Variable {
                address: addr,
                is_array,
                is_heap: is_heap_array,
                is_float: is_float_var,
            },
        );

        if let Some(init) = &decl.init {
            if is_float_var {
                self.gen_expression(init);
                if !self.is_float_expr(init) {
                    self.emit(Opcode::IntToFp);
                }
                self.emit(Opcode::Fstore);
                self.emit_i32(addr);
            } else {
                self.gen_expression(init);
                self.emit(Opcode::Push);
                self.emit_i32(addr);
                self.emit(Opcode::Store);
            }
        }
    }

    fn gen_function(&mut self, func: &FunctionDecl, label: &str) {
        self.define_label(label);
        let address = self.code.len() as i32;
        self.define_symbol(
            &func.name,
            Symbol::Function {
                address,
                param_count: func.params.len(),
            },
        );

        self.emit(Opcode::PushBp);

        // After PUSH_BP the stack is [.., arg1 .. argN, saved_BP] with
        // BP one past the saved BP, so parameter i of n sits at
        // BP - (n - i + 1).
        self.enter_scope();
        let param_count = func.params.len() as i32;
        for (i, param) in func.params.iter().enumerate() {
            let offset = -(param_count - i as i32 + 1);
            let is_pointer = param
                .type_tokens
                .iter()
                .any(|t| t == "*" || t == "[]");
            self.define_symbol(
                &param.name,
                Symbol::Parameter {
                    offset,
                    is_array: is_pointer,
                },
            );
        }

        if let Some(body) = &func.body {
            self.gen_statement(body);
        }

        // Epilogue even after an explicit return; the duplicate is
        // unreachable.
        self.emit(Opcode::PopBp);
        self.emit(Opcode::Ret);
        self.exit_scope();
    }

    fn gen_if(&mut self, cond: &Expr, then_branch: &Stmt, else_branch: Option<&Stmt>) {
        let else_label = self.make_label("else");
        let end_label = self.make_label("endif");

        self.gen_expression(cond);
        self.emit_jump(Opcode::Jz, &else_label);

        self.gen_statement(then_branch);
        self.emit_jump(Opcode::Jmp, &end_label);

        self.define_label(&else_label);
        if let Some(else_branch) = else_branch {
            self.gen_statement(else_branch);
        }
        self.define_label(&end_label);
    }

    fn gen_while(&mut self, cond: &Expr, body: &Stmt) {
        let loop_start = self.make_label("while_start");
        let loop_end = self.make_label("while_end");

        self.define_label(&loop_start);
        self.gen_expression(cond);
        self.emit_jump(Opcode::Jz, &loop_end);

        self.gen_statement(body);
        self.emit_jump(Opcode::Jmp, &loop_start);

        self.define_label(&loop_end);
    }

    fn gen_for(
        &mut self,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        post: Option<&Expr>,
        range: Option<&Expr>,
        body: &Stmt,
    ) {
        if range.is_some() {
            eprintln!("Warning: range-based for is not supported in codegen");
            return;
        }

        let loop_start = self.make_label("for_start");
        let loop_end = self.make_label("for_end");

        self.enter_scope();
        if let Some(init) = init {
            self.gen_statement(init);
        }

        self.define_label(&loop_start);
        if let Some(cond) = cond {
            self.gen_expression(cond);
            self.emit_jump(Opcode::Jz, &loop_end);
        }

        self.gen_statement(body);

        if let Some(post) = post {
            self.gen_expression(post);
            if self.is_float_expr(post) {
                self.emit(Opcode::Fpop);
            } else {
                self.emit(Opcode::Pop);
            }
        }

        self.emit_jump(Opcode::Jmp, &loop_start);
        self.define_label(&loop_end);
        self.exit_scope();
    }

    fn gen_return(&mut self, expr: Option<&Expr>) {
        if let Some(expr) = expr {
            self.gen_expression(expr);
        }
        self.emit(Opcode::PopBp);
        self.emit(Opcode::Ret);
    }

    // ----- expressions -----

    fn gen_expression(&mut self, expr: &Expr) {
        match &expr.node {
            ExprKind::Binary { op, left, right } => self.gen_binary(op, left, right),
            ExprKind::Unary { op, operand } => self.gen_unary(op, operand),
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => self.gen_conditional(cond, then_expr, else_expr),
            ExprKind::Call { callee, args } => self.gen_call(callee, args),
            ExprKind::Literal { value, kind } => self.gen_literal(value, *kind),
            ExprKind::Identifier { name } => self.gen_identifier(name),
            ExprKind::Subscript { array, index } => self.gen_subscript(array, index),
            ExprKind::Member { .. } => {
                // Member access has no object layout to address yet.
                self.emit(Opcode::Push);
                self.emit_i32(0);
            }
        }
    }

    fn gen_binary(&mut self, op: &str, left: &Expr, right: &Expr) {
        if op == "=" {
            self.gen_assignment(left, right);
            return;
        }
        if op == "<<" {
            self.gen_stream_output(left, right);
            return;
        }
        if op == ">>" {
            self.gen_stream_input(right);
            return;
        }
        if op == "&&" || op == "||" {
            self.gen_logical(op, left, right);
            return;
        }

        let left_float = self.is_float_expr(left);
        let right_float = self.is_float_expr(right);
        let either_float = left_float || right_float;

        if either_float && matches!(op, "+" | "-" | "*" | "/") {
            self.gen_expression(left);
            if !left_float {
                self.emit(Opcode::IntToFp);
            }
            self.gen_expression(right);
            if !right_float {
                self.emit(Opcode::IntToFp);
            }
            match op {
                "+" => self.emit(Opcode::Fadd),
                "-" => self.emit(Opcode::Fsub),
                "*" => self.emit(Opcode::Fmul),
                _ => self.emit(Opcode::Fdiv),
            }
            return;
        }

        if either_float && matches!(op, "<" | ">" | "<=" | ">=" | "==" | "!=") {
            self.gen_expression(left);
            if !left_float {
                self.emit(Opcode::IntToFp);
            }
            self.gen_expression(right);
            if !right_float {
                self.emit(Opcode::IntToFp);
            }

            let true_label = self.make_label("fcmp_true");
            let end_label = self.make_label("fcmp_end");

            if op == "==" || op == "!=" {
                // Lossy on sub-integer differences: the difference is
                // truncated to int before the zero test.
                self.emit(Opcode::Fsub);
                self.emit(Opcode::FpToInt);
                self.emit(Opcode::Dup);
                self.emit_jump(Opcode::Jz, &true_label);
                self.emit(Opcode::Pop);
                self.emit(Opcode::Push);
                self.emit_i32(if op == "==" { 0 } else { 1 });
                self.emit_jump(Opcode::Jmp, &end_label);
                self.define_label(&true_label);
                self.emit(Opcode::Pop);
                self.emit(Opcode::Push);
                self.emit_i32(if op == "==" { 1 } else { 0 });
                self.define_label(&end_label);
            } else {
                self.emit(Opcode::Fcmp);
                let jmp_op = match op {
                    "<" => Opcode::Jl,
                    ">" => Opcode::Jg,
                    "<=" => Opcode::Jle,
                    _ => Opcode::Jge,
                };
                self.emit_jump(jmp_op, &true_label);
                self.emit(Opcode::Push);
                self.emit_i32(0);
                self.emit_jump(Opcode::Jmp, &end_label);
                self.define_label(&true_label);
                self.emit(Opcode::Push);
                self.emit_i32(1);
                self.define_label(&end_label);
            }
            return;
        }

        self.gen_expression(left);
        self.gen_expression(right);

        match op {
            "+" => self.emit(Opcode::Add),
            "-" => self.emit(Opcode::Sub),
            "*" => self.emit(Opcode::Mul),
            "/" => self.emit(Opcode::Div),
            "%" => self.emit(Opcode::Mod),
            "<" => self.gen_int_comparison(Opcode::Jl),
            ">" => self.gen_int_comparison(Opcode::Jg),
            "<=" => self.gen_int_comparison(Opcode::Jle),
            ">=" => self.gen_int_comparison(Opcode::Jge),
            "==" => self.gen_int_equality(true),
            "!=" => self.gen_int_equality(false),
            _ => {
                eprintln!("Warning: unhandled binary operator '{}' in codegen", op);
                self.emit(Opcode::Pop);
                self.emit(Opcode::Pop);
                self.emit(Opcode::Push);
                self.emit_i32(0);
            }
        }
    }

    /// CMP then a flag-directed jump, materializing 0/1.
    fn gen_int_comparison(&mut self, jmp_op: Opcode) {
        let true_label = self.make_label("cmp_true");
        let end_label = self.make_label("cmp_end");
        self.emit(Opcode::Cmp);
        self.emit_jump(jmp_op, &true_label);
        self.emit(Opcode::Push);
        self.emit_i32(0);
        self.emit_jump(Opcode::Jmp, &end_label);
        self.define_label(&true_label);
        self.emit(Opcode::Push);
        self.emit_i32(1);
        self.define_label(&end_label);
    }

    /// Equality via SUB and a zero test on the difference.
    fn gen_int_equality(&mut self, equal: bool) {
        let true_label = self.make_label("cmp_true");
        let end_label = self.make_label("cmp_end");
        self.emit(Opcode::Sub);
        self.emit(Opcode::Dup);
        self.emit_jump(Opcode::Jz, &true_label);
        self.emit(Opcode::Pop);
        self.emit(Opcode::Push);
        self.emit_i32(if equal { 0 } else { 1 });
        self.emit_jump(Opcode::Jmp, &end_label);
        self.define_label(&true_label);
        self.emit(Opcode::Pop);
        self.emit(Opcode::Push);
        self.emit_i32(if equal { 1 } else { 0 });
        self.define_label(&end_label);
    }

    /// Short-circuit `&&`/`||` producing 0/1.
    fn gen_logical(&mut self, op: &str, left: &Expr, right: &Expr) {
        let short_label = self.make_label(if op == "&&" { "and_false" } else { "or_true" });
        let end_label = self.make_label(if op == "&&" { "and_end" } else { "or_end" });
        let (jmp, shortcut, fallthrough) = if op == "&&" {
            (Opcode::Jz, 0, 1)
        } else {
            (Opcode::Jnz, 1, 0)
        };

        self.gen_expression(left);
        self.emit_jump(jmp, &short_label);
        self.gen_expression(right);
        self.emit_jump(jmp, &short_label);
        self.emit(Opcode::Push);
        self.emit_i32(fallthrough);
        self.emit_jump(Opcode::Jmp, &end_label);
        self.define_label(&short_label);
        self.emit(Opcode::Push);
        self.emit_i32(shortcut);
        self.define_label(&end_label);
    }

    fn gen_assignment(&mut self, left: &Expr, right: &Expr) {
        // *ptr = value
        if let ExprKind::Unary { op, operand } = &left.node {
            if op == "*" {
                self.gen_expression(right);
                self.emit(Opcode::Dup);
                self.gen_expression(operand);
                self.emit(Opcode::StoreIndirect);
                return;
            }
        }

        // arr[i] = value
        if let ExprKind::Subscript { array, index } = &left.node {
            self.gen_expression(right);
            self.emit(Opcode::Dup);
            if let ExprKind::Identifier { name } = &array.node {
                if let Some(sym) = self.find_symbol(name) {
                    self.emit_array_base(&sym);
                    self.gen_expression(index);
                    self.emit(Opcode::Add);
                    self.emit(Opcode::StoreIndirect);
                }
            }
            return;
        }

        // x = value
        if let ExprKind::Identifier { name } = &left.node {
            let sym = self.find_symbol(name);
            self.gen_expression(right);

            match sym {
                Some(Symbol::Variable {
                    address,
                    is_float: true,
                    ..
                }) => {
                    if !self.is_float_expr(right) {
                        self.emit(Opcode::IntToFp);
                    }
                    self.emit(Opcode::Fdup);
                    self.emit(Opcode::Fstore);
                    self.emit_i32(address);
                }
                Some(Symbol::Parameter { offset, .. }) => {
                    self.emit(Opcode::Dup);
                    self.emit(Opcode::StoreBp);
                    self.emit_i32(offset);
                }
                Some(Symbol::Variable { address, .. }) => {
                    self.emit(Opcode::Dup);
                    self.emit(Opcode::Push);
                    self.emit_i32(address);
                    self.emit(Opcode::Store);
                }
                _ => {}
            }
            return;
        }

        eprintln!("Warning: unsupported assignment target in codegen");
        self.gen_expression(right);
    }

    /// `<<` output. Only a chain rooted at the literal identifier
    /// `std::cout` gets chain flattening; any other left operand falls
    /// to the single-print path.
    fn gen_stream_output(&mut self, left: &Expr, right: &Expr) {
        let mut leftmost = left;
        while let ExprKind::Binary { left: inner, .. } = &leftmost.node {
            leftmost = inner.as_ref();
        }
        let is_cout_chain =
            matches!(&leftmost.node, ExprKind::Identifier { name } if name == "std::cout");

        if is_cout_chain {
            // Emit earlier links first so output order is left to right.
            if let ExprKind::Binary { op, left: l, right: r } = &left.node {
                self.gen_binary(op, l, r);
            }
            self.gen_print_operand(right);
            self.emit(Opcode::Push);
            self.emit_i32(0);
            return;
        }

        self.gen_print_operand(right);
        self.emit(Opcode::Push);
        self.emit_i32(0);
    }

    fn gen_print_operand(&mut self, operand: &Expr) {
        if let ExprKind::Literal {
            value,
            kind: LiteralKind::Str,
        } = &operand.node
        {
            let str_id = self.add_string(value);
            self.emit(Opcode::PushStr);
            self.emit_i32(str_id);
            self.emit(Opcode::PrintStr);
            return;
        }
        self.gen_expression(operand);
        if self.is_float_expr(operand) {
            self.emit(Opcode::Fprint);
        } else {
            self.emit(Opcode::Print);
        }
    }

    /// `>>` input: read one integer and store it into the right
    /// operand (identifier or array element).
    fn gen_stream_input(&mut self, right: &Expr) {
        self.emit(Opcode::Input);

        match &right.node {
            ExprKind::Identifier { name } => match self.find_symbol(name) {
                Some(Symbol::Parameter { offset, .. }) => {
                    self.emit(Opcode::StoreBp);
                    self.emit_i32(offset);
                }
                Some(Symbol::Variable { address, .. }) => {
                    self.emit(Opcode::Push);
                    self.emit_i32(address);
                    self.emit(Opcode::Store);
                }
                _ => {}
            },
            ExprKind::Subscript { array, index } => {
                if let ExprKind::Identifier { name } = &array.node {
                    if let Some(sym) = self.find_symbol(name) {
                        self.emit_array_base(&sym);
                        self.gen_expression(index);
                        self.emit(Opcode::Add);
                        self.emit(Opcode::StoreIndirect);
                    }
                }
            }
            _ => {}
        }

        self.emit(Opcode::Push);
        self.emit_i32(0);
    }

    fn gen_unary(&mut self, op: &str, operand: &Expr) {
        match op {
            "new" => {
                if let ExprKind::Subscript { index, .. } = &operand.node {
                    // new T[size]
                    self.gen_expression(index);
                } else {
                    // new T: one cell
                    self.emit(Opcode::Push);
                    self.emit_i32(1);
                }
                self.emit(Opcode::Alloc);
            }
            "delete" => {
                self.gen_expression(operand);
                self.emit(Opcode::Free);
                self.emit(Opcode::Push);
                self.emit_i32(0);
            }
            "&" => self.gen_address_of(operand),
            "*" => {
                self.gen_expression(operand);
                self.emit(Opcode::LoadIndirect);
            }
            "-" => {
                self.gen_expression(operand);
                if self.is_float_expr(operand) {
                    self.emit(Opcode::Fneg);
                } else {
                    self.emit(Opcode::Push);
                    self.emit_i32(0);
                    self.emit(Opcode::Swap);
                    self.emit(Opcode::Sub);
                }
            }
            "+" => self.gen_expression(operand),
            "!" => {
                let true_label = self.make_label("not_true");
                let end_label = self.make_label("not_end");
                self.gen_expression(operand);
                self.emit_jump(Opcode::Jz, &true_label);
                self.emit(Opcode::Push);
                self.emit_i32(0);
                self.emit_jump(Opcode::Jmp, &end_label);
                self.define_label(&true_label);
                self.emit(Opcode::Push);
                self.emit_i32(1);
                self.define_label(&end_label);
            }
            "~" => {
                // ~x == -x - 1
                self.gen_expression(operand);
                self.emit(Opcode::Push);
                self.emit_i32(0);
                self.emit(Opcode::Swap);
                self.emit(Opcode::Sub);
                self.emit(Opcode::Push);
                self.emit_i32(1);
                self.emit(Opcode::Sub);
            }
            _ => {
                self.gen_expression(operand);
                eprintln!("Warning: unhandled unary operator '{}' in codegen", op);
            }
        }
    }

    fn gen_address_of(&mut self, operand: &Expr) {
        match &operand.node {
            ExprKind::Identifier { name } => {
                if let Some(Symbol::Variable { address, .. }) = self.find_symbol(name) {
                    self.emit(Opcode::Push);
                    self.emit_i32(address);
                    return;
                }
            }
            ExprKind::Subscript { array, index } => {
                if let ExprKind::Identifier { name } = &array.node {
                    if let Some(sym) = self.find_symbol(name) {
                        self.emit_array_base(&sym);
                        self.gen_expression(index);
                        self.emit(Opcode::Add);
                        return;
                    }
                }
            }
            _ => {}
        }
        self.emit(Opcode::Push);
        self.emit_i32(0);
    }

    fn gen_conditional(&mut self, cond: &Expr, then_expr: &Expr, else_expr: &Expr) {
        let else_label = self.make_label("cond_else");
        let end_label = self.make_label("cond_end");

        self.gen_expression(cond);
        if self.is_float_expr(cond) {
            self.emit(Opcode::FpToInt);
        }
        self.emit_jump(Opcode::Jz, &else_label);

        let then_float = self.is_float_expr(then_expr);
        let else_float = self.is_float_expr(else_expr);
        let either_float = then_float || else_float;

        self.gen_expression(then_expr);
        if either_float && !then_float {
            self.emit(Opcode::IntToFp);
        }
        self.emit_jump(Opcode::Jmp, &end_label);

        self.define_label(&else_label);
        self.gen_expression(else_expr);
        if either_float && !else_float {
            self.emit(Opcode::IntToFp);
        }
        self.define_label(&end_label);
    }

    fn gen_call(&mut self, callee: &Expr, args: &[Expr]) {
        let name = match &callee.node {
            ExprKind::Identifier { name } => name.clone(),
            _ => {
                eprintln!("Warning: unsupported call target in codegen");
                self.emit(Opcode::Push);
                self.emit_i32(0);
                return;
            }
        };

        // Constructor calls have no object model behind them yet.
        if self.class_names.contains(&name) {
            self.emit(Opcode::Push);
            self.emit_i32(0);
            return;
        }

        if name == "print" || name == "println" {
            for arg in args {
                self.gen_print_operand(arg);
            }
            if name == "println" {
                let str_id = self.add_string("\n");
                self.emit(Opcode::PushStr);
                self.emit_i32(str_id);
                self.emit(Opcode::PrintStr);
            }
            self.emit(Opcode::Push);
            self.emit_i32(0);
            return;
        }

        // Arguments left to right, then the mangled call.
        for arg in args {
            self.gen_expression(arg);
        }
        let mangled = mangle_function_name(&name, args.len());
        self.emit_jump(Opcode::Call, &mangled);

        // Drop the arguments while keeping the return value on top.
        for _ in 0..args.len() {
            self.emit(Opcode::Swap);
            self.emit(Opcode::Pop);
        }
    }

    fn gen_literal(&mut self, value: &str, kind: LiteralKind) {
        if kind == LiteralKind::Str {
            let str_id = self.add_string(value);
            self.emit(Opcode::PushStr);
            self.emit_i32(str_id);
            return;
        }

        if kind == LiteralKind::Number && is_float_literal_str(value) {
            let parsed = parse_float_literal(value).unwrap_or_else(|| {
                eprintln!("Warning: could not parse float literal: {}", value);
                0.0
            });
            self.emit(Opcode::Fpush);
            self.emit_f32(parsed);
            return;
        }

        let int_value = if kind == LiteralKind::Character
            || (value.chars().count() == 1
                && !value.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false))
        {
            value.chars().next().map(|c| c as i32).unwrap_or(0)
        } else {
            match parse_int_literal(value) {
                Some(v) => v,
                None => match parse_float_literal(value) {
                    Some(f) => f as i32,
                    None => {
                        eprintln!("Warning: could not parse literal: {}", value);
                        0
                    }
                },
            }
        };

        self.emit(Opcode::Push);
        self.emit_i32(int_value);
    }

    fn gen_identifier(&mut self, name: &str) {
        // Stream sentinels evaluate to nothing useful.
        if matches!(
            name,
            "std" | "cout" | "cin" | "endl" | "cerr" | "std::cout" | "std::cin" | "std::endl"
                | "std::cerr"
        ) {
            self.emit(Opcode::Push);
            self.emit_i32(0);
            return;
        }

        match self.find_symbol(name) {
            Some(Symbol::Variable {
                address,
                is_float: true,
                ..
            }) => {
                self.emit(Opcode::Fload);
                self.emit_i32(address);
            }
            Some(Symbol::Variable {
                address,
                is_heap: true,
                ..
            }) => {
                self.emit(Opcode::Load);
                self.emit_i32(address);
            }
            Some(Symbol::Variable {
                address,
                is_array: true,
                ..
            }) => {
                // Array-to-pointer decay: the address is the value.
                self.emit(Opcode::Push);
                self.emit_i32(address);
            }
            Some(Symbol::Variable { address, .. }) => {
                self.emit(Opcode::Load);
                self.emit_i32(address);
            }
            Some(Symbol::Parameter { offset, .. }) => {
                self.emit(Opcode::LoadBp);
                self.emit_i32(offset);
            }
            Some(Symbol::Function { address, .. }) => {
                self.emit(Opcode::Push);
                self.emit_i32(address);
            }
            None => {
                self.emit(Opcode::Push);
                self.emit_i32(0);
            }
        }
    }

    fn gen_subscript(&mut self, array: &Expr, index: &Expr) {
        if let ExprKind::Identifier { name } = &array.node {
            if let Some(sym) = self.find_symbol(name) {
                self.emit_array_base(&sym);
                self.gen_expression(index);
                self.emit(Opcode::Add);
                self.emit(Opcode::LoadIndirect);
                return;
            }
        }
        eprintln!("Warning: unsupported subscript base in codegen");
        self.emit(Opcode::Push);
        self.emit_i32(0);
    }

    /// Push the base address of an indexable symbol: array parameters
    /// load the pointer they were passed, heap arrays load the stored
    /// heap pointer, stack arrays decay to their static address.
    fn emit_array_base(&mut self, sym: &Symbol) {
        match sym {
            Symbol::Parameter {
                offset,
                is_array: true,
            } => {
                self.emit(Opcode::LoadBp);
                self.emit_i32(*offset);
            }
            Symbol::Variable {
                address,
                is_heap: true,
                ..
            } => {
                self.emit(Opcode::Load);
                self.emit_i32(*address);
            }
            Symbol::Variable { address, .. } => {
                self.emit(Opcode::Push);
                self.emit_i32(*address);
            }
            Symbol::Parameter { offset, .. } => {
                self.emit(Opcode::Push);
                self.emit_i32(*offset);
            }
            Symbol::Function { address, .. } => {
                self.emit(Opcode::Push);
                self.emit_i32(*address);
            }
        }
    }

    // ----- type direction -----

    /// True when evaluating the expression leaves its result on the
    /// FPU stack. Assignments follow the left-hand side's type.
    fn is_float_expr(&self, expr: &Expr) -> bool {
        match &expr.node {
            ExprKind::Literal { value, kind } => {
                *kind == LiteralKind::Number && is_float_literal_str(value)
            }
            ExprKind::Identifier { name } => matches!(
                self.find_symbol(name),
                Some(Symbol::Variable { is_float: true, .. })
            ),
            ExprKind::Binary { op, left, right } => {
                if op == "=" {
                    if let ExprKind::Identifier { name } = &left.node {
                        return matches!(
                            self.find_symbol(name),
                            Some(Symbol::Variable { is_float: true, .. })
                        );
                    }
                    return false;
                }
                self.is_float_expr(left) || self.is_float_expr(right)
            }
            ExprKind::Unary { op, operand } => {
                // Allocation and deallocation produce int addresses.
                if op == "new" || op == "delete" {
                    return false;
                }
                self.is_float_expr(operand)
            }
            ExprKind::Conditional {
                then_expr,
                else_expr,
                ..
            } => self.is_float_expr(then_expr) || self.is_float_expr(else_expr),
            _ => false,
        }
    }

    // ----- emit helpers -----

    fn emit(&mut self, op: Opcode) {
        self.code.push(op as u8);
    }

    fn emit_i32(&mut self, value: i32) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    fn emit_i32_at(&mut self, pos: usize, value: i32) {
        self.code[pos..pos + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn emit_f32(&mut self, value: f32) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    fn make_label(&mut self, prefix: &str) -> String {
        let label = format!("{}_{}", prefix, self.label_counter);
        self.label_counter += 1;
        label
    }

    fn define_label(&mut self, name: &str) {
        let address = self.code.len() as i32;
        let label = self.labels.entry(name.to_string()).or_default();
        label.address = address;
        label.defined = true;
    }

    /// Emit a jump/call opcode and reserve a 4-byte operand to be
    /// patched when the label resolves.
    fn emit_jump(&mut self, op: Opcode, label: &str) {
        self.emit(op);
        let pos = self.code.len();
        self.labels
            .entry(label.to_string())
            .or_default()
            .fixups
            .push(pos);
        self.emit_i32(0);
    }

    fn fixup_labels(&mut self) {
        let mut patches = Vec::new();
        for (name, label) in &self.labels {
            if !label.defined {
                eprintln!("Error: undefined label: {}", name);
                self.had_errors = true;
                continue;
            }
            for &pos in &label.fixups {
                patches.push((pos, label.address));
            }
        }
        for (pos, address) in patches {
            self.emit_i32_at(pos, address);
        }
    }

    /// Deduplicating string-table insert; returns the 0-based index.
    fn add_string(&mut self, s: &str) -> i32 {
        for (i, existing) in self.strings.iter().enumerate() {
            if existing == s {
                return i as i32;
            }
        }
        self.strings.push(s.to_string());
        (self.strings.len() - 1) as i32
    }

    // ----- scope stack -----

    fn enter_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn exit_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    fn define_symbol(&mut self, name: &str, symbol: Symbol) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), symbol);
        }
    }

    fn find_symbol(&self, name: &str) -> Option<Symbol> {
        for scope in self.scopes.iter().rev() {
            if let Some(sym) = scope.get(name) {
                return Some(sym.clone());
            }
        }
        None
    }

    /// Human-readable listing: resolved labels, then the code segment
    /// with operands decoded.
    pub fn dump_bytecode(&self) -> String {
        let mut out = String::new();
        out.push_str("=== Function Labels ===\n");
        let mut defined: Vec<(&String, &Label)> =
            self.labels.iter().filter(|(_, l)| l.defined).collect();
        defined.sort_by_key(|(_, l)| l.address);
        for (name, label) in defined {
            let _ = writeln!(out, "  {} @ address {}", name, label.address);
        }

        let _ = writeln!(out, "\n=== Generated Bytecode ===");
        let _ = writeln!(out, "Size: {} bytes\n", self.code.len());

        let mut i = 0;
        while i < self.code.len() {
            let byte = self.code[i];
            let _ = write!(out, "{:04}: ", i);
            i += 1;
            match Opcode::from_byte(byte) {
                Some(op) => {
                    let _ = write!(out, "{:?}", op);
                    if op.has_operand() && i + 4 <= self.code.len() {
                        let bytes: [u8; 4] = self.code[i..i + 4].try_into().unwrap_or_default();
                        if op == Opcode::Fpush {
                            let _ = write!(out, " {}", f32::from_le_bytes(bytes));
                        } else {
                            let _ = write!(out, " {}", i32::from_le_bytes(bytes));
                        }
                        i += 4;
                    }
                }
                None => {
                    let _ = write!(out, "0x{:02X}", byte);
                }
            }
            out.push('\n');
        }
        out
    }
}

/// A number literal is floating-point when it carries a dot or an
/// exponent; hex literals never are.
fn is_float_literal_str(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    if s.len() >= 2 && s.starts_with('0') && (s.as_bytes()[1] == b'x' || s.as_bytes()[1] == b'X') {
        return false;
    }
    s.contains('.') || s.contains('e') || s.contains('E')
}

/// Parse ignoring trailing C++ suffix characters (f, l, u).
fn parse_float_literal(s: &str) -> Option<f32> {
    let trimmed = s.trim_end_matches(|c| matches!(c, 'f' | 'F' | 'l' | 'L' | 'u' | 'U'));
    trimmed.parse::<f32>().ok()
}

fn parse_int_literal(s: &str) -> Option<i32> {
    let trimmed = s.trim_end_matches(|c| matches!(c, 'l' | 'L' | 'u' | 'U'));
    trimmed.parse::<i32>().ok()
}

fn is_float_type(type_tokens: &[String]) -> bool {
    type_tokens.iter().any(|t| t == "float" || t == "double")
}
