//! Recursive-descent parser for the textual IL (§4.3.2). Aborts and
//! returns a diagnostic on the first error; there is no statement-level
//! recovery (out of scope per §4.3.2).
//!
//! Concrete surface syntax notes (resolving places where the grammar in
//! §4.3.1 is informative and the worked examples in §8.2 are shorthand):
//! - Every SSA result and every later use of it is written `%tN:TYPE`.
//!   Block parameters share the same `%tN` id space as instruction
//!   results (§3.7 invariant 1 treats them identically as "defined at
//!   block entry"); function-level formal parameters use a plain
//!   `%NAME:TYPE` and are a separate, ABI-facing namespace.
//! - A constant operand is always written as `TYPE LITERAL`, e.g.
//!   `i64 5`, `f64 0.0`, `str "x"`, matching `Value`'s own `Display`.
//! - `alloca`'s single operand is a bare, untyped byte-count integer.

use il_core::{Instr, Module, Opcode, Type, Value};
use il_support::{Diag, Expected, SourceLoc};

use crate::lexer::{Lexer, Token, TokenKind};

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    lookahead: Vec<Token>,
    file_id: u32,
}

impl<'a> Parser<'a> {
    pub fn new(src: &'a str, file_id: u32) -> Expected<Self> {
        let mut lexer = Lexer::new(src, file_id);
        let current = Self::lex_one(&mut lexer)?;
        Ok(Self { lexer, current, lookahead: Vec::new(), file_id })
    }

    fn lex_one(lexer: &mut Lexer<'a>) -> Expected<Token> {
        lexer.next_token().map_err(|(msg, loc)| Diag::error(msg).with_loc(loc).with_code("E_LEX"))
    }

    fn bump(&mut self) -> Expected<Token> {
        let next = if self.lookahead.is_empty() {
            Self::lex_one(&mut self.lexer)?
        } else {
            self.lookahead.remove(0)
        };
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn peek2(&mut self) -> Expected<&Token> {
        if self.lookahead.is_empty() {
            let tok = Self::lex_one(&mut self.lexer)?;
            self.lookahead.push(tok);
        }
        Ok(&self.lookahead[0])
    }

    fn err(&self, mnemonic: &str, message: impl Into<String>) -> Diag {
        Diag::error(format!("malformed {mnemonic}: {}", message.into()))
            .with_loc(self.current.loc)
            .with_code("E_MALFORMED")
    }

    fn expect_ident(&mut self, want: &str) -> Expected<()> {
        match &self.current.kind {
            TokenKind::Ident(s) if s == want => {
                self.bump()?;
                Ok(())
            }
            other => Err(self.err(want, format!("expected `{want}`, found {other:?}"))),
        }
    }

    fn expect(&mut self, want: TokenKind) -> Expected<()> {
        if self.current.kind == want {
            self.bump()?;
            Ok(())
        } else {
            Err(self.err("module", format!("expected {want:?}, found {:?}", self.current.kind)))
        }
    }

    fn take_at(&mut self) -> Expected<String> {
        match self.current.kind.clone() {
            TokenKind::At(name) => {
                self.bump()?;
                Ok(name)
            }
            other => Err(self.err("module", format!("expected @NAME, found {other:?}"))),
        }
    }

    fn take_ident(&mut self) -> Expected<String> {
        match self.current.kind.clone() {
            TokenKind::Ident(s) => {
                self.bump()?;
                Ok(s)
            }
            other => Err(self.err("module", format!("expected identifier, found {other:?}"))),
        }
    }

    fn parse_type(&mut self) -> Expected<Type> {
        let loc = self.current.loc;
        let name = self.take_ident()?;
        Type::from_mnemonic(&name)
            .ok_or_else(|| Diag::error(format!("unknown type `{name}`")).with_loc(loc).with_code("E_TYPE"))
    }

    /// `%tN:TYPE` in a result or use position.
    fn parse_temp(&mut self) -> Expected<(u32, Type)> {
        let loc = self.current.loc;
        let name = match self.current.kind.clone() {
            TokenKind::Percent(name) => name,
            other => return Err(self.err("temp", format!("expected %tN, found {other:?}")).with_loc(loc)),
        };
        let id = parse_temp_id(&name)
            .ok_or_else(|| Diag::error(format!("malformed temp id `%{name}`")).with_loc(loc).with_code("E_PARSE"))?;
        self.bump()?;
        self.expect(TokenKind::Colon)?;
        let ty = self.parse_type()?;
        Ok((id, ty))
    }

    fn parse_value(&mut self) -> Expected<Value> {
        let loc = self.current.loc;
        match self.current.kind.clone() {
            TokenKind::Percent(_) => {
                let (id, ty) = self.parse_temp()?;
                Ok(Value::Temp(id, ty))
            }
            TokenKind::At(name) => {
                self.bump()?;
                Ok(Value::GlobalRef(name))
            }
            TokenKind::Ident(s) if s == "null" => {
                self.bump()?;
                Ok(Value::NullPtr)
            }
            TokenKind::Ident(type_name) => {
                let ty = Type::from_mnemonic(&type_name)
                    .ok_or_else(|| Diag::error(format!("unknown value type `{type_name}`")).with_loc(loc).with_code("E_TYPE"))?;
                self.bump()?;
                match (&self.current.kind, ty) {
                    (TokenKind::Int(v), _) if ty.is_integer() => {
                        let v = *v;
                        self.bump()?;
                        Ok(Value::ConstInt(v, ty))
                    }
                    (TokenKind::Float(v), Type::F64) => {
                        let v = *v;
                        self.bump()?;
                        Ok(Value::ConstFloat(v))
                    }
                    (TokenKind::Int(v), Type::F64) => {
                        let v = *v as f64;
                        self.bump()?;
                        Ok(Value::ConstFloat(v))
                    }
                    (TokenKind::Str(s), Type::Str) => {
                        let s = s.clone();
                        self.bump()?;
                        Ok(Value::ConstStr(s))
                    }
                    other => Err(Diag::error(format!("malformed constant of type `{type_name}`, found {other:?}"))
                        .with_loc(loc)
                        .with_code("E_PARSE")),
                }
            }
            other => Err(Diag::error(format!("expected a value, found {other:?}")).with_loc(loc).with_code("E_PARSE")),
        }
    }

    fn parse_value_list(&mut self) -> Expected<Vec<Value>> {
        let mut out = Vec::new();
        if matches!(self.current.kind, TokenKind::RParen) {
            return Ok(out);
        }
        loop {
            out.push(self.parse_value()?);
            if matches!(self.current.kind, TokenKind::Comma) {
                self.bump()?;
            } else {
                break;
            }
        }
        Ok(out)
    }

    pub fn parse_module(&mut self) -> Expected<Module> {
        self.expect_ident("il")?;
        let version = match self.current.kind.clone() {
            TokenKind::Version(v) => {
                self.bump()?;
                v
            }
            TokenKind::Int(v) => {
                self.bump()?;
                v.to_string()
            }
            other => return Err(self.err("module", format!("expected a version string, found {other:?}"))),
        };
        let mut module = Module::new(version);
        loop {
            match self.current.kind.clone() {
                TokenKind::Ident(kw) if kw == "extern" => self.parse_extern(&mut module)?,
                TokenKind::Ident(kw) if kw == "global" => self.parse_global(&mut module)?,
                TokenKind::Ident(kw) if kw == "func" => self.parse_function(&mut module)?,
                TokenKind::Eof => break,
                other => {
                    return Err(self.err("module", format!("expected extern/global/func/EOF, found {other:?}")))
                }
            }
        }
        Ok(module)
    }

    fn parse_extern(&mut self, module: &mut Module) -> Expected<()> {
        self.expect_ident("extern")?;
        let name = self.take_at()?;
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if !matches!(self.current.kind, TokenKind::RParen) {
            loop {
                params.push(self.parse_type()?);
                if matches!(self.current.kind, TokenKind::Comma) {
                    self.bump()?;
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::Arrow)?;
        let ret = self.parse_type()?;
        if module.find_extern(&name).is_some() {
            return Err(Diag::error(format!("duplicate extern `@{name}`")).with_code("E_DUP_EXTERN"));
        }
        module.add_extern(il_core::Extern::new(name, ret, params));
        Ok(())
    }

    fn parse_global(&mut self, module: &mut Module) -> Expected<()> {
        self.expect_ident("global")?;
        let name = self.take_at()?;
        self.expect(TokenKind::Colon)?;
        let ty = self.parse_type()?;
        let mut global = il_core::Global::new(name.clone(), ty);
        if matches!(self.current.kind, TokenKind::Eq) {
            self.bump()?;
            let init = self.parse_value()?;
            global = global.with_initializer(init.to_string());
        }
        if module.find_global(&name).is_some() {
            return Err(Diag::error(format!("duplicate global `@{name}`")).with_code("E_DUP_GLOBAL"));
        }
        module.add_global(global);
        Ok(())
    }

    fn parse_function(&mut self, module: &mut Module) -> Expected<()> {
        self.expect_ident("func")?;
        let name = self.take_at()?;
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if !matches!(self.current.kind, TokenKind::RParen) {
            loop {
                let pname = self.take_percent_name()?;
                self.expect(TokenKind::Colon)?;
                let ty = self.parse_type()?;
                params.push(il_core::Param::new(pname, ty));
                if matches!(self.current.kind, TokenKind::Comma) {
                    self.bump()?;
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::Arrow)?;
        let ret_ty = self.parse_type()?;
        self.expect(TokenKind::LBrace)?;
        let mut func = il_core::Function::new(name.clone(), ret_ty);
        func.params = params;
        if module.find_function(&name).is_some() {
            return Err(Diag::error(format!("duplicate function `@{name}`")).with_code("E_DUP_FUNC"));
        }
        while !matches!(self.current.kind, TokenKind::RBrace) {
            let block = self.parse_block()?;
            if func.block(&block.label).is_some() {
                return Err(Diag::error(format!("duplicate label `{}`", block.label)).with_code("E_DUP_LABEL"));
            }
            func.blocks.push(block);
        }
        self.expect(TokenKind::RBrace)?;
        module.add_function(func);
        Ok(())
    }

    fn take_percent_name(&mut self) -> Expected<String> {
        match self.current.kind.clone() {
            TokenKind::Percent(name) => {
                self.bump()?;
                Ok(name)
            }
            other => Err(self.err("param", format!("expected %NAME, found {other:?}"))),
        }
    }

    fn parse_block(&mut self) -> Expected<il_core::BasicBlock> {
        let label = self.take_ident()?;
        let mut block = il_core::BasicBlock::new(label);
        if matches!(self.current.kind, TokenKind::LParen) {
            self.bump()?;
            if !matches!(self.current.kind, TokenKind::RParen) {
                loop {
                    let (id, ty) = self.parse_temp()?;
                    block = block.with_param(id, ty);
                    if matches!(self.current.kind, TokenKind::Comma) {
                        self.bump()?;
                    } else {
                        break;
                    }
                }
            }
            self.expect(TokenKind::RParen)?;
        }
        self.expect(TokenKind::Colon)?;
        let mut cur_loc = SourceLoc::new(self.file_id, self.current.loc.line, self.current.loc.column);
        if matches!(self.current.kind, TokenKind::Dot) {
            cur_loc = self.parse_loc_directive()?;
        }
        block.entry_loc = cur_loc;
        loop {
            match &self.current.kind {
                TokenKind::RBrace => break,
                TokenKind::Ident(_) if self.starts_new_label()? => break,
                _ => {}
            }
            if matches!(self.current.kind, TokenKind::Dot) {
                cur_loc = self.parse_loc_directive()?;
                continue;
            }
            let instr = self.parse_instr(cur_loc)?;
            block.push(instr);
        }
        Ok(block)
    }

    fn parse_loc_directive(&mut self) -> Expected<SourceLoc> {
        self.expect(TokenKind::Dot)?;
        self.expect_ident("loc")?;
        let file_id = self.take_int()? as u32;
        let line = self.take_int()? as u32;
        let col = self.take_int()? as u32;
        Ok(SourceLoc::new(file_id, line, col))
    }

    fn take_int(&mut self) -> Expected<i64> {
        match self.current.kind {
            TokenKind::Int(v) => {
                self.bump()?;
                Ok(v)
            }
            _ => Err(self.err(".loc", format!("expected an integer, found {:?}", self.current.kind))),
        }
    }

    /// A label starts a new block when it's an identifier immediately
    /// followed by `(` or `:` — distinguishing it from a bare mnemonic
    /// (which is always followed by an operand or another instruction
    /// token, never directly by `:`).
    fn starts_new_label(&mut self) -> Expected<bool> {
        Ok(matches!(self.peek2()?.kind, TokenKind::LParen | TokenKind::Colon))
    }

    fn parse_instr(&mut self, loc: SourceLoc) -> Expected<Instr> {
        let mut result = None;
        if matches!(self.current.kind, TokenKind::Percent(_)) {
            let (id, ty) = self.parse_temp()?;
            self.expect(TokenKind::Eq)?;
            result = Some((id, ty));
        }
        let mnemonic_loc = self.current.loc;
        let mnemonic = self.take_ident()?;
        let opcode = Opcode::from_mnemonic(&mnemonic)
            .ok_or_else(|| Diag::error(format!("unknown opcode `{mnemonic}`")).with_loc(mnemonic_loc).with_code("E_UNKNOWN_OPCODE"))?;

        let mut instr = Instr::new(opcode).with_loc(loc);
        if let Some((id, ty)) = result {
            instr = instr.with_result(id, ty);
        }

        match opcode {
            Opcode::Alloca => {
                let size = self.take_int()?;
                instr = instr.with_operands(vec![Value::ConstInt(size, Type::I64)]);
            }
            Opcode::Call => {
                let callee = self.take_at()?;
                self.expect(TokenKind::LParen)?;
                let args = self.parse_value_list()?;
                self.expect(TokenKind::RParen)?;
                instr = instr.with_callee(callee).with_operands(args);
            }
            Opcode::Br => {
                instr = self.parse_branch_target(instr)?;
            }
            Opcode::CBr => {
                let cond = self.parse_value()?;
                instr = instr.with_operands(vec![cond]);
                self.expect(TokenKind::Comma)?;
                instr = self.parse_branch_target(instr)?;
                self.expect(TokenKind::Comma)?;
                instr = self.parse_branch_target(instr)?;
            }
            Opcode::Ret => {
                if self.current_starts_value() {
                    let v = self.parse_value()?;
                    instr = instr.with_operands(vec![v]);
                }
            }
            Opcode::Trap => {}
            _ => {
                let operands = self.parse_value_list()?;
                instr = instr.with_operands(operands);
            }
        }
        Ok(instr)
    }

    /// Whether the current token can begin a `value` production. Must
    /// reject a plain label identifier (e.g. the next block's label
    /// immediately following a void `ret`), so only `null` or a known
    /// type mnemonic count as value-starting idents.
    fn current_starts_value(&self) -> bool {
        match &self.current.kind {
            TokenKind::Percent(_) | TokenKind::At(_) => true,
            TokenKind::Ident(s) => s == "null" || Type::from_mnemonic(s).is_some(),
            _ => false,
        }
    }

    /// Parses `label LABEL ( args,* )?` and appends it as the next
    /// successor of `instr`.
    fn parse_branch_target(&mut self, instr: Instr) -> Expected<Instr> {
        self.expect_ident("label")?;
        let label = self.take_ident()?;
        let mut args = Vec::new();
        if matches!(self.current.kind, TokenKind::LParen) {
            self.bump()?;
            args = self.parse_value_list()?;
            match self.current.kind {
                TokenKind::RParen => {
                    self.bump()?;
                }
                _ => {
                    return Err(self.err(
                        instr.opcode.mnemonic(),
                        format!("expected `)` after branch arguments, found {:?}", self.current.kind),
                    ))
                }
            }
        }
        Ok(instr.with_successor(label, args))
    }
}

fn parse_temp_id(name: &str) -> Option<u32> {
    let digits = name.strip_prefix('t')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Parses a complete textual IL module.
pub fn parse_module(src: &str, file_id: u32) -> Expected<Module> {
    let mut parser = Parser::new(src, file_id)?;
    parser.parse_module()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_trivial_module() {
        let src = "il 0.1.2\nfunc @main() -> i64 {\nentry:\n  ret i64 0\n}\n";
        let module = parse_module(src, 1).unwrap();
        assert_eq!(module.version, "0.1.2");
        assert_eq!(module.functions.len(), 1);
        assert_eq!(module.functions[0].blocks[0].instrs.len(), 1);
    }

    #[test]
    fn parses_extern_and_call() {
        let src = "il 0.1.2\nextern @rt_concat(str, str) -> str\nfunc @main() -> void {\nentry:\n  %t0:str = call @rt_concat(str \"a\", str \"b\")\n  ret\n}\n";
        let module = parse_module(src, 1).unwrap();
        assert_eq!(module.externs.len(), 1);
        let call = &module.functions[0].blocks[0].instrs[0];
        assert_eq!(call.callee.as_deref(), Some("rt_concat"));
        assert_eq!(call.operands.len(), 2);
    }

    #[test]
    fn parses_diamond_with_block_params() {
        let src = "il 0.1.2\nfunc @main() -> i64 {\nentry:\n  %t1:i1 = icmp_eq i64 0, i64 0\n  cbr %t1:i1, label T, label F\nT:\n  br label Join(i64 2)\nF:\n  br label Join(i64 3)\nJoin(%t2:i64):\n  ret %t2:i64\n}\n";
        let module = parse_module(src, 1).unwrap();
        let func = &module.functions[0];
        assert_eq!(func.blocks.len(), 4);
        let join = func.block("Join").unwrap();
        assert_eq!(join.params.len(), 1);
    }

    #[test]
    fn unknown_opcode_is_an_error() {
        let src = "il 0.1.2\nfunc @main() -> void {\nentry:\n  bogus_op\n}\n";
        let err = parse_module(src, 1).unwrap_err();
        assert_eq!(err.code, Some("E_UNKNOWN_OPCODE"));
    }

    #[test]
    fn duplicate_label_is_an_error() {
        let src = "il 0.1.2\nfunc @main() -> void {\nentry:\n  ret\nentry:\n  ret\n}\n";
        let err = parse_module(src, 1).unwrap_err();
        assert_eq!(err.code, Some("E_DUP_LABEL"));
    }
}
