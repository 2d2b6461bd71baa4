//! Sentencias y estructuras de control.

use super::{Compiler, TokenStream};

use crate::{
    backpatch::Chain,
    code::{BitOp, Dest, FileOp, Instruction},
    error::{CompileError, Expected},
    lex::{Identifier, Keyword, Token},
    peephole,
    source::Located,
    symbols::Kind,
};

impl<T: TokenStream> Compiler<T> {
    /// `statement {";" statement}`
    ///
    /// Una sentencia que inicia sin `;` de por medio se reporta y se
    /// compila de todas formas.
    pub(super) fn stat_seq(&mut self) {
        loop {
            self.statement();

            if self.accept(&Token::Semicolon) {
                continue;
            } else if self.starts_statement() {
                self.error(CompileError::MissingToken(Expected::Semicolon));
            } else {
                break;
            }
        }
    }

    /// Sincroniza tras una secuencia que terminó en un token que no la
    /// cierra. Cada tramo de tokens sobrantes se reporta una vez como un
    /// `END` faltante y se descarta hasta el siguiente `;`, el inicio de
    /// otra sentencia o el cierre, a partir de donde la secuencia continúa.
    ///
    /// Retorna `true` si se reportó algún error.
    pub(super) fn recover(&mut self, allow_return: bool) -> bool {
        let mut reported = false;

        while self.lookahead.is_some() && !self.closes_sequence(allow_return) {
            self.error(CompileError::MissingToken(Expected::End));
            reported = true;

            while self.lookahead.is_some()
                && !self.closes_sequence(allow_return)
                && !self.is(&Token::Semicolon)
                && !self.starts_statement()
            {
                self.next_token();
            }

            self.accept(&Token::Semicolon);
            self.stat_seq();
        }

        reported
    }

    fn closes_sequence(&self, allow_return: bool) -> bool {
        match self.peek() {
            Some(Token::Keyword(Keyword::End)) => true,
            Some(Token::Keyword(Keyword::Return)) => allow_return,
            _ => false,
        }
    }

    fn starts_statement(&self) -> bool {
        use Keyword::*;

        match self.peek() {
            Some(Token::Id(_))
            | Some(Token::Bang)
            | Some(Token::Query)
            | Some(Token::OpenParen) => true,

            Some(Token::Keyword(keyword)) => {
                matches!(keyword, Inc | Dec | Rol | Ror | If | While | Repeat)
            }

            _ => false,
        }
    }

    /// Una sentencia, posiblemente vacía.
    fn statement(&mut self) {
        if let Some(name) = self.ident() {
            if self.accept(&Token::Becomes) {
                self.assignment(name);
            } else {
                self.call(name);
            }

            return;
        }

        let token = match self.peek() {
            Some(token) => token.clone(),
            None => return,
        };

        match token {
            Token::Keyword(Keyword::Inc) => self.primitive(FileOp::Incf),
            Token::Keyword(Keyword::Dec) => self.primitive(FileOp::Decf),
            Token::Keyword(Keyword::Rol) => self.primitive(FileOp::Rlf),
            Token::Keyword(Keyword::Ror) => self.primitive(FileOp::Rrf),

            // !x.n, !~x.n
            Token::Bang => {
                self.next_token();

                let op = if self.accept(&Token::Not) {
                    BitOp::Clear
                } else {
                    BitOp::Set
                };

                self.bit_operand(op);
            }

            // ?x.n, ?~x.n: espera activa
            Token::Query => {
                self.next_token();

                let op = if self.accept(&Token::Not) {
                    BitOp::SkipIfClear
                } else {
                    BitOp::SkipIfSet
                };

                if let Some(test) = self.bit_operand(op) {
                    self.code.emit(Instruction::Goto(test as u16));
                }
            }

            Token::OpenParen => {
                self.next_token();
                self.stat_seq();
                self.expect(&Token::CloseParen, Expected::CloseParen);
            }

            Token::Keyword(Keyword::If) => {
                self.next_token();
                self.if_statement();
            }

            Token::Keyword(Keyword::While) => {
                self.next_token();
                self.while_statement();
            }

            Token::Keyword(Keyword::Repeat) => {
                self.next_token();
                self.repeat_statement();
            }

            _ => (),
        }
    }

    /// `x := expression`
    fn assignment(&mut self, name: Located<Identifier>) {
        let x = self.resolve(&name);
        self.require(&x, Kind::Variable, name.location());

        let since = self.code.pc();
        self.expression();

        let reg = x.register();
        if !peephole::clear(&mut self.code, reg, since)
            && !peephole::fold_store(&mut self.code, reg, since)
        {
            self.code.emit(Instruction::file(FileOp::Movwf, Dest::F, reg));
        }
    }

    /// `p` o `p(expression)`
    fn call(&mut self, name: Located<Identifier>) {
        let p = self.resolve(&name);
        self.require(&p, Kind::Procedure, name.location());

        if self.accept(&Token::OpenParen) {
            if !self.is(&Token::CloseParen) {
                self.expression();
            }

            self.code.emit(Instruction::Call(p.address));
            self.expect(&Token::CloseParen, Expected::CloseParen);
        } else {
            self.code.emit(Instruction::Call(p.address));
        }
    }

    /// `INC x`, `DEC x`, `ROL x`, `ROR x`
    fn primitive(&mut self, op: FileOp) {
        self.next_token();

        match self.ident() {
            Some(name) => {
                let x = self.resolve(&name);
                self.require(&x, Kind::Variable, name.location());
                self.code.emit(Instruction::file(op, Dest::F, x.register()));
            }

            None => self.error(CompileError::MissingToken(Expected::Identifier)),
        }
    }

    /// `x ["." n]` como operando de una instrucción de bit. Retorna
    /// el índice de la instrucción emitida.
    fn bit_operand(&mut self, op: BitOp) -> Option<usize> {
        match self.ident() {
            Some(name) => {
                let x = self.resolve(&name);
                self.require(&x, Kind::Variable, name.location());

                let bit = self.index();
                Some(self.code.emit(Instruction::bit(op, bit, x.register())))
            }

            None => {
                self.error(CompileError::MissingToken(Expected::Identifier));
                None
            }
        }
    }

    /// `condition (THEN | DO) stmts`
    fn guarded(&mut self, keyword: Keyword, expected: Expected) -> Chain {
        let chain = self.condition();
        self.expect(&Token::Keyword(keyword), expected);
        self.stat_seq();

        chain
    }

    /// `IF c THEN s {ELSIF c THEN s} [ELSE s] END`
    fn if_statement(&mut self) {
        let mut next = self.guarded(Keyword::Then, Expected::Then);
        let mut exit = Chain::EMPTY;

        while self.accept(&Token::Keyword(Keyword::Elsif)) {
            exit = self.code.placeholder(exit);
            self.code.fixup(next, self.code.pc());
            next = self.guarded(Keyword::Then, Expected::Then);
        }

        if self.accept(&Token::Keyword(Keyword::Else)) {
            exit = self.code.placeholder(exit);
            self.code.fixup(next, self.code.pc());
            self.stat_seq();
        } else {
            self.code.fixup(next, self.code.pc());
        }

        self.expect(&Token::Keyword(Keyword::End), Expected::End);
        self.code.fixup(exit, self.code.pc());
    }

    /// `WHILE c DO s {ELSIF c DO s} END`
    fn while_statement(&mut self) {
        let top = self.code.pc();

        loop {
            let exit = self.guarded(Keyword::Do, Expected::Do);
            self.code.emit(Instruction::Goto(top as u16));
            self.code.fixup(exit, self.code.pc());

            if !self.accept(&Token::Keyword(Keyword::Elsif)) {
                break;
            }
        }

        self.expect(&Token::Keyword(Keyword::End), Expected::End);
    }

    /// `REPEAT s UNTIL c` o `REPEAT s END`
    fn repeat_statement(&mut self) {
        let top = self.code.pc();
        self.stat_seq();

        if self.accept(&Token::Keyword(Keyword::Until)) {
            let mut chain = self.condition();
            if let Some(fused) = peephole::decrement_skip(&mut self.code, chain, top) {
                chain = fused;
            }

            self.code.fixup(chain, top);
        } else if self.accept(&Token::Keyword(Keyword::End)) {
            self.code.emit(Instruction::Goto(top as u16));
        } else {
            self.error(CompileError::MissingToken(Expected::UntilOrEnd));
        }
    }
}
