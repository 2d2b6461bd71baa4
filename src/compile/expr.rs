//! Expresiones aritméticas y condiciones.
//!
//! Una expresión deja su resultado en `W`. Un término de condición
//! termina en una prueba de bit que salta la siguiente palabra si el
//! término es verdadero; [`Compiler::condition()`] coloca esa siguiente
//! palabra como salto pendiente hacia la rama falsa.

use super::{Compiler, TokenStream};

use crate::{
    backpatch::Chain,
    code::{BitOp, Dest, FileOp, Instruction, LiteralOp, CARRY, STATUS, ZERO},
    error::{CompileError, Expected},
    lex::{Identifier, Keyword, Token},
    source::Location,
    symbols::{Entry, Kind, Type},
};

/// Operando de una expresión o relación.
struct Operand {
    entry: Entry,
    location: Location,
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Dyadic {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl<T: TokenStream> Compiler<T> {
    /// `operand ["(" [expression] ")" | op operand]`
    pub(super) fn expression(&mut self) {
        let x = self.operand();

        if self.accept(&Token::OpenParen) {
            self.require(&x.entry, Kind::Procedure, &x.location);
            if !self.is(&Token::CloseParen) {
                self.expression();
            }

            self.code.emit(Instruction::Call(x.entry.address));
            self.expect(&Token::CloseParen, Expected::CloseParen);
            return;
        }

        let op = match self.peek() {
            Some(Token::Plus) => Dyadic::Add,
            Some(Token::Minus) => Dyadic::Subtract,
            Some(Token::Times) => Dyadic::Multiply,
            Some(Token::Slash) => Dyadic::Divide,
            _ => {
                self.load(&x);
                return;
            }
        };

        let at = self.here.clone();
        self.next_token();

        let y = self.operand();
        self.dyadic(op, x, y, at);
    }

    /// `term {"&" term} | term {OR term}`
    ///
    /// Retorna la cadena de saltos que deben llevar a la rama falsa.
    pub(super) fn condition(&mut self) -> Chain {
        self.term();
        let mut chain = self.code.placeholder(Chain::EMPTY);

        if self.is(&Token::And) {
            while self.accept(&Token::And) {
                self.term();
                chain = self.code.placeholder(chain);
            }
        } else if self.is(&Token::Keyword(Keyword::Or)) {
            while self.accept(&Token::Keyword(Keyword::Or)) {
                self.term();
                chain = self.code.placeholder(chain);
            }

            chain = self.code.disjunction(chain);
        }

        chain
    }

    /// `ident ["." n] | "~" ident ["." n] | ident relation operand`
    fn term(&mut self) {
        if self.accept(&Token::Not) {
            match self.ident() {
                Some(name) => {
                    let x = self.resolve(&name);
                    self.test_bit(BitOp::SkipIfClear, &x, name.location());
                }

                None => self.error(CompileError::MissingToken(Expected::Identifier)),
            }

            return;
        }

        let name = match self.ident() {
            Some(name) => name,
            None => {
                self.error(CompileError::MissingToken(Expected::Operand));
                return;
            }
        };

        let x = Operand {
            entry: self.resolve(&name),
            location: name.location().clone(),
        };

        match self.peek() {
            Some(token) if token.is_relation() => {
                let relation = token.clone();
                self.next_token();

                let y = self.operand();
                self.relation(&relation, x, y);
            }

            _ => self.test_bit(BitOp::SkipIfSet, &x.entry, &x.location),
        }
    }

    /// Prueba de un bit de una variable.
    fn test_bit(&mut self, op: BitOp, x: &Entry, location: &Location) {
        self.require(x, Kind::Variable, location);

        let bit = self.index();
        self.code.emit(Instruction::bit(op, bit, x.register()));
    }

    /// Compara `x` contra `y` a través de una resta y prueba la bandera
    /// correspondiente de `STATUS`.
    fn relation(&mut self, relation: &Token, x: Operand, y: Operand) {
        self.require(&x.entry, Kind::Variable, &x.location);
        let reg = x.entry.register();

        match relation {
            // W := x - y
            Token::Equal | Token::NotEqual | Token::GreaterOrEqual | Token::Less => {
                let zero_test = matches!(relation, Token::Equal | Token::NotEqual);
                if zero_test && y.entry.kind == Kind::Constant && y.entry.value() == 0 {
                    self.code.emit(Instruction::file(FileOp::Movf, Dest::W, reg));
                } else {
                    self.load(&y);
                    self.code.emit(Instruction::file(FileOp::Subwf, Dest::W, reg));
                }
            }

            // W := y - x
            _ => {
                self.code.emit(Instruction::file(FileOp::Movf, Dest::W, reg));
                match y.entry.kind {
                    Kind::Variable => {
                        let reg = y.entry.register();
                        self.code.emit(Instruction::file(FileOp::Subwf, Dest::W, reg));
                    }

                    Kind::Constant => {
                        let instruction = Instruction::literal(LiteralOp::Sublw, y.entry.value());
                        self.code.emit(instruction);
                    }

                    _ => {
                        self.require(&y.entry, Kind::Variable, &y.location);
                    }
                }
            }
        }

        let (op, bit) = match relation {
            Token::Equal => (BitOp::SkipIfSet, ZERO),
            Token::NotEqual => (BitOp::SkipIfClear, ZERO),
            Token::GreaterOrEqual | Token::LessOrEqual => (BitOp::SkipIfSet, CARRY),
            _ => (BitOp::SkipIfClear, CARRY),
        };

        self.code.emit(Instruction::bit(op, bit, STATUS));
    }

    /// `["." n]`, selector de bit. El bit 0 es implícito.
    pub(super) fn index(&mut self) -> u8 {
        if !self.accept(&Token::Period) {
            return 0;
        }

        match self.peek() {
            Some(&Token::IntLiteral(bit)) if bit < 8 => {
                self.next_token();
                bit
            }

            Some(Token::IntLiteral(_)) => {
                self.error(CompileError::MissingToken(Expected::BitIndex));
                self.next_token();
                0
            }

            _ => {
                self.error(CompileError::MissingToken(Expected::Number));
                0
            }
        }
    }

    /// Dos operandos y un operador, con resultado en `W`.
    fn dyadic(&mut self, op: Dyadic, x: Operand, y: Operand, at: Location) {
        if op == Dyadic::Divide {
            self.error_at(at, CompileError::UnsupportedOperation("division"));
            return;
        }

        if let (Some(left), Some(right)) = (x.entry.typ, y.entry.typ) {
            if left != right {
                let location = y.location.clone();
                self.error_at(location, CompileError::TypeMismatch { left, right });
            }
        }

        // x ± 1 sobre enteros
        let unit_step = x.entry.kind == Kind::Variable
            && x.entry.typ == Some(Type::Int)
            && y.entry.kind == Kind::Constant
            && y.entry.typ == Some(Type::Int)
            && y.entry.value() == 1;

        match op {
            Dyadic::Add if unit_step => {
                let instruction = Instruction::file(FileOp::Incf, Dest::W, x.entry.register());
                self.code.emit(instruction);
                return;
            }

            Dyadic::Subtract if unit_step => {
                let instruction = Instruction::file(FileOp::Decf, Dest::W, x.entry.register());
                self.code.emit(instruction);
                return;
            }

            _ => (),
        }

        self.load(&y);

        match x.entry.kind {
            Kind::Variable | Kind::Constant => (),
            _ => {
                self.require(&x.entry, Kind::Variable, &x.location);
                return;
            }
        }

        let typ = match x.entry.typ {
            Some(typ) => typ,
            None => return,
        };

        let (file, literal) = match (op, typ) {
            (Dyadic::Add, Type::Int) => (FileOp::Addwf, LiteralOp::Addlw),
            (Dyadic::Subtract, Type::Int) => (FileOp::Subwf, LiteralOp::Sublw),
            (Dyadic::Add, _) => (FileOp::Iorwf, LiteralOp::Iorlw),
            (Dyadic::Subtract, _) => (FileOp::Xorwf, LiteralOp::Xorlw),
            (Dyadic::Multiply, Type::Int) => {
                self.error_at(at, CompileError::UnsupportedOperation("multiplication of INT"));
                return;
            }

            (_, _) => (FileOp::Andwf, LiteralOp::Andlw),
        };

        let instruction = match x.entry.kind {
            Kind::Constant => Instruction::literal(literal, x.entry.value()),
            _ => Instruction::file(file, Dest::W, x.entry.register()),
        };

        self.code.emit(instruction);
    }

    /// Carga un operando simple en `W`.
    fn load(&mut self, x: &Operand) {
        match x.entry.kind {
            Kind::Variable => {
                let instruction = Instruction::file(FileOp::Movf, Dest::W, x.entry.register());
                self.code.emit(instruction);
            }

            Kind::Constant => {
                let instruction = Instruction::literal(LiteralOp::Movlw, x.entry.value());
                self.code.emit(instruction);
            }

            Kind::Procedure => {
                self.require(&x.entry, Kind::Variable, &x.location);
            }

            Kind::Undefined => (),
        }
    }

    /// Un identificador o un literal.
    fn operand(&mut self) -> Operand {
        if let Some(name) = self.ident() {
            let location = name.location().clone();
            let entry = self.resolve(&name);

            return Operand { entry, location };
        }

        let location = self.here.clone();
        let entry = match self.literal() {
            Some((value, typ)) => {
                let text = match typ {
                    Type::Int => value.to_string(),
                    _ => format!("${:02X}", value),
                };

                Entry::constant(Identifier::from(text.as_str()), typ, value)
            }

            None => {
                self.error(CompileError::MissingToken(Expected::Operand));
                Entry::undefined(Identifier::from("?"))
            }
        };

        Operand { entry, location }
    }
}

#[cfg(test)]
mod tests {
    use crate::compile::tests::{body, codes, compile};

    #[test]
    fn variable_plus_variable() {
        assert_eq!(
            body("MODULE M; INT a, b, c; BEGIN a := b + c END M."),
            vec!["MOVF    0x0E,W", "ADDWF   0x0D,W", "MOVWF   0x0C"]
        );
    }

    #[test]
    fn constant_on_the_left_uses_literal_forms() {
        assert_eq!(
            body("MODULE M; INT a, b; BEGIN a := 10 - b END M."),
            vec!["MOVF    0x0D,W", "SUBLW   0x0A", "MOVWF   0x0C"]
        );
    }

    #[test]
    fn set_operators() {
        assert_eq!(
            body("MODULE M; SET s, t; BEGIN s := t + $01; s := t - $02; s := t * $03 END M."),
            vec![
                "MOVLW   0x01",
                "IORWF   0x0D,W",
                "MOVWF   0x0C",
                "MOVLW   0x02",
                "XORWF   0x0D,W",
                "MOVWF   0x0C",
                "MOVLW   0x03",
                "ANDWF   0x0D,W",
                "MOVWF   0x0C",
            ]
        );
    }

    #[test]
    fn unit_steps() {
        assert_eq!(
            body("MODULE M; INT a, b; BEGIN b := a + 1; b := a - 1 END M."),
            vec!["INCF    0x0C,W", "MOVWF   0x0D", "DECF    0x0C,W", "MOVWF   0x0D"]
        );
    }

    #[test]
    fn function_call_result() {
        assert_eq!(
            body(
                "MODULE M; INT a;
                 PROCEDURE f(INT x): INT; BEGIN RETURN x + 2 END f;
                 BEGIN a := f(a) END M."
            ),
            vec![
                "MOVWF   0x0D",
                "MOVLW   0x02",
                "ADDWF   0x0D,W",
                "RETURN",
                "MOVF    0x0C,W",
                "CALL    0x001",
                "MOVWF   0x0C",
            ]
        );
    }

    #[test]
    fn relations_against_variables() {
        let relations = [
            ("=", vec!["MOVF    0x0D,W", "SUBWF   0x0C,W", "BTFSS   0x03,2"]),
            ("#", vec!["MOVF    0x0D,W", "SUBWF   0x0C,W", "BTFSC   0x03,2"]),
            (">=", vec!["MOVF    0x0D,W", "SUBWF   0x0C,W", "BTFSS   0x03,0"]),
            ("<", vec!["MOVF    0x0D,W", "SUBWF   0x0C,W", "BTFSC   0x03,0"]),
            ("<=", vec!["MOVF    0x0C,W", "SUBWF   0x0D,W", "BTFSS   0x03,0"]),
            (">", vec!["MOVF    0x0C,W", "SUBWF   0x0D,W", "BTFSC   0x03,0"]),
        ];

        for (relation, expected) in relations.iter() {
            let text = format!("MODULE M; INT a, b; BEGIN IF a {} b THEN END END M.", relation);
            let mut expected = expected.clone();
            expected.push("GOTO    0x005");

            assert_eq!(body(&text), expected, "{}", relation);
        }
    }

    #[test]
    fn relations_against_constants() {
        assert_eq!(
            body("MODULE M; INT a; BEGIN IF a = 0 THEN END END M."),
            vec!["MOVF    0x0C,W", "BTFSS   0x03,2", "GOTO    0x004"]
        );

        assert_eq!(
            body("MODULE M; INT a; BEGIN IF a < 0 THEN END END M."),
            vec!["MOVLW   0x00", "SUBWF   0x0C,W", "BTFSC   0x03,0", "GOTO    0x005"]
        );

        assert_eq!(
            body("MODULE M; INT a; BEGIN IF a > 7 THEN END END M."),
            vec!["MOVF    0x0C,W", "SUBLW   0x07", "BTFSC   0x03,0", "GOTO    0x005"]
        );
    }

    #[test]
    fn bit_terms() {
        assert_eq!(
            body("MODULE M; BEGIN IF A.3 & ~B THEN END END M."),
            vec!["BTFSS   0x05,3", "GOTO    0x005", "BTFSC   0x06,0", "GOTO    0x005"]
        );
    }

    #[test]
    fn disjunction_jumps_into_the_body() {
        assert_eq!(
            body("MODULE M; INT a; BEGIN IF A.0 OR A.1 THEN INC a END END M."),
            vec![
                "BTFSC   0x05,0",
                "GOTO    0x005",
                "BTFSS   0x05,1",
                "GOTO    0x006",
                "INCF    0x0C,F",
            ]
        );
    }

    #[test]
    fn multiplication_of_integers_is_rejected() {
        let compilation = compile("MODULE M; INT a, b; BEGIN a := a * b END M.");
        assert_eq!(codes(&compilation), vec![11]);
    }

    #[test]
    fn division_is_rejected() {
        let compilation = compile("MODULE M; INT a, b; BEGIN a := a / b END M.");
        assert_eq!(codes(&compilation), vec![11]);
    }

    #[test]
    fn operand_types_must_agree() {
        let compilation = compile("MODULE M; INT a; SET s; BEGIN a := a + s END M.");
        assert_eq!(codes(&compilation), vec![111]);
    }

    #[test]
    fn procedure_without_parentheses_is_not_a_value() {
        let compilation = compile("MODULE M; INT a; PROCEDURE p; BEGIN END p; BEGIN a := p END M.");
        assert_eq!(codes(&compilation), vec![2]);
    }

    #[test]
    fn undefined_names_do_not_cascade() {
        let compilation = compile("MODULE M; INT a; BEGIN a := zz + 3; IF zz < a THEN END END M.");
        assert_eq!(codes(&compilation), vec![10, 10]);
    }

    #[test]
    fn bit_index_out_of_range() {
        let compilation = compile("MODULE M; BEGIN IF A.9 THEN END END M.");
        assert_eq!(codes(&compilation), vec![11]);
    }
}
