//! Análisis sintáctico con generación inmediata de código.
//!
//! # Una sola pasada
//! No existe un árbol sintáctico. Cada producción de la gramática es un
//! método de [`Compiler`] que consume tokens de izquierda a derecha y
//! emite instrucciones conforme los reconoce. Los saltos hacia adelante
//! se resuelven por medio de [`crate::backpatch`] y algunas secuencias se
//! compactan al momento con las reglas de [`crate::peephole`].
//!
//! # Sesión
//! Todo el estado mutable de una compilación vive en la sesión: el token
//! de lookahead, la tabla de símbolos, el buffer de código, el contador de
//! registros de datos y los errores acumulados. Una sesión se construye
//! por cada compilación y se consume al terminar.
//!
//! # Recuperación
//! Ningún error aborta el análisis. Un token faltante se reporta y se
//! continúa como si hubiese estado presente; un nombre no declarado se
//! sustituye por una entrada [`Kind::Undefined`], la cual nunca causa
//! errores adicionales de clase o tipo.

mod expr;
mod stmt;

use crate::{
    backpatch::Chain,
    code::{CodeBuffer, Control, Dest, FileOp, Instruction, CODE_SIZE, REGISTER_MASK},
    error::{CompileError, Diagnostics, Expected},
    lex::{Identifier, Keyword, LexerError, Token},
    source::{Located, Location},
    symbols::{Entry, Kind, SymbolTable, Type},
};

/// Primer registro de propósito general.
pub const DATA_START: usize = 0x0C;

/// Un flujo de tokens, tal como lo produce [`crate::lex::Lexer`].
pub trait TokenStream: Iterator<Item = Result<Located<Token>, Located<LexerError>>> {}

impl<I> TokenStream for I where I: Iterator<Item = Result<Located<Token>, Located<LexerError>>> {}

/// Resultado de compilar un módulo.
#[derive(Debug)]
pub struct Compilation {
    pub code: CodeBuffer,
    pub symbols: SymbolTable,
    pub diagnostics: Diagnostics,
}

impl Compilation {
    /// Imagen binaria, palabra por palabra.
    pub fn image(&self) -> Vec<u16> {
        self.code.image()
    }

    /// Cantidad de errores reportados.
    pub fn errors(&self) -> usize {
        self.diagnostics.len()
    }

    /// Determina si el programa puede descargarse al dispositivo.
    pub fn succeeded(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Sesión de compilación.
pub struct Compiler<T> {
    tokens: T,
    lookahead: Option<Located<Token>>,
    here: Location,
    code: CodeBuffer,
    symbols: SymbolTable,
    data: usize,
    diagnostics: Diagnostics,
}

impl<T: TokenStream> Compiler<T> {
    /// Crea una sesión nueva. `start` se utiliza para reportar errores
    /// en un archivo vacío.
    pub fn new(start: Location, tokens: T) -> Self {
        let mut compiler = Compiler {
            tokens,
            lookahead: None,
            here: start,
            code: CodeBuffer::new(),
            symbols: SymbolTable::with_hardware(),
            data: DATA_START,
            diagnostics: Default::default(),
        };

        compiler.next_token();
        compiler
    }

    /// Compila un módulo completo y consume la sesión.
    pub fn run(mut self) -> Compilation {
        // La palabra 0 siempre es el salto al cuerpo del módulo
        let entry = self.code.placeholder(Chain::EMPTY);
        self.module(entry);

        if self.code.pc() > CODE_SIZE {
            let pc = self.code.pc();
            self.error(CompileError::CodeOverflow(pc));
        }

        if self.data > REGISTER_MASK as usize + 1 {
            let last = self.data - 1;
            self.error(CompileError::DataOverflow(last));
        }

        log::debug!(
            "compiled {} words, {} data registers, {} errors",
            self.code.pc(),
            self.data - DATA_START,
            self.diagnostics.len()
        );

        Compilation {
            code: self.code,
            symbols: self.symbols,
            diagnostics: self.diagnostics,
        }
    }

    /// `[MODULE name ";"] [CONST ...] {type ident {"," ident} [";"]}
    /// {PROCEDURE ...} [BEGIN stmts] END [name] ["."]`
    fn module(&mut self, entry: Chain) {
        let mut name = None;
        if self.accept(&Token::Keyword(Keyword::Module)) {
            name = self.expect_ident();
            self.expect(&Token::Semicolon, Expected::Semicolon);
        }

        if self.accept(&Token::Keyword(Keyword::Const)) {
            self.constants();
        }

        self.variables(false);
        while self.accept(&Token::Keyword(Keyword::Procedure)) {
            self.procedure();
        }

        let body = self.code.pc();
        log::debug!("module body starts at {:#05x}", body);
        self.code.fixup(entry, body);

        if self.accept(&Token::Keyword(Keyword::Begin)) {
            self.stat_seq();
        }

        let recovered = self.recover(false);
        if self.accept(&Token::Keyword(Keyword::End)) {
            match (self.ident(), name) {
                (Some(trailer), Some(name)) => self.check_trailer(&name, trailer),
                (None, Some(_)) => {
                    self.error(CompileError::MissingToken(Expected::Identifier))
                }
                _ => (),
            }

            if !self.accept(&Token::Period) && self.lookahead.is_some() {
                self.error(CompileError::MissingToken(Expected::Period));
            }
        } else if !recovered {
            self.error(CompileError::MissingToken(Expected::End));
        }
    }

    /// `{name "=" literal ";"}`
    fn constants(&mut self) {
        while let Some(name) = self.ident() {
            self.expect(&Token::Equal, Expected::Equal);
            let (value, typ) = match self.literal() {
                Some(literal) => literal,
                None => {
                    self.error(CompileError::MissingToken(Expected::Number));
                    (0, Type::Int)
                }
            };

            self.symbols
                .declare(Entry::constant(name.into_inner(), typ, value));

            self.expect(&Token::Semicolon, Expected::Semicolon);
        }
    }

    /// `{type ident {"," ident} ";"}`
    ///
    /// A nivel de módulo el `;` final de cada grupo es opcional.
    fn variables(&mut self, require_semicolon: bool) {
        while let Some(typ) = self.typ() {
            while let Some(name) = self.ident() {
                let slot = self.allocate();
                self.symbols
                    .declare(Entry::variable(name.into_inner(), typ, slot));

                self.accept(&Token::Comma);
            }

            if !self.accept(&Token::Semicolon) && require_semicolon {
                self.error(CompileError::MissingToken(Expected::Semicolon));
            }
        }
    }

    /// `name ["(" [type ident] ")"] [":" type] ";" {type ident {"," ident} ";"}
    /// BEGIN stmts [RETURN expr] END name ";"`
    ///
    /// El parámetro, si existe, llega en `W` y la primera instrucción del
    /// procedimiento lo almacena en su registro.
    fn procedure(&mut self) {
        let entry = self.code.pc();
        let name = self.expect_ident();
        let scope = self.symbols.save_scope();

        let mut param = None;
        if self.accept(&Token::OpenParen) {
            if let Some(typ) = self.typ() {
                param = Some(typ);

                if let Some(id) = self.expect_ident() {
                    let slot = self.allocate();
                    self.symbols
                        .declare(Entry::variable(id.into_inner(), typ, slot));

                    self.code.emit(Instruction::file(FileOp::Movwf, Dest::F, slot));
                }
            }

            self.expect(&Token::CloseParen, Expected::CloseParen);
        }

        let mut result = None;
        if self.accept(&Token::Colon) {
            result = self.typ();
            if result.is_none() {
                self.error(CompileError::MissingToken(Expected::Type));
            }
        }

        self.expect(&Token::Semicolon, Expected::Semicolon);

        // Visible desde su propio cuerpo, para llamadas recursivas
        if let Some(name) = &name {
            self.symbols
                .declare(Entry::procedure(name.val().clone(), param, result, entry));
        }

        self.variables(true);
        if self.accept(&Token::Keyword(Keyword::Begin)) {
            self.stat_seq();
        } else {
            self.error(CompileError::MissingToken(Expected::Begin));
        }

        let recovered = self.recover(true);
        if self.accept(&Token::Keyword(Keyword::Return)) {
            self.expression();
        }

        self.code.emit(Instruction::Control(Control::Return));

        if self.accept(&Token::Keyword(Keyword::End)) {
            match (self.expect_ident(), &name) {
                (Some(trailer), Some(name)) => self.check_trailer(name, trailer),
                _ => (),
            }
        } else if !recovered {
            self.error(CompileError::MissingToken(Expected::End));
        }

        self.expect(&Token::Semicolon, Expected::Semicolon);
        self.symbols.restore_scope(scope);

        if let Some(name) = name {
            self.symbols
                .declare(Entry::procedure(name.into_inner(), param, result, entry));
        }
    }

    /// Reporta si el nombre de cierre difiere del de apertura.
    fn check_trailer(&mut self, name: &Located<Identifier>, trailer: Located<Identifier>) {
        if trailer.val() != name.val() {
            let (location, found) = trailer.split();
            let error = CompileError::NameMismatch {
                expected: name.val().clone(),
                found,
            };

            self.error_at(location, error);
        }
    }

    /// Reserva el siguiente registro de datos.
    ///
    /// Los registros nunca se reutilizan. El desbordamiento se reporta
    /// una única vez al final de la compilación.
    fn allocate(&mut self) -> u8 {
        let slot = self.data;
        self.data += 1;

        (slot & REGISTER_MASK as usize) as u8
    }

    /// Busca un nombre. Si no existe, se reporta y se retorna el sustituto.
    fn resolve(&mut self, name: &Located<Identifier>) -> Entry {
        match self.symbols.lookup(name.val()) {
            Some(entry) => entry.clone(),
            None => {
                let error = CompileError::UndefinedName(name.val().clone());
                self.error_at(name.location().clone(), error);

                Entry::undefined(name.val().clone())
            }
        }
    }

    /// Reporta un error de clase si `entry` no es de la clase esperada.
    fn require(&mut self, entry: &Entry, expected: Kind, location: &Location) -> bool {
        if entry.kind == expected {
            true
        } else {
            if entry.kind != Kind::Undefined {
                let error = CompileError::WrongItemKind {
                    name: entry.name.clone(),
                    expected,
                    found: entry.kind,
                };

                self.error_at(location.clone(), error);
            }

            false
        }
    }

    /// Avanza al siguiente token. Los errores léxicos se reportan y se
    /// saltan.
    fn next_token(&mut self) {
        loop {
            match self.tokens.next() {
                Some(Ok(token)) => {
                    self.here = token.location().clone();
                    self.lookahead = Some(token);
                    break;
                }

                Some(Err(error)) => {
                    let (location, error) = error.split();
                    self.error_at(location, CompileError::Lexical(error));
                }

                None => {
                    self.lookahead = None;
                    break;
                }
            }
        }
    }

    /// Token de lookahead, si no se ha llegado al final.
    fn peek(&self) -> Option<&Token> {
        self.lookahead.as_ref().map(Located::val)
    }

    fn is(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    /// Consume el lookahead si es `token`.
    fn accept(&mut self, token: &Token) -> bool {
        let found = self.is(token);
        if found {
            self.next_token();
        }

        found
    }

    /// Como [`Compiler::accept()`], pero reporta un error si no se
    /// encontró el token. No se consume nada en ese caso.
    fn expect(&mut self, token: &Token, expected: Expected) -> bool {
        let found = self.accept(token);
        if !found {
            self.error(CompileError::MissingToken(expected));
        }

        found
    }

    /// Consume un identificador, si lo hay.
    fn ident(&mut self) -> Option<Located<Identifier>> {
        match self.lookahead.take() {
            Some(token) => match token.val() {
                Token::Id(id) => {
                    let id = id.clone();
                    let location = token.location().clone();

                    self.next_token();
                    Some(Located::at(id, location))
                }

                _ => {
                    self.lookahead = Some(token);
                    None
                }
            },

            None => None,
        }
    }

    fn expect_ident(&mut self) -> Option<Located<Identifier>> {
        let id = self.ident();
        if id.is_none() {
            self.error(CompileError::MissingToken(Expected::Identifier));
        }

        id
    }

    /// Consume un literal numérico, con el tipo que le corresponde.
    fn literal(&mut self) -> Option<(u8, Type)> {
        let literal = match self.peek()? {
            Token::IntLiteral(value) => (*value, Type::Int),
            Token::SetLiteral(value) => (*value, Type::Set),
            _ => return None,
        };

        self.next_token();
        Some(literal)
    }

    /// `INT | SET | BOOL`
    fn typ(&mut self) -> Option<Type> {
        let typ = match self.peek()? {
            Token::Keyword(Keyword::Int) => Type::Int,
            Token::Keyword(Keyword::Set) => Type::Set,
            Token::Keyword(Keyword::Bool) => Type::Bool,
            _ => return None,
        };

        self.next_token();
        Some(typ)
    }

    /// Reporta un error en la ubicación del lookahead.
    fn error(&mut self, error: CompileError) {
        let location = self.here.clone();
        self.error_at(location, error);
    }

    fn error_at(&mut self, location: Location, error: CompileError) {
        self.diagnostics.push(Located::at(error, location));
    }
}
