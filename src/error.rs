//! Errores de compilación y su reporte.
//!
//! Ningún error detiene la compilación: cada uno se registra junto a su
//! ubicación en [`Diagnostics`] y el análisis continúa. Todo error tiene
//! además una clasificación numérica estable, ver [`CompileError::code()`].

use crate::{
    lex::{Identifier, LexerError},
    source::Located,
    symbols::{Kind, Type},
};

use std::fmt::{self, Display};
use thiserror::Error;

/// Error semántico o sintáctico.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CompileError {
    /// Error originado en el scanner.
    #[error("{0}")]
    Lexical(#[from] LexerError),

    /// Uso de un nombre que no fue declarado.
    #[error("Undefined name `{0}`")]
    UndefinedName(Identifier),

    /// Un nombre se utiliza como algo que no es.
    #[error("Expected {expected}, found {found} `{name}`")]
    WrongItemKind {
        name: Identifier,
        expected: Kind,
        found: Kind,
    },

    /// Falta un símbolo requerido por la gramática.
    #[error("Expected {0}")]
    MissingToken(Expected),

    /// Los operandos de una operación difieren en tipo.
    #[error("Type mismatch: {left} and {right}")]
    TypeMismatch { left: Type, right: Type },

    /// Operación que la arquitectura no puede realizar.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    /// El nombre final de un módulo o procedimiento no coincide.
    #[error("Expected `{expected}` to close the declaration, found `{found}`")]
    NameMismatch {
        expected: Identifier,
        found: Identifier,
    },

    /// La memoria de programa no alcanza.
    #[error("Program requires {0} words, capacity is 1024")]
    CodeOverflow(usize),

    /// Se agotaron los registros de propósito general.
    #[error("Out of data registers, last slot would be {0:#04x}")]
    DataOverflow(usize),
}

impl CompileError {
    /// Clasificación numérica.
    pub fn code(&self) -> u32 {
        use CompileError::*;

        match self {
            Lexical(_) => 1,
            UndefinedName(_) => 10,
            WrongItemKind {
                expected: Kind::Procedure,
                ..
            } => 3,
            WrongItemKind { .. } => 2,
            MissingToken(expected) => expected.code(),
            TypeMismatch { .. } => 111,
            UnsupportedOperation(_) => 11,
            NameMismatch { .. } => 22,
            CodeOverflow(_) => 30,
            DataOverflow(_) => 31,
        }
    }
}

/// Lo que se esperaba encontrar en lugar de un token faltante.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Expected {
    Equal,
    CloseParen,
    Identifier,
    Operand,
    Type,
    Number,
    BitIndex,
    Then,
    Do,
    End,
    Semicolon,
    Begin,
    UntilOrEnd,
    Period,
}

impl Expected {
    fn code(self) -> u32 {
        use Expected::*;

        match self {
            Equal => 5,
            CloseParen => 8,
            Identifier | Operand | Type => 10,
            Number | BitIndex => 11,
            Then | Do => 14,
            End => 18,
            Semicolon => 20,
            Begin => 21,
            UntilOrEnd => 25,
            Period => 26,
        }
    }
}

impl Display for Expected {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Expected::*;

        let string = match self {
            Equal => "`=`",
            CloseParen => "`)`",
            Identifier => "identifier",
            Operand => "identifier or literal",
            Type => "`INT`, `SET` or `BOOL`",
            Number => "number",
            BitIndex => "bit index in range [0, 7]",
            Then => "`THEN`",
            Do => "`DO`",
            End => "`END`",
            Semicolon => "`;`",
            Begin => "`BEGIN`",
            UntilOrEnd => "`UNTIL` or `END`",
            Period => "`.`",
        };

        fmt.write_str(string)
    }
}

/// Errores acumulados durante una compilación.
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<Located<CompileError>>,
}

impl Diagnostics {
    /// Registra un error.
    pub fn push(&mut self, error: Located<CompileError>) {
        log::debug!("{}: E{:03}: {}", error.location(), error.val().code(), error.val());
        self.errors.push(error);
    }

    /// Cantidad de errores.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Determina si la compilación fue exitosa.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Errores en orden de aparición.
    pub fn iter(&self) -> impl Iterator<Item = &Located<CompileError>> {
        self.errors.iter()
    }
}

impl Display for Diagnostics {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let errors = &self.errors;
        if errors.is_empty() {
            return writeln!(fmt, "No errors were reported");
        }

        for error in errors {
            writeln!(fmt, "error[E{:03}]: {}", error.val().code(), error.val())?;

            let location = error.location();
            writeln!(fmt, " --> {}", location)?;

            let digits = location.end().line().to_string().chars().count();
            writeln!(fmt, "{:digits$} |", "", digits = digits)?;

            for line_number in location.start().line()..=location.end().line() {
                location.source().with_line(line_number, |line| {
                    writeln!(fmt, "{:>digits$} | {}", line_number, line, digits = digits)
                })?
            }

            let (from, to) = (
                location.start().column(),
                location.end().column().saturating_sub(1),
            );

            let min = from.min(to).max(1);
            let max = from.max(to).max(min);

            let skip = (min - 1) as usize;
            let highlight = (max - min + 1) as usize;

            writeln!(
                fmt,
                "{:digits$} | {:skip$}{:^<highlight$}",
                "",
                "",
                "",
                digits = digits,
                skip = skip,
                highlight = highlight
            )?;

            writeln!(fmt)?;
        }

        let error_or_errors = if errors.len() == 1 { "error" } else { "errors" };
        writeln!(
            fmt,
            "Build failed with {} {}",
            errors.len(),
            error_or_errors
        )
    }
}
