//! Compilador de PICL para microcontroladores PIC16.
//!
//! # Una sola pasada
//! Cada programa deriva de un único archivo de código fuente. El archivo
//! se descompone en caracteres con ubicación en [`source`] y luego en
//! tokens en [`lex`]. No existe un árbol sintáctico ni una representación
//! intermedia: el analizador descendente recursivo de [`Compiler`] emite
//! palabras de máquina de 14 bits ([`code`]) conforme reconoce cada
//! producción, consultando la tabla de [`symbols`].
//!
//! Los saltos hacia adelante se dejan pendientes dentro del mismo buffer
//! de código y se resuelven en [`backpatch`]. Algunas secuencias se
//! compactan al momento de emitirse por medio de las reglas de
//! [`peephole`].
//!
//! # Salidas
//! Una [`Compilation`] contiene la imagen de programa, la tabla de
//! símbolos del módulo y los errores reportados en [`error`]. A partir
//! de ella se generan archivos Intel HEX ([`hex`]) y listados
//! ([`listing`]), ver [`output`].

#[macro_use]
mod macros;

pub mod backpatch;
pub mod code;
pub mod error;
pub mod hex;
pub mod lex;
pub mod listing;
pub mod output;
pub mod peephole;
pub mod source;
pub mod symbols;

mod compile;

pub use compile::{Compilation, Compiler, TokenStream, DATA_START};

use std::io::BufRead;

/// Compila un módulo completo a partir de un lector.
///
/// `name` identifica al origen en los diagnósticos.
pub fn compile<R, S>(reader: R, name: S) -> Compilation
where
    R: BufRead,
    S: Into<String>,
{
    let (start, stream) = source::consume(reader, name);
    let lexer = lex::Lexer::new(start.clone(), stream);

    Compiler::new(start, lexer).run()
}
