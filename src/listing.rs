//! Listados legibles del código generado.
//!
//! Un listado desensambla la imagen palabra por palabra, marca los
//! puntos de entrada de cada procedimiento y concluye con la tabla de
//! símbolos del módulo.

use std::io::{self, Write};

use crate::{
    code::Instruction,
    compile::Compilation,
    symbols::{Entry, Kind},
};

/// Escribe el listado de una compilación.
pub fn write<W: Write>(compilation: &Compilation, output: &mut W) -> io::Result<()> {
    let symbols = &compilation.symbols;

    for (address, word) in compilation.image().into_iter().enumerate() {
        if let Some(procedure) = symbols.procedure_at(address) {
            writeln!(output, "{}:", procedure.name)?;
        }

        match Instruction::decode(word) {
            Some(instruction) => emit!(output, address, word, "{}", instruction)?,
            None => emit!(output, address, word)?,
        }
    }

    let declared = symbols.declared();
    if !declared.is_empty() {
        writeln!(output)?;
        writeln!(output, "; symbols")?;
    }

    for entry in declared {
        write_symbol(entry, output)?;
    }

    Ok(())
}

fn write_symbol<W: Write>(entry: &Entry, output: &mut W) -> io::Result<()> {
    let typ = entry
        .typ
        .map(|typ| typ.to_string())
        .unwrap_or_default();

    match entry.kind {
        Kind::Variable => {
            writeln!(output, ";   {:16} {:4} 0x{:02X}", entry.name, typ, entry.address)
        }

        Kind::Constant => writeln!(output, ";   {:16} {:4} = {}", entry.name, typ, entry.address),
        Kind::Procedure => {
            let param = entry
                .param
                .map(|param| param.to_string())
                .unwrap_or_default();

            writeln!(
                output,
                ";   {:16} {:4} 0x{:03X} ({})",
                entry.name, typ, entry.address, param
            )
        }

        Kind::Undefined => Ok(()),
    }
}
