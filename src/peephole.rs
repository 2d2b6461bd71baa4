//! Reescrituras locales sobre las últimas palabras emitidas.
//!
//! Cada regla se aplica inmediatamente después de que el generador
//! emite una construcción completa y solo observa palabras emitidas por
//! esa misma construcción, a partir del índice `since`. Una regla que no
//! aplica no modifica el buffer.

use crate::{
    backpatch::Chain,
    code::{BitOp, CodeBuffer, Dest, FileOp, Instruction, LiteralOp, Word, STATUS, ZERO},
};

/// `MOVLW 0` seguido de un almacenamiento en `reg` se reemplaza por `CLRF reg`.
pub fn clear(code: &mut CodeBuffer, reg: u8, since: usize) -> bool {
    if code.pc() <= since {
        return false;
    }

    match code.last() {
        Some(Instruction::Literal {
            op: LiteralOp::Movlw,
            value: 0,
        }) => {
            let at = code.pc() - 1;
            log::debug!("{:#05x}: clear 0x{:02X}", at, reg);

            code.set(at, Word::Resolved(Instruction::file(FileOp::Clrf, Dest::F, reg)));
            true
        }

        _ => false,
    }
}

/// Una operación sobre `reg` con destino `W` seguida de un almacenamiento
/// en el mismo `reg` se redirige para escribir directamente al registro.
pub fn fold_store(code: &mut CodeBuffer, reg: u8, since: usize) -> bool {
    if code.pc() <= since {
        return false;
    }

    match code.last() {
        Some(Instruction::File {
            op,
            dest: Dest::W,
            reg: source,
        }) if op.folds_into_store() && source == reg => {
            let at = code.pc() - 1;
            log::debug!("{:#05x}: fold {} into 0x{:02X}", at, op.mnemonic(), reg);

            code.set(at, Word::Resolved(Instruction::file(op, Dest::F, reg)));
            true
        }

        _ => false,
    }
}

/// Fusiona un decremento y una prueba de cero en `DECFSZ`.
///
/// La forma reconocida es
///
/// ```text
/// DECF    r,F
/// MOVF    r,W
/// BTFSS   STATUS,Z
/// <salto pendiente>
/// ```
///
/// donde el salto pendiente es la cadena completa `chain`. Se reescribe a
/// `DECFSZ r,F` seguido de un único salto pendiente, el cual se retorna
/// como nueva cadena. La regla no aplica si alguna de las cuatro palabras
/// precede a `since` o si algún salto conocido apunta a las palabras
/// eliminadas.
pub fn decrement_skip(code: &mut CodeBuffer, chain: Chain, since: usize) -> Option<Chain> {
    let pc = code.pc();
    if pc < since + 4 || chain.head() != Some(pc - 1) {
        return None;
    }

    let reg = match (code.get(pc - 4), code.get(pc - 3), code.get(pc - 2), code.get(pc - 1)) {
        (
            Some(Word::Resolved(Instruction::File {
                op: FileOp::Decf,
                dest: Dest::F,
                reg,
            })),
            Some(Word::Resolved(Instruction::File {
                op: FileOp::Movf,
                dest: Dest::W,
                reg: tested,
            })),
            Some(Word::Resolved(Instruction::Bit {
                op: BitOp::SkipIfSet,
                bit: ZERO,
                reg: STATUS,
            })),
            Some(Word::Pending(None)),
        ) if reg == tested => *reg,

        _ => return None,
    };

    if code.is_target_from(pc - 3) {
        return None;
    }

    log::debug!("{:#05x}: fuse DECFSZ 0x{:02X},F", pc - 4, reg);

    code.set(pc - 4, Word::Resolved(Instruction::file(FileOp::Decfsz, Dest::F, reg)));
    code.truncate(pc - 3);

    Some(code.placeholder(Chain::EMPTY))
}
