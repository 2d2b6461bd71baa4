//! Resolución diferida de saltos ("backpatching").
//!
//! Un generador de una sola pasada emite saltos hacia adelante antes de
//! conocer su destino. Cada uno de estos saltos se emite como un
//! [`Word::Pending`] cuyo enlace apunta al salto pendiente anterior con el
//! mismo destino, de manera que el propio buffer de código almacena la
//! lista. Una [`Chain`] es la cabeza de una de estas listas; cuando el
//! destino es finalmente conocido, [`CodeBuffer::fixup()`] recorre la lista
//! y resuelve cada elemento a un `GOTO` absoluto.

use crate::code::{CodeBuffer, Instruction, Word};

/// Cabeza de una cadena de saltos pendientes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Chain(Option<usize>);

impl Chain {
    /// Cadena vacía.
    pub const EMPTY: Chain = Chain(None);

    /// Determina si la cadena no tiene elementos.
    pub fn is_empty(self) -> bool {
        self.0.is_none()
    }

    /// Índice del elemento más reciente.
    pub fn head(self) -> Option<usize> {
        self.0
    }
}

impl CodeBuffer {
    /// Emite un salto pendiente encadenado a `chain` y retorna la
    /// cadena extendida.
    pub fn placeholder(&mut self, chain: Chain) -> Chain {
        let at = self.pc();
        log::trace!("{:#05x}: <pending> -> {:?}", at, chain.0);

        self.words.push(Word::Pending(chain.0));
        Chain(Some(at))
    }

    /// Resuelve todos los saltos de una cadena a `target`.
    pub fn fixup(&mut self, chain: Chain, target: usize) {
        log::trace!("fixup {:?} -> {:#05x}", chain.0, target);

        let mut link = chain.0;
        while let Some(at) = link {
            match self.words.get(at) {
                Some(Word::Pending(previous)) => link = *previous,
                _ => {
                    debug_assert!(false, "broken jump chain at {:#05x}", at);
                    break;
                }
            }

            self.words[at] = Word::Resolved(Instruction::Goto(target as u16));
        }

        if !chain.is_empty() {
            self.mark_target(target);
        }
    }

    /// Reescribe la cadena de una disyunción `a OR b OR ...`.
    ///
    /// Mientras se compilan los términos, todos se encadenan con la
    /// semántica de "saltar si es falso". Para una disyunción, todo
    /// término excepto el último debe en cambio saltar a la rama
    /// verdadera si se cumple: se invierte la prueba de bit que protege
    /// a su salto y este se resuelve a la posición actual, justo después
    /// del grupo. La cadena resultante contiene solo al último término.
    pub fn disjunction(&mut self, chain: Chain) -> Chain {
        let last = match chain.0 {
            Some(last) => last,
            None => return chain,
        };

        let rest = match self.words.get_mut(last) {
            Some(Word::Pending(previous)) => previous.take(),
            _ => None,
        };

        let target = self.pc();
        let mut link = rest;
        while let Some(at) = link {
            match self.words.get(at) {
                Some(Word::Pending(previous)) => link = *previous,
                _ => break,
            }

            self.invert_guard(at);

            self.words[at] = Word::Resolved(Instruction::Goto(target as u16));
        }

        if rest.is_some() {
            self.mark_target(target);
        }

        Chain(Some(last))
    }

    /// Invierte la prueba de bit que precede a un salto pendiente.
    fn invert_guard(&mut self, jump: usize) {
        let guard = match jump.checked_sub(1) {
            Some(guard) => guard,
            None => return,
        };

        if let Some(Word::Resolved(Instruction::Bit { op, bit, reg })) = self.words.get(guard) {
            if let Some(inverted) = op.inverted() {
                let inverted = Instruction::bit(inverted, *bit, *reg);
                self.words[guard] = Word::Resolved(inverted);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{BitOp, Control};

    fn nop() -> Instruction {
        Instruction::Control(Control::Nop)
    }

    #[test]
    fn fixup_drains_chain() {
        let mut code = CodeBuffer::new();
        code.emit(nop());

        let mut chain = Chain::EMPTY;
        for _ in 0..4 {
            code.emit(nop());
            chain = code.placeholder(chain);
        }

        code.fixup(chain, 0x20);

        let resolved = code
            .words()
            .iter()
            .filter(|word| **word == Word::Resolved(Instruction::Goto(0x20)))
            .count();

        assert_eq!(resolved, 4);
        assert!(code
            .words()
            .iter()
            .all(|word| matches!(word, Word::Resolved(_))));
    }

    #[test]
    fn fixup_of_empty_chain_is_noop() {
        let mut code = CodeBuffer::new();
        code.emit(nop());
        code.fixup(Chain::EMPTY, 5);

        assert_eq!(code.words(), &[Word::Resolved(nop())]);
    }

    #[test]
    fn disjunction_inverts_all_but_last() {
        let mut code = CodeBuffer::new();
        let test = |bit| Instruction::bit(BitOp::SkipIfSet, bit, 0x0C);

        code.emit(test(0));
        let chain = code.placeholder(Chain::EMPTY);
        code.emit(test(1));
        let chain = code.placeholder(chain);
        code.emit(test(2));
        let chain = code.placeholder(chain);

        let chain = code.disjunction(chain);
        assert_eq!(chain.head(), Some(5));

        assert_eq!(
            code.words(),
            &[
                Word::Resolved(Instruction::bit(BitOp::SkipIfClear, 0, 0x0C)),
                Word::Resolved(Instruction::Goto(6)),
                Word::Resolved(Instruction::bit(BitOp::SkipIfClear, 1, 0x0C)),
                Word::Resolved(Instruction::Goto(6)),
                Word::Resolved(test(2)),
                Word::Pending(None),
            ]
        );
    }
}
