//! Codificación de instrucciones PIC16 y buffer de código.
//!
//! # Familias
//! Cada palabra de 14 bits pertenece a una de cuatro familias, las cuales
//! se distinguen por sus dos bits más significativos:
//!
//! | Familia | Forma                    | Instrucciones                         |
//! |---------|--------------------------|---------------------------------------|
//! | 0       | `00 oooo d fffffff`      | operaciones sobre registros de archivo |
//! | 1       | `01 oo bbb fffffff`      | `BCF`, `BSF`, `BTFSC`, `BTFSS`        |
//! | 2       | `10 o kkkkkkkkkkk`       | `CALL`, `GOTO`                        |
//! | 3       | `11 oooo kkkkkkkk`       | operaciones con literal               |
//!
//! Toda palabra se decodifica a partir de su valor únicamente, por lo cual
//! [`Instruction::decode()`] es el inverso exacto de [`Instruction::encode()`].
//!
//! # Saltos pendientes
//! Durante la generación de código, el buffer contiene además palabras
//! [`Word::Pending`]: saltos cuyo destino todavía no se conoce y que
//! forman listas enlazadas dentro del mismo buffer. Ver [`crate::backpatch`].

use std::fmt::{self, Display};

/// Capacidad de memoria de programa, en palabras.
pub const CODE_SIZE: usize = 1024;

/// Dirección del registro `STATUS`.
pub const STATUS: u8 = 0x03;

/// Bit de acarreo (`C`) en `STATUS`.
pub const CARRY: u8 = 0;

/// Bit de cero (`Z`) en `STATUS`.
pub const ZERO: u8 = 2;

/// Registros de archivo direccionables con 7 bits.
pub const REGISTER_MASK: u8 = 0x7F;

/// Destino de una operación sobre registro de archivo.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Dest {
    /// El resultado queda en el acumulador.
    W,

    /// El resultado se escribe de vuelta al registro.
    F,
}

/// Operaciones de la familia 0.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FileOp {
    Movwf,
    Clrf,
    Subwf,
    Decf,
    Iorwf,
    Andwf,
    Xorwf,
    Addwf,
    Movf,
    Comf,
    Incf,
    Decfsz,
    Rrf,
    Rlf,
    Swapf,
    Incfsz,
}

const FILE_OPS: [FileOp; 16] = [
    FileOp::Movwf,
    FileOp::Clrf,
    FileOp::Subwf,
    FileOp::Decf,
    FileOp::Iorwf,
    FileOp::Andwf,
    FileOp::Xorwf,
    FileOp::Addwf,
    FileOp::Movf,
    FileOp::Comf,
    FileOp::Incf,
    FileOp::Decfsz,
    FileOp::Rrf,
    FileOp::Rlf,
    FileOp::Swapf,
    FileOp::Incfsz,
];

impl FileOp {
    fn opcode(self) -> u16 {
        self as u16
    }

    /// Nombre en ensamblador.
    pub fn mnemonic(self) -> &'static str {
        use FileOp::*;

        match self {
            Movwf => "MOVWF",
            Clrf => "CLRF",
            Subwf => "SUBWF",
            Decf => "DECF",
            Iorwf => "IORWF",
            Andwf => "ANDWF",
            Xorwf => "XORWF",
            Addwf => "ADDWF",
            Movf => "MOVF",
            Comf => "COMF",
            Incf => "INCF",
            Decfsz => "DECFSZ",
            Rrf => "RRF",
            Rlf => "RLF",
            Swapf => "SWAPF",
            Incfsz => "INCFSZ",
        }
    }

    /// Determina si el resultado de la operación puede redirigirse al
    /// registro fuente sin alterar su efecto sobre `W` y el flujo.
    pub fn folds_into_store(self) -> bool {
        use FileOp::*;
        matches!(
            self,
            Subwf | Decf | Iorwf | Andwf | Xorwf | Addwf | Movf | Comf | Incf | Rrf | Rlf
        )
    }
}

/// Operaciones de la familia 1.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BitOp {
    /// `BCF`
    Clear,

    /// `BSF`
    Set,

    /// `BTFSC`
    SkipIfClear,

    /// `BTFSS`
    SkipIfSet,
}

impl BitOp {
    fn opcode(self) -> u16 {
        self as u16
    }

    /// Nombre en ensamblador.
    pub fn mnemonic(self) -> &'static str {
        match self {
            BitOp::Clear => "BCF",
            BitOp::Set => "BSF",
            BitOp::SkipIfClear => "BTFSC",
            BitOp::SkipIfSet => "BTFSS",
        }
    }

    /// Invierte el sentido de una prueba de bit.
    ///
    /// Solo las dos formas de prueba tienen inverso; esta operación es
    /// una involución sobre ellas.
    pub fn inverted(self) -> Option<BitOp> {
        match self {
            BitOp::SkipIfClear => Some(BitOp::SkipIfSet),
            BitOp::SkipIfSet => Some(BitOp::SkipIfClear),
            BitOp::Clear | BitOp::Set => None,
        }
    }
}

/// Operaciones de la familia 3.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LiteralOp {
    Movlw,
    Retlw,
    Iorlw,
    Andlw,
    Xorlw,
    Sublw,
    Addlw,
}

impl LiteralOp {
    fn opcode(self) -> u16 {
        match self {
            LiteralOp::Movlw => 0x0,
            LiteralOp::Retlw => 0x4,
            LiteralOp::Iorlw => 0x8,
            LiteralOp::Andlw => 0x9,
            LiteralOp::Xorlw => 0xA,
            LiteralOp::Sublw => 0xC,
            LiteralOp::Addlw => 0xE,
        }
    }

    fn from_opcode(opcode: u16) -> Option<Self> {
        match opcode {
            0x0..=0x3 => Some(LiteralOp::Movlw),
            0x4..=0x7 => Some(LiteralOp::Retlw),
            0x8 => Some(LiteralOp::Iorlw),
            0x9 => Some(LiteralOp::Andlw),
            0xA => Some(LiteralOp::Xorlw),
            0xC | 0xD => Some(LiteralOp::Sublw),
            0xE | 0xF => Some(LiteralOp::Addlw),
            _ => None,
        }
    }

    /// Nombre en ensamblador.
    pub fn mnemonic(self) -> &'static str {
        match self {
            LiteralOp::Movlw => "MOVLW",
            LiteralOp::Retlw => "RETLW",
            LiteralOp::Iorlw => "IORLW",
            LiteralOp::Andlw => "ANDLW",
            LiteralOp::Xorlw => "XORLW",
            LiteralOp::Sublw => "SUBLW",
            LiteralOp::Addlw => "ADDLW",
        }
    }
}

/// Formas de control sin operando, codificadas en la familia 0.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Control {
    Nop,
    Return,
    Retfie,
    Sleep,
    Clrwdt,
    Clrw,
}

impl Control {
    fn encode(self) -> u16 {
        match self {
            Control::Nop => 0x0000,
            Control::Return => 0x0008,
            Control::Retfie => 0x0009,
            Control::Sleep => 0x0063,
            Control::Clrwdt => 0x0064,
            Control::Clrw => 0x0100,
        }
    }

    /// Nombre en ensamblador.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Control::Nop => "NOP",
            Control::Return => "RETURN",
            Control::Retfie => "RETFIE",
            Control::Sleep => "SLEEP",
            Control::Clrwdt => "CLRWDT",
            Control::Clrw => "CLRW",
        }
    }
}

/// Una instrucción completamente resuelta.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// Familia 0, formas sin operando.
    Control(Control),

    /// Familia 0.
    File { op: FileOp, dest: Dest, reg: u8 },

    /// Familia 1.
    Bit { op: BitOp, bit: u8, reg: u8 },

    /// Familia 2, `CALL`.
    Call(u16),

    /// Familia 2, `GOTO`.
    Goto(u16),

    /// Familia 3.
    Literal { op: LiteralOp, value: u8 },
}

impl Instruction {
    /// Atajo para operaciones sobre registros de archivo.
    pub fn file(op: FileOp, dest: Dest, reg: u8) -> Self {
        Instruction::File { op, dest, reg }
    }

    /// Atajo para operaciones sobre bits.
    pub fn bit(op: BitOp, bit: u8, reg: u8) -> Self {
        Instruction::Bit { op, bit, reg }
    }

    /// Atajo para operaciones con literal.
    pub fn literal(op: LiteralOp, value: u8) -> Self {
        Instruction::Literal { op, value }
    }

    /// Codifica a la palabra de máquina exacta.
    pub fn encode(self) -> u16 {
        match self {
            Instruction::Control(control) => control.encode(),

            Instruction::File { op, dest, reg } => {
                let dest = match dest {
                    Dest::W => 0,
                    Dest::F => 0x80,
                };

                op.opcode() << 8 | dest | (reg & REGISTER_MASK) as u16
            }

            Instruction::Bit { op, bit, reg } => {
                let bit = ((bit & 0x07) as u16) << 7;
                0x1000 | op.opcode() << 10 | bit | (reg & REGISTER_MASK) as u16
            }

            Instruction::Call(target) => 0x2000 | (target & 0x07FF),
            Instruction::Goto(target) => 0x2800 | (target & 0x07FF),

            Instruction::Literal { op, value } => 0x3000 | op.opcode() << 8 | value as u16,
        }
    }

    /// Decodifica una palabra de máquina.
    ///
    /// Retorna `None` para palabras que no corresponden a ninguna
    /// instrucción de la arquitectura.
    pub fn decode(word: u16) -> Option<Self> {
        let reg = (word & REGISTER_MASK as u16) as u8;

        let instruction = match word >> 12 {
            0 => {
                let opcode = (word >> 8) & 0x0F;
                let dest = if word & 0x80 != 0 { Dest::F } else { Dest::W };

                match (opcode, dest) {
                    (0, Dest::W) => Instruction::Control(match word {
                        0x0000 | 0x0020 | 0x0040 | 0x0060 => Control::Nop,
                        0x0008 => Control::Return,
                        0x0009 => Control::Retfie,
                        0x0063 => Control::Sleep,
                        0x0064 => Control::Clrwdt,
                        _ => return None,
                    }),

                    (1, Dest::W) => Instruction::Control(Control::Clrw),
                    _ => Instruction::file(FILE_OPS[opcode as usize], dest, reg),
                }
            }

            1 => {
                let op = match (word >> 10) & 0x03 {
                    0 => BitOp::Clear,
                    1 => BitOp::Set,
                    2 => BitOp::SkipIfClear,
                    _ => BitOp::SkipIfSet,
                };

                Instruction::bit(op, ((word >> 7) & 0x07) as u8, reg)
            }

            2 => {
                let target = word & 0x07FF;
                if word & 0x0800 == 0 {
                    Instruction::Call(target)
                } else {
                    Instruction::Goto(target)
                }
            }

            3 => {
                let op = LiteralOp::from_opcode((word >> 8) & 0x0F)?;
                Instruction::literal(op, (word & 0xFF) as u8)
            }

            _ => return None,
        };

        Some(instruction)
    }

    /// Nombre en ensamblador.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Control(control) => control.mnemonic(),
            Instruction::File { op, .. } => op.mnemonic(),
            Instruction::Bit { op, .. } => op.mnemonic(),
            Instruction::Call(_) => "CALL",
            Instruction::Goto(_) => "GOTO",
            Instruction::Literal { op, .. } => op.mnemonic(),
        }
    }
}

impl Display for Instruction {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mnemonic = self.mnemonic();

        match self {
            Instruction::Control(_) => fmt.write_str(mnemonic),

            Instruction::File {
                op: FileOp::Movwf,
                reg,
                ..
            }
            | Instruction::File {
                op: FileOp::Clrf,
                reg,
                ..
            } => write!(fmt, "{:8}0x{:02X}", mnemonic, reg),

            Instruction::File { dest, reg, .. } => {
                let dest = match dest {
                    Dest::W => 'W',
                    Dest::F => 'F',
                };

                write!(fmt, "{:8}0x{:02X},{}", mnemonic, reg, dest)
            }

            Instruction::Bit { bit, reg, .. } => write!(fmt, "{:8}0x{:02X},{}", mnemonic, reg, bit),
            Instruction::Call(target) | Instruction::Goto(target) => {
                write!(fmt, "{:8}0x{:03X}", mnemonic, target)
            }

            Instruction::Literal { value, .. } => write!(fmt, "{:8}0x{:02X}", mnemonic, value),
        }
    }
}

/// Una palabra del buffer de código durante la generación.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Word {
    /// Instrucción definitiva.
    Resolved(Instruction),

    /// Salto cuyo destino aún no se conoce. El enlace nombra al salto
    /// pendiente anterior de la misma cadena, o `None` si es el último.
    Pending(Option<usize>),
}

impl Word {
    /// Obtiene la instrucción, si ya fue resuelta.
    pub fn instruction(&self) -> Option<Instruction> {
        match self {
            Word::Resolved(instruction) => Some(*instruction),
            Word::Pending(_) => None,
        }
    }

    /// Codificación final.
    ///
    /// Un salto que nunca fue resuelto (solo posible tras errores de
    /// sintaxis) se emite como `GOTO 0`.
    pub fn encode(&self) -> u16 {
        match self {
            Word::Resolved(instruction) => instruction.encode(),
            Word::Pending(_) => Instruction::Goto(0).encode(),
        }
    }
}

/// Buffer de código, de escritura secuencial.
///
/// El contador de programa es siempre la longitud del buffer. La
/// capacidad de [`CODE_SIZE`] palabras se verifica al finalizar una
/// compilación, no durante la emisión, de manera que las cadenas de
/// saltos pendientes siempre permanezcan consistentes.
#[derive(Clone, Debug, Default)]
pub struct CodeBuffer {
    pub(crate) words: Vec<Word>,
    pub(crate) last_target: Option<usize>,
}

impl CodeBuffer {
    /// Crea un buffer vacío.
    pub fn new() -> Self {
        Default::default()
    }

    /// Contador de programa: índice de la siguiente palabra libre.
    pub fn pc(&self) -> usize {
        self.words.len()
    }

    /// Agrega una instrucción y retorna su índice.
    pub fn emit(&mut self, instruction: Instruction) -> usize {
        let at = self.pc();
        log::trace!("{:#05x}: {}", at, instruction);

        if let Instruction::Goto(target) | Instruction::Call(target) = instruction {
            self.mark_target(target as usize);
        }

        self.words.push(Word::Resolved(instruction));
        at
    }

    /// Palabra en un índice dado.
    pub fn get(&self, at: usize) -> Option<&Word> {
        self.words.get(at)
    }

    /// Reemplaza una palabra existente.
    pub fn set(&mut self, at: usize, word: Word) {
        if let Some(slot) = self.words.get_mut(at) {
            *slot = word;
        }
    }

    /// Última instrucción emitida, si existe y está resuelta.
    pub fn last(&self) -> Option<Instruction> {
        self.words.last().and_then(Word::instruction)
    }

    /// Descarta las palabras a partir de `pc`.
    pub fn truncate(&mut self, pc: usize) {
        self.words.truncate(pc);
    }

    /// Todas las palabras emitidas.
    pub fn words(&self) -> &[Word] {
        &self.words
    }

    /// Imagen binaria final.
    pub fn image(&self) -> Vec<u16> {
        self.words.iter().map(Word::encode).collect()
    }

    /// Registra que `target` es destino de algún salto.
    pub(crate) fn mark_target(&mut self, target: usize) {
        self.last_target = Some(self.last_target.map_or(target, |last| last.max(target)));
    }

    /// Determina si algún salto conocido apunta a `at` o más adelante.
    pub fn is_target_from(&self, at: usize) -> bool {
        matches!(self.last_target, Some(last) if last >= at)
    }
}
