//! Simulador mínimo de PIC16 para verificar imágenes compiladas.

#![allow(dead_code)]

use picl::{
    code::{BitOp, Control, Dest, FileOp, Instruction, LiteralOp, CARRY, STATUS, ZERO},
    symbols::Kind,
    Compilation,
};

/// Límite de instrucciones por ejecución.
const STEP_LIMIT: usize = 100_000;

/// Compila un programa que debe estar libre de errores.
pub fn compile(text: &str) -> Compilation {
    let compilation = picl::compile(text.as_bytes(), "test.pcl");
    assert!(compilation.succeeded(), "{}", compilation.diagnostics);

    compilation
}

/// Estado de la máquina.
pub struct Machine {
    image: Vec<u16>,
    variables: Vec<(String, usize)>,
    pub w: u8,
    pub regs: [u8; 128],
    pc: usize,
    stack: Vec<usize>,
    pub steps: usize,
}

impl Machine {
    pub fn new(image: Vec<u16>) -> Self {
        Machine {
            image,
            variables: Vec::new(),
            w: 0,
            regs: [0; 128],
            pc: 0,
            stack: Vec::new(),
            steps: 0,
        }
    }

    /// Compila y carga un programa.
    pub fn load(text: &str) -> Self {
        let compilation = compile(text);

        let mut machine = Machine::new(compilation.image());
        machine.variables = compilation
            .symbols
            .iter()
            .filter(|entry| entry.kind == Kind::Variable)
            .map(|entry| (entry.name.to_string(), entry.address as usize))
            .collect();

        machine
    }

    fn address(&self, name: &str) -> usize {
        match self.variables.iter().rev().find(|(variable, _)| variable == name) {
            Some((_, address)) => *address,
            None => panic!("no variable `{}`", name),
        }
    }

    /// Valor actual de una variable global.
    pub fn get(&self, name: &str) -> u8 {
        self.regs[self.address(name)]
    }

    /// Fija el valor de una variable global antes de ejecutar.
    pub fn set(&mut self, name: &str, value: u8) {
        let address = self.address(name);
        self.regs[address] = value;
    }

    /// Ejecuta hasta salir de la imagen. Retorna `false` si se alcanzó
    /// el límite de instrucciones.
    pub fn run(&mut self) -> bool {
        while self.pc < self.image.len() {
            if self.steps >= STEP_LIMIT {
                return false;
            }

            self.steps += 1;
            if !self.step() {
                break;
            }
        }

        true
    }

    /// Compila, ejecuta y retorna la máquina final.
    pub fn execute(text: &str) -> Self {
        let mut machine = Machine::load(text);
        assert!(machine.run(), "program did not terminate");

        machine
    }

    pub fn flag(&self, bit: u8) -> bool {
        self.regs[STATUS as usize] & (1 << bit) != 0
    }

    fn set_flag(&mut self, bit: u8, value: bool) {
        if value {
            self.regs[STATUS as usize] |= 1 << bit;
        } else {
            self.regs[STATUS as usize] &= !(1 << bit);
        }
    }

    fn step(&mut self) -> bool {
        let word = self.image[self.pc];
        let instruction = match Instruction::decode(word) {
            Some(instruction) => instruction,
            None => panic!("bad word {:#06x} at {:#05x}", word, self.pc),
        };

        self.pc += 1;

        match instruction {
            Instruction::Control(Control::Nop) | Instruction::Control(Control::Clrwdt) => (),
            Instruction::Control(Control::Sleep) => return false,
            Instruction::Control(Control::Clrw) => {
                self.w = 0;
                self.set_flag(ZERO, true);
            }

            Instruction::Control(Control::Return) | Instruction::Control(Control::Retfie) => {
                match self.stack.pop() {
                    Some(pc) => self.pc = pc,
                    None => return false,
                }
            }

            Instruction::File { op, dest, reg } => self.file(op, dest, reg as usize),
            Instruction::Bit { op, bit, reg } => {
                let mask = 1 << bit;
                let reg = reg as usize;

                match op {
                    BitOp::Clear => self.regs[reg] &= !mask,
                    BitOp::Set => self.regs[reg] |= mask,
                    BitOp::SkipIfClear if self.regs[reg] & mask == 0 => self.pc += 1,
                    BitOp::SkipIfSet if self.regs[reg] & mask != 0 => self.pc += 1,
                    _ => (),
                }
            }

            Instruction::Call(target) => {
                self.stack.push(self.pc);
                self.pc = target as usize;
            }

            Instruction::Goto(target) => self.pc = target as usize,
            Instruction::Literal { op, value } => self.literal(op, value),
        }

        true
    }

    fn file(&mut self, op: FileOp, dest: Dest, reg: usize) {
        let f = self.regs[reg];
        let w = self.w;

        let result = match op {
            FileOp::Movwf => {
                self.regs[reg] = w;
                return;
            }

            FileOp::Clrf => {
                self.regs[reg] = 0;
                self.set_flag(ZERO, true);
                return;
            }

            FileOp::Subwf => {
                let (result, borrow) = f.overflowing_sub(w);
                self.set_flag(CARRY, !borrow);
                self.set_flag(ZERO, result == 0);
                result
            }

            FileOp::Addwf => {
                let (result, carry) = f.overflowing_add(w);
                self.set_flag(CARRY, carry);
                self.set_flag(ZERO, result == 0);
                result
            }

            FileOp::Decfsz | FileOp::Incfsz => {
                let result = if op == FileOp::Decfsz {
                    f.wrapping_sub(1)
                } else {
                    f.wrapping_add(1)
                };

                if result == 0 {
                    self.pc += 1;
                }

                result
            }

            FileOp::Rrf | FileOp::Rlf => {
                let carry = self.flag(CARRY) as u8;
                let (result, out) = if op == FileOp::Rrf {
                    (f >> 1 | carry << 7, f & 0x01 != 0)
                } else {
                    (f << 1 | carry, f & 0x80 != 0)
                };

                self.set_flag(CARRY, out);
                result
            }

            FileOp::Swapf => f.rotate_left(4),
            _ => {
                let result = match op {
                    FileOp::Decf => f.wrapping_sub(1),
                    FileOp::Incf => f.wrapping_add(1),
                    FileOp::Iorwf => f | w,
                    FileOp::Andwf => f & w,
                    FileOp::Xorwf => f ^ w,
                    FileOp::Comf => !f,
                    _ => f,
                };

                self.set_flag(ZERO, result == 0);
                result
            }
        };

        match dest {
            Dest::W => self.w = result,
            Dest::F => self.regs[reg] = result,
        }
    }

    fn literal(&mut self, op: LiteralOp, k: u8) {
        let w = self.w;

        self.w = match op {
            LiteralOp::Movlw => k,
            LiteralOp::Retlw => {
                self.pc = self.stack.pop().unwrap_or(self.image.len());
                k
            }

            LiteralOp::Sublw => {
                let (result, borrow) = k.overflowing_sub(w);
                self.set_flag(CARRY, !borrow);
                self.set_flag(ZERO, result == 0);
                result
            }

            LiteralOp::Addlw => {
                let (result, carry) = k.overflowing_add(w);
                self.set_flag(CARRY, carry);
                self.set_flag(ZERO, result == 0);
                result
            }

            LiteralOp::Iorlw | LiteralOp::Andlw | LiteralOp::Xorlw => {
                let result = match op {
                    LiteralOp::Iorlw => k | w,
                    LiteralOp::Andlw => k & w,
                    _ => k ^ w,
                };

                self.set_flag(ZERO, result == 0);
                result
            }
        };
    }
}
