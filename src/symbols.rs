//! Tabla de símbolos.
//!
//! Los nombres declarados se almacenan en un vector de solo inserción,
//! del más antiguo al más reciente. La búsqueda recorre el vector desde
//! el final, por lo cual una declaración más reciente oculta a cualquier
//! otra con el mismo nombre. Un ámbito es simplemente una longitud
//! guardada: salir del ámbito trunca el vector a esa longitud.

use std::fmt::{self, Display};

use crate::lex::Identifier;

/// Dominio de valores de un símbolo.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Type {
    Int,
    Set,
    Bool,
}

impl Display for Type {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => fmt.write_str("INT"),
            Type::Set => fmt.write_str("SET"),
            Type::Bool => fmt.write_str("BOOL"),
        }
    }
}

/// Clase de objeto nombrado.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Kind {
    /// La dirección es un registro de archivo.
    Variable,

    /// La dirección es el valor literal.
    Constant,

    /// La dirección es el índice de la primera instrucción.
    Procedure,

    /// Sustituto de un nombre no declarado.
    Undefined,
}

impl Display for Kind {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Variable => fmt.write_str("variable"),
            Kind::Constant => fmt.write_str("constant"),
            Kind::Procedure => fmt.write_str("procedure"),
            Kind::Undefined => fmt.write_str("undefined name"),
        }
    }
}

/// Una entrada de la tabla.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub name: Identifier,
    pub kind: Kind,
    pub typ: Option<Type>,
    pub param: Option<Type>,
    pub address: u16,
}

impl Entry {
    /// Una variable en un registro de archivo.
    pub fn variable(name: Identifier, typ: Type, address: u8) -> Self {
        Entry {
            name,
            kind: Kind::Variable,
            typ: Some(typ),
            param: None,
            address: address as u16,
        }
    }

    /// Una constante con nombre.
    pub fn constant(name: Identifier, typ: Type, value: u8) -> Self {
        Entry {
            name,
            kind: Kind::Constant,
            typ: Some(typ),
            param: None,
            address: value as u16,
        }
    }

    /// Un procedimiento con parámetro y resultado opcionales.
    pub fn procedure(
        name: Identifier,
        param: Option<Type>,
        result: Option<Type>,
        entry: usize,
    ) -> Self {
        Entry {
            name,
            kind: Kind::Procedure,
            typ: result,
            param,
            address: entry as u16,
        }
    }

    /// El sustituto que se utiliza tras reportar un nombre no declarado.
    pub fn undefined(name: Identifier) -> Self {
        Entry {
            name,
            kind: Kind::Undefined,
            typ: None,
            param: None,
            address: 0,
        }
    }

    /// Dirección como registro de archivo.
    pub fn register(&self) -> u8 {
        (self.address & 0x7F) as u8
    }

    /// Dirección como literal de 8 bits.
    pub fn value(&self) -> u8 {
        (self.address & 0xFF) as u8
    }
}

/// Marca opaca de un ámbito guardado.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Scope(usize);

/// Registros de hardware predeclarados: `TMR0`, `STATUS`, `PORTA`, `PORTB`.
const HARDWARE: &[(&str, u8)] = &[("T", 0x01), ("S", 0x03), ("A", 0x05), ("B", 0x06)];

/// Tabla de símbolos con ámbitos anidados.
#[derive(Clone, Debug)]
pub struct SymbolTable {
    entries: Vec<Entry>,
    base: usize,
}

impl SymbolTable {
    /// Crea una tabla cuyo ámbito base contiene a los registros de hardware.
    ///
    /// El ámbito base nunca se descarta.
    pub fn with_hardware() -> Self {
        let entries: Vec<_> = HARDWARE
            .iter()
            .map(|&(name, address)| Entry::variable(Identifier::from(name), Type::Set, address))
            .collect();

        SymbolTable {
            base: entries.len(),
            entries,
        }
    }

    /// Busca la declaración visible más reciente de un nombre.
    pub fn lookup(&self, name: &Identifier) -> Option<&Entry> {
        self.entries.iter().rev().find(|entry| entry.name == *name)
    }

    /// Declara un nombre en el ámbito actual.
    pub fn declare(&mut self, entry: Entry) -> &Entry {
        log::debug!(
            "declare {} `{}` at {:#04x}",
            entry.kind,
            entry.name,
            entry.address
        );

        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    /// Guarda el ámbito actual.
    pub fn save_scope(&self) -> Scope {
        Scope(self.entries.len())
    }

    /// Descarta todo lo declarado desde que se guardó `scope`.
    pub fn restore_scope(&mut self, Scope(mark): Scope) {
        self.entries.truncate(mark.max(self.base));
    }

    /// Entradas declaradas por el programa, sin el ámbito base.
    pub fn declared(&self) -> &[Entry] {
        &self.entries[self.base..]
    }

    /// Todas las entradas visibles, de la más antigua a la más reciente.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    /// Busca el procedimiento cuya primera instrucción está en `address`.
    pub fn procedure_at(&self, address: usize) -> Option<&Entry> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.kind == Kind::Procedure && entry.address as usize == address)
    }
}
