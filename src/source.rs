//! Posiciones en el archivo fuente.
//!
//! Cada carácter que lee el scanner viene acompañado de su ubicación.
//! Los tokens y los diagnósticos heredan esas ubicaciones, y el origen
//! guarda las líneas ya leídas para poder citarlas en los reportes.

use std::{
    cell::RefCell,
    fmt::{self, Debug, Display, Formatter},
    io::{self, BufRead, Lines},
    ops::Range,
    rc::Rc,
    vec,
};

const TAB_STOP: u32 = 4;

/// Caracteres con la ubicación del carácter siguiente.
pub trait InputStream: Iterator<Item = Result<(char, Location), io::Error>> {}

impl<I> InputStream for I where I: Iterator<Item = Result<(char, Location), io::Error>> {}

/// Un valor junto a la ubicación de donde proviene.
#[derive(Debug, Clone)]
pub struct Located<T> {
    location: Location,
    value: T,
}

impl<T> Located<T> {
    pub fn at(value: T, location: Location) -> Self {
        Located { value, location }
    }

    pub fn val(&self) -> &T {
        &self.value
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn into_inner(self) -> T {
        self.value
    }

    pub fn split(self) -> (Location, T) {
        (self.location, self.value)
    }
}

/// Rango de posiciones dentro de un mismo origen.
#[derive(Clone)]
pub struct Location {
    from: Rc<Source>,
    position: Range<Position>,
}

impl Location {
    /// Desde el inicio de `from` hasta el final de `to`.
    pub fn span(from: Location, to: &Location) -> Self {
        Location {
            from: from.from,
            position: from.position.start..to.position.end,
        }
    }

    pub fn start(&self) -> Position {
        self.position.start
    }

    pub fn end(&self) -> Position {
        self.position.end
    }

    pub fn source(&self) -> &Source {
        &self.from
    }
}

impl Display for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:", self.from.name)?;

        let Range { start, end } = self.position;
        if end == start.advance() {
            write!(formatter, "{}", start)
        } else {
            write!(formatter, "[{}-{}]", start, end.back())
        }
    }
}

impl Debug for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        <Self as Display>::fmt(self, formatter)
    }
}

/// Línea y columna, ambas a partir de 1.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Position {
    line: u32,
    column: u32,
}

impl Position {
    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    fn advance(self) -> Position {
        Position {
            column: self.column + 1,
            ..self
        }
    }

    fn back(self) -> Position {
        Position {
            column: self.column.saturating_sub(1).max(1),
            ..self
        }
    }

    fn newline(self) -> Position {
        Position {
            line: self.line + 1,
            column: 1,
        }
    }

    fn tab(self) -> Position {
        Position {
            column: 1 + ((self.column - 1) / TAB_STOP + 1) * TAB_STOP,
            ..self
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position { line: 1, column: 1 }
    }
}

impl Display for Position {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.line, self.column)
    }
}

/// Lee `reader` carácter por carácter.
///
/// La ubicación retornada corresponde al primer carácter. Cada carácter
/// emitido lleva la ubicación del que le sigue, de modo que el scanner
/// conoce siempre dónde termina el lexema actual. Toda línea termina
/// en `'\n'`, incluso la última.
pub fn consume<R, S>(reader: R, name: S) -> (Location, impl InputStream)
where
    R: BufRead,
    S: Into<String>,
{
    let source = Rc::new(Source {
        name: name.into(),
        lines: Default::default(),
    });

    let start = Location {
        from: Rc::clone(&source),
        position: Position::default()..Position::default().advance(),
    };

    let chars = Chars {
        lines: reader.lines(),
        source,
        pending: Vec::new().into_iter(),
        next: Position::default(),
        done: false,
    };

    (start, chars)
}

/// Nombre del archivo y líneas leídas hasta el momento.
pub struct Source {
    name: String,
    lines: RefCell<Vec<String>>,
}

impl Source {
    /// Invoca a `callback` con el contenido de una línea, si ya fue leída.
    pub fn with_line<F>(&self, line: u32, callback: F) -> fmt::Result
    where
        F: FnOnce(&str) -> fmt::Result,
    {
        let lines = self.lines.borrow();
        match line.checked_sub(1).and_then(|index| lines.get(index as usize)) {
            Some(line) => callback(line),
            None => Ok(()),
        }
    }
}

struct Chars<R> {
    lines: Lines<R>,
    source: Rc<Source>,
    pending: vec::IntoIter<char>,
    next: Position,
    done: bool,
}

impl<R: BufRead> Iterator for Chars<R> {
    type Item = io::Result<(char, Location)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(c) = self.pending.next() {
                let here = self.next;
                self.next = match c {
                    '\n' => here.newline(),
                    '\t' => here.tab(),
                    _ => here.advance(),
                };

                let location = Location {
                    from: Rc::clone(&self.source),
                    position: self.next..self.next.advance(),
                };

                return Some(Ok((c, location)));
            } else if self.done {
                return None;
            }

            // Un error de E/S termina la lectura
            match self.lines.next() {
                Some(Ok(line)) => {
                    let mut chars: Vec<_> = line.chars().collect();
                    chars.push('\n');

                    self.source.lines.borrow_mut().push(line);
                    self.pending = chars.into_iter();
                }

                Some(Err(error)) => {
                    self.done = true;
                    return Some(Err(error));
                }

                None => self.done = true,
            }
        }
    }
}
