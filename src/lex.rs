//! Análisis léxico.
//!
//! # Tokenization
//! Descompone un [`InputStream`] (flujo de caracteres) en unidades
//! léxicas denominadas tokens. Los espacios en blanco y los comentarios
//! `{ ... }` se descartan durante esta operación. Cada token emitido está
//! asociado a una ubicación en el código fuente original.
//!
//! A diferencia de un compilador de varias fases, el generador de código
//! no recibe una lista completa de tokens: los solicita uno por uno, por
//! lo cual el [`Lexer`] es simplemente un iterador.
//!
//! # Reglas importantes del lenguaje
//! - Las palabras clave se escriben en mayúsculas y el lenguaje distingue
//!   mayúsculas de minúsculas.
//! - Los identificadores comienzan con una letra y se truncan a
//!   [`ID_LEN`] caracteres.
//! - Los literales decimales son de tipo `INT`, los literales `$hh` son
//!   de tipo `SET`. Ambos deben caber en un byte.
//!
//! # Errores
//! Ante un error el lexer descarta el resto de la línea y continúa,
//! de manera que el compilador pueda reportar más de un error por
//! ejecución.

use crate::source::{InputStream, Located, Location};
use std::{
    fmt::{self, Display},
    rc::Rc,
    str::FromStr,
};

use thiserror::Error;

/// Longitud significativa máxima de un identificador.
pub const ID_LEN: usize = 16;

/// Literal máximo: todo literal ocupa un byte.
const LITERAL_MAX: u32 = u8::MAX as u32;

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LexerError {
    /// Error de E/S originado por el [`InputStream`].
    #[error("I/O error")]
    Input(#[from] std::io::Error),

    /// Carácter desconocido o inesperado en el flujo de entrada.
    #[error("Bad character {0:?} in input stream")]
    BadChar(char),

    /// Una constante se encuentra fuera de rango.
    #[error("Literal overflow, valid range is [0, 255]")]
    LiteralOverflow,

    /// `$` no fue seguido por un dígito hexadecimal.
    #[error("Expected hexadecimal digit after `$`")]
    ExpectedHexDigit,
}

/// Un identificador.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(Rc<str>);

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Identifier(Rc::from(name))
    }
}

impl Display for Identifier {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_ref().fmt(fmt)
    }
}

/// Objeto resultante del análisis léxico.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Identificador.
    Id(Identifier),

    /// Palabra clave.
    Keyword(Keyword),

    /// Literal decimal, de tipo `INT`.
    IntLiteral(u8),

    /// Literal `$hh`, de tipo `SET`.
    SetLiteral(u8),

    /// `*`
    Times,

    /// `/`
    Slash,

    /// `+`
    Plus,

    /// `-`
    Minus,

    /// `~`
    Not,

    /// `&`
    And,

    /// `=`
    Equal,

    /// `#`
    NotEqual,

    /// `>=`
    GreaterOrEqual,

    /// `<`
    Less,

    /// `<=`
    LessOrEqual,

    /// `>`
    Greater,

    /// `.`
    Period,

    /// `,`
    Comma,

    /// `:`
    Colon,

    /// `!`
    Bang,

    /// `?`
    Query,

    /// `(`
    OpenParen,

    /// `:=`
    Becomes,

    /// `)`
    CloseParen,

    /// `;`
    Semicolon,
}

impl Token {
    /// Determina si el token es un operador relacional.
    pub fn is_relation(&self) -> bool {
        use Token::*;
        matches!(
            self,
            Equal | NotEqual | GreaterOrEqual | Less | LessOrEqual | Greater
        )
    }
}

impl Display for Token {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Token::*;

        match self {
            Id(id) => write!(fmt, "identifier `{}`", id),
            Keyword(keyword) => write!(fmt, "`{}`", keyword),
            IntLiteral(integer) => write!(fmt, "literal `{}`", integer),
            SetLiteral(set) => write!(fmt, "literal `${:02X}`", set),
            Times => fmt.write_str("`*`"),
            Slash => fmt.write_str("`/`"),
            Plus => fmt.write_str("`+`"),
            Minus => fmt.write_str("`-`"),
            Not => fmt.write_str("`~`"),
            And => fmt.write_str("`&`"),
            Equal => fmt.write_str("`=`"),
            NotEqual => fmt.write_str("`#`"),
            GreaterOrEqual => fmt.write_str("`>=`"),
            Less => fmt.write_str("`<`"),
            LessOrEqual => fmt.write_str("`<=`"),
            Greater => fmt.write_str("`>`"),
            Period => fmt.write_str("`.`"),
            Comma => fmt.write_str("`,`"),
            Colon => fmt.write_str("`:`"),
            Bang => fmt.write_str("`!`"),
            Query => fmt.write_str("`?`"),
            OpenParen => fmt.write_str("`(`"),
            Becomes => fmt.write_str("`:=`"),
            CloseParen => fmt.write_str("`)`"),
            Semicolon => fmt.write_str("`;`"),
        }
    }
}

/// Una palabra clave.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Keyword {
    Begin,
    Bool,
    Const,
    Dec,
    Do,
    Else,
    Elsif,
    End,
    If,
    Inc,
    Int,
    Module,
    Or,
    Procedure,
    Repeat,
    Return,
    Rol,
    Ror,
    Set,
    Then,
    Until,
    While,
}

/// Tabla de palabras clave, ordenada para búsqueda binaria.
const KEYWORDS: &[(&str, Keyword)] = &[
    ("BEGIN", Keyword::Begin),
    ("BOOL", Keyword::Bool),
    ("CONST", Keyword::Const),
    ("DEC", Keyword::Dec),
    ("DO", Keyword::Do),
    ("ELSE", Keyword::Else),
    ("ELSIF", Keyword::Elsif),
    ("END", Keyword::End),
    ("IF", Keyword::If),
    ("INC", Keyword::Inc),
    ("INT", Keyword::Int),
    ("MODULE", Keyword::Module),
    ("OR", Keyword::Or),
    ("PROCEDURE", Keyword::Procedure),
    ("REPEAT", Keyword::Repeat),
    ("RETURN", Keyword::Return),
    ("ROL", Keyword::Rol),
    ("ROR", Keyword::Ror),
    ("SET", Keyword::Set),
    ("THEN", Keyword::Then),
    ("UNTIL", Keyword::Until),
    ("WHILE", Keyword::While),
];

impl Display for Keyword {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let string = KEYWORDS
            .iter()
            .find(|(_, keyword)| keyword == self)
            .map(|(name, _)| *name)
            .unwrap_or("?");

        fmt.write_str(string)
    }
}

impl FromStr for Keyword {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        KEYWORDS
            .binary_search_by(|(name, _)| name.cmp(&string))
            .map(|index| KEYWORDS[index].1)
            .map_err(|_| ())
    }
}

/// Máquina de estados para análisis léxico.
///
/// La salida del lexer, así como su siguiente estado, se define
/// a partir de tanto su estado actual como el siguiente carácter
/// encontrado en el flujo de entrada.
pub struct Lexer<S: Iterator> {
    source: std::iter::Peekable<S>,
    state: State,
    start: Location,
    next: Location,
}

/// Posibles estados del lexer.
enum State {
    /// Estado que ocurre antes de encontrar el inicio de un token.
    Start,

    /// Estado de error, se descarta hasta el final de la línea.
    Error,

    /// Estado de completitud; siempre emite el token incluido,
    /// consume la entrada actual y pasa a [`State::Start`].
    Complete(Token),

    /// Comentario entre llaves.
    ///
    /// Este estado vuelve a [`State::Start`] al encontrar `'}'`.
    Comment,

    /// Se encontró `:`, puede seguir `=`.
    Colon,

    /// Se encontró `<`, puede seguir `=`.
    Less,

    /// Se encontró `>`, puede seguir `=`.
    Greater,

    /// Constante decimal.
    Integer(u32),

    /// Constante hexadecimal, con la cantidad de dígitos leídos.
    Hex(u8, u8),

    /// Término que puede ser un identificador o una palabra clave.
    Word(String),
}

impl<S: InputStream> Lexer<S> {
    /// Crea un lexer en estado inicial a partir de un flujo.
    pub fn new(start: Location, source: S) -> Self {
        let next = start.clone();
        Lexer {
            source: source.peekable(),
            state: State::Start,
            start,
            next,
        }
    }

    /// Intenta construir un siguiente token.
    fn lex(&mut self) -> Result<Option<(Token, Location)>, LexerError> {
        use {State::*, Token::*};

        let mut last_accepted = self.start.clone();
        let token = loop {
            // Se espera un siguiente carácter, fallando si hay error de E/S
            let next_char = match self.source.peek() {
                None => None,
                Some(Ok((c, _))) => Some(*c),
                Some(Err(_)) => match self.source.next() {
                    Some(Err(error)) => break Err(error.into()),
                    _ => None,
                },
            };

            // La posición de origen se mueve junto a la posición
            // siguiente siempre que no se haya encontrado una
            // frontera de token
            if let Start = self.state {
                self.start = self.next.clone();
            }

            match (&mut self.state, next_char) {
                // Condiciones de error: se descarta la línea donde
                // ocurrió el error. Al llegar al final de la línea
                // el lexer se recupera y reinicia.
                (Error, None) => return Ok(None),
                (Error, Some('\n')) => self.state = Start,
                (Error, Some(_)) => (),

                // Tokens triviales
                (Start, None) => return Ok(None),
                (Start, Some('*')) => self.state = Complete(Times),
                (Start, Some('/')) => self.state = Complete(Slash),
                (Start, Some('+')) => self.state = Complete(Plus),
                (Start, Some('-')) => self.state = Complete(Minus),
                (Start, Some('~')) => self.state = Complete(Not),
                (Start, Some('&')) => self.state = Complete(And),
                (Start, Some('=')) => self.state = Complete(Equal),
                (Start, Some('#')) => self.state = Complete(NotEqual),
                (Start, Some('.')) => self.state = Complete(Period),
                (Start, Some(',')) => self.state = Complete(Comma),
                (Start, Some('!')) => self.state = Complete(Bang),
                (Start, Some('?')) => self.state = Complete(Query),
                (Start, Some('(')) => self.state = Complete(OpenParen),
                (Start, Some(')')) => self.state = Complete(CloseParen),
                (Start, Some(';')) => self.state = Complete(Semicolon),
                (Start, Some(':')) => self.state = State::Colon,
                (Start, Some('<')) => self.state = State::Less,
                (Start, Some('>')) => self.state = State::Greater,
                (Start, Some('{')) => self.state = Comment,
                (Start, Some('$')) => self.state = Hex(0, 0),

                // Identificadores y palabras clave
                (Start, Some(c)) if c.is_ascii_alphabetic() => self.state = Word(c.to_string()),

                // Inicio de una constante numérica. No se consume el
                // dígito, el estado de constante entera lo acumula
                (Start, Some(c)) if c.is_ascii_digit() => {
                    self.state = Integer(0);
                    continue;
                }

                // Espacios en blanco y caracteres inesperados
                (Start, Some(c)) if c.is_ascii_whitespace() || c.is_ascii_control() => (),
                (Start, Some(c)) => break Err(LexerError::BadChar(c)),

                // Emisión retardada de tokens cualesquiera
                (Complete(value), _) => break Ok(std::mem::replace(value, Plus)),

                // Operadores de dos caracteres
                (State::Colon, Some('=')) => self.state = Complete(Becomes),
                (State::Colon, _) => break Ok(Token::Colon),
                (State::Less, Some('=')) => self.state = Complete(LessOrEqual),
                (State::Less, _) => break Ok(Token::Less),
                (State::Greater, Some('=')) => self.state = Complete(GreaterOrEqual),
                (State::Greater, _) => break Ok(Token::Greater),

                // Los comentarios pueden abarcar varias líneas
                (Comment, Some('}')) => self.state = Start,
                (Comment, Some(_)) => (),
                (Comment, None) => return Ok(None),

                // Acumulación dígito por dígito de constantes enteras
                (Integer(accumulated), Some(digit)) if digit.is_ascii_digit() => {
                    let digit = digit.to_digit(10).unwrap_or(0);

                    *accumulated = *accumulated * 10 + digit;
                    if *accumulated > LITERAL_MAX {
                        break Err(LexerError::LiteralOverflow);
                    }
                }

                // Si sigue algo que no es un dígito, la constante ha terminado
                (Integer(integer), _) => break Ok(IntLiteral(*integer as u8)),

                // Hasta dos dígitos hexadecimales
                (Hex(value, digits), Some(c)) if *digits < 2 && c.is_ascii_hexdigit() => {
                    *value = (*value << 4) | c.to_digit(16).unwrap_or(0) as u8;
                    *digits += 1;
                }

                (Hex(_, 0), _) => break Err(LexerError::ExpectedHexDigit),
                (Hex(value, _), _) => break Ok(SetLiteral(*value)),

                // Extensión de términos
                (Word(word), Some(c)) if c.is_ascii_alphanumeric() => {
                    if word.len() < ID_LEN {
                        word.push(c);
                    }
                }

                // Si sigue algo que no puede formar parte del término, ha terminado
                (Word(word), _) => {
                    if let Ok(keyword) = self::Keyword::from_str(word) {
                        break Ok(Keyword(keyword));
                    } else {
                        break Ok(Id(Identifier(Rc::from(word.as_str()))));
                    }
                }
            }

            // Si no hubo `continue`, aquí se consume el carácter que
            // se observó con lookahead anteriormente
            if let Some(Ok((_, next_position))) = self.source.next() {
                last_accepted = std::mem::replace(&mut self.next, next_position);
            }
        };

        token.map(|token| Some((token, last_accepted)))
    }
}

impl<S: InputStream> Iterator for Lexer<S> {
    type Item = Result<Located<Token>, Located<LexerError>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.lex() {
            Ok(None) => None,
            Ok(Some((token, last_accepted))) => {
                self.state = State::Start;

                let location = Location::span(self.start.clone(), &last_accepted);
                Some(Ok(Located::at(token, location)))
            }

            Err(error) => {
                self.state = State::Error;
                Some(Err(Located::at(error, self.next.clone())))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source;

    fn tokens(text: &str) -> Vec<Token> {
        let (start, stream) = source::consume(text.as_bytes(), "test.pcl");
        Lexer::new(start, stream)
            .map(|result| result.map(Located::into_inner))
            .collect::<Result<_, _>>()
            .unwrap()
    }

    fn errors(text: &str) -> Vec<String> {
        let (start, stream) = source::consume(text.as_bytes(), "test.pcl");
        Lexer::new(start, stream)
            .filter_map(Result::err)
            .map(|error| error.into_inner().to_string())
            .collect()
    }

    #[test]
    fn empty_input_has_no_tokens() {
        assert_eq!(tokens(""), Vec::new());
        assert_eq!(tokens("  \n\t  "), Vec::new());
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            tokens("MODULE blink; INT Count"),
            vec![
                Token::Keyword(Keyword::Module),
                Token::Id(Identifier::from("blink")),
                Token::Semicolon,
                Token::Keyword(Keyword::Int),
                Token::Id(Identifier::from("Count")),
            ]
        );
    }

    #[test]
    fn keywords_are_case_sensitive() {
        assert_eq!(tokens("begin"), vec![Token::Id(Identifier::from("begin"))]);
    }

    #[test]
    fn identifiers_are_truncated() {
        assert_eq!(
            tokens("abcdefghijklmnopqrstuvwxyz"),
            vec![Token::Id(Identifier::from("abcdefghijklmnop"))]
        );
    }

    #[test]
    fn two_character_operators() {
        assert_eq!(
            tokens("a := b <= c >= d < e > f : g"),
            vec![
                Token::Id(Identifier::from("a")),
                Token::Becomes,
                Token::Id(Identifier::from("b")),
                Token::LessOrEqual,
                Token::Id(Identifier::from("c")),
                Token::GreaterOrEqual,
                Token::Id(Identifier::from("d")),
                Token::Less,
                Token::Id(Identifier::from("e")),
                Token::Greater,
                Token::Id(Identifier::from("f")),
                Token::Colon,
                Token::Id(Identifier::from("g")),
            ]
        );
    }

    #[test]
    fn literals_carry_their_domain() {
        assert_eq!(
            tokens("255 $0F $a 7"),
            vec![
                Token::IntLiteral(255),
                Token::SetLiteral(0x0F),
                Token::SetLiteral(0x0A),
                Token::IntLiteral(7),
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            tokens("INC {increment\n the counter} x"),
            vec![
                Token::Keyword(Keyword::Inc),
                Token::Id(Identifier::from("x")),
            ]
        );
    }

    #[test]
    fn bit_selectors_and_primitives() {
        assert_eq!(
            tokens("!~B.3; ?A.0"),
            vec![
                Token::Bang,
                Token::Not,
                Token::Id(Identifier::from("B")),
                Token::Period,
                Token::IntLiteral(3),
                Token::Semicolon,
                Token::Query,
                Token::Id(Identifier::from("A")),
                Token::Period,
                Token::IntLiteral(0),
            ]
        );
    }

    #[test]
    fn errors_discard_the_rest_of_the_line() {
        assert_eq!(errors("a @ b c\nd"), vec!["Bad character '@' in input stream"]);

        let (start, stream) = source::consume("a @ b c\nd".as_bytes(), "test.pcl");
        let good: Vec<_> = Lexer::new(start, stream)
            .filter_map(Result::ok)
            .map(Located::into_inner)
            .collect();

        assert_eq!(
            good,
            vec![
                Token::Id(Identifier::from("a")),
                Token::Id(Identifier::from("d")),
            ]
        );
    }

    #[test]
    fn literal_overflow_is_reported() {
        assert_eq!(errors("256").len(), 1);
        assert_eq!(errors("$").len(), 1);
    }

    #[test]
    fn tokens_are_located() {
        let (start, stream) = source::consume("IF x".as_bytes(), "test.pcl");
        let located: Vec<_> = Lexer::new(start, stream)
            .map(|token| token.unwrap().location().to_string())
            .collect();

        assert_eq!(located, vec!["test.pcl:[1:1-1:2]", "test.pcl:1:4"]);
    }
}
