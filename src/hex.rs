//! Archivos objeto en formato Intel HEX.
//!
//! Cada registro tiene la forma `:llaaaatt dd.. cc`, con todos los campos
//! en hexadecimal ASCII. Cada palabra de 14 bits ocupa dos bytes en orden
//! little-endian, por lo cual la dirección de byte es el doble de la
//! dirección de palabra.

use std::io::{self, Write};

/// Palabras por registro de datos.
const WORDS_PER_RECORD: usize = 8;

/// Registro de fin de archivo.
const END_OF_FILE: &str = ":00000001FF";

/// Escribe una imagen completa.
pub fn write<W: Write>(image: &[u16], output: &mut W) -> io::Result<()> {
    for (index, record) in image.chunks(WORDS_PER_RECORD).enumerate() {
        let address = (index * WORDS_PER_RECORD * 2) as u16;
        write_record(output, address, record)?;
    }

    writeln!(output, "{}", END_OF_FILE)
}

fn write_record<W: Write>(output: &mut W, address: u16, words: &[u16]) -> io::Result<()> {
    let length = (words.len() * 2) as u8;
    let [address_high, address_low] = address.to_be_bytes();

    write!(output, ":{:02X}{:04X}00", length, address)?;

    let mut sum = length
        .wrapping_add(address_high)
        .wrapping_add(address_low);

    for word in words {
        for byte in word.to_le_bytes().iter() {
            write!(output, "{:02X}", byte)?;
            sum = sum.wrapping_add(*byte);
        }
    }

    writeln!(output, "{:02X}", sum.wrapping_neg())
}
