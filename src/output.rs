//! Emisión de archivos de salida.
//!
//! Una compilación exitosa produce un archivo objeto Intel HEX listo
//! para descargarse al microcontrolador y, opcionalmente, un listado.
//! Si hubo errores no se escribe nada: un programa con errores nunca
//! debe llegar al dispositivo.

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::{compile::Compilation, hex, listing};
use bitflags::bitflags;
use thiserror::Error;

bitflags! {
    /// Archivos a generar.
    pub struct OutputOptions: u32 {
        /// Archivo objeto Intel HEX.
        const HEX = 0x01;

        /// Listado con desensamblado y tabla de símbolos.
        const LISTING = 0x02;
    }
}

/// Un error de emisión.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum OutputError {
    /// Ocurrió un evento de error de E/S al escribir algún archivo.
    #[error("I/O error")]
    Io(#[from] io::Error),

    /// La compilación reportó errores.
    #[error("Refusing to write output, compilation failed with {0} errors")]
    Failed(usize),
}

/// Rutas de salida para un mismo programa.
pub struct Output {
    hex: PathBuf,
    listing: PathBuf,
}

impl Output {
    /// El listado se escribe junto al archivo HEX, con extensión `.lst`.
    pub fn new<P: AsRef<Path>>(hex: P) -> Self {
        let hex = hex.as_ref().to_path_buf();
        let listing = hex.with_extension("lst");

        Output { hex, listing }
    }

    /// Ruta del archivo HEX.
    pub fn hex(&self) -> &Path {
        &self.hex
    }

    /// Ruta del listado.
    pub fn listing(&self) -> &Path {
        &self.listing
    }

    /// Escribe los archivos seleccionados.
    pub fn write(
        &self,
        compilation: &Compilation,
        options: OutputOptions,
    ) -> Result<(), OutputError> {
        if !compilation.succeeded() {
            return Err(OutputError::Failed(compilation.errors()));
        }

        if options.contains(OutputOptions::HEX) {
            log::info!("writing {}", self.hex.display());

            let mut file = BufWriter::new(File::create(&self.hex)?);
            hex::write(&compilation.image(), &mut file)?;
            file.flush()?;
        }

        if options.contains(OutputOptions::LISTING) {
            log::info!("writing {}", self.listing.display());

            let mut file = BufWriter::new(File::create(&self.listing)?);
            listing::write(compilation, &mut file)?;
            file.flush()?;
        }

        Ok(())
    }
}
