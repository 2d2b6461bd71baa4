/// Escribe una línea de listado: dirección, palabra y, opcionalmente,
/// el texto de la instrucción.
macro_rules! emit {
    ($output:expr, $address:expr, $word:expr) => {
        writeln!($output, "{:03X}  {:04X}", $address, $word)
    };

    ($output:expr, $address:expr, $word:expr, $($format:tt)*) => {{
        write!($output, "{:03X}  {:04X}    ", $address, $word)?;
        writeln!($output, $($format)*)
    }};
}
