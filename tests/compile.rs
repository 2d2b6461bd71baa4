use picl::{
    error::CompileError,
    hex, listing,
    output::{Output, OutputError, OutputOptions},
};

fn compile(text: &str) -> picl::Compilation {
    picl::compile(text.as_bytes(), "test.pcl")
}

fn codes(compilation: &picl::Compilation) -> Vec<u32> {
    compilation
        .diagnostics
        .iter()
        .map(|error| error.val().code())
        .collect()
}

#[test]
fn smallest_program() {
    let compilation = compile("MODULE M; INT a; BEGIN a := 5 END M.");

    assert!(compilation.succeeded(), "{}", compilation.diagnostics);
    assert_eq!(compilation.image(), vec![0x2801, 0x3005, 0x008C]);
}

#[test]
fn compilation_is_deterministic() {
    let text = "MODULE M; INT a, b;
                PROCEDURE p(INT x): INT; BEGIN RETURN x + 1 END p;
                BEGIN WHILE a < 10 DO a := p(a); b := b + a END END M.";

    assert_eq!(compile(text).image(), compile(text).image());
}

#[test]
fn undeclared_identifier_is_reported_once() {
    let compilation = compile("MODULE M; INT a; BEGIN a := x END M.");

    assert_eq!(compilation.errors(), 1);
    assert!(matches!(
        compilation.diagnostics.iter().next().map(|error| error.val()),
        Some(CompileError::UndefinedName(_))
    ));
}

#[test]
fn each_undefined_reference_is_reported() {
    let compilation = compile("MODULE M; INT a; BEGIN a := x; a := x + 1 END M.");

    let undefined: Vec<_> = compilation
        .diagnostics
        .iter()
        .filter(|error| matches!(error.val(), CompileError::UndefinedName(_)))
        .collect();

    assert!(!compilation.succeeded());
    assert_eq!(undefined.len(), 2);
    assert_eq!(codes(&compilation), vec![10, 10]);
}

#[test]
fn module_names_must_match() {
    let compilation = compile("MODULE M; INT a; BEGIN a := 1 END N.");

    assert_eq!(compilation.errors(), 1);

    let first = compilation.diagnostics.iter().next().map(|error| error.val());
    match first {
        Some(CompileError::NameMismatch { expected, found }) => {
            assert_eq!(expected.to_string(), "M");
            assert_eq!(found.to_string(), "N");
        }

        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn mixed_types_are_rejected() {
    let compilation = compile("MODULE M; INT a; SET s; BEGIN a := a + s END M.");
    assert_eq!(codes(&compilation), vec![111]);
}

#[test]
fn integer_multiplication_is_rejected() {
    let compilation = compile("MODULE M; INT a, b; BEGIN a := a * b END M.");

    assert_eq!(codes(&compilation), vec![11]);
    assert!(matches!(
        compilation.diagnostics.iter().next().map(|error| error.val()),
        Some(CompileError::UnsupportedOperation(_))
    ));
}

#[test]
fn only_procedures_are_called() {
    let compilation = compile("MODULE M; INT a; BEGIN a(1) END M.");
    assert_eq!(codes(&compilation), vec![3]);
}

#[test]
fn decrementing_loops_are_shorter() {
    let fused = compile("MODULE M; INT a; BEGIN REPEAT a := a - 1 UNTIL a = 0 END M.");
    let plain = compile("MODULE M; INT a; BEGIN REPEAT a := a - 1 UNTIL a < 1 END M.");

    assert!(fused.succeeded() && plain.succeeded());
    assert_eq!(fused.image(), vec![0x2801, 0x0B8C, 0x2801]);
    assert!(fused.image().len() < plain.image().len());
}

#[test]
fn diagnostics_point_at_the_source() {
    let compilation = compile("MODULE M;\nINT a;\nBEGIN a := x END M.");
    let report = compilation.diagnostics.to_string();

    assert!(report.starts_with("error[E010]: "), "{}", report);
    assert!(report.contains("3 | BEGIN a := x END M."), "{}", report);
    assert!(report.contains("Build failed with 1 error"), "{}", report);
}

#[test]
fn clean_compilations_report_nothing() {
    let compilation = compile("MODULE M; END M.");
    assert_eq!(compilation.diagnostics.to_string(), "No errors were reported\n");
}

#[test]
fn hex_and_listing_from_a_compilation() {
    let compilation = compile(
        "MODULE M; INT a;
         PROCEDURE p; BEGIN INC a END p;
         BEGIN p END M.",
    );

    assert!(compilation.succeeded(), "{}", compilation.diagnostics);

    let mut text = Vec::new();
    hex::write(&compilation.image(), &mut text).unwrap();

    let text = String::from_utf8(text).unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with(":08000000"), "{}", text);
    assert_eq!(lines[1], ":00000001FF");

    let mut text = Vec::new();
    listing::write(&compilation, &mut text).unwrap();

    let text = String::from_utf8(text).unwrap();
    assert!(text.contains("p:\n001  0A8C    INCF    0x0C,F\n"), "{}", text);
    assert!(text.contains("; symbols"), "{}", text);
}

#[test]
fn output_files_are_written() {
    let compilation = compile("MODULE M; INT a; BEGIN a := 5 END M.");

    let directory = std::env::temp_dir().join(format!("picl-output-{}", std::process::id()));
    std::fs::create_dir_all(&directory).unwrap();

    let output = Output::new(directory.join("blink.hex"));
    output.write(&compilation, OutputOptions::all()).unwrap();

    let hex = std::fs::read_to_string(output.hex()).unwrap();
    assert_eq!(hex, ":06000000012805308C0010\n:00000001FF\n");
    assert!(output.listing().exists());

    std::fs::remove_dir_all(&directory).unwrap();
}

#[test]
fn failed_compilations_are_not_written() {
    let compilation = compile("MODULE M; BEGIN x := 1 END M.");
    let output = Output::new(std::env::temp_dir().join("picl-never-written.hex"));

    assert!(matches!(
        output.write(&compilation, OutputOptions::HEX),
        Err(OutputError::Failed(1))
    ));
}
