// Copyright 2015 Ted Mielczarek. See the COPYRIGHT
// file at the top-level directory of this distribution.

//! Concrete end-to-end scenarios, exercised through the public API the way
//! a caller with a minidump's module list would use it.

use std::io::Cursor;

use breakpad_symbols::{FrameSymbol, FrameSymbolizer, Resolver, SymbolFile};

fn parse(text: &str) -> SymbolFile {
    SymbolFile::parse(Cursor::new(text.as_bytes())).expect("symbol file should parse")
}

#[test]
fn function_file_and_line_resolve_together() {
    let symbols = parse("FILE 1 /src/foo.c\nFUNC 1000 100 0 foo\n1000 20 42 1\n");
    let (symbol, _) = symbols.lookup(0x1005);
    assert_eq!(symbol.function_name.as_deref(), Some("foo"));
    assert_eq!(symbol.source_file.as_deref(), Some("/src/foo.c"));
    assert_eq!(symbol.source_line, Some(42));
}

#[test]
fn line_with_no_matching_file_record_still_resolves() {
    let symbols = parse("FUNC 2000 50 0 bar\n2000 10 7 9\n");
    let (symbol, _) = symbols.lookup(0x2001);
    assert_eq!(symbol.function_name.as_deref(), Some("bar"));
    assert_eq!(symbol.source_file, None);
    assert_eq!(symbol.source_line, Some(7));
}

#[test]
fn malformed_func_hex_field_aborts_the_load() {
    let result = SymbolFile::parse(Cursor::new(b"FUNC zzz 100 0 a\n".as_slice()));
    assert!(result.is_err());
}

#[test]
fn overlapping_func_does_not_abort_the_load() {
    let symbols = parse("FUNC 1000 100 0 a\nFUNC 1050 10 0 b\n");
    assert_eq!(symbols.lookup(0x1000).0.function_name.as_deref(), Some("a"));
    // [1050, 1060) is fully inside the already-stored [1000, 1100); the
    // conflicting FUNC is dropped and the earlier range still resolves.
    assert_eq!(symbols.lookup(0x1055).0.function_name.as_deref(), Some("a"));
}

#[test]
fn stack_win_fills_unwind_info() {
    let symbols = parse("STACK WIN 4 1000 20 5 0 0 0 0 100 $eip\n");
    let (_, unwind) = symbols.lookup(0x1003);
    let unwind = unwind.expect("unwind info should resolve");
    assert_eq!(unwind.prolog_size, 5);
    assert_eq!(unwind.max_stack_size, 0x100);
    assert_eq!(unwind.program_string, "$eip");
}

#[test]
fn nested_stack_win_returns_the_innermost_record() {
    let symbols = parse(
        "STACK WIN 4 1000 100 0 0 0 0 0 1 outer\n\
         STACK WIN 4 1020 10 0 0 0 0 0 2 inner\n",
    );
    assert_eq!(
        symbols.lookup(0x1025).1.unwrap().program_string,
        "inner"
    );
    assert_eq!(
        symbols.lookup(0x1050).1.unwrap().program_string,
        "outer"
    );
}

#[test]
fn partially_overlapping_stack_win_is_rejected_but_load_succeeds() {
    let symbols = parse(
        "STACK WIN 4 4242 1a a 0 0 0 0 0 first\n\
         STACK WIN 4 4243 2e 9 0 0 0 0 0 second\n",
    );
    assert_eq!(
        symbols.lookup(0x4243).1.unwrap().program_string,
        "first"
    );
}

#[test]
fn boundary_addresses_of_a_stored_range() {
    let symbols = parse("FUNC 1000 10 0 f\nFUNC 2000 10 0 g\n");
    assert!(symbols.lookup(0x1000).0.function_name.is_some());
    assert!(symbols.lookup(0x100f).0.function_name.is_some());
    assert!(symbols.lookup(0x1010).0.function_name.is_none());
    assert!(symbols.lookup(0x0fff).0.function_name.is_none());
}

#[test]
fn repeated_lookup_is_idempotent() {
    let symbols = parse("FUNC 1000 100 0 foo\n1000 20 42 1\n");
    let first = symbols.lookup(0x1005);
    let second = symbols.lookup(0x1005);
    assert_eq!(first.0, second.0);
}

struct CountingFrame {
    inner: FrameSymbol,
    function_calls: u32,
}

impl FrameSymbolizer for CountingFrame {
    fn set_function(&mut self, name: &str, base: u64, parameter_size: u32) {
        self.function_calls += 1;
        self.inner.set_function(name, base, parameter_size);
    }
    fn set_source_file(&mut self, file: &str, line: u32, base: u64) {
        self.inner.set_source_file(file, line, base);
    }
}

#[test]
fn resolver_converts_absolute_address_through_module_base() {
    let mut resolver = Resolver::new();
    resolver
        .load_module(
            "example.so",
            Cursor::new(&b"FUNC 1000 50 0 do_work\n"[..]),
        )
        .unwrap();

    let mut frame = CountingFrame {
        inner: FrameSymbol::default(),
        function_calls: 0,
    };
    let unwind = resolver.fill_frame("example.so", 0x7f0000000000, 0x7f0000001005, &mut frame);
    assert!(unwind.is_none());
    assert_eq!(frame.function_calls, 1);
    assert_eq!(frame.inner.function_name.as_deref(), Some("do_work"));
}

#[test]
fn public_symbols_fill_the_gap_between_them() {
    let symbols = parse(
        "PUBLIC 3000 0 first_export\n\
         PUBLIC 3100 0 second_export\n\
         FUNC 3200 10 0 a_function\n",
    );
    assert_eq!(
        symbols.lookup(0x3050).0.function_name.as_deref(),
        Some("first_export")
    );
    assert_eq!(
        symbols.lookup(0x30ff).0.function_name.as_deref(),
        Some("first_export")
    );
    assert_eq!(
        symbols.lookup(0x3150).0.function_name.as_deref(),
        Some("second_export")
    );
}
