// Copyright 2015 Ted Mielczarek. See the COPYRIGHT
// file at the top-level directory of this distribution.

//! Parsing a Breakpad text-format symbol file into a queryable [`SymbolFile`].

use std::collections::HashMap;
use std::io::BufRead;

use log::warn;

use crate::contained_range_map::ContainedRangeMap;
use crate::error::{SymbolError, SymbolErrorKind, SymbolResult};
use crate::frame::{FrameSymbol, FrameSymbolizer, FrameUnwindInfo};
use crate::range_map::RangeMap;
use crate::tokenizer::tokenize;
use crate::Addr;

/// A practical cap on the length of a single symbol-file record, as
/// protection against unbounded reads on a malformed or hostile file.
pub const MAX_LINE_LENGTH: usize = 1024;

/// The number of distinct unwind record flavors a module can carry.
const NUM_UNWIND_TYPES: usize = 5;

/// Which typed slot a `STACK WIN` record's `type` field selects.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
enum UnwindType {
    Fpo = 0,
    Trap = 1,
    Tss = 2,
    Standard = 3,
    FrameData = 4,
}

impl UnwindType {
    fn from_code(code: u64) -> Option<UnwindType> {
        match code {
            0 => Some(UnwindType::Fpo),
            1 => Some(UnwindType::Trap),
            2 => Some(UnwindType::Tss),
            3 => Some(UnwindType::Standard),
            4 => Some(UnwindType::FrameData),
            _ => None,
        }
    }
}

/// Platform-specific stack-frame unwind metadata covering a code range.
///
/// Corresponds to a single `STACK WIN` record.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UnwindInfo {
    /// The size, in bytes, of this function's prologue.
    pub prolog_size: u32,
    /// The size, in bytes, of this function's epilogue.
    pub epilog_size: u32,
    /// The size, in bytes, of this function's stack-passed arguments.
    pub parameter_size: u32,
    /// The size, in bytes, used to save callee-saved registers.
    pub saved_register_size: u32,
    /// The size, in bytes, used for this function's local variables.
    pub local_size: u32,
    /// The maximum number of bytes pushed on the stack in this frame.
    pub max_stack_size: u32,
    /// A program for recovering the caller's register values.
    pub program_string: String,
}

/// A function's extent and the source lines within it.
struct Function {
    name: String,
    parameter_size: u32,
    size: Addr,
    lines: RangeMap<Line>,
}

/// A single source line's extent.
struct Line {
    file_id: u32,
    line: u32,
}

/// A `PUBLIC` record whose extent isn't known until every symbol in the
/// module has been read (see `SymbolFile::finalize_publics`).
struct PendingPublic {
    address: Addr,
    parameter_size: u32,
    name: String,
}

/// Tracks which function, if any, subsequent bare `<addr> <size> <line>
/// <file_id>` records should be attached to.
enum FuncState {
    /// No `FUNC` record has been seen yet; a line record here is an orphan.
    None,
    /// The most recent `FUNC` record was discarded (its range conflicted
    /// with an existing one); line records are silently dropped until the
    /// next `FUNC`.
    Discarded,
    /// Line records are appended to the function based at this address.
    Active(Addr),
}

/// One loaded module's worth of symbolic data: functions, their source
/// lines, and stack-unwind records, all addressed by module-relative RVA.
///
/// Immutable once [`parse`](SymbolFile::parse) returns successfully; any
/// number of threads may call [`lookup`](SymbolFile::lookup) on a loaded
/// `SymbolFile` concurrently.
pub struct SymbolFile {
    files: HashMap<u32, String>,
    functions: RangeMap<Function>,
    unwind: [ContainedRangeMap<UnwindInfo>; NUM_UNWIND_TYPES],
}

impl std::fmt::Debug for SymbolFile {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("SymbolFile")
            .field("files", &self.files.len())
            .finish()
    }
}

impl SymbolFile {
    fn empty() -> SymbolFile {
        SymbolFile {
            files: HashMap::new(),
            functions: RangeMap::new(),
            unwind: Default::default(),
        }
    }

    /// Parse a Breakpad symbol file from `reader` into a fully-populated
    /// `SymbolFile`.
    ///
    /// Fails (without yielding a partially built module) on an I/O error,
    /// or on a malformed mandatory record: an orphan line record, a line
    /// record with a non-positive line number, or an unparsable mandatory
    /// field in a `FILE`, `FUNC`, `PUBLIC`, or recognized `STACK` record.
    /// Other anomalies — an unrecognized `STACK` platform, a range that
    /// conflicts with one already stored, an out-of-range unwind type code,
    /// or a duplicate `FILE` id — are tolerated: the offending record is
    /// dropped (logged at `warn`) and parsing continues.
    pub fn parse<R: BufRead>(mut reader: R) -> SymbolResult<SymbolFile> {
        let mut file = SymbolFile::empty();
        let mut state = FuncState::None;
        let mut pending_publics: Vec<PendingPublic> = Vec::new();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let bytes_read = reader.read_until(b'\n', &mut buf)?;
            if bytes_read == 0 {
                break;
            }
            if buf.len() > MAX_LINE_LENGTH {
                return Err(SymbolErrorKind::ParseFailed.into());
            }
            let line = std::str::from_utf8(&buf).map_err(|_| SymbolErrorKind::ParseFailed)?;
            file.parse_line(line, &mut state, &mut pending_publics)?;
        }

        file.finalize_publics(pending_publics);
        Ok(file)
    }

    fn parse_line(
        &mut self,
        line: &str,
        state: &mut FuncState,
        pending_publics: &mut Vec<PendingPublic>,
    ) -> SymbolResult<()> {
        let tag = peek_tag(line);
        match tag {
            "MODULE" | "INFO" => Ok(()),
            "FILE" => self.parse_file(line),
            "FUNC" => self.parse_func(line, state),
            "PUBLIC" => self.parse_public(line, pending_publics),
            "STACK" => self.parse_stack(line),
            _ => self.parse_line_record(line, state),
        }
    }

    fn parse_file(&mut self, line: &str) -> SymbolResult<()> {
        let (tokens, ok) = tokenize(line, 3);
        if !ok {
            return Err(SymbolErrorKind::ParseFailed.into());
        }
        let id: u32 = tokens[1]
            .parse()
            .map_err(|_| SymbolErrorKind::ParseFailed)?;
        self.files.insert(id, tokens[2].to_string());
        Ok(())
    }

    fn parse_func(&mut self, line: &str, state: &mut FuncState) -> SymbolResult<()> {
        let rest = strip_tag(line, "FUNC");
        let (_multiple, rest) = strip_multiple_flag(rest);
        let (tokens, ok) = tokenize(rest, 4);
        if !ok {
            return Err(SymbolErrorKind::ParseFailed.into());
        }
        let address = parse_hex(tokens[0])?;
        let size = parse_hex(tokens[1])?;
        let parameter_size = parse_hex(tokens[2])? as u32;
        let name = tokens[3];

        let function = Function {
            name: name.to_string(),
            parameter_size,
            size,
            lines: RangeMap::new(),
        };
        if self.functions.store_range(address, size, function) {
            *state = FuncState::Active(address);
        } else {
            warn!(
                "breakpad-symbols: discarding FUNC at {:#x}: overlaps an existing range",
                address
            );
            *state = FuncState::Discarded;
        }
        Ok(())
    }

    fn parse_public(
        &mut self,
        line: &str,
        pending_publics: &mut Vec<PendingPublic>,
    ) -> SymbolResult<()> {
        let rest = strip_tag(line, "PUBLIC");
        let (_multiple, rest) = strip_multiple_flag(rest);
        let (tokens, ok) = tokenize(rest, 3);
        if !ok {
            return Err(SymbolErrorKind::ParseFailed.into());
        }
        let address = parse_hex(tokens[0])?;
        let parameter_size = parse_hex(tokens[1])? as u32;
        pending_publics.push(PendingPublic {
            address,
            parameter_size,
            name: tokens[2].to_string(),
        });
        Ok(())
    }

    fn parse_stack(&mut self, line: &str) -> SymbolResult<()> {
        let (tokens, ok) = tokenize(line, 2);
        if !ok {
            return Err(SymbolErrorKind::ParseFailed.into());
        }
        let rest = tokens[1];
        if peek_tag(rest) != "WIN" {
            // Platforms other than WIN (e.g. `STACK CFI`) are out of scope
            // for this resolver; skip them without failing the load.
            return Ok(());
        }

        let (fields, ok) = tokenize(rest, 11);
        if !ok {
            return Err(SymbolErrorKind::ParseFailed.into());
        }
        let type_code = parse_hex(fields[1])?;
        let rva = parse_hex(fields[2])?;
        let code_size = parse_hex(fields[3])?;
        let prolog_size = parse_hex(fields[4])? as u32;
        let epilog_size = parse_hex(fields[5])? as u32;
        let parameter_size = parse_hex(fields[6])? as u32;
        let saved_register_size = parse_hex(fields[7])? as u32;
        let local_size = parse_hex(fields[8])? as u32;
        let max_stack_size = parse_hex(fields[9])? as u32;
        let program_string = fields[10].to_string();

        let unwind_type = match UnwindType::from_code(type_code) {
            Some(ty) => ty,
            None => {
                warn!(
                    "breakpad-symbols: dropping STACK WIN record with out-of-range type {}",
                    type_code
                );
                return Ok(());
            }
        };

        let info = UnwindInfo {
            prolog_size,
            epilog_size,
            parameter_size,
            saved_register_size,
            local_size,
            max_stack_size,
            program_string,
        };
        if !self.unwind[unwind_type as usize].store_range(rva, code_size, info) {
            warn!(
                "breakpad-symbols: dropping STACK WIN record at {:#x}: conflicts with an existing range",
                rva
            );
        }
        Ok(())
    }

    fn parse_line_record(&mut self, line: &str, state: &mut FuncState) -> SymbolResult<()> {
        match *state {
            FuncState::None => Err(SymbolErrorKind::ParseFailed.into()),
            FuncState::Discarded => Ok(()),
            FuncState::Active(base) => {
                let (tokens, ok) = tokenize(line, 4);
                if !ok {
                    return Err(SymbolErrorKind::ParseFailed.into());
                }
                let address = parse_hex(tokens[0])?;
                let size = parse_hex(tokens[1])?;
                let line_no: i64 = tokens[2]
                    .parse()
                    .map_err(|_| SymbolErrorKind::ParseFailed)?;
                if line_no <= 0 {
                    return Err(SymbolErrorKind::ParseFailed.into());
                }
                let file_id: u32 = tokens[3]
                    .parse()
                    .map_err(|_| SymbolErrorKind::ParseFailed)?;
                if let Some(function) = self.functions.retrieve_range_mut(base) {
                    let stored = function.lines.store_range(
                        address,
                        size,
                        Line {
                            file_id,
                            line: line_no as u32,
                        },
                    );
                    if !stored {
                        warn!(
                            "breakpad-symbols: dropping LINE record at {:#x}: overlaps an existing line",
                            address
                        );
                    }
                }
                Ok(())
            }
        }
    }

    /// `PUBLIC` records have no size field; breakpad dumpers don't know a
    /// public symbol's extent, only its start address. We compute one
    /// retroactively, as the gap to the next higher symbol (or to the end
    /// of the address space for the last one), once every `FUNC` and
    /// `PUBLIC` record has been read.
    fn finalize_publics(&mut self, mut pending_publics: Vec<PendingPublic>) {
        pending_publics.sort_by_key(|p| p.address);
        let mut iter = pending_publics.into_iter().peekable();
        while let Some(public) = iter.next() {
            let size = match iter.peek() {
                Some(next) if next.address > public.address => next.address - public.address,
                Some(_) => continue, // duplicate address; drop, the earlier one wins
                None => Addr::MAX - public.address,
            };
            let function = Function {
                name: public.name,
                parameter_size: public.parameter_size,
                size,
                lines: RangeMap::new(),
            };
            if !self.functions.store_range(public.address, size, function) {
                warn!(
                    "breakpad-symbols: dropping PUBLIC at {:#x}: overlaps an existing function",
                    public.address
                );
            }
        }
    }

    /// Resolve `rva` to a function name, source location, and unwind info,
    /// filling in `frame`.
    ///
    /// Unwind info is looked up first — `FRAME_DATA`, then `FPO`, then
    /// `STANDARD` — so that it's populated even if `rva` doesn't fall
    /// within any known function. Returns the unwind info separately since
    /// it isn't part of the `FrameSymbolizer` contract.
    pub fn fill_frame(&self, frame: &mut dyn FrameSymbolizer, rva: Addr) -> Option<FrameUnwindInfo> {
        let unwind = self.unwind[UnwindType::FrameData as usize]
            .retrieve_range(rva)
            .or_else(|| self.unwind[UnwindType::Fpo as usize].retrieve_range(rva))
            .or_else(|| self.unwind[UnwindType::Standard as usize].retrieve_range(rva))
            .cloned();

        if let Some((base, function)) = self.functions.retrieve_range_with_base(rva) {
            frame.set_function(&function.name, base, function.parameter_size);
            if let Some((line_base, line)) = function.lines.retrieve_range_with_base(rva) {
                let file = self
                    .files
                    .get(&line.file_id)
                    .map(String::as_str)
                    .unwrap_or("<unknown>");
                frame.set_source_file(file, line.line, line_base);
            }
        }

        unwind
    }

    /// Resolve `rva` and return the result as an owned [`FrameSymbol`],
    /// for callers that don't want to implement [`FrameSymbolizer`].
    pub fn lookup(&self, rva: Addr) -> (FrameSymbol, Option<FrameUnwindInfo>) {
        let mut symbol = FrameSymbol::default();
        let unwind = self.fill_frame(&mut symbol, rva);
        (symbol, unwind)
    }
}

/// The first whitespace-delimited token of `line`, without consuming it.
fn peek_tag(line: &str) -> &str {
    let trimmed = line.trim_start_matches(|c| c == ' ' || c == '\r' || c == '\n');
    let end = trimmed
        .find(|c: char| c == ' ' || c == '\r' || c == '\n')
        .unwrap_or(trimmed.len());
    &trimmed[..end]
}

/// Remove a known leading record tag (e.g. `"FUNC"`) from `line`.
fn strip_tag<'a>(line: &'a str, tag: &str) -> &'a str {
    line[tag.len()..].trim_start()
}

/// `FUNC` and `PUBLIC` records may carry an optional leading `m` flag
/// (breakpad sets it when the symbol was seen in more than one object
/// file). It doesn't affect lookup, so we accept and discard it.
fn strip_multiple_flag(rest: &str) -> (bool, &str) {
    match rest.strip_prefix('m') {
        Some(after) if after.starts_with(|c: char| c == ' ' || c == '\t') => (true, after),
        _ => (false, rest),
    }
}

fn parse_hex(token: &str) -> SymbolResult<Addr> {
    Addr::from_str_radix(token, 16).map_err(|_| SymbolErrorKind::ParseFailed.into())
}
