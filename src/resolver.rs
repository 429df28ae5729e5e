// Copyright 2015 Ted Mielczarek. See the COPYRIGHT
// file at the top-level directory of this distribution.

//! A name-keyed set of loaded modules, resolving absolute instruction
//! addresses by first converting them to module-relative ones.

use std::collections::HashMap;
use std::io::BufRead;

use crate::error::{SymbolErrorKind, SymbolResult};
use crate::frame::{FrameSymbol, FrameSymbolizer, FrameUnwindInfo};
use crate::symbolfile::SymbolFile;
use crate::Addr;

/// Holds every module a caller has loaded symbols for, keyed by the name
/// under which it was loaded, and resolves instruction addresses against
/// whichever module the caller says contains them.
///
/// A `Resolver` doesn't know anything about a process's memory layout: the
/// caller is responsible for identifying which module an instruction
/// address falls in and what that module's load address was, typically by
/// walking a list of loaded modules from a minidump or `/proc/*/maps`.
#[derive(Default)]
pub struct Resolver {
    modules: HashMap<String, SymbolFile>,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("modules", &self.modules.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Resolver {
    /// Create a `Resolver` with no modules loaded.
    pub fn new() -> Resolver {
        Resolver {
            modules: HashMap::new(),
        }
    }

    /// Parse a symbol file from `reader` and register it under `name`.
    ///
    /// Fails with [`SymbolErrorKind::DuplicateModule`] if `name` is already
    /// loaded, or with whatever [`SymbolFile::parse`] returns if the symbol
    /// file itself fails to parse. Either way, no module is loaded with a
    /// name that was not previously present.
    ///
    /// [`SymbolErrorKind::DuplicateModule`]: enum.SymbolErrorKind.html#variant.DuplicateModule
    pub fn load_module<R: BufRead>(&mut self, name: &str, reader: R) -> SymbolResult<()> {
        if self.modules.contains_key(name) {
            return Err(SymbolErrorKind::DuplicateModule.into());
        }
        let symbols = SymbolFile::parse(reader)?;
        self.modules.insert(name.to_string(), symbols);
        Ok(())
    }

    /// Whether a module named `name` is currently loaded.
    pub fn has_module(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Resolve `instruction`, an address in `module`'s loaded image, to a
    /// symbol and fill in `frame`.
    ///
    /// `module_base` is the address at which `module` was loaded; the
    /// module-relative address handed to the underlying [`SymbolFile`] is
    /// `instruction - module_base`. Returns `None`, leaving `frame`
    /// untouched, if no module named `module` is loaded or if
    /// `instruction` precedes `module_base`.
    pub fn fill_frame(
        &self,
        module: &str,
        module_base: Addr,
        instruction: Addr,
        frame: &mut dyn FrameSymbolizer,
    ) -> Option<FrameUnwindInfo> {
        let symbols = self.modules.get(module)?;
        let rva = instruction.checked_sub(module_base)?;
        symbols.fill_frame(frame, rva)
    }

    /// Like [`fill_frame`](#method.fill_frame), but returns an owned
    /// [`FrameSymbol`] instead of writing through a caller-supplied one.
    pub fn lookup(
        &self,
        module: &str,
        module_base: Addr,
        instruction: Addr,
    ) -> (FrameSymbol, Option<FrameUnwindInfo>) {
        let mut symbol = FrameSymbol::default();
        let unwind = self.fill_frame(module, module_base, instruction, &mut symbol);
        (symbol, unwind)
    }
}
