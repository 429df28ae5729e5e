// Copyright 2015 Ted Mielczarek. See the COPYRIGHT
// file at the top-level directory of this distribution.

//! The output of a lookup: a symbol for a code address, and the
//! platform-specific unwind info that applies to it.

use crate::symbolfile::UnwindInfo;
use crate::Addr;

/// The platform-specific stack-unwind record that applies to a resolved
/// address, returned alongside the filled-in frame since it isn't part of
/// the [`FrameSymbolizer`] contract.
pub type FrameUnwindInfo = UnwindInfo;

/// A caller-owned stack frame that a [`Module`](crate::Module) or
/// [`Resolver`](crate::Resolver) can fill in with symbol information.
///
/// Implementing this trait instead of requiring a concrete output type
/// lets the resolver fill in whatever frame representation the caller
/// already has (e.g. one that also carries register state from stack
/// unwinding) without this crate depending on that type.
pub trait FrameSymbolizer {
    /// Record that the queried address falls within `name`, a function
    /// starting at `base` and expecting `parameter_size` bytes of
    /// stack-passed arguments.
    fn set_function(&mut self, name: &str, base: Addr, parameter_size: u32);
    /// Record that the queried address falls within the source line
    /// starting at `base`, reported as `line` of `file`.
    fn set_source_file(&mut self, file: &str, line: u32, base: Addr);
}

/// An owned symbol lookup result, for callers that just want the answer as
/// a value rather than implementing [`FrameSymbolizer`] themselves.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FrameSymbol {
    /// The name of the function containing the queried address, if any.
    pub function_name: Option<String>,
    /// The start address of that function.
    pub function_base: Option<Addr>,
    /// The size, in bytes, of that function's stack-passed arguments.
    pub parameter_size: Option<u32>,
    /// The source file containing the queried address, if both a function
    /// and a line record were found. Unset if the line's `file_id` has no
    /// matching `FILE` record, even though `source_line` is still set in
    /// that case.
    pub source_file: Option<String>,
    /// The (1-based) source line number.
    pub source_line: Option<u32>,
    /// The start address of that source line.
    pub source_line_base: Option<Addr>,
}

impl FrameSymbolizer for FrameSymbol {
    fn set_function(&mut self, name: &str, base: Addr, parameter_size: u32) {
        self.function_name = Some(name.to_string());
        self.function_base = Some(base);
        self.parameter_size = Some(parameter_size);
    }

    fn set_source_file(&mut self, file: &str, line: u32, base: Addr) {
        self.source_file = Some(file.to_string());
        self.source_line = Some(line);
        self.source_line_base = Some(base);
    }
}
