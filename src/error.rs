// Copyright 2015 Ted Mielczarek. See the COPYRIGHT
// file at the top-level directory of this distribution.

//! Errors produced while loading a symbol file.

use std::fmt;
use std::io;

use failure::{Backtrace, Context, Fail};

/// The kind of error that prevented a symbol file from loading.
///
/// Query-time misses (an address that doesn't resolve to anything) are
/// *not* errors: they're represented by an unfilled [`FrameSymbol`], since
/// there's nothing exceptional about asking for an address this module
/// doesn't know about.
///
/// [`FrameSymbol`]: struct.FrameSymbol.html
#[derive(Debug, Fail, Copy, Clone, Eq, PartialEq)]
pub enum SymbolErrorKind {
    /// The underlying reader could not be read to completion.
    #[fail(display = "couldn't read symbol file")]
    Io,
    /// A mandatory record was malformed: an orphan LINE record, an
    /// unparsable mandatory field, or a LINE record with a non-positive
    /// line number.
    #[fail(display = "malformed symbol file")]
    ParseFailed,
    /// `LoadModule` was called with a name that's already present in the
    /// resolver.
    #[fail(display = "a module with this name is already loaded")]
    DuplicateModule,
}

/// An error produced while loading a symbol file or module.
#[derive(Debug)]
pub struct SymbolError {
    inner: Context<SymbolErrorKind>,
}

impl Fail for SymbolError {
    fn cause(&self) -> Option<&dyn Fail> {
        self.inner.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.inner.backtrace()
    }
}

impl fmt::Display for SymbolError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl SymbolError {
    /// The kind of error this was.
    pub fn kind(&self) -> SymbolErrorKind {
        *self.inner.get_context()
    }
}

impl From<SymbolErrorKind> for SymbolError {
    fn from(kind: SymbolErrorKind) -> SymbolError {
        SymbolError {
            inner: Context::new(kind),
        }
    }
}

impl From<Context<SymbolErrorKind>> for SymbolError {
    fn from(inner: Context<SymbolErrorKind>) -> SymbolError {
        SymbolError { inner }
    }
}

impl From<io::Error> for SymbolError {
    fn from(error: io::Error) -> SymbolError {
        error.context(SymbolErrorKind::Io).into()
    }
}

/// The result type returned when loading a symbol file.
pub type SymbolResult<T> = Result<T, SymbolError>;
