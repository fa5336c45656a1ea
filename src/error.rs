use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::result;

/// A type alias for `Result<T, csv4180::Error>`.
pub type Result<T> = result::Result<T, Error>;

/// An error that can occur when processing CSV data.
///
/// Malformed CSV is never an error: the reader always finds *a* parse.
/// The only failures are I/O failures of the underlying stream and reading
/// past the end of it.
#[derive(Debug)]
pub enum Error {
    /// An I/O error that occurred while reading or writing CSV data.
    ///
    /// This includes fields that are not valid UTF-8, which are reported
    /// with the `io::ErrorKind::InvalidData` kind.
    ///
    /// After an I/O error, the state of a reader or writer is unspecified
    /// and it should not be used further.
    Io(io::Error),
    /// A field or row was requested after the end of the CSV data was
    /// reached.
    EndOfStream,
}

impl Error {
    /// Returns true if this error was caused by reading past the end of the
    /// CSV data.
    pub fn is_end_of_stream(&self) -> bool {
        match *self {
            Error::EndOfStream => true,
            Error::Io(_) => false,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> io::Error {
        match err {
            Error::Io(err) => err,
            Error::EndOfStream => {
                io::Error::new(io::ErrorKind::UnexpectedEof, Error::EndOfStream)
            }
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            Error::EndOfStream => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Io(ref err) => fmt::Display::fmt(err, f),
            Error::EndOfStream => {
                write!(f, "CSV error: no more fields, end of stream reached")
            }
        }
    }
}

/// `IntoInnerError` occurs when consuming a `Writer` fails.
///
/// Consuming the `Writer` causes a flush to happen. If the flush fails, then
/// this error is returned, which contains both the original `Writer` and
/// the error that occurred.
///
/// The type parameter `W` is the unconsumed writer.
pub struct IntoInnerError<W> {
    wtr: W,
    err: io::Error,
}

impl<W> IntoInnerError<W> {
    /// Creates a new `IntoInnerError`.
    ///
    /// (This is a visibility hack. It's public in this module, but not in the
    /// crate.)
    pub(crate) fn new(wtr: W, err: io::Error) -> IntoInnerError<W> {
        IntoInnerError { wtr, err }
    }

    /// Returns the error which caused the call to `into_inner` to fail.
    ///
    /// This error was returned when attempting to flush the internal buffer.
    pub fn error(&self) -> &io::Error {
        &self.err
    }

    /// Returns the underlying writer which generated the error.
    ///
    /// The returned value can be used for error recovery, such as
    /// re-inspecting the buffer.
    pub fn into_inner(self) -> W {
        self.wtr
    }
}

impl<W: std::any::Any> StdError for IntoInnerError<W> {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.err)
    }
}

impl<W> fmt::Display for IntoInnerError<W> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.err, f)
    }
}

impl<W> fmt::Debug for IntoInnerError<W> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(&self.err, f)
    }
}
