use std::cmp;
use std::io::{self, BufRead};
use std::str;

use bstr::ByteSlice;
use csv4180_core::{ReadFieldResult, Reader as CoreReader};
use log::{debug, trace};

use crate::error::{Error, Result};

/// The default capacity of the buffer wrapped around the underlying reader.
const DEFAULT_CAPACITY: usize = 8 * (1 << 10);

/// The initial size of the buffer that accumulates a single field.
const INITIAL_FIELD_CAPACITY: usize = 64;

/// Builds a CSV reader with various configuration knobs.
///
/// The CSV dialect itself is fixed, so the only thing to configure is how
/// much of the underlying reader is buffered.
#[derive(Debug)]
pub struct ReaderBuilder {
    capacity: usize,
}

impl Default for ReaderBuilder {
    fn default() -> ReaderBuilder {
        ReaderBuilder { capacity: DEFAULT_CAPACITY }
    }
}

impl ReaderBuilder {
    /// Create a new builder for configuring CSV parsing.
    pub fn new() -> ReaderBuilder {
        ReaderBuilder::default()
    }

    /// Build a CSV parser from this configuration that reads data from `rdr`.
    ///
    /// Note that the CSV reader is buffered automatically, so you should not
    /// wrap `rdr` in a buffered reader like `io::BufReader`.
    pub fn from_reader<R: io::Read>(&self, rdr: R) -> Reader<R> {
        Reader::new(self, rdr)
    }

    /// Set the capacity (in bytes) of the buffer used in the CSV reader.
    ///
    /// The default is 8 KiB. A capacity of 0 is rounded up to 1.
    pub fn capacity(&mut self, capacity: usize) -> &mut ReaderBuilder {
        self.capacity = capacity;
        self
    }
}

/// A streaming CSV reader that yields one field at a time.
///
/// The reader pulls bytes from an underlying `io::Read` through an internal
/// buffer and decodes them with a three state automaton: outside of quotes,
/// inside of quotes, and just after a quote inside of quotes. Fields are
/// separated by `,`, rows end at `\n` and a `\r` outside of quotes is
/// dropped.
///
/// Callers drive the reader by repeatedly asking for fields, consulting
/// `has_more_fields_on_line` to find row boundaries and `is_eof` to find
/// the end of the data. Whole rows can be read with `read_row`, and the
/// `rows` iterator wraps all of this up.
///
/// # Trailing line terminators
///
/// Data that ends with a line terminator has no extra empty row at the end.
/// That is, `a\nb` and `a\nb\n` both contain the rows `["a"]` and `["b"]`.
/// The reader looks at (but does not consume) the next byte after every
/// line terminator, so that `is_eof` turns true as soon as the last field
/// of the last row has been returned.
///
/// A consequence is that the last field of a row is only returned once
/// the first byte of the next row, or the end of the data, is available.
/// With an interactive source such as a pipe or a socket, reading that
/// field can block until more input arrives.
///
/// # Example
///
/// ```
/// use csv4180::Reader;
///
/// # fn main() { example().unwrap(); }
/// fn example() -> csv4180::Result<()> {
///     let data = "city,pop\n\"Boston, MA\",4628910\n";
///     let mut rdr = Reader::from_reader(data.as_bytes());
///
///     assert_eq!(rdr.read_field()?, "city");
///     assert!(rdr.has_more_fields_on_line());
///     assert_eq!(rdr.read_field()?, "pop");
///     assert!(!rdr.has_more_fields_on_line());
///
///     assert_eq!(rdr.read_row()?, vec!["Boston, MA", "4628910"]);
///     assert!(rdr.is_eof());
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct Reader<R> {
    /// The underlying CSV field automaton.
    core: CoreReader,
    /// The underlying reader.
    rdr: io::BufReader<R>,
    /// Accumulates the bytes of the field being read.
    field: Vec<u8>,
}

impl<R: io::Read> Reader<R> {
    fn new(builder: &ReaderBuilder, rdr: R) -> Reader<R> {
        Reader {
            core: CoreReader::new(),
            // An empty buffer marks the end of the data, so it can't be
            // zero sized.
            rdr: io::BufReader::with_capacity(builder.capacity.max(1), rdr),
            field: vec![0; INITIAL_FIELD_CAPACITY],
        }
    }

    /// Create a new CSV reader with a default configuration for the given
    /// reader.
    ///
    /// To customize CSV parsing, use a `ReaderBuilder`.
    pub fn from_reader(rdr: R) -> Reader<R> {
        ReaderBuilder::new().from_reader(rdr)
    }

    /// Read the next field, removing quotes as necessary.
    ///
    /// After this returns, `has_more_fields_on_line` reports whether the
    /// field was followed by a delimiter and `is_eof` reports whether it was
    /// the final field of the data.
    ///
    /// When the underlying data runs out in the middle of a row, whatever
    /// was accumulated is returned as the final field, even if it is empty.
    /// In particular, a reader over empty data returns a single empty field.
    ///
    /// # Errors
    ///
    /// If `is_eof` is already true, then `Error::EndOfStream` is returned.
    ///
    /// If reading from the underlying reader fails, or if the field is not
    /// valid UTF-8, then `Error::Io` is returned. The reader should not be
    /// used after that.
    pub fn read_field(&mut self) -> Result<String> {
        if self.is_eof() {
            return Err(Error::EndOfStream);
        }
        let mut outlen = 0;
        loop {
            let (res, nin, nout) = {
                let input = self.rdr.fill_buf()?;
                self.core.read_field(input, &mut self.field[outlen..])
            };
            self.rdr.consume(nin);
            outlen += nout;
            match res {
                ReadFieldResult::InputEmpty => continue,
                ReadFieldResult::OutputFull => {
                    self.expand_field();
                    continue;
                }
                ReadFieldResult::Field { record_end } => {
                    if record_end {
                        self.check_end()?;
                    }
                    return self.decode_field(outlen);
                }
                ReadFieldResult::End => return Err(Error::EndOfStream),
            }
        }
    }

    /// Read the remaining fields of the current row.
    ///
    /// This reads fields until one is not followed by a delimiter. When
    /// called at the start of a row, the whole row is returned.
    ///
    /// # Errors
    ///
    /// If `is_eof` is already true, then `Error::EndOfStream` is returned.
    /// Otherwise, this fails for the same reasons as `read_field`.
    pub fn read_row(&mut self) -> Result<Vec<String>> {
        let mut row = vec![];
        self.read_row_into(&mut row)?;
        Ok(row)
    }

    /// Read the remaining fields of the current row into `row`.
    ///
    /// `row` is cleared first, which lets callers reuse its allocation
    /// across rows.
    ///
    /// # Errors
    ///
    /// This fails for the same reasons as `read_row`. `row` is cleared even
    /// if an error occurs.
    pub fn read_row_into(&mut self, row: &mut Vec<String>) -> Result<()> {
        row.clear();
        if self.is_eof() {
            return Err(Error::EndOfStream);
        }
        loop {
            row.push(self.read_field()?);
            if !self.has_more_fields_on_line() {
                return Ok(());
            }
        }
    }

    /// Returns a borrowed iterator over all remaining rows.
    ///
    /// Each item yielded is a row or an error. The iterator stops at the end
    /// of the data, and after the first error.
    ///
    /// # Example
    ///
    /// ```
    /// use csv4180::Reader;
    ///
    /// let data = "a,b\r\nc,\"d\ne\"\r\n";
    /// let mut rdr = Reader::from_reader(data.as_bytes());
    /// let rows = rdr.rows().collect::<csv4180::Result<Vec<_>>>().unwrap();
    ///
    /// assert_eq!(rows, vec![vec!["a", "b"], vec!["c", "d\ne"]]);
    /// ```
    pub fn rows(&mut self) -> RowsIter<R> {
        RowsIter { rdr: self, errored: false }
    }

    /// Returns an owned iterator over all remaining rows.
    ///
    /// This is just like `rows`, except it consumes the reader.
    pub fn into_rows(self) -> RowsIntoIter<R> {
        RowsIntoIter { rdr: self, errored: false }
    }

    /// Returns a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        self.rdr.get_ref()
    }

    /// Returns a mutable reference to the underlying reader.
    pub fn get_mut(&mut self) -> &mut R {
        self.rdr.get_mut()
    }

    /// Unwraps this CSV reader, returning the underlying reader.
    ///
    /// Note that any leftover data inside this reader's internal buffer is
    /// lost.
    pub fn into_inner(self) -> R {
        self.rdr.into_inner()
    }

    /// Called after a field that ends a row. If the underlying reader has no
    /// more data, then the CSV data ends here and no empty row follows.
    fn check_end(&mut self) -> io::Result<()> {
        if self.rdr.fill_buf()?.is_empty() {
            let (res, _, _) = self.core.read_field(&[], &mut []);
            debug_assert_eq!(res, ReadFieldResult::End);
        }
        Ok(())
    }

    fn decode_field(&mut self, len: usize) -> Result<String> {
        let bytes = &self.field[..len];
        trace!(
            "read field {:?} (line {}, more fields on line: {})",
            bytes.as_bstr(),
            self.core.line(),
            self.core.has_more_fields_on_line(),
        );
        if self.core.is_eof() {
            debug!("end of CSV data reached at line {}", self.core.line());
        }
        match str::from_utf8(bytes) {
            Ok(s) => Ok(s.to_string()),
            Err(err) => {
                let msg = format!(
                    "invalid UTF-8 in CSV field {:?} near line {}: {}",
                    bytes.as_bstr(),
                    self.core.line(),
                    err,
                );
                Err(Error::Io(io::Error::new(io::ErrorKind::InvalidData, msg)))
            }
        }
    }

    fn expand_field(&mut self) {
        let new_len = self.field.len().checked_mul(2).unwrap_or(usize::MAX);
        self.field.resize(cmp::max(INITIAL_FIELD_CAPACITY, new_len), 0);
    }
}

impl<R> Reader<R> {
    /// Returns true if and only if the most recently read field was followed
    /// by a delimiter, i.e., the current row has more fields.
    ///
    /// Before any field has been read, this returns `true`.
    pub fn has_more_fields_on_line(&self) -> bool {
        self.core.has_more_fields_on_line()
    }

    /// Returns true if and only if all of the CSV data has been read.
    ///
    /// Once this returns true, `read_field` and `read_row` return
    /// `Error::EndOfStream`.
    pub fn is_eof(&self) -> bool {
        self.core.is_eof()
    }

    /// Returns the current line number, counting every `\n` consumed so far,
    /// including those inside of quoted fields.
    ///
    /// Line numbers start at `1`.
    pub fn line(&self) -> u64 {
        self.core.line()
    }
}

/// A borrowed iterator over rows.
///
/// The lifetime parameter `'r` refers to the lifetime of the underlying
/// CSV `Reader`.
pub struct RowsIter<'r, R: 'r> {
    rdr: &'r mut Reader<R>,
    errored: bool,
}

impl<'r, R: io::Read> RowsIter<'r, R> {
    /// Return a reference to the underlying CSV reader.
    pub fn reader(&self) -> &Reader<R> {
        &self.rdr
    }

    /// Return a mutable reference to the underlying CSV reader.
    pub fn reader_mut(&mut self) -> &mut Reader<R> {
        &mut self.rdr
    }
}

impl<'r, R: io::Read> Iterator for RowsIter<'r, R> {
    type Item = Result<Vec<String>>;

    fn next(&mut self) -> Option<Result<Vec<String>>> {
        next_row(&mut self.rdr, &mut self.errored)
    }
}

/// An owned iterator over rows.
pub struct RowsIntoIter<R> {
    rdr: Reader<R>,
    errored: bool,
}

impl<R: io::Read> RowsIntoIter<R> {
    /// Return a reference to the underlying CSV reader.
    pub fn reader(&self) -> &Reader<R> {
        &self.rdr
    }

    /// Return a mutable reference to the underlying CSV reader.
    pub fn reader_mut(&mut self) -> &mut Reader<R> {
        &mut self.rdr
    }

    /// Drop this iterator and return the underlying CSV reader.
    pub fn into_reader(self) -> Reader<R> {
        self.rdr
    }
}

impl<R: io::Read> Iterator for RowsIntoIter<R> {
    type Item = Result<Vec<String>>;

    fn next(&mut self) -> Option<Result<Vec<String>>> {
        next_row(&mut self.rdr, &mut self.errored)
    }
}

fn next_row<R: io::Read>(
    rdr: &mut Reader<R>,
    errored: &mut bool,
) -> Option<Result<Vec<String>>> {
    if *errored || rdr.is_eof() {
        return None;
    }
    match rdr.read_row() {
        Ok(row) => Some(Ok(row)),
        Err(err) => {
            *errored = true;
            Some(Err(err))
        }
    }
}
