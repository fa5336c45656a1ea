use std::io;

use csv4180_core::{WriteResult, Writer as CoreWriter};
use log::trace;

use crate::error::{IntoInnerError, Result};

/// The default capacity of the buffer in front of the underlying writer.
const DEFAULT_CAPACITY: usize = 8 * (1 << 10);

/// Builds a CSV writer with various configuration knobs.
///
/// As with reading, the CSV dialect is fixed. Only the buffer capacity can
/// be configured.
#[derive(Debug)]
pub struct WriterBuilder {
    capacity: usize,
}

impl Default for WriterBuilder {
    fn default() -> WriterBuilder {
        WriterBuilder { capacity: DEFAULT_CAPACITY }
    }
}

impl WriterBuilder {
    /// Create a new builder for configuring CSV writing.
    pub fn new() -> WriterBuilder {
        WriterBuilder::default()
    }

    /// Build a CSV writer from this configuration that writes data to `wtr`.
    ///
    /// Note that the CSV writer is buffered automatically, so you should not
    /// wrap `wtr` in a buffered writer like `io::BufWriter`.
    pub fn from_writer<W: io::Write>(&self, wtr: W) -> Writer<W> {
        Writer::new(self, wtr)
    }

    /// Set the capacity (in bytes) of the internal buffer used in the CSV
    /// writer.
    ///
    /// The default is 8 KiB. Capacities smaller than 2 bytes are rounded up.
    pub fn capacity(&mut self, capacity: usize) -> &mut WriterBuilder {
        self.capacity = capacity;
        self
    }
}

/// A streaming CSV writer that writes one field at a time.
///
/// Fields are separated by `,` and lines are terminated by `\n`. A field is
/// wrapped in quotes only when it contains a `,`, a `"`, a `\r` or a `\n`,
/// and quotes inside of it are doubled. The `,` between fields is written
/// automatically.
///
/// The writer is buffered. The buffer is flushed when it fills up, when
/// `flush` is called and when the writer is dropped. Errors that occur
/// while dropping are ignored, so callers that care should call `flush`
/// explicitly.
///
/// # Example
///
/// ```
/// use csv4180::Writer;
///
/// # fn main() { example().unwrap(); }
/// fn example() -> Result<(), Box<dyn std::error::Error>> {
///     let mut wtr = Writer::from_writer(vec![]);
///     wtr.write_fields(&["city", "pop"])?;
///     wtr.write_fields(&["Boston, MA", "4628910"])?;
///     wtr.new_line()?;
///
///     let data = String::from_utf8(wtr.into_inner()?)?;
///     assert_eq!(data, "city,pop\n\"Boston, MA\",4628910\n");
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct Writer<W: io::Write> {
    core: CoreWriter,
    wtr: Option<W>,
    buf: Buffer,
    state: WriterState,
}

#[derive(Debug)]
struct WriterState {
    /// This is set immediately before flushing the buffer and then unset
    /// immediately after flushing the buffer. This avoids flushing the buffer
    /// twice if the inner writer panics.
    panicked: bool,
}

/// A simple internal buffer for buffering writes.
///
/// We need this because the `csv4180_core` writer expects an output slice
/// to write into, which `io::BufWriter` does not provide.
#[derive(Debug)]
struct Buffer {
    /// The contents of the buffer.
    buf: Vec<u8>,
    /// The number of bytes written to the buffer.
    len: usize,
}

impl<W: io::Write> Drop for Writer<W> {
    fn drop(&mut self) {
        if self.wtr.is_some() && !self.state.panicked {
            let _ = self.flush();
        }
    }
}

impl<W: io::Write> Writer<W> {
    fn new(builder: &WriterBuilder, wtr: W) -> Writer<W> {
        Writer {
            core: CoreWriter::new(),
            wtr: Some(wtr),
            buf: Buffer { buf: vec![0; builder.capacity.max(2)], len: 0 },
            state: WriterState { panicked: false },
        }
    }

    /// Build a CSV writer with a default configuration that writes data to
    /// `wtr`.
    ///
    /// To customize CSV writing, use a `WriterBuilder`.
    pub fn from_writer(wtr: W) -> Writer<W> {
        WriterBuilder::new().from_writer(wtr)
    }

    /// Write a single field, quoting it if necessary.
    ///
    /// A `,` is written first unless this is the first field of the line.
    ///
    /// # Example
    ///
    /// ```
    /// use csv4180::Writer;
    ///
    /// let mut wtr = Writer::from_writer(vec![]);
    /// wtr.write_field("a").unwrap();
    /// wtr.write_field("say \"hi\"").unwrap();
    /// wtr.new_line().unwrap();
    /// wtr.write_field("").unwrap();
    /// wtr.write_field("").unwrap();
    ///
    /// let data = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
    /// assert_eq!(data, "a,\"say \"\"hi\"\"\"\n,");
    /// ```
    pub fn write_field<T: AsRef<[u8]>>(&mut self, field: T) -> Result<()> {
        let mut field = field.as_ref();
        loop {
            let (res, nin, nout) = self.core.field(field, self.buf.writable());
            field = &field[nin..];
            self.buf.written(nout);
            match res {
                WriteResult::InputEmpty => break,
                WriteResult::OutputFull => self.flush_buf()?,
            }
        }
        loop {
            let (res, nout) = self.core.finish_field(self.buf.writable());
            self.buf.written(nout);
            match res {
                WriteResult::InputEmpty => return Ok(()),
                WriteResult::OutputFull => self.flush_buf()?,
            }
        }
    }

    /// Write an integer as a field.
    pub fn write_integer<I: itoa::Integer>(&mut self, n: I) -> Result<()> {
        let mut buf = itoa::Buffer::new();
        self.write_field(buf.format(n))
    }

    /// Write a floating point number as a field.
    ///
    /// Finite numbers are written in their shortest form that reads back
    /// to the same value.
    pub fn write_float<F: ryu::Float>(&mut self, n: F) -> Result<()> {
        let mut buf = ryu::Buffer::new();
        self.write_field(buf.format(n))
    }

    /// Terminate the current line. The next field written starts a new
    /// line.
    ///
    /// Calling this twice in a row writes a line with a single empty field.
    pub fn new_line(&mut self) -> Result<()> {
        loop {
            let (res, nout) = self.core.terminator(self.buf.writable());
            self.buf.written(nout);
            match res {
                WriteResult::InputEmpty => return Ok(()),
                WriteResult::OutputFull => self.flush_buf()?,
            }
        }
    }

    /// Write a sequence of fields as a line.
    ///
    /// If fields have already been written to the current line, it is
    /// terminated first, so every call produces a line of its own. The line
    /// written is left open; it is terminated by the next call to
    /// `write_fields` or `new_line`.
    ///
    /// An empty sequence writes nothing.
    ///
    /// # Example
    ///
    /// ```
    /// use csv4180::Writer;
    ///
    /// let mut wtr = Writer::from_writer(vec![]);
    /// wtr.write_fields(&["a", "b"]).unwrap();
    /// wtr.write_fields(vec!["c".to_string()]).unwrap();
    ///
    /// let data = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
    /// assert_eq!(data, "a,b\nc");
    /// ```
    pub fn write_fields<I, T>(&mut self, fields: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let mut fields = fields.into_iter().peekable();
        if fields.peek().is_none() {
            return Ok(());
        }
        if self.core.fields_on_line() > 0 {
            self.new_line()?;
        }
        for field in fields {
            self.write_field(field)?;
        }
        Ok(())
    }

    /// Flush the contents of the internal buffer to the underlying writer,
    /// and then flush the underlying writer.
    ///
    /// If the current line consists of a single empty field, then it is
    /// written as `""` so that it can be read back.
    ///
    /// Note that this also happens when the writer is dropped.
    pub fn flush(&mut self) -> io::Result<()> {
        self.finish()?;
        self.flush_buf()?;
        self.get_mut().flush()?;
        Ok(())
    }

    /// Flush the internal buffer and return the underlying writer.
    pub fn into_inner(
        mut self,
    ) -> std::result::Result<W, IntoInnerError<Writer<W>>> {
        match self.flush() {
            Ok(()) => Ok(self.wtr.take().expect("writer is present")),
            Err(err) => Err(IntoInnerError::new(self, err)),
        }
    }

    /// Returns a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        self.wtr.as_ref().expect("writer is present")
    }

    /// Returns a mutable reference to the underlying writer.
    ///
    /// Note that writing directly to the underlying writer may bypass
    /// buffered CSV data that hasn't been flushed yet.
    pub fn get_mut(&mut self) -> &mut W {
        self.wtr.as_mut().expect("writer is present")
    }

    fn finish(&mut self) -> io::Result<()> {
        loop {
            let (res, nout) = self.core.finish(self.buf.writable());
            self.buf.written(nout);
            match res {
                WriteResult::InputEmpty => return Ok(()),
                WriteResult::OutputFull => self.flush_buf()?,
            }
        }
    }

    /// Flush the contents of the internal buffer to the underlying writer,
    /// without flushing the underlying writer.
    fn flush_buf(&mut self) -> io::Result<()> {
        trace!("flushing {} buffered CSV bytes", self.buf.len());
        self.state.panicked = true;
        let result = match self.wtr {
            Some(ref mut wtr) => wtr.write_all(self.buf.readable()),
            None => Ok(()),
        };
        self.state.panicked = false;
        result?;
        self.buf.clear();
        Ok(())
    }
}

impl Buffer {
    /// Returns the number of bytes written to the buffer.
    fn len(&self) -> usize {
        self.len
    }

    /// Returns the bytes written to the buffer so far.
    fn readable(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Returns the part of the buffer that can still be written to.
    fn writable(&mut self) -> &mut [u8] {
        &mut self.buf[self.len..]
    }

    /// Marks `n` more bytes as written.
    fn written(&mut self, n: usize) {
        self.len += n;
    }

    /// Empties the buffer.
    fn clear(&mut self) {
        self.len = 0;
    }
}
