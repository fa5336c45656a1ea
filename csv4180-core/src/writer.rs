use memchr::{memchr, memchr3};

/// The result of writing CSV data.
///
/// A value of this type is returned from every interaction with `Writer`. It
/// informs the caller how to proceed, namely, by indicating whether more
/// input should be given (`InputEmpty`) or if a bigger output buffer is
/// needed (`OutputFull`).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WriteResult {
    /// This result occurs when all of the bytes from the given input have
    /// been processed.
    InputEmpty,
    /// This result occurs when the output buffer was too small to process
    /// all of the input bytes. Generally, this means the caller must call
    /// the corresponding method again with the rest of the input and more
    /// room in the output buffer.
    OutputFull,
}

/// A writer for CSV data.
///
/// Fields are separated by `,` and rows are terminated by `\n`. A field is
/// quoted only when it contains a `,`, a `"`, a `\r` or a `\n`. Inside of
/// quotes, every `"` is doubled.
///
/// The writer tracks how many fields are on the current line, so that the
/// `,` separator is written automatically before every field except the
/// first one of a line.
#[derive(Clone, Debug, Default)]
pub struct Writer {
    state: WriterState,
}

#[derive(Clone, Debug, Default)]
struct WriterState {
    /// Set once the separator and opening quote of the current field have
    /// been written.
    in_field: bool,
    /// Whether the current field is quoted.
    quoting: bool,
    /// The number of completed fields on the current line.
    fields_on_line: u64,
    /// The number of bytes written on the current line.
    line_bytes: u64,
}

impl Writer {
    /// Creates a new CSV writer.
    pub fn new() -> Writer {
        Writer::default()
    }

    /// Returns the number of fields completed on the current line.
    pub fn fields_on_line(&self) -> u64 {
        self.state.fields_on_line
    }

    /// Write a field.
    ///
    /// On the first call for a field, this writes the `,` separator (unless
    /// this is the first field of the line) and decides whether the field
    /// needs quotes by inspecting `input`. Therefore, `input` should contain
    /// the entire field when possible. A field may be written in several
    /// pieces by calling this repeatedly; the field ends when `finish_field`
    /// (or `terminator`) is called.
    ///
    /// This returns the result of writing field data, in addition to the
    /// number of bytes consumed from `input` and the number of bytes
    /// written to `output`.
    pub fn field(
        &mut self,
        input: &[u8],
        mut output: &mut [u8],
    ) -> (WriteResult, usize, usize) {
        let mut nout = 0;
        if !self.state.in_field {
            let quoting = quote_required(input);
            let mut prefix = [0; 2];
            let mut n = 0;
            if self.state.fields_on_line > 0 {
                prefix[n] = b',';
                n += 1;
            }
            if quoting {
                prefix[n] = b'"';
                n += 1;
            }
            let (res, o) = write_pessimistic(&prefix[..n], output);
            if res == WriteResult::OutputFull {
                return (res, 0, 0);
            }
            output = &mut moving(output)[o..];
            nout += o;
            self.state.in_field = true;
            self.state.quoting = quoting;
        }
        let (res, nin, o) = if self.state.quoting {
            quote(input, output)
        } else {
            write_optimistic(input, output)
        };
        nout += o;
        self.state.line_bytes += nout as u64;
        (res, nin, nout)
    }

    /// Finish the current field by writing its closing quote, if any.
    ///
    /// If no field is in progress, then an empty field is written.
    pub fn finish_field(&mut self, output: &mut [u8]) -> (WriteResult, usize) {
        let mut nout = 0;
        if !self.state.in_field {
            let (res, _, o) = self.field(&[], output);
            if res == WriteResult::OutputFull {
                return (res, 0);
            }
            nout += o;
        }
        if self.state.quoting {
            let (res, o) = write_pessimistic(&[b'"'], &mut output[nout..]);
            if res == WriteResult::OutputFull {
                return (res, nout);
            }
            nout += o;
            self.state.line_bytes += o as u64;
        }
        self.state.in_field = false;
        self.state.quoting = false;
        self.state.fields_on_line += 1;
        (WriteResult::InputEmpty, nout)
    }

    /// Write a line terminator.
    ///
    /// A field in progress is finished first. After this, the next field
    /// written is the first field of a new line.
    pub fn terminator(&mut self, output: &mut [u8]) -> (WriteResult, usize) {
        let mut nout = 0;
        if self.state.in_field {
            let (res, o) = self.finish_field(output);
            nout += o;
            if res == WriteResult::OutputFull {
                return (res, nout);
            }
        }
        let (res, o) = write_pessimistic(&[b'\n'], &mut output[nout..]);
        if res == WriteResult::OutputFull {
            return (res, nout);
        }
        nout += o;
        self.state.fields_on_line = 0;
        self.state.line_bytes = 0;
        (WriteResult::InputEmpty, nout)
    }

    /// Finish writing CSV data to `output`.
    ///
    /// A field in progress is finished. If the current line consists of a
    /// single empty field, it is written as `""`, since an empty last line
    /// is indistinguishable from a trailing line terminator when read back.
    ///
    /// It is safe to keep writing fields to the current line afterwards.
    pub fn finish(&mut self, output: &mut [u8]) -> (WriteResult, usize) {
        let mut nout = 0;
        if self.state.in_field {
            let (res, o) = self.finish_field(output);
            nout += o;
            if res == WriteResult::OutputFull {
                return (res, nout);
            }
        }
        if self.state.fields_on_line == 1 && self.state.line_bytes == 0 {
            let (res, o) = write_pessimistic(b"\"\"", &mut output[nout..]);
            if res == WriteResult::OutputFull {
                return (res, nout);
            }
            nout += o;
            self.state.line_bytes += o as u64;
        }
        (WriteResult::InputEmpty, nout)
    }
}

/// Returns true if and only if `field` must be quoted to survive a round
/// trip, i.e., it contains a `,`, a `"`, a `\r` or a `\n`.
///
/// Empty fields never require quotes.
pub fn quote_required(field: &[u8]) -> bool {
    memchr3(b',', b'"', b'\n', field).is_some()
        || memchr(b'\r', field).is_some()
}

/// Escape quotes in `input` and write the result to `output`.
///
/// Every `"` in `input` is written as `""`. No surrounding quotes are
/// written.
///
/// This returns the result of escaping, in addition to the number of bytes
/// consumed from `input` and the number of bytes written to `output`. An
/// escaped quote is never split across two output buffers.
pub fn quote(
    mut input: &[u8],
    mut output: &mut [u8],
) -> (WriteResult, usize, usize) {
    let (mut nin, mut nout) = (0, 0);
    loop {
        match memchr(b'"', input) {
            None => {
                let (res, i, o) = write_optimistic(input, output);
                nin += i;
                nout += o;
                return (res, nin, nout);
            }
            Some(next_quote) => {
                let (res, i, o) =
                    write_optimistic(&input[..next_quote], output);
                input = &input[i..];
                output = &mut moving(output)[o..];
                nin += i;
                nout += o;
                if res == WriteResult::OutputFull {
                    return (res, nin, nout);
                }
                let (res, o) = write_pessimistic(b"\"\"", output);
                if res == WriteResult::OutputFull {
                    return (res, nin, nout);
                }
                nout += o;
                output = &mut moving(output)[o..];
                nin += 1;
                input = &input[1..];
            }
        }
    }
}

/// Write as much of `data` as fits into `output`.
fn write_optimistic(
    data: &[u8],
    output: &mut [u8],
) -> (WriteResult, usize, usize) {
    if data.len() > output.len() {
        let n = output.len();
        output.copy_from_slice(&data[..n]);
        (WriteResult::OutputFull, n, n)
    } else {
        output[..data.len()].copy_from_slice(data);
        (WriteResult::InputEmpty, data.len(), data.len())
    }
}

/// Write all of `data` to `output`, or nothing at all.
fn write_pessimistic(data: &[u8], output: &mut [u8]) -> (WriteResult, usize) {
    if data.len() > output.len() {
        (WriteResult::OutputFull, 0)
    } else {
        output[..data.len()].copy_from_slice(data);
        (WriteResult::InputEmpty, data.len())
    }
}

/// Moves a mutable reference, which lets a reborrowed slice replace the
/// original binding.
fn moving<T>(x: T) -> T {
    x
}

#[cfg(test)]
mod tests {
    use arrayvec::ArrayVec;

    use super::{quote, quote_required, WriteResult, Writer};

    fn b(s: &str) -> &[u8] {
        s.as_bytes()
    }

    macro_rules! assert_field {
        (
            $wtr:expr, $inp:expr, $out:expr,
            $expect_in:expr, $expect_out:expr,
            $expect_res:expr, $expect_data:expr
        ) => {{
            let (res, i, o) = $wtr.field($inp, $out);
            assert_eq!($expect_res, res, "result");
            assert_eq!($expect_in, i, "input");
            assert_eq!($expect_out, o, "output");
            assert_eq!(b($expect_data), &$out[..o], "data");
        }};
    }

    macro_rules! assert_write {
        (
            $wtr:expr, $which:ident, $out:expr,
            $expect_out:expr, $expect_res:expr, $expect_data:expr
        ) => {{
            let (res, o) = $wtr.$which($out);
            assert_eq!($expect_res, res, "result");
            assert_eq!($expect_out, o, "output");
            assert_eq!(b($expect_data), &$out[..o], "data");
        }};
    }

    /// Write every row with the given output capacity per call and return
    /// everything written.
    fn write_all(rows: &[&[&str]], outcap: usize) -> ArrayVec<u8, 256> {
        let mut wtr = Writer::new();
        let mut out = ArrayVec::new();
        let mut buf = [0; 256];
        for (i, row) in rows.iter().enumerate() {
            if i > 0 {
                loop {
                    let (res, o) = wtr.terminator(&mut buf[..outcap]);
                    out.try_extend_from_slice(&buf[..o]).unwrap();
                    if res == WriteResult::InputEmpty {
                        break;
                    }
                }
            }
            for field in row.iter() {
                let mut field = field.as_bytes();
                loop {
                    let (res, i, o) = wtr.field(field, &mut buf[..outcap]);
                    field = &field[i..];
                    out.try_extend_from_slice(&buf[..o]).unwrap();
                    if res == WriteResult::InputEmpty {
                        break;
                    }
                }
                loop {
                    let (res, o) = wtr.finish_field(&mut buf[..outcap]);
                    out.try_extend_from_slice(&buf[..o]).unwrap();
                    if res == WriteResult::InputEmpty {
                        break;
                    }
                }
            }
        }
        loop {
            let (res, o) = wtr.finish(&mut buf[..outcap]);
            out.try_extend_from_slice(&buf[..o]).unwrap();
            if res == WriteResult::InputEmpty {
                break;
            }
        }
        out
    }

    macro_rules! writes_to {
        ($name:ident, $rows:expr, $expected:expr) => {
            #[test]
            fn $name() {
                let rows: &[&[&str]] = $rows;
                for &outcap in &[256, 2, 3] {
                    let got = write_all(rows, outcap);
                    assert_eq!(b($expected), &got[..], "outcap {}", outcap);
                }
            }
        };
    }

    writes_to!(plain_row, &[&["a", "b", "c"]], "a,b,c");
    writes_to!(two_rows, &[&["a", "b"], &["x", "y"]], "a,b\nx,y");
    writes_to!(ragged, &[&["a", "b", "c"], &["x"]], "a,b,c\nx");
    writes_to!(quote_comma, &[&["com,ma"]], "\"com,ma\"");
    writes_to!(quote_lf, &[&["Multi-\nLine"]], "\"Multi-\nLine\"");
    writes_to!(quote_cr, &[&["a\rb"]], "\"a\rb\"");
    writes_to!(quote_quotes, &[&["\"ONE\""]], "\"\"\"ONE\"\"\"");
    writes_to!(quote_inner, &[&["a\"b", "c"]], "\"a\"\"b\",c");
    writes_to!(empty_fields, &[&["", "", ""]], ",,");
    writes_to!(empty_first_field, &[&["", "a"]], ",a");
    writes_to!(empty_row_middle, &[&["a"], &[""], &["b"]], "a\n\nb");
    writes_to!(empty_row_last, &[&["a"], &[""]], "a\n\"\"");
    writes_to!(no_rows, &[], "");
    writes_to!(space, &[&[" a "]], " a ");

    #[test]
    fn required() {
        assert!(!quote_required(b""));
        assert!(!quote_required(b("abc xyz")));
        assert!(quote_required(b(",")));
        assert!(quote_required(b("\"")));
        assert!(quote_required(b("a\r")));
        assert!(quote_required(b("\na")));
    }

    #[test]
    fn quote_empty() {
        let inp = b("");
        let out = &mut [0; 1024];

        let (res, nin, nout) = quote(inp, out);
        assert_eq!(res, WriteResult::InputEmpty);
        assert_eq!(0, nin);
        assert_eq!(0, nout);
    }

    #[test]
    fn quote_output_full_mid_escape() {
        let inp = b("a\"b");
        let out = &mut [0; 2];

        let (res, nin, nout) = quote(inp, out);
        assert_eq!(res, WriteResult::OutputFull);
        assert_eq!(1, nin);
        assert_eq!(1, nout);
        assert_eq!(b("a"), &out[..1]);

        let (res, nin, nout) = quote(&inp[1..], out);
        assert_eq!(res, WriteResult::OutputFull);
        assert_eq!(1, nin);
        assert_eq!(2, nout);
        assert_eq!(b("\"\""), &out[..]);

        let (res, nin, nout) = quote(&inp[2..], out);
        assert_eq!(res, WriteResult::InputEmpty);
        assert_eq!(1, nin);
        assert_eq!(1, nout);
    }

    #[test]
    fn delimiter_and_quote_are_atomic() {
        let mut wtr = Writer::new();
        let out = &mut [0; 1];

        assert_field!(wtr, b("a"), out, 1, 1, WriteResult::InputEmpty, "a");
        assert_write!(wtr, finish_field, out, 0, WriteResult::InputEmpty, "");
        assert_eq!(1, wtr.fields_on_line());

        // `,"` doesn't fit, so nothing is written.
        assert_field!(wtr, b("b,c"), out, 0, 0, WriteResult::OutputFull, "");
        assert_eq!(1, wtr.fields_on_line());

        let out = &mut [0; 8];
        assert_field!(
            wtr, b("b,c"), out, 3, 5, WriteResult::InputEmpty, ",\"b,c"
        );
        assert_write!(wtr, finish_field, out, 1, WriteResult::InputEmpty, "\"");
        assert_eq!(2, wtr.fields_on_line());
    }

    #[test]
    fn field_in_pieces() {
        let mut wtr = Writer::new();
        let out = &mut [0; 8];

        // Quoting is decided by the first piece.
        assert_field!(wtr, b("ab"), out, 2, 2, WriteResult::InputEmpty, "ab");
        assert_field!(wtr, b("cd"), out, 2, 2, WriteResult::InputEmpty, "cd");
        assert_write!(wtr, finish_field, out, 0, WriteResult::InputEmpty, "");
        assert_write!(wtr, terminator, out, 1, WriteResult::InputEmpty, "\n");
        assert_eq!(0, wtr.fields_on_line());
    }

    #[test]
    fn terminator_finishes_field() {
        let mut wtr = Writer::new();
        let out = &mut [0; 8];

        assert_field!(wtr, b("\""), out, 1, 3, WriteResult::InputEmpty, "\"\"\"");
        assert_write!(wtr, terminator, out, 2, WriteResult::InputEmpty, "\"\n");
        assert_eq!(0, wtr.fields_on_line());
    }

    #[test]
    fn finish_single_empty_field() {
        let mut wtr = Writer::new();
        let out = &mut [0; 8];

        assert_write!(wtr, finish_field, out, 0, WriteResult::InputEmpty, "");
        assert_write!(wtr, finish, out, 2, WriteResult::InputEmpty, "\"\"");
        // Only once.
        assert_write!(wtr, finish, out, 0, WriteResult::InputEmpty, "");

        // The line can still be extended.
        assert_field!(wtr, b("x"), out, 1, 2, WriteResult::InputEmpty, ",x");
    }

    #[test]
    fn finish_on_fresh_writer_writes_nothing() {
        let mut wtr = Writer::new();
        let out = &mut [0; 8];

        assert_write!(wtr, finish, out, 0, WriteResult::InputEmpty, "");
    }
}
