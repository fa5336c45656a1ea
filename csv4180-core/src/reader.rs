/// The result of parsing at most one field from CSV data.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ReadFieldResult {
    /// The caller provided input was exhausted before the end of a field
    /// was found.
    InputEmpty,
    /// The caller provided output buffer was filled before an entire field
    /// could be written to it.
    OutputFull,
    /// The end of a field was found.
    ///
    /// Note that when `record_end` is true, then the end of this field also
    /// corresponds to the end of a row.
    Field {
        /// Whether this was the last field in a row or not.
        record_end: bool,
    },
    /// All CSV data has been read.
    ///
    /// Once this is returned, every subsequent call returns it too.
    End,
}

/// A pull based CSV field reader.
///
/// This reader parses CSV data using a three state finite automaton that is
/// restarted at the beginning of every field. Callers extract parsed data
/// incrementally using the `read_field` method, which may be fed input in
/// arbitrarily sized chunks.
///
/// # Leniency
///
/// This reader never returns an error and will always find *a* parse.
/// A quote appearing outside of a well formed quoted field simply toggles
/// quoting, so `a"b,c"d` is parsed as the single field `ab,cd`. Text
/// following a closing quote is appended to the field as is, which means
/// `"a"b` parses as `ab`.
///
/// A `\r` outside of quotes is dropped, which gives CRLF line endings the
/// same meaning as LF line endings. Inside of quotes, `\r` is kept.
#[derive(Clone, Debug)]
pub struct Reader {
    /// The automaton state for the field currently being read.
    state: State,
    /// Whether any byte of the current field has been consumed.
    in_field: bool,
    /// Whether the most recently returned field was followed by a
    /// delimiter. This starts out as `true`.
    more_fields_on_line: bool,
    /// Whether the input has been exhausted.
    eof: bool,
    /// The current line number.
    line: u64,
}

impl Default for Reader {
    fn default() -> Reader {
        Reader {
            state: State::Unquoted,
            in_field: false,
            more_fields_on_line: true,
            eof: false,
            line: 1,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    Unquoted,
    Quoted,
    /// A quote was seen while quoted. The next byte decides whether it was
    /// an escaped quote or the closing quote.
    QuotedPlus,
    // The remaining states are final. They are never stored between calls.
    EndFieldDelim,
    EndRecord,
}

impl State {
    fn is_field_final(&self) -> bool {
        match *self {
            State::EndFieldDelim | State::EndRecord => true,
            _ => false,
        }
    }
}

impl Reader {
    /// Create a new CSV field reader.
    pub fn new() -> Reader {
        Reader::default()
    }

    /// Reset the reader such that it behaves as if it had never been used.
    pub fn reset(&mut self) {
        *self = Reader::default();
    }

    /// Return the current line number as measured by the number of
    /// occurrences of `\n` consumed so far, including those inside of
    /// quoted fields.
    ///
    /// Line numbers start at `1` and are reset when `reset` is called.
    pub fn line(&self) -> u64 {
        self.line
    }

    /// Returns true if and only if the most recently read field was followed
    /// by a delimiter.
    ///
    /// Before any field has been read, this returns `true`.
    pub fn has_more_fields_on_line(&self) -> bool {
        self.more_fields_on_line
    }

    /// Returns true if and only if an empty input buffer has been seen, which
    /// marks the end of the CSV data.
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Parse CSV data in `input` and copy field data to `output`.
    ///
    /// Calling this routine parses at most a single field and returns three
    /// values: a `ReadFieldResult` telling the caller what to do next, the
    /// number of bytes read from `input` and the number of bytes written to
    /// `output`. The field data written to `output` has its quotes
    /// unescaped.
    ///
    /// When a field spans several calls (because `InputEmpty` or
    /// `OutputFull` was returned), the field data is the concatenation of
    /// everything written to `output` across those calls.
    ///
    /// # Termination
    ///
    /// An empty `input` buffer is interpreted as the end of CSV data. The
    /// field in progress, even if it is empty, is then reported with
    /// `record_end` set. The only exception is when the previous field ended
    /// its row and no byte has been consumed since: the data ended with a
    /// line terminator, so `End` is returned directly.
    ///
    /// Since `has_more_fields_on_line` starts out as `true`, a reader that
    /// is given an empty buffer on its very first call reports one empty
    /// field before `End`.
    pub fn read_field(
        &mut self,
        input: &[u8],
        output: &mut [u8],
    ) -> (ReadFieldResult, usize, usize) {
        if self.eof {
            return (ReadFieldResult::End, 0, 0);
        }
        if input.is_empty() {
            return (self.read_field_end(), 0, 0);
        }
        let (mut nin, mut nout) = (0, 0);
        while nin < input.len() {
            let b = input[nin];
            let (state, consumed, has_out) = self.transition(self.state, b);
            if has_out {
                if nout >= output.len() {
                    return (ReadFieldResult::OutputFull, nin, nout);
                }
                output[nout] = b;
                nout += 1;
            }
            if consumed {
                nin += 1;
                self.in_field = true;
                self.line += (b == b'\n') as u64;
            }
            self.state = state;
            if state.is_field_final() {
                let record_end = state == State::EndRecord;
                self.state = State::Unquoted;
                self.in_field = false;
                self.more_fields_on_line = !record_end;
                return (ReadFieldResult::Field { record_end }, nin, nout);
            }
        }
        (ReadFieldResult::InputEmpty, nin, nout)
    }

    fn read_field_end(&mut self) -> ReadFieldResult {
        let at_row_start = !self.in_field && !self.more_fields_on_line;
        self.eof = true;
        self.state = State::Unquoted;
        self.in_field = false;
        self.more_fields_on_line = false;
        if at_row_start {
            ReadFieldResult::End
        } else {
            ReadFieldResult::Field { record_end: true }
        }
    }

    /// Compute the next state for the byte `c`.
    ///
    /// The two booleans returned indicate whether `c` was consumed and
    /// whether `c` belongs to the field data. A transition that does not
    /// consume `c` must be followed by another transition on the same byte.
    #[inline(always)]
    fn transition(&self, state: State, c: u8) -> (State, bool, bool) {
        use self::State::*;
        match state {
            Unquoted => match c {
                b'"' => (Quoted, true, false),
                b'\r' => (Unquoted, true, false),
                b'\n' => (EndRecord, true, false),
                b',' => (EndFieldDelim, true, false),
                _ => (Unquoted, true, true),
            },
            Quoted => match c {
                b'"' => (QuotedPlus, true, false),
                _ => (Quoted, true, true),
            },
            QuotedPlus => match c {
                b'"' => (Quoted, true, true),
                _ => (Unquoted, false, false),
            },
            EndFieldDelim | EndRecord => (Unquoted, false, false),
        }
    }
}
