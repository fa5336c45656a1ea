/*!
The `csv4180` crate reads and writes [RFC 4180](https://tools.ietf.org/html/rfc4180)
CSV data as a stream, one field at a time.

Data is consumed from any `std::io::Read` and produced to any
`std::io::Write` without ever holding more than one field (plus an internal
buffer) in memory. The dialect is fixed:

* Fields are separated by `,`.
* Lines are terminated by `\n`. When reading, a `\r` outside of quotes is
  dropped, so CRLF data reads the same as LF data.
* Fields are quoted with `"`, and a `"` inside of a quoted field is written
  as `""`. Quoted fields may contain `,`, `\r` and `\n`.

Rows are allowed to have different numbers of fields, and reading never
fails on malformed data: stray quotes are interpreted as best as possible.
The only errors are I/O errors and reading past the end of the data.

# Reading

```
use csv4180::Reader;

# fn main() { example().unwrap(); }
fn example() -> csv4180::Result<()> {
    let data = "\
ONE,TWO,THREE
\"\"\"quoted\"\"\",\"com,ma\",\"Multi-
Line\"
";
    let mut rdr = Reader::from_reader(data.as_bytes());
    while !rdr.is_eof() {
        let row = rdr.read_row()?;
        println!("{:?}", row);
    }
    Ok(())
}
```

# Writing

```
use csv4180::Writer;

# fn main() { example().unwrap(); }
fn example() -> Result<(), Box<dyn std::error::Error>> {
    let mut wtr = Writer::from_writer(vec![]);
    wtr.write_fields(&["ONE", "TWO", "THREE"])?;
    wtr.write_fields(&["\"quoted\"", "com,ma", "Multi-\nLine"])?;
    wtr.new_line()?;

    let data = String::from_utf8(wtr.into_inner()?)?;
    assert_eq!(data, "\
ONE,TWO,THREE
\"\"\"quoted\"\"\",\"com,ma\",\"Multi-
Line\"
");
    Ok(())
}
```

The I/O free automata that do the actual work live in the `csv4180-core`
crate, which can be used in `no_std` environments.
*/

#![deny(missing_docs)]

pub use crate::error::{Error, IntoInnerError, Result};
pub use crate::reader::{Reader, ReaderBuilder, RowsIntoIter, RowsIter};
pub use crate::writer::{Writer, WriterBuilder};

mod error;
mod reader;
mod writer;
