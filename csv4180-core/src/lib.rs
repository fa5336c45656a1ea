/*!
`csv4180-core` provides the I/O free automata behind RFC 4180 CSV reading
and writing.

The [`Reader`] splits CSV bytes into fields and the [`Writer`] encodes
fields into correctly quoted CSV bytes. Neither type allocates or touches
the outside world: callers hand in input and output buffers and get back
how far each side advanced. This makes the crate usable in `no_std`
contexts and makes all of its behavior resumable across buffer
boundaries.

The dialect is fixed: fields are separated by `,`, rows end at `\n` (a
`\r` outside of quotes is dropped when reading, so CRLF input works) and
fields are quoted with `"`, with a literal `"` written as `""`.

If you want to read or write CSV through `std::io`, use the `csv4180`
crate instead.

# Example: reading

```
use csv4180_core::{ReadFieldResult, Reader};

let mut rdr = Reader::new();
let mut out = [0; 16];

let (res, nin, nout) = rdr.read_field(b"a,\"b,c\"\n", &mut out);
assert_eq!(res, ReadFieldResult::Field { record_end: false });
assert_eq!((nin, &out[..nout]), (2, &b"a"[..]));
assert!(rdr.has_more_fields_on_line());
```

# Example: writing

```
use csv4180_core::{WriteResult, Writer};

let mut wtr = Writer::new();
let mut out = [0; 16];

let (res, nin, nout) = wtr.field(b"com,ma", &mut out);
assert_eq!((res, nin), (WriteResult::InputEmpty, 6));
let (res, n) = wtr.finish_field(&mut out[nout..]);
assert_eq!(res, WriteResult::InputEmpty);
assert_eq!(&out[..nout + n], &b"\"com,ma\""[..]);
```
*/

#![deny(missing_docs)]
#![no_std]

pub use crate::reader::{ReadFieldResult, Reader};
pub use crate::writer::{quote, quote_required, WriteResult, Writer};

mod reader;
mod writer;
