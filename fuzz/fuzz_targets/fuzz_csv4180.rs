#![no_main]
use libfuzzer_sys::fuzz_target;

use csv4180::{Reader, Writer};

fuzz_target!(|data: &[u8]| {
    let rows = match Reader::from_reader(data)
        .into_rows()
        .collect::<csv4180::Result<Vec<_>>>()
    {
        Ok(rows) => rows,
        // Invalid UTF-8.
        Err(_) => return,
    };

    let mut wtr = Writer::from_writer(vec![]);
    for row in &rows {
        wtr.write_fields(row).unwrap();
    }
    let written = wtr.into_inner().unwrap();

    let reread = Reader::from_reader(&written[..])
        .into_rows()
        .collect::<csv4180::Result<Vec<_>>>()
        .unwrap();
    assert_eq!(rows, reread);
});
