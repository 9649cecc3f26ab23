mod xref;

use std::collections::BTreeMap;
use std::io::Write;

use crate::error::ErrorKind;
use crate::merge::XrefFormat;
use crate::object::*;

/// Serializes a finished object table into a complete PDF file.
///
/// Objects go out in ascending number order and every dictionary keeps its key order, so
/// the same table always produces the same bytes.
pub fn write_document(table: &BTreeMap<ObjNum, Object>, format: XrefFormat, sink: impl Write)
        -> Result<(), ErrorKind> {
    let mut w = CountingWriter::new(sink);
    w.write_all(b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n")?;
    let mut offsets = BTreeMap::new();
    for (&num, obj) in table {
        offsets.insert(num, w.pos());
        write_obj(&mut w, num, obj)?;
    }
    match format {
        XrefFormat::Classic => xref::write_table(&mut w, &offsets)?,
        XrefFormat::Stream => xref::write_stream(&mut w, &offsets)?,
    }
    w.flush()?;
    Ok(())
}

fn write_obj(w: &mut CountingWriter<impl Write>, num: ObjNum, obj: &Object) -> Result<(), ErrorKind> {
    match obj {
        Object::Stream(Stream { dict, data }) => {
            let StreamData::Val(data) = data else {
                return Err(ErrorKind::UnsupportedFeature("unmaterialized stream payload"));
            };
            write!(w, "{num} 0 obj\n{dict}\nstream\n")?;
            w.write_all(data)?;
            w.write_all(b"\nendstream\nendobj\n")?;
        },
        obj => write!(w, "{num} 0 obj\n{obj}\nendobj\n")?
    }
    Ok(())
}

/// Tracks the number of bytes written so far; the cross-reference builder needs every
/// object's starting offset.
pub(super) struct CountingWriter<W: Write> {
    inner: W,
    pos: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        CountingWriter { inner, pos: 0 }
    }

    pub fn pos(&self) -> Offset {
        self.pos
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.pos += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
