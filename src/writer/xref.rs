use std::collections::BTreeMap;
use std::io::Write;

use crate::codecs;
use crate::error::ErrorKind;
use crate::object::*;

use super::CountingWriter;

/// Emits a classic `xref` table, trailer, and the `startxref` epilogue.
///
/// Object numbers run 1..=n without gaps, so a single subsection starting at 0 covers
/// the whole file.
pub fn write_table(w: &mut CountingWriter<impl Write>, offsets: &BTreeMap<ObjNum, Offset>)
        -> Result<(), ErrorKind> {
    let size = offsets.len() as u64 + 1;
    let xref_off = w.pos();
    write!(w, "xref\n0 {size}\n")?;
    w.write_all(b"0000000000 65535 f \n")?;
    for offset in offsets.values() {
        if *offset >= 10_000_000_000 {
            return Err(ErrorKind::UnsupportedFeature("output larger than 10 digits of offset"));
        }
        write!(w, "{offset:010} 00000 n \n")?;
    }
    let trailer = trailer_dict(size);
    write!(w, "trailer\n{trailer}\nstartxref\n{xref_off}\n%%EOF\n")?;
    Ok(())
}

/// Emits a cross-reference stream, numbered one past the last object, and the
/// `startxref` epilogue. Entry data is `/W [1 4 2]`, flate-compressed.
pub fn write_stream(w: &mut CountingWriter<impl Write>, offsets: &BTreeMap<ObjNum, Offset>)
        -> Result<(), ErrorKind> {
    let stm_num = offsets.keys().next_back().map_or(1, |&num| num + 1);
    let size = stm_num + 1;
    let xref_off = w.pos();

    let mut rows = Vec::with_capacity(size as usize * 7);
    let push = |rows: &mut Vec<u8>, tpe: u8, field2: Offset, field3: u16| -> Result<(), ErrorKind> {
        rows.push(tpe);
        let field2: u32 = field2.try_into()
            .map_err(|_| ErrorKind::UnsupportedFeature("output larger than 4 GiB"))?;
        rows.extend_from_slice(&field2.to_be_bytes());
        rows.extend_from_slice(&field3.to_be_bytes());
        Ok(())
    };
    push(&mut rows, 0, 0, 65535)?;
    for offset in offsets.values() {
        push(&mut rows, 1, *offset, 0)?;
    }
    push(&mut rows, 1, xref_off, 0)?;
    let packed = codecs::flate_encode(&rows)?;

    let mut dict = trailer_dict(size);
    dict.set(Name::from(b"Type"), Object::new_name(b"XRef"));
    dict.set(Name::from(b"W"), Object::Array(vec![
        Object::new_int(1), Object::new_int(4), Object::new_int(2)]));
    dict.set(Name::from(b"Filter"), Object::new_name(b"FlateDecode"));
    dict.set(Name::from(b"Length"), Object::new_int(packed.len() as i64));
    write!(w, "{stm_num} 0 obj\n{dict}\nstream\n")?;
    w.write_all(&packed)?;
    w.write_all(b"\nendstream\nendobj\n")?;
    write!(w, "startxref\n{xref_off}\n%%EOF\n")?;
    Ok(())
}

fn trailer_dict(size: u64) -> Dict {
    Dict::from(vec![
        (Name::from(b"Size"), Object::new_int(size as i64)),
        (Name::from(b"Root"), Object::Ref(ObjRef { num: 1, gen: 0 })),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{FileParser, Record, XRefType};
    use crate::merge::XrefFormat;
    use std::io::Cursor;

    #[test]
    fn test_oversized_offset_rejected() {
        // 20-byte records hold 10 offset digits, stream mode packs offsets into 4 bytes
        let offsets = BTreeMap::from([(1, 10_000_000_000)]);
        let mut w = CountingWriter::new(Vec::new());
        let err = write_table(&mut w, &offsets).unwrap_err();
        assert!(matches!(err, ErrorKind::UnsupportedFeature(_)));
        let mut w = CountingWriter::new(Vec::new());
        let err = write_stream(&mut w, &offsets).unwrap_err();
        assert!(matches!(err, ErrorKind::UnsupportedFeature(_)));
    }

    #[test]
    fn test_stream_round_trip() {
        let table = BTreeMap::from([
            (1, Object::Dict(Dict::from(vec![
                (Name::from(b"Type"), Object::new_name(b"Catalog")),
                (Name::from(b"Pages"), Object::Ref(ObjRef { num: 2, gen: 0 })),
            ]))),
            (2, Object::Dict(Dict::from(vec![
                (Name::from(b"Type"), Object::new_name(b"Pages")),
                (Name::from(b"Kids"), Object::Array(vec![])),
                (Name::from(b"Count"), Object::new_int(0)),
            ]))),
        ]);
        let mut out = Vec::new();
        super::super::write_document(&table, XrefFormat::Stream, &mut out).unwrap();

        // the file's own parser must accept what the builder wrote
        let fp = FileParser::new(Cursor::new(out));
        let entry = fp.entrypoint().unwrap();
        let xref = fp.read_xref_at(entry).unwrap();
        assert!(matches!(xref.tpe, XRefType::Stream(ObjRef { num: 3, gen: 0 })));
        assert_eq!(xref.size, 4);
        let Record::Used { offset, gen: 0 } = xref.locate(&ObjRef { num: 1, gen: 0 }) else { panic!() };
        let (oref, _) = fp.read_obj_at(offset).unwrap();
        assert_eq!(oref, ObjRef { num: 1, gen: 0 });
    }
}
