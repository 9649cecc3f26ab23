use std::io::{Cursor, Seek, Read, BufRead};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::cell::RefCell;
use std::ops::DerefMut;

use crate::codecs;
use crate::error::ErrorKind;
use crate::object::*;
use crate::syntax::{ByteProvider, ObjParser, Tokenizer};
use crate::utils;

use super::xref::{XRef, XRefType, Record};

/// File-level access to one source document.
///
/// Parses structural elements (indirect objects, cross-reference sections) at caller-supplied
/// offsets. Offsets are interpreted relative to the `%PDF` marker, which need not sit at the
/// start of the byte stream.
#[derive(Debug)]
pub struct FileParser<T: BufRead + Seek> {
    reader: RefCell<T>,
    header: Result<Header, ErrorKind>,
}

/// The version marker and its byte offset within the stream.
#[derive(Debug)]
pub struct Header {
    pub start: Offset,
    pub version: (u8, u8),
}

enum Structural {
    Object(ObjRef, Object),
    XRefSec(XRef)
}

impl<T: BufRead + Seek> FileParser<T> {
    /// Creates a `FileParser`, scanning for the `%PDF-x.y` marker.
    ///
    /// The outcome of the scan is available through [`FileParser::header()`].
    pub fn new(mut reader: T) -> Self {
        let header = Self::find_header(&mut reader);
        match &header {
            Ok(Header { start, version }) => {
                log::info!("PDF version {}.{}", version.0, version.1);
                if *start != 0 {
                    log::info!("Offset start @ {start}");
                }
            },
            Err(err) => log::warn!("{err}")
        }
        Self { reader: RefCell::new(reader), header }
    }

    pub fn header(&self) -> &Result<Header, ErrorKind> {
        &self.header
    }

    fn start(&self) -> Offset {
        match self.header {
            Ok(Header { start, .. }) => start,
            _ => 0
        }
    }

    /// Opens a raw reader at an absolute stream position.
    ///
    /// This mutably borrows an internal `RefCell`, so the instance must be dropped before any
    /// other method of this `FileParser` is called. No stop condition is imposed; limit with
    /// [`std::io::Read::take()`].
    pub fn read_raw(&self, pos: Offset) -> Result<impl BufRead + use<'_, T>, ErrorKind> {
        let mut reader = self.reader.borrow_mut();
        reader.seek(std::io::SeekFrom::Start(pos))?;
        Ok(StreamReader(reader))
    }

    fn find_header(reader: &mut T) -> Result<Header, ErrorKind> {
        const BUF_SIZE: usize = 1024;
        const HEADER_FIXED: &[u8] = b"%PDF-";
        const HEADER_FIXED_LEN: usize = HEADER_FIXED.len();
        const HEADER_FULL_LEN: usize = HEADER_FIXED_LEN + 3;
        const OVERLAP: usize = HEADER_FULL_LEN - 1;

        let mut data = vec![0u8; HEADER_FULL_LEN];
        let mut from = 0;
        let mut to = data.len();
        use std::ops::ControlFlow;
        let try_find = |data: &[u8], from: usize| {
            data.windows(HEADER_FULL_LEN)
                .enumerate()
                .filter(|(_, w)| w[0..HEADER_FIXED_LEN] == *HEADER_FIXED)
                .try_fold((), |(), (ix, w)| match &w[HEADER_FIXED_LEN..] {
                    [maj @ b'0'..=b'9', b'.', min @ b'0'..=b'9'] => {
                        let start = (from + ix) as Offset;
                        let version = (maj - b'0', min - b'0');
                        ControlFlow::Break(Header { start, version })
                    },
                    _ => ControlFlow::Continue(())
                })
                .break_value()
        };

        let file_len: usize = reader.seek(std::io::SeekFrom::End(0))?
            .try_into().map_err(|_| ErrorKind::MalformedHeader)?;
        reader.seek(std::io::SeekFrom::Start(0))?;
        if file_len < HEADER_FULL_LEN {
            return Err(ErrorKind::MalformedHeader);
        }

        reader.read_exact(&mut data)?;
        if let Some(header) = try_find(&data, from) {
            return Ok(header);
        }

        while to < file_len {
            let data_len = data.len();
            data.copy_within((data_len - OVERLAP).., 0);
            from = to - OVERLAP;
            to = std::cmp::min(from + BUF_SIZE, file_len);
            data.resize(to - from, 0u8);
            reader.read_exact(&mut data[OVERLAP..])?;
            if let Some(header) = try_find(&data, from) {
                return Ok(header);
            }
        }

        Err(ErrorKind::MalformedHeader)
    }

    /// Locates the cross-reference entry point (`startxref`) within the last 1024 bytes.
    pub fn entrypoint(&self) -> Result<Offset, ErrorKind> {
        let mut reader = self.reader.borrow_mut();
        let len = reader.seek(std::io::SeekFrom::End(0))?;
        let buf_size = std::cmp::min(len, 1024);

        reader.seek(std::io::SeekFrom::End(-(buf_size as i64)))?;
        let mut data = vec![0; buf_size as usize];
        reader.read_exact(&mut data)?;

        // Find "startxref<EOL>number<EOL>"
        const SXREF: &[u8] = b"startxref";
        let sxref = data.windows(SXREF.len())
            .rposition(|w| w == SXREF)
            .ok_or(ErrorKind::InvalidXref("startxref not found"))?;
        let mut cur = Cursor::new(&data[(sxref + SXREF.len())..]);
        cur.read_eol()?;
        utils::parse_num(&cur.read_line_excl()?)
            .ok_or(ErrorKind::InvalidXref("malformed startxref"))
    }

    fn read_at(&self, pos: Offset) -> Result<Structural, ErrorKind> {
        let mut reader = self.reader.borrow_mut();
        reader.seek(std::io::SeekFrom::Start(pos + self.start()))?;
        let tk = reader.read_token_nonempty()?;
        if tk == b"xref" {
            reader.read_eol()?;
            let xref = Self::read_xref_table(&mut *reader)?;
            return Ok(Structural::XRefSec(xref));
        }
        let num = utils::parse_int_strict(&tk)
            .ok_or(ErrorKind::MalformedObject("invalid object number"))?;
        let tk = reader.read_token_nonempty()?;
        let gen = utils::parse_int_strict(&tk)
            .ok_or(ErrorKind::MalformedObject("invalid generation number"))?;
        let oref = ObjRef { num, gen };
        if reader.read_token_nonempty()? != b"obj" {
            return Err(ErrorKind::MalformedObject("unexpected token"));
        }
        let obj = ObjParser::read_obj(&mut *reader)?;
        match &reader.read_token_nonempty()?[..] {
            b"endobj" =>
                Ok(Structural::Object(oref, obj)),
            b"stream" => {
                let Object::Dict(dict) = obj else {
                    return Err(ErrorKind::MalformedObject("endobj not found"))
                };
                match reader.next_or_eof()? {
                    b'\n' => (),
                    b'\r' => {
                        if reader.next_or_eof()? != b'\n' {
                            return Err(ErrorKind::MalformedObject("stream keyword not followed by proper EOL"));
                        }
                    },
                    _ => return Err(ErrorKind::MalformedObject("stream keyword not followed by proper EOL"))
                };
                let offset = reader.stream_position()?;
                let stm = Stream { dict, data: StreamData::Ref(offset) };
                Ok(Structural::Object(oref, Object::Stream(stm)))
            },
            _ => Err(ErrorKind::MalformedObject("endobj not found"))
        }
    }

    /// Attempts to read an indirect object at the specified location (relative to `%PDF`).
    pub fn read_obj_at(&self, pos: Offset) -> Result<(ObjRef, Object), ErrorKind> {
        match self.read_at(pos)? {
            Structural::Object(oref, obj) => Ok((oref, obj)),
            _ => Err(ErrorKind::MalformedObject("expected object, found xref section"))
        }
    }

    /// Attempts to read a cross-reference table section or a cross-reference stream object at
    /// the specified location (relative to `%PDF`).
    pub fn read_xref_at(&self, pos: Offset) -> Result<XRef, ErrorKind> {
        match self.read_at(pos)? {
            Structural::XRefSec(xref) => Ok(xref),
            Structural::Object(oref, obj) => self.read_xref_stream(oref, obj)
        }
    }

    fn read_xref_table(reader: &mut T) -> Result<XRef, ErrorKind> {
        let mut map = BTreeMap::new();
        let err = || ErrorKind::InvalidXref("malformed xref table");
        loop {
            let tk = reader.read_token_nonempty()?;
            if tk == b"trailer" { break; }
            let start = utils::parse_num::<u64>(&tk).ok_or_else(err)?;
            let size = utils::parse_num::<u64>(&reader.read_token_nonempty()?).ok_or_else(err)?;
            reader.skip_ws()?;
            let mut line = [0u8; 20];
            for num in start..(start + size) {
                reader.read_exact(&mut line)?;
                if line[10] != b' ' || line[16] != b' ' {
                    return Err(err());
                }
                let v = utils::parse_num::<u64>(&line[0..10]).ok_or_else(err)?;
                let gen = utils::parse_num::<u16>(&line[11..16]).ok_or_else(err)?;
                let rec = match line[17] {
                    b'n' => Record::Used { gen, offset: v },
                    b'f' => Record::Free { gen, next: v },
                    _ => return Err(err())
                };
                match map.entry(num) {
                    Entry::Vacant(entry) => { entry.insert(rec); },
                    Entry::Occupied(_) => log::warn!("Duplicate object number {num} in xref table")
                };
            }
        }
        let trailer = match ObjParser::read_obj(reader)? {
            Object::Dict(dict) => dict,
            _ => return Err(ErrorKind::InvalidXref("malformed trailer"))
        };
        let size = trailer.lookup(b"Size")
            .num_value()
            .ok_or(ErrorKind::InvalidXref("malformed trailer (missing /Size)"))?;
        Ok(XRef { tpe: XRefType::Table, map, dict: trailer, size })
    }

    fn read_xref_stream(&self, oref: ObjRef, obj: Object) -> Result<XRef, ErrorKind> {
        let mut reader = self.reader.borrow_mut();
        let Object::Stream(Stream { dict, data: StreamData::Ref(offset) }) = obj else {
            return Err(ErrorKind::InvalidXref("malformed xref"))
        };
        if dict.lookup(b"Type") != &Object::new_name(b"XRef") {
            return Err(ErrorKind::InvalidXref("malformed xref stream (/Type)"))
        }
        let size = dict.lookup(b"Size").num_value()
            .ok_or(ErrorKind::InvalidXref("malformed xref stream (/Size)"))?;
        let index = match dict.lookup(b"Index") {
            Object::Array(arr) =>
                arr.iter()
                    .map(|obj| obj.num_value().ok_or(ErrorKind::InvalidXref("malformed xref stream (/Index)")))
                    .collect::<Result<Vec<u64>, _>>()?,
            Object::Null => vec![0, size],
            _ => return Err(ErrorKind::InvalidXref("malformed xref stream (/Index)"))
        };

        let [w1, w2, w3] = match dict.lookup(b"W") {
            Object::Array(arr) =>
                arr.iter()
                    .map(|obj| match obj {
                        &Object::Number(Number::Int(num)) if (0..=8).contains(&num) => Ok(num as usize),
                        _ => Err(ErrorKind::InvalidXref("malformed xref stream (/W)"))
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            _ => return Err(ErrorKind::InvalidXref("malformed xref stream (/W)"))
        }.try_into().map_err(|_| ErrorKind::InvalidXref("malformed xref stream (/W)"))?;
        if w2 == 0 {
            return Err(ErrorKind::InvalidXref("malformed xref stream (/W)"))
        }

        // Filters and /Length of a cross-reference stream may not be indirect.
        let len = dict.lookup(b"Length")
            .num_value()
            .ok_or(ErrorKind::InvalidXref("malformed xref stream (/Length)"))?;
        let filters = codecs::parse_filters(dict.lookup(b"Filter"), dict.lookup(b"DecodeParms"))?;
        reader.seek(std::io::SeekFrom::Start(offset))?;
        let codec_in = reader.deref_mut().take(len);
        let mut codec_out = codecs::decode(codec_in, &filters)?;
        let mut read = |w| -> Result<u64, ErrorKind> {
            let mut dec_buf = [0; 8];
            codec_out.read_exact(&mut dec_buf[(8 - w)..8])?;
            Ok(u64::from_be_bytes(dec_buf))
        };

        let mut map = BTreeMap::new();
        for ch in index.chunks_exact(2) {
            let &[start, len] = ch else { unreachable!() };
            for num in start..(start + len) {
                let tpe = if w1 > 0 { read(w1)? } else { 1 };
                let f2 = read(w2)?;
                let f3 = read(w3)?.try_into()
                    .map_err(|_| ErrorKind::InvalidXref("generation field out of range"))?;
                let rec = match tpe {
                    0 => Record::Free { gen: f3, next: f2 },
                    1 => Record::Used { gen: f3, offset: f2 },
                    2 => Record::Compr { num_within: f2, index: f3 },
                    _ => return Err(ErrorKind::InvalidXref("unknown entry type"))
                };
                match map.entry(num) {
                    Entry::Vacant(entry) => { entry.insert(rec); },
                    Entry::Occupied(_) => log::warn!("Duplicate object number {num} in xref stream")
                };
            }
        }
        if !codec_out.fill_buf()?.is_empty() {
            return Err(ErrorKind::InvalidXref("trailing data in xref stream"));
        }
        Ok(XRef { tpe: XRefType::Stream(oref), map, dict, size })
    }
}

struct StreamReader<'a, T: BufRead>(std::cell::RefMut<'a, T>);

impl<T: BufRead> Read for StreamReader<'_, T> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf)
    }
}

impl<T: BufRead> BufRead for StreamReader<'_, T> {
    fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
        self.0.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.0.consume(amt)
    }
}
