mod esr;
mod file;
mod xref;

pub use file::FileParser;
pub use xref::{XRef, XRefType, Record};

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::io::{BufRead, Cursor, Read};
use std::sync::Arc;

use crate::codecs;
use crate::error::{Error, ErrorKind};
use crate::object::*;
use crate::syntax::{ObjParser, Tokenizer};
use crate::utils;

use esr::EndstreamReader;

/// Page attributes a `/Pages` node passes down to its descendants.
pub const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// A parsed source document.
///
/// Loading resolves the cross-reference chain and the page tree eagerly; everything else
/// stays on disk until a reference to it is resolved.
#[derive(Debug)]
pub struct Document {
    parser: FileParser<Cursor<Vec<u8>>>,
    xref: XRef,
    pages: Vec<Page>,
    label: String,
    // Arc rather than Rc so a loaded Document can move across the loader threads.
    objstms: RefCell<BTreeMap<Offset, Arc<ObjStm>>>,
}

/// One page of a source document, in reading order.
#[derive(Debug)]
pub struct Page {
    /// The page object's reference in the source numbering.
    pub oref: ObjRef,
    /// The page dictionary as stored.
    pub dict: Dict,
    /// Inheritable attributes collected from the ancestor `/Pages` nodes, nearest
    /// ancestor winning.
    pub inherited: Dict,
}

#[derive(Debug)]
struct ObjStm {
    entries: Vec<(ObjNum, Offset)>,
    source: Vec<u8>,
}

impl Document {
    /// Parses a document held in memory. The label names the source in error messages.
    pub fn load(bytes: Vec<u8>, label: impl Into<String>) -> crate::error::Result<Document> {
        let label = label.into();
        match Self::load_inner(bytes) {
            Ok(mut doc) => {
                log::info!("{label}: {} page(s)", doc.pages.len());
                doc.label = label;
                Ok(doc)
            },
            Err(kind) => Err(Error::labeled(kind, &label))
        }
    }

    fn load_inner(bytes: Vec<u8>) -> Result<Document, ErrorKind> {
        let parser = FileParser::new(Cursor::new(bytes));
        if parser.header().is_err() {
            return Err(ErrorKind::MalformedHeader);
        }
        let entry = parser.entrypoint()?;
        let xref = Self::build_xref(&parser, entry)?;
        if !xref.dict.lookup(b"Encrypt").is_null() {
            return Err(ErrorKind::UnsupportedEncryption);
        }
        let mut doc = Document {
            parser, xref,
            pages: Vec::new(),
            label: String::new(),
            objstms: Default::default()
        };
        doc.pages = doc.collect_pages()?;
        Ok(doc)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Follows `/Prev` (and, in hybrid files, `/XRefStm`) into one flattened table.
    /// Newer sections shadow older ones. A section chain closing over a cycle is an error.
    fn build_xref(parser: &FileParser<Cursor<Vec<u8>>>, entry: Offset) -> Result<XRef, ErrorKind> {
        let mut queue = VecDeque::from([(entry, false)]);
        let mut seen = BTreeSet::new();
        let mut xref: Option<XRef> = None;
        while let Some((offset, is_aside)) = queue.pop_front() {
            if !seen.insert(offset) {
                return Err(ErrorKind::InvalidXref("circular section chain"));
            }
            let sec = parser.read_xref_at(offset)?;
            if matches!(sec.tpe, XRefType::Table) {
                if let Some(offset) = sec.dict.lookup(b"XRefStm").num_value() {
                    if !is_aside {
                        queue.push_back((offset, true));
                    } else {
                        log::warn!("/XRefStm pointed to a classical section.");
                    }
                }
            }
            if let Some(offset) = sec.dict.lookup(b"Prev").num_value() {
                if !is_aside {
                    queue.push_back((offset, false));
                } else {
                    log::warn!("Ignoring /Prev in a /XRefStm.");
                }
            }
            match &mut xref {
                None => xref = Some(sec),
                Some(main) => main.merge_prev(sec)
            }
        }
        xref.ok_or(ErrorKind::InvalidXref("could not parse xref table"))
    }

    /// Materializes the object behind a reference. Free and absent entries resolve to
    /// [`Object::Null`] per the specification.
    pub fn resolve_ref(&self, oref: &ObjRef) -> Result<Object, ErrorKind> {
        match self.xref.locate(oref) {
            Record::Used { offset, .. } => self.read_uncompressed(offset, oref),
            Record::Compr { num_within, index } => self.read_compressed(num_within, index, oref),
            Record::Free { .. } => Ok(Object::Null)
        }
    }

    /// Resolves one level of indirection; direct objects pass through unchanged.
    pub fn resolve_obj(&self, obj: &Object) -> Result<Object, ErrorKind> {
        match obj {
            Object::Ref(oref) => self.resolve_ref(oref),
            _ => Ok(obj.clone())
        }
    }

    fn read_uncompressed(&self, offset: Offset, oref_expd: &ObjRef) -> Result<Object, ErrorKind> {
        let (oref, obj) = self.parser.read_obj_at(offset)?;
        if &oref == oref_expd {
            Ok(obj)
        } else {
            Err(ErrorKind::MalformedObject("object number mismatch"))
        }
    }

    fn read_compressed(&self, num_within: ObjNum, index: ObjIndex, oref_expd: &ObjRef) -> Result<Object, ErrorKind> {
        let objstm = self.objstm(num_within)?;
        let index = index as usize;
        let Some(&(num, start)) = objstm.entries.get(index) else {
            return Err(ErrorKind::MalformedObject("out of bounds index requested from object stream"));
        };
        if &(ObjRef { num, gen: 0 }) != oref_expd {
            return Err(ErrorKind::MalformedObject("object number mismatch"));
        }
        let start = start as usize;
        let end = objstm.entries.get(index + 1)
            .map(|entry| entry.1 as usize)
            .unwrap_or(objstm.source.len());
        if start > end || end > objstm.source.len() {
            return Err(ErrorKind::MalformedObject("malformed object stream header"));
        }
        let mut source = &objstm.source[start..end];
        ObjParser::read_obj(&mut source)
    }

    fn objstm(&self, num: ObjNum) -> Result<Arc<ObjStm>, ErrorKind> {
        let oref = ObjRef { num, gen: 0 };
        let Record::Used { offset, gen: 0 } = self.xref.locate(&oref) else {
            return Err(ErrorKind::MalformedObject("object stream not located"));
        };
        if let Some(objstm) = self.objstms.borrow().get(&offset) {
            return Ok(Arc::clone(objstm));
        }
        let objstm = Arc::new(self.read_objstm(offset, &oref)?);
        self.objstms.borrow_mut().insert(offset, Arc::clone(&objstm));
        Ok(objstm)
    }

    fn read_objstm(&self, offset: Offset, oref: &ObjRef) -> Result<ObjStm, ErrorKind> {
        let stm = self.read_uncompressed(offset, oref)?
            .into_stream()
            .ok_or(ErrorKind::MalformedObject("object stream not found"))?;
        if stm.dict.lookup(b"Type") != &Object::new_name(b"ObjStm") {
            return Err(ErrorKind::MalformedObject("object stream not found"));
        }
        let count: usize = stm.dict.lookup(b"N").num_value()
            .ok_or(ErrorKind::MalformedObject("malformed object stream (/N)"))?;
        let first: u64 = stm.dict.lookup(b"First").num_value()
            .ok_or(ErrorKind::MalformedObject("malformed object stream (/First)"))?;
        let mut reader = self.read_stream_decoded(&stm)?;
        let mut header = (&mut reader).take(first);
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let num = utils::parse_num::<ObjNum>(&header.read_token_nonempty()?)
                .ok_or(ErrorKind::MalformedObject("malformed object stream header"))?;
            let offset = utils::parse_num::<Offset>(&header.read_token_nonempty()?)
                .ok_or(ErrorKind::MalformedObject("malformed object stream header"))?;
            entries.push((num, offset));
        }
        std::io::copy(&mut header, &mut std::io::sink())?;
        let mut source = Vec::new();
        std::io::copy(&mut reader, &mut source)?;
        source.shrink_to_fit();
        Ok(ObjStm { entries, source })
    }

    /// Opens a stream's payload with its filter chain undone. Used for the structural
    /// streams the engine needs to look inside.
    fn read_stream_decoded(&self, stm: &Stream) -> Result<Box<dyn BufRead + '_>, ErrorKind> {
        let len: Option<u64> = self.resolve_obj(stm.dict.lookup(b"Length"))?.num_value();
        let filter = self.resolve_obj(stm.dict.lookup(b"Filter"))?;
        let parms = self.resolve_obj(stm.dict.lookup(b"DecodeParms"))?;
        let filters = codecs::parse_filters(&filter, &parms)?;
        let StreamData::Ref(offset) = stm.data else {
            return Err(ErrorKind::MalformedObject("stream data not backed by the source file"));
        };
        let reader = self.parser.read_raw(offset)?;
        let codec_in: Box<dyn BufRead> = match len {
            Some(len) => Box::new(reader.take(len)),
            None => {
                log::warn!("Stream with invalid or missing /Length found, reading until endstream.");
                Box::new(EndstreamReader::new(reader))
            }
        };
        codecs::decode(codec_in, &filters)
    }

    /// Copies a stream's payload byte for byte, still encoded. A payload cut short by the
    /// end of the buffer is [`ErrorKind::TruncatedFile`].
    pub fn read_stream_payload(&self, stm: &Stream) -> Result<Vec<u8>, ErrorKind> {
        let StreamData::Ref(offset) = stm.data else {
            return Err(ErrorKind::MalformedObject("stream data not backed by the source file"));
        };
        let len: Option<u64> = self.resolve_obj(stm.dict.lookup(b"Length"))?.num_value();
        let mut data = Vec::new();
        match len {
            Some(len) => {
                self.parser.read_raw(offset)?.take(len).read_to_end(&mut data)?;
                if (data.len() as u64) < len {
                    return Err(ErrorKind::TruncatedFile);
                }
            },
            None => {
                log::warn!("Stream with invalid or missing /Length found, reading until endstream.");
                EndstreamReader::new(self.parser.read_raw(offset)?).read_to_end(&mut data)?;
            }
        }
        Ok(data)
    }

    fn collect_pages(&self) -> Result<Vec<Page>, ErrorKind> {
        let root_ref = *self.xref.dict.lookup(b"Root").as_objref()
            .ok_or(ErrorKind::InvalidXref("malformed trailer (missing /Root)"))?;
        let catalog = self.resolve_ref(&root_ref)?
            .into_dict()
            .ok_or(ErrorKind::MalformedObject("malformed catalog"))?;
        let pages_ref = *catalog.lookup(b"Pages").as_objref()
            .ok_or(ErrorKind::MalformedObject("malformed catalog (missing /Pages)"))?;
        let mut pages = Vec::new();
        let mut visited = BTreeSet::new();
        self.walk_pages(pages_ref, &Dict::default(), &mut visited, &mut pages)?;

        let root_node = self.resolve_ref(&pages_ref)?;
        let declared: Option<usize> = root_node.as_dict()
            .and_then(|dict| dict.lookup(b"Count").num_value());
        if declared != Some(pages.len()) {
            log::warn!("Declared page count {declared:?} does not match {} page(s) found", pages.len());
        }
        Ok(pages)
    }

    fn walk_pages(&self, node_ref: ObjRef, inherited: &Dict, visited: &mut BTreeSet<ObjRef>,
            out: &mut Vec<Page>) -> Result<(), ErrorKind> {
        if !visited.insert(node_ref) {
            return Err(ErrorKind::CircularReference);
        }
        let node = self.resolve_ref(&node_ref)?
            .into_dict()
            .ok_or(ErrorKind::MalformedObject("page tree node is not a dictionary"))?;
        let tpe = node.lookup(b"Type");
        if tpe == &Object::new_name(b"Page") {
            out.push(Page { oref: node_ref, dict: node, inherited: inherited.clone() });
            return Ok(());
        }
        if tpe != &Object::new_name(b"Pages") {
            return Err(ErrorKind::MalformedObject("unexpected page tree node type"));
        }
        let mut inherited = inherited.clone();
        for key in INHERITABLE {
            let val = node.lookup(key);
            if !val.is_null() {
                inherited.set(Name::from(key), val.clone());
            }
        }
        let kids = self.resolve_obj(node.lookup(b"Kids"))?;
        let kids = kids.as_array()
            .ok_or(ErrorKind::MalformedObject("malformed /Kids"))?;
        for kid in kids {
            let kid_ref = kid.as_objref()
                .ok_or(ErrorKind::MalformedObject("malformed /Kids"))?;
            self.walk_pages(*kid_ref, &inherited, visited, out)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Assembles a classic-xref file from numbered object bodies (numbers must run 1..=n).
    fn build_pdf(objs: &[&str], trailer_extra: &str) -> Vec<u8> {
        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (ix, body) in objs.iter().enumerate() {
            offsets.push(out.len());
            out.extend(format!("{} 0 obj {body} endobj\n", ix + 1).bytes());
        }
        let xref_off = out.len();
        out.extend(format!("xref\n0 {}\n0000000000 65535 f \n", objs.len() + 1).bytes());
        for off in &offsets {
            out.extend(format!("{off:010} 00000 n \n").bytes());
        }
        out.extend(format!("trailer\n<< /Size {} /Root 1 0 R{trailer_extra} >>\nstartxref\n{xref_off}\n%%EOF",
            objs.len() + 1).bytes());
        out
    }

    fn two_page_doc() -> Vec<u8> {
        build_pdf(&[
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [ 3 0 R 4 0 R ] /Count 2 /MediaBox [ 0 0 612 792 ] >>",
            "<< /Type /Page /Parent 2 0 R /Rotate 90 >>",
            "<< /Type /Page /Parent 2 0 R /MediaBox [ 0 0 100 100 ] >>",
        ], "")
    }

    #[test]
    fn test_load_pages() {
        let doc = Document::load(two_page_doc(), "test.pdf").unwrap();
        assert_eq!(doc.pages().len(), 2);
        let page = &doc.pages()[0];
        assert_eq!(page.oref, ObjRef { num: 3, gen: 0 });
        assert_eq!(page.dict.lookup(b"Rotate"), &Object::new_int(90));
        assert_eq!(page.inherited.lookup(b"MediaBox"),
            &Object::Array(vec![Object::new_int(0), Object::new_int(0),
                Object::new_int(612), Object::new_int(792)]));
        // the second page carries its own /MediaBox besides the inherited one
        let page = &doc.pages()[1];
        assert_eq!(page.dict.lookup(b"MediaBox"),
            &Object::Array(vec![Object::new_int(0), Object::new_int(0),
                Object::new_int(100), Object::new_int(100)]));
    }

    #[test]
    fn test_resolve_free_as_null() {
        let doc = Document::load(two_page_doc(), "test.pdf").unwrap();
        assert_eq!(doc.resolve_ref(&ObjRef { num: 100, gen: 0 }).unwrap(), Object::Null);
    }

    #[test]
    fn test_encrypted() {
        let bytes = build_pdf(&[
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [ ] /Count 0 >>",
        ], " /Encrypt 9 0 R");
        let err = Document::load(bytes, "locked.pdf").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnsupportedEncryption));
        assert_eq!(err.label.as_deref(), Some("locked.pdf"));
    }

    #[test]
    fn test_page_tree_cycle() {
        let bytes = build_pdf(&[
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [ 3 0 R ] /Count 1 >>",
            "<< /Type /Pages /Kids [ 2 0 R ] /Count 1 >>",
        ], "");
        let err = Document::load(bytes, "loop.pdf").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::CircularReference));
    }

    #[test]
    fn test_missing_header() {
        let err = Document::load(b"not a pdf".to_vec(), "bogus").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::MalformedHeader));
    }

    #[test]
    fn test_bad_startxref_offset() {
        let mut bytes = two_page_doc();
        let pos = bytes.windows(9).rposition(|w| w == b"startxref").unwrap();
        bytes.truncate(pos);
        bytes.extend_from_slice(b"startxref\n999999\n%%EOF");
        let err = Document::load(bytes, "bad.pdf").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::TruncatedFile | ErrorKind::InvalidXref(_)));
    }

    #[test]
    fn test_stream_payload() {
        let bytes = build_pdf(&[
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [ 3 0 R ] /Count 1 >>",
            "<< /Type /Page /Parent 2 0 R /Contents 4 0 R >>",
            "<< /Length 5 >> stream\nhello\nendstream",
        ], "");
        let doc = Document::load(bytes, "test.pdf").unwrap();
        let stm = doc.resolve_ref(&ObjRef { num: 4, gen: 0 }).unwrap()
            .into_stream().unwrap();
        assert_eq!(doc.read_stream_payload(&stm).unwrap(), b"hello");
    }

    #[test]
    fn test_truncated_stream() {
        // the object parses but its payload runs past the end of the buffer
        let bytes = b"%PDF-1.4\n9 0 obj << /Length 100 >> stream\nshort".to_vec();
        let fp = FileParser::new(Cursor::new(bytes));
        let (_, obj) = fp.read_obj_at(9).unwrap();
        let stm = obj.into_stream().unwrap();
        let doc = Document {
            parser: fp,
            xref: XRef { tpe: XRefType::Table, map: BTreeMap::new(), dict: Dict::default(), size: 0 },
            pages: Vec::new(),
            label: String::new(),
            objstms: Default::default()
        };
        assert!(matches!(doc.read_stream_payload(&stm), Err(ErrorKind::TruncatedFile)));
    }

    /// The xref offset a file's `startxref` epilogue points at.
    fn entry_offset(bytes: &[u8]) -> usize {
        let pos = bytes.windows(10).rposition(|w| w == b"startxref\n").unwrap();
        std::str::from_utf8(&bytes[pos + 10..]).unwrap()
            .split_whitespace().next().unwrap()
            .parse().unwrap()
    }

    #[test]
    fn test_incremental_update_wins() {
        let mut bytes = build_pdf(&[
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [ 3 0 R ] /Count 1 >>",
            "<< /Type /Page /Parent 2 0 R >>",
        ], "");
        let prev_off = entry_offset(&bytes);
        // append an update replacing the page, chained through /Prev
        bytes.push(b'\n');
        let obj_off = bytes.len();
        bytes.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /Rotate 90 >> endobj\n");
        let xref_off = bytes.len();
        bytes.extend(format!("xref\n3 1\n{obj_off:010} 00000 n \n\
            trailer\n<< /Size 4 /Root 1 0 R /Prev {prev_off} >>\n\
            startxref\n{xref_off}\n%%EOF").bytes());

        let doc = Document::load(bytes, "updated.pdf").unwrap();
        assert_eq!(doc.pages().len(), 1);
        assert_eq!(doc.pages()[0].dict.lookup(b"Rotate"), &Object::new_int(90));
    }

    #[test]
    fn test_xref_chain_cycle() {
        let mut bytes = two_page_doc();
        let xref_off = entry_offset(&bytes);
        // point the trailer's /Prev back at its own section
        let pos = bytes.windows(8).rposition(|w| w == b"/Root 1 ").unwrap();
        bytes.splice(pos..pos, format!("/Prev {xref_off} ").bytes());
        let err = Document::load(bytes, "loop.pdf").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidXref(_)));
    }

    #[test]
    fn test_hybrid_xrefstm() {
        // the page object is recorded only in the /XRefStm aside, not the classic table
        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for body in [
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [ 3 0 R ] /Count 1 >>",
            "<< /Type /Page /Parent 2 0 R >>",
        ] {
            offsets.push(out.len());
            out.extend(format!("{} 0 obj {body} endobj\n", offsets.len()).bytes());
        }
        let stm_off = out.len();
        let mut row = vec![1u8];
        row.extend_from_slice(&(offsets[2] as u32).to_be_bytes());
        row.extend_from_slice(&0u16.to_be_bytes());
        out.extend(format!("4 0 obj << /Type /XRef /Size 5 /Index [ 3 1 ] /W [ 1 4 2 ] \
            /Length {} >> stream\n", row.len()).bytes());
        out.extend_from_slice(&row);
        out.extend_from_slice(b"\nendstream endobj\n");
        let xref_off = out.len();
        out.extend(format!("xref\n0 3\n0000000000 65535 f \n\
            {:010} 00000 n \n{:010} 00000 n \n\
            trailer\n<< /Size 5 /Root 1 0 R /XRefStm {stm_off} >>\n\
            startxref\n{xref_off}\n%%EOF", offsets[0], offsets[1]).bytes());

        let doc = Document::load(out, "hybrid.pdf").unwrap();
        assert_eq!(doc.pages().len(), 1);
        assert_eq!(doc.pages()[0].oref, ObjRef { num: 3, gen: 0 });
        assert_eq!(doc.pages()[0].dict.lookup(b"Type"), &Object::new_name(b"Page"));
    }

    #[test]
    fn test_objstm() {
        // document whose catalog and page live inside an object stream, stream xref;
        // the header "1 0 4 34" spans exactly /First = 10 bytes
        let objstm_payload = b"1 0 4 34\n << /Type /Catalog /Pages 3 0 R >>\n<< /Type /Page /Parent 3 0 R >>";
        let mut out = b"%PDF-1.5\n".to_vec();
        let ostm_off = out.len();
        out.extend(format!("2 0 obj << /Type /ObjStm /N 2 /First 10 /Length {} >> stream\n",
            objstm_payload.len()).bytes());
        out.extend_from_slice(objstm_payload);
        out.extend_from_slice(b"\nendstream endobj\n");
        let pages_off = out.len();
        out.extend_from_slice(b"3 0 obj << /Type /Pages /Kids [ 4 0 R ] /Count 1 >> endobj\n");
        let xref_off = out.len();
        let mut rows: Vec<u8> = Vec::new();
        let entry = |rows: &mut Vec<u8>, tpe: u8, f2: u64, f3: u16| {
            rows.push(tpe);
            rows.extend_from_slice(&(f2 as u32).to_be_bytes());
            rows.extend_from_slice(&f3.to_be_bytes());
        };
        entry(&mut rows, 0, 0, 65535);               // 0: free
        entry(&mut rows, 2, 2, 0);                   // 1: catalog, in objstm 2 at index 0
        entry(&mut rows, 1, ostm_off as u64, 0);     // 2: the objstm itself
        entry(&mut rows, 1, pages_off as u64, 0);    // 3: pages root
        entry(&mut rows, 2, 2, 1);                   // 4: page, in objstm 2 at index 1
        entry(&mut rows, 1, xref_off as u64, 0);     // 5: this xref stream
        out.extend(format!("5 0 obj << /Type /XRef /Size 6 /W [ 1 4 2 ] /Root 1 0 R /Length {} >> stream\n",
            rows.len()).bytes());
        out.extend_from_slice(&rows);
        out.extend_from_slice(b"\nendstream endobj\n");
        out.extend(format!("startxref\n{xref_off}\n%%EOF").bytes());

        let doc = Document::load(out, "objstm.pdf").unwrap();
        assert_eq!(doc.pages().len(), 1);
        assert_eq!(doc.pages()[0].oref, ObjRef { num: 4, gen: 0 });
        assert_eq!(doc.pages()[0].dict.lookup(b"Type"), &Object::new_name(b"Page"));
    }
}
