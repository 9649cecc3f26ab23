use std::collections::{BTreeMap, VecDeque};

use crate::error::ErrorKind;
use crate::loader::Document;
use crate::object::*;

use super::tree;

/// Object number of the output catalog.
pub const CATALOG_NUM: ObjNum = 1;
/// Object number of the output page tree root.
pub const PAGES_NUM: ObjNum = 2;

/// Assigns collision-free output numbers and copies the reachable objects of each source
/// document into one table.
///
/// Numbers 1 and 2 are reserved for the catalog and the page tree root; copied objects
/// start at 3 and grow monotonically, so the same inputs always number the same way.
/// All output objects have generation 0.
pub struct Renumberer {
    table: BTreeMap<ObjNum, Object>,
    next: ObjNum,
}

impl Renumberer {
    pub fn new() -> Self {
        Renumberer { table: BTreeMap::new(), next: PAGES_NUM + 1 }
    }

    fn alloc(&mut self) -> ObjNum {
        let num = self.next;
        self.next += 1;
        num
    }

    /// Copies a document's pages and everything reachable from them, in page order.
    /// Returns the output numbers of the pages, one per source page.
    ///
    /// Every page object gets its number up front. A page referenced sideways (say through
    /// an annotation) then maps to that number instead of being dragged in as a plain
    /// dictionary together with its original `/Parent` chain.
    pub fn add_document(&mut self, doc: &Document) -> Result<Vec<ObjNum>, ErrorKind> {
        let mut map: BTreeMap<ObjRef, ObjNum> = BTreeMap::new();
        let mut page_nums = Vec::with_capacity(doc.pages().len());
        for page in doc.pages() {
            let num = self.alloc();
            map.insert(page.oref, num);
            page_nums.push(num);
        }
        let mut queue = VecDeque::new();
        for (page, &num) in std::iter::zip(doc.pages(), &page_nums) {
            let mut dict = page.dict.clone();
            tree::hoist_inherited(&mut dict, &page.inherited);
            dict.remove(b"Parent");
            let rewritten = self.rewrite(Object::Dict(dict), &mut map, &mut queue)?;
            self.table.insert(num, rewritten);
            self.drain(doc, &mut map, &mut queue)?;
        }
        Ok(page_nums)
    }

    /// Hands over the finished table. [`tree::build_page_tree`] adds entries 1 and 2.
    pub fn into_table(self) -> BTreeMap<ObjNum, Object> {
        self.table
    }

    fn drain(&mut self, doc: &Document, map: &mut BTreeMap<ObjRef, ObjNum>,
            queue: &mut VecDeque<ObjRef>) -> Result<(), ErrorKind> {
        while let Some(oref) = queue.pop_front() {
            let num = map[&oref];
            let obj = doc.resolve_ref(&oref)?;
            let obj = match obj {
                Object::Stream(stm) => self.rewrite_stream(doc, stm, map, queue)?,
                obj => self.rewrite(obj, map, queue)?
            };
            self.table.insert(num, obj);
        }
        Ok(())
    }

    fn rewrite(&mut self, obj: Object, map: &mut BTreeMap<ObjRef, ObjNum>,
            queue: &mut VecDeque<ObjRef>) -> Result<Object, ErrorKind> {
        Ok(match obj {
            Object::Ref(oref) => {
                let num = match map.get(&oref) {
                    Some(&num) => num,
                    None => {
                        let num = self.alloc();
                        map.insert(oref, num);
                        queue.push_back(oref);
                        num
                    }
                };
                Object::Ref(ObjRef { num, gen: 0 })
            },
            Object::Array(arr) => Object::Array(arr.into_iter()
                .map(|item| self.rewrite(item, map, queue))
                .collect::<Result<_, _>>()?),
            Object::Dict(dict) => Object::Dict(self.rewrite_dict(dict, map, queue)?),
            Object::Stream(_) =>
                return Err(ErrorKind::MalformedObject("stream found as a direct object")),
            obj => obj
        })
    }

    fn rewrite_dict(&mut self, dict: Dict, map: &mut BTreeMap<ObjRef, ObjNum>,
            queue: &mut VecDeque<ObjRef>) -> Result<Dict, ErrorKind> {
        Ok(dict.into_inner().into_iter()
            .map(|(key, val)| Ok((key, self.rewrite(val, map, queue)?)))
            .collect::<Result<Vec<_>, ErrorKind>>()?
            .into())
    }

    /// Copies a stream object. The payload is carried over byte for byte and `/Length` is
    /// flattened to a direct value, so an indirect length object silently drops out of the
    /// reachable set.
    fn rewrite_stream(&mut self, doc: &Document, stm: Stream, map: &mut BTreeMap<ObjRef, ObjNum>,
            queue: &mut VecDeque<ObjRef>) -> Result<Object, ErrorKind> {
        let data = doc.read_stream_payload(&stm)?;
        let mut dict = stm.dict;
        dict.set(Name::from(b"Length"), Object::new_int(data.len() as i64));
        let dict = self.rewrite_dict(dict, map, queue)?;
        Ok(Object::Stream(Stream { dict, data: StreamData::Val(data) }))
    }
}
