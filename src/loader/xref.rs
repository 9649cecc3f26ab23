use std::collections::BTreeMap;

use crate::object::{Dict, ObjNum, ObjGen, ObjIndex, ObjRef, Offset};

/// A cross-reference section together with its trailer dictionary.
///
/// A document with incremental updates has several of these chained through `/Prev`;
/// [`XRef::merge_prev`] folds an older section into a newer one, newer records winning.
#[derive(Debug)]
pub struct XRef {
    pub tpe: XRefType,
    pub map: BTreeMap<ObjNum, Record>,
    pub dict: Dict,
    pub size: ObjNum
}

#[derive(Debug)]
pub enum XRefType {
    Table,
    Stream(ObjRef)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Record {
    Used { gen: ObjGen, offset: Offset },
    Compr { num_within: ObjNum, index: ObjIndex },
    Free { gen: ObjGen, next: ObjNum }
}

impl Default for Record {
    fn default() -> Self {
        Record::Free { gen: 65535, next: 0 }
    }
}

impl XRef {
    pub fn merge_prev(&mut self, prev: XRef) {
        for (num, rec) in prev.map {
            self.map.entry(num).or_insert(rec);
        }
    }

    /// Finds the record for an object reference. Numbers past `/Size` and numbers with no
    /// record count as free per the specification.
    pub fn locate(&self, oref: &ObjRef) -> Record {
        if oref.num >= self.size {
            return Record::default();
        }
        match self.map.get(&oref.num) {
            Some(&rec) => rec,
            None => Record::default()
        }
    }
}
