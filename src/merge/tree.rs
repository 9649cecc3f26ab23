use std::collections::BTreeMap;

use crate::object::*;

use super::renumber::{CATALOG_NUM, PAGES_NUM};

/// Copies inherited attributes onto a page dictionary. A value the page itself carries
/// wins over the inherited one.
pub fn hoist_inherited(dict: &mut Dict, inherited: &Dict) {
    for (key, val) in inherited {
        if dict.lookup(key.as_slice()).is_null() {
            dict.set(key.clone(), val.clone());
        }
    }
}

/// Adds the output catalog and a single flat page tree root over the given pages,
/// relinking every page's `/Parent`.
pub fn build_page_tree(table: &mut BTreeMap<ObjNum, Object>, kids: &[ObjNum]) {
    for &num in kids {
        if let Some(Object::Dict(page)) = table.get_mut(&num) {
            page.set(Name::from(b"Parent"), Object::Ref(ObjRef { num: PAGES_NUM, gen: 0 }));
        }
    }
    let pages = Dict::from(vec![
        (Name::from(b"Type"), Object::new_name(b"Pages")),
        (Name::from(b"Kids"), Object::Array(kids.iter()
            .map(|&num| Object::Ref(ObjRef { num, gen: 0 }))
            .collect())),
        (Name::from(b"Count"), Object::new_int(kids.len() as i64)),
    ]);
    table.insert(PAGES_NUM, Object::Dict(pages));
    let catalog = Dict::from(vec![
        (Name::from(b"Type"), Object::new_name(b"Catalog")),
        (Name::from(b"Pages"), Object::Ref(ObjRef { num: PAGES_NUM, gen: 0 })),
    ]);
    table.insert(CATALOG_NUM, Object::Dict(catalog));
}
