use std::fmt::{self, Display, Debug, Formatter};

/// Object number: type alias for `u64`.
pub type ObjNum = u64;
/// Object generation: type alias for `u16`.
pub type ObjGen = u16;
/// Index within an object stream: type alias for `u16`.
pub type ObjIndex = u16;
/// Byte offset within a file (relative to the `%PDF` marker): type alias for `u64`.
pub type Offset = u64;

/// The base type of all PDF objects.
///
/// `Display` renders the exact PDF serialization of the object, so the writer can reuse it
/// for everything except stream payloads.
#[derive(Debug, PartialEq, Clone)]
pub enum Object {
    /// Bool (`true` or `false`)
    Bool(bool),
    /// Numbers (integer or real)
    Number(Number),
    /// Strings. No distinction is made whether this was literal or hex-encoded in the source.
    String(Vec<u8>),
    /// Name (like `/Length`)
    Name(Name),
    /// Array (`[1 2 3]`)
    Array(Vec<Object>),
    /// Dictionary (`<< /Root 1 0 R >>`)
    Dict(Dict),
    /// Stream (`<< ... >> stream ... endstream`)
    Stream(Stream),
    /// Indirect object reference (`3 0 R`)
    Ref(ObjRef),
    /// Null object (`null`). Also used as a fall-back where the specification says.
    Null
}

impl Object {
    pub fn new_string(s: &[u8]) -> Object {
        Object::String(s.to_owned())
    }

    /// Don't pass the initial `'/'` unless the name actually starts with `#2F`.
    pub fn new_name(s: &[u8]) -> Object {
        Object::Name(Name::from(s))
    }

    pub fn new_int(num: i64) -> Object {
        Object::Number(Number::Int(num))
    }

    pub fn as_name(&self) -> Option<&Name> {
        match self {
            Object::Name(val) => Some(val),
            _ => None
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Object>> {
        match self {
            Object::Array(val) => Some(val),
            _ => None
        }
    }

    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Object::Dict(val) => Some(val),
            _ => None
        }
    }

    pub fn as_objref(&self) -> Option<&ObjRef> {
        match self {
            Object::Ref(val) => Some(val),
            _ => None
        }
    }

    pub fn into_dict(self) -> Option<Dict> {
        match self {
            Object::Dict(val) => Some(val),
            _ => None
        }
    }

    pub fn into_stream(self) -> Option<Stream> {
        match self {
            Object::Stream(val) => Some(val),
            _ => None
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    /// For `Object::Number(Number::Int(number))`, extracts the `number` and casts it into the
    /// required type. Returns `None` both for other objects and for values too large for `T`.
    pub fn num_value<T: TryFrom<i64>>(&self) -> Option<T> {
        match self {
            &Object::Number(Number::Int(num)) => num.try_into().ok(),
            _ => None
        }
    }
}

impl Display for Object {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Object::Bool(true) => f.write_str("true"),
            Object::Bool(false) => f.write_str("false"),
            Object::Number(Number::Int(x)) => write!(f, "{x}"),
            Object::Number(Number::Real(x)) => write!(f, "{x}"),
            Object::String(s) => format_string(f, s),
            Object::Name(name) => write!(f, "{name}"),
            Object::Array(arr) => {
                f.write_str("[ ")?;
                for obj in arr {
                    write!(f, "{obj} ")?;
                }
                f.write_str("]")
            },
            Object::Dict(dict) => write!(f, "{dict}"),
            Object::Stream(stm) => write!(f, "{} [stream]", stm.dict),
            Object::Ref(ObjRef { num, gen }) => write!(f, "{num} {gen} R"),
            Object::Null => f.write_str("null")
        }
    }
}

/// A PDF number, which can be integer or real.
///
/// The specification does not require particular bit widths, so `i64` and `f64` were chosen.
/// Values with a decimal dot parse as [`Number::Real`] even without a decimal part.
#[derive(Debug, PartialEq, Clone)]
pub enum Number {
    Int(i64),
    Real(f64)
}

/// Name objects (e.g., `/Pages`). The leading `/` is not stored as part of the name.
#[derive(PartialEq, Clone)]
pub struct Name(pub(crate) Vec<u8>);

impl Name {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl From<&[u8]> for Name {
    fn from(s: &[u8]) -> Name {
        Name(s.to_owned())
    }
}

impl<const N: usize> From<&[u8; N]> for Name {
    fn from(s: &[u8; N]) -> Name {
        Name(s.to_vec())
    }
}

impl Display for Name {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        use crate::syntax::CharClass;
        f.write_str("/")?;
        for c in &self.0 {
            if (0x21..=0x7E).contains(c) && matches!(CharClass::of(*c), CharClass::Reg) && *c != b'#' {
                write!(f, "{}", *c as char)?
            } else {
                write!(f, "#{c:02X}")?
            }
        }
        Ok(())
    }
}

impl Debug for Name {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl<T: AsRef<[u8]> + ?Sized> PartialEq<T> for Name {
    /// Compares this `Name` to a byte string. The leading `/` is not stored and thus may not
    /// be included in the `other` string either.
    fn eq(&self, other: &T) -> bool {
        self.0 == other.as_ref()
    }
}

/// Dictionary objects (like `<< /Length 42 >>`).
///
/// Keys keep their original order, so a dictionary serializes the same way every time.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Dict(Vec<(Name, Object)>);

impl Dict {
    /// Looks up a value for a given [`Name`] key. If not present, returns a static reference
    /// to [`Object::Null`].
    pub fn lookup(&self, key: &[u8]) -> &Object {
        self.0.iter()
            .find(|(name, _obj)| name == &key)
            .map(|(_name, obj)| obj)
            .unwrap_or(&Object::Null)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.0.iter().any(|(name, _obj)| name == &key)
    }

    /// Replaces the value of an existing key in place, or appends a new entry.
    pub fn set(&mut self, key: Name, value: Object) {
        match self.0.iter_mut().find(|(name, _obj)| name == &key.as_slice()) {
            Some((_name, obj)) => *obj = value,
            None => self.0.push((key, value))
        }
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<Object> {
        let index = self.0.iter().position(|(name, _obj)| name == &key)?;
        Some(self.0.remove(index).1)
    }

    pub fn into_inner(self) -> Vec<(Name, Object)> {
        self.0
    }
}

impl From<Vec<(Name, Object)>> for Dict {
    fn from(vec: Vec<(Name, Object)>) -> Dict {
        Dict(vec)
    }
}

impl IntoIterator for Dict {
    type Item = (Name, Object);
    type IntoIter = <Vec<(Name, Object)> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Dict {
    type Item = &'a (Name, Object);
    type IntoIter = std::slice::Iter<'a, (Name, Object)>;

    fn into_iter(self: &'a Dict) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Display for Dict {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("<< ")?;
        for (key, val) in &self.0 {
            write!(f, "{key} {val} ")?;
        }
        f.write_str(">>")
    }
}

/// An indirect object reference.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy)]
pub struct ObjRef {
    pub num: ObjNum,
    pub gen: ObjGen
}

impl Display for ObjRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.num, self.gen)
    }
}

/// A PDF stream object.
#[derive(Debug, PartialEq, Clone)]
pub struct Stream {
    /// The stream dictionary.
    pub dict: Dict,
    /// The raw (still encoded) stream data, or its offset in the source file.
    pub data: StreamData
}

/// Stream payload state.
///
/// Parsed streams point into the source buffer; streams copied into a merge own their
/// payload bytes verbatim.
#[derive(Debug, PartialEq, Clone)]
pub enum StreamData {
    Ref(Offset),
    Val(Vec<u8>)
}

//TODO: literal / hex heuristics
fn format_string(f: &mut Formatter<'_>, s: &[u8]) -> fmt::Result {
    f.write_str("(")?;
    for c in s {
        match c {
            b'\x0a' => f.write_str("\\n"),
            b'\x0d' => f.write_str("\\r"),
            b'\x09' => f.write_str("\\t"),
            b'\x08' => f.write_str("\\b"),
            b'\x0c' => f.write_str("\\f"),
            b'(' => f.write_str("\\("),
            b')' => f.write_str("\\)"),
            b'\\' => f.write_str("\\\\"),
            b'\x20'..=b'\x7E' => write!(f, "{}", *c as char),
            _ => write!(f, "\\{c:03o}")
        }?
    }
    f.write_str(")")
}
