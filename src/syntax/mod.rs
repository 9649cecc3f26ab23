pub(crate) mod cc;
pub(crate) mod bp;
mod tk;
mod op;

pub(crate) use cc::CharClass;
pub(crate) use bp::ByteProvider;
pub(crate) use tk::Tokenizer;
pub use op::ObjParser;
