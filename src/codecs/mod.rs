mod flate;

pub use flate::encode as flate_encode;

use std::io::BufRead;

use crate::error::ErrorKind;
use crate::object::{Dict, Object};

/// Filters the engine can decode.
///
/// Only cross-reference streams and object streams are ever decoded; page content and other
/// payload streams are carried over in their encoded form. A filter outside this set in a
/// structural stream is therefore [`ErrorKind::UnsupportedFeature`].
#[derive(Debug, PartialEq)]
pub enum Filter {
    /// `/FlateDecode` with its decode parameters.
    Flate(Dict),
}

/// Interprets resolved `/Filter` and `/DecodeParms` values into a decoding chain.
pub fn parse_filters(filter: &Object, parms: &Object) -> Result<Vec<Filter>, ErrorKind> {
    let names = match filter {
        Object::Null => Vec::new(),
        Object::Name(name) => vec![name],
        Object::Array(vec) => vec.iter()
            .map(|obj| obj.as_name().ok_or(ErrorKind::MalformedObject("malformed /Filter")))
            .collect::<Result<Vec<_>, _>>()?,
        _ => return Err(ErrorKind::MalformedObject("malformed /Filter"))
    };
    let parms_at = |index: usize| -> Result<Dict, ErrorKind> {
        match parms {
            Object::Null => Ok(Dict::default()),
            Object::Dict(dict) if names.len() == 1 => Ok(dict.clone()),
            Object::Array(vec) => match vec.get(index) {
                None | Some(Object::Null) => Ok(Dict::default()),
                Some(Object::Dict(dict)) => Ok(dict.clone()),
                Some(_) => Err(ErrorKind::MalformedObject("malformed /DecodeParms"))
            },
            _ => Err(ErrorKind::MalformedObject("malformed /DecodeParms"))
        }
    };
    names.iter()
        .enumerate()
        .map(|(index, name)| {
            if *name == b"FlateDecode" {
                Ok(Filter::Flate(parms_at(index)?))
            } else {
                Err(ErrorKind::UnsupportedFeature("structural stream filter"))
            }
        })
        .collect()
}

/// Wraps a `BufRead` in adapters decoding the data according to the parsed filter chain.
pub fn decode<'a, R: BufRead + 'a>(input: R, filters: &[Filter]) -> Result<Box<dyn BufRead + 'a>, ErrorKind> {
    let mut out: Box<dyn BufRead + 'a> = Box::new(input);
    for filter in filters {
        out = match filter {
            Filter::Flate(params) => flate::decode(out, params)?
        };
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Name;
    use std::io::Read;

    #[test]
    fn test_parse_filters() {
        assert_eq!(parse_filters(&Object::Null, &Object::Null).unwrap(), vec![]);
        assert_eq!(parse_filters(&Object::new_name(b"FlateDecode"), &Object::Null).unwrap(),
            vec![Filter::Flate(Dict::default())]);
        let parms = Dict::from(vec![(Name::from(b"Predictor"), Object::new_int(12))]);
        assert_eq!(parse_filters(&Object::new_name(b"FlateDecode"), &Object::Dict(parms.clone())).unwrap(),
            vec![Filter::Flate(parms)]);
        assert!(matches!(parse_filters(&Object::new_name(b"DCTDecode"), &Object::Null),
            Err(ErrorKind::UnsupportedFeature(_))));
        assert!(parse_filters(&Object::new_int(1), &Object::Null).is_err());
    }

    #[test]
    fn test_flate_round_trip() {
        let data = b"BT /F1 12 Tf 72 720 Td (Hello) Tj ET".repeat(10);
        let packed = flate_encode(&data).unwrap();
        assert!(packed.len() < data.len());
        let filters = vec![Filter::Flate(Dict::default())];
        let mut out = Vec::new();
        decode(&packed[..], &filters).unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }
}
