use std::io::{Read, Write, BufRead, BufReader};

use flate2::bufread::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::ErrorKind;
use crate::object::Dict;

pub fn decode<'a, R: BufRead + 'a>(input: R, params: &Dict) -> Result<Box<dyn BufRead + 'a>, ErrorKind> {
    match params.lookup(b"Predictor").num_value() {
        None | Some(1) => Ok(Box::new(BufReader::new(ZlibDecoder::new(input)))),
        Some(10..=15) => Ok(Box::new(PngDecode::new(
            ZlibDecoder::new(input),
            params.lookup(b"Columns").num_value().unwrap_or(1),
        ))),
        Some(_) => Err(ErrorKind::UnsupportedFeature("stream predictor"))
    }
}

/// Compresses with the default zlib level. Used for cross-reference stream output; the
/// result is deterministic for a given input.
pub fn encode(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Reverses PNG row prediction (`/Predictor` 10 to 15) with one byte per sample.
struct PngDecode<R: Read> {
    input: R,
    cols: usize,
    prev_row: Vec<u8>,
    index: usize
}

impl<R: Read> PngDecode<R> {
    fn new(input: R, cols: usize) -> Self {
        PngDecode { input, cols, prev_row: Vec::new(), index: 0 }
    }

    fn read_row(&mut self) -> std::io::Result<&[u8]> {
        let mut enc_row = vec![0; 1 + self.cols];
        if let Err(err) = self.input.read_exact(&mut enc_row) {
            match err.kind() {
                std::io::ErrorKind::UnexpectedEof => return Ok(&[]),
                _ => return Err(err)
            }
        }
        let (enc, in_row) = enc_row.split_first().unwrap(); // size >= 1 always
        let mut prev_row = std::mem::take(&mut self.prev_row);
        if prev_row.is_empty() {
            prev_row.resize(self.cols, 0);
        }
        let new_row = &mut self.prev_row;
        match enc {
            0 => new_row.extend_from_slice(in_row),
            1 => {
                let mut out_val = 0u8;
                for in_val in in_row {
                    out_val = out_val.wrapping_add(*in_val);
                    new_row.push(out_val);
                }
            },
            2 => {
                for (old_val, new_val) in std::iter::zip(prev_row, in_row) {
                    new_row.push(old_val.wrapping_add(*new_val));
                }
            },
            _ => return Err(std::io::Error::new(std::io::ErrorKind::InvalidData,
                format!("PNG row predictor {enc}")))
        }
        self.index = 0;
        Ok(&self.prev_row)
    }
}

impl<R: Read> BufRead for PngDecode<R> {
    fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
        if self.index < self.prev_row.len() {
            Ok(&self.prev_row[self.index..])
        } else {
            self.read_row()
        }
    }

    fn consume(&mut self, amt: usize) {
        self.index += amt;
    }
}

impl<R: Read> Read for PngDecode<R> {
    fn read(&mut self, out_buf: &mut [u8]) -> std::io::Result<usize> {
        let mut out_index = 0;
        let out_len = out_buf.len();
        while out_index < out_len {
            let in_buf = match self.fill_buf() {
                Ok([]) => return Ok(out_index),
                Ok(buf) => buf,
                Err(err) => match out_index {
                    0 => return Err(err),
                    read => return Ok(read)
                }
            };
            let len = std::cmp::min(in_buf.len(), out_len - out_index);
            out_buf[out_index..(out_index + len)].clone_from_slice(&in_buf[0..len]);
            out_index += len;
            self.consume(len);
        }
        Ok(out_len)
    }
}
