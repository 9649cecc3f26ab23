use std::io::BufRead;

/// Byte-level access helpers shared by the tokenizer and the file parser.
pub trait ByteProvider: BufRead {
    fn peek(&mut self) -> Option<u8> {
        match self.fill_buf() {
            Ok(buf) => buf.first().copied(),
            _ => None
        }
    }

    fn next_or_eof(&mut self) -> std::io::Result<u8> {
        let buf = self.fill_buf()?;
        if let Some(&ret) = buf.first() {
            self.consume(1);
            Ok(ret)
        } else {
            Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof))
        }
    }

    fn next_if(&mut self, cond: impl FnOnce(u8) -> bool) -> Option<u8> {
        let buf = self.fill_buf().ok()?;
        match buf.first() {
            Some(&c) if cond(c) => {
                self.consume(1);
                Some(c)
            },
            _ => None
        }
    }

    fn skip_ws(&mut self) -> std::io::Result<()> {
        while self.next_if(|c| matches!(c, b'\x00' | b'\x09' | b'\x0A' | b'\x0C' | b'\x0D' | b'\x20')).is_some() { }
        Ok(())
    }

    /// Consumes an end of line (LF, CR, or CRLF), permitting leading blanks.
    fn read_eol(&mut self) -> std::io::Result<()> {
        while self.next_if(|c| c == b' ' || c == b'\t').is_some() { }
        match self.next_or_eof()? {
            b'\n' => Ok(()),
            b'\r' => {
                self.next_if(|c| c == b'\n');
                Ok(())
            },
            _ => Err(std::io::Error::from(std::io::ErrorKind::InvalidData))
        }
    }

    /// Reads up to and including the next EOL, returning the line without the EOL bytes.
    fn read_line_excl(&mut self) -> std::io::Result<Vec<u8>> {
        let mut line = self.read_line_incl()?;
        while matches!(line.last(), Some(b'\n' | b'\r')) {
            line.pop();
        }
        Ok(line)
    }

    /// Reads up to and including the next EOL (LF, CR, or CRLF), EOL bytes kept.
    fn read_line_incl(&mut self) -> std::io::Result<Vec<u8>> {
        let mut line = Vec::new();
        loop {
            let buf = match self.fill_buf() {
                Ok(buf) => buf,
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err)
            };
            if buf.is_empty() {
                if line.is_empty() {
                    return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof));
                }
                break;
            }
            match buf.iter().position(|c| *c == b'\n' || *c == b'\r') {
                Some(pos) => {
                    let crlf = buf[pos] == b'\r' && buf.len() > pos + 1 && buf[pos + 1] == b'\n';
                    let end = pos + if crlf { 2 } else { 1 };
                    line.extend_from_slice(&buf[..end]);
                    self.consume(end);
                    break;
                },
                None => {
                    line.extend_from_slice(buf);
                    let len = buf.len();
                    self.consume(len);
                }
            }
        }
        Ok(line)
    }
}

impl<T: BufRead> ByteProvider for T { }
