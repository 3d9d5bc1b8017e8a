use crate::error::{ErrorKind, Result};
use exn::OptionExt;

/// Forward-only cursor over a big-endian byte buffer.
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}
impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or_raise(|| ErrorKind::Truncated(self.pos))?;
        let bytes = self.buf.get(self.pos..end).ok_or_raise(|| ErrorKind::Truncated(self.pos))?;
        self.pos = end;
        Ok(bytes)
    }

    pub(crate) fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }

    pub(crate) fn u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads a fixed-width, NUL-padded ASCII field. NULs and `trim` bytes are
    /// stripped from both ends, in any mix.
    pub(crate) fn fixed_str(&mut self, field: &'static str, len: usize, trim: &[u8]) -> Result<String> {
        let bytes = self.take(len)?;
        let padding = |b: &u8| *b == 0 || trim.contains(b);
        let start = bytes.iter().position(|b| !padding(b)).unwrap_or(bytes.len());
        let end = bytes.iter().rposition(|b| !padding(b)).map_or(start, |p| p + 1);
        let bytes = &bytes[start..end];
        if !bytes.is_ascii() {
            exn::bail!(ErrorKind::ParseError {
                field,
                value: String::from_utf8_lossy(bytes).into_owned(),
            });
        }
        // ASCII is always valid UTF-8.
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }
}
