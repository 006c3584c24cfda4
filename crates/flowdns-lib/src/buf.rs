use core::str;
use std::borrow::Cow;
use std::ops::Deref;

use anyhow::Context;

/// Upper bound on compression pointers followed while reading a single name
const MAX_NAME_JUMPS: usize = 64;
/// RFC1035: labels are limited to 63 octets
const MAX_LABEL_LENGTH: usize = 0x3f;

pub trait FromBuf: Sized {
    fn from_buf(buf: &mut ByteBuf) -> anyhow::Result<Self>;
}

pub trait EncodeToBuf {
    fn encode_to_buf(&self, buf: &mut ByteBuf) -> anyhow::Result<()>;
}

/// Cursor over a DNS message.
///
/// Reads advance `pos` and are bounds-checked; writes always append.
pub struct ByteBuf<'a> {
    buf: Cow<'a, [u8]>,
    pos: usize,
}

impl<'a> Deref for ByteBuf<'a> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.buf.as_ref()
    }
}

impl<'a> AsRef<[u8]> for ByteBuf<'a> {
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}

impl<'a> ByteBuf<'a> {
    pub fn new(src: &'a [u8]) -> ByteBuf<'a> {
        ByteBuf {
            buf: Cow::Borrowed(src),
            pos: 0,
        }
    }

    pub fn new_empty(capacity: Option<usize>) -> ByteBuf<'static> {
        ByteBuf {
            buf: Cow::Owned(Vec::with_capacity(capacity.unwrap_or(512))),
            pos: 0,
        }
    }

    pub fn into_inner(self) -> Cow<'a, [u8]> {
        self.buf
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub fn read_u8(&mut self) -> anyhow::Result<u8> {
        self.read_bytes(1).map(|bytes| bytes[0])
    }

    pub fn read_u16(&mut self) -> anyhow::Result<u16> {
        self.read_array::<2>().map(u16::from_be_bytes)
    }

    pub fn read_u32(&mut self) -> anyhow::Result<u32> {
        self.read_array::<4>().map(u32::from_be_bytes)
    }

    pub fn read_array<const N: usize>(&mut self) -> anyhow::Result<[u8; N]> {
        self.read_bytes(N)?
            .try_into()
            .with_context(|| format!("bug: should be exactly {} bytes in length", N))
    }

    pub fn read_bytes(&mut self, n: usize) -> anyhow::Result<&[u8]> {
        self.ensure_length(n, None)?;
        let pos = self.pos;
        self.pos += n;
        self.buf
            .get(pos..pos + n)
            .context("bug: range should be present")
    }

    /// Reads a possibly compressed domain name and returns it in dotted form
    /// without the trailing dot. The root name is returned as an empty string.
    ///
    /// Labels are arbitrary octets: `.` and `\\` are escaped with a backslash and
    /// anything outside printable ASCII is written as `\DDD`.
    pub fn read_qname(&mut self) -> anyhow::Result<String> {
        let mut jumps = 0;
        let mut pos = self.pos;
        // Position right after the name as it appears at the cursor
        let mut resume_pos = None;
        let mut name = String::new();
        loop {
            self.ensure_length(1, Some(pos))
                .context("malformed packet: expected QNAME label length")?;
            let label_length = self.buf[pos];
            if label_length & 0xC0 == 0xC0 {
                self.ensure_length(2, Some(pos))
                    .context("malformed packet: expected second jump ptr byte in QNAME")?;
                let offset = (((label_length & 0x3F) as usize) << 8) | self.buf[pos + 1] as usize;
                // Only backward jumps are legal, which also rules out self-references
                if offset >= pos {
                    anyhow::bail!(
                        "malformed packet: forward jump ptr to {} at byte {}",
                        offset,
                        pos
                    );
                }
                jumps += 1;
                if jumps > MAX_NAME_JUMPS {
                    anyhow::bail!("malformed packet: too many jump ptrs in QNAME");
                }
                resume_pos.get_or_insert(pos + 2);
                pos = offset;
            } else if label_length & 0xC0 != 0 {
                anyhow::bail!(
                    "malformed packet: unsupported label type {:#04x} at byte {}",
                    label_length,
                    pos
                );
            } else {
                pos += 1;
                if label_length == 0 {
                    break;
                }

                let label = self
                    .buf
                    .get(pos..pos + label_length as usize)
                    .with_context(|| {
                        format!(
                            "malformed packet: expected label of length {} at byte {}",
                            label_length, pos
                        )
                    })?;
                if !name.is_empty() {
                    name.push('.');
                }
                push_escaped_label(&mut name, label);
                pos += label_length as usize;
            }
        }

        self.pos = resume_pos.unwrap_or(pos);

        Ok(name)
    }

    pub fn write_u8(&mut self, data: u8) {
        self.buf.to_mut().push(data);
    }

    pub fn write_u16(&mut self, data: u16) {
        self.write_bytes(&data.to_be_bytes());
    }

    pub fn write_u32(&mut self, data: u32) {
        self.write_bytes(&data.to_be_bytes());
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buf.to_mut().extend_from_slice(data);
    }

    /// Overwrites two bytes at `pos`, used to patch lengths written ahead of their data
    pub fn set_u16(&mut self, pos: usize, data: u16) -> anyhow::Result<()> {
        self.ensure_length(2, Some(pos))?;
        self.buf.to_mut()[pos..pos + 2].copy_from_slice(&data.to_be_bytes());
        Ok(())
    }

    /// Writes an uncompressed name and returns the number of bytes written.
    ///
    /// Accepts the escapes produced by [`ByteBuf::read_qname`].
    pub fn write_qname(&mut self, qname: &str) -> anyhow::Result<usize> {
        let mut written = 0;
        for label in split_labels(qname)? {
            if label.len() > MAX_LABEL_LENGTH {
                anyhow::bail!(
                    "label is too long ({}): {}",
                    label.len(),
                    String::from_utf8_lossy(&label)
                );
            }
            self.write_u8(label.len() as u8);
            self.write_bytes(&label);
            written += 1 + label.len();
        }
        self.write_u8(0);

        Ok(written + 1)
    }

    fn ensure_length(&self, n: usize, pos: Option<usize>) -> anyhow::Result<()> {
        if self.buf.len() < pos.unwrap_or(self.pos) + n {
            anyhow::bail!("underlying buffer is too small")
        }
        Ok(())
    }
}

fn push_escaped_label(name: &mut String, label: &[u8]) {
    for &byte in label {
        match byte {
            b'.' | b'\\' => {
                name.push('\\');
                name.push(byte as char);
            }
            0x21..=0x7e => name.push(byte as char),
            _ => name.push_str(&format!("\\{:03}", byte)),
        }
    }
}

/// Splits a dotted name into raw labels, resolving `\c` and `\DDD` escapes.
/// Empty labels are skipped.
fn split_labels(qname: &str) -> anyhow::Result<Vec<Vec<u8>>> {
    let mut labels = Vec::new();
    let mut label = Vec::new();
    let mut bytes = qname.bytes();
    while let Some(byte) = bytes.next() {
        match byte {
            b'.' => {
                if !label.is_empty() {
                    labels.push(std::mem::take(&mut label));
                }
            }
            b'\\' => {
                let escaped = bytes
                    .next()
                    .with_context(|| format!("dangling escape in name {:?}", qname))?;
                if escaped.is_ascii_digit() {
                    let digits = [
                        escaped,
                        bytes.next().unwrap_or_default(),
                        bytes.next().unwrap_or_default(),
                    ];
                    let value = str::from_utf8(&digits)
                        .ok()
                        .and_then(|digits| digits.parse::<u8>().ok())
                        .with_context(|| format!("invalid \\DDD escape in name {:?}", qname))?;
                    label.push(value);
                } else {
                    label.push(escaped);
                }
            }
            byte => label.push(byte),
        }
    }
    if !label.is_empty() {
        labels.push(label);
    }

    Ok(labels)
}
