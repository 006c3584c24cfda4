use std::fmt;

use anyhow::Context;

use crate::{ByteBuf, EncodeToBuf, FromBuf};

/// Size of the fixed DNS header
pub const HEADER_LENGTH: usize = 12;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum QueryOpcode {
    /// Standard query
    #[default]
    Query,
    /// Inverse query
    IQuery,
    /// Status request
    Status,
    Notify,
    Update,
    /// Any other 4-bit opcode
    Unknown(#[cfg_attr(test, proptest(strategy = "6u8..16"))] u8),
}

impl From<u8> for QueryOpcode {
    fn from(value: u8) -> Self {
        match value {
            0 => QueryOpcode::Query,
            1 => QueryOpcode::IQuery,
            2 => QueryOpcode::Status,
            4 => QueryOpcode::Notify,
            5 => QueryOpcode::Update,
            value => QueryOpcode::Unknown(value),
        }
    }
}

impl From<QueryOpcode> for u8 {
    fn from(value: QueryOpcode) -> Self {
        match value {
            QueryOpcode::Query => 0,
            QueryOpcode::IQuery => 1,
            QueryOpcode::Status => 2,
            QueryOpcode::Notify => 4,
            QueryOpcode::Update => 5,
            QueryOpcode::Unknown(value) => value,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum ResponseCode {
    #[default]
    Success,
    /// Server was unable to interpret the query
    FormatError,
    /// Server was unable to process the query due to an internal error
    ServerFailure,
    /// Domain name referenced in the query doesn't exist
    NameError,
    /// Requested type of query is not supported by the server
    NotImplemented,
    /// Server refuses to complete the specified operation
    Refused,
    /// 6-15 codes
    Unknown(#[cfg_attr(test, proptest(strategy = "6u8..16"))] u8),
}

impl From<u8> for ResponseCode {
    fn from(value: u8) -> Self {
        match value {
            0 => ResponseCode::Success,
            1 => ResponseCode::FormatError,
            2 => ResponseCode::ServerFailure,
            3 => ResponseCode::NameError,
            4 => ResponseCode::NotImplemented,
            5 => ResponseCode::Refused,
            value => ResponseCode::Unknown(value),
        }
    }
}

impl From<ResponseCode> for u8 {
    fn from(value: ResponseCode) -> Self {
        match value {
            ResponseCode::Success => 0,
            ResponseCode::FormatError => 1,
            ResponseCode::ServerFailure => 2,
            ResponseCode::NameError => 3,
            ResponseCode::NotImplemented => 4,
            ResponseCode::Refused => 5,
            ResponseCode::Unknown(value) => value,
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseCode::Success => f.write_str("NOERROR"),
            ResponseCode::FormatError => f.write_str("FORMERR"),
            ResponseCode::ServerFailure => f.write_str("SERVFAIL"),
            ResponseCode::NameError => f.write_str("NXDOMAIN"),
            ResponseCode::NotImplemented => f.write_str("NOTIMP"),
            ResponseCode::Refused => f.write_str("REFUSED"),
            ResponseCode::Unknown(code) => write!(f, "RCODE{}", code),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Default, Clone)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct DnsHeader {
    /// A query and its response **must have the same ID**.
    pub id: u16,
    pub is_response: bool,
    pub opcode: QueryOpcode,
    pub is_authoritative: bool,
    pub truncation: bool,
    pub recursion_desired: bool,
    pub recursion_available: bool,
    /// Z, AD and CD bits
    pub z: [bool; 3],
    pub response_code: ResponseCode,
    /// Number of entries in the *Question* section
    pub question_count: u16,
    /// Number of entries in the *Answer* section
    pub answer_rr_count: u16,
    /// Number of entries in the *Authority* section
    pub authority_rr_count: u16,
    /// Number of entries in the *Additional* section
    pub additional_rr_count: u16,
}

impl DnsHeader {
    pub fn new() -> Self {
        DnsHeader::default()
    }

    pub fn get_flags(&self) -> u16 {
        let first_byte = (self.is_response as u8) << 7
            | (u8::from(self.opcode) & 0xf) << 3
            | (self.is_authoritative as u8) << 2
            | (self.truncation as u8) << 1
            | self.recursion_desired as u8;
        let second_byte = (self.recursion_available as u8) << 7
            | (self.z[0] as u8) << 6
            | (self.z[1] as u8) << 5
            | (self.z[2] as u8) << 4
            | (u8::from(self.response_code) & 0xf);
        (first_byte as u16) << 8 | (second_byte as u16)
    }
}

impl FromBuf for DnsHeader {
    fn from_buf(buf: &mut ByteBuf) -> anyhow::Result<Self> {
        let id = buf.read_u16().context("id is missing")?;
        let flags = buf.read_u16().context("flags are missing")?;

        let question_count = buf.read_u16().context("question count is missing")?;
        let answer_rr_count = buf.read_u16().context("answer RR count is missing")?;
        let authority_rr_count = buf.read_u16().context("authority RR count is missing")?;
        let additional_rr_count = buf.read_u16().context("additional RR count is missing")?;

        Ok(DnsHeader {
            id,
            is_response: flags & 0x8000 != 0,
            opcode: (((flags & 0x7800) >> 11) as u8).into(),
            is_authoritative: flags & 0x400 != 0,
            truncation: flags & 0x200 != 0,
            recursion_desired: flags & 0x100 != 0,
            recursion_available: flags & 0x80 != 0,
            z: [flags & 0x40 != 0, flags & 0x20 != 0, flags & 0x10 != 0],
            response_code: ((flags & 0xf) as u8).into(),
            question_count,
            answer_rr_count,
            authority_rr_count,
            additional_rr_count,
        })
    }
}

impl EncodeToBuf for DnsHeader {
    fn encode_to_buf(&self, buf: &mut ByteBuf) -> anyhow::Result<()> {
        buf.write_u16(self.id);
        buf.write_u16(self.get_flags());
        buf.write_u16(self.question_count);
        buf.write_u16(self.answer_rr_count);
        buf.write_u16(self.authority_rr_count);
        buf.write_u16(self.additional_rr_count);

        Ok(())
    }
}
