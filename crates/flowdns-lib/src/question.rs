use anyhow::Context;

use crate::{ByteBuf, DnsClass, DnsType, EncodeToBuf, FromBuf, IN_CLASS};

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Question {
    pub qname: String,
    pub qtype: u16,
    pub qclass: u16,
}

impl Question {
    pub fn new(qname: impl Into<String>, qtype: u16, qclass: Option<u16>) -> Self {
        Self {
            qname: qname.into(),
            qtype,
            qclass: qclass.unwrap_or(IN_CLASS),
        }
    }

    pub fn dns_type(&self) -> DnsType {
        self.qtype.into()
    }

    pub fn dns_class(&self) -> DnsClass {
        self.qclass.into()
    }
}

impl FromBuf for Question {
    fn from_buf(buf: &mut ByteBuf) -> anyhow::Result<Question> {
        let qname = buf.read_qname().context("QNAME is missing")?;
        let qtype = buf.read_u16().context("QTYPE is missing")?;
        let qclass = buf.read_u16().context("QCLASS is missing")?;

        Ok(Question {
            qname,
            qtype,
            qclass,
        })
    }
}

impl EncodeToBuf for Question {
    fn encode_to_buf(&self, buf: &mut ByteBuf) -> anyhow::Result<()> {
        buf.write_qname(&self.qname).context("writing QNAME")?;
        buf.write_u16(self.qtype);
        buf.write_u16(self.qclass);

        Ok(())
    }
}
