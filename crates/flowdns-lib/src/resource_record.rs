use std::{
    fmt,
    net::{Ipv4Addr, Ipv6Addr},
};

use anyhow::Context;

use crate::{ByteBuf, DnsClass, DnsType, EncodeToBuf, FromBuf};

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ResourceRecord {
    pub name: String,
    pub class: u16,
    pub ttl: u32,
    pub resource_data: ResourceData,
}

impl ResourceRecord {
    pub fn new(
        name: impl Into<String>,
        resource_data: ResourceData,
        ttl: Option<u32>,
        class: Option<u16>,
    ) -> Self {
        ResourceRecord {
            name: name.into(),
            ttl: ttl.unwrap_or_default(),
            class: class.unwrap_or(crate::IN_CLASS),
            resource_data,
        }
    }

    pub fn rtype(&self) -> u16 {
        self.resource_data.rtype()
    }

    pub fn dns_type(&self) -> DnsType {
        self.rtype().into()
    }

    pub fn dns_class(&self) -> DnsClass {
        self.class.into()
    }
}

impl fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = if self.name.is_empty() { "." } else { &self.name };
        write!(f, "Name: {}, TTL: {}, Data: {}", name, self.ttl, self.resource_data)
    }
}

impl FromBuf for ResourceRecord {
    fn from_buf(buf: &mut ByteBuf) -> anyhow::Result<ResourceRecord> {
        let name = buf.read_qname().context("NAME is missing")?;
        let rtype = buf.read_u16().context("TYPE is missing")?;
        let class = buf.read_u16().context("CLASS is missing")?;
        let ttl = buf.read_u32().context("TTL is missing")?;
        let resource_data = ResourceData::from_buf_with_type(buf, rtype)
            .with_context(|| format!("can't decode RDATA of {} record", DnsType::from(rtype)))?;

        Ok(ResourceRecord {
            name,
            class,
            ttl,
            resource_data,
        })
    }
}

impl EncodeToBuf for ResourceRecord {
    fn encode_to_buf(&self, buf: &mut ByteBuf) -> anyhow::Result<()> {
        buf.write_qname(&self.name).context("writing NAME")?;
        buf.write_u16(self.rtype());
        buf.write_u16(self.class);
        buf.write_u32(self.ttl);
        self.resource_data
            .encode_to_buf(buf)
            .context("writing RDATA")?;

        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ResourceData {
    A {
        address: Ipv4Addr,
    },
    Ns {
        ns_domain_name: String,
    },
    Cname {
        cname: String,
    },
    Soa {
        mname: String,
        rname: String,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    },
    Ptr {
        ptr_domain_name: String,
    },
    Mx {
        preference: u16,
        exchange: String,
    },
    /// Character strings in wire order
    Txt {
        strings: Vec<Vec<u8>>,
    },
    Aaaa {
        address: Ipv6Addr,
    },
    Srv {
        priority: u16,
        weight: u16,
        port: u16,
        target: String,
    },
    /// Any type without a dedicated decoder, RDATA kept verbatim
    Unknown {
        rtype: u16,
        rdata: Vec<u8>,
    },
}

impl ResourceData {
    pub fn from_buf_with_type(buf: &mut ByteBuf, rtype: u16) -> anyhow::Result<ResourceData> {
        let rd_length = buf.read_u16().context("RDLENGTH is missing")? as usize;
        if buf.remaining() < rd_length {
            anyhow::bail!(
                "RDATA of length {} exceeds the {} remaining bytes",
                rd_length,
                buf.remaining()
            );
        }
        let rdata_start = buf.pos();
        let rdata_end = rdata_start + rd_length;

        let resource_data = match DnsType::from(rtype) {
            DnsType::A => {
                if rd_length != 4 {
                    anyhow::bail!("A record: unexpected RDLENGTH {}", rd_length);
                }
                let address = buf.read_array::<4>().context("A record: ADDRESS is missing")?;
                ResourceData::A {
                    address: Ipv4Addr::from(address),
                }
            }
            DnsType::Aaaa => {
                if rd_length != 16 {
                    anyhow::bail!("AAAA record: unexpected RDLENGTH {}", rd_length);
                }
                let address = buf
                    .read_array::<16>()
                    .context("AAAA record: ADDRESS is missing")?;
                ResourceData::Aaaa {
                    address: Ipv6Addr::from(address),
                }
            }
            DnsType::Ns => ResourceData::Ns {
                ns_domain_name: buf.read_qname().context("NS record: NSDNAME is missing")?,
            },
            DnsType::Cname => ResourceData::Cname {
                cname: buf.read_qname().context("CNAME record: CNAME is missing")?,
            },
            DnsType::Ptr => ResourceData::Ptr {
                ptr_domain_name: buf.read_qname().context("PTR record: PTRDNAME is missing")?,
            },
            DnsType::Mx => ResourceData::Mx {
                preference: buf.read_u16().context("MX record: PREFERENCE is missing")?,
                exchange: buf.read_qname().context("MX record: EXCHANGE is missing")?,
            },
            DnsType::Soa => ResourceData::Soa {
                mname: buf.read_qname().context("SOA record: MNAME is missing")?,
                rname: buf.read_qname().context("SOA record: RNAME is missing")?,
                serial: buf.read_u32().context("SOA record: SERIAL is missing")?,
                refresh: buf.read_u32().context("SOA record: REFRESH is missing")?,
                retry: buf.read_u32().context("SOA record: RETRY is missing")?,
                expire: buf.read_u32().context("SOA record: EXPIRE is missing")?,
                minimum: buf.read_u32().context("SOA record: MINIMUM is missing")?,
            },
            DnsType::Srv => ResourceData::Srv {
                priority: buf.read_u16().context("SRV record: PRIORITY is missing")?,
                weight: buf.read_u16().context("SRV record: WEIGHT is missing")?,
                port: buf.read_u16().context("SRV record: PORT is missing")?,
                target: buf.read_qname().context("SRV record: TARGET is missing")?,
            },
            DnsType::Txt => {
                let mut strings = Vec::new();
                while buf.pos() < rdata_end {
                    let length = buf.read_u8().context("TXT record: string length is missing")?;
                    let string = buf
                        .read_bytes(length as usize)
                        .context("TXT record: string data is missing")?;
                    strings.push(string.to_vec());
                }
                ResourceData::Txt { strings }
            }
            _ => ResourceData::Unknown {
                rtype,
                rdata: buf
                    .read_bytes(rd_length)
                    .context("RDATA is missing")?
                    .to_vec(),
            },
        };

        if buf.pos() != rdata_end {
            anyhow::bail!(
                "RDATA spans {} bytes while RDLENGTH is {}",
                buf.pos() - rdata_start,
                rd_length
            );
        }

        Ok(resource_data)
    }

    pub fn rtype(&self) -> u16 {
        match self {
            ResourceData::A { .. } => 1,
            ResourceData::Ns { .. } => 2,
            ResourceData::Cname { .. } => 5,
            ResourceData::Soa { .. } => 6,
            ResourceData::Ptr { .. } => 12,
            ResourceData::Mx { .. } => 15,
            ResourceData::Txt { .. } => 16,
            ResourceData::Aaaa { .. } => 28,
            ResourceData::Srv { .. } => 33,
            ResourceData::Unknown { rtype, .. } => *rtype,
        }
    }
}

impl EncodeToBuf for ResourceData {
    fn encode_to_buf(&self, buf: &mut ByteBuf) -> anyhow::Result<()> {
        let rdata_pos = buf.len();
        // RDLENGTH is patched once the data is written
        buf.write_u16(0);

        match self {
            ResourceData::A { address } => buf.write_bytes(&address.octets()),
            ResourceData::Aaaa { address } => buf.write_bytes(&address.octets()),
            ResourceData::Ns {
                ns_domain_name: name,
            }
            | ResourceData::Cname { cname: name }
            | ResourceData::Ptr {
                ptr_domain_name: name,
            } => {
                buf.write_qname(name).context("writing domain name")?;
            }
            ResourceData::Mx {
                preference,
                exchange,
            } => {
                buf.write_u16(*preference);
                buf.write_qname(exchange).context("MX record: writing EXCHANGE")?;
            }
            ResourceData::Soa {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => {
                buf.write_qname(mname).context("SOA record: writing MNAME")?;
                buf.write_qname(rname).context("SOA record: writing RNAME")?;
                for value in [serial, refresh, retry, expire, minimum] {
                    buf.write_u32(*value);
                }
            }
            ResourceData::Srv {
                priority,
                weight,
                port,
                target,
            } => {
                buf.write_u16(*priority);
                buf.write_u16(*weight);
                buf.write_u16(*port);
                buf.write_qname(target).context("SRV record: writing TARGET")?;
            }
            ResourceData::Txt { strings } => {
                for string in strings {
                    let length = u8::try_from(string.len())
                        .context("TXT record: character string is longer than 255 bytes")?;
                    buf.write_u8(length);
                    buf.write_bytes(string);
                }
            }
            ResourceData::Unknown { rdata, .. } => buf.write_bytes(rdata),
        }

        let rd_length = u16::try_from(buf.len() - rdata_pos - 2).context("RDATA is too long")?;
        buf.set_u16(rdata_pos, rd_length)
            .context("writing RDLENGTH")
    }
}

impl fmt::Display for ResourceData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceData::A { address } => write!(f, "{}", address),
            ResourceData::Aaaa { address } => write!(f, "{}", address),
            ResourceData::Ns {
                ns_domain_name: name,
            }
            | ResourceData::Cname { cname: name }
            | ResourceData::Ptr {
                ptr_domain_name: name,
            } => write!(f, "{}.", name),
            ResourceData::Mx {
                preference,
                exchange,
            } => write!(f, "{} {}.", preference, exchange),
            ResourceData::Soa {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => write!(
                f,
                "{}. {}. {} {} {} {} {}",
                mname, rname, serial, refresh, retry, expire, minimum
            ),
            ResourceData::Srv {
                priority,
                weight,
                port,
                target,
            } => write!(f, "{} {} {} {}.", priority, weight, port, target),
            ResourceData::Txt { strings } => {
                for (idx, string) in strings.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "\"{}\"", String::from_utf8_lossy(string).escape_default())?;
                }
                Ok(())
            }
            // RFC3597 generic representation
            ResourceData::Unknown { rdata, .. } => {
                write!(f, "\\# {}", rdata.len())?;
                if !rdata.is_empty() {
                    f.write_str(" ")?;
                    for byte in rdata {
                        write!(f, "{:02x}", byte)?;
                    }
                }
                Ok(())
            }
        }
    }
}
