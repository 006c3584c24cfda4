//! Mapping of raw TYPE and CLASS codes into named categories.
//!
//! Both tables are total over `i64`: every integer maps to exactly one variant.
//! Lookup order is fixed: named code first, then the reserved sentinel 65535,
//! then the private-use range, then out-of-range values, and everything left is
//! unassigned.

use std::fmt;

/// First code of the private-use range shared by TYPE and CLASS
pub const PRIVATE_USE_START: i64 = 65280;
/// Last code of the private-use range shared by TYPE and CLASS
pub const PRIVATE_USE_END: i64 = 65534;
/// Reserved sentinel at the top of the 16-bit code space
pub const RESERVED_SENTINEL: i64 = 65535;

macro_rules! dns_codes {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$variant_meta:meta])* $variant:ident = $code:literal => $label:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$variant_meta])* $variant,)+
            /// Code inside the 16-bit space without an IANA assignment
            Unassigned,
            /// 65280-65534
            Private,
            /// Not representable as a 16-bit code
            Invalid,
        }

        impl $name {
            /// Exact lookup in the named set
            pub fn named(code: u16) -> Option<Self> {
                match code {
                    $($code => Some($name::$variant),)+
                    _ => None,
                }
            }

            /// IANA code of a named variant, `None` for synthetic categories
            pub fn code(self) -> Option<u16> {
                match self {
                    $($name::$variant => Some($code),)+
                    _ => None,
                }
            }

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                    $name::Unassigned => "unassigned",
                    $name::Private => "priv",
                    $name::Invalid => "invalid",
                }
            }

            pub fn from_code(code: i64) -> Self {
                if let Some(named) = u16::try_from(code).ok().and_then(Self::named) {
                    return named;
                }

                match code {
                    RESERVED_SENTINEL => $name::Reserved,
                    PRIVATE_USE_START..=PRIVATE_USE_END => $name::Private,
                    code if !(0..=RESERVED_SENTINEL).contains(&code) => $name::Invalid,
                    _ => $name::Unassigned,
                }
            }
        }

        impl From<u16> for $name {
            fn from(value: u16) -> Self {
                $name::from_code(value.into())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

dns_codes! {
    /// Resource record TYPE, see the IANA "Resource Record (RR) TYPEs" registry
    pub enum DnsType {
        /// 0, and 65535 through the sentinel rule
        Reserved = 0 => "reserved",
        A = 1 => "a",
        Ns = 2 => "ns",
        Md = 3 => "md",
        Mf = 4 => "mf",
        Cname = 5 => "cname",
        Soa = 6 => "soa",
        Mb = 7 => "mb",
        Mg = 8 => "mg",
        Mr = 9 => "mr",
        Null = 10 => "null",
        Wks = 11 => "wks",
        Ptr = 12 => "ptr",
        Hinfo = 13 => "hinfo",
        Minfo = 14 => "minfo",
        Mx = 15 => "mx",
        Txt = 16 => "txt",
        Rp = 17 => "rp",
        Afsdb = 18 => "afsdb",
        X25 = 19 => "x25",
        Isdn = 20 => "isdn",
        Rt = 21 => "rt",
        Nsap = 22 => "nsap",
        NsapPtr = 23 => "nsap-ptr",
        Sig = 24 => "sig",
        Key = 25 => "key",
        Px = 26 => "px",
        Gpos = 27 => "gpos",
        Aaaa = 28 => "aaaa",
        Loc = 29 => "loc",
        Nxt = 30 => "nxt",
        Eid = 31 => "eid",
        Nimloc = 32 => "nimloc",
        Srv = 33 => "srv",
        Atma = 34 => "atma",
        Naptr = 35 => "naptr",
        Kx = 36 => "kx",
        Cert = 37 => "cert",
        A6 = 38 => "a6",
        Dname = 39 => "dname",
        Sink = 40 => "sink",
        Opt = 41 => "opt",
        Apl = 42 => "apl",
        Ds = 43 => "ds",
        Sshfp = 44 => "sshfp",
        Ipseckey = 45 => "ipseckey",
        Rrsig = 46 => "rrsig",
        Nsec = 47 => "nsec",
        Dnskey = 48 => "dnskey",
        Dhcid = 49 => "dhcid",
        Nsec3 = 50 => "nsec3",
        Nsec3Param = 51 => "nsec3param",
        Tlsa = 52 => "tlsa",
        Smimea = 53 => "smimea",
        Hip = 55 => "hip",
        Ninfo = 56 => "ninfo",
        Rkey = 57 => "rkey",
        Talink = 58 => "talink",
        Cds = 59 => "cds",
        Cdnskey = 60 => "cdnskey",
        Openpgpkey = 61 => "openpgpkey",
        Csync = 62 => "csync",
        Zonemd = 63 => "zonemd",
        Svcb = 64 => "svcb",
        Https = 65 => "https",
        Dsync = 66 => "dsync",
        Hhit = 67 => "hhit",
        Brid = 68 => "brid",
        Spf = 99 => "spf",
        Uinfo = 100 => "uinfo",
        Uid = 101 => "uid",
        Gid = 102 => "gid",
        Unspec = 103 => "unspec",
        Nid = 104 => "nid",
        L32 = 105 => "l32",
        L64 = 106 => "l64",
        Lp = 107 => "lp",
        Eui48 = 108 => "eui48",
        Eui64 = 109 => "eui64",
        Nxname = 128 => "nxname",
        Tkey = 249 => "tkey",
        Tsig = 250 => "tsig",
        Ixfr = 251 => "ixfr",
        Axfr = 252 => "axfr",
        Mailb = 253 => "mailb",
        Maila = 254 => "maila",
        /// QTYPE `*`
        Any = 255 => "any",
        Uri = 256 => "uri",
        Caa = 257 => "caa",
        Avc = 258 => "avc",
        Doa = 259 => "doa",
        Amtrelay = 260 => "amtrelay",
        Resinfo = 261 => "resinfo",
        Wallet = 262 => "wallet",
        Cla = 263 => "cla",
        Ipn = 264 => "ipn",
        Ta = 32768 => "ta",
        Dlv = 32769 => "dlv",
    }
}

dns_codes! {
    /// Resource record CLASS, see the IANA "DNS CLASSes" registry
    pub enum DnsClass {
        /// 0, and 65535 through the sentinel rule
        Reserved = 0 => "reserved",
        Internet = 1 => "internet",
        Chaos = 3 => "chaos",
        Hesiod = 4 => "hesiod",
        /// QCLASS NONE
        QclassNone = 254 => "none",
        /// QCLASS `*`
        QclassAny = 255 => "any",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn named_types() {
        assert_eq!(DnsType::from_code(1), DnsType::A);
        assert_eq!(DnsType::from_code(28), DnsType::Aaaa);
        assert_eq!(DnsType::from_code(255), DnsType::Any);
        assert_eq!(DnsType::from_code(32769), DnsType::Dlv);
        assert_eq!(DnsType::from(65u16).to_string(), "https");
    }

    #[test]
    fn type_fallbacks() {
        assert_eq!(DnsType::from_code(0), DnsType::Reserved);
        assert_eq!(DnsType::from_code(65535), DnsType::Reserved);
        assert_eq!(DnsType::from_code(65280), DnsType::Private);
        assert_eq!(DnsType::from_code(65534), DnsType::Private);
        assert_eq!(DnsType::from_code(54), DnsType::Unassigned);
        assert_eq!(DnsType::from_code(69), DnsType::Unassigned);
        assert_eq!(DnsType::from_code(65279), DnsType::Unassigned);
        assert_eq!(DnsType::from_code(-1), DnsType::Invalid);
        assert_eq!(DnsType::from_code(65536), DnsType::Invalid);
        assert_eq!(DnsType::from_code(i64::MAX), DnsType::Invalid);
    }

    #[test]
    fn class_fallbacks() {
        assert_eq!(DnsClass::from_code(1), DnsClass::Internet);
        assert_eq!(DnsClass::from_code(3), DnsClass::Chaos);
        assert_eq!(DnsClass::from_code(254), DnsClass::QclassNone);
        assert_eq!(DnsClass::from_code(0), DnsClass::Reserved);
        assert_eq!(DnsClass::from_code(65535), DnsClass::Reserved);
        assert_eq!(DnsClass::from_code(2), DnsClass::Unassigned);
        assert_eq!(DnsClass::from_code(4096), DnsClass::Unassigned);
        assert_eq!(DnsClass::from_code(65300), DnsClass::Private);
        assert_eq!(DnsClass::from_code(-20), DnsClass::Invalid);
        assert_eq!(DnsClass::from_code(70000), DnsClass::Invalid);
        assert_eq!(DnsClass::Internet.to_string(), "internet");
        assert_eq!(DnsClass::Private.to_string(), "priv");
    }

    #[test]
    fn synthetic_categories_have_no_code() {
        assert_eq!(DnsType::Unassigned.code(), None);
        assert_eq!(DnsType::Private.code(), None);
        assert_eq!(DnsClass::Invalid.code(), None);
        assert_eq!(DnsClass::Reserved.code(), Some(0));
    }

    proptest! {
        #[test]
        fn named_type_codes_map_back(code: u16) {
            if let Some(dns_type) = DnsType::named(code) {
                prop_assert_eq!(DnsType::from_code(code.into()), dns_type);
                prop_assert_eq!(dns_type.code(), Some(code));
            }
        }

        #[test]
        fn private_range(code in PRIVATE_USE_START..=PRIVATE_USE_END) {
            prop_assert_eq!(DnsType::from_code(code), DnsType::Private);
            prop_assert_eq!(DnsClass::from_code(code), DnsClass::Private);
        }

        #[test]
        fn out_of_range_is_invalid(code in prop_oneof![i64::MIN..0, 65536..i64::MAX]) {
            prop_assert_eq!(DnsType::from_code(code), DnsType::Invalid);
            prop_assert_eq!(DnsClass::from_code(code), DnsClass::Invalid);
        }
    }
}
