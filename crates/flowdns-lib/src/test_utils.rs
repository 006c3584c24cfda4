use std::net::{Ipv4Addr, Ipv6Addr};

use prop::strategy::Union;
use proptest::collection::vec;
use proptest::prelude::*;

use crate::{Question, ResourceData, ResourceRecord};

prop_compose! {
    pub fn arb_question()(qname in arb_qname(), qtype: u16, qclass: u16) -> Question {
        Question { qname, qtype, qclass }
    }
}

prop_compose! {
    pub fn arb_resource_record()(
        name in arb_qname(),
        resource_data in arb_resource_data(),
        class: u16,
        ttl: u32
    ) -> ResourceRecord {
        ResourceRecord { name, class, ttl, resource_data }
    }
}

pub fn arb_resource_data() -> impl Strategy<Value = ResourceData> {
    let variants = vec![
        vec(any::<u8>(), 0..100)
            .prop_map(|rdata| ResourceData::Unknown {
                // The reserved TYPE never gets a dedicated decoder
                rtype: 65535,
                rdata,
            })
            .boxed(),
        any::<Ipv4Addr>()
            .prop_map(|address| ResourceData::A { address })
            .boxed(),
        any::<Ipv6Addr>()
            .prop_map(|address| ResourceData::Aaaa { address })
            .boxed(),
        arb_qname()
            .prop_map(|ns_domain_name| ResourceData::Ns { ns_domain_name })
            .boxed(),
        arb_qname()
            .prop_map(|cname| ResourceData::Cname { cname })
            .boxed(),
        arb_qname()
            .prop_map(|ptr_domain_name| ResourceData::Ptr { ptr_domain_name })
            .boxed(),
        (any::<u16>(), arb_qname())
            .prop_map(|(preference, exchange)| ResourceData::Mx {
                preference,
                exchange,
            })
            .boxed(),
        vec(vec(any::<u8>(), 0..64), 0..4)
            .prop_map(|strings| ResourceData::Txt { strings })
            .boxed(),
        (arb_qname(), arb_qname(), any::<[u32; 5]>())
            .prop_map(|(mname, rname, [serial, refresh, retry, expire, minimum])| {
                ResourceData::Soa {
                    mname,
                    rname,
                    serial,
                    refresh,
                    retry,
                    expire,
                    minimum,
                }
            })
            .boxed(),
        (any::<[u16; 3]>(), arb_qname())
            .prop_map(|([priority, weight, port], target)| ResourceData::Srv {
                priority,
                weight,
                port,
                target,
            })
            .boxed(),
    ];

    Union::new(variants)
}

fn arb_qname() -> impl Strategy<Value = String> {
    proptest::string::string_regex(r"(([a-z0-9][a-z0-9-]{0,62}\.){1,4}[a-z]{2,63})|")
        .expect("regex should be valid")
}
