#[cfg(test)]
pub(crate) mod test_utils;

mod buf;
mod classification;
mod dns_header;
mod error;
mod question;
mod resource_record;

pub use buf::{ByteBuf, EncodeToBuf, FromBuf};
pub use classification::{
    DnsClass, DnsType, PRIVATE_USE_END, PRIVATE_USE_START, RESERVED_SENTINEL,
};
pub use dns_header::{DnsHeader, QueryOpcode, ResponseCode, HEADER_LENGTH};
pub use error::MessageError;
pub use question::Question;
pub use resource_record::{ResourceData, ResourceRecord};

use anyhow::Context;

/// CLASS IN
pub const IN_CLASS: u16 = 1;

/// Root QNAME plus QTYPE and QCLASS
const MIN_QUESTION_LENGTH: usize = 5;
/// Root NAME plus TYPE, CLASS, TTL and RDLENGTH
const MIN_RR_LENGTH: usize = 11;

/// Capacity for `count` entries that can't be bigger than what is left to read
fn capacity_hint(count: u16, remaining: usize, min_entry_length: usize) -> usize {
    (count as usize).min(remaining / min_entry_length)
}

#[derive(Debug, PartialEq, Eq, Default, Clone)]
pub struct DnsMessage {
    pub header: DnsHeader,
    pub questions: Vec<Question>,
    pub answers: Vec<ResourceRecord>,
    pub authorities: Vec<ResourceRecord>,
    pub additionals: Vec<ResourceRecord>,
}

impl DnsMessage {
    pub fn new() -> Self {
        DnsMessage::default()
    }

    /// Recursive query with a single question
    pub fn query(id: u16, question: Question) -> Self {
        let mut message = DnsMessage::new();
        message.header.id = id;
        message.header.recursion_desired = true;
        message.header.question_count = 1;
        message.questions.push(question);
        message
    }

    /// Encodes the message without name compression.
    ///
    /// Section counts are taken from the sections themselves, not from the header.
    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        let mut buf = ByteBuf::new_empty(None);
        self.encode_to_buf(&mut buf)?;
        Ok(buf.into_inner().into_owned())
    }

    /// `(class, type)` of every question in wire order.
    ///
    /// Callers relaying a single query act on the first entry.
    pub fn question_classes_and_types(&self) -> Result<Vec<(DnsClass, DnsType)>, MessageError> {
        if self.header.question_count == 0 {
            return Err(MessageError::NoQuestion);
        }

        if self.header.question_count > 1 {
            tracing::warn!(
                question_count = self.header.question_count,
                "Found DNS query with more than one question; the first question is used"
            );
        }

        let classes_and_types: Vec<_> = self
            .questions
            .iter()
            .map(|question| (question.dns_class(), question.dns_type()))
            .collect();

        if classes_and_types.is_empty() {
            return Err(MessageError::QuestionParseFailed);
        }

        Ok(classes_and_types)
    }

    /// Answer section rendered as `Name: .., TTL: .., Data: ..` lines
    pub fn answer_strings(&self) -> Vec<String> {
        self.answers.iter().map(ToString::to_string).collect()
    }
}

impl FromBuf for DnsMessage {
    fn from_buf(buf: &mut ByteBuf) -> anyhow::Result<DnsMessage> {
        let header = DnsHeader::from_buf(buf).context("header parsing error")?;

        let mut questions = Vec::with_capacity(capacity_hint(
            header.question_count,
            buf.remaining(),
            MIN_QUESTION_LENGTH,
        ));
        for idx in 0..header.question_count {
            let question = Question::from_buf(buf)
                .with_context(|| format!("question parsing error at idx {}", idx))?;
            questions.push(question);
        }

        let mut sections = [
            (header.answer_rr_count, "answer", Vec::new()),
            (header.authority_rr_count, "authority", Vec::new()),
            (header.additional_rr_count, "additional", Vec::new()),
        ];
        for (count, section, records) in sections.iter_mut() {
            records.reserve(capacity_hint(*count, buf.remaining(), MIN_RR_LENGTH));
            for idx in 0..*count {
                let record = ResourceRecord::from_buf(buf)
                    .with_context(|| format!("{} RR parsing error at idx {}", section, idx))?;
                records.push(record);
            }
        }
        let [(_, _, answers), (_, _, authorities), (_, _, additionals)] = sections;

        Ok(DnsMessage {
            header,
            questions,
            answers,
            authorities,
            additionals,
        })
    }
}

impl EncodeToBuf for DnsMessage {
    fn encode_to_buf(&self, buf: &mut ByteBuf) -> anyhow::Result<()> {
        let mut header = self.header.clone();
        header.question_count =
            u16::try_from(self.questions.len()).context("too many questions")?;
        header.answer_rr_count = u16::try_from(self.answers.len()).context("too many answer RRs")?;
        header.authority_rr_count =
            u16::try_from(self.authorities.len()).context("too many authority RRs")?;
        header.additional_rr_count =
            u16::try_from(self.additionals.len()).context("too many additional RRs")?;
        header.encode_to_buf(buf).context("writing header")?;

        for (idx, question) in self.questions.iter().enumerate() {
            question
                .encode_to_buf(buf)
                .with_context(|| format!("writing question at idx {}", idx))?;
        }

        let sections = [
            ("answer", &self.answers),
            ("authority", &self.authorities),
            ("additional", &self.additionals),
        ];
        for (section, records) in sections {
            for (idx, record) in records.iter().enumerate() {
                record
                    .encode_to_buf(buf)
                    .with_context(|| format!("writing {} RR at idx {}", section, idx))?;
            }
        }

        Ok(())
    }
}

/// Decodes a complete DNS message.
///
/// The returned message owns everything it references, so dropping it releases
/// all of it, including on early-return paths of the caller.
pub fn parse(bytes: &[u8]) -> Result<DnsMessage, MessageError> {
    let mut buf = ByteBuf::new(bytes);
    DnsMessage::from_buf(&mut buf).map_err(MessageError::ParseFailed)
}

pub fn extract_question_classes_and_types(
    bytes: &[u8],
) -> Result<Vec<(DnsClass, DnsType)>, MessageError> {
    parse(bytes)?.question_classes_and_types()
}

pub fn extract_answer_strings(bytes: &[u8]) -> Result<Vec<String>, MessageError> {
    let message = parse(bytes)?;

    if message.answers.is_empty() {
        tracing::info!("DNS reply with no answer: {}", hex(bytes));
    }

    Ok(message.answer_strings())
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{:02x}", byte)).collect()
}
