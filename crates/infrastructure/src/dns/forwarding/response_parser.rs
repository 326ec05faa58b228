use hickory_proto::op::Message;
use hickory_proto::rr::RData;
use std::net::IpAddr;

/// Extracts typed data from upstream answers.
pub struct ResponseParser;

impl ResponseParser {
    /// A and AAAA answers, in answer order.
    pub fn addresses(message: &Message) -> Vec<IpAddr> {
        message
            .answers()
            .iter()
            .filter_map(|record| match record.data() {
                Some(RData::A(a)) => Some(IpAddr::V4(a.0)),
                Some(RData::AAAA(aaaa)) => Some(IpAddr::V6(aaaa.0)),
                _ => None,
            })
            .collect()
    }

    /// One byte string per TXT answer, with its character-strings concatenated.
    pub fn txt_payloads(message: &Message) -> Vec<Vec<u8>> {
        message
            .answers()
            .iter()
            .filter_map(|record| match record.data() {
                Some(RData::TXT(txt)) => Some(
                    txt.txt_data()
                        .iter()
                        .flat_map(|chunk| chunk.iter().copied())
                        .collect(),
                ),
                _ => None,
            })
            .collect()
    }
}
