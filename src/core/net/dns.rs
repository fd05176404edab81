//! Captive DNS responder
//!
//! Answers every standard query with a single A record pointing at the access
//! point, so clients resolve any name to the provisioning page.

use core::net::Ipv4Addr;

const HEADER_SIZE: usize = 12;
const ANSWER_SIZE: usize = 16;

const FLAG_RESPONSE: u8 = 0x80;
const FLAG_AUTHORITATIVE: u8 = 0x04;
const FLAG_RECURSION_DESIRED: u8 = 0x01;
const FLAG_RECURSION_AVAILABLE: u8 = 0x80;
const OPCODE_MASK: u8 = 0x78;

const TYPE_A: u16 = 1;
const TYPE_ANY: u16 = 255;
const CLASS_IN: u16 = 1;

/// TTL of captive answers, in seconds
const ANSWER_TTL: u32 = 60;

/// Compression pointer to the question name at offset 12
const NAME_POINTER: [u8; 2] = [0xC0, 0x0C];

/// First question of a query
#[derive(Debug, PartialEq, Eq)]
pub struct DnsQuestion {
    /// Offset just past the question section
    pub end: usize,
    pub qtype: u16,
    pub qclass: u16,
}

fn read_u16(packet: &[u8], offset: usize) -> Option<u16> {
    let bytes = packet.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Parse the header and first question of a standard query.
///
/// Returns `None` for responses, non-query opcodes, packets without a
/// question and anything truncated.
pub fn parse_query(packet: &[u8]) -> Option<DnsQuestion> {
    if packet.len() < HEADER_SIZE {
        return None;
    }
    if packet[2] & FLAG_RESPONSE != 0 || packet[2] & OPCODE_MASK != 0 {
        return None;
    }
    if read_u16(packet, 4)? == 0 {
        return None;
    }

    let mut offset = HEADER_SIZE;
    loop {
        let len = usize::from(*packet.get(offset)?);
        if len == 0 {
            offset += 1;
            break;
        }
        // Labels only, queries never compress the question
        if len & 0xC0 != 0 {
            return None;
        }
        offset += 1 + len;
    }

    let qtype = read_u16(packet, offset)?;
    let qclass = read_u16(packet, offset + 2)?;
    Some(DnsQuestion {
        end: offset + 4,
        qtype,
        qclass,
    })
}

/// Build the captive reply to `query` into `out`.
///
/// A and ANY questions get one A record with `address`. Other types get an
/// empty NOERROR reply. Returns the reply length, or `None` when the packet
/// must be dropped or `out` is too small.
pub fn build_captive_response(query: &[u8], address: Ipv4Addr, out: &mut [u8]) -> Option<usize> {
    let question = parse_query(query)?;
    let answer = matches!(question.qtype, TYPE_A | TYPE_ANY);
    let len = question.end + if answer { ANSWER_SIZE } else { 0 };
    if out.len() < len {
        return None;
    }

    out[..question.end].copy_from_slice(&query[..question.end]);
    out[2] = FLAG_RESPONSE | FLAG_AUTHORITATIVE | (query[2] & FLAG_RECURSION_DESIRED);
    out[3] = FLAG_RECURSION_AVAILABLE;
    // One question, at most one answer, no authority or additional records
    out[4..6].copy_from_slice(&1u16.to_be_bytes());
    out[6..8].copy_from_slice(&u16::from(answer).to_be_bytes());
    out[8..12].fill(0);

    if answer {
        let record = &mut out[question.end..len];
        record[0..2].copy_from_slice(&NAME_POINTER);
        record[2..4].copy_from_slice(&TYPE_A.to_be_bytes());
        record[4..6].copy_from_slice(&CLASS_IN.to_be_bytes());
        record[6..10].copy_from_slice(&ANSWER_TTL.to_be_bytes());
        record[10..12].copy_from_slice(&4u16.to_be_bytes());
        record[12..16].copy_from_slice(&address.octets());
    }

    Some(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    const AP: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);

    fn query(qtype: u16) -> std::vec::Vec<u8> {
        let mut packet = std::vec![0xAB, 0xCD, 0x01, 0x00, 0, 1, 0, 0, 0, 0, 0, 0];
        for label in ["connectivitycheck", "example", "com"] {
            packet.push(u8::try_from(label.len()).unwrap());
            packet.extend_from_slice(label.as_bytes());
        }
        packet.push(0);
        packet.extend_from_slice(&qtype.to_be_bytes());
        packet.extend_from_slice(&CLASS_IN.to_be_bytes());
        packet
    }

    #[test]
    fn a_query_resolves_to_access_point() {
        let request = query(TYPE_A);
        let mut out = [0u8; 512];
        let len = build_captive_response(&request, AP, &mut out).unwrap();

        assert_eq!(len, request.len() + ANSWER_SIZE);
        assert_eq!(&out[0..2], &[0xAB, 0xCD]);
        assert_eq!(out[2] & FLAG_RESPONSE, FLAG_RESPONSE);
        assert_eq!(out[2] & FLAG_RECURSION_DESIRED, FLAG_RECURSION_DESIRED);
        assert_eq!(out[3] & 0x0F, 0);
        assert_eq!(read_u16(&out, 6), Some(1));
        assert_eq!(&out[len - 4..len], &[192, 168, 4, 1]);
        assert_eq!(&out[request.len()..request.len() + 2], &NAME_POINTER);
    }

    #[test]
    fn aaaa_query_gets_empty_answer() {
        let request = query(28);
        let mut out = [0u8; 512];
        let len = build_captive_response(&request, AP, &mut out).unwrap();

        assert_eq!(len, request.len());
        assert_eq!(read_u16(&out, 6), Some(0));
        assert_eq!(out[3] & 0x0F, 0);
    }

    #[test]
    fn responses_and_garbage_are_dropped() {
        let mut out = [0u8; 512];
        let mut response = query(TYPE_A);
        response[2] |= FLAG_RESPONSE;
        assert!(build_captive_response(&response, AP, &mut out).is_none());

        let truncated = &query(TYPE_A)[..20];
        assert!(build_captive_response(truncated, AP, &mut out).is_none());
        assert!(build_captive_response(&[0u8; 4], AP, &mut out).is_none());
    }

    #[test]
    fn small_output_buffer_is_rejected() {
        let request = query(TYPE_A);
        let mut out = [0u8; 16];
        assert!(build_captive_response(&request, AP, &mut out).is_none());
    }
}
