//! A2S packet encoding and decoding.
//!
//! Only single-packet replies are understood. Split replies (header -2)
//! are reported as malformed.

use bytes::Buf;
use sentinel_common::PlayerInfo;

use crate::error::QueryError;

const SINGLE_PACKET: i32 = -1;
const SPLIT_PACKET: i32 = -2;

const A2S_INFO: u8 = 0x54;
const A2S_PLAYER: u8 = 0x55;
const S2C_CHALLENGE: u8 = 0x41;
const INFO_RESPONSE: u8 = 0x49;
const PLAYER_RESPONSE: u8 = 0x44;

const INFO_PAYLOAD: &[u8] = b"Source Engine Query\0";
const NO_CHALLENGE: [u8; 4] = [0xFF; 4];

/// A reply is either the payload or a challenge to echo back
#[derive(Debug, Clone, PartialEq)]
pub enum Reply<T> {
    Challenge([u8; 4]),
    Payload(T),
}

/// Decoded A2S_INFO body (fields after `vac` are ignored)
#[derive(Debug, Clone, PartialEq)]
pub struct InfoResponse {
    pub protocol: u8,
    pub name: String,
    pub map: String,
    pub folder: String,
    pub game: String,
    pub app_id: i16,
    pub players: u8,
    pub max_players: u8,
    pub bots: u8,
}

pub fn info_request(challenge: Option<[u8; 4]>) -> Vec<u8> {
    let mut packet = Vec::with_capacity(29);
    packet.extend_from_slice(&SINGLE_PACKET.to_le_bytes());
    packet.push(A2S_INFO);
    packet.extend_from_slice(INFO_PAYLOAD);
    if let Some(challenge) = challenge {
        packet.extend_from_slice(&challenge);
    }
    packet
}

pub fn player_request(challenge: Option<[u8; 4]>) -> Vec<u8> {
    let mut packet = Vec::with_capacity(9);
    packet.extend_from_slice(&SINGLE_PACKET.to_le_bytes());
    packet.push(A2S_PLAYER);
    packet.extend_from_slice(&challenge.unwrap_or(NO_CHALLENGE));
    packet
}

pub fn parse_info(mut buf: &[u8]) -> Result<Reply<InfoResponse>, QueryError> {
    match read_kind(&mut buf)? {
        S2C_CHALLENGE => Ok(Reply::Challenge(read_challenge(&mut buf)?)),
        INFO_RESPONSE => {
            let info = InfoResponse {
                protocol: read_u8(&mut buf)?,
                name: read_cstring(&mut buf)?,
                map: read_cstring(&mut buf)?,
                folder: read_cstring(&mut buf)?,
                game: read_cstring(&mut buf)?,
                app_id: read_i16(&mut buf)?,
                players: read_u8(&mut buf)?,
                max_players: read_u8(&mut buf)?,
                bots: read_u8(&mut buf)?,
            };
            Ok(Reply::Payload(info))
        }
        other => Err(QueryError::Malformed(format!(
            "unexpected info reply type 0x{:02X}",
            other
        ))),
    }
}

pub fn parse_players(mut buf: &[u8]) -> Result<Reply<Vec<PlayerInfo>>, QueryError> {
    match read_kind(&mut buf)? {
        S2C_CHALLENGE => Ok(Reply::Challenge(read_challenge(&mut buf)?)),
        PLAYER_RESPONSE => {
            let count = read_u8(&mut buf)?;
            let mut players = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let _index = read_u8(&mut buf)?;
                let name = read_cstring(&mut buf)?;
                let score = read_i32(&mut buf)?;
                let time_secs = read_f32(&mut buf)?;
                players.push(PlayerInfo {
                    name,
                    score,
                    time_secs,
                });
            }
            Ok(Reply::Payload(players))
        }
        other => Err(QueryError::Malformed(format!(
            "unexpected player reply type 0x{:02X}",
            other
        ))),
    }
}

fn read_kind(buf: &mut &[u8]) -> Result<u8, QueryError> {
    match read_i32(buf)? {
        SINGLE_PACKET => read_u8(buf),
        SPLIT_PACKET => Err(QueryError::Malformed(
            "split replies are not supported".to_string(),
        )),
        other => Err(QueryError::Malformed(format!("bad packet header {}", other))),
    }
}

fn ensure(buf: &&[u8], len: usize) -> Result<(), QueryError> {
    if buf.remaining() < len {
        return Err(QueryError::Malformed(format!(
            "truncated packet: wanted {} bytes, {} left",
            len,
            buf.remaining()
        )));
    }
    Ok(())
}

fn read_u8(buf: &mut &[u8]) -> Result<u8, QueryError> {
    ensure(buf, 1)?;
    Ok(buf.get_u8())
}

fn read_i16(buf: &mut &[u8]) -> Result<i16, QueryError> {
    ensure(buf, 2)?;
    Ok(buf.get_i16_le())
}

fn read_i32(buf: &mut &[u8]) -> Result<i32, QueryError> {
    ensure(buf, 4)?;
    Ok(buf.get_i32_le())
}

fn read_f32(buf: &mut &[u8]) -> Result<f32, QueryError> {
    ensure(buf, 4)?;
    Ok(buf.get_f32_le())
}

fn read_challenge(buf: &mut &[u8]) -> Result<[u8; 4], QueryError> {
    ensure(buf, 4)?;
    let mut challenge = [0u8; 4];
    buf.copy_to_slice(&mut challenge);
    Ok(challenge)
}

fn read_cstring(buf: &mut &[u8]) -> Result<String, QueryError> {
    let end = buf
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| QueryError::Malformed("unterminated string".to_string()))?;
    let text = String::from_utf8_lossy(&buf[..end]).into_owned();
    buf.advance(end + 1);
    Ok(text)
}

/// Builders for fake server replies, shared by the client tests
#[cfg(test)]
pub(crate) mod fixtures {
    pub fn challenge(value: [u8; 4]) -> Vec<u8> {
        let mut packet = vec![0xFF, 0xFF, 0xFF, 0xFF, 0x41];
        packet.extend_from_slice(&value);
        packet
    }

    pub fn info(name: &str, map: &str, game: &str, players: u8, max_players: u8) -> Vec<u8> {
        let mut packet = vec![0xFF, 0xFF, 0xFF, 0xFF, 0x49, 17];
        for text in [name, map, "arma", game] {
            packet.extend_from_slice(text.as_bytes());
            packet.push(0);
        }
        packet.extend_from_slice(&0i16.to_le_bytes());
        packet.extend_from_slice(&[players, max_players, 0, b'd', b'w', 0, 1]);
        packet
    }

    pub fn players(names: &[&str]) -> Vec<u8> {
        let mut packet = vec![0xFF, 0xFF, 0xFF, 0xFF, 0x44, names.len() as u8];
        for (index, name) in names.iter().enumerate() {
            packet.push(index as u8);
            packet.extend_from_slice(name.as_bytes());
            packet.push(0);
            packet.extend_from_slice(&10i32.to_le_bytes());
            packet.extend_from_slice(&120.5f32.to_le_bytes());
        }
        packet
    }
}
