//! Stateless constructors for every outgoing command frame.
//!
//! Each function here returns the frame *payload* (the bytes that go
//! through `protocol::frame::encode`), starting with the command opcode.
//! Contracts are bit-exact and covered by reference-byte tests below.

use bytes::{BufMut, Bytes, BytesMut};

use super::binio::{append_i32_le, append_u32_le, utf8_padded_or_truncated, utf8_prefix};
use super::command::CommandOpcode;

/// Default client id used by [`app_start`] when the caller doesn't override it.
pub const DEFAULT_CLIENT_ID: &str = "MCore";

/// `appStart(clientId)`. Client id is UTF-8-safe truncated to 5 bytes and
/// not NUL-padded; bytes 2..=7 are reserved ASCII spaces.
#[must_use]
pub fn app_start(client_id: &str) -> Bytes {
    let id = utf8_prefix(client_id, 5);
    let mut buf = BytesMut::with_capacity(2 + 6 + id.len());
    buf.put_u8(CommandOpcode::AppStart as u8);
    buf.put_u8(0x03);
    buf.put_bytes(0x20, 6);
    buf.put_slice(id.as_bytes());
    buf.freeze()
}

/// `setTime(t)`.
#[must_use]
pub fn set_time(timestamp: u32) -> Bytes {
    let mut buf = BytesMut::with_capacity(5);
    buf.put_u8(CommandOpcode::SetTime as u8);
    append_u32_le(&mut buf, timestamp);
    buf.freeze()
}

/// `getTime()`.
#[must_use]
pub fn get_time() -> Bytes {
    Bytes::from_static(&[CommandOpcode::GetTime as u8])
}

/// `setName(n)`. No length prefix, no NUL padding.
#[must_use]
pub fn set_name(name: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(1 + name.len());
    buf.put_u8(CommandOpcode::SetName as u8);
    buf.put_slice(name.as_bytes());
    buf.freeze()
}

/// `setCoordinates(lat, lon)`, 1e6-scaled signed integers plus 4 reserved bytes.
#[must_use]
pub fn set_coordinates(lat: f64, lon: f64) -> Bytes {
    let mut buf = BytesMut::with_capacity(9 + 4);
    buf.put_u8(CommandOpcode::SetCoords as u8);
    append_i32_le(&mut buf, (lat * 1_000_000.0).round() as i32);
    append_i32_le(&mut buf, (lon * 1_000_000.0).round() as i32);
    buf.put_u32_le(0);
    buf.freeze()
}

/// `setRadio(freq_MHz, bw_kHz, sf, cr)`.
#[must_use]
pub fn set_radio(freq_mhz: f64, bw_khz: f64, spreading_factor: u8, coding_rate: u8) -> Bytes {
    let mut buf = BytesMut::with_capacity(10);
    buf.put_u8(CommandOpcode::SetRadio as u8);
    append_u32_le(&mut buf, (freq_mhz * 1000.0).round() as u32);
    append_u32_le(&mut buf, (bw_khz * 1000.0).round() as u32);
    buf.put_u8(spreading_factor);
    buf.put_u8(coding_rate);
    buf.freeze()
}

/// `setTxPower(dbm)`.
#[must_use]
pub fn set_tx_power(dbm: u8) -> Bytes {
    Bytes::from(vec![CommandOpcode::SetTxPower as u8, dbm])
}

/// `sendMessage(to, text, timestamp, attempt)`. `to` is always the 6-byte
/// public-key prefix, padded or truncated regardless of input length.
#[must_use]
pub fn send_message(to_prefix: &[u8], text: &str, timestamp: u32, attempt: u8) -> Bytes {
    let mut prefix = [0u8; 6];
    let n = to_prefix.len().min(6);
    prefix[..n].copy_from_slice(&to_prefix[..n]);

    let mut buf = BytesMut::with_capacity(3 + 4 + 6 + text.len());
    buf.put_u8(CommandOpcode::SendMessage as u8);
    buf.put_u8(0x00);
    buf.put_u8(attempt);
    append_u32_le(&mut buf, timestamp);
    buf.put_slice(&prefix);
    buf.put_slice(text.as_bytes());
    buf.freeze()
}

/// `sendCommand(to, command, ts)`. Same layout as [`send_message`] but with
/// the command text-type marker in the subtype byte.
#[must_use]
pub fn send_command(to_prefix: &[u8], command: &str, timestamp: u32, attempt: u8) -> Bytes {
    let mut prefix = [0u8; 6];
    let n = to_prefix.len().min(6);
    prefix[..n].copy_from_slice(&to_prefix[..n]);

    let mut buf = BytesMut::with_capacity(3 + 4 + 6 + command.len());
    buf.put_u8(CommandOpcode::SendMessage as u8);
    buf.put_u8(0x01);
    buf.put_u8(attempt);
    append_u32_le(&mut buf, timestamp);
    buf.put_slice(&prefix);
    buf.put_slice(command.as_bytes());
    buf.freeze()
}

/// `sendChannelMessage(ch, text, ts)`.
#[must_use]
pub fn send_channel_message(channel: u8, text: &str, timestamp: u32) -> Bytes {
    let mut buf = BytesMut::with_capacity(4 + 4 + text.len());
    buf.put_u8(CommandOpcode::SendChannelMsg as u8);
    buf.put_u8(channel);
    buf.put_u8(0);
    buf.put_u8(0);
    append_u32_le(&mut buf, timestamp);
    buf.put_slice(text.as_bytes());
    buf.freeze()
}

fn pad32(bytes: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let n = bytes.len().min(32);
    out[..n].copy_from_slice(&bytes[..n]);
    out
}

/// `sendLogin(to, password)`.
#[must_use]
pub fn send_login(to: &[u8], password: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(1 + 32 + password.len());
    buf.put_u8(CommandOpcode::SendLogin as u8);
    buf.put_slice(&pad32(to));
    buf.put_slice(password.as_bytes());
    buf.freeze()
}

/// `sendLogout(to)`.
#[must_use]
pub fn send_logout(to: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(33);
    buf.put_u8(CommandOpcode::SendLogout as u8);
    buf.put_slice(&pad32(to));
    buf.freeze()
}

/// `sendStatusRequest(to)`.
#[must_use]
pub fn send_status_request(to: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(33);
    buf.put_u8(CommandOpcode::SendStatusReq as u8);
    buf.put_slice(&pad32(to));
    buf.freeze()
}

/// `getChannel(index)`.
#[must_use]
pub fn get_channel(index: u8) -> Bytes {
    Bytes::from(vec![CommandOpcode::GetChannel as u8, index])
}

/// `setChannel(index, name, secret[16])`.
#[must_use]
pub fn set_channel(index: u8, name: &str, secret: &[u8; 16]) -> Bytes {
    let mut buf = BytesMut::with_capacity(2 + 32 + 16);
    buf.put_u8(CommandOpcode::SetChannel as u8);
    buf.put_u8(index);
    buf.put_slice(&utf8_padded_or_truncated(name, 32));
    buf.put_slice(secret);
    buf.freeze()
}

/// `sendPathDiscovery(to)`.
#[must_use]
pub fn send_path_discovery(to: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(33);
    buf.put_u8(CommandOpcode::PathDiscovery as u8);
    buf.put_slice(&pad32(to));
    buf.freeze()
}

/// `sendTrace(tag, authCode, flags)`.
#[must_use]
pub fn send_trace(tag: u32, auth_code: u32, flags: u8) -> Bytes {
    let mut buf = BytesMut::with_capacity(10);
    buf.put_u8(CommandOpcode::SendTrace as u8);
    append_u32_le(&mut buf, tag);
    append_u32_le(&mut buf, auth_code);
    buf.put_u8(flags);
    buf.freeze()
}

/// `sendAdvertisement(flood)`.
#[must_use]
pub fn send_advertisement(flood: bool) -> Bytes {
    if flood {
        Bytes::from_static(&[CommandOpcode::SendAdvert as u8, 0x01])
    } else {
        Bytes::from_static(&[CommandOpcode::SendAdvert as u8])
    }
}

/// `getContacts(since)`.
#[must_use]
pub fn get_contacts(since: u32) -> Bytes {
    let mut buf = BytesMut::with_capacity(5);
    buf.put_u8(CommandOpcode::GetContacts as u8);
    append_u32_le(&mut buf, since);
    buf.freeze()
}

/// `getMessage()`.
#[must_use]
pub fn get_message() -> Bytes {
    Bytes::from_static(&[CommandOpcode::GetMessage as u8])
}

/// `reboot()`. Firmware requires the literal ASCII suffix `"reboot"`.
#[must_use]
pub fn reboot() -> Bytes {
    let mut buf = BytesMut::with_capacity(1 + 6);
    buf.put_u8(CommandOpcode::Reboot as u8);
    buf.put_slice(b"reboot");
    buf.freeze()
}

/// `getBattery()`.
#[must_use]
pub fn get_battery() -> Bytes {
    Bytes::from_static(&[CommandOpcode::GetBattery as u8])
}

/// `deviceQuery()`.
#[must_use]
pub fn device_query() -> Bytes {
    Bytes::from_static(&[CommandOpcode::DeviceQuery as u8])
}

/// `removeContact(public_key)`.
#[must_use]
pub fn remove_contact(public_key: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(1 + public_key.len());
    buf.put_u8(CommandOpcode::RemoveContact as u8);
    buf.put_slice(public_key);
    buf.freeze()
}

/// `resetPath(public_key)`.
#[must_use]
pub fn reset_path(public_key: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(1 + public_key.len());
    buf.put_u8(CommandOpcode::ResetPath as u8);
    buf.put_slice(public_key);
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scenario 1 from the property-test table: `appStart("MCore")`.
    #[test]
    fn test_app_start_default_client_id() {
        let frame = app_start("MCore");
        assert_eq!(
            &frame[..],
            &[0x01, 0x03, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x4d, 0x43, 0x6f, 0x72, 0x65]
        );
    }

    /// Scenario 2: a long client id is truncated to its first 5 UTF-8 bytes.
    #[test]
    fn test_app_start_truncates_long_client_id() {
        let frame = app_start("LongClientName");
        assert_eq!(frame.len(), 13);
        assert_eq!(&frame[8..13], &[0x4c, 0x6f, 0x6e, 0x67, 0x43]);
    }

    /// `setTime` test vector computed directly from `u32::to_le_bytes`
    /// (see DESIGN.md OQ-6).
    #[test]
    fn test_set_time_reference_vector() {
        let frame = set_time(1_704_067_200);
        let expected_ts = 1_704_067_200u32.to_le_bytes();
        assert_eq!(frame[0], 0x06);
        assert_eq!(&frame[1..5], &expected_ts);
    }

    #[test]
    fn test_set_coordinates_scale() {
        let frame = set_coordinates(37.7749, -122.4194);
        assert_eq!(frame[0], 0x0E);
        let lat = i32::from_le_bytes([frame[1], frame[2], frame[3], frame[4]]);
        let lon = i32::from_le_bytes([frame[5], frame[6], frame[7], frame[8]]);
        assert_eq!(lat, 37_774_900);
        assert_eq!(lon, -122_419_400);
    }

    #[test]
    fn test_send_message_pads_short_prefix() {
        let frame = send_message(&[0xAA, 0xBB], "hi", 1000, 0);
        assert_eq!(frame[0], CommandOpcode::SendMessage as u8);
        assert_eq!(frame[1], 0x00); // private message subtype
        assert_eq!(frame[2], 0); // attempt
        let prefix = &frame[7..13];
        assert_eq!(prefix, &[0xAA, 0xBB, 0, 0, 0, 0]);
        assert_eq!(&frame[13..], b"hi");
    }

    #[test]
    fn test_send_message_truncates_long_prefix() {
        let full_key = [0x11; 32];
        let frame = send_message(&full_key, "hi", 0, 0);
        assert_eq!(&frame[7..13], &full_key[..6]);
    }

    #[test]
    fn test_set_channel_layout() {
        let secret = [0xCDu8; 16];
        let frame = set_channel(0, "General", &secret);
        assert_eq!(frame[0], CommandOpcode::SetChannel as u8);
        assert_eq!(frame[1], 0);
        assert_eq!(&frame[2..9], b"General");
        assert_eq!(&frame[9..34], &[0u8; 25]); // remaining NUL padding
        assert_eq!(&frame[34..50], &secret);
    }

    #[test]
    fn test_send_advertisement_flood_flag() {
        assert_eq!(&send_advertisement(false)[..], &[0x07]);
        assert_eq!(&send_advertisement(true)[..], &[0x07, 0x01]);
    }

    #[test]
    fn test_reboot_requires_literal_suffix() {
        let frame = reboot();
        assert_eq!(&frame[1..], b"reboot");
    }
}
