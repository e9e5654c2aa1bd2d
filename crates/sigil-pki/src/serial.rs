//! Certificate serial numbers.

use rand::Rng;
use x509_cert::serial_number::SerialNumber;

use crate::error::PkiError;

/// RFC 5280 caps serials at 20 octets.
const SERIAL_LEN: usize = 20;

/// A freshly allocated serial: the DER value and its lowercase hex form.
#[derive(Debug, Clone)]
pub struct Serial {
    pub number: SerialNumber,
    pub hex: String,
}

/// Allocate a random positive 20-octet serial.
///
/// Uniqueness within a CA is enforced by the store, not here.
pub fn generate_serial() -> Result<Serial, PkiError> {
    let mut bytes: [u8; SERIAL_LEN] = rand::rng().random();
    bytes[0] &= 0x7f;
    if bytes[0] == 0 {
        bytes[0] = 0x01;
    }

    let number = SerialNumber::new(&bytes)?;
    Ok(Serial {
        number,
        hex: hex::encode(bytes),
    })
}
