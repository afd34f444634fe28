use std::fmt;

use der::asn1::Uint;
use der::{Decode, Encode};

use crate::infra::error::{SigningError, SigningResult};

/// Length of one SM2 signature scalar.
const SCALAR_LEN: usize = 32;

/// SM2 signature value.
///
/// Stored as the DER `SEQUENCE { r INTEGER, s INTEGER }` form that legacy
/// producers write and certificates carry. A raw 64-byte `r || s` value is
/// accepted on input.
#[derive(Clone, Eq, PartialEq)]
pub struct Sm2SignatureValue {
    der: Box<[u8]>,
}

impl Sm2SignatureValue {
    /// Build from the fixed-width `r || s` form.
    pub fn from_raw(raw: &[u8]) -> SigningResult<Self> {
        if raw.len() != 2 * SCALAR_LEN {
            return Err(SigningError::CryptographicError(format!(
                "SM2 signature must be {} bytes, got {}",
                2 * SCALAR_LEN,
                raw.len()
            )));
        }
        let r = Uint::new(&raw[..SCALAR_LEN])?;
        let s = Uint::new(&raw[SCALAR_LEN..])?;
        let der = vec![r, s].to_der()?;
        Ok(Self {
            der: der.into_boxed_slice(),
        })
    }

    /// Accept either DER or raw encoding, normalising to DER.
    pub fn from_bytes(bytes: &[u8]) -> SigningResult<Self> {
        if Self::parse_der(bytes).is_ok() {
            return Ok(Self {
                der: bytes.to_vec().into_boxed_slice(),
            });
        }
        Self::from_raw(bytes)
    }

    #[must_use]
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    /// Fixed-width `r || s`, as consumed by the signature backend.
    pub fn to_raw(&self) -> SigningResult<[u8; 64]> {
        let (r, s) = Self::parse_der(&self.der)?;
        let mut out = [0u8; 2 * SCALAR_LEN];
        left_pad_into(r.as_bytes(), &mut out[..SCALAR_LEN])?;
        left_pad_into(s.as_bytes(), &mut out[SCALAR_LEN..])?;
        Ok(out)
    }

    fn parse_der(bytes: &[u8]) -> SigningResult<(Uint, Uint)> {
        let mut ints = Vec::<Uint>::from_der(bytes)?;
        if ints.len() != 2 {
            return Err(SigningError::CryptographicError(format!(
                "SM2 signature must hold 2 integers, found {}",
                ints.len()
            )));
        }
        let s = ints.pop().ok_or_else(|| {
            SigningError::CryptographicError("missing s component".to_string())
        })?;
        let r = ints.pop().ok_or_else(|| {
            SigningError::CryptographicError("missing r component".to_string())
        })?;
        Ok((r, s))
    }
}

fn left_pad_into(value: &[u8], out: &mut [u8]) -> SigningResult<()> {
    if value.len() > out.len() {
        return Err(SigningError::CryptographicError(format!(
            "signature scalar is {} bytes, expected at most {}",
            value.len(),
            out.len()
        )));
    }
    let offset = out.len() - value.len();
    out[offset..].copy_from_slice(value);
    Ok(())
}

impl fmt::Debug for Sm2SignatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sm2SignatureValue(len={})", self.der.len())
    }
}
