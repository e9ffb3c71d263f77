use base64::{engine::general_purpose::STANDARD, DecodeError, Engine as _};

use crate::error::Error;

/// Decoded private key text, as stored base64-encoded in the secret.
pub(crate) struct KeyPem(Vec<u8>);

impl KeyPem {
    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for KeyPem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeyPem(<redacted>)")
    }
}

/// Decode standard (padded) base64 into key material.
///
/// Line breaks are skipped so wrapped secrets decode the same as single-line ones. Any other
/// non-alphabet byte fails with a [`base64::DecodeError`] whose offset counts from the start of
/// `encoded`, line breaks included.
pub(crate) fn decode_key_pem(encoded: &str) -> Result<KeyPem, Error> {
    let (positions, stripped): (Vec<usize>, Vec<u8>) = encoded
        .bytes()
        .enumerate()
        .filter(|(_, b)| *b != b'\n' && *b != b'\r')
        .unzip();

    let original_offset = |offset: usize| positions.get(offset).copied().unwrap_or(offset);
    let decoded = STANDARD.decode(stripped).map_err(|e| match e {
        DecodeError::InvalidByte(offset, byte) => {
            DecodeError::InvalidByte(original_offset(offset), byte)
        }
        DecodeError::InvalidLastSymbol(offset, byte) => {
            DecodeError::InvalidLastSymbol(original_offset(offset), byte)
        }
        other => other,
    })?;

    Ok(KeyPem(decoded))
}

#[cfg(test)]
mod tests {
    use super::*;

    const APP_KEY_PEM: &str = include_str!("../testdata/app_key.pem");
    const APP_KEY_PEM_ENCODED: &str = include_str!("../testdata/app_key_pem_encoded.txt");

    #[test]
    fn decodes_encoded_fixture() {
        let pem = decode_key_pem(APP_KEY_PEM_ENCODED).unwrap();
        assert_eq!(pem.as_bytes(), APP_KEY_PEM.as_bytes());
    }

    #[test]
    fn decodes_arbitrary_bytes() {
        let input: Vec<u8> = (0..=255u8).chain([0, 0, 1]).collect();
        let encoded = STANDARD.encode(&input);
        assert_eq!(decode_key_pem(&encoded).unwrap().as_bytes(), input.as_slice());
    }

    #[test]
    fn skips_line_breaks() {
        let encoded = STANDARD.encode(APP_KEY_PEM);
        let wrapped = encoded
            .as_bytes()
            .chunks(64)
            .map(|line| std::str::from_utf8(line).unwrap())
            .collect::<Vec<_>>()
            .join("\r\n");
        assert_eq!(
            decode_key_pem(&wrapped).unwrap().as_bytes(),
            APP_KEY_PEM.as_bytes()
        );
    }

    #[test]
    fn reports_offending_offset() {
        let err = decode_key_pem("dummy-secret-id").unwrap_err();
        assert!(
            matches!(
                err,
                Error::Base64Decode(base64::DecodeError::InvalidByte(5, b'-'))
            ),
            "{err:?}"
        );
        assert!(err.to_string().contains("offset 5"), "{err}");
    }

    #[test]
    fn offset_counts_skipped_line_breaks() {
        let err = decode_key_pem("QUJD\nQU-E").unwrap_err();
        assert!(
            matches!(err, Error::Base64Decode(DecodeError::InvalidByte(7, b'-'))),
            "{err:?}"
        );

        let err = decode_key_pem("QUJD\r\nQUJD\r\nQ*JD").unwrap_err();
        assert!(
            matches!(err, Error::Base64Decode(DecodeError::InvalidByte(13, b'*'))),
            "{err:?}"
        );
    }

    #[test]
    fn debug_is_redacted() {
        let pem = decode_key_pem(APP_KEY_PEM_ENCODED).unwrap();
        assert_eq!(format!("{pem:?}"), "KeyPem(<redacted>)");
    }
}
