use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use base64::{
    Engine as _, alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig, general_purpose},
};
use thiserror::Error;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes192CbcEnc = cbc::Encryptor<aes::Aes192>;
type Aes192CbcDec = cbc::Decryptor<aes::Aes192>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const BLOCK_SIZE: usize = 16;

const LENIENT: GeneralPurposeConfig = GeneralPurposeConfig::new()
    .with_decode_padding_mode(DecodePaddingMode::Indifferent)
    .with_decode_allow_trailing_bits(true);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid key length {0}, expected 16, 24 or 32 bytes")]
    InvalidKeyLength(usize),
    #[error("invalid iv length {0}, expected 16 bytes")]
    InvalidIvLength(usize),
    #[error("bad padding or truncated ciphertext")]
    Padding,
    #[error("keystream key is empty")]
    EmptyKey,
    #[error("invalid hex key: {0}")]
    InvalidHexKey(String),
    #[error("decoded payload is not valid utf-8")]
    Utf8,
}

/// Decodes base64 in either the standard or the url-safe alphabet, with or
/// without padding. ASCII whitespace is ignored.
pub fn decode_base64(input: &str) -> Result<Vec<u8>, CodecError> {
    let cleaned: String = input
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    let decoded = if cleaned.contains(['-', '_']) {
        URL_SAFE_LENIENT.decode(&cleaned)?
    } else {
        STANDARD_LENIENT.decode(&cleaned)?
    };

    Ok(decoded)
}

fn decrypt_with<C>(key: &[u8], iv: &[u8], buffer: &mut [u8]) -> Result<Vec<u8>, CodecError>
where
    C: BlockDecryptMut + KeyIvInit,
{
    let plaintext = C::new_from_slices(key, iv)
        .map_err(|_| CodecError::InvalidKeyLength(key.len()))?
        .decrypt_padded_mut::<Pkcs7>(buffer)
        .map_err(|_| CodecError::Padding)?;

    Ok(plaintext.to_vec())
}

fn encrypt_with<C>(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CodecError>
where
    C: BlockEncryptMut + KeyIvInit,
{
    let pos = plaintext.len();
    let mut buffer = vec![0_u8; pos + BLOCK_SIZE];
    buffer[..pos].copy_from_slice(plaintext);

    let ciphertext = C::new_from_slices(key, iv)
        .map_err(|_| CodecError::InvalidKeyLength(key.len()))?
        .encrypt_padded_mut::<Pkcs7>(&mut buffer, pos)
        .map_err(|_| CodecError::Padding)?;

    Ok(ciphertext.to_vec())
}

/// Decrypts a base64 AES-CBC payload with PKCS#7 padding. The key length
/// picks AES-128, AES-192 or AES-256.
pub fn decrypt_block(ciphertext: &str, key: &[u8], iv: &[u8]) -> Result<Vec<u8>, CodecError> {
    if iv.len() != BLOCK_SIZE {
        return Err(CodecError::InvalidIvLength(iv.len()));
    }

    let mut buffer = decode_base64(ciphertext)?;
    trace!("decoded {} ciphertext bytes", buffer.len());

    match key.len() {
        16 => decrypt_with::<Aes128CbcDec>(key, iv, &mut buffer),
        24 => decrypt_with::<Aes192CbcDec>(key, iv, &mut buffer),
        32 => decrypt_with::<Aes256CbcDec>(key, iv, &mut buffer),
        len => Err(CodecError::InvalidKeyLength(len)),
    }
}

/// Same as [`decrypt_block`], requiring the plaintext to be utf-8.
pub fn decrypt_block_to_string(
    ciphertext: &str,
    key: &[u8],
    iv: &[u8],
) -> Result<String, CodecError> {
    let bytes = decrypt_block(ciphertext, key, iv)?;
    String::from_utf8(bytes).map_err(|_| CodecError::Utf8)
}

/// Inverse of [`decrypt_block`], producing padded standard base64.
pub fn encrypt_block(plaintext: &[u8], key: &[u8], iv: &[u8]) -> Result<String, CodecError> {
    if iv.len() != BLOCK_SIZE {
        return Err(CodecError::InvalidIvLength(iv.len()));
    }

    let ciphertext = match key.len() {
        16 => encrypt_with::<Aes128CbcEnc>(key, iv, plaintext)?,
        24 => encrypt_with::<Aes192CbcEnc>(key, iv, plaintext)?,
        32 => encrypt_with::<Aes256CbcEnc>(key, iv, plaintext)?,
        len => return Err(CodecError::InvalidKeyLength(len)),
    };

    Ok(general_purpose::STANDARD.encode(ciphertext))
}

/// XORs every byte with the key, repeating the key as needed.
///
/// `key` must not be empty; use [`decode_xor_payload`] when the key comes
/// from untrusted input.
pub fn xor_keystream(cipher: &[u8], key: &[u8]) -> Vec<u8> {
    debug_assert!(!key.is_empty(), "keystream key must not be empty");

    cipher
        .iter()
        .zip(key.iter().cycle())
        .map(|(byte, k)| byte ^ k)
        .collect()
}

/// Parses a hex token two characters at a time. An odd trailing character is
/// read as a single hex digit.
pub fn parse_hex_key(token: &str) -> Result<Vec<u8>, CodecError> {
    if token.is_empty() || !token.is_ascii() {
        return Err(CodecError::InvalidHexKey(token.to_string()));
    }

    token
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| CodecError::InvalidHexKey(token.to_string()))
        })
        .collect()
}

/// Decodes an image payload obfuscated with a hex keystream token.
pub fn decode_xor_payload(cipher: &[u8], token: &str) -> Result<Vec<u8>, CodecError> {
    let key = parse_hex_key(token)?;
    if key.is_empty() {
        return Err(CodecError::EmptyKey);
    }

    Ok(xor_keystream(cipher, &key))
}
