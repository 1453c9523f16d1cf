use crate::*;

use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};
use aes::{
    Aes128, Aes192, Aes256, Block,
    cipher::{BlockDecrypt, BlockEncrypt, KeyInit},
};

const BLOCK_SIZE: usize = 16;

/// A block cipher chaining mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncryptionMode {
    Cbc,
    Cfb,
    Ecb,
    Ofb,
}

impl EncryptionMode {
    pub fn name(&self) -> &'static str {
        match self {
            EncryptionMode::Cbc => "cbc",
            EncryptionMode::Cfb => "cfb",
            EncryptionMode::Ecb => "ecb",
            EncryptionMode::Ofb => "ofb",
        }
    }
}

impl Display for EncryptionMode {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> std::fmt::Result {
        fmt.write_str(self.name())
    }
}

impl FromStr for EncryptionMode {
    type Err = Error;
    fn from_str(s: &str) -> Result<EncryptionMode> {
        match s.to_ascii_lowercase().as_str() {
            "cbc" => Ok(EncryptionMode::Cbc),
            "cfb" => Ok(EncryptionMode::Cfb),
            "ecb" => Ok(EncryptionMode::Ecb),
            "ofb" => Ok(EncryptionMode::Ofb),
            _ => Err(Error::InvalidArgument(format!(
                "unsupported encryption mode: {:?}", s))),
        }
    }
}

/// Decrypts a stream a piece at a time.
///
/// Each call consumes as many whole blocks as `data` holds and hands back
/// the rest, which the caller prepends to its next piece. Chaining state
/// carries over between calls.
pub trait Decrypter {
    /// Returns `(decrypted, remaining)`.
    fn decrypt(&mut self, data: &[u8]) -> (Vec<u8>, Vec<u8>);
}

enum Cipher {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl Cipher {
    fn new(key: &[u8]) -> Result<Cipher> {
        let ret = match key.len() {
            16 => Aes128::new_from_slice(key).map(Cipher::Aes128),
            24 => Aes192::new_from_slice(key).map(Cipher::Aes192),
            32 => Aes256::new_from_slice(key).map(Cipher::Aes256),
            x => {
                return Err(Error::InvalidArgument(format!(
                    "unsupported AES key size: {} bytes", x)))
            },
        };
        ret.map_err(|x| Error::InvalidArgument(x.to_string()))
    }
    fn encrypt_block(&self, block: &mut [u8]) {
        let block = Block::from_mut_slice(block);
        match self {
            Cipher::Aes128(x) => x.encrypt_block(block),
            Cipher::Aes192(x) => x.encrypt_block(block),
            Cipher::Aes256(x) => x.encrypt_block(block),
        }
    }
    fn decrypt_block(&self, block: &mut [u8]) {
        let block = Block::from_mut_slice(block);
        match self {
            Cipher::Aes128(x) => x.decrypt_block(block),
            Cipher::Aes192(x) => x.decrypt_block(block),
            Cipher::Aes256(x) => x.decrypt_block(block),
        }
    }
}

/// AES in one of the [`EncryptionMode`](enum.EncryptionMode.html)s, with a
/// 128, 192 or 256 bit key.
pub struct AesDecrypter {
    cipher: Cipher,
    mode: EncryptionMode,
    /// IV, then the chaining value of the last block handled.
    chain: [u8; BLOCK_SIZE],
}

impl AesDecrypter {
    /// Fails with `InvalidArgument` for a bad key size, a missing IV in any
    /// mode but ECB, or an IV that is not one block long.
    pub fn new(mode: EncryptionMode, key: &[u8], iv: Option<&[u8]>)
        -> Result<AesDecrypter> {
        let cipher = Cipher::new(key)?;
        let mut chain = [0; BLOCK_SIZE];
        match iv {
            Some(iv) if iv.len() == BLOCK_SIZE => chain.copy_from_slice(iv),
            Some(iv) => {
                return Err(Error::InvalidArgument(format!(
                    "AES initialization vector must be {} bytes, not {}",
                    BLOCK_SIZE, iv.len())))
            },
            None if mode == EncryptionMode::Ecb => (),
            None => {
                return Err(Error::InvalidArgument(format!(
                    "AES in {} mode needs an initialization vector", mode)))
            },
        }
        Ok(AesDecrypter { cipher, mode, chain })
    }
    pub fn mode(&self) -> EncryptionMode { self.mode }
}

impl Decrypter for AesDecrypter {
    fn decrypt(&mut self, data: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let whole = data.len() - data.len() % BLOCK_SIZE;
        let mut out = data[..whole].to_vec();
        for block in out.chunks_exact_mut(BLOCK_SIZE) {
            let mut ciphertext = [0; BLOCK_SIZE];
            ciphertext.copy_from_slice(block);
            match self.mode {
                EncryptionMode::Ecb => self.cipher.decrypt_block(block),
                EncryptionMode::Cbc => {
                    self.cipher.decrypt_block(block);
                    xor(block, &self.chain);
                    self.chain = ciphertext;
                },
                EncryptionMode::Cfb => {
                    let mut keystream = self.chain;
                    self.cipher.encrypt_block(&mut keystream);
                    xor(block, &keystream);
                    self.chain = ciphertext;
                },
                EncryptionMode::Ofb => {
                    self.cipher.encrypt_block(&mut self.chain);
                    xor(block, &self.chain);
                },
            }
        }
        (out, data[whole..].to_vec())
    }
}

fn xor(block: &mut [u8], with: &[u8; BLOCK_SIZE]) {
    for (a, b) in block.iter_mut().zip(with.iter()) {
        *a ^= b;
    }
}
