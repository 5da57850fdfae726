// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

//! Diffie-Hellman key agreement protecting the MAC secret in transit.
//!
//! Integers travel as the base64 of their big-endian two's complement
//! representation ("btwoc"): the shortest byte string with a leading zero
//! byte added when the most significant bit is set.
use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use num_bigint::BigUint;
use rand::RngCore;
use sha2::Digest;

use crate::negotiation::error::NegotiationError;

/// Default OpenID modulus (1024 bit safe prime), big-endian.
const DEFAULT_MODULUS: [u8; 128] = [
    0xdc, 0xf9, 0x3a, 0x0b, 0x88, 0x39, 0x72, 0xec, 0x0e, 0x19, 0x98, 0x9a,
    0xc5, 0xa2, 0xce, 0x31, 0x0e, 0x1d, 0x37, 0x71, 0x7e, 0x8d, 0x95, 0x71,
    0xbb, 0x76, 0x23, 0x73, 0x18, 0x66, 0xe6, 0x1e, 0xf7, 0x5a, 0x2e, 0x27,
    0x89, 0x8b, 0x05, 0x7f, 0x98, 0x91, 0xc2, 0xe2, 0x7a, 0x63, 0x9c, 0x3f,
    0x29, 0xb6, 0x08, 0x14, 0x58, 0x1c, 0xd3, 0xb2, 0xca, 0x39, 0x86, 0xd2,
    0x68, 0x37, 0x05, 0x57, 0x7d, 0x45, 0xc2, 0xe7, 0xe5, 0x2d, 0xc8, 0x1c,
    0x7a, 0x17, 0x18, 0x76, 0xe5, 0xce, 0xa7, 0x4b, 0x14, 0x48, 0xbf, 0xdf,
    0xaf, 0x18, 0x82, 0x8e, 0xfd, 0x25, 0x19, 0xf1, 0x4e, 0x45, 0xe3, 0x82,
    0x66, 0x34, 0xaf, 0x19, 0x49, 0xe5, 0xb5, 0x35, 0xcc, 0x82, 0x9a, 0x48,
    0x3b, 0x8a, 0x76, 0x22, 0x3e, 0x5d, 0x49, 0x0a, 0x25, 0x7f, 0x05, 0xbd,
    0xff, 0x16, 0xf2, 0xfb, 0x22, 0xc5, 0x83, 0xab,
];

/// Default OpenID generator.
const DEFAULT_GENERATOR: u32 = 2;

/// Encode the integer as btwoc.
pub fn btwoc(value: &BigUint) -> Vec<u8> {
    let mut bytes = value.to_bytes_be();
    if bytes.first().is_some_and(|b| b & 0x80 != 0) {
        bytes.insert(0, 0);
    }
    bytes
}

/// Decode the btwoc bytes. Only non-negative integers are used by the
/// protocol.
pub fn unbtwoc(bytes: &[u8]) -> BigUint {
    BigUint::from_bytes_be(bytes)
}

/// Base64 of the btwoc representation.
pub fn to_base64(value: &BigUint) -> String {
    STANDARD.encode(btwoc(value))
}

/// Parse the base64 encoded btwoc integer.
pub fn from_base64(field: &'static str, value: &str) -> Result<BigUint, NegotiationError> {
    let bytes = STANDARD
        .decode(value.trim())
        .map_err(|_| NegotiationError::MalformedField(field))?;
    if bytes.is_empty() || bytes[0] & 0x80 != 0 {
        return Err(NegotiationError::MalformedField(field));
    }
    Ok(unbtwoc(&bytes))
}

/// One side of the key agreement.
pub struct DiffieHellman {
    modulus: BigUint,
    generator: BigUint,
    private: BigUint,
    public: BigUint,
}

impl DiffieHellman {
    /// Fresh key pair for the well-known OpenID parameters.
    pub fn new() -> Self {
        Self::with_params(Self::default_modulus(), BigUint::from(DEFAULT_GENERATOR))
    }

    /// Fresh key pair with the private exponent drawn from `[1, p - 1)`.
    pub fn with_params(modulus: BigUint, generator: BigUint) -> Self {
        let two = BigUint::from(2u32);
        let span = if modulus > two {
            &modulus - &two
        } else {
            BigUint::from(1u32)
        };
        // Extra bytes keep the modulo bias negligible.
        let mut buf = vec![0u8; modulus.to_bytes_be().len() + 8];
        rand::rng().fill_bytes(&mut buf);
        let private = BigUint::from_bytes_be(&buf) % span + 1u32;
        Self::from_private(modulus, generator, private)
    }

    /// Key pair for the given private exponent.
    pub fn from_private(modulus: BigUint, generator: BigUint, private: BigUint) -> Self {
        let public = generator.modpow(&private, &modulus);
        Self {
            modulus,
            generator,
            private,
            public,
        }
    }

    pub fn default_modulus() -> BigUint {
        BigUint::from_bytes_be(&DEFAULT_MODULUS)
    }

    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    pub fn generator(&self) -> &BigUint {
        &self.generator
    }

    pub fn public(&self) -> &BigUint {
        &self.public
    }

    /// Whether the well-known parameters are used, in which case they are not
    /// sent to the provider.
    pub fn uses_default_params(&self) -> bool {
        self.modulus == Self::default_modulus()
            && self.generator == BigUint::from(DEFAULT_GENERATOR)
    }

    /// Shared value `server_public ^ private mod p`.
    pub fn shared_secret(&self, server_public: &BigUint) -> BigUint {
        server_public.modpow(&self.private, &self.modulus)
    }

    /// Recover the MAC key from the provider's encrypted copy.
    ///
    /// The shared value is hashed with `D` and the digest is XOR-ed with
    /// `enc_mac_key`. Both must be of the same length.
    pub fn xor_secret<D: Digest>(
        &self,
        server_public: &BigUint,
        enc_mac_key: &[u8],
    ) -> Result<Vec<u8>, NegotiationError> {
        if *server_public <= BigUint::from(1u32) || *server_public >= self.modulus {
            return Err(NegotiationError::MalformedField("dh_server_public"));
        }
        let hashed = D::digest(btwoc(&self.shared_secret(server_public)));
        if hashed.len() != enc_mac_key.len() {
            return Err(NegotiationError::SecretLengthMismatch {
                expected: hashed.len(),
                got: enc_mac_key.len(),
            });
        }
        Ok(hashed
            .iter()
            .zip(enc_mac_key)
            .map(|(h, e)| h ^ e)
            .collect())
    }
}

impl Default for DiffieHellman {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DiffieHellman {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiffieHellman")
            .field("default_params", &self.uses_default_params())
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}
