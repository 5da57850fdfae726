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

//! Key-value form encoding of the direct communication bodies.
//!
//! Every pair is written as `key:value\n`. Keys may contain neither `:` nor
//! a newline, values may not contain a newline.
use tracing::debug;

use super::MessageError;

/// Encode the pairs in the key-value form.
pub fn to_kv<I, K, V>(pairs: I) -> Result<String, MessageError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut out = String::new();
    for (key, value) in pairs {
        let (key, value) = (key.as_ref(), value.as_ref());
        if key.contains(':') || key.contains('\n') || key.is_empty() {
            return Err(MessageError::InvalidKey(key.to_string()));
        }
        if value.contains('\n') {
            return Err(MessageError::InvalidValue(key.to_string()));
        }
        out.push_str(key);
        out.push(':');
        out.push_str(value);
        out.push('\n');
    }
    Ok(out)
}

/// Decode the key-value form body.
///
/// Empty lines are skipped. Whitespace around keys and values is trimmed.
pub fn from_kv(body: &str) -> Result<Vec<(String, String)>, MessageError> {
    let mut pairs = Vec::new();
    for (idx, line) in body.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match line.split_once(':') {
            Some((key, value)) => {
                if key.trim() != key || value.trim() != value {
                    debug!("Whitespace around key-value pair on line {}", idx + 1);
                }
                pairs.push((key.trim().to_string(), value.trim().to_string()));
            }
            None => {
                return Err(MessageError::MalformedLine {
                    line: idx + 1,
                    content: line.to_string(),
                });
            }
        }
    }
    Ok(pairs)
}
