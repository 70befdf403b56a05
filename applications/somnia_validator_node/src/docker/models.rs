// Copyright 2025. The Somnia Agents Project
//
// Redistribution and use in source and binary forms, with or without modification, are permitted provided that the
// following conditions are met:
//
// 1. Redistributions of source code must retain the above copyright notice, this list of conditions and the following
// disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright notice, this list of conditions and the
// following disclaimer in the documentation and/or other materials provided with the distribution.
//
// 3. Neither the name of the copyright holder nor the names of its contributors may be used to endorse or promote
// products derived from this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES,
// INCLUDING, BUT NOT LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
// DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
// SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY,
// WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE
// USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

use std::{
    fmt::{Display, Formatter},
    time::Instant,
};

//-------------------------------------------     ContainerId      ----------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerId(String);

impl From<String> for ContainerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for ContainerId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for ContainerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl ContainerId {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

//-------------------------------------------     ContainerRecord      ----------------------------------------------

/// A running agent container. At most one record exists per version hash, and for any image URL
/// at most one record's hash is current.
#[derive(Debug, Clone)]
pub struct ContainerRecord {
    pub id: ContainerId,
    pub name: String,
    pub url: String,
    pub version_hash: String,
    pub host_port: u16,
    pub started_at: Instant,
}

/// The well-known name of the container running `version_hash`, also used to reclaim orphans
/// left behind by a crashed process.
pub fn container_name(version_hash: &str) -> String {
    format!("agent-{}", version_hash)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn container_name_is_stable() {
        assert_eq!(container_name("0011223344556677"), "agent-0011223344556677");
    }

    #[test]
    fn container_id_display() {
        let id = ContainerId::from("abcdef".to_string());
        assert_eq!(id.to_string(), "abcdef");
        assert_eq!(id.as_str(), "abcdef");
    }
}
