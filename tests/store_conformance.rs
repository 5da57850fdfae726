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

//! Behaviour every store backend has to share.
use eyre::Result;

use openid_consumer::store::{AssociationStore, NonceTracker};

mod common;

use common::{Fixture, association};

const OP: &str = "https://idp.example/op";
const OTHER_OP: &str = "https://other.example/op";

async fn round_trip(f: Fixture) -> Result<()> {
    let assoc = association("h1", 1000, 600)?;
    f.store.store_association(OP, &assoc).await?;
    assert_eq!(Some(assoc.clone()), f.store.get_association(OP, Some("h1")).await?);
    assert_eq!(Some(assoc), f.store.get_association(OP, None).await?);
    assert_eq!(None, f.store.get_association(OP, Some("h2")).await?);
    assert_eq!(None, f.store.get_association(OTHER_OP, Some("h1")).await?);
    Ok(())
}

async fn replace(f: Fixture) -> Result<()> {
    let first = association("h1", 1000, 600)?;
    let second = association("h1", 1010, 1200)?;
    f.store.store_association(OP, &first).await?;
    // Storing the same value again is harmless.
    f.store.store_association(OP, &first).await?;
    f.store.store_association(OP, &second).await?;
    assert_eq!(Some(second), f.store.get_association(OP, Some("h1")).await?);
    Ok(())
}

async fn latest_wins(f: Fixture) -> Result<()> {
    let older = association("older", 1000, 600)?;
    let newer = association("newer", 1001, 600)?;
    // Insertion order must not matter.
    f.store.store_association(OP, &newer).await?;
    f.store.store_association(OP, &older).await?;
    assert_eq!(Some(newer.clone()), f.store.get_association(OP, None).await?);

    f.store.store_association(OTHER_OP, &older).await?;
    assert_eq!(Some(older), f.store.get_association(OTHER_OP, None).await?);
    assert_eq!(Some(newer), f.store.get_association(OP, None).await?);
    Ok(())
}

async fn latest_skips_expired(f: Fixture) -> Result<()> {
    f.store
        .store_association(OP, &association("long", 900, 3600)?)
        .await?;
    f.store
        .store_association(OP, &association("short", 1000, 10)?)
        .await?;
    f.clock.set(1100);
    assert_eq!(
        "long",
        f.store
            .get_association(OP, None)
            .await?
            .map(|a| a.handle)
            .unwrap_or_default()
    );
    // The expired one was removed during the lookup.
    assert!(!f.store.remove_association(OP, "short").await?);
    Ok(())
}

async fn remove(f: Fixture) -> Result<()> {
    f.store
        .store_association(OP, &association("h1", 1000, 600)?)
        .await?;
    assert!(!f.store.remove_association(OP, "missing").await?);
    assert!(!f.store.remove_association(OTHER_OP, "h1").await?);
    assert!(f.store.remove_association(OP, "h1").await?);
    assert!(!f.store.remove_association(OP, "h1").await?);
    assert_eq!(None, f.store.get_association(OP, Some("h1")).await?);
    Ok(())
}

async fn nonce_single_use(f: Fixture) -> Result<()> {
    assert!(f.store.use_nonce(OP, 1000, "abcdef").await?);
    assert!(!f.store.use_nonce(OP, 1000, "abcdef").await?);
    assert!(!f.store.use_nonce(OP, 1000, "abcdef").await?);
    // Any differing component makes a different nonce.
    assert!(f.store.use_nonce(OTHER_OP, 1000, "abcdef").await?);
    assert!(f.store.use_nonce(OP, 1001, "abcdef").await?);
    assert!(f.store.use_nonce(OP, 1000, "ghijkl").await?);
    assert!(f.store.use_nonce("", 1000, "abcdef").await?);
    Ok(())
}

async fn nonce_concurrent(f: Fixture) -> Result<()> {
    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..16 {
        let store = f.store.clone();
        tasks.spawn(async move { store.use_nonce(OP, 1000, "raced").await });
    }
    let mut accepted = 0;
    while let Some(result) = tasks.join_next().await {
        if result?? {
            accepted += 1;
        }
    }
    assert_eq!(1, accepted);
    Ok(())
}

async fn nonce_skew(f: Fixture) -> Result<()> {
    // Clock at 1000, skew 300.
    assert!(!f.store.use_nonce(OP, 699, "old").await?);
    assert!(!f.store.use_nonce(OP, 1301, "future").await?);
    assert!(f.store.use_nonce(OP, 700, "edge").await?);
    assert!(f.store.use_nonce(OP, 1300, "edge").await?);
    Ok(())
}

async fn cleanup(f: Fixture) -> Result<()> {
    f.store
        .store_association(OP, &association("expired", 0, 500)?)
        .await?;
    f.store
        .store_association(OTHER_OP, &association("expired", 100, 100)?)
        .await?;
    f.store
        .store_association(OP, &association("live", 900, 600)?)
        .await?;
    assert!(f.store.use_nonce(OP, 800, "old").await?);
    assert!(f.store.use_nonce(OP, 1000, "new").await?);

    f.clock.set(1200);
    // Nonce cutoff is 900.
    assert_eq!((1, 2), f.store.cleanup().await?);
    assert_eq!((0, 0), f.store.cleanup().await?);
    assert!(f.store.get_association(OP, Some("live")).await?.is_some());
    // The remaining nonce is still remembered.
    assert!(!f.store.use_nonce(OP, 1000, "new").await?);
    Ok(())
}

async fn cleanup_boundary(f: Fixture) -> Result<()> {
    // Expires exactly at 1600.
    f.store
        .store_association(OP, &association("h1", 1000, 600)?)
        .await?;
    f.clock.set(1600);
    assert_eq!(0, f.store.cleanup_associations().await?);
    f.clock.set(1601);
    assert_eq!(1, f.store.cleanup_associations().await?);
    Ok(())
}

async fn expiry_scenario(f: Fixture) -> Result<()> {
    let assoc = association("h1", 1000, 600)?;
    f.store.store_association(OP, &assoc).await?;
    assert_eq!(Some(assoc), f.store.get_association(OP, Some("h1")).await?);

    f.clock.set(1700);
    assert_eq!(None, f.store.get_association(OP, Some("h1")).await?);
    assert_eq!(None, f.store.get_association(OP, None).await?);
    assert!(!f.store.remove_association(OP, "h1").await?);
    assert_eq!(0, f.store.cleanup_associations().await?);
    Ok(())
}

macro_rules! conformance {
    ($backend:ident) => {
        mod $backend {
            use super::*;

            #[tokio::test]
            async fn test_round_trip() -> Result<()> {
                round_trip(common::$backend(1000).await?).await
            }

            #[tokio::test]
            async fn test_replace() -> Result<()> {
                replace(common::$backend(1000).await?).await
            }

            #[tokio::test]
            async fn test_latest_wins() -> Result<()> {
                latest_wins(common::$backend(1000).await?).await
            }

            #[tokio::test]
            async fn test_latest_skips_expired() -> Result<()> {
                latest_skips_expired(common::$backend(1000).await?).await
            }

            #[tokio::test]
            async fn test_remove() -> Result<()> {
                remove(common::$backend(1000).await?).await
            }

            #[tokio::test]
            async fn test_nonce_single_use() -> Result<()> {
                nonce_single_use(common::$backend(1000).await?).await
            }

            #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
            async fn test_nonce_concurrent() -> Result<()> {
                nonce_concurrent(common::$backend(1000).await?).await
            }

            #[tokio::test]
            async fn test_nonce_skew() -> Result<()> {
                nonce_skew(common::$backend(1000).await?).await
            }

            #[tokio::test]
            async fn test_cleanup() -> Result<()> {
                cleanup(common::$backend(1000).await?).await
            }

            #[tokio::test]
            async fn test_cleanup_boundary() -> Result<()> {
                cleanup_boundary(common::$backend(1000).await?).await
            }

            #[tokio::test]
            async fn test_expiry_scenario() -> Result<()> {
                expiry_scenario(common::$backend(1000).await?).await
            }
        }
    };
}

conformance!(memory);
conformance!(file);
conformance!(sql);
