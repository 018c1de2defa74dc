//! Incoming-transfer watch for the authenticated account.
//!
//! The watched account is resolved lazily via `whoami`. Resolution can fail
//! for reasons that clear up on their own (fresh token, profile still
//! propagating), so an unresolved id is retried on the next cycle rather
//! than poisoning the job.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::WatchContext;
use crate::config::SeenBounds;
use crate::error::Result;
use crate::model::Event;
use crate::seen::BoundedSeen;
use crate::traits::namespace;

/// Transfers fetched per cycle
const TRANSFER_PAGE_SIZE: u32 = 20;

enum OwnId {
    Unresolved,
    Resolved(u64),
    RetryAfter(Instant),
}

pub(crate) struct BytesWatch {
    pub interval: Duration,
    own: OwnId,
    initialized: bool,
    seen: BoundedSeen<String>,
}

impl BytesWatch {
    pub fn new(interval: Duration, bounds: SeenBounds) -> Self {
        Self {
            interval,
            own: OwnId::Unresolved,
            initialized: false,
            seen: BoundedSeen::new(bounds),
        }
    }

    pub async fn poll(&mut self, cx: &WatchContext) -> Result<()> {
        let uid = match self.own {
            OwnId::Resolved(uid) => uid,
            OwnId::RetryAfter(at) if Instant::now() < at => {
                debug!("own account id not yet retryable, skipping cycle");
                return Ok(());
            }
            _ => match cx.client.whoami().await? {
                Some(uid) if uid > 0 => {
                    debug!(uid, "resolved own account id");
                    self.own = OwnId::Resolved(uid);
                    uid
                }
                _ => {
                    warn!("could not resolve own account id, will retry");
                    self.own = OwnId::RetryAfter(Instant::now() + self.interval);
                    return Ok(());
                }
            },
        };

        let key = uid.to_string();
        let mut transfers = cx.client.incoming_transfers(uid, TRANSFER_PAGE_SIZE).await?;

        if !self.initialized {
            let ids: Vec<String> = transfers.iter().map(|t| t.id.clone()).collect();
            self.seen.extend(ids.iter().cloned());
            cx.store_seed(namespace::BYTES_RECEIVED, &key, &ids).await?;
            self.initialized = true;
            debug!(uid, count = transfers.len(), "seeded bytes watch");
            return Ok(());
        }

        transfers.sort_by_key(|t| t.dateline);
        for tx in transfers {
            if self.seen.contains(&tx.id) {
                continue;
            }
            let first = cx
                .first_sighting(namespace::BYTES_RECEIVED, &key, &tx.id)
                .await?;
            self.seen.insert(tx.id.clone());
            if !first {
                continue;
            }
            cx.notifier
                .notify(Event::BytesReceived {
                    id: tx.id,
                    amount: tx.amount,
                    reason: tx.reason,
                    from_user: tx.from_user,
                    dateline: tx.dateline,
                })
                .await?;
        }

        if self.seen.take_trimmed() {
            cx.store_prune(namespace::BYTES_RECEIVED, &key, self.seen.bounds().cap)
                .await?;
        }
        Ok(())
    }
}
