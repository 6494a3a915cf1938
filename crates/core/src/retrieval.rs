use crate::traits::ChunkStore;
use crate::Candidate;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct RetrievalReport {
    /// Every variant's hits concatenated in completion order; may hold duplicates.
    pub candidates: Vec<Candidate>,
    pub attempted: usize,
    pub failed: usize,
    pub timed_out: bool,
}

impl RetrievalReport {
    pub fn all_failed(&self) -> bool {
        self.attempted > 0 && self.failed == self.attempted
    }
}

pub struct CandidateRetriever<'a, S> {
    store: &'a S,
    fanout_limit: usize,
}

impl<'a, S> CandidateRetriever<'a, S>
where
    S: ChunkStore + Send + Sync,
{
    pub fn new(store: &'a S, fanout_limit: usize) -> Self {
        Self {
            store,
            fanout_limit,
        }
    }

    /// Runs one store query per variant concurrently. A failing variant adds
    /// nothing; variants still pending at `deadline` count as failed.
    pub async fn retrieve(&self, variants: &[String], deadline: Instant) -> RetrievalReport {
        let mut report = RetrievalReport {
            attempted: variants.len(),
            ..RetrievalReport::default()
        };

        let mut pending = variants
            .iter()
            .map(|variant| async move { (variant, self.store.query(variant, self.fanout_limit).await) })
            .collect::<FuturesUnordered<_>>();

        loop {
            match timeout_at(deadline, pending.next()).await {
                Ok(Some((variant, Ok(hits)))) => {
                    debug!(variant = %variant, hits = hits.len(), "variant retrieved");
                    report.candidates.extend(hits);
                }
                Ok(Some((variant, Err(error)))) => {
                    warn!(variant = %variant, error = %error, "variant search failed");
                    report.failed += 1;
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(pending = pending.len(), "retrieval deadline reached");
                    report.failed += pending.len();
                    report.timed_out = true;
                    break;
                }
            }
        }

        report
    }
}
