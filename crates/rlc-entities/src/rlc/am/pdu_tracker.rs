use std::collections::HashMap;

use rlc_core::SduId;

struct PendingSdu {
    /// All bytes of the SDU have been placed into PDUs
    fully_txed: bool,
    /// SNs carrying fragments of this SDU, with their acked flag
    sns: Vec<(u16, bool)>,
}

impl PendingSdu {
    fn all_acked(&self) -> bool {
        self.sns.iter().all(|(_, acked)| *acked)
    }
}

/// Maps SDU ids to the SNs carrying their fragments. An SDU is reported delivered once it
/// was fully transmitted and every SN carrying it is acknowledged.
#[derive(Default)]
pub struct PduTracker {
    pending: HashMap<SduId, PendingSdu>,
}

impl PduTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_fragment(&mut self, sdu_id: SduId, sn: u16) {
        let entry = self.pending.entry(sdu_id).or_insert_with(|| PendingSdu { fully_txed: false, sns: Vec::new() });
        if !entry.sns.iter().any(|(s, _)| *s == sn) {
            entry.sns.push((sn, false));
        }
    }

    pub fn set_fully_txed(&mut self, sdu_id: SduId) {
        if let Some(entry) = self.pending.get_mut(&sdu_id) {
            entry.fully_txed = true;
        }
    }

    /// Marks `sn` acked for each SDU in `sdu_ids`. Returns the SDUs that thereby became
    /// delivered; they are forgotten, so a repeated ack yields nothing.
    pub fn ack_sn(&mut self, sdu_ids: &[SduId], sn: u16) -> Vec<SduId> {
        let mut delivered = Vec::new();
        for id in sdu_ids {
            let Some(entry) = self.pending.get_mut(id) else {
                continue;
            };
            for (s, acked) in entry.sns.iter_mut() {
                if *s == sn {
                    *acked = true;
                }
            }
            if entry.fully_txed && entry.all_acked() {
                self.pending.remove(id);
                delivered.push(*id);
            }
        }
        delivered
    }

    /// Forgets the given SDUs. Returns those that were still pending.
    pub fn fail(&mut self, sdu_ids: &[SduId]) -> Vec<SduId> {
        sdu_ids.iter().filter(|id| self.pending.remove(id).is_some()).copied().collect()
    }

    /// Forgets everything, returning all pending SDU ids in ascending order
    pub fn drain_all(&mut self) -> Vec<SduId> {
        let mut ids: Vec<SduId> = self.pending.drain().map(|(id, _)| id).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivered_after_last_fragment_acked() {
        let mut t = PduTracker::new();
        // SDU 7 spans SNs 1 and 2, SDU 8 starts in SN 2
        t.add_fragment(7, 1);
        t.add_fragment(7, 2);
        t.set_fully_txed(7);
        t.add_fragment(8, 2);

        assert!(t.ack_sn(&[7], 2).is_empty());
        assert_eq!(t.ack_sn(&[7], 1), vec![7]);
        // again: already forgotten
        assert!(t.ack_sn(&[7], 1).is_empty());

        // not fully transmitted yet
        assert!(t.ack_sn(&[8], 2).is_empty());
        assert_eq!(t.len(), 1);
        assert_eq!(t.drain_all(), vec![8]);
        assert!(t.is_empty());
    }

    #[test]
    fn test_fail_reports_once() {
        let mut t = PduTracker::new();
        t.add_fragment(1, 0);
        t.add_fragment(2, 0);
        assert_eq!(t.fail(&[1, 2, 3]), vec![1, 2]);
        assert!(t.fail(&[1]).is_empty());
    }
}
