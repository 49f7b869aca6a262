use rlc_core::sn::SN_MOD;

/// Fixed-capacity arena of window slots addressed by SN.
///
/// The slot count is the window size rounded up to a power of two. As that divides 1024,
/// any run of up to `window_size` consecutive SNs maps to distinct slots, also across the
/// wrap from 1023 to 0. Each occupied slot stores its SN, so a stale occupant is never
/// mistaken for the requested one.
pub struct RingWindow<T> {
    slots: Vec<Option<(u16, T)>>,
    mask: u16,
    count: usize,
}

impl<T> RingWindow<T> {
    pub fn new(window_size: u16) -> Self {
        let num_slots = (window_size.max(1) as usize).next_power_of_two().min(SN_MOD as usize);
        let mut slots = Vec::with_capacity(num_slots);
        slots.resize_with(num_slots, || None);
        RingWindow { slots, mask: (num_slots - 1) as u16, count: 0 }
    }

    #[inline]
    fn index(&self, sn: u16) -> usize {
        (sn & self.mask) as usize
    }

    pub fn has_sn(&self, sn: u16) -> bool {
        matches!(self.slots[self.index(sn)], Some((s, _)) if s == sn)
    }

    /// Stores `value` for `sn`. Returns whatever occupied the slot before, which the
    /// caller treats as an invariant violation unless it was the same SN.
    pub fn insert(&mut self, sn: u16, value: T) -> Option<(u16, T)> {
        let idx = self.index(sn);
        let prev = self.slots[idx].replace((sn, value));
        if prev.is_none() {
            self.count += 1;
        }
        prev
    }

    pub fn get(&self, sn: u16) -> Option<&T> {
        match &self.slots[self.index(sn)] {
            Some((s, v)) if *s == sn => Some(v),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, sn: u16) -> Option<&mut T> {
        let idx = self.index(sn);
        match &mut self.slots[idx] {
            Some((s, v)) if *s == sn => Some(v),
            _ => None,
        }
    }

    pub fn remove(&mut self, sn: u16) -> Option<T> {
        if !self.has_sn(sn) {
            return None;
        }
        let idx = self.index(sn);
        self.count -= 1;
        self.slots[idx].take().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.count = 0;
    }

    /// Occupied slots in slot order, which is not SN order once the window wraps
    pub fn iter(&self) -> impl Iterator<Item = (u16, &T)> {
        self.slots.iter().filter_map(|s| s.as_ref().map(|(sn, v)| (*sn, v)))
    }
}
