/// Growable set of small non-negative integers
///
/// Used for the "definitely assigned" local variable registers of the simulated frame, where
/// register indices are dense and the set is copied at every branch.
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct Bits {
    words: Vec<u64>,
}

impl Bits {
    pub fn new() -> Bits {
        Bits { words: vec![] }
    }

    pub fn incl(&mut self, bit: usize) {
        let word = bit / 64;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1 << (bit % 64);
    }

    pub fn excl(&mut self, bit: usize) {
        if let Some(word) = self.words.get_mut(bit / 64) {
            *word &= !(1 << (bit % 64));
        }
    }

    /// Include every bit in `from..to`
    pub fn incl_range(&mut self, from: usize, to: usize) {
        for bit in from..to {
            self.incl(bit);
        }
    }

    /// Exclude every bit at or above `from`
    pub fn excl_from(&mut self, from: usize) {
        let word = from / 64;
        if word < self.words.len() {
            self.words[word] &= (1 << (from % 64)) - 1;
            self.words.truncate(word + 1);
        }
    }

    pub fn is_member(&self, bit: usize) -> bool {
        self.words
            .get(bit / 64)
            .map_or(false, |word| word & (1 << (bit % 64)) != 0)
    }

    /// Intersect in place
    pub fn and_set(&mut self, other: &Bits) {
        for (idx, word) in self.words.iter_mut().enumerate() {
            *word &= other.words.get(idx).copied().unwrap_or(0);
        }
    }

    /// Bits in exactly one of the two sets
    pub fn xor(&self, other: &Bits) -> Bits {
        let len = self.words.len().max(other.words.len());
        let words = (0..len)
            .map(|idx| {
                self.words.get(idx).copied().unwrap_or(0) ^ other.words.get(idx).copied().unwrap_or(0)
            })
            .collect();
        Bits { words }
    }

    /// Smallest member at or above `from`
    pub fn next_bit(&self, from: usize) -> Option<usize> {
        let mut word_idx = from / 64;
        let mut word = *self.words.get(word_idx)? & (!0u64 << (from % 64));
        loop {
            if word != 0 {
                return Some(word_idx * 64 + word.trailing_zeros() as usize);
            }
            word_idx += 1;
            word = *self.words.get(word_idx)?;
        }
    }

    /// Members in increasing order
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        let mut next = self.next_bit(0);
        std::iter::from_fn(move || {
            let current = next?;
            next = self.next_bit(current + 1);
            Some(current)
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn membership_and_iteration() {
        let mut bits = Bits::new();
        bits.incl(3);
        bits.incl(70);
        bits.incl_range(5, 7);
        assert!(bits.is_member(3));
        assert!(!bits.is_member(4));
        assert!(!bits.is_member(1000));
        assert_eq!(bits.iter().collect::<Vec<_>>(), vec![3, 5, 6, 70]);

        bits.excl(5);
        bits.excl(1000);
        bits.excl_from(64);
        assert_eq!(bits.iter().collect::<Vec<_>>(), vec![3, 6]);
    }

    #[test]
    fn set_operations() {
        let mut left = Bits::new();
        left.incl_range(0, 4);
        let mut right = Bits::new();
        right.incl(2);
        right.incl(100);

        assert_eq!(left.xor(&right).iter().collect::<Vec<_>>(), vec![0, 1, 3, 100]);
        left.and_set(&right);
        assert_eq!(left.iter().collect::<Vec<_>>(), vec![2]);
        assert_eq!(left.next_bit(3), None);
    }
}
