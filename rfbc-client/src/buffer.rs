//! Accumulation buffer between the socket and the protocol session.
//!
//! Each protocol state declares how many bytes it needs; the transport reads
//! into the spare region until that requirement is met. Most messages fit in
//! the resident 8 KiB allocation; large rectangle payloads grow the buffer
//! for the duration of one message and the extra capacity is released on the
//! next reset.

const RESIDENT_CAP: usize = 8 * 1024;

#[derive(Debug)]
pub(crate) struct ReadBuffer {
    data: Vec<u8>,
    filled: usize,
    need: usize,
}

impl ReadBuffer {
    pub fn new() -> Self {
        Self {
            data: vec![0; RESIDENT_CAP],
            filled: 0,
            need: 0,
        }
    }

    /// Start accumulating a fresh message of `need` bytes.
    pub fn reset(&mut self, need: usize) {
        self.filled = 0;
        self.need = need;
        if self.data.len() > RESIDENT_CAP {
            self.data.truncate(RESIDENT_CAP);
            self.data.shrink_to(RESIDENT_CAP);
        }
        if need > self.data.len() {
            self.data.resize(need, 0);
        }
    }

    /// Raise the requirement for the message being accumulated. Requirements
    /// only ever grow: a handler that learns a message's variable length
    /// asks for more, never less.
    pub fn require(&mut self, need: usize) {
        debug_assert!(need >= self.need);
        if need > self.need {
            self.need = need;
            if need > self.data.len() {
                self.data.resize(need, 0);
            }
        }
    }

    pub fn need(&self) -> usize {
        self.need
    }

    pub fn filled(&self) -> usize {
        self.filled
    }

    pub fn is_complete(&self) -> bool {
        self.filled >= self.need
    }

    /// The unfilled region up to the current requirement, for the socket to
    /// read into.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.filled..self.need]
    }

    /// Record that `n` bytes were read into the spare region.
    pub fn commit(&mut self, n: usize) {
        debug_assert!(self.filled + n <= self.need);
        self.filled += n;
    }

    /// The accumulated bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.filled]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_until_requirement_met() {
        let mut buf = ReadBuffer::new();
        buf.reset(4);
        assert!(!buf.is_complete());
        assert_eq!(buf.spare_mut().len(), 4);

        buf.spare_mut()[..2].copy_from_slice(&[1, 2]);
        buf.commit(2);
        assert!(!buf.is_complete());
        assert_eq!(buf.spare_mut().len(), 2);

        buf.spare_mut().copy_from_slice(&[3, 4]);
        buf.commit(2);
        assert!(buf.is_complete());
        assert_eq!(buf.as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn require_grows_in_place() {
        let mut buf = ReadBuffer::new();
        buf.reset(1);
        buf.spare_mut()[0] = 9;
        buf.commit(1);
        assert!(buf.is_complete());

        buf.require(3);
        assert!(!buf.is_complete());
        assert_eq!(buf.filled(), 1);
        buf.spare_mut().copy_from_slice(&[8, 7]);
        buf.commit(2);
        assert_eq!(buf.as_slice(), &[9, 8, 7]);
    }

    #[test]
    fn grows_past_resident_capacity_and_shrinks_back() {
        let mut buf = ReadBuffer::new();
        let big = RESIDENT_CAP * 4;
        buf.reset(big);
        assert_eq!(buf.spare_mut().len(), big);
        buf.commit(big);
        assert!(buf.is_complete());
        assert_eq!(buf.need(), big);

        buf.reset(16);
        assert!(buf.data.len() <= RESIDENT_CAP);
        assert_eq!(buf.spare_mut().len(), 16);
    }
}
