use super::FrameState;
use crate::jvm::Error;
use std::rc::Rc;

/// Pending jumps to one not-yet-known target
///
/// Nodes are immutable once built and sorted by descending `pc`, so merging two chains can share
/// the tail of whichever chain is left over. Every node carries the machine state at its jump,
/// which gets joined into the state at the target when the chain is resolved.
#[derive(Debug)]
pub struct Chain {
    /// Offset of the jump instruction
    pub pc: usize,

    pub state: FrameState,
    pub next: Option<Rc<Chain>>,
}

/// Possibly empty chain of pending jumps
pub type Jumps = Option<Rc<Chain>>;

impl Chain {
    pub fn new(pc: usize, next: Jumps, state: FrameState) -> Rc<Chain> {
        Rc::new(Chain { pc, state, next })
    }

    pub fn iter(self: &Rc<Chain>) -> impl Iterator<Item = &Chain> {
        let mut current: Option<&Chain> = Some(&**self);
        std::iter::from_fn(move || {
            let node = current?;
            current = node.next.as_deref();
            Some(node)
        })
    }
}

/// Combine two chains into one, keeping the descending order of offsets
pub fn merge_chains(left: Jumps, right: Jumps) -> Result<Jumps, Error> {
    let (mut left, mut right) = match (left, right) {
        (None, other) | (other, None) => return Ok(other),
        (Some(left), Some(right)) => (left, right),
    };
    if left.state.depth() != right.state.depth() || left.state.locks.len() != right.state.locks.len()
    {
        return Err(Error::FrameShapeMismatch {
            stack_sizes: (left.state.depth(), right.state.depth()),
            lock_depths: (left.state.locks.len(), right.state.locks.len()),
        });
    }

    // Peel off nodes until one side runs out, then graft the leftovers back on as a shared tail
    let mut prefix: Vec<(usize, FrameState)> = vec![];
    let tail = loop {
        if left.pc < right.pc {
            std::mem::swap(&mut left, &mut right);
        }
        prefix.push((left.pc, left.state.clone()));
        match left.next.clone() {
            Some(next) => left = next,
            None => break right,
        }
    };

    let mut merged = Some(tail);
    for (pc, state) in prefix.into_iter().rev() {
        merged = Some(Chain::new(pc, merged, state));
    }
    Ok(merged)
}

/// Copy of a chain whose states forget every register at or above `reg`
///
/// Locals declared inside a construct are out of scope once its pending exits get resolved.
pub fn exclude_registers_from(jumps: &Jumps, reg: usize) -> Jumps {
    let nodes: Vec<&Chain> = match jumps {
        Some(chain) => chain.iter().collect(),
        None => return None,
    };
    let mut rebuilt = None;
    for node in nodes.into_iter().rev() {
        let mut state = node.state.clone();
        state.defined.excl_from(reg);
        rebuilt = Some(Chain::new(node.pc, rebuilt, state));
    }
    rebuilt
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::Type;

    fn chain(pcs: &[usize]) -> Jumps {
        let mut jumps = None;
        for pc in pcs.iter().rev() {
            jumps = Some(Chain::new(*pc, jumps, FrameState::new()));
        }
        jumps
    }

    fn pcs(jumps: &Jumps) -> Vec<usize> {
        jumps
            .as_ref()
            .map(|chain| chain.iter().map(|node| node.pc).collect())
            .unwrap_or_default()
    }

    #[test]
    fn merge_keeps_descending_order() {
        let merged = merge_chains(chain(&[20, 9, 3]), chain(&[15, 12, 1])).unwrap();
        assert_eq!(pcs(&merged), vec![20, 15, 12, 9, 3, 1]);

        let merged = merge_chains(merged, None).unwrap();
        assert_eq!(pcs(&merged).len(), 6, "merging with nothing is the identity");
        assert_eq!(pcs(&merge_chains(None, chain(&[4])).unwrap()), vec![4]);
    }

    #[test]
    fn merge_shares_leftover_tail() {
        let right = chain(&[5, 2]);
        let tail = right.clone();
        let merged = merge_chains(chain(&[10]), right).unwrap();
        let second = merged.as_ref().and_then(|node| node.next.clone());
        assert!(Rc::ptr_eq(
            second.as_ref().expect("second node"),
            tail.as_ref().expect("tail")
        ));
    }

    #[test]
    fn merge_rejects_different_stack_depths() {
        let mut state = FrameState::new();
        state.push(Type::INT);
        let deeper = Some(Chain::new(7, None, state));
        assert!(matches!(
            merge_chains(chain(&[3]), deeper),
            Err(Error::FrameShapeMismatch { stack_sizes: (0, 1), .. })
        ));
    }

    #[test]
    fn excluding_registers_touches_every_node() {
        let mut state = FrameState::new();
        state.defined.incl_range(0, 6);
        let jumps = Some(Chain::new(9, Some(Chain::new(4, None, state.clone())), state));
        let trimmed = exclude_registers_from(&jumps, 2);
        assert_eq!(pcs(&trimmed), vec![9, 4]);
        for node in trimmed.as_ref().expect("non-empty").iter() {
            assert_eq!(node.state.defined.iter().collect::<Vec<_>>(), vec![0, 1]);
        }
    }
}
