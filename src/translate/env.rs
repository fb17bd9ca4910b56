//! Environments of the statements enclosing the code being generated
//!
//! Jumps out of a construct (`break`, `continue`, `return`) collect in the environment of their
//! target, and finalizers of the constructs they leave get run on the way out.

use super::Error;
use crate::jvm::code::{merge_chains, Jumps};
use crate::tree::Block;

/// Kind of statement an environment belongs to
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EnvKind<'t> {
    Method,

    /// Loop, with the label of the statement it is the body of (if any)
    Loop { label: Option<&'t str> },
    Switch,

    /// Labelled statement which is not a loop
    Labelled(&'t str),
    Try,
    Synchronized,
}

/// Code to run whenever control leaves an environment
#[derive(Copy, Clone, Debug)]
pub enum Finalizer<'t> {
    /// `try` statement, with its `finally` block (if any)
    Try { finally: Option<&'t Block> },

    /// `synchronized` statement, with the register holding the lock
    Synchronized { lock_reg: usize },
}

impl<'t> Finalizer<'t> {
    /// Does leaving the environment run any code?
    pub fn has_code(&self) -> bool {
        match self {
            Finalizer::Try { finally } => finally.is_some(),
            Finalizer::Synchronized { .. } => true,
        }
    }
}

pub struct Env<'t> {
    pub kind: EnvKind<'t>,

    /// Jumps to the end of the statement
    pub exit: Jumps,

    /// Jumps to the next iteration of a loop, or `jsr` instructions to a finalizer subroutine
    pub cont: Jumps,

    pub finalizer: Option<Finalizer<'t>>,

    /// Alternating start and end offsets of code which the catch-all handler of a `try`
    /// statement must not cover
    ///
    /// An odd number of entries means a gap is open.
    pub gaps: Option<Vec<usize>>,
}

impl<'t> Env<'t> {
    pub fn new(kind: EnvKind<'t>) -> Env<'t> {
        Env {
            kind,
            exit: None,
            cont: None,
            finalizer: None,
            gaps: None,
        }
    }

    pub fn add_exit(&mut self, jumps: Jumps) -> Result<(), Error> {
        let exit = self.exit.take();
        self.exit = merge_chains(jumps, exit)?;
        Ok(())
    }

    pub fn add_cont(&mut self, jumps: Jumps) -> Result<(), Error> {
        let cont = self.cont.take();
        self.cont = merge_chains(jumps, cont)?;
        Ok(())
    }

    pub fn is_switch(&self) -> bool {
        self.kind == EnvKind::Switch
    }

    /// Is this a `break` target?
    pub fn accepts_break(&self, label: Option<&str>) -> bool {
        match (label, self.kind) {
            (None, EnvKind::Loop { .. }) | (None, EnvKind::Switch) => true,
            (Some(label), EnvKind::Loop { label: Some(own) }) => label == own,
            (Some(label), EnvKind::Labelled(own)) => label == own,
            _ => false,
        }
    }

    /// Is this a `continue` target?
    pub fn accepts_continue(&self, label: Option<&str>) -> bool {
        match (label, self.kind) {
            (None, EnvKind::Loop { .. }) => true,
            (Some(label), EnvKind::Loop { label: Some(own) }) => label == own,
            _ => false,
        }
    }
}

/// Stack of environments, outermost (the method) first
pub struct EnvStack<'t> {
    envs: Vec<Env<'t>>,
}

impl<'t> EnvStack<'t> {
    pub fn new() -> EnvStack<'t> {
        EnvStack { envs: vec![Env::new(EnvKind::Method)] }
    }

    pub fn push(&mut self, env: Env<'t>) -> usize {
        self.envs.push(env);
        self.envs.len() - 1
    }

    pub fn pop(&mut self) -> Result<Env<'t>, Error> {
        self.envs
            .pop()
            .ok_or_else(|| Error::MalformedTree("environment stack underflow".to_owned()))
    }

    /// Index of the innermost environment
    pub fn top(&self) -> usize {
        self.envs.len() - 1
    }

    pub fn len(&self) -> usize {
        self.envs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.envs.is_empty()
    }

    pub fn get(&self, idx: usize) -> &Env<'t> {
        &self.envs[idx]
    }

    pub fn get_mut(&mut self, idx: usize) -> &mut Env<'t> {
        &mut self.envs[idx]
    }

    pub fn innermost(&self) -> Option<&Env<'t>> {
        self.envs.last()
    }

    /// Set aside every environment from `idx` on, leaving `idx` as the new length
    pub fn split_off(&mut self, idx: usize) -> Vec<Env<'t>> {
        self.envs.split_off(idx)
    }

    /// Put back environments set aside with [`EnvStack::split_off`]
    pub fn restore(&mut self, envs: Vec<Env<'t>>) {
        self.envs.extend(envs);
    }

    pub fn break_target(&self, label: Option<&str>) -> Result<usize, Error> {
        self.envs
            .iter()
            .rposition(|env| env.accepts_break(label))
            .ok_or_else(|| Error::MalformedTree(format!("no target for break {:?}", label)))
    }

    pub fn continue_target(&self, label: Option<&str>) -> Result<usize, Error> {
        self.envs
            .iter()
            .rposition(|env| env.accepts_continue(label))
            .ok_or_else(|| Error::MalformedTree(format!("no target for continue {:?}", label)))
    }

    /// Does leaving everything strictly inside `target` run a `finally` block?
    pub fn has_finally(&self, target: usize) -> bool {
        self.envs[target + 1..].iter().any(|env| {
            matches!(env.finalizer, Some(Finalizer::Try { finally: Some(_) }))
        })
    }
}

impl<'t> Default for EnvStack<'t> {
    fn default() -> Self {
        EnvStack::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn labels_pick_targets() {
        let mut envs = EnvStack::new();
        envs.push(Env::new(EnvKind::Loop { label: Some("outer") }));
        envs.push(Env::new(EnvKind::Labelled("block")));
        envs.push(Env::new(EnvKind::Switch));

        assert_eq!(envs.break_target(None).unwrap(), 3);
        assert_eq!(envs.break_target(Some("block")).unwrap(), 2);
        assert_eq!(envs.break_target(Some("outer")).unwrap(), 1);
        assert_eq!(envs.continue_target(None).unwrap(), 1, "switches are not continue targets");
        assert!(envs.continue_target(Some("block")).is_err());
        assert!(envs.break_target(Some("missing")).is_err());
    }

    #[test]
    fn finally_only_counts_strictly_inside() {
        let finally = Block::default();
        let mut envs = EnvStack::new();
        let mut try_env = Env::new(EnvKind::Try);
        try_env.finalizer = Some(Finalizer::Try {
            finally: Some(&finally),
        });
        let try_idx = envs.push(try_env);
        envs.push(Env::new(EnvKind::Loop { label: None }));

        assert!(envs.has_finally(0));
        assert!(!envs.has_finally(try_idx));
    }
}
