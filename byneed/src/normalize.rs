use crate::{beta::beta_step, eta::eta_step, prelude::*};

/// Step cap used when the caller has no opinion.
pub const DEFAULT_MAX_STEPS: usize = 65536;

#[derive(PartialEq, Eq, Clone, Copy, derive_more::Display, Debug)]
pub enum Step {
    #[display(fmt = "Eta-conversion")]
    Eta,
    #[display(fmt = "Beta-reduction")]
    Beta,
}

/// Why [`normalize`] stopped.
#[derive(PartialEq, Eq, Clone, Copy, derive_more::Display, Debug)]
pub enum Stop {
    #[display(fmt = "normal form")]
    NormalForm,
    #[display(fmt = "step cap")]
    StepCap,
    /// A contraction needed more nodes than the pool could give.
    #[display(fmt = "out of memory")]
    OutOfMemory,
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct Normalized {
    /// Owned root of the result.
    pub term: NodeId,
    pub steps: usize,
    pub stop: Stop,
}

impl Normalized {
    pub fn normal(&self) -> bool {
        self.stop == Stop::NormalForm
    }
}

/// Alternates eta-conversion and beta-reduction, eta first, until neither
/// applies or `max_steps` steps have been taken. `observer` sees the term
/// after every step.
///
/// Running out of nodes ends the loop as well, with the term as it was after
/// the last completed step.
pub fn normalize(
    pool: &mut Pool,
    term: NodeId,
    max_steps: usize,
    mut observer: impl FnMut(&Pool, Step, NodeId),
) -> Normalized {
    let mut term = term;
    let mut steps = 0;
    let stop = loop {
        if steps == max_steps {
            break Stop::StepCap;
        }
        let (next, changed) = eta_step(pool, term);
        term = next;
        let step = if changed {
            Step::Eta
        } else {
            match beta_step(pool, term) {
                Ok((next, true)) => term = next,
                Ok((_, false)) => break Stop::NormalForm,
                Err(OutOfMemory) => break Stop::OutOfMemory,
            }
            Step::Beta
        };
        steps += 1;
        observer(pool, step, term);
    };
    log::debug!(
        "normalization stopped after {steps} steps ({stop}), {} nodes live",
        pool.live()
    );
    Normalized { term, steps, stop }
}
