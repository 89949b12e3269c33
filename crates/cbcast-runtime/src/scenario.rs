//! Sample policies.
//!
//! Each one reproduces a classic causal broadcast exercise. They differ
//! only in when they broadcast and when they stop; the delivery logic is
//! the same engine for all of them.

use crate::error::RuntimeError;
use crate::policy::{Policy, PolicyContext};
use cbcast_core::{CausalMessage, ProcessId, VectorClock};
use std::fmt;
use std::str::FromStr;

fn slot(clock: &VectorClock, id: ProcessId) -> u64 {
    clock.get(id).unwrap_or(0)
}

/// Process 0 broadcasts `m1`, held back from every process with id >= 2.
/// Process 1 answers with `m2` as soon as it delivers `m1`, so the other
/// processes typically receive `m2` first and must buffer it.
#[derive(Debug, Default)]
pub struct Slides {
    answered: bool,
}

impl Slides {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Policy for Slides {
    fn on_start(&mut self, ctx: &mut PolicyContext) {
        if ctx.id() == 0 {
            let delayed: Vec<ProcessId> = (2..ctx.process_count()).collect();
            ctx.broadcast_delayed("m1", delayed);
        }
    }

    fn on_deliver(&mut self, ctx: &mut PolicyContext, message: &CausalMessage) {
        if ctx.id() == 1 && message.source == 0 && !self.answered {
            self.answered = true;
            ctx.broadcast("m2");
        }
    }

    fn is_finished(&self, _id: ProcessId, clock: &VectorClock) -> bool {
        slot(clock, 0) >= 1 && slot(clock, 1) >= 1
    }
}

/// Process 0 broadcasts `m1` (delayed to everyone) and then `m2`, so every
/// receiver sees `m2` before `m1`.
#[derive(Debug, Default)]
pub struct SecondMessageFirst;

impl SecondMessageFirst {
    pub fn new() -> Self {
        Self
    }
}

impl Policy for SecondMessageFirst {
    fn on_start(&mut self, ctx: &mut PolicyContext) {
        if ctx.id() == 0 {
            let everyone: Vec<ProcessId> = (0..ctx.process_count()).collect();
            ctx.broadcast_delayed("m1", everyone);
            ctx.broadcast("m2");
        }
    }

    fn is_finished(&self, _id: ProcessId, clock: &VectorClock) -> bool {
        slot(clock, 0) >= 2
    }
}

/// Everyone broadcasts one greeting; done once a greeting from every
/// process has been delivered.
#[derive(Debug, Default)]
pub struct HelloWorld;

impl HelloWorld {
    pub fn new() -> Self {
        Self
    }
}

impl Policy for HelloWorld {
    fn on_start(&mut self, ctx: &mut PolicyContext) {
        ctx.broadcast("Hello world.");
    }

    fn is_finished(&self, _id: ProcessId, clock: &VectorClock) -> bool {
        clock.min_slot() >= 1
    }
}

/// Selectable sample policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scenario {
    Slides,
    SecondMessageFirst,
    HelloWorld,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [
        Scenario::Slides,
        Scenario::SecondMessageFirst,
        Scenario::HelloWorld,
    ];

    pub fn policy(self) -> Box<dyn Policy> {
        match self {
            Scenario::Slides => Box::new(Slides::new()),
            Scenario::SecondMessageFirst => Box::new(SecondMessageFirst::new()),
            Scenario::HelloWorld => Box::new(HelloWorld::new()),
        }
    }

    /// Smallest peer set the scenario makes sense for.
    pub fn min_processes(self) -> usize {
        match self {
            Scenario::Slides => 3,
            Scenario::SecondMessageFirst => 2,
            Scenario::HelloWorld => 1,
        }
    }

    /// Reject peer sets too small for the scenario to ever finish.
    pub fn check(self, process_count: usize) -> crate::error::Result<()> {
        let required = self.min_processes();
        if process_count < required {
            return Err(RuntimeError::TooFewProcesses {
                scenario: self.to_string(),
                required,
                found: process_count,
            });
        }
        Ok(())
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Scenario::Slides => "slides",
            Scenario::SecondMessageFirst => "second-message-first",
            Scenario::HelloWorld => "hello-world",
        };
        f.write_str(name)
    }
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.to_string() == s)
            .ok_or_else(|| {
                let names: Vec<String> = Scenario::ALL.iter().map(|s| s.to_string()).collect();
                format!("unknown scenario {:?}, expected one of: {}", s, names.join(", "))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(policy: &mut dyn Policy, id: ProcessId, n: usize) -> PolicyContext {
        let mut ctx = PolicyContext::new(id, n, VectorClock::new(n));
        policy.on_start(&mut ctx);
        ctx
    }

    #[test]
    fn test_slides_start() {
        let ctx = started(&mut Slides::new(), 0, 4);
        let requests = ctx.into_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].delayed.iter().copied().collect::<Vec<_>>(), vec![2, 3]);

        assert!(started(&mut Slides::new(), 1, 4).requests().is_empty());
    }

    #[test]
    fn test_slides_answers_once() {
        let mut policy = Slides::new();
        let m1 = CausalMessage::new(0, VectorClock::from_slots([1, 0, 0]), Some("m1".into()));
        let mut ctx = PolicyContext::new(1, 3, VectorClock::from_slots([1, 0, 0]));

        policy.on_deliver(&mut ctx, &m1);
        policy.on_deliver(&mut ctx, &m1);
        assert_eq!(ctx.requests().len(), 1);

        assert!(!policy.is_finished(1, &VectorClock::from_slots([1, 0, 0])));
        assert!(policy.is_finished(1, &VectorClock::from_slots([1, 1, 0])));
    }

    #[test]
    fn test_second_message_first_start() {
        let requests = started(&mut SecondMessageFirst::new(), 0, 3).into_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].delayed.len(), 3);
        assert!(requests[1].delayed.is_empty());

        assert!(started(&mut SecondMessageFirst::new(), 2, 3).requests().is_empty());
        assert!(SecondMessageFirst.is_finished(2, &VectorClock::from_slots([2, 0, 0])));
    }

    #[test]
    fn test_hello_world() {
        assert_eq!(started(&mut HelloWorld::new(), 1, 2).requests().len(), 1);
        assert!(!HelloWorld.is_finished(0, &VectorClock::from_slots([1, 0])));
        assert!(HelloWorld.is_finished(0, &VectorClock::from_slots([1, 1])));
    }

    #[test]
    fn test_scenario_names() {
        for scenario in Scenario::ALL {
            assert_eq!(scenario.to_string().parse::<Scenario>(), Ok(scenario));
        }
        assert!("nope".parse::<Scenario>().is_err());
    }

    #[test]
    fn test_check_rejects_small_peer_sets() {
        let err = Scenario::Slides.check(1).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::TooFewProcesses {
                required: 3,
                found: 1,
                ..
            }
        ));
        assert!(Scenario::SecondMessageFirst.check(1).is_err());

        for scenario in Scenario::ALL {
            assert!(scenario.check(scenario.min_processes()).is_ok());
        }
    }
}
