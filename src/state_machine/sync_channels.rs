//! State machine driven by `crossbeam_channel` queues
//!
//! The machine blocks on its input channel. Timeouts are implemented with `crossbeam_channel::after`.
use crate::state_machine::{BoxedState, StateMachineTraits, Transition};
use crossbeam_channel::{after, Receiver, Sender};
use std::collections::VecDeque;
use std::time::Instant;

pub struct StateMachine<'a, T>
where
    T: StateMachineTraits,
{
    state: BoxedState<T>,
    inqueue: &'a Receiver<T::InMsg>,
    outqueue: &'a Sender<T::OutMsg>,
    timeout: Option<Receiver<Instant>>,
    retained: Vec<T::InMsg>,
    deferred: DeferredMessages<T::InMsg>,
}

/// Messages not expected by the current state
///
/// Messages deferred while a state is current are replayed only after the next transition,
/// so that a state never sees the same rejected message twice.
struct DeferredMessages<M> {
    replay: VecDeque<M>,
    pending: VecDeque<M>,
}

impl<M> DeferredMessages<M> {
    fn new() -> Self {
        Self {
            replay: VecDeque::new(),
            pending: VecDeque::new(),
        }
    }

    fn defer(&mut self, m: M) {
        self.pending.push_back(m);
    }

    fn next_to_replay(&mut self) -> Option<M> {
        self.replay.pop_front()
    }

    /// moves pending messages to the replay queue, called on each transition
    fn on_transition(&mut self) {
        self.replay.extend(self.pending.drain(..));
    }

    fn len(&self) -> usize {
        self.replay.len() + self.pending.len()
    }
}

impl<'a, T: StateMachineTraits> StateMachine<'a, T> {
    pub fn new(
        start_state: BoxedState<T>,
        inqueue: &'a Receiver<T::InMsg>,
        outqueue: &'a Sender<T::OutMsg>,
    ) -> Self {
        StateMachine {
            state: start_state,
            inqueue,
            outqueue,
            timeout: None,
            retained: Vec::new(),
            deferred: DeferredMessages::new(),
        }
    }

    /// Runs the machine until a final state is reached
    ///
    /// Returns `None` if the input channel is disconnected before that.
    pub fn execute(&mut self) -> Option<Result<T::FinalState, T::ErrorState>> {
        log::trace!("starting state machine");
        self.enter_state();

        loop {
            let transition = match self.deferred.next_to_replay() {
                Some(m) => self.process_message(m),
                None => match self.timeout.as_ref() {
                    Some(timeout_receiver) => crossbeam_channel::select! {
                        recv(self.inqueue) -> result => match result {
                            Ok(m) => self.process_message(m),
                            Err(e) => {
                                log::error!("state machine with timeout: receive error {:?}", e);
                                return None;
                            }
                        },
                        recv(timeout_receiver) -> _ => {
                            log::warn!("state machine timed out, {} messages deferred", self.deferred.len());
                            return Some(self.state.timeout_outcome(self.retained.drain(..).collect()));
                        }
                    },
                    None => match self.inqueue.recv() {
                        Ok(m) => self.process_message(m),
                        Err(e) => {
                            log::error!("state machine: receive error {:?}", e);
                            return None;
                        }
                    },
                },
            };

            match transition {
                Some(Transition::NewState(state)) => {
                    self.state = state;
                    self.enter_state();
                    self.deferred.on_transition();
                }
                Some(Transition::FinalState(outcome)) => return Some(outcome),
                None => {}
            }
        }
    }

    fn process_message(&mut self, message: T::InMsg) -> Option<Transition<T>> {
        if !self.state.is_message_expected(&message, &self.retained) {
            self.deferred.defer(message);
            return None;
        }
        self.retained.push(message);

        if self.state.is_input_complete(&self.retained) {
            Some(self.state.consume(self.retained.drain(..).collect()))
        } else {
            None
        }
    }

    fn enter_state(&mut self) {
        self.timeout = self.state.timeout().map(after);
        if let Some(output) = self.state.start() {
            for m in output {
                if let Err(err) = self.outqueue.send(m) {
                    log::error!("state machine cannot send out message: {:?}", err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Address, InputMessage, OutputMessage, PartyIndex};
    use crate::state_machine::State;
    use std::thread;
    use std::time::Duration;

    #[derive(Debug, PartialEq)]
    struct Final(Vec<u32>);

    #[derive(Debug, PartialEq)]
    enum MachineError {
        Timeout,
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Body {
        Round(u32),
    }

    struct TestTraits;

    impl StateMachineTraits for TestTraits {
        type InMsg = InputMessage<Body>;
        type OutMsg = OutputMessage<Body>;
        type FinalState = Final;
        type ErrorState = MachineError;
    }

    type In = InputMessage<Body>;
    type Out = OutputMessage<Body>;

    /// Round `round` of `last` rounds, expects one message of its own round from each of two peers
    struct Round {
        round: u32,
        last: u32,
        seen: Vec<u32>,
        timeout: Option<Duration>,
    }

    impl State<TestTraits> for Round {
        fn start(&mut self) -> Option<Vec<Out>> {
            Some(vec![Out {
                recipient: Address::Broadcast,
                body: Body::Round(self.round),
            }])
        }

        fn is_message_expected(&self, msg: &In, current_msg_set: &[In]) -> bool {
            msg.body == Body::Round(self.round)
                && !current_msg_set.iter().any(|m| m.sender == msg.sender)
        }

        fn is_input_complete(&self, current_msg_set: &[In]) -> bool {
            current_msg_set.len() == 2
        }

        fn consume(&self, _current_msg_set: Vec<In>) -> Transition<TestTraits> {
            let mut seen = self.seen.clone();
            seen.push(self.round);
            if self.round == self.last {
                Transition::FinalState(Ok(Final(seen)))
            } else {
                Transition::NewState(Box::new(Round {
                    round: self.round + 1,
                    last: self.last,
                    seen,
                    timeout: self.timeout,
                }))
            }
        }

        fn timeout(&self) -> Option<Duration> {
            self.timeout
        }

        fn timeout_outcome(&self, _current_msg_set: Vec<In>) -> Result<Final, MachineError> {
            Err(MachineError::Timeout)
        }
    }

    fn message(sender: usize, round: u32) -> In {
        In {
            sender: PartyIndex::from(sender),
            body: Body::Round(round),
        }
    }

    #[test]
    fn early_messages_are_deferred() {
        let _ = env_logger::builder().is_test(true).try_init();
        let (ingress, rx) = crossbeam_channel::unbounded();
        let (tx, egress) = crossbeam_channel::unbounded();
        let start = Box::new(Round {
            round: 1,
            last: 2,
            seen: vec![],
            timeout: None,
        });
        let mut machine = StateMachine::<TestTraits>::new(start, &rx, &tx);

        // round 2 of the first peer overtakes its round 1
        for m in vec![message(1, 2), message(2, 1), message(1, 1), message(2, 2)] {
            ingress.send(m).unwrap();
        }

        let result = machine.execute();
        assert_eq!(result, Some(Ok(Final(vec![1, 2]))));
        assert_eq!(egress.try_iter().count(), 2);
    }

    #[test]
    fn disconnected_input() {
        let (ingress, rx) = crossbeam_channel::unbounded::<In>();
        let (tx, _egress) = crossbeam_channel::unbounded();
        let start = Box::new(Round {
            round: 1,
            last: 1,
            seen: vec![],
            timeout: None,
        });
        let mut machine = StateMachine::<TestTraits>::new(start, &rx, &tx);
        drop(ingress);
        assert!(machine.execute().is_none());
    }

    #[test]
    fn timed_out() {
        let _ = env_logger::builder().is_test(true).try_init();

        let timeout = Duration::from_millis(500);
        let (ingress, rx) = crossbeam_channel::unbounded();
        let (tx, egress) = crossbeam_channel::unbounded();
        let start = Box::new(Round {
            round: 1,
            last: 1,
            seen: vec![],
            timeout: Some(timeout),
        });
        let mut machine = StateMachine::<TestTraits>::new(start, &rx, &tx);

        let client = thread::spawn(move || {
            let _ = egress.recv();
            ingress
                .send(message(1, 1))
                .expect("cannot send to the state machine");
            thread::sleep(timeout * 3);
            let _ = ingress.send(message(2, 1));
        });

        let result = machine.execute();
        assert_eq!(result, Some(Err(MachineError::Timeout)));
        client.join().unwrap();
    }
}
