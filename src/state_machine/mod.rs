//! Round based state machine
//!
//! A multiparty protocol is executed as a fixed sequence of rounds. Each round is a state object implementing [`State`].
//! The machine is connected to the transport through two channels, one for incoming and one for outgoing messages;
//! the transport itself is not part of the crate.
//!
//! For every round the machine
//!  * sends the output returned by [`State::start`],
//!  * collects messages accepted by [`State::is_message_expected`] until [`State::is_input_complete`] holds,
//!  * hands the collected messages to [`State::consume`], which either yields the next round or the final outcome.
//!
//! No round starts before every message of the previous one has been received and validated.
//! Messages which arrive early, e.g. a fast peer already sending its next round, are deferred and replayed
//! once the next state becomes current. A message which the new state does not expect either stays deferred.
//!
//! A round may declare a timeout. If the input is not complete when it expires, the machine stops
//! with the outcome of [`State::timeout_outcome`].
pub mod sync_channels;

use std::fmt::{Debug, Error, Formatter};
use std::time::Duration;

/// Types of a concrete protocol
pub trait StateMachineTraits {
    type InMsg;
    type OutMsg;
    type FinalState;
    type ErrorState;
}

#[derive(Debug)]
pub enum Transition<T>
where
    T: StateMachineTraits,
{
    NewState(BoxedState<T>),
    FinalState(Result<T::FinalState, T::ErrorState>),
}

/// States are `Send` so that a machine can be moved into the thread which drives it
pub type BoxedState<T> = Box<dyn State<T> + Send>;

impl<T> Debug for BoxedState<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "BoxedState")
    }
}

/// A round of the protocol
pub trait State<T>
where
    T: StateMachineTraits,
{
    /// Output of the round, called once when the state becomes current
    fn start(&mut self) -> Option<Vec<T::OutMsg>>;
    fn is_message_expected(&self, msg: &T::InMsg, current_msg_set: &[T::InMsg]) -> bool;
    fn is_input_complete(&self, current_msg_set: &[T::InMsg]) -> bool;
    fn consume(&self, current_msg_set: Vec<T::InMsg>) -> Transition<T>;

    fn timeout(&self) -> Option<Duration> {
        None
    }
    fn timeout_outcome(
        &self,
        current_msg_set: Vec<T::InMsg>,
    ) -> Result<T::FinalState, T::ErrorState>;
}
