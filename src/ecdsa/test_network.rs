//! In-process network used by protocol tests
//!
//! Every party runs its own state machine in a thread. The router thread moves messages
//! from the egress channels of the parties to their ingress channels, optionally tampering with them.
//! The router stops once every party has dropped its egress channel.
use crate::protocol::{Address, InputMessage, OutputMessage, PartyIndex};
use crate::state_machine::sync_channels::StateMachine;
use crate::state_machine::{BoxedState, StateMachineTraits};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

struct Node<M> {
    party: PartyIndex,
    egress: Receiver<OutputMessage<M>>,
    ingress: Sender<InputMessage<M>>,
    connected: bool,
}

struct OutputMessageWithSource<M> {
    msg: OutputMessage<M>,
    source: PartyIndex,
}

/// The outcome of each party, in the order of the input
pub(crate) type Outcomes<T> = Vec<
    Option<Result<<T as StateMachineTraits>::FinalState, <T as StateMachineTraits>::ErrorState>>,
>;

/// Runs the protocol with the start states built by `parties` and delivers the messages via the router
///
/// `tamper` is applied to every message before delivery, it receives the sender and the recipient.
pub(crate) fn run_protocol<T, M, F, C>(parties: Vec<(PartyIndex, F)>, tamper: C) -> Outcomes<T>
where
    T: StateMachineTraits<InMsg = InputMessage<M>, OutMsg = OutputMessage<M>> + 'static,
    T::FinalState: Send + 'static,
    T::ErrorState: Send + 'static,
    M: Clone + Send + 'static,
    F: FnOnce() -> BoxedState<T> + Send + 'static,
    C: Fn(&PartyIndex, &PartyIndex, &mut M) + Send + 'static,
{
    let mut nodes = Vec::new();
    let mut handles = Vec::new();

    for (party, start) in parties {
        let (ingress, rx) = crossbeam_channel::unbounded();
        let (tx, egress) = crossbeam_channel::unbounded();
        log::info!("starting party {}", party);
        handles.push(thread::spawn(move || {
            let mut machine = StateMachine::<T>::new(start(), &rx, &tx);
            machine.execute()
        }));
        nodes.push(Node {
            party,
            egress,
            ingress,
            connected: true,
        });
    }

    let router = thread::spawn(move || route(nodes, tamper));

    let results = handles
        .into_iter()
        .map(|h| h.join().expect("party thread panicked"))
        .collect::<Vec<_>>();
    router.join().expect("router thread panicked");
    results
}

fn route<M, C>(mut nodes: Vec<Node<M>>, tamper: C)
where
    M: Clone,
    C: Fn(&PartyIndex, &PartyIndex, &mut M),
{
    while nodes.iter().any(|node| node.connected) {
        let mut output_messages = Vec::new();
        for node in nodes.iter_mut().filter(|node| node.connected) {
            match node.egress.try_recv() {
                Ok(msg) => output_messages.push(OutputMessageWithSource {
                    msg,
                    source: node.party,
                }),
                Err(TryRecvError::Disconnected) => node.connected = false,
                Err(TryRecvError::Empty) => {}
            }
        }
        if output_messages.is_empty() {
            thread::sleep(Duration::from_millis(1));
            continue;
        }

        for mm in output_messages {
            let recipients = nodes
                .iter()
                .filter(|node| node.party != mm.source)
                .filter(|node| match &mm.msg.recipient {
                    Address::Broadcast => true,
                    Address::Peer(peer) => node.party == *peer,
                })
                .collect::<Vec<_>>();
            log::trace!(
                "message from {} to {:?}",
                mm.source,
                recipients.iter().map(|node| node.party).collect::<Vec<_>>()
            );
            for node in recipients {
                let mut body = mm.msg.body.clone();
                tamper(&mm.source, &node.party, &mut body);
                // the recipient might have finished already
                let _ = node.ingress.send(InputMessage {
                    sender: mm.source,
                    body,
                });
            }
        }
    }
}
