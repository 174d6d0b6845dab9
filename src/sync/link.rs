//! Per-tick glue between a race session and its peers

use std::collections::HashMap;

use tokio::task::JoinHandle;
use tracing::debug;

use super::channel::SyncChannel;
use super::finish::{FinishRecord, FinishReporter};
use super::mailbox::Mailbox;
use super::publisher::StatePublisher;
use super::remote::RemoteBoat;
use crate::sim::session::{ActorRole, ActorView};
use crate::sim::{RaceSession, SimEvent};
use crate::store::RaceResultStore;
use crate::ws::protocol::PeerState;

/// Snapshot of the local boat as peers see it
pub fn local_peer_state(session: &RaceSession) -> PeerState {
    let state = &session.player().state;
    let progress = session.player_progress();
    PeerState {
        player_id: session.player_id().to_string(),
        seq: 0,
        x: state.position.x,
        z: state.position.y,
        heading: state.heading,
        lap: progress.map_or(0, |p| p.lap),
        checkpoint: progress.map_or(0, |p| p.last_checkpoint_index as u32),
        finished: progress.is_some_and(|p| p.finished),
        finish_time: progress
            .and_then(|p| p.finish_time)
            .map(|t| t.as_secs_f64()),
    }
}

/// Publisher, transport, inbox, remote boats and finish reporting for one
/// local player
pub struct MatchLink<C, S> {
    player_id: String,
    publisher: StatePublisher,
    channel: C,
    mailbox: Mailbox,
    remotes: HashMap<String, RemoteBoat>,
    reporter: FinishReporter<S>,
}

impl<C: SyncChannel, S: RaceResultStore> MatchLink<C, S> {
    pub fn new(
        player_id: impl Into<String>,
        channel: C,
        mailbox: Mailbox,
        reporter: FinishReporter<S>,
    ) -> Self {
        Self {
            player_id: player_id.into(),
            publisher: StatePublisher::default(),
            channel,
            mailbox,
            remotes: HashMap::new(),
            reporter,
        }
    }

    /// Run after `session.tick`, with the events that tick produced.
    ///
    /// Returns the persistence task when this tick reported the local finish.
    pub fn tick(&mut self, session: &RaceSession, events: &[SimEvent]) -> Option<JoinHandle<()>> {
        if let Some(state) = self.publisher.offer(session.clock(), local_peer_state(session)) {
            self.channel.broadcast(&state);
        }

        for state in self.mailbox.drain() {
            if state.player_id == self.player_id {
                debug!(player_id = %state.player_id, "Ignoring echo of own state");
                continue;
            }
            match self.remotes.get_mut(&state.player_id) {
                Some(remote) => {
                    remote.apply(&state);
                }
                None => {
                    debug!(player_id = %state.player_id, "New remote boat");
                    self.remotes
                        .insert(state.player_id.clone(), RemoteBoat::new(&state));
                }
            }
        }

        for remote in self.remotes.values_mut() {
            remote.tick();
        }

        events.iter().find_map(|event| match event {
            SimEvent::Finished {
                actor_id,
                finish_secs,
                ..
            } if actor_id == &self.player_id => {
                let lap = session.player_progress().map_or(0, |p| p.lap);
                self.reporter.report(FinishRecord {
                    lap,
                    finish_secs: *finish_secs,
                })
            }
            _ => None,
        })
    }

    pub fn remote(&self, player_id: &str) -> Option<&RemoteBoat> {
        self.remotes.get(player_id)
    }

    /// Render views of every remote boat, sorted by id
    pub fn remote_views(&self) -> Vec<ActorView> {
        let mut views: Vec<ActorView> = self
            .remotes
            .values()
            .map(|r| ActorView {
                id: r.player_id.clone(),
                role: ActorRole::Remote,
                position: r.position,
                heading: r.heading,
                speed: 0.0,
            })
            .collect();
        views.sort_by(|a, b| a.id.cmp(&b.id));
        views
    }

    pub fn finish_reported(&self) -> bool {
        self.reporter.is_submitted()
    }
}
